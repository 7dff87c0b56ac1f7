//! Rebuilds the census tree from the subgraph and checks it against the
//! root stored in the contract.
//!
//! Run with:
//!   cargo run --bin verify-tree -- --config verify-tree.toml
//!   cargo run --bin verify-tree -- --subgraph <url> --rpc <url> --contract <address> --show-tree

use std::path::PathBuf;
use std::time::Instant;

use alloy::primitives::{Address, U256};
use clap::Parser;
use tracing::{info, warn};

mod config;

use census_replay::adapters::ethereum::EthereumCensus;
use census_replay::adapters::subgraph::SubgraphClient;
use census_replay::crosscheck::cross_check;
use census_replay::domain::merkle::{CensusTree, TreeError};
use census_replay::ports::chain::{CensusChainPort as _, ChainError};
use census_replay::ports::events::EventSourceError;
use census_replay::reconstruct::{
    validate_root, ReconstructConfig, ReconstructError, RootMismatch, TreeReconstructor,
};
use config::{Overrides, VerifyConfig};

#[derive(clap::Parser)]
#[command(
    name = "verify-tree",
    about = "Rebuild the census tree from WeightChanged events and verify its root on-chain"
)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Subgraph GraphQL endpoint.
    #[arg(long)]
    subgraph: Option<String>,

    /// Ethereum JSON-RPC endpoint.
    #[arg(long)]
    rpc: Option<String>,

    /// Census contract address.
    #[arg(long)]
    contract: Option<Address>,

    /// Events requested per subgraph page.
    #[arg(long)]
    page_size: Option<usize>,

    /// Print every slot of the rebuilt tree.
    #[arg(long)]
    show_tree: bool,

    /// Print a membership proof for this account as JSON.
    #[arg(long)]
    proof_for: Option<Address>,

    /// Compare every slot against the contract's account and leaf getters.
    #[arg(long)]
    cross_check: bool,
}

#[derive(Debug, thiserror::Error)]
enum VerifyError {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("subgraph error: {0}")]
    Subgraph(#[from] EventSourceError),

    #[error("reconstruction failed: {0}")]
    Reconstruct(#[from] ReconstructError),

    #[error("{0}")]
    Mismatch(#[from] RootMismatch),

    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("account {0} has no live slot in the tree")]
    AccountNotFound(Address),

    #[error("{0} slot(s) disagree with the contract")]
    Inconsistent(usize),
}

/// Print a step header at the start of each phase.
fn step(n: u8, total: u8, msg: &str) {
    info!("");
    info!("┌─[{n}/{total}] {msg}");
}

const STEPS: u8 = 5;

#[tokio::main]
async fn main() -> Result<(), VerifyError> {
    // No timestamps or level prefix: output reads as a report.
    tracing_subscriber::fmt()
        .without_time()
        .with_target(false)
        .with_level(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // ── Step 1: Config ──
    step(1, STEPS, "Loading configuration...");
    let file_config = match &args.config {
        Some(path) => {
            info!("│  file: {}", path.display());
            VerifyConfig::load(path)?
        }
        None => VerifyConfig::default(),
    };
    let settings = file_config
        .with_overrides(Overrides {
            subgraph_url: args.subgraph.clone(),
            rpc_url: args.rpc.clone(),
            contract_address: args.contract,
            page_size: args.page_size,
        })
        .resolve()?;
    info!("│  subgraph:  {}", settings.subgraph_url);
    info!("│  rpc:       {}", settings.rpc_url);
    info!("│  contract:  {}", settings.contract_address);
    info!("└  page size: {}", settings.page_size);

    // ── Step 2: On-chain root ──
    step(2, STEPS, "Fetching census root from contract...");
    let chain = EthereumCensus::new(&settings.rpc_url, settings.contract_address)?;
    let expected_root = chain.get_census_root().await?;
    info!("└  on-chain root: {expected_root:#x}");

    // ── Step 3: Replay ──
    step(3, STEPS, "Reconstructing tree from WeightChanged events...");
    let client = SubgraphClient::new(&settings.subgraph_url, settings.timeout)?;
    let reconstructor = TreeReconstructor::new(
        client,
        ReconstructConfig {
            page_size: settings.page_size,
        },
    );
    let started = Instant::now();
    let reconstruction = reconstructor.reconstruct().await?;
    let elapsed = started.elapsed();
    let tree = &reconstruction.tree;

    info!("│  events:  {}", reconstruction.events);
    info!("│  size:    {}", reconstruction.size);
    info!("│  depth:   {}", tree.depth());
    info!("│  active:  {}", tree.active_count());
    info!("│  empty:   {}", tree.empty_count());
    info!("│  took:    {elapsed:.2?}");
    info!("└  root:    {:#x}", reconstruction.root);

    match reconstructor.source().get_global_stats().await {
        Ok(Some(stats)) if stats.total_accounts != tree.active_count() as u64 => warn!(
            "subgraph reports {} accounts, tree has {} live slots",
            stats.total_accounts,
            tree.active_count()
        ),
        Ok(_) => {}
        Err(e) => warn!("could not read subgraph stats: {e}"),
    }

    // ── Step 4: Validate ──
    step(4, STEPS, "Validating root...");
    if let Err(mismatch) = validate_root(tree, expected_root) {
        warn!("│  {mismatch}");
        explain_mismatch(&chain, reconstruction.root).await;
        return Err(mismatch.into());
    }
    info!("└  ✓ reconstructed root matches the contract");

    // ── Step 5: Reports ──
    step(5, STEPS, "Reports...");
    if args.show_tree {
        print_tree(tree);
    }
    if let Some(account) = args.proof_for {
        print_proof(tree, account, reconstructor.source()).await?;
    }
    if args.cross_check {
        let report = cross_check(tree, &chain).await?;
        for discrepancy in &report.discrepancies {
            warn!("│  {discrepancy}");
        }
        if !report.is_consistent() {
            return Err(VerifyError::Inconsistent(report.discrepancies.len()));
        }
        info!("│  ✓ {} slots agree with the contract", report.checked);
    }
    info!("└  done");

    Ok(())
}

/// Tell "the contract moved on" apart from "the replay is wrong".
async fn explain_mismatch(chain: &EthereumCensus, reconstructed: U256) {
    match chain.get_root_block_number(reconstructed).await {
        Ok(0) => warn!("└  reconstructed root was never a census root; the event replay is wrong"),
        Ok(block) => warn!(
            "└  reconstructed root was the census root at block {block}; events after it are not indexed yet"
        ),
        Err(e) => warn!("└  could not look up root history: {e}"),
    }
}

fn print_tree(tree: &CensusTree) {
    info!("│  slots:");
    for (index, leaf) in tree.leaves().iter().enumerate() {
        if leaf.is_zero() {
            info!("│    [{index:>5}] <empty>");
            continue;
        }
        let (account, weight) = census_replay::unpack_leaf(*leaf);
        info!("│    [{index:>5}] {account}  weight {weight}");
    }
}

async fn print_proof(
    tree: &CensusTree,
    account: Address,
    subgraph: &SubgraphClient,
) -> Result<(), VerifyError> {
    let Some((index, _, weight)) = tree.entries().find(|(_, a, _)| *a == account) else {
        match subgraph.get_account(account).await {
            Ok(Some(info)) => warn!(
                "│  subgraph has {account} with weight {} (block {})",
                info.weight, info.last_updated_block
            ),
            Ok(None) => warn!("│  subgraph has never seen {account}"),
            Err(e) => warn!("│  could not query subgraph for {account}: {e}"),
        }
        return Err(VerifyError::AccountNotFound(account));
    };

    let proof = tree.generate_proof(index)?;
    let output = serde_json::json!({
        "account": account.to_string(),
        "weight": weight.to_string(),
        "index": index,
        "leaf": proof.leaf.to_string(),
        "root": proof.root.to_string(),
        "siblings": proof.siblings.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        "proofIndex": proof.index,
        "pathIndices": proof.path_indices(),
        "valid": proof.verify(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
