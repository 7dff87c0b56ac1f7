use std::time::Duration;

use alloy::primitives::{Address, B256};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::domain::event::{OrderKey, WeightChangeEvent};
use crate::ports::events::{EventSource, EventSourceError};

/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const EVENTS_QUERY: &str = r#"
query WeightChangeEvents($first: Int!, $skip: Int!) {
  weightChangeEvents(first: $first, skip: $skip, orderBy: blockNumber, orderDirection: asc) {
    id
    account { id address }
    previousWeight
    newWeight
    blockNumber
    transactionHash
    logIndex
  }
}"#;

const ACCOUNT_QUERY: &str = r#"
query Account($id: ID!) {
  account(id: $id) {
    id
    address
    weight
    lastUpdatedAt
    lastUpdatedBlock
  }
}"#;

const GLOBAL_STATS_QUERY: &str = r#"
query GlobalStats {
  globalStats(id: "global") {
    id
    totalDelegations
    totalAccounts
    totalWeight
    lastUpdatedAt
  }
}"#;

/// Indexed state of a single account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub address: Address,
    pub weight: u128,
    pub last_updated_at: u64,
    pub last_updated_block: u64,
}

/// Indexer-wide aggregate counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalStats {
    pub total_delegations: u64,
    pub total_accounts: u64,
    pub total_weight: u128,
    pub last_updated_at: u64,
}

// ── Wire types ──

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsData {
    weight_change_events: Vec<RawWeightChangeEvent>,
}

#[derive(Debug, Deserialize)]
struct RawAccountRef {
    id: String,
    #[serde(default)]
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWeightChangeEvent {
    id: String,
    account: RawAccountRef,
    previous_weight: String,
    new_weight: String,
    block_number: String,
    #[serde(default)]
    transaction_hash: Option<String>,
    #[serde(default)]
    log_index: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountData {
    account: Option<RawAccount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAccount {
    id: String,
    #[serde(default)]
    address: Option<String>,
    weight: String,
    last_updated_at: String,
    last_updated_block: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GlobalStatsData {
    global_stats: Option<RawGlobalStats>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGlobalStats {
    id: String,
    total_delegations: String,
    total_accounts: String,
    total_weight: String,
    last_updated_at: String,
}

fn decode_error(id: &str, reason: impl Into<String>) -> EventSourceError {
    EventSourceError::Decode {
        id: id.to_string(),
        reason: reason.into(),
    }
}

fn parse_address(id: &str, value: &str) -> Result<Address, EventSourceError> {
    value
        .parse()
        .map_err(|e| decode_error(id, format!("invalid address {value:?}: {e}")))
}

fn parse_u64(id: &str, field: &str, value: &str) -> Result<u64, EventSourceError> {
    value
        .parse()
        .map_err(|e| decode_error(id, format!("{field} {value:?}: {e}")))
}

fn parse_u128(id: &str, field: &str, value: &str) -> Result<u128, EventSourceError> {
    value
        .parse()
        .map_err(|e| decode_error(id, format!("{field} {value:?}: {e}")))
}

impl TryFrom<RawWeightChangeEvent> for WeightChangeEvent {
    type Error = EventSourceError;

    fn try_from(raw: RawWeightChangeEvent) -> Result<Self, Self::Error> {
        let id = raw.id.as_str();
        let address = raw.account.address.as_deref().unwrap_or(&raw.account.id);
        let log_index = match raw.log_index.as_deref() {
            Some(value) => parse_u64(id, "logIndex", value)?,
            None => 0,
        };
        let transaction_hash = raw
            .transaction_hash
            .as_deref()
            .map(|value| {
                value
                    .parse::<B256>()
                    .map_err(|e| decode_error(id, format!("transactionHash {value:?}: {e}")))
            })
            .transpose()?;

        Ok(WeightChangeEvent {
            account: parse_address(id, address)?,
            previous_weight: parse_u128(id, "previousWeight", &raw.previous_weight)?,
            new_weight: parse_u128(id, "newWeight", &raw.new_weight)?,
            order: OrderKey::new(parse_u64(id, "blockNumber", &raw.block_number)?, log_index),
            transaction_hash,
        })
    }
}

impl TryFrom<RawAccount> for AccountInfo {
    type Error = EventSourceError;

    fn try_from(raw: RawAccount) -> Result<Self, Self::Error> {
        let id = raw.id.as_str();
        Ok(AccountInfo {
            address: parse_address(id, raw.address.as_deref().unwrap_or(id))?,
            weight: parse_u128(id, "weight", &raw.weight)?,
            last_updated_at: parse_u64(id, "lastUpdatedAt", &raw.last_updated_at)?,
            last_updated_block: parse_u64(id, "lastUpdatedBlock", &raw.last_updated_block)?,
        })
    }
}

impl TryFrom<RawGlobalStats> for GlobalStats {
    type Error = EventSourceError;

    fn try_from(raw: RawGlobalStats) -> Result<Self, Self::Error> {
        let id = raw.id.as_str();
        Ok(GlobalStats {
            total_delegations: parse_u64(id, "totalDelegations", &raw.total_delegations)?,
            total_accounts: parse_u64(id, "totalAccounts", &raw.total_accounts)?,
            total_weight: parse_u128(id, "totalWeight", &raw.total_weight)?,
            last_updated_at: parse_u64(id, "lastUpdatedAt", &raw.last_updated_at)?,
        })
    }
}

/// Unwrap a GraphQL envelope, turning reported errors into `Query`.
fn into_data<T>(response: GraphQlResponse<T>) -> Result<T, EventSourceError> {
    if !response.errors.is_empty() {
        let messages: Vec<&str> = response.errors.iter().map(|e| e.message.as_str()).collect();
        return Err(EventSourceError::Query(messages.join("; ")));
    }
    response
        .data
        .ok_or_else(|| EventSourceError::Query("response carries no data".into()))
}

fn into_events(data: EventsData) -> Result<Vec<WeightChangeEvent>, EventSourceError> {
    data.weight_change_events
        .into_iter()
        .map(WeightChangeEvent::try_from)
        .collect()
}

/// GraphQL client for the census subgraph.
#[derive(Clone)]
pub struct SubgraphClient {
    endpoint: String,
    http: reqwest::Client,
}

impl SubgraphClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, EventSourceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EventSourceError::Transport(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T, EventSourceError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| EventSourceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EventSourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: GraphQlResponse<T> = response
            .json()
            .await
            .map_err(|e| EventSourceError::Transport(format!("invalid response body: {e}")))?;
        into_data(body)
    }

    /// Indexed state for `account`, `None` if the subgraph never saw it.
    pub async fn get_account(
        &self,
        account: Address,
    ) -> Result<Option<AccountInfo>, EventSourceError> {
        let data: AccountData = self
            .query(ACCOUNT_QUERY, json!({ "id": format!("{account:#x}") }))
            .await?;
        data.account.map(AccountInfo::try_from).transpose()
    }

    pub async fn get_global_stats(&self) -> Result<Option<GlobalStats>, EventSourceError> {
        let data: GlobalStatsData = self.query(GLOBAL_STATS_QUERY, json!({})).await?;
        data.global_stats.map(GlobalStats::try_from).transpose()
    }
}

impl EventSource for SubgraphClient {
    async fn fetch_page(
        &self,
        page_size: usize,
        offset: usize,
    ) -> Result<Vec<WeightChangeEvent>, EventSourceError> {
        debug!(first = page_size, skip = offset, "querying weightChangeEvents");
        let data: EventsData = self
            .query(EVENTS_QUERY, json!({ "first": page_size, "skip": offset }))
            .await?;
        into_events(data)
    }
}
