use std::time::Duration;

use alloy::primitives::Address;
use census_replay::adapters::subgraph::DEFAULT_TIMEOUT;
use census_replay::reconstruct::DEFAULT_PAGE_SIZE;
use serde::Deserialize;

/// Top-level configuration loaded from TOML. Every field may also come from
/// the command line.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyConfig {
    #[serde(default)]
    pub subgraph: SubgraphConfig,
    #[serde(default)]
    pub chain: ChainConfig,
}

/// Indexer settings.
#[derive(Debug, Deserialize)]
pub struct SubgraphConfig {
    pub url: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Per-request timeout (e.g. "30s"). Parsed via humantime.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for SubgraphConfig {
    fn default() -> Self {
        Self {
            url: None,
            page_size: DEFAULT_PAGE_SIZE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

/// Contract settings.
#[derive(Debug, Default, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: Option<String>,
    pub contract_address: Option<Address>,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub subgraph_url: Option<String>,
    pub rpc_url: Option<String>,
    pub contract_address: Option<Address>,
    pub page_size: Option<usize>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub subgraph_url: String,
    pub page_size: usize,
    pub timeout: Duration,
    pub rpc_url: String,
    pub contract_address: Address,
}

/// Errors from config loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl VerifyConfig {
    /// Read and parse a config file. Validation happens in `resolve`, after
    /// command-line overrides are applied.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if overrides.subgraph_url.is_some() {
            self.subgraph.url = overrides.subgraph_url;
        }
        if overrides.rpc_url.is_some() {
            self.chain.rpc_url = overrides.rpc_url;
        }
        if overrides.contract_address.is_some() {
            self.chain.contract_address = overrides.contract_address;
        }
        if let Some(page_size) = overrides.page_size {
            self.subgraph.page_size = page_size;
        }
        self
    }

    /// Check invariants and produce the settings for a run.
    pub fn resolve(&self) -> Result<Settings, ConfigError> {
        let subgraph_url = required("subgraph.url", self.subgraph.url.as_deref())?;
        let rpc_url = required("chain.rpc_url", self.chain.rpc_url.as_deref())?;
        let contract_address = self.chain.contract_address.ok_or_else(|| {
            ConfigError::Validation("chain.contract_address is required".into())
        })?;

        if self.subgraph.page_size == 0 {
            return Err(ConfigError::Validation(
                "subgraph.page_size must be positive".into(),
            ));
        }
        if self.subgraph.timeout.is_zero() {
            return Err(ConfigError::Validation(
                "subgraph.timeout must be positive".into(),
            ));
        }

        Ok(Settings {
            subgraph_url,
            page_size: self.subgraph.page_size,
            timeout: self.subgraph.timeout,
            rpc_url,
            contract_address,
        })
    }
}

fn required(name: &str, value: Option<&str>) -> Result<String, ConfigError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigError::Validation(format!("{name} is required"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const FULL: &str = r#"
[subgraph]
url = "https://api.studio.thegraph.com/query/1/census/v0.0.1"
page_size = 500
timeout = "45s"

[chain]
rpc_url = "https://sepolia.base.org"
contract_address = "0x1111111111111111111111111111111111111111"
"#;

    #[test]
    fn test_parse_full_config() {
        let config: VerifyConfig = toml::from_str(FULL).unwrap();
        let settings = config.resolve().unwrap();
        assert_eq!(settings.page_size, 500);
        assert_eq!(settings.timeout, Duration::from_secs(45));
        assert_eq!(
            settings.contract_address,
            address!("0x1111111111111111111111111111111111111111")
        );
    }

    #[test]
    fn test_defaults_apply() {
        let toml = r#"
[subgraph]
url = "http://localhost:8000/subgraphs/name/census"

[chain]
rpc_url = "http://localhost:8545"
contract_address = "0x1111111111111111111111111111111111111111"
"#;
        let config: VerifyConfig = toml::from_str(toml).unwrap();
        let settings = config.resolve().unwrap();
        assert_eq!(settings.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(settings.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides_win() {
        let config: VerifyConfig = toml::from_str(FULL).unwrap();
        let settings = config
            .with_overrides(Overrides {
                rpc_url: Some("http://localhost:8545".into()),
                page_size: Some(10),
                ..Default::default()
            })
            .resolve()
            .unwrap();
        assert_eq!(settings.rpc_url, "http://localhost:8545");
        assert_eq!(settings.page_size, 10);
        assert!(settings.subgraph_url.starts_with("https://api.studio"));
    }

    #[test]
    fn test_flags_only() {
        let settings = VerifyConfig::default()
            .with_overrides(Overrides {
                subgraph_url: Some("http://localhost:8000".into()),
                rpc_url: Some("http://localhost:8545".into()),
                contract_address: Some(Address::with_last_byte(1)),
                page_size: None,
            })
            .resolve()
            .unwrap();
        assert_eq!(settings.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_missing_contract_rejected() {
        let toml = r#"
[subgraph]
url = "http://localhost:8000"

[chain]
rpc_url = "http://localhost:8545"
"#;
        let config: VerifyConfig = toml::from_str(toml).unwrap();
        let err = config.resolve().unwrap_err();
        assert!(err.to_string().contains("chain.contract_address"));
    }

    #[test]
    fn test_blank_url_rejected() {
        let config = VerifyConfig::default().with_overrides(Overrides {
            subgraph_url: Some("  ".into()),
            rpc_url: Some("http://localhost:8545".into()),
            contract_address: Some(Address::with_last_byte(1)),
            page_size: None,
        });
        let err = config.resolve().unwrap_err();
        assert!(err.to_string().contains("subgraph.url"));
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let config: VerifyConfig = toml::from_str(FULL).unwrap();
        let err = config
            .with_overrides(Overrides {
                page_size: Some(0),
                ..Default::default()
            })
            .resolve()
            .unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }
}
