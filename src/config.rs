/// Configuration management for Identity Lens
use crate::cache::CacheConfig;
use crate::error::{IdentityError, IdentityResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub chains: ChainsConfig,
    pub cache: CacheConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
}

/// Connection parameters for one chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainConfig {
    /// Gateway endpoint URL
    pub endpoint: String,
    /// Runtime descriptor name (e.g. `dot`, `people`)
    pub descriptor: String,
}

/// Chain registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainsConfig {
    pub default_chain: String,
    pub chains: BTreeMap<String, ChainConfig>,
    /// Deadline for a single chain call in milliseconds
    pub request_timeout_ms: u64,
}

impl ChainsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ChainsConfig {
    fn default() -> Self {
        Self {
            default_chain: "polkadot".to_string(),
            chains: default_chains(),
            request_timeout_ms: 5000,
        }
    }
}

/// Identity search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Upper bound on identity entries fetched per search
    pub max_entries: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { max_entries: 500 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Local sidecar endpoints for the well-known chains
fn default_chains() -> BTreeMap<String, ChainConfig> {
    [
        ("polkadot", "http://127.0.0.1:8080", "dot"),
        ("people", "http://127.0.0.1:8081", "people"),
        ("assetHub", "http://127.0.0.1:8082", "dotAh"),
    ]
    .into_iter()
    .map(|(name, endpoint, descriptor)| {
        (
            name.to_string(),
            ChainConfig {
                endpoint: endpoint.to_string(),
                descriptor: descriptor.to_string(),
            },
        )
    })
    .collect()
}

/// Parse a `name=url[#descriptor],...` chain list
pub fn parse_chains(list: &str) -> IdentityResult<BTreeMap<String, ChainConfig>> {
    let mut chains = BTreeMap::new();

    for entry in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, target) = entry
            .split_once('=')
            .ok_or_else(|| IdentityError::Config(format!("Invalid chain entry: {}", entry)))?;

        let name = name.trim();
        if name.is_empty() {
            return Err(IdentityError::Config(format!("Missing chain name in: {}", entry)));
        }

        let (endpoint, descriptor) = match target.split_once('#') {
            Some((endpoint, descriptor)) => (endpoint.trim(), descriptor.trim()),
            None => (target.trim(), name),
        };
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(IdentityError::Config(format!(
                "Chain {} endpoint must be an http(s) URL",
                name
            )));
        }

        chains.insert(
            name.to_string(),
            ChainConfig {
                endpoint: endpoint.to_string(),
                descriptor: descriptor.to_string(),
            },
        );
    }

    Ok(chains)
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> IdentityResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("IDENTITY_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("IDENTITY_PORT")
            .unwrap_or_else(|_| "3030".to_string())
            .parse()
            .map_err(|_| IdentityError::Config("Invalid port number".to_string()))?;

        let chains = match env::var("IDENTITY_CHAINS") {
            Ok(list) => parse_chains(&list)?,
            Err(_) => default_chains(),
        };
        let default_chain =
            env::var("IDENTITY_DEFAULT_CHAIN").unwrap_or_else(|_| "polkadot".to_string());
        let request_timeout_ms = env::var("IDENTITY_REQUEST_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| IdentityError::Config("Invalid request timeout".to_string()))?;

        let max_entries = env::var("IDENTITY_SEARCH_MAX_ENTRIES")
            .unwrap_or_else(|_| "500".to_string())
            .parse()
            .unwrap_or(500);

        let level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig { hostname, port },
            chains: ChainsConfig {
                default_chain,
                chains,
                request_timeout_ms,
            },
            cache: CacheConfig::from_env(),
            search: SearchConfig { max_entries },
            logging: LoggingConfig { level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> IdentityResult<()> {
        if self.chains.chains.is_empty() {
            return Err(IdentityError::Config("No chains configured".to_string()));
        }

        if !self.chains.chains.contains_key(&self.chains.default_chain) {
            return Err(IdentityError::Config(format!(
                "Default chain {} is not configured",
                self.chains.default_chain
            )));
        }

        if self.chains.request_timeout_ms == 0 {
            return Err(IdentityError::Config(
                "Request timeout must be positive".to_string(),
            ));
        }

        if self.search.max_entries == 0 {
            return Err(IdentityError::Config(
                "Search entry cap must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
