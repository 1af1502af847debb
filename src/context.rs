/// Application context and dependency injection
use crate::{
    chain::ChainRegistry,
    config::ServerConfig,
    error::IdentityResult,
    identity::{resolver::IdentityResolverConfig, IdentityQueries},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub registry: Arc<ChainRegistry>,
    pub queries: Arc<IdentityQueries>,
    pub started_at: Instant,
}

impl AppContext {
    /// Create a new application context from configuration
    pub fn new(config: ServerConfig) -> IdentityResult<Self> {
        // Validate configuration
        config.validate()?;

        let registry = ChainRegistry::from_config(&config.chains)?;
        for handle in registry.handles() {
            info!("Registered chain {} at {}", handle.name(), handle.endpoint());
        }

        Ok(Self::with_registry(config, Arc::new(registry)))
    }

    /// Build the context around an existing chain registry
    pub fn with_registry(config: ServerConfig, registry: Arc<ChainRegistry>) -> Self {
        let resolver_config = IdentityResolverConfig {
            request_timeout: config.chains.request_timeout(),
        };
        let queries = IdentityQueries::new(
            registry.clone(),
            resolver_config,
            &config.search,
            config.cache.clone(),
        );

        Self {
            config: Arc::new(config),
            registry,
            queries: Arc::new(queries),
            started_at: Instant::now(),
        }
    }

    /// Descriptor configured for a chain, if any
    pub fn descriptor(&self, chain: &str) -> Option<&str> {
        self.config
            .chains
            .chains
            .get(chain)
            .map(|c| c.descriptor.as_str())
    }

    pub fn uptime_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}

/// Context over in-memory chains; the first chain is the default
#[cfg(test)]
pub fn test_context(chains: Vec<Arc<dyn crate::chain::ChainHandle>>) -> AppContext {
    use crate::cache::CacheConfig;
    use crate::config::{ChainsConfig, LoggingConfig, SearchConfig, ServiceConfig};

    let default_chain = chains[0].name().to_string();
    let config = ServerConfig {
        service: ServiceConfig {
            hostname: "127.0.0.1".to_string(),
            port: 0,
        },
        chains: ChainsConfig {
            default_chain: default_chain.clone(),
            request_timeout_ms: 500,
            ..ChainsConfig::default()
        },
        cache: CacheConfig {
            retry_attempts: 1,
            retry_base_ms: 1,
            retry_max_ms: 5,
            ..CacheConfig::default()
        },
        search: SearchConfig::default(),
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
    };

    let registry = ChainRegistry::new(&default_chain, chains).unwrap();
    AppContext::with_registry(config, Arc::new(registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{memory::MemoryChain, ChainHandle};

    #[test]
    fn test_context_uses_registry_default() {
        let ctx = test_context(vec![
            Arc::new(MemoryChain::with_identity("people")) as Arc<dyn ChainHandle>,
        ]);
        assert_eq!(ctx.registry.default_chain(), "people");
        assert_eq!(ctx.descriptor("assetHub"), Some("dotAh"));
        assert_eq!(ctx.descriptor("people"), Some("people"));
        assert!(ctx.uptime_secs() >= 0.0);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut ctx_config = test_context(vec![
            Arc::new(MemoryChain::with_identity("people")) as Arc<dyn ChainHandle>,
        ])
        .config
        .as_ref()
        .clone();
        ctx_config.chains.default_chain = "kusama".to_string();

        assert!(AppContext::new(ctx_config).is_err());
    }
}
