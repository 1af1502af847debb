/// Chain registry - symbolic chain names to live chain handles
use crate::{
    chain::{ChainHandle, GatewayChainHandle},
    config::ChainsConfig,
    error::{IdentityError, IdentityResult},
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Registry of configured chains
///
/// Holds exactly one handle per chain; handles are shared read-only by every
/// resolver and search call.
#[derive(Clone)]
pub struct ChainRegistry {
    chains: BTreeMap<String, Arc<dyn ChainHandle>>,
    default_chain: String,
}

impl ChainRegistry {
    /// Build a registry from already constructed handles
    pub fn new(default_chain: &str, handles: Vec<Arc<dyn ChainHandle>>) -> IdentityResult<Self> {
        let chains: BTreeMap<String, Arc<dyn ChainHandle>> = handles
            .into_iter()
            .map(|handle| (handle.name().to_string(), handle))
            .collect();

        if !chains.contains_key(default_chain) {
            return Err(IdentityError::Config(format!(
                "Default chain {} is not registered",
                default_chain
            )));
        }

        Ok(Self {
            chains,
            default_chain: default_chain.to_string(),
        })
    }

    /// Build gateway handles for every configured chain
    pub fn from_config(config: &ChainsConfig) -> IdentityResult<Self> {
        let mut handles: Vec<Arc<dyn ChainHandle>> = Vec::with_capacity(config.chains.len());

        for (name, chain) in &config.chains {
            info!("Registering chain {} at {}", name, chain.endpoint);
            let handle = GatewayChainHandle::new(name, chain, config.request_timeout())?;
            handles.push(Arc::new(handle));
        }

        Self::new(&config.default_chain, handles)
    }

    pub fn default_chain(&self) -> &str {
        &self.default_chain
    }

    /// Canonical registry name for an optional chain selector
    pub fn resolve_name(&self, chain: Option<&str>) -> IdentityResult<String> {
        match chain.map(str::trim).filter(|c| !c.is_empty()) {
            None => Ok(self.default_chain.clone()),
            Some(name) if self.chains.contains_key(name) => Ok(name.to_string()),
            Some(name) => Err(IdentityError::UnknownChain(name.to_string())),
        }
    }

    /// Handle for an optional chain selector (default chain when omitted)
    pub fn resolve(&self, chain: Option<&str>) -> IdentityResult<Arc<dyn ChainHandle>> {
        let name = self.resolve_name(chain)?;
        self.chains
            .get(&name)
            .cloned()
            .ok_or(IdentityError::UnknownChain(name))
    }

    pub fn handles(&self) -> impl Iterator<Item = &Arc<dyn ChainHandle>> {
        self.chains.values()
    }
}
