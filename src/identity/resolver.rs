/// Identity Resolver - resolves the on-chain identity of a single address
use crate::{
    chain::{self, ChainRegistry},
    error::{IdentityError, IdentityResult},
    identity::{capability::probe, registration::decode_registration, PolkadotIdentity},
    metrics,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Longest address accepted before any network call
const MAX_ADDRESS_LEN: usize = 128;

/// Identity resolution configuration
#[derive(Debug, Clone)]
pub struct IdentityResolverConfig {
    /// Deadline for each chain call
    pub request_timeout: Duration,
}

impl Default for IdentityResolverConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Reject malformed addresses; returns the trimmed address
pub fn validate_address(address: &str) -> IdentityResult<&str> {
    let trimmed = address.trim();

    if trimmed.is_empty() {
        return Err(IdentityError::InvalidInput(
            "Address cannot be empty".to_string(),
        ));
    }

    if trimmed.len() > MAX_ADDRESS_LEN {
        return Err(IdentityError::InvalidInput(format!(
            "Address too long (max {} characters)",
            MAX_ADDRESS_LEN
        )));
    }

    if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(IdentityError::InvalidInput(
            "Address contains invalid characters".to_string(),
        ));
    }

    Ok(trimmed)
}

/// Resolves addresses to identities on registered chains
#[derive(Clone)]
pub struct IdentityResolver {
    registry: Arc<ChainRegistry>,
    config: IdentityResolverConfig,
}

impl IdentityResolver {
    /// Create a new identity resolver
    pub fn new(registry: Arc<ChainRegistry>, config: IdentityResolverConfig) -> Self {
        Self { registry, config }
    }

    /// Resolve the identity registered for `address`
    ///
    /// Resolution order:
    /// 1. Validate the address locally
    /// 2. Pick the chain (default chain when omitted)
    /// 3. Probe the chain for the identity pallet
    /// 4. Look up and decode the registration
    ///
    /// `Ok(None)` covers both "chain has no identity pallet" and "nothing
    /// registered"; errors mean the chain could not be checked.
    pub async fn resolve_identity(
        &self,
        address: &str,
        chain: Option<&str>,
    ) -> IdentityResult<Option<PolkadotIdentity>> {
        let address = validate_address(address)?;
        let handle = self.registry.resolve(chain)?;
        let chain_name = handle.name().to_string();
        let timeout = self.config.request_timeout;

        let capability = chain::timed(&chain_name, "probe", timeout, probe(&handle))
            .await
            .map_err(|e| {
                metrics::record_identity_resolution(&chain_name, "error");
                IdentityError::resolution(e)
            })?;

        let Some(capability) = capability else {
            metrics::record_identity_resolution(&chain_name, "unsupported");
            return Ok(None);
        };

        let raw = chain::timed(
            &chain_name,
            "identity_of",
            timeout,
            capability.get_by_address(address),
        )
        .await
        .map_err(|e| {
            metrics::record_identity_resolution(&chain_name, "error");
            IdentityError::resolution(e)
        })?;

        let Some(raw) = raw else {
            debug!("No identity for {} on {}", address, capability.chain());
            metrics::record_identity_resolution(&chain_name, "absent");
            return Ok(None);
        };

        let identity = decode_registration(address, &raw).map_err(|e| {
            metrics::record_identity_resolution(&chain_name, "error");
            IdentityError::from(e)
        })?;

        metrics::record_identity_resolution(&chain_name, "found");
        Ok(Some(identity))
    }
}
