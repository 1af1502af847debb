/// Chain capability probing for the identity pallet
///
/// Whether a chain can answer identity queries is only known once its
/// runtime metadata has been fetched. Probing turns an opaque chain handle
/// into a typed `ChainIdentityCapability`, or into nothing at all when the
/// runtime lacks the pallet. A missing pallet is a normal outcome, never an
/// error.
use crate::chain::{ChainHandle, ChainResult, QuerySurface, StorageEntry, StorageMethod};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub const IDENTITY_PALLET: &str = "Identity";
pub const IDENTITY_OF: &str = "IdentityOf";

/// Identity queries a chain is able to answer
#[async_trait]
pub trait ChainIdentityCapability: Send + Sync {
    /// Registry name of the chain being queried
    fn chain(&self) -> &str;

    /// Stored registration for one address
    async fn get_by_address(&self, address: &str) -> ChainResult<Option<Value>>;

    /// Up to `limit` stored registrations keyed by address
    async fn get_entries(&self, limit: usize) -> ChainResult<Vec<StorageEntry>>;
}

/// `Identity.IdentityOf` queries over a chain handle
pub struct IdentityOfQuery {
    handle: Arc<dyn ChainHandle>,
}

#[async_trait]
impl ChainIdentityCapability for IdentityOfQuery {
    fn chain(&self) -> &str {
        self.handle.name()
    }

    async fn get_by_address(&self, address: &str) -> ChainResult<Option<Value>> {
        self.handle
            .storage_value(IDENTITY_PALLET, IDENTITY_OF, address)
            .await
    }

    async fn get_entries(&self, limit: usize) -> ChainResult<Vec<StorageEntry>> {
        self.handle
            .storage_entries(IDENTITY_PALLET, IDENTITY_OF, limit)
            .await
    }
}

/// True iff the surface offers `Identity.IdentityOf` lookups and enumeration
pub fn supports_identity(surface: &QuerySurface) -> bool {
    surface
        .item(IDENTITY_PALLET, IDENTITY_OF)
        .map(|item| item.supports(StorageMethod::Get) && item.supports(StorageMethod::Entries))
        .unwrap_or(false)
}

/// Build the identity capability for a handle, if its runtime has one
///
/// Fails only when the surface itself cannot be fetched.
pub async fn probe(
    handle: &Arc<dyn ChainHandle>,
) -> ChainResult<Option<Arc<dyn ChainIdentityCapability>>> {
    let surface = handle.query_surface().await?;

    if !supports_identity(&surface) {
        debug!("Chain {} has no identity query surface", handle.name());
        return Ok(None);
    }

    Ok(Some(Arc::new(IdentityOfQuery {
        handle: Arc::clone(handle),
    })))
}
