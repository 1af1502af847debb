/// Chain handles and their runtime query surfaces
///
/// A chain handle is a live connection to one chain endpoint. Different
/// runtimes publish different pallets, so what a handle can be asked is only
/// known once its metadata has been fetched: the `QuerySurface`.

pub mod gateway;
pub mod registry;

#[cfg(test)]
pub mod memory;

pub use gateway::GatewayChainHandle;
pub use registry::ChainRegistry;

use crate::metrics;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Transport-level chain failures
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Gateway returned status {0}")]
    Status(u16),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

pub type ChainResult<T> = Result<T, ChainError>;

/// Ways a storage item can be queried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageMethod {
    /// Single-key lookup
    Get,
    /// Enumeration of all keys and values
    Entries,
}

/// One storage item exposed by a pallet
#[derive(Debug, Clone, Serialize)]
pub struct StorageItem {
    pub name: String,
    pub methods: Vec<StorageMethod>,
}

impl StorageItem {
    pub fn supports(&self, method: StorageMethod) -> bool {
        self.methods.contains(&method)
    }
}

/// Storage items of a single pallet, keyed by lower-cased item name
#[derive(Debug, Clone, Default)]
pub struct PalletSurface {
    pub name: String,
    items: HashMap<String, StorageItem>,
}

impl PalletSurface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: HashMap::new(),
        }
    }

    pub fn insert(&mut self, item: StorageItem) {
        self.items.insert(item.name.to_lowercase(), item);
    }

    pub fn item(&self, name: &str) -> Option<&StorageItem> {
        self.items.get(&name.to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Query surface published by a chain's runtime metadata
///
/// Pallet and item lookups are case-insensitive: gateways report pallet ids
/// in camelCase (`identity`) while metadata uses PascalCase (`Identity`).
#[derive(Debug, Clone, Default)]
pub struct QuerySurface {
    pallets: HashMap<String, PalletSurface>,
}

impl QuerySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder helper used when assembling a surface by hand
    #[cfg(test)]
    pub fn with_item(mut self, pallet: &str, item: &str, methods: &[StorageMethod]) -> Self {
        self.pallets
            .entry(pallet.to_lowercase())
            .or_insert_with(|| PalletSurface::new(pallet))
            .insert(StorageItem {
                name: item.to_string(),
                methods: methods.to_vec(),
            });
        self
    }

    pub fn insert_pallet(&mut self, pallet: PalletSurface) {
        if pallet.is_empty() {
            return;
        }
        self.pallets.insert(pallet.name.to_lowercase(), pallet);
    }

    pub fn pallet(&self, name: &str) -> Option<&PalletSurface> {
        self.pallets.get(&name.to_lowercase())
    }

    pub fn item(&self, pallet: &str, item: &str) -> Option<&StorageItem> {
        self.pallet(pallet).and_then(|p| p.item(item))
    }

    pub fn pallet_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pallets.values().map(|p| p.name.clone()).collect();
        names.sort();
        names
    }
}

/// One key/value pair from a storage enumeration
#[derive(Debug, Clone, PartialEq)]
pub struct StorageEntry {
    pub key: String,
    pub value: Value,
}

/// Live connection to a single chain endpoint
///
/// Handles are owned by the registry and borrowed per query. Implementations
/// must not hold any per-caller state.
#[async_trait]
pub trait ChainHandle: Send + Sync {
    /// Registry name of the chain (e.g. `people`)
    fn name(&self) -> &str;

    /// Endpoint this handle talks to
    fn endpoint(&self) -> &str;

    /// Query surface of the connected runtime; may fetch metadata on first use
    async fn query_surface(&self) -> ChainResult<Arc<QuerySurface>>;

    /// Single-key storage lookup; `None` when nothing is stored at the key
    async fn storage_value(&self, pallet: &str, item: &str, key: &str)
        -> ChainResult<Option<Value>>;

    /// Enumerate at most `limit` entries of a storage map
    async fn storage_entries(
        &self,
        pallet: &str,
        item: &str,
        limit: usize,
    ) -> ChainResult<Vec<StorageEntry>>;
}

/// Run a chain call under a deadline, recording its outcome
pub async fn timed<T, F>(chain: &str, operation: &str, timeout: Duration, call: F) -> ChainResult<T>
where
    F: Future<Output = ChainResult<T>>,
{
    let started = Instant::now();
    let result = match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ChainError::Timeout(timeout)),
    };

    let status = match &result {
        Ok(_) => "ok",
        Err(ChainError::Timeout(_)) => "timeout",
        Err(_) => "error",
    };
    metrics::record_chain_request(chain, operation, status, started.elapsed().as_secs_f64());

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_lookup_is_case_insensitive() {
        let surface = QuerySurface::new().with_item(
            "Identity",
            "IdentityOf",
            &[StorageMethod::Get, StorageMethod::Entries],
        );

        let item = surface.item("identity", "identityOf").unwrap();
        assert!(item.supports(StorageMethod::Get));
        assert!(item.supports(StorageMethod::Entries));
        assert!(surface.item("Identity", "SuperOf").is_none());
        assert!(surface.item("Balances", "Account").is_none());
    }

    #[test]
    fn test_empty_pallet_is_not_inserted() {
        let mut surface = QuerySurface::new();
        surface.insert_pallet(PalletSurface::new("Identity"));
        assert!(surface.pallet("Identity").is_none());
        assert!(surface.pallet_names().is_empty());
    }

    #[tokio::test]
    async fn test_timed_reports_timeout() {
        let result: ChainResult<()> = timed("polkadot", "test", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(ChainError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_timed_passes_through_result() {
        let result = timed("polkadot", "test", Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
