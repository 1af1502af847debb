/// In-memory chain handle for tests
use crate::chain::{
    ChainError, ChainHandle, ChainResult, QuerySurface, StorageEntry, StorageMethod,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Fake chain with a fixed surface and a map of `IdentityOf` values
pub struct MemoryChain {
    name: String,
    surface: Arc<QuerySurface>,
    identities: Mutex<BTreeMap<String, Value>>,
    pending_failures: AtomicUsize,
    always_fail: bool,
    delay: Option<Duration>,
    surface_calls: AtomicUsize,
    lookup_calls: AtomicUsize,
    entries_calls: AtomicUsize,
}

impl MemoryChain {
    /// Chain whose runtime includes the identity pallet
    pub fn with_identity(name: &str) -> Self {
        let surface = QuerySurface::new()
            .with_item(
                "Identity",
                "IdentityOf",
                &[StorageMethod::Get, StorageMethod::Entries],
            )
            .with_item("System", "Account", &[StorageMethod::Get, StorageMethod::Entries]);
        Self::with_surface(name, surface)
    }

    /// Chain whose runtime has no identity pallet
    pub fn without_identity(name: &str) -> Self {
        let surface = QuerySurface::new().with_item(
            "System",
            "Account",
            &[StorageMethod::Get, StorageMethod::Entries],
        );
        Self::with_surface(name, surface)
    }

    pub fn with_surface(name: &str, surface: QuerySurface) -> Self {
        Self {
            name: name.to_string(),
            surface: Arc::new(surface),
            identities: Mutex::new(BTreeMap::new()),
            pending_failures: AtomicUsize::new(0),
            always_fail: false,
            delay: None,
            surface_calls: AtomicUsize::new(0),
            lookup_calls: AtomicUsize::new(0),
            entries_calls: AtomicUsize::new(0),
        }
    }

    /// Store a raw registration value under an address
    pub fn insert(self, address: &str, value: Value) -> Self {
        self.identities
            .lock()
            .unwrap()
            .insert(address.to_string(), value);
        self
    }

    /// Store a registration carrying only a raw display name
    pub fn insert_display(self, address: &str, display: &str) -> Self {
        self.insert(
            address,
            json!({
                "judgements": [],
                "deposit": "0",
                "info": {"display": {"raw": display}}
            }),
        )
    }

    /// Fail the next `n` lookups or enumerations with a connection reset
    pub fn fail_next(self, n: usize) -> Self {
        self.pending_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn fail_always(mut self) -> Self {
        self.always_fail = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn surface_calls(&self) -> usize {
        self.surface_calls.load(Ordering::SeqCst)
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    pub fn entries_calls(&self) -> usize {
        self.entries_calls.load(Ordering::SeqCst)
    }

    /// Every transport call, surface fetches included
    pub fn transport_calls(&self) -> usize {
        self.surface_calls() + self.lookup_calls() + self.entries_calls()
    }

    async fn simulate_transport(&self) -> ChainResult<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.always_fail {
            return Err(ChainError::Transport("connection reset by peer".to_string()));
        }
        let consumed = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if consumed.is_ok() {
            return Err(ChainError::Transport("connection reset by peer".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainHandle for MemoryChain {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> &str {
        "memory://"
    }

    async fn query_surface(&self) -> ChainResult<Arc<QuerySurface>> {
        self.surface_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.surface.clone())
    }

    async fn storage_value(
        &self,
        _pallet: &str,
        _item: &str,
        key: &str,
    ) -> ChainResult<Option<Value>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_transport().await?;
        Ok(self.identities.lock().unwrap().get(key).cloned())
    }

    async fn storage_entries(
        &self,
        _pallet: &str,
        _item: &str,
        limit: usize,
    ) -> ChainResult<Vec<StorageEntry>> {
        self.entries_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_transport().await?;
        Ok(self
            .identities
            .lock()
            .unwrap()
            .iter()
            .take(limit)
            .map(|(key, value)| StorageEntry {
                key: key.clone(),
                value: value.clone(),
            })
            .collect())
    }
}
