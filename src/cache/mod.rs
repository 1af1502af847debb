/// In-memory query cache for Identity Lens
///
/// Each query is keyed by operation, subject and chain. The cache provides:
/// - At most one in-flight fetch per key, shared by every concurrent caller
/// - Stale-while-revalidate: stale values are served while a refetch runs
/// - Retry with exponential backoff and jitter for retryable failures
/// - Invalidation by key or chain, and eviction of idle entries
///
/// Fetches run on their own spawned task, so a caller that gives up waiting
/// does not cancel the fetch. Removing an entry aborts its fetch.

use crate::{
    error::{ErrorBody, IdentityError, IdentityResult},
    metrics,
};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use rand::Rng;
use serde::{Deserialize, Serialize, Serializer};
use std::{
    collections::HashMap,
    fmt,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::{sync::Mutex, task::AbortHandle};
use tracing::{debug, error, warn};

/// Query cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// A value younger than this is served without a refetch (default: 60)
    pub stale_time_secs: u64,

    /// Entries not read for this long are evicted (default: 300 = 5 minutes)
    pub idle_timeout_secs: u64,

    /// Interval of the idle-entry sweep job (default: 60)
    pub sweep_interval_secs: u64,

    /// Retries after the first failed attempt (default: 3)
    pub retry_attempts: u32,

    /// First retry delay in milliseconds, doubled on each attempt (default: 1000)
    pub retry_base_ms: u64,

    /// Upper bound on the retry delay in milliseconds (default: 30000)
    pub retry_max_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time_secs: 60,
            idle_timeout_secs: 300,
            sweep_interval_secs: 60,
            retry_attempts: 3,
            retry_base_ms: 1000,
            retry_max_ms: 30_000,
        }
    }
}

impl CacheConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        Self {
            stale_time_secs: std::env::var("IDENTITY_CACHE_STALE_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            idle_timeout_secs: std::env::var("IDENTITY_CACHE_IDLE_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),
            sweep_interval_secs: std::env::var("IDENTITY_CACHE_SWEEP_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            retry_attempts: std::env::var("IDENTITY_RETRY_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            retry_base_ms: std::env::var("IDENTITY_RETRY_BASE_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1000),
            retry_max_ms: std::env::var("IDENTITY_RETRY_MAX_MS")
                .unwrap_or_else(|_| "30000".to_string())
                .parse()
                .unwrap_or(30_000),
        }
    }

    pub fn stale_time(&self) -> Duration {
        Duration::from_secs(self.stale_time_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        // A zero interval would make tokio's interval panic
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Delay before retry number `attempt` (zero-based), without jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        Duration::from_millis(self.retry_base_ms)
            .saturating_mul(factor)
            .min(Duration::from_millis(self.retry_max_ms))
    }

    /// Backoff plus up to 10% random jitter
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let delay = self.backoff(attempt);
        let jitter: f64 = rand::thread_rng().gen_range(0.0..=0.1);
        delay + delay.mul_f64(jitter)
    }
}

/// Kind of query held by the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryOperation {
    IdentityOf,
    Search,
}

impl QueryOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryOperation::IdentityOf => "identity_of",
            QueryOperation::Search => "search",
        }
    }
}

/// Cache key of a query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct QueryKey {
    pub operation: QueryOperation,
    pub subject: String,
    /// Resolved registry name, never an alias for the default chain
    pub chain: String,
}

impl QueryKey {
    pub fn identity_of(address: &str, chain: &str) -> Self {
        Self {
            operation: QueryOperation::IdentityOf,
            subject: address.to_string(),
            chain: chain.to_string(),
        }
    }

    /// Key for a search; the query is trimmed and lower-cased
    pub fn search(query: &str, chain: &str) -> Self {
        Self {
            operation: QueryOperation::Search,
            subject: query.trim().to_lowercase(),
            chain: chain.to_string(),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.operation.as_str(), self.chain, self.subject)
    }
}

/// Observable state of a query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum QueryState<V> {
    Pending,
    #[serde(rename_all = "camelCase")]
    Success {
        data: V,
        updated_at: DateTime<Utc>,
    },
    Error {
        #[serde(serialize_with = "serialize_error")]
        error: IdentityError,
    },
}

fn serialize_error<S: Serializer>(
    error: &IdentityError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    ErrorBody::from(error).serialize(serializer)
}

impl<V> QueryState<V> {
    pub fn is_pending(&self) -> bool {
        matches!(self, QueryState::Pending)
    }

    pub fn data(&self) -> Option<&V> {
        match self {
            QueryState::Success { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&IdentityError> {
        match self {
            QueryState::Error { error } => Some(error),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(V) -> U) -> QueryState<U> {
        match self {
            QueryState::Pending => QueryState::Pending,
            QueryState::Success { data, updated_at } => QueryState::Success {
                data: f(data),
                updated_at,
            },
            QueryState::Error { error } => QueryState::Error { error },
        }
    }
}

type FetchOutput<V> = IdentityResult<(V, DateTime<Utc>)>;
/// Resolves to `None` when the fetch was aborted by an invalidation
type SharedFetch<V> = Shared<BoxFuture<'static, Option<FetchOutput<V>>>>;

impl<V> From<Option<FetchOutput<V>>> for QueryState<V> {
    fn from(output: Option<FetchOutput<V>>) -> Self {
        match output {
            Some(Ok((data, updated_at))) => QueryState::Success { data, updated_at },
            Some(Err(error)) => QueryState::Error { error },
            None => QueryState::Pending,
        }
    }
}

struct InFlight<V> {
    shared: SharedFetch<V>,
    abort: AbortHandle,
}

enum Slot<V> {
    Empty,
    Value {
        data: V,
        updated_at: DateTime<Utc>,
        fetched_at: Instant,
    },
    Failed(IdentityError),
}

struct Entry<V> {
    slot: Slot<V>,
    in_flight: Option<InFlight<V>>,
    generation: u64,
    last_access: Instant,
}

impl<V> Entry<V> {
    fn cancel_fetch(&self) {
        if let Some(in_flight) = &self.in_flight {
            in_flight.abort.abort();
        }
    }
}

enum Lookup<V> {
    Ready(QueryState<V>),
    Wait(SharedFetch<V>),
}

struct CacheInner<V> {
    name: &'static str,
    config: CacheConfig,
    entries: Mutex<HashMap<QueryKey, Entry<V>>>,
    generations: AtomicU64,
}

/// Shared in-memory query cache
pub struct QueryCache<V> {
    inner: Arc<CacheInner<V>>,
}

impl<V> Clone for QueryCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V> QueryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a new cache; `name` labels its logs and metrics
    pub fn new(name: &'static str, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                name,
                config,
                entries: Mutex::new(HashMap::new()),
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Read a query, fetching it when there is no usable value
    ///
    /// A fresh value is returned as is. A stale value or a cached error is
    /// returned immediately while one background refetch runs. Otherwise the
    /// caller waits on the single in-flight fetch for the key.
    pub async fn get<F, Fut>(&self, key: QueryKey, fetch: F) -> QueryState<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = IdentityResult<V>> + Send + 'static,
    {
        match self.lookup(key, fetch).await {
            Lookup::Ready(state) => state,
            Lookup::Wait(shared) => shared.await.into(),
        }
    }

    /// Like `get`, but reports `Pending` instead of waiting for a fetch
    pub async fn read<F, Fut>(&self, key: QueryKey, fetch: F) -> QueryState<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = IdentityResult<V>> + Send + 'static,
    {
        match self.lookup(key, fetch).await {
            Lookup::Ready(state) => state,
            Lookup::Wait(_) => QueryState::Pending,
        }
    }

    async fn lookup<F, Fut>(&self, key: QueryKey, fetch: F) -> Lookup<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = IdentityResult<V>> + Send + 'static,
    {
        let name = self.inner.name;
        let stale_time = self.inner.config.stale_time();

        let mut entries = self.inner.entries.lock().await;
        let entry = entries.entry(key.clone()).or_insert_with(|| Entry {
            slot: Slot::Empty,
            in_flight: None,
            generation: self.inner.generations.fetch_add(1, Ordering::Relaxed),
            last_access: Instant::now(),
        });
        entry.last_access = Instant::now();

        let cached = match &entry.slot {
            Slot::Value {
                data,
                updated_at,
                fetched_at,
            } => {
                let state = QueryState::Success {
                    data: data.clone(),
                    updated_at: *updated_at,
                };
                if fetched_at.elapsed() < stale_time {
                    debug!("Cache HIT: {}", key);
                    metrics::record_cache_access(name, true);
                    return Lookup::Ready(state);
                }
                debug!("Cache STALE: {}", key);
                metrics::record_stale_serve(name);
                Some(state)
            }
            Slot::Failed(error) => {
                debug!("Cache ERROR: {}", key);
                Some(QueryState::Error {
                    error: error.clone(),
                })
            }
            Slot::Empty => None,
        };

        if let Some(state) = cached {
            if entry.in_flight.is_none() {
                entry.in_flight = Some(self.spawn_fetch(key.clone(), entry.generation, fetch));
            }
            return Lookup::Ready(state);
        }

        debug!("Cache MISS: {}", key);
        metrics::record_cache_access(name, false);

        if let Some(in_flight) = &entry.in_flight {
            Lookup::Wait(in_flight.shared.clone())
        } else {
            let in_flight = self.spawn_fetch(key.clone(), entry.generation, fetch);
            let shared = in_flight.shared.clone();
            entry.in_flight = Some(in_flight);
            metrics::set_cache_entries(name, entries.len());
            Lookup::Wait(shared)
        }
    }

    /// Start a fetch on its own task and return a handle callers can share
    fn spawn_fetch<F, Fut>(&self, key: QueryKey, generation: u64, fetch: F) -> InFlight<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = IdentityResult<V>> + Send + 'static,
    {
        let cache = self.clone();
        let task = tokio::spawn(async move {
            let result = cache
                .fetch_with_retry(&key, fetch)
                .await
                .map(|data| (data, Utc::now()));
            cache.complete(&key, generation, &result).await;
            result
        });

        let abort = task.abort_handle();

        let shared = async move {
            match task.await {
                Ok(result) => Some(result),
                Err(e) if e.is_cancelled() => None,
                Err(e) => Some(Err(IdentityError::Internal(format!(
                    "Query task failed: {}",
                    e
                )))),
            }
        }
        .boxed()
        .shared();

        InFlight { shared, abort }
    }

    async fn fetch_with_retry<F, Fut>(&self, key: &QueryKey, fetch: F) -> IdentityResult<V>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = IdentityResult<V>>,
    {
        let config = &self.inner.config;
        let mut attempt = 0;

        loop {
            match fetch().await {
                Ok(data) => return Ok(data),
                Err(e) if e.is_retryable() && attempt < config.retry_attempts => {
                    let delay = config.retry_delay(attempt);
                    warn!(
                        "Query {} failed (attempt {}/{}), retrying in {:?}: {}",
                        key,
                        attempt + 1,
                        config.retry_attempts + 1,
                        delay,
                        e
                    );
                    metrics::record_query_retry(self.inner.name);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        error!("Query {} failed after {} attempts: {}", key, attempt + 1, e);
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Store a fetch result unless the entry was invalidated meanwhile
    async fn complete(&self, key: &QueryKey, generation: u64, result: &FetchOutput<V>) {
        let mut entries = self.inner.entries.lock().await;

        let Some(entry) = entries.get_mut(key).filter(|e| e.generation == generation) else {
            debug!("Dropping result for invalidated query {}", key);
            return;
        };
        entry.in_flight = None;

        match result {
            Ok((data, updated_at)) => {
                entry.slot = Slot::Value {
                    data: data.clone(),
                    updated_at: *updated_at,
                    fetched_at: Instant::now(),
                };
            }
            Err(error) if error.is_retryable() => {
                if matches!(entry.slot, Slot::Value { .. }) {
                    warn!("Keeping last value of {} after failed refresh: {}", key, error);
                } else {
                    entry.slot = Slot::Failed(error.clone());
                }
            }
            Err(_) => {
                // Local errors are never cached
                if matches!(entry.slot, Slot::Empty) {
                    entries.remove(key);
                }
            }
        }

        metrics::set_cache_entries(self.inner.name, entries.len());
    }

    /// Current state of a query without fetching
    pub async fn peek(&self, key: &QueryKey) -> QueryState<V> {
        let entries = self.inner.entries.lock().await;

        match entries.get(key).map(|e| &e.slot) {
            Some(Slot::Value {
                data, updated_at, ..
            }) => QueryState::Success {
                data: data.clone(),
                updated_at: *updated_at,
            },
            Some(Slot::Failed(error)) => QueryState::Error {
                error: error.clone(),
            },
            Some(Slot::Empty) | None => QueryState::Pending,
        }
    }

    /// Drop a single query
    pub async fn invalidate(&self, key: &QueryKey) -> bool {
        let mut entries = self.inner.entries.lock().await;
        let removed = entries.remove(key);
        if let Some(entry) = &removed {
            entry.cancel_fetch();
        }
        metrics::set_cache_entries(self.inner.name, entries.len());
        removed.is_some()
    }

    /// Drop every query of a chain
    pub async fn invalidate_chain(&self, chain: &str) -> usize {
        self.retain(|key, _| key.chain != chain).await
    }

    /// Drop every query
    pub async fn clear(&self) -> usize {
        self.retain(|_, _| false).await
    }

    /// Drop queries not read within the idle timeout that have no fetch in flight
    pub async fn evict_idle(&self) -> usize {
        let idle_timeout = self.inner.config.idle_timeout();
        self.retain(|_, entry| {
            entry.in_flight.is_some() || entry.last_access.elapsed() < idle_timeout
        })
        .await
    }

    pub async fn len(&self) -> usize {
        self.inner.entries.lock().await.len()
    }

    async fn retain(&self, mut keep: impl FnMut(&QueryKey, &Entry<V>) -> bool) -> usize {
        let mut entries = self.inner.entries.lock().await;
        let before = entries.len();
        entries.retain(|key, entry| {
            let kept = keep(key, entry);
            if !kept {
                entry.cancel_fetch();
            }
            kept
        });
        let removed = before - entries.len();

        if removed > 0 {
            debug!("Evicted {} entries from {} cache", removed, self.inner.name);
        }
        metrics::set_cache_entries(self.inner.name, entries.len());
        removed
    }
}
