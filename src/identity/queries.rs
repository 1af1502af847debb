/// Cached identity queries
///
/// Wraps the resolver and the search in query caches. Inputs are validated
/// and the chain selector is resolved to its registry name before keying, so
/// the default chain and its explicit name share one entry and malformed
/// input never reaches the cache.
use crate::{
    cache::{CacheConfig, QueryCache, QueryKey, QueryState},
    chain::ChainRegistry,
    config::SearchConfig,
    error::IdentityResult,
    identity::{
        resolver::{validate_address, IdentityResolverConfig},
        search::normalize_query,
        IdentityResolver, IdentitySearch, IdentitySearchResult, PolkadotIdentity,
    },
};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Query cache adapter for identity lookups and searches
#[derive(Clone)]
pub struct IdentityQueries {
    registry: Arc<ChainRegistry>,
    resolver: IdentityResolver,
    search: IdentitySearch,
    identities: QueryCache<Option<PolkadotIdentity>>,
    searches: QueryCache<Vec<IdentitySearchResult>>,
}

impl IdentityQueries {
    pub fn new(
        registry: Arc<ChainRegistry>,
        resolver_config: IdentityResolverConfig,
        search_config: &SearchConfig,
        cache_config: CacheConfig,
    ) -> Self {
        let resolver = IdentityResolver::new(registry.clone(), resolver_config.clone());
        let search = IdentitySearch::new(
            registry.clone(),
            search_config,
            resolver_config.request_timeout,
        );

        Self {
            registry,
            resolver,
            search,
            identities: QueryCache::new("identity_of", cache_config.clone()),
            searches: QueryCache::new("search", cache_config),
        }
    }

    fn identity_key(&self, address: &str, chain: Option<&str>) -> IdentityResult<QueryKey> {
        let address = validate_address(address)?;
        let chain = self.registry.resolve_name(chain)?;
        Ok(QueryKey::identity_of(address, &chain))
    }

    /// Cached identity of `address`
    ///
    /// Without `wait` an uncached identity reads as `Pending` while its
    /// fetch runs in the background.
    pub async fn identity_of(
        &self,
        address: &str,
        chain: Option<&str>,
        wait: bool,
    ) -> QueryState<Option<PolkadotIdentity>> {
        let key = match self.identity_key(address, chain) {
            Ok(key) => key,
            Err(error) => return QueryState::Error { error },
        };

        let resolver = self.resolver.clone();
        let address = key.subject.clone();
        let chain = key.chain.clone();

        let fetch = move || {
            let resolver = resolver.clone();
            let address = address.clone();
            let chain = chain.clone();
            async move { resolver.resolve_identity(&address, Some(&chain)).await }
        };

        if wait {
            self.identities.get(key, fetch).await
        } else {
            self.identities.read(key, fetch).await
        }
    }

    /// Cached display-name search; an empty query succeeds with no results
    pub async fn search(
        &self,
        display_name: Option<&str>,
        chain: Option<&str>,
        wait: bool,
    ) -> QueryState<Vec<IdentitySearchResult>> {
        let Some(query) = normalize_query(display_name) else {
            return QueryState::Success {
                data: Vec::new(),
                updated_at: Utc::now(),
            };
        };

        let chain = match self.registry.resolve_name(chain) {
            Ok(chain) => chain,
            Err(error) => return QueryState::Error { error },
        };
        let key = QueryKey::search(query, &chain);

        let search = self.search.clone();
        let query = key.subject.clone();

        let fetch = move || {
            let search = search.clone();
            let query = query.clone();
            let chain = chain.clone();
            async move { search.search_identities(Some(&query), Some(&chain)).await }
        };

        if wait {
            self.searches.get(key, fetch).await
        } else {
            self.searches.read(key, fetch).await
        }
    }

    /// Current state of an identity query without fetching
    pub async fn peek_identity(
        &self,
        address: &str,
        chain: Option<&str>,
    ) -> QueryState<Option<PolkadotIdentity>> {
        match self.identity_key(address, chain) {
            Ok(key) => self.identities.peek(&key).await,
            Err(error) => QueryState::Error { error },
        }
    }

    /// Drop the cached identity of one address
    pub async fn invalidate_identity(
        &self,
        address: &str,
        chain: Option<&str>,
    ) -> IdentityResult<bool> {
        let key = self.identity_key(address, chain)?;
        Ok(self.identities.invalidate(&key).await)
    }

    /// Drop every cached query of a chain
    pub async fn invalidate_chain(&self, chain: Option<&str>) -> IdentityResult<usize> {
        let chain = self.registry.resolve_name(chain)?;
        let evicted = self.identities.invalidate_chain(&chain).await
            + self.searches.invalidate_chain(&chain).await;

        info!("Invalidated {} cached queries for {}", evicted, chain);
        Ok(evicted)
    }

    /// Drop every cached query
    pub async fn clear(&self) -> usize {
        let evicted = self.identities.clear().await + self.searches.clear().await;
        info!("Cleared {} cached queries", evicted);
        evicted
    }

    /// Drop queries that have not been read within the idle timeout
    pub async fn evict_idle(&self) -> usize {
        self.identities.evict_idle().await + self.searches.evict_idle().await
    }

    pub async fn entry_count(&self) -> usize {
        self.identities.len().await + self.searches.len().await
    }
}
