/// Identity search by display name
///
/// Enumerates the identity registrations of a chain (bounded by a fixed
/// entry cap), decodes their display names and ranks the ones containing
/// the query: exact matches first, then prefix matches, then any other
/// substring match. Ties are ordered by address so results are stable.
use crate::{
    chain::{self, ChainRegistry},
    config::SearchConfig,
    error::{IdentityError, IdentityResult},
    identity::{
        capability::probe, registration::display_name_of, IdentitySearchResult, MatchRank,
    },
    metrics,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Trimmed query, or `None` when there is nothing to search for
pub fn normalize_query(display_name: Option<&str>) -> Option<&str> {
    display_name.map(str::trim).filter(|q| !q.is_empty())
}

/// Classify how `name` matches the lower-cased `query`
fn match_name(query_lower: &str, name: &str) -> Option<(MatchRank, usize)> {
    let name_lower = name.to_lowercase();

    if name_lower == query_lower {
        return Some((MatchRank::Exact, 0));
    }
    if name_lower.starts_with(query_lower) {
        return Some((MatchRank::Prefix, 0));
    }
    name_lower
        .find(query_lower)
        .map(|byte_idx| (MatchRank::Substring, name_lower[..byte_idx].chars().count()))
}

/// Filter and order `(address, display name)` pairs for a query
pub fn rank_matches<I>(query: &str, candidates: I) -> Vec<IdentitySearchResult>
where
    I: IntoIterator<Item = (String, String)>,
{
    let query_lower = query.to_lowercase();

    let mut results: Vec<IdentitySearchResult> = candidates
        .into_iter()
        .filter_map(|(address, display_name)| {
            match_name(&query_lower, &display_name).map(|(rank, position)| IdentitySearchResult {
                address,
                display_name,
                rank,
                position,
            })
        })
        .collect();

    results.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.address.cmp(&b.address)));
    results
}

/// Display-name search over registered chains
#[derive(Clone)]
pub struct IdentitySearch {
    registry: Arc<ChainRegistry>,
    request_timeout: Duration,
    max_entries: usize,
}

impl IdentitySearch {
    /// Create a new identity search
    pub fn new(
        registry: Arc<ChainRegistry>,
        config: &SearchConfig,
        request_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            request_timeout,
            max_entries: config.max_entries,
        }
    }

    /// Search identities whose display name contains `display_name`
    ///
    /// An empty query returns no results without touching any chain. A chain
    /// without the identity pallet also yields an empty list.
    pub async fn search_identities(
        &self,
        display_name: Option<&str>,
        chain: Option<&str>,
    ) -> IdentityResult<Vec<IdentitySearchResult>> {
        let Some(query) = normalize_query(display_name) else {
            return Ok(Vec::new());
        };

        let handle = self.registry.resolve(chain)?;
        let chain_name = handle.name().to_string();

        debug!("Identity search: query='{}', chain={}", query, chain_name);

        let capability = chain::timed(&chain_name, "probe", self.request_timeout, probe(&handle))
            .await
            .map_err(IdentityError::search)?;

        let Some(capability) = capability else {
            return Ok(Vec::new());
        };

        let entries = chain::timed(
            &chain_name,
            "identity_entries",
            self.request_timeout,
            capability.get_entries(self.max_entries),
        )
        .await
        .map_err(IdentityError::search)?;

        let mut candidates = Vec::with_capacity(entries.len());
        for entry in entries.into_iter().take(self.max_entries) {
            match display_name_of(&entry.value) {
                Ok(Some(name)) => candidates.push((entry.key, name)),
                Ok(None) => {}
                Err(e) => {
                    // One bad record must not hide every other result
                    warn!("Skipping identity {} on {}: {}", entry.key, capability.chain(), e);
                    metrics::record_decode_skip(capability.chain());
                }
            }
        }

        let results = rank_matches(query, candidates);
        debug!(
            "Identity search returned {} matches on {}",
            results.len(),
            capability.chain()
        );

        Ok(results)
    }
}
