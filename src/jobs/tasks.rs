/// Background task implementations
use crate::{chain, context::AppContext, identity::supports_identity, metrics};
use serde::Serialize;
use std::time::Instant;

/// Outcome of probing one chain for the identity pallet
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStatus {
    pub name: String,
    pub endpoint: String,
    /// `None` when the chain could not be probed
    pub supports_identity: Option<bool>,
    pub pallets: Vec<String>,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Evict idle queries and refresh the uptime gauge
pub async fn sweep_idle_queries(ctx: &AppContext) -> usize {
    metrics::set_uptime(ctx.uptime_secs());
    ctx.queries.evict_idle().await
}

/// Probe every registered chain for identity support
pub async fn probe_chains(ctx: &AppContext) -> Vec<ChainStatus> {
    let timeout = ctx.config.chains.request_timeout();
    let mut statuses = Vec::new();

    for handle in ctx.registry.handles() {
        let start = Instant::now();
        let result = chain::timed(handle.name(), "probe", timeout, handle.query_surface()).await;
        let response_time_ms = start.elapsed().as_millis() as u64;

        let (supports_identity, pallets, error) = match result {
            Ok(surface) => (
                Some(supports_identity(&surface)),
                surface.pallet_names(),
                None,
            ),
            Err(e) => (None, Vec::new(), Some(e.to_string())),
        };

        statuses.push(ChainStatus {
            name: handle.name().to_string(),
            endpoint: handle.endpoint().to_string(),
            supports_identity,
            pallets,
            response_time_ms,
            error,
        });
    }

    statuses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{memory::MemoryChain, ChainHandle};
    use crate::context::test_context;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_probe_chains_reports_each_chain() {
        let ctx = test_context(vec![
            Arc::new(MemoryChain::with_identity("people")) as Arc<dyn ChainHandle>,
            Arc::new(MemoryChain::without_identity("polkadot")) as Arc<dyn ChainHandle>,
        ]);

        let statuses = probe_chains(&ctx).await;
        assert_eq!(statuses.len(), 2);

        // Registry order is by name
        assert_eq!(statuses[0].name, "people");
        assert_eq!(statuses[0].supports_identity, Some(true));
        assert_eq!(statuses[0].pallets, vec!["Identity", "System"]);
        assert_eq!(statuses[1].name, "polkadot");
        assert_eq!(statuses[1].supports_identity, Some(false));
        assert!(statuses.iter().all(|s| s.error.is_none()));
    }

    #[tokio::test]
    async fn test_sweep_keeps_recent_queries() {
        let chain = MemoryChain::with_identity("people").insert_display("alice", "Alice");
        let ctx = test_context(vec![Arc::new(chain) as Arc<dyn ChainHandle>]);

        ctx.queries.identity_of("alice", None, true).await;
        assert_eq!(sweep_idle_queries(&ctx).await, 0);
        assert_eq!(ctx.queries.entry_count().await, 1);
    }
}
