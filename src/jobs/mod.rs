use std::sync::Arc;
use tokio::time::interval;
use tracing::{info, warn};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::idle_query_sweep_job(Arc::clone(&self)));
        tokio::spawn(Self::chain_warmup_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Evict idle cached queries (runs every IDENTITY_CACHE_SWEEP_SECS)
    async fn idle_query_sweep_job(scheduler: Arc<Self>) {
        let mut interval = interval(scheduler.context.config.cache.sweep_interval());

        loop {
            interval.tick().await;

            let evicted = tasks::sweep_idle_queries(&scheduler.context).await;
            if evicted > 0 {
                info!("Evicted {} idle cached queries", evicted);
            }
        }
    }

    /// Probe every chain once so the first request finds the surface cached
    async fn chain_warmup_job(scheduler: Arc<Self>) {
        info!("Warming up chain query surfaces");

        let statuses = tasks::probe_chains(&scheduler.context).await;
        for status in &statuses {
            match (&status.error, status.supports_identity) {
                (Some(e), _) => warn!("Chain {} warm-up failed: {}", status.name, e),
                (None, Some(true)) => info!("Chain {} supports identities", status.name),
                (None, _) => info!("Chain {} has no identity pallet", status.name),
            }
        }
    }
}
