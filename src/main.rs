/// Identity Lens - on-chain identity resolution and search
///
/// Resolves Polkadot-family identities for single addresses and searches
/// them by display name, on any registered chain whose runtime includes the
/// identity pallet, behind a de-duplicating stale-while-revalidate cache.

mod api;
mod cache;
mod chain;
mod config;
mod context;
mod error;
mod identity;
mod jobs;
mod metrics;
mod server;

use config::ServerConfig;
use context::AppContext;
use error::IdentityResult;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> IdentityResult<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "identity_lens=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Print banner
    print_banner();

    // Load configuration
    let config = ServerConfig::from_env()?;

    // Create application context
    let ctx = Arc::new(AppContext::new(config)?);

    // Start background jobs
    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    // Start server
    server::serve((*ctx).clone()).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
    ____    __           __  _ __           __
   /  _/___/ /__  ____  / /_(_) /___  __   / /   ___  ____  _____
   / // __  / _ \/ __ \/ __/ / __/ / / /  / /   / _ \/ __ \/ ___/
 _/ // /_/ /  __/ / / / /_/ / /_/ /_/ /  / /___/  __/ / / (__  )
/___/\__,_/\___/_/ /_/\__/_/\__/\__, /  /_____/\___/_/ /_/____/
                               /____/
        On-chain identity resolution v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
