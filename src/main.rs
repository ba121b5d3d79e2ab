//! Bridge Sentinel - transfer-root challenge watcher node
//!
//! Off-chain watcher for the cross-chain bridge's two-phase settlement
//! protocol. Transfers batch into a transfer root on the source chain, a
//! bonder fronts the payout on the destination chain, and the root is
//! eventually confirmed on the root chain. The watcher's job:
//!
//! 1. Poll the local store for bonded, unresolved transfer roots
//! 2. Reconcile each against live root-chain state (confirmed? already
//!    challenged? window lapsed?)
//! 3. Challenge any bond still disputable inside its challenge period
//!
//! Each operator runs its own independent instance; there is no
//! inter-operator coordination. Races are resolved by re-reading on-chain
//! bond state before acting and by the chain rejecting duplicate challenges.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use sentinel::bridge::EvmBridge;
use sentinel::challenge::ChallengeWatcher;
use sentinel::clock::SystemClock;
use sentinel::config::Config;
use sentinel::metrics::Metrics;
use sentinel::notifier::Notifier;
use sentinel::server::{self, WatcherStats};
use sentinel::store::{pg, PgStore};
use sentinel::watcher::{ControlFlags, SiblingRegistry, Watcher, WatcherSet};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();

    info!("Starting Bridge Sentinel");

    let config = Config::load()?;
    info!(
        watcher_id = %config.watcher_id,
        l1_chain_id = config.l1_chain_id,
        token = %config.token_symbol,
        dry_mode = config.dry_mode,
        "Configuration loaded"
    );

    let pool = pg::create_pool(&config.database_url).await?;
    info!("Database connected");

    pg::run_migrations(&pool).await?;
    info!("Database migrations complete");

    let store = Arc::new(PgStore::new(pool));
    let bridge = Arc::new(EvmBridge::new(
        &config.l1_rpc_url,
        &config.l1_bridge_address,
        config.l1_private_key.as_deref(),
        &config.token_symbol,
        config.token_decimals,
    )?);

    let controls = Arc::new(ControlFlags::new(config.dry_mode));
    let notifier = Arc::new(Notifier::new(
        "ChallengeWatcher",
        config.notifier_webhook_url.clone(),
    ));
    let metrics = Arc::new(Metrics::new());
    let siblings = Arc::new(SiblingRegistry::new());

    let stats = Arc::new(tokio::sync::RwLock::new(WatcherStats {
        watcher_id: config.watcher_id.clone(),
        ..Default::default()
    }));

    let handler = Arc::new(ChallengeWatcher::new(
        "ChallengeWatcher",
        bridge,
        store,
        notifier,
        Arc::new(SystemClock),
        controls.clone(),
        siblings.clone(),
        metrics.clone(),
    ));

    let watcher = Arc::new(Watcher::new(
        "ChallengeWatcher",
        &config.l1_chain_slug,
        config.l1_chain_id,
        &config.token_symbol,
        true,
        Duration::from_millis(config.poll_interval_ms),
        handler,
        stats.clone(),
    ));

    // Populate the sibling registry once all watchers for this bridge are
    // constructed; entries are weak, the registry owns no lifecycle
    siblings.register(&watcher);

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);

    // Handle signals
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = shutdown_tx.send(()).await;
    });

    // SIGUSR1 toggles the operator pause kill-switch at runtime
    #[cfg(unix)]
    {
        let controls = controls.clone();
        tokio::spawn(async move {
            let Ok(mut sigusr1) =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::user_defined1())
            else {
                return;
            };
            while sigusr1.recv().await.is_some() {
                let paused = controls.toggle_paused();
                info!(paused, "Pause mode toggled via SIGUSR1");
            }
        });
    }

    // Start health/metrics server
    let server_stats = stats.clone();
    let server_metrics = metrics.clone();
    let health_port = config.health_port;
    tokio::spawn(async move {
        if let Err(e) = server::start_server("0.0.0.0", health_port, server_stats, server_metrics).await
        {
            tracing::error!(error = %e, "Health server error");
        }
    });

    // Run the watchers
    WatcherSet::new(vec![watcher]).run(shutdown_rx).await?;

    info!("Bridge Sentinel stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bridge_sentinel=debug,sentinel=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
