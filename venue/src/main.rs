//! Venue option sweeper.
//!
//! Runs the option expiry sweep once at start-up and then on a fixed
//! interval until interrupted. Uses the in-memory repository seeded with a
//! demo show.

use chrono::Duration;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use venue_ops::{
    config::VenueConfig,
    metrics::register_venue_metrics,
    notify::TracingNotifier,
    InMemoryVenueRepository, Money, VenueService,
};
use venue_ops_core::environment::{Clock, SystemClock};
use venue_ops_runtime::metrics::MetricsServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(error) = dotenvy::dotenv() {
        // A missing .env file is the normal case
        if !error.not_found() {
            eprintln!("Failed to load .env: {error}");
        }
    }

    let config = VenueConfig::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("venue_ops={},venue_ops_runtime={}", config.log_level, config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        option_window_days = config.option_window_days,
        sweep_interval_secs = config.sweep_interval_secs,
        metrics_addr = ?config.metrics_addr,
        "Starting venue sweeper"
    );

    let mut metrics_server = config.metrics_addr.map(MetricsServer::new);
    if let Some(server) = metrics_server.as_mut() {
        server.start(register_venue_metrics)?;
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let repository = Arc::new(InMemoryVenueRepository::new());
    let service = VenueService::from_config(repository, Arc::clone(&clock), Arc::new(TracingNotifier), &config);

    seed_demo_show(&service, clock.as_ref()).await?;

    // Sweep once when the session starts
    let report = service.start_session().await?;
    info!(cancelled = report.cancelled_count, "Start-up sweep complete");

    let mut ticker = tokio::time::interval(config.sweep_interval());
    ticker.tick().await;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match service.start_session().await {
                    Ok(report) if !report.failures.is_empty() => {
                        warn!(failed = report.failures.len(), "Sweep finished with failures");
                    },
                    Ok(_) => {},
                    Err(error) => warn!(%error, "Sweep could not list pending options"),
                }
            },
            () = &mut shutdown => break,
        }
    }

    info!("Venue sweeper stopped");
    Ok(())
}

/// One show with an option lapsing a second after start-up, a live
/// option and a waiting party.
async fn seed_demo_show(service: &VenueService, clock: &dyn Clock) -> venue_ops::Result<()> {
    let now = clock.now();
    let show = service
        .create_event("The Mousetrap Dinner", now + Duration::days(21), 40)
        .await?;

    let lapsed = service
        .submit_request(show.id, "Colonel Mustard", 6, Money::from_units(390))
        .await?;
    service
        .grant_option(lapsed.id, Some(now + Duration::seconds(1)))
        .await?;

    let live = service
        .submit_request(show.id, "Mrs Peacock", 4, Money::from_units(260))
        .await?;
    service.grant_option(live.id, None).await?;

    service.join_waitlist(show.id, "Professor Plum", 5).await?;

    info!(event_id = %show.id, "Seeded demo show");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            warn!(%error, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(error) => {
                warn!(%error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal, shutting down..."),
        () = terminate => info!("Received SIGTERM signal, shutting down..."),
    }
}
