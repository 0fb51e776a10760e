//! FAIRLINE: Fair-Odds / Expected-Value Engine
//!
//! Entry point. Loads configuration, initialises structured logging, wires
//! the odds source into the engine, and runs the periodic refresh loop
//! with graceful shutdown. The dashboard API serves the latest dataset.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use fairline::config::{self, SourceKind};
use fairline::dashboard::{self, DashboardState, RefreshLogEntry};
use fairline::engine::OddsEngine;
use fairline::sources::http::HttpOddsSource;
use fairline::sources::mock::MockOddsSource;
use fairline::sources::OddsSource;
use fairline::strategy::Pricer;

const BANNER: &str = r#"
 ___ _   ___ ___ _    ___ _  _ ___
| __/_\ |_ _| _ \ |  |_ _| \| | __|
| _/ _ \ | ||   / |__ | || .` | _|
|_/_/ \_\___|_|_\____|___|_|\_|___|

  Sharp-consensus fair odds and per-book EV
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("FAIRLINE_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = config::AppConfig::load(&config_path)?;

    init_logging();

    println!("{BANNER}");
    info!(
        config = %config_path,
        source = ?cfg.source.kind,
        page_size = cfg.engine.page_size,
        max_in_flight = cfg.engine.max_in_flight,
        stake = %cfg.engine.stake,
        "FAIRLINE starting up"
    );

    // -- Initialise components -------------------------------------------

    let source = build_source(&cfg)?;
    let pricer = Pricer::from_parts(cfg.book_classifier(), cfg.fee_schedule(), cfg.stake());
    let engine = Arc::new(OddsEngine::new(source, pricer, cfg.engine_settings()));
    let dashboard_state = Arc::new(DashboardState::new(Arc::clone(&engine)));

    if cfg.dashboard.enabled {
        dashboard::spawn_dashboard(Arc::clone(&dashboard_state), cfg.dashboard.port).await?;
    }

    // -- Main loop -------------------------------------------------------

    let refresh_interval = Duration::from_secs(cfg.engine.refresh_interval_secs.max(1));
    let mut interval = tokio::time::interval(refresh_interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = refresh_interval.as_secs(),
        "Entering refresh loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                // a slow first page must not hold up Ctrl+C
                tokio::select! {
                    _ = run_refresh(&engine, &dashboard_state) => {}
                    _ = &mut shutdown => {
                        info!("Shutdown signal received during refresh.");
                        break;
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    engine.cancel();
    let status = engine.status().await;
    info!(
        loaded = status.loaded,
        generation = status.generation,
        evs = status.ev_computations,
        "FAIRLINE shut down cleanly."
    );

    Ok(())
}

/// Start one refresh. The first page is published before this returns; the
/// background fill is awaited in its own task and logged when it ends.
async fn run_refresh(engine: &Arc<OddsEngine>, dashboard: &Arc<DashboardState>) {
    let ticket = match engine.start_refresh().await {
        Ok(ticket) => ticket,
        Err(e) => {
            error!(error = %e, "Refresh failed, retrying next tick");
            return;
        }
    };

    let engine = Arc::clone(engine);
    let dashboard = Arc::clone(dashboard);
    tokio::spawn(async move {
        let cycle_id = ticket.cycle_id.to_string();
        let generation = ticket.generation;
        let first_page = ticket.first_page;
        let outcome = ticket.wait().await;
        let status = engine.status().await;
        let stats = engine.stats().await;

        info!(
            cycle_id = %cycle_id,
            generation,
            loaded = status.loaded,
            qualified = stats.qualified,
            positive = stats.reliably_positive,
            rarity_pct = format!("{:.2}", stats.rarity_pct),
            outcome = ?outcome,
            "Refresh finished"
        );
        dashboard
            .record_refresh(RefreshLogEntry::new(cycle_id, generation, first_page, status.loaded, &outcome))
            .await;
    });
}

/// Build the configured odds source.
fn build_source(cfg: &config::AppConfig) -> Result<Arc<dyn OddsSource>> {
    match cfg.source.kind {
        SourceKind::Http => {
            let base_url = cfg
                .source
                .base_url
                .as_deref()
                .context("source.base_url is required for the http source")?;
            let api_key = cfg.api_key();
            if api_key.is_none() {
                warn!(env = ?cfg.source.api_key_env, "No odds API key found, sending unauthenticated requests");
            }
            let source = HttpOddsSource::new(base_url, api_key, cfg.source.league.clone())?;
            info!(base_url, "Using HTTP odds source");
            Ok(Arc::new(source))
        }
        SourceKind::Mock => {
            info!(total = cfg.source.mock_total, "Using mock odds source");
            Ok(Arc::new(MockOddsSource::new(cfg.source.mock_total)))
        }
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fairline=info"));

    let json_logging = std::env::var("FAIRLINE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
