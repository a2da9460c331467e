use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{bail, Context};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::SimConfig;
use engine::{FanoutSink, JsonLinesSink, LogSink, RandomWalk, ReplayFile, Simulation, TickSource};
use strategy::{build_provider, SignalConfig, SignalFileConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = SimConfig::from_env().context("invalid configuration")?;
    info!(
        ticks = cfg.num_ticks,
        feature_window = cfg.feature_window,
        risk_window = cfg.risk_window,
        upper = cfg.upper_threshold,
        lower = cfg.lower_threshold,
        tick_delay_ms = cfg.tick_delay.as_millis() as u64,
        "Velocis starting"
    );

    // ── Price path ────────────────────────────────────────────────────────────
    let prices = match &cfg.price_file {
        Some(path) => {
            info!(path = %path, "Replaying prices from file");
            ReplayFile::new(path).prices(cfg.num_ticks)
        }
        None => {
            info!(seed = cfg.seed, volatility = cfg.volatility, "Generating random-walk prices");
            RandomWalk::new(cfg.seed, cfg.start_price, cfg.volatility)?.prices(cfg.num_ticks)
        }
    }
    .context("failed to build price path")?;

    // ── Signal provider ───────────────────────────────────────────────────────
    let signal_cfg = match &cfg.signal_config_path {
        Some(path) => {
            SignalFileConfig::load(path)
                .with_context(|| format!("failed to load signal config '{path}'"))?
                .signal
        }
        None => SignalConfig::default(),
    };
    let provider = build_provider(&signal_cfg).context("failed to build signal provider")?;

    // ── Simulation ────────────────────────────────────────────────────────────
    let report_path = cfg.report_path.clone();
    let simulation = Simulation::new(cfg, prices, provider).context("failed to set up simulation")?;

    // ── Report sinks ──────────────────────────────────────────────────────────
    let mut sink = FanoutSink::new().with(LogSink);
    if let Some(path) = &report_path {
        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create report directory for '{path}'"))?;
        }
        let file = File::create(path).with_context(|| format!("failed to create '{path}'"))?;
        info!(path = %path, "Writing JSON-lines report");
        sink = sink.with(JsonLinesSink::new(BufWriter::new(file)));
    }

    // ── Run ───────────────────────────────────────────────────────────────────
    let handle = simulation.handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received. Stopping at next tick.");
                handle.stop();
            }
            Err(e) => warn!(error = %e, "Could not listen for shutdown signal"),
        }
    });

    let outcome = simulation.run(&mut sink).await;
    let summary = &outcome.summary;

    // ── Final metrics ─────────────────────────────────────────────────────────
    info!(
        status = %summary.status,
        final_pnl = summary.final_pnl,
        total_trades = summary.total_trades,
        mean_latency_ms = summary.mean_latency_ms,
        sharpe = summary.final_sharpe,
        degraded_ticks = summary.degraded_ticks,
        "Final metrics"
    );
    if let Some(latency) = &summary.latency {
        info!(
            p50_ns = latency.p50_ns,
            p90_ns = latency.p90_ns,
            p99_ns = latency.p99_ns,
            max_ns = latency.max_ns,
            "Decision latency"
        );
    }

    if summary.status.is_aborted() {
        bail!("run aborted: {}", summary.status);
    }
    Ok(())
}
