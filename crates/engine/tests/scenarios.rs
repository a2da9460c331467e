use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use common::{Action, Error, OrderSide, Result, RunStatus, SignalProvider, SimConfig, SimPhase};
use engine::{JsonLinesSink, MemorySink, RandomWalk, Simulation, SimulationHandle, TickSource};
use strategy::{ConstantSignal, ScriptedSignal};

fn config(num_ticks: usize) -> SimConfig {
    SimConfig {
        num_ticks,
        tick_delay: Duration::ZERO,
        ..SimConfig::default()
    }
}

fn walk(num_ticks: usize) -> Vec<f64> {
    RandomWalk::new(42, 100.0, 0.1)
        .unwrap()
        .prices(num_ticks)
        .unwrap()
}

async fn run(
    cfg: SimConfig,
    provider: impl SignalProvider + 'static,
) -> (engine::RunOutcome, MemorySink) {
    let prices = walk(cfg.num_ticks);
    let sim = Simulation::new(cfg, prices, Box::new(provider)).unwrap();
    let mut sink = MemorySink::new();
    let outcome = sim.run(&mut sink).await;
    (outcome, sink)
}

// ── Decision scenarios ──────────────────────────────────────────────────────

#[tokio::test]
async fn constant_bullish_signal_buys_every_running_tick() {
    let (outcome, sink) = run(config(31), ConstantSignal::new(0.7)).await;

    assert_eq!(sink.ticks.len(), 10);
    assert!(sink.actions().iter().all(|a| *a == Action::Buy));
    assert_eq!(outcome.summary.status, RunStatus::Completed);
    assert_eq!(outcome.summary.final_position, 10);
    assert_eq!(outcome.summary.total_trades, 10);
    assert_eq!(outcome.summary.sells, 0);
    assert_eq!(outcome.state.phase(), SimPhase::Done);
}

#[tokio::test]
async fn alternating_signal_round_trips_inventory() {
    let (outcome, sink) = run(config(26), ScriptedSignal::cycle(&[0.7, 0.3])).await;

    assert_eq!(
        sink.actions(),
        vec![Action::Buy, Action::Sell, Action::Buy, Action::Sell, Action::Buy]
    );
    let sides: Vec<OrderSide> = outcome.summary.trades.iter().map(|t| t.side).collect();
    assert_eq!(
        sides,
        vec![OrderSide::Buy, OrderSide::Sell, OrderSide::Buy, OrderSide::Sell, OrderSide::Buy]
    );
    assert_eq!(outcome.summary.final_position, 1);
}

#[tokio::test]
async fn bearish_signal_never_sells_from_flat() {
    let (outcome, sink) = run(config(31), ConstantSignal::new(0.1)).await;

    assert!(sink.actions().iter().all(|a| *a == Action::Hold));
    assert!(outcome.summary.trades.is_empty());
    assert_eq!(outcome.summary.final_pnl, 0.0);
}

#[tokio::test]
async fn provider_failure_degrades_one_tick_and_run_continues() {
    let mut steps = vec![Some(0.7), Some(0.7), None];
    steps.extend(std::iter::repeat(Some(0.7)).take(7));
    let (outcome, sink) = run(config(31), ScriptedSignal::new(steps)).await;

    assert_eq!(sink.ticks.len(), 10);
    let failed = &sink.ticks[2];
    assert_eq!(failed.tick, 22);
    assert_eq!(failed.action, Action::Hold);
    assert!(failed.is_degraded());
    assert_eq!(failed.signal, None);
    assert!(failed.trade.is_none());

    assert_eq!(sink.ticks.iter().filter(|r| r.is_degraded()).count(), 1);
    assert_eq!(outcome.summary.degraded_ticks, 1);
    assert_eq!(outcome.summary.total_trades, 9);
    assert_eq!(outcome.summary.status, RunStatus::Completed);
}

#[tokio::test]
async fn out_of_range_probabilities_are_degraded() {
    for bad in [1.5, -0.2, f64::NAN] {
        let (outcome, sink) = run(config(25), ConstantSignal::new(bad)).await;
        assert!(sink.ticks.iter().all(|r| r.is_degraded()));
        assert!(sink.actions().iter().all(|a| *a == Action::Hold));
        assert_eq!(outcome.summary.degraded_ticks, 4);
    }
}

// ── Warmup and causality ────────────────────────────────────────────────────

/// Remembers every window it was shown.
#[derive(Default)]
struct RecordingSignal {
    windows: Mutex<Vec<Vec<f64>>>,
}

#[async_trait]
impl SignalProvider for RecordingSignal {
    fn name(&self) -> &str {
        "recording"
    }

    async fn predict(&self, window: &[f64]) -> Result<f64> {
        self.windows.lock().unwrap().push(window.to_vec());
        Ok(0.5)
    }
}

#[tokio::test]
async fn provider_only_sees_strictly_past_prices() {
    let cfg = config(40);
    let prices = walk(40);
    let provider = std::sync::Arc::new(RecordingSignal::default());

    struct Shared(std::sync::Arc<RecordingSignal>);

    #[async_trait]
    impl SignalProvider for Shared {
        fn name(&self) -> &str {
            self.0.name()
        }

        async fn predict(&self, window: &[f64]) -> Result<f64> {
            self.0.predict(window).await
        }
    }

    let sim = Simulation::new(cfg, prices.clone(), Box::new(Shared(provider.clone()))).unwrap();
    let mut sink = MemorySink::new();
    sim.run(&mut sink).await;

    let windows = provider.windows.lock().unwrap();
    assert_eq!(windows.len(), 40 - 1 - 20);
    for (report, window) in sink.ticks.iter().zip(windows.iter()) {
        assert!(report.tick >= 20);
        assert_eq!(window.len(), 20);
        assert_eq!(window[..], prices[report.tick - 20..report.tick]);
    }
    assert_eq!(sink.ticks.first().map(|r| r.tick), Some(20));
    assert_eq!(sink.ticks.last().map(|r| r.tick), Some(38));
}

// ── Accounting and analytics ────────────────────────────────────────────────

#[tokio::test]
async fn every_report_marks_inventory_to_market() {
    let (outcome, sink) = run(config(120), ScriptedSignal::cycle(&[0.7, 0.7, 0.5, 0.2])).await;

    for report in &sink.ticks {
        let expected = report.cash + report.position as f64 * report.price;
        assert!((report.pnl - expected).abs() < 1e-9);
    }
    assert!(outcome.state.ledger().reconcile().is_ok());
    assert_eq!(
        outcome.summary.buys - outcome.summary.sells,
        outcome.summary.final_position
    );
}

#[tokio::test]
async fn sharpe_matches_batch_window_of_past_prices() {
    let cfg = config(200);
    let risk_window = cfg.risk_window;
    let prices = walk(200);
    let sim = Simulation::new(cfg, prices.clone(), Box::new(ConstantSignal::new(0.5))).unwrap();
    let mut sink = MemorySink::new();
    sim.run(&mut sink).await;

    for report in &sink.ticks {
        let batch = risk::rolling_sharpe(&prices, report.tick, risk_window);
        assert!(report.sharpe.is_finite());
        assert!(
            (report.sharpe - batch).abs() <= 1e-6 * batch.abs().max(1.0),
            "tick {}: streaming {} vs batch {}",
            report.tick,
            report.sharpe,
            batch
        );
    }
}

#[tokio::test]
async fn summary_reflects_last_tick_and_mean_latency() {
    let (outcome, sink) = run(config(60), ScriptedSignal::cycle(&[0.8, 0.1])).await;
    let summary = &outcome.summary;
    let last = sink.ticks.last().unwrap();

    assert_eq!(summary.final_pnl, last.pnl);
    assert_eq!(summary.final_sharpe, last.sharpe);
    assert_eq!(summary.ticks_processed, sink.ticks.len());

    let mean_ns =
        sink.ticks.iter().map(|r| r.latency_ns as f64).sum::<f64>() / sink.ticks.len() as f64;
    assert!((summary.mean_latency_ms - mean_ns / 1e6).abs() < 1e-9);
    assert_eq!(summary.latency.as_ref().map(|l| l.count), Some(sink.ticks.len()));
    assert!(summary.finished_at >= summary.started_at);
}

#[tokio::test]
async fn runs_are_independent() {
    let cfg = config(50);
    let prices = walk(50);
    let sim = Simulation::new(cfg, prices, Box::new(ConstantSignal::new(0.9))).unwrap();

    let mut first = MemorySink::new();
    let mut second = MemorySink::new();
    let a = sim.run(&mut first).await;
    let b = sim.run(&mut second).await;

    assert_eq!(a.summary.total_trades, b.summary.total_trades);
    assert_eq!(a.summary.final_pnl, b.summary.final_pnl);
    assert_ne!(a.summary.run_id, b.summary.run_id);
}

// ── Cancellation and timeouts ───────────────────────────────────────────────

/// Requests a stop while serving its `n`th prediction.
struct StopAfter {
    handle: SimulationHandle,
    n: usize,
    calls: Mutex<usize>,
}

#[async_trait]
impl SignalProvider for StopAfter {
    fn name(&self) -> &str {
        "stop-after"
    }

    async fn predict(&self, _window: &[f64]) -> Result<f64> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        if *calls == self.n {
            self.handle.stop();
        }
        Ok(0.7)
    }
}

#[tokio::test]
async fn stop_ends_run_at_next_tick_boundary() {
    let handle = SimulationHandle::new();
    let provider = StopAfter {
        handle: handle.clone(),
        n: 3,
        calls: Mutex::new(0),
    };
    let sim = Simulation::new(config(100), walk(100), Box::new(provider))
        .unwrap()
        .with_handle(handle.clone());

    let mut sink = MemorySink::new();
    let outcome = sim.run(&mut sink).await;

    assert!(handle.is_stopped());
    assert_eq!(outcome.summary.status, RunStatus::Cancelled { at_tick: 23 });
    assert_eq!(sink.ticks.len(), 3);
    assert_eq!(outcome.summary.final_position, 3);
    assert!(outcome.state.ledger().reconcile().is_ok());
    assert!(sink.summary.is_some());
}

#[tokio::test]
async fn stop_before_start_processes_nothing() {
    let sim = Simulation::new(config(31), walk(31), Box::new(ConstantSignal::new(0.7))).unwrap();
    sim.handle().stop();

    let mut sink = MemorySink::new();
    let outcome = sim.run(&mut sink).await;

    assert_eq!(outcome.summary.status, RunStatus::Cancelled { at_tick: 0 });
    assert!(sink.ticks.is_empty());
    assert_eq!(outcome.summary.mean_latency_ms, 0.0);
}

struct SlowSignal;

#[async_trait]
impl SignalProvider for SlowSignal {
    fn name(&self) -> &str {
        "slow"
    }

    async fn predict(&self, _window: &[f64]) -> Result<f64> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(0.9)
    }
}

#[tokio::test]
async fn slow_provider_times_out_into_hold() {
    let cfg = SimConfig {
        signal_timeout: Some(Duration::from_millis(10)),
        ..config(23)
    };
    let (outcome, sink) = run(cfg, SlowSignal).await;

    assert_eq!(sink.ticks.len(), 2);
    for report in &sink.ticks {
        assert_eq!(report.action, Action::Hold);
        assert!(report.degraded.as_deref().unwrap().contains("timed out"));
    }
    assert_eq!(outcome.summary.status, RunStatus::Completed);
    assert_eq!(outcome.summary.degraded_ticks, 2);
}

// ── Configuration errors ────────────────────────────────────────────────────

#[test]
fn feature_window_must_fit_inside_run() {
    let cfg = SimConfig {
        feature_window: 20,
        ..config(20)
    };
    let result = Simulation::new(cfg, walk(20), Box::new(ConstantSignal::new(0.5)));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn short_price_path_is_rejected() {
    let result = Simulation::new(config(31), walk(10), Box::new(ConstantSignal::new(0.5)));
    assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("10 prices")));
}

#[test]
fn non_finite_price_is_rejected() {
    let mut prices = walk(31);
    prices[5] = f64::INFINITY;
    let result = Simulation::new(config(31), prices, Box::new(ConstantSignal::new(0.5)));
    assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("tick 5")));
}

#[test]
fn inverted_thresholds_are_rejected() {
    let cfg = SimConfig {
        lower_threshold: 0.7,
        upper_threshold: 0.3,
        ..config(31)
    };
    let result = Simulation::new(cfg, walk(31), Box::new(ConstantSignal::new(0.5)));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn longer_price_path_is_truncated() {
    let sim = Simulation::new(config(31), walk(50), Box::new(ConstantSignal::new(0.5))).unwrap();
    assert_eq!(sim.prices().len(), 31);
}

// ── Report output ───────────────────────────────────────────────────────────

#[tokio::test]
async fn json_report_has_one_line_per_tick_plus_summary() {
    let sim = Simulation::new(config(31), walk(31), Box::new(ConstantSignal::new(0.7))).unwrap();
    let mut sink = JsonLinesSink::new(Vec::new());
    let outcome = sim.run(&mut sink).await;

    let output = String::from_utf8(sink.into_inner()).unwrap();
    let lines: Vec<serde_json::Value> = output
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    assert_eq!(lines.len(), 11);
    assert!(lines[..10].iter().all(|l| l["type"] == "tick"));
    assert_eq!(lines[0]["tick"], 20);
    let summary = &lines[10];
    assert_eq!(summary["type"], "summary");
    assert_eq!(summary["status"], "completed");
    assert_eq!(summary["total_trades"], 10);
    assert_eq!(summary["run_id"], outcome.summary.run_id.to_string());
}
