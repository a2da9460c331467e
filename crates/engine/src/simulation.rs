use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use common::{
    Action, Error, InvariantViolation, Result, RunStatus, RunSummary, SignalProvider, SimConfig,
    SimPhase, TickReport,
};
use paper::Ledger;
use risk::RollingSharpe;
use strategy::{feature_window, DecisionPolicy};

use crate::latency::LatencyTracker;
use crate::sink::ReportSink;

/// Cloneable stop switch for a running simulation.
///
/// Stopping is cooperative: the loop checks the flag at the top of every
/// tick, so a tick in flight always completes and the ledger is left
/// consistent.
#[derive(Debug, Clone)]
pub struct SimulationHandle {
    stop_tx: Arc<watch::Sender<bool>>,
}

impl SimulationHandle {
    pub fn new() -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            stop_tx: Arc::new(stop_tx),
        }
    }

    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }
}

impl Default for SimulationHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// All mutable state of one run. Created fresh by [`Simulation::run`] and
/// handed back in the [`RunOutcome`], so runs never share accumulators.
#[derive(Debug, Clone)]
pub struct SimState {
    phase: SimPhase,
    ledger: Ledger,
    sharpe: RollingSharpe,
    latency: LatencyTracker,
    signal_latency: LatencyTracker,
    last_pnl: f64,
    last_sharpe: f64,
    ticks_processed: usize,
    degraded_ticks: usize,
}

impl SimState {
    fn new(risk_window: usize) -> Self {
        Self {
            phase: SimPhase::Warmup,
            ledger: Ledger::new(),
            sharpe: RollingSharpe::new(risk_window),
            latency: LatencyTracker::new(),
            signal_latency: LatencyTracker::new(),
            last_pnl: 0.0,
            last_sharpe: 0.0,
            ticks_processed: 0,
            degraded_ticks: 0,
        }
    }

    pub fn phase(&self) -> SimPhase {
        self.phase
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn latency(&self) -> &LatencyTracker {
        &self.latency
    }

    pub fn signal_latency(&self) -> &LatencyTracker {
        &self.signal_latency
    }

    /// Running ticks fully processed, degraded ones included.
    pub fn ticks_processed(&self) -> usize {
        self.ticks_processed
    }

    pub fn degraded_ticks(&self) -> usize {
        self.degraded_ticks
    }

    pub fn last_pnl(&self) -> f64 {
        self.last_pnl
    }

    pub fn last_sharpe(&self) -> f64 {
        self.last_sharpe
    }

    fn summary(
        &self,
        run_id: Uuid,
        status: RunStatus,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> RunSummary {
        RunSummary {
            run_id,
            status,
            ticks_processed: self.ticks_processed,
            degraded_ticks: self.degraded_ticks,
            final_pnl: self.last_pnl,
            final_position: self.ledger.position(),
            final_cash: self.ledger.cash(),
            total_trades: self.ledger.trades().len(),
            buys: self.ledger.buys(),
            sells: self.ledger.sells(),
            mean_latency_ms: self.latency.mean_ms(),
            latency: self.latency.percentiles(),
            mean_signal_latency_ms: self.signal_latency.mean_ms(),
            final_sharpe: self.last_sharpe,
            trades: self.ledger.trades().to_vec(),
            started_at,
            finished_at,
        }
    }
}

/// Final state and summary of a run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: SimState,
    pub summary: RunSummary,
}

/// Drives the tick loop: warmup, then one decision per tick until the
/// second-to-last price (the last price has no successor to trade against).
pub struct Simulation {
    config: SimConfig,
    policy: DecisionPolicy,
    provider: Box<dyn SignalProvider>,
    prices: Vec<f64>,
    handle: SimulationHandle,
    /// Replaces the policy's decision on the given ticks.
    #[cfg(test)]
    forced_actions: std::collections::HashMap<usize, Action>,
}

impl Simulation {
    /// Validate everything up front; a configuration error means the loop
    /// never starts.
    pub fn new(
        config: SimConfig,
        mut prices: Vec<f64>,
        provider: Box<dyn SignalProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let policy = DecisionPolicy::new(config.lower_threshold, config.upper_threshold)?;

        if prices.len() < config.num_ticks {
            return Err(Error::Config(format!(
                "tick source produced {} prices, {} required",
                prices.len(),
                config.num_ticks
            )));
        }
        prices.truncate(config.num_ticks);
        if let Some(idx) = prices.iter().position(|p| !p.is_finite()) {
            return Err(Error::Config(format!("price at tick {idx} is not finite")));
        }

        Ok(Self {
            config,
            policy,
            provider,
            prices,
            handle: SimulationHandle::new(),
            #[cfg(test)]
            forced_actions: std::collections::HashMap::new(),
        })
    }

    /// Use an externally created stop switch.
    pub fn with_handle(mut self, handle: SimulationHandle) -> Self {
        self.handle = handle;
        self
    }

    pub fn handle(&self) -> SimulationHandle {
        self.handle.clone()
    }

    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Run to completion, cancellation or invariant violation. Every tick
    /// report and the final summary go to `sink`.
    pub async fn run(&self, sink: &mut dyn ReportSink) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let width = self.config.feature_window;
        let last_tick = self.prices.len().saturating_sub(1);

        info!(
            %run_id,
            ticks = self.prices.len(),
            feature_window = width,
            risk_window = self.config.risk_window,
            provider = %self.provider.name(),
            "Simulation starting"
        );

        let mut state = SimState::new(self.config.risk_window);
        let mut status = RunStatus::Completed;

        for tick in 0..last_tick {
            if self.handle.is_stopped() {
                info!(tick, "Stop requested — ending run at tick boundary");
                status = RunStatus::Cancelled { at_tick: tick };
                break;
            }

            if tick < width {
                state.sharpe.push(self.prices[tick]);
                continue;
            }

            if state.phase == SimPhase::Warmup {
                info!(tick, "Warmup complete — trading");
                state.phase = SimPhase::Running;
            }

            match self.process_tick(&mut state, tick).await {
                Ok(report) => sink.tick(&report),
                Err(violation) => {
                    error!(tick, %violation, "Invariant violated — aborting run");
                    status = RunStatus::Aborted {
                        at_tick: tick,
                        reason: violation.to_string(),
                    };
                    break;
                }
            }

            if self.config.tick_delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.config.tick_delay).await;
            }
        }

        let audit_tick = match status {
            RunStatus::Completed => Some(last_tick),
            RunStatus::Cancelled { at_tick } => Some(at_tick),
            RunStatus::Aborted { .. } => None,
        };
        if let Some(at_tick) = audit_tick {
            if let Err(violation) = state.ledger.reconcile() {
                error!(%violation, "Ledger failed end-of-run reconciliation");
                status = RunStatus::Aborted {
                    at_tick,
                    reason: violation.to_string(),
                };
            }
        }

        state.phase = SimPhase::Done;
        let summary = state.summary(run_id, status, started_at, Utc::now());
        sink.summary(&summary);

        RunOutcome { state, summary }
    }

    async fn process_tick(
        &self,
        state: &mut SimState,
        tick: usize,
    ) -> std::result::Result<TickReport, InvariantViolation> {
        let price = self.prices[tick];

        let signal_started = Instant::now();
        let signal = self.fetch_signal(tick).await;
        let signal_latency_ns = state.signal_latency.record(signal_started.elapsed());

        let started = Instant::now();
        let action = match &signal {
            Ok(probability) => self.policy.decide(*probability, state.ledger.position()),
            Err(_) => Action::Hold,
        };
        #[cfg(test)]
        let action = self.forced_actions.get(&tick).copied().unwrap_or(action);
        let trade = state.ledger.execute(action, price, tick)?;
        let latency_ns = state.latency.record(started.elapsed());
        state.ledger.check()?;

        let pnl = state.ledger.pnl(price);
        // Sharpe over prices[tick - K .. tick); this tick's price enters afterwards.
        let sharpe = state.sharpe.value();
        state.sharpe.push(price);

        state.last_pnl = pnl;
        state.last_sharpe = sharpe;
        state.ticks_processed += 1;

        let (probability, degraded) = match signal {
            Ok(p) => (Some(p), None),
            Err(e) => {
                warn!(tick, error = %e, "Signal unavailable — holding this tick");
                state.degraded_ticks += 1;
                (None, Some(e.to_string()))
            }
        };

        Ok(TickReport {
            tick,
            price,
            signal: probability,
            action,
            trade,
            position: state.ledger.position(),
            cash: state.ledger.cash(),
            pnl,
            sharpe,
            latency_ns,
            signal_latency_ns,
            degraded,
        })
    }

    /// Ask the provider for this tick's probability. Failures, timeouts and
    /// values outside `[0, 1]` all come back as `SignalUnavailable`.
    async fn fetch_signal(&self, tick: usize) -> Result<f64> {
        let window = feature_window(&self.prices, tick, self.config.feature_window)
            .ok_or_else(|| Error::SignalUnavailable(format!("no feature window for tick {tick}")))?;

        let prediction = match self.config.signal_timeout {
            Some(limit) => tokio::time::timeout(limit, self.provider.predict(window))
                .await
                .map_err(|_| Error::SignalUnavailable(format!("timed out after {limit:?}")))?,
            None => self.provider.predict(window).await,
        };

        match prediction {
            Ok(p) if (0.0..=1.0).contains(&p) => Ok(p),
            Ok(p) => Err(Error::SignalUnavailable(format!(
                "probability {p} outside [0, 1]"
            ))),
            Err(e @ Error::SignalUnavailable(_)) => Err(e),
            Err(other) => Err(Error::SignalUnavailable(other.to_string())),
        }
    }
}
