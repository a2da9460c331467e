use std::io::Write;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use common::{Action, RunSummary, TickReport};

/// Receives the per-tick stream and the final summary of a run.
///
/// Called inline from the simulation loop, so implementations must not
/// block: hand work off (see [`ChannelSink`]) rather than wait on it.
pub trait ReportSink: Send {
    fn tick(&mut self, report: &TickReport);

    fn summary(&mut self, summary: &RunSummary);
}

/// Writes reports to the tracing subscriber.
#[derive(Debug, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn tick(&mut self, report: &TickReport) {
        debug!(
            tick = report.tick,
            price = report.price,
            action = %report.action,
            position = report.position,
            pnl = report.pnl,
            sharpe = report.sharpe,
            latency_ns = report.latency_ns,
            "Tick processed"
        );
    }

    fn summary(&mut self, summary: &RunSummary) {
        info!(
            run_id = %summary.run_id,
            status = %summary.status,
            final_pnl = summary.final_pnl,
            total_trades = summary.total_trades,
            mean_latency_ms = summary.mean_latency_ms,
            sharpe = summary.final_sharpe,
            "Run finished"
        );
    }
}

/// Keeps everything in memory. Used by tests and by callers that inspect a
/// run after the fact.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub ticks: Vec<TickReport>,
    pub summary: Option<RunSummary>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> Vec<Action> {
        self.ticks.iter().map(|r| r.action).collect()
    }
}

impl ReportSink for MemorySink {
    fn tick(&mut self, report: &TickReport) {
        self.ticks.push(report.clone());
    }

    fn summary(&mut self, summary: &RunSummary) {
        self.summary = Some(summary.clone());
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum JsonRecord<'a> {
    Tick(&'a TickReport),
    Summary(&'a RunSummary),
}

/// One JSON object per line: `{"type":"tick",...}` for every tick and a
/// closing `{"type":"summary",...}`.
///
/// A write failure is logged once and disables the sink; it never stops the
/// simulation.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
    failed: bool,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            failed: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_record(&mut self, record: &JsonRecord<'_>) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")
    }

    fn emit(&mut self, record: JsonRecord<'_>, flush: bool) {
        if self.failed {
            return;
        }
        let mut result = self.write_record(&record);
        if flush && result.is_ok() {
            result = self.writer.flush();
        }
        if let Err(e) = result {
            warn!(error = %e, "JSON report writer failed — disabling report output");
            self.failed = true;
        }
    }
}

impl<W: Write + Send> ReportSink for JsonLinesSink<W> {
    fn tick(&mut self, report: &TickReport) {
        self.emit(JsonRecord::Tick(report), false);
    }

    fn summary(&mut self, summary: &RunSummary) {
        self.emit(JsonRecord::Summary(summary), true);
    }
}

/// Owned snapshot forwarded by [`ChannelSink`].
#[derive(Debug, Clone)]
pub enum SinkEvent {
    Tick(TickReport),
    Summary(Box<RunSummary>),
}

/// Publishes snapshots to a consumer on another task without ever waiting.
///
/// When the consumer lags and the channel is full the record is dropped and
/// counted; the simulation keeps its pace.
pub struct ChannelSink {
    tx: mpsc::Sender<SinkEvent>,
    dropped: u64,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<SinkEvent>) -> Self {
        Self { tx, dropped: 0 }
    }

    /// Records discarded because the channel was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn publish(&mut self, event: SinkEvent) {
        if let Err(e) = self.tx.try_send(event) {
            if self.dropped == 0 {
                warn!(error = %e, "Report consumer lagging — dropping records");
            }
            self.dropped += 1;
        }
    }
}

impl ReportSink for ChannelSink {
    fn tick(&mut self, report: &TickReport) {
        self.publish(SinkEvent::Tick(report.clone()));
    }

    fn summary(&mut self, summary: &RunSummary) {
        self.publish(SinkEvent::Summary(Box::new(summary.clone())));
    }
}

/// Forwards every record to each inner sink in order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn ReportSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl ReportSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ReportSink for FanoutSink {
    fn tick(&mut self, report: &TickReport) {
        for sink in &mut self.sinks {
            sink.tick(report);
        }
    }

    fn summary(&mut self, summary: &RunSummary) {
        for sink in &mut self.sinks {
            sink.summary(summary);
        }
    }
}
