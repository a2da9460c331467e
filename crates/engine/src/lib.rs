pub mod latency;
pub mod market;
pub mod simulation;
pub mod sink;

pub use latency::LatencyTracker;
pub use market::{RandomWalk, ReplayFile, TickSource};
pub use simulation::{RunOutcome, SimState, Simulation, SimulationHandle};
pub use sink::{ChannelSink, FanoutSink, JsonLinesSink, LogSink, MemorySink, ReportSink, SinkEvent};
