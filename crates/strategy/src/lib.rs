pub mod config;
pub mod policy;
pub mod registry;
pub mod signals;
pub mod window;

pub use config::{SignalConfig, SignalFileConfig};
pub use policy::DecisionPolicy;
pub use registry::build_provider;
pub use signals::{ConstantSignal, MomentumSignal, ScriptedSignal};
pub use window::feature_window;
