//! Process configuration: environment variables layered under CLI flags.

mod controller;

pub use controller::{ControllerConfig, SharedControllerConfig};
