//! CLI command handlers, one file per command.

mod completions;
mod config;
mod simulate;

pub use completions::run_completions;
pub use config::run_config;
pub use simulate::{run_simulate, SimulateArgs};
