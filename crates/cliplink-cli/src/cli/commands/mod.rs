//! CLI command handlers, one per file.

mod completions;
mod config;
mod replay;

pub use completions::{run_completions, run_manpage};
pub use config::run_config;
pub use replay::run_replay;
