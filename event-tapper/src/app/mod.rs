//! Application Layer
//!
//! Command line parsing, configuration, event rendering and the session
//! duration timer.

pub mod cli;
pub mod config;
pub mod output;
pub mod timer;

pub use cli::Cli;
pub use config::Config;
pub use output::{EventFilter, TableFormatter};
pub use timer::StopTimer;
