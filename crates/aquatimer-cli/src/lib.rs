//! aquatimer daemon library
//!
//! Command-line parsing, configuration loading and the error type used by the
//! `aquatimer` binary.

pub mod cli;
pub mod config;
pub mod error;

pub use cli::Cli;
pub use config::AppConfig;
pub use error::{CliError, Result};
