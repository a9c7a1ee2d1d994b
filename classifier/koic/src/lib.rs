//! Configuration and report rendering behind the `koic` binary.

pub mod config;
pub mod report;

pub use config::{Config, ConfigError, OutputFormat};
