//! Configuration loading and build option resolution.
//!
//! This crate parses the `fardel.toml` plugin registry configuration and
//! resolves caller-provided [`InitialOptions`] into the absolute, defaulted
//! [`ResolvedOptions`] the build pipeline consumes.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod options;

pub use config::{load_config, load_config_at, load_config_from_str, BundlerConfig};
pub use error::ConfigError;
pub use options::{resolve_options, InitialOptions, ResolvedOptions};
