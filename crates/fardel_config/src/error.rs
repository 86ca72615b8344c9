//! Error types for configuration loading and option resolution.

use std::path::PathBuf;

/// Errors that can occur when loading configuration or resolving options.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// A transformer pipeline is declared but empty.
    #[error("empty transformer pipeline for extension '{0}'")]
    EmptyPipeline(String),

    /// No entry points were provided.
    #[error("no entry points specified")]
    NoEntries,

    /// An entry point does not exist on disk.
    #[error("entry point does not exist: {0}")]
    MissingEntry(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parse() {
        let err = ConfigError::Parse("expected '=' at line 3".to_string());
        assert_eq!(
            format!("{err}"),
            "failed to parse configuration: expected '=' at line 3"
        );
    }

    #[test]
    fn display_empty_pipeline() {
        let err = ConfigError::EmptyPipeline("css".to_string());
        assert_eq!(format!("{err}"), "empty transformer pipeline for extension 'css'");
    }

    #[test]
    fn display_missing_entry() {
        let err = ConfigError::MissingEntry(PathBuf::from("src/index.js"));
        assert!(format!("{err}").contains("src/index.js"));
    }
}
