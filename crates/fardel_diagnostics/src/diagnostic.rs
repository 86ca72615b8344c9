//! Structured diagnostic messages emitted during builds.

use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A structured diagnostic message produced during a build pass.
///
/// Diagnostics are the primary mechanism for reporting errors and warnings
/// to the user. Each diagnostic carries a severity, a message, the plugin
/// that produced it (if any), the file it concerns (if any), and optional
/// explanatory notes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The main diagnostic message.
    pub message: String,
    /// The plugin that emitted this diagnostic, e.g. `"transformer-js"`.
    pub origin: Option<String>,
    /// The source file this diagnostic concerns.
    pub file_path: Option<PathBuf>,
    /// Explanatory footnotes.
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// Creates a new error diagnostic with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            origin: None,
            file_path: None,
            notes: Vec::new(),
        }
    }

    /// Creates a new warning diagnostic with the given message.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            origin: None,
            file_path: None,
            notes: Vec::new(),
        }
    }

    /// Creates a new informational diagnostic with the given message.
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
            origin: None,
            file_path: None,
            notes: Vec::new(),
        }
    }

    /// Sets the originating plugin name.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Sets the file this diagnostic concerns.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Adds a note to this diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_constructor() {
        let d = Diagnostic::error("failed to resolve './missing'");
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.message, "failed to resolve './missing'");
        assert!(d.origin.is_none());
        assert!(d.notes.is_empty());
    }

    #[test]
    fn builder_methods() {
        let d = Diagnostic::warning("optional dependency dropped")
            .with_origin("resolver")
            .with_file("src/index.js")
            .with_note("create the file to include it");
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.origin.as_deref(), Some("resolver"));
        assert_eq!(d.file_path, Some(PathBuf::from("src/index.js")));
        assert_eq!(d.notes.len(), 1);
    }

    #[test]
    fn info_constructor() {
        let d = Diagnostic::info("cache hit");
        assert_eq!(d.severity, Severity::Info);
    }
}
