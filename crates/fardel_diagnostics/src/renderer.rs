//! Diagnostic rendering for terminal output.

use crate::diagnostic::Diagnostic;

/// Trait for rendering diagnostics into formatted output strings.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a formatted string.
    fn render(&self, diag: &Diagnostic) -> String;
}

/// Renders diagnostics in a compact terminal format.
///
/// Produces output like:
/// ```text
/// error: failed to resolve './missing' from src/index.js
///   --> src/index.js
///    = note: create the file or mark the dependency optional
/// ```
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes in output.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn severity_prefix(&self, diag: &Diagnostic) -> String {
        if self.color {
            let code = match diag.severity {
                crate::Severity::Error => "31",
                crate::Severity::Warning => "33",
                crate::Severity::Info => "36",
            };
            format!("\x1b[{code};1m{}\x1b[0m", diag.severity)
        } else {
            diag.severity.to_string()
        }
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        let mut out = String::new();

        match &diag.origin {
            Some(origin) => out.push_str(&format!(
                "{}[{origin}]: {}\n",
                self.severity_prefix(diag),
                diag.message
            )),
            None => out.push_str(&format!("{}: {}\n", self.severity_prefix(diag), diag.message)),
        }

        if let Some(path) = &diag.file_path {
            out.push_str(&format!("  --> {}\n", path.display()));
        }

        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_plain_error() {
        let renderer = TerminalRenderer::new(false);
        let out = renderer.render(&Diagnostic::error("boom"));
        assert_eq!(out, "error: boom\n");
    }

    #[test]
    fn renders_origin_file_and_notes() {
        let renderer = TerminalRenderer::new(false);
        let diag = Diagnostic::warning("optional dependency './opt' not found")
            .with_origin("resolver")
            .with_file("src/index.js")
            .with_note("it was dropped from the build");
        let out = renderer.render(&diag);
        assert!(out.contains("warning[resolver]:"));
        assert!(out.contains("--> src/index.js"));
        assert!(out.contains("= note: it was dropped"));
    }

    #[test]
    fn color_wraps_severity() {
        let renderer = TerminalRenderer::new(true);
        let out = renderer.render(&Diagnostic::error("boom"));
        assert!(out.starts_with("\x1b[31;1merror\x1b[0m: "));
    }
}
