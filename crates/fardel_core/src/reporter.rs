//! Build event reporting.

use std::time::Duration;

use fardel_diagnostics::{Diagnostic, DiagnosticRenderer, TerminalRenderer};

use crate::events::BuildEvent;

/// Receives build lifecycle events as they happen.
pub trait Reporter: Send {
    /// Called for every build event, in order.
    fn report(&mut self, event: &BuildEvent);
}

/// Prints build progress to the terminal.
pub struct ConsoleReporter {
    renderer: TerminalRenderer,
    quiet: bool,
}

impl ConsoleReporter {
    /// Creates a console reporter. When `quiet`, only failures print.
    pub fn new(color: bool, quiet: bool) -> Self {
        Self {
            renderer: TerminalRenderer::new(color),
            quiet,
        }
    }
}

impl Reporter for ConsoleReporter {
    fn report(&mut self, event: &BuildEvent) {
        match event {
            BuildEvent::BuildStart => {
                if !self.quiet {
                    println!("building...");
                }
            }
            BuildEvent::BuildSuccess {
                bundle_graph,
                changed_assets,
                build_time,
            } => {
                if self.quiet {
                    return;
                }
                println!(
                    "built {} bundle(s) in {} ({} asset(s) changed)",
                    bundle_graph.bundle_count(),
                    format_duration(*build_time),
                    changed_assets.len()
                );
                for bundle in bundle_graph.bundles() {
                    let size = bundle.stats.map(|s| s.size).unwrap_or(0);
                    println!("  {}  {}", bundle.name, format_size(size));
                }
            }
            BuildEvent::BuildFailure { message } => {
                eprintln!("{}", self.renderer.render(&Diagnostic::error(message)));
            }
        }
    }
}

fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms >= 1000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{ms}ms")
    }
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}
