//! `fardel watch` — continuous rebuild on filesystem changes.
//!
//! Subscribes to the orchestrator's build event stream and prints each
//! event until the process is interrupted. A failed rebuild keeps the
//! stream (and the previous output) alive.

use fardel_core::{ConsoleReporter, Fardel, Reporter};

use crate::build::{initial_options, render_diagnostics};
use crate::{BuildArgs, GlobalArgs};

/// Runs the `fardel watch` command.
pub fn run(args: &BuildArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let mut fardel = Fardel::new(initial_options(args, global));
    let mut reporter = ConsoleReporter::new(global.color, global.quiet);

    if !global.quiet {
        eprintln!("watching for changes (press Ctrl-C to stop)");
    }

    let subscription = fardel.watch()?;
    while let Some(event) = subscription.recv() {
        reporter.report(&event);
        render_diagnostics(&fardel, global);
    }

    Ok(0)
}
