//! `fardel build` — one-shot production build.
//!
//! Resolves options from CLI flags, runs a single build pass, writes
//! bundles to the dist directory, and renders any diagnostics the pass
//! accumulated. Returns exit code 0 on success, 1 on a failed build.

use fardel_common::Target;
use fardel_config::InitialOptions;
use fardel_core::{BuildEvent, ConsoleReporter, Fardel, Reporter};
use fardel_diagnostics::{DiagnosticRenderer, TerminalRenderer};

use crate::{BuildArgs, GlobalArgs};

/// Runs the `fardel build` command.
pub fn run(args: &BuildArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let mut fardel = Fardel::new(initial_options(args, global));
    let mut reporter = ConsoleReporter::new(global.color, global.quiet);

    reporter.report(&BuildEvent::BuildStart);
    let result = fardel.run();
    render_diagnostics(&fardel, global);

    match result {
        Ok(event) => {
            reporter.report(&event);
            Ok(0)
        }
        Err(e) => {
            reporter.report(&BuildEvent::BuildFailure {
                message: e.to_string(),
            });
            Ok(1)
        }
    }
}

/// Maps CLI flags onto the option set the orchestrator consumes.
pub fn initial_options(args: &BuildArgs, global: &GlobalArgs) -> InitialOptions {
    let targets = match &args.dist_dir {
        Some(dist) => vec![Target::new("default", dist.clone())],
        None => Vec::new(),
    };
    InitialOptions {
        entries: args.entries.clone(),
        targets,
        workers: args.workers,
        use_cache: Some(!args.no_cache),
        config_path: global.config.clone(),
        ..InitialOptions::default()
    }
}

/// Renders warnings and errors the build pass collected.
pub fn render_diagnostics(fardel: &Fardel, global: &GlobalArgs) {
    let renderer = TerminalRenderer::new(global.color);
    for diag in fardel.diagnostics().take_all() {
        eprintln!("{}", renderer.render(&diag));
    }
}
