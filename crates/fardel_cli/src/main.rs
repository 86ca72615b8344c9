//! Fardel CLI — the command-line interface for the fardel bundler.
//!
//! Provides `fardel build` for one-shot production builds and
//! `fardel watch` for incremental rebuilds on filesystem changes.

#![warn(missing_docs)]

mod build;
mod watch;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// Fardel — an incremental asset bundler.
#[derive(Parser, Debug)]
#[command(name = "fardel", version, about = "Fardel asset bundler")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a custom `fardel.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the project once and exit.
    Build(BuildArgs),
    /// Build, then rebuild on filesystem changes until interrupted.
    Watch(BuildArgs),
}

/// Arguments shared by the `build` and `watch` subcommands.
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Entry point files.
    #[arg(required = true)]
    pub entries: Vec<PathBuf>,

    /// Skip the content cache for this build.
    #[arg(long)]
    pub no_cache: bool,

    /// Output directory. Defaults to `dist` next to the entries.
    #[arg(long)]
    pub dist_dir: Option<PathBuf>,

    /// Number of worker threads. Defaults to available parallelism.
    #[arg(long)]
    pub workers: Option<usize>,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a custom config file.
    pub config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => atty_is_terminal(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        color,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Build(ref args) => build::run(args, &global),
        Command::Watch(ref args) => watch::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Rough terminal detection — checks if stdout is a terminal.
fn atty_is_terminal() -> bool {
    // Use a simple heuristic: check the TERM env var.
    // In a real build we'd use the `is-terminal` crate, but this is
    // sufficient for now.
    std::env::var("TERM").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_build_defaults() {
        let cli = Cli::parse_from(["fardel", "build", "src/index.js"]);
        match cli.command {
            Command::Build(args) => {
                assert_eq!(args.entries, vec![PathBuf::from("src/index.js")]);
                assert!(!args.no_cache);
                assert!(args.dist_dir.is_none());
                assert!(args.workers.is_none());
            }
            _ => panic!("expected Build command"),
        }
    }

    #[test]
    fn parse_build_with_flags() {
        let cli = Cli::parse_from([
            "fardel",
            "build",
            "src/index.js",
            "--no-cache",
            "--dist-dir",
            "out",
            "--workers",
            "4",
        ]);
        match cli.command {
            Command::Build(args) => {
                assert!(args.no_cache);
                assert_eq!(args.dist_dir, Some(PathBuf::from("out")));
                assert_eq!(args.workers, Some(4));
            }
            _ => panic!("expected Build command"),
        }
    }

    #[test]
    fn parse_watch_with_globals() {
        let cli = Cli::parse_from([
            "fardel",
            "watch",
            "src/index.js",
            "--quiet",
            "--config",
            "custom.toml",
        ]);
        assert!(cli.quiet);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(cli.command, Command::Watch(_)));
    }

    #[test]
    fn build_requires_an_entry() {
        assert!(Cli::try_parse_from(["fardel", "build"]).is_err());
    }
}
