//! Diagnostic creation, severity management, and terminal rendering.
//!
//! This crate provides structured [`Diagnostic`] messages with severity
//! levels, plugin origins, and notes. The thread-safe [`DiagnosticSink`]
//! accumulates diagnostics during a build pass, and [`DiagnosticRenderer`]
//! implementations format them for output.

#![warn(missing_docs)]

pub mod diagnostic;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use diagnostic::Diagnostic;
pub use renderer::{DiagnosticRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
