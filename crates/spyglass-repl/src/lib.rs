//! Spyglass REPL - Interactive command-line front end for live object
//! inspection
//!
//! This crate provides a REPL (Read-Eval-Print Loop) over a Spyglass session,
//! including command parsing, plain-text rendering of inspectors and a demo
//! world to browse.

pub mod repl;
pub mod world;

// Re-export commonly used types for convenience
pub use repl::{parse_command, ConfigCommand, Repl, ReplCommand};
pub use world::DemoWorld;
