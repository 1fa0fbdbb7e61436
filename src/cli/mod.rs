//! Command-line interface.
//!
//! [`args`] holds the Clap definitions; [`commands`] routes a parsed
//! invocation to its handler.

pub mod args;
pub mod commands;
