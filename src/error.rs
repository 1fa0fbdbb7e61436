//! Error types for `fleetctl`
//!
//! This module provides the error hierarchy used across the controller:
//! transport failures, configuration problems, and phase failures, plus
//! the exit codes the CLI maps them to.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `fleetctl` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (unreadable targets file, invalid settings)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Transport error (bind failed, connection refused)
    pub const TRANSPORT_ERROR: i32 = 4;

    /// Mission aborted because a phase failed (only with `--fail-on-abort`)
    pub const MISSION_ABORTED: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `fleetctl` operations.
///
/// Aggregates all domain-specific errors and provides a unified
/// interface for exit code mapping.
#[derive(Debug, Error)]
pub enum FleetError {
    /// Configuration loading error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Transport layer error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Phase barrier error
    #[error(transparent)]
    Phase(#[from] PhaseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FleetError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) => ExitCode::CONFIG_ERROR,
            Self::Transport(_) => ExitCode::TRANSPORT_ERROR,
            Self::Phase(_) => ExitCode::MISSION_ABORTED,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading errors for the targets file and mission settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Referenced configuration file not found or unreadable
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Settings file could not be parsed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },
}

// ============================================================================
// Transport Errors
// ============================================================================

/// Transport errors: bind, read, and write failures on a participant
/// link, plus codec rejections.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error during transport operations
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to bind the listening socket
    #[error("bind to {addr} failed: {source}")]
    Bind {
        /// Requested bind address
        addr: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The remote end closed the connection
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// A frame could not be written in full
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite {
        /// Bytes accepted by the link
        written: usize,
        /// Size of the frame
        expected: usize,
    },

    /// Message cannot be carried by the active codec mode
    #[error("protocol error: {0}")]
    Protocol(String),
}

// ============================================================================
// Phase Errors
// ============================================================================

/// Phase barrier failures surfaced at the process boundary.
#[derive(Debug, Error)]
pub enum PhaseError {
    /// A phase ended in the Failed state
    #[error("phase {phase} failed: {reason}")]
    Failed {
        /// Name of the failed phase
        phase: String,
        /// Human-readable failure reason
        reason: String,
    },
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `fleetctl` operations.
pub type Result<T> = std::result::Result<T, FleetError>;

// ============================================================================
// Tests
// ============================================================================
