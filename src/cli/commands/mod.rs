//! CLI command dispatch and handlers.
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod agent;
pub mod run;
pub mod targets;

use crate::cli::args::{Cli, Commands};
use crate::error::FleetError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli) -> Result<(), FleetError> {
    match cli.command {
        Commands::Run(args) => run::run(&args).await,
        Commands::Agent(args) => agent::run(&args).await,
        Commands::Targets(args) => targets::run(&args),
    }
}
