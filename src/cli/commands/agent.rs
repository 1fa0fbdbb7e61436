//! `agent` command handler.

use crate::agent::{self, AgentOptions};
use crate::cli::args::AgentArgs;
use crate::error::FleetError;

/// Runs one simulated UAV agent until the controller finishes the mission.
///
/// # Errors
///
/// Returns a transport error if the controller cannot be reached or the
/// connection breaks mid-mission.
pub async fn run(args: &AgentArgs) -> Result<(), FleetError> {
    let options = AgentOptions {
        connect: args.connect.clone(),
        codec: args.codec,
        travel_time: args.travel_time,
        connect_attempts: args.connect_attempts,
        retry_delay: args.retry_delay,
    };
    let summary = agent::run(&options).await?;
    tracing::info!(
        targets = summary.targets.len(),
        commands = summary.commands,
        finished = summary.finished,
        "agent done"
    );
    Ok(())
}
