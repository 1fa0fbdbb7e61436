//! `run` command handler.
//!
//! Merges command-line flags over the optional settings file, binds the
//! listener, and runs one mission.

use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::args::RunArgs;
use crate::config::mission::{MissionSettings, load_settings};
use crate::config::targets::{TargetTable, load_targets};
use crate::error::{FleetError, PhaseError};
use crate::mission::{DEFAULT_BIND, MissionOptions, MissionOutcome, Sequencer};
use crate::observability::events::EventEmitter;
use crate::transport::TcpAcceptor;

/// Fully merged settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRun {
    /// Mission options handed to the sequencer.
    pub options: MissionOptions,
    /// Listen address.
    pub bind: String,
    /// Targets file, if any.
    pub targets: Option<PathBuf>,
}

/// Merges flags, settings-file values, and defaults, in that order.
#[must_use]
pub fn resolve(args: &RunArgs, settings: MissionSettings) -> ResolvedRun {
    let defaults = MissionOptions::default();
    let options = MissionOptions {
        fleet_size: args
            .fleet_size
            .or(settings.fleet_size)
            .map_or(defaults.fleet_size, |n| n as usize),
        codec: args.codec.or(settings.codec).unwrap_or(defaults.codec),
        return_home: args.return_home || settings.return_home.unwrap_or(defaults.return_home),
        confirm: args.confirm || settings.confirm.unwrap_or(defaults.confirm),
        phase_timeout: args.phase_timeout.or(settings.phase_timeout),
        failure_policy: args
            .on_participant_failure
            .or(settings.failure_policy)
            .unwrap_or(defaults.failure_policy),
    };

    ResolvedRun {
        options,
        bind: args
            .bind
            .clone()
            .or(settings.bind)
            .unwrap_or_else(|| DEFAULT_BIND.to_string()),
        targets: args.targets.clone().or(settings.targets),
    }
}

/// Runs one mission.
///
/// # Errors
///
/// Returns a config error for unreadable settings or targets files, a
/// transport error if the listener cannot be bound, and, with
/// `--fail-on-abort`, a phase error when the mission aborts.
pub async fn run(args: &RunArgs) -> Result<(), FleetError> {
    let settings = match &args.config {
        Some(path) => {
            tracing::info!(config = %path.display(), "loading mission settings");
            load_settings(path)?
        }
        None => MissionSettings::default(),
    };
    let resolved = resolve(args, settings);

    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    let targets = match &resolved.targets {
        Some(path) => {
            let parsed = load_targets(path, resolved.options.fleet_size)?;
            tracing::info!(
                path = %path.display(),
                format = ?parsed.format,
                loaded = parsed.table.len(),
                skipped = parsed.skipped.len(),
                "targets loaded"
            );
            parsed.table
        }
        None => {
            tracing::warn!("no targets file given; participants will receive no targets");
            TargetTable::default()
        }
    };

    let events = match &args.events_file {
        Some(path) if path.as_os_str() == "-" => EventEmitter::stderr(),
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::noop(),
    };

    let mut acceptor = TcpAcceptor::bind(&resolved.bind).await?;

    let mut sequencer = Sequencer::new(resolved.options, Arc::new(events));
    let report = sequencer.run(&mut acceptor, targets).await;

    match report.outcome {
        MissionOutcome::Completed => Ok(()),
        MissionOutcome::Aborted { phase, failure } if args.fail_on_abort => {
            Err(PhaseError::Failed {
                phase: phase.name().to_string(),
                reason: failure.to_string(),
            }
            .into())
        }
        MissionOutcome::Aborted { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::codec::CodecMode;
    use crate::phase::FailurePolicy;

    #[test]
    fn defaults_apply_without_flags_or_file() {
        let resolved = resolve(&RunArgs::default(), MissionSettings::default());
        assert_eq!(resolved.options, MissionOptions::default());
        assert_eq!(resolved.bind, DEFAULT_BIND);
        assert_eq!(resolved.targets, None);
    }

    #[test]
    fn file_values_fill_unset_flags() {
        let settings = MissionSettings {
            fleet_size: Some(4),
            bind: Some("127.0.0.1:7000".into()),
            codec: Some(CodecMode::Text),
            targets: Some(PathBuf::from("/etc/fleet/targets.yaml")),
            return_home: Some(true),
            confirm: None,
            phase_timeout: Some(Duration::from_secs(5)),
            failure_policy: Some(FailurePolicy::Drop),
        };
        let resolved = resolve(&RunArgs::default(), settings);
        assert_eq!(resolved.options.fleet_size, 4);
        assert_eq!(resolved.options.codec, CodecMode::Text);
        assert!(resolved.options.return_home);
        assert_eq!(resolved.options.phase_timeout, Some(Duration::from_secs(5)));
        assert_eq!(resolved.options.failure_policy, FailurePolicy::Drop);
        assert_eq!(resolved.bind, "127.0.0.1:7000");
        assert_eq!(
            resolved.targets,
            Some(PathBuf::from("/etc/fleet/targets.yaml"))
        );
    }

    #[test]
    fn flags_override_file_values() {
        let args = RunArgs {
            fleet_size: Some(1),
            codec: Some(CodecMode::Binary),
            bind: Some("0.0.0.0:6000".into()),
            on_participant_failure: Some(FailurePolicy::Abort),
            ..RunArgs::default()
        };
        let settings = MissionSettings {
            fleet_size: Some(4),
            codec: Some(CodecMode::Text),
            bind: Some("127.0.0.1:7000".into()),
            failure_policy: Some(FailurePolicy::Drop),
            ..MissionSettings::default()
        };
        let resolved = resolve(&args, settings);
        assert_eq!(resolved.options.fleet_size, 1);
        assert_eq!(resolved.options.codec, CodecMode::Binary);
        assert_eq!(resolved.options.failure_policy, FailurePolicy::Abort);
        assert_eq!(resolved.bind, "0.0.0.0:6000");
    }

    #[tokio::test]
    async fn missing_settings_file_is_config_error() {
        let args = RunArgs {
            config: Some(PathBuf::from("/nonexistent/mission.yaml")),
            ..RunArgs::default()
        };
        let err = run(&args).await.unwrap_err();
        assert_eq!(err.exit_code(), crate::error::ExitCode::CONFIG_ERROR);
    }
}
