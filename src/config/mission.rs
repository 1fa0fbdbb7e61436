//! Mission settings file.
//!
//! An optional YAML file that supplies defaults for `fleetctl run`:
//!
//! ```yaml
//! fleet_size: 3
//! bind: 0.0.0.0:5000
//! codec: text
//! targets: targets.yaml        # relative to this file
//! return_home: true
//! confirm: false
//! phase_timeout: 90s
//! failure_policy: drop
//! ```
//!
//! Every key is optional; unknown keys are rejected. Explicit command-line
//! flags take precedence over values from this file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use super::{env_or, read_config_file};
use crate::codec::CodecMode;
use crate::error::ConfigError;
use crate::phase::FailurePolicy;

/// Values read from a mission settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MissionSettings {
    /// Number of participants to accept. Bounded by the participant
    /// identity range, so larger values fail to parse.
    pub fleet_size: Option<u32>,
    /// Listen address.
    pub bind: Option<String>,
    /// Wire codec.
    pub codec: Option<CodecMode>,
    /// Targets file.
    pub targets: Option<PathBuf>,
    /// Run RTL and LAND after READY.
    pub return_home: Option<bool>,
    /// Wait for operator confirmation before teardown.
    pub confirm: Option<bool>,
    /// Per-phase deadline (humantime, e.g. `30s`).
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub phase_timeout: Option<Duration>,
    /// Participant failure policy.
    pub failure_policy: Option<FailurePolicy>,
}

/// Loads and validates a mission settings file.
///
/// A relative `targets` path is resolved against the settings file's
/// directory.
///
/// # Errors
///
/// Returns `ConfigError::MissingFile` if the file cannot be read,
/// `ConfigError::ParseError` for invalid YAML, unknown keys, or a fleet
/// size beyond `u32`, and `ConfigError::InvalidValue` for a zero fleet
/// size.
pub fn load_settings(path: &Path) -> Result<MissionSettings, ConfigError> {
    let content = read_config_file(path, env_or("FLEETCTL_MAX_CONFIG_SIZE", 1024 * 1024))?;
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);

    let mut settings: MissionSettings = if content.trim().is_empty() {
        MissionSettings::default()
    } else {
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })?
    };

    if settings.fleet_size == Some(0) {
        return Err(ConfigError::InvalidValue {
            field: "fleet_size".to_string(),
            value: "0".to_string(),
            expected: "at least 1".to_string(),
        });
    }

    if let Some(targets) = settings.targets.take() {
        settings.targets = Some(match path.parent() {
            Some(dir) if targets.is_relative() => dir.join(targets),
            _ => targets,
        });
    }

    Ok(settings)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
        .transpose()
}
