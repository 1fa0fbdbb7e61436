//! Configuration loading.
//!
//! Two files feed a mission: the targets file (a tolerant line format, see
//! [`targets`]) and an optional mission settings file in YAML (see
//! [`mission`]).

pub mod mission;
pub mod targets;

pub use mission::{MissionSettings, load_settings};
pub use targets::{ParsedTargets, TargetFormat, TargetTable, load_targets, parse_targets};

use std::path::Path;

use crate::error::ConfigError;

/// Reads an environment variable, falling back to `default` when unset or
/// unparsable.
pub(crate) fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Reads a UTF-8 configuration file no larger than `max_size` bytes.
pub(crate) fn read_config_file(path: &Path, max_size: usize) -> Result<String, ConfigError> {
    let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
        path: path.to_path_buf(),
    })?;

    let file_size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
    if file_size > max_size {
        return Err(ConfigError::InvalidValue {
            field: "file_size".to_string(),
            value: format!("{file_size} bytes"),
            expected: format!("at most {max_size} bytes"),
        });
    }

    std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
        path: path.to_path_buf(),
    })
}
