//! Target table loading.
//!
//! Two mutually exclusive file forms are accepted, chosen once per file:
//!
//! ```text
//! # bracketed form, selected by a `targets:` header
//! targets:
//!   - [10.0, 20.0, 30.0]
//!   - [-5.5, 0, 12]
//!
//! # legacy CSV form, used when no header exists
//! 10.0,20.0,30.0
//! -5.5,0,12
//! ```
//!
//! Malformed lines are skipped with a warning. At most `limit` entries are
//! kept, in file order; entry `i` belongs to participant `i + 1`.

use std::path::Path;

use tracing::{debug, warn};

use super::{env_or, read_config_file};
use crate::codec::Target;
use crate::error::ConfigError;
use crate::participant::ParticipantId;

const SECTION_HEADER: &str = "targets:";

/// Which of the two file forms a targets file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    /// `- [x, y, z]` entries under a `targets:` header.
    Bracketed,
    /// One `x,y,z` line per participant.
    Csv,
}

/// Immutable mapping from participant index to target coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetTable {
    targets: Vec<Target>,
}

impl TargetTable {
    /// Creates a table from targets in participant order.
    #[must_use]
    pub const fn new(targets: Vec<Target>) -> Self {
        Self { targets }
    }

    /// Returns the target at a 0-based index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Target> {
        self.targets.get(index).copied()
    }

    /// Returns the target for a participant.
    #[must_use]
    pub fn for_participant(&self, id: ParticipantId) -> Option<Target> {
        self.get(id.index())
    }

    /// Returns the number of loaded targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns whether no targets were loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Iterates over targets in participant order.
    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }
}

/// Result of parsing a targets file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTargets {
    /// Loaded targets.
    pub table: TargetTable,
    /// Form the file was parsed as.
    pub format: TargetFormat,
    /// 1-based line numbers that were skipped as malformed.
    pub skipped: Vec<usize>,
    /// Whether valid entries beyond `limit` were ignored.
    pub truncated: bool,
}

/// Parses targets-file content, keeping at most `limit` entries.
#[must_use]
pub fn parse_targets(content: &str, limit: usize) -> ParsedTargets {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let format = if content.lines().any(is_section_header) {
        TargetFormat::Bracketed
    } else {
        TargetFormat::Csv
    };

    let mut parsed = ParsedTargets {
        table: TargetTable::default(),
        format,
        skipped: Vec::new(),
        truncated: false,
    };
    let mut in_section = false;

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();

        if format == TargetFormat::Bracketed {
            if !in_section {
                in_section = is_section_header(line);
                continue;
            }
            let top_level = !line.starts_with([' ', '\t']);
            if top_level && !trimmed.is_empty() && !trimmed.starts_with('#') {
                break;
            }
        }

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let entry = match format {
            TargetFormat::Bracketed => parse_bracketed(trimmed),
            TargetFormat::Csv => Target::parse_csv(trimmed),
        }
        .filter(|t| t.x.is_finite() && t.y.is_finite() && t.z.is_finite());

        let Some(target) = entry else {
            warn!(line = line_no, content = %trimmed, "skipping malformed target line");
            parsed.skipped.push(line_no);
            continue;
        };

        if parsed.table.len() == limit {
            parsed.truncated = true;
            break;
        }
        debug!(index = parsed.table.len(), %target, "loaded target");
        parsed.table.targets.push(target);
    }

    parsed
}

/// Loads a targets file, keeping at most `limit` entries.
///
/// # Errors
///
/// Returns `ConfigError::MissingFile` if the file cannot be read, or
/// `ConfigError::InvalidValue` if it exceeds `FLEETCTL_MAX_CONFIG_SIZE`.
pub fn load_targets(path: &Path, limit: usize) -> Result<ParsedTargets, ConfigError> {
    let content = read_config_file(path, env_or("FLEETCTL_MAX_CONFIG_SIZE", 1024 * 1024))?;
    let parsed = parse_targets(&content, limit);
    if parsed.truncated {
        warn!(
            path = %path.display(),
            limit,
            "more targets than participants; extra entries ignored"
        );
    }
    Ok(parsed)
}

fn is_section_header(line: &str) -> bool {
    line.trim_start().starts_with(SECTION_HEADER)
}

/// Parses `- [x, y, z]`, allowing a trailing `# comment`.
fn parse_bracketed(line: &str) -> Option<Target> {
    let rest = line.strip_prefix('-')?.trim_start();
    let rest = rest.strip_prefix('[')?;
    let (inner, tail) = rest.split_once(']')?;
    let tail = tail.trim();
    if !tail.is_empty() && !tail.starts_with('#') {
        return None;
    }
    Target::parse_csv(inner)
}
