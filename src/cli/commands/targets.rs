//! `targets` command handler.
//!
//! Parses a targets file exactly as `run` would and prints the result.

use std::io::Write;

use serde::Serialize;

use crate::cli::args::TargetsArgs;
use crate::codec::Target;
use crate::config::targets::{ParsedTargets, TargetFormat, load_targets};
use crate::error::FleetError;

#[derive(Serialize)]
struct TargetsSummary<'a> {
    format: &'static str,
    targets: Vec<&'a Target>,
    skipped_lines: &'a [usize],
    truncated: bool,
}

/// Prints the targets a file would load.
///
/// # Errors
///
/// Returns a config error if the file cannot be read, or an I/O error if
/// stdout is closed.
pub fn run(args: &TargetsArgs) -> Result<(), FleetError> {
    let limit = args.fleet_size.map_or(usize::MAX, |n| n as usize);
    let parsed = load_targets(&args.path, limit)?;
    let mut out = std::io::stdout().lock();
    if args.json {
        serde_json::to_writer_pretty(&mut out, &summary(&parsed))?;
        writeln!(out)?;
    } else {
        render(&mut out, &parsed)?;
    }
    Ok(())
}

fn summary(parsed: &ParsedTargets) -> TargetsSummary<'_> {
    TargetsSummary {
        format: format_name(parsed.format),
        targets: parsed.table.iter().collect(),
        skipped_lines: &parsed.skipped,
        truncated: parsed.truncated,
    }
}

const fn format_name(format: TargetFormat) -> &'static str {
    match format {
        TargetFormat::Bracketed => "bracketed",
        TargetFormat::Csv => "csv",
    }
}

fn render(out: &mut impl Write, parsed: &ParsedTargets) -> std::io::Result<()> {
    writeln!(
        out,
        "{} target(s), {} format",
        parsed.table.len(),
        format_name(parsed.format)
    )?;
    for (index, target) in parsed.table.iter().enumerate() {
        writeln!(out, "  participant {}: ({target})", index + 1)?;
    }
    if !parsed.skipped.is_empty() {
        let lines: Vec<String> = parsed.skipped.iter().map(ToString::to_string).collect();
        writeln!(out, "skipped malformed line(s): {}", lines.join(", "))?;
    }
    if parsed.truncated {
        writeln!(out, "further entries ignored beyond the fleet size")?;
    }
    Ok(())
}
