use std::io::Write;

use anyhow::{Context, Result};
use vmprobe_core::{CapabilityProbe, Engine, Flagset};

/// Full evaluation report, as JSON or a short text table.
pub fn report_command<P: CapabilityProbe>(
    engine: &Engine<P>,
    flags: Flagset,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let report = engine.report(flags);

    if json {
        let serialized =
            serde_json::to_string_pretty(&*report).context("Failed to serialize report to JSON")?;
        writeln!(out, "{serialized}")?;
        return Ok(());
    }

    writeln!(out, "Flagset: {}", report.flagset)?;
    writeln!(out, "Platform: {:?}", report.platform)?;
    writeln!(out, "CPUID supported: {}", report.cpuid_supported)?;
    writeln!(out, "Evaluated at: {}", report.evaluated_at)?;
    writeln!(out, "Score: {} (threshold {})", report.outcome.score, report.threshold)?;
    writeln!(out, "Virtual: {}", report.outcome.is_virtual)?;
    writeln!(out, "Brand: {}", report.outcome.brand_or_unknown())?;

    writeln!(out, "Detected:")?;
    let detected: Vec<_> = report.checks.iter().filter(|c| c.detected).collect();
    if detected.is_empty() {
        writeln!(out, "  (none)")?;
    }
    for check in detected {
        writeln!(out, "  - {} [{}] +{}", check.name, check.flag, check.weight)?;
    }

    if !report.tally.is_empty() {
        writeln!(out, "Brand votes:")?;
        for entry in report.tally.entries() {
            writeln!(out, "  - {}: {}", entry.brand, entry.count)?;
        }
    }
    Ok(())
}
