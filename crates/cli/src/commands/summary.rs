use std::io::Write;

use anyhow::Result;
use vmprobe_core::verdict::conclusion;
use vmprobe_core::{BrandKind, CapabilityProbe, Engine, Flagset};

/// Human-readable overview: one line per technique, then the aggregate.
pub fn summary_command<P: CapabilityProbe>(
    engine: &Engine<P>,
    flags: Flagset,
    out: &mut impl Write,
) -> Result<()> {
    let report = engine.report(flags);
    let percent = report.percentage();
    let brand = report.brand();

    writeln!(out, "vmprobe v{}", vmprobe_core::version())?;
    writeln!(out)?;
    for check in &report.checks {
        let status = match (check.enabled, check.detected) {
            (false, _) => "SKIPPED",
            (true, true) => "DETECTED",
            (true, false) => "not detected",
        };
        writeln!(out, "[{status:>12}] {} ({})", check.name, check.flag)?;
    }
    writeln!(out)?;

    let enabled = report.checks.iter().filter(|c| c.enabled).count();
    writeln!(out, "VM brand: {brand}")?;
    writeln!(out, "VM type: {}", BrandKind::of(brand))?;
    writeln!(out, "VM likeliness: {percent}%")?;
    writeln!(out, "VM confirmation: {}", report.outcome.is_virtual)?;
    writeln!(out, "VM detections: {}/{enabled}", report.detected_count())?;
    writeln!(out)?;
    writeln!(out, "{}", conclusion(percent, brand))?;
    Ok(())
}
