use std::io::Write;

use anyhow::{Context, Result};
use vmprobe_core::{CapabilityProbe, Engine, Flagset};

/// Validate a single-technique flagset, then run just that technique.
pub fn check_command<P: CapabilityProbe>(
    engine: &Engine<P>,
    flags: Flagset,
    out: &mut impl Write,
) -> Result<()> {
    engine.check(flags).with_context(|| format!("Rejected flagset {flags}"))?;
    let detected = engine.run_technique(flags).with_context(|| format!("Cannot run {flags}"))?;
    let name = flags.single().map(|f| f.label()).unwrap_or("?");
    writeln!(out, "{name}: {}", if detected { "detected" } else { "not detected" })?;
    Ok(())
}
