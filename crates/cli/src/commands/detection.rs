use std::io::Write;

use anyhow::Result;
use vmprobe_core::verdict::conclusion;
use vmprobe_core::{CapabilityProbe, Engine, Flagset};

/// Print `true` or `false`.
pub fn detect_command<P: CapabilityProbe>(
    engine: &Engine<P>,
    flags: Flagset,
    out: &mut impl Write,
) -> Result<()> {
    writeln!(out, "{}", engine.detect(flags))?;
    Ok(())
}

/// Print the best-guess brand for the evaluation of `flags`.
pub fn brand_command<P: CapabilityProbe>(
    engine: &Engine<P>,
    flags: Flagset,
    out: &mut impl Write,
) -> Result<()> {
    writeln!(out, "{}", engine.brand_for(flags))?;
    Ok(())
}

pub fn percent_command<P: CapabilityProbe>(
    engine: &Engine<P>,
    flags: Flagset,
    out: &mut impl Write,
) -> Result<()> {
    writeln!(out, "{}", engine.percentage(flags))?;
    Ok(())
}

/// Print the brand's classification (hypervisor type, emulator, ...).
pub fn type_command<P: CapabilityProbe>(
    engine: &Engine<P>,
    flags: Flagset,
    out: &mut impl Write,
) -> Result<()> {
    writeln!(out, "{}", engine.brand_type_for(flags))?;
    Ok(())
}

pub fn conclusion_command<P: CapabilityProbe>(
    engine: &Engine<P>,
    flags: Flagset,
    out: &mut impl Write,
) -> Result<()> {
    let report = engine.report(flags);
    writeln!(out, "{}", conclusion(report.percentage(), report.brand()))?;
    Ok(())
}

/// Print how many techniques detected.
pub fn count_command<P: CapabilityProbe>(
    engine: &Engine<P>,
    flags: Flagset,
    out: &mut impl Write,
) -> Result<()> {
    writeln!(out, "{}", engine.report(flags).detected_count())?;
    Ok(())
}

/// Silent verdict for scripts: true when virtual.
pub fn status_command<P: CapabilityProbe>(engine: &Engine<P>, flags: Flagset) -> bool {
    engine.detect(flags)
}
