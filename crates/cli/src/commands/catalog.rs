use std::io::Write;

use anyhow::Result;
use serde::Serialize;
use vmprobe_core::{Brand, CapabilityProbe, Engine, Flag};

#[derive(Debug, Serialize)]
pub struct TechniqueInfo {
    pub flag: Flag,
    pub bit: u32,
    pub name: &'static str,
    pub weight: f64,
}

#[derive(Debug, Serialize)]
pub struct BrandInfo {
    pub name: &'static str,
    pub kind: String,
}

/// List every brand the engine can attribute.
pub fn brands_command(json: bool, out: &mut impl Write) -> Result<()> {
    let entries: Vec<BrandInfo> = Brand::ALL
        .iter()
        .map(|b| BrandInfo { name: b.name(), kind: b.kind().describe().to_string() })
        .collect();

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&entries)?)?;
        return Ok(());
    }
    for entry in entries {
        writeln!(out, "{}", entry.name)?;
    }
    Ok(())
}

/// List the techniques registered for the engine's platform.
pub fn techniques_command<P: CapabilityProbe>(
    engine: &Engine<P>,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let entries: Vec<TechniqueInfo> = engine
        .techniques()
        .iter()
        .map(|t| TechniqueInfo { flag: t.flag, bit: t.flag.bit(), name: t.name, weight: t.weight })
        .collect();

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&entries)?)?;
        return Ok(());
    }

    writeln!(out, "Techniques ({}):", entries.len())?;
    if entries.is_empty() {
        writeln!(out, "  (none)")?;
        return Ok(());
    }
    for entry in entries {
        writeln!(
            out,
            "  - {:<15} bit {:>2}  weight {:>4.1}  {}",
            entry.flag.label(),
            entry.bit,
            entry.weight,
            entry.name
        )?;
    }
    Ok(())
}
