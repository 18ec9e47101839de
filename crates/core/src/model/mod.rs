//! Core data model: technique flags, flagsets, per-check results, and the
//! evaluation outcome.
//!
//! A `Flag` names one detection technique and owns one bit of a 64-bit mask.
//! A `Flagset` combines flags to select which techniques take part in an
//! evaluation. Unset bits mean "skip", never "error"; only the strict
//! single-flag validator in the engine rejects a flagset.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::brands::BrandTally;
use crate::error::EngineError;

/// Named detection technique bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Flag {
    Vmid,
    Brand,
    HypervisorBit,
    Cpuid0x4,
    HypervisorStr,
    Rdtsc,
    Sidt,
    VmwarePort,
    ThreadCount,
    Mac,
    Temperature,
    Systemd,
    ChassisVendor,
    ChassisType,
    Dockerenv,
    Dmidecode,
    Dmesg,
    Hwmon,
    /// Windows-only UI probe; excluded from the default flagset.
    Cursor,
}

impl Flag {
    /// Every named flag in bit order.
    pub const ALL: [Flag; 19] = [
        Flag::Vmid,
        Flag::Brand,
        Flag::HypervisorBit,
        Flag::Cpuid0x4,
        Flag::HypervisorStr,
        Flag::Rdtsc,
        Flag::Sidt,
        Flag::VmwarePort,
        Flag::ThreadCount,
        Flag::Mac,
        Flag::Temperature,
        Flag::Systemd,
        Flag::ChassisVendor,
        Flag::ChassisType,
        Flag::Dockerenv,
        Flag::Dmidecode,
        Flag::Dmesg,
        Flag::Hwmon,
        Flag::Cursor,
    ];

    /// Bit position of this flag inside a flagset.
    pub const fn bit(self) -> u32 {
        match self {
            Flag::Vmid => 0,
            Flag::Brand => 1,
            Flag::HypervisorBit => 2,
            Flag::Cpuid0x4 => 3,
            Flag::HypervisorStr => 4,
            Flag::Rdtsc => 5,
            Flag::Sidt => 6,
            Flag::VmwarePort => 7,
            Flag::ThreadCount => 8,
            Flag::Mac => 9,
            Flag::Temperature => 10,
            Flag::Systemd => 11,
            Flag::ChassisVendor => 12,
            Flag::ChassisType => 13,
            Flag::Dockerenv => 14,
            Flag::Dmidecode => 15,
            Flag::Dmesg => 16,
            Flag::Hwmon => 17,
            Flag::Cursor => 30,
        }
    }

    pub const fn mask(self) -> u64 {
        1u64 << self.bit()
    }

    pub fn from_bit(bit: u32) -> Option<Flag> {
        Flag::ALL.iter().copied().find(|flag| flag.bit() == bit)
    }

    /// Upper-case label used on the command line and in reports.
    pub fn label(self) -> &'static str {
        match self {
            Flag::Vmid => "VMID",
            Flag::Brand => "BRAND",
            Flag::HypervisorBit => "HYPERVISOR_BIT",
            Flag::Cpuid0x4 => "CPUID_0X4",
            Flag::HypervisorStr => "HYPERVISOR_STR",
            Flag::Rdtsc => "RDTSC",
            Flag::Sidt => "SIDT",
            Flag::VmwarePort => "VMWARE_PORT",
            Flag::ThreadCount => "THREADCOUNT",
            Flag::Mac => "MAC",
            Flag::Temperature => "TEMPERATURE",
            Flag::Systemd => "SYSTEMD",
            Flag::ChassisVendor => "CVENDOR",
            Flag::ChassisType => "CTYPE",
            Flag::Dockerenv => "DOCKERENV",
            Flag::Dmidecode => "DMIDECODE",
            Flag::Dmesg => "DMESG",
            Flag::Hwmon => "HWMON",
            Flag::Cursor => "CURSOR",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Flag {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Flag::ALL
            .iter()
            .copied()
            .find(|flag| flag.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| EngineError::invalid_argument(format!("unknown technique '{wanted}'")))
    }
}

/// A 64-bit mask selecting active techniques.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Flagset(u64);

impl Flagset {
    /// Every bit set, including the platform UI bit.
    pub const ALL: Flagset = Flagset(u64::MAX);
    pub const EMPTY: Flagset = Flagset(0);
    /// Every bit except `Flag::Cursor`.
    pub const DEFAULT: Flagset = Flagset(u64::MAX & !Flag::Cursor.mask());

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn contains(self, flag: Flag) -> bool {
        self.0 & flag.mask() != 0
    }

    pub const fn with(self, flag: Flag) -> Self {
        Self(self.0 | flag.mask())
    }

    pub const fn without(self, flag: Flag) -> Self {
        Self(self.0 & !flag.mask())
    }

    /// Number of set bits.
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The named flag when exactly one bit is set and that bit is named.
    pub fn single(self) -> Option<Flag> {
        if self.count() != 1 {
            return None;
        }
        Flag::from_bit(self.0.trailing_zeros())
    }

    /// Named flags present in this set, in bit order.
    pub fn flags(self) -> impl Iterator<Item = Flag> {
        Flag::ALL.into_iter().filter(move |flag| self.contains(*flag))
    }
}

impl fmt::Debug for Flagset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flagset({:#018x})", self.0)
    }
}

impl fmt::Display for Flagset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<Flag> for Flagset {
    fn from(flag: Flag) -> Self {
        Flagset(flag.mask())
    }
}

impl BitOr for Flagset {
    type Output = Flagset;

    fn bitor(self, rhs: Flagset) -> Flagset {
        Flagset(self.0 | rhs.0)
    }
}

impl BitOr<Flag> for Flagset {
    type Output = Flagset;

    fn bitor(self, rhs: Flag) -> Flagset {
        self.with(rhs)
    }
}

impl BitOr for Flag {
    type Output = Flagset;

    fn bitor(self, rhs: Flag) -> Flagset {
        Flagset::from(self).with(rhs)
    }
}

impl BitOrAssign<Flag> for Flagset {
    fn bitor_assign(&mut self, rhs: Flag) {
        *self = self.with(rhs);
    }
}

impl FromStr for Flagset {
    type Err = EngineError;

    /// Accepts `all`, `default`, a decimal or `0x` hex mask, or a comma
    /// separated list of technique labels (`VMID,BRAND`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.eq_ignore_ascii_case("all") {
            return Ok(Flagset::ALL);
        }
        if raw.eq_ignore_ascii_case("default") {
            return Ok(Flagset::DEFAULT);
        }
        if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
            return u64::from_str_radix(hex, 16)
                .map(Flagset)
                .map_err(|e| EngineError::invalid_argument(format!("bad hex flagset '{raw}': {e}")));
        }
        if raw.chars().all(|c| c.is_ascii_digit()) && !raw.is_empty() {
            return raw
                .parse::<u64>()
                .map(Flagset)
                .map_err(|e| EngineError::invalid_argument(format!("bad flagset '{raw}': {e}")));
        }

        let mut set = Flagset::EMPTY;
        for part in raw.split(',').filter(|p| !p.trim().is_empty()) {
            set |= part.parse::<Flag>()?;
        }
        if set.is_empty() {
            return Err(EngineError::invalid_argument("empty flagset"));
        }
        Ok(set)
    }
}

/// Operating system family a technique is available on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Linux,
    Windows,
    MacOs,
    Other,
}

impl Platform {
    /// Platform the crate was built for.
    pub const fn current() -> Self {
        if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Other
        }
    }
}

/// Result of one technique within one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub flag: Flag,
    pub name: &'static str,
    pub weight: f64,
    /// Whether the technique's bit was set in the active flagset.
    pub enabled: bool,
    pub detected: bool,
}

/// Final judgment of one evaluation. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub is_virtual: bool,
    /// Exact sum of the weights of every technique that detected.
    pub score: f64,
    /// Leading brand from the tally, if any technique attributed one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

impl EvaluationOutcome {
    /// Brand as reported to callers: `"Unknown"` unless virtual and attributed.
    pub fn brand_or_unknown(&self) -> &str {
        match (&self.brand, self.is_virtual) {
            (Some(brand), true) => brand,
            _ => "Unknown",
        }
    }
}

/// Everything produced by one evaluation, kept together in the result cache.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    /// Flagset the evaluation ran with.
    pub flagset: Flagset,
    pub platform: Platform,
    pub cpuid_supported: bool,
    pub threshold: f64,
    pub outcome: EvaluationOutcome,
    /// Per-technique results in registry order.
    pub checks: Vec<CheckResult>,
    pub tally: BrandTally,
    /// RFC 3339 timestamp of the evaluation.
    pub evaluated_at: String,
}

impl EvaluationReport {
    pub fn detected_count(&self) -> usize {
        self.checks.iter().filter(|c| c.detected).count()
    }

    pub fn result_for(&self, flag: Flag) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.flag == flag)
    }

    /// Score relative to this report's threshold, capped at 100.
    pub fn percentage(&self) -> u8 {
        crate::engine::percentage_of(self.outcome.score, self.threshold)
    }

    pub fn brand(&self) -> &str {
        self.outcome.brand_or_unknown()
    }
}
