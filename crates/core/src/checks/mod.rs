//! Detection technique catalog.
//!
//! Each `Technique` binds one `Flag` to a fixed weight, a display name, the
//! platforms it is meaningful on, and a plain predicate over a
//! `CapabilityProbe`. The registry is built once per engine and iterated in
//! registration order on every evaluation. Order only affects diagnostics and
//! brand tally insertion order, never the score.

mod cpu;
mod linux;
mod system;

use std::panic::{catch_unwind, AssertUnwindSafe};

use log::warn;

use crate::brands::BrandTally;
use crate::config::EngineConfig;
use crate::model::{CheckResult, Flag, Flagset, Platform};
use crate::probe::CapabilityProbe;

/// Score contribution of each technique when it detects.
///
/// These are tunable constants with no derivation beyond field experience.
pub mod weight {
    pub const VMID: f64 = 6.5;
    pub const BRAND: f64 = 3.0;
    pub const HYPERVISOR_BIT: f64 = 5.5;
    pub const CPUID_0X4: f64 = 4.0;
    pub const HYPERVISOR_STR: f64 = 4.0;
    pub const RDTSC: f64 = 1.5;
    pub const SIDT: f64 = 4.0;
    pub const THREADCOUNT: f64 = 1.5;
    pub const MAC: f64 = 3.5;
    pub const TEMPERATURE: f64 = 1.0;
    pub const SYSTEMD: f64 = 5.0;
    pub const CVENDOR: f64 = 4.5;
    pub const CTYPE: f64 = 1.0;
    pub const DOCKERENV: f64 = 3.0;
    pub const DMIDECODE: f64 = 4.0;
    pub const DMESG: f64 = 3.5;
    pub const HWMON: f64 = 0.5;
    pub const CURSOR: f64 = 1.0;
}

pub const ANY_PLATFORM: &[Platform] =
    &[Platform::Linux, Platform::Windows, Platform::MacOs, Platform::Other];
pub const LINUX_ONLY: &[Platform] = &[Platform::Linux];
pub const WINDOWS_ONLY: &[Platform] = &[Platform::Windows];

/// Everything a predicate may look at during one evaluation.
pub struct CheckContext<'a, P: CapabilityProbe> {
    pub probe: &'a P,
    pub config: &'a EngineConfig,
    /// Answer of the once-per-evaluation CPUID support probe.
    pub cpuid_supported: bool,
    pub tally: &'a mut BrandTally,
}

/// Predicate signature shared by every technique.
pub type Predicate<P> = fn(&mut CheckContext<'_, P>) -> bool;

/// One registry entry.
pub struct Technique<P: CapabilityProbe> {
    pub flag: Flag,
    pub name: &'static str,
    pub weight: f64,
    pub platforms: &'static [Platform],
    predicate: Predicate<P>,
}

impl<P: CapabilityProbe> Clone for Technique<P> {
    fn clone(&self) -> Self {
        Self {
            flag: self.flag,
            name: self.name,
            weight: self.weight,
            platforms: self.platforms,
            predicate: self.predicate,
        }
    }
}

impl<P: CapabilityProbe> std::fmt::Debug for Technique<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Technique")
            .field("flag", &self.flag)
            .field("name", &self.name)
            .field("weight", &self.weight)
            .field("platforms", &self.platforms)
            .finish()
    }
}

impl<P: CapabilityProbe> Technique<P> {
    pub fn new(
        flag: Flag,
        name: &'static str,
        weight: f64,
        platforms: &'static [Platform],
        predicate: Predicate<P>,
    ) -> Self {
        Self { flag, name, weight, platforms, predicate }
    }

    pub fn supports(&self, platform: Platform) -> bool {
        self.platforms.contains(&platform)
    }

    /// Run the predicate if `flags` selects this technique.
    ///
    /// A panicking predicate counts as "not detected"; tally entries it made
    /// before panicking are kept.
    pub fn run(&self, flags: Flagset, ctx: &mut CheckContext<'_, P>) -> bool {
        if !flags.contains(self.flag) {
            return false;
        }
        let predicate = self.predicate;
        match catch_unwind(AssertUnwindSafe(|| predicate(ctx))) {
            Ok(detected) => detected,
            Err(_) => {
                warn!("technique {} panicked; treating as not detected", self.name);
                false
            }
        }
    }

    pub fn result(&self, enabled: bool, detected: bool) -> CheckResult {
        CheckResult { flag: self.flag, name: self.name, weight: self.weight, enabled, detected }
    }
}

/// Ordered catalog of techniques; lookups are by flag.
pub struct CheckRegistry<P: CapabilityProbe> {
    techniques: Vec<Technique<P>>,
}

impl<P: CapabilityProbe> Default for CheckRegistry<P> {
    fn default() -> Self {
        Self { techniques: Vec::new() }
    }
}

impl<P: CapabilityProbe> CheckRegistry<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a technique. A later registration for the same flag replaces
    /// the earlier one in place.
    pub fn register(&mut self, technique: Technique<P>) -> &mut Self {
        match self.techniques.iter_mut().find(|t| t.flag == technique.flag) {
            Some(slot) => *slot = technique,
            None => self.techniques.push(technique),
        }
        self
    }

    pub fn get(&self, flag: Flag) -> Option<&Technique<P>> {
        self.techniques.iter().find(|t| t.flag == flag)
    }

    /// Display names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.techniques.iter().map(|t| t.name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Technique<P>> {
        self.techniques.iter()
    }

    pub fn as_slice(&self) -> &[Technique<P>] {
        &self.techniques
    }

    pub fn len(&self) -> usize {
        self.techniques.len()
    }

    pub fn is_empty(&self) -> bool {
        self.techniques.is_empty()
    }

    /// Keep only techniques meaningful on `platform`.
    pub fn for_platform(mut self, platform: Platform) -> Self {
        self.techniques.retain(|t| t.supports(platform));
        self
    }
}

/// The full catalog in evaluation order.
///
/// `Flag::VmwarePort` keeps its bit but has no technique: the I/O port
/// backdoor faults outside VMware when issued from user mode.
pub fn default_registry<P: CapabilityProbe>() -> CheckRegistry<P> {
    let mut registry = CheckRegistry::new();
    registry
        .register(Technique::new(Flag::Vmid, "VMID", weight::VMID, ANY_PLATFORM, cpu::vmid))
        .register(Technique::new(
            Flag::Brand,
            "CPU brand",
            weight::BRAND,
            ANY_PLATFORM,
            cpu::brand_string,
        ))
        .register(Technique::new(
            Flag::HypervisorBit,
            "Hypervisor bit",
            weight::HYPERVISOR_BIT,
            ANY_PLATFORM,
            cpu::hypervisor_bit,
        ))
        .register(Technique::new(
            Flag::Cpuid0x4,
            "CPUID 0x4 leaf",
            weight::CPUID_0X4,
            ANY_PLATFORM,
            cpu::hypervisor_leaf_range,
        ))
        .register(Technique::new(
            Flag::HypervisorStr,
            "Hypervisor length",
            weight::HYPERVISOR_STR,
            ANY_PLATFORM,
            cpu::hypervisor_str,
        ))
        .register(Technique::new(Flag::Rdtsc, "RDTSC", weight::RDTSC, ANY_PLATFORM, cpu::rdtsc))
        .register(Technique::new(Flag::Sidt, "SIDT", weight::SIDT, ANY_PLATFORM, cpu::sidt))
        .register(Technique::new(
            Flag::ThreadCount,
            "Processor count",
            weight::THREADCOUNT,
            ANY_PLATFORM,
            system::thread_count,
        ))
        .register(Technique::new(Flag::Mac, "MAC OUI", weight::MAC, ANY_PLATFORM, system::mac))
        .register(Technique::new(
            Flag::Temperature,
            "Thermal zone",
            weight::TEMPERATURE,
            LINUX_ONLY,
            linux::temperature,
        ))
        .register(Technique::new(
            Flag::Systemd,
            "systemd virt",
            weight::SYSTEMD,
            LINUX_ONLY,
            linux::systemd,
        ))
        .register(Technique::new(
            Flag::ChassisVendor,
            "Chassis vendor",
            weight::CVENDOR,
            LINUX_ONLY,
            linux::chassis_vendor,
        ))
        .register(Technique::new(
            Flag::ChassisType,
            "Chassis type",
            weight::CTYPE,
            LINUX_ONLY,
            linux::chassis_type,
        ))
        .register(Technique::new(
            Flag::Dockerenv,
            "Docker marker",
            weight::DOCKERENV,
            LINUX_ONLY,
            linux::dockerenv,
        ))
        .register(Technique::new(
            Flag::Dmidecode,
            "dmidecode",
            weight::DMIDECODE,
            LINUX_ONLY,
            linux::dmidecode,
        ))
        .register(Technique::new(Flag::Dmesg, "dmesg", weight::DMESG, LINUX_ONLY, linux::dmesg))
        .register(Technique::new(Flag::Hwmon, "hwmon", weight::HWMON, LINUX_ONLY, linux::hwmon))
        .register(Technique::new(
            Flag::Cursor,
            "Cursor idle",
            weight::CURSOR,
            WINDOWS_ONLY,
            system::cursor,
        ));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ScriptedProbe;

    #[test]
    fn registry_order_and_gaps() {
        let registry = default_registry::<ScriptedProbe>();
        assert_eq!(registry.len(), 18);
        assert!(registry.get(Flag::VmwarePort).is_none());
        assert_eq!(registry.names().first(), Some(&"VMID"));
        assert_eq!(registry.names().last(), Some(&"Cursor idle"));
    }

    #[test]
    fn platform_filter_drops_other_os_techniques() {
        let linux = default_registry::<ScriptedProbe>().for_platform(Platform::Linux);
        assert_eq!(linux.len(), 17);
        assert!(linux.get(Flag::Cursor).is_none());

        let mac = default_registry::<ScriptedProbe>().for_platform(Platform::MacOs);
        assert_eq!(mac.len(), 9);
        assert!(mac.get(Flag::Hwmon).is_none());
    }

    #[test]
    fn weights_are_non_negative() {
        for technique in default_registry::<ScriptedProbe>().iter() {
            assert!(technique.weight >= 0.0, "{}", technique.name);
        }
    }

    #[test]
    fn register_replaces_same_flag() {
        fn always(_: &mut CheckContext<'_, ScriptedProbe>) -> bool {
            true
        }
        let mut registry = default_registry::<ScriptedProbe>();
        registry.register(Technique::new(Flag::Mac, "replaced", 1.0, ANY_PLATFORM, always));
        assert_eq!(registry.len(), 18);
        assert_eq!(registry.get(Flag::Mac).map(|t| t.name), Some("replaced"));
    }

    #[test]
    fn panicking_predicate_counts_as_false() {
        fn boom(_: &mut CheckContext<'_, ScriptedProbe>) -> bool {
            panic!("probe exploded")
        }
        let technique = Technique::new(Flag::Mac, "boom", 1.0, ANY_PLATFORM, boom);
        let probe = ScriptedProbe::new();
        let config = EngineConfig::default();
        let mut tally = BrandTally::new();
        let mut ctx =
            CheckContext { probe: &probe, config: &config, cpuid_supported: false, tally: &mut tally };
        assert!(!technique.run(Flagset::ALL, &mut ctx));
    }

    #[test]
    fn unset_flag_skips_predicate() {
        fn always(_: &mut CheckContext<'_, ScriptedProbe>) -> bool {
            true
        }
        let technique = Technique::new(Flag::Mac, "always", 1.0, ANY_PLATFORM, always);
        let probe = ScriptedProbe::new();
        let config = EngineConfig::default();
        let mut tally = BrandTally::new();
        let mut ctx =
            CheckContext { probe: &probe, config: &config, cpuid_supported: true, tally: &mut tally };
        assert!(!technique.run(Flagset::ALL.without(Flag::Mac), &mut ctx));
        assert!(technique.run(Flag::Mac.into(), &mut ctx));
    }
}
