//! Known hypervisor, emulator, container and sandbox vendors, plus the
//! per-evaluation scoreboard used to guess which one we are running under.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Vendors a technique can attribute a match to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Brand {
    VMware,
    VirtualBox,
    Kvm,
    Bhyve,
    Qemu,
    HyperV,
    MicrosoftXta,
    Parallels,
    Xen,
    Acrn,
    Qnx,
    HybridAnalysis,
    Sandboxie,
    Docker,
    Wine,
    VirtualApple,
}

impl Brand {
    pub const ALL: [Brand; 16] = [
        Brand::VMware,
        Brand::VirtualBox,
        Brand::Kvm,
        Brand::Bhyve,
        Brand::Qemu,
        Brand::HyperV,
        Brand::MicrosoftXta,
        Brand::Parallels,
        Brand::Xen,
        Brand::Acrn,
        Brand::Qnx,
        Brand::HybridAnalysis,
        Brand::Sandboxie,
        Brand::Docker,
        Brand::Wine,
        Brand::VirtualApple,
    ];

    /// Display name returned by `Engine::brand`.
    pub fn name(self) -> &'static str {
        match self {
            Brand::VMware => "VMware",
            Brand::VirtualBox => "VirtualBox",
            Brand::Kvm => "KVM",
            Brand::Bhyve => "bhyve",
            Brand::Qemu => "QEMU",
            Brand::HyperV => "Microsoft Hyper-V",
            Brand::MicrosoftXta => "Microsoft x86-to-ARM",
            Brand::Parallels => "Parallels",
            Brand::Xen => "Xen HVM",
            Brand::Acrn => "ACRN",
            Brand::Qnx => "QNX hypervisor",
            Brand::HybridAnalysis => "Hybrid Analysis",
            Brand::Sandboxie => "Sandboxie",
            Brand::Docker => "Docker",
            Brand::Wine => "Wine",
            Brand::VirtualApple => "Virtual Apple",
        }
    }

    pub fn kind(self) -> BrandKind {
        match self {
            Brand::Xen | Brand::Acrn | Brand::Qnx | Brand::HyperV | Brand::Kvm | Brand::Bhyve => {
                BrandKind::HypervisorType1
            }
            Brand::VMware | Brand::VirtualBox | Brand::Parallels | Brand::VirtualApple => {
                BrandKind::HypervisorType2
            }
            Brand::Qemu | Brand::MicrosoftXta => BrandKind::Emulator,
            Brand::Docker => BrandKind::Container,
            Brand::HybridAnalysis | Brand::Sandboxie => BrandKind::Sandbox,
            Brand::Wine => BrandKind::CompatibilityLayer,
        }
    }

    pub fn from_name(name: &str) -> Option<Brand> {
        Brand::ALL.iter().copied().find(|b| b.name() == name)
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Coarse classification of a brand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrandKind {
    HypervisorType1,
    HypervisorType2,
    Emulator,
    Container,
    Sandbox,
    CompatibilityLayer,
    Unknown,
}

impl BrandKind {
    pub fn describe(self) -> &'static str {
        match self {
            BrandKind::HypervisorType1 => "Hypervisor (type 1)",
            BrandKind::HypervisorType2 => "Hypervisor (type 2)",
            BrandKind::Emulator => "Emulator",
            BrandKind::Container => "Container",
            BrandKind::Sandbox => "Sandbox",
            BrandKind::CompatibilityLayer => "Compatibility layer",
            BrandKind::Unknown => "Unknown",
        }
    }

    /// Classify a brand string as returned by `Engine::brand`.
    pub fn of(brand: &str) -> BrandKind {
        if brand == QEMU_KVM {
            return BrandKind::HypervisorType1;
        }
        Brand::from_name(brand).map(Brand::kind).unwrap_or(BrandKind::Unknown)
    }
}

impl fmt::Display for BrandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Combined label used when both QEMU and KVM were tallied and merging is on.
pub const QEMU_KVM: &str = "QEMU/KVM";

/// One scoreboard row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BrandCount {
    pub brand: Brand,
    pub count: u32,
}

/// Insertion-ordered brand scoreboard. Entries only ever grow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BrandTally {
    entries: Vec<BrandCount>,
}

impl BrandTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one match for `brand`. Always returns `true` so a check can end
    /// with `return tally.add(..)`.
    pub fn add(&mut self, brand: Brand) -> bool {
        match self.entries.iter_mut().find(|e| e.brand == brand) {
            Some(entry) => entry.count += 1,
            None => self.entries.push(BrandCount { brand, count: 1 }),
        }
        true
    }

    pub fn count(&self, brand: Brand) -> u32 {
        self.entries.iter().find(|e| e.brand == brand).map_or(0, |e| e.count)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[BrandCount] {
        &self.entries
    }

    /// Highest count wins; on a tie the earliest inserted brand wins.
    pub fn leader(&self) -> Option<Brand> {
        let mut best: Option<&BrandCount> = None;
        for entry in &self.entries {
            if best.map_or(true, |b| entry.count > b.count) {
                best = Some(entry);
            }
        }
        best.map(|b| b.brand)
    }

    /// Leader's display name, optionally merging QEMU and KVM into one label.
    pub fn leader_name(&self, merge_qemu_kvm: bool) -> Option<String> {
        if merge_qemu_kvm && self.count(Brand::Qemu) > 0 && self.count(Brand::Kvm) > 0 {
            return Some(QEMU_KVM.to_string());
        }
        self.leader().map(|b| b.name().to_string())
    }
}
