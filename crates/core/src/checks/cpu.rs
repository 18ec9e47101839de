//! CPUID and timing techniques. All of them return false when the
//! evaluation found CPUID unsupported.

use log::trace;

use super::CheckContext;
use crate::brands::Brand;
use crate::probe::CapabilityProbe;

const HYPERVISOR_LEAF: u32 = 0x4000_0000;
const EXTENDED_MAX_LEAF: u32 = 0x8000_0000;
const BRAND_LEAVES: [u32; 3] = [0x8000_0002, 0x8000_0003, 0x8000_0004];

/// Leaf 0 vendor strings reported by hypervisors and translation layers.
const VENDOR_SIGNATURES: [(&[u8; 12], Brand); 13] = [
    (b"bhyve bhyve ", Brand::Bhyve),
    (b" KVMKVMKVM  ", Brand::Kvm),
    (b"TCGTCGTCGTCG", Brand::Qemu),
    (b"Microsoft Hv", Brand::HyperV),
    (b"MicrosoftXTA", Brand::MicrosoftXta),
    (b" prl hyperv ", Brand::Parallels),
    (b" lrpepyh  vr", Brand::Parallels),
    (b"VMwareVMware", Brand::VMware),
    (b"VBoxVBoxVBox", Brand::VirtualBox),
    (b"XenVMMXenVMM", Brand::Xen),
    (b"ACRNACRNACRN", Brand::Acrn),
    (b" QNXQVMBSQG ", Brand::Qnx),
    (b"VirtualApple", Brand::VirtualApple),
];

const BRAND_KEYWORDS: [&str; 16] = [
    "qemu",
    "kvm",
    "virtual",
    "vm",
    "vbox",
    "virtualbox",
    "vmm",
    "monitor",
    "bhyve",
    "hyperv",
    "hypervisor",
    "hvisor",
    "parallels",
    "vmware",
    "hvm",
    "qnx",
];

/// 12-byte vendor string of leaf 0 in EBX, EDX, ECX order.
pub(crate) fn vendor_signature<P: CapabilityProbe>(probe: &P) -> Option<[u8; 12]> {
    let regs = probe.read_cpu_leaf(0, 0)?;
    let mut sig = [0u8; 12];
    sig[0..4].copy_from_slice(&regs.ebx.to_le_bytes());
    sig[4..8].copy_from_slice(&regs.edx.to_le_bytes());
    sig[8..12].copy_from_slice(&regs.ecx.to_le_bytes());
    Some(sig)
}

/// Exact match of the leaf 0 vendor string against known hypervisors.
pub(crate) fn vmid<P: CapabilityProbe>(ctx: &mut CheckContext<'_, P>) -> bool {
    if !ctx.cpuid_supported {
        return false;
    }
    let Some(sig) = vendor_signature(ctx.probe) else {
        return false;
    };
    trace!("cpuid vendor: {:?}", String::from_utf8_lossy(&sig));

    match VENDOR_SIGNATURES.iter().find(|(known, _)| **known == sig) {
        Some((_, brand)) => ctx.tally.add(*brand),
        None => false,
    }
}

/// Extended brand string (leaves 0x8000_0002..=0x8000_0004). Each leaf
/// contributes 16 bytes, cut at the first NUL.
pub(crate) fn read_brand_string<P: CapabilityProbe>(probe: &P) -> Option<String> {
    let max = probe.read_cpu_leaf(EXTENDED_MAX_LEAF, 0)?;
    if max.eax < BRAND_LEAVES[2] {
        return None;
    }

    let mut bytes = Vec::with_capacity(48);
    for leaf in BRAND_LEAVES {
        let raw = probe.read_cpu_leaf(leaf, 0)?.to_bytes();
        let len = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
        bytes.extend_from_slice(&raw[..len]);
    }
    Some(String::from_utf8_lossy(&bytes).to_string())
}

/// Case-insensitive keyword search in the CPU brand string.
pub(crate) fn brand_string<P: CapabilityProbe>(ctx: &mut CheckContext<'_, P>) -> bool {
    if !ctx.cpuid_supported {
        return false;
    }
    let Some(brand) = read_brand_string(ctx.probe) else {
        return false;
    };
    trace!("cpu brand string: {brand:?}");

    let lowered = brand.to_ascii_lowercase();
    let matches: Vec<&str> =
        BRAND_KEYWORDS.iter().copied().filter(|kw| lowered.contains(kw)).collect();
    if matches.is_empty() {
        return false;
    }
    if matches.contains(&"qemu") {
        ctx.tally.add(Brand::Qemu);
    }
    true
}

/// Leaf 1, ECX bit 31.
pub(crate) fn hypervisor_bit<P: CapabilityProbe>(ctx: &mut CheckContext<'_, P>) -> bool {
    if !ctx.cpuid_supported {
        return false;
    }
    ctx.probe.read_cpu_leaf(1, 0).map_or(false, |regs| regs.ecx & (1 << 31) != 0)
}

/// Stops at the first leaf in 0x4000_0000..=0x4000_00FF with any nonzero register.
pub(crate) fn hypervisor_leaf_range<P: CapabilityProbe>(ctx: &mut CheckContext<'_, P>) -> bool {
    if !ctx.cpuid_supported {
        return false;
    }
    for offset in 0..=0xFFu32 {
        let Some(regs) = ctx.probe.read_cpu_leaf(HYPERVISOR_LEAF + offset, 0) else {
            return false;
        };
        if !regs.is_zero() {
            trace!("hypervisor leaf {:#x} populated", HYPERVISOR_LEAF + offset);
            return true;
        }
    }
    false
}

/// Signature at offset 4 of the leaf 0x4000_0000 dump must be at least
/// four characters long.
pub(crate) fn hypervisor_str<P: CapabilityProbe>(ctx: &mut CheckContext<'_, P>) -> bool {
    if !ctx.cpuid_supported {
        return false;
    }
    let Some(regs) = ctx.probe.read_cpu_leaf(HYPERVISOR_LEAF, 0) else {
        return false;
    };
    let bytes = regs.to_bytes();
    let signature = &bytes[4..];
    let len = signature.iter().position(|b| *b == 0).unwrap_or(signature.len());
    len >= 4
}

/// Mean cost of a leaf 0 query against a fixed cycle baseline.
pub(crate) fn rdtsc<P: CapabilityProbe>(ctx: &mut CheckContext<'_, P>) -> bool {
    if !ctx.cpuid_supported {
        return false;
    }
    let iterations = ctx.config.timing_iterations;
    if iterations == 0 {
        return false;
    }

    let mut total: u64 = 0;
    for _ in 0..iterations {
        let Some(start) = ctx.probe.fast_clock_read() else {
            return false;
        };
        let _ = ctx.probe.read_cpu_leaf(0, 0);
        let Some(end) = ctx.probe.fast_clock_read() else {
            return false;
        };
        total = total.saturating_add(end.saturating_sub(start));
    }

    let mean = total / u64::from(iterations);
    trace!("cpuid mean latency: {mean} cycles (baseline {})", ctx.config.timing_baseline_cycles);
    mean > ctx.config.timing_baseline_cycles
}

/// Nonzero IDT base. Weak on modern kernels.
pub(crate) fn sidt<P: CapabilityProbe>(ctx: &mut CheckContext<'_, P>) -> bool {
    ctx.probe.idt_base().map_or(false, |base| base != 0)
}
