//! Filesystem and diagnostic-tool artifacts. Every technique here fails
//! closed: a missing path or tool, or a tool that exits non-zero, is "not
//! detected".

use log::trace;

use super::CheckContext;
use crate::brands::Brand;
use crate::probe::CapabilityProbe;

const THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/";
const HWMON_DIR: &str = "/sys/class/hwmon/";
const CHASSIS_VENDOR: &str = "/sys/devices/virtual/dmi/id/chassis_vendor";
const CHASSIS_TYPE: &str = "/sys/devices/virtual/dmi/id/chassis_type";
const DOCKER_MARKERS: [&str; 2] = ["/.dockerenv", "/.dockerinit"];
const SYSTEMD_DETECT_VIRT: [&str; 2] = ["/usr/bin/systemd-detect-virt", "/bin/systemd-detect-virt"];
const DMIDECODE: [&str; 2] = ["/bin/dmidecode", "/usr/bin/dmidecode"];
const DMESG: [&str; 2] = ["/bin/dmesg", "/usr/bin/dmesg"];

/// Firmware and kernel-log tokens, matched case-sensitively.
const FIRMWARE_TOKENS: [(&str, Brand); 3] =
    [("QEMU", Brand::Qemu), ("VirtualBox", Brand::VirtualBox), ("KVM", Brand::Kvm)];

fn any_exists<P: CapabilityProbe>(probe: &P, paths: &[&str]) -> bool {
    paths.iter().any(|path| probe.path_exists(path))
}

pub(crate) fn temperature<P: CapabilityProbe>(ctx: &mut CheckContext<'_, P>) -> bool {
    !ctx.probe.path_exists(THERMAL_ZONE)
}

/// Map a `systemd-detect-virt` identifier to a brand.
fn systemd_brand(id: &str) -> Option<Brand> {
    match id {
        "kvm" => Some(Brand::Kvm),
        "qemu" => Some(Brand::Qemu),
        "vmware" => Some(Brand::VMware),
        "oracle" => Some(Brand::VirtualBox),
        "xen" => Some(Brand::Xen),
        "microsoft" => Some(Brand::HyperV),
        "parallels" => Some(Brand::Parallels),
        "bhyve" => Some(Brand::Bhyve),
        "acrn" => Some(Brand::Acrn),
        "qnx" => Some(Brand::Qnx),
        "docker" => Some(Brand::Docker),
        "apple" => Some(Brand::VirtualApple),
        _ => None,
    }
}

/// Any answer other than `none` from `systemd-detect-virt`.
pub(crate) fn systemd<P: CapabilityProbe>(ctx: &mut CheckContext<'_, P>) -> bool {
    if !any_exists(ctx.probe, &SYSTEMD_DETECT_VIRT) {
        return false;
    }
    let Some(output) = ctx.probe.run_external_tool("systemd-detect-virt", &[]) else {
        return false;
    };
    let id = output.trim();
    trace!("systemd-detect-virt: {id:?}");
    if id.is_empty() || id == "none" {
        return false;
    }
    if let Some(brand) = systemd_brand(id) {
        ctx.tally.add(brand);
    }
    true
}

pub(crate) fn chassis_vendor<P: CapabilityProbe>(ctx: &mut CheckContext<'_, P>) -> bool {
    let Some(raw) = ctx.probe.read_file(CHASSIS_VENDOR) else {
        return false;
    };
    match raw.trim() {
        "QEMU" => ctx.tally.add(Brand::Qemu),
        "Oracle Corporation" => ctx.tally.add(Brand::VirtualBox),
        _ => false,
    }
}

/// SMBIOS chassis type 1 ("Other").
pub(crate) fn chassis_type<P: CapabilityProbe>(ctx: &mut CheckContext<'_, P>) -> bool {
    ctx.probe
        .read_file(CHASSIS_TYPE)
        .and_then(|raw| raw.trim().parse::<u32>().ok())
        .map_or(false, |kind| kind == 1)
}

pub(crate) fn dockerenv<P: CapabilityProbe>(ctx: &mut CheckContext<'_, P>) -> bool {
    if !any_exists(ctx.probe, &DOCKER_MARKERS) {
        return false;
    }
    ctx.tally.add(Brand::Docker)
}

/// Needs root; scans `Manufacturer`/`Product` lines of `dmidecode -t system`.
pub(crate) fn dmidecode<P: CapabilityProbe>(ctx: &mut CheckContext<'_, P>) -> bool {
    if !any_exists(ctx.probe, &DMIDECODE) || !ctx.probe.effective_user_is_privileged() {
        return false;
    }
    let Some(output) = ctx.probe.run_external_tool("dmidecode", &["-t", "system"]) else {
        return false;
    };

    let mut hits = 0;
    for line in output.lines().filter(|l| l.contains("Manufacturer") || l.contains("Product")) {
        for (token, brand) in FIRMWARE_TOKENS {
            if line.contains(token) {
                ctx.tally.add(brand);
                hits += 1;
            }
        }
    }
    trace!("dmidecode matches: {hits}");
    hits > 0
}

/// Kernel log lines mentioning a hypervisor together with KVM or QEMU.
pub(crate) fn dmesg<P: CapabilityProbe>(ctx: &mut CheckContext<'_, P>) -> bool {
    if !any_exists(ctx.probe, &DMESG) {
        return false;
    }
    let Some(output) = ctx.probe.run_external_tool("dmesg", &[]) else {
        return false;
    };

    let mut hits = 0;
    for line in output.lines().filter(|l| l.to_ascii_lowercase().contains("hypervisor")) {
        for (token, brand) in [("KVM", Brand::Kvm), ("QEMU", Brand::Qemu)] {
            if line.contains(token) {
                ctx.tally.add(brand);
                hits += 1;
            }
        }
    }
    trace!("dmesg matches: {hits}");
    hits > 0
}

pub(crate) fn hwmon<P: CapabilityProbe>(ctx: &mut CheckContext<'_, P>) -> bool {
    !ctx.probe.path_exists(HWMON_DIR)
}
