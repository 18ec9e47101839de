use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use log::trace;

use super::{CapabilityProbe, CpuRegisters};

/// Probe backed by the machine this process is running on.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostProbe;

impl HostProbe {
    pub fn new() -> Self {
        Self
    }
}

impl CapabilityProbe for HostProbe {
    fn read_cpu_leaf(&self, leaf: u32, subleaf: u32) -> Option<CpuRegisters> {
        cpuid(leaf, subleaf)
    }

    fn fast_clock_read(&self) -> Option<u64> {
        rdtsc()
    }

    fn idt_base(&self) -> Option<u64> {
        sidt()
    }

    fn hardware_concurrency(&self) -> usize {
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(0)
    }

    fn primary_mac_address(&self) -> Option<[u8; 6]> {
        if !cfg!(target_os = "linux") {
            return None;
        }
        primary_mac_from_sysfs(Path::new("/sys/class/net"))
    }

    fn path_exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    fn read_file(&self, path: &str) -> Option<String> {
        fs::read_to_string(path).ok()
    }

    fn run_external_tool(&self, program: &str, args: &[&str]) -> Option<String> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| trace!("failed to spawn {program}: {e}"))
            .ok()?;
        if !output.status.success() {
            trace!("{program} exited with {}", output.status);
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn effective_user_is_privileged(&self) -> bool {
        if !cfg!(target_os = "linux") {
            return false;
        }
        fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|status| effective_uid(&status))
            .map_or(false, |uid| uid == 0)
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[allow(unused_unsafe)]
fn cpuid(leaf: u32, subleaf: u32) -> Option<CpuRegisters> {
    #[cfg(target_arch = "x86")]
    use std::arch::x86::__cpuid_count;
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::__cpuid_count;

    // SAFETY: every x86_64 CPU and every i686-class x86 target implements CPUID.
    let r = unsafe { __cpuid_count(leaf, subleaf) };
    Some(CpuRegisters::new(r.eax, r.ebx, r.ecx, r.edx))
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn cpuid(_leaf: u32, _subleaf: u32) -> Option<CpuRegisters> {
    None
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[allow(unused_unsafe)]
fn rdtsc() -> Option<u64> {
    #[cfg(target_arch = "x86")]
    use std::arch::x86::_rdtsc;
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::_rdtsc;

    // SAFETY: RDTSC has no memory effects; user-mode access is the default.
    Some(unsafe { _rdtsc() })
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn rdtsc() -> Option<u64> {
    None
}

/// SIDT stores a 2-byte limit followed by an 8-byte base. On Linux with UMIP
/// the kernel emulates the instruction for user mode instead of faulting.
#[cfg(all(target_arch = "x86_64", target_os = "linux"))]
fn sidt() -> Option<u64> {
    let mut idtr = [0u8; 10];
    // SAFETY: writes exactly 10 bytes into `idtr`.
    unsafe {
        std::arch::asm!(
            "sidt [{}]",
            in(reg) idtr.as_mut_ptr(),
            options(nostack, preserves_flags)
        );
    }
    let mut base = [0u8; 8];
    base.copy_from_slice(&idtr[2..10]);
    Some(u64::from_le_bytes(base))
}

#[cfg(not(all(target_arch = "x86_64", target_os = "linux")))]
fn sidt() -> Option<u64> {
    None
}

/// First non-loopback interface (by name) with a non-zero hardware address.
fn primary_mac_from_sysfs(net_dir: &Path) -> Option<[u8; 6]> {
    let mut names: Vec<String> = fs::read_dir(net_dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| name != "lo")
        .collect();
    names.sort();

    names.iter().find_map(|name| {
        let raw = fs::read_to_string(net_dir.join(name).join("address")).ok()?;
        parse_mac(&raw).filter(|mac| mac.iter().any(|b| *b != 0))
    })
}

/// Parse `aa:bb:cc:dd:ee:ff` (or `-` separated) into six octets.
pub fn parse_mac(raw: &str) -> Option<[u8; 6]> {
    let mut mac = [0u8; 6];
    let mut parts = raw.trim().split(|c: char| c == ':' || c == '-');
    for slot in mac.iter_mut() {
        *slot = u8::from_str_radix(parts.next()?, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(mac)
}

/// Effective UID from the second column of the `Uid:` line of /proc/self/status.
fn effective_uid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|rest| rest.split_whitespace().nth(1))
        .and_then(|uid| uid.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mac_accepts_colon_and_dash() {
        assert_eq!(parse_mac("08:00:27:ab:cd:ef\n"), Some([0x08, 0x00, 0x27, 0xab, 0xcd, 0xef]));
        assert_eq!(parse_mac("00-0C-29-01-02-03"), Some([0x00, 0x0c, 0x29, 0x01, 0x02, 0x03]));
    }

    #[test]
    fn parse_mac_rejects_malformed() {
        assert_eq!(parse_mac("08:00:27"), None);
        assert_eq!(parse_mac("08:00:27:ab:cd:ef:00"), None);
        assert_eq!(parse_mac("zz:00:27:ab:cd:ef"), None);
    }

    #[test]
    fn effective_uid_reads_second_column() {
        let status = "Name:\tcat\nUid:\t1000\t0\t1000\t1000\nGid:\t1000\t1000\t1000\t1000\n";
        assert_eq!(effective_uid(status), Some(0));
        assert_eq!(effective_uid("Name:\tcat\n"), None);
    }

    #[test]
    fn primary_mac_skips_loopback_and_zero_addresses() {
        let dir = tempfile::tempdir().unwrap();
        for (name, addr) in
            [("lo", "00:00:00:00:00:00"), ("dummy0", "00:00:00:00:00:00"), ("eth0", "00:50:56:aa:bb:cc")]
        {
            fs::create_dir_all(dir.path().join(name)).unwrap();
            fs::write(dir.path().join(name).join("address"), format!("{addr}\n")).unwrap();
        }
        assert_eq!(primary_mac_from_sysfs(dir.path()), Some([0x00, 0x50, 0x56, 0xaa, 0xbb, 0xcc]));
    }

    #[test]
    fn host_probe_never_panics_on_missing_tools() {
        let probe = HostProbe::new();
        assert_eq!(probe.run_external_tool("definitely-not-a-real-tool-vmprobe", &[]), None);
        assert!(!probe.path_exists("/definitely/not/here"));
        assert_eq!(probe.read_file("/definitely/not/here"), None);
    }
}
