//! Primitive hardware and OS observations the checks are built from.
//!
//! Every operation is fail-soft: an unsupported platform, a missing file or a
//! tool that cannot run yields `None`/`false`/`0`, never an error. Checks are
//! written against the `CapabilityProbe` trait so the same catalog runs on the
//! real host (`HostProbe`) and on scripted observations (`ScriptedProbe`).

mod host;
mod scripted;

pub use host::{parse_mac, HostProbe};
pub use scripted::ScriptedProbe;

use serde::{Deserialize, Serialize};

/// Output registers of one CPUID query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CpuRegisters {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

impl CpuRegisters {
    pub const fn new(eax: u32, ebx: u32, ecx: u32, edx: u32) -> Self {
        Self { eax, ebx, ecx, edx }
    }

    pub const fn is_zero(&self) -> bool {
        self.eax == 0 && self.ebx == 0 && self.ecx == 0 && self.edx == 0
    }

    /// Registers as 16 little-endian bytes in EAX, EBX, ECX, EDX order.
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[0..4].copy_from_slice(&self.eax.to_le_bytes());
        out[4..8].copy_from_slice(&self.ebx.to_le_bytes());
        out[8..12].copy_from_slice(&self.ecx.to_le_bytes());
        out[12..16].copy_from_slice(&self.edx.to_le_bytes());
        out
    }
}

/// Pack up to four ASCII bytes into a register value the way CPUID lays them out.
pub fn pack_ascii(bytes: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    for (slot, byte) in word.iter_mut().zip(bytes) {
        *slot = *byte;
    }
    u32::from_le_bytes(word)
}

/// Hardware/OS primitives consumed by the detection checks.
pub trait CapabilityProbe {
    /// Execute CPUID for `leaf`/`subleaf`. `None` when CPUID is unavailable.
    fn read_cpu_leaf(&self, leaf: u32, subleaf: u32) -> Option<CpuRegisters>;

    /// Monotonic cycle counter. `None` when no such counter is readable.
    fn fast_clock_read(&self) -> Option<u64>;

    /// Base address stored in the interrupt descriptor table register.
    fn idt_base(&self) -> Option<u64>;

    /// Number of logical processors; `0` when unknown.
    fn hardware_concurrency(&self) -> usize;

    /// Hardware address of the primary (non-loopback) network adapter.
    fn primary_mac_address(&self) -> Option<[u8; 6]>;

    fn path_exists(&self, path: &str) -> bool;

    /// Contents of a text file.
    fn read_file(&self, path: &str) -> Option<String>;

    /// Run a diagnostic tool and capture stdout. `None` on spawn failure or
    /// non-zero exit. Blocks for the tool's entire runtime.
    fn run_external_tool(&self, program: &str, args: &[&str]) -> Option<String>;

    fn effective_user_is_privileged(&self) -> bool;

    /// Current mouse cursor position, where the platform exposes one.
    fn cursor_position(&self) -> Option<(i32, i32)> {
        None
    }
}

impl<P: CapabilityProbe + ?Sized> CapabilityProbe for &P {
    fn read_cpu_leaf(&self, leaf: u32, subleaf: u32) -> Option<CpuRegisters> {
        (**self).read_cpu_leaf(leaf, subleaf)
    }

    fn fast_clock_read(&self) -> Option<u64> {
        (**self).fast_clock_read()
    }

    fn idt_base(&self) -> Option<u64> {
        (**self).idt_base()
    }

    fn hardware_concurrency(&self) -> usize {
        (**self).hardware_concurrency()
    }

    fn primary_mac_address(&self) -> Option<[u8; 6]> {
        (**self).primary_mac_address()
    }

    fn path_exists(&self, path: &str) -> bool {
        (**self).path_exists(path)
    }

    fn read_file(&self, path: &str) -> Option<String> {
        (**self).read_file(path)
    }

    fn run_external_tool(&self, program: &str, args: &[&str]) -> Option<String> {
        (**self).run_external_tool(program, args)
    }

    fn effective_user_is_privileged(&self) -> bool {
        (**self).effective_user_is_privileged()
    }

    fn cursor_position(&self) -> Option<(i32, i32)> {
        (**self).cursor_position()
    }
}
