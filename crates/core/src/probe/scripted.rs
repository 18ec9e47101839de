use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{pack_ascii, CapabilityProbe, CpuRegisters};

/// In-memory probe that replays scripted observations.
///
/// Starts out as a bare machine: no CPUID, no files, no tools, unknown
/// processor count. Builder methods add observations. Leaves that were not
/// scripted read back as all-zero registers once CPUID is enabled.
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    cpuid: bool,
    leaves: HashMap<u32, CpuRegisters>,
    clock_step: Option<u64>,
    clock: AtomicU64,
    idt_base: Option<u64>,
    concurrency: usize,
    mac: Option<[u8; 6]>,
    paths: HashSet<String>,
    files: HashMap<String, String>,
    tools: HashMap<String, String>,
    privileged: bool,
    cursor: Mutex<VecDeque<(i32, i32)>>,
    leaf_reads: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable CPUID with the given 12-byte vendor signature on leaf 0.
    ///
    /// The signature is split across EBX, EDX, ECX in that order.
    pub fn with_vendor(mut self, signature: &str) -> Self {
        let bytes = signature.as_bytes();
        let chunk = |range: std::ops::Range<usize>| pack_ascii(bytes.get(range).unwrap_or(&[]));
        let max_leaf = self.leaves.get(&0).map_or(0x16, |r| r.eax.max(1));
        self.cpuid = true;
        self.leaves.insert(0, CpuRegisters::new(max_leaf, chunk(0..4), chunk(8..12), chunk(4..8)));
        self
    }

    /// Script the 48-byte extended brand string (leaves 0x8000_0002..=0x8000_0004).
    pub fn with_brand_string(mut self, brand: &str) -> Self {
        self.ensure_cpuid();
        let mut buf = [0u8; 48];
        for (slot, byte) in buf.iter_mut().zip(brand.as_bytes()) {
            *slot = *byte;
        }
        self.leaves.insert(0x8000_0000, CpuRegisters::new(0x8000_0004, 0, 0, 0));
        for (i, chunk) in buf.chunks(16).enumerate() {
            let regs = CpuRegisters::new(
                pack_ascii(&chunk[0..4]),
                pack_ascii(&chunk[4..8]),
                pack_ascii(&chunk[8..12]),
                pack_ascii(&chunk[12..16]),
            );
            self.leaves.insert(0x8000_0002 + i as u32, regs);
        }
        self
    }

    /// Set ECX bit 31 of leaf 1.
    pub fn with_hypervisor_bit(mut self) -> Self {
        self.ensure_cpuid();
        let leaf = self.leaves.entry(1).or_default();
        leaf.ecx |= 1 << 31;
        self
    }

    /// Script an arbitrary leaf (subleaf is ignored).
    pub fn with_leaf(mut self, leaf: u32, regs: CpuRegisters) -> Self {
        self.ensure_cpuid();
        self.leaves.insert(leaf, regs);
        self
    }

    /// Every pair of clock reads differs by `step` cycles.
    pub fn with_clock_step(mut self, step: u64) -> Self {
        self.clock_step = Some(step);
        self
    }

    pub fn with_idt_base(mut self, base: u64) -> Self {
        self.idt_base = Some(base);
        self
    }

    pub fn with_concurrency(mut self, threads: usize) -> Self {
        self.concurrency = threads;
        self
    }

    pub fn with_mac(mut self, mac: [u8; 6]) -> Self {
        self.mac = Some(mac);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.paths.insert(path.into());
        self
    }

    /// A readable file; also makes the path exist.
    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        let path = path.into();
        self.paths.insert(path.clone());
        self.files.insert(path, contents.into());
        self
    }

    /// Successful output of `program` (arguments are not matched).
    pub fn with_tool(mut self, program: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.tools.insert(program.into(), stdout.into());
        self
    }

    pub fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    /// Cursor positions handed out one per read; the last one repeats.
    pub fn with_cursor_positions(self, positions: impl IntoIterator<Item = (i32, i32)>) -> Self {
        if let Ok(mut queue) = self.cursor.lock() {
            queue.extend(positions);
        }
        self
    }

    /// Number of CPUID leaves read so far.
    pub fn leaf_reads(&self) -> usize {
        self.leaf_reads.load(Ordering::SeqCst)
    }

    fn ensure_cpuid(&mut self) {
        self.cpuid = true;
        self.leaves.entry(0).or_insert(CpuRegisters::new(0x16, 0, 0, 0));
    }
}

impl CapabilityProbe for ScriptedProbe {
    fn read_cpu_leaf(&self, leaf: u32, _subleaf: u32) -> Option<CpuRegisters> {
        if !self.cpuid {
            return None;
        }
        self.leaf_reads.fetch_add(1, Ordering::SeqCst);
        Some(self.leaves.get(&leaf).copied().unwrap_or_default())
    }

    fn fast_clock_read(&self) -> Option<u64> {
        let step = self.clock_step?;
        // Odd reads advance by `step`, so each bracketed pair measures `step`.
        Some(self.clock.fetch_add(step, Ordering::SeqCst))
    }

    fn idt_base(&self) -> Option<u64> {
        self.idt_base
    }

    fn hardware_concurrency(&self) -> usize {
        self.concurrency
    }

    fn primary_mac_address(&self) -> Option<[u8; 6]> {
        self.mac
    }

    fn path_exists(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    fn read_file(&self, path: &str) -> Option<String> {
        self.files.get(path).cloned()
    }

    fn run_external_tool(&self, program: &str, _args: &[&str]) -> Option<String> {
        self.tools.get(program).cloned()
    }

    fn effective_user_is_privileged(&self) -> bool {
        self.privileged
    }

    fn cursor_position(&self) -> Option<(i32, i32)> {
        let mut queue = self.cursor.lock().ok()?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().copied()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_probe_has_no_cpuid() {
        let probe = ScriptedProbe::new();
        assert_eq!(probe.read_cpu_leaf(0, 0), None);
        assert_eq!(probe.leaf_reads(), 0);
    }

    #[test]
    fn vendor_is_split_ebx_edx_ecx() {
        let probe = ScriptedProbe::new().with_vendor("GenuineIntel");
        let regs = probe.read_cpu_leaf(0, 0).unwrap();
        assert_eq!(regs.ebx, pack_ascii(b"Genu"));
        assert_eq!(regs.edx, pack_ascii(b"ineI"));
        assert_eq!(regs.ecx, pack_ascii(b"ntel"));
        assert!(regs.eax >= 1);
    }

    #[test]
    fn clock_pairs_differ_by_step() {
        let probe = ScriptedProbe::new().with_clock_step(500);
        let start = probe.fast_clock_read().unwrap();
        let end = probe.fast_clock_read().unwrap();
        assert_eq!(end - start, 500);
    }

    #[test]
    fn cursor_repeats_last_position() {
        let probe = ScriptedProbe::new().with_cursor_positions([(1, 1), (2, 2)]);
        assert_eq!(probe.cursor_position(), Some((1, 1)));
        assert_eq!(probe.cursor_position(), Some((2, 2)));
        assert_eq!(probe.cursor_position(), Some((2, 2)));
    }
}
