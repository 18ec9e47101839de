use std::thread;
use std::time::Duration;

use log::trace;

use super::CheckContext;
use crate::brands::Brand;
use crate::probe::CapabilityProbe;

/// Vendor prefixes of virtual network adapters.
const MAC_OUIS: [([u8; 3], Brand); 8] = [
    ([0x08, 0x00, 0x27], Brand::VirtualBox),
    ([0x00, 0x0C, 0x29], Brand::VMware),
    ([0x00, 0x1C, 0x14], Brand::VMware),
    ([0x00, 0x50, 0x56], Brand::VMware),
    ([0x00, 0x05, 0x69], Brand::VMware),
    ([0x00, 0x16, 0xE3], Brand::Xen),
    ([0x00, 0x1C, 0x42], Brand::Parallels),
    ([0x0A, 0x00, 0x27], Brand::HybridAnalysis),
];

/// Two or fewer logical processors. An unknown count (0) does not detect.
pub(crate) fn thread_count<P: CapabilityProbe>(ctx: &mut CheckContext<'_, P>) -> bool {
    let threads = ctx.probe.hardware_concurrency();
    trace!("logical processors: {threads}");
    threads > 0 && threads <= 2
}

pub(crate) fn mac<P: CapabilityProbe>(ctx: &mut CheckContext<'_, P>) -> bool {
    let Some(addr) = ctx.probe.primary_mac_address() else {
        return false;
    };
    trace!(
        "primary mac: {}",
        addr.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(":")
    );

    match MAC_OUIS.iter().find(|(oui, _)| addr[..3] == oui[..]) {
        Some((_, brand)) => ctx.tally.add(*brand),
        None => false,
    }
}

/// Cursor did not move across the idle window. Blocks for `cursor_idle_ms`.
pub(crate) fn cursor<P: CapabilityProbe>(ctx: &mut CheckContext<'_, P>) -> bool {
    let Some(first) = ctx.probe.cursor_position() else {
        return false;
    };
    if ctx.config.cursor_idle_ms > 0 {
        thread::sleep(Duration::from_millis(ctx.config.cursor_idle_ms));
    }
    let Some(second) = ctx.probe.cursor_position() else {
        return false;
    };
    first == second
}
