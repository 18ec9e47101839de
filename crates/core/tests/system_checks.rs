use vmprobe_core::{Brand, Engine, EngineConfig, Flag, Flagset, Platform, ScriptedProbe};

fn linux(probe: ScriptedProbe) -> Engine<ScriptedProbe> {
    Engine::with_config(probe, EngineConfig::default().with_platform(Platform::Linux))
}

fn windows(probe: ScriptedProbe) -> Engine<ScriptedProbe> {
    let config = EngineConfig { cursor_idle_ms: 0, ..EngineConfig::default() }
        .with_platform(Platform::Windows);
    Engine::with_config(probe, config)
}

/// Two or fewer logical processors detect.
#[test]
fn two_or_fewer_processors_detect() {
    for (threads, expected) in [(1, true), (2, true), (3, false), (16, false)] {
        let engine = linux(ScriptedProbe::new().with_concurrency(threads));
        assert_eq!(engine.run_technique(Flag::ThreadCount.into()).unwrap(), expected, "{threads}");
    }
}

/// A count of zero means unknown, not a VM.
#[test]
fn unknown_processor_count_does_not_detect() {
    let engine = linux(ScriptedProbe::new().with_concurrency(0));
    assert!(!engine.run_technique(Flag::ThreadCount.into()).unwrap());
}

/// Each known MAC prefix detects and votes for its vendor.
#[test]
fn mac_ouis_attribute_their_vendor() {
    let cases = [
        ([0x08, 0x00, 0x27], Brand::VirtualBox),
        ([0x00, 0x0C, 0x29], Brand::VMware),
        ([0x00, 0x1C, 0x14], Brand::VMware),
        ([0x00, 0x50, 0x56], Brand::VMware),
        ([0x00, 0x05, 0x69], Brand::VMware),
        ([0x00, 0x16, 0xE3], Brand::Xen),
        ([0x00, 0x1C, 0x42], Brand::Parallels),
        ([0x0A, 0x00, 0x27], Brand::HybridAnalysis),
    ];
    for (oui, brand) in cases {
        let mac = [oui[0], oui[1], oui[2], 0x12, 0x34, 0x56];
        let report = linux(ScriptedProbe::new().with_mac(mac)).report(Flag::Mac.into());
        assert!(report.result_for(Flag::Mac).unwrap().detected, "{brand}");
        assert_eq!(report.tally.count(brand), 1, "{brand}");
    }
}

/// A physical vendor prefix or no MAC at all stays quiet.
#[test]
fn unknown_or_missing_mac_does_not_detect() {
    let physical = linux(ScriptedProbe::new().with_mac([0x3c, 0x7c, 0x3f, 0x01, 0x02, 0x03]));
    assert!(!physical.run_technique(Flag::Mac.into()).unwrap());
    assert!(!linux(ScriptedProbe::new()).run_technique(Flag::Mac.into()).unwrap());
}

/// A cursor that never moves during the idle window detects.
#[test]
fn idle_cursor_detects_on_windows() {
    let still = windows(ScriptedProbe::new().with_cursor_positions([(10, 10)]));
    assert!(still.run_technique(Flag::Cursor.into()).unwrap());

    let moving = windows(ScriptedProbe::new().with_cursor_positions([(10, 10), (42, 7)]));
    assert!(!moving.run_technique(Flag::Cursor.into()).unwrap());

    let headless = windows(ScriptedProbe::new());
    assert!(!headless.run_technique(Flag::Cursor.into()).unwrap());
}

/// `DEFAULT` leaves the blocking cursor check out.
#[test]
fn cursor_is_not_part_of_the_default_flagset() {
    let engine = windows(ScriptedProbe::new().with_cursor_positions([(10, 10)]));
    let report = engine.report(Flagset::DEFAULT);
    let cursor = report.result_for(Flag::Cursor).unwrap();
    assert!(!cursor.enabled);
    assert!(!cursor.detected);
}

#[test]
fn cursor_is_not_registered_on_linux() {
    let engine = linux(ScriptedProbe::new().with_cursor_positions([(10, 10)]));
    let err = engine.run_technique(Flag::Cursor.into()).unwrap_err();
    assert!(err.is_invalid_argument());
}
