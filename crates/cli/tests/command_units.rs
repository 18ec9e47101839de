use vmprobe::commands::{
    brand_command, brands_command, check_command, conclusion_command, count_command,
    detect_command, percent_command, report_command, status_command, summary_command,
    techniques_command, type_command,
};
use vmprobe_core::{CachePolicy, Engine, EngineConfig, Flag, Flagset, Platform, ScriptedProbe};

fn quiet_host() -> ScriptedProbe {
    ScriptedProbe::new()
        .with_vendor("GenuineIntel")
        .with_concurrency(8)
        .with_path("/sys/class/thermal/thermal_zone0/")
        .with_path("/sys/class/hwmon/")
}

fn engine(probe: ScriptedProbe) -> Engine<ScriptedProbe> {
    Engine::with_config(probe, EngineConfig::default().with_platform(Platform::Linux))
}

fn vbox() -> Engine<ScriptedProbe> {
    engine(quiet_host().with_vendor("VBoxVBoxVBox").with_mac([0x08, 0x00, 0x27, 1, 2, 3]))
}

fn capture(f: impl FnOnce(&mut Vec<u8>) -> anyhow::Result<()>) -> String {
    let mut buf = Vec::new();
    f(&mut buf).expect("command succeeds");
    String::from_utf8(buf).expect("utf8 output")
}

/// VirtualBox vendor plus MAC: every single-value command agrees.
#[test]
fn single_value_commands_on_virtualbox() {
    let engine = vbox();
    let flags = Flagset::DEFAULT;
    assert_eq!(capture(|out| detect_command(&engine, flags, out)), "true\n");
    assert_eq!(capture(|out| brand_command(&engine, flags, out)), "VirtualBox\n");
    assert_eq!(capture(|out| type_command(&engine, flags, out)), "Hypervisor (type 2)\n");
    assert_eq!(capture(|out| percent_command(&engine, flags, out)), "100\n");
    assert_eq!(capture(|out| count_command(&engine, flags, out)), "2\n");
    assert_eq!(
        capture(|out| conclusion_command(&engine, flags, out)),
        "Running inside a VirtualBox VM\n"
    );
    assert!(status_command(&engine, flags));
}

/// A quiet host prints baremetal answers.
#[test]
fn single_value_commands_on_baremetal() {
    let engine = engine(quiet_host());
    let flags = Flagset::DEFAULT;
    assert_eq!(capture(|out| detect_command(&engine, flags, out)), "false\n");
    assert_eq!(capture(|out| brand_command(&engine, flags, out)), "Unknown\n");
    assert_eq!(capture(|out| percent_command(&engine, flags, out)), "0\n");
    assert_eq!(
        capture(|out| conclusion_command(&engine, flags, out)),
        "Running in baremetal\n"
    );
    assert!(!status_command(&engine, flags));
}

/// The summary names every technique and ends with the verdict.
#[test]
fn summary_lists_every_technique_and_verdict() {
    let engine = vbox();
    let text = capture(|out| summary_command(&engine, Flagset::DEFAULT, out));
    for technique in engine.techniques() {
        assert!(text.contains(technique.name), "{}", technique.name);
    }
    assert!(text.contains("VM brand: VirtualBox"));
    assert!(text.contains("VM detections: 2/17"));
    assert!(text.contains("Running inside a VirtualBox VM"));
}

#[test]
fn summary_marks_unselected_techniques_as_skipped() {
    let engine = vbox();
    let text = capture(|out| summary_command(&engine, Flag::Mac.into(), out));
    assert!(text.contains("SKIPPED"));
    assert!(text.contains("VM detections: 1/1"));
}

/// KVM vendor plus a VMware MAC under `PerFlagset`: the MAC alone is not
/// enough, so every view of that flagset must say "Unknown".
#[test]
fn per_flagset_views_share_one_report() {
    let config = EngineConfig {
        cache_policy: CachePolicy::PerFlagset,
        ..EngineConfig::default().with_platform(Platform::Linux)
    };
    let probe = quiet_host().with_vendor(" KVMKVMKVM  ").with_mac([0x00, 0x0c, 0x29, 1, 2, 3]);
    let engine = Engine::with_config(probe, config);
    let mac = Flagset::from(Flag::Mac);

    assert_eq!(capture(|out| detect_command(&engine, mac, out)), "false\n");
    assert_eq!(capture(|out| brand_command(&engine, mac, out)), "Unknown\n");
    assert_eq!(capture(|out| type_command(&engine, mac, out)), "Unknown\n");
    assert_eq!(capture(|out| brand_command(&engine, Flagset::DEFAULT, out)), "KVM\n");

    let text = capture(|out| summary_command(&engine, mac, out));
    assert!(text.contains("VM brand: Unknown"), "{text}");
    assert!(text.contains("VM confirmation: false"), "{text}");
    assert!(text.contains("VM likeliness: 53%"), "{text}");
}

/// Same host with memoization off: the summary is built from a single
/// evaluation, so its lines cannot disagree.
#[test]
fn unmemoized_summary_is_self_consistent() {
    let config = EngineConfig { memoize: false, ..EngineConfig::default().with_platform(Platform::Linux) };
    let probe = quiet_host().with_vendor(" KVMKVMKVM  ").with_mac([0x00, 0x0c, 0x29, 1, 2, 3]);
    let engine = Engine::with_config(probe, config);

    let text = capture(|out| summary_command(&engine, Flag::Mac.into(), out));
    assert!(text.contains("VM brand: Unknown"), "{text}");
    assert!(text.contains("VM confirmation: false"), "{text}");
    assert!(text.contains("Might be a VM"), "{text}");
    assert_eq!(
        capture(|out| conclusion_command(&engine, Flagset::DEFAULT, out)),
        "Running inside a KVM VM\n"
    );
}

/// `brands --json` carries each brand's kind.
#[test]
fn brands_json_includes_kind() {
    let text = capture(|out| brands_command(true, out));
    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    let docker = parsed
        .as_array()
        .unwrap()
        .iter()
        .find(|b| b["name"] == "Docker")
        .expect("docker listed");
    assert_eq!(docker["kind"], "Container");
}

/// Linux listing has 17 entries and no cursor.
#[test]
fn techniques_text_lists_labels_and_weights() {
    let engine = engine(quiet_host());
    let text = capture(|out| techniques_command(&engine, false, out));
    assert!(text.starts_with("Techniques (17):"));
    assert!(text.contains("HYPERVISOR_BIT"));
    assert!(!text.contains("CURSOR"));
}

/// `check` validates, runs, and never touches the cache.
#[test]
fn check_command_validates_then_runs() {
    let engine = vbox();
    assert_eq!(capture(|out| check_command(&engine, Flag::Mac.into(), out)), "MAC: detected\n");

    let mut sink = Vec::new();
    let err = check_command(&engine, Flag::Mac | Flag::Vmid, &mut sink).unwrap_err();
    assert!(format!("{err:#}").contains("only contain a single option"));

    let err = check_command(&engine, Flag::VmwarePort.into(), &mut sink).unwrap_err();
    assert!(format!("{err:#}").contains("no technique registered"));
    assert!(!engine.is_evaluated());
}

#[test]
fn report_text_shows_votes() {
    let engine = vbox();
    let text = capture(|out| report_command(&engine, Flagset::DEFAULT, false, out));
    assert!(text.contains("Virtual: true"));
    assert!(text.contains("Brand: VirtualBox"));
    assert!(text.contains("VirtualBox: 2"));
}

/// The JSON report exposes the brand and its vote count.
#[test]
fn report_json_round_trips_through_serde_json() {
    let engine = vbox();
    let text = capture(|out| report_command(&engine, Flagset::DEFAULT, true, out));
    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed["outcome"]["brand"], "VirtualBox");
    assert_eq!(parsed["tally"][0]["count"], 2);
}
