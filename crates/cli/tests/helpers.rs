use std::fs;

use tempfile::tempdir;
use vmprobe::{effective_flags, load_config, parse_flagset};
use vmprobe_core::{CachePolicy, Flag, Flagset};

/// Hex masks, label lists and `all` all parse.
#[test]
fn parse_flagset_accepts_masks_and_labels() {
    assert_eq!(parse_flagset("0x200").unwrap(), Flagset::from(Flag::Mac));
    assert_eq!(parse_flagset("VMID,mac").unwrap(), Flag::Vmid | Flag::Mac);
    assert_eq!(parse_flagset("all").unwrap(), Flagset::ALL);
}

/// The error names the offending label.
#[test]
fn parse_flagset_reports_bad_input() {
    let err = parse_flagset("VMID,BOGUS").unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("Invalid flagset"));
    assert!(message.contains("BOGUS"));
}

/// `--enable-cursor` adds bit 30 to whatever was selected.
#[test]
fn effective_flags_defaults_and_adds_cursor() {
    assert_eq!(effective_flags(None, false).unwrap(), Flagset::DEFAULT);
    let with_cursor = effective_flags(None, true).unwrap();
    assert!(with_cursor.contains(Flag::Cursor));
    assert_eq!(with_cursor, Flagset::ALL);
    assert_eq!(effective_flags(Some("MAC"), true).unwrap(), Flag::Mac | Flag::Cursor);
}

/// No path means defaults; a path is loaded.
#[test]
fn load_config_reads_file_or_defaults() {
    assert_eq!(load_config(None).unwrap().threshold, 6.5);

    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("engine.yml");
    fs::write(&path, "cache_policy: per_flagset\n").expect("write");
    let config = load_config(Some(path.as_path())).expect("load");
    assert_eq!(config.cache_policy, CachePolicy::PerFlagset);
}
