use std::fs;

use tempfile::tempdir;
use vmprobe_core::{CachePolicy, EngineConfig, EngineError, Platform};

/// An empty config carries the documented defaults.
#[test]
fn defaults_match_documented_values() {
    let config = EngineConfig::default();
    assert_eq!(config.threshold, 6.5);
    assert_eq!(config.cache_policy, CachePolicy::FirstCall);
    assert!(config.memoize);
    assert_eq!(config.timing_baseline_cycles, 350);
    assert_eq!(config.timing_iterations, 100);
    assert_eq!(config.cursor_idle_ms, 5000);
    assert!(!config.merge_qemu_kvm);
    assert_eq!(config.platform, None);
}

/// Keys missing from a JSON file keep their defaults.
#[test]
fn loads_partial_json() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("engine.json");
    fs::write(&path, r#"{ "threshold": 4.0, "cache_policy": "per_flagset" }"#)?;

    let config = EngineConfig::load(&path)?;
    assert_eq!(config.threshold, 4.0);
    assert_eq!(config.cache_policy, CachePolicy::PerFlagset);
    assert!(config.memoize);
    Ok(())
}

/// A `.yaml` extension selects the YAML parser.
#[test]
fn loads_yaml_by_extension() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("engine.yaml");
    fs::write(&path, "memoize: false\nplatform: windows\ncursor_idle_ms: 0\n")?;

    let config = EngineConfig::load(&path)?;
    assert!(!config.memoize);
    assert_eq!(config.platform, Some(Platform::Windows));
    assert_eq!(config.cursor_idle_ms, 0);
    Ok(())
}

/// Loading sanitizes the threshold, so a negative value falls back to 6.5.
#[test]
fn negative_threshold_in_file_is_replaced() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("engine.json");
    fs::write(&path, r#"{ "threshold": -3.0 }"#)?;
    assert_eq!(EngineConfig::load(&path)?.threshold, 6.5);
    Ok(())
}

/// A missing file reports `ConfigRead` and names the path.
#[test]
fn missing_file_is_a_read_error() {
    let dir = tempdir().unwrap();
    let err = EngineConfig::load(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, EngineError::ConfigRead { .. }));
    assert!(err.to_string().contains("absent.json"));
}

/// Unparseable content reports `ConfigParse`.
#[test]
fn malformed_file_is_a_parse_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("engine.json");
    fs::write(&path, "{ not json").unwrap();
    let err = EngineConfig::load(&path).unwrap_err();
    assert!(matches!(err, EngineError::ConfigParse { .. }));
}

#[test]
fn serialized_config_loads_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("engine.json");
    let written = EngineConfig { threshold: 8.0, merge_qemu_kvm: true, ..EngineConfig::default() };
    fs::write(&path, serde_json::to_string_pretty(&written).unwrap()).unwrap();
    assert_eq!(EngineConfig::load(&path).unwrap(), written);
}
