use std::fs;
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::cache::CachePolicy;
use crate::error::{EngineError, EngineResult};
use crate::model::Platform;

/// Score at or above which an evaluation is judged virtual.
pub const DEFAULT_THRESHOLD: f64 = 6.5;
pub const DEFAULT_TIMING_BASELINE_CYCLES: u64 = 350;
pub const DEFAULT_TIMING_ITERATIONS: u32 = 100;
pub const DEFAULT_CURSOR_IDLE_MS: u64 = 5000;

/// Tunables for one engine.
///
/// Every field has a default, so a config file only lists what it changes.
/// Files ending in `.yaml`/`.yml` are read as YAML, anything else as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub threshold: f64,
    pub cache_policy: CachePolicy,
    /// When false, every query runs a fresh evaluation.
    pub memoize: bool,
    /// Mean CPUID latency (cycles) above which the timing technique detects.
    pub timing_baseline_cycles: u64,
    pub timing_iterations: u32,
    /// Idle window of the cursor technique.
    pub cursor_idle_ms: u64,
    /// Report "QEMU/KVM" when both brands were tallied.
    pub merge_qemu_kvm: bool,
    /// Overrides the platform the crate was built for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            cache_policy: CachePolicy::default(),
            memoize: true,
            timing_baseline_cycles: DEFAULT_TIMING_BASELINE_CYCLES,
            timing_iterations: DEFAULT_TIMING_ITERATIONS,
            cursor_idle_ms: DEFAULT_CURSOR_IDLE_MS,
            merge_qemu_kvm: false,
            platform: None,
        }
    }
}

impl EngineConfig {
    /// Read a config file from disk.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|source| EngineError::ConfigRead { path: path.to_path_buf(), source })?;
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        let parsed: Self = if is_yaml {
            serde_yaml::from_str(&raw).map_err(|e| EngineError::ConfigParse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        } else {
            serde_json::from_str(&raw).map_err(|e| EngineError::ConfigParse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        };
        Ok(parsed.sanitized())
    }

    /// Replace out-of-range values with their defaults.
    pub fn sanitized(mut self) -> Self {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            warn!("threshold {} is out of range; using {DEFAULT_THRESHOLD}", self.threshold);
            self.threshold = DEFAULT_THRESHOLD;
        }
        self
    }

    /// Platform techniques are selected for.
    pub fn effective_platform(&self) -> Platform {
        self.platform.unwrap_or_else(Platform::current)
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }
}
