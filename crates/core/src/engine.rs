//! Evaluator, aggregator and strict validator.
//!
//! An `Engine` owns its probe, configuration, technique registry and result
//! cache. Independent engines never share state, which is what tests and
//! replay tools rely on; the crate-level `detect`/`brand`/`check` functions
//! wrap one process-wide engine over the real host.

use std::sync::Arc;

use chrono::Utc;
use log::debug;

use crate::brands::{BrandKind, BrandTally};
use crate::cache::ResultCache;
use crate::checks::{default_registry, CheckContext, CheckRegistry, Technique};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::model::{EvaluationOutcome, EvaluationReport, Flagset, Platform};
use crate::probe::{CapabilityProbe, HostProbe};

pub struct Engine<P: CapabilityProbe> {
    probe: P,
    config: EngineConfig,
    platform: Platform,
    registry: CheckRegistry<P>,
    cache: ResultCache,
}

impl Engine<HostProbe> {
    /// Engine over the machine this process runs on, with default settings.
    pub fn host() -> Self {
        Self::new(HostProbe::new())
    }
}

impl<P: CapabilityProbe> Engine<P> {
    pub fn new(probe: P) -> Self {
        Self::with_config(probe, EngineConfig::default())
    }

    pub fn with_config(probe: P, config: EngineConfig) -> Self {
        let config = config.sanitized();
        let platform = config.effective_platform();
        let registry = default_registry().for_platform(platform);
        let cache = ResultCache::new(config.cache_policy);
        debug!("engine for {platform:?} with {} techniques", registry.len());
        Self { probe, config, platform, registry, cache }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Whether the environment is judged virtual under `flags`.
    ///
    /// With the default cache policy the first flagset ever evaluated decides
    /// the answer for every later call.
    pub fn detect(&self, flags: Flagset) -> bool {
        self.report(flags).outcome.is_virtual
    }

    /// Best-guess vendor, or `"Unknown"` when not virtual or unattributed.
    /// Evaluates with `Flagset::DEFAULT` if nothing is cached yet.
    pub fn brand(&self) -> String {
        self.brand_for(Flagset::DEFAULT)
    }

    /// Vendor taken from the same report `detect(flags)` answers from, so a
    /// non-virtual verdict always pairs with `"Unknown"`.
    pub fn brand_for(&self, flags: Flagset) -> String {
        self.report(flags).brand().to_string()
    }

    pub fn brand_type(&self) -> BrandKind {
        self.brand_type_for(Flagset::DEFAULT)
    }

    pub fn brand_type_for(&self, flags: Flagset) -> BrandKind {
        BrandKind::of(self.report(flags).brand())
    }

    /// Strict validator: exactly one bit must be set.
    pub fn check(&self, flags: Flagset) -> EngineResult<()> {
        match flags.count() {
            0 => Err(EngineError::invalid_argument(
                "flag argument must contain at least a single option",
            )),
            1 => Ok(()),
            _ => Err(EngineError::invalid_argument("flag argument must only contain a single option")),
        }
    }

    /// Validate like `check`, then run only that technique. Bypasses the
    /// cache and uses a private tally.
    pub fn run_technique(&self, flags: Flagset) -> EngineResult<bool> {
        self.check(flags)?;
        let flag = flags.single().ok_or_else(|| {
            EngineError::invalid_argument(format!("bit {flags} does not name a technique"))
        })?;
        let technique = self.registry.get(flag).ok_or_else(|| {
            EngineError::invalid_argument(format!(
                "no technique registered for {flag} on {:?}",
                self.platform
            ))
        })?;

        let cpuid_supported = self.cpuid_supported();
        let mut tally = BrandTally::new();
        let mut ctx = CheckContext {
            probe: &self.probe,
            config: &self.config,
            cpuid_supported,
            tally: &mut tally,
        };
        let detected = technique.run(flags, &mut ctx);
        debug!("{}: {}", technique.name, detected);
        Ok(detected)
    }

    /// Full evaluation result, from the cache when allowed.
    pub fn report(&self, flags: Flagset) -> Arc<EvaluationReport> {
        if !self.config.memoize {
            return Arc::new(self.evaluate(flags));
        }
        self.cache.get_or_insert_with(flags, || self.evaluate(flags))
    }

    pub fn score(&self, flags: Flagset) -> f64 {
        self.report(flags).outcome.score
    }

    /// Score relative to the threshold, capped at 100.
    pub fn percentage(&self, flags: Flagset) -> u8 {
        self.report(flags).percentage()
    }

    pub fn techniques(&self) -> &[Technique<P>] {
        self.registry.as_slice()
    }

    pub fn technique_count(&self) -> usize {
        self.registry.len()
    }

    /// True once a memoized evaluation exists.
    pub fn is_evaluated(&self) -> bool {
        self.cache.is_populated()
    }

    fn cpuid_supported(&self) -> bool {
        self.probe.read_cpu_leaf(0, 0).map_or(false, |regs| regs.eax >= 1)
    }

    fn evaluate(&self, flags: Flagset) -> EvaluationReport {
        let cpuid_supported = self.cpuid_supported();
        debug!("evaluating {flags} (cpuid supported: {cpuid_supported})");

        let mut tally = BrandTally::new();
        let mut checks = Vec::with_capacity(self.registry.len());
        let mut score = 0.0;

        for technique in self.registry.iter() {
            let enabled = flags.contains(technique.flag);
            let detected = {
                let mut ctx = CheckContext {
                    probe: &self.probe,
                    config: &self.config,
                    cpuid_supported,
                    tally: &mut tally,
                };
                technique.run(flags, &mut ctx)
            };
            if detected {
                score += technique.weight;
            }
            if enabled {
                debug!("{}: {} (weight {})", technique.name, detected, technique.weight);
            }
            checks.push(technique.result(enabled, detected));
        }

        let is_virtual = score >= self.config.threshold;
        let brand = tally.leader_name(self.config.merge_qemu_kvm);
        debug!("score {score} against threshold {}: virtual={is_virtual}", self.config.threshold);

        EvaluationReport {
            flagset: flags,
            platform: self.platform,
            cpuid_supported,
            threshold: self.config.threshold,
            outcome: EvaluationOutcome { is_virtual, score, brand },
            checks,
            tally,
            evaluated_at: Utc::now().to_rfc3339(),
        }
    }
}

/// `floor(score / threshold * 100)` capped at 100; a zero threshold is 100.
pub fn percentage_of(score: f64, threshold: f64) -> u8 {
    if threshold <= 0.0 {
        return 100;
    }
    let raw = (score / threshold * 100.0).floor();
    raw.clamp(0.0, 100.0) as u8
}
