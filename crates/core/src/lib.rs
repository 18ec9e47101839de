//! vmprobe-core
//!
//! Detection engine that decides, from inside a running process, whether the
//! execution environment is virtualized or sandboxed.
//!
//! Many independent, individually unreliable techniques (CPUID signatures,
//! timing, firmware strings, OS artifacts) each contribute a fixed weight
//! when they fire; the summed score is compared to a threshold. Techniques
//! also vote for the vendor they recognised, giving a best-guess brand.
//!
//! All logic is written against the `CapabilityProbe` trait so it runs the
//! same way on the real host and on scripted observations.

pub mod brands;
pub mod cache;
pub mod checks;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod probe;
pub mod verdict;

use std::sync::OnceLock;

pub use brands::{Brand, BrandKind, BrandTally};
pub use cache::CachePolicy;
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use model::{CheckResult, EvaluationOutcome, EvaluationReport, Flag, Flagset, Platform};
pub use probe::{CapabilityProbe, CpuRegisters, HostProbe, ScriptedProbe};

/// Returns the library version as encoded at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

static GLOBAL: OnceLock<Engine<HostProbe>> = OnceLock::new();

/// Process-wide engine over the real host, created on first use.
pub fn global() -> &'static Engine<HostProbe> {
    GLOBAL.get_or_init(Engine::<HostProbe>::host)
}

/// `global().detect(flags)`.
pub fn detect(flags: Flagset) -> bool {
    global().detect(flags)
}

/// `global().brand()`; `"Unknown"` whenever `detect` says not virtual.
pub fn brand() -> String {
    global().brand()
}

/// Reject any flagset that does not name exactly one technique.
pub fn check(flags: Flagset) -> EngineResult<()> {
    global().check(flags)
}
