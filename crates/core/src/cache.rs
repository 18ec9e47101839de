//! Memoized evaluation results.
//!
//! `FirstCall` keeps a single slot: whichever flagset is evaluated first
//! fixes the outcome for the lifetime of the cache, and later flagsets are
//! ignored. `PerFlagset` keys the slot by flagset instead. Population is
//! race-free in both modes: concurrent first callers block until one
//! evaluation has finished and all of them see its report.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::model::{EvaluationReport, Flagset};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    #[default]
    FirstCall,
    PerFlagset,
}

#[derive(Debug, Default)]
pub struct ResultCache {
    policy: CachePolicy,
    first: OnceLock<Arc<EvaluationReport>>,
    keyed: Mutex<HashMap<Flagset, Arc<EvaluationReport>>>,
}

impl ResultCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self { policy, ..Self::default() }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Cached report for `flags`, running `evaluate` at most once per slot.
    pub fn get_or_insert_with<F>(&self, flags: Flagset, evaluate: F) -> Arc<EvaluationReport>
    where
        F: FnOnce() -> EvaluationReport,
    {
        match self.policy {
            CachePolicy::FirstCall => {
                if let Some(report) = self.first.get() {
                    if report.flagset != flags {
                        debug!(
                            "cache hit: returning outcome for {} (requested {flags})",
                            report.flagset
                        );
                    }
                    return Arc::clone(report);
                }
                Arc::clone(self.first.get_or_init(|| Arc::new(evaluate())))
            }
            CachePolicy::PerFlagset => {
                let mut keyed = self.keyed.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(report) = keyed.get(&flags) {
                    debug!("cache hit for {flags}");
                    return Arc::clone(report);
                }
                let report = Arc::new(evaluate());
                keyed.insert(flags, Arc::clone(&report));
                report
            }
        }
    }

    /// Report that a query with `flags` would be answered from, if any.
    pub fn get(&self, flags: Flagset) -> Option<Arc<EvaluationReport>> {
        match self.policy {
            CachePolicy::FirstCall => self.first.get().cloned(),
            CachePolicy::PerFlagset => {
                self.keyed.lock().unwrap_or_else(|e| e.into_inner()).get(&flags).cloned()
            }
        }
    }

    /// True once any evaluation has been stored.
    pub fn is_populated(&self) -> bool {
        match self.policy {
            CachePolicy::FirstCall => self.first.get().is_some(),
            CachePolicy::PerFlagset => {
                !self.keyed.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
            }
        }
    }
}
