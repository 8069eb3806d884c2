//! # Run State
//!
//! The in-progress flag of a run. Collaborators (a presentation layer, a second
//! trigger) may read it through a cloned [`RunState`]; only the pipeline
//! orchestrator flips it. [`RunRegistry`] hands out one shared state per
//! (table, view) target so at most one run is active per target.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The (table, view) pairing a run operates on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunTarget {
    pub table: String,
    pub view: String,
}

impl RunTarget {
    pub fn new(table: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            view: view.into(),
        }
    }
}

impl fmt::Display for RunTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} › {}", self.table, self.view)
    }
}

/// Shared in-progress flag; clones observe the same flag
#[derive(Debug, Clone, Default)]
pub struct RunState {
    in_progress: Arc<AtomicBool>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Flip false → true. Returns `false` if a run already holds the flag.
    pub(crate) fn try_begin(&self) -> bool {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn finish(&self) {
        self.in_progress.store(false, Ordering::Release);
    }

    /// Whether a handle other than this one is alive
    fn is_shared(&self) -> bool {
        Arc::strong_count(&self.in_progress) > 1
    }
}

/// One [`RunState`] per run target
#[derive(Debug, Default)]
pub struct RunRegistry {
    states: DashMap<RunTarget, RunState>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared state for a target, created on first use
    pub fn state_for(&self, target: &RunTarget) -> RunState {
        self.states.entry(target.clone()).or_default().clone()
    }

    /// Drop targets that are idle and no longer referenced outside the registry.
    /// Returns how many were removed.
    pub fn remove_idle(&self) -> usize {
        let before = self.states.len();
        self.states
            .retain(|_, state| state.is_in_progress() || state.is_shared());
        before - self.states.len()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Targets with a run currently in progress
    pub fn active_targets(&self) -> Vec<RunTarget> {
        self.states
            .iter()
            .filter(|entry| entry.value().is_in_progress())
            .map(|entry| entry.key().clone())
            .collect()
    }
}
