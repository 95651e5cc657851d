//! Single-use latch
//!
//! Guards actions that must run at most once even when two threads race to
//! perform them, such as closing a handle during teardown.

use std::sync::atomic::{AtomicBool, Ordering};

/// A flag that can be tripped exactly once
#[derive(Debug, Default)]
pub struct CloseLatch(AtomicBool);

impl CloseLatch {
    /// Create an untripped latch
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Trip the latch
    ///
    /// Returns `true` for the single caller that tripped it, `false` for every
    /// later caller.
    pub fn trip(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Whether the latch has been tripped
    pub fn is_tripped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
