//! Scoped detachment guard (spec §9 "Scoped detachment"): dropping the
//! guard returned by an attach operation detaches it, but only if no newer
//! attachment has since replaced it — a stale guard outliving a
//! re-attachment must never tear down the thing that replaced it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct AttachGuard {
    current_generation: Arc<AtomicU64>,
    my_generation: u64,
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl std::fmt::Debug for AttachGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachGuard")
            .field("generation", &self.my_generation)
            .finish()
    }
}

impl AttachGuard {
    pub(crate) fn new(
        current_generation: Arc<AtomicU64>,
        my_generation: u64,
        detach: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            current_generation,
            my_generation,
            detach: Some(Box::new(detach)),
        }
    }

    /// Detaches immediately rather than waiting for drop.
    pub fn detach(mut self) {
        self.run_detach_if_current();
    }

    fn run_detach_if_current(&mut self) {
        if self.current_generation.load(Ordering::SeqCst) == self.my_generation {
            if let Some(detach) = self.detach.take() {
                detach();
            }
        } else {
            self.detach = None;
        }
    }
}

impl Drop for AttachGuard {
    fn drop(&mut self) {
        self.run_detach_if_current();
    }
}

/// Hands out generation-stamped [`AttachGuard`]s and tracks the current
/// generation so a new `attach()` invalidates any guard from a prior one.
#[derive(Debug, Default)]
pub struct AttachSlot {
    generation: Arc<AtomicU64>,
}

impl AttachSlot {
    pub fn new() -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Bumps the generation and returns a guard for this attachment plus
    /// the generation value it was stamped with, so the caller can store it
    /// alongside whatever state `detach` will tear down.
    pub fn attach(&self, detach: impl FnOnce() + Send + 'static) -> AttachGuard {
        let my_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        AttachGuard::new(self.generation.clone(), my_generation, detach)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn dropping_guard_detaches() {
        let slot = AttachSlot::new();
        let detached = Arc::new(AtomicBool::new(false));
        let detached2 = detached.clone();
        let guard = slot.attach(move || detached2.store(true, Ordering::SeqCst));
        drop(guard);
        assert!(detached.load(Ordering::SeqCst));
    }

    #[test]
    fn stale_guard_does_not_detach_a_newer_attachment() {
        let slot = AttachSlot::new();
        let first_detached = Arc::new(AtomicBool::new(false));
        let first_detached2 = first_detached.clone();
        let first_guard = slot.attach(move || first_detached2.store(true, Ordering::SeqCst));

        let second_detached = Arc::new(AtomicBool::new(false));
        let second_detached2 = second_detached.clone();
        let _second_guard = slot.attach(move || second_detached2.store(true, Ordering::SeqCst));

        drop(first_guard);
        assert!(!first_detached.load(Ordering::SeqCst));
        assert!(!second_detached.load(Ordering::SeqCst));
    }

    #[test]
    fn explicit_detach_runs_immediately() {
        let slot = AttachSlot::new();
        let detached = Arc::new(AtomicBool::new(false));
        let detached2 = detached.clone();
        let guard = slot.attach(move || detached2.store(true, Ordering::SeqCst));
        guard.detach();
        assert!(detached.load(Ordering::SeqCst));
    }
}
