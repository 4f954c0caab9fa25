//! Foreground/background snapshot pair.
//!
//! The renderer reads the foreground through a read lock; the worker fills the
//! background under its own mutex. Publishing a new generation is a pointer
//! exchange of the two boxes under the foreground write lock.

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::snapshot::Snapshot;

/// Which of the two physical slots currently backs the foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    fn other(self) -> Slot {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }
}

struct Front {
    snapshot: Box<Snapshot>,
    slot: Slot,
}

/// Owns both snapshot generations and exchanges their roles.
pub struct DoubleBuffer {
    foreground: RwLock<Front>,
    background: Mutex<Box<Snapshot>>,
    swaps: AtomicU64,
}

impl Default for DoubleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl DoubleBuffer {
    pub fn new() -> Self {
        DoubleBuffer {
            foreground: RwLock::new(Front {
                snapshot: Box::new(Snapshot::new()),
                slot: Slot::A,
            }),
            background: Mutex::new(Box::new(Snapshot::new())),
            swaps: AtomicU64::new(0),
        }
    }

    /// Publish the background as the new foreground.
    ///
    /// Returns false without touching either buffer while a gesture is active.
    pub fn try_swap(&self, gesture_active: bool) -> bool {
        if gesture_active {
            return false;
        }
        let mut background = self.lock_background();
        let mut front = self
            .foreground
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::swap(&mut front.snapshot, &mut *background);
        front.slot = front.slot.other();
        let count = self.swaps.fetch_add(1, Ordering::AcqRel) + 1;
        log::debug!(
            "[DoubleBuffer] Swap #{} -> slot {:?} (generation {})",
            count,
            front.slot,
            front.snapshot.generation()
        );
        true
    }

    /// Read the foreground. No swap can happen while `f` runs.
    pub fn with_foreground<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> R {
        let front = self
            .foreground
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&front.snapshot)
    }

    /// Edit the foreground in place from the consumer thread.
    pub fn with_foreground_mut<R>(&self, f: impl FnOnce(&mut Snapshot) -> R) -> R {
        let mut front = self
            .foreground
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut front.snapshot)
    }

    /// Access the background under its mutex.
    pub fn with_background<R>(&self, f: impl FnOnce(&mut Snapshot) -> R) -> R {
        let mut background = self.lock_background();
        f(&mut background)
    }

    /// Access the background for finalizing against a read view of the
    /// foreground. Locks are taken background first, as in `try_swap`.
    pub fn with_both<R>(&self, f: impl FnOnce(&mut Snapshot, &Snapshot) -> R) -> R {
        let mut background = self.lock_background();
        let front = self
            .foreground
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut background, &front.snapshot)
    }

    /// Empty the background so the next scan starts from scratch.
    pub fn clear_background(&self) {
        self.lock_background().clear();
    }

    pub fn front_slot(&self) -> Slot {
        self.foreground
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .slot
    }

    pub fn swap_count(&self) -> u64 {
        self.swaps.load(Ordering::Acquire)
    }

    fn lock_background(&self) -> MutexGuard<'_, Box<Snapshot>> {
        self.background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityKind;
    use crate::snapshot::Entity;

    #[test]
    fn test_swap_exchanges_roles() {
        let buffer = DoubleBuffer::new();
        buffer.with_background(|bg| {
            bg.set_generation(3);
            bg.add_entity(Entity::new("svc.A", EntityKind::Service));
        });

        assert_eq!(buffer.front_slot(), Slot::A);
        assert!(buffer.try_swap(false));
        assert_eq!(buffer.front_slot(), Slot::B);
        assert_eq!(buffer.swap_count(), 1);
        assert_eq!(buffer.with_foreground(|fg| fg.generation()), 3);
        assert!(buffer.with_background(|bg| bg.is_empty()));
    }

    #[test]
    fn test_gesture_blocks_swap() {
        let buffer = DoubleBuffer::new();
        buffer.with_background(|bg| {
            bg.add_entity(Entity::new("svc.A", EntityKind::Service));
        });
        let before = buffer.with_foreground(|fg| fg as *const Snapshot);

        assert!(!buffer.try_swap(true));
        let after = buffer.with_foreground(|fg| fg as *const Snapshot);
        assert!(std::ptr::eq(before, after));
        assert_eq!(buffer.swap_count(), 0);
        assert_eq!(buffer.with_background(|bg| bg.entity_count()), 1);
    }

    #[test]
    fn test_clear_background_keeps_foreground() {
        let buffer = DoubleBuffer::new();
        buffer.with_background(|bg| {
            bg.add_entity(Entity::new("svc.A", EntityKind::Service));
        });
        buffer.try_swap(false);
        buffer.with_background(|bg| {
            bg.add_entity(Entity::new("svc.B", EntityKind::Service));
        });
        buffer.clear_background();
        assert!(buffer.with_background(|bg| bg.is_empty()));
        assert!(buffer.with_foreground(|fg| fg.entity("svc.A").is_some()));
    }
}
