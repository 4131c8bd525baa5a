//! Instance slots
//!
//! A slot holds zero or one instance behind three locks: the slot API lock
//! used by control operations, and one fairness lock per I/O direction.
//! Each lock guards its own copy of the instance pointer, and all three
//! copies are only changed together in [`Slot::install`]. Readers therefore
//! need just the lock matching their operation: I/O never touches the
//! slot API lock.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::processor::ProcInstance;

/// Shared handle to an installed instance
pub(crate) type ProcRef = Arc<ProcInstance>;

/// Guard of a slot's API lock
pub(crate) type SlotGuard<'a> = MutexGuard<'a, Option<ProcRef>>;

#[derive(Debug, Default)]
pub(crate) struct Slot {
    api: Mutex<Option<ProcRef>>,
    fair_in: Mutex<Option<ProcRef>>,
    fair_out: Mutex<Option<ProcRef>>,
}

impl Slot {
    /// Lock the slot for a control operation
    pub fn lock_api(&self) -> SlotGuard<'_> {
        self.api.lock()
    }

    /// Lock the input direction
    pub fn lock_input(&self) -> MutexGuard<'_, Option<ProcRef>> {
        self.fair_in.lock()
    }

    /// Lock the output direction
    pub fn lock_output(&self) -> MutexGuard<'_, Option<ProcRef>> {
        self.fair_out.lock()
    }

    /// Swap the installed instance, returning the previous one
    ///
    /// The caller holds the API lock; both fairness locks are taken here for
    /// the duration of the swap and released in reverse order. The previous
    /// instance is handed back so it can be closed outside the fairness locks.
    pub fn install(&self, api: &mut SlotGuard<'_>, instance: Option<ProcRef>) -> Option<ProcRef> {
        let mut fair_in = self.fair_in.lock();
        let mut fair_out = self.fair_out.lock();

        fair_in.clone_from(&instance);
        fair_out.clone_from(&instance);
        let previous = std::mem::replace(&mut **api, instance);

        drop(fair_out);
        drop(fair_in);
        previous
    }
}
