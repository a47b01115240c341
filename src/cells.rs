//! Atomic cell primitives over a fixed slice of reference-valued slots.
//!
//! Both containers talk to their backing storage exclusively through this
//! type, so the ordering discipline lives in one place: loads are acquire,
//! publishing stores are release, read-modify-writes are acquire-release.
//! The migration protocol relies on release/acquire publication rather than
//! sequential consistency.

use crossbeam_epoch::{Atomic, CompareExchangeError, Guard, Pointer, Shared};
use std::sync::atomic::Ordering;

pub(crate) struct AtomicCells<P> {
    slots: Box<[Atomic<P>]>,
}

impl<P> AtomicCells<P> {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| Atomic::null()).collect(),
        }
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Acquire-load of slot `i`.
    #[inline(always)]
    pub(crate) fn load<'g>(&self, i: usize, guard: &'g Guard) -> Shared<'g, P> {
        self.slots[i].load(Ordering::Acquire, guard)
    }

    /// Release-store into slot `i`.
    #[inline(always)]
    pub(crate) fn store<N: Pointer<P>>(&self, i: usize, new: N) {
        self.slots[i].store(new, Ordering::Release);
    }

    /// Atomically replace slot `i`, returning the previous pointer.
    #[inline(always)]
    pub(crate) fn swap<'g, N: Pointer<P>>(&self, i: usize, new: N, guard: &'g Guard) -> Shared<'g, P> {
        self.slots[i].swap(new, Ordering::AcqRel, guard)
    }

    /// Strong compare-and-set on slot `i`. Never fails spuriously; used
    /// where a retry would re-run a user closure or re-publish a value.
    #[inline(always)]
    pub(crate) fn cas<'g, N: Pointer<P>>(
        &self,
        i: usize,
        current: Shared<'_, P>,
        new: N,
        guard: &'g Guard,
    ) -> Result<Shared<'g, P>, CompareExchangeError<'g, P, N>> {
        self.slots[i].compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire, guard)
    }

    /// Weak compare-and-set on slot `i`. May fail spuriously; only for
    /// loops that re-read on mismatch anyway.
    #[inline(always)]
    pub(crate) fn cas_weak<'g, N: Pointer<P>>(
        &self,
        i: usize,
        current: Shared<'_, P>,
        new: N,
        guard: &'g Guard,
    ) -> Result<Shared<'g, P>, CompareExchangeError<'g, P, N>> {
        self.slots[i].compare_exchange_weak(current, new, Ordering::AcqRel, Ordering::Acquire, guard)
    }
}
