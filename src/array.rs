//! Resizable concurrent array with a nonblocking, cooperative resize.
//!
//! Every cell holds one of three states: empty (a null pointer), a value
//! node, or a forwarding marker. A marker is the owning transfer
//! descriptor's address tagged in the pointer's low bits with the direction
//! of the worker that claimed the slot, so readers can always resolve the
//! destination array even under stacked resizes.
//!
//! Migration runs in two directions at once: the resize caller drives the
//! forward (left) scan, while the first writer to observe an in-progress
//! transfer claims the reverse (right) scan and drives it to completion.
//! Each migrated value is published into the destination with a release
//! store before the marker commits into the source with a strong CAS, which
//! carries the happens-before edge every marker-chasing reader relies on.

use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::cells::AtomicCells;
use crate::delay;

/// Direction tags carried in the marker pointer's low bits.
const LEFT_TAG: usize = 1;
const RIGHT_TAG: usize = 2;

// ================================================================================================
// SLOT ENCODING
// ================================================================================================

// Forced alignment keeps the low tag bits of every slot pointer free even
// for byte-sized element types.
#[repr(align(8))]
struct Node<T> {
    value: T,
}

/// One generation of backing storage. Owns its value nodes; forwarding
/// markers belong to the descriptor that installed them.
struct Backing<T> {
    cells: AtomicCells<Node<T>>,
}

impl<T> Backing<T> {
    fn new(len: usize) -> Self {
        Self {
            cells: AtomicCells::new(len),
        }
    }

    #[inline(always)]
    fn len(&self) -> usize {
        self.cells.len()
    }
}

impl<T> Drop for Backing<T> {
    fn drop(&mut self) {
        // &mut self via reclamation: exclusive access. Markers are skipped,
        // the descriptor frees itself.
        let guard = unsafe { epoch::unprotected() };
        for i in 0..self.cells.len() {
            let p = self.cells.load(i, guard);
            if !p.is_null() && p.tag() == 0 {
                drop(unsafe { p.into_owned() });
            }
        }
    }
}

/// Descriptor address carried by a forwarding marker.
#[inline(always)]
fn fwd_source<T>(p: Shared<'_, Node<T>>) -> *const Transfer<T> {
    p.as_raw() as *const Transfer<T>
}

/// Build the marker pointer for one direction of `src`.
#[inline(always)]
fn marker<'g, T>(src: *const Transfer<T>, tag: usize) -> Shared<'g, Node<T>> {
    Shared::from(src as *const Node<T>).with_tag(tag)
}

// ================================================================================================
// TRANSFER DESCRIPTOR
// ================================================================================================

/// Per-resize migration state shared by both workers and every helper.
struct Transfer<T> {
    src_off: usize,
    dst_off: usize,
    /// Destination backing; fixed once the descriptor is published.
    next: Atomic<Backing<T>>,
    /// Source backing; nulled by `post_completed`, which is the done signal.
    prev: Atomic<Backing<T>>,
    /// Set by the first helper to claim the reverse scan.
    right_helper: AtomicBool,
}

impl<T> Transfer<T> {
    #[inline(always)]
    fn is_done(&self, guard: &Guard) -> bool {
        self.prev.load(Ordering::Acquire, guard).is_null()
    }

    fn post_completed(&self) {
        self.prev.store(Shared::null(), Ordering::Release);
    }
}

// ================================================================================================
// TRANSFER WORKERS
// ================================================================================================

/// Forward scan, driven by the resize caller.
///
/// Rebases onto a newer descriptor when it encounters a foreign marker, so
/// a worker that outlives its own resize helps the one that superseded it.
fn run_left<T: Clone>(d: &Transfer<T>, d_raw: *const Transfer<T>, guard: &Guard) {
    let next_sh = d.next.load(Ordering::Acquire, guard);
    // SAFETY: next/prev were loaded under `guard`; the descriptor and both
    // backings are retired no earlier than the publication that makes them
    // unreachable, so they outlive this pin.
    let next = unsafe { next_sh.deref() };
    let shared_sh = d.prev.load(Ordering::Acquire, guard);
    if shared_sh.is_null() {
        return;
    }
    let mut shared = unsafe { shared_sh.deref() };

    let nz = next.len();
    let mut len = nz.min(shared.len());
    let left_marker = marker::<T>(d_raw, LEFT_TAG);
    let (mut src_pos, mut dst_pos) = (d.src_off, d.dst_off);

    let mut i = 0;
    'outer: while i < len {
        loop {
            if d.is_done(guard) {
                return;
            }
            let f = shared.cells.load(src_pos, guard);
            if f.is_null() {
                // migrate-as-empty: claim the slot, nothing to publish
                if shared.cells.cas_weak(src_pos, f, left_marker, guard).is_ok() {
                    break;
                }
            } else if f.tag() != 0 {
                let f_src = fwd_source(f);
                if std::ptr::eq(f_src, d_raw) {
                    if f.tag() == RIGHT_TAG {
                        // met the counterpart: the range is covered
                        break 'outer;
                    }
                    break; // our own claim
                }
                // a newer resize is superimposed; continue against its arrays
                // SAFETY: reachable marker implies a live descriptor (see above)
                let other = unsafe { &*f_src };
                let p = other.prev.load(Ordering::Acquire, guard);
                let rebased = if p.is_null() {
                    other.next.load(Ordering::Acquire, guard)
                } else {
                    p
                };
                shared = unsafe { rebased.deref() };
                len = unsafe { other.next.load(Ordering::Acquire, guard).deref() }
                    .len()
                    .min(nz);
            } else {
                // publish a copy into the destination first, then commit the
                // marker; a strong CAS so the copy is not re-published on a
                // spurious failure
                let v = unsafe { &f.deref().value };
                let copy = Owned::new(Node { value: v.clone() }).into_shared(guard);
                let displaced = next.cells.swap(dst_pos, copy, guard);
                if !displaced.is_null() {
                    unsafe { guard.defer_destroy(displaced) };
                }
                if shared.cells.cas(src_pos, f, left_marker, guard).is_ok() {
                    // the marker detaches the source node; retire it
                    unsafe { guard.defer_destroy(f) };
                    break;
                }
            }
        }
        i += 1;
        src_pos += 1;
        dst_pos += 1;
    }
    d.post_completed();
}

/// Reverse scan, claimed lazily by the first helping writer.
///
/// Scans the original source only; on a foreign marker it re-reads until
/// the forward worker's rebase or completion resolves the slot.
fn run_right<T: Clone>(d: &Transfer<T>, d_raw: *const Transfer<T>, guard: &Guard) {
    let prev_sh = d.prev.load(Ordering::Acquire, guard);
    if prev_sh.is_null() {
        return;
    }
    // SAFETY: as in `run_left`
    let prev = unsafe { prev_sh.deref() };
    let next = unsafe { d.next.load(Ordering::Acquire, guard).deref() };

    let len = next.len().min(prev.len());
    let right_marker = marker::<T>(d_raw, RIGHT_TAG);

    let mut i = len;
    'outer: while i > 0 {
        let off = i - 1;
        let (src_pos, dst_pos) = (d.src_off + off, d.dst_off + off);
        loop {
            if d.is_done(guard) {
                return;
            }
            let f = prev.cells.load(src_pos, guard);
            if f.is_null() {
                if prev.cells.cas_weak(src_pos, f, right_marker, guard).is_ok() {
                    break;
                }
            } else if f.tag() != 0 {
                if std::ptr::eq(fwd_source(f), d_raw) {
                    if f.tag() == LEFT_TAG {
                        // met the counterpart
                        break 'outer;
                    }
                    // forward worker owns the adjacent slots; back off once
                    thread::yield_now();
                    break;
                }
                std::hint::spin_loop();
            } else {
                let v = unsafe { &f.deref().value };
                let copy = Owned::new(Node { value: v.clone() }).into_shared(guard);
                let displaced = next.cells.swap(dst_pos, copy, guard);
                if !displaced.is_null() {
                    unsafe { guard.defer_destroy(displaced) };
                }
                if prev.cells.cas(src_pos, f, right_marker, guard).is_ok() {
                    // the marker detaches the source node; retire it
                    unsafe { guard.defer_destroy(f) };
                    break;
                }
            }
        }
        i -= 1;
    }
    d.post_completed();
}

/// Write-path helping: claim the reverse scan if nobody has, drive it to
/// completion, and hand back the destination to retry against.
fn help_transfer<'g, T: Clone>(src: *const Transfer<T>, guard: &'g Guard) -> Shared<'g, Backing<T>> {
    // SAFETY: the caller read a marker for `src` under `guard`
    let d = unsafe { &*src };
    if !d.right_helper.swap(true, Ordering::AcqRel) {
        run_right(d, src, guard);
    }
    d.next.load(Ordering::Acquire, guard)
}

// ================================================================================================
// PUBLIC FACADE
// ================================================================================================

/// Indexed concurrent container with `get`/`set`/`cas` per cell and a
/// nonblocking resize.
///
/// Single-cell operations are linearizable against other operations on the
/// same cell and lock-free; a resize migrates cells cooperatively, and any
/// writer that observes it in progress helps it finish before retrying.
/// Indexing past the current length panics.
pub struct AtomicArray<T> {
    array: Atomic<Backing<T>>,
    /// Serializes resize initiators; never touched by readers or writers.
    resize_lock: AtomicBool,
}

impl<T> AtomicArray<T> {
    /// Create an array of `len` empty cells.
    pub fn new(len: usize) -> Self {
        Self {
            array: Atomic::new(Backing::new(len)),
            resize_lock: AtomicBool::new(false),
        }
    }

    /// Create an array populated from `values`, one value per cell.
    pub fn with_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let values: Vec<T> = values.into_iter().collect();
        let backing = Backing::new(values.len());
        for (i, v) in values.into_iter().enumerate() {
            backing.cells.store(i, Owned::new(Node { value: v }));
        }
        Self {
            array: Atomic::new(backing),
            resize_lock: AtomicBool::new(false),
        }
    }

    /// Length of the most recently published backing array.
    pub fn len(&self) -> usize {
        let guard = &epoch::pin();
        // SAFETY: loaded under `guard`; the published backing is retired
        // only after a newer one replaces it
        unsafe { self.array.load(Ordering::Acquire, guard).deref() }.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current value at `i`, chasing forwarding markers into the
    /// destination array. Lookup only; never helps.
    pub fn get(&self, i: usize) -> Option<T>
    where
        T: Clone,
    {
        let guard = &epoch::pin();
        let mut arr = unsafe { self.array.load(Ordering::Acquire, guard).deref() };
        loop {
            let f = arr.cells.load(i, guard);
            if f.tag() != 0 {
                // SAFETY: reachable marker implies a live descriptor
                arr = unsafe { (*fwd_source(f)).next.load(Ordering::Acquire, guard).deref() };
                continue;
            }
            return unsafe { f.as_ref() }.map(|n| n.value.clone());
        }
    }

    /// Store `value` at `i`, returning the prior value. Helps any observed
    /// in-progress resize before retrying against the destination.
    pub fn set(&self, i: usize, value: T) -> Option<T>
    where
        T: Clone,
    {
        let guard = &epoch::pin();
        let node = Owned::new(Node { value }).into_shared(guard);
        self.exchange(i, node, guard)
    }

    /// Empty the cell at `i`, returning the prior value.
    pub fn remove(&self, i: usize) -> Option<T>
    where
        T: Clone,
    {
        let guard = &epoch::pin();
        self.exchange(i, Shared::null(), guard)
    }

    fn exchange<'g>(&self, i: usize, new: Shared<'g, Node<T>>, guard: &'g Guard) -> Option<T>
    where
        T: Clone,
    {
        let mut arr = unsafe { self.array.load(Ordering::Acquire, guard).deref() };
        loop {
            let f = arr.cells.load(i, guard);
            if f.tag() != 0 {
                arr = unsafe { help_transfer(fwd_source(f), guard).deref() };
                continue;
            }
            if arr.cells.cas_weak(i, f, new, guard).is_ok() {
                return match unsafe { f.as_ref() } {
                    Some(n) => {
                        let old = n.value.clone();
                        unsafe { guard.defer_destroy(f) };
                        Some(old)
                    }
                    None => None,
                };
            }
        }
    }

    /// Compare-and-exchange at `i`: install `new` only while the cell holds
    /// `expected` (`None` standing for the empty state on either side).
    /// Returns the prior value on commit, the current value on mismatch.
    pub fn compare_exchange(
        &self,
        i: usize,
        expected: Option<&T>,
        new: Option<T>,
    ) -> Result<Option<T>, Option<T>>
    where
        T: Clone + PartialEq,
    {
        let guard = &epoch::pin();
        let new_ptr: Shared<'_, Node<T>> = match new {
            Some(value) => Owned::new(Node { value }).into_shared(guard),
            None => Shared::null(),
        };
        let mut arr = unsafe { self.array.load(Ordering::Acquire, guard).deref() };
        loop {
            let f = arr.cells.load(i, guard);
            if f.tag() != 0 {
                arr = unsafe { help_transfer(fwd_source(f), guard).deref() };
                continue;
            }
            let cur = unsafe { f.as_ref() }.map(|n| &n.value);
            if cur != expected {
                if !new_ptr.is_null() {
                    // never published; reclaim in place
                    drop(unsafe { new_ptr.into_owned() });
                }
                return Err(cur.cloned());
            }
            if arr.cells.cas_weak(i, f, new_ptr, guard).is_ok() {
                let prior = cur.cloned();
                if !f.is_null() {
                    unsafe { guard.defer_destroy(f) };
                }
                return Ok(prior);
            }
            // spurious failure: re-read and re-test
        }
    }

    /// Compare-and-set at `i`; `compare_exchange` reduced to a success flag.
    pub fn compare_and_set(&self, i: usize, expected: Option<&T>, new: Option<T>) -> bool
    where
        T: Clone + PartialEq,
    {
        self.compare_exchange(i, expected, new).is_ok()
    }

    /// Resize to `new_len`, migrating the overlapping prefix.
    pub fn resize(&self, new_len: usize)
    where
        T: Clone,
    {
        self.resize_with(0, 0, new_len)
    }

    /// Resize to `new_len`, migrating from `src_off` in the old array to
    /// `dst_off` in the new one. The offset windows must lie within their
    /// arrays or the migration panics.
    pub fn resize_with(&self, src_off: usize, dst_off: usize, new_len: usize)
    where
        T: Clone,
    {
        let guard = &epoch::pin();
        let _serial = ResizeGuard::acquire(&self.resize_lock);

        let prev = self.array.load(Ordering::Acquire, guard);
        let next = Owned::new(Backing::new(new_len)).into_shared(guard);
        let desc = Owned::new(Transfer {
            src_off,
            dst_off,
            next: Atomic::null(),
            prev: Atomic::null(),
            right_helper: AtomicBool::new(false),
        })
        .into_shared(guard);
        // SAFETY: freshly allocated, unpublished
        let d = unsafe { desc.deref() };
        d.next.store(next, Ordering::Release);
        d.prev.store(prev, Ordering::Release);

        run_left(d, desc.as_raw(), guard);

        // left's return happens-after all of its commits, so readers of the
        // published array observe every migrated value
        self.array.store(next, Ordering::Release);
        unsafe {
            guard.defer_destroy(prev);
            guard.defer_destroy(desc);
        }
    }
}

impl<T> Drop for AtomicArray<T> {
    fn drop(&mut self) {
        let guard = unsafe { epoch::unprotected() };
        let arr = self.array.load(Ordering::Relaxed, guard);
        if !arr.is_null() {
            drop(unsafe { arr.into_owned() });
        }
    }
}

// SAFETY: cells are only mutated through atomic operations, value nodes are
// only dereferenced under an epoch guard, and descriptors outlive every
// marker that names them.
unsafe impl<T: Send + Sync> Send for AtomicArray<T> {}
unsafe impl<T: Send + Sync> Sync for AtomicArray<T> {}

impl<T: fmt::Debug> fmt::Debug for AtomicArray<T> {
    /// Migration-tolerant rendering: follows a reverse-direction marker into
    /// the destination (already filled from here on) and peeks through a
    /// forward-direction marker cell by cell.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = &epoch::pin();
        let mut arr = unsafe { self.array.load(Ordering::Acquire, guard).deref() };
        let mut list = f.debug_list();
        let mut i = 0;
        'outer: while i < arr.len() {
            let mut cell = arr.cells.load(i, guard);
            loop {
                if cell.tag() == RIGHT_TAG {
                    arr = unsafe {
                        (*fwd_source(cell))
                            .next
                            .load(Ordering::Acquire, guard)
                            .deref()
                    };
                    if i >= arr.len() {
                        break 'outer;
                    }
                    cell = arr.cells.load(i, guard);
                } else if cell.tag() == LEFT_TAG {
                    let dest = unsafe {
                        (*fwd_source(cell))
                            .next
                            .load(Ordering::Acquire, guard)
                            .deref()
                    };
                    if i >= dest.len() {
                        break 'outer;
                    }
                    cell = dest.cells.load(i, guard);
                } else {
                    match unsafe { cell.as_ref() } {
                        Some(n) => list.entry(&Some(&n.value)),
                        None => list.entry(&None::<&T>),
                    };
                    break;
                }
            }
            i += 1;
        }
        list.finish()
    }
}

// ================================================================================================
// RESIZE SERIALIZATION
// ================================================================================================

/// RAII spin-flag acquisition for resize initiators.
struct ResizeGuard<'a>(&'a AtomicBool);

impl<'a> ResizeGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Self {
        let mut spins = 0;
        while flag
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            delay(&mut spins);
        }
        Self(flag)
    }
}

impl Drop for ResizeGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
