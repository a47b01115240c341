//! Striped additive counter used as the maps' cardinality oracle.
//!
//! Writers pick a stripe once per thread and `fetch_add` relaxed; readers
//! sum every stripe. The raw sum may transiently be negative while an
//! increment and the decrement it races with land on different stripes, so
//! reads clamp at zero. Exact in quiescence, approximate under mutation.

use crossbeam_utils::CachePadded;
use std::cell::Cell;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use crate::cpu_count;

static NEXT_STRIPE: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static STRIPE: Cell<usize> = const { Cell::new(usize::MAX) };
}

/// Contended additive counter with a monotone non-negative read.
pub struct Adder {
    cells: Box<[CachePadded<AtomicI64>]>,
    mask: usize,
}

impl Adder {
    pub fn new() -> Self {
        let stripes = cpu_count().next_power_of_two();
        Self {
            cells: (0..stripes)
                .map(|_| CachePadded::new(AtomicI64::new(0)))
                .collect(),
            mask: stripes - 1,
        }
    }

    /// Add `delta` to the counter. `add(0)` is a no-op.
    #[inline(always)]
    pub fn add(&self, delta: i64) {
        if delta == 0 {
            return;
        }
        self.cells[self.stripe() & self.mask].fetch_add(delta, Ordering::Relaxed);
    }

    /// Sum of all stripes, clamped at zero to hide transient negatives.
    pub fn sum(&self) -> i64 {
        let mut sum = 0i64;
        for cell in self.cells.iter() {
            sum = sum.wrapping_add(cell.load(Ordering::Relaxed));
        }
        sum.max(0)
    }

    #[inline(always)]
    fn stripe(&self) -> usize {
        STRIPE.with(|s| {
            let v = s.get();
            if v != usize::MAX {
                v
            } else {
                let v = NEXT_STRIPE.fetch_add(1, Ordering::Relaxed);
                s.set(v);
                v
            }
        })
    }
}

impl Default for Adder {
    fn default() -> Self {
        Self::new()
    }
}
