//! cellmap_rs: lock-free concurrent containers built on atomic array cells.
//!
//! Two containers carry the crate: [`ConcurrentEnumMap`], a fixed-domain
//! concurrent map indexed by enum ordinal, and [`AtomicArray`], an indexed
//! container whose nonblocking resize migrates cells cooperatively between
//! the old and new backing storage using forwarding markers.
//!
//! Reads clone values out (`V: Clone`), so no guard objects appear in the
//! public API; reclamation of unlinked nodes is epoch-based internally.

use std::sync::LazyLock;
use std::thread;

mod array;
mod cells;
mod counter;
mod enum_map;

pub use array::AtomicArray;
pub use counter::Adder;
pub use enum_map::{ConcurrentEnumMap, Iter, Keys, Ordinal, Values};

// ================================================================================================
// SHARED RUNTIME HELPERS
// ================================================================================================

/// pure CPU hints before any yield
const SPIN_BEFORE_YIELD: i32 = 128;

// Global cached CPU count to avoid repeated OS queries
static CPU_COUNT: LazyLock<usize> = LazyLock::new(|| {
    thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
});

#[inline(always)]
pub(crate) fn cpu_count() -> usize {
    *CPU_COUNT
}

#[inline(always)]
fn try_spin(spins: &mut i32) -> bool {
    if *spins < SPIN_BEFORE_YIELD {
        *spins += *spins + 1;
        std::hint::spin_loop();
        true
    } else {
        false
    }
}

#[inline(always)]
pub(crate) fn delay(spins: &mut i32) {
    if !try_spin(spins) {
        *spins = 0;
        thread::yield_now();
    }
}
