//! Cursor capability: lebar bit dan atomicity sebuah cursor ring
//!
//! Algoritma `RingIndex` ditulis sekali terhadap trait `Cursor`:
//! - Atomic (`AtomicU8` .. `AtomicUsize`): load-acquire / store-release, aman SPSC lintas thread
//! - Plain (`Cell<u8>` .. `Cell<usize>`): load/store biasa, hanya single-thread
//!
//! `Cell` tidak `Sync`, jadi container dengan plain cursor otomatis tidak bisa
//! di-share ke thread lain. Ini pilihan di level type, bukan runtime check.

use std::cell::Cell;
#[cfg(target_pointer_width = "64")]
use std::sync::atomic::AtomicU64;
use std::sync::atomic::{AtomicU16, AtomicU32, AtomicU8, AtomicUsize, Ordering};

/// Counter monotonic yang boleh overflow pada lebar bit-nya sendiri.
///
/// Nilai dibaca sebagai `usize` (zero-extended) dan ditulis dengan truncate
/// ke `BITS` bit. Semua aritmatika jarak dilakukan modulo `2^BITS`.
pub trait Cursor: Default {
    /// Lebar cursor dalam bit.
    const BITS: u32;

    /// Load nilai cursor. `order` diabaikan oleh plain cursor.
    fn load(&self, order: Ordering) -> usize;

    /// Store nilai cursor (di-truncate ke `BITS`). `order` diabaikan oleh plain cursor.
    fn store(&self, value: usize, order: Ordering);
}

macro_rules! atomic_cursor {
    ($($atomic:ty => $int:ty),* $(,)?) => {$(
        impl Cursor for $atomic {
            const BITS: u32 = <$int>::BITS;

            #[inline(always)]
            fn load(&self, order: Ordering) -> usize {
                <$atomic>::load(self, order) as usize
            }

            #[inline(always)]
            fn store(&self, value: usize, order: Ordering) {
                <$atomic>::store(self, value as $int, order)
            }
        }
    )*};
}

macro_rules! plain_cursor {
    ($($int:ty),* $(,)?) => {$(
        impl Cursor for Cell<$int> {
            const BITS: u32 = <$int>::BITS;

            #[inline(always)]
            fn load(&self, _order: Ordering) -> usize {
                self.get() as usize
            }

            #[inline(always)]
            fn store(&self, value: usize, _order: Ordering) {
                self.set(value as $int)
            }
        }
    )*};
}

atomic_cursor! {
    AtomicU8 => u8,
    AtomicU16 => u16,
    AtomicU32 => u32,
    AtomicUsize => usize,
}

plain_cursor!(u8, u16, u32, usize);

#[cfg(target_pointer_width = "64")]
atomic_cursor!(AtomicU64 => u64);

#[cfg(target_pointer_width = "64")]
plain_cursor!(u64);

/// Mask untuk membatasi selisih cursor ke lebar `bits`.
#[inline(always)]
pub(crate) const fn width_mask(bits: u32) -> usize {
    if bits >= usize::BITS {
        usize::MAX
    } else {
        (1usize << bits) - 1
    }
}
