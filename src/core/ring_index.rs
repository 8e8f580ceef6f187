//! Cursor arithmetic untuk Single-Producer Single-Consumer (SPSC) ring
//!
//! Implementasi Lamport Queue: dua cursor yang hanya naik (write = total produced,
//! read = total consumed). Jumlah elemen = `write - read` dengan aritmatika
//! wrapping pada lebar cursor itu sendiri, jadi cursor boleh overflow kapan saja.
//!
//! Protocol claim/commit:
//! - Producer: `write_free` -> tulis data -> `store_write` (release)
//! - Consumer: `read_filled` -> baca data -> `store_read` (release)
//!
//! Acquire load pada cursor milik sisi lain membentuk edge happens-before,
//! jadi semua write data sebelum `store_write` terlihat oleh consumer.

use std::sync::atomic::Ordering;

use super::cursor::{width_mask, Cursor};

/// Padding untuk cache line isolation (64 bytes pada x86-64)
#[repr(C, align(64))]
pub(crate) struct CacheLinePadded<T> {
    pub(crate) value: T,
}

impl<T> CacheLinePadded<T> {
    pub(crate) const fn new(value: T) -> Self {
        Self { value }
    }
}

/// Dua cursor SPSC dengan capacity `N` (compile-time, power of 2).
///
/// Menggunakan cache line terpisah untuk write dan read
/// untuk menghindari false sharing antara producer dan consumer.
#[repr(C)]
pub struct RingIndex<C: Cursor, const N: usize> {
    // Producer side - hanya ditulis producer
    write: CacheLinePadded<C>,
    // Consumer side - hanya ditulis consumer
    read: CacheLinePadded<C>,
}

impl<C: Cursor, const N: usize> RingIndex<C, N> {
    /// Mask untuk offset slot (N harus power of 2)
    pub const MASK: usize = N - 1;

    const DISTANCE_MASK: usize = width_mask(C::BITS);

    // Dievaluasi saat monomorphization: kombinasi (N, C) yang invalid gagal compile.
    // N <= 2^(BITS-1) adalah batas tepat: N = 2^BITS membuat "penuh" sama dengan "kosong".
    const VALID: () = {
        assert!(N > 0 && N.is_power_of_two(), "capacity must be a power of two");
        assert!(
            C::BITS <= usize::BITS && N <= 1usize << (C::BITS - 1),
            "cursor type too narrow for capacity"
        );
    };

    /// Membuat index kosong (write = read = 0).
    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID;

        Self {
            write: CacheLinePadded::new(C::default()),
            read: CacheLinePadded::new(C::default()),
        }
    }

    #[inline(always)]
    fn distance(write: usize, read: usize) -> usize {
        write.wrapping_sub(read) & Self::DISTANCE_MASK
    }

    /// Query producer: `(write_cursor, n)` dengan `n = min(max, N - size)`.
    #[inline(always)]
    pub fn write_free(&self, max: usize) -> (usize, usize) {
        let write = self.write.value.load(Ordering::Relaxed);
        let read = self.read.value.load(Ordering::Acquire);
        let free = N - Self::distance(write, read);
        (write, max.min(free))
    }

    /// Publish progress producer. Semua elemen sampai `new_write - 1`
    /// sekarang aman dibaca consumer.
    #[inline(always)]
    pub fn store_write(&self, new_write: usize) {
        self.write.value.store(new_write, Ordering::Release);
    }

    /// Query consumer: `(read_cursor, n)` dengan `n = min(max, size)`.
    #[inline(always)]
    pub fn read_filled(&self, max: usize) -> (usize, usize) {
        let read = self.read.value.load(Ordering::Relaxed);
        let write = self.write.value.load(Ordering::Acquire);
        (read, max.min(Self::distance(write, read)))
    }

    /// Publish progress consumer, slot sampai `new_read - 1` boleh ditimpa lagi.
    #[inline(always)]
    pub fn store_read(&self, new_read: usize) {
        self.read.value.store(new_read, Ordering::Release);
    }

    /// Snapshot jumlah elemen. Bisa stale kalau ada akses concurrent,
    /// tapi selalu di dalam `[0, N]`.
    #[inline(always)]
    pub fn size(&self) -> usize {
        // read dulu: write yang di-load sesudahnya tidak pernah di belakang read ini
        let read = self.read.value.load(Ordering::Acquire);
        let write = self.write.value.load(Ordering::Acquire);
        Self::distance(write, read).min(N)
    }

    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<C: Cursor, const N: usize> Default for RingIndex<C, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicU16, AtomicU8, AtomicUsize};

    #[test]
    fn test_empty_index() {
        let idx: RingIndex<AtomicUsize, 16> = RingIndex::new();
        assert_eq!(idx.size(), 0);
        assert_eq!(idx.write_free(usize::MAX), (0, 16));
        assert_eq!(idx.read_filled(usize::MAX), (0, 0));
        assert_eq!(idx.capacity(), 16);
    }

    #[test]
    fn test_claim_commit_cycle() {
        let idx: RingIndex<AtomicUsize, 8> = RingIndex::new();

        let (w, n) = idx.write_free(5);
        assert_eq!((w, n), (0, 5));
        idx.store_write(w + n);
        assert_eq!(idx.size(), 5);

        // Sisa free hanya 3
        assert_eq!(idx.write_free(100), (5, 3));

        let (r, n) = idx.read_filled(2);
        assert_eq!((r, n), (0, 2));
        idx.store_read(r + n);
        assert_eq!(idx.size(), 3);
        assert_eq!(idx.read_filled(usize::MAX), (2, 3));
    }

    #[test]
    fn test_full_and_empty() {
        let idx: RingIndex<Cell<u8>, 4> = RingIndex::new();
        idx.store_write(4);
        assert_eq!(idx.write_free(1).1, 0);
        assert_eq!(idx.size(), 4);

        idx.store_read(4);
        assert_eq!(idx.read_filled(1).1, 0);
        assert_eq!(idx.size(), 0);
    }

    #[test]
    fn test_narrow_cursor_overflow() {
        // N = 2^(8-1): batas maksimum untuk cursor 8-bit
        let idx: RingIndex<AtomicU8, 128> = RingIndex::new();
        let mut written = 0usize;
        let mut read = 0usize;

        for round in 0..20 {
            let batch = 1 + (round * 37) % 128;
            let (_, n) = idx.write_free(batch);
            assert_eq!(n, batch.min(128 - (written - read)));
            written += n;
            idx.store_write(written);
            assert_eq!(idx.size(), written - read);

            let (_, m) = idx.read_filled(batch / 2 + 1);
            read += m;
            idx.store_read(read);
            assert_eq!(idx.size(), written - read);
        }

        assert!(written > 255, "cursor harus sudah overflow");
    }

    #[test]
    fn test_full_survives_overflow() {
        let idx: RingIndex<AtomicU16, 32768> = RingIndex::new();
        // Maju hampir ke batas u16, lalu isi penuh melewati overflow
        idx.store_write(65_530);
        idx.store_read(65_530);
        assert_eq!(idx.size(), 0);

        idx.store_write(65_530 + 32_768);
        assert_eq!(idx.size(), 32_768);
        assert_eq!(idx.write_free(1).1, 0);
        assert_eq!(idx.read_filled(usize::MAX).1, 32_768);
    }
}
