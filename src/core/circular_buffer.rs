//! Zero-Copy Circular Buffer untuk bytes / POD
//!
//! Span read/write selalu contiguous, termasuk yang melewati batas wrap:
//! region di-mirror (lihat `region`), jadi tidak perlu split jadi dua copy.
//!
//! Alur claim/commit:
//! - `peek_back(max)` -> `WriteClaim` (slice mutable ke free space) -> `commit_written()`
//! - `peek_front(max)` -> `ReadClaim` (slice ke data) -> `commit_read()`
//!
//! Claim meminjam owner-nya secara mutable dan di-consume oleh commit, jadi
//! commit yang stale atau salah pasangan tidak bisa di-compile.

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::mem::size_of;
use std::ops::{Deref, DerefMut};
use std::slice;
use std::sync::atomic::AtomicUsize;

use super::cursor::Cursor;
use super::error::Result;
use super::region::{DefaultRegion, Pod, Region};
use super::ring_index::{CacheLinePadded, RingIndex};

/// Lock-Free SPSC circular buffer dengan span zero-copy.
///
/// - `T`: elemen POD
/// - `N`: capacity (power of 2; `N × size_of::<T>()` kelipatan page size untuk `Mirrored`)
/// - `C`: cursor capability (`AtomicUsize` default; `Cell<_>` untuk single-thread)
/// - `R`: strategi region (`Mirrored` atau `SplitCopy`)
pub struct CircularBuffer<T, const N: usize, C = AtomicUsize, R = DefaultRegion<T>>
where
    T: Pod,
    C: Cursor,
    R: Region<T>,
{
    index: RingIndex<C, N>,
    // Total lokal producer, hanya disentuh sisi producer
    written: CacheLinePadded<UnsafeCell<usize>>,
    // Total lokal consumer, hanya disentuh sisi consumer
    read: CacheLinePadded<UnsafeCell<usize>>,
    region: R,
    _marker: PhantomData<T>,
}

// SAFETY: Sync hanya jika cursor Sync (atomic) dan region Sync. Producer dan
// consumer masing-masing hanya menyentuh total lokal dan sisi region miliknya;
// handoff lewat RingIndex.
unsafe impl<T, const N: usize, C, R> Sync for CircularBuffer<T, N, C, R>
where
    T: Pod,
    C: Cursor + Sync,
    R: Region<T> + Sync,
{
}

impl<T, const N: usize, C, R> CircularBuffer<T, N, C, R>
where
    T: Pod,
    C: Cursor,
    R: Region<T>,
{
    /// Nama strategi region yang dipakai.
    pub const STRATEGY: &'static str = R::STRATEGY;

    const VALID: () = assert!(size_of::<T>() > 0, "zero-sized elements are not supported");

    /// Membuat buffer baru dan memetakan backing region-nya.
    ///
    /// Alokasi hanya terjadi sekali di sini. Semua kegagalan resource
    /// (alignment, address space, backing file, mapping) dilaporkan sebagai `RingError`.
    pub fn new() -> Result<Self> {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID;

        let index = RingIndex::new();
        let region = R::allocate(N)?;

        Ok(Self {
            index,
            written: CacheLinePadded::new(UnsafeCell::new(0)),
            read: CacheLinePadded::new(UnsafeCell::new(0)),
            region,
            _marker: PhantomData,
        })
    }

    /// Pecah jadi handle producer dan consumer untuk dipakai di dua thread.
    pub fn split(&mut self) -> (Producer<'_, T, N, C, R>, Consumer<'_, T, N, C, R>) {
        let buffer = &*self;
        (Producer { buffer }, Consumer { buffer })
    }

    /// View free space sampai `max` elemen pada posisi write.
    #[inline]
    pub fn peek_back(&mut self, max: usize) -> WriteClaim<'_, T, N, C, R> {
        // SAFETY: &mut self, tidak ada producer lain
        unsafe { self.claim_back(max) }
    }

    /// View data sampai `max` elemen pada posisi read.
    #[inline]
    pub fn peek_front(&mut self, max: usize) -> ReadClaim<'_, T, N, C, R> {
        // SAFETY: &mut self, tidak ada consumer lain
        unsafe { self.claim_front(max) }
    }

    /// Copy sebanyak mungkin dari `data`. Return jumlah yang masuk (0 jika penuh).
    #[inline]
    pub fn push_back(&mut self, data: &[T]) -> usize {
        unsafe { self.push_back_shared(data) }
    }

    /// Copy data terdepan ke `out`. Return jumlah yang dibaca (0 jika kosong).
    #[inline]
    pub fn fill_from_front(&mut self, out: &mut [T]) -> usize {
        unsafe { self.fill_from_front_shared(out) }
    }

    /// Ambil sampai `max` elemen terdepan sebagai `Vec` baru.
    pub fn pop_front(&mut self, max: usize) -> Vec<T> {
        unsafe { self.pop_front_shared(max) }
    }

    /// Jumlah elemen saat ini
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.index.size()
    }

    /// Cek apakah buffer kosong
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Cek apakah buffer penuh
    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.size() == N
    }

    /// Kapasitas buffer
    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Total elemen yang pernah di-commit producer.
    pub fn total_written(&self) -> usize {
        // SAFETY: &self di luar split, tidak ada producer yang sedang jalan
        unsafe { *self.written.value.get() }
    }

    /// Total elemen yang pernah di-commit consumer.
    pub fn total_read(&self) -> usize {
        // SAFETY: sama dengan total_written
        unsafe { *self.read.value.get() }
    }

    // ------------------------------------------------------------------
    // Operasi sisi producer / consumer di atas &self.
    // Caller menjamin hanya ada satu producer (resp. satu consumer) aktif.
    // ------------------------------------------------------------------

    unsafe fn claim_back(&self, max: usize) -> WriteClaim<'_, T, N, C, R> {
        let (_, len) = self.index.write_free(max);
        let offset = *self.written.value.get() & RingIndex::<C, N>::MASK;
        let ptr = self.region.write_span(offset, len);
        WriteClaim {
            buffer: self,
            ptr,
            offset,
            len,
        }
    }

    unsafe fn claim_front(&self, max: usize) -> ReadClaim<'_, T, N, C, R> {
        let (_, len) = self.index.read_filled(max);
        let offset = *self.read.value.get() & RingIndex::<C, N>::MASK;
        let ptr = self.region.read_span(offset, len);
        ReadClaim {
            buffer: self,
            ptr,
            len,
        }
    }

    unsafe fn push_back_shared(&self, data: &[T]) -> usize {
        let mut claim = self.claim_back(data.len());
        let n = claim.len();
        claim.copy_from_slice(&data[..n]);
        claim.commit_written()
    }

    unsafe fn fill_from_front_shared(&self, out: &mut [T]) -> usize {
        let claim = self.claim_front(out.len());
        let n = claim.len();
        out[..n].copy_from_slice(&claim);
        claim.commit_read()
    }

    unsafe fn pop_front_shared(&self, max: usize) -> Vec<T> {
        let claim = self.claim_front(max);
        let values = claim.to_vec();
        claim.commit_read();
        values
    }
}

// ============================================================================
// Claims
// ============================================================================

/// Free space yang di-claim producer. Deref ke `&mut [T]`.
///
/// Tidak ada yang di-publish sampai `commit_written` dipanggil; drop tanpa
/// commit artinya tidak ada elemen yang ditulis.
#[must_use = "data tidak terlihat consumer sampai commit_written() dipanggil"]
pub struct WriteClaim<'a, T, const N: usize, C, R>
where
    T: Pod,
    C: Cursor,
    R: Region<T>,
{
    buffer: &'a CircularBuffer<T, N, C, R>,
    ptr: *mut T,
    offset: usize,
    len: usize,
}

impl<'a, T, const N: usize, C, R> WriteClaim<'a, T, N, C, R>
where
    T: Pod,
    C: Cursor,
    R: Region<T>,
{
    /// Perkecil claim menjadi prefix `n` elemen (no-op jika `n >= len`).
    #[inline]
    pub fn truncate(&mut self, n: usize) {
        self.len = self.len.min(n);
    }

    /// Publish seluruh claim ke consumer. Return jumlah elemen yang di-commit.
    #[inline]
    pub fn commit_written(self) -> usize {
        let buffer = self.buffer;
        // SAFETY: claim ini satu-satunya claim producer yang hidup
        unsafe {
            buffer.region.publish(self.offset, self.ptr, self.len);
            let written = &mut *buffer.written.value.get();
            *written = written.wrapping_add(self.len);
            buffer.index.store_write(*written);
        }
        self.len
    }
}

impl<T, const N: usize, C, R> Deref for WriteClaim<'_, T, N, C, R>
where
    T: Pod,
    C: Cursor,
    R: Region<T>,
{
    type Target = [T];

    #[inline(always)]
    fn deref(&self) -> &[T] {
        // SAFETY: region menjamin `len` elemen contiguous milik producer
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }
}

impl<T, const N: usize, C, R> DerefMut for WriteClaim<'_, T, N, C, R>
where
    T: Pod,
    C: Cursor,
    R: Region<T>,
{
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut [T] {
        // SAFETY: sama dengan deref; akses eksklusif lewat &mut claim
        unsafe { slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

/// Data yang di-claim consumer. Deref ke `&[T]`.
#[must_use = "slot tidak dibebaskan sampai commit_read() dipanggil"]
pub struct ReadClaim<'a, T, const N: usize, C, R>
where
    T: Pod,
    C: Cursor,
    R: Region<T>,
{
    buffer: &'a CircularBuffer<T, N, C, R>,
    ptr: *const T,
    len: usize,
}

impl<'a, T, const N: usize, C, R> ReadClaim<'a, T, N, C, R>
where
    T: Pod,
    C: Cursor,
    R: Region<T>,
{
    /// Perkecil claim menjadi prefix `n` elemen (no-op jika `n >= len`).
    #[inline]
    pub fn truncate(&mut self, n: usize) {
        self.len = self.len.min(n);
    }

    /// Bebaskan slot claim ini untuk producer. Return jumlah elemen yang di-commit.
    #[inline]
    pub fn commit_read(self) -> usize {
        let buffer = self.buffer;
        // SAFETY: claim ini satu-satunya claim consumer yang hidup
        unsafe {
            let read = &mut *buffer.read.value.get();
            *read = read.wrapping_add(self.len);
            buffer.index.store_read(*read);
        }
        self.len
    }
}

impl<T, const N: usize, C, R> Deref for ReadClaim<'_, T, N, C, R>
where
    T: Pod,
    C: Cursor,
    R: Region<T>,
{
    type Target = [T];

    #[inline(always)]
    fn deref(&self) -> &[T] {
        // SAFETY: `len` elemen sudah di-publish dan belum dibebaskan
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }
}

// ============================================================================
// Split handles
// ============================================================================

/// Handle producer hasil `CircularBuffer::split`.
pub struct Producer<'a, T, const N: usize, C = AtomicUsize, R = DefaultRegion<T>>
where
    T: Pod,
    C: Cursor,
    R: Region<T>,
{
    buffer: &'a CircularBuffer<T, N, C, R>,
}

impl<'a, T, const N: usize, C, R> Producer<'a, T, N, C, R>
where
    T: Pod,
    C: Cursor,
    R: Region<T>,
{
    #[inline]
    pub fn peek_back(&mut self, max: usize) -> WriteClaim<'_, T, N, C, R> {
        // SAFETY: hanya ada satu Producer per split, dan &mut self
        unsafe { self.buffer.claim_back(max) }
    }

    #[inline]
    pub fn push_back(&mut self, data: &[T]) -> usize {
        unsafe { self.buffer.push_back_shared(data) }
    }

    /// Jumlah slot kosong saat ini (bisa stale, hanya bertambah).
    #[inline]
    pub fn free(&self) -> usize {
        self.buffer.index.write_free(usize::MAX).1
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.buffer.size()
    }

    pub fn total_written(&self) -> usize {
        // SAFETY: counter milik producer, dan kita producer-nya
        unsafe { *self.buffer.written.value.get() }
    }
}

/// Handle consumer hasil `CircularBuffer::split`.
pub struct Consumer<'a, T, const N: usize, C = AtomicUsize, R = DefaultRegion<T>>
where
    T: Pod,
    C: Cursor,
    R: Region<T>,
{
    buffer: &'a CircularBuffer<T, N, C, R>,
}

impl<'a, T, const N: usize, C, R> Consumer<'a, T, N, C, R>
where
    T: Pod,
    C: Cursor,
    R: Region<T>,
{
    #[inline]
    pub fn peek_front(&mut self, max: usize) -> ReadClaim<'_, T, N, C, R> {
        // SAFETY: hanya ada satu Consumer per split, dan &mut self
        unsafe { self.buffer.claim_front(max) }
    }

    #[inline]
    pub fn fill_from_front(&mut self, out: &mut [T]) -> usize {
        unsafe { self.buffer.fill_from_front_shared(out) }
    }

    pub fn pop_front(&mut self, max: usize) -> Vec<T> {
        unsafe { self.buffer.pop_front_shared(max) }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.buffer.size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn total_read(&self) -> usize {
        // SAFETY: counter milik consumer, dan kita consumer-nya
        unsafe { *self.buffer.read.value.get() }
    }
}
