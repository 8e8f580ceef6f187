//! Bounded SPSC FIFO untuk elemen movable apa pun
//!
//! Cursor mechanics sama dengan `CircularBuffer`, tapi elemen disimpan utuh
//! di slot array tetap (satu elemen per operasi, tidak perlu mirrored region).
//! Elemen di-move masuk dan keluar, tidak pernah di-copy.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::AtomicUsize;

use super::cursor::Cursor;
use super::ring_index::RingIndex;

/// Slot dalam ring - kosong atau berisi satu elemen
struct Slot<T> {
    data: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    const fn new() -> Self {
        Self {
            data: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

/// Lock-Free SPSC Ring dengan capacity `N` (power of 2).
///
/// Slot `[read, write)` (modulo N) berisi elemen; sisanya kosong.
pub struct Ring<T, const N: usize, C: Cursor = AtomicUsize> {
    index: RingIndex<C, N>,
    // Pre-allocated slot di heap - tidak ada alokasi setelah init
    slots: Box<[Slot<T>]>,
}

// SAFETY: producer hanya menyentuh slot kosong, consumer hanya slot berisi;
// ownership slot berpindah lewat release/acquire pada cursor atomic.
unsafe impl<T: Send, const N: usize, C: Cursor + Sync> Sync for Ring<T, N, C> {}

impl<T, const N: usize, C: Cursor> Default for Ring<T, N, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize, C: Cursor> Ring<T, N, C> {
    /// Membuat ring baru. Alokasi hanya terjadi sekali di sini.
    pub fn new() -> Self {
        let index = RingIndex::new();

        // Alokasi slot di heap untuk menghindari stack overflow
        let slots: Vec<Slot<T>> = (0..N).map(|_| Slot::new()).collect();

        Self {
            index,
            slots: slots.into_boxed_slice(),
        }
    }

    /// Pecah jadi handle producer dan consumer untuk dipakai di dua thread.
    pub fn split(&mut self) -> (RingProducer<'_, T, N, C>, RingConsumer<'_, T, N, C>) {
        let ring = &*self;
        (RingProducer { ring }, RingConsumer { ring })
    }

    /// Move `value` ke slot kosong berikutnya. `false` jika penuh (value di-drop).
    #[inline]
    pub fn push(&mut self, value: T) -> bool {
        self.try_push(value).is_ok()
    }

    /// Seperti `push`, tapi value dikembalikan lewat `Err` jika penuh.
    #[inline]
    pub fn try_push(&mut self, value: T) -> Result<(), T> {
        // SAFETY: &mut self, tidak ada producer lain
        unsafe { self.try_push_shared(value) }
    }

    /// Move isi `value` ke ring hanya jika ada slot kosong.
    ///
    /// Return `true` dan `value` menjadi `None` jika berhasil. Jika penuh (atau
    /// `value` sudah `None`) return `false` dan `value` tidak disentuh.
    #[inline]
    pub fn push_from(&mut self, value: &mut Option<T>) -> bool {
        unsafe { self.push_from_shared(value) }
    }

    /// Move keluar elemen tertua, `None` jika kosong.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        // SAFETY: &mut self, tidak ada consumer lain
        unsafe { self.pop_shared() }
    }

    /// Jumlah elemen dalam ring
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.index.size()
    }

    /// Cek apakah ring kosong
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cek apakah ring penuh
    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.len() == N
    }

    /// Kapasitas ring
    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        N
    }

    unsafe fn try_push_shared(&self, value: T) -> Result<(), T> {
        let (write, free) = self.index.write_free(1);
        if free == 0 {
            return Err(value);
        }

        let slot = &self.slots[write & RingIndex::<C, N>::MASK];
        // SAFETY: slot ini kosong dan tidak sedang dibaca consumer
        (*slot.data.get()).write(value);

        // Release: write di atas visible sebelum cursor maju
        self.index.store_write(write.wrapping_add(1));
        Ok(())
    }

    unsafe fn push_from_shared(&self, value: &mut Option<T>) -> bool {
        if self.index.write_free(1).1 == 0 {
            return false;
        }
        match value.take() {
            // Slot sudah dicek kosong dan hanya producer yang bisa mengisinya
            Some(v) => self.try_push_shared(v).is_ok(),
            None => false,
        }
    }

    unsafe fn pop_shared(&self) -> Option<T> {
        let (read, filled) = self.index.read_filled(1);
        if filled == 0 {
            return None;
        }

        let slot = &self.slots[read & RingIndex::<C, N>::MASK];
        // SAFETY: slot ini sudah ditulis producer dan tidak sedang ditulis
        let value = (*slot.data.get()).assume_init_read();

        // Release: read di atas selesai sebelum slot dibebaskan
        self.index.store_read(read.wrapping_add(1));
        Some(value)
    }
}

impl<T, const N: usize, C: Cursor> Drop for Ring<T, N, C> {
    fn drop(&mut self) {
        // Drop elemen yang masih tersisa
        while self.pop().is_some() {}
    }
}

/// Handle producer hasil `Ring::split`.
pub struct RingProducer<'a, T, const N: usize, C: Cursor = AtomicUsize> {
    ring: &'a Ring<T, N, C>,
}

impl<T, const N: usize, C: Cursor> RingProducer<'_, T, N, C> {
    #[inline]
    pub fn push(&mut self, value: T) -> bool {
        self.try_push(value).is_ok()
    }

    #[inline]
    pub fn try_push(&mut self, value: T) -> Result<(), T> {
        // SAFETY: satu RingProducer per split, dan &mut self
        unsafe { self.ring.try_push_shared(value) }
    }

    #[inline]
    pub fn push_from(&mut self, value: &mut Option<T>) -> bool {
        unsafe { self.ring.push_from_shared(value) }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }
}

/// Handle consumer hasil `Ring::split`.
pub struct RingConsumer<'a, T, const N: usize, C: Cursor = AtomicUsize> {
    ring: &'a Ring<T, N, C>,
}

impl<T, const N: usize, C: Cursor> RingConsumer<'_, T, N, C> {
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        // SAFETY: satu RingConsumer per split, dan &mut self
        unsafe { self.ring.pop_shared() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::atomic::AtomicU8;

    #[test]
    fn test_basic_push_pop() {
        let mut ring: Ring<u64, 16> = Ring::new();

        assert!(ring.is_empty());
        assert!(!ring.is_full());

        assert!(ring.push(42));
        assert!(!ring.is_empty());

        assert_eq!(ring.pop(), Some(42));
        assert!(ring.is_empty());
    }

    #[test]
    fn test_push_from_full_leaves_value() {
        let mut ring: Ring<String, 4> = Ring::new();

        for i in 0..4 {
            assert!(ring.push(format!("msg-{}", i)));
        }
        assert!(ring.is_full());

        let mut extra = Some(String::from("extra"));
        assert!(!ring.push_from(&mut extra));
        assert_eq!(extra.as_deref(), Some("extra"));

        for i in 0..4 {
            assert_eq!(ring.pop(), Some(format!("msg-{}", i)));
        }
        assert_eq!(ring.pop(), None);

        assert!(ring.push_from(&mut extra));
        assert!(extra.is_none());
        assert_eq!(ring.pop().as_deref(), Some("extra"));
    }

    #[test]
    fn test_push_full_drops_value() {
        let marker = Rc::new(());
        let mut ring: Ring<Rc<()>, 4, Cell<usize>> = Ring::new();

        for _ in 0..4 {
            assert!(ring.push(Rc::clone(&marker)));
        }
        assert!(!ring.push(Rc::clone(&marker)));
        assert_eq!(Rc::strong_count(&marker), 5);

        let rejected = ring.try_push(Rc::clone(&marker)).err();
        assert!(rejected.is_some_and(|v| Rc::ptr_eq(&v, &marker)));
    }

    #[test]
    fn test_wraparound() {
        let mut ring: Ring<u64, 4> = Ring::new();

        // Fill and drain multiple times to test wraparound
        for round in 0..10 {
            for i in 0..4 {
                assert!(ring.push(round * 4 + i));
            }
            for i in 0..4 {
                assert_eq!(ring.pop(), Some(round * 4 + i));
            }
        }
    }

    #[test]
    fn test_narrow_cursor_wraps() {
        let mut ring: Ring<u32, 128, AtomicU8> = Ring::new();
        let mut next = 0u32;
        let mut expect = 0u32;

        while expect < 1000 {
            for _ in 0..50 {
                if ring.push(next) {
                    next += 1;
                }
            }
            for _ in 0..37 {
                match ring.pop() {
                    Some(v) => {
                        assert_eq!(v, expect);
                        expect += 1;
                    }
                    None => break,
                }
            }
            assert_eq!(ring.len(), (next - expect) as usize);
        }
    }

    #[test]
    fn test_drop_releases_elements() {
        let marker = Rc::new(());
        {
            let mut ring: Ring<Rc<()>, 8, Cell<u8>> = Ring::new();
            for _ in 0..5 {
                assert!(ring.push(Rc::clone(&marker)));
            }
            assert_eq!(Rc::strong_count(&marker), 6);
        }
        assert_eq!(Rc::strong_count(&marker), 1);
    }

    #[test]
    fn test_split_handles() {
        let mut ring: Ring<Vec<u8>, 2> = Ring::new();
        let (mut tx, mut rx) = ring.split();

        assert!(tx.push(vec![1]));
        assert!(tx.push(vec![2]));
        assert!(tx.is_full());
        assert!(!tx.push(vec![3]));

        assert_eq!(rx.pop(), Some(vec![1]));
        assert_eq!(rx.len(), 1);
        assert_eq!(rx.pop(), Some(vec![2]));
        assert!(rx.is_empty());
    }
}
