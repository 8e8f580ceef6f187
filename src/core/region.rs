//! Backing storage untuk `CircularBuffer`: region yang "contiguous walaupun wrap"
//!
//! Dua strategi di balik interface `Region` yang sama:
//! - `Mirrored`: satu file memory-backed di-mmap dua kali di alamat bersebelahan.
//!   Offset `Capacity + i` adalah alias dari offset `i`, jadi span yang melewati
//!   batas wrap tetap satu slice tanpa copy.
//! - `SplitCopy`: fallback portable di atas anonymous mmap (memmap2). Span yang
//!   melewati batas wrap dilayani lewat staging area dan dibayar dengan copy.
//!
//! Pemilihan strategi di compile time lewat `DefaultRegion` (feature `split-copy`).

use std::mem::size_of;
use std::ptr::{self, NonNull};

use memmap2::MmapMut;

use super::error::{Result, RingError};

/// Tipe elemen yang valid untuk semua bit pattern (termasuk semua nol).
///
/// # Safety
/// Implementor harus `Copy`, tanpa padding yang dibaca, tanpa pointer, dan
/// setiap bit pattern (khususnya all-zero) harus nilai yang valid.
pub unsafe trait Pod: Copy + Send + Sync + 'static {}

macro_rules! impl_pod {
    ($($t:ty),* $(,)?) => {$(
        unsafe impl Pod for $t {}
    )*};
}

impl_pod!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64);

unsafe impl<T: Pod, const M: usize> Pod for [T; M] {}

/// Region aliasing untuk `Capacity` elemen `T`.
///
/// Sisi producer (`write_span`, `publish`) dan sisi consumer (`read_span`)
/// dipanggil lewat `&self` yang sama, dan setelah `CircularBuffer::split`
/// keduanya bisa berjalan bersamaan dari dua thread. `CircularBuffer` hanya
/// `Sync` jika region-nya juga `Sync`.
///
/// # Safety
/// Implementor menjamin pointer dari `write_span` / `read_span` valid untuk
/// `len` elemen contiguous selama claim hidup, dan bahwa setelah `publish`
/// data tersebut terbaca kembali lewat `read_span` pada offset logis yang sama.
/// State internal yang disentuh sisi producer tidak boleh disentuh sisi consumer
/// (dan sebaliknya), kecuali lewat sinkronisasi milik implementor sendiri.
pub unsafe trait Region<T: Pod>: Send + Sized {
    /// Nama strategi, untuk log dan laporan benchmark.
    const STRATEGY: &'static str;

    /// Alokasi region untuk `capacity` elemen. Dipanggil sekali saat konstruksi.
    fn allocate(capacity: usize) -> Result<Self>;

    /// Pointer tulis untuk `len` elemen mulai offset logis `offset`.
    ///
    /// # Safety
    /// `offset < capacity`, `len <= capacity`, dan hanya dipanggil dari sisi producer.
    unsafe fn write_span(&self, offset: usize, len: usize) -> *mut T;

    /// Pindahkan `len` elemen pertama dari `span` (hasil `write_span(offset, _)`)
    /// ke storage ring. No-op untuk strategi yang sudah zero-copy.
    ///
    /// # Safety
    /// Sama dengan `write_span`; `len` tidak melebihi panjang span yang di-claim.
    unsafe fn publish(&self, offset: usize, span: *mut T, len: usize);

    /// Pointer baca untuk `len` elemen mulai offset logis `offset`.
    ///
    /// # Safety
    /// `offset < capacity`, `len <= capacity`, hanya dipanggil dari sisi consumer,
    /// dan `len` elemen tersebut sudah di-publish oleh producer.
    unsafe fn read_span(&self, offset: usize, len: usize) -> *const T;
}

/// Strategi default: double mapping di unix, split-copy di platform lain.
#[cfg(all(unix, not(feature = "split-copy")))]
pub type DefaultRegion<T> = Mirrored<T>;

/// Strategi default: double mapping di unix, split-copy di platform lain.
#[cfg(any(not(unix), feature = "split-copy"))]
pub type DefaultRegion<T> = SplitCopy<T>;

/// System page size dalam bytes.
#[cfg(unix)]
pub fn page_size() -> usize {
    // SAFETY: sysconf tidak punya precondition
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        tracing::warn!(
            error = %std::io::Error::last_os_error(),
            "sysconf(_SC_PAGESIZE) failed, assuming 4096"
        );
        4096
    }
}

/// System page size dalam bytes.
#[cfg(not(unix))]
pub fn page_size() -> usize {
    4096
}

fn region_bytes<T>(capacity: usize) -> Result<usize> {
    capacity
        .checked_mul(size_of::<T>())
        .filter(|bytes| bytes.checked_mul(2).is_some())
        .ok_or(RingError::Overflow {
            capacity,
            elem_size: size_of::<T>(),
        })
}

// ============================================================================
// Split-copy fallback
// ============================================================================

/// Fallback portable: satu ring biasa + staging area per sisi.
///
/// Span yang tidak melewati batas wrap tetap zero-copy. Span yang melewati
/// batas wrap di-stage: producer menulis ke staging lalu `publish` menyalin
/// dua potongan ke ring; consumer mendapat salinan dua potongan di staging.
pub struct SplitCopy<T> {
    // Mapping dipegang hanya untuk lifetime; akses lewat pointer di bawah
    _storage: MmapMut,
    _write_stage: MmapMut,
    _read_stage: MmapMut,
    base: NonNull<T>,
    write_stage: NonNull<T>,
    read_stage: NonNull<T>,
    capacity: usize,
}

// SAFETY: SplitCopy memiliki mapping-nya sendiri secara eksklusif.
unsafe impl<T: Pod> Send for SplitCopy<T> {}

// SAFETY: write_stage hanya disentuh producer (write_span/publish), read_stage
// hanya disentuh consumer (read_span). Ring di `base` dibagi per slot lewat
// RingIndex: publish menulis slot milik producer sebelum store-release cursor.
unsafe impl<T: Pod> Sync for SplitCopy<T> {}

fn anonymous_map<T>(bytes: usize) -> Result<(MmapMut, NonNull<T>)> {
    let mut map = MmapMut::map_anon(bytes).map_err(RingError::Anonymous)?;
    // Anonymous mmap selalu page-aligned dan non-null
    let ptr = NonNull::new(map.as_mut_ptr().cast::<T>()).ok_or_else(|| {
        RingError::Anonymous(std::io::Error::from(std::io::ErrorKind::OutOfMemory))
    })?;
    Ok((map, ptr))
}

unsafe impl<T: Pod> Region<T> for SplitCopy<T> {
    const STRATEGY: &'static str = "split-copy";

    fn allocate(capacity: usize) -> Result<Self> {
        let bytes = region_bytes::<T>(capacity)?;

        let (storage, base) = anonymous_map(bytes)?;
        let (write_map, write_stage) = anonymous_map(bytes)?;
        let (read_map, read_stage) = anonymous_map(bytes)?;

        tracing::debug!(
            strategy = <Self as Region<T>>::STRATEGY,
            bytes,
            "allocated ring region"
        );

        Ok(Self {
            _storage: storage,
            _write_stage: write_map,
            _read_stage: read_map,
            base,
            write_stage,
            read_stage,
            capacity,
        })
    }

    #[inline(always)]
    unsafe fn write_span(&self, offset: usize, len: usize) -> *mut T {
        if offset + len <= self.capacity {
            self.base.as_ptr().add(offset)
        } else {
            self.write_stage.as_ptr()
        }
    }

    #[inline(always)]
    unsafe fn publish(&self, offset: usize, span: *mut T, len: usize) {
        if span != self.write_stage.as_ptr() {
            return;
        }

        // Handle wraparound: potongan ekor lalu potongan kepala
        let first = (self.capacity - offset).min(len);
        ptr::copy_nonoverlapping(span, self.base.as_ptr().add(offset), first);
        if first < len {
            ptr::copy_nonoverlapping(span.add(first), self.base.as_ptr(), len - first);
        }
    }

    #[inline(always)]
    unsafe fn read_span(&self, offset: usize, len: usize) -> *const T {
        if offset + len <= self.capacity {
            return self.base.as_ptr().add(offset);
        }

        let stage = self.read_stage.as_ptr();
        let first = self.capacity - offset;
        ptr::copy_nonoverlapping(self.base.as_ptr().add(offset), stage, first);
        ptr::copy_nonoverlapping(self.base.as_ptr(), stage.add(first), len - first);
        stage
    }
}

// ============================================================================
// Mirrored (double mapping)
// ============================================================================

#[cfg(unix)]
pub use mirrored::Mirrored;

#[cfg(unix)]
mod mirrored {
    use super::*;

    use std::io;
    use std::marker::PhantomData;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

    /// Reservasi virtual address; di-unmap seluruhnya saat drop.
    struct Reservation {
        base: NonNull<u8>,
        len: usize,
    }

    impl Drop for Reservation {
        fn drop(&mut self) {
            // SAFETY: base/len persis hasil mmap di `reserve`; munmap juga
            // melepas fixed mapping yang menimpa reservasi ini
            unsafe {
                libc::munmap(self.base.as_ptr().cast(), self.len);
            }
        }
    }

    fn reserve(len: usize) -> Result<Reservation> {
        // SAFETY: anonymous PROT_NONE mapping, tidak menyentuh memori existing
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if addr == libc::MAP_FAILED {
            let source = io::Error::last_os_error();
            tracing::warn!(bytes = len, error = %source, "address space reservation failed");
            return Err(RingError::Reserve { bytes: len, source });
        }

        match NonNull::new(addr.cast::<u8>()) {
            Some(base) => Ok(Reservation { base, len }),
            None => Err(RingError::Reserve {
                bytes: len,
                source: io::Error::from(io::ErrorKind::AddrNotAvailable),
            }),
        }
    }

    /// File memory-backed tanpa nama (sudah unlinked).
    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn anonymous_file() -> io::Result<OwnedFd> {
        // SAFETY: nama adalah C string statis
        let fd = unsafe { libc::memfd_create(b"spanring\0".as_ptr().cast(), libc::MFD_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: fd baru dan hanya dimiliki di sini
        Ok(unsafe { OwnedFd::from_raw_fd(fd) })
    }

    /// File memory-backed tanpa nama (sudah unlinked).
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    fn anonymous_file() -> io::Result<OwnedFd> {
        use std::ffi::CString;
        use std::sync::atomic::{AtomicUsize, Ordering};

        static SEQUENCE: AtomicUsize = AtomicUsize::new(0);

        let name = format!(
            "/spanring-{}-{}",
            std::process::id(),
            SEQUENCE.fetch_add(1, Ordering::Relaxed)
        );
        let name = CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        // shm_open variadic di Apple, jadi mode harus dipromosikan ke c_uint
        #[cfg(target_vendor = "apple")]
        let mode = 0o600 as libc::c_uint;
        #[cfg(not(target_vendor = "apple"))]
        let mode = 0o600 as libc::mode_t;

        // SAFETY: name valid C string; O_EXCL menjamin object baru
        let fd = unsafe {
            libc::shm_open(
                name.as_ptr(),
                libc::O_RDWR | libc::O_CREAT | libc::O_EXCL,
                mode,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        // Langsung unlink: object hidup selama fd / mapping masih ada
        // SAFETY: name masih valid
        unsafe {
            libc::shm_unlink(name.as_ptr());
        }

        // SAFETY: fd baru dan hanya dimiliki di sini
        Ok(unsafe { OwnedFd::from_raw_fd(fd) })
    }

    fn backing_file(bytes: usize) -> Result<OwnedFd> {
        let fd = anonymous_file().map_err(|source| {
            tracing::warn!(error = %source, "backing file creation failed");
            RingError::Backing {
                op: "create",
                source,
            }
        })?;

        // SAFETY: fd valid milik kita
        if unsafe { libc::ftruncate(fd.as_raw_fd(), bytes as libc::off_t) } != 0 {
            let source = io::Error::last_os_error();
            tracing::warn!(bytes, error = %source, "backing file truncate failed");
            return Err(RingError::Backing {
                op: "truncate",
                source,
            });
        }

        Ok(fd)
    }

    /// Double-mapped region: `[base, base+C)` dan `[base+C, base+2C)` adalah
    /// view identik atas physical pages yang sama.
    pub struct Mirrored<T> {
        // Urutan drop: unmap dulu, baru tutup descriptor
        map: Reservation,
        _backing: OwnedFd,
        _marker: PhantomData<T>,
    }

    // SAFETY: Mirrored memiliki mapping dan descriptor-nya secara eksklusif;
    // koordinasi akses data dilakukan oleh RingIndex.
    unsafe impl<T: Pod> Send for Mirrored<T> {}

    // SAFETY: tidak ada state mutable selain isi mapping; method Region hanya
    // menghitung pointer, dan slot dibagi producer/consumer lewat RingIndex.
    unsafe impl<T: Pod> Sync for Mirrored<T> {}

    impl<T> Mirrored<T> {
        #[inline(always)]
        fn base(&self) -> *mut T {
            self.map.base.as_ptr().cast()
        }
    }

    unsafe impl<T: Pod> Region<T> for Mirrored<T> {
        const STRATEGY: &'static str = "mirrored";

        fn allocate(capacity: usize) -> Result<Self> {
            let bytes = region_bytes::<T>(capacity)?;
            let page = page_size();
            if bytes == 0 || bytes % page != 0 {
                tracing::warn!(bytes, page_size = page, "ring size is not page aligned");
                return Err(RingError::Unaligned {
                    bytes,
                    page_size: page,
                });
            }

            let backing = backing_file(bytes)?;
            let map = reserve(bytes * 2)?;

            for (index, half) in ["lower", "upper"].into_iter().enumerate() {
                // SAFETY: target berada di dalam reservasi milik kita, jadi
                // MAP_FIXED hanya menimpa halaman PROT_NONE tersebut
                let target = unsafe { map.base.as_ptr().add(index * bytes) };
                let mapped = unsafe {
                    libc::mmap(
                        target.cast(),
                        bytes,
                        libc::PROT_READ | libc::PROT_WRITE,
                        libc::MAP_SHARED | libc::MAP_FIXED,
                        backing.as_raw_fd(),
                        0,
                    )
                };

                if mapped == libc::MAP_FAILED || mapped.cast::<u8>() != target {
                    let source = io::Error::last_os_error();
                    tracing::warn!(half, error = %source, "fixed mapping failed");
                    // `map` di-drop di sini: seluruh reservasi di-unmap
                    return Err(RingError::Map { half, source });
                }
            }

            tracing::debug!(
                strategy = <Self as Region<T>>::STRATEGY,
                base = ?map.base,
                bytes,
                "mapped mirrored ring region"
            );

            Ok(Self {
                map,
                _backing: backing,
                _marker: PhantomData,
            })
        }

        #[inline(always)]
        unsafe fn write_span(&self, offset: usize, _len: usize) -> *mut T {
            // offset + len <= 2 * capacity: selalu di dalam mirror
            self.base().add(offset)
        }

        #[inline(always)]
        unsafe fn publish(&self, _offset: usize, _span: *mut T, _len: usize) {}

        #[inline(always)]
        unsafe fn read_span(&self, offset: usize, _len: usize) -> *const T {
            self.base().add(offset)
        }
    }
}
