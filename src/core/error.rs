//! Error konstruksi buffer
//!
//! Kondisi full/empty BUKAN error: itu dilaporkan lewat span kosong,
//! `false`, atau `None`. Error di sini hanya muncul sekali saat konstruksi.

use std::io;

use thiserror::Error;

/// Result alias untuk operasi konstruksi region.
pub type Result<T> = std::result::Result<T, RingError>;

/// Kegagalan saat membangun backing storage sebuah buffer.
#[derive(Debug, Error)]
pub enum RingError {
    /// Ukuran buffer (Capacity × size_of::<T>) bukan kelipatan page size.
    #[error("buffer size of {bytes} bytes is not a multiple of the page size ({page_size})")]
    Unaligned { bytes: usize, page_size: usize },

    /// Capacity × size_of::<T>() (atau dua kalinya) overflow `usize`.
    #[error("capacity {capacity} with element size {elem_size} overflows the address space")]
    Overflow { capacity: usize, elem_size: usize },

    /// Reservasi virtual address space gagal.
    #[error("failed to reserve {bytes} bytes of address space: {source}")]
    Reserve {
        bytes: usize,
        #[source]
        source: io::Error,
    },

    /// Pembuatan / truncate file memory-backed gagal.
    #[error("backing file {op} failed: {source}")]
    Backing {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// Salah satu fixed mapping gagal (misal race alamat).
    #[error("failed to map {half} half of the mirrored region: {source}")]
    Map {
        half: &'static str,
        #[source]
        source: io::Error,
    },

    /// Anonymous mapping untuk fallback split-copy gagal.
    #[error("anonymous mapping failed: {0}")]
    Anonymous(#[source] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_unaligned_message() {
        let err = RingError::Unaligned {
            bytes: 100,
            page_size: 4096,
        };
        assert_eq!(
            err.to_string(),
            "buffer size of 100 bytes is not a multiple of the page size (4096)"
        );
        assert!(err.source().is_none());
    }

    #[test]
    fn test_map_error_keeps_source() {
        let err = RingError::Map {
            half: "upper",
            source: io::Error::from_raw_os_error(12),
        };
        assert!(err.to_string().starts_with("failed to map upper half"));
        assert!(err.source().is_some());
    }
}
