//! Core module: Lock-Free SPSC Ring Buffers dengan mirrored mmap backing
//!
//! Prinsip desain:
//! - Zero-Copy: Span read/write selalu contiguous, termasuk melewati batas wrap
//! - Lock-Free: Hanya atomic load-acquire/store-release, tidak ada CAS/Mutex
//! - No-Allocation: Semua buffer pre-allocated saat init

mod circular_buffer;
mod cursor;
mod error;
mod region;
mod ring;
mod ring_index;

pub use circular_buffer::{CircularBuffer, Consumer, Producer, ReadClaim, WriteClaim};
pub use cursor::Cursor;
pub use error::{Result, RingError};
#[cfg(unix)]
pub use region::Mirrored;
pub use region::{page_size, DefaultRegion, Pod, Region, SplitCopy};
pub use ring::{Ring, RingConsumer, RingProducer};
pub use ring_index::RingIndex;
