//! Spanring - Lock-Free SPSC Ring Buffers
//!
//! Arsitektur:
//! - Lock-Free: Satu producer, satu consumer, hanya acquire/release atomics
//! - Zero-Copy: Span selalu contiguous berkat double mapping (mirrored region)
//! - No-Allocation: Semua storage dialokasikan sekali saat init
//! - Claim/Commit: Peek menghasilkan claim yang harus di-commit tepat sekali

pub mod core;

pub use crate::core::{
    CircularBuffer, Consumer, Cursor, Pod, Producer, ReadClaim, Ring, RingConsumer, RingError,
    RingIndex, RingProducer, WriteClaim,
};
