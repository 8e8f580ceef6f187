//! Property tests untuk invariant cursor dan FIFO
//!
//! Model referensi: `VecDeque`. Setiap interleaving write/read yang tidak melebihi
//! availability yang dilaporkan harus menjaga `size() ∈ [0, C]` dan urutan data.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU16, AtomicU8, AtomicUsize};

use proptest::prelude::*;
use spanring::core::{CircularBuffer, Ring, RingIndex, SplitCopy};

/// 64 KiB: kelipatan page size 4K, 16K, dan 64K
const BYTES: usize = 64 * 1024;

#[derive(Debug, Clone)]
enum Op {
    Write(usize),
    Read(usize),
}

fn op_strategy(max: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..=max).prop_map(Op::Write),
        (0..=max).prop_map(Op::Read),
    ]
}

proptest! {
    /// size() naik tepat n saat write-commit dan turun tepat n saat read-commit.
    #[test]
    fn index_size_tracks_commits(ops in proptest::collection::vec(op_strategy(300), 0..400)) {
        let idx: RingIndex<AtomicU8, 128> = RingIndex::new();
        let mut written = 0usize;
        let mut read = 0usize;

        for op in ops {
            match op {
                Op::Write(max) => {
                    let (_, n) = idx.write_free(max);
                    prop_assert_eq!(n, max.min(128 - (written - read)));
                    written += n;
                    idx.store_write(written);
                }
                Op::Read(max) => {
                    let (_, n) = idx.read_filled(max);
                    prop_assert_eq!(n, max.min(written - read));
                    read += n;
                    idx.store_read(read);
                }
            }
            prop_assert!(idx.size() <= 128);
            prop_assert_eq!(idx.size(), written - read);
        }
    }

    /// Buffer byte di atas region default berperilaku seperti VecDeque.
    #[test]
    fn buffer_matches_model(ops in proptest::collection::vec(op_strategy(80_000), 0..100)) {
        let mut buf: CircularBuffer<u8, BYTES> = CircularBuffer::new().unwrap();
        let mut model: VecDeque<u8> = VecDeque::new();
        let mut next = 0u8;

        for op in ops {
            match op {
                Op::Write(len) => {
                    let data: Vec<u8> = (0..len).map(|i| next.wrapping_add(i as u8)).collect();
                    let n = buf.push_back(&data);
                    prop_assert_eq!(n, len.min(BYTES - model.len()));
                    model.extend(&data[..n]);
                    next = next.wrapping_add(n as u8);
                }
                Op::Read(len) => {
                    let claim = buf.peek_front(len);
                    let expect: Vec<u8> = model.iter().take(len).copied().collect();
                    prop_assert_eq!(&claim[..], &expect[..]);
                    prop_assert_eq!(claim.commit_read(), expect.len());
                    model.drain(..expect.len());
                }
            }
            prop_assert_eq!(buf.size(), model.len());
        }
    }

    /// Fallback split-copy harus identik dengan model juga.
    #[test]
    fn split_copy_matches_model(ops in proptest::collection::vec(op_strategy(700), 0..200)) {
        let mut buf: CircularBuffer<u16, 512, AtomicUsize, SplitCopy<u16>> =
            CircularBuffer::new().unwrap();
        let mut model: VecDeque<u16> = VecDeque::new();
        let mut next = 0u16;

        for op in ops {
            match op {
                Op::Write(len) => {
                    let mut claim = buf.peek_back(len);
                    prop_assert_eq!(claim.len(), len.min(512 - model.len()));
                    for slot in claim.iter_mut() {
                        *slot = next;
                        model.push_back(next);
                        next = next.wrapping_add(1);
                    }
                    claim.commit_written();
                }
                Op::Read(len) => {
                    let got = buf.pop_front(len);
                    let expect: Vec<u16> = model.drain(..len.min(model.len())).collect();
                    prop_assert_eq!(got, expect);
                }
            }
            prop_assert!(buf.size() <= 512);
        }
    }

    /// Cursor 16-bit dengan capacity maksimum (2^15) tetap benar setelah overflow.
    #[test]
    fn max_capacity_for_cursor_width(steps in proptest::collection::vec(1usize..=32768, 1..40)) {
        let idx: RingIndex<AtomicU16, 32768> = RingIndex::new();
        let mut total = 0usize;

        for step in steps {
            let (_, n) = idx.write_free(step);
            prop_assert_eq!(n, step);
            total += n;
            idx.store_write(total);
            prop_assert_eq!(idx.size(), step);

            let (_, m) = idx.read_filled(usize::MAX);
            prop_assert_eq!(m, step);
            idx.store_read(total);
            prop_assert_eq!(idx.size(), 0);
        }
    }

    /// Ring menjaga FIFO untuk elemen non-Copy.
    #[test]
    fn ring_fifo(ops in proptest::collection::vec(any::<bool>(), 0..500)) {
        let mut ring: Ring<Box<u64>, 8> = Ring::new();
        let mut model = VecDeque::new();
        let mut next = 0u64;

        for push in ops {
            if push {
                let mut value = Some(Box::new(next));
                let stored = ring.push_from(&mut value);
                prop_assert_eq!(stored, model.len() < 8);
                if stored {
                    model.push_back(next);
                } else {
                    prop_assert_eq!(value.as_deref(), Some(&next));
                }
                next += 1;
            } else {
                prop_assert_eq!(ring.pop().map(|b| *b), model.pop_front());
            }
        }
    }
}
