//! Property tests for the receive-buffer accounting model
//!
//! Drives the buffer through randomized command/acknowledgment/query
//! sequences under the same admission discipline the engine uses, checking
//! the accounting against a reference FIFO model.

use gcodestep_communication::InputBuffer;
use proptest::prelude::*;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
enum Op {
    Send(usize),
    Query,
    Ack,
    StatusReport,
    Clear,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (1usize..=60).prop_map(Op::Send),
        2 => Just(Op::Ack),
        1 => Just(Op::Query),
        1 => Just(Op::StatusReport),
        1 => Just(Op::Clear),
    ]
}

proptest! {
    #[test]
    fn buffer_accounting_matches_reference_model(
        ops in proptest::collection::vec(op_strategy(), 1..200)
    ) {
        let buffer = InputBuffer::new(127, 0.90);
        let mut model: VecDeque<usize> = VecDeque::new();
        let mut queries = 0usize;

        for op in ops {
            match op {
                Op::Send(len) => {
                    // Admission-gated, as the engine sends.
                    if buffer.fits(len) {
                        buffer.charge(len);
                        model.push_back(len);
                    }
                }
                Op::Query => {
                    if buffer.fits(1) {
                        buffer.charge_query();
                        queries += 1;
                    }
                }
                Op::Ack => {
                    prop_assert_eq!(buffer.acknowledge(), model.pop_front());
                }
                Op::StatusReport => {
                    buffer.note_status_report();
                    queries = queries.saturating_sub(1);
                }
                Op::Clear => {
                    buffer.clear();
                    model.clear();
                    queries = 0;
                }
            }

            prop_assert!(buffer.used() <= buffer.capacity());
            prop_assert_eq!(buffer.pending_count(), model.len());
            prop_assert_eq!(buffer.used(), model.iter().sum::<usize>() + queries);
        }

        // Draining every outstanding item returns the accounting to zero.
        while let Some(expected) = model.pop_front() {
            prop_assert_eq!(buffer.acknowledge(), Some(expected));
        }
        for _ in 0..queries {
            buffer.note_status_report();
        }
        prop_assert_eq!(buffer.used(), 0);
    }

    #[test]
    fn admission_is_monotonic(preload in 0usize..=110, len in 1usize..=126) {
        let buffer = InputBuffer::new(127, 0.90);
        buffer.charge(preload);
        if buffer.fits(len) {
            prop_assert!(buffer.fits(len - 1));
        } else {
            prop_assert!(!buffer.fits(len + 1));
        }
    }
}
