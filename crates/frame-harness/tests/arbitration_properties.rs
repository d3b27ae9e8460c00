//! Property: single-shot commands enqueued and answered one at a time are
//! transmitted in the exact order they were enqueued, regardless of id
//! value — the single-shot queue is a plain FIFO and arbitration always
//! prefers it, so nothing should reorder or drop a command that is always
//! answered before the next is queued.

use frame_core::command_table;
use frame_core::controller::ControllerConfig;
use frame_core::Data;
use frame_proto::Encoder;
use frame_harness::SimDriver;
use proptest::prelude::*;

fn config() -> ControllerConfig {
    // A tiny timeout clears the controller's initial "nothing queued yet"
    // send cycle almost instantly; a tiny period then drives every
    // subsequent send deterministically once a command is pending.
    ControllerConfig { default_timeout_ms: 1, default_retry: 4, period_ms: 5, ..ControllerConfig::default() }
}

proptest! {
    #[test]
    fn single_shot_commands_send_in_fifo_order(ids in proptest::collection::vec(any::<u8>(), 1..12)) {
        let mut sim = SimDriver::new(command_table::EMPTY, config());
        sim.start().unwrap();
        sim.advance(1); // clear the initial no-op send cycle's timeout

        for &id in &ids {
            sim.send_single(Data::new(id, &[0]).unwrap()).unwrap();
            sim.advance(5); // next period tick actually sends it
            sim.deliver_reply(&[id, 0x00]).unwrap();
        }

        let expected: Vec<Vec<u8>> = ids
            .iter()
            .map(|&id| Encoder::new().encode(&Data::new(id, &[0]).unwrap().to_wire()).unwrap().as_bytes().to_vec())
            .collect();
        prop_assert_eq!(sim.sent_frames(), expected);
    }
}
