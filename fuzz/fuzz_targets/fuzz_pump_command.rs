//! Fuzz target: `PumpCommand::decode`
//!
//! Any 12-byte payload decodes, and re-encoding gives the same bytes.
//!
//! cargo fuzz run fuzz_pump_command

#![no_main]

use dispenser::link::protocol::{PumpCommand, PUMP_PAYLOAD_LEN};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    match PumpCommand::decode(data) {
        Some(cmd) => {
            assert_eq!(data.len(), PUMP_PAYLOAD_LEN);
            assert_eq!(&cmd.encode()[..], data);
        }
        None => assert_ne!(data.len(), PUMP_PAYLOAD_LEN),
    }
});
