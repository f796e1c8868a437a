#![no_main]

use libfuzzer_sys::fuzz_target;

use kinda_wire::{decode_decision, LogHeader, RecordLog};

fuzz_target!(|data: &[u8]| {
    // Decoders must reject garbage without panicking
    let _ = LogHeader::parse(&mut &data[..]);
    let _ = decode_decision(&mut &data[..]);

    // Anything that decodes must survive a second trip unchanged
    if let Ok(log) = RecordLog::decode(data) {
        let encoded = log.encode().expect("decoded log re-encodes");
        let again = RecordLog::decode(&encoded).expect("re-encoded log decodes");
        assert!(again.bit_eq(&log));
    }
});
