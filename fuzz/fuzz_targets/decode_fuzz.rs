#![no_main]
use libfuzzer_sys::fuzz_target;
use vcdecode::vcdiff::decode_memory;

fuzz_target!(|data: &[u8]| {
    // The decoder must never panic, only return errors.
    let _ = decode_memory(data, &[]);

    if data.len() >= 2 {
        let split = data.len() / 2;
        let (source, delta) = data.split_at(split);
        let _ = decode_memory(delta, source);
    }
});
