#![no_main]
use libfuzzer_sys::fuzz_target;
use vcdecode::vcdiff::{TargetBuffer, Window, WindowDecoder, WindowDescriptor, WindowSections};

// Drive the window engine directly, skipping header validation.
// Layout: [segment_len, window_len_lo, window_len_hi, data_len, inst_len, ...]
fuzz_target!(|data: &[u8]| {
    if data.len() < 5 {
        return;
    }
    let segment = u64::from(data[0]);
    let window_length = u64::from(u16::from_le_bytes([data[1], data[2]]));
    let rest = &data[5..];
    let data_len = usize::from(data[3]).min(rest.len());
    let (literals, rest) = rest.split_at(data_len);
    let inst_len = usize::from(data[4]).min(rest.len());
    let (inst, addr) = rest.split_at(inst_len);

    let source = vec![0xA5u8; 256];
    let descriptor = WindowDescriptor {
        source_segment_length: segment,
        window_length,
        ..Default::default()
    };
    let mut window = Window::new(
        descriptor,
        WindowSections {
            data: literals,
            inst,
            addr,
        },
    );
    let mut out = TargetBuffer::new();
    match WindowDecoder::new().decode_window(&mut window, &source, &mut out) {
        Ok(()) => assert_eq!(out.len() as u64, window_length),
        Err(_) => assert!(out.is_empty()),
    }
});
