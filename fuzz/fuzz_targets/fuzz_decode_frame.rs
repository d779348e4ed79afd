#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Decode arbitrary bytes as a response frame for a handful of addresses
    let _ = solivia::frame::decode_response(data, 1);
    let _ = solivia::frame::decode_response(data, 255);

    // Exercise the payload parser directly under varying lengths
    let _ = solivia::frame::parse_variant15(data);

    // Stream the same bytes through the reassembler in small chunks
    let mut asm = solivia::frame::FrameAssembler::new();
    for chunk in data.chunks(3) {
        asm.push(chunk);
        while let Some(frame) = asm.next_frame() {
            let _ = solivia::frame::decode_response(&frame, 1);
        }
    }
});
