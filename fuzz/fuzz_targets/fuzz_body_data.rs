#![no_main]
use libfuzzer_sys::fuzz_target;

use body_data::{Limits, MultipartDecoder};
use bytes::Bytes;

fuzz_target!(|data: &[u8]| {
    let mut decoder = MultipartDecoder::new("BOUNDARY", Limits::default());
    for chunk in data.chunks(7) {
        decoder.feed(Bytes::copy_from_slice(chunk), &mut ());
    }
    let _ = decoder.finish();
});
