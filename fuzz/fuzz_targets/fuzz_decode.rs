#![no_main]

//! Fuzz target for SEA stream decoding.
//!
//! Arbitrary bytes must never panic the decoder; every malformed input has
//! to surface as an error.

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }

    if let Ok(decoded) = sea_codec::decode(data) {
        // sanity of a successful decode
        assert!(decoded.channels > 0);
        assert_eq!(decoded.samples.len() % decoded.channels as usize, 0);
    }
});
