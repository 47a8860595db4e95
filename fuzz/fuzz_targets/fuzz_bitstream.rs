#![no_main]

//! Fuzz target for bit packing edge cases.
//!
//! Drives pack/unpack and the BitReader with arbitrary widths and values,
//! checking the round-trip contract instead of just the absence of panics.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sea_codec::bitstream::{pack, unpack, BitReader};

#[derive(Arbitrary, Debug)]
struct BitstreamInput {
    width: u8,
    values: Vec<u8>,
    raw: Vec<u8>,
    read_widths: Vec<u8>,
}

fuzz_target!(|input: BitstreamInput| {
    if input.values.len() > 4096 || input.raw.len() > 4096 {
        return;
    }

    let width = input.width % 8 + 1;
    let mask = ((1u16 << width) - 1) as u8;
    let values: Vec<u8> = input.values.iter().map(|v| v & mask).collect();

    let packed = pack(&values, width);
    let unpacked = unpack(&packed, width, values.len()).expect("own packing must unpack");
    assert_eq!(unpacked, values);

    // arbitrary reads over arbitrary bytes only ever fail with an error
    let mut reader = BitReader::new(&input.raw);
    for &w in input.read_widths.iter().take(4096) {
        let _ = reader.read_bits((w % 32 + 1) as u32);
    }
});
