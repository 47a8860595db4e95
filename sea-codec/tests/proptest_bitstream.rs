//! Property-based tests for bit packing.
//!
//! Uses proptest to verify the round-trip contract of `pack`/`unpack` and
//! the BitReader/BitWriter pair across all field widths the format uses.

use proptest::prelude::*;
use sea_codec::bitstream::{pack, packed_len, unpack, BitReader, BitWriter};

proptest! {
    /// unpack(pack(xs, b), b, xs.len()) == xs for every width 1..=8.
    #[test]
    fn roundtrip_pack_unpack(
        width in 1u8..=8,
        raw in prop::collection::vec(any::<u8>(), 0..200)
    ) {
        let mask = ((1u16 << width) - 1) as u8;
        let values: Vec<u8> = raw.iter().map(|v| v & mask).collect();

        let packed = pack(&values, width);
        prop_assert_eq!(packed.len(), packed_len(values.len(), width));

        let unpacked = unpack(&packed, width, values.len()).unwrap();
        prop_assert_eq!(unpacked, values);
    }

    /// The writer and reader agree on mixed-width sequences, as the VBR
    /// residual region requires.
    #[test]
    fn roundtrip_mixed_widths(
        fields in prop::collection::vec((1u32..=8, any::<u8>()), 1..100)
    ) {
        let mut writer = BitWriter::new();
        for &(width, value) in &fields {
            writer.write_bits(value as u32, width);
        }
        let bytes = writer.finalize();

        let mut reader = BitReader::new(&bytes);
        for &(width, value) in &fields {
            let mask = ((1u16 << width) - 1) as u32;
            prop_assert_eq!(reader.read_bits(width).unwrap(), value as u32 & mask);
        }
    }

    /// Packed output never exceeds its computed length and zero-pads the
    /// final byte.
    #[test]
    fn packing_is_tight(
        width in 1u8..=8,
        raw in prop::collection::vec(any::<u8>(), 1..64)
    ) {
        let mask = ((1u16 << width) - 1) as u8;
        let values: Vec<u8> = raw.iter().map(|v| v & mask).collect();
        let packed = pack(&values, width);

        let used_bits = values.len() * width as usize;
        let tail_bits = packed.len() * 8 - used_bits;
        prop_assert!(tail_bits < 8);
        if tail_bits > 0 {
            let tail = packed[packed.len() - 1] & ((1u16 << tail_bits) - 1) as u8;
            prop_assert_eq!(tail, 0);
        }
    }

    /// A short buffer is reported as truncation, never a panic.
    #[test]
    fn unpack_rejects_short_buffers(
        width in 1u8..=8,
        count in 1usize..100,
        cut in 1usize..8
    ) {
        let values = vec![0u8; count];
        let packed = pack(&values, width);
        let cut = cut.min(packed.len());
        prop_assert!(unpack(&packed[..packed.len() - cut], width, count).is_err());
    }
}
