//! Chunk layout, parsing, serialization, and decoding.
//!
//! A chunk is the fixed-size unit of the container: a four-byte header, the
//! per-channel LMS state, packed scale factors, optional packed width codes
//! (VBR), packed residuals, and zero padding. Each region is independently
//! byte-aligned.

use crate::bitstream::{self, BitReader, BitWriter};
use crate::dqt::DqtCache;
use crate::error::{Result, SeaError};
use crate::lms::{clamp_i16, LmsState, LMS_WIRE_LEN};

/// Fixed chunk header: type, width nibbles, scale-factor stride, reserved.
pub(crate) const CHUNK_HEADER_LEN: usize = 4;

/// Value of the reserved byte in every chunk header.
pub(crate) const CHUNK_RESERVED: u8 = 0x5A;

/// Residual-width strategy of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChunkType {
    Cbr = 0x01,
    Vbr = 0x02,
}

impl ChunkType {
    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x01 => Ok(ChunkType::Cbr),
            0x02 => Ok(ChunkType::Vbr),
            other => Err(SeaError::BadChunkType(other)),
        }
    }
}

/// Geometry of one chunk, fully determined by its header fields and the
/// frame count.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChunkLayout {
    pub channels: usize,
    pub frames: usize,
    pub scale_factor_bits: u8,
    pub scale_factor_frames: usize,
    pub residual_bits: u8,
    pub vbr: bool,
}

impl ChunkLayout {
    /// Scale-factor slots per channel; the last slot may cover fewer frames.
    pub fn slots(&self) -> usize {
        self.frames.div_ceil(self.scale_factor_frames)
    }

    /// Scale-factor entries in the chunk across all channels.
    pub fn sf_items(&self) -> usize {
        self.slots() * self.channels
    }

    /// Frames covered by slot `slot`.
    pub fn slot_frames(&self, slot: usize) -> usize {
        let start = slot * self.scale_factor_frames;
        (self.frames - start).min(self.scale_factor_frames)
    }

    pub fn scale_factor_bytes(&self) -> usize {
        bitstream::packed_len(self.sf_items(), self.scale_factor_bits)
    }

    pub fn width_code_bytes(&self) -> usize {
        if self.vbr {
            bitstream::packed_len(self.sf_items(), 2)
        } else {
            0
        }
    }

    /// Residual payload size. `widths` holds the absolute per-item widths
    /// (slot-major, then channel) and is ignored for CBR.
    pub fn residual_bytes(&self, widths: &[u8]) -> usize {
        if !self.vbr {
            return bitstream::packed_len(self.frames * self.channels, self.residual_bits);
        }
        let mut bits = 0usize;
        for (item, &width) in widths.iter().enumerate() {
            bits += width as usize * self.slot_frames(item / self.channels);
        }
        bits.div_ceil(8)
    }

    /// Unpadded byte length of the whole chunk.
    pub fn total_len(&self, widths: &[u8]) -> usize {
        CHUNK_HEADER_LEN
            + self.channels * LMS_WIRE_LEN
            + self.scale_factor_bytes()
            + self.width_code_bytes()
            + self.residual_bytes(widths)
    }
}

/// One parsed or assembled chunk.
#[derive(Debug, Clone)]
pub(crate) struct Chunk {
    pub chunk_type: ChunkType,
    pub scale_factor_bits: u8,
    pub scale_factor_frames: u8,
    /// CBR width, or the VBR base width.
    pub residual_bits: u8,
    /// Frames encoded by this chunk.
    pub frames: usize,
    /// Predictor state entering the chunk, one per channel.
    pub lms: Vec<LmsState>,
    /// Scale-factor index per slot per channel, slot-major.
    pub scale_factors: Vec<u8>,
    /// Absolute residual width per slot per channel; empty for CBR.
    pub residual_widths: Vec<u8>,
    /// Residual codes, frame-major (`frame * channels + channel`).
    pub residuals: Vec<u8>,
}

// Header nibble fields shared by parse and measured_len.
fn parse_fixed_header(bytes: &[u8]) -> Result<(ChunkType, u8, u8, u8)> {
    let header = bytes.get(..CHUNK_HEADER_LEN).ok_or(SeaError::Truncated)?;
    let chunk_type = ChunkType::from_byte(header[0])?;
    let scale_factor_bits = header[1] >> 4;
    let residual_bits = header[1] & 0x0F;
    let scale_factor_frames = header[2];
    if header[3] != CHUNK_RESERVED {
        return Err(SeaError::BadReserved(header[3]));
    }
    if scale_factor_bits == 0 {
        return Err(SeaError::ParamOutOfRange("scale factor width is zero".into()));
    }
    if !(1..=8).contains(&residual_bits) {
        return Err(SeaError::ParamOutOfRange(format!(
            "residual width {residual_bits} out of range"
        )));
    }
    if scale_factor_frames == 0 {
        return Err(SeaError::ParamOutOfRange("scale factor stride is zero".into()));
    }
    Ok((chunk_type, scale_factor_bits, residual_bits, scale_factor_frames))
}

fn read_width_codes(region: &[u8], layout: &ChunkLayout, base: u8) -> Result<Vec<u8>> {
    let codes = bitstream::unpack(region, 2, layout.sf_items())?;
    let mut widths = Vec::with_capacity(codes.len());
    for code in codes {
        let width = base as i32 + code as i32 - 1;
        if !(1..=8).contains(&width) {
            return Err(SeaError::ParamOutOfRange(format!(
                "variable residual width {width} out of range"
            )));
        }
        widths.push(width as u8);
    }
    Ok(widths)
}

impl Chunk {
    pub fn layout(&self) -> ChunkLayout {
        ChunkLayout {
            channels: self.lms.len(),
            frames: self.frames,
            scale_factor_bits: self.scale_factor_bits,
            scale_factor_frames: self.scale_factor_frames as usize,
            residual_bits: self.residual_bits,
            vbr: self.chunk_type == ChunkType::Vbr,
        }
    }

    /// Parse a chunk known to carry `frames` frames. Every region access is
    /// bounds-checked; corrupt declarations surface as errors, never panics.
    pub fn parse(bytes: &[u8], channels: usize, frames: usize) -> Result<Self> {
        let (chunk_type, scale_factor_bits, residual_bits, scale_factor_frames) =
            parse_fixed_header(bytes)?;

        let mut offset = CHUNK_HEADER_LEN;
        let mut lms = Vec::with_capacity(channels);
        for _ in 0..channels {
            let wire = bytes
                .get(offset..offset + LMS_WIRE_LEN)
                .ok_or(SeaError::Truncated)?;
            let wire: &[u8; LMS_WIRE_LEN] = wire.try_into().map_err(|_| SeaError::Truncated)?;
            lms.push(LmsState::from_bytes(wire));
            offset += LMS_WIRE_LEN;
        }

        let layout = ChunkLayout {
            channels,
            frames,
            scale_factor_bits,
            scale_factor_frames: scale_factor_frames as usize,
            residual_bits,
            vbr: chunk_type == ChunkType::Vbr,
        };

        let sf_bytes = layout.scale_factor_bytes();
        let region = bytes.get(offset..offset + sf_bytes).ok_or(SeaError::Truncated)?;
        let scale_factors = bitstream::unpack(region, scale_factor_bits, layout.sf_items())?;
        offset += sf_bytes;

        let residual_widths = if layout.vbr {
            let code_bytes = layout.width_code_bytes();
            let region = bytes
                .get(offset..offset + code_bytes)
                .ok_or(SeaError::Truncated)?;
            let widths = read_width_codes(region, &layout, residual_bits)?;
            offset += code_bytes;
            widths
        } else {
            Vec::new()
        };

        let residual_bytes = layout.residual_bytes(&residual_widths);
        let region = bytes
            .get(offset..offset + residual_bytes)
            .ok_or(SeaError::Truncated)?;
        let residuals = if layout.vbr {
            let mut reader = BitReader::new(region);
            let mut residuals = Vec::with_capacity(frames * channels);
            for frame in 0..frames {
                let slot = frame / layout.scale_factor_frames;
                for channel in 0..channels {
                    let width = residual_widths[slot * channels + channel];
                    residuals.push(reader.read_bits(width as u32)? as u8);
                }
            }
            residuals
        } else {
            bitstream::unpack(region, residual_bits, frames * channels)?
        };

        Ok(Self {
            chunk_type,
            scale_factor_bits,
            scale_factor_frames,
            residual_bits,
            frames,
            lms,
            scale_factors,
            residual_widths,
            residuals,
        })
    }

    /// Unpadded byte length a chunk of `frames` frames occupies, reading
    /// only the header and (for VBR) the width codes from `bytes`.
    pub fn measured_len(bytes: &[u8], channels: usize, frames: usize) -> Result<usize> {
        let (chunk_type, scale_factor_bits, residual_bits, scale_factor_frames) =
            parse_fixed_header(bytes)?;
        let layout = ChunkLayout {
            channels,
            frames,
            scale_factor_bits,
            scale_factor_frames: scale_factor_frames as usize,
            residual_bits,
            vbr: chunk_type == ChunkType::Vbr,
        };
        let widths = if layout.vbr {
            let offset =
                CHUNK_HEADER_LEN + channels * LMS_WIRE_LEN + layout.scale_factor_bytes();
            let region = bytes
                .get(offset..offset + layout.width_code_bytes())
                .ok_or(SeaError::Truncated)?;
            read_width_codes(region, &layout, residual_bits)?
        } else {
            Vec::new()
        };
        Ok(layout.total_len(&widths))
    }

    /// Frame count of an unpadded trailing chunk: the largest
    /// `n <= frames_per_chunk` whose layout occupies exactly `bytes.len()`.
    pub fn frames_for_len(bytes: &[u8], channels: usize, frames_per_chunk: usize) -> Option<usize> {
        for frames in (1..=frames_per_chunk).rev() {
            if let Ok(len) = Self::measured_len(bytes, channels, frames) {
                if len == bytes.len() {
                    return Some(frames);
                }
            }
        }
        None
    }

    /// Serialize without padding.
    pub fn serialize(&self) -> Vec<u8> {
        let layout = self.layout();
        let channels = layout.channels;
        let mut out = Vec::with_capacity(layout.total_len(&self.residual_widths));

        out.push(self.chunk_type as u8);
        out.push((self.scale_factor_bits << 4) | self.residual_bits);
        out.push(self.scale_factor_frames);
        out.push(CHUNK_RESERVED);

        for lms in &self.lms {
            out.extend_from_slice(&lms.to_bytes());
        }

        out.extend_from_slice(&bitstream::pack(&self.scale_factors, self.scale_factor_bits));

        if layout.vbr {
            let codes: Vec<u8> = self
                .residual_widths
                .iter()
                .map(|&width| width + 1 - self.residual_bits)
                .collect();
            out.extend_from_slice(&bitstream::pack(&codes, 2));
        }

        let mut writer = BitWriter::with_capacity(layout.residual_bytes(&self.residual_widths));
        for frame in 0..self.frames {
            let slot = frame / layout.scale_factor_frames;
            for channel in 0..channels {
                let width = if layout.vbr {
                    self.residual_widths[slot * channels + channel]
                } else {
                    self.residual_bits
                };
                writer.write_bits(self.residuals[frame * channels + channel] as u32, width as u32);
            }
        }
        out.extend_from_slice(&writer.finalize());

        out
    }

    /// Reconstruct this chunk's samples. Predictor state is restored from
    /// the chunk header, not carried over from previous chunks.
    pub fn decode(&self, cache: &mut DqtCache) -> Vec<i16> {
        let channels = self.lms.len();
        let scale_factor_frames = self.scale_factor_frames as usize;
        let mut lms = self.lms.clone();
        let mut output = Vec::with_capacity(self.frames * channels);

        for frame in 0..self.frames {
            let slot = frame / scale_factor_frames;
            for channel in 0..channels {
                let item = slot * channels + channel;
                let width = if self.chunk_type == ChunkType::Vbr {
                    self.residual_widths[item]
                } else {
                    self.residual_bits
                };
                let tab = cache.ensure(self.scale_factor_bits, width);

                let predicted = lms[channel].predict();
                let code = self.residuals[frame * channels + channel] as usize;
                let dequantized = tab.row(self.scale_factors[item] as usize)[code];
                let reconstructed = clamp_i16(predicted + dequantized);

                output.push(reconstructed);
                lms[channel].update(reconstructed, dequantized);
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cbr_chunk() -> Chunk {
        Chunk {
            chunk_type: ChunkType::Cbr,
            scale_factor_bits: 4,
            scale_factor_frames: 4,
            residual_bits: 3,
            frames: 6,
            lms: vec![LmsState::new()],
            scale_factors: vec![2, 9],
            residual_widths: vec![],
            residuals: vec![0, 1, 2, 7, 3, 4],
        }
    }

    fn vbr_chunk() -> Chunk {
        Chunk {
            chunk_type: ChunkType::Vbr,
            scale_factor_bits: 4,
            scale_factor_frames: 4,
            residual_bits: 3,
            frames: 6,
            lms: vec![LmsState::new(), LmsState::new()],
            scale_factors: vec![2, 9, 1, 0],
            residual_widths: vec![2, 4, 3, 5],
            residuals: vec![1, 11, 2, 7, 3, 4, 0, 15, 1, 3, 2, 19],
        }
    }

    #[test]
    fn test_cbr_serialize_parse_roundtrip() {
        let chunk = cbr_chunk();
        let bytes = chunk.serialize();
        // header + lms + ceil(2*4/8) + ceil(6*3/8)
        assert_eq!(bytes.len(), 4 + 16 + 1 + 3);
        let parsed = Chunk::parse(&bytes, 1, 6).unwrap();
        assert_eq!(parsed.scale_factors, chunk.scale_factors);
        assert_eq!(parsed.residuals, chunk.residuals);
        assert_eq!(parsed.lms, chunk.lms);
    }

    #[test]
    fn test_vbr_serialize_parse_roundtrip() {
        let chunk = vbr_chunk();
        let bytes = chunk.serialize();
        let parsed = Chunk::parse(&bytes, 2, 6).unwrap();
        assert_eq!(parsed.chunk_type, ChunkType::Vbr);
        assert_eq!(parsed.scale_factors, chunk.scale_factors);
        assert_eq!(parsed.residual_widths, chunk.residual_widths);
        assert_eq!(parsed.residuals, chunk.residuals);
    }

    #[test]
    fn test_measured_len_matches_serialize() {
        for (chunk, channels) in [(cbr_chunk(), 1), (vbr_chunk(), 2)] {
            let bytes = chunk.serialize();
            assert_eq!(
                Chunk::measured_len(&bytes, channels, chunk.frames).unwrap(),
                bytes.len()
            );
        }
    }

    #[test]
    fn test_frames_for_len_recovers_unique_count() {
        // one byte per frame (residual_bits 8, mono) makes lengths unique
        let mut chunk = cbr_chunk();
        chunk.residual_bits = 8;
        chunk.frames = 5;
        chunk.residuals = vec![10, 20, 30, 40, 50];
        let bytes = chunk.serialize();
        assert_eq!(Chunk::frames_for_len(&bytes, 1, 100), Some(5));
    }

    #[test]
    fn test_bad_reserved() {
        let mut bytes = cbr_chunk().serialize();
        bytes[3] = 0x00;
        assert!(matches!(
            Chunk::parse(&bytes, 1, 6),
            Err(SeaError::BadReserved(0x00))
        ));
    }

    #[test]
    fn test_bad_chunk_type() {
        let mut bytes = cbr_chunk().serialize();
        bytes[0] = 0x07;
        assert!(matches!(
            Chunk::parse(&bytes, 1, 6),
            Err(SeaError::BadChunkType(0x07))
        ));
    }

    #[test]
    fn test_truncated_regions() {
        let bytes = cbr_chunk().serialize();
        for cut in [2, 10, bytes.len() - 1] {
            assert!(matches!(
                Chunk::parse(&bytes[..cut], 1, 6),
                Err(SeaError::Truncated)
            ));
        }
    }

    #[test]
    fn test_decode_restores_header_state() {
        // codes alternate +v/-v; with zeroed weights prediction stays 0 and
        // the output is exactly the dequantized values
        let mut cache = DqtCache::new();
        let chunk = cbr_chunk();
        let samples = chunk.decode(&mut cache);
        assert_eq!(samples.len(), 6);
        let tab = cache.ensure(4, 3);
        let row = tab.row(2).to_vec();
        assert_eq!(samples[0] as i32, row[0]);
        assert_eq!(samples[1] as i32, row[1]);
    }
}
