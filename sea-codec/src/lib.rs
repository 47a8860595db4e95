//! # sea-codec
//!
//! A pure Rust implementation of SEA (Simple Embedded Audio), a
//! low-complexity lossy codec for 16-bit PCM streams.
//!
//! SEA trades compression ratio for decoder simplicity: each channel runs a
//! four-tap sign-sign LMS predictor, prediction residuals are quantized
//! through per-block scale factors, and everything is bit-packed into
//! fixed-size chunks that can be seeked in constant time. Bitrate is
//! tunable from roughly 1.2 to 8.5 bits per sample, with constant or
//! variable residual widths per chunk.
//!
//! ## Example
//!
//! ```
//! use sea_codec::{decode, encode, EncodeParams};
//!
//! let samples: Vec<i16> = (0..44100)
//!     .map(|i| ((i as f32 * 0.1).sin() * 10000.0) as i16)
//!     .collect();
//!
//! let encoded = encode(&samples, 44100, 1, EncodeParams::default(), "").unwrap();
//! let decoded = decode(&encoded).unwrap();
//!
//! assert_eq!(decoded.sample_rate, 44100);
//! assert_eq!(decoded.samples.len(), samples.len());
//! ```
//!
//! The streaming [`SeaEncoder`] and [`SeaDecoder`] types work over any
//! `io::Write` / `io::Read` and process one chunk at a time.

pub mod bitstream;
mod chunk;
pub mod decoder;
pub mod dqt;
pub mod encoder;
pub mod error;
pub mod header;
pub mod lms;
pub mod metadata;

pub use decoder::SeaDecoder;
pub use encoder::SeaEncoder;
pub use error::{Result, SeaError};
pub use header::{FileHeader, SEA_FORMAT_VERSION, SEA_MAGIC};
pub use metadata::Metadata;

/// Residual width strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateMode {
    /// Every residual in the stream uses `residual_bits`.
    #[default]
    Cbr,
    /// Residual width varies per scale-factor slot to hold an average
    /// bits-per-sample target.
    Vbr,
}

/// Encoder configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeParams {
    /// Constant or variable residual width.
    pub mode: RateMode,
    /// Residual width in bits, 1..=8. Sets the rate directly in CBR mode.
    pub residual_bits: u8,
    /// Scale-factor index width in bits, 1..=15. The encoder sweet spot is
    /// 3..=6; decoders accept the full range.
    pub scale_factor_bits: u8,
    /// Frames encoded per chunk.
    pub frames_per_chunk: u16,
    /// Consecutive frames sharing one scale factor.
    pub scale_factor_frames: u8,
    /// Average bits-per-sample target, VBR mode only.
    pub vbr_target_bps: f32,
}

impl Default for EncodeParams {
    fn default() -> Self {
        Self {
            mode: RateMode::Cbr,
            residual_bits: 3,
            scale_factor_bits: 4,
            frames_per_chunk: 5120,
            scale_factor_frames: 20,
            vbr_target_bps: 0.0,
        }
    }
}

impl EncodeParams {
    /// CBR parameters for a quality tier 1 (smallest) through 8 (best).
    ///
    /// The residual width follows the tier directly; wider residuals get
    /// more scale-factor resolution to spend their range on.
    pub fn with_quality(quality: u8) -> Self {
        let quality = quality.clamp(1, 8);
        Self {
            residual_bits: quality,
            scale_factor_bits: match quality {
                1..=4 => 4,
                5..=6 => 5,
                _ => 6,
            },
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(1..=8).contains(&self.residual_bits) {
            return Err(SeaError::ParamOutOfRange(format!(
                "residual_bits {} outside 1..=8",
                self.residual_bits
            )));
        }
        if !(1..=15).contains(&self.scale_factor_bits) {
            return Err(SeaError::ParamOutOfRange(format!(
                "scale_factor_bits {} outside 1..=15",
                self.scale_factor_bits
            )));
        }
        if self.frames_per_chunk == 0 {
            return Err(SeaError::ParamOutOfRange("frames_per_chunk is zero".into()));
        }
        if self.scale_factor_frames == 0 {
            return Err(SeaError::ParamOutOfRange(
                "scale_factor_frames is zero".into(),
            ));
        }
        if self.mode == RateMode::Vbr {
            let normalized = encoder::normalized_vbr_target(self);
            if !normalized.is_finite() || !(1.0..=8.0).contains(&normalized) {
                return Err(SeaError::ParamOutOfRange(format!(
                    "vbr_target_bps {} leaves no usable residual width",
                    self.vbr_target_bps
                )));
            }
        }
        Ok(())
    }
}

/// Decoded stream contents.
#[derive(Debug, Clone)]
pub struct Decoded {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u8,
    /// Frames decoded (samples per channel).
    pub frames: u32,
    /// Interleaved samples; frame `k` occupies
    /// `samples[k * channels .. (k + 1) * channels]`.
    pub samples: Vec<i16>,
    /// Raw metadata blob; parse with [`Metadata::parse`].
    pub metadata: String,
}

/// Encode interleaved samples into a complete SEA stream.
pub fn encode(
    samples: &[i16],
    sample_rate: u32,
    channels: u8,
    params: EncodeParams,
    metadata: &str,
) -> Result<Vec<u8>> {
    if channels == 0 {
        return Err(SeaError::ParamOutOfRange("channel count is zero".into()));
    }
    if samples.len() % channels as usize != 0 {
        return Err(SeaError::ParamOutOfRange(
            "sample count is not a multiple of the channel count".into(),
        ));
    }
    let frames = samples.len() / channels as usize;
    if frames > u32::MAX as usize {
        return Err(SeaError::ParamOutOfRange("stream too long".into()));
    }

    let sink = Vec::with_capacity(samples.len() / 2);
    let mut encoder = SeaEncoder::new(
        sink,
        sample_rate,
        channels,
        Some(frames as u32),
        params,
        metadata,
    )?;
    encoder.encode_samples(samples)?;
    encoder.finalize()
}

/// Decode a complete SEA stream.
pub fn decode(bytes: &[u8]) -> Result<Decoded> {
    let mut decoder = SeaDecoder::new(bytes)?;
    let mut samples = Vec::new();
    while let Some(chunk) = decoder.decode_chunk()? {
        samples.extend_from_slice(&chunk);
    }
    let header = decoder.header();
    Ok(Decoded {
        sample_rate: header.sample_rate,
        channels: header.channels,
        frames: (samples.len() / header.channels as usize) as u32,
        samples,
        metadata: header.metadata.clone(),
    })
}
