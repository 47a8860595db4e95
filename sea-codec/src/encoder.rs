//! Streaming encoder and rate selection.

use std::io::Write;

use crate::chunk::{Chunk, ChunkLayout, ChunkType};
use crate::dqt::{DequantTab, DqtCache};
use crate::error::{Result, SeaError};
use crate::header::FileHeader;
use crate::lms::{clamp_i16, LmsState, LMS_WIRE_LEN};
use crate::metadata::Metadata;
use crate::{EncodeParams, RateMode};

// Share of scale-factor slots assigned each width delta around the VBR
// base width, indexed [base-2, base-1, base, base+1, base+2, base+3]. The
// fractional part of the normalized target interpolates between adjacent
// entries.
const TARGET_WIDTH_DISTRIBUTION: [f32; 6] = [0.00, 0.00, 0.95, 0.05, 0.00, 0.00];

/// Incremental SEA encoder over any `io::Write` sink.
///
/// Samples are buffered and written out one fixed-size chunk at a time;
/// `finalize` flushes the trailing partial chunk. The file header goes out
/// immediately on construction, so a sink can be streamed while encoding
/// is still in progress.
pub struct SeaEncoder<W: Write> {
    writer: W,
    header: FileHeader,
    params: EncodeParams,
    lms: Vec<LmsState>,
    dqt: DqtCache,
    pending: Vec<i16>,
    frames_written: u64,
}

impl<W: Write> SeaEncoder<W> {
    /// Create an encoder and write the stream header.
    ///
    /// `total_frames` of `None` enters streaming mode: the header declares
    /// zero frames and the decoder reads until EOF.
    pub fn new(
        mut writer: W,
        sample_rate: u32,
        channels: u8,
        total_frames: Option<u32>,
        params: EncodeParams,
        metadata: &str,
    ) -> Result<Self> {
        params.validate()?;
        if channels == 0 {
            return Err(SeaError::ParamOutOfRange("channel count is zero".into()));
        }
        // structural validation only; the blob is stored as given
        Metadata::parse(metadata)?;

        let chunk_size = nominal_chunk_len(&params, channels as usize)?;
        let header = FileHeader {
            channels,
            chunk_size: chunk_size as u16,
            frames_per_chunk: params.frames_per_chunk,
            sample_rate,
            total_frames: total_frames.unwrap_or(0),
            metadata: metadata.to_string(),
        };
        header.write_to(&mut writer)?;

        Ok(Self {
            writer,
            header,
            params,
            lms: LmsState::init_vec(channels as usize),
            dqt: DqtCache::new(),
            pending: Vec::new(),
            frames_written: 0,
        })
    }

    /// Stream parameters as written to the header.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Buffer interleaved samples, encoding every completed chunk.
    pub fn encode_samples(&mut self, samples: &[i16]) -> Result<()> {
        self.pending.extend_from_slice(samples);
        let chunk_samples =
            self.header.frames_per_chunk as usize * self.header.channels as usize;
        while self.pending.len() >= chunk_samples {
            let chunk: Vec<i16> = self.pending.drain(..chunk_samples).collect();
            self.write_chunk(&chunk, true)?;
        }
        Ok(())
    }

    /// Encode the buffered remainder, flush, and return the sink.
    ///
    /// With a known `total_frames` the trailing chunk is zero-padded to the
    /// fixed chunk size; in streaming mode it is written unpadded so the
    /// decoder can recover its frame count from its length.
    pub fn finalize(mut self) -> Result<W> {
        if !self.pending.is_empty() {
            if self.pending.len() % self.header.channels as usize != 0 {
                return Err(SeaError::ParamOutOfRange(
                    "sample count is not a multiple of the channel count".into(),
                ));
            }
            let remainder = std::mem::take(&mut self.pending);
            let pad = self.header.total_frames != 0;
            self.write_chunk(&remainder, pad)?;
        }
        self.writer.flush()?;
        Ok(self.writer)
    }

    /// Frames encoded and written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn write_chunk(&mut self, samples: &[i16], pad: bool) -> Result<()> {
        let channels = self.header.channels as usize;
        let frames = samples.len() / channels;

        // the running state must be exactly what the chunk header stores
        for lms in &mut self.lms {
            lms.saturate_to_wire();
        }

        let chunk = match self.params.mode {
            RateMode::Cbr => self.encode_cbr(samples, frames),
            RateMode::Vbr => self.encode_vbr(samples, frames),
        };

        let mut bytes = chunk.serialize();
        let chunk_size = self.header.chunk_size as usize;
        if bytes.len() > chunk_size {
            return Err(SeaError::EncodeOverflow {
                needed: bytes.len(),
                available: chunk_size,
            });
        }
        if pad {
            bytes.resize(chunk_size, 0);
        }
        self.writer.write_all(&bytes)?;
        self.frames_written += frames as u64;
        Ok(())
    }

    fn encode_cbr(&mut self, samples: &[i16], frames: usize) -> Chunk {
        let channels = self.header.channels as usize;
        let width = self.params.residual_bits;
        let slot_samples = self.params.scale_factor_frames as usize * channels;

        let header_lms = self.lms.clone();
        let mut scale_factors = Vec::new();
        let mut residuals = vec![0u8; samples.len()];

        for (slot, slot_slice) in samples.chunks(slot_samples).enumerate() {
            for channel in 0..channels {
                let tab = self.dqt.ensure(self.params.scale_factor_bits, width);
                let choice =
                    best_scale_factor(tab, &slot_slice[channel..], channels, &self.lms[channel]);
                self.lms[channel] = choice.lms;
                scale_factors.push(choice.scale_factor);
                interleave_codes(
                    &mut residuals[slot * slot_samples..],
                    &choice.codes,
                    channels,
                    channel,
                );
            }
        }

        Chunk {
            chunk_type: ChunkType::Cbr,
            scale_factor_bits: self.params.scale_factor_bits,
            scale_factor_frames: self.params.scale_factor_frames,
            residual_bits: width,
            frames,
            lms: header_lms,
            scale_factors,
            residual_widths: Vec::new(),
            residuals,
        }
    }

    fn encode_vbr(&mut self, samples: &[i16], frames: usize) -> Chunk {
        let channels = self.header.channels as usize;
        let slot_samples = self.params.scale_factor_frames as usize * channels;
        let target = normalized_vbr_target(&self.params);
        let base = target as u8;

        let widths = self.assign_vbr_widths(samples, frames, target);

        let header_lms = self.lms.clone();
        let mut scale_factors = Vec::new();
        let mut residuals = vec![0u8; samples.len()];

        for (slot, slot_slice) in samples.chunks(slot_samples).enumerate() {
            for channel in 0..channels {
                let width = widths[slot * channels + channel];
                let tab = self.dqt.ensure(self.params.scale_factor_bits, width);
                let choice =
                    best_scale_factor(tab, &slot_slice[channel..], channels, &self.lms[channel]);
                self.lms[channel] = choice.lms;
                scale_factors.push(choice.scale_factor);
                interleave_codes(
                    &mut residuals[slot * slot_samples..],
                    &choice.codes,
                    channels,
                    channel,
                );
            }
        }

        Chunk {
            chunk_type: ChunkType::Vbr,
            scale_factor_bits: self.params.scale_factor_bits,
            scale_factor_frames: self.params.scale_factor_frames,
            residual_bits: base,
            frames,
            lms: header_lms,
            scale_factors,
            residual_widths: widths,
            residuals,
        }
    }

    // Analysis pass: rank every full scale-factor slot by the squared error
    // it accumulates one bit above the base width, then hand the widest
    // codes to the noisiest slots per the target distribution. Runs on
    // scratch predictor state so the committed state is untouched.
    fn assign_vbr_widths(&mut self, samples: &[i16], frames: usize, target: f32) -> Vec<u8> {
        let channels = self.header.channels as usize;
        let scale_factor_frames = self.params.scale_factor_frames as usize;
        let slot_samples = scale_factor_frames * channels;
        let base = target as u8;
        let probe = (base + 1).min(8);

        let mut scratch = self.lms.clone();
        let mut errors = Vec::with_capacity(frames.div_ceil(scale_factor_frames) * channels);
        for slot_slice in samples.chunks(slot_samples) {
            for channel in 0..channels {
                let tab = self.dqt.ensure(self.params.scale_factor_bits, probe);
                let choice =
                    best_scale_factor(tab, &slot_slice[channel..], channels, &scratch[channel]);
                errors.push(choice.cost);
                scratch[channel] = choice.lms;
            }
        }

        // a trailing partial slot would unbalance the chunk size; it always
        // keeps the base width
        let sortable = (frames / scale_factor_frames) * channels;
        let mut order: Vec<u32> = (0..sortable as u32).collect();
        order.sort_unstable_by_key(|&item| (errors[item as usize], item));

        let counts = width_distribution(sortable, target);
        let mut widths = vec![base; errors.len()];
        for &item in order.iter().take(counts[0]) {
            widths[item as usize] = (base - 1).max(1);
        }
        let plus = &order[sortable - counts[3] - counts[2]..];
        for &item in plus.iter().take(counts[2]) {
            widths[item as usize] = (base + 1).min(8);
        }
        for &item in &order[sortable - counts[3]..] {
            widths[item as usize] = (base + 2).min(8);
        }
        widths
    }
}

// Spread `codes` (one per frame of a slot) into the frame-major residual
// area of that slot.
fn interleave_codes(slot_residuals: &mut [u8], codes: &[u8], channels: usize, channel: usize) {
    for (frame, &code) in codes.iter().enumerate() {
        slot_residuals[frame * channels + channel] = code;
    }
}

struct SlotChoice {
    cost: u64,
    scale_factor: u8,
    codes: Vec<u8>,
    lms: LmsState,
}

/// Exhaustive scale-factor search over one slot of one channel.
///
/// `samples` is the interleaved slice starting at the channel's first
/// sample; every `stride`-th sample belongs to the channel. Ties keep the
/// smaller scale-factor index, so the output is platform-independent.
fn best_scale_factor(
    tab: &DequantTab,
    samples: &[i16],
    stride: usize,
    lms: &LmsState,
) -> SlotChoice {
    let mut best = SlotChoice {
        cost: u64::MAX,
        scale_factor: 0,
        codes: Vec::new(),
        lms: lms.clone(),
    };
    for scale_factor in 0..(1usize << tab.scale_factor_bits()) {
        if let Some(trial) = trial_scale_factor(tab, scale_factor, samples, stride, lms, best.cost)
        {
            if trial.cost < best.cost {
                best = trial;
            }
        }
    }
    best
}

// Quantize the slot against one dequantization row; gives up as soon as the
// accumulated error exceeds `budget`.
fn trial_scale_factor(
    tab: &DequantTab,
    scale_factor: usize,
    samples: &[i16],
    stride: usize,
    lms: &LmsState,
    budget: u64,
) -> Option<SlotChoice> {
    let row = tab.row(scale_factor);
    let mut trial = lms.clone();
    let mut cost = 0u64;
    let mut codes = Vec::with_capacity(samples.len() / stride + 1);

    for &sample in samples.iter().step_by(stride) {
        let sample = sample as i32;
        let predicted = trial.predict();
        let (code, dequantized) = nearest_code(row, sample - predicted);
        let reconstructed = clamp_i16(predicted + dequantized);

        let error = (sample - reconstructed as i32) as i64;
        cost += (error * error) as u64;
        if cost > budget {
            return None;
        }

        trial.update(reconstructed, dequantized);
        codes.push(code);
    }

    Some(SlotChoice {
        cost,
        scale_factor: scale_factor as u8,
        codes,
        lms: trial,
    })
}

// Code whose dequantized value lands closest to the target residual, ties
// to the smaller code. The row alternates +v/-v with magnitudes ascending,
// so only the matching sign can win (a cross-sign tie is impossible for a
// nonzero target) and the magnitude scan can stop at the first
// non-improvement.
fn nearest_code(row: &[i32], target: i32) -> (u8, i32) {
    let magnitude = (target as i64).abs();
    let half = row.len() / 2;

    let mut best_index = 0usize;
    let mut best_distance = (row[0] as i64 - magnitude).abs();
    for index in 1..half {
        let distance = (row[2 * index] as i64 - magnitude).abs();
        if distance < best_distance {
            best_distance = distance;
            best_index = index;
        } else {
            break;
        }
    }

    let code = if target < 0 {
        2 * best_index + 1
    } else {
        2 * best_index
    };
    (code as u8, row[code])
}

/// Bits per sample left for residual codes once the chunk header, LMS
/// state, scale factors, and width codes have taken their share, shifted
/// down by the width distribution's skew above its base.
pub(crate) fn normalized_vbr_target(params: &EncodeParams) -> f32 {
    let mut target = params.vbr_target_bps;
    target -= (LMS_WIRE_LEN as f32 * 8.0) / params.frames_per_chunk as f32;
    target -= params.scale_factor_bits as f32 / params.scale_factor_frames as f32;
    target -= 2.0 / params.scale_factor_frames as f32;

    let base = params.vbr_target_bps.floor();
    let skewed = TARGET_WIDTH_DISTRIBUTION[1] * (base - 1.0)
        + TARGET_WIDTH_DISTRIBUTION[2] * base
        + TARGET_WIDTH_DISTRIBUTION[3] * (base + 1.0)
        + TARGET_WIDTH_DISTRIBUTION[4] * (base + 2.0);
    target -= skewed - base;
    target
}

// How many slots get width base-1, base, base+1, base+2. Interpolates the
// distribution by the fractional part of the target, then floors shares
// over the remaining items until everything is assigned; the leftovers go
// to the base width.
fn width_distribution(items: usize, target: f32) -> [usize; 4] {
    let frac = target.fract();
    let om_frac = 1.0 - frac;

    let mut percentages = [0f32; 4];
    for i in 0..4 {
        percentages[i] =
            TARGET_WIDTH_DISTRIBUTION[i] * frac + TARGET_WIDTH_DISTRIBUTION[i + 1] * om_frac;
    }

    let mut res = [0usize; 4];
    let mut sum = 0usize;
    while sum < items {
        let remaining = items - sum;
        for i in 0..4 {
            let share = (remaining as f32 * percentages[i]) as usize;
            sum += share;
            res[i] += share;
        }
        if items - sum == remaining {
            sum += remaining;
            res[1] += remaining;
        }
    }
    res
}

/// Unpadded byte length of a full chunk under `params`, which becomes the
/// stream's fixed chunk size.
pub(crate) fn nominal_chunk_len(params: &EncodeParams, channels: usize) -> Result<usize> {
    let frames = params.frames_per_chunk as usize;
    let scale_factor_frames = params.scale_factor_frames as usize;

    let (residual_bits, vbr) = match params.mode {
        RateMode::Cbr => (params.residual_bits, false),
        RateMode::Vbr => (normalized_vbr_target(params) as u8, true),
    };
    let layout = ChunkLayout {
        channels,
        frames,
        scale_factor_bits: params.scale_factor_bits,
        scale_factor_frames,
        residual_bits,
        vbr,
    };

    let len = if vbr {
        // width counts are content-independent, so every full chunk packs
        // to the same size; lay the counts over full slots (partial slots
        // always stay at the base width)
        let target = normalized_vbr_target(params);
        let sortable = (frames / scale_factor_frames) * channels;
        let counts = width_distribution(sortable, target);
        let mut widths = vec![residual_bits; layout.sf_items()];
        let mut cursor = 0usize;
        for (delta, &count) in counts.iter().enumerate() {
            let width = (residual_bits as i32 + delta as i32 - 1).clamp(1, 8) as u8;
            widths[cursor..cursor + count].fill(width);
            cursor += count;
        }
        layout.total_len(&widths)
    } else {
        layout.total_len(&[])
    };

    if len > u16::MAX as usize {
        return Err(SeaError::ParamOutOfRange(format!(
            "chunk size {len} exceeds the 65535-byte limit"
        )));
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_code_prefers_smaller_code_on_ties() {
        // row values 1, 3: target 2 is equidistant, the smaller code wins
        let row = [1, -1, 3, -3];
        assert_eq!(nearest_code(&row, 2), (0, 1));
        assert_eq!(nearest_code(&row, -2), (1, -1));
        // zero target resolves to the positive smallest magnitude
        assert_eq!(nearest_code(&row, 0), (0, 1));
        assert_eq!(nearest_code(&row, 100), (2, 3));
        assert_eq!(nearest_code(&row, -100), (3, -3));
    }

    #[test]
    fn test_nearest_code_scans_full_rows() {
        let tab = DequantTab::new(4, 5);
        let row = tab.row(7);
        for target in [-30000i32, -500, -3, 0, 1, 250, 32000] {
            let (code, dequantized) = nearest_code(row, target);
            let expected = row
                .iter()
                .enumerate()
                .min_by_key(|&(q, &v)| ((v as i64 - target as i64).abs(), q))
                .map(|(q, &v)| (q as u8, v))
                .unwrap();
            assert_eq!((code, dequantized), expected, "target {target}");
        }
    }

    #[test]
    fn test_width_distribution_sums_to_items() {
        for items in [0usize, 1, 7, 64, 513, 4410] {
            for target in [2.0f32, 3.625, 4.9, 7.99] {
                let counts = width_distribution(items, target);
                // every slot lands in exactly one width class
                assert_eq!(counts.iter().sum::<usize>(), items);
            }
        }
    }

    #[test]
    fn test_normalized_target_accounts_for_overheads() {
        let params = EncodeParams {
            mode: RateMode::Vbr,
            vbr_target_bps: 4.0,
            ..EncodeParams::default()
        };
        let target = normalized_vbr_target(&params);
        // 4.0 - 128/5120 - 4/20 - 2/20 - 0.05
        assert!((target - 3.625).abs() < 1e-4);
    }

    #[test]
    fn test_cbr_chunk_len_formula() {
        let params = EncodeParams::default();
        // mono: 4 + 16 + ceil(256*4/8) + ceil(5120*3/8)
        assert_eq!(nominal_chunk_len(&params, 1).unwrap(), 4 + 16 + 128 + 1920);
        // stereo doubles the lms, scale factor, and residual shares
        assert_eq!(
            nominal_chunk_len(&params, 2).unwrap(),
            4 + 32 + 256 + 3840
        );
    }

    #[test]
    fn test_chunk_len_rejects_overflow() {
        let params = EncodeParams {
            residual_bits: 8,
            frames_per_chunk: 65535,
            ..EncodeParams::default()
        };
        assert!(matches!(
            nominal_chunk_len(&params, 2),
            Err(SeaError::ParamOutOfRange(_))
        ));
    }

    #[test]
    fn test_encoder_is_deterministic() {
        let samples: Vec<i16> = (0..4000)
            .map(|i| ((i as f32 * 0.05).sin() * 12000.0) as i16)
            .collect();
        let params = EncodeParams {
            frames_per_chunk: 1024,
            ..EncodeParams::default()
        };
        let encode = || {
            let mut encoder =
                SeaEncoder::new(Vec::new(), 44100, 1, Some(4000), params.clone(), "").unwrap();
            encoder.encode_samples(&samples).unwrap();
            encoder.finalize().unwrap()
        };
        assert_eq!(encode(), encode());
    }
}
