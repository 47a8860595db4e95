//! Dequantization tables.
//!
//! A table is fully determined by `(scale_factor_bits, residual_bits)` and
//! is shared verbatim by the encoder and the decoder, so its construction
//! must be bit-for-bit reproducible: all arithmetic is IEEE-754 `f32`, the
//! scale-factor cast truncates toward zero, and the final rounding is
//! half-away-from-zero.

use std::collections::HashMap;

// Exponents for the scale-factor curve, indexed by residual_bits - 1.
// Tuned experimentally over a diverse corpus; the curve must cover the full
// 16-bit residual range at every width.
pub const IDEAL_POW_FACTOR: [f32; 8] = [12.0, 11.65, 11.20, 10.58, 9.64, 8.75, 7.66, 6.63];

/// Dequantization table for one `(scale_factor_bits, residual_bits)` pair.
///
/// Row `s` maps a residual code to a signed residual value; codes alternate
/// `+v, -v` with magnitudes growing along the row, so code `2q` dequantizes
/// to `+v_q` and code `2q+1` to `-v_q`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DequantTab {
    scale_factor_bits: u8,
    residual_bits: u8,
    scale_factors: Vec<i32>,
    rows: Vec<Vec<i32>>,
}

impl DequantTab {
    /// Build the table for `scale_factor_bits` (1..=15) and
    /// `residual_bits` (1..=8).
    pub fn new(scale_factor_bits: u8, residual_bits: u8) -> Self {
        debug_assert!((1..=15).contains(&scale_factor_bits));
        debug_assert!((1..=8).contains(&residual_bits));

        let scale_factors = Self::build_scale_factors(scale_factor_bits, residual_bits);
        let levels = Self::base_levels(residual_bits);

        let rows = scale_factors
            .iter()
            .map(|&sf| {
                let mut row = Vec::with_capacity(levels.len() * 2);
                for &level in &levels {
                    let val = (sf as f32 * level).round() as i32;
                    row.push(val);
                    row.push(-val);
                }
                row
            })
            .collect();

        Self {
            scale_factor_bits,
            residual_bits,
            scale_factors,
            rows,
        }
    }

    fn build_scale_factors(scale_factor_bits: u8, residual_bits: u8) -> Vec<i32> {
        let power_factor =
            IDEAL_POW_FACTOR[residual_bits as usize - 1] / scale_factor_bits as f32;
        (1..=(1usize << scale_factor_bits))
            .map(|index| (index as f32).powf(power_factor) as i32)
            .collect()
    }

    // The two narrowest widths use hand-tuned levels; wider tables spread
    // evenly over the representable range with a fixed integer step.
    fn base_levels(residual_bits: u8) -> Vec<f32> {
        match residual_bits {
            1 => vec![2.0],
            2 => vec![1.115, 4.0],
            _ => {
                let half = 1usize << (residual_bits - 1);
                let start = 0.75f32;
                let end = ((1u32 << residual_bits) - 1) as f32;
                let step = ((end - start) / (half - 1) as f32).floor();

                let mut levels = vec![0.0f32; half];
                for (i, level) in levels.iter_mut().enumerate().skip(1) {
                    *level = 0.5 + i as f32 * step;
                }
                levels[0] = start;
                levels[half - 1] = end;
                levels
            }
        }
    }

    /// Scale-factor bit width this table was built for.
    pub fn scale_factor_bits(&self) -> u8 {
        self.scale_factor_bits
    }

    /// Residual bit width this table was built for.
    pub fn residual_bits(&self) -> u8 {
        self.residual_bits
    }

    /// The gain applied at scale-factor index `index`.
    pub fn scale_factor(&self, index: usize) -> i32 {
        self.scale_factors[index]
    }

    /// Dequantization row for scale-factor index `index`; `2^residual_bits`
    /// entries.
    pub fn row(&self, index: usize) -> &[i32] {
        &self.rows[index]
    }
}

/// Memoising table cache keyed by `(scale_factor_bits, residual_bits)`.
///
/// Owned by each encoder or decoder instance; there is no process-wide
/// table state.
#[derive(Debug, Default)]
pub struct DqtCache {
    tabs: HashMap<(u8, u8), DequantTab>,
}

impl DqtCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table for the pair, building it on first use.
    pub fn ensure(&mut self, scale_factor_bits: u8, residual_bits: u8) -> &DequantTab {
        self.tabs
            .entry((scale_factor_bits, residual_bits))
            .or_insert_with(|| DequantTab::new(scale_factor_bits, residual_bits))
    }
}
