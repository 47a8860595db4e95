//! Four-tap sign-sign LMS predictor.

/// Number of predictor taps per channel.
pub const LMS_TAPS: usize = 4;

/// Serialized size of one channel's predictor state: history and weights,
/// each stored as four little-endian `i16`.
pub const LMS_WIRE_LEN: usize = LMS_TAPS * 2 * 2;

/// Clamp a widened sample back into the 16-bit range.
#[inline(always)]
pub fn clamp_i16(v: i32) -> i16 {
    v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Per-channel adaptive predictor state.
///
/// The history holds the last four reconstructed samples, oldest first.
/// Weights adapt by the sign of each history sample scaled by the residual
/// magnitude, so encoder and decoder stay in lockstep without transmitting
/// coefficients.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LmsState {
    history: [i32; LMS_TAPS],
    weights: [i32; LMS_TAPS],
}

impl LmsState {
    /// Fresh all-zero state, the start-of-stream condition.
    pub fn new() -> Self {
        Self::default()
    }

    /// One zeroed state per channel.
    pub fn init_vec(channels: usize) -> Vec<LmsState> {
        vec![Self::new(); channels]
    }

    /// Predicted next sample: the weighted history sum, scaled down by 2^13.
    #[inline(always)]
    pub fn predict(&self) -> i32 {
        let mut acc: i64 = 0;
        for i in 0..LMS_TAPS {
            acc += self.weights[i] as i64 * self.history[i] as i64;
        }
        (acc >> 13) as i32
    }

    /// Nudge each weight by the dequantized residual sign-matched against
    /// its history sample, then shift the reconstructed sample in.
    #[inline(always)]
    pub fn update(&mut self, reconstructed: i16, dequantized: i32) {
        let delta = dequantized >> 4;
        for i in 0..LMS_TAPS {
            self.weights[i] += if self.history[i] < 0 { -delta } else { delta };
        }
        for i in 0..LMS_TAPS - 1 {
            self.history[i] = self.history[i + 1];
        }
        self.history[LMS_TAPS - 1] = reconstructed as i32;
    }

    /// Wire form: history then weights, each clamped to `i16` little-endian.
    pub fn to_bytes(&self) -> [u8; LMS_WIRE_LEN] {
        let mut out = [0u8; LMS_WIRE_LEN];
        for (i, &v) in self.history.iter().chain(self.weights.iter()).enumerate() {
            let v = clamp_i16(v);
            out[i * 2..i * 2 + 2].copy_from_slice(&v.to_le_bytes());
        }
        out
    }

    /// Restore state from its wire form.
    pub fn from_bytes(bytes: &[u8; LMS_WIRE_LEN]) -> Self {
        let mut values = [0i32; LMS_TAPS * 2];
        for (i, v) in values.iter_mut().enumerate() {
            *v = i16::from_le_bytes([bytes[i * 2], bytes[i * 2 + 1]]) as i32;
        }
        let mut history = [0i32; LMS_TAPS];
        let mut weights = [0i32; LMS_TAPS];
        history.copy_from_slice(&values[..LMS_TAPS]);
        weights.copy_from_slice(&values[LMS_TAPS..]);
        Self { history, weights }
    }

    /// Snap the state through its wire form.
    ///
    /// The encoder applies this at every chunk boundary so the state it
    /// keeps selecting residuals against is exactly the state a decoder
    /// restores from the chunk header, even if a weight has drifted past
    /// the i16 wire range.
    pub fn saturate_to_wire(&mut self) {
        *self = Self::from_bytes(&self.to_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predict_golden() {
        let lms = LmsState {
            history: [100, -200, 300, 32767],
            weights: [-16, 100, -30, 500],
        };
        // (100*-16 - 200*100 + 300*-30 + 32767*500) >> 13
        assert_eq!(lms.predict(), 1996);
    }

    #[test]
    fn test_update_golden() {
        let mut lms = LmsState {
            history: [100, -200, 300, 32767],
            weights: [-16, 100, -30, 500],
        };
        lms.update(12345, 1000);
        // delta = 1000 >> 4 = 62, sign-matched against the old history
        assert_eq!(lms.weights, [46, 38, 32, 562]);
        assert_eq!(lms.history, [-200, 300, 32767, 12345]);
    }

    #[test]
    fn test_update_negative_delta_is_arithmetic() {
        let mut lms = LmsState {
            history: [1, -1, 0, 0],
            weights: [0, 0, 0, 0],
        };
        // -1000 >> 4 = -63 (arithmetic shift), history 0 counts as non-negative
        lms.update(-5, -1000);
        assert_eq!(lms.weights, [-63, 63, -63, -63]);
        assert_eq!(lms.history, [-1, 0, 0, -5]);
    }

    #[test]
    fn test_zero_is_a_fixed_point_of_prediction() {
        let mut lms = LmsState::new();
        assert_eq!(lms.predict(), 0);
        // small dequantized values leave the weights untouched
        lms.update(1, 1);
        assert_eq!(lms.predict(), 0);
    }

    #[test]
    fn test_wire_roundtrip() {
        let mut lms = LmsState {
            history: [-1, 2, -3, 4],
            weights: [500, -600, 700, -32768],
        };
        let restored = LmsState::from_bytes(&lms.to_bytes());
        assert_eq!(restored, lms);

        // out-of-range weights saturate on the wire
        lms.weights[0] = 40000;
        lms.saturate_to_wire();
        assert_eq!(lms.weights[0], 32767);
    }
}
