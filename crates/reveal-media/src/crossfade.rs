//! Triangular crossfade schedule.
//!
//! The weight at position `i` is the distance to the nearest cycle boundary,
//! normalised by half a cycle: it rises linearly from 0 to 1 over the first
//! half of every cycle and falls back to 0 over the second half.
//!
//! With an odd `frames_per_cycle` the peak falls between two positions, so
//! the wave never reaches exactly 1 and the two halves differ by one frame.
//! That asymmetry is accepted as a rounding artifact.

use crate::error::{MediaError, MediaResult};

/// Blend weight for position `i` with period `frames_per_cycle`.
///
/// Callers go through [`CrossfadeSchedule`], which rejects a zero period.
pub(crate) fn crossfade_weight(i: u64, frames_per_cycle: u64) -> f64 {
    let rising = i % frames_per_cycle;
    let falling = (frames_per_cycle - rising) % frames_per_cycle;
    rising.min(falling) as f64 / (frames_per_cycle as f64 / 2.0)
}

/// Crossfade schedule over an aligned run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossfadeSchedule {
    frames_per_cycle: u64,
}

impl CrossfadeSchedule {
    pub fn new(frames_per_cycle: u64) -> MediaResult<Self> {
        if frames_per_cycle == 0 {
            return Err(MediaError::invalid_parameter(
                "frames per cycle must be positive",
            ));
        }
        Ok(Self { frames_per_cycle })
    }

    pub fn frames_per_cycle(&self) -> u64 {
        self.frames_per_cycle
    }

    /// Weight of the second frame at a zero-based run position.
    pub fn weight(&self, position: usize) -> f64 {
        crossfade_weight(position as u64, self.frames_per_cycle)
    }

    /// Weights for the first `len` positions.
    pub fn weights(&self, len: usize) -> Vec<f64> {
        (0..len).map(|i| self.weight(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn test_ten_frame_cycle() {
        let schedule = CrossfadeSchedule::new(10).unwrap();
        assert_close(
            &schedule.weights(10),
            &[0.0, 0.2, 0.4, 0.6, 0.8, 1.0, 0.8, 0.6, 0.4, 0.2],
        );
    }

    #[test]
    fn test_periodic_and_bounded() {
        for n in [1u64, 2, 3, 7, 10, 60, 600] {
            for i in 0..(3 * n) {
                let w = crossfade_weight(i, n);
                assert!((0.0..=1.0).contains(&w), "weight({}, {}) = {}", i, n, w);
                assert!((w - crossfade_weight(i + n, n)).abs() < 1e-12);
            }
            assert_eq!(crossfade_weight(0, n), 0.0);
        }
    }

    #[test]
    fn test_peak_at_half_cycle() {
        for n in [2u64, 4, 10, 600] {
            assert!((crossfade_weight(n / 2, n) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_odd_cycle_never_peaks() {
        let weights = CrossfadeSchedule::new(5).unwrap().weights(5);
        assert_close(&weights, &[0.0, 0.4, 0.8, 0.8, 0.4]);
    }

    #[test]
    fn test_zero_cycle_rejected() {
        let err = CrossfadeSchedule::new(0).unwrap_err();
        assert!(matches!(err, MediaError::InvalidParameter(_)));
        assert_eq!(CrossfadeSchedule::new(1).unwrap().weights(3), vec![0.0; 3]);
    }
}
