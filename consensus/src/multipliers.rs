//! Fixed-size ring of recent active-difficulty multipliers.

/// Number of samples the trended multiplier averages over.
pub const MULTIPLIER_SAMPLES: usize = 20;

/// A circular buffer of multiplier samples, initialised to the base
/// multiplier `1.0`, whose average is the trended multiplier.
#[derive(Clone, Debug, PartialEq)]
pub struct MultiplierRing {
    samples: [f64; MULTIPLIER_SAMPLES],
    next: usize,
}

impl Default for MultiplierRing {
    fn default() -> Self {
        Self {
            samples: [1.0; MULTIPLIER_SAMPLES],
            next: 0,
        }
    }
}

impl MultiplierRing {
    /// Overwrite the oldest sample.
    pub fn push(&mut self, multiplier: f64) {
        self.samples[self.next] = multiplier;
        self.next = (self.next + 1) % MULTIPLIER_SAMPLES;
    }

    pub fn average(&self) -> f64 {
        self.samples.iter().sum::<f64>() / MULTIPLIER_SAMPLES as f64
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_base() {
        assert_eq!(MultiplierRing::default().average(), 1.0);
    }

    #[test]
    fn one_sample_moves_average_by_its_share() {
        let mut ring = MultiplierRing::default();
        ring.push(21.0);
        assert!((ring.average() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn full_rotation_replaces_every_sample() {
        let mut ring = MultiplierRing::default();
        for _ in 0..MULTIPLIER_SAMPLES {
            ring.push(3.0);
        }
        assert!((ring.average() - 3.0).abs() < 1e-9);
        ring.push(1.0);
        assert!(ring.average() < 3.0);
    }
}
