use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::input::Input;
use crate::signal::{GHOSTFIR_LEN, SIGNAL_LEN};

/// One signal arriving at the antenna: a source plus the path it took.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reception {
    /// Sample offset into the source frame.
    pub offset: f64,
    /// Offset drift per frame, for stations slightly off frequency.
    pub freq_error: f64,
    pub level: f64,
    pub hf_loss: f64,
    pub multipath: f64,
    pub ghost_fir: [f64; GHOSTFIR_LEN],
    pub ghost_fir2: [f64; GHOSTFIR_LEN],
}

impl Default for Reception {
    fn default() -> Self {
        Self {
            offset: 0.0,
            freq_error: 0.0,
            level: 1.0,
            hf_loss: 0.0,
            multipath: 0.0,
            ghost_fir: [0.0; GHOSTFIR_LEN],
            ghost_fir2: [0.0; GHOSTFIR_LEN],
        }
    }
}

impl Reception {
    pub fn with_level(level: f64) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    /// Evolve the ghost filter by one frame. With multipath the echo
    /// random-walks; without it the filter holds a faint fixed reflection.
    pub fn update<R: Rng>(&mut self, rng: &mut R) {
        if self.multipath > 0.0 {
            for g in &mut self.ghost_fir2 {
                *g += -(*g / 16.0) + self.multipath * (rng.gen_range(0.0..0.02) - 0.01);
            }
            if rng.gen_range(0..20) == 0 {
                let tap = rng.gen_range(0..GHOSTFIR_LEN);
                self.ghost_fir2[tap] = self.multipath * (rng.gen_range(0.0..0.08) - 0.04);
            }
            for (g, g2) in self.ghost_fir.iter_mut().zip(&self.ghost_fir2) {
                *g = 0.8 * *g + 0.2 * g2;
            }
        } else {
            for (i, g) in self.ghost_fir.iter_mut().enumerate() {
                *g = if i >= GHOSTFIR_LEN / 2 {
                    (if i & 1 == 1 { 0.04 } else { -0.08 }) / GHOSTFIR_LEN as f64
                } else {
                    0.0
                };
            }
        }
    }

    pub fn advance(&mut self) {
        self.offset += self.freq_error;
    }

    /// Read position in the source for sample 0 of the frame.
    pub fn start_sample(&self) -> usize {
        (self.offset as i64).rem_euclid(SIGNAL_LEN as i64) as usize
    }

    /// Echo energy added to the received level.
    pub fn ghost_gain(&self) -> f64 {
        self.ghost_fir.iter().sum()
    }
}

/// A reception paired with the source it is tuned to, for one frame.
#[derive(Debug, Clone, Copy)]
pub struct Feed<'a> {
    pub input: &'a Input,
    pub reception: &'a Reception,
}

impl<'a> Feed<'a> {
    pub fn new(input: &'a Input, reception: &'a Reception) -> Self {
        Self { input, reception }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn quiet_reception_gets_fixed_reflection() {
        let mut rec = Reception::default();
        rec.update(&mut SmallRng::seed_from_u64(1));
        assert_eq!(rec.ghost_fir, [0.0, 0.0, -0.02, 0.01]);
    }

    #[test]
    fn multipath_ghost_stays_small() {
        let mut rec = Reception {
            multipath: 1.0,
            ..Reception::default()
        };
        let mut rng = SmallRng::seed_from_u64(9);
        for _ in 0..500 {
            rec.update(&mut rng);
        }
        assert!(rec.ghost_fir.iter().all(|g| g.abs() < 0.2));
        assert!(rec.ghost_fir.iter().any(|&g| g != 0.0));
    }

    #[test]
    fn negative_offsets_wrap() {
        let rec = Reception {
            offset: -4.0,
            ..Reception::default()
        };
        assert_eq!(rec.start_sample(), SIGNAL_LEN - 4);
    }
}
