use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::surface::PixelFormat;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TvControls {
    /// Extra chroma demodulation phase, in degrees.
    pub tint: f64,
    pub color: f64,
    pub brightness: f64,
    pub contrast: f64,
    pub height: f64,
    pub width: f64,
    pub squish: f64,
    /// Seconds since the set was switched on. Ramps settle after a few seconds.
    pub powerup: f64,
    pub horiz_desync: f64,
    pub squeeze_bottom: f64,
    pub flutter_horiz_desync: bool,
}

impl Default for TvControls {
    fn default() -> Self {
        Self {
            tint: 5.0,
            color: 0.70,
            brightness: 0.02,
            contrast: 1.5,
            height: 1.0,
            width: 1.0,
            squish: 0.0,
            powerup: 1000.0,
            horiz_desync: 0.0,
            squeeze_bottom: 0.0,
            flutter_horiz_desync: false,
        }
    }
}

impl TvControls {
    /// Pick the per-set horizontal desync and bottom squeeze the way a
    /// worn chassis would have them.
    pub fn randomize_desync<R: Rng>(&mut self, rng: &mut R) {
        self.horiz_desync = rng.gen_range(0.0..10.0) - 5.0;
        self.squeeze_bottom = rng.gen_range(0.0..5.0) - 1.0;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads; `None` uses the available hardware parallelism.
    pub threads: Option<usize>,
    pub seed: u64,
    /// Render through an indexed palette instead of direct RGB.
    pub use_cmap: bool,
    pub pixel_format: PixelFormat,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: None,
            seed: 0x5eed_7e1e,
            use_cmap: false,
            pixel_format: PixelFormat::rgba32(),
        }
    }
}
