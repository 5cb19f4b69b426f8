use std::ops::Range;

use crate::config::TvControls;
use crate::dsp::{LumaFilter, NarrowChromaFilter, WideChromaFilter, Yiq};
use crate::signal::BLACK_LEVEL;

/// Burst power above which a line is decoded in color.
pub const COLORBURST_THRESHOLD: f64 = 2.8;

#[derive(Debug, Clone, Copy)]
pub struct DemodSettings {
    pub agc: f64,
    pub brightness: f64,
    pub color: f64,
    pub tint_i: f64,
    pub tint_q: f64,
}

impl DemodSettings {
    pub fn new(agc: f64, controls: &TvControls) -> Self {
        let tint = (103.0 + controls.tint).to_radians();
        Self {
            agc,
            brightness: controls.brightness,
            color: controls.color,
            tint_i: -tint.cos(),
            tint_q: tint.sin(),
        }
    }
}

/// In-phase and quadrature burst amplitude of a line, given the phase of
/// the line's first sample.
pub fn burst_components(cb_phase: &[f64; 4], phase_corr: usize) -> (f64, f64) {
    let cb = |k: usize| cb_phase[(k + phase_corr) & 3];
    let cb_i = (cb(2) - cb(0)) / 16.0;
    let cb_q = (cb(3) - cb(1)) / 16.0;
    (cb_i, cb_q)
}

pub fn is_color_burst(power: f64) -> bool {
    power > COLORBURST_THRESHOLD
}

/// Decode `signal[range]` into `out[range]`.
///
/// `signal` starts at the line's first picture sample, whose absolute
/// position in the frame is `phase_corr` modulo 4. Returns whether the line
/// carried colorburst; monochrome lines get zero chroma.
pub fn demodulate(
    signal: &[f32],
    phase_corr: usize,
    cb_phase: &[f64; 4],
    settings: &DemodSettings,
    range: Range<usize>,
    out: &mut [Yiq],
) -> bool {
    assert!(range.end <= out.len() && range.end <= signal.len());

    let brightadd = settings.brightness * 100.0 - f64::from(BLACK_LEVEL);
    let mut luma = LumaFilter::new(settings.agc);
    for (yiq, &s) in out[range.clone()].iter_mut().zip(&signal[range.clone()]) {
        yiq.y = (luma.process(f64::from(s)) + brightadd) as f32;
    }

    let (cb_i, cb_q) = burst_components(cb_phase, phase_corr);
    let colormode = is_color_burst(cb_i * cb_i + cb_q * cb_q);

    if colormode {
        let (ti, tq) = (settings.tint_i, settings.tint_q);
        let m0 = (cb_i * ti - cb_q * tq) * settings.color;
        let m1 = (cb_q * ti + cb_i * tq) * settings.color;
        let multiq2 = [m0, m1, -m0, -m1];

        let mut ifilt = WideChromaFilter::new();
        let mut qfilt = NarrowChromaFilter::new();
        for i in range {
            let sig = f64::from(signal[i]);
            out[i].i = ifilt.process(sig * multiq2[i & 3]) as f32;
            out[i].q = qfilt.process(sig * multiq2[(i + 3) & 3]) as f32;
        }
    } else {
        for yiq in &mut out[range] {
            yiq.i = 0.0;
            yiq.q = 0.0;
        }
    }

    colormode
}
