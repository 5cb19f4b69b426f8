//! Software sync separation.
//!
//! A real set locks free-running oscillators onto the incoming sync pulses.
//! Each search below advances an oscillator ramp across a small window and
//! stops where the ramp first exceeds a threshold lowered by the AGC-scaled
//! signal. Deep sync pulls the threshold down early; without it the ramp
//! fires late every frame and the picture rolls.

use tracing::trace;

use crate::signal::{SignalBuffer, CB_START, H, PIC_START, V};

pub const VSYNC_OSC_THRESHOLD: f64 = 1.05;
pub const VSYNC_NOISE_GAIN: f64 = 0.0002;
pub const HSYNC_OSC_THRESHOLD: f64 = 1.005;
pub const HSYNC_NOISE_GAIN: f64 = 0.0001;

const VSYNC_WINDOW: i64 = 32;
const HSYNC_WINDOW: i64 = 8;
const CB_SETTLE_LINES: usize = 15;
const CB_SMOOTHING: f64 = 1.0 / 128.0;

/// Per-line timing recovered for one frame.
#[derive(Debug, Clone)]
pub struct LineTiming {
    /// Offset of the first picture sample within the line.
    pub hsync: Vec<usize>,
    /// Normalized colorburst reference at the four subcarrier phases.
    pub cb_phase: Vec<[f64; 4]>,
}

impl Default for LineTiming {
    fn default() -> Self {
        Self {
            hsync: vec![PIC_START; V],
            cb_phase: vec![[0.0; 4]; V],
        }
    }
}

/// Oscillator state carried from frame to frame.
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    pub cur_hsync: usize,
    pub cur_vsync: usize,
    cb_phase: [f64; 4],
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recover(&mut self, signal: &SignalBuffer, agc: f64, timing: &mut LineTiming) {
        let sp = signal.samples();

        self.cur_vsync = self.search_vsync(sp, agc);

        for lineno in 0..V {
            if lineno > 5 && lineno < V - 3 {
                self.cur_hsync = self.search_hsync(sp, lineno, agc);
            }

            timing.hsync[lineno] = (self.cur_hsync + PIC_START) % H;

            if lineno > CB_SETTLE_LINES {
                let row = (lineno + self.cur_vsync) % V;
                let base = row * H + (self.cur_hsync & !3);
                for i in CB_START + 8..CB_START + 36 - 8 {
                    let phase = &mut self.cb_phase[i & 3];
                    *phase = *phase * (1.0 - CB_SMOOTHING)
                        + f64::from(sp[base + i]) * agc * CB_SMOOTHING;
                }
            }

            let tot = 0.1 + self.cb_phase.iter().map(|c| c * c).sum::<f64>();
            let gain = 32.0 / tot.sqrt();
            timing.cb_phase[lineno] = self.cb_phase.map(|c| c * gain);
        }

        trace!(hsync = self.cur_hsync, vsync = self.cur_vsync, "sync recovered");
    }

    fn search_vsync(&self, sp: &[f32], agc: f64) -> usize {
        let mut i = -VSYNC_WINDOW;
        while i < VSYNC_WINDOW {
            let lineno = wrap(self.cur_vsync as i64 + i, V);
            let line = &sp[lineno * H..(lineno + 1) * H];
            let filt: f64 = line.iter().step_by(H / 16).map(|&s| f64::from(s)).sum::<f64>() * agc;

            let osc = (V as i64 + i) as f64 / V as f64;
            if osc >= VSYNC_OSC_THRESHOLD + VSYNC_NOISE_GAIN * filt {
                break;
            }
            i += 1;
        }
        wrap(self.cur_vsync as i64 + i, V)
    }

    fn search_hsync(&self, sp: &[f32], lineno: usize, agc: f64) -> usize {
        // Row 0 is read through its mirror so the window can reach back
        // into the previous line.
        let mut row = (lineno + self.cur_vsync) % V;
        if row == 0 {
            row = V;
        }
        let base = (row * H + self.cur_hsync) as i64;

        let mut i = -HSYNC_WINDOW;
        while i < HSYNC_WINDOW {
            let at = (base + i) as usize;
            let filt = sp[at - 3..=at].iter().map(|&s| f64::from(s)).sum::<f64>() * agc;

            let osc = (H as i64 + i) as f64 / H as f64;
            if osc >= HSYNC_OSC_THRESHOLD + HSYNC_NOISE_GAIN * filt {
                break;
            }
            i += 1;
        }
        wrap(self.cur_hsync as i64 + i, H)
    }
}

fn wrap(value: i64, modulus: usize) -> usize {
    value.rem_euclid(modulus as i64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Input;
    use crate::signal::{fold_subtotals, SIGNAL_LEN};

    fn received(input: &Input) -> SignalBuffer {
        let mut buffer = SignalBuffer::new();
        {
            let (samples, totals) = buffer.frame_mut();
            for (dst, &src) in samples.iter_mut().zip(&input.samples()[..SIGNAL_LEN]) {
                *dst = f32::from(src);
            }
            fold_subtotals(samples, totals);
        }
        buffer.wrap();
        buffer
    }

    #[test]
    fn locks_onto_clean_sync() {
        let mut input = Input::new();
        input.setup_sync(true, false);
        let buffer = received(&input);

        let mut sync = SyncState::new();
        let mut timing = LineTiming::default();
        for _ in 0..3 {
            sync.recover(&buffer, 1.0, &mut timing);
        }
        assert_eq!(sync.cur_vsync, 3);
        assert_eq!(sync.cur_hsync, 1);
        assert_eq!(timing.hsync[100], PIC_START + 1);

        let cb = timing.cb_phase[200];
        assert!(cb[0] > 20.0 && cb[2] < -20.0, "burst phase {cb:?}");
        assert!(cb[1].abs() < 1.0 && cb[3].abs() < 1.0);
    }

    #[test]
    fn missing_sync_rolls() {
        let buffer = SignalBuffer::new();
        let mut sync = SyncState::new();
        let mut timing = LineTiming::default();
        sync.recover(&buffer, 1.0, &mut timing);
        assert_eq!(sync.cur_vsync, 14);
        sync.recover(&buffer, 1.0, &mut timing);
        assert_eq!(sync.cur_vsync, 28);
    }
}
