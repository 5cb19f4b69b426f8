//! Pre-rendered composite sources. Mutation goes through an [`InputEdit`]
//! guard that restores the mirrored tail lines when dropped.

use std::ops::{Deref, DerefMut};

use rand::Rng;
use tracing::debug;

use crate::error::{Result, TvError};
use crate::signal::{
    BLACK_LEVEL, BLANK_LEVEL, BP_START, CB_LEVEL, CB_START, FP_START, H, PIC_END, PIC_LEN,
    PIC_START, SIGNAL_LEN, SYNC_LEVEL, TOP, V, VISLINES, VIS_LEN, VIS_START, WHITE_LEVEL,
    WRAP_LINES,
};

const ROWS: usize = V + WRAP_LINES;

/// Lines of vertical overscan above and below the picture when encoding.
const Y_OVERSCAN: usize = 5;

#[derive(Debug, Clone)]
pub struct Input {
    signal: Vec<i8>,
}

impl Default for Input {
    fn default() -> Self {
        Self::new()
    }
}

impl Input {
    pub fn new() -> Self {
        Self {
            signal: vec![0; ROWS * H],
        }
    }

    /// The whole sample array including the mirrored tail.
    pub fn samples(&self) -> &[i8] {
        &self.signal
    }

    pub fn line(&self, lineno: usize) -> &[i8] {
        &self.signal[lineno * H..(lineno + 1) * H]
    }

    pub fn is_wrapped(&self) -> bool {
        self.signal[..WRAP_LINES * H] == self.signal[SIGNAL_LEN..]
    }

    pub fn edit(&mut self) -> InputEdit<'_> {
        InputEdit { input: self }
    }

    fn wrap(&mut self) {
        self.signal.copy_within(..WRAP_LINES * H, SIGNAL_LEN);
    }

    /// Lay down sync pulses, blanking and black level on every line, with
    /// optional colorburst. `ssavi` draws sync at white level, the way
    /// scrambled pay channels did.
    pub fn setup_sync(&mut self, colorburst: bool, ssavi: bool) {
        let synclevel = if ssavi { WHITE_LEVEL } else { SYNC_LEVEL } as i8;
        let mut edit = self.edit();

        for lineno in 0..V {
            let vsync = (3..7).contains(&lineno);
            let sig = edit.line_mut(lineno);

            if vsync {
                sig[..BP_START].fill(BLANK_LEVEL as i8);
                sig[BP_START..].fill(synclevel);
            } else {
                sig[..BP_START].fill(synclevel);
                sig[BP_START..PIC_START].fill(BLANK_LEVEL as i8);
                sig[PIC_START..FP_START].fill(BLACK_LEVEL as i8);
                sig[FP_START..].fill(BLANK_LEVEL as i8);
            }

            if colorburst {
                // 9 cycles
                for i in (CB_START..CB_START + 36).step_by(4) {
                    sig[i + 1] += CB_LEVEL as i8;
                    sig[i + 3] -= CB_LEVEL as i8;
                }
            }
        }
    }

    /// Random white/black cells in the vertical interval, where broadcast
    /// teletext lived.
    pub fn setup_teletext<R: Rng>(&mut self, rng: &mut R) {
        let mut edit = self.edit();
        let mut level = BLACK_LEVEL as i8;
        for lineno in 19..22 {
            let sig = edit.line_mut(lineno);
            for (x, sample) in sig.iter_mut().enumerate().take(PIC_END).skip(PIC_START) {
                if x & 7 == 0 {
                    level = if rng.gen::<bool>() { WHITE_LEVEL } else { BLACK_LEVEL } as i8;
                }
                *sample = level;
            }
        }
    }

    /// Fill a rectangle of samples with a repeating 4-phase pattern.
    /// Rectangles are at least one subcarrier cycle wide and one line tall.
    pub fn draw_solid(&mut self, left: usize, right: usize, top: usize, bot: usize, ntsc: [i8; 4]) {
        let right = right.max(left + 4).min(H);
        let bot = bot.max(top + 1).min(V);
        let mut edit = self.edit();
        for y in top..bot {
            let sig = edit.line_mut(y);
            for x in left..right {
                sig[x] = ntsc[x & 3];
            }
        }
    }

    /// [`draw_solid`](Self::draw_solid) in coordinates relative to the
    /// visible area, with the color given as luma, chroma and phase.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_solid_rel_lcp(
        &mut self,
        left: f64,
        right: f64,
        top: f64,
        bot: f64,
        luma: f64,
        chroma: f64,
        phase: f64,
    ) {
        let topi = (TOP as f64 + VISLINES as f64 * top) as usize;
        let boti = (TOP as f64 + VISLINES as f64 * bot) as usize;
        let lefti = (VIS_START as f64 + VIS_LEN as f64 * left) as usize;
        let righti = (VIS_START as f64 + VIS_LEN as f64 * right) as usize;
        self.draw_solid(lefti, righti, topi, boti, lcp_to_ntsc(luma, chroma, phase));
    }

    /// Encode an RGB picture the way a studio camera would: matrix to YIQ,
    /// band-limit each component, modulate the chroma and write the result
    /// over the picture area of every visible line.
    pub fn load_rgb(&mut self, image: &RgbImage<'_>) -> Result<()> {
        image.validate()?;
        debug!(width = image.width, height = image.height, "encoding source image");

        let multiq: Vec<i64> = (0..PIC_LEN + 4)
            .map(|i| {
                let phase = 90.0 - 90.0 * i as f64;
                (-((phase - 303.0).to_radians()).cos() * 4096.0) as i64
            })
            .collect();

        let y_scanlength = VISLINES + 2 * Y_OVERSCAN;
        let mut edit = self.edit();

        for y in 0..y_scanlength {
            let picy1 = y * image.height / y_scanlength;
            let picy2 = ((y * image.height + y_scanlength / 2) / y_scanlength).min(image.height - 1);
            let mut encoder = CameraEncoder::default();
            let sig = edit.line_mut(y + TOP - Y_OVERSCAN);

            for x in 0..PIC_LEN {
                let picx = x * image.width / PIC_LEN;
                let c1 = image.rgb16(picx, picy1);
                let c2 = image.rgb16(picx, picy2);
                let (filty, filti, filtq) = encoder.process(c1, c2);

                let mut composite = filty + ((multiq[x] * filti + multiq[x + 3] * filtq) >> 12);
                composite = ((composite * 100) >> 14) + i64::from(BLACK_LEVEL);
                sig[x + PIC_START] = composite.clamp(0, 125) as i8;
            }
        }
        Ok(())
    }
}

/// Scoped mutable access to an [`Input`]; re-mirrors the tail on drop.
pub struct InputEdit<'a> {
    input: &'a mut Input,
}

impl InputEdit<'_> {
    pub fn line_mut(&mut self, lineno: usize) -> &mut [i8] {
        assert!(lineno < V, "line {lineno} outside the frame");
        &mut self.input.signal[lineno * H..(lineno + 1) * H]
    }
}

impl Deref for InputEdit<'_> {
    type Target = [i8];

    fn deref(&self) -> &[i8] {
        &self.input.signal[..SIGNAL_LEN]
    }
}

impl DerefMut for InputEdit<'_> {
    fn deref_mut(&mut self) -> &mut [i8] {
        &mut self.input.signal[..SIGNAL_LEN]
    }
}

impl Drop for InputEdit<'_> {
    fn drop(&mut self) {
        self.input.wrap();
    }
}

/// Composite samples for one subcarrier cycle of a flat color.
pub fn lcp_to_ntsc(luma: f64, chroma: f64, phase: f64) -> [i8; 4] {
    let mut ntsc = [0i8; 4];
    for (i, out) in ntsc.iter_mut().enumerate() {
        let w = 90.0 * i as f64 + phase;
        let val = luma + chroma * w.to_radians().cos();
        *out = val.clamp(0.0, 127.0) as i8;
    }
    ntsc
}

/// Borrowed 8-bit RGB picture, rows packed without padding.
#[derive(Debug, Clone, Copy)]
pub struct RgbImage<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8],
}

impl RgbImage<'_> {
    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 || self.data.len() != self.width * self.height * 3 {
            return Err(TvError::InputSize {
                width: self.width,
                height: self.height,
                len: self.data.len(),
            });
        }
        Ok(())
    }

    fn rgb16(&self, x: usize, y: usize) -> [i64; 3] {
        let at = (y * self.width + x) * 3;
        let px = &self.data[at..at + 3];
        [px[0], px[1], px[2]].map(|c| i64::from(c) * 257)
    }
}

#[derive(Debug, Default)]
struct CameraEncoder {
    fyx: [i64; 7],
    fyy: [i64; 7],
    fix: [i64; 4],
    fiy: [i64; 4],
    fqx: [i64; 4],
    fqy: [i64; 4],
}

impl CameraEncoder {
    fn process(&mut self, c1: [i64; 3], c2: [i64; 3]) -> (i64, i64, i64) {
        let [r1, g1, b1] = c1;
        let [r2, g2, b2] = c2;

        // coefficients in .4 fixed point
        let rawy = (5 * r1 + 11 * g1 + 2 * b1 + 5 * r2 + 11 * g2 + 2 * b2) >> 7;
        let rawi = (10 * r1 - 4 * g1 - 5 * b1 + 10 * r2 - 4 * g2 - 5 * b2) >> 7;
        let rawq = (3 * r1 - 8 * g1 + 5 * b1 + 3 * r2 - 8 * g2 + 5 * b2) >> 7;

        // Y: 4-pole Butterworth at 3.5 MHz, zero at 3.5 MHz
        self.fyx.copy_within(1.., 0);
        self.fyx[6] = (rawy * 1897) >> 16;
        self.fyy.copy_within(1.., 0);
        let (x, y) = (&self.fyx, &self.fyy);
        let filty = (x[0] + x[6])
            + 4 * (x[1] + x[5])
            + 7 * (x[2] + x[4])
            + 8 * x[3]
            + ((-151 * y[2] + 8115 * y[3] - 38312 * y[4] + 36586 * y[5]) >> 16);
        self.fyy[6] = filty;

        // I: 3-pole Butterworth at 1.5 MHz
        self.fix.copy_within(1.., 0);
        self.fix[3] = (rawi * 1413) >> 16;
        self.fiy.copy_within(1.., 0);
        let (x, y) = (&self.fix, &self.fiy);
        let filti = (x[0] + x[3]) + 3 * (x[1] + x[2])
            + ((16559 * y[0] - 72008 * y[1] + 109682 * y[2]) >> 16);
        self.fiy[3] = filti;

        // Q: 3-pole Butterworth at 0.5 MHz
        self.fqx.copy_within(1.., 0);
        self.fqx[3] = (rawq * 75) >> 16;
        self.fqy.copy_within(1.., 0);
        let (x, y) = (&self.fqx, &self.fqy);
        let filtq = (x[0] + x[3]) + 3 * (x[1] + x[2])
            + ((2612 * y[0] - 9007 * y[1] + 10453 * y[2]) >> 12);
        self.fqy[3] = filtq;

        (filty, filti, filtq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn sync_layout_and_mirror() {
        let mut input = Input::new();
        input.setup_sync(true, false);
        assert!(input.is_wrapped());

        let line = input.line(20);
        assert_eq!(line[0], SYNC_LEVEL as i8);
        assert_eq!(line[BP_START], BLANK_LEVEL as i8);
        assert_eq!(line[CB_START + 1], CB_LEVEL as i8);
        assert_eq!(line[CB_START + 3], -CB_LEVEL as i8);
        assert_eq!(line[PIC_START + 10], BLACK_LEVEL as i8);

        let vsync = input.line(4);
        assert_eq!(vsync[0], BLANK_LEVEL as i8);
        assert_eq!(vsync[H - 1], SYNC_LEVEL as i8);
    }

    #[test]
    fn edit_guard_restores_mirror() {
        let mut input = Input::new();
        {
            let mut edit = input.edit();
            edit.line_mut(1)[17] = 42;
        }
        assert_eq!(input.samples()[SIGNAL_LEN + H + 17], 42);
        assert!(input.is_wrapped());
    }

    #[test]
    fn teletext_stays_in_the_vertical_interval() {
        let mut input = Input::new();
        input.setup_sync(false, false);
        input.setup_teletext(&mut SmallRng::seed_from_u64(3));
        let cells = input.line(20)[PIC_START..PIC_END]
            .iter()
            .filter(|&&s| s == WHITE_LEVEL as i8)
            .count();
        assert!(cells > 0);
        assert!(input.line(30)[PIC_START..PIC_END].iter().all(|&s| s == BLACK_LEVEL as i8));
    }

    #[test]
    fn lcp_without_chroma_is_flat() {
        assert_eq!(lcp_to_ntsc(55.0, 0.0, 0.0), [55; 4]);
        let burst = lcp_to_ntsc(10.0, 40.0, 0.0);
        assert_eq!(burst[0], 50);
        assert_eq!(burst[2], 0);
    }

    #[test]
    fn load_rgb_rejects_short_buffers() {
        let mut input = Input::new();
        let data = [0u8; 10];
        let image = RgbImage { width: 2, height: 2, data: &data };
        assert!(matches!(input.load_rgb(&image), Err(TvError::InputSize { .. })));
    }

    #[test]
    fn load_rgb_white_is_bright() {
        let mut input = Input::new();
        input.setup_sync(true, false);
        let data = vec![255u8; 16 * 12 * 3];
        let image = RgbImage { width: 16, height: 12, data: &data };
        input.load_rgb(&image).unwrap();
        let mid = input.line(TOP + VISLINES / 2);
        let mean = mid[PIC_START + 100..PIC_START + 600]
            .iter()
            .map(|&s| f64::from(s))
            .sum::<f64>()
            / 500.0;
        assert!(mean > 90.0, "white encoded too dark: {mean}");
    }
}
