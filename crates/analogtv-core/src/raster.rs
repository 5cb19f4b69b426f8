//! Scan-line rasterization.
//!
//! Each signal line covers a band of destination rows. The line is decoded
//! once, resampled across the scan with bloom, desync and right-edge squish,
//! and then written row by row with the CRT edge weighting of its band. Rows
//! that share a weighting are copied instead of recomputed.

use crate::config::TvControls;
use crate::demod::{demodulate, DemodSettings};
use crate::dsp::{puramp, yiq_to_rgb, Yiq};
use crate::palette::Palette;
use crate::signal::{MAX_LINEHEIGHT, PIC_LEN};
use crate::surface::{ByteOrder, GammaTables, PixelFormat};

/// Samples decoded beyond each end of the scan so the filters settle.
const DEMOD_MARGIN: i64 = 10;

pub const YIQ_LEN: usize = PIC_LEN + DEMOD_MARGIN as usize;

const LEVEL_FACTORS: [f64; 3] = [-7.5, 5.5, 24.5];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Level {
    /// Weighting class; rows of the same class in one band are identical.
    pub index: usize,
    pub value: f64,
}

/// Weighting class of every row of a band `height` rows tall.
///
/// Edge rows are dimmed only once lines are tall enough to show them:
/// the outermost rows from an average of 5 rows per line, the next ones in
/// from 7. Row `i` and row `height - 1 - i` always share a class.
pub fn level_indices(height: usize, avgheight: f64) -> Vec<usize> {
    (0..height)
        .map(|row| match row.min(height - 1 - row) {
            0 if avgheight >= 5.0 => 0,
            1 if avgheight >= 7.0 => 1,
            _ => 2,
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct LevelTable {
    rows: Vec<Vec<Level>>,
}

impl LevelTable {
    pub fn new(avgheight: f64, powerup: f64) -> Self {
        let ramp = puramp(powerup, 3.0, 6.0, 1.0);
        let rows = (0..=MAX_LINEHEIGHT)
            .map(|height| {
                level_indices(height, avgheight)
                    .into_iter()
                    .map(|index| Level {
                        index,
                        value: (40.0 + LEVEL_FACTORS[index] * ramp) / 256.0,
                    })
                    .collect()
            })
            .collect();
        Self { rows }
    }

    pub fn row(&self, height: usize) -> &[Level] {
        &self.rows[height]
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScanParams {
    pub horiz_desync: f64,
    /// Fraction of the subwidth the beam sweeps.
    pub scanwidth: f64,
    /// Fraction of the visible width past the middle where squish begins.
    pub squish: f64,
    pub subwidth: usize,
}

/// Narrowest sweep, as a fraction of the subwidth. Keeps the source step
/// finite while the beam is collapsed.
const MIN_SCANWIDTH: f64 = 1.0 / 1024.0;

impl ScanParams {
    pub fn new(controls: &TvControls, subwidth: usize) -> Self {
        let powerup = controls.powerup;
        Self {
            horiz_desync: controls.horiz_desync,
            scanwidth: (controls.width * puramp(powerup, 0.5, 0.3, 1.0)).max(MIN_SCANWIDTH),
            squish: 0.25 + 0.25 * puramp(powerup, 2.0, 0.0, 1.1) - controls.squish,
            subwidth,
        }
    }
}

/// Source positions of one line, in 16.16 fixed point samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanGeometry {
    pub scanstart: i64,
    pub scanend: i64,
    pub squishright: i64,
    pub squishdiv: i64,
    /// Source step per destination column.
    pub pixrate: i64,
    /// Destination columns `scl..scr` lie inside the sweep.
    pub scl: usize,
    pub scr: usize,
}

impl ScanGeometry {
    pub fn new(params: &ScanParams, slineno: usize, crtload: f64) -> Self {
        let bloom = (-10.0 * crtload).clamp(-10.0, 2.0);
        let shift = if slineno < 16 {
            let s = slineno as f64;
            params.horiz_desync * ((-0.17 * s).exp() * (0.7 + (0.6 * s).cos()))
        } else {
            0.0
        };

        let viswidth = PIC_LEN as f64 * 0.79 - 5.0 * bloom;
        let middle = (PIC_LEN / 2) as f64 - shift;

        let subwidth = params.subwidth;
        let scw = ((subwidth as f64 * params.scanwidth) as usize).min(subwidth);
        let pixrate = f64::from((viswidth * 65536.0 / subwidth as f64) as i32) / params.scanwidth;

        Self {
            scanstart: ((middle - viswidth * 0.5) * 65536.0) as i64,
            scanend: (PIC_LEN as i64 - 1) * 65536,
            squishright: ((middle + viswidth * params.squish) * 65536.0) as i64,
            squishdiv: (subwidth / 15).max(1) as i64,
            pixrate: pixrate as i64,
            scl: subwidth / 2 - scw / 2,
            scr: subwidth / 2 + scw / 2,
        }
    }

    pub fn demod_range(&self) -> std::ops::Range<usize> {
        let start = ((self.scanstart >> 16) - DEMOD_MARGIN).max(0) as usize;
        let end = (((self.scanend >> 16) + DEMOD_MARGIN).max(0) as usize).min(YIQ_LEN);
        start..end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowWriter {
    Native32,
    Native16,
    Generic(PixelFormat),
}

impl RowWriter {
    pub fn select(format: &PixelFormat) -> Self {
        let native = format.byte_order == ByteOrder::native();
        match format.bits_per_pixel {
            32 if native => Self::Native32,
            16 if native => Self::Native16,
            _ => Self::Generic(*format),
        }
    }

    pub fn write(self, row: &mut [u8], pixels: impl Iterator<Item = u32>, xrepl: usize) {
        let pixels = pixels.flat_map(|p| std::iter::repeat(p).take(xrepl));
        match self {
            Self::Native32 => {
                for (dst, p) in row.chunks_exact_mut(4).zip(pixels) {
                    dst.copy_from_slice(&p.to_ne_bytes());
                }
            }
            Self::Native16 => {
                for (dst, p) in row.chunks_exact_mut(2).zip(pixels) {
                    dst.copy_from_slice(&(p as u16).to_ne_bytes());
                }
            }
            Self::Generic(format) => {
                let bpp = format.bytes_per_pixel();
                for (dst, p) in row.chunks_exact_mut(bpp).zip(pixels) {
                    format.put_pixel(dst, p);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Output<'a> {
    TrueColor(&'a GammaTables),
    Indexed(&'a Palette),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePlan {
    pub lineno: usize,
    /// Line number within the visible picture.
    pub slineno: usize,
    pub ytop: usize,
    pub ybot: usize,
    /// Start of the line's picture in the signal buffer.
    pub signal_offset: usize,
    pub crtload: f64,
}

impl LinePlan {
    pub fn height(&self) -> usize {
        self.ybot - self.ytop
    }
}

#[derive(Debug, Clone)]
pub struct LineScratch {
    yiq: Vec<Yiq>,
    rgb: Vec<f32>,
    pixels: Vec<u32>,
}

impl LineScratch {
    pub fn new(subwidth: usize) -> Self {
        Self {
            yiq: vec![Yiq::default(); YIQ_LEN],
            rgb: vec![0.0; subwidth * 3],
            pixels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RasterFrame<'a> {
    pub signal: &'a [f32],
    pub cb_phase: &'a [[f64; 4]],
    pub demod: DemodSettings,
    pub scan: ScanParams,
    pub levels: &'a LevelTable,
    /// Contrast after power-up and picture height compensation.
    pub luma_gain: f64,
    pub output: Output<'a>,
    pub writer: RowWriter,
    pub bytes_per_line: usize,
    pub usewidth: usize,
    pub xrepl: usize,
}

impl RasterFrame<'_> {
    /// Draw `plan` into `band`, the image rows `plan.ytop..plan.ybot`.
    pub fn draw_line(&self, plan: &LinePlan, band: &mut [u8], scratch: &mut LineScratch) {
        let bpl = self.bytes_per_line;
        debug_assert_eq!(band.len(), plan.height() * bpl);

        let geom = ScanGeometry::new(&self.scan, plan.slineno, plan.crtload);
        let signal = &self.signal[plan.signal_offset..plan.signal_offset + YIQ_LEN];
        demodulate(
            signal,
            plan.signal_offset & 3,
            &self.cb_phase[plan.lineno],
            &self.demod,
            geom.demod_range(),
            &mut scratch.yiq,
        );

        let levels = self.levels.row(plan.height());
        match self.output {
            Output::TrueColor(gamma) => {
                let pixbright = self.luma_gain * 1024.0 / 100.0;
                render_rgb(&scratch.yiq, &geom, pixbright, &mut scratch.rgb);
                self.blast_rows(band, levels, &scratch.rgb, gamma);
            }
            Output::Indexed(palette) => {
                for (row, level) in band.chunks_exact_mut(bpl).zip(levels) {
                    let gain_y = level.value * self.luma_gain * 0.070;
                    let gain_iq = level.value * 0.090;
                    render_indexed(
                        &scratch.yiq,
                        &geom,
                        (gain_y, gain_iq),
                        palette,
                        self.usewidth,
                        self.xrepl,
                        &mut scratch.pixels,
                    );
                    self.writer.write(row, scratch.pixels.iter().copied(), 1);
                }
            }
        }
    }

    fn blast_rows(&self, band: &mut [u8], levels: &[Level], rgb: &[f32], gamma: &GammaTables) {
        let bpl = self.bytes_per_line;
        let mut written: [Option<usize>; 3] = [None; 3];

        for (row, level) in levels.iter().enumerate() {
            if let Some(src) = written[level.index] {
                band.copy_within(src * bpl..(src + 1) * bpl, row * bpl);
                continue;
            }
            written[level.index] = Some(row);

            let mult = level.value;
            let pixels = rgb.chunks_exact(3).map(|c| {
                gamma.pixel(
                    f64::from(c[0]) * mult,
                    f64::from(c[1]) * mult,
                    f64::from(c[2]) * mult,
                )
            });
            self.writer.write(&mut band[row * bpl..(row + 1) * bpl], pixels, self.xrepl);
        }
    }
}

fn interpolate(yiq: &[Yiq], pos: i64) -> (f64, f64, f64) {
    let pati = (pos >> 16) as usize;
    let frac = (pos & 0xffff) as f64 / 65536.0;
    let (a, b) = (yiq[pati], yiq[pati + 1]);
    let lerp = |x: f32, y: f32| f64::from(x) * (1.0 - frac) + f64::from(y) * frac;
    (lerp(a.y, b.y), lerp(a.i, b.i), lerp(a.q, b.q))
}

fn render_rgb(yiq: &[Yiq], geom: &ScanGeometry, pixbright: f64, rgb: &mut [f32]) {
    rgb.fill(0.0);
    let mut pos = geom.scanstart;
    let mut step = geom.pixrate;
    let mut bright = pixbright;

    for px in rgb[geom.scl * 3..geom.scr * 3].chunks_exact_mut(3) {
        if pos >= geom.scanend {
            break;
        }
        if pos >= 0 {
            let (y, i, q) = interpolate(yiq, pos);
            let (r, g, b) = yiq_to_rgb(y, i, q);
            px[0] = (r * bright).max(0.0) as f32;
            px[1] = (g * bright).max(0.0) as f32;
            px[2] = (b * bright).max(0.0) as f32;

            if pos >= geom.squishright {
                step += step / geom.squishdiv;
                bright += bright / geom.squishdiv as f64 / 2.0;
            }
        }
        pos = pos.saturating_add(step);
    }
}

fn quantize(value: f64, levels: usize) -> usize {
    ((value * levels as f64) as i64).clamp(0, levels as i64 - 1) as usize
}

fn render_indexed(
    yiq: &[Yiq],
    geom: &ScanGeometry,
    (gain_y, gain_iq): (f64, f64),
    palette: &Palette,
    usewidth: usize,
    xrepl: usize,
    out: &mut Vec<u32>,
) {
    out.clear();
    let background = palette.background();
    let levels = palette.levels;
    let mut pos = geom.scanstart;
    let mut step = geom.pixrate;

    while pos < 0 && out.len() < usewidth {
        out.push(background);
        pos = pos.saturating_add(step);
    }
    while pos < geom.scanend && out.len() < usewidth {
        let (y, i, q) = interpolate(yiq, pos);
        let yli = quantize(y * gain_y, levels.y);
        let ili = quantize(i * gain_iq + 0.5, levels.i);
        let qli = quantize(q * gain_iq + 0.5, levels.q);
        let pixel = palette.pixels[levels.index(yli, ili, qli)];
        for _ in 0..xrepl.min(usewidth - out.len()) {
            out.push(pixel);
        }

        if pos >= geom.squishright {
            step += step / geom.squishdiv;
        }
        pos = pos.saturating_add(step);
    }
    out.resize(usewidth, background);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_lines_are_not_weighted() {
        let table = LevelTable::new(1.0, 1000.0);
        assert!(table.row(2).iter().all(|l| l.index == 2));
        assert!((table.row(1)[0].value - 64.5 / 256.0).abs() < 1e-12);
    }

    #[test]
    fn tall_lines_dim_both_edges() {
        assert_eq!(level_indices(8, 7.5), vec![0, 1, 2, 2, 2, 2, 1, 0]);
        assert_eq!(level_indices(5, 5.0), vec![0, 2, 2, 2, 0]);
    }

    #[test]
    fn scan_is_centered_at_rest() {
        let params = ScanParams::new(&TvControls::default(), 266);
        let geom = ScanGeometry::new(&params, 100, 0.5);
        assert_eq!((geom.scl, geom.scr), (0, 266));
        let viswidth = PIC_LEN as f64 * 0.79 + 25.0;
        assert_eq!(geom.scanstart, ((377.0 - viswidth / 2.0) * 65536.0) as i64);
        assert!(geom.demod_range().end <= YIQ_LEN);
        assert!(geom.scanstart > 0);
    }

    #[test]
    fn collapsed_width_keeps_a_finite_step() {
        for width in [0.0, -1.0, f64::NAN] {
            let controls = TvControls {
                width,
                ..TvControls::default()
            };
            let geom = ScanGeometry::new(&ScanParams::new(&controls, 266), 100, 0.5);
            assert!(geom.pixrate > 0 && geom.pixrate < i64::MAX, "width {width}: {}", geom.pixrate);
            assert_eq!(geom.scl, geom.scr);
        }
    }

    #[test]
    fn desync_bends_only_the_top() {
        let controls = TvControls {
            horiz_desync: 4.0,
            ..TvControls::default()
        };
        let params = ScanParams::new(&controls, 266);
        let top = ScanGeometry::new(&params, 0, 0.5);
        let low = ScanGeometry::new(&params, 40, 0.5);
        let rest = ScanGeometry::new(&ScanParams::new(&TvControls::default(), 266), 0, 0.5);
        assert!(top.scanstart < rest.scanstart);
        assert_eq!(low.scanstart, rest.scanstart);
    }

    #[test]
    fn generic_writer_matches_native_fast_path() {
        let format = PixelFormat::rgba32();
        let pixels = [0x0011_2233u32, 0x00aa_bbcc];
        let mut fast = [0u8; 16];
        let mut slow = [0u8; 16];
        RowWriter::select(&format).write(&mut fast, pixels.iter().copied(), 2);
        RowWriter::Generic(format).write(&mut slow, pixels.iter().copied(), 2);
        assert_eq!(RowWriter::select(&format), RowWriter::Native32);
        assert_eq!(fast, slow);
        assert_eq!(&fast[..4], &fast[4..8]);
    }
}
