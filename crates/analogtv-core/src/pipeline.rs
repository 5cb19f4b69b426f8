use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace, warn};

use crate::config::{EngineConfig, TvControls};
use crate::demod::DemodSettings;
use crate::dsp::puramp;
use crate::error::{Result, TvError};
use crate::geometry::Geometry;
use crate::palette::{ColorAllocator, Palette};
use crate::pool::{interleave, WorkerPool};
use crate::raster::{LevelTable, LinePlan, LineScratch, Output, RasterFrame, RowWriter, ScanParams};
use crate::reception::Feed;
use crate::signal::{SignalBuffer, BOT, H, MAX_LINEHEIGHT, PIC_LEN, SUBTOTAL_LEN, TOP, V, VISLINES};
use crate::surface::{GammaTables, Image, Surface};
use crate::sync::{LineTiming, SyncState};
use crate::synth::{signal_level, synthesize, SynthParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    Synthesizing,
    Syncing,
    LoadComputing,
    Rasterizing,
    Presenting,
}

#[derive(Debug)]
enum ColorOutput {
    TrueColor(GammaTables),
    Indexed(Palette),
}

const BASE_LOAD: f64 = 0.5;
const SHRINK_PULSE_LOAD: f64 = 0.4;
const SHRINK_PULSE_ODDS: u32 = 10_000;

pub struct AnalogTv {
    config: EngineConfig,
    controls: TvControls,
    pool: WorkerPool,
    signal: SignalBuffer,
    timing: LineTiming,
    sync: SyncState,
    crtload: Vec<f64>,
    geometry: Geometry,
    image: Option<Image>,
    output: ColorOutput,
    rng: SmallRng,
    agc: f64,
    shrink_pulse: Option<usize>,
    channel_change_cycles: usize,
    need_clear: bool,
    phase: FramePhase,
    frames: u64,
}

impl AnalogTv {
    /// Build a set drawing into a `width`×`height` window. `colormap` is only
    /// used, and then required, with `config.use_cmap`.
    pub fn new(
        config: EngineConfig,
        controls: TvControls,
        width: usize,
        height: usize,
        colormap: Option<&mut dyn ColorAllocator>,
    ) -> Result<Self> {
        config.pixel_format.validate()?;
        let output = if config.use_cmap {
            let allocator = colormap.ok_or(TvError::MissingColormap)?;
            ColorOutput::Indexed(Palette::allocate(allocator)?)
        } else {
            ColorOutput::TrueColor(GammaTables::new(&config.pixel_format)?)
        };

        let pool = WorkerPool::new(config.threads)?;
        let rng = SmallRng::seed_from_u64(config.seed);
        let mut tv = Self {
            config,
            controls,
            pool,
            signal: SignalBuffer::new(),
            timing: LineTiming::default(),
            sync: SyncState::new(),
            crtload: vec![0.0; V],
            geometry: Geometry::fit(width, height),
            image: None,
            output,
            rng,
            agc: 1.0,
            shrink_pulse: None,
            channel_change_cycles: 0,
            need_clear: true,
            phase: FramePhase::Idle,
            frames: 0,
        };
        tv.image = Image::try_new(tv.geometry.usewidth, tv.geometry.useheight, tv.config.pixel_format);
        debug!(
            width,
            height,
            workers = tv.pool.len(),
            indexed = tv.config.use_cmap,
            "analog tv created"
        );
        Ok(tv)
    }

    pub fn reconfigure(&mut self, width: usize, height: usize) {
        let geometry = Geometry::fit(width, height);
        if !geometry.same_picture(&self.geometry) || self.image.is_none() {
            self.image = Image::try_new(geometry.usewidth, geometry.useheight, self.config.pixel_format);
        }
        debug!(
            usewidth = geometry.usewidth,
            useheight = geometry.useheight,
            xrepl = geometry.xrepl,
            "reconfigured"
        );
        self.geometry = geometry;
        self.need_clear = true;
    }

    pub fn set_powerup(&mut self, seconds: f64) {
        self.controls.powerup = seconds;
    }

    pub fn change_channel(&mut self, cycles: usize) {
        self.channel_change_cycles = cycles;
    }

    pub fn controls(&self) -> &TvControls {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut TvControls {
        &mut self.controls
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn image(&self) -> Option<&Image> {
        self.image.as_ref()
    }

    pub fn palette(&self) -> Option<&Palette> {
        match &self.output {
            ColorOutput::Indexed(palette) => Some(palette),
            ColorOutput::TrueColor(_) => None,
        }
    }

    pub fn sync_state(&self) -> &SyncState {
        &self.sync
    }

    pub fn release(self, colormap: &mut dyn ColorAllocator) {
        if let ColorOutput::Indexed(palette) = self.output {
            palette.release(colormap);
        }
    }

    /// Every input behind `feeds` must be in its wrapped state.
    pub fn draw<S: Surface + ?Sized>(&mut self, noise_level: f64, feeds: &[Feed<'_>], surface: &mut S) {
        if self.image.is_none() {
            let g = &self.geometry;
            self.image = Image::try_new(g.usewidth, g.useheight, self.config.pixel_format);
        }
        let Some(mut image) = self.image.take() else {
            warn!(frame = self.frames, "no image buffer, frame skipped");
            return;
        };

        self.setup_frame(noise_level, feeds);
        self.synthesize(noise_level, feeds);

        self.phase = FramePhase::Syncing;
        self.sync.recover(&self.signal, self.agc, &mut self.timing);

        self.phase = FramePhase::LoadComputing;
        let puheight = self.picture_height();
        let plans = self.plan_lines(puheight);

        self.phase = FramePhase::Rasterizing;
        self.rasterize(&mut image, &plans, puheight);

        self.phase = FramePhase::Presenting;
        self.present(&image, &plans, surface);
        self.image = Some(image);

        trace!(
            frame = self.frames,
            lines = plans.len(),
            agc = self.agc,
            vsync = self.sync.cur_vsync,
            hsync = self.sync.cur_hsync,
            "frame drawn"
        );
        self.frames += 1;
        self.phase = FramePhase::Idle;
    }

    fn setup_frame(&mut self, noise_level: f64, feeds: &[Feed<'_>]) {
        if self.controls.flutter_horiz_desync {
            let rng = &mut self.rng;
            let mut jitter = || f64::from(rng.gen::<u8>()) - 128.0;
            let kick = jitter() * jitter() * jitter() * 0.000_001;
            let hd = &mut self.controls.horiz_desync;
            *hd += -0.10 * (*hd - 3.0) + kick;
        }

        if self.shrink_pulse.is_none() && self.rng.gen_range(0..SHRINK_PULSE_ODDS) == 0 {
            let line = self.rng.gen_range(0..V);
            debug!(line, "shrink pulse");
            self.shrink_pulse = Some(line);
        }

        let level = signal_level(noise_level, feeds);
        if level != 0.0 {
            self.agc = 1.0 / level;
        }
    }

    fn synthesize(&mut self, noise_level: f64, feeds: &[Feed<'_>]) {
        self.phase = FramePhase::Synthesizing;
        let mut params = SynthParams::new(noise_level, self.rng.gen(), self.rng.gen());
        params.channel_change_cycles = std::mem::take(&mut self.channel_change_cycles);

        let (mut samples, mut subtotals) = self.signal.frame_mut();
        let mut slabs = Vec::with_capacity(self.pool.len());
        for ctx in self.pool.contexts() {
            let len = ctx.signal_range.len();
            let (slab, rest) = std::mem::take(&mut samples).split_at_mut(len);
            let (totals, rest_totals) = std::mem::take(&mut subtotals).split_at_mut(len / SUBTOTAL_LEN);
            slabs.push((slab, totals));
            samples = rest;
            subtotals = rest_totals;
        }

        let params = &params;
        self.pool.run_partitioned(slabs, |ctx, (slab, totals)| {
            synthesize(slab, totals, ctx.signal_range.start, params, feeds);
        });
        self.signal.wrap();
    }

    fn picture_height(&self) -> f64 {
        let powerup = self.controls.powerup;
        puramp(powerup, 2.0, 1.0, 1.3)
            * self.controls.height
            * (1.125 - 0.125 * puramp(powerup, 2.0, 2.0, 1.1))
    }

    fn plan_lines(&mut self, puheight: f64) -> Vec<LinePlan> {
        let useheight = self.geometry.useheight;
        let mut baseload = BASE_LOAD;
        self.crtload[TOP - 1] = baseload;

        let mut plans = Vec::with_capacity(VISLINES);
        for lineno in TOP..BOT {
            let slineno = lineno - TOP;
            let Some((ytop, ybot)) = line_rows(slineno, useheight, puheight) else {
                continue;
            };

            if self.shrink_pulse == Some(lineno) {
                baseload += SHRINK_PULSE_LOAD;
                self.shrink_pulse = None;
            }

            let signal_offset = ((lineno + self.sync.cur_vsync) % V) * H + self.timing.hsync[lineno];
            let totsignal = self.signal.window_sum(signal_offset, PIC_LEN) * self.agc;
            let squeeze = if slineno > 184 {
                (slineno - 184) as f64 * (lineno - 184) as f64 * 0.001 * self.controls.squeeze_bottom
            } else {
                0.0
            };
            let load = 0.95 * self.crtload[lineno - 1]
                + 0.05 * (baseload + (totsignal - 30_000.0) / 100_000.0 + squeeze);
            self.crtload[lineno] = load;

            plans.push(LinePlan {
                lineno,
                slineno,
                ytop,
                ybot,
                signal_offset,
                crtload: load,
            });
        }
        plans
    }

    fn rasterize(&self, image: &mut Image, plans: &[LinePlan], puheight: f64) {
        let geometry = &self.geometry;
        let powerup = self.controls.powerup;
        let levels = LevelTable::new(
            puheight * geometry.useheight as f64 / VISLINES as f64,
            powerup,
        );
        let output = match &self.output {
            ColorOutput::TrueColor(gamma) => Output::TrueColor(gamma),
            ColorOutput::Indexed(palette) => Output::Indexed(palette),
        };
        let frame = RasterFrame {
            signal: self.signal.samples(),
            cb_phase: &self.timing.cb_phase,
            demod: DemodSettings::new(self.agc, &self.controls),
            scan: ScanParams::new(&self.controls, geometry.subwidth),
            levels: &levels,
            luma_gain: self.controls.contrast * puramp(powerup, 1.0, 0.0, 1.0) / (0.5 + 0.5 * puheight),
            output,
            writer: RowWriter::select(&image.format),
            bytes_per_line: image.bytes_per_line,
            usewidth: geometry.usewidth,
            xrepl: geometry.xrepl,
        };

        // Bands are disjoint and in row order, so the image splits cleanly.
        let bpl = image.bytes_per_line;
        let mut rest: &mut [u8] = &mut image.data;
        let mut consumed = 0;
        let mut jobs = Vec::with_capacity(plans.len());
        for plan in plans {
            assert!(plan.ytop >= consumed, "line {} overlaps the one above", plan.lineno);
            let (_, tail) = std::mem::take(&mut rest).split_at_mut((plan.ytop - consumed) * bpl);
            let (band, tail) = tail.split_at_mut(plan.height() * bpl);
            jobs.push((plan, band));
            rest = tail;
            consumed = plan.ybot;
        }

        let subwidth = geometry.subwidth;
        let frame = &frame;
        self.pool.run_partitioned(interleave(jobs, self.pool.len()), |_, lines| {
            let mut scratch = LineScratch::new(subwidth);
            for (plan, band) in lines {
                frame.draw_line(plan, band, &mut scratch);
            }
        });
    }

    fn present<S: Surface + ?Sized>(&mut self, image: &Image, plans: &[LinePlan], surface: &mut S) {
        let g = self.geometry;
        let top = plans.iter().map(|p| p.ytop).min().unwrap_or(g.useheight);
        let bot = plans.iter().map(|p| p.ybot).max().unwrap_or(0);

        if self.need_clear {
            surface.clear();
            self.need_clear = false;
        }
        if top > 0 {
            surface.clear_area(g.screen_xo, g.screen_yo, g.usewidth, top);
        }
        if g.useheight > bot {
            surface.clear_area(g.screen_xo, g.screen_yo + bot as i32, g.usewidth, g.useheight - bot);
        }
        if bot > top {
            surface.put_image(image, top, g.screen_xo, g.screen_yo + top as i32, g.usewidth, bot - top);
        }
    }
}

/// Destination rows `ytop..ybot` covered by visible line `slineno`, or
/// `None` when the line falls outside the picture.
pub fn line_rows(slineno: usize, useheight: usize, puheight: f64) -> Option<(usize, usize)> {
    let uh = useheight as i64;
    let row = |s: i64| ((s * uh / VISLINES as i64 - uh / 2) as f64 * puheight) as i64 + uh / 2;
    let s = slineno as i64;
    let (ytop, ybot) = (row(s), row(s + 1));

    if ytop == ybot || ybot < 0 || ytop > uh {
        return None;
    }
    let ytop = ytop.max(0);
    let ybot = ybot.min(uh).min(ytop + MAX_LINEHEIGHT as i64);
    Some((ytop as usize, ybot as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_height_maps_one_row_per_line() {
        for s in 0..VISLINES {
            assert_eq!(line_rows(s, 200, 1.0), Some((s, s + 1)));
        }
    }

    #[test]
    fn bands_never_overlap() {
        for &(uh, pu) in &[(1000, 1.0), (600, 1.07), (431, 0.93), (200, 1.3)] {
            let mut last = 0;
            for s in 0..VISLINES {
                if let Some((top, bot)) = line_rows(s, uh, pu) {
                    assert!(top >= last && bot >= top && bot - top <= MAX_LINEHEIGHT);
                    last = bot;
                }
            }
        }
    }

    #[test]
    fn collapsed_picture_has_no_lines() {
        assert!((0..VISLINES).all(|s| line_rows(s, 200, 0.0).is_none()));
    }
}
