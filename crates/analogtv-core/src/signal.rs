//! Frame timing constants and the received-signal buffer. Levels are in IRE.

/// Lines per frame. Interlace is not modelled.
pub const V: usize = 262;
pub const TOP: usize = 30;
pub const VISLINES: usize = 200;
pub const BOT: usize = TOP + VISLINES;

pub const H: usize = 912;

pub const SYNC_START: usize = 0;
pub const BP_START: usize = 4700 * H / 63500;
pub const CB_START: usize = 5800 * H / 63500;
pub const PIC_START: usize = 9400 * H / 63500;
pub const PIC_LEN: usize = 52600 * H / 63500;
pub const FP_START: usize = 62000 * H / 63500;
pub const PIC_END: usize = FP_START;

/// The middle three quarters of the nominal line actually reach the tube.
pub const VIS_START: usize = PIC_START + PIC_LEN / 8;
pub const VIS_END: usize = PIC_START + PIC_LEN * 7 / 8;
pub const VIS_LEN: usize = VIS_END - VIS_START;

pub const GHOSTFIR_LEN: usize = 4;

pub const WHITE_LEVEL: i32 = 100;
pub const GRAY50_LEVEL: i32 = 55;
pub const GRAY30_LEVEL: i32 = 35;
pub const BLACK_LEVEL: i32 = 10;
pub const BLANK_LEVEL: i32 = 0;
pub const SYNC_LEVEL: i32 = -40;
pub const CB_LEVEL: i32 = 20;

pub const SIGNAL_LEN: usize = V * H;

/// Lines duplicated past the end of every frame-sized buffer.
pub const WRAP_LINES: usize = 2;

pub const CV_MAX: usize = 1024;

/// Destination rows one scan line may cover before extra rows stay black.
pub const MAX_LINEHEIGHT: usize = 12;

pub const SUBTOTAL_LEN: usize = 4;

pub const SYNTH_BLOCK: usize = 2048;

const _: () = assert!(SIGNAL_LEN % SUBTOTAL_LEN == 0);
const _: () = assert!(H % SUBTOTAL_LEN == 0);

/// One frame of received composite signal.
///
/// The first [`WRAP_LINES`] lines are mirrored after the last line, in both
/// the sample array and the subtotal table, so a window that starts inside
/// the frame can run past its end without modular indexing.
#[derive(Debug, Clone)]
pub struct SignalBuffer {
    samples: Vec<f32>,
    subtotals: Vec<f32>,
}

impl Default for SignalBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalBuffer {
    pub fn new() -> Self {
        let len = SIGNAL_LEN + WRAP_LINES * H;
        Self {
            samples: vec![0.0; len],
            subtotals: vec![0.0; len / SUBTOTAL_LEN],
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn subtotals(&self) -> &[f32] {
        &self.subtotals
    }

    /// Mutable views of the frame proper, excluding the mirrored tail.
    pub fn frame_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        (
            &mut self.samples[..SIGNAL_LEN],
            &mut self.subtotals[..SIGNAL_LEN / SUBTOTAL_LEN],
        )
    }

    pub fn wrap(&mut self) {
        let tail = WRAP_LINES * H;
        self.samples.copy_within(..tail, SIGNAL_LEN);
        self.subtotals
            .copy_within(..tail / SUBTOTAL_LEN, SIGNAL_LEN / SUBTOTAL_LEN);
    }

    pub fn is_wrapped(&self) -> bool {
        let tail = WRAP_LINES * H;
        self.samples[..tail] == self.samples[SIGNAL_LEN..]
            && self.subtotals[..tail / SUBTOTAL_LEN] == self.subtotals[SIGNAL_LEN / SUBTOTAL_LEN..]
    }

    /// Sum of `len` samples starting at `offset`, using the subtotal table
    /// for every fully covered group.
    pub fn window_sum(&self, offset: usize, len: usize) -> f64 {
        let end = offset + len;
        assert!(end <= self.samples.len(), "window {offset}+{len} past signal end");

        let first_group = offset.div_ceil(SUBTOTAL_LEN);
        let last_group = end / SUBTOTAL_LEN;
        if first_group >= last_group {
            return sum(&self.samples[offset..end]);
        }

        sum(&self.samples[offset..first_group * SUBTOTAL_LEN])
            + sum(&self.subtotals[first_group..last_group])
            + sum(&self.samples[last_group * SUBTOTAL_LEN..end])
    }
}

fn sum(values: &[f32]) -> f64 {
    values.iter().map(|&v| f64::from(v)).sum()
}

pub fn fold_subtotals(samples: &[f32], subtotals: &mut [f32]) {
    debug_assert_eq!(samples.len(), subtotals.len() * SUBTOTAL_LEN);
    for (group, total) in samples.chunks_exact(SUBTOTAL_LEN).zip(subtotals.iter_mut()) {
        *total = group.iter().sum();
    }
}
