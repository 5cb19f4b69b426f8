//! Composite signal synthesis.
//!
//! A frame is the sum of receiver noise and every reception, each passed
//! through its ghost filter. Any chunk-aligned sub-range can be synthesized
//! on its own: the noise streams are seeked to the chunk start and the ghost
//! history is rebuilt from the source samples preceding it, so splitting the
//! frame across workers never changes a single sample.

use crate::dsp::FastRng;
use crate::reception::Feed;
use crate::signal::{fold_subtotals, SIGNAL_LEN, SUBTOTAL_LEN, SYNTH_BLOCK};

/// Per-frame inputs shared read-only by every worker.
#[derive(Debug, Clone, Copy)]
pub struct SynthParams {
    pub noise_level: f64,
    /// Seed of the thermal noise stream.
    pub random0: u32,
    /// Seed of the channel-change noise stream.
    pub random1: u32,
    /// Leading samples of the first reception replaced by tuning noise.
    pub channel_change_cycles: usize,
}

impl SynthParams {
    pub fn new(noise_level: f64, random0: u32, random1: u32) -> Self {
        Self {
            noise_level,
            random0,
            random1,
            channel_change_cycles: 0,
        }
    }
}

/// Received level of the frame: noise floor plus every reception and its
/// echo energy, combined as a root sum of squares.
pub fn signal_level(noise_level: f64, feeds: &[Feed<'_>]) -> f64 {
    feeds.iter().fold(noise_level, |acc, feed| {
        let rec = feed.reception;
        (acc * acc + rec.level * rec.level * (1.0 + 4.0 * rec.ghost_gain())).sqrt()
    })
}

/// Fill `samples` (frame positions `start..start + samples.len()`) and the
/// matching `subtotals`.
pub fn synthesize(
    samples: &mut [f32],
    subtotals: &mut [f32],
    start: usize,
    params: &SynthParams,
    feeds: &[Feed<'_>],
) {
    assert_eq!(start % SUBTOTAL_LEN, 0, "chunk start {start} not aligned");
    assert_eq!(samples.len() % SUBTOTAL_LEN, 0);
    assert!(start + samples.len() <= SIGNAL_LEN);
    debug_assert!(feeds.iter().all(|feed| feed.input.is_wrapped()));

    let blocks = samples
        .chunks_mut(SYNTH_BLOCK)
        .zip(subtotals.chunks_mut(SYNTH_BLOCK / SUBTOTAL_LEN));
    for (n, (block, block_totals)) in blocks.enumerate() {
        let block_start = start + n * SYNTH_BLOCK;
        init_noise(block, block_start, params);
        for (index, feed) in feeds.iter().enumerate() {
            let change_cycles = if index == 0 { params.channel_change_cycles } else { 0 };
            add_reception(block, block_start, feed, change_cycles, params.random1);
        }
        fold_subtotals(block, block_totals);
    }
}

fn init_noise(block: &mut [f32], start: usize, params: &SynthParams) {
    let noisemul = (params.noise_level * 150.0).sqrt() / f64::from(0x7fff_ffff);

    let mut rng = FastRng::new(params.random0);
    let mut nm1 = 0.0;
    if start > 0 {
        rng.seek(start as u64 - 1);
        nm1 = f64::from(rng.centered()) * noisemul;
        rng.step();
    }

    for sample in block.iter_mut() {
        let nm2 = nm1;
        nm1 = f64::from(rng.centered()) * noisemul;
        *sample = (nm1 * nm2) as f32;
        rng.step();
    }
}

fn add_reception(block: &mut [f32], start: usize, feed: &Feed<'_>, change_cycles: usize, random1: u32) {
    let src = feed.input.samples();
    let rec = feed.reception;
    let level = rec.level;
    let hfloss = rec.hf_loss;
    let ofs = rec.start_sample();
    let end = start + block.len();

    // Tuning noise, sample by sample. The ghost filter is not applied here.
    let change_end = change_cycles.min(SIGNAL_LEN).next_multiple_of(SUBTOTAL_LEN);
    let mut pos = start;
    if pos < change_end {
        let mut rng = FastRng::at(random1, pos as u64);
        while pos < change_end.min(end) {
            let noise_ampl = 1.3 * 0.99995f64.powi(pos as i32);
            let sig0 = f64::from(src[(ofs + pos) % SIGNAL_LEN]);
            let noise = f64::from(rng.centered()) * (50.0 / f64::from(0x7fff_ffff));
            rng.step();
            block[pos - start] += (sig0 * level * (1.0 - noise_ampl) + noise * noise_ampl) as f32;
            pos += 1;
        }
    }
    if pos >= end {
        return;
    }

    let group_sum = |at: usize| -> f64 { (0..SUBTOTAL_LEN).map(|k| f64::from(src[at + k])).sum() };
    let back = |n: usize| -> usize { (ofs + pos + SIGNAL_LEN - n) % SIGNAL_LEN };

    // Ghost history of the four groups preceding `pos`.
    let mut dp = [0.0f64; 5];
    for (k, slot) in dp.iter_mut().enumerate().skip(1) {
        *slot = group_sum(back(SUBTOTAL_LEN * k));
    }

    let fir = rec.ghost_fir;
    while pos < end {
        let s = (ofs + pos) % SIGNAL_LEN;
        let sig = [
            f64::from(src[s]),
            f64::from(src[s + 1]),
            f64::from(src[s + 2]),
            f64::from(src[s + 3]),
        ];
        dp[0] = sig.iter().sum();

        let sigr = dp[1] * fir[0] + dp[2] * fir[1] + dp[3] * fir[2] + dp[4] * fir[3];
        dp.copy_within(0..4, 1);

        let out = &mut block[pos - start..pos - start + SUBTOTAL_LEN];
        for (k, p) in out.iter_mut().enumerate() {
            *p += ((sig[k] + sigr + sig[(k + 2) % 4] * hfloss) * level) as f32;
        }
        pos += SUBTOTAL_LEN;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Input;
    use crate::reception::Reception;

    #[test]
    fn signal_level_combines_in_quadrature() {
        let input = Input::new();
        let a = Reception::with_level(3.0);
        let b = Reception::with_level(4.0);
        let feeds = [Feed::new(&input, &a), Feed::new(&input, &b)];
        assert!((signal_level(0.0, &feeds) - 5.0).abs() < 1e-12);
        assert_eq!(signal_level(0.25, &[]), 0.25);
    }

    #[test]
    fn clean_reception_copies_source() {
        let mut input = Input::new();
        input.setup_sync(true, false);
        let rec = Reception::default();
        let feeds = [Feed::new(&input, &rec)];
        let mut samples = vec![0.0f32; 4096];
        let mut totals = vec![0.0f32; 1024];
        synthesize(&mut samples, &mut totals, 8192, &SynthParams::new(0.0, 1, 2), &feeds);
        for (i, &s) in samples.iter().enumerate() {
            assert_eq!(s, f32::from(input.samples()[8192 + i]));
        }
        assert_eq!(totals[0], samples[..4].iter().sum::<f32>());
    }
}
