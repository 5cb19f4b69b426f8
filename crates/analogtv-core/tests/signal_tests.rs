use analogtv_core::patterns::smpte_colorbars;
use analogtv_core::signal::{SIGNAL_LEN, SUBTOTAL_LEN};
use analogtv_core::synth::{synthesize, SynthParams};
use analogtv_core::{FastRng, Feed, Input, Reception};
use rand::rngs::SmallRng;
use rand::SeedableRng;

fn bars() -> Input {
    let mut input = Input::new();
    smpte_colorbars(&mut input, &mut SmallRng::seed_from_u64(11));
    input
}

fn ghosted() -> Reception {
    Reception {
        offset: 1234.0,
        level: 0.8,
        hf_loss: 0.05,
        ghost_fir: [0.01, -0.02, 0.03, 0.015],
        ..Reception::default()
    }
}

/// Synthesize the whole frame as consecutive calls split at `cuts`.
fn synthesize_split(params: &SynthParams, feeds: &[Feed<'_>], cuts: &[usize]) -> (Vec<f32>, Vec<f32>) {
    let mut samples = vec![0.0f32; SIGNAL_LEN];
    let mut totals = vec![0.0f32; SIGNAL_LEN / SUBTOTAL_LEN];

    let mut bounds = vec![0];
    bounds.extend_from_slice(cuts);
    bounds.push(SIGNAL_LEN);
    for pair in bounds.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        synthesize(
            &mut samples[start..end],
            &mut totals[start / SUBTOTAL_LEN..end / SUBTOTAL_LEN],
            start,
            params,
            feeds,
        );
    }
    (samples, totals)
}

#[test]
fn seek_matches_stepping() {
    for &n in &[0u64, 1, 2, 7, 1000, 65_537, SIGNAL_LEN as u64] {
        let mut stepped = FastRng::new(0xdead_beef);
        for _ in 0..n {
            stepped.step();
        }
        assert_eq!(FastRng::at(0xdead_beef, n), stepped, "n = {n}");
    }
}

#[test]
fn synthesis_is_deterministic() {
    let input = bars();
    let rec = ghosted();
    let feeds = [Feed::new(&input, &rec)];
    let params = SynthParams::new(0.04, 77, 99);

    let mut a = vec![0.0f32; 8192];
    let mut b = vec![0.0f32; 8192];
    let mut ta = vec![0.0f32; 2048];
    let mut tb = vec![0.0f32; 2048];
    synthesize(&mut a, &mut ta, 40_000, &params, &feeds);
    synthesize(&mut b, &mut tb, 40_000, &params, &feeds);
    assert_eq!(a, b);
    assert_eq!(ta, tb);
    assert!(a.iter().any(|&s| s != 0.0));
}

#[test]
fn partitioning_does_not_change_the_frame() {
    let input = bars();
    let main = ghosted();
    let echo = Reception {
        offset: 61_003.0,
        level: 0.3,
        ..Reception::default()
    };
    let feeds = [Feed::new(&input, &main), Feed::new(&input, &echo)];
    let mut params = SynthParams::new(0.02, 5, 6);
    params.channel_change_cycles = 4_999;

    let whole = synthesize_split(&params, &feeds, &[]);
    let split = synthesize_split(&params, &feeds, &[2_052, 8_192, 100_004, 200_000]);
    assert!(whole.0 == split.0, "samples differ");
    assert!(whole.1 == split.1, "subtotals differ");
}

#[test]
fn channel_change_noise_fades_into_the_picture() {
    let input = bars();
    let rec = Reception::default();
    let feeds = [Feed::new(&input, &rec)];
    let mut params = SynthParams::new(0.0, 1, 2);
    params.channel_change_cycles = 100_000;

    let (samples, _) = synthesize_split(&params, &feeds, &[]);
    let clean: Vec<f32> = input.samples()[..SIGNAL_LEN].iter().map(|&s| f32::from(s)).collect();

    let early = samples[..1000].iter().zip(&clean).filter(|(a, b)| a != b).count();
    assert!(early > 900, "tuning noise missing");
    assert_eq!(&samples[100_000..], &clean[100_000..]);
}

#[test]
fn oversized_channel_change_stops_at_the_frame_end() {
    let input = bars();
    let rec = Reception::default();
    let feeds = [Feed::new(&input, &rec)];
    let mut whole = SynthParams::new(0.0, 1, 2);
    whole.channel_change_cycles = SIGNAL_LEN;
    let mut huge = whole;
    huge.channel_change_cycles = usize::MAX;

    assert!(synthesize_split(&whole, &feeds, &[]) == synthesize_split(&huge, &feeds, &[96_000]));
}
