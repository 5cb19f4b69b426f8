use analogtv_core::signal::SIGNAL_LEN;
use analogtv_core::{Reception, TvControls};
use rand::Rng;

/// Receptions summed on one channel: the station and at most one ghost.
pub const MAX_MULTICHAN: usize = 2;

/// One station as picked up on a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuning {
    pub station: usize,
    pub reception: Reception,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub noise_level: f64,
    pub tunings: Vec<Tuning>,
}

/// Random channel line-up over `stations` sources. Each channel gets a main
/// reception and, when that one is weak, sometimes a second station bleeding
/// through off frequency.
pub fn channel_table<R: Rng>(rng: &mut R, channels: usize, stations: usize, noise_level: f64) -> Vec<Channel> {
    assert!(stations > 0, "no stations to tune");
    (0..channels)
        .map(|_| {
            let mut tunings = Vec::with_capacity(MAX_MULTICHAN);
            let mut last = None;
            for n in 0..MAX_MULTICHAN {
                let station = loop {
                    let station = rng.gen_range(0..stations);
                    if Some(station) != last || rng.gen_ratio(1, 10) {
                        break station;
                    }
                };
                last = Some(station);

                let reception = Reception {
                    level: rng.gen::<f64>().powi(3) * 2.0 + 0.05,
                    offset: rng.gen_range(0..SIGNAL_LEN) as f64,
                    multipath: if rng.gen_ratio(2, 3) { rng.gen() } else { 0.0 },
                    freq_error: if n > 0 { (rng.gen::<f64>() * 2.0 - 1.0) * 3.0 } else { 0.0 },
                    ..Reception::default()
                };
                let strong = reception.level > 0.3;
                tunings.push(Tuning { station, reception });
                if strong || rng.gen_ratio(3, 4) {
                    break;
                }
            }
            Channel { noise_level, tunings }
        })
        .collect()
}

/// Next channel to switch to. Channel 0 is only shown at start.
pub fn pick_channel<R: Rng>(rng: &mut R, channels: usize) -> usize {
    if channels < 2 {
        0
    } else {
        rng.gen_range(1..channels)
    }
}

/// Occasionally nudge the tint and color knobs, like a viewer fiddling
/// with the set.
pub fn turn_knobs<R: Rng>(controls: &mut TvControls, rng: &mut R) {
    if rng.gen_ratio(1, 4) {
        controls.tint += (rng.gen::<f64>() * 2.0 - 1.0).powi(7) * 180.0 * sign(rng);
    }
    controls.color += rng.gen::<f64>() * 0.3 * sign(rng);
}

fn sign<R: Rng>(rng: &mut R) -> f64 {
    if rng.gen() {
        1.0
    } else {
        -1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn table_is_deterministic_per_seed() {
        let table = |seed| channel_table(&mut SmallRng::seed_from_u64(seed), 12, 6, 0.06);
        assert_eq!(table(7), table(7));
        assert_ne!(table(7), table(8));
    }

    #[test]
    fn tunings_stay_in_range() {
        let table = channel_table(&mut SmallRng::seed_from_u64(1), 200, 6, 0.06);
        assert_eq!(table.len(), 200);
        for channel in &table {
            assert!((1..=MAX_MULTICHAN).contains(&channel.tunings.len()));
            let main = &channel.tunings[0].reception;
            assert_eq!(main.freq_error, 0.0);
            for tuning in &channel.tunings {
                assert!(tuning.station < 6);
                let rec = &tuning.reception;
                assert!((0.05..=2.05).contains(&rec.level));
                assert!(rec.offset >= 0.0 && rec.offset < SIGNAL_LEN as f64);
                assert!(rec.freq_error.abs() <= 3.0);
            }
        }
        assert!(table.iter().any(|c| c.tunings.len() == 2));
    }

    #[test]
    fn a_single_station_still_fills_the_table() {
        let table = channel_table(&mut SmallRng::seed_from_u64(2), 20, 1, 0.0);
        assert!(table.iter().flat_map(|c| &c.tunings).all(|t| t.station == 0));
    }

    #[test]
    fn switching_never_returns_to_the_start_channel() {
        let mut rng = SmallRng::seed_from_u64(3);
        assert!((0..500).all(|_| (1..12).contains(&pick_channel(&mut rng, 12))));
        assert_eq!(pick_channel(&mut rng, 1), 0);
    }
}
