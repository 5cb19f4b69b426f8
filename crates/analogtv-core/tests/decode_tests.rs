use analogtv_core::demod::{demodulate, is_color_burst, DemodSettings, COLORBURST_THRESHOLD};
use analogtv_core::raster::{level_indices, LevelTable};
use analogtv_core::signal::MAX_LINEHEIGHT;
use analogtv_core::{rgb_to_yiq, yiq_to_rgb, TvControls, Yiq};
use approx::{assert_abs_diff_eq, assert_relative_eq};

const LINE: usize = 800;

/// A line carrying a strong chroma pattern on a mid-gray pedestal.
fn chroma_line() -> Vec<f32> {
    let pattern = [85.0, 55.0, 25.0, 55.0];
    (0..LINE).map(|i| pattern[i & 3]).collect()
}

/// Burst reference whose power is exactly `power`.
fn burst_with_power(power: f64) -> [f64; 4] {
    let a = (power * 64.0).sqrt();
    [a, 0.0, -a, 0.0]
}

fn decode(cb_phase: &[f64; 4]) -> (bool, Vec<Yiq>) {
    let settings = DemodSettings::new(1.0, &TvControls::default());
    let mut out = vec![Yiq::default(); LINE];
    let color = demodulate(&chroma_line(), 0, cb_phase, &settings, 0..LINE, &mut out);
    (color, out)
}

#[test]
fn weak_burst_decodes_monochrome() {
    let (color, out) = decode(&burst_with_power(COLORBURST_THRESHOLD - 0.01));
    assert!(!color);
    assert!(out.iter().all(|s| s.i == 0.0 && s.q == 0.0));
}

#[test]
fn threshold_itself_is_monochrome() {
    assert!(!is_color_burst(COLORBURST_THRESHOLD));
    assert!(is_color_burst(COLORBURST_THRESHOLD + 1e-9));
}

#[test]
fn burst_above_threshold_decodes_color() {
    let (color, out) = decode(&burst_with_power(COLORBURST_THRESHOLD + 0.01));
    assert!(color);
    let settled = &out[200..LINE];
    assert!(settled.iter().any(|s| s.i.abs() > 1.0 || s.q.abs() > 1.0));
}

#[test]
fn luma_ignores_colormode() {
    let (_, mono) = decode(&burst_with_power(1.0));
    let (_, color) = decode(&burst_with_power(8.0));
    for (m, c) in mono.iter().zip(&color) {
        assert_eq!(m.y, c.y);
    }
    // Pedestal of 55 less black level, plus the brightness offset.
    let brightness = TvControls::default().brightness;
    assert_abs_diff_eq!(f64::from(mono[LINE - 1].y), 55.0 - 10.0 + brightness * 100.0, epsilon = 0.05);
}

#[test]
fn white_survives_the_matrices() {
    let (y, i, q) = rgb_to_yiq(100.0, 100.0, 100.0);
    assert_relative_eq!(y, 100.0, epsilon = 1e-9);
    let (r, g, b) = yiq_to_rgb(y, i, q);
    assert_relative_eq!(r, 100.0, epsilon = 1e-9);
    assert_relative_eq!(g, 100.0, epsilon = 1e-9);
    assert_relative_eq!(b, 100.0, epsilon = 1e-9);
}

#[test]
fn primaries_survive_the_matrices() {
    for rgb in [[100.0, 0.0, 0.0], [0.0, 100.0, 0.0], [0.0, 0.0, 100.0]] {
        let (y, i, q) = rgb_to_yiq(rgb[0], rgb[1], rgb[2]);
        let (r, g, b) = yiq_to_rgb(y, i, q);
        assert_abs_diff_eq!(r, rgb[0], epsilon = 0.1);
        assert_abs_diff_eq!(g, rgb[1], epsilon = 0.1);
        assert_abs_diff_eq!(b, rgb[2], epsilon = 0.1);
    }
}

#[test]
fn row_weighting_is_symmetric() {
    for avgheight in [1.0, 3.0, 5.0, 6.5, 7.0, 12.0] {
        for height in 1..50 {
            let levels = level_indices(height, avgheight);
            assert_eq!(levels.len(), height);
            for i in 0..height {
                assert_eq!(levels[i], levels[height - 1 - i], "height {height}, row {i}");
            }
        }
    }

    let table = LevelTable::new(8.0, 1000.0);
    for height in 1..=MAX_LINEHEIGHT {
        let row = table.row(height);
        for i in 0..height {
            assert_eq!(row[i], row[height - 1 - i]);
        }
    }
}
