use rand::Rng;

use crate::font::Font;
use crate::input::{lcp_to_ntsc, Input};
use crate::signal::{PIC_END, PIC_START, TOP, V, VISLINES, VIS_LEN, VIS_START, WHITE_LEVEL};

type Bar = (f64, f64, f64);

const TOP_BARS: [Bar; 7] = [
    (75.0, 0.0, 0.0),
    (69.0, 31.0, 167.0),
    (56.0, 44.0, 283.5),
    (48.0, 41.0, 240.5),
    (36.0, 41.0, 60.5),
    (28.0, 44.0, 103.5),
    (15.0, 31.0, 347.0),
];

const CASTELLATIONS: [Bar; 7] = [
    (15.0, 31.0, 347.0),
    (7.0, 0.0, 0.0),
    (36.0, 41.0, 60.5),
    (7.0, 0.0, 0.0),
    (56.0, 44.0, 283.5),
    (7.0, 0.0, 0.0),
    (75.0, 0.0, 0.0),
];

/// Bottom row as `(left, right, bar)`: -I, white, +Q, black and the PLUGE.
const BOTTOM_ROW: [(f64, f64, Bar); 8] = [
    (0.0, 1.0 / 6.0, (7.0, 40.0, 303.0)),
    (1.0 / 6.0, 2.0 / 6.0, (100.0, 0.0, 0.0)),
    (2.0 / 6.0, 3.0 / 6.0, (7.0, 40.0, 33.0)),
    (3.0 / 6.0, 4.0 / 6.0, (7.0, 0.0, 0.0)),
    (12.0 / 18.0, 13.0 / 18.0, (3.0, 0.0, 0.0)),
    (13.0 / 18.0, 14.0 / 18.0, (7.0, 0.0, 0.0)),
    (14.0 / 18.0, 15.0 / 18.0, (11.0, 0.0, 0.0)),
    (5.0 / 6.0, 1.0, (7.0, 0.0, 0.0)),
];

/// SMPTE color bars with colorburst and a teletext band.
pub fn smpte_colorbars<R: Rng>(input: &mut Input, rng: &mut R) {
    input.setup_sync(true, false);
    input.setup_teletext(rng);

    for (col, (top, mid)) in TOP_BARS.iter().zip(&CASTELLATIONS).enumerate() {
        let left = col as f64 / 7.0;
        let right = (col + 1) as f64 / 7.0;
        input.draw_solid_rel_lcp(left, right, 0.00, 0.68, top.0, top.1, top.2);
        input.draw_solid_rel_lcp(left, right, 0.68, 0.75, mid.0, mid.1, mid.2);
    }
    for &(left, right, (luma, chroma, phase)) in &BOTTOM_ROW {
        input.draw_solid_rel_lcp(left, right, 0.75, 1.00, luma, chroma, phase);
    }
}

/// One flat color over the whole picture area, with colorburst.
pub fn flat_field(input: &mut Input, luma: f64, chroma: f64, phase: f64) {
    input.setup_sync(true, false);
    input.draw_solid(PIC_START, PIC_END, 10, V, lcp_to_ntsc(luma, chroma, phase));
}

/// White text centered on a dark blue field, one entry of `lines` per row.
pub fn text_card(input: &mut Input, font: &Font, lines: &[&str]) {
    flat_field(input, 20.0, 16.0, 347.0);
    let white = [WHITE_LEVEL as i8; 4];
    let row_height = (font.char_h * font.y_mult) as i64;
    let center = (VIS_START + VIS_LEN / 2) as i64;
    let mut y = (TOP + VISLINES / 2) as i64 - row_height * lines.len() as i64 / 2;
    for line in lines {
        input.draw_string_centered(font, line, center, y, white);
        y += row_height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{BLACK_LEVEL, H};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn bars_fill_the_visible_area() {
        let mut input = Input::new();
        smpte_colorbars(&mut input, &mut SmallRng::seed_from_u64(3));
        assert!(input.is_wrapped());

        // Middle of the gray bar, top left.
        let line = input.line(TOP + 20);
        let x = (VIS_START + VIS_LEN / 14) & !3;
        assert_eq!(&line[x..x + 4], &[75, 75, 75, 75]);

        // White bar in the bottom row.
        let line = input.line(TOP + VISLINES * 9 / 10);
        let x = (VIS_START + VIS_LEN / 4) & !3;
        assert_eq!(&line[x..x + 4], &[100, 100, 100, 100]);
    }

    #[test]
    fn flat_field_covers_picture_only() {
        let mut input = Input::new();
        flat_field(&mut input, 55.0, 0.0, 0.0);
        let line = input.line(100);
        assert!(line[PIC_START..PIC_END].iter().all(|&s| s == 55));
        assert_eq!(line[PIC_START - 1], 0);
        assert_eq!(input.line(8)[PIC_START], BLACK_LEVEL as i8);
        assert_eq!(input.samples().len(), (V + 2) * H);
    }

    #[test]
    fn text_card_writes_white_near_the_middle() {
        let mut input = Input::new();
        text_card(&mut input, &Font::builtin(), &["CH 3"]);
        let mid = TOP + VISLINES / 2;
        let white = (mid - 12..mid + 12)
            .flat_map(|y| input.line(y)[VIS_START..VIS_START + VIS_LEN].to_vec())
            .filter(|&s| s == WHITE_LEVEL as i8)
            .count();
        assert!(white > 0);
        assert!(input.line(TOP + 5)[VIS_START..VIS_START + VIS_LEN].iter().all(|&s| s != WHITE_LEVEL as i8));
    }
}
