//! Station logos keyed over a source.

use crate::error::{Result, TvError};
use crate::input::Input;
use crate::signal::{BLACK_LEVEL, BOT, PIC_END, PIC_START, TOP, WHITE_LEVEL};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logo {
    pub width: usize,
    pub height: usize,
    /// Row-major, `None` where transparent.
    pub pixels: Vec<Option<[u8; 3]>>,
}

impl Logo {
    /// Parse an XPM image given as its string lines (header, colors, rows).
    /// Only one character per pixel and `c` color keys are supported.
    pub fn from_xpm(lines: &[&str]) -> Result<Self> {
        let bad = |line: usize, reason: &'static str| TvError::InvalidXpm { line, reason };

        let header = lines.first().ok_or_else(|| bad(0, "missing header"))?;
        let values: Vec<usize> = header
            .split_whitespace()
            .take(4)
            .map(str::parse)
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| bad(0, "header is not four numbers"))?;
        let [width, height, ncolors, nbytes] = values[..] else {
            return Err(bad(0, "header is not four numbers"));
        };
        if !(1..=255).contains(&ncolors) {
            return Err(bad(0, "color count out of range"));
        }
        if nbytes != 1 {
            return Err(bad(0, "only one character per pixel is supported"));
        }

        let mut cmap: [Option<Option<[u8; 3]>>; 256] = [None; 256];
        for n in 1..=ncolors {
            let line = lines.get(n).ok_or_else(|| bad(n, "missing color"))?;
            let (&key, rest) = line.as_bytes().split_first().ok_or_else(|| bad(n, "empty color"))?;
            let rest = std::str::from_utf8(rest).map_err(|_| bad(n, "color is not text"))?;
            let mut tokens = rest.split_whitespace();
            while let Some(which) = tokens.next() {
                let value = tokens.next().ok_or_else(|| bad(n, "color key without a value"))?;
                let color = if value.eq_ignore_ascii_case("none") {
                    None
                } else {
                    Some(parse_hex(value).ok_or_else(|| bad(n, "color is not #rrggbb"))?)
                };
                match which {
                    "c" => cmap[usize::from(key)] = Some(color),
                    "m" => {}
                    _ => return Err(bad(n, "unknown color key")),
                }
            }
        }

        let mut pixels = Vec::new();
        for y in 0..height {
            let n = 1 + ncolors + y;
            let row = lines.get(n).ok_or_else(|| bad(n, "missing pixel row"))?.as_bytes();
            if row.len() < width {
                return Err(bad(n, "pixel row too short"));
            }
            for &c in &row[..width] {
                pixels.push(cmap[usize::from(c)].ok_or_else(|| bad(n, "undefined color"))?);
            }
        }

        Ok(Self { width, height, pixels })
    }

    /// Build from 8-bit RGBA rows. Any nonzero alpha is opaque.
    pub fn from_rgba(width: usize, height: usize, data: &[u8]) -> Result<Self> {
        if data.len() != width * height * 4 {
            return Err(TvError::InputSize {
                width,
                height,
                len: data.len(),
            });
        }
        let pixels = data
            .chunks_exact(4)
            .map(|px| (px[3] != 0).then_some([px[0], px[1], px[2]]))
            .collect();
        Ok(Self { width, height, pixels })
    }
}

fn parse_hex(value: &str) -> Option<[u8; 3]> {
    let hex = value.strip_prefix('#').unwrap_or(value);
    if hex.len() != 6 {
        return None;
    }
    let channel = |at: usize| u8::from_str_radix(hex.get(at..at + 2)?, 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

fn encode_cycle([r, g, b]: [u8; 3]) -> [i8; 4] {
    let (r, g, b) = (i32::from(r), i32::from(g), i32::from(b));
    let y = (5 * r + 11 * g + 2 * b) / 64;
    let i = (10 * r - 4 * g - 5 * b) / 64;
    let q = (3 * r - 8 * g + 5 * b) / 64;
    [y + q, y - i, y - q, y + i].map(|v| v.clamp(BLACK_LEVEL, WHITE_LEVEL) as i8)
}

impl Input {
    /// Key `logo` over the picture with its top-left corner at sample `left`
    /// of line `top`. Pixels outside the visible picture are dropped.
    pub fn draw_logo(&mut self, logo: &Logo, left: usize, top: usize) {
        let mut edit = self.edit();
        for (y, row) in logo.pixels.chunks_exact(logo.width.max(1)).enumerate() {
            let tvy = y + top;
            if !(TOP..BOT).contains(&tvy) {
                continue;
            }
            let sig = edit.line_mut(tvy);
            for (x, px) in row.iter().enumerate() {
                let tvx = x * 4 + left;
                let Some(rgb) = px else { continue };
                if tvx < PIC_START || tvx + 4 > PIC_END {
                    continue;
                }
                let ntsc = encode_cycle(*rgb);
                for col in tvx..tvx + 4 {
                    sig[col] = ntsc[col & 3];
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARROW: [&str; 5] = ["3 2 2 1", "r c #ff0000", ". c None", "r.r", ".r."];

    #[test]
    fn parses_colors_and_transparency() {
        let logo = Logo::from_xpm(&ARROW).unwrap();
        assert_eq!((logo.width, logo.height), (3, 2));
        assert_eq!(logo.pixels[0], Some([255, 0, 0]));
        assert_eq!(logo.pixels[1], None);
        assert_eq!(logo.pixels[4], Some([255, 0, 0]));
    }

    #[test]
    fn rejects_malformed_xpm() {
        let wide = ["1 1 1 2", "aa c #000000", "aa"];
        let undefined = ["1 1 1 1", "a c #000000", "b"];
        let short = ["2 1 1 1", "a c #000000", "a"];
        for lines in [&wide[..], &undefined[..], &short[..], &[][..]] {
            assert!(matches!(Logo::from_xpm(lines), Err(TvError::InvalidXpm { .. })));
        }
    }

    #[test]
    fn red_encodes_with_chroma() {
        assert_eq!(encode_cycle([255, 0, 0]), [30, 10, 10, 58]);
        assert_eq!(encode_cycle([0, 0, 0]), [10; 4]);
    }

    #[test]
    fn transparent_pixels_keep_the_source() {
        let logo = Logo::from_xpm(&ARROW).unwrap();
        let mut input = Input::new();
        input.setup_sync(true, false);
        let before = input.clone();
        input.draw_logo(&logo, 200, 50);

        assert_eq!(&input.line(50)[200..204], &[30, 10, 10, 58]);
        assert_eq!(&input.line(50)[204..208], &before.line(50)[204..208]);
        assert_eq!(&input.line(51)[200..204], &before.line(51)[200..204]);
        assert_eq!(input.line(52), before.line(52));
        assert!(input.is_wrapped());
    }

    #[test]
    fn alpha_mask_marks_transparency() {
        let data = [1, 2, 3, 255, 9, 9, 9, 0];
        let logo = Logo::from_rgba(2, 1, &data).unwrap();
        assert_eq!(logo.pixels, vec![Some([1, 2, 3]), None]);
        assert!(Logo::from_rgba(2, 2, &data).is_err());
    }
}
