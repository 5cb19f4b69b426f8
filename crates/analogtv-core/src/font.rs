//! Bitmap text for test cards.

use crate::input::Input;
use crate::signal::{H, V};

const GLYPHS: usize = 256;

/// Printable ASCII in a 5x7 matrix. Bit 4 is the leftmost column.
const BASIC_GLYPHS: [(u8, [u8; 7]); 62] = [
    (b' ', [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]),
    (b'!', [0x04, 0x04, 0x04, 0x04, 0x04, 0x00, 0x04]),
    (b'"', [0x0a, 0x0a, 0x0a, 0x00, 0x00, 0x00, 0x00]),
    (b'#', [0x0a, 0x0a, 0x1f, 0x0a, 0x1f, 0x0a, 0x0a]),
    (b'%', [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03]),
    (b'&', [0x0c, 0x12, 0x14, 0x08, 0x15, 0x12, 0x0d]),
    (b'\'', [0x04, 0x04, 0x08, 0x00, 0x00, 0x00, 0x00]),
    (b'(', [0x02, 0x04, 0x08, 0x08, 0x08, 0x04, 0x02]),
    (b')', [0x08, 0x04, 0x02, 0x02, 0x02, 0x04, 0x08]),
    (b'*', [0x00, 0x04, 0x15, 0x0e, 0x15, 0x04, 0x00]),
    (b'+', [0x00, 0x04, 0x04, 0x1f, 0x04, 0x04, 0x00]),
    (b',', [0x00, 0x00, 0x00, 0x00, 0x0c, 0x04, 0x08]),
    (b'-', [0x00, 0x00, 0x00, 0x1f, 0x00, 0x00, 0x00]),
    (b'.', [0x00, 0x00, 0x00, 0x00, 0x00, 0x0c, 0x0c]),
    (b'/', [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00]),
    (b'0', [0x0e, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0e]),
    (b'1', [0x04, 0x0c, 0x04, 0x04, 0x04, 0x04, 0x0e]),
    (b'2', [0x0e, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1f]),
    (b'3', [0x1f, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0e]),
    (b'4', [0x02, 0x06, 0x0a, 0x12, 0x1f, 0x02, 0x02]),
    (b'5', [0x1f, 0x10, 0x1e, 0x01, 0x01, 0x11, 0x0e]),
    (b'6', [0x06, 0x08, 0x10, 0x1e, 0x11, 0x11, 0x0e]),
    (b'7', [0x1f, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08]),
    (b'8', [0x0e, 0x11, 0x11, 0x0e, 0x11, 0x11, 0x0e]),
    (b'9', [0x0e, 0x11, 0x11, 0x0f, 0x01, 0x02, 0x0c]),
    (b':', [0x00, 0x0c, 0x0c, 0x00, 0x0c, 0x0c, 0x00]),
    (b';', [0x00, 0x0c, 0x0c, 0x00, 0x0c, 0x04, 0x08]),
    (b'<', [0x02, 0x04, 0x08, 0x10, 0x08, 0x04, 0x02]),
    (b'=', [0x00, 0x00, 0x1f, 0x00, 0x1f, 0x00, 0x00]),
    (b'>', [0x08, 0x04, 0x02, 0x01, 0x02, 0x04, 0x08]),
    (b'?', [0x0e, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04]),
    (b'@', [0x0e, 0x11, 0x01, 0x0d, 0x15, 0x15, 0x0e]),
    (b'A', [0x0e, 0x11, 0x11, 0x11, 0x1f, 0x11, 0x11]),
    (b'B', [0x1e, 0x11, 0x11, 0x1e, 0x11, 0x11, 0x1e]),
    (b'C', [0x0e, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0e]),
    (b'D', [0x1c, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1c]),
    (b'E', [0x1f, 0x10, 0x10, 0x1e, 0x10, 0x10, 0x1f]),
    (b'F', [0x1f, 0x10, 0x10, 0x1e, 0x10, 0x10, 0x10]),
    (b'G', [0x0e, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0f]),
    (b'H', [0x11, 0x11, 0x11, 0x1f, 0x11, 0x11, 0x11]),
    (b'I', [0x0e, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0e]),
    (b'J', [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0c]),
    (b'K', [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11]),
    (b'L', [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1f]),
    (b'M', [0x11, 0x1b, 0x15, 0x15, 0x11, 0x11, 0x11]),
    (b'N', [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11]),
    (b'O', [0x0e, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0e]),
    (b'P', [0x1e, 0x11, 0x11, 0x1e, 0x10, 0x10, 0x10]),
    (b'Q', [0x0e, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0d]),
    (b'R', [0x1e, 0x11, 0x11, 0x1e, 0x14, 0x12, 0x11]),
    (b'S', [0x0f, 0x10, 0x10, 0x0e, 0x01, 0x01, 0x1e]),
    (b'T', [0x1f, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04]),
    (b'U', [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0e]),
    (b'V', [0x11, 0x11, 0x11, 0x11, 0x11, 0x0a, 0x04]),
    (b'W', [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0a]),
    (b'X', [0x11, 0x11, 0x0a, 0x04, 0x0a, 0x11, 0x11]),
    (b'Y', [0x11, 0x11, 0x11, 0x0a, 0x04, 0x04, 0x04]),
    (b'Z', [0x1f, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1f]),
    (b'[', [0x0e, 0x08, 0x08, 0x08, 0x08, 0x08, 0x0e]),
    (b'\\', [0x00, 0x10, 0x08, 0x04, 0x02, 0x01, 0x00]),
    (b']', [0x0e, 0x02, 0x02, 0x02, 0x02, 0x02, 0x0e]),
    (b'_', [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1f]),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Font {
    pub char_w: usize,
    pub char_h: usize,
    /// Samples per glyph column.
    pub x_mult: usize,
    /// Lines per glyph row.
    pub y_mult: usize,
    bits: Vec<bool>,
}

impl Default for Font {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Font {
    /// A font whose glyphs are all blank, to be filled with
    /// [`set_char`](Self::set_char).
    pub fn blank(char_w: usize, char_h: usize) -> Self {
        Self {
            char_w,
            char_h,
            x_mult: 4,
            y_mult: 2,
            bits: vec![false; GLYPHS * char_w * char_h],
        }
    }

    /// The built-in 6x10 font. Lowercase letters use the capital forms.
    pub fn builtin() -> Self {
        let mut font = Self::blank(6, 10);
        for (c, rows) in BASIC_GLYPHS {
            font.load_rows(c, &rows);
            if c.is_ascii_uppercase() {
                font.load_rows(c.to_ascii_lowercase(), &rows);
            }
        }
        font
    }

    fn load_rows(&mut self, c: u8, rows: &[u8; 7]) {
        for (y, row) in rows.iter().enumerate() {
            for x in 0..5 {
                self.set_pixel(c, x, y + 1, row & (0x10 >> x) != 0);
            }
        }
    }

    pub fn pixel(&self, c: u8, x: usize, y: usize) -> bool {
        x < self.char_w && y < self.char_h && self.bits[self.bit(c, x, y)]
    }

    pub fn set_pixel(&mut self, c: u8, x: usize, y: usize, value: bool) {
        if x < self.char_w && y < self.char_h {
            let bit = self.bit(c, x, y);
            self.bits[bit] = value;
        }
    }

    /// Define a glyph from a row-major picture: spaces are off, anything else
    /// is on. A short picture leaves the rest of the glyph untouched.
    pub fn set_char(&mut self, c: u8, picture: &str) {
        let (char_w, char_h) = (self.char_w, self.char_h);
        let cells = (0..char_h).flat_map(|y| (0..char_w).map(move |x| (x, y)));
        for ((x, y), ch) in cells.zip(picture.chars()) {
            self.set_pixel(c, x, y, ch != ' ');
        }
    }

    /// Samples covered by `len` characters.
    pub fn text_width(&self, len: usize) -> usize {
        len * self.char_w * self.x_mult
    }

    fn bit(&self, c: u8, x: usize, y: usize) -> usize {
        (usize::from(c) * self.char_h + y) * self.char_w + x
    }
}

impl Input {
    /// Draw the set pixels of glyph `c` with its top-left corner at sample
    /// `x` of line `y`. Parts outside the frame are clipped.
    pub fn draw_char(&mut self, font: &Font, c: u8, x: i64, y: i64, ntsc: [i8; 4]) {
        let mut edit = self.edit();
        for yc in 0..font.char_h {
            for ys in 0..font.y_mult {
                let Some(line) = clip(y + (yc * font.y_mult + ys) as i64, V) else {
                    continue;
                };
                let sig = edit.line_mut(line);
                for xc in (0..font.char_w).filter(|&xc| font.pixel(c, xc, yc)) {
                    for xs in 0..font.x_mult {
                        if let Some(col) = clip(x + (xc * font.x_mult + xs) as i64, H) {
                            sig[col] = ntsc[col & 3];
                        }
                    }
                }
            }
        }
    }

    pub fn draw_string(&mut self, font: &Font, text: &str, x: i64, y: i64, ntsc: [i8; 4]) {
        let advance = (font.char_w * font.x_mult) as i64;
        for (n, c) in text.bytes().enumerate() {
            self.draw_char(font, c, x + n as i64 * advance, y, ntsc);
        }
    }

    /// [`draw_string`](Self::draw_string) centered horizontally on `x`.
    pub fn draw_string_centered(&mut self, font: &Font, text: &str, x: i64, y: i64, ntsc: [i8; 4]) {
        let width = font.text_width(text.len()) as i64;
        self.draw_string(font, text, x - width / 2, y, ntsc);
    }
}

fn clip(pos: i64, len: usize) -> Option<usize> {
    usize::try_from(pos).ok().filter(|&p| p < len)
}
