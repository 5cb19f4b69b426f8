//! Destination pixel formats, the frame image and the display surface it is
//! presented to.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, TvError};
use crate::signal::CV_MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteOrder {
    LsbFirst,
    MsbFirst,
}

impl ByteOrder {
    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            Self::LsbFirst
        } else {
            Self::MsbFirst
        }
    }
}

/// Memory layout of one destination pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelFormat {
    pub bits_per_pixel: u32,
    pub byte_order: ByteOrder,
    pub red_mask: u32,
    pub green_mask: u32,
    pub blue_mask: u32,
}

impl PixelFormat {
    /// 8 bits per channel, red in the lowest byte, native order.
    pub fn rgba32() -> Self {
        Self {
            bits_per_pixel: 32,
            byte_order: ByteOrder::native(),
            red_mask: 0x0000_00ff,
            green_mask: 0x0000_ff00,
            blue_mask: 0x00ff_0000,
        }
    }

    pub fn rgb565() -> Self {
        Self {
            bits_per_pixel: 16,
            byte_order: ByteOrder::native(),
            red_mask: 0xf800,
            green_mask: 0x07e0,
            blue_mask: 0x001f,
        }
    }

    /// Palette indices, one byte each.
    pub fn indexed8() -> Self {
        Self {
            bits_per_pixel: 8,
            byte_order: ByteOrder::native(),
            red_mask: 0,
            green_mask: 0,
            blue_mask: 0,
        }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.bits_per_pixel.div_ceil(8) as usize
    }

    pub fn bytes_per_line(&self, width: usize) -> usize {
        (width * self.bits_per_pixel as usize).div_ceil(8)
    }

    pub fn validate(&self) -> Result<()> {
        match self.bits_per_pixel {
            8 | 16 | 24 | 32 => Ok(()),
            other => Err(TvError::UnsupportedDepth(other)),
        }
    }

    /// Pack a pixel value into `dst` in this format's byte order.
    pub fn put_pixel(&self, dst: &mut [u8], pixel: u32) {
        let n = self.bytes_per_pixel();
        let bytes = match self.byte_order {
            ByteOrder::LsbFirst => pixel.to_le_bytes(),
            ByteOrder::MsbFirst => pixel.to_be_bytes(),
        };
        match self.byte_order {
            ByteOrder::LsbFirst => dst[..n].copy_from_slice(&bytes[..n]),
            ByteOrder::MsbFirst => dst[..n].copy_from_slice(&bytes[4 - n..]),
        }
    }

    pub fn get_pixel(&self, src: &[u8]) -> u32 {
        let n = self.bytes_per_pixel();
        let mut bytes = [0u8; 4];
        match self.byte_order {
            ByteOrder::LsbFirst => {
                bytes[..n].copy_from_slice(&src[..n]);
                u32::from_le_bytes(bytes)
            }
            ByteOrder::MsbFirst => {
                bytes[4 - n..].copy_from_slice(&src[..n]);
                u32::from_be_bytes(bytes)
            }
        }
    }

    /// Expand a pixel value to 8-bit RGB through the channel masks.
    pub fn unpack_rgb8(&self, pixel: u32) -> [u8; 3] {
        [self.red_mask, self.green_mask, self.blue_mask].map(|mask| {
            if mask == 0 {
                return 0;
            }
            let shift = mask.trailing_zeros();
            let bits = (mask >> shift).count_ones();
            let value = (pixel & mask) >> shift;
            ((value * 255 + ((1 << bits) - 1) / 2) / ((1 << bits) - 1)) as u8
        })
    }
}

/// Bit position and lost precision of one color channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLayout {
    pub shift: u32,
    pub invprec: u32,
}

impl ChannelLayout {
    /// Find the contiguous mask of 1..16 bits that equals `mask`.
    pub fn decompose(channel: &'static str, mask: u32) -> Result<Self> {
        for shift in 0..32u32 {
            for prec in 1..16u32 {
                if prec >= 40 - shift {
                    break;
                }
                let candidate = (0xffffu64 >> (16 - prec)) << shift;
                if candidate == u64::from(mask) {
                    return Ok(Self {
                        shift,
                        invprec: 16 - prec,
                    });
                }
            }
        }
        Err(TvError::UnsupportedVisual { channel, mask })
    }
}

/// Gamma-corrected, pre-shifted pixel contributions per channel.
#[derive(Debug, Clone)]
pub struct GammaTables {
    pub red: Vec<u32>,
    pub green: Vec<u32>,
    pub blue: Vec<u32>,
}

impl GammaTables {
    pub fn new(format: &PixelFormat) -> Result<Self> {
        let red = ChannelLayout::decompose("red", format.red_mask)?;
        let green = ChannelLayout::decompose("green", format.green_mask)?;
        let blue = ChannelLayout::decompose("blue", format.blue_mask)?;

        let intensity: Vec<u32> = (0..CV_MAX)
            .map(|i| ((i as f64 / 256.0).powf(0.8) * 65535.0).min(65535.0) as u32)
            .collect();
        let table = |layout: ChannelLayout| -> Vec<u32> {
            intensity
                .iter()
                .map(|&v| (v >> layout.invprec) << layout.shift)
                .collect()
        };

        Ok(Self {
            red: table(red),
            green: table(green),
            blue: table(blue),
        })
    }

    /// Pixel value for channel intensities already scaled to table steps.
    pub fn pixel(&self, r: f64, g: f64, b: f64) -> u32 {
        let idx = |v: f64| (v as usize).min(CV_MAX - 1);
        self.red[idx(r)] | self.green[idx(g)] | self.blue[idx(b)]
    }
}

/// The frame the rasterizer draws into.
#[derive(Debug, Clone)]
pub struct Image {
    pub width: usize,
    pub height: usize,
    pub bytes_per_line: usize,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl Image {
    /// Allocate a zeroed image, or `None` when memory is short.
    pub fn try_new(width: usize, height: usize, format: PixelFormat) -> Option<Self> {
        let bytes_per_line = format.bytes_per_line(width);
        let len = bytes_per_line * height;
        let mut data = Vec::new();
        if let Err(err) = data.try_reserve_exact(len) {
            warn!(width, height, %err, "image allocation failed");
            return None;
        }
        data.resize(len, 0);
        Some(Self {
            width,
            height,
            bytes_per_line,
            format,
            data,
        })
    }

    pub fn row(&self, y: usize) -> &[u8] {
        &self.data[y * self.bytes_per_line..(y + 1) * self.bytes_per_line]
    }

    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        let bpp = self.format.bytes_per_pixel();
        self.format.get_pixel(&self.row(y)[x * bpp..])
    }
}

/// Where finished frames are shown.
pub trait Surface {
    fn clear(&mut self);

    fn clear_area(&mut self, x: i32, y: i32, width: usize, height: usize);

    fn put_image(&mut self, image: &Image, src_y: usize, dst_x: i32, dst_y: i32, width: usize, height: usize);
}

/// In-memory surface with the same pixel format as the images it receives.
#[derive(Debug, Clone)]
pub struct Canvas {
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
    pub data: Vec<u8>,
    bytes_per_line: usize,
}

impl Canvas {
    pub fn new(width: usize, height: usize, format: PixelFormat) -> Self {
        let bytes_per_line = format.bytes_per_line(width);
        Self {
            width,
            height,
            format,
            data: vec![0; bytes_per_line * height],
            bytes_per_line,
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        let at = y * self.bytes_per_line + x * self.format.bytes_per_pixel();
        self.format.get_pixel(&self.data[at..])
    }

    pub fn rgb8(&self, x: usize, y: usize) -> [u8; 3] {
        self.format.unpack_rgb8(self.pixel(x, y))
    }

    /// Packed 8-bit RGB copy of the whole canvas.
    pub fn to_rgb8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.width * self.height * 3);
        for y in 0..self.height {
            for x in 0..self.width {
                out.extend_from_slice(&self.rgb8(x, y));
            }
        }
        out
    }

    fn clip(&self, x: i32, y: i32, width: usize, height: usize) -> Option<(usize, usize, usize, usize)> {
        let x0 = x.max(0) as usize;
        let y0 = y.max(0) as usize;
        let x1 = (i64::from(x) + width as i64).clamp(0, self.width as i64) as usize;
        let y1 = (i64::from(y) + height as i64).clamp(0, self.height as i64) as usize;
        (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
    }
}

impl Surface for Canvas {
    fn clear(&mut self) {
        self.data.fill(0);
    }

    fn clear_area(&mut self, x: i32, y: i32, width: usize, height: usize) {
        let Some((x0, y0, x1, y1)) = self.clip(x, y, width, height) else {
            return;
        };
        let bpp = self.format.bytes_per_pixel();
        for row in y0..y1 {
            let at = row * self.bytes_per_line;
            self.data[at + x0 * bpp..at + x1 * bpp].fill(0);
        }
    }

    fn put_image(&mut self, image: &Image, src_y: usize, dst_x: i32, dst_y: i32, width: usize, height: usize) {
        debug_assert_eq!(image.format, self.format);
        let Some((x0, y0, x1, y1)) = self.clip(dst_x, dst_y, width, height) else {
            return;
        };
        let bpp = self.format.bytes_per_pixel();
        for row in y0..y1 {
            let sy = (row as i64 - i64::from(dst_y)) as usize + src_y;
            let sx = (x0 as i64 - i64::from(dst_x)) as usize;
            if sy >= image.height {
                break;
            }
            let n = (x1 - x0).min(image.width.saturating_sub(sx));
            let src = &image.row(sy)[sx * bpp..(sx + n) * bpp];
            let at = row * self.bytes_per_line + x0 * bpp;
            self.data[at..at + n * bpp].copy_from_slice(src);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decompose_common_masks() {
        assert_eq!(
            ChannelLayout::decompose("red", 0xf800).unwrap(),
            ChannelLayout { shift: 11, invprec: 11 }
        );
        assert_eq!(
            ChannelLayout::decompose("blue", 0x00ff_0000).unwrap(),
            ChannelLayout { shift: 16, invprec: 8 }
        );
        assert!(matches!(
            ChannelLayout::decompose("green", 0x0f0f),
            Err(TvError::UnsupportedVisual { channel: "green", .. })
        ));
    }

    #[test]
    fn pixels_pack_in_byte_order() {
        let mut buf = [0u8; 4];
        let mut format = PixelFormat::rgba32();
        format.byte_order = ByteOrder::MsbFirst;
        format.bits_per_pixel = 24;
        format.put_pixel(&mut buf, 0x00a1_b2c3);
        assert_eq!(&buf[..3], &[0xa1, 0xb2, 0xc3]);
        assert_eq!(format.get_pixel(&buf), 0x00a1_b2c3);

        format.byte_order = ByteOrder::LsbFirst;
        format.put_pixel(&mut buf, 0x00a1_b2c3);
        assert_eq!(&buf[..3], &[0xc3, 0xb2, 0xa1]);
    }

    #[test]
    fn gamma_tables_saturate() {
        let tables = GammaTables::new(&PixelFormat::rgba32()).unwrap();
        assert_eq!(tables.red[0], 0);
        assert_eq!(tables.red[256], 0xff);
        assert_eq!(tables.green[CV_MAX - 1], 0xff00);
        assert_eq!(tables.pixel(5000.0, 0.0, 0.0), 0xff);
    }

    #[test]
    fn canvas_clips_put_image() {
        let format = PixelFormat::rgba32();
        let mut image = Image::try_new(4, 4, format).unwrap();
        image.data.fill(0xff);
        let mut canvas = Canvas::new(3, 3, format);
        canvas.put_image(&image, 1, -2, 1, 4, 3);
        assert_eq!(canvas.pixel(0, 0), 0);
        assert_eq!(canvas.pixel(1, 1), 0xffff_ffff);
        assert_eq!(canvas.pixel(2, 2), 0);
        canvas.clear_area(0, 0, 10, 10);
        assert!(canvas.data.iter().all(|&b| b == 0));
    }
}
