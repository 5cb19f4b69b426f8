//! Indexed-color support for displays that only offer a colormap.

use tracing::{debug, warn};

use crate::error::{Result, TvError};

/// A colormap that hands out pixel values for 16-bit RGB requests.
pub trait ColorAllocator {
    fn alloc_color(&mut self, r: u16, g: u16, b: u16) -> Option<u32>;

    fn free_colors(&mut self, pixels: &[u32]);
}

/// Colormap with a fixed number of free cells.
#[derive(Debug, Clone)]
pub struct LimitedColormap {
    capacity: usize,
    cells: Vec<Option<[u16; 3]>>,
}

impl LimitedColormap {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            cells: Vec::new(),
        }
    }

    pub fn allocated(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn color(&self, pixel: u32) -> Option<[u16; 3]> {
        self.cells.get(pixel as usize).copied().flatten()
    }
}

impl ColorAllocator for LimitedColormap {
    fn alloc_color(&mut self, r: u16, g: u16, b: u16) -> Option<u32> {
        if let Some(free) = self.cells.iter().position(Option::is_none) {
            self.cells[free] = Some([r, g, b]);
            return Some(free as u32);
        }
        if self.cells.len() < self.capacity {
            self.cells.push(Some([r, g, b]));
            return Some(self.cells.len() as u32 - 1);
        }
        None
    }

    fn free_colors(&mut self, pixels: &[u32]) {
        for &pixel in pixels {
            if let Some(cell) = self.cells.get_mut(pixel as usize) {
                *cell = None;
            }
        }
    }
}

/// Quantization levels of the Y, I and Q axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Levels {
    pub y: usize,
    pub i: usize,
    pub q: usize,
}

impl Default for Levels {
    fn default() -> Self {
        Self { y: 10, i: 5, q: 5 }
    }
}

impl Levels {
    pub fn count(&self) -> usize {
        self.y * self.i * self.q
    }

    fn degrade(&mut self) {
        if self.q > (self.y * 4 / 12).max(1) {
            self.q -= 1;
        } else if self.i > (self.y * 5 / 12).max(1) {
            self.i -= 1;
        } else {
            self.y -= 1;
        }
    }

    /// Palette index of a quantized color.
    pub fn index(&self, yli: usize, ili: usize, qli: usize) -> usize {
        qli + self.q * (ili + self.i * yli)
    }
}

/// Allocated colors covering a Y×I×Q grid.
#[derive(Debug, Clone)]
pub struct Palette {
    pub levels: Levels,
    pub pixels: Vec<u32>,
}

impl Palette {
    /// Allocate the full grid, shrinking it until the colormap can hold it.
    pub fn allocate<A: ColorAllocator + ?Sized>(allocator: &mut A) -> Result<Self> {
        let mut levels = Levels::default();
        loop {
            match Self::try_allocate(allocator, levels) {
                Ok(pixels) => {
                    debug!(y = levels.y, i = levels.i, q = levels.q, "colormap allocated");
                    return Ok(Self { levels, pixels });
                }
                Err(allocated) => {
                    allocator.free_colors(&allocated);
                    levels.degrade();
                    warn!(y = levels.y, i = levels.i, q = levels.q, "colormap full, reducing levels");
                    if levels.y < 2 {
                        return Err(TvError::ColormapExhausted {
                            allocated: allocated.len(),
                        });
                    }
                }
            }
        }
    }

    fn try_allocate<A: ColorAllocator + ?Sized>(
        allocator: &mut A,
        levels: Levels,
    ) -> std::result::Result<Vec<u32>, Vec<u32>> {
        let mut pixels = Vec::with_capacity(levels.count());
        for yli in 0..levels.y {
            for ili in 0..levels.i {
                for qli in 0..levels.q {
                    let [r, g, b] = grid_color(levels, yli, ili, qli);
                    match allocator.alloc_color(r, g, b) {
                        Some(pixel) => pixels.push(pixel),
                        None => return Err(pixels),
                    }
                }
            }
        }
        Ok(pixels)
    }

    pub fn release<A: ColorAllocator + ?Sized>(self, allocator: &mut A) {
        allocator.free_colors(&self.pixels);
    }

    /// Pixel for a background cell.
    pub fn background(&self) -> u32 {
        self.pixels.first().copied().unwrap_or(0)
    }
}

fn grid_color(levels: Levels, yli: usize, ili: usize, qli: usize) -> [u16; 3] {
    const LEVELMULT: f64 = 700.0;
    let y = 100.0 * (yli as f64 / levels.y as f64);
    let i = 50.0 * ((ili as f64 - 0.5 * levels.i as f64) / levels.i as f64);
    let q = 50.0 * ((qli as f64 - 0.5 * levels.q as f64) / levels.q as f64);

    let channel = |v: f64| (v * LEVELMULT).clamp(0.0, 65535.0) as u16;
    [
        channel(y + 1.04 * i + 0.624 * q),
        channel(y - 0.276 * i - 0.639 * q),
        channel(y - 1.105 * i + 1.729 * q),
    ]
}
