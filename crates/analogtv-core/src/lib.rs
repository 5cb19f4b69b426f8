pub mod config;
pub mod demod;
pub mod dsp;
pub mod error;
pub mod font;
pub mod geometry;
pub mod input;
pub mod logo;
pub mod palette;
pub mod patterns;
pub mod pipeline;
pub mod pool;
pub mod raster;
pub mod reception;
pub mod signal;
pub mod surface;
pub mod sync;
pub mod synth;

pub use config::{EngineConfig, TvControls};
pub use dsp::{rgb_to_yiq, yiq_to_rgb, FastRng, Yiq};
pub use error::{Result, TvError};
pub use font::Font;
pub use geometry::Geometry;
pub use input::{lcp_to_ntsc, Input, RgbImage};
pub use logo::Logo;
pub use palette::{ColorAllocator, LimitedColormap, Palette};
pub use pipeline::{AnalogTv, FramePhase};
pub use reception::{Feed, Reception};
pub use surface::{ByteOrder, Canvas, Image, PixelFormat, Surface};
