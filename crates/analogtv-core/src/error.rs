use thiserror::Error;

/// Construction-time failures of the simulated TV set.
///
/// Frame-time resource exhaustion is not represented here: a frame whose
/// image buffer cannot be allocated is skipped and logged instead.
#[derive(Debug, Error)]
pub enum TvError {
    #[error("cannot decompose {channel} mask {mask:#010x} into shift and precision")]
    UnsupportedVisual { channel: &'static str, mask: u32 },

    #[error("unsupported pixel depth: {0} bits per pixel")]
    UnsupportedDepth(u32),

    #[error("colormap exhausted after allocating {allocated} colors")]
    ColormapExhausted { allocated: usize },

    #[error("indexed color requested without a colormap")]
    MissingColormap,

    #[error("worker thread count must be at least 1")]
    InvalidThreadCount,

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("source image is {width}x{height} but holds {len} bytes")]
    InputSize { width: usize, height: usize, len: usize },

    #[error("bad XPM at line {line}: {reason}")]
    InvalidXpm { line: usize, reason: &'static str },
}

pub type Result<T> = std::result::Result<T, TvError>;
