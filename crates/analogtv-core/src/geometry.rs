use crate::signal::VISLINES;

/// Smallest picture drawn, the native resolution of the set.
pub const MIN_WIDTH: usize = 266;
pub const MIN_HEIGHT: usize = 200;

const ASPECT: f32 = 4.0 / 3.0;
const ASPECT_SLACK: f32 = 0.15;
const HEIGHT_SNAP: f32 = 0.025;

/// Placement of the picture inside the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub window_width: usize,
    pub window_height: usize,
    pub usewidth: usize,
    pub useheight: usize,
    /// Horizontal pixel replication.
    pub xrepl: usize,
    /// Distinct columns computed per row, `usewidth / xrepl`.
    pub subwidth: usize,
    pub screen_xo: i32,
    pub screen_yo: i32,
}

impl Geometry {
    /// Fit a 4:3 picture into a window.
    ///
    /// Windows within 15% of 4:3 are filled exactly. Wider or taller ones
    /// are pillar- or letter-boxed. A height within 2.5% of a whole number
    /// of scan lines per line is snapped to it.
    pub fn fit(window_width: usize, window_height: usize) -> Self {
        let min_ratio = ASPECT * (1.0 - ASPECT_SLACK);
        let max_ratio = ASPECT * (1.0 + ASPECT_SLACK);

        let mut wlim = window_width;
        let mut hlim = window_height;
        let ratio = wlim as f32 / hlim.max(1) as f32;

        if wlim < MIN_WIDTH || hlim < MIN_HEIGHT {
            wlim = MIN_WIDTH;
            hlim = MIN_HEIGHT;
        } else if ratio > max_ratio {
            wlim = (hlim as f32 * max_ratio) as usize;
        } else if ratio < min_ratio {
            hlim = (wlim as f32 / min_ratio) as usize;
        }

        let half = VISLINES as i64 / 2;
        let height_diff = ((hlim as i64 + half) % VISLINES as i64) - half;
        if height_diff != 0 && (height_diff.abs() as f32) < hlim as f32 * HEIGHT_SNAP {
            hlim = (hlim as i64 - height_diff) as usize;
        }

        let xrepl = (1 + wlim / 640).min(2);
        Self {
            window_width,
            window_height,
            usewidth: wlim,
            useheight: hlim,
            xrepl,
            subwidth: wlim / xrepl,
            screen_xo: (window_width as i32 - wlim as i32) / 2,
            screen_yo: (window_height as i32 - hlim as i32) / 2,
        }
    }

    pub fn same_picture(&self, other: &Geometry) -> bool {
        self.usewidth == other.usewidth && self.useheight == other.useheight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_windows_get_native_size() {
        let g = Geometry::fit(100, 80);
        assert_eq!((g.usewidth, g.useheight), (266, 200));
        assert_eq!((g.screen_xo, g.screen_yo), (-83, -60));
    }

    #[test]
    fn near_four_three_fills_and_snaps() {
        let g = Geometry::fit(1280, 1024);
        assert_eq!((g.usewidth, g.useheight), (1280, 1000));
        assert_eq!(g.xrepl, 2);
        assert_eq!(g.subwidth, 640);
        assert_eq!(g.screen_yo, 12);
    }

    #[test]
    fn wide_windows_are_pillarboxed() {
        let g = Geometry::fit(1920, 1080);
        assert_eq!(g.useheight, 1080);
        assert_eq!(g.usewidth, (1080.0 * ASPECT * 1.15) as usize);
        assert!(g.screen_xo > 0);
    }
}
