#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Yiq {
    pub y: f32,
    pub i: f32,
    pub q: f32,
}

pub fn rgb_to_yiq(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let y = 0.30 * r + 0.59 * g + 0.11 * b;
    let i = 0.60 * r - 0.28 * g - 0.32 * b;
    let q = 0.21 * r - 0.52 * g + 0.31 * b;
    (y, i, q)
}

/// Receiver decoding matrix, the inverse of [`rgb_to_yiq`].
pub fn yiq_to_rgb(y: f64, i: f64, q: f64) -> (f64, f64, f64) {
    let r = y + 0.948 * i + 0.624 * q;
    let g = y - 0.276 * i - 0.639 * q;
    let b = y - 1.105 * i + 1.729 * q;
    (r, g, b)
}

const LCG_MUL: u32 = 1_103_515_245;
const LCG_INC: u32 = 12_345;

/// The 32-bit linear congruential noise source. One state per sample
/// position, so a worker can seek to its range start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FastRng {
    state: u32,
}

impl FastRng {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn state(&self) -> u32 {
        self.state
    }

    pub fn step(&mut self) {
        self.state = self.state.wrapping_mul(LCG_MUL).wrapping_add(LCG_INC);
    }

    pub fn centered(&self) -> i32 {
        self.state.wrapping_sub(0x7fff_ffff) as i32
    }

    /// Advance `n` steps in O(log n) by squaring the affine map.
    pub fn seek(&mut self, mut n: u64) {
        let (mut mul, mut inc) = (LCG_MUL, LCG_INC);
        let (mut acc_mul, mut acc_inc) = (1u32, 0u32);
        while n > 0 {
            if n & 1 == 1 {
                acc_mul = acc_mul.wrapping_mul(mul);
                acc_inc = acc_inc.wrapping_mul(mul).wrapping_add(inc);
            }
            inc = inc.wrapping_mul(mul).wrapping_add(inc);
            mul = mul.wrapping_mul(mul);
            n >>= 1;
        }
        self.state = self.state.wrapping_mul(acc_mul).wrapping_add(acc_inc);
    }

    pub fn at(seed: u32, n: u64) -> Self {
        let mut rng = Self::new(seed);
        rng.seek(n);
        rng
    }
}

/// 4-pole Butterworth low-pass at 3.5 MHz with an extra zero at the
/// subcarrier. Unity DC gain once scaled by the AGC factor.
#[derive(Debug, Clone, Copy)]
pub struct LumaFilter {
    x: [f64; 7],
    y: [f64; 4],
    gain: f64,
}

impl LumaFilter {
    const INPUT_GAIN: f64 = 0.046_990_425_725_193_5;

    pub fn new(agc: f64) -> Self {
        Self {
            x: [0.0; 7],
            y: [0.0; 4],
            gain: Self::INPUT_GAIN * agc,
        }
    }

    pub fn process(&mut self, input: f64) -> f64 {
        self.x.copy_within(0..6, 1);
        self.x[0] = input * self.gain;
        let x = &self.x;
        let out = (x[6] + x[0])
            + 4.0 * (x[5] + x[1])
            + 7.0 * (x[4] + x[2])
            + 8.0 * x[3]
            - 0.017_664_8 * self.y[3]
            - 0.486_028_8 * self.y[1];
        self.y.copy_within(0..3, 1);
        self.y[0] = out;
        out
    }
}

/// 3-pole low-pass for the I channel, ~1.5 MHz, zero at the subcarrier.
#[derive(Debug, Clone, Copy, Default)]
pub struct WideChromaFilter {
    x: [f64; 6],
    y: [f64; 2],
}

impl WideChromaFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, input: f64) -> f64 {
        self.x.copy_within(0..5, 1);
        self.x[0] = input / 12.0;
        let x = &self.x;
        let out = (x[5] + x[0]) + 3.0 * (x[4] + x[1]) + 4.0 * (x[3] + x[2])
            - 0.333_333_333_3 * self.y[1];
        self.y[1] = self.y[0];
        self.y[0] = out;
        out
    }
}

/// 3-pole Butterworth low-pass for the Q channel at 0.5 MHz, zero at the
/// subcarrier.
#[derive(Debug, Clone, Copy, Default)]
pub struct NarrowChromaFilter {
    x: [f64; 6],
    y: [f64; 3],
}

impl NarrowChromaFilter {
    const A1: f64 = 2.552_116_4;
    const A2: f64 = 2.199_044_9;
    const A3: f64 = 0.637_790_3;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, input: f64) -> f64 {
        let gain = (1.0 - Self::A1 + Self::A2 - Self::A3) / 16.0;
        self.x.copy_within(0..5, 1);
        self.x[0] = input * gain;
        let x = &self.x;
        let out = (x[5] + x[0]) + 3.0 * (x[4] + x[1]) + 4.0 * (x[3] + x[2])
            + Self::A1 * self.y[0]
            - Self::A2 * self.y[1]
            + Self::A3 * self.y[2];
        self.y.copy_within(0..2, 1);
        self.y[0] = out;
        out
    }
}

/// Power-up ramp: 0 before `start` seconds, then an exponential approach
/// with time constant `tc`, overshoot `over`, squared.
pub fn puramp(powerup: f64, tc: f64, start: f64, over: f64) -> f64 {
    let pt = powerup - start;
    if pt < 0.0 {
        return 0.0;
    }
    if pt > 900.0 || pt / tc > 8.0 {
        return 1.0;
    }
    let ret = (1.0 - (-pt / tc).exp()) * over;
    if ret > 1.0 {
        return 1.0;
    }
    ret * ret
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle(mut f: impl FnMut(f64) -> f64, input: f64) -> f64 {
        let mut out = 0.0;
        for _ in 0..4000 {
            out = f(input);
        }
        out
    }

    #[test]
    fn filters_have_unity_dc_gain() {
        let mut luma = LumaFilter::new(1.0);
        let mut wide = WideChromaFilter::new();
        let mut narrow = NarrowChromaFilter::new();
        assert!((settle(|v| luma.process(v), 55.0) - 55.0).abs() < 1e-3);
        assert!((settle(|v| wide.process(v), 10.0) - 10.0).abs() < 1e-3);
        assert!((settle(|v| narrow.process(v), 10.0) - 10.0).abs() < 1e-2);
    }

    #[test]
    fn chroma_filters_reject_the_subcarrier() {
        let mut wide = WideChromaFilter::new();
        let mut narrow = NarrowChromaFilter::new();
        let pattern = [30.0, 12.0, -30.0, -12.0];
        let mut peak = 0.0f64;
        for n in 0..4000 {
            let s = pattern[n % 4];
            let a = wide.process(s);
            let b = narrow.process(s);
            if n > 2000 {
                peak = peak.max(a.abs()).max(b.abs());
            }
        }
        assert!(peak < 1e-3, "subcarrier leaked: {peak}");
    }

    #[test]
    fn puramp_limits() {
        assert_eq!(puramp(0.5, 1.0, 1.0, 1.0), 0.0);
        assert_eq!(puramp(1000.0, 1.0, 0.0, 1.0), 1.0);
        let mid = puramp(1.0, 1.0, 0.0, 1.0);
        assert!(mid > 0.0 && mid < 1.0);
    }
}
