/// Seed used by [`Buffer::new`](crate::Buffer::new).
pub const DEFAULT_SEED: u64 = 0x5eed_0f_d17e5;

const MAX_U32: f64 = u32::MAX as f64;

/// Xorshift128 generator used to dither reconstructed floats.
///
/// Not cryptographic and not thread safe; each scratch buffer owns one.
#[derive(Debug, Clone)]
pub struct Rng {
    w: u32,
    x: u32,
    y: u32,
    z: u32,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self {
            w: seed as u32,
            x: 123_456_789,
            y: 362_436_069,
            z: 521_288_629,
        }
    }

    #[inline]
    fn step(&mut self) -> u32 {
        let t = self.x ^ (self.x << 11);
        self.x = self.y;
        self.y = self.z;
        self.z = self.w;
        self.w = self.w ^ (self.w >> 19) ^ (t ^ (t >> 8));
        self.w
    }

    /// Uniform draw in `[0, 1)`.
    #[inline]
    pub fn uniform(&mut self) -> f64 {
        loop {
            let r = (u32::MAX - self.step()) as f64 / MAX_U32;
            if r < 1.0 {
                return r;
            }
        }
    }

    /// Overwrite every element of `target` with a fresh uniform draw.
    pub fn fill_uniform(&mut self, target: &mut [f64]) {
        for t in target.iter_mut() {
            *t = self.uniform();
        }
    }
}

impl Default for Rng {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}
