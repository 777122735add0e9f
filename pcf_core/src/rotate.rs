//! Histogram statistics over quantized deltas, used to choose a rotation
//! that centers the bulk of the distribution in the middle of a byte so the
//! low byte column stays compact under entropy coding.
//!
//! Standalone: the container format does not record rotations.

/// Dense histogram over `[min, max]` of a delta array, plus its running sum.
#[derive(Debug, Clone, Default)]
pub struct DeltaStats {
    hist: Vec<usize>,
    csum: Vec<usize>,
    min: i64,
    max: i64,
}

fn expand(v: &mut Vec<usize>, n: usize) {
    if n <= v.len() {
        v.truncate(n);
    } else {
        v.resize(n, 0);
    }
}

impl DeltaStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the histogram from `delta`. An empty slice leaves an empty,
    /// zeroed state.
    ///
    /// # Panics
    /// If `max - min + 1` does not fit in `usize`; the histogram is dense, so
    /// such a range could not be allocated anyway.
    pub fn load(&mut self, delta: &[i64]) {
        let Some(&first) = delta.first() else {
            self.min = 0;
            self.max = 0;
            self.hist.clear();
            self.csum.clear();
            return;
        };

        let (min, max) = delta
            .iter()
            .fold((first, first), |(lo, hi), &d| (lo.min(d), hi.max(d)));
        self.min = min;
        self.max = max;

        let n = usize::try_from(max.abs_diff(min))
            .ok()
            .and_then(|w| w.checked_add(1))
            .unwrap_or_else(|| panic!("delta range [{min}, {max}] is too wide for a dense histogram"));
        expand(&mut self.hist, n);
        expand(&mut self.csum, n);
        self.hist.fill(0);

        for &d in delta {
            self.hist[d.abs_diff(min) as usize] += 1;
        }

        let mut running = 0;
        for (c, &h) in self.csum.iter_mut().zip(&self.hist) {
            running += h;
            *c = running;
        }
    }

    /// Number of histogram bins.
    #[inline]
    pub fn len(&self) -> usize {
        self.hist.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hist.is_empty()
    }

    #[inline]
    pub fn min(&self) -> i64 {
        self.min
    }

    #[inline]
    pub fn max(&self) -> i64 {
        self.max
    }

    /// Counts per value, starting at [`min`](DeltaStats::min).
    pub fn histogram(&self) -> &[usize] {
        &self.hist
    }

    /// Mean of the loaded values, truncated toward zero. Zero when empty.
    pub fn mean(&self) -> i64 {
        let mut sum = 0i128;
        let mut n = 0i128;
        for (i, &h) in self.hist.iter().enumerate() {
            sum += h as i128 * (i as i128 + self.min as i128);
            n += h as i128;
        }
        if n == 0 {
            return 0;
        }
        (sum / n) as i64
    }

    /// Most frequent value; the smallest one on ties.
    pub fn mode(&self) -> i64 {
        let mut best = 0;
        for (i, &h) in self.hist.iter().enumerate() {
            if h > self.hist[best] {
                best = i;
            }
        }
        self.min.wrapping_add(best as i64)
    }

    /// Midpoint of the `size`-bin window holding the most values.
    ///
    /// A window at least as wide as the histogram returns the histogram's
    /// midpoint. `size == 0` is treated as 1.
    pub fn window(&self, size: usize) -> i64 {
        let size = size.max(1);
        if size >= self.hist.len() {
            return self.min.wrapping_add((self.hist.len() / 2) as i64);
        }

        let mut best = self.csum[size - 1];
        let mut best_first = 0;
        for first in 1..=(self.hist.len() - size) {
            let count = self.csum[first + size - 1] - self.csum[first - 1];
            if count > best {
                best = count;
                best_first = first;
            }
        }

        let mid = (2 * (self.min as i128 + best_first as i128) + size as i128) / 2;
        mid as i64
    }

    /// Rotation `r` such that every loaded value stays non-negative after
    /// adding `r`, and `(mid + r) mod 256 == 127`.
    ///
    /// # Panics
    /// If `r` does not fit in `i64`, which happens only when the minimum lies
    /// within 255 of `i64::MIN`.
    pub fn needed_rotation(&self, mid: i64) -> i64 {
        let offset = -(self.min as i128);
        let mid_mod = (offset + mid as i128).rem_euclid(256);
        let centering = (127 - mid_mod).rem_euclid(256);
        let r = offset + centering;
        i64::try_from(r).unwrap_or_else(|_| panic!("rotation {r} for minimum {} overflows i64", self.min))
    }
}

pub fn rotate_encode(delta: &mut [i64], rot: i64) {
    for d in delta {
        *d += rot;
    }
}

pub fn rotate_decode(delta: &mut [i64], rot: i64) {
    for d in delta {
        *d -= rot;
    }
}
