use std::collections::TryReserveError;

use crate::rng::{Rng, DEFAULT_SEED};

/// Reusable scratch space for one compression worker.
///
/// Every compress/decompress call resizes the buffer to the field length and
/// works inside it, so after the first few files the hot path stops
/// allocating. Capacity never shrinks.
///
/// A buffer serves one in-flight call at a time. Fields decoded into it stay
/// valid only until the next call that uses the same buffer; the borrow
/// checker enforces this for [`Field`](crate::Field)s handed out by a
/// [`Reader`](crate::Reader).
#[derive(Debug, Clone)]
pub struct Buffer {
    pub(crate) bytes: Vec<u8>,
    pub(crate) u32s: Vec<u32>,
    pub(crate) u64s: Vec<u64>,
    pub(crate) f32s: Vec<f32>,
    pub(crate) f64s: Vec<f64>,
    /// Quantized representation of the field being processed.
    pub(crate) q: Vec<u64>,
    /// Entropy-coded staging bytes; sized by the method, not by `resize`.
    pub(crate) packed: Vec<u8>,
    pub(crate) rng: Rng,
}

/// Simultaneous mutable access to the parts of a [`Buffer`] a method needs
/// while moving data between the quantized array and byte columns.
pub struct Parts<'a> {
    pub bytes: &'a mut [u8],
    pub q: &'a mut [u64],
    pub packed: &'a mut Vec<u8>,
}

fn resize_exact<T: Copy + Default>(v: &mut Vec<T>, n: usize) -> Result<(), TryReserveError> {
    if n <= v.len() {
        v.truncate(n);
    } else {
        v.try_reserve_exact(n - v.len())?;
        v.resize(n, T::default());
    }
    Ok(())
}

impl Buffer {
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    /// Buffer whose dithering generator starts from `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            bytes: Vec::new(),
            u32s: Vec::new(),
            u64s: Vec::new(),
            f32s: Vec::new(),
            f64s: Vec::new(),
            q: Vec::new(),
            packed: Vec::new(),
            rng: Rng::new(seed),
        }
    }

    /// Set every typed array to length `n`.
    ///
    /// Arrays that already have the capacity are re-sliced; the others grow to
    /// exactly `n`, keeping their existing prefix.
    ///
    /// # Panics
    /// If the allocation fails; see [`try_resize`](Buffer::try_resize).
    pub fn resize(&mut self, n: usize) {
        if let Err(e) = self.try_resize(n) {
            panic!("cannot resize scratch buffer to {n} elements: {e}");
        }
    }

    /// Like [`resize`](Buffer::resize), but reports a failed allocation
    /// instead of aborting. Use it when `n` comes from a file.
    ///
    /// On failure the arrays may disagree in length until the next
    /// successful resize.
    pub fn try_resize(&mut self, n: usize) -> Result<(), TryReserveError> {
        resize_exact(&mut self.bytes, n)?;
        resize_exact(&mut self.u32s, n)?;
        resize_exact(&mut self.u64s, n)?;
        resize_exact(&mut self.f32s, n)?;
        resize_exact(&mut self.f64s, n)?;
        resize_exact(&mut self.q, n)
    }

    /// Current logical length shared by all typed arrays.
    #[inline]
    pub fn len(&self) -> usize {
        self.q.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }

    #[inline]
    pub fn quantized(&self) -> &[u64] {
        &self.q
    }

    #[inline]
    pub fn quantized_mut(&mut self) -> &mut [u64] {
        &mut self.q
    }

    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    #[inline]
    pub fn packed_mut(&mut self) -> &mut Vec<u8> {
        &mut self.packed
    }

    pub fn parts(&mut self) -> Parts<'_> {
        Parts {
            bytes: &mut self.bytes,
            q: &mut self.q,
            packed: &mut self.packed,
        }
    }

    /// Raw element storage of each type, for methods that store words
    /// verbatim.
    pub fn u32s_mut(&mut self) -> &mut [u32] {
        &mut self.u32s
    }

    pub fn u64s_mut(&mut self) -> &mut [u64] {
        &mut self.u64s
    }

    pub fn f32s_mut(&mut self) -> &mut [f32] {
        &mut self.f32s
    }

    pub fn f64s_mut(&mut self) -> &mut [f64] {
        &mut self.f64s
    }

    pub fn u32s(&self) -> &[u32] {
        &self.u32s
    }

    pub fn u64s(&self) -> &[u64] {
        &self.u64s
    }

    pub fn f32s(&self) -> &[f32] {
        &self.f32s
    }

    pub fn f64s(&self) -> &[f64] {
        &self.f64s
    }

    pub fn rng_mut(&mut self) -> &mut Rng {
        &mut self.rng
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}
