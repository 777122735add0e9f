use std::io::{Read, Write};

use pcf_core::error::{Error, IoContext, Result};
use pcf_core::method::{read_preamble, write_preamble};
use pcf_core::format::read_bytes_into;
use pcf_core::quantize::{dequantize, find_unquantizable, quantize};
use pcf_core::{Buffer, Endian, Field, Method};
use tracing::trace;

use crate::coder::{ColumnCoder, Deflate, Lz4, Zstd};

/// Quantize, split into 8 byte columns, and code each column separately.
///
/// After quantization at a sensible `delta` the high-significance bytes of
/// every element are nearly constant, so coding columns on their own lets
/// those columns collapse to a few bytes while the noisy low bytes carry the
/// entropy.
///
/// # Header block
/// `span: [u64; 3]`, `dir: u64`, `delta: f64`.
///
/// # Data block
/// ```text
/// type tag      u8
/// name length   u32
/// name          raw bytes
/// 8 × { packed length u32, packed column bytes }   ← least significant first
/// ```
#[derive(Debug, Clone)]
pub struct QuantMethod<C: ColumnCoder> {
    span: [u64; 3],
    dir: u64,
    delta: f64,
    n_tot: usize,
    coder: C,
}

/// Deflate-coded columns, the default method.
pub type DeltaQuant = QuantMethod<Deflate>;
pub type ZstdDeltaQuant = QuantMethod<Zstd>;
pub type Lz4DeltaQuant = QuantMethod<Lz4>;

const COLUMNS: usize = 8;

fn span_product(span: [u64; 3]) -> Option<usize> {
    let n = span[0].checked_mul(span[1])?.checked_mul(span[2])?;
    usize::try_from(n).ok()
}

impl<C: ColumnCoder> QuantMethod<C> {
    /// Method for fields sampled on a `span` grid, delta-encoded along axis
    /// `dir`, with floats stored to within `delta`.
    ///
    /// `delta` must be finite and non-negative. Zero is allowed (integers are
    /// always stored exactly) but compressing a float field with it fails.
    pub fn new(span: [u64; 3], dir: u64, delta: f64) -> Result<Self> {
        if !delta.is_finite() || delta < 0.0 {
            return Err(Error::InvalidDelta {
                what: C::METHOD_NAME.to_string(),
                delta,
                reason: "delta must be finite and non-negative",
            });
        }
        let n_tot = span_product(span).ok_or_else(|| {
            Error::corrupt(C::METHOD_NAME, format!("span {span:?} overflows the element count"))
        })?;
        Ok(Self {
            span,
            dir,
            delta,
            n_tot,
            coder: C::default(),
        })
    }

    /// Replace the column coder (for example to change its level).
    pub fn with_coder(mut self, coder: C) -> Self {
        self.coder = coder;
        self
    }

    #[inline]
    pub fn span(&self) -> [u64; 3] {
        self.span
    }

    #[inline]
    pub fn dir(&self) -> u64 {
        self.dir
    }

    #[inline]
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Number of elements described by the span.
    #[inline]
    pub fn len(&self) -> usize {
        self.n_tot
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n_tot == 0
    }
}

impl<C: ColumnCoder> Default for QuantMethod<C> {
    fn default() -> Self {
        Self {
            span: [0; 3],
            dir: 0,
            delta: 0.0,
            n_tot: 0,
            coder: C::default(),
        }
    }
}

impl<C: ColumnCoder> Method for QuantMethod<C> {
    fn flag(&self) -> u32 {
        C::METHOD_FLAG
    }

    fn name(&self) -> &'static str {
        C::METHOD_NAME
    }

    fn write_info(&self, order: Endian, wr: &mut dyn Write) -> Result<()> {
        let write = |wr: &mut dyn Write| -> std::io::Result<()> {
            for &s in &self.span {
                order.write_u64(wr, s)?;
            }
            order.write_u64(wr, self.dir)?;
            order.write_f64(wr, self.delta)
        };
        write(wr).io_context(|| format!("writing {} header", C::METHOD_NAME))
    }

    fn read_info(&mut self, order: Endian, rd: &mut dyn Read) -> Result<()> {
        let mut read = |rd: &mut dyn Read| -> std::io::Result<()> {
            for s in self.span.iter_mut() {
                *s = order.read_u64(rd)?;
            }
            self.dir = order.read_u64(rd)?;
            self.delta = order.read_f64(rd)?;
            Ok(())
        };
        read(rd).io_context(|| format!("reading {} header", C::METHOD_NAME))?;

        self.n_tot = span_product(self.span).ok_or_else(|| {
            Error::corrupt(
                format!("{} header", C::METHOD_NAME),
                format!("span {:?} overflows the element count", self.span),
            )
        })?;
        Ok(())
    }

    fn compress(&self, field: &Field<'_>, buf: &mut Buffer, order: Endian, wr: &mut dyn Write) -> Result<()> {
        let name = field.name();
        if field.len() != self.n_tot {
            return Err(Error::LengthMismatch {
                name: name.to_string(),
                len: field.len(),
                expected: self.n_tot,
            });
        }
        if field.field_type().is_float() && self.delta == 0.0 {
            return Err(Error::InvalidDelta {
                what: format!("float field '{name}'"),
                delta: self.delta,
                reason: "floating fields need a positive quantization step",
            });
        }

        if let Some((index, value)) = find_unquantizable(field.values(), self.delta) {
            return Err(Error::Unquantizable {
                name: name.to_string(),
                index,
                value,
                delta: self.delta,
            });
        }

        buf.resize(field.len());
        write_preamble(field, order, wr)?;
        quantize(field.values(), self.delta, buf.quantized_mut());

        let parts = buf.parts();
        assert_eq!(parts.q.len(), parts.bytes.len(), "quantized and byte buffers differ in length");

        for col in 0..COLUMNS {
            let shift = 8 * col;
            for (b, &q) in parts.bytes.iter_mut().zip(parts.q.iter()) {
                *b = (q >> shift) as u8;
            }
            self.coder
                .encode(&parts.bytes[..], &mut *parts.packed)
                .io_context(|| format!("coding byte column {col} of field '{name}'"))?;
            order
                .write_u32(wr, parts.packed.len() as u32)
                .and_then(|_| wr.write_all(&parts.packed[..]))
                .io_context(|| format!("writing byte column {col} of field '{name}'"))?;
            trace!(field = name, col, packed = parts.packed.len(), "coded byte column");
        }
        Ok(())
    }

    fn decompress<'b>(&self, buf: &'b mut Buffer, order: Endian, rd: &mut dyn Read) -> Result<Field<'b>> {
        let (ty, name) = read_preamble(order, rd)?;
        buf.try_resize(self.n_tot).map_err(|e| {
            Error::corrupt(
                format!("field '{name}'"),
                format!("span {:?} asks for {} elements: {e}", self.span, self.n_tot),
            )
        })?;

        let parts = buf.parts();
        assert_eq!(parts.q.len(), parts.bytes.len(), "quantized and byte buffers differ in length");
        parts.q.fill(0);

        for col in 0..COLUMNS {
            let shift = 8 * col;
            let len = order
                .read_u32(rd)
                .io_context(|| format!("reading length of byte column {col} of field '{name}'"))?
                as usize;
            read_bytes_into(rd, len, &mut *parts.packed)
                .io_context(|| format!("reading {len}-byte column {col} of field '{name}'"))?;
            self.coder
                .decode(&parts.packed[..], &mut parts.bytes[..])
                .map_err(|e| Error::corrupt(format!("byte column {col} of field '{name}'"), e.to_string()))?;

            for (q, &b) in parts.q.iter_mut().zip(parts.bytes.iter()) {
                *q |= (b as u64) << shift;
            }
        }

        Ok(dequantize(name, self.delta, ty, buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcf_core::{ErrorKind, FieldType};
    use pretty_assertions::assert_eq;
    use rand::{Rng, SeedableRng};

    fn round_trip<'b, M: Method>(m: &M, field: &Field<'_>, buf: &'b mut Buffer) -> Field<'b> {
        let mut bytes = Vec::new();
        m.compress(field, buf, Endian::Little, &mut bytes).unwrap();
        let mut rd = bytes.as_slice();
        let out = m.decompress(buf, Endian::Little, &mut rd).unwrap();
        assert!(rd.is_empty(), "{} bytes left over", rd.len());
        out
    }

    #[test]
    fn small_f32_field_within_delta() {
        let x = [1.0f32, 1.0005, 0.9996, 2.0];
        let m = DeltaQuant::new([4, 1, 1], 0, 1e-3).unwrap();
        let mut buf = Buffer::new();

        let out = round_trip(&m, &Field::f32("x[0]", &x), &mut buf);
        assert_eq!(out.name(), "x[0]");
        assert_eq!(out.field_type(), FieldType::F32);
        for (a, b) in x.iter().zip(out.as_f32().unwrap()) {
            assert!((a - b).abs() < 1e-3 + a.abs() * f32::EPSILON, "{a} -> {b}");
        }
    }

    #[test]
    fn integers_are_lossless_with_every_coder() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let ids: Vec<u64> = (0..4096).map(|_| rng.gen::<u64>() >> rng.gen_range(0..64u32)).collect();
        let small: Vec<u32> = (0..4096).map(|i| i / 3).collect();
        let span = [16, 16, 16];
        let mut buf = Buffer::new();

        fn check<C: ColumnCoder>(span: [u64; 3], ids: &[u64], small: &[u32], buf: &mut Buffer) {
            let m = QuantMethod::<C>::new(span, 2, 0.0).unwrap();
            let out = round_trip(&m, &Field::u64("id", ids), buf);
            assert_eq!(out.as_u64().unwrap(), ids);
            let out = round_trip(&m, &Field::u32("level", small), buf);
            assert_eq!(out.as_u32().unwrap(), small);
        }

        check::<Deflate>(span, &ids, &small, &mut buf);
        check::<Zstd>(span, &ids, &small, &mut buf);
        check::<Lz4>(span, &ids, &small, &mut buf);
    }

    #[test]
    fn f64_positions_within_delta() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(2);
        let x: Vec<f64> = (0..32 * 16 * 8).map(|_| rng.gen_range(-125.0..125.0)).collect();
        let m = ZstdDeltaQuant::new([32, 16, 8], 1, 1e-4).unwrap();
        let mut buf = Buffer::new();

        for _ in 0..5 {
            let out = round_trip(&m, &Field::f64("x[1]", &x), &mut buf);
            for (a, b) in x.iter().zip(out.as_f64().unwrap()) {
                assert!((a - b).abs() < 1e-4, "{a} -> {b}");
            }
        }
    }

    #[test]
    fn info_round_trips_and_recomputes_length() {
        let m = DeltaQuant::new([3, 4, 5], 2, 0.25).unwrap();
        let mut header = Vec::new();
        m.write_info(Endian::Big, &mut header).unwrap();
        assert_eq!(header.len(), 5 * 8);

        let mut back = DeltaQuant::default();
        back.read_info(Endian::Big, &mut header.as_slice()).unwrap();
        assert_eq!(back.span(), [3, 4, 5]);
        assert_eq!(back.dir(), 2);
        assert_eq!(back.delta(), 0.25);
        assert_eq!(back.len(), 60);
    }

    #[test]
    fn rejects_bad_deltas() {
        for delta in [-1.0, f64::NAN, f64::INFINITY] {
            let err = DeltaQuant::new([1, 1, 1], 0, delta).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Schema);
        }

        let m = DeltaQuant::new([2, 1, 1], 0, 0.0).unwrap();
        let mut buf = Buffer::new();
        let err = m
            .compress(&Field::f64("v[0]", &[1.0, 2.0]), &mut buf, Endian::Little, &mut Vec::<u8>::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDelta { .. }), "{err}");
        assert!(err.to_string().contains("v[0]"));
    }

    #[test]
    fn out_of_range_floats_are_refused() {
        let m = DeltaQuant::new([3, 1, 1], 0, 1e-3).unwrap();
        let mut buf = Buffer::new();

        for (x, index) in [([1e20, f64::NAN, 5.0], 0), ([5.0, f64::NAN, 1.0], 1), ([5.0, 1.0, f64::INFINITY], 2)] {
            let mut bytes = Vec::new();
            let err = m
                .compress(&Field::f64("x[0]", &x), &mut buf, Endian::Little, &mut bytes)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Schema);
            assert!(matches!(err, Error::Unquantizable { index: i, .. } if i == index), "{err}");
            assert!(err.to_string().contains("x[0]"), "{err}");
            assert!(bytes.is_empty());
        }

        // Large values well inside the i64 range still round-trip.
        let x = [1e9, -1e9, 5.0];
        let out = round_trip(&m, &Field::f64("x[0]", &x), &mut buf);
        for (a, b) in x.iter().zip(out.as_f64().unwrap()) {
            assert!((a - b).abs() < 1e-3 + a.abs() * 1e-15, "{a} -> {b}");
        }
    }

    #[test]
    fn corrupt_sizes_are_errors_not_allocations() {
        let x: Vec<f32> = (0..8).map(|i| i as f32).collect();
        let m = DeltaQuant::new([8, 1, 1], 0, 1e-2).unwrap();
        let mut buf = Buffer::new();
        let mut bytes = Vec::new();
        m.compress(&Field::f32("x[0]", &x), &mut buf, Endian::Little, &mut bytes)
            .unwrap();

        // A header whose span multiplies out to an impossible element count.
        let mut header = Vec::new();
        DeltaQuant::new([1 << 40, 1 << 20, 1], 0, 1e-2)
            .unwrap()
            .write_info(Endian::Little, &mut header)
            .unwrap();
        let mut huge = DeltaQuant::default();
        huge.read_info(Endian::Little, &mut header.as_slice()).unwrap();
        let err = huge
            .decompress(&mut buf, Endian::Little, &mut bytes.as_slice())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format, "{err}");

        // A column length prefix far past the end of the block.
        let preamble = 1 + 4 + "x[0]".len();
        bytes[preamble..preamble + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        let err = m
            .decompress(&mut buf, Endian::Little, &mut bytes.as_slice())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io, "{err}");
        assert!(err.to_string().contains("x[0]"), "{err}");
    }

    #[test]
    fn length_must_match_span() {
        let m = DeltaQuant::new([2, 2, 2], 0, 1e-3).unwrap();
        let mut buf = Buffer::new();
        let err = m
            .compress(&Field::u32("id", &[1, 2, 3]), &mut buf, Endian::Little, &mut Vec::<u8>::new())
            .unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { len: 3, expected: 8, .. }), "{err}");
    }

    #[test]
    fn truncated_stream_names_the_field() {
        let m = DeltaQuant::new([64, 1, 1], 0, 1e-2).unwrap();
        let x: Vec<f32> = (0..64).map(|i| i as f32 * 0.37).collect();
        let mut buf = Buffer::new();
        let mut bytes = Vec::new();
        m.compress(&Field::f32("x[2]", &x), &mut buf, Endian::Little, &mut bytes)
            .unwrap();
        bytes.truncate(bytes.len() - 5);

        let err = m
            .decompress(&mut buf, Endian::Little, &mut bytes.as_slice())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("x[2]"), "{err}");
    }

    #[test]
    fn high_columns_of_small_ids_are_tiny() {
        let ids: Vec<u64> = (0..1u64 << 14).collect();
        let m = DeltaQuant::new([1 << 14, 1, 1], 0, 0.0).unwrap();
        let mut buf = Buffer::new();
        let mut bytes = Vec::new();
        m.compress(&Field::u64("id", &ids), &mut buf, Endian::Little, &mut bytes)
            .unwrap();
        assert!(bytes.len() < ids.len(), "{} bytes for {} ids", bytes.len(), ids.len());
    }
}
