//! Conversion between typed fields and the uniform 64-bit quantized
//! representation that methods entropy-code.

use crate::buffer::Buffer;
use crate::field::{Field, FieldType, Values};

/// Map every element of `values` to a 64-bit quantum, writing into `out`.
///
/// Integers pass through unchanged. Floats become `floor(x / delta)`, with
/// `delta` first rounded to the field's own precision so 32-bit fields are
/// divided in 32-bit arithmetic. Negative quanta are stored two's-complement.
///
/// # Panics
/// If `out` and `values` differ in length.
pub fn quantize(values: Values<'_>, delta: f64, out: &mut [u64]) {
    assert_eq!(
        out.len(),
        values.len(),
        "quantized buffer length does not match field length"
    );
    match values {
        Values::U32(x) => {
            for (o, &v) in out.iter_mut().zip(x) {
                *o = v as u64;
            }
        }
        Values::U64(x) => out.copy_from_slice(x),
        Values::F32(x) => {
            let delta32 = delta as f32;
            for (o, &v) in out.iter_mut().zip(x) {
                *o = (v / delta32).floor() as i64 as u64;
            }
        }
        Values::F64(x) => {
            for (o, &v) in out.iter_mut().zip(x) {
                *o = (v / delta).floor() as i64 as u64;
            }
        }
    }
}

/// Smallest float that is not below the `i64` range, `-2^63`.
const QUANTUM_MIN: f64 = i64::MIN as f64;

/// First float element whose quantum `floor(x / delta)` is not finite or
/// falls outside `i64`, as `(index, value)`. Integer fields always pass.
///
/// [`quantize`] saturates such elements, so callers that promise a bounded
/// round-trip error must reject them first.
pub fn find_unquantizable(values: Values<'_>, delta: f64) -> Option<(usize, f64)> {
    let fits = |q: f64| q >= QUANTUM_MIN && q < -QUANTUM_MIN;
    match values {
        Values::U32(_) | Values::U64(_) => None,
        Values::F32(x) => {
            let delta32 = delta as f32;
            x.iter()
                .position(|&v| !fits((v / delta32).floor() as f64))
                .map(|i| (i, x[i] as f64))
        }
        Values::F64(x) => x
            .iter()
            .position(|&v| !fits((v / delta).floor()))
            .map(|i| (i, x[i])),
    }
}

/// Rebuild a typed field from the quantized values currently held in
/// `buf`, storing the result in the buffer's array for `ty`.
///
/// Floats are reconstructed as `delta * (q + u)` with `u` a fresh uniform
/// draw from the buffer's generator, which spreads values across their
/// quantization bin instead of piling them on its lower edge.
pub fn dequantize<'b>(name: String, delta: f64, ty: FieldType, buf: &'b mut Buffer) -> Field<'b> {
    let n = buf.q.len();
    assert_eq!(buf.u32s.len(), n, "scratch arrays were resized independently");

    match ty {
        FieldType::U32 => {
            for (o, &q) in buf.u32s.iter_mut().zip(&buf.q) {
                *o = q as u32;
            }
            Field::new(name, Values::U32(&buf.u32s))
        }
        FieldType::U64 => {
            buf.u64s.copy_from_slice(&buf.q);
            Field::new(name, Values::U64(&buf.u64s))
        }
        FieldType::F32 => {
            let delta32 = delta as f32;
            buf.rng.fill_uniform(&mut buf.f64s);
            for ((o, &q), &u) in buf.f32s.iter_mut().zip(&buf.q).zip(&buf.f64s) {
                *o = ((q as i64 as f64 + u) * delta32 as f64) as f32;
            }
            Field::new(name, Values::F32(&buf.f32s))
        }
        FieldType::F64 => {
            for (o, &q) in buf.f64s.iter_mut().zip(&buf.q) {
                *o = delta * (q as i64 as f64 + buf.rng.uniform());
            }
            Field::new(name, Values::F64(&buf.f64s))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::{Rng as _, SeedableRng};

    fn round_trip<'b>(values: Values<'_>, delta: f64, buf: &'b mut Buffer) -> Field<'b> {
        buf.resize(values.len());
        quantize(values, delta, &mut buf.q);
        dequantize("meow".to_string(), delta, values.field_type(), buf)
    }

    #[test]
    fn integers_are_exact_for_any_delta() {
        let mut buf = Buffer::new();
        let u32s = [0u32, 1, 2, 3, 4, 5, u32::MAX];
        let u64s = [0u64, 0, 0, 100_000, 100_000, u64::MAX];

        for delta in [0.0, 1e-3, 1.0, 17.0] {
            let f = round_trip(Values::U32(&u32s), delta, &mut buf);
            assert_eq!(f.as_u32().unwrap(), &u32s[..]);
            let f = round_trip(Values::U64(&u64s), delta, &mut buf);
            assert_eq!(f.as_u64().unwrap(), &u64s[..]);
        }
    }

    #[test]
    fn empty_fields_round_trip() {
        let mut buf = Buffer::new();
        for values in [Values::U32(&[]), Values::U64(&[]), Values::F32(&[]), Values::F64(&[])] {
            let f = round_trip(values, 1e-3, &mut buf);
            assert!(f.is_empty());
            assert_eq!(f.field_type(), values.field_type());
            assert_eq!(f.name(), "meow");
        }
    }

    #[test]
    fn floats_stay_within_one_bin() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let mut buf = Buffer::new();
        let delta = 1e-3;

        for _trial in 0..20 {
            let x64: Vec<f64> = (0..1000).map(|_| rng.gen_range(-50.0..50.0)).collect();
            let f = round_trip(Values::F64(&x64), delta, &mut buf);
            for (a, b) in x64.iter().zip(f.as_f64().unwrap()) {
                assert!((a - b).abs() < delta, "{a} -> {b}");
            }

            let x32: Vec<f32> = (0..1000).map(|_| rng.gen_range(-50.0f32..50.0)).collect();
            let f = round_trip(Values::F32(&x32), delta, &mut buf);
            for (a, b) in x32.iter().zip(f.as_f32().unwrap()) {
                let tol = delta as f32 + a.abs() * f32::EPSILON;
                assert!((a - b).abs() < tol, "{a} -> {b}");
            }
        }
    }

    #[test]
    fn negative_floats_quantize_downward() {
        let mut out = [0u64; 4];
        quantize(Values::F64(&[-1.0, -2.0, -3.0, -0.0005]), 1e-3, &mut out);
        let signed: Vec<i64> = out.iter().map(|&q| q as i64).collect();
        assert_eq!(signed[3], -1);
        assert!(signed[0] <= -999 && signed[0] >= -1001, "{signed:?}");
    }

    #[test]
    fn out_of_range_floats_are_found() {
        let delta = 1e-3;
        assert_eq!(find_unquantizable(Values::F64(&[5.0, -7.5, 9e15]), delta), None);
        assert_eq!(find_unquantizable(Values::U64(&[u64::MAX]), delta), None);

        let (i, v) = find_unquantizable(Values::F64(&[5.0, 1e20, f64::NAN]), delta).unwrap();
        assert_eq!((i, v), (1, 1e20));
        let (i, v) = find_unquantizable(Values::F64(&[5.0, f64::NAN]), delta).unwrap();
        assert_eq!(i, 1);
        assert!(v.is_nan());
        let (i, _) = find_unquantizable(Values::F64(&[f64::NEG_INFINITY]), delta).unwrap();
        assert_eq!(i, 0);
        let (i, _) = find_unquantizable(Values::F32(&[0.0, -1e20]), delta).unwrap();
        assert_eq!(i, 1);
    }

    #[test]
    fn dithering_consumes_fresh_draws() {
        let mut buf = Buffer::with_seed(11);
        let x = [0.5f64; 8];
        let a = round_trip(Values::F64(&x), 1.0, &mut buf).to_owned_field();
        let b = round_trip(Values::F64(&x), 1.0, &mut buf).to_owned_field();
        assert_ne!(a, b);
    }

    #[test]
    #[should_panic(expected = "quantized buffer length")]
    fn mismatched_output_length_is_an_internal_error() {
        let mut out = [0u64; 2];
        quantize(Values::U32(&[1, 2, 3]), 0.0, &mut out);
    }
}
