mod coder;
mod quant;
mod raw;

pub use coder::{ColumnCoder, Deflate, Lz4, Zstd};
pub use quant::{DeltaQuant, Lz4DeltaQuant, QuantMethod, ZstdDeltaQuant};
pub use raw::Raw;

use pcf_core::format::{METHOD_DELTA_QUANT, METHOD_LZ4_DELTA_QUANT, METHOD_RAW, METHOD_ZSTD_DELTA_QUANT};
use pcf_core::{Error, Field, Method, Reader};

/// Resolve a method from its on-disk method flag.
///
/// The returned instance is unconfigured; [`Reader::read_field`] loads its
/// configuration from the field's header block.
pub fn method_by_flag(flag: u32) -> pcf_core::Result<Box<dyn Method>> {
    match flag {
        METHOD_DELTA_QUANT => Ok(Box::new(DeltaQuant::default())),
        METHOD_ZSTD_DELTA_QUANT => Ok(Box::new(ZstdDeltaQuant::default())),
        METHOD_LZ4_DELTA_QUANT => Ok(Box::new(Lz4DeltaQuant::default())),
        METHOD_RAW => Ok(Box::new(Raw::default())),
        _ => Err(Error::UnknownMethod { flag }),
    }
}

/// Build a configured method from a user-facing name, as a surrounding
/// configuration layer would.
///
/// Accepted names: `deflate` (alias `delta-quant`), `zstd`, `lz4`, `raw`.
pub fn method_from_name(name: &str, span: [u64; 3], dir: u64, delta: f64) -> anyhow::Result<Box<dyn Method>> {
    let len = span.iter().try_fold(1u64, |acc, &s| acc.checked_mul(s));
    let method: Box<dyn Method> = match name {
        "deflate" | "delta-quant" => Box::new(DeltaQuant::new(span, dir, delta)?),
        "zstd" => Box::new(ZstdDeltaQuant::new(span, dir, delta)?),
        "lz4" => Box::new(Lz4DeltaQuant::new(span, dir, delta)?),
        "raw" => {
            let len = len.and_then(|n| usize::try_from(n).ok());
            let Some(len) = len else {
                anyhow::bail!("span {:?} overflows the element count", span);
            };
            Box::new(Raw::new(len))
        }
        other => anyhow::bail!(
            "unknown method '{}'. Valid options: deflate, zstd, lz4, raw",
            other
        ),
    };
    Ok(method)
}

/// Read `name`, choosing the method from the flag recorded in the directory.
pub fn read_field_auto<'r>(reader: &'r mut Reader<'_>, name: &str) -> pcf_core::Result<Field<'r>> {
    let flag = reader.entry(name)?.method_flag;
    let mut method = method_by_flag(flag)?;
    reader.read_field(name, method.as_mut())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcf_core::ErrorKind;

    #[test]
    fn registry_round_trips_flags() {
        for flag in [METHOD_DELTA_QUANT, METHOD_ZSTD_DELTA_QUANT, METHOD_LZ4_DELTA_QUANT, METHOD_RAW] {
            assert_eq!(method_by_flag(flag).unwrap().flag(), flag);
        }
        let err = method_by_flag(42).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn names_resolve_to_configured_methods() {
        let m = method_from_name("zstd", [2, 2, 2], 0, 1e-3).unwrap();
        assert_eq!(m.flag(), METHOD_ZSTD_DELTA_QUANT);
        let m = method_from_name("raw", [2, 2, 2], 0, 0.0).unwrap();
        assert_eq!(m.name(), "raw");

        let err = method_from_name("brotli", [1, 1, 1], 0, 1e-3).err().unwrap();
        assert!(err.to_string().contains("brotli"));
        assert!(method_from_name("deflate", [1, 1, 1], 0, -1.0).is_err());
    }
}
