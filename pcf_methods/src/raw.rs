use std::io::{self, Read, Write};

use pcf_core::error::{Error, IoContext, Result};
use pcf_core::format::{read_bytes_into, METHOD_RAW};
use pcf_core::method::{read_preamble, write_preamble};
use pcf_core::{Buffer, Endian, Field, FieldType, Method, Values};

/// No-op method: stores every element verbatim in the container's byte
/// order.
///
/// Useful for:
/// - Verifying the container round-trip independently of quantization.
/// - Fields that must be bit-exact floats.
///
/// Header block: element count (`u64`).
#[derive(Debug, Clone, Default)]
pub struct Raw {
    len: usize,
}

impl Raw {
    pub fn new(len: usize) -> Self {
        Self { len }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

fn read_values(order: Endian, rd: &mut dyn Read, ty: FieldType, buf: &mut Buffer) -> io::Result<()> {
    match ty {
        FieldType::U32 => {
            for v in buf.u32s_mut() {
                *v = order.read_u32(rd)?;
            }
        }
        FieldType::U64 => {
            for v in buf.u64s_mut() {
                *v = order.read_u64(rd)?;
            }
        }
        FieldType::F32 => {
            for v in buf.f32s_mut() {
                *v = order.read_f32(rd)?;
            }
        }
        FieldType::F64 => {
            for v in buf.f64s_mut() {
                *v = order.read_f64(rd)?;
            }
        }
    }
    Ok(())
}

impl Method for Raw {
    fn flag(&self) -> u32 {
        METHOD_RAW
    }

    fn name(&self) -> &'static str {
        "raw"
    }

    fn write_info(&self, order: Endian, wr: &mut dyn Write) -> Result<()> {
        order
            .write_u64(wr, self.len as u64)
            .io_context(|| "writing raw header".to_string())
    }

    fn read_info(&mut self, order: Endian, rd: &mut dyn Read) -> Result<()> {
        let len = order
            .read_u64(rd)
            .io_context(|| "reading raw header".to_string())?;
        self.len = usize::try_from(len)
            .map_err(|_| Error::corrupt("raw header", format!("element count {len} does not fit in memory")))?;
        Ok(())
    }

    fn compress(&self, field: &Field<'_>, _buf: &mut Buffer, order: Endian, wr: &mut dyn Write) -> Result<()> {
        let name = field.name();
        if field.len() != self.len {
            return Err(Error::LengthMismatch {
                name: name.to_string(),
                len: field.len(),
                expected: self.len,
            });
        }
        write_preamble(field, order, wr)?;

        let res = match field.values() {
            Values::U32(x) => x.iter().try_for_each(|&v| order.write_u32(wr, v)),
            Values::U64(x) => x.iter().try_for_each(|&v| order.write_u64(wr, v)),
            Values::F32(x) => x.iter().try_for_each(|&v| order.write_f32(wr, v)),
            Values::F64(x) => x.iter().try_for_each(|&v| order.write_f64(wr, v)),
        };
        res.io_context(|| format!("writing raw values of field '{name}'"))
    }

    fn decompress<'b>(&self, buf: &'b mut Buffer, order: Endian, rd: &mut dyn Read) -> Result<Field<'b>> {
        let (ty, name) = read_preamble(order, rd)?;
        let n_bytes = self.len.checked_mul(ty.width()).ok_or_else(|| {
            Error::corrupt(
                format!("field '{name}'"),
                format!("{} {ty} values overflow the byte count", self.len),
            )
        })?;

        // Pull the payload in first: its size is bounded by the block, so the
        // element count is checked against real bytes before any resize.
        let mut payload = std::mem::take(buf.packed_mut());
        let res = read_bytes_into(rd, n_bytes, &mut payload)
            .io_context(|| format!("reading {} raw {ty} values of field '{name}'", self.len))
            .and_then(|()| {
                buf.try_resize(self.len).map_err(|e| {
                    Error::corrupt(format!("field '{name}'"), format!("{} elements: {e}", self.len))
                })
            })
            .and_then(|()| {
                read_values(order, &mut payload.as_slice(), ty, buf)
                    .io_context(|| format!("decoding raw {ty} values of field '{name}'"))
            });
        *buf.packed_mut() = payload;
        res?;

        let buf: &'b Buffer = buf;
        let values = match ty {
            FieldType::U32 => Values::U32(buf.u32s()),
            FieldType::U64 => Values::U64(buf.u64s()),
            FieldType::F32 => Values::F32(buf.f32s()),
            FieldType::F64 => Values::F64(buf.f64s()),
        };
        Ok(Field::new(name, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcf_core::ErrorKind;

    #[test]
    fn stores_bits_exactly_in_both_orders() {
        let x = [0.1f64, -0.0, f64::MIN_POSITIVE, 1e300, f64::NAN];
        let m = Raw::new(x.len());
        let mut buf = Buffer::new();

        for order in [Endian::Little, Endian::Big] {
            let mut bytes = Vec::new();
            m.compress(&Field::f64("phi", &x), &mut buf, order, &mut bytes)
                .unwrap();
            assert_eq!(bytes.len(), 1 + 4 + 3 + 8 * x.len());

            let out = m.decompress(&mut buf, order, &mut bytes.as_slice()).unwrap();
            let bits: Vec<u64> = out.as_f64().unwrap().iter().map(|v| v.to_bits()).collect();
            let want: Vec<u64> = x.iter().map(|v| v.to_bits()).collect();
            assert_eq!(bits, want);
        }
    }

    #[test]
    fn element_count_is_checked_against_the_payload() {
        let x = [1u64, 2, 3];
        let mut buf = Buffer::new();
        let mut bytes = Vec::new();
        Raw::new(3)
            .compress(&Field::u64("id", &x), &mut buf, Endian::Little, &mut bytes)
            .unwrap();

        for len in [4, usize::MAX / 4, usize::MAX] {
            let err = Raw::new(len)
                .decompress(&mut buf, Endian::Little, &mut bytes.as_slice())
                .unwrap_err();
            assert!(matches!(err.kind(), ErrorKind::Io | ErrorKind::Format), "{err}");
            assert!(err.to_string().contains("id"), "{err}");
        }

        let out = Raw::new(3)
            .decompress(&mut buf, Endian::Little, &mut bytes.as_slice())
            .unwrap();
        assert_eq!(out.as_u64().unwrap(), &x[..]);
    }

    #[test]
    fn u32_round_trip() {
        let x = [7u32, 0, u32::MAX];
        let mut header = Vec::new();
        Raw::new(3).write_info(Endian::Little, &mut header).unwrap();

        let mut m = Raw::default();
        m.read_info(Endian::Little, &mut header.as_slice()).unwrap();
        assert_eq!(m.len(), 3);

        let mut buf = Buffer::new();
        let mut bytes = Vec::new();
        m.compress(&Field::u32("tag", &x), &mut buf, Endian::Little, &mut bytes)
            .unwrap();
        let out = m.decompress(&mut buf, Endian::Little, &mut bytes.as_slice()).unwrap();
        assert_eq!(out.name(), "tag");
        assert_eq!(out.as_u32().unwrap(), &x[..]);
    }
}
