use std::io::{Read, Write};

use crate::buffer::Buffer;
use crate::error::{Error, IoContext, Result};
use crate::field::{Field, FieldType};
use crate::format::{read_bytes, Endian};

/// Per-field compression strategy.
///
/// Each `Method` implementation:
/// - Is identified by a stable numeric [`flag`](Method::flag) stored in the
///   container directory, so a reader can pick the right decoder per field.
/// - Serializes its own configuration (`write_info`/`read_info`) separately
///   from the field payload; the configuration lands in the header section
///   and the payload in the data section.
/// - Does all intermediate work inside the supplied [`Buffer`]. Decoded
///   fields borrow that buffer.
///
/// A method instance is used by one worker at a time; run N workers with N
/// instances.
pub trait Method: Send {
    /// Stable method flag stored in the container directory.
    fn flag(&self) -> u32;

    /// Human-readable method name for diagnostics.
    fn name(&self) -> &'static str;

    /// Serialize the method configuration.
    fn write_info(&self, order: Endian, wr: &mut dyn Write) -> Result<()>;

    /// Replace this instance's configuration with one written by
    /// [`write_info`](Method::write_info).
    fn read_info(&mut self, order: Endian, rd: &mut dyn Read) -> Result<()>;

    /// Encode one field into `wr`, using `buf` for all scratch space.
    fn compress(&self, field: &Field<'_>, buf: &mut Buffer, order: Endian, wr: &mut dyn Write) -> Result<()>;

    /// Decode one field from `rd` into `buf`.
    fn decompress<'b>(&self, buf: &'b mut Buffer, order: Endian, rd: &mut dyn Read) -> Result<Field<'b>>;
}

/// Write the type tag and name that open every field data block.
pub fn write_preamble(field: &Field<'_>, order: Endian, wr: &mut dyn Write) -> Result<()> {
    let name = field.name();
    wr.write_all(&[field.field_type().tag()])
        .and_then(|_| order.write_u32(wr, name.len() as u32))
        .and_then(|_| wr.write_all(name.as_bytes()))
        .io_context(|| format!("writing preamble of field '{name}'"))
}

/// Read the type tag and name written by [`write_preamble`].
pub fn read_preamble(order: Endian, rd: &mut dyn Read) -> Result<(FieldType, String)> {
    let mut tag = [0u8; 1];
    rd.read_exact(&mut tag)
        .io_context(|| "reading field type tag".to_string())?;
    let ty = FieldType::from_tag(tag[0]).ok_or_else(|| {
        Error::corrupt(
            "field preamble",
            format!("type tag was {}, but only tags 0-3 are mapped to types", tag[0]),
        )
    })?;

    let len = order
        .read_u32(rd)
        .io_context(|| "reading field name length".to_string())? as usize;
    let name = read_bytes(rd, len)
        .io_context(|| format!("reading {len}-byte field name"))?;
    let name = String::from_utf8(name)
        .map_err(|e| Error::corrupt("field preamble", format!("field name is not UTF-8: {e}")))?;
    Ok((ty, name))
}
