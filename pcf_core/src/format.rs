use std::io::{self, Read, Write};
use std::ops::Range;

/// First four bytes of every container, in the writer's byte order.
pub const MAGIC: u32 = 0xbadf_00d0;

/// [`MAGIC`] as it reads back when the file was written in the opposite
/// byte order.
pub const REVERSE_MAGIC: u32 = MAGIC.swap_bytes();

/// Newest container version this crate writes and reads.
pub const VERSION: u32 = 1;

// ── Method flags ───────────────────────────────────────────────────────────

/// Quantization + byte-column transposition, each column deflated.
pub const METHOD_DELTA_QUANT: u32 = 0;
/// Same framing as [`METHOD_DELTA_QUANT`], columns coded with zstd.
pub const METHOD_ZSTD_DELTA_QUANT: u32 = 1;
/// Same framing as [`METHOD_DELTA_QUANT`], columns coded with lz4.
pub const METHOD_LZ4_DELTA_QUANT: u32 = 2;
/// Words stored verbatim.
pub const METHOD_RAW: u32 = 3;

// ── Byte order ─────────────────────────────────────────────────────────────

/// Byte order of every multi-byte integer in a container.
///
/// Readers detect it from the magic number, so a file written on either kind
/// of machine can be read on the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

macro_rules! endian_io {
    ($read:ident, $write:ident, $ty:ty, $n:expr) => {
        pub fn $read<R: Read + ?Sized>(self, rd: &mut R) -> io::Result<$ty> {
            let mut b = [0u8; $n];
            rd.read_exact(&mut b)?;
            Ok(match self {
                Endian::Little => <$ty>::from_le_bytes(b),
                Endian::Big => <$ty>::from_be_bytes(b),
            })
        }

        pub fn $write<W: Write + ?Sized>(self, wr: &mut W, v: $ty) -> io::Result<()> {
            let b = match self {
                Endian::Little => v.to_le_bytes(),
                Endian::Big => v.to_be_bytes(),
            };
            wr.write_all(&b)
        }
    };
}

impl Endian {
    #[cfg(target_endian = "little")]
    pub const fn native() -> Self {
        Endian::Little
    }

    #[cfg(target_endian = "big")]
    pub const fn native() -> Self {
        Endian::Big
    }

    pub const fn swapped(self) -> Self {
        match self {
            Endian::Little => Endian::Big,
            Endian::Big => Endian::Little,
        }
    }

    endian_io!(read_u32, write_u32, u32, 4);
    endian_io!(read_u64, write_u64, u64, 8);
    endian_io!(read_i64, write_i64, i64, 8);
    endian_io!(read_f32, write_f32, f32, 4);
    endian_io!(read_f64, write_f64, f64, 8);
}

impl Default for Endian {
    fn default() -> Self {
        Endian::native()
    }
}

/// Replace the contents of `out` with exactly `len` bytes from `rd`.
///
/// The vector grows only as bytes arrive, so a corrupt length read from a
/// file cannot force a huge allocation up front; capacity already in `out`
/// is reused.
pub fn read_bytes_into<R: Read + ?Sized>(rd: &mut R, len: usize, out: &mut Vec<u8>) -> io::Result<()> {
    out.clear();
    out.reserve(len.min(1 << 16));
    Read::take(&mut *rd, len as u64).read_to_end(out)?;
    if out.len() != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {len} bytes, found {}", out.len()),
        ));
    }
    Ok(())
}

pub(crate) fn read_bytes<R: Read + ?Sized>(rd: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut b = Vec::new();
    read_bytes_into(rd, len, &mut b)?;
    Ok(b)
}

// ── Directory ──────────────────────────────────────────────────────────────

/// Per-field navigation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<'a> {
    pub name: &'a str,
    pub method_flag: u32,
    /// Absolute byte range of the method header block.
    pub header: Range<u64>,
    /// Absolute byte range of the compressed data block.
    pub data: Range<u64>,
}

/// The field directory written between the version word and the payload.
///
/// ```text
/// field count F           u32
/// name lengths[F]         u32 each
/// names                   raw bytes, concatenated
/// method flags[F]         u32 each
/// header offsets[F+1]     i64 each, absolute
/// data offsets[F+1]       i64 each, absolute
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    pub names: Vec<String>,
    pub method_flags: Vec<u32>,
    pub header_offsets: Vec<i64>,
    pub data_offsets: Vec<i64>,
}

/// Bytes taken by the magic number and version word.
pub const PRELUDE_SIZE: u64 = 8;

impl Directory {
    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Encoded size of a directory holding `names`.
    pub fn encoded_len<S: AsRef<str>>(names: &[S]) -> u64 {
        let f = names.len() as u64;
        let name_bytes: u64 = names.iter().map(|s| s.as_ref().len() as u64).sum();
        4 + 4 * f + name_bytes + 4 * f + 8 * (f + 1) * 2
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn entry(&self, i: usize) -> Entry<'_> {
        Entry {
            name: &self.names[i],
            method_flag: self.method_flags[i],
            header: self.header_offsets[i] as u64..self.header_offsets[i + 1] as u64,
            data: self.data_offsets[i] as u64..self.data_offsets[i + 1] as u64,
        }
    }

    pub fn write_to<W: Write + ?Sized>(&self, order: Endian, wr: &mut W) -> io::Result<()> {
        order.write_u32(wr, self.names.len() as u32)?;
        for name in &self.names {
            order.write_u32(wr, name.len() as u32)?;
        }
        for name in &self.names {
            wr.write_all(name.as_bytes())?;
        }
        for &flag in &self.method_flags {
            order.write_u32(wr, flag)?;
        }
        for &off in &self.header_offsets {
            order.write_i64(wr, off)?;
        }
        for &off in &self.data_offsets {
            order.write_i64(wr, off)?;
        }
        Ok(())
    }

    /// Decode a directory. Offsets are read verbatim; see [`Directory::validate`].
    pub fn read_from<R: Read + ?Sized>(order: Endian, rd: &mut R) -> io::Result<Self> {
        let count = order.read_u32(rd)? as usize;
        // Counts come from the file; grow from a bounded reservation.
        let reserve = count.min(1 << 16);

        let mut lengths = Vec::with_capacity(reserve);
        for _ in 0..count {
            lengths.push(order.read_u32(rd)? as usize);
        }

        let mut names = Vec::with_capacity(lengths.len());
        for len in lengths {
            let b = read_bytes(rd, len)?;
            let name = String::from_utf8(b)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            names.push(name);
        }

        let mut method_flags = Vec::with_capacity(reserve);
        for _ in 0..count {
            method_flags.push(order.read_u32(rd)?);
        }
        let mut header_offsets = Vec::with_capacity(reserve + 1);
        for _ in 0..=count {
            header_offsets.push(order.read_i64(rd)?);
        }
        let mut data_offsets = Vec::with_capacity(reserve + 1);
        for _ in 0..=count {
            data_offsets.push(order.read_i64(rd)?);
        }

        Ok(Self {
            names,
            method_flags,
            header_offsets,
            data_offsets,
        })
    }

    /// Check that both offset tables are non-decreasing, start where the
    /// previous section ends, and stay inside a file of `file_len` bytes.
    pub fn validate(&self, file_len: u64) -> Result<(), String> {
        let start = PRELUDE_SIZE + Self::encoded_len(&self.names);
        check_edges("header", &self.header_offsets, start, file_len)?;
        let header_end = *self.header_offsets.last().unwrap_or(&(start as i64)) as u64;
        check_edges("data", &self.data_offsets, header_end, file_len)?;
        Ok(())
    }
}

fn check_edges(table: &str, edges: &[i64], start: u64, file_len: u64) -> Result<(), String> {
    match edges.first() {
        Some(&first) if first as u64 == start && first >= 0 => {}
        Some(&first) => return Err(format!("{table} offsets begin at {first}, expected {start}")),
        None => return Err(format!("{table} offset table is empty")),
    }
    for (i, w) in edges.windows(2).enumerate() {
        if w[1] < w[0] {
            return Err(format!(
                "{table} offset {} ({}) is smaller than offset {} ({})",
                i + 1,
                w[1],
                i,
                w[0]
            ));
        }
    }
    let last = *edges.last().unwrap_or(&0) as u64;
    if last > file_len {
        return Err(format!("{table} offsets end at {last}, past the end of a {file_len}-byte file"));
    }
    Ok(())
}
