use std::io::{self, Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use pcf_core::format::{METHOD_DELTA_QUANT, METHOD_LZ4_DELTA_QUANT, METHOD_ZSTD_DELTA_QUANT};

/// General-purpose byte coder applied to each byte column independently.
///
/// Every coder gets its own method flag, since a column written by one coder
/// can only be read back by the same coder.
pub trait ColumnCoder: Default + Send {
    /// Method flag of a [`QuantMethod`](crate::QuantMethod) using this coder.
    const METHOD_FLAG: u32;
    const METHOD_NAME: &'static str;

    /// Replace the contents of `packed` with the coded form of `raw`.
    fn encode(&self, raw: &[u8], packed: &mut Vec<u8>) -> io::Result<()>;

    /// Decode `packed`, which must expand to exactly `raw.len()` bytes.
    fn decode(&self, packed: &[u8], raw: &mut [u8]) -> io::Result<()>;
}

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

fn ensure_exhausted(rd: &mut impl Read, expected: usize) -> io::Result<()> {
    let mut probe = [0u8; 1];
    if rd.read(&mut probe)? != 0 {
        return Err(invalid(format!("column decodes to more than {expected} bytes")));
    }
    Ok(())
}

/// zlib/deflate via `flate2`. The production coder.
#[derive(Debug, Clone, Copy)]
pub struct Deflate {
    /// Compression level, 0 (store) to 9 (smallest).
    pub level: u32,
}

impl Default for Deflate {
    fn default() -> Self {
        Self {
            level: Compression::default().level(),
        }
    }
}

impl Deflate {
    pub fn new(level: u32) -> Self {
        Self { level: level.min(9) }
    }
}

impl ColumnCoder for Deflate {
    const METHOD_FLAG: u32 = METHOD_DELTA_QUANT;
    const METHOD_NAME: &'static str = "delta-quant";

    fn encode(&self, raw: &[u8], packed: &mut Vec<u8>) -> io::Result<()> {
        packed.clear();
        let mut enc = ZlibEncoder::new(packed, Compression::new(self.level));
        enc.write_all(raw)?;
        enc.finish()?;
        Ok(())
    }

    fn decode(&self, packed: &[u8], raw: &mut [u8]) -> io::Result<()> {
        let mut dec = ZlibDecoder::new(packed);
        dec.read_exact(raw)?;
        ensure_exhausted(&mut dec, raw.len())
    }
}

/// Zstandard columns.
#[derive(Debug, Clone, Copy)]
pub struct Zstd {
    /// Compression level (1 = fast / larger, 22 = slow / smallest).
    pub level: i32,
}

impl Default for Zstd {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl Zstd {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl ColumnCoder for Zstd {
    const METHOD_FLAG: u32 = METHOD_ZSTD_DELTA_QUANT;
    const METHOD_NAME: &'static str = "zstd-delta-quant";

    fn encode(&self, raw: &[u8], packed: &mut Vec<u8>) -> io::Result<()> {
        packed.clear();
        zstd::stream::copy_encode(raw, &mut *packed, self.level)
    }

    fn decode(&self, packed: &[u8], raw: &mut [u8]) -> io::Result<()> {
        let mut dec = zstd::stream::read::Decoder::with_buffer(packed)?;
        dec.read_exact(raw)?;
        ensure_exhausted(&mut dec, raw.len())
    }
}

/// LZ4 block columns: fastest to decode, weakest ratio.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4;

impl ColumnCoder for Lz4 {
    const METHOD_FLAG: u32 = METHOD_LZ4_DELTA_QUANT;
    const METHOD_NAME: &'static str = "lz4-delta-quant";

    fn encode(&self, raw: &[u8], packed: &mut Vec<u8>) -> io::Result<()> {
        packed.clear();
        packed.resize(lz4_flex::block::get_maximum_output_size(raw.len()), 0);
        let n = lz4_flex::block::compress_into(raw, packed)
            .map_err(|e| invalid(format!("lz4 compress error: {e}")))?;
        packed.truncate(n);
        Ok(())
    }

    fn decode(&self, packed: &[u8], raw: &mut [u8]) -> io::Result<()> {
        let n = lz4_flex::block::decompress_into(packed, raw)
            .map_err(|e| invalid(format!("lz4 decompress error: {e}")))?;
        if n != raw.len() {
            return Err(invalid(format!("column decodes to {n} bytes, expected {}", raw.len())));
        }
        Ok(())
    }
}
