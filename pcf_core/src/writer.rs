use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::buffer::Buffer;
use crate::error::{Error, IoContext, Result};
use crate::field::Field;
use crate::format::{Directory, Endian, MAGIC, PRELUDE_SIZE, VERSION};
use crate::method::Method;

/// Accumulating writer for one container file.
///
/// # Write contract
/// Call [`add_field`](Writer::add_field) once per field, in any order; the
/// directory keeps insertion order. Nothing touches the disk until
/// [`flush`](Writer::flush), which writes the whole file in one sequential
/// pass and consumes the writer.
///
/// # Format layout written
/// ```text
/// [MAGIC u32][VERSION u32]
/// [DIRECTORY: count, name lengths, names, method flags,
///             header offsets[F+1], data offsets[F+1]]
/// [HEADER BLOCK 0] ... [HEADER BLOCK F-1]   ← Method::write_info output
/// [DATA BLOCK 0]   ... [DATA BLOCK F-1]     ← Method::compress output
/// ```
pub struct Writer<'a> {
    path: PathBuf,
    order: Endian,
    buf: &'a mut Buffer,
    names: Vec<String>,
    method_flags: Vec<u32>,
    /// Offsets relative to the start of the header section.
    header_edges: Vec<i64>,
    /// Offsets relative to the start of the data section.
    data_edges: Vec<i64>,
    header: Vec<u8>,
    data: Vec<u8>,
}

impl<'a> Writer<'a> {
    /// Prepare a container for `path` in the machine's native byte order.
    ///
    /// `data` is the in-memory payload accumulator; pass the vector returned
    /// by a previous [`flush`](Writer::flush) to avoid reallocating it.
    pub fn new(path: impl AsRef<Path>, buf: &'a mut Buffer, mut data: Vec<u8>) -> Self {
        data.clear();
        Self {
            path: path.as_ref().to_path_buf(),
            order: Endian::native(),
            buf,
            names: Vec::new(),
            method_flags: Vec::new(),
            header_edges: vec![0],
            data_edges: vec![0],
            header: Vec::new(),
            data,
        }
    }

    /// Write multi-byte values in `order` instead of native order.
    pub fn with_order(mut self, order: Endian) -> Self {
        self.order = order;
        self
    }

    #[inline]
    pub fn order(&self) -> Endian {
        self.order
    }

    /// Number of fields added so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Compress `field` with `method` and record it in the directory.
    ///
    /// On error the writer is left exactly as it was before the call.
    pub fn add_field(&mut self, field: &Field<'_>, method: &dyn Method) -> Result<()> {
        if self.names.iter().any(|n| n == field.name()) {
            return Err(Error::DuplicateField {
                name: field.name().to_string(),
            });
        }

        let header_start = self.header.len();
        let data_start = self.data.len();

        let res = match method.write_info(self.order, &mut self.header) {
            Ok(()) => method.compress(field, self.buf, self.order, &mut self.data),
            Err(e) => Err(e),
        };
        if let Err(e) = res {
            self.header.truncate(header_start);
            self.data.truncate(data_start);
            return Err(e);
        }

        self.header_edges.push(self.header.len() as i64);
        self.data_edges.push(self.data.len() as i64);
        self.method_flags.push(method.flag());
        self.names.push(field.name().to_string());

        debug!(
            field = field.name(),
            ty = %field.field_type(),
            method = method.name(),
            elements = field.len(),
            header_bytes = self.header.len() - header_start,
            data_bytes = self.data.len() - data_start,
            "added field"
        );
        Ok(())
    }

    /// Write the container to disk.
    ///
    /// Returns the emptied data accumulator so its capacity can be handed to
    /// the next [`Writer::new`]. On error the file on disk is incomplete and
    /// should be discarded.
    pub fn flush(mut self) -> Result<Vec<u8>> {
        let header_base = (PRELUDE_SIZE + Directory::encoded_len(&self.names)) as i64;
        let data_base = header_base + self.header.len() as i64;

        let directory = Directory {
            names: std::mem::take(&mut self.names),
            method_flags: std::mem::take(&mut self.method_flags),
            header_offsets: self.header_edges.iter().map(|e| e + header_base).collect(),
            data_offsets: self.data_edges.iter().map(|e| e + data_base).collect(),
        };

        let path = &self.path;
        let file = File::create(path).io_context(|| format!("creating {}", path.display()))?;
        let mut out = BufWriter::new(file);

        let order = self.order;
        order
            .write_u32(&mut out, MAGIC)
            .and_then(|_| order.write_u32(&mut out, VERSION))
            .and_then(|_| directory.write_to(order, &mut out))
            .io_context(|| format!("writing directory of {}", path.display()))?;
        out.write_all(&self.header)
            .io_context(|| format!("writing method headers of {}", path.display()))?;
        out.write_all(&self.data)
            .io_context(|| format!("writing field data of {}", path.display()))?;
        out.flush()
            .io_context(|| format!("flushing {}", path.display()))?;

        debug!(
            path = %path.display(),
            fields = directory.len(),
            bytes = data_base as u64 + self.data.len() as u64,
            "flushed container"
        );

        let mut data = std::mem::take(&mut self.data);
        data.clear();
        Ok(data)
    }
}
