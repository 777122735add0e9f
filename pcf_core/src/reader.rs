use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::buffer::Buffer;
use crate::error::{Error, IoContext, Result};
use crate::field::{Field, FieldType};
use crate::format::{Directory, Endian, Entry, MAGIC, REVERSE_MAGIC, VERSION};
use crate::method::Method;

/// Random-access reader for container files.
///
/// # Open sequence
/// 1. Read the magic number; its byte order decides how everything else is
///    read.
/// 2. Read the version and refuse files newer than [`VERSION`].
/// 3. Load the whole field directory (names, method flags, offset tables).
///
/// # Access pattern
/// [`read_field`](Reader::read_field) seeks straight to one field's header
/// and data ranges; no other field's bytes are touched. The returned
/// [`Field`] borrows the reader's scratch buffer, so copy it out before the
/// next read.
pub struct Reader<'a> {
    path: PathBuf,
    file: BufReader<File>,
    order: Endian,
    version: u32,
    directory: Directory,
    buf: &'a mut Buffer,
    /// A field's raw header or data bytes, read in one go before decoding.
    staging: Vec<u8>,
}

impl<'a> Reader<'a> {
    /// Open `path`, decoding fields into `buf`.
    pub fn open(path: impl AsRef<Path>, buf: &'a mut Buffer) -> Result<Self> {
        Self::open_with_staging(path, buf, Vec::new())
    }

    /// Like [`open`](Reader::open), reusing a staging vector returned by a
    /// previous [`close`](Reader::close).
    pub fn open_with_staging(path: impl AsRef<Path>, buf: &'a mut Buffer, staging: Vec<u8>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).io_context(|| format!("opening {}", path.display()))?;
        let file_len = file
            .metadata()
            .io_context(|| format!("reading metadata of {}", path.display()))?
            .len();
        let mut file = BufReader::new(file);

        // ── Magic → byte order ──────────────────────────────────────────────
        let magic = Endian::Little
            .read_u32(&mut file)
            .io_context(|| format!("reading magic number of {}", path.display()))?;
        let order = match magic {
            MAGIC => Endian::Little,
            REVERSE_MAGIC => Endian::Big,
            found => return Err(Error::BadMagic { path, found }),
        };

        // ── Version ─────────────────────────────────────────────────────────
        let version = order
            .read_u32(&mut file)
            .io_context(|| format!("reading version of {}", path.display()))?;
        if version > VERSION {
            return Err(Error::UnsupportedVersion {
                path,
                found: version,
                supported: VERSION,
            });
        }

        // ── Directory ───────────────────────────────────────────────────────
        let directory = match Directory::read_from(order, &mut file) {
            Ok(directory) => directory,
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                return Err(Error::corrupt(format!("directory of {}", path.display()), e.to_string()));
            }
            Err(source) => {
                return Err(Error::Io {
                    context: format!("reading directory of {}", path.display()),
                    source,
                });
            }
        };
        directory
            .validate(file_len)
            .map_err(|reason| Error::corrupt(format!("directory of {}", path.display()), reason))?;

        debug!(
            path = %path.display(),
            ?order,
            version,
            fields = directory.len(),
            "opened container"
        );

        Ok(Self {
            path,
            file,
            order,
            version,
            directory,
            buf,
            staging,
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn byte_order(&self) -> Endian {
        self.order
    }

    #[inline]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Number of fields in the directory.
    #[inline]
    pub fn len(&self) -> usize {
        self.directory.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.directory.is_empty()
    }

    /// Field names in directory order.
    pub fn names(&self) -> &[String] {
        &self.directory.names
    }

    /// Directory record for `name`.
    pub fn entry(&self, name: &str) -> Result<Entry<'_>> {
        let i = self.index_of(name)?;
        Ok(self.directory.entry(i))
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.directory.position(name).ok_or_else(|| Error::MissingField {
            path: self.path.clone(),
            name: name.to_string(),
            available: self.directory.names.clone(),
        })
    }

    fn stage(&mut self, start: u64, end: u64, what: &str, name: &str) -> Result<()> {
        let path = &self.path;
        self.staging.clear();
        self.staging.resize((end - start) as usize, 0);
        self.file
            .seek(SeekFrom::Start(start))
            .and_then(|_| self.file.read_exact(&mut self.staging))
            .io_context(|| {
                format!(
                    "reading {} {what} bytes of field '{name}' at offset {start} in {}",
                    end - start,
                    path.display()
                )
            })
    }

    /// Decode field `name` with `method`.
    ///
    /// `method` must carry the flag recorded for `name`; its configuration is
    /// replaced by the one stored in the file.
    pub fn read_field(&mut self, name: &str, method: &mut dyn Method) -> Result<Field<'_>> {
        let i = self.index_of(name)?;
        let entry = self.directory.entry(i);
        if entry.method_flag != method.flag() {
            return Err(Error::MethodMismatch {
                name: name.to_string(),
                stored: entry.method_flag,
                supplied: method.flag(),
            });
        }
        let (header, data) = (entry.header, entry.data);

        debug!(
            field = name,
            method = method.name(),
            header = ?header,
            data = ?data,
            "reading field"
        );

        self.stage(header.start, header.end, "header", name)?;
        let mut rd: &[u8] = &self.staging;
        method.read_info(self.order, &mut rd)?;
        if !rd.is_empty() {
            return Err(Error::corrupt(
                format!("header of field '{name}' in {}", self.path.display()),
                format!("{} trailing bytes after the method configuration", rd.len()),
            ));
        }

        self.stage(data.start, data.end, "data", name)?;
        let mut rd: &[u8] = &self.staging;
        let field = method.decompress(&mut *self.buf, self.order, &mut rd)?;
        if !rd.is_empty() {
            return Err(Error::corrupt(
                format!("field '{name}' in {}", self.path.display()),
                format!("{} trailing bytes after decoding", rd.len()),
            ));
        }
        Ok(field)
    }

    /// Like [`read_field`](Reader::read_field), but also checks the stored
    /// element type against `expected`.
    pub fn read_field_as(&mut self, name: &str, expected: FieldType, method: &mut dyn Method) -> Result<Field<'_>> {
        let field = self.read_field(name, method)?;
        if field.field_type() != expected {
            return Err(Error::TypeMismatch {
                name: name.to_string(),
                expected,
                actual: field.field_type(),
            });
        }
        Ok(field)
    }

    /// Close the file, returning the staging vector for reuse.
    pub fn close(self) -> Vec<u8> {
        let mut staging = self.staging;
        staging.clear();
        staging
    }
}
