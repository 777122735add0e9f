use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::field::FieldType;
use crate::format::{MAGIC, REVERSE_MAGIC};

/// Broad classification of a recoverable [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The bytes on disk are not a container this reader understands, or
    /// the caller asked for something the directory does not hold.
    Format,
    /// The caller's declared field layout disagrees with the data.
    Schema,
    /// The filesystem or stream underneath failed.
    Io,
}

/// Errors returned by container and method operations.
///
/// Broken internal invariants (for example a quantized buffer whose length
/// differs from its companion byte buffer) are not represented here; they
/// panic.
#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "{} is not a particle container: files begin with {:#010x} or {:#010x}, this one begins with {found:#010x}",
        .path.display(), MAGIC, REVERSE_MAGIC
    )]
    BadMagic { path: PathBuf, found: u32 },

    #[error(
        "{} was written with format version {found}, but this reader only supports versions up to {supported}",
        .path.display()
    )]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        supported: u32,
    },

    #[error("field '{name}' is not in {}; it only contains {available:?}", .path.display())]
    MissingField {
        path: PathBuf,
        name: String,
        available: Vec<String>,
    },

    #[error("unknown method flag {flag}")]
    UnknownMethod { flag: u32 },

    #[error("field '{name}' was written with method flag {stored}, but a method with flag {supplied} was supplied")]
    MethodMismatch {
        name: String,
        stored: u32,
        supplied: u32,
    },

    #[error("corrupt {what}: {reason}")]
    Corrupt { what: String, reason: String },

    #[error("field '{name}' holds {actual} values, but {expected} was requested")]
    TypeMismatch {
        name: String,
        expected: FieldType,
        actual: FieldType,
    },

    #[error("field '{name}' has {len} elements, but the method span describes {expected}")]
    LengthMismatch {
        name: String,
        len: usize,
        expected: usize,
    },

    #[error("field '{name}' was already added to this container")]
    DuplicateField { name: String },

    #[error("invalid delta {delta} for {what}: {reason}")]
    InvalidDelta {
        what: String,
        delta: f64,
        reason: &'static str,
    },

    #[error("element {index} of field '{name}' is {value}, which has no 64-bit quantum at delta {delta}")]
    Unquantizable {
        name: String,
        index: usize,
        value: f64,
        delta: f64,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BadMagic { .. }
            | Error::UnsupportedVersion { .. }
            | Error::MissingField { .. }
            | Error::UnknownMethod { .. }
            | Error::MethodMismatch { .. }
            | Error::Corrupt { .. } => ErrorKind::Format,
            Error::TypeMismatch { .. }
            | Error::LengthMismatch { .. }
            | Error::DuplicateField { .. }
            | Error::InvalidDelta { .. }
            | Error::Unquantizable { .. } => ErrorKind::Schema,
            Error::Io { .. } => ErrorKind::Io,
        }
    }

    /// Shorthand for [`Error::Corrupt`].
    pub fn corrupt(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Corrupt {
            what: what.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Attaches a human-readable operation/field context to I/O failures.
pub trait IoContext<T> {
    fn io_context<F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context<F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| Error::Io {
            context: context(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_cover_every_recoverable_class() {
        let bad_magic = Error::BadMagic {
            path: PathBuf::from("a.pcf"),
            found: 0,
        };
        assert_eq!(bad_magic.kind(), ErrorKind::Format);

        let mismatch = Error::TypeMismatch {
            name: "x[0]".into(),
            expected: FieldType::F64,
            actual: FieldType::F32,
        };
        assert_eq!(mismatch.kind(), ErrorKind::Schema);
        let msg = mismatch.to_string();
        assert!(msg.contains("f32") && msg.contains("f64"), "{msg}");

        let res: Result<()> = Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
            .io_context(|| "writing field 'id'".to_string());
        let err = res.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().starts_with("writing field 'id'"));
    }

    #[test]
    fn missing_field_lists_available_names() {
        let err = Error::MissingField {
            path: PathBuf::from("snap.pcf"),
            name: "v[0]".into(),
            available: vec!["x[0]".into(), "id".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("snap.pcf"), "{msg}");
        assert!(msg.contains("x[0]") && msg.contains("id"), "{msg}");
    }
}
