pub mod buffer;
pub mod error;
pub mod field;
pub mod format;
pub mod method;
pub mod quantize;
pub mod reader;
pub mod rng;
pub mod rotate;
pub mod writer;

pub use buffer::Buffer;
pub use error::{Error, ErrorKind, IoContext, Result};
pub use field::{Field, FieldType, OwnedField, OwnedValues, Values};
pub use format::{Endian, Entry, MAGIC, VERSION};
pub use method::Method;
pub use reader::Reader;
pub use rotate::DeltaStats;
pub use writer::Writer;
