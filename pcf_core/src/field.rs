use std::borrow::Cow;
use std::fmt;

/// Element type of a field, stored as a one-byte tag at the start of every
/// field's data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    U32 = 0,
    U64 = 1,
    F32 = 2,
    F64 = 3,
}

impl FieldType {
    pub const ALL: [FieldType; 4] = [FieldType::U32, FieldType::U64, FieldType::F32, FieldType::F64];

    #[inline]
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(FieldType::U32),
            1 => Some(FieldType::U64),
            2 => Some(FieldType::F32),
            3 => Some(FieldType::F64),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::U32 => "u32",
            FieldType::U64 => "u64",
            FieldType::F32 => "f32",
            FieldType::F64 => "f64",
        }
    }

    #[inline]
    pub fn is_float(self) -> bool {
        matches!(self, FieldType::F32 | FieldType::F64)
    }

    /// Width of one element in bytes.
    pub fn width(self) -> usize {
        match self {
            FieldType::U32 | FieldType::F32 => 4,
            FieldType::U64 | FieldType::F64 => 8,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Borrowed, typed view of a field's elements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Values<'a> {
    U32(&'a [u32]),
    U64(&'a [u64]),
    F32(&'a [f32]),
    F64(&'a [f64]),
}

impl<'a> Values<'a> {
    pub fn len(&self) -> usize {
        match self {
            Values::U32(x) => x.len(),
            Values::U64(x) => x.len(),
            Values::F32(x) => x.len(),
            Values::F64(x) => x.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            Values::U32(_) => FieldType::U32,
            Values::U64(_) => FieldType::U64,
            Values::F32(_) => FieldType::F32,
            Values::F64(_) => FieldType::F64,
        }
    }

    pub fn to_owned_values(&self) -> OwnedValues {
        match *self {
            Values::U32(x) => OwnedValues::U32(x.to_vec()),
            Values::U64(x) => OwnedValues::U64(x.to_vec()),
            Values::F32(x) => OwnedValues::F32(x.to_vec()),
            Values::F64(x) => OwnedValues::F64(x.to_vec()),
        }
    }
}

/// A named, typed column of per-particle values.
///
/// Fields returned by a [`Reader`](crate::Reader) borrow the reader's scratch
/// [`Buffer`](crate::Buffer), so they must be copied out (see
/// [`Field::to_owned_field`]) before the next read.
#[derive(Debug, Clone, PartialEq)]
pub struct Field<'a> {
    name: Cow<'a, str>,
    values: Values<'a>,
}

impl<'a> Field<'a> {
    pub fn new(name: impl Into<Cow<'a, str>>, values: Values<'a>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn u32(name: impl Into<Cow<'a, str>>, x: &'a [u32]) -> Self {
        Self::new(name, Values::U32(x))
    }

    pub fn u64(name: impl Into<Cow<'a, str>>, x: &'a [u64]) -> Self {
        Self::new(name, Values::U64(x))
    }

    pub fn f32(name: impl Into<Cow<'a, str>>, x: &'a [f32]) -> Self {
        Self::new(name, Values::F32(x))
    }

    pub fn f64(name: impl Into<Cow<'a, str>>, x: &'a [f64]) -> Self {
        Self::new(name, Values::F64(x))
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn values(&self) -> Values<'a> {
        self.values
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn field_type(&self) -> FieldType {
        self.values.field_type()
    }

    pub fn as_u32(&self) -> Option<&'a [u32]> {
        match self.values {
            Values::U32(x) => Some(x),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<&'a [u64]> {
        match self.values {
            Values::U64(x) => Some(x),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<&'a [f32]> {
        match self.values {
            Values::F32(x) => Some(x),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<&'a [f64]> {
        match self.values {
            Values::F64(x) => Some(x),
            _ => None,
        }
    }

    /// Copy the field out of whatever storage backs it.
    pub fn to_owned_field(&self) -> OwnedField {
        OwnedField {
            name: self.name.to_string(),
            values: self.values.to_owned_values(),
        }
    }
}

/// Heap-owned counterpart of [`Values`].
#[derive(Debug, Clone, PartialEq)]
pub enum OwnedValues {
    U32(Vec<u32>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl OwnedValues {
    pub fn as_values(&self) -> Values<'_> {
        match self {
            OwnedValues::U32(x) => Values::U32(x),
            OwnedValues::U64(x) => Values::U64(x),
            OwnedValues::F32(x) => Values::F32(x),
            OwnedValues::F64(x) => Values::F64(x),
        }
    }
}

/// Heap-owned counterpart of [`Field`].
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedField {
    pub name: String,
    pub values: OwnedValues,
}

impl OwnedField {
    pub fn as_field(&self) -> Field<'_> {
        Field::new(self.name.as_str(), self.values.as_values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for ty in FieldType::ALL {
            assert_eq!(FieldType::from_tag(ty.tag()), Some(ty));
        }
        assert_eq!(FieldType::from_tag(4), None);
        assert_eq!(FieldType::from_tag(255), None);
    }

    #[test]
    fn owned_copy_outlives_source() {
        let owned = {
            let x = vec![1.5f32, 2.5, -3.0];
            let f = Field::f32("x[0]", &x);
            assert_eq!(f.len(), 3);
            assert_eq!(f.field_type(), FieldType::F32);
            assert!(f.as_u64().is_none());
            f.to_owned_field()
        };
        assert_eq!(owned.name, "x[0]");
        assert_eq!(owned.as_field().as_f32(), Some(&[1.5f32, 2.5, -3.0][..]));
    }
}
