//! Typed values held by store entries
//!
//! Every entry holds one of three families of values:
//! - numbers and `bool` ([`Numeric`]), little-endian at their natural width
//! - bounded strings, UTF-8 followed by NUL padding up to the entry capacity
//! - fixed-size records ([`Blob`]), laid out by the record type itself
//!
//! [`Value`] is the owned, dynamically-typed form of an entry. Visitors and
//! snapshots receive it when the caller does not know each entry's type
//! statically.

use std::fmt;
use std::ops::Deref;

use crate::schema::EntryKind;

mod sealed {
    pub trait Sealed {}
}

/// A numeric type (or `bool`) that an entry can hold.
///
/// Implemented for `bool`, the fixed-width integers from 8 to 64 bits and
/// both float widths. The trait is sealed: the set of numeric tags is closed.
pub trait Numeric:
    Copy + PartialOrd + fmt::Debug + fmt::Display + Send + Sync + sealed::Sealed + 'static
{
    /// Type tag an entry must carry to be accessed as `Self`
    const KIND: EntryKind;
    /// Encoded width in bytes
    const SIZE: usize;
    /// Lowest representable value, used when an entry declares no range
    const MIN: Self;
    /// Highest representable value, used when an entry declares no range
    const MAX: Self;

    /// Write `SIZE` little-endian bytes into `out`
    fn encode(self, out: &mut [u8]);

    /// Read a value back from the first `SIZE` bytes of `bytes`
    fn decode(bytes: &[u8]) -> Self;

    fn into_value(self) -> Value;

    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_numeric {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Numeric for $ty {
                const KIND: EntryKind = EntryKind::$kind;
                const SIZE: usize = std::mem::size_of::<$ty>();
                const MIN: Self = <$ty>::MIN;
                const MAX: Self = <$ty>::MAX;

                fn encode(self, out: &mut [u8]) {
                    out[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
                }

                fn decode(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$ty>::from_le_bytes(raw)
                }

                fn into_value(self) -> Value {
                    Value::$kind(self)
                }

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::$kind(v) => Some(*v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_numeric!(
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    f32 => F32,
    f64 => F64,
);

impl sealed::Sealed for bool {}

impl Numeric for bool {
    const KIND: EntryKind = EntryKind::Bool;
    const SIZE: usize = 1;
    const MIN: Self = false;
    const MAX: Self = true;

    fn encode(self, out: &mut [u8]) {
        out[0] = u8::from(self);
    }

    fn decode(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

/// A fixed-size binary record that an entry can hold.
///
/// The store never interprets record bytes: it sizes the entry from
/// [`Blob::SIZE`], compares encodings byte-for-byte to detect changes and
/// hands the bytes to the backend as they are.
///
/// # Example
///
/// ```
/// use confstore::Blob;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Default)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// impl Blob for Point {
///     const SIZE: usize = 8;
///
///     fn encode(&self, out: &mut [u8]) {
///         out[0..4].copy_from_slice(&self.x.to_le_bytes());
///         out[4..8].copy_from_slice(&self.y.to_le_bytes());
///     }
///
///     fn decode(bytes: &[u8]) -> Self {
///         let mut x = [0u8; 4];
///         let mut y = [0u8; 4];
///         x.copy_from_slice(&bytes[0..4]);
///         y.copy_from_slice(&bytes[4..8]);
///         Self { x: i32::from_le_bytes(x), y: i32::from_le_bytes(y) }
///     }
/// }
/// ```
pub trait Blob: Sized {
    /// Exact encoded size in bytes; must be non-zero
    const SIZE: usize;

    /// Write exactly `SIZE` bytes into `out`
    fn encode(&self, out: &mut [u8]);

    /// Rebuild a record from exactly `SIZE` bytes
    fn decode(bytes: &[u8]) -> Self;
}

impl<const N: usize> Blob for [u8; N] {
    const SIZE: usize = N;

    fn encode(&self, out: &mut [u8]) {
        out[..N].copy_from_slice(self);
    }

    fn decode(bytes: &[u8]) -> Self {
        let mut raw = [0u8; N];
        raw.copy_from_slice(&bytes[..N]);
        raw
    }
}

/// Encode a string into a region: text bytes, then NUL up to the end.
///
/// The caller has already checked that `text.len() < out.len()`.
pub(crate) fn encode_str(text: &str, out: &mut [u8]) {
    out.fill(0);
    out[..text.len()].copy_from_slice(text.as_bytes());
}

/// Bring foreign bytes in a string region into the stored form
///
/// The text ends at the first NUL or after `region.len() - 1` bytes,
/// whichever comes first, backing off to a UTF-8 character boundary when cut.
/// Everything after the text is zeroed. Returns `true` if the region changed.
pub(crate) fn normalize_str(region: &mut [u8]) -> bool {
    let Some(limit) = region.len().checked_sub(1) else {
        return false;
    };
    let end = match region[..limit].iter().position(|&b| b == 0) {
        Some(end) => end,
        None => {
            let mut end = limit;
            while end > 0 && region[end] & 0xc0 == 0x80 {
                end -= 1;
            }
            end
        }
    };

    let tail = &mut region[end..];
    if tail.iter().all(|&b| b == 0) {
        return false;
    }
    tail.fill(0);
    true
}

/// The text part of a string region, up to (excluding) the first NUL
pub(crate) fn str_bytes(region: &[u8]) -> &[u8] {
    let end = region.iter().position(|&b| b == 0).unwrap_or(region.len());
    &region[..end]
}

/// An owned, dynamically-typed entry value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Blob(Vec<u8>),
}

impl Value {
    /// Type tag of this value
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Bool(_) => EntryKind::Bool,
            Self::U8(_) => EntryKind::U8,
            Self::I8(_) => EntryKind::I8,
            Self::U16(_) => EntryKind::U16,
            Self::I16(_) => EntryKind::I16,
            Self::U32(_) => EntryKind::U32,
            Self::I32(_) => EntryKind::I32,
            Self::U64(_) => EntryKind::U64,
            Self::I64(_) => EntryKind::I64,
            Self::F32(_) => EntryKind::F32,
            Self::F64(_) => EntryKind::F64,
            Self::Str(_) => EntryKind::Str,
            Self::Blob(_) => EntryKind::Blob,
        }
    }

    /// Rebuild a value from the raw bytes of an entry region
    ///
    /// Invalid UTF-8 in a string region (possible only when a backend loaded
    /// foreign bytes) is replaced lossily.
    #[must_use]
    pub fn decode(kind: EntryKind, region: &[u8]) -> Self {
        match kind {
            EntryKind::Bool => Self::Bool(bool::decode(region)),
            EntryKind::U8 => Self::U8(u8::decode(region)),
            EntryKind::I8 => Self::I8(i8::decode(region)),
            EntryKind::U16 => Self::U16(u16::decode(region)),
            EntryKind::I16 => Self::I16(i16::decode(region)),
            EntryKind::U32 => Self::U32(u32::decode(region)),
            EntryKind::I32 => Self::I32(i32::decode(region)),
            EntryKind::U64 => Self::U64(u64::decode(region)),
            EntryKind::I64 => Self::I64(i64::decode(region)),
            EntryKind::F32 => Self::F32(f32::decode(region)),
            EntryKind::F64 => Self::F64(f64::decode(region)),
            EntryKind::Str => {
                Self::Str(String::from_utf8_lossy(str_bytes(region)).into_owned())
            }
            EntryKind::Blob => Self::Blob(region.to_vec()),
        }
    }

    /// The numeric payload, if this value has type `T`
    #[must_use]
    pub fn get<T: Numeric>(&self) -> Option<T> {
        T::from_value(self)
    }

    /// The text of a string value
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The bytes of a blob value
    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::U8(v) => write!(f, "{v}"),
            Self::I8(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Blob(bytes) => {
                for byte in bytes {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

/// An owned copy of a string entry that remembers the entry capacity.
///
/// Returned by [`Store::get_string`](crate::Store::get_string). Unlike a
/// view, it stays valid after the entry changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedString {
    text: String,
    capacity: usize,
}

impl FixedString {
    pub(crate) fn from_region(region: &[u8]) -> Self {
        Self {
            text: String::from_utf8_lossy(str_bytes(region)).into_owned(),
            capacity: region.len(),
        }
    }

    /// The text, without padding
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Capacity of the entry the string was copied from, terminator included
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop the capacity and keep the text
    #[must_use]
    pub fn into_string(self) -> String {
        self.text
    }
}

impl Deref for FixedString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.text
    }
}

impl AsRef<str> for FixedString {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for FixedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl PartialEq<str> for FixedString {
    fn eq(&self, other: &str) -> bool {
        self.text == other
    }
}

impl PartialEq<&str> for FixedString {
    fn eq(&self, other: &&str) -> bool {
        self.text == *other
    }
}
