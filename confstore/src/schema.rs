//! Schema registry
//!
//! A [`Schema`] is the fixed, ordered list of entries a store holds: for each
//! entry its name, type tag, byte size, encoded default and optional numeric
//! range. It is assembled once with a [`SchemaBuilder`]; `build()` checks
//! every default against its constraints and computes the offset table, so
//! neither is ever repeated per access.
//!
//! # Layout
//!
//! ```text
//!  offset 0        offset 2                          offset 36
//!  ┌──────────────┬─────────────────────────────────┬─────────┐
//!  │ COUNT (u16)  │ NAME (str, capacity 34)         │ ...     │
//!  └──────────────┴─────────────────────────────────┴─────────┘
//! ```
//!
//! `offset(i)` is the sum of the sizes of entries `0..i`.
//!
//! # Example
//!
//! ```
//! use confstore::SchemaBuilder;
//!
//! let mut builder = SchemaBuilder::new("demo");
//! let count = builder.number_in_range("COUNT", 16u16, 0, 500);
//! let name = builder.string("NAME", "WHATEVER", 34);
//! let schema = builder.build().unwrap();
//!
//! assert_eq!(schema.offset(count), Some(0));
//! assert_eq!(schema.offset(name), Some(2));
//! assert_eq!(schema.total_size(), 36);
//! ```

use std::collections::HashSet;
use std::fmt;
use std::ops::Range;

use crate::error::SchemaError;
use crate::value::{encode_str, Blob, Numeric, Value};

/// Dense identifier of an entry: its index in the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(usize);

impl EntryId {
    /// Id of the entry at `index`
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position of the entry in the schema
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Type tag of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    /// Bounded UTF-8 string, NUL-terminated within its capacity
    Str,
    /// Fixed-size binary record
    Blob,
}

impl EntryKind {
    /// Byte width of numeric kinds; `None` for strings and blobs
    #[must_use]
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Bool | Self::U8 | Self::I8 => Some(1),
            Self::U16 | Self::I16 => Some(2),
            Self::U32 | Self::I32 | Self::F32 => Some(4),
            Self::U64 | Self::I64 | Self::F64 => Some(8),
            Self::Str | Self::Blob => None,
        }
    }

    /// `true` for `bool`, integers and floats
    #[must_use]
    pub fn is_numeric(self) -> bool {
        self.fixed_size().is_some()
    }

    /// Lowercase type name, as used in error messages
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Str => "string",
            Self::Blob => "blob",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive numeric range of an entry
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub min: Value,
    pub max: Value,
}

/// Immutable description of one entry
#[derive(Debug, Clone)]
pub struct EntryDescriptor {
    name: String,
    kind: EntryKind,
    size: usize,
    default: Box<[u8]>,
    range: Option<Bounds>,
}

impl EntryDescriptor {
    /// Entry name, also the backend key
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type tag
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Size of the entry region in bytes (string capacity for strings)
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Default value, already encoded to exactly `size()` bytes
    #[must_use]
    pub fn default_bytes(&self) -> &[u8] {
        &self.default
    }

    /// Default value, decoded
    #[must_use]
    pub fn default_value(&self) -> Value {
        Value::decode(self.kind, &self.default)
    }

    /// Declared range; `None` means the full range of the type
    #[must_use]
    pub fn range(&self) -> Option<&Bounds> {
        self.range.as_ref()
    }

    /// Effective `[min, max]` for a numeric entry read as `T`
    pub(crate) fn limits<T: Numeric>(&self) -> (T, T) {
        match &self.range {
            Some(bounds) => (
                T::from_value(&bounds.min).unwrap_or(T::MIN),
                T::from_value(&bounds.max).unwrap_or(T::MAX),
            ),
            None => (T::MIN, T::MAX),
        }
    }
}

/// The fixed, ordered set of entries plus their cached layout
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    entries: Vec<EntryDescriptor>,
    offsets: Vec<usize>,
    total_size: usize,
}

impl Schema {
    /// Start a new schema definition
    #[must_use]
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    /// Schema name, used in log messages
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if the schema has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Descriptor of an entry; `None` for a foreign id
    #[must_use]
    pub fn entry(&self, id: EntryId) -> Option<&EntryDescriptor> {
        self.entries.get(id.index())
    }

    /// All entries in index order
    pub fn entries(&self) -> impl Iterator<Item = (EntryId, &EntryDescriptor)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (EntryId::new(index), entry))
    }

    /// All entry ids in index order
    pub fn ids(&self) -> impl Iterator<Item = EntryId> {
        (0..self.entries.len()).map(EntryId::new)
    }

    /// Look an entry up by name
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<EntryId> {
        self.entries
            .iter()
            .position(|entry| entry.name == name)
            .map(EntryId::new)
    }

    /// Byte offset of the entry inside the storage buffer
    #[must_use]
    pub fn offset(&self, id: EntryId) -> Option<usize> {
        self.offsets.get(id.index()).copied()
    }

    /// Byte range of the entry inside the storage buffer
    #[must_use]
    pub fn span(&self, id: EntryId) -> Option<Range<usize>> {
        let offset = self.offset(id)?;
        let size = self.entries[id.index()].size;
        Some(offset..offset + size)
    }

    /// Sum of all entry sizes: the storage buffer length
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.total_size
    }
}

/// Collects entry definitions and validates them into a [`Schema`].
///
/// Each entry method returns the [`EntryId`] of the new entry; ids are
/// assigned densely in call order. Definition problems are remembered and
/// reported by [`build`](Self::build), so a chain of definitions never needs
/// intermediate error handling.
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    entries: Vec<EntryDescriptor>,
    error: Option<SchemaError>,
}

impl SchemaBuilder {
    /// Start an empty schema named `name`
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            error: None,
        }
    }

    /// Numeric entry spanning the full range of `T`
    pub fn number<T: Numeric>(&mut self, name: impl Into<String>, default: T) -> EntryId {
        self.add_number(name.into(), default, T::MIN, T::MAX, None)
    }

    /// Numeric entry restricted to `[min, max]`
    pub fn number_in_range<T: Numeric>(
        &mut self,
        name: impl Into<String>,
        default: T,
        min: T,
        max: T,
    ) -> EntryId {
        let bounds = Bounds {
            min: min.into_value(),
            max: max.into_value(),
        };
        self.add_number(name.into(), default, min, max, Some(bounds))
    }

    /// String entry; `capacity` counts the terminator, so the longest
    /// storable text is `capacity - 1` bytes
    pub fn string(&mut self, name: impl Into<String>, default: &str, capacity: usize) -> EntryId {
        let name = name.into();
        if capacity == 0 {
            self.fail(SchemaError::ZeroSize {
                entry: name.clone(),
            });
        } else if default.len() >= capacity {
            self.fail(SchemaError::DefaultTooLong {
                entry: name.clone(),
                len: default.len(),
                capacity,
            });
        } else if default.contains('\0') {
            self.fail(SchemaError::DefaultContainsNul {
                entry: name.clone(),
            });
        }

        let mut encoded = vec![0u8; capacity];
        if default.len() < capacity {
            encode_str(default, &mut encoded);
        }
        self.push(name, EntryKind::Str, encoded, None)
    }

    /// Fixed-size record entry of `T::SIZE` bytes
    pub fn blob<T: Blob>(&mut self, name: impl Into<String>, default: &T) -> EntryId {
        let name = name.into();
        if T::SIZE == 0 {
            self.fail(SchemaError::ZeroSize {
                entry: name.clone(),
            });
        }

        let mut encoded = vec![0u8; T::SIZE];
        default.encode(&mut encoded);
        self.push(name, EntryKind::Blob, encoded, None)
    }

    /// Validate all definitions and compute the layout table
    ///
    /// # Errors
    ///
    /// Returns the first definition problem: a default outside its range or
    /// capacity, an inverted range, a zero-sized entry or a repeated name.
    pub fn build(self) -> Result<Schema, SchemaError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut seen = HashSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.name.as_str()) {
                return Err(SchemaError::DuplicateName {
                    entry: entry.name.clone(),
                });
            }
        }

        let mut offsets = Vec::with_capacity(self.entries.len());
        let mut total_size = 0;
        for entry in &self.entries {
            offsets.push(total_size);
            total_size += entry.size;
        }

        log::debug!(
            "schema.build: '{}' with {} entries, {} bytes",
            self.name,
            self.entries.len(),
            total_size
        );

        Ok(Schema {
            name: self.name,
            entries: self.entries,
            offsets,
            total_size,
        })
    }

    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    fn add_number<T: Numeric>(
        &mut self,
        name: String,
        default: T,
        min: T,
        max: T,
        range: Option<Bounds>,
    ) -> EntryId {
        // Negated comparisons so that NaN bounds or defaults fail
        if !(min <= max) {
            self.fail(SchemaError::InvalidRange {
                entry: name.clone(),
                min: min.to_string(),
                max: max.to_string(),
            });
        } else if !(min <= default && default <= max) {
            self.fail(SchemaError::DefaultOutOfRange {
                entry: name.clone(),
                default: default.to_string(),
                min: min.to_string(),
                max: max.to_string(),
            });
        }

        let mut encoded = vec![0u8; T::SIZE];
        default.encode(&mut encoded);
        self.push(name, T::KIND, encoded, range)
    }

    fn push(
        &mut self,
        name: String,
        kind: EntryKind,
        default: Vec<u8>,
        range: Option<Bounds>,
    ) -> EntryId {
        let id = EntryId::new(self.entries.len());
        self.entries.push(EntryDescriptor {
            name,
            kind,
            size: default.len(),
            default: default.into_boxed_slice(),
            range,
        });
        id
    }

    fn fail(&mut self, err: SchemaError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_are_prefix_sums() {
        let mut builder = SchemaBuilder::new("t");
        let a = builder.number("A", 1u8);
        let b = builder.number("B", 2u32);
        let c = builder.string("C", "x", 5);
        let d = builder.number("D", 0.5f64);
        let schema = builder.build().unwrap();

        assert_eq!(schema.offset(a), Some(0));
        assert_eq!(schema.offset(b), Some(1));
        assert_eq!(schema.offset(c), Some(5));
        assert_eq!(schema.offset(d), Some(10));
        assert_eq!(schema.span(d), Some(10..18));
        assert_eq!(schema.total_size(), 18);
        assert_eq!(schema.offset(EntryId::new(4)), None);
    }

    #[test]
    fn test_ids_are_dense() {
        let mut builder = SchemaBuilder::new("t");
        assert_eq!(builder.number("A", true), EntryId::new(0));
        assert_eq!(builder.number("B", 3i8), EntryId::new(1));
        assert_eq!(builder.blob("C", &[0u8; 4]), EntryId::new(2));
    }

    #[test]
    fn test_default_out_of_range_rejected() {
        let mut builder = SchemaBuilder::new("t");
        builder.number_in_range("A", 600u16, 0, 500);
        let err = builder.build().unwrap_err();
        assert!(matches!(err, SchemaError::DefaultOutOfRange { ref entry, .. } if entry == "A"));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let mut builder = SchemaBuilder::new("t");
        builder.number_in_range("A", 5i32, 10, 0);
        assert!(matches!(
            builder.build(),
            Err(SchemaError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_nan_default_rejected() {
        let mut builder = SchemaBuilder::new("t");
        builder.number("F", f32::NAN);
        assert!(matches!(
            builder.build(),
            Err(SchemaError::DefaultOutOfRange { .. })
        ));
    }

    #[test]
    fn test_string_default_must_fit() {
        let mut builder = SchemaBuilder::new("t");
        builder.string("S", "abcd", 4);
        assert!(matches!(
            builder.build(),
            Err(SchemaError::DefaultTooLong { len: 4, capacity: 4, .. })
        ));

        let mut builder = SchemaBuilder::new("t");
        builder.string("S", "abc", 4);
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut builder = SchemaBuilder::new("t");
        builder.string("S", "", 0);
        assert!(matches!(builder.build(), Err(SchemaError::ZeroSize { .. })));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut builder = SchemaBuilder::new("t");
        builder.number("A", 1u8);
        builder.number("A", 2u16);
        assert!(matches!(
            builder.build(),
            Err(SchemaError::DuplicateName { ref entry }) if entry == "A"
        ));
    }

    #[test]
    fn test_first_error_wins() {
        let mut builder = SchemaBuilder::new("t");
        builder.string("S", "", 0);
        builder.number_in_range("A", 9u8, 0, 1);
        assert!(matches!(builder.build(), Err(SchemaError::ZeroSize { .. })));
    }

    #[test]
    fn test_descriptor_accessors() {
        let mut builder = SchemaBuilder::new("t");
        let count = builder.number_in_range("COUNT", 16u16, 0, 500);
        let name = builder.string("NAME", "WHATEVER", 34);
        let schema = builder.build().unwrap();

        let entry = schema.entry(count).unwrap();
        assert_eq!(entry.name(), "COUNT");
        assert_eq!(entry.kind(), EntryKind::U16);
        assert_eq!(entry.size(), 2);
        assert_eq!(entry.default_value(), Value::U16(16));
        assert_eq!(entry.limits::<u16>(), (0, 500));

        let entry = schema.entry(name).unwrap();
        assert_eq!(entry.size(), 34);
        assert!(entry.range().is_none());
        assert_eq!(entry.default_value(), Value::Str("WHATEVER".into()));
        assert_eq!(schema.id_of("NAME"), Some(name));
        assert_eq!(schema.id_of("MISSING"), None);
    }

    #[test]
    fn test_full_range_when_unspecified() {
        let mut builder = SchemaBuilder::new("t");
        let id = builder.number("F", -3.0f32);
        let schema = builder.build().unwrap();
        assert_eq!(
            schema.entry(id).unwrap().limits::<f32>(),
            (f32::MIN, f32::MAX)
        );
    }

    #[test]
    fn test_builder_from_schema() {
        let mut builder = Schema::builder("via-schema");
        let flag = builder.number("FLAG", false);
        let schema = builder.build().unwrap();
        assert_eq!(schema.name(), "via-schema");
        assert_eq!(schema.id_of("FLAG"), Some(flag));
        assert_eq!(schema.total_size(), 1);
    }

    #[test]
    fn test_kind_sizes() {
        assert_eq!(EntryKind::Bool.fixed_size(), Some(1));
        assert_eq!(EntryKind::F64.fixed_size(), Some(8));
        assert_eq!(EntryKind::Str.fixed_size(), None);
        assert!(!EntryKind::Blob.is_numeric());
        assert_eq!(EntryKind::U32.to_string(), "u32");
    }
}
