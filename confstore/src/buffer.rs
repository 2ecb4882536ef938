//! Storage buffer
//!
//! One contiguous byte region holding the current value of every entry, laid
//! out by the schema's offset table. The buffer itself does no locking: the
//! store keeps it behind its mutex and hands out [`EntryView`] guards for
//! zero-copy reads.

use parking_lot::MappedMutexGuard;
use std::ops::{Deref, Range};

use crate::schema::{EntryKind, Schema};
use crate::value::str_bytes;

/// Byte storage for all entries of one schema
///
/// # Example
///
/// ```
/// use confstore::{SchemaBuilder, StorageBuffer};
///
/// let mut builder = SchemaBuilder::new("demo");
/// let count = builder.number("COUNT", 16u16);
/// let schema = builder.build().unwrap();
///
/// let mut buffer = StorageBuffer::new(&schema);
/// buffer.reset(&schema);
///
/// let span = schema.span(count).unwrap();
/// assert_eq!(buffer.region(span.clone()), &16u16.to_le_bytes());
/// assert!(buffer.replace_if_changed(span.clone(), &100u16.to_le_bytes()));
/// assert!(!buffer.replace_if_changed(span, &100u16.to_le_bytes()));
/// ```
#[derive(Debug, Clone)]
pub struct StorageBuffer(Vec<u8>);

impl StorageBuffer {
    /// Create a zero-filled buffer sized for `schema`
    #[must_use]
    pub fn new(schema: &Schema) -> Self {
        Self(vec![0; schema.total_size()])
    }

    /// Buffer length: the schema's total size
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` for a schema without entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Write every entry's encoded default into its region, in index order
    pub fn reset(&mut self, schema: &Schema) {
        for (id, entry) in schema.entries() {
            if let Some(span) = schema.span(id) {
                self.0[span].copy_from_slice(entry.default_bytes());
            }
        }
    }

    /// Bytes of one entry
    #[must_use]
    pub fn region(&self, span: Range<usize>) -> &[u8] {
        &self.0[span]
    }

    /// Mutable bytes of one entry
    pub fn region_mut(&mut self, span: Range<usize>) -> &mut [u8] {
        &mut self.0[span]
    }

    /// Overwrite a region only if `bytes` differ from its content
    ///
    /// Returns `true` when the region was written.
    pub fn replace_if_changed(&mut self, span: Range<usize>, bytes: &[u8]) -> bool {
        let region = &mut self.0[span];
        if region == bytes {
            return false;
        }
        region.copy_from_slice(bytes);
        true
    }

    /// The whole buffer
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Read-only view directly into one entry's region
///
/// Holds the store lock until dropped, so the bytes cannot change under it.
/// Any other call on the same store from the same thread blocks until the
/// view is dropped; keep views short-lived.
pub struct EntryView<'a> {
    guard: MappedMutexGuard<'a, [u8]>,
    kind: EntryKind,
}

impl<'a> EntryView<'a> {
    pub(crate) fn new(guard: MappedMutexGuard<'a, [u8]>, kind: EntryKind) -> Self {
        Self { guard, kind }
    }

    /// Type tag of the viewed entry
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// The whole region, padding included
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.guard
    }

    /// Text of a string entry, up to the terminator
    ///
    /// `None` for non-string entries or bytes that are not valid UTF-8.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        if self.kind != EntryKind::Str {
            return None;
        }
        std::str::from_utf8(str_bytes(&self.guard)).ok()
    }
}

impl Deref for EntryView<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.guard
    }
}

impl AsRef<[u8]> for EntryView<'_> {
    fn as_ref(&self) -> &[u8] {
        &self.guard
    }
}
