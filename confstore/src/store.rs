//! The settings store
//!
//! [`Store`] wraps a [`StorageBuffer`] with typed, validated access. All
//! state that changes at runtime (buffer, backend binding, observer list)
//! lives behind one mutex; the schema is immutable and read without locking.
//!
//! # Set path
//!
//! ```text
//!  set(id, v) ──► type check ──► range/capacity check ──┐
//!                 (fault policy)   (Rejected, no lock)   │
//!                                                        ▼
//!            ┌─────────────── lock ──────────────────────────┐
//!            │ compare bytes ─ equal ──► return false        │
//!            │      │ differ                                 │
//!            │      ▼                                        │
//!            │ overwrite region, backend.save(name, bytes)   │
//!            │ copy observer list                            │
//!            └───────────────────────────────────────────────┘
//!                        │ unlock
//!                        ▼
//!            observers.on_change(id) in registration order
//!                        │
//!                        ▼
//!                   return true
//! ```
//!
//! # Example
//!
//! ```
//! use confstore::{SchemaBuilder, Store};
//!
//! let mut builder = SchemaBuilder::new("demo");
//! let count = builder.number_in_range("COUNT", 16u16, 0, 500);
//! let name = builder.string("NAME", "WHATEVER", 34);
//! let store = Store::new(builder.build().unwrap());
//! store.init();
//!
//! assert_eq!(store.get::<u16>(count), 16);
//! assert!(store.set(count, 100u16));
//! assert!(!store.set(count, 600u16));
//! assert_eq!(store.get::<u16>(count), 100);
//!
//! assert!(store.set_string(name, "HELLO"));
//! assert_eq!(store.get_string(name), "HELLO");
//! ```

use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::backend::Backend;
use crate::buffer::{EntryView, StorageBuffer};
use crate::error::{FaultPolicy, ProgrammingError, Rejected};
use crate::observer::{dispatch, Observer, ObserverId, ObserverList};
use crate::schema::{EntryDescriptor, EntryId, EntryKind, Schema};
use crate::value::{encode_str, normalize_str, Blob, FixedString, Numeric, Value};

/// Largest numeric encoding, used for stack scratch space
const MAX_NUMERIC_SIZE: usize = 8;

/// Everything guarded by the store lock
struct State {
    buffer: StorageBuffer,
    backend: Option<Box<dyn Backend>>,
    observers: ObserverList,
}

/// Typed settings store over one schema
///
/// Share it between threads with `Arc<Store>`. Every operation except
/// [`reset`](Self::reset) requires a completed [`init`](Self::init); breaking
/// that rule, or accessing an entry with the wrong type, is a
/// [`ProgrammingError`] handled by the store's [`FaultPolicy`].
pub struct Store {
    schema: Schema,
    state: Mutex<State>,
    initialized: AtomicBool,
    policy: FaultPolicy,
}

impl Store {
    /// Create a store with a zero-filled buffer; call `init` before use
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        let buffer = StorageBuffer::new(&schema);
        Self {
            schema,
            state: Mutex::new(State {
                buffer,
                backend: None,
                observers: ObserverList::new(),
            }),
            initialized: AtomicBool::new(false),
            policy: FaultPolicy::default(),
        }
    }

    /// Replace the default (panicking) reaction to programming errors
    #[must_use]
    pub fn with_fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The schema the store was built over
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// `true` once `init` or `init_with_backend` has completed
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Fill the buffer with defaults and mark the store ready
    pub fn init(&self) {
        self.bind(None);
    }

    /// Like [`init`](Self::init), then load every entry from `backend`
    ///
    /// Entries the backend does not know keep their default, which is saved
    /// back immediately so memory and backend agree. Loaded strings are cut
    /// at their terminator (or at capacity - 1 bytes) with the rest zeroed;
    /// if that changed the bytes, the cleaned value is saved back too.
    pub fn init_with_backend(&self, backend: impl Backend + 'static) {
        self.bind(Some(Box::new(backend)));
    }

    fn bind(&self, backend: Option<Box<dyn Backend>>) {
        let mut state = self.state.lock();
        state.buffer.reset(&self.schema);
        state.backend = backend;

        let State {
            buffer, backend, ..
        } = &mut *state;
        if let Some(backend) = backend.as_mut() {
            backend.init();
            for (id, entry) in self.schema.entries() {
                let Some(span) = self.schema.span(id) else {
                    continue;
                };
                let region = buffer.region_mut(span);
                if !backend.load(entry.name(), region) {
                    log::debug!(
                        "store.init: entry '{}' not found in backend, saving default",
                        entry.name()
                    );
                    region.copy_from_slice(entry.default_bytes());
                    backend.save(entry.name(), region);
                } else if entry.kind() == EntryKind::Str && normalize_str(region) {
                    log::debug!(
                        "store.init: entry '{}' string cleaned after load, saving",
                        entry.name()
                    );
                    backend.save(entry.name(), region);
                }
            }
        }

        self.initialized.store(true, Ordering::Release);
        let with_backend = state.backend.is_some();
        drop(state);

        log::debug!(
            "store.init: '{}' initialized, {} entries, backend: {}",
            self.schema.name(),
            self.schema.len(),
            with_backend
        );
    }

    /// Rewrite every entry with its default
    ///
    /// Neither the backend nor the observers are told.
    pub fn reset(&self) {
        self.state.lock().buffer.reset(&self.schema);
        log::debug!("store.reset: '{}'", self.schema.name());
    }

    // ------------------------------------------------------------------
    // Reads
    //

    /// Current value of a numeric entry
    pub fn get<T: Numeric>(&self, id: EntryId) -> T {
        let Some((_, span)) = self.resolve("get", id, T::KIND) else {
            return T::decode(&[0; MAX_NUMERIC_SIZE]);
        };
        let state = self.state.lock();
        T::decode(state.buffer.region(span))
    }

    /// Owned copy of a string entry
    pub fn get_string(&self, id: EntryId) -> FixedString {
        let Some((_, span)) = self.resolve("get_string", id, EntryKind::Str) else {
            return FixedString::from_region(&[]);
        };
        let state = self.state.lock();
        FixedString::from_region(state.buffer.region(span))
    }

    /// Current value of a record entry
    pub fn get_blob<T: Blob>(&self, id: EntryId) -> T {
        let Some((_, span)) = self.resolve_blob::<T>("get_blob", id) else {
            return T::decode(&vec![0; T::SIZE]);
        };
        let state = self.state.lock();
        T::decode(state.buffer.region(span))
    }

    /// Zero-copy view into an entry's bytes
    ///
    /// The view holds the store lock: no `set` can race it, and calling any
    /// other store method on this thread before dropping it deadlocks. Prefer
    /// [`get_string`](Self::get_string) and the typed getters unless the copy
    /// matters.
    pub fn view(&self, id: EntryId) -> EntryView<'_> {
        let resolved = if self.check_ready("view") {
            self.lookup(id)
        } else {
            None
        };
        let (kind, span) = match resolved {
            Some((entry, span)) => (entry.kind(), span),
            None => (EntryKind::Blob, 0..0),
        };
        let guard = MutexGuard::map(self.state.lock(), |state| {
            state.buffer.region_mut(span)
        });
        EntryView::new(guard, kind)
    }

    // ------------------------------------------------------------------
    // Writes
    //

    /// Store a numeric value; `true` if the entry changed
    ///
    /// A value outside the entry's range is refused and reported as
    /// unchanged. Use [`try_set`](Self::try_set) to learn why.
    pub fn set<T: Numeric>(&self, id: EntryId, value: T) -> bool {
        self.try_set(id, value).unwrap_or_else(|err| {
            log::warn!("store.set: {err}");
            false
        })
    }

    /// Store a numeric value, reporting validation failures
    ///
    /// # Errors
    ///
    /// [`Rejected::OutOfRange`] if `value` lies outside the entry's range
    /// (the full type range when none was declared; NaN is always outside).
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn try_set<T: Numeric>(&self, id: EntryId, value: T) -> Result<bool, Rejected> {
        let Some((entry, span)) = self.resolve("set", id, T::KIND) else {
            return Ok(false);
        };

        let (min, max) = entry.limits::<T>();
        if !(min <= value && value <= max) {
            return Err(Rejected::OutOfRange {
                entry: entry.name().to_string(),
                value: value.to_string(),
                min: min.to_string(),
                max: max.to_string(),
            });
        }

        let mut encoded = [0u8; MAX_NUMERIC_SIZE];
        value.encode(&mut encoded);
        Ok(self.write(id, entry, span, &encoded[..T::SIZE]))
    }

    /// Store a string; `true` if the entry changed
    pub fn set_string(&self, id: EntryId, text: &str) -> bool {
        self.try_set_string(id, text).unwrap_or_else(|err| {
            log::warn!("store.set_string: {err}");
            false
        })
    }

    /// Store a string, reporting validation failures
    ///
    /// # Errors
    ///
    /// [`Rejected::TooLong`] if `text` leaves no room for the terminator,
    /// [`Rejected::EmbeddedNul`] if it contains a NUL byte.
    pub fn try_set_string(&self, id: EntryId, text: &str) -> Result<bool, Rejected> {
        let Some((entry, span)) = self.resolve("set_string", id, EntryKind::Str) else {
            return Ok(false);
        };

        if text.len() >= entry.size() {
            return Err(Rejected::TooLong {
                entry: entry.name().to_string(),
                len: text.len(),
                capacity: entry.size(),
            });
        }
        if text.contains('\0') {
            return Err(Rejected::EmbeddedNul {
                entry: entry.name().to_string(),
            });
        }

        let mut encoded = vec![0u8; entry.size()];
        encode_str(text, &mut encoded);
        Ok(self.write(id, entry, span, &encoded))
    }

    /// Store a record; `true` if the entry changed
    pub fn set_blob<T: Blob>(&self, id: EntryId, value: &T) -> bool {
        let Some((entry, span)) = self.resolve_blob::<T>("set_blob", id) else {
            return false;
        };

        let mut encoded = vec![0u8; T::SIZE];
        value.encode(&mut encoded);
        self.write(id, entry, span, &encoded)
    }

    /// Compare, write, save; then notify outside the lock
    fn write(&self, id: EntryId, entry: &EntryDescriptor, span: Range<usize>, bytes: &[u8]) -> bool {
        let mut state = self.state.lock();
        let State {
            buffer,
            backend,
            observers,
        } = &mut *state;

        if !buffer.replace_if_changed(span.clone(), bytes) {
            log::trace!("store.set: '{}' unchanged", entry.name());
            return false;
        }
        if let Some(backend) = backend.as_mut() {
            backend.save(entry.name(), buffer.region(span));
        }
        let observers = observers.snapshot();
        drop(state);

        log::debug!("store.set: '{}' changed", entry.name());
        dispatch(&observers, id);
        true
    }

    // ------------------------------------------------------------------
    // Visiting
    //

    /// Hand the typed value of one entry to `visitor`
    ///
    /// The value is copied out first; the visitor runs without the lock and
    /// may use the store.
    pub fn visit<F>(&self, id: EntryId, mut visitor: F)
    where
        F: FnMut(EntryId, &EntryDescriptor, Value),
    {
        if !self.check_ready("visit") {
            return;
        }
        let Some((entry, span)) = self.lookup(id) else {
            return;
        };
        let value = Value::decode(entry.kind(), self.state.lock().buffer.region(span));
        visitor(id, entry, value);
    }

    /// [`visit`](Self::visit) every entry in index order
    pub fn visit_each<F>(&self, mut visitor: F)
    where
        F: FnMut(EntryId, &EntryDescriptor, Value),
    {
        if !self.check_ready("visit_each") {
            return;
        }
        for id in self.schema.ids() {
            self.visit(id, &mut visitor);
        }
    }

    /// Hand the raw bytes of one entry to `visitor`
    ///
    /// The visitor runs under the lock and must not call into the store.
    pub fn visit_raw<F>(&self, id: EntryId, mut visitor: F)
    where
        F: FnMut(EntryId, &EntryDescriptor, &[u8]),
    {
        if !self.check_ready("visit_raw") {
            return;
        }
        let Some((entry, span)) = self.lookup(id) else {
            return;
        };
        let state = self.state.lock();
        visitor(id, entry, state.buffer.region(span));
    }

    /// Raw bytes of every entry in index order, under one lock acquisition
    ///
    /// The visitor runs under the lock and must not call into the store.
    pub fn visit_raw_each<F>(&self, mut visitor: F)
    where
        F: FnMut(EntryId, &EntryDescriptor, &[u8]),
    {
        if !self.check_ready("visit_raw_each") {
            return;
        }
        let state = self.state.lock();
        for (id, entry) in self.schema.entries() {
            if let Some(span) = self.schema.span(id) {
                visitor(id, entry, state.buffer.region(span));
            }
        }
    }

    /// Typed values of all entries in index order, read under one lock
    pub fn snapshot(&self) -> Vec<Value> {
        if !self.check_ready("snapshot") {
            return Vec::new();
        }
        let state = self.state.lock();
        self.schema
            .entries()
            .filter_map(|(id, entry)| {
                let span = self.schema.span(id)?;
                Some(Value::decode(entry.kind(), state.buffer.region(span)))
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Observers
    //

    /// Register an observer; it is called after every changing `set`
    pub fn add_observer(&self, observer: Arc<dyn Observer>) -> ObserverId {
        let ready = self.check_ready("add_observer");
        let mut state = self.state.lock();
        if !ready {
            return state.observers.unregistered();
        }
        state.observers.add(observer)
    }

    /// Register a closure as an observer
    pub fn observe<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(EntryId) + Send + Sync + 'static,
    {
        self.add_observer(Arc::new(callback))
    }

    /// Unregister an observer; `false` if it was not registered
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        if !self.check_ready("remove_observer") {
            return false;
        }
        self.state.lock().observers.remove(id)
    }

    /// Number of registered observers; usable before `init`
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.state.lock().observers.len()
    }

    // ------------------------------------------------------------------
    // Checks
    //

    fn check_ready(&self, operation: &'static str) -> bool {
        if self.is_initialized() {
            return true;
        }
        self.policy
            .raise(&ProgrammingError::NotInitialized { operation });
        false
    }

    fn lookup(&self, id: EntryId) -> Option<(&EntryDescriptor, Range<usize>)> {
        match (self.schema.entry(id), self.schema.span(id)) {
            (Some(entry), Some(span)) => Some((entry, span)),
            _ => {
                self.policy.raise(&ProgrammingError::UnknownEntry { id });
                None
            }
        }
    }

    /// Ready check, entry lookup and type-tag check in one step
    fn resolve(
        &self,
        operation: &'static str,
        id: EntryId,
        kind: EntryKind,
    ) -> Option<(&EntryDescriptor, Range<usize>)> {
        if !self.check_ready(operation) {
            return None;
        }
        let (entry, span) = self.lookup(id)?;
        log::trace!("store.{operation}: '{}'", entry.name());

        if entry.kind() != kind {
            self.policy.raise(&ProgrammingError::KindMismatch {
                entry: entry.name().to_string(),
                declared: entry.kind(),
                requested: kind,
            });
            return None;
        }
        Some((entry, span))
    }

    fn resolve_blob<T: Blob>(
        &self,
        operation: &'static str,
        id: EntryId,
    ) -> Option<(&EntryDescriptor, Range<usize>)> {
        let (entry, span) = self.resolve(operation, id, EntryKind::Blob)?;
        if entry.size() != T::SIZE {
            self.policy.raise(&ProgrammingError::SizeMismatch {
                entry: entry.name().to_string(),
                declared: entry.size(),
                requested: T::SIZE,
            });
            return None;
        }
        Some((entry, span))
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("schema", &self.schema.name())
            .field("entries", &self.schema.len())
            .field("initialized", &self.is_initialized())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
