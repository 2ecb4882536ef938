//! Persistence backend contract
//!
//! The store treats persistence as a pure dependency: it knows entry names
//! and raw bytes, nothing about files or formats.
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  Store                              │
//! │  - init(): load every entry once    │
//! │  - set():  save on genuine change   │
//! └─────────────────────────────────────┘
//!          ▲
//!          │ Backend trait (name + bytes)
//!          ▼
//! ┌─────────────────────────────────────┐
//! │  MemBackend / file / flash / ...    │
//! │  - owns the persisted byte layout   │
//! └─────────────────────────────────────┘
//! ```

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Persistence collaborator bound to a store at `init`
///
/// All calls happen while the store lock is held, so a backend never sees
/// two calls at once and must not call back into the store.
pub trait Backend: Send {
    /// Called once when the store initializes, before any `load`
    fn init(&mut self) {}

    /// Fill `dst` with the persisted bytes of entry `name`
    ///
    /// Return `false` if the entry is not known; `dst` then keeps the default
    /// and the store saves it back right away.
    fn load(&mut self, name: &str, dst: &mut [u8]) -> bool;

    /// Persist the new bytes of entry `name`
    fn save(&mut self, name: &str, src: &[u8]);
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn init(&mut self) {
        self.as_mut().init();
    }

    fn load(&mut self, name: &str, dst: &mut [u8]) -> bool {
        self.as_mut().load(name, dst)
    }

    fn save(&mut self, name: &str, src: &[u8]) {
        self.as_mut().save(name, src);
    }
}

#[derive(Debug, Default)]
struct MemState {
    values: HashMap<String, Vec<u8>>,
    inits: usize,
    loads: usize,
    saves: usize,
}

/// In-memory backend
///
/// Hash map based, useful for testing and for keeping values across store
/// instances within one process. Clones share the same data, so a handle
/// kept after binding a clone to a store observes every save.
///
/// A persisted value whose length differs from the entry size is reported as
/// missing, which makes the store overwrite it with the default.
#[derive(Debug, Clone, Default)]
pub struct MemBackend {
    inner: Arc<Mutex<MemState>>,
}

impl MemBackend {
    /// Create a new empty backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Persisted bytes of an entry
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.inner.lock().values.get(name).cloned()
    }

    /// Store bytes directly, without going through a store
    pub fn insert(&self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.inner.lock().values.insert(name.into(), bytes.into());
    }

    /// Delete an entry's persisted bytes
    pub fn remove(&self, name: &str) -> Option<Vec<u8>> {
        self.inner.lock().values.remove(name)
    }

    /// Names of all persisted entries, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let state = self.inner.lock();
        let mut names: Vec<String> = state.values.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of persisted entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().values.len()
    }

    /// `true` if nothing is persisted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().values.is_empty()
    }

    /// Drop all values and reset the call counters
    pub fn clear(&self) {
        *self.inner.lock() = MemState::default();
    }

    /// How many times `init` was called
    #[must_use]
    pub fn init_count(&self) -> usize {
        self.inner.lock().inits
    }

    /// How many times `load` was called
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.inner.lock().loads
    }

    /// How many times `save` was called
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.inner.lock().saves
    }
}

impl Backend for MemBackend {
    fn init(&mut self) {
        self.inner.lock().inits += 1;
    }

    fn load(&mut self, name: &str, dst: &mut [u8]) -> bool {
        let mut state = self.inner.lock();
        state.loads += 1;

        match state.values.get(name) {
            Some(bytes) if bytes.len() == dst.len() => {
                dst.copy_from_slice(bytes);
                true
            }
            Some(bytes) => {
                log::warn!(
                    "membackend.load: '{name}' has {} bytes, entry needs {}",
                    bytes.len(),
                    dst.len()
                );
                false
            }
            None => false,
        }
    }

    fn save(&mut self, name: &str, src: &[u8]) {
        let mut state = self.inner.lock();
        state.saves += 1;
        state.values.insert(name.to_string(), src.to_vec());
    }
}
