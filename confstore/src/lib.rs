//! Typed, schema-driven in-memory settings store
//!
//! A fixed set of named entries (numbers, bounded strings, fixed-size
//! records) packed into one byte buffer, read and written through type- and
//! range-checked accessors. Genuine changes are saved to an optional
//! [`Backend`] and announced to registered [`Observer`]s.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  Store (accessor layer)             │
//! │  - get / set / visit                │
//! │  - type + range validation          │
//! │  - change detection                 │
//! └─────────────────────────────────────┘
//!     │ one mutex        │ after unlock
//!     ▼                  ▼
//! ┌──────────────────┐  ┌──────────────┐
//! │  StorageBuffer   │  │  Observers   │
//! │  + Backend       │  └──────────────┘
//! └──────────────────┘
//!          ▲
//!          │ sized and laid out by
//!          ▼
//! ┌─────────────────────────────────────┐
//! │  Schema (immutable registry)        │
//! └─────────────────────────────────────┘
//! ```

pub mod backend;
pub mod buffer;
pub mod error;
pub mod observer;
pub mod schema;
pub mod store;
pub mod value;

pub use backend::{Backend, MemBackend};
pub use buffer::{EntryView, StorageBuffer};
pub use error::{FaultHandler, FaultPolicy, ProgrammingError, Rejected, SchemaError};
pub use observer::{Observer, ObserverId};
pub use schema::{Bounds, EntryDescriptor, EntryId, EntryKind, Schema, SchemaBuilder};
pub use store::Store;
pub use value::{Blob, FixedString, Numeric, Value};
