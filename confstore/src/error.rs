//! Error types and the programming-error policy
//!
//! Three kinds of failure exist, each with its own channel:
//!
//! - [`SchemaError`]: a schema definition is inconsistent. Returned by
//!   [`SchemaBuilder::build`](crate::SchemaBuilder::build), before any store
//!   exists.
//! - [`Rejected`]: a `set` carried a value outside the entry's range or
//!   capacity. Ordinary control flow; the stored value is untouched.
//! - [`ProgrammingError`]: the caller broke the contract (wrong type, unknown
//!   entry, use before `init`). Never returned as a value; it is handed to the
//!   store's [`FaultPolicy`], which panics unless configured otherwise.

use std::fmt;
use std::sync::Arc;

use crate::schema::{EntryId, EntryKind};

/// Errors found while building a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Default value lies outside the declared (or full type) range
    DefaultOutOfRange {
        entry: String,
        default: String,
        min: String,
        max: String,
    },
    /// `min > max`, or a bound is NaN
    InvalidRange {
        entry: String,
        min: String,
        max: String,
    },
    /// String default does not leave room for the terminator
    DefaultTooLong {
        entry: String,
        len: usize,
        capacity: usize,
    },
    DefaultContainsNul { entry: String },
    /// Entry would occupy no bytes
    ZeroSize { entry: String },
    DuplicateName { entry: String },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DefaultOutOfRange {
                entry,
                default,
                min,
                max,
            } => write!(
                f,
                "entry '{entry}': default {default} outside range [{min}, {max}]"
            ),
            Self::InvalidRange { entry, min, max } => {
                write!(f, "entry '{entry}': invalid range [{min}, {max}]")
            }
            Self::DefaultTooLong {
                entry,
                len,
                capacity,
            } => write!(
                f,
                "entry '{entry}': default of {len} bytes does not fit capacity {capacity}"
            ),
            Self::DefaultContainsNul { entry } => {
                write!(f, "entry '{entry}': default contains a NUL byte")
            }
            Self::ZeroSize { entry } => write!(f, "entry '{entry}': size is zero"),
            Self::DuplicateName { entry } => write!(f, "entry '{entry}': name already used"),
        }
    }
}

impl std::error::Error for SchemaError {}

/// Contract violations by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgrammingError {
    /// An accessor was used before `init()`
    NotInitialized { operation: &'static str },
    /// The id does not belong to the store's schema
    UnknownEntry { id: EntryId },
    /// The requested type tag differs from the declared one
    KindMismatch {
        entry: String,
        declared: EntryKind,
        requested: EntryKind,
    },
    /// A record type's size differs from the declared entry size
    SizeMismatch {
        entry: String,
        declared: usize,
        requested: usize,
    },
}

impl fmt::Display for ProgrammingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized { operation } => {
                write!(f, "store.{operation}: store not initialized")
            }
            Self::UnknownEntry { id } => write!(f, "unknown entry {id}"),
            Self::KindMismatch {
                entry,
                declared,
                requested,
            } => write!(
                f,
                "entry '{entry}': type mismatch, declared {declared}, requested {requested}"
            ),
            Self::SizeMismatch {
                entry,
                declared,
                requested,
            } => write!(
                f,
                "entry '{entry}': size mismatch, declared {declared} bytes, requested {requested}"
            ),
        }
    }
}

impl std::error::Error for ProgrammingError {}

/// A value refused by `set` validation; the entry keeps its old value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejected {
    OutOfRange {
        entry: String,
        value: String,
        min: String,
        max: String,
    },
    /// String length (without terminator) is at or above capacity
    TooLong {
        entry: String,
        len: usize,
        capacity: usize,
    },
    /// String contains a NUL byte, which would truncate it on read
    EmbeddedNul { entry: String },
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange {
                entry,
                value,
                min,
                max,
            } => write!(
                f,
                "entry '{entry}': value {value} outside range [{min}, {max}]"
            ),
            Self::TooLong {
                entry,
                len,
                capacity,
            } => write!(
                f,
                "entry '{entry}': string of {len} bytes does not fit capacity {capacity}"
            ),
            Self::EmbeddedNul { entry } => {
                write!(f, "entry '{entry}': string contains a NUL byte")
            }
        }
    }
}

impl std::error::Error for Rejected {}

/// Handler signature for [`FaultPolicy::Custom`]
pub type FaultHandler = Arc<dyn Fn(&ProgrammingError) + Send + Sync>;

/// Reaction to a [`ProgrammingError`].
///
/// When the policy returns instead of panicking, the faulty operation is
/// abandoned: setters report "unchanged", getters return the value decoded
/// from an all-zero region, visitors are not called.
#[derive(Clone, Default)]
pub enum FaultPolicy {
    /// Panic with the error message
    #[default]
    Panic,
    /// Log the error and continue
    Log,
    Custom(FaultHandler),
}

impl FaultPolicy {
    /// Build a custom policy from a closure
    pub fn custom(handler: impl Fn(&ProgrammingError) + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(handler))
    }

    pub(crate) fn raise(&self, err: &ProgrammingError) {
        match self {
            Self::Panic => panic!("{err}"),
            Self::Log => log::error!("{err}"),
            Self::Custom(handler) => handler(err),
        }
    }
}

impl fmt::Debug for FaultPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Panic => f.write_str("Panic"),
            Self::Log => f.write_str("Log"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
