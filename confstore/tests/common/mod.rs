//! Shared fixtures for the integration tests
#![allow(dead_code)]

use confstore::{Blob, EntryId, Schema, SchemaBuilder, Store};

/// A record type stored as a blob entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shape {
    pub width: i32,
    pub tag: u8,
    pub height: i32,
    pub mark: u8,
}

impl Default for Shape {
    fn default() -> Self {
        Self {
            width: 97,
            tag: b'b',
            height: 2566,
            mark: b'G',
        }
    }
}

impl Blob for Shape {
    const SIZE: usize = 10;

    fn encode(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.width.to_le_bytes());
        out[4] = self.tag;
        out[5..9].copy_from_slice(&self.height.to_le_bytes());
        out[9] = self.mark;
    }

    fn decode(bytes: &[u8]) -> Self {
        let mut width = [0u8; 4];
        let mut height = [0u8; 4];
        width.copy_from_slice(&bytes[0..4]);
        height.copy_from_slice(&bytes[5..9]);
        Self {
            width: i32::from_le_bytes(width),
            tag: bytes[4],
            height: i32::from_le_bytes(height),
            mark: bytes[9],
        }
    }
}

/// Entry ids of the fixture schema
#[derive(Debug, Clone, Copy)]
pub struct Ids {
    pub count: EntryId,
    pub offset: EntryId,
    pub enabled: EntryId,
    pub name: EntryId,
    pub total: EntryId,
    pub gain: EntryId,
    pub bias: EntryId,
    pub shape: EntryId,
    pub level: EntryId,
    pub trim: EntryId,
    pub serial: EntryId,
    pub stamp: EntryId,
    pub ratio: EntryId,
}

/// One entry or more of every kind: all numeric widths, a string and a blob
pub fn schema() -> (Schema, Ids) {
    let mut builder = SchemaBuilder::new("fixture");
    let ids = Ids {
        count: builder.number_in_range("COUNT", 16u16, 0, 500),
        offset: builder.number_in_range("OFFSET", -16i16, -50, 100),
        enabled: builder.number("ENABLED", true),
        name: builder.string("NAME", "WHATEVER", 34),
        total: builder.number("TOTAL", 32u32),
        gain: builder.number_in_range("GAIN", -3.0f32, -5.0, 50.0),
        bias: builder.number("BIAS", -3.0f32),
        shape: builder.blob("SHAPE", &Shape::default()),
        level: builder.number_in_range("LEVEL", 5u8, 1, 10),
        trim: builder.number_in_range("TRIM", -5i8, -10, 10),
        serial: builder.number_in_range("SERIAL", 1_000u64, 0, 1_000_000),
        stamp: builder.number_in_range("STAMP", -1_000i64, -1_000_000, 1_000_000),
        ratio: builder.number_in_range("RATIO", 0.5f64, 0.0, 1.0),
    };
    (builder.build().expect("fixture schema is valid"), ids)
}

/// Number of entries in the fixture schema
pub const ENTRIES: usize = 13;

/// Initialized store over the fixture schema, no backend
pub fn store() -> (Store, Ids) {
    init_logging();
    let (schema, ids) = schema();
    let store = Store::new(schema);
    store.init();
    (store, ids)
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
