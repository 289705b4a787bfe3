//! Buffer management for query results.

mod field_buffers;

pub use field_buffers::{BufferStats, FieldBuffers};
