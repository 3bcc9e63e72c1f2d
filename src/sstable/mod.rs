//! Sorted String Table: an immutable file of ascending, unique records
//! followed by the file's membership filter.
//!
//! Layout:
//! ```text
//! [0x00 key 0x01 value] [0x00 key 0x01 value] ... [filter bits]
//! ```
//! Keys and values are escaped (see [`record`]) so the two delimiter bytes
//! only ever appear as delimiters. The filter occupies the last
//! `ceil(filter_bits / 8)` bytes; nothing else records its size.

pub mod builder;
pub mod iterator;
pub mod reader;
pub mod record;
