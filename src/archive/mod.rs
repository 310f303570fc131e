//! Compressed binary part archive
//!
//! An archive stores a whole part library as one gzip-compressed bitstream of
//! fixed-width records, preceded by an uncompressed header:
//!
//! ```text
//! "LDRA" | version u8 | codec id u8 | codec bits u8 | [min f32 | max f32]
//! catalog: count u32 | (hash u32, handle u16) * count, sorted by hash
//!          per handle: offset u32 | name len u16 | name | deps u16 | handle u16 * deps
//! gzip payload: the bitstream
//! ```
//!
//! Each model starts with a category marker, an optional certification
//! marker, then one record per element, and ends with a model-end marker.

mod catalog;
mod format;
mod reader;
mod writer;

pub use catalog::{Catalog, CatalogEntry};
pub use format::{
    ID_COLOR, ID_LINE_TYPE, ID_MATRIX_FLAG, ID_META_CMD, ID_NAME_HASH, ID_OFFSET, MAGIC,
    MAX_HANDLES, MAX_REDIRECT_OFFSET, MetaCmd, REDIRECT_BITS, TAG_META, TAG_REDIRECT,
    TAG_REFERENCE, VERSION, name_hash,
};
pub use reader::Archive;
pub use writer::ArchiveWriter;
