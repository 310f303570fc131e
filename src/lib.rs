//! # libldr
//!
//! A pure Rust library for reading, resolving and flattening LDraw brick models.
//!
//! Models come from the line-oriented text format or from a compact
//! bit-packed part archive. References between models are resolved by a
//! reference-counted part library, and a geometry exporter turns a resolved
//! tree into flat vertex, colour and normal buffers ready for rendering.
//!
//! ## Features
//!
//! - Pure Rust implementation with no unsafe code
//! - Text reader and writer for single models and multipart (`0 FILE`) streams
//! - Binary archive reader and writer with hashed-name catalog and lossy float codecs
//! - Shared part/primitive cache with configurable eviction
//! - Geometry export honouring back-face-culling winding and colour inheritance
//!
//! ## Example
//!
//! ```
//! use libldr::ModelMultipart;
//! use libldr::export::{BufferType, ExportParams, GeometryExporter, StudMode};
//! use libldr::library::{LibraryConfig, MemoryStorage, PartLibrary};
//!
//! # fn main() -> libldr::Result<()> {
//! let storage = MemoryStorage::new()
//!     .with_file("ldraw/p/stud.dat", "0 Stud\n")
//!     .with_file("ldraw/parts/3001.dat", "0 Brick\n");
//! let mut library = PartLibrary::new(LibraryConfig::new().with_root("ldraw").with_storage(storage))?;
//!
//! let text = "1 4 0 0 0 1 0 0 0 1 0 0 0 1 stud.dat\n";
//! let mut model = ModelMultipart::from_reader(text.as_bytes(), "plate.ldr")?;
//! library.link(&mut model)?;
//!
//! let params = ExportParams::new().with_stud_mode(StudMode::Square);
//! let exporter = GeometryExporter::for_multipart(&model, Some(&library), params);
//! assert_eq!(exporter.count(BufferType::Lines), 16);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod archive;
pub mod bit_codec;
pub mod color;
pub mod error;
pub mod export;
pub mod library;
pub mod model;
pub mod parser;
pub mod utils;
pub mod validator;
pub mod writer;

pub use color::{Color, ColorEntity, Material};
pub use error::{Error, Result};
pub use model::{
    BfcCertification, BfcCommand, BoundingBox, Category, CertificationStatus, ConditionalLine,
    Element, EntryId, Line, Link, Model, ModelMultipart, ModelResolver, Quadrilateral, Reference,
    Scope, StateMarker, Triangle, Vertex, Winding,
};
pub use parser::ParserConfig;

use std::io::Read;
use std::path::Path;

impl ModelMultipart {
    /// Parse a text stream
    ///
    /// # Arguments
    ///
    /// * `reader` - Bytes of an LDraw file
    /// * `name` - Stream name; its base name names the main model when the file does not
    ///
    /// # Example
    ///
    /// ```
    /// use libldr::ModelMultipart;
    ///
    /// let mm = ModelMultipart::from_reader("0 Plate 1 x 1\n".as_bytes(), "3024.dat").unwrap();
    /// assert_eq!(mm.main().description, "Plate 1 x 1");
    /// ```
    pub fn from_reader<R: Read>(reader: R, name: &str) -> Result<Self> {
        parser::load_from_stream(reader, name)
    }

    /// Parse a text stream with a custom configuration
    ///
    /// # Arguments
    ///
    /// * `reader` - Bytes of an LDraw file
    /// * `name` - Stream name
    /// * `config` - Reader configuration
    pub fn from_reader_with_config<R: Read>(
        mut reader: R,
        name: &str,
        config: &ParserConfig,
    ) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        parser::load_from_str_with_config(&String::from_utf8_lossy(&bytes), name, config)
    }

    /// Open and parse a file
    ///
    /// # Errors
    ///
    /// Returns [`Error::StreamOpen`] when the file cannot be opened.
    pub fn from_file(path: &Path) -> Result<Self> {
        parser::load_from_file(path)
    }

    /// Serialise back to the text format
    pub fn to_writer<W: std::io::Write>(&self, writer: W) -> Result<()> {
        writer::write_multipart(self, writer)
    }
}
