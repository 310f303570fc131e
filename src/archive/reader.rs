//! Archive decoder

use std::path::Path;

use nalgebra::{Matrix3, Point3, Vector3};

use super::catalog::{ByteReader, Catalog};
use super::format::*;
use crate::bit_codec::{BitReader, BitShave, BitSource, FloatEncoding, GzSource, ScaleOffset};
use crate::color::Color;
use crate::error::{Error, Result};
use crate::model::{
    Category, ConditionalLine, Element, Line, Link, Model, ModelMultipart, Quadrilateral,
    Reference, Triangle, Vertex,
};
use crate::utils::normalize_name;

/// Redirects followed back to back before a record must appear
const MAX_REDIRECT_HOPS: usize = 64;

/// Read the float codec description from the container header
pub(crate) fn read_codec(r: &mut ByteReader<'_>) -> Result<FloatEncoding> {
    let id = r.u8()?;
    let bits = u32::from(r.u8()?);
    match id {
        0 => Ok(FloatEncoding::BitShave(BitShave::new(bits))),
        1 => {
            let min = r.f32()?;
            let max = r.f32()?;
            Ok(FloatEncoding::ScaleOffset(ScaleOffset::new(min, max, bits)))
        }
        other => Err(Error::invalid_archive(
            "Archive::open",
            format!("unknown float codec {}", other),
        )),
    }
}

/// Random-access reader of a compressed part archive
///
/// # Example
///
/// ```
/// use libldr::archive::{Archive, ArchiveWriter};
/// use libldr::parser::load_from_str;
/// use libldr::model::Category;
///
/// # fn main() -> libldr::Result<()> {
/// let part = load_from_str("3 4 0 0 0 1 0 0 0 1 0\n", "tri.dat")?;
/// let mut writer = ArchiveWriter::default();
/// writer.add_multipart("tri.dat", &part, Category::Primitive)?;
/// let bytes = writer.finish()?;
///
/// let mut archive = Archive::open(bytes)?;
/// let (mm, category) = archive.load("TRI.DAT")?.unwrap();
/// assert_eq!(category, Category::Primitive);
/// assert_eq!(mm.main().elements.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Archive<S = GzSource> {
    catalog: Catalog,
    codec: FloatEncoding,
    reader: BitReader<S>,
}

impl Archive<GzSource> {
    /// Parse a container held in memory
    ///
    /// The bitstream stays compressed; it is inflated on demand.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArchive`] for a bad magic, an unknown version
    /// or a malformed catalog.
    pub fn open(bytes: Vec<u8>) -> Result<Self> {
        const OP: &str = "Archive::open";
        let mut r = ByteReader::new(&bytes, OP);
        if r.take(MAGIC.len())? != MAGIC {
            return Err(Error::invalid_archive(OP, "bad magic"));
        }
        let version = r.u8()?;
        if version != VERSION {
            return Err(Error::Unsupported(format!("archive version {}", version)));
        }
        let codec = read_codec(&mut r)?;
        let catalog = Catalog::read_from(&mut r)?;
        let payload = bytes[r.position()..].to_vec();
        let source = GzSource::new(payload)?;
        tracing::debug!(entries = catalog.len(), bits = source.bit_len(), "opened archive");
        Ok(Self::from_parts(catalog, codec, source))
    }

    /// Read and parse a container file
    pub fn open_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|_| Error::stream_open("Archive::open_file", path.display().to_string()))?;
        Self::open(bytes)
    }
}

impl<S: BitSource> Archive<S> {
    /// Assemble an archive from an already decoded catalog and bit source
    pub fn from_parts(catalog: Catalog, codec: FloatEncoding, source: S) -> Self {
        Self {
            catalog,
            codec,
            reader: BitReader::new(source),
        }
    }

    /// The catalog
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Float codec used by the bitstream
    pub fn codec(&self) -> &FloatEncoding {
        &self.codec
    }

    /// True when `name` has records in the archive
    pub fn contains(&self, name: &str) -> bool {
        self.catalog.contains(name)
    }

    /// Handle of `name`
    pub fn handle(&self, name: &str) -> Option<u16> {
        self.catalog.handle(name)
    }

    /// Bit offset of `name`
    pub fn offset(&self, name: &str) -> Option<u32> {
        self.catalog.offset(name)
    }

    /// Name stored under a handle
    pub fn name_of(&self, handle: u16) -> Option<&str> {
        self.catalog.name_of(handle)
    }

    /// Names `name` depends on
    ///
    /// Primitive quality variants are checked too: the first of `name`,
    /// `48/name` and `8/name` present in the catalog answers.
    pub fn dependencies(&self, name: &str) -> Vec<String> {
        let key = normalize_name(name);
        [key.clone(), format!("48/{}", key), format!("8/{}", key)]
            .iter()
            .find_map(|n| self.catalog.dependencies(n))
            .map(|deps| {
                deps.iter()
                    .filter_map(|&h| self.catalog.name_of(h).map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Decode the model stored under `name`
    ///
    /// Returns `Ok(None)` when the archive has no records for it.
    ///
    /// # Errors
    ///
    /// Any out-of-range read or unknown tag means the archive is corrupted and
    /// is reported as [`Error::BitRange`] or [`Error::InvalidArchive`].
    pub fn load(&mut self, name: &str) -> Result<Option<(ModelMultipart, Category)>> {
        match self.catalog.handle(name) {
            Some(h) if self.catalog.entry(h).is_some_and(|e| e.offset.is_some()) => {
                self.load_handle(h).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Decode the model stored under a handle
    pub fn load_handle(&mut self, handle: u16) -> Result<(ModelMultipart, Category)> {
        const OP: &str = "Archive::load";
        let entry = self
            .catalog
            .entry(handle)
            .ok_or_else(|| Error::invalid_archive(OP, format!("no entry {}", handle)))?;
        let offset = entry
            .offset
            .ok_or_else(|| Error::invalid_archive(OP, format!("entry {} has no records", entry.name)))?;
        let name = entry.name.clone();

        self.reader.set_bit_pos(offset as usize);
        let mut model = Model::with_name(name.clone());
        let mut category = Category::Part;
        let mut resume: Option<usize> = None;
        let mut hops = 0;

        loop {
            let tag = self.reader.read_bits(ID_LINE_TYPE)?;
            if tag == TAG_REDIRECT {
                let target = self.reader.read_bits(ID_OFFSET)? as usize;
                hops += 1;
                if hops > MAX_REDIRECT_HOPS {
                    return Err(Error::invalid_archive(
                        OP,
                        format!("redirect loop in {}", name),
                    ));
                }
                tracing::trace!(from = self.reader.bit_pos(), to = target, "redirect");
                // a chained redirect still returns to the first jump site
                resume.get_or_insert(self.reader.bit_pos());
                self.reader.set_bit_pos(target);
                continue;
            }
            let element = match tag {
                TAG_META => {
                    let code = self.reader.read_bits(ID_META_CMD)?;
                    match MetaCmd::from_code(code) {
                        Some(MetaCmd::LibEnd | MetaCmd::ModelEnd) => break,
                        Some(MetaCmd::ModelPart) => {
                            category = Category::Part;
                            None
                        }
                        Some(MetaCmd::ModelPrim) => {
                            category = Category::Primitive;
                            None
                        }
                        Some(cmd) => {
                            if let Some(cert) = cmd.to_certification() {
                                model.set_bfc(cert);
                            }
                            cmd.to_bfc().map(Element::Bfc)
                        }
                        None => {
                            tracing::trace!(code, "ignoring unassigned meta command");
                            None
                        }
                    }
                }
                TAG_REFERENCE => Some(Element::Reference(self.read_reference()?)),
                2 => {
                    let color = self.read_color()?;
                    Some(Element::Line(Line {
                        color,
                        vertices: self.read_points::<2>()?,
                    }))
                }
                3 => {
                    let color = self.read_color()?;
                    Some(Element::Triangle(Triangle {
                        color,
                        vertices: self.read_points::<3>()?,
                    }))
                }
                4 => {
                    let color = self.read_color()?;
                    Some(Element::Quadrilateral(Quadrilateral {
                        color,
                        vertices: self.read_points::<4>()?,
                    }))
                }
                5 => {
                    let color = self.read_color()?;
                    let [a, b, c, d] = self.read_points::<4>()?;
                    Some(Element::ConditionalLine(ConditionalLine {
                        color,
                        vertices: [a, b],
                        controls: [c, d],
                    }))
                }
                other => {
                    return Err(Error::invalid_archive(
                        OP,
                        format!("unknown record tag {} in {}", other, name),
                    ));
                }
            };
            if let Some(e) = element {
                tracing::trace!(line_type = e.line_type(), "decoded record");
                model.elements.push(e);
            }
            hops = 0;
            if let Some(pos) = resume.take() {
                self.reader.set_bit_pos(pos);
            }
        }

        Ok((ModelMultipart::new(model), category))
    }

    fn read_color(&mut self) -> Result<Color> {
        let index = self.reader.read_bits(ID_COLOR)?;
        Color::from_index(index as u8).ok_or_else(|| {
            Error::invalid_archive("Archive::load", format!("colour index {} out of range", index))
        })
    }

    fn read_float(&mut self) -> Result<f32> {
        let codec = self.codec;
        self.reader.read_float(&codec)
    }

    fn read_point(&mut self) -> Result<Vertex> {
        Ok(Point3::new(
            self.read_float()?,
            self.read_float()?,
            self.read_float()?,
        ))
    }

    fn read_points<const N: usize>(&mut self) -> Result<[Vertex; N]> {
        let mut out = [Point3::origin(); N];
        for p in out.iter_mut() {
            *p = self.read_point()?;
        }
        Ok(out)
    }

    fn read_reference(&mut self) -> Result<Reference> {
        let color = self.read_color()?;
        let p = self.read_point()?;
        let matrix = if self.reader.read_bits(ID_MATRIX_FLAG)? == 1 {
            let mut m = [0.0f32; 9];
            for v in m.iter_mut() {
                *v = self.read_float()?;
            }
            Matrix3::from_row_slice(&m)
        } else {
            Matrix3::identity()
        };
        let handle = self.reader.read_bits(ID_NAME_HASH)? as u16;
        let filename = self
            .catalog
            .name_of(handle)
            .ok_or_else(|| {
                Error::invalid_archive("Archive::load", format!("unknown handle {}", handle))
            })?
            .to_string();
        Ok(Reference {
            color,
            position: Vector3::new(p.x, p.y, p.z),
            matrix,
            filename,
            link: Link::Unresolved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bit_codec::{BitBuffer, SliceSource};

    fn archive_over(buf: &BitBuffer, catalog: Catalog) -> Archive<SliceSource<'_>> {
        let source = SliceSource::with_bit_len(buf.as_bytes(), buf.len());
        Archive::from_parts(catalog, FloatEncoding::default(), source)
    }

    fn write_line(buf: &mut BitBuffer, codec: &FloatEncoding, color: u8, pts: [[f32; 3]; 2]) {
        buf.write_bits(2, ID_LINE_TYPE);
        buf.write_bits(u32::from(color), ID_COLOR);
        for p in pts {
            for v in p {
                buf.write_float(v, codec);
            }
        }
    }

    #[test]
    fn test_redirect_decodes_one_record_then_returns() {
        let codec = FloatEncoding::default();
        let mut catalog = Catalog::new();
        let mut buf = BitBuffer::new();

        // shared line record at offset 0, followed by an end marker for "a"
        catalog.define("a.dat", 0).unwrap();
        write_line(&mut buf, &codec, 0, [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        buf.write_bits(TAG_META, ID_LINE_TYPE);
        buf.write_bits(MetaCmd::ModelEnd.code(), ID_META_CMD);

        let start = buf.len() as u32;
        catalog.define("b.dat", start).unwrap();
        buf.write_bits(TAG_META, ID_LINE_TYPE);
        buf.write_bits(MetaCmd::ModelPrim.code(), ID_META_CMD);
        buf.write_bits(TAG_REDIRECT, ID_LINE_TYPE);
        buf.write_bits(0, ID_OFFSET);
        write_line(&mut buf, &codec, 1, [[2.0, 0.0, 0.0], [3.0, 0.0, 0.0]]);
        buf.write_bits(TAG_META, ID_LINE_TYPE);
        buf.write_bits(MetaCmd::ModelEnd.code(), ID_META_CMD);

        let mut archive = archive_over(&buf, catalog);
        let (mm, category) = archive.load("b.dat").unwrap().unwrap();
        assert_eq!(category, Category::Primitive);
        let lines: Vec<&Element> = mm.main().elements.iter().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].vertices()[1], Point3::new(1.0, 0.0, 0.0));
        assert_eq!(lines[1].vertices()[0], Point3::new(2.0, 0.0, 0.0));
        assert_eq!(lines[1].color(), Some(Color::from_index(1).unwrap()));
    }

    #[test]
    fn test_truncated_stream_is_bit_range_error() {
        let mut catalog = Catalog::new();
        catalog.define("a.dat", 0).unwrap();
        let mut buf = BitBuffer::new();
        buf.write_bits(3, ID_LINE_TYPE);
        buf.write_bits(0, ID_COLOR);
        let mut archive = archive_over(&buf, catalog);
        let err = archive.load("a.dat").unwrap_err();
        assert!(matches!(err, Error::BitRange { .. }));
    }

    #[test]
    fn test_unknown_tag_is_invalid() {
        let mut catalog = Catalog::new();
        catalog.define("a.dat", 0).unwrap();
        let mut buf = BitBuffer::new();
        buf.write_bits(6, ID_LINE_TYPE);
        let mut archive = archive_over(&buf, catalog);
        assert!(matches!(
            archive.load("a.dat").unwrap_err(),
            Error::InvalidArchive { .. }
        ));
    }

    #[test]
    fn test_redirect_loop_is_invalid() {
        let mut catalog = Catalog::new();
        catalog.define("a.dat", 0).unwrap();
        let mut buf = BitBuffer::new();
        buf.write_bits(TAG_REDIRECT, ID_LINE_TYPE);
        buf.write_bits(0, ID_OFFSET);
        let mut archive = archive_over(&buf, catalog);
        assert!(matches!(
            archive.load("a.dat").unwrap_err(),
            Error::InvalidArchive { .. }
        ));
    }

    #[test]
    fn test_missing_and_placeholder_entries() {
        let mut catalog = Catalog::new();
        catalog.intern("ghost.dat").unwrap();
        let buf = BitBuffer::new();
        let mut archive = archive_over(&buf, catalog);
        assert!(archive.load("ghost.dat").unwrap().is_none());
        assert!(archive.load("nothing.dat").unwrap().is_none());
        assert!(!archive.contains("ghost.dat"));
    }

    #[test]
    fn test_bad_magic() {
        assert!(matches!(
            Archive::open(b"NOPE\x01".to_vec()).unwrap_err(),
            Error::InvalidArchive { .. }
        ));
    }
}
