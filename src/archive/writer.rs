//! Archive encoder

use std::collections::HashMap;
use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;

use super::catalog::Catalog;
use super::format::*;
use crate::bit_codec::{BitBuffer, FloatCodec, FloatEncoding};
use crate::color::Color;
use crate::error::{Error, Result};
use crate::model::{Category, Element, Model, ModelMultipart, Reference, Vertex};
use nalgebra::Matrix3;

/// Builds a compressed part archive
///
/// Models are appended one after another into a single bitstream. A record
/// identical to one already written is replaced by a redirect to it whenever
/// that is shorter.
#[derive(Debug, Default)]
pub struct ArchiveWriter {
    codec: FloatEncoding,
    bits: BitBuffer,
    catalog: Catalog,
    seen: HashMap<(usize, Vec<u8>), u32>,
    redirects: usize,
}

impl ArchiveWriter {
    /// Create a writer using the given float codec
    pub fn new(codec: FloatEncoding) -> Self {
        Self {
            codec,
            ..Self::default()
        }
    }

    /// Catalog built so far
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Number of records replaced by redirects so far
    pub fn redirect_count(&self) -> usize {
        self.redirects
    }

    /// Size of the uncompressed bitstream in bits
    pub fn bit_len(&self) -> usize {
        self.bits.len()
    }

    /// Append one model under `name`
    ///
    /// Comments, state markers and print text are not archived.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArchiveLimit`] when the catalog runs out of handles or
    /// the bitstream outgrows 32-bit offsets.
    pub fn add_model(&mut self, name: &str, model: &Model, category: Category) -> Result<u16> {
        let offset = u32::try_from(self.bits.len()).map_err(|_| Error::ArchiveLimit {
            operation: "ArchiveWriter::add_model",
            message: "bitstream exceeds 32-bit offsets".to_string(),
        })?;
        let handle = self.catalog.define(name, offset)?;
        tracing::debug!(name, handle, offset, elements = model.elements.len(), "archiving model");

        let marker = match category {
            Category::Part => MetaCmd::ModelPart,
            Category::Primitive => MetaCmd::ModelPrim,
        };
        self.write_meta(marker);
        if let Some(cmd) = MetaCmd::from_certification(model.bfc()) {
            self.write_meta(cmd);
        }

        for element in &model.elements {
            let mut record = BitBuffer::new();
            match element {
                Element::Comment(_) | Element::State(_) | Element::Print(_) => continue,
                Element::Bfc(cmd) => {
                    record.write_bits(TAG_META, ID_LINE_TYPE);
                    record.write_bits(MetaCmd::from_bfc(*cmd).code(), ID_META_CMD);
                }
                Element::Reference(r) => {
                    let target = self.catalog.intern(&r.filename)?;
                    self.catalog.add_dependency(handle, target);
                    self.encode_reference(&mut record, r, target);
                }
                Element::Line(l) => self.encode_geometry(&mut record, 2, l.color, &l.vertices),
                Element::Triangle(t) => self.encode_geometry(&mut record, 3, t.color, &t.vertices),
                Element::Quadrilateral(q) => {
                    self.encode_geometry(&mut record, 4, q.color, &q.vertices)
                }
                Element::ConditionalLine(c) => {
                    let all = [c.vertices[0], c.vertices[1], c.controls[0], c.controls[1]];
                    self.encode_geometry(&mut record, 5, c.color, &all)
                }
            }
            self.push_record(record);
        }

        self.write_meta(MetaCmd::ModelEnd);
        Ok(handle)
    }

    /// Append a multipart: the main model under `name`, each submodel under its own name
    pub fn add_multipart(
        &mut self,
        name: &str,
        multipart: &ModelMultipart,
        category: Category,
    ) -> Result<u16> {
        let handle = self.add_model(name, multipart.main(), category)?;
        for (sub_name, model) in multipart.submodels() {
            self.add_model(sub_name, model, category)?;
        }
        Ok(handle)
    }

    /// Finish the archive and return the container bytes
    pub fn finish(mut self) -> Result<Vec<u8>> {
        self.write_meta(MetaCmd::LibEnd);

        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.push(VERSION);
        out.push(self.codec.id());
        out.push(self.codec.bits() as u8);
        if let FloatEncoding::ScaleOffset(so) = &self.codec {
            out.extend_from_slice(&so.min().to_le_bytes());
            out.extend_from_slice(&so.max().to_le_bytes());
        }
        self.catalog.write_to(&mut out);

        let mut encoder = GzEncoder::new(out, Compression::default());
        encoder.write_all(self.bits.as_bytes())?;
        let out = encoder.finish()?;
        tracing::debug!(
            entries = self.catalog.len(),
            bits = self.bits.len(),
            redirects = self.redirects,
            bytes = out.len(),
            "archive finished"
        );
        Ok(out)
    }

    /// Finish the archive into a writer
    pub fn write_to<W: Write>(self, mut writer: W) -> Result<()> {
        let bytes = self.finish()?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    fn write_meta(&mut self, cmd: MetaCmd) {
        self.bits.write_bits(TAG_META, ID_LINE_TYPE);
        self.bits.write_bits(cmd.code(), ID_META_CMD);
    }

    fn color_index(&self, color: Color) -> u32 {
        match color.index() {
            Some(i) if !color.is_direct() => u32::from(i),
            _ => {
                tracing::warn!(%color, "colour has no archive index, storing main colour");
                Color::MAIN.index().map(u32::from).unwrap_or(0)
            }
        }
    }

    fn write_point(&self, record: &mut BitBuffer, p: &Vertex) {
        for v in [p.x, p.y, p.z] {
            record.write_float(v, &self.codec);
        }
    }

    fn encode_geometry(&self, record: &mut BitBuffer, tag: u32, color: Color, points: &[Vertex]) {
        record.write_bits(tag, ID_LINE_TYPE);
        record.write_bits(self.color_index(color), ID_COLOR);
        for p in points {
            self.write_point(record, p);
        }
    }

    fn encode_reference(&self, record: &mut BitBuffer, r: &Reference, target: u16) {
        record.write_bits(TAG_REFERENCE, ID_LINE_TYPE);
        record.write_bits(self.color_index(r.color), ID_COLOR);
        for v in [r.position.x, r.position.y, r.position.z] {
            record.write_float(v, &self.codec);
        }
        if r.matrix == Matrix3::identity() {
            record.write_bits(0, ID_MATRIX_FLAG);
        } else {
            record.write_bits(1, ID_MATRIX_FLAG);
            for row in 0..3 {
                for col in 0..3 {
                    record.write_float(r.matrix[(row, col)], &self.codec);
                }
            }
        }
        record.write_bits(u32::from(target), ID_NAME_HASH);
    }

    fn push_record(&mut self, record: BitBuffer) {
        let len = record.len();
        let here = self.bits.len() as u64;
        let key = (len, record.as_bytes().to_vec());
        if len > REDIRECT_BITS
            && let Some(&target) = self.seen.get(&key)
        {
            self.bits.write_bits(TAG_REDIRECT, ID_LINE_TYPE);
            self.bits.write_bits(target, ID_OFFSET);
            self.redirects += 1;
            return;
        }
        if here < MAX_REDIRECT_OFFSET {
            self.seen.entry(key).or_insert(here as u32);
        } else {
            tracing::debug!(offset = here, "record beyond redirect range, not deduplicated");
        }
        self.bits.append(&record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::Archive;
    use crate::parser::load_from_str;

    const BRICK: &str = "\
0 Brick 1 x 1
0 BFC CERTIFY CCW
0 STEP
1 16 0 0 0 1 0 0 0 1 0 0 0 1 stud.dat
1 16 0 -4 0 1 0 0 0 1 0 0 0 1 STUD.DAT
4 16 -10 0 -10 10 0 -10 10 0 10 -10 0 10
4 16 -10 0 -10 10 0 -10 10 0 10 -10 0 10
";

    #[test]
    fn test_model_survives_archive() {
        let mm = load_from_str(BRICK, "3005.dat").unwrap();
        let mut writer = ArchiveWriter::default();
        writer.add_multipart("3005.dat", &mm, Category::Part).unwrap();
        let bytes = writer.finish().unwrap();

        let mut archive = Archive::open(bytes).unwrap();
        assert!(archive.contains("3005.dat"));
        assert!(!archive.contains("stud.dat"));
        assert_eq!(archive.dependencies("3005.DAT"), vec!["stud.dat".to_string()]);

        let (loaded, category) = archive.load("3005.dat").unwrap().unwrap();
        assert_eq!(category, Category::Part);
        let model = loaded.main();
        assert!(model.bfc().is_certified());
        // the STEP marker is not archived
        assert_eq!(model.elements.len(), 4);
        let r = model.elements[1].as_reference().unwrap();
        assert_eq!(r.filename, "stud.dat");
        assert_eq!(r.position.y, -4.0);
        assert_eq!(model.elements[2], model.elements[3]);
    }

    #[test]
    fn test_identical_quad_is_redirected() {
        let mm = load_from_str(BRICK, "3005.dat").unwrap();
        let mut writer = ArchiveWriter::default();
        writer.add_model("3005.dat", mm.main(), Category::Part).unwrap();
        assert_eq!(writer.redirect_count(), 1);
    }

    #[test]
    fn test_short_records_are_not_redirected() {
        let mut model = Model::new();
        model.insert_element(Element::Bfc(crate::model::BfcCommand::InvertNext));
        model.insert_element(Element::Bfc(crate::model::BfcCommand::InvertNext));
        let mut writer = ArchiveWriter::default();
        writer.add_model("x.dat", &model, Category::Primitive).unwrap();
        assert_eq!(writer.redirect_count(), 0);
    }

    #[test]
    fn test_direct_colour_falls_back_to_main() {
        let mm = load_from_str("2 0x2FF0000 0 0 0 1 1 1\n", "x.dat").unwrap();
        let mut writer = ArchiveWriter::default();
        writer.add_multipart("x.dat", &mm, Category::Primitive).unwrap();
        let mut archive = Archive::open(writer.finish().unwrap()).unwrap();
        let (loaded, _) = archive.load("x.dat").unwrap().unwrap();
        assert_eq!(loaded.main().elements[0].color(), Some(Color::MAIN));
    }
}
