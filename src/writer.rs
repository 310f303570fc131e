//! Text writing for LDraw model files
//!
//! Serialises [`Model`] and [`ModelMultipart`] back into the line grammar read
//! by [`crate::parser`]. Geometry, comments, state markers and print text all
//! survive a write/read cycle; coordinates are written with Rust's shortest
//! round-trip float formatting.

use std::fmt::Write as FmtWrite;
use std::io::Write as IoWrite;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{CertificationStatus, Element, Model, ModelMultipart, Vertex, Winding};

fn num(v: f32) -> f32 {
    // avoid "-0"
    if v == 0.0 { 0.0 } else { v }
}

fn push_points(out: &mut String, points: &[Vertex]) {
    for p in points {
        let _ = write!(out, " {} {} {}", num(p.x), num(p.y), num(p.z));
    }
}

/// Format one element as a line, without the trailing newline
///
/// # Example
///
/// ```
/// use libldr::model::Element;
/// use libldr::parser::parse_line;
/// use libldr::writer::format_element;
/// use libldr::Model;
///
/// let mut model = Model::new();
/// let line = "2 24 0 0 0 1.5 -8 0";
/// let element: Element = parse_line(line, &mut model).unwrap().unwrap();
/// assert_eq!(format_element(&element), line);
/// ```
pub fn format_element(element: &Element) -> String {
    let mut out = String::new();
    match element {
        Element::Comment(text) => {
            let _ = write!(out, "0 {}", text);
        }
        Element::State(marker) => {
            let _ = write!(out, "0 {}", marker.as_str());
        }
        Element::Print(text) => {
            let _ = write!(out, "0 PRINT {}", text);
        }
        Element::Bfc(cmd) => {
            let _ = write!(out, "0 BFC {}", cmd);
        }
        Element::Reference(r) => {
            let _ = write!(
                out,
                "1 {} {} {} {}",
                r.color,
                num(r.position.x),
                num(r.position.y),
                num(r.position.z)
            );
            for row in 0..3 {
                for col in 0..3 {
                    let _ = write!(out, " {}", num(r.matrix[(row, col)]));
                }
            }
            let _ = write!(out, " {}", r.filename);
        }
        Element::Line(l) => {
            let _ = write!(out, "2 {}", l.color);
            push_points(&mut out, &l.vertices);
        }
        Element::Triangle(t) => {
            let _ = write!(out, "3 {}", t.color);
            push_points(&mut out, &t.vertices);
        }
        Element::Quadrilateral(q) => {
            let _ = write!(out, "4 {}", q.color);
            push_points(&mut out, &q.vertices);
        }
        Element::ConditionalLine(c) => {
            let _ = write!(out, "5 {}", c.color);
            push_points(&mut out, &c.vertices);
            push_points(&mut out, &c.controls);
        }
    }
    out
}

fn header_lines(model: &Model, out: &mut String) {
    if !model.description.is_empty() {
        let _ = writeln!(out, "0 {}", model.description);
    } else if model
        .elements
        .iter()
        .any(|e| matches!(e, Element::Comment(_)))
    {
        // keeps a leading comment from being read back as the description
        out.push_str("0\n");
    }
    if !model.name.is_empty() {
        let _ = writeln!(out, "0 Name: {}", model.name);
    }
    if !model.author.is_empty() {
        let _ = writeln!(out, "0 Author: {}", model.author);
    }
    let bfc = model.bfc();
    match (bfc.status, bfc.winding) {
        (CertificationStatus::Certified, Winding::Ccw) => out.push_str("0 BFC CERTIFY CCW\n"),
        (CertificationStatus::Certified, Winding::Cw) => out.push_str("0 BFC CERTIFY CW\n"),
        (CertificationStatus::Uncertified, _) => out.push_str("0 BFC NOCERTIFY\n"),
        (CertificationStatus::Unknown, _) => {}
    }
    for (key, value) in &model.headers {
        let _ = writeln!(out, "0 !{} {}", key, value);
    }
}

/// Serialise a single model
pub fn model_to_string(model: &Model) -> String {
    let mut out = String::new();
    header_lines(model, &mut out);
    for element in &model.elements {
        out.push_str(&format_element(element));
        out.push('\n');
    }
    out
}

/// Serialise a multipart; submodels become `0 FILE` blocks
///
/// A multipart without submodels is written as a plain model.
pub fn multipart_to_string(multipart: &ModelMultipart) -> String {
    if multipart.submodel_count() == 0 {
        return model_to_string(multipart.main());
    }
    let mut out = String::new();
    let main = multipart.main();
    let main_name = if main.name.is_empty() { "main.ldr" } else { main.name.as_str() };
    let _ = writeln!(out, "0 FILE {}", main_name);
    out.push_str(&model_to_string(main));
    for (name, model) in multipart.submodels() {
        let _ = writeln!(out, "\n0 FILE {}", name);
        out.push_str(&model_to_string(model));
    }
    out
}

/// Write a single model to a byte sink and flush it
pub fn write_model<W: IoWrite>(model: &Model, mut writer: W) -> Result<()> {
    writer.write_all(model_to_string(model).as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Write a multipart to a byte sink and flush it
pub fn write_multipart<W: IoWrite>(multipart: &ModelMultipart, mut writer: W) -> Result<()> {
    writer.write_all(multipart_to_string(multipart).as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Write a multipart to a file
///
/// # Errors
///
/// Returns [`Error::StreamOpen`] when the file cannot be created.
pub fn save_to_file(multipart: &ModelMultipart, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .map_err(|_| Error::stream_open("save_to_file", path.display().to_string()))?;
    let mut writer = std::io::BufWriter::new(file);
    write_multipart(multipart, &mut writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::load_from_str;

    #[test]
    fn test_model_headers() {
        let text = "0 Brick 1 x 2\n0 Name: 3004.dat\n0 Author: Jane Doe\n0 BFC CERTIFY CW\n0 !LDRAW_ORG Part UPDATE 2004-03\n0 STEP\n";
        let mm = load_from_str(text, "3004.dat").unwrap();
        assert_eq!(model_to_string(mm.main()), text);
    }

    #[test]
    fn test_multipart_round_trip() {
        let text = "\
0 FILE main.ldr
0 Main
0 Name: main.ldr
1 4 10 -8 0 0 0 1 0 1 0 -1 0 0 wheel.ldr
0 PRINT hello

0 FILE wheel.ldr
0 Wheel
0 Name: wheel.ldr
5 24 0 0 0 0 1 0 1 0 0 -1 0 0
";
        let mm = load_from_str(text, "main.ldr").unwrap();
        assert_eq!(multipart_to_string(&mm), text);
        let again = load_from_str(&multipart_to_string(&mm), "main.ldr").unwrap();
        assert_eq!(again.main().elements, mm.main().elements);
    }

    #[test]
    fn test_negative_zero_and_direct_colour() {
        let mm = load_from_str("2 0x2FF8000 -0 0 0 1 1 1\n", "x.dat").unwrap();
        assert_eq!(
            format_element(&mm.main().elements[0]),
            "2 0x2FF8000 0 0 0 1 1 1"
        );
    }

    /// Sink that accepts writes but fails to flush them
    struct FailingFlush(Vec<u8>);

    impl IoWrite for FailingFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::other("device full"))
        }
    }

    #[test]
    fn test_flush_errors_are_reported() {
        let mm = load_from_str("3 4 0 0 0 1 0 0 0 1 0\n", "x.dat").unwrap();
        let mut sink = FailingFlush(Vec::new());
        let err = write_multipart(&mm, &mut sink).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(write_model(mm.main(), &mut sink).is_err());

        let buffered = std::io::BufWriter::new(FailingFlush(Vec::new()));
        assert!(write_multipart(&mm, buffered).is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_save_to_full_device_fails() {
        let mm = load_from_str("3 4 0 0 0 1 0 0 0 1 0\n", "x.dat").unwrap();
        assert!(save_to_file(&mm, Path::new("/dev/full")).is_err());
    }

    #[test]
    fn test_save_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.ldr");
        let mm = load_from_str("3 4 0 0 0 1 0 0 0 1 0\n", "out.ldr").unwrap();
        save_to_file(&mm, &path).unwrap();
        let back = crate::parser::load_from_file(&path).unwrap();
        assert_eq!(back.main().elements, mm.main().elements);
    }
}
