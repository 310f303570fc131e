//! Line-level parsing of the LDraw text grammar

use nalgebra::{Matrix3, Point3, Vector3};

use crate::color::Color;
use crate::error::{Error, Result};
use crate::model::{
    BfcCertification, BfcCommand, ConditionalLine, Element, Line, Model, Quadrilateral, Reference,
    StateMarker, Triangle, Vertex, Winding,
};

/// Fields of a type 1 line before the file name: colour, translation, 3x3 matrix
const REFERENCE_FIELDS: usize = 13;

/// What a `0` line turned into
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MetaLine {
    /// The line produced an element
    Element(Element),
    /// The line only updated model metadata
    Consumed,
    /// An empty `0` line
    Empty,
}

/// Numeric fields of one line, with missing trailing fields read as zero
struct Fields<'a> {
    tokens: Vec<&'a str>,
    line_no: usize,
}

impl Fields<'_> {
    fn color(&self) -> Result<Color> {
        match self.tokens.first() {
            Some(t) => Color::parse(t).map_err(|_| {
                Error::parse_error_with_context(&format!("line {} color", self.line_no), t, "colour id")
            }),
            None => Ok(Color::default()),
        }
    }

    fn float(&self, index: usize) -> Result<f32> {
        match self.tokens.get(index) {
            Some(t) => t.parse::<f32>().map_err(|_| {
                Error::parse_error_with_context(&format!("line {} field {}", self.line_no, index), t, "number")
            }),
            None => Ok(0.0),
        }
    }

    fn point(&self, first: usize) -> Result<Vertex> {
        Ok(Point3::new(
            self.float(first)?,
            self.float(first + 1)?,
            self.float(first + 2)?,
        ))
    }

    fn points<const N: usize>(&self) -> Result<[Vertex; N]> {
        let mut out = [Point3::origin(); N];
        for (i, p) in out.iter_mut().enumerate() {
            *p = self.point(1 + i * 3)?;
        }
        Ok(out)
    }
}

/// Parse the text after `1` into a reference
///
/// The file name is the trailing token; a name containing spaces is accepted
/// when all thirteen numeric fields are present. A numeric trailing token is
/// a field, not a name.
fn parse_reference(rest: &str, line_no: usize) -> Result<Reference> {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    let (numbers, filename) = if tokens.len() > REFERENCE_FIELDS + 1 {
        (tokens[..REFERENCE_FIELDS].to_vec(), tokens[REFERENCE_FIELDS..].join(" "))
    } else {
        match tokens.split_last() {
            Some((name, _)) if name.parse::<f32>().is_ok() => (Vec::new(), String::new()),
            Some((name, nums)) => (nums.to_vec(), name.to_string()),
            None => (Vec::new(), String::new()),
        }
    };
    if filename.is_empty() {
        return Err(Error::ParseError(format!(
            "line {}: reference without a file name",
            line_no
        )));
    }
    let f = Fields {
        tokens: numbers,
        line_no,
    };
    let position = Vector3::new(f.float(1)?, f.float(2)?, f.float(3)?);
    let mut m = [0.0f32; 9];
    for (i, v) in m.iter_mut().enumerate() {
        *v = f.float(4 + i)?;
    }
    Ok(Reference {
        color: f.color()?,
        position,
        matrix: Matrix3::from_row_slice(&m),
        filename,
        link: Default::default(),
    })
}

/// Apply a `0 BFC ...` line
fn parse_bfc(words: &str, model: &mut Model, line_no: usize) -> MetaLine {
    let upper = words.to_uppercase();
    let words: Vec<&str> = upper.split_whitespace().collect();
    if let Some(cmd) = BfcCommand::from_words(&words) {
        return MetaLine::Element(Element::Bfc(cmd));
    }
    let cert = match words.as_slice() {
        ["CERTIFY"] | ["CERTIFY", "CCW"] => Some(BfcCertification::certified(Winding::Ccw)),
        ["CERTIFY", "CW"] => Some(BfcCertification::certified(Winding::Cw)),
        ["NOCERTIFY"] => Some(BfcCertification::uncertified()),
        _ => None,
    };
    match cert {
        Some(c) => {
            model.set_bfc(c);
            MetaLine::Consumed
        }
        None => {
            tracing::warn!(line = line_no, model = %model.name, command = %upper, "unknown BFC command kept as comment");
            MetaLine::Element(Element::Comment(format!("BFC {}", words.join(" "))))
        }
    }
}

/// Parse the text after a leading `0`
pub(crate) fn parse_meta(cont: &str, model: &mut Model, line_no: usize) -> MetaLine {
    let cont = cont.trim();
    if cont.is_empty() {
        return MetaLine::Empty;
    }
    if let Some(header) = cont.strip_prefix('!') {
        let (key, value) = header.split_once(char::is_whitespace).unwrap_or((header, ""));
        model.set_header(key, value.trim());
        return MetaLine::Consumed;
    }

    let (keyword, rest) = match cont.split_once(char::is_whitespace) {
        Some((k, r)) => (k, r.trim()),
        None => (cont, ""),
    };
    let keyword_lc = keyword.to_ascii_lowercase();
    match (keyword_lc.as_str(), rest.is_empty()) {
        ("step", true) => MetaLine::Element(Element::State(StateMarker::Step)),
        ("pause", true) => MetaLine::Element(Element::State(StateMarker::Pause)),
        ("clear", true) => MetaLine::Element(Element::State(StateMarker::Clear)),
        ("save", true) => MetaLine::Element(Element::State(StateMarker::Save)),
        ("print" | "write", false) => MetaLine::Element(Element::Print(rest.to_string())),
        ("bfc", false) => parse_bfc(rest, model, line_no),
        _ => MetaLine::Element(Element::Comment(cont.to_string())),
    }
}

/// Parse one line of geometry or meta-command into an element
///
/// `0` lines that only carry metadata (`!KEY`, BFC certification) update
/// `model` and return `Ok(None)`.
///
/// # Errors
///
/// Returns [`Error::ParseError`] for an unknown line type or a malformed
/// numeric field. Missing trailing fields read as zero.
pub fn parse_line_at(line: &str, model: &mut Model, line_no: usize) -> Result<Option<Element>> {
    let line = line.trim();
    let Some((kind, rest)) = line
        .split_once(char::is_whitespace)
        .or(Some((line, "")))
        .filter(|(k, _)| !k.is_empty())
    else {
        return Ok(None);
    };

    let fields = || Fields {
        tokens: rest.split_whitespace().collect(),
        line_no,
    };
    let element = match kind {
        "0" => match parse_meta(rest, model, line_no) {
            MetaLine::Element(e) => e,
            MetaLine::Consumed | MetaLine::Empty => return Ok(None),
        },
        "1" => Element::Reference(parse_reference(rest, line_no)?),
        "2" => {
            let f = fields();
            Element::Line(Line {
                color: f.color()?,
                vertices: f.points::<2>()?,
            })
        }
        "3" => {
            let f = fields();
            Element::Triangle(Triangle {
                color: f.color()?,
                vertices: f.points::<3>()?,
            })
        }
        "4" => {
            let f = fields();
            Element::Quadrilateral(Quadrilateral {
                color: f.color()?,
                vertices: f.points::<4>()?,
            })
        }
        "5" => {
            let f = fields();
            let [a, b, c, d] = f.points::<4>()?;
            Element::ConditionalLine(ConditionalLine {
                color: f.color()?,
                vertices: [a, b],
                controls: [c, d],
            })
        }
        other => {
            return Err(Error::ParseError(format!(
                "line {}: unknown line type '{}'",
                line_no, other
            )));
        }
    };
    Ok(Some(element))
}

/// Parse one line, see [`parse_line_at`]
///
/// # Example
///
/// ```
/// use libldr::{Element, Model};
/// use libldr::parser::parse_line;
///
/// let mut model = Model::new();
/// let e = parse_line("2 24 0 0 0 1 0 0", &mut model).unwrap().unwrap();
/// assert_eq!(e.line_type(), 2);
///
/// assert!(parse_line("0 BFC CERTIFY CW", &mut model).unwrap().is_none());
/// assert!(model.bfc().is_certified());
/// ```
pub fn parse_line(line: &str, model: &mut Model) -> Result<Option<Element>> {
    parse_line_at(line, model, 0)
}
