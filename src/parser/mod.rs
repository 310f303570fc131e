//! Text reader for LDraw model files
//!
//! A stream holds a main model optionally followed by submodels, each
//! introduced by a `0 FILE <name>` line. Parsing runs in two passes: a
//! lookahead pass collects the submodel names, then the models are parsed in
//! file order. Afterwards references to submodels are linked locally and the
//! graph is checked for cycles.

mod core;

use crate::error::{Error, Result};
use crate::model::{Model, ModelMultipart};
use crate::utils::{base_name, normalize_name};
use crate::validator;
use std::io::Read;
use std::iter::Peekable;
use std::path::Path;

pub use core::{parse_line, parse_line_at};
use core::{MetaLine, parse_meta};

/// Configuration for the text reader
///
/// # Example
///
/// ```
/// use libldr::parser::{ParserConfig, load_from_str_with_config};
///
/// let config = ParserConfig::new().with_strict(true);
/// assert!(load_from_str_with_config("2 4 0 0 zero 1 1 1\n", "bad.dat", &config).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ParserConfig {
    strict: bool,
}

impl ParserConfig {
    /// Lenient configuration: malformed lines are logged and skipped
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail on the first malformed line instead of skipping it
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// True when malformed lines are fatal
    pub fn is_strict(&self) -> bool {
        self.strict
    }
}

type Lines<'a> = Peekable<std::iter::Enumerate<std::str::Lines<'a>>>;

/// Name given by a `0 FILE <name>` line
fn file_marker(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix('0')?;
    let rest = rest.trim_start();
    let (keyword, name) = rest.split_once(char::is_whitespace)?;
    if keyword.eq_ignore_ascii_case("FILE") && !name.trim().is_empty() {
        Some(name.trim())
    } else {
        None
    }
}

/// Value of a `Name:`/`Name` or `Author:`/`Author` header
fn header_value<'a>(cont: &'a str, key: &str) -> Option<&'a str> {
    let head = cont.get(..key.len())?;
    if !head.eq_ignore_ascii_case(key) {
        return None;
    }
    let rest = &cont[key.len()..];
    let value = match rest.strip_prefix(':') {
        Some(v) => v,
        None if rest.starts_with(char::is_whitespace) => rest,
        None => return None,
    };
    Some(value.trim())
}

/// Normalised names of every `0 FILE` block in a stream
pub fn scan_submodel_names(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(file_marker)
        .map(normalize_name)
        .collect()
}

/// Parse one model up to the next `0 FILE` marker
///
/// Returns the block's own `FILE` name, if it started with one, and whether
/// another block follows.
fn parse_block(
    model: &mut Model,
    lines: &mut Lines<'_>,
    config: &ParserConfig,
) -> Result<(Option<String>, bool)> {
    let mut own_name = None;
    let mut first = true;
    let mut zero_count = 0;
    let mut found_description = false;

    while let Some(&(index, raw)) = lines.peek() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() {
            lines.next();
            continue;
        }
        if let Some(name) = file_marker(line) {
            if !first {
                return Ok((own_name, true));
            }
            own_name = Some(name.to_string());
        }
        lines.next();
        first = false;

        if let Some(cont) = line.strip_prefix('0')
            && (cont.is_empty() || cont.starts_with(char::is_whitespace))
        {
            zero_count += 1;
            let cont = cont.trim();
            if file_marker(line).is_some() {
                continue;
            }
            if let Some(name) = header_value(cont, "name") {
                model.name = name.to_string();
                continue;
            }
            if let Some(author) = header_value(cont, "author") {
                model.author = author.to_string();
                continue;
            }
            match parse_meta(cont, model, line_no) {
                MetaLine::Element(crate::model::Element::Comment(text))
                    if zero_count < 3 && !found_description =>
                {
                    model.description = text;
                    found_description = true;
                }
                // a bare `0` in the description slot stands for an empty description
                MetaLine::Empty if zero_count < 3 && !found_description => {
                    found_description = true;
                }
                MetaLine::Element(e) => model.insert_element(e),
                MetaLine::Consumed | MetaLine::Empty => {}
            }
            continue;
        }

        match core::parse_line_at(line, model, line_no) {
            Ok(Some(e)) => model.insert_element(e),
            Ok(None) => {}
            Err(e) if config.strict => return Err(e),
            Err(e) => {
                tracing::warn!(line = line_no, model = %model.name, error = %e, "skipping malformed line");
            }
        }
    }
    Ok((own_name, false))
}

/// Parse a complete stream held in memory
///
/// `name` names the stream; its base name becomes the main model's name when
/// the stream declares none.
pub fn load_from_str_with_config(
    text: &str,
    name: &str,
    config: &ParserConfig,
) -> Result<ModelMultipart> {
    let submodel_names = scan_submodel_names(text);
    tracing::debug!(stream = name, submodels = submodel_names.len(), "parsing stream");

    let mut lines: Lines<'_> = text.lines().enumerate().peekable();
    let mut main = Model::new();
    let (main_file, mut more) = parse_block(&mut main, &mut lines, config)?;
    if main.name.is_empty() {
        main.name = main_file.unwrap_or_else(|| base_name(name).to_string());
    }

    let mut mm = ModelMultipart::new(main);
    while more {
        let mut model = Model::new();
        let (key, next) = parse_block(&mut model, &mut lines, config)?;
        more = next;
        let Some(key) = key else {
            break;
        };
        model.name = key.clone();
        mm.insert_submodel(model, &key);
    }

    mm.link_submodels();
    validator::validate_multipart(&mm, "load_from_stream")?;
    Ok(mm)
}

/// Parse a stream held in memory with the default configuration
///
/// # Example
///
/// ```
/// use libldr::parser::load_from_str;
///
/// let text = "0 FILE main.ldr\n1 16 0 0 0 1 0 0 0 1 0 0 0 1 wheel.ldr\n\
///             0 FILE wheel.ldr\n3 4 0 0 0 1 0 0 0 1 0\n";
/// let mm = load_from_str(text, "main.ldr").unwrap();
/// assert_eq!(mm.submodel_count(), 1);
/// assert_eq!(mm.main().name, "main.ldr");
/// ```
pub fn load_from_str(text: &str, name: &str) -> Result<ModelMultipart> {
    load_from_str_with_config(text, name, &ParserConfig::default())
}

/// Parse a byte stream
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected.
pub fn load_from_stream<R: Read>(mut reader: R, name: &str) -> Result<ModelMultipart> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    load_from_str(&String::from_utf8_lossy(&bytes), name)
}

/// Open and parse a file
///
/// # Errors
///
/// Returns [`Error::StreamOpen`] when the file cannot be opened.
pub fn load_from_file(path: &Path) -> Result<ModelMultipart> {
    let file = std::fs::File::open(path)
        .map_err(|_| Error::stream_open("load_from_file", path.display().to_string()))?;
    load_from_stream(file, &path.to_string_lossy())
}
