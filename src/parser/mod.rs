//! DMARC aggregate-report parser.
//!
//! Reads one decoded XML document (UTF-8, or ISO-8859-1 when declared) and returns one [`AuthResult`] per
//! `<record>` element under the root `<feedback>`. Syntax problems surface
//! as [`IngestError::Parse`], structural ones as [`IngestError::Schema`].

pub mod schema;

use crate::error::{IngestError, ParseFault};
use crate::models::AuthResult;
use roxmltree::{Document, ParsingOptions};
use schema::Feedback;
use std::path::Path;
use tracing::debug;

/// Parse the document stored at `path`.
pub fn parse_document(path: &Path) -> Result<Vec<AuthResult>, IngestError> {
    let parse_err = |source: ParseFault| IngestError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let bytes = std::fs::read(path).map_err(|e| parse_err(e.into()))?;
    let text = decode_text(bytes).map_err(parse_err)?;

    let results = parse_xml(&text, path)?;
    debug!("Parsed {} record(s) from {}", results.len(), path.display());
    Ok(results)
}

/// Decode document bytes as UTF-8, or as ISO-8859-1 when the XML
/// declaration says so.
fn decode_text(bytes: Vec<u8>) -> Result<String, ParseFault> {
    let err = match String::from_utf8(bytes) {
        Ok(text) => return Ok(text),
        Err(err) => err,
    };

    match declared_encoding(err.as_bytes()) {
        Some(name) if is_latin1(&name) => {
            Ok(err.as_bytes().iter().map(|&b| char::from(b)).collect())
        }
        Some(name) if !name.eq_ignore_ascii_case("utf-8") => {
            Err(ParseFault::UnsupportedEncoding(name))
        }
        _ => Err(err.into()),
    }
}

/// The `encoding` pseudo-attribute of a leading `<?xml ... ?>` declaration.
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let head = bytes.strip_prefix(b"<?xml")?;
    let end = head.windows(2).position(|w| w == b"?>")?;
    let decl = std::str::from_utf8(&head[..end]).ok()?;

    let (_, rest) = decl.split_once("encoding")?;
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let (value, _) = rest[1..].split_once(quote)?;
    Some(value.trim().to_string())
}

fn is_latin1(name: &str) -> bool {
    ["iso-8859-1", "iso_8859-1", "latin1", "latin-1", "l1"]
        .iter()
        .any(|alias| alias.eq_ignore_ascii_case(name))
}

/// Parse XML text; `path` is only used to attribute errors.
pub fn parse_xml(xml: &str, path: &Path) -> Result<Vec<AuthResult>, IngestError> {
    let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);

    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(xml, options).map_err(|e| IngestError::Parse {
        path: path.to_path_buf(),
        source: e.into(),
    })?;

    let feedback = Feedback::decode(&doc).map_err(|source| IngestError::Schema {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(feedback.records.into_iter().map(AuthResult::from).collect())
}
