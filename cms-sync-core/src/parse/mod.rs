//! Export parsing: WordPress WXR XML and the flat CSV export.
//!
//! Both formats normalize into [`crate::record::ImportDocument`]. Parsing is
//! fully synchronous over already-loaded text and never touches the network.
//! XML that does not resemble a WordPress export is fatal; malformed CSV
//! rows are skipped and surfaced as warnings.

pub mod csv;
pub mod wxr;

use crate::record::ImportDocument;

/// Which export format a file carries, detected from its filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Wxr,
    Csv,
}

impl ExportFormat {
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = filename.rsplit('.').next()?.to_ascii_lowercase();
        match ext.as_str() {
            "xml" | "wxr" => Some(ExportFormat::Wxr),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }
}

/// Parse result: the normalized document plus row-level warnings.
///
/// Warnings are only produced by the CSV path (structurally bad rows);
/// only the first few are retained, the rest are counted.
#[derive(Debug)]
pub struct ParsedExport {
    pub document: ImportDocument,
    pub warnings: Vec<String>,
}

/// Parse errors. Only structural failures are fatal; a fatal error means no
/// writes have happened yet.
#[derive(Debug)]
pub enum ParseError {
    /// Malformed XML, reported by the underlying parser.
    Xml(quick_xml::Error),
    /// The file parsed but does not look like a WordPress export
    /// (e.g. missing `<channel>` element).
    NotAnExport(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Xml(e) => write!(f, "malformed XML: {e}"),
            ParseError::NotAnExport(reason) => {
                write!(f, "not a recognisable WordPress export: {reason}")
            }
        }
    }
}

impl std::error::Error for ParseError {}

impl From<quick_xml::Error> for ParseError {
    fn from(e: quick_xml::Error) -> Self {
        ParseError::Xml(e)
    }
}

/// Parse loaded export text in the given format.
pub fn parse_export(format: ExportFormat, text: &str) -> Result<ParsedExport, ParseError> {
    match format {
        ExportFormat::Wxr => wxr::parse(text),
        ExportFormat::Csv => Ok(csv::parse(text)),
    }
}
