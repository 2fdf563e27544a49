use nom_locate::LocatedSpan;
use serde::Serialize;

/// The raw input type fed to the parser. Tracks position information for us,
/// so that errors can be mapped back to the source.
pub type RawSpan<'a> = LocatedSpan<&'a str>;

/// A region of the source code. For parse errors this is usually a zero-length
/// position marking where the parser gave up.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Span {
    /// Byte offset of the start of this span from the start of the source
    pub offset: usize,
    /// Length of the span, in bytes
    pub length: usize,
    /// Line number of the first character in the span (1-indexed)
    pub start_line: usize,
    /// Column number of the first character in the span (1-indexed)
    pub start_col: usize,
}

impl Span {
    /// Build a zero-length span marking just the position where the given
    /// input starts. Useful for errors, where the remaining input is not
    /// meaningful but its position is.
    pub(crate) fn from_position(raw_span: &RawSpan<'_>) -> Self {
        Self {
            offset: raw_span.location_offset(),
            length: 0,
            start_line: raw_span.location_line() as usize,
            start_col: raw_span.get_column(),
        }
    }

    /// Get the chunk of source code that this span covers.
    pub fn get_source_slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.offset..self.offset + self.length]
    }
}

/// Get the full text of the source line that a span starts on, without its
/// line ending. Used to render an excerpt alongside parse errors.
pub(crate) fn source_line(source: &str, span: &Span) -> String {
    let start = source[..span.offset].rfind('\n').map_or(0, |i| i + 1);
    source[start..]
        .lines()
        .next()
        .unwrap_or_default()
        .to_string()
}
