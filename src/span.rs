//! Byte ranges into a unit's text, and the conversion from `proc_macro2`
//! line/column locations to those ranges.

use proc_macro2::LineColumn;
use serde::Serialize;

/// A byte range into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }
}

/// Line start offsets of one text.
///
/// `proc_macro2` reports 1-based lines and 0-based columns counted in
/// chars, so a column has to be walked char by char to find its byte.
pub struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = Vec::new();
        let mut offset = 0usize;
        for line in text.split_inclusive('\n') {
            line_starts.push(offset);
            offset += line.len();
        }
        if line_starts.is_empty() {
            line_starts.push(0);
        }
        LineIndex { text, line_starts }
    }

    pub fn offset(&self, at: LineColumn) -> usize {
        let line = at.line.max(1) - 1;
        let Some(&start) = self.line_starts.get(line) else {
            return self.text.len();
        };
        let rest = &self.text[start..];
        rest.char_indices().nth(at.column).map_or(self.text.len(), |(i, _)| start + i)
    }

    pub fn span(&self, span: proc_macro2::Span) -> Span {
        Span::new(self.offset(span.start()), self.offset(span.end()))
    }
}

/// 1-based line of a byte offset.
pub fn line_of(source: &str, offset: usize) -> usize {
    let offset = offset.min(source.len());
    source.as_bytes()[..offset].iter().filter(|&&b| b == b'\n').count() + 1
}
