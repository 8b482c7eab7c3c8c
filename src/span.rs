//! Span types for tracking source locations.

use core::fmt;

/// Position in the input (byte index)
pub type Pos = usize;

/// A span in the input, with a start position and length
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy)]
pub struct Span {
    /// Starting position of the span in bytes
    pub start: Pos,
    /// Length of the span in bytes
    pub len: usize,
}

impl Span {
    /// Creates a new span with the given start position and length
    pub fn new(start: Pos, len: usize) -> Self {
        Span { start, len }
    }

    /// Builds the span of `len` characters starting at a 1-based
    /// line/column position in `source`.
    ///
    /// Positions past the end of the source clamp to the last byte, so a
    /// span can always be handed to a diagnostic renderer.
    pub fn from_line_column(source: &str, line: usize, column: usize, len: usize) -> Self {
        if line == 0 {
            return Span::new(0, 0);
        }
        let mut line_start = 0;
        for (idx, text) in source.split('\n').enumerate() {
            if idx + 1 == line {
                let start = line_start + byte_offset(text, column.saturating_sub(1));
                let end = line_start + byte_offset(text, column.saturating_sub(1) + len);
                return Span::new(start, end - start);
            }
            line_start += text.len() + 1;
        }
        Span::new(source.len(), 0)
    }

    /// Start position of the span
    pub fn start(&self) -> Pos {
        self.start
    }

    /// Length of the span
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if this span has zero length
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// End position (start + length)
    pub fn end(&self) -> Pos {
        self.start + self.len
    }
}

// Columns from the YAML scanner count characters, not bytes.
fn byte_offset(line: &str, chars: usize) -> usize {
    line.char_indices()
        .nth(chars)
        .map_or(line.len(), |(offset, _)| offset)
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        miette::SourceSpan::new(span.start.into(), span.len)
    }
}

/// A value of type `T` annotated with its `Span`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned<T> {
    /// The actual data/value being wrapped
    pub node: T,
    /// The span information indicating the position and length in the source
    pub span: Span,
}

impl<T: fmt::Display> fmt::Display for Spanned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {}-{}",
            self.node,
            self.span.start(),
            self.span.end()
        )
    }
}
