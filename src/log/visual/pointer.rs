use std::{
    cmp::{max, min},
    fmt::{Formatter, Result},
};

use super::{
    super::{RESET, YELLOW},
    {get_width, Visual, BLANK, ELLIPSIS, EQUAL, HIGHLIGHT, PIPE},
};
use crate::region::Region;

/// Characters of context shown on each side of the highlighted region.
const WINDOW: usize = 24;

/// A type of `Visual` that points to a specific location within a token stream.
///
/// Token streams are a single long line, so only a window of text around the
/// highlighted region is kept.
#[derive(Debug, PartialEq)]
pub struct Pointer {
    /// Byte offset of the highlighted region within the token stream.
    offset: usize,
    /// Display column of the highlight within `text`.
    column: usize,
    /// The length of the object being highlighted.
    length: usize,
    /// The window of the token stream that is shown.
    text: String,
}

impl Pointer {
    /// Create a new Visual over the given token stream and Region.
    pub fn new(source: &str, region: Region) -> Self {
        let begin = floor_boundary(source, min(region.begin, source.len()));
        let end = floor_boundary(source, region.end.clamp(begin, source.len()));
        let from = floor_boundary(source, begin.saturating_sub(WINDOW));
        let to = floor_boundary(source, min(source.len(), end + WINDOW));

        let prefix = if from > 0 { ELLIPSIS } else { BLANK };
        let suffix = if to < source.len() { ELLIPSIS } else { BLANK };

        Self {
            offset: begin,
            column: get_width(prefix) + get_width(&source[from..begin]),
            length: max(1, get_width(&source[Region::new(begin..end)])),
            text: format!("{prefix}{}{suffix}", &source[from..to]),
        }
    }
}

impl Visual for Pointer {
    fn display(&self, formatter: &mut Formatter<'_>, field: Option<&str>, help: Option<&str>) -> Result {
        let pad = 1;
        let align = self.column + self.length;
        let offset = self.offset;

        let extra = "-".repeat(3_usize.saturating_sub(self.length));
        let name = field.unwrap_or("?");
        let text = &self.text;
        let underline = HIGHLIGHT.repeat(self.length);

        write!(
            formatter,
            "\n {BLANK:pad$}--> {name}:{offset}\
             \n {BLANK:pad$} {PIPE}\
             \n {BLANK:pad$} {PIPE} {text}\
             \n {BLANK:pad$} {PIPE} {YELLOW}{underline:>align$}{RESET}{extra}\
             \n {BLANK:pad$} {PIPE}\n",
        )?;

        if let Some(help) = help {
            writeln!(formatter, " {BLANK:pad$}{EQUAL} help: {help}")?;
        }

        Ok(())
    }
}

/// Move `index` back until it lands on a char boundary of `source`.
fn floor_boundary(source: &str, mut index: usize) -> usize {
    while !source.is_char_boundary(index) {
        index -= 1;
    }

    index
}
