//! Framings lay items out in token streams.
//!
//! Encoding drives a [`Builder`] through the trees, decoding drains a
//! [`Reader`] into the assembler. The walk and the assembly never change
//! when a framing is added.
mod inline;
mod tag_combined;
mod tag_split;

pub(crate) use inline::{InlineBuilder, InlineReader};
pub(crate) use tag_combined::{CombinedBuilder, CombinedReader};
pub(crate) use tag_split::{SplitBuilder, SplitReader};

use super::item::{Item, ItemKey};
use crate::{
    log::{Error, ErrorKind},
    map::SourceMap,
    names::NameTable,
    region::Region,
    scope::{GeneratedRange, OriginalScope},
    vlq::{Cursor, Fields, Numbering},
};

/// Receives the nodes of both trees in document order and writes tokens.
pub(crate) trait Builder {
    /// Called before the root scope of each source.
    fn begin_source(&mut self, source: usize);

    /// Write the start of `scope` and return the key that ranges use to
    /// refer to it.
    fn start_scope(&mut self, scope: &OriginalScope, names: &mut NameTable) -> Result<ItemKey, Error>;

    fn end_scope(&mut self, scope: &OriginalScope) -> Result<(), Error>;

    fn start_range(
        &mut self,
        range: &GeneratedRange,
        definition: Option<ItemKey>,
        names: &mut NameTable,
    ) -> Result<(), Error>;

    fn end_range(&mut self, range: &GeneratedRange) -> Result<(), Error>;

    /// Store the token streams in `map`.
    fn build(self: Box<Self>, map: &mut SourceMap);
}

/// Yields the items of one or more token streams.
pub(crate) trait Reader {
    /// Read the next item and the region of the stream it came from, or
    /// `None` when every stream is exhausted.
    fn next_item(&mut self, names: &NameTable) -> Result<Option<(Item, Region)>, Error>;

    /// Attach the current stream to `error`.
    fn locate(&self, error: Error, region: Region) -> Error;
}

/// Attach a pointer into `source` and the field name to `error`, unless it
/// already carries them.
pub(crate) fn locate(error: Error, source: &str, field: &str, region: Region) -> Error {
    let error = if error.has_visual() {
        error
    } else {
        error.with_pointer(source, region)
    };

    if error.get_name().is_some() {
        error
    } else {
        error.with_name(field)
    }
}

/// Append an item to `out`, preceded by its token count when `prefixed`.
pub(crate) fn emit(out: &mut String, fields: &Fields, numbering: Numbering, prefixed: bool) {
    if prefixed {
        numbering.write_unsigned(out, fields.len() as u64);
    }
    fields.write(out, numbering);
}

/// Append a tagged item to `out`: the tag, the token count, then the tokens.
pub(crate) fn emit_tagged(out: &mut String, tag: u64, fields: &Fields, numbering: Numbering) {
    numbering.write_unsigned(out, tag);
    emit(out, fields, numbering, true);
}

/// Read the fields of an item guarded by a token count of `length`.
///
/// Tokens past the known fields are skipped, so newer encoders may append
/// fields. An item shorter than its known fields is malformed.
pub(crate) fn read_framed<'source, T, F>(
    cursor: &mut Cursor<'source>,
    length: u64,
    read: F,
) -> Result<T, Error>
where
    F: FnOnce(&mut Cursor<'source>) -> Result<T, Error>,
{
    let before = cursor.consumed();
    let value = read(cursor)?;
    let used = (cursor.consumed() - before) as u64;
    if used > length {
        return Err(Error::build(ErrorKind::MalformedItem, "item is longer than its length prefix")
            .with_help(format!("the prefix promises {length} tokens, but {used} were needed")));
    }
    skip(cursor, length - used)?;

    Ok(value)
}

/// Discard `count` tokens.
pub(crate) fn skip(cursor: &mut Cursor<'_>, count: u64) -> Result<(), Error> {
    for _ in 0..count {
        cursor.skip(1)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{emit, locate, read_framed};
    use crate::{
        log::Error,
        region::Region,
        vlq::{Cursor, Fields, Numbering},
        ErrorKind,
    };

    #[test]
    fn test_read_framed_skips_trailing_tokens() {
        let mut fields = Fields::new();
        fields.unsigned(1).unsigned(2).unsigned(3);
        let mut out = String::new();
        emit(&mut out, &fields, Numbering::Unsigned, true);
        out.push('E');

        let mut cursor = Cursor::new(&out);
        let length = cursor.next_unsigned().unwrap();
        let first = read_framed(&mut cursor, length, |cursor| cursor.next_unsigned()).unwrap();

        assert_eq!(first, 1);
        assert_eq!(cursor.next_unsigned().unwrap(), 4);
    }

    #[test]
    fn test_read_framed_rejects_short_item() {
        let mut cursor = Cursor::new("BCD");
        let length = cursor.next_unsigned().unwrap();
        let error = read_framed(&mut cursor, length, |cursor| {
            cursor.next_unsigned()?;
            cursor.next_unsigned()
        })
        .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::MalformedItem);
    }

    #[test]
    fn test_locate_keeps_existing_context() {
        let error = Error::build(ErrorKind::MalformedVlq, "bad").with_name("scopes");
        let error = locate(error, "AAAA", "generatedRanges", Region::new(1..2));

        assert_eq!(error.get_name(), Some("scopes"));
        assert!(error.has_visual());
    }
}
