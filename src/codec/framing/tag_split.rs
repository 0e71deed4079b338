//! The tag-split framing keeps both trees in the single `scopes` field.
//!
//! Every item is `tag, length, fields...`. Start and end items of both
//! trees have their own tag, and items with an unknown tag are skipped
//! using their length.
use super::{emit_tagged, locate, read_framed, skip, Builder, Reader};
use crate::{
    codec::{
        generated::{self, read_delta, write_position, Definitions, GeneratedState, HeaderLayout},
        item::{Item, ItemKey},
        original::{self, OriginalState},
    },
    log::{error_missing_field, Error},
    map::SourceMap,
    names::NameTable,
    region::Region,
    scope::{GeneratedRange, OriginalScope, Position},
    vlq::{Cursor, Fields, Numbering},
};
use tracing::debug;

const TAG_ORIGINAL_START: u64 = 1;
const TAG_ORIGINAL_END: u64 = 2;
const TAG_GENERATED_START: u64 = 3;
const TAG_GENERATED_END: u64 = 4;

const LAYOUT: HeaderLayout = HeaderLayout {
    definitions: Definitions::Global,
    bindings: true,
};
/// Bits below the column of a generated position token.
const POSITION_SHIFT: u32 = 1;

/// Writes the tag-split framing.
#[derive(Debug)]
pub(crate) struct SplitBuilder {
    numbering: Numbering,
    out: String,
    /// Global item counter.
    index: usize,
    original: OriginalState,
    generated: GeneratedState,
}

impl SplitBuilder {
    pub fn new(numbering: Numbering) -> Self {
        Self {
            numbering,
            out: String::new(),
            index: 0,
            original: OriginalState::default(),
            generated: GeneratedState::default(),
        }
    }

    fn push(&mut self, tag: u64, fields: &Fields) -> ItemKey {
        emit_tagged(&mut self.out, tag, fields, self.numbering);
        let key = ItemKey::new(0, self.index);
        self.index += 1;

        key
    }
}

impl Builder for SplitBuilder {
    fn begin_source(&mut self, _: usize) {
        self.original.reset();
    }

    fn start_scope(&mut self, scope: &OriginalScope, names: &mut NameTable) -> Result<ItemKey, Error> {
        let mut fields = Fields::new();
        fields
            .unsigned(self.original.line_delta(scope.start.line)?)
            .unsigned(u64::from(scope.start.column));
        original::write_header(&mut fields, scope, &mut self.original, names, true);

        Ok(self.push(TAG_ORIGINAL_START, &fields))
    }

    fn end_scope(&mut self, scope: &OriginalScope) -> Result<(), Error> {
        let mut fields = Fields::new();
        fields
            .unsigned(self.original.line_delta(scope.end.line)?)
            .unsigned(u64::from(scope.end.column));
        self.push(TAG_ORIGINAL_END, &fields);

        Ok(())
    }

    fn start_range(
        &mut self,
        range: &GeneratedRange,
        definition: Option<ItemKey>,
        names: &mut NameTable,
    ) -> Result<(), Error> {
        let mut fields = Fields::new();
        write_position(&mut fields, &mut self.generated.position, range.start, POSITION_SHIFT, 0)?;
        generated::write_header(&mut fields, range, definition, &mut self.generated, names, LAYOUT)?;
        self.push(TAG_GENERATED_START, &fields);

        Ok(())
    }

    fn end_range(&mut self, range: &GeneratedRange) -> Result<(), Error> {
        let mut fields = Fields::new();
        write_position(&mut fields, &mut self.generated.position, range.end, POSITION_SHIFT, 0)?;
        self.push(TAG_GENERATED_END, &fields);

        Ok(())
    }

    fn build(self: Box<Self>, map: &mut SourceMap) {
        map.scopes = Some(self.out);
    }
}

/// Reads the tag-split framing.
pub(crate) struct SplitReader<'map> {
    cursor: Cursor<'map>,
    /// Global item counter.
    index: usize,
    /// Count of open original scopes.
    depth: usize,
    original: OriginalState,
    generated: GeneratedState,
}

impl<'map> SplitReader<'map> {
    /// Create a new SplitReader over the `scopes` field of `map`.
    pub fn new(map: &'map SourceMap, numbering: Numbering) -> Result<Self, Error> {
        let scopes = map
            .scopes
            .as_deref()
            .ok_or_else(|| error_missing_field("scopes"))?;

        Ok(Self {
            cursor: Cursor::with_numbering(scopes, numbering),
            index: 0,
            depth: 0,
            original: OriginalState::default(),
            generated: GeneratedState::default(),
        })
    }

    /// Read the next item, or `None` for an item with an unknown tag.
    fn read_item(&mut self, names: &NameTable) -> Result<Option<Item>, Error> {
        let tag = self.cursor.next_unsigned()?;
        let length = self.cursor.next_unsigned()?;
        let key = ItemKey::new(0, self.index);
        let cursor = &mut self.cursor;

        let item = match tag {
            TAG_ORIGINAL_START => {
                if self.depth == 0 {
                    self.original.reset();
                }
                let state = &mut self.original;
                let item = read_framed(cursor, length, |cursor| {
                    let line = state.advance_line(cursor.next_unsigned()?)?;
                    let start = Position::new(line, cursor.next_u32()?);
                    let header = original::read_header(cursor, state, names, true)?;

                    Ok(Item::ScopeStart { key, start, header })
                })?;
                self.depth += 1;
                item
            }
            TAG_ORIGINAL_END => {
                let state = &mut self.original;
                let item = read_framed(cursor, length, |cursor| {
                    let line = state.advance_line(cursor.next_unsigned()?)?;

                    Ok(Item::ScopeEnd {
                        end: Position::new(line, cursor.next_u32()?),
                    })
                })?;
                self.depth = self.depth.saturating_sub(1);
                item
            }
            TAG_GENERATED_START => {
                let state = &mut self.generated;
                read_framed(cursor, length, |cursor| {
                    let start = read_delta(cursor, POSITION_SHIFT)?.apply(state.position)?;
                    state.position = start;
                    let header = generated::read_header(cursor, state, start, names, LAYOUT)?;

                    Ok(Item::RangeStart { start, header })
                })?
            }
            TAG_GENERATED_END => {
                let state = &mut self.generated;
                read_framed(cursor, length, |cursor| {
                    let end = read_delta(cursor, POSITION_SHIFT)?.apply(state.position)?;
                    state.position = end;

                    Ok(Item::RangeEnd { end })
                })?
            }
            _ => {
                debug!(tag, length, "skipped item with unknown tag");
                skip(cursor, length)?;

                return Ok(None);
            }
        };
        self.index += 1;

        Ok(Some(item))
    }
}

impl Reader for SplitReader<'_> {
    fn next_item(&mut self, names: &NameTable) -> Result<Option<(Item, Region)>, Error> {
        while self.cursor.has_more() {
            let begin = self.cursor.position();
            let item = self
                .read_item(names)
                .map_err(|error| self.locate(error, Region::new(begin..self.cursor.position())))?;

            if let Some(item) = item {
                return Ok(Some((item, Region::new(begin..self.cursor.position()))));
            }
        }

        Ok(None)
    }

    fn locate(&self, error: Error, region: Region) -> Error {
        locate(error, self.cursor.source(), "scopes", region)
    }
}
