//! Two-field framings: one `originalScopes` stream per source and one
//! `generatedRanges` stream.
//!
//! Start and end items are told apart by a marker bit inline in their first
//! token. The length-prefixed flavour writes the token count of every item
//! ahead of it, which lets decoders skip fields they do not know.
use super::{emit, locate, read_framed, Builder, Reader};
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
use tracing::trace;

const LAYOUT: HeaderLayout = HeaderLayout {
    definitions: Definitions::PerSource,
    bindings: true,
};
/// Bits below the column of a generated position token.
const POSITION_SHIFT: u32 = 2;
/// Marks a generated end item.
const MARKER_END: u64 = 1;
/// Marks an original end item, in the low bit of its line token.
const FLAG_END: u64 = 1;

/// Read one item, first reading its token count if `prefixed` is set.
fn framed<'source, T, F>(cursor: &mut Cursor<'source>, prefixed: bool, read: F) -> Result<T, Error>
where
    F: FnOnce(&mut Cursor<'source>) -> Result<T, Error>,
{
    if prefixed {
        let length = cursor.next_unsigned()?;
        read_framed(cursor, length, read)
    } else {
        read(cursor)
    }
}

/// Writes the two-field framings.
#[derive(Debug)]
pub(crate) struct InlineBuilder {
    numbering: Numbering,
    prefixed: bool,
    scopes: Vec<String>,
    /// Item counter of the current source.
    index: usize,
    original: OriginalState,
    ranges: String,
    generated: GeneratedState,
}

impl InlineBuilder {
    pub fn new(numbering: Numbering, prefixed: bool) -> Self {
        Self {
            numbering,
            prefixed,
            scopes: vec![],
            index: 0,
            original: OriginalState::default(),
            ranges: String::new(),
            generated: GeneratedState::default(),
        }
    }

    fn push_scope_item(&mut self, fields: &Fields) -> ItemKey {
        if self.scopes.is_empty() {
            self.scopes.push(String::new());
        }
        let stream = self.scopes.len() - 1;
        emit(&mut self.scopes[stream], fields, self.numbering, self.prefixed);

        let key = ItemKey::new(stream, self.index);
        self.index += 1;

        key
    }
}

impl Builder for InlineBuilder {
    fn begin_source(&mut self, _: usize) {
        self.scopes.push(String::new());
        self.index = 0;
        self.original.reset();
    }

    fn start_scope(&mut self, scope: &OriginalScope, names: &mut NameTable) -> Result<ItemKey, Error> {
        let mut fields = Fields::new();
        fields
            .unsigned(self.original.line_delta(scope.start.line)? << 1)
            .unsigned(u64::from(scope.start.column));
        original::write_header(&mut fields, scope, &mut self.original, names, true);

        Ok(self.push_scope_item(&fields))
    }

    fn end_scope(&mut self, scope: &OriginalScope) -> Result<(), Error> {
        let mut fields = Fields::new();
        fields
            .unsigned(self.original.line_delta(scope.end.line)? << 1 | FLAG_END)
            .unsigned(u64::from(scope.end.column));
        self.push_scope_item(&fields);

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
        emit(&mut self.ranges, &fields, self.numbering, self.prefixed);

        Ok(())
    }

    fn end_range(&mut self, range: &GeneratedRange) -> Result<(), Error> {
        let mut fields = Fields::new();
        write_position(
            &mut fields,
            &mut self.generated.position,
            range.end,
            POSITION_SHIFT,
            MARKER_END,
        )?;
        emit(&mut self.ranges, &fields, self.numbering, self.prefixed);

        Ok(())
    }

    fn build(self: Box<Self>, map: &mut SourceMap) {
        map.original_scopes = Some(self.scopes);
        map.generated_ranges = Some(self.ranges);
    }
}

fn scope_item(
    cursor: &mut Cursor<'_>,
    state: &mut OriginalState,
    key: ItemKey,
    names: &NameTable,
) -> Result<Item, Error> {
    let token = cursor.next_unsigned()?;
    let line = state.advance_line(token >> 1)?;
    let position = Position::new(line, cursor.next_u32()?);

    if token & FLAG_END != 0 {
        return Ok(Item::ScopeEnd { end: position });
    }
    let header = original::read_header(cursor, state, names, true)?;

    Ok(Item::ScopeStart {
        key,
        start: position,
        header,
    })
}

fn range_item(cursor: &mut Cursor<'_>, state: &mut GeneratedState, names: &NameTable) -> Result<Item, Error> {
    let delta = read_delta(cursor, POSITION_SHIFT)?;
    let position = delta.apply(state.position)?;
    state.position = position;

    if delta.marker & MARKER_END != 0 {
        return Ok(Item::RangeEnd { end: position });
    }
    let header = generated::read_header(cursor, state, position, names, LAYOUT)?;

    Ok(Item::RangeStart {
        start: position,
        header,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Scopes,
    SourceEnded,
    Ranges,
    Done,
}

/// Reads the two-field framings.
pub(crate) struct InlineReader<'map> {
    numbering: Numbering,
    prefixed: bool,
    scopes: &'map [String],
    ranges: &'map str,
    /// Index of the source whose stream is being read.
    stream: usize,
    cursor: Cursor<'map>,
    phase: Phase,
    /// Item counter of the current source.
    index: usize,
    original: OriginalState,
    generated: GeneratedState,
}

impl<'map> InlineReader<'map> {
    /// Create a new InlineReader over the fields of `map`.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] of kind `MissingFields` when `originalScopes`
    /// or `generatedRanges` is absent.
    pub fn new(map: &'map SourceMap, numbering: Numbering, prefixed: bool) -> Result<Self, Error> {
        let scopes = map
            .original_scopes
            .as_deref()
            .ok_or_else(|| error_missing_field("originalScopes"))?;
        let ranges = map
            .generated_ranges
            .as_deref()
            .ok_or_else(|| error_missing_field("generatedRanges"))?;
        let (cursor, phase) = match scopes.first() {
            Some(first) => (Cursor::with_numbering(first, numbering), Phase::Scopes),
            None => (Cursor::with_numbering(ranges, numbering), Phase::Ranges),
        };

        Ok(Self {
            numbering,
            prefixed,
            scopes,
            ranges,
            stream: 0,
            cursor,
            phase,
            index: 0,
            original: OriginalState::default(),
            generated: GeneratedState::default(),
        })
    }

    fn field(&self) -> String {
        match self.phase {
            Phase::Scopes | Phase::SourceEnded => format!("originalScopes[{}]", self.stream),
            Phase::Ranges | Phase::Done => "generatedRanges".to_string(),
        }
    }

    fn read_item(&mut self, names: &NameTable) -> Result<Item, Error> {
        let cursor = &mut self.cursor;
        match self.phase {
            Phase::Scopes => {
                let key = ItemKey::new(self.stream, self.index);
                let state = &mut self.original;
                let item = framed(cursor, self.prefixed, |cursor| scope_item(cursor, state, key, names))?;
                self.index += 1;

                Ok(item)
            }
            _ => {
                let state = &mut self.generated;
                framed(cursor, self.prefixed, |cursor| range_item(cursor, state, names))
            }
        }
    }
}

impl Reader for InlineReader<'_> {
    fn next_item(&mut self, names: &NameTable) -> Result<Option<(Item, Region)>, Error> {
        loop {
            match self.phase {
                Phase::Scopes | Phase::Ranges if self.cursor.has_more() => {
                    let begin = self.cursor.position();
                    let item = self.read_item(names).map_err(|error| {
                        self.locate(error, Region::new(begin..self.cursor.position()))
                    })?;

                    return Ok(Some((item, Region::new(begin..self.cursor.position()))));
                }
                Phase::Scopes => {
                    trace!(field = %self.field(), items = self.index, "read original scope stream");
                    self.phase = Phase::SourceEnded;
                    let end = self.cursor.source().len();

                    return Ok(Some((Item::SourceEnd, Region::new(end..end))));
                }
                Phase::SourceEnded => {
                    self.stream += 1;
                    match self.scopes.get(self.stream) {
                        Some(next) => {
                            self.cursor = Cursor::with_numbering(next, self.numbering);
                            self.phase = Phase::Scopes;
                            self.index = 0;
                            self.original.reset();
                        }
                        None => {
                            self.cursor = Cursor::with_numbering(self.ranges, self.numbering);
                            self.phase = Phase::Ranges;
                        }
                    }
                }
                Phase::Ranges | Phase::Done => {
                    self.phase = Phase::Done;

                    return Ok(None);
                }
            }
        }
    }

    fn locate(&self, error: Error, region: Region) -> Error {
        locate(error, self.cursor.source(), &self.field(), region)
    }
}
