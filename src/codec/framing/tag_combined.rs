//! Combined framings keep both trees in the single `scopes` field, with one
//! item per node.
//!
//! An open item carries both the start and the end of its node. The end is
//! relative to the end of the node's last child, or to its own start when
//! it has no children, so it can only be resolved once the children are
//! read. A bare close tag ends the node.
//!
//! The split-variables flavour moves variables and bindings out of the open
//! items into their own items, written right after their owner and only
//! when non-empty.
use super::{emit_tagged, locate, read_framed, skip, Builder, Reader};
use crate::{
    codec::{
        binding::{read_bindings, write_bindings},
        generated::{self, read_delta, write_position, Definitions, Delta, GeneratedState, HeaderLayout},
        item::{advance, distance, Item, ItemKey},
        original::{self, read_variables, write_variables, OriginalState},
    },
    log::{error_missing_field, Error, ErrorKind, UNBALANCED_END},
    map::SourceMap,
    names::NameTable,
    region::Region,
    scope::{GeneratedRange, OriginalScope, Position},
    vlq::{Cursor, Fields, Numbering},
};
use tracing::debug;

const TAG_CLOSE: u64 = 0;
const TAG_ORIGINAL: u64 = 1;
const TAG_GENERATED: u64 = 2;
const TAG_VARIABLES: u64 = 3;
const TAG_BINDINGS: u64 = 4;

/// Bits below the column of a generated position token.
const POSITION_SHIFT: u32 = 1;

fn layout(split: bool) -> HeaderLayout {
    HeaderLayout {
        definitions: Definitions::Global,
        bindings: !split,
    }
}

fn error_misplaced(reason: &str) -> Error {
    Error::build(ErrorKind::MalformedItem, reason)
}

/// Writes the combined framings.
#[derive(Debug)]
pub(crate) struct CombinedBuilder {
    numbering: Numbering,
    /// Write variables and bindings as their own items.
    split: bool,
    out: String,
    /// Counter of open items.
    index: usize,
    original: OriginalState,
    generated: GeneratedState,
}

impl CombinedBuilder {
    pub fn new(numbering: Numbering, split: bool) -> Self {
        Self {
            numbering,
            split,
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

impl Builder for CombinedBuilder {
    fn begin_source(&mut self, _: usize) {
        self.original.reset();
    }

    fn start_scope(&mut self, scope: &OriginalScope, names: &mut NameTable) -> Result<ItemKey, Error> {
        let reference = scope
            .children
            .last()
            .map_or(scope.start.line, |child| child.end.line);

        let mut fields = Fields::new();
        fields
            .unsigned(self.original.line_delta(scope.start.line)?)
            .unsigned(u64::from(scope.start.column))
            .unsigned(distance(reference, scope.end.line, "original scope end line")?)
            .unsigned(u64::from(scope.end.column));
        original::write_header(&mut fields, scope, &mut self.original, names, !self.split);
        let key = self.push(TAG_ORIGINAL, &fields);

        if self.split && !scope.variables.is_empty() {
            let mut fields = Fields::new();
            write_variables(&mut fields, &scope.variables, names);
            emit_tagged(&mut self.out, TAG_VARIABLES, &fields, self.numbering);
        }

        Ok(key)
    }

    fn end_scope(&mut self, scope: &OriginalScope) -> Result<(), Error> {
        self.numbering.write_unsigned(&mut self.out, TAG_CLOSE);
        self.original.line = scope.end.line;

        Ok(())
    }

    fn start_range(
        &mut self,
        range: &GeneratedRange,
        definition: Option<ItemKey>,
        names: &mut NameTable,
    ) -> Result<(), Error> {
        let mut reference = range.children.last().map_or(range.start, |child| child.end);

        let mut fields = Fields::new();
        write_position(&mut fields, &mut self.generated.position, range.start, POSITION_SHIFT, 0)?;
        write_position(&mut fields, &mut reference, range.end, POSITION_SHIFT, 0)?;
        generated::write_header(
            &mut fields,
            range,
            definition,
            &mut self.generated,
            names,
            layout(self.split),
        )?;
        self.push(TAG_GENERATED, &fields);

        if self.split && !range.values.is_empty() {
            let mut fields = Fields::new();
            write_bindings(&mut fields, &range.values, range.start, range.end, names)?;
            emit_tagged(&mut self.out, TAG_BINDINGS, &fields, self.numbering);
        }

        Ok(())
    }

    fn end_range(&mut self, range: &GeneratedRange) -> Result<(), Error> {
        self.numbering.write_unsigned(&mut self.out, TAG_CLOSE);
        self.generated.position = range.end;

        Ok(())
    }

    fn build(self: Box<Self>, map: &mut SourceMap) {
        map.scopes = Some(self.out);
    }
}

/// A node whose close tag has not been read yet.
#[derive(Debug)]
enum Pending {
    Scope {
        start_line: u32,
        end_line: u64,
        end_column: u32,
        last_child_end: Option<u32>,
    },
    Range {
        start: Position,
        end: Delta,
        last_child_end: Option<Position>,
    },
}

/// Reads the combined framings.
pub(crate) struct CombinedReader<'map> {
    split: bool,
    cursor: Cursor<'map>,
    /// Counter of open items.
    index: usize,
    pending: Vec<Pending>,
    /// Whether a generated range item has been read.
    ranges: bool,
    original: OriginalState,
    generated: GeneratedState,
}

impl<'map> CombinedReader<'map> {
    /// Create a new CombinedReader over the `scopes` field of `map`.
    pub fn new(map: &'map SourceMap, numbering: Numbering, split: bool) -> Result<Self, Error> {
        let scopes = map
            .scopes
            .as_deref()
            .ok_or_else(|| error_missing_field("scopes"))?;

        Ok(Self {
            split,
            cursor: Cursor::with_numbering(scopes, numbering),
            index: 0,
            pending: vec![],
            ranges: false,
            original: OriginalState::default(),
            generated: GeneratedState::default(),
        })
    }

    /// Return true if the next token is the given tag.
    fn next_is(&self, tag: u64) -> bool {
        self.split && self.cursor.peek_unsigned() == Some(tag)
    }

    fn read_close(&mut self) -> Result<Item, Error> {
        match self.pending.pop() {
            Some(Pending::Scope {
                start_line,
                end_line,
                end_column,
                last_child_end,
            }) => {
                let line = advance(last_child_end.unwrap_or(start_line), end_line)?;
                let end = Position::new(line, end_column);
                self.original.line = line;
                if let Some(Pending::Scope { last_child_end, .. }) = self.pending.last_mut() {
                    *last_child_end = Some(line);
                }

                Ok(Item::ScopeEnd { end })
            }
            Some(Pending::Range {
                start,
                end,
                last_child_end,
            }) => {
                let end = end.apply(last_child_end.unwrap_or(start))?;
                self.generated.position = end;
                if let Some(Pending::Range { last_child_end, .. }) = self.pending.last_mut() {
                    *last_child_end = Some(end);
                }

                Ok(Item::RangeEnd { end })
            }
            None if self.ranges => Err(Error::build(ErrorKind::UnbalancedRangeTree, UNBALANCED_END)),
            None => Err(Error::build(ErrorKind::UnbalancedScopeTree, UNBALANCED_END)),
        }
    }

    fn read_original(&mut self, names: &NameTable) -> Result<Item, Error> {
        if matches!(self.pending.last(), Some(Pending::Range { .. })) || self.ranges {
            return Err(error_misplaced("original scope item after a generated range item"));
        }
        if self.pending.is_empty() {
            self.original.reset();
        }

        let length = self.cursor.next_unsigned()?;
        let state = &mut self.original;
        let variables = !self.split;
        let (start, pending, mut header) = read_framed(&mut self.cursor, length, |cursor| {
            let line = state.advance_line(cursor.next_unsigned()?)?;
            let start = Position::new(line, cursor.next_u32()?);
            let pending = Pending::Scope {
                start_line: line,
                end_line: cursor.next_unsigned()?,
                end_column: cursor.next_u32()?,
                last_child_end: None,
            };
            let header = original::read_header(cursor, state, names, variables)?;

            Ok((start, pending, header))
        })?;

        if self.next_is(TAG_VARIABLES) {
            self.cursor.next_unsigned()?;
            let count = self.cursor.next_unsigned()?;
            header.variables = read_variables(&mut self.cursor, count, names)?;
        }
        self.pending.push(pending);

        let key = ItemKey::new(0, self.index);
        self.index += 1;

        Ok(Item::ScopeStart { key, start, header })
    }

    fn read_generated(&mut self, names: &NameTable) -> Result<Item, Error> {
        if matches!(self.pending.last(), Some(Pending::Scope { .. })) {
            return Err(error_misplaced("generated range item inside an original scope"));
        }
        self.ranges = true;

        let length = self.cursor.next_unsigned()?;
        let state = &mut self.generated;
        let layout = layout(self.split);
        let (start, end, mut header) = read_framed(&mut self.cursor, length, |cursor| {
            let start = read_delta(cursor, POSITION_SHIFT)?.apply(state.position)?;
            state.position = start;
            let end = read_delta(cursor, POSITION_SHIFT)?;
            let header = generated::read_header(cursor, state, start, names, layout)?;

            Ok((start, end, header))
        })?;

        if self.next_is(TAG_BINDINGS) {
            self.cursor.next_unsigned()?;
            let length = self.cursor.next_unsigned()?;
            header.bindings = read_framed(&mut self.cursor, length, |cursor| {
                read_bindings(cursor, start, names)
            })?;
        }
        self.pending.push(Pending::Range {
            start,
            end,
            last_child_end: None,
        });
        self.index += 1;

        Ok(Item::RangeStart { start, header })
    }

    /// Read the next item, or `None` for an item with an unknown tag.
    fn read_item(&mut self, names: &NameTable) -> Result<Option<Item>, Error> {
        let tag = self.cursor.next_unsigned()?;
        let item = match tag {
            TAG_CLOSE => self.read_close()?,
            TAG_ORIGINAL => self.read_original(names)?,
            TAG_GENERATED => self.read_generated(names)?,
            TAG_VARIABLES if self.split => {
                return Err(error_misplaced("variables item must follow an original scope item"));
            }
            TAG_BINDINGS if self.split => {
                return Err(error_misplaced("bindings item must follow a generated range item"));
            }
            _ => {
                let begin = self.cursor.position();
                let length = self.cursor.next_unsigned()?;
                skip(&mut self.cursor, length)?;
                let skipped = Region::new(begin..self.cursor.position());
                debug!(tag, item = skipped.literal(self.cursor.source()), "skipped item with unknown tag");

                return Ok(None);
            }
        };

        Ok(Some(item))
    }
}

impl Reader for CombinedReader<'_> {
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

#[cfg(test)]
mod tests {
    use super::{CombinedBuilder, CombinedReader};
    use crate::{
        codec::{assemble::assemble, framing::Builder, walk::walk},
        map::SourceMap,
        names::NameTable,
        scope::{Binding, BindingRange, GeneratedRange, OriginalScope, Position, ScopeInfo},
        vlq::Numbering,
        ErrorKind,
    };
    use std::rc::Rc;

    fn nested() -> ScopeInfo {
        let leaf = Rc::new(
            OriginalScope::new((3, 4), (5, 1))
                .with_kind("block")
                .with_variables(["i"]),
        );
        let function = Rc::new(
            OriginalScope::new((2, 0), (7, 1))
                .with_name("f")
                .with_kind("function")
                .with_variables(["a", "b"])
                .stack_frame()
                .with_child(Rc::clone(&leaf)),
        );
        let root = Rc::new(OriginalScope::new((0, 0), (9, 0)).with_child(Rc::clone(&function)));

        let inner = GeneratedRange::new((0, 30), (0, 45))
            .with_definition(&leaf)
            .with_values([Binding::Ranges(vec![
                BindingRange::new((0, 30), (0, 40), Some("_i")),
                BindingRange::new((0, 40), (0, 45), None),
            ])]);
        let outer = GeneratedRange::new((0, 12), (0, 60))
            .with_definition(&function)
            .stack_frame()
            .with_values([Binding::Expression("p".to_string()), Binding::Unavailable])
            .with_child(inner);

        ScopeInfo::new(vec![root], vec![GeneratedRange::new((0, 0), (1, 0)).with_child(outer)])
    }

    fn encode(info: &ScopeInfo, numbering: Numbering, split: bool) -> (SourceMap, NameTable) {
        let mut names = NameTable::new();
        let mut builder = Box::new(CombinedBuilder::new(numbering, split));
        walk(info, builder.as_mut(), &mut names).unwrap();
        let mut map = SourceMap::new();
        builder.build(&mut map);

        (map, names)
    }

    fn decode(scopes: &str, split: bool) -> Result<ScopeInfo, crate::Error> {
        let map = SourceMap {
            names: Some(vec![]),
            scopes: Some(scopes.to_string()),
            ..SourceMap::default()
        };
        assemble(CombinedReader::new(&map, Numbering::Unsigned, split)?, &NameTable::new())
    }

    #[test]
    fn test_round_trip() {
        for numbering in [Numbering::Signed, Numbering::Unsigned] {
            for split in [false, true] {
                let (map, names) = encode(&nested(), numbering, split);
                let reader = CombinedReader::new(&map, numbering, split).unwrap();

                assert_eq!(assemble(reader, &names).unwrap(), nested());
            }
        }
    }

    #[test]
    fn test_end_is_relative_to_last_child() {
        // scope (0,0)-(4,0) with child (1,0)-(2,0): the parent's end line
        // delta is 4 - 2 = 2.
        let info = decode("BGAACAAABGBABAAAAA", false).unwrap();

        assert_eq!(info.scopes[0].children[0].end, Position::new(2, 0));
        assert_eq!(info.scopes[0].end, Position::new(4, 0));
    }

    #[test]
    fn test_close_without_open() {
        let error = decode("A", false).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::UnbalancedScopeTree);
    }

    #[test]
    fn test_unknown_tag_is_skipped() {
        // tag 7 with one token, then a scope (0,0)-(1,0) and its close tag
        let info = decode("HBABGAABAAAA", false).unwrap();

        assert_eq!(info.scopes[0].end, Position::new(1, 0));
    }

    #[test]
    fn test_misplaced_variables_item() {
        let error = decode("DBA", true).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::MalformedItem);
    }

    #[test]
    fn test_variables_item_is_unknown_without_split() {
        // a variables item after the scope is skipped by the plain reader
        let mut names = NameTable::new();
        names.intern("x");
        let map = SourceMap {
            names: Some(vec!["x".to_string()]),
            scopes: Some("BGAAAAAADBAA".to_string()),
            ..SourceMap::default()
        };
        let info = assemble(CombinedReader::new(&map, Numbering::Unsigned, false).unwrap(), &names).unwrap();

        assert!(info.scopes[0].variables.is_empty());
    }
}
