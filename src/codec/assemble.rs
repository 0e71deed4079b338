use super::{
    binding::resolve,
    framing::Reader,
    item::{Item, ItemKey, RangeHeader, ScopeHeader, Segment},
};
use crate::{
    log::{Error, ErrorKind, UNBALANCED_END, UNCLOSED_START},
    names::NameTable,
    scope::{GeneratedRange, OriginalScope, Position, ScopeInfo},
};
use rustc_hash::FxHashMap;
use std::rc::Rc;
use tracing::trace;

/// Drain `reader` and assemble the two trees.
///
/// Errors raised while assembling are located at the item that caused them.
pub(crate) fn assemble<R>(mut reader: R, names: &NameTable) -> Result<ScopeInfo, Error>
where
    R: Reader,
{
    let mut assembler = Assembler::default();
    while let Some((item, region)) = reader.next_item(names)? {
        assembler
            .push(item)
            .map_err(|error| reader.locate(error, region))?;
    }
    trace!(
        items = assembler.items,
        scopes = assembler.finished.len(),
        "assembled scope info"
    );

    assembler.finish()
}

/// Builds [`ScopeInfo`] trees from a stream of [`Item`]s.
#[derive(Debug, Default)]
pub(crate) struct Assembler {
    /// Finished root scopes.
    scopes: Vec<Rc<OriginalScope>>,
    /// Scopes whose end item has not been seen yet.
    open_scopes: Vec<(ItemKey, OriginalScope)>,
    /// Every finished scope, by the key of its start item.
    finished: FxHashMap<ItemKey, Rc<OriginalScope>>,
    /// Roots finished since the last source ended.
    roots: usize,
    /// Finished top-level ranges.
    ranges: Vec<GeneratedRange>,
    /// Ranges whose end item has not been seen yet, with their raw bindings.
    open_ranges: Vec<(GeneratedRange, Vec<Vec<Segment>>)>,
    /// Count of items pushed.
    items: usize,
}

impl Assembler {
    /// Apply one item.
    pub fn push(&mut self, item: Item) -> Result<(), Error> {
        self.items += 1;
        match item {
            Item::SourceEnd => self.end_source(),
            Item::ScopeStart { key, start, header } => {
                self.start_scope(key, start, header);
                Ok(())
            }
            Item::ScopeEnd { end } => self.end_scope(end),
            Item::RangeStart { start, header } => self.start_range(start, header),
            Item::RangeEnd { end } => self.end_range(end),
        }
    }

    fn end_source(&mut self) -> Result<(), Error> {
        if !self.open_scopes.is_empty() {
            return Err(Error::build(ErrorKind::UnbalancedScopeTree, UNCLOSED_START));
        }
        if self.roots != 1 {
            return Err(Error::build(
                ErrorKind::UnbalancedScopeTree,
                format!("expected one root scope per source, found {}", self.roots),
            ));
        }
        self.roots = 0;

        Ok(())
    }

    fn start_scope(&mut self, key: ItemKey, start: Position, header: ScopeHeader) {
        let ScopeHeader {
            name,
            kind,
            is_stack_frame,
            variables,
        } = header;
        let scope = OriginalScope {
            start,
            end: start,
            kind,
            name,
            is_stack_frame,
            variables,
            children: vec![],
        };
        self.open_scopes.push((key, scope));
    }

    fn end_scope(&mut self, end: Position) -> Result<(), Error> {
        let Some((key, mut scope)) = self.open_scopes.pop() else {
            return Err(Error::build(ErrorKind::UnbalancedScopeTree, UNBALANCED_END));
        };
        scope.end = end;

        let scope = Rc::new(scope);
        self.finished.insert(key, Rc::clone(&scope));
        match self.open_scopes.last_mut() {
            Some((_, parent)) => parent.children.push(scope),
            None => {
                self.scopes.push(scope);
                self.roots += 1;
            }
        }

        Ok(())
    }

    fn start_range(&mut self, start: Position, header: RangeHeader) -> Result<(), Error> {
        let original_scope = match header.definition {
            Some(key) => Some(self.finished.get(&key).cloned().ok_or_else(|| {
                Error::build(
                    ErrorKind::InvalidDefinitionReference,
                    format!(
                        "no finished original scope starts at item {} of source {}",
                        key.index, key.stream
                    ),
                )
            })?),
            None => None,
        };
        let range = GeneratedRange {
            start,
            end: start,
            original_scope,
            is_stack_frame: header.is_stack_frame,
            is_hidden: header.is_hidden,
            callsite: header.callsite,
            values: vec![],
            children: vec![],
        };
        self.open_ranges.push((range, header.bindings));

        Ok(())
    }

    fn end_range(&mut self, end: Position) -> Result<(), Error> {
        let Some((mut range, bindings)) = self.open_ranges.pop() else {
            return Err(Error::build(ErrorKind::UnbalancedRangeTree, UNBALANCED_END));
        };
        range.end = end;
        range.values = bindings
            .into_iter()
            .map(|segments| resolve(segments, range.start, end))
            .collect::<Result<_, _>>()?;

        match self.open_ranges.last_mut() {
            Some((parent, _)) => parent.children.push(range),
            None => self.ranges.push(range),
        }

        Ok(())
    }

    /// Check that every tree was closed and return the scope info.
    pub fn finish(self) -> Result<ScopeInfo, Error> {
        if !self.open_scopes.is_empty() {
            return Err(Error::build(ErrorKind::UnbalancedScopeTree, UNCLOSED_START));
        }
        if !self.open_ranges.is_empty() {
            return Err(Error::build(ErrorKind::UnbalancedRangeTree, UNCLOSED_START));
        }

        Ok(ScopeInfo::new(self.scopes, self.ranges))
    }
}

#[cfg(test)]
mod tests {
    use super::Assembler;
    use crate::{
        codec::item::{Item, ItemKey, RangeHeader, ScopeHeader, Segment},
        scope::{Binding, Position},
        ErrorKind,
    };

    fn scope_start(index: usize, line: u32) -> Item {
        Item::ScopeStart {
            key: ItemKey::new(0, index),
            start: Position::new(line, 0),
            header: ScopeHeader::default(),
        }
    }

    fn scope_end(line: u32) -> Item {
        Item::ScopeEnd {
            end: Position::new(line, 0),
        }
    }

    #[test]
    fn test_nested_scopes() {
        let mut assembler = Assembler::default();
        for item in [scope_start(0, 0), scope_start(1, 1), scope_end(2), scope_end(3)] {
            assembler.push(item).unwrap();
        }
        let info = assembler.finish().unwrap();

        assert_eq!(info.scopes.len(), 1);
        assert_eq!(info.scopes[0].end, Position::new(3, 0));
        assert_eq!(info.scopes[0].children[0].end, Position::new(2, 0));
    }

    #[test]
    fn test_end_without_start() {
        let error = Assembler::default().push(scope_end(1)).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::UnbalancedScopeTree);
    }

    #[test]
    fn test_unclosed_scope() {
        let mut assembler = Assembler::default();
        assembler.push(scope_start(0, 0)).unwrap();

        assert_eq!(assembler.finish().unwrap_err().kind(), ErrorKind::UnbalancedScopeTree);
    }

    #[test]
    fn test_source_needs_exactly_one_root() {
        let mut assembler = Assembler::default();
        for item in [scope_start(0, 0), scope_end(1), scope_start(2, 2), scope_end(3)] {
            assembler.push(item).unwrap();
        }

        assert_eq!(
            assembler.push(Item::SourceEnd).unwrap_err().kind(),
            ErrorKind::UnbalancedScopeTree
        );
    }

    #[test]
    fn test_reference_to_open_scope() {
        let mut assembler = Assembler::default();
        assembler.push(scope_start(0, 0)).unwrap();
        let error = assembler
            .push(Item::RangeStart {
                start: Position::default(),
                header: RangeHeader {
                    definition: Some(ItemKey::new(0, 0)),
                    ..RangeHeader::default()
                },
            })
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::InvalidDefinitionReference);
    }

    #[test]
    fn test_range_bindings_are_resolved_at_end() {
        let mut assembler = Assembler::default();
        let segments = vec![
            Segment {
                from: Position::new(0, 0),
                value: Some("a".to_string()),
            },
            Segment {
                from: Position::new(0, 5),
                value: None,
            },
        ];
        assembler
            .push(Item::RangeStart {
                start: Position::new(0, 0),
                header: RangeHeader {
                    bindings: vec![segments],
                    ..RangeHeader::default()
                },
            })
            .unwrap();
        assembler
            .push(Item::RangeEnd {
                end: Position::new(1, 0),
            })
            .unwrap();
        let info = assembler.finish().unwrap();

        let Binding::Ranges(ranges) = &info.ranges[0].values[0] else {
            panic!("expected ranges");
        };
        assert_eq!(ranges[0].to, Position::new(0, 5));
        assert_eq!(ranges[1].to, Position::new(1, 0));
    }

    #[test]
    fn test_range_end_without_start() {
        let error = Assembler::default()
            .push(Item::RangeEnd {
                end: Position::default(),
            })
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::UnbalancedRangeTree);
    }
}
