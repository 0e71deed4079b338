//! Fields of generated range items.
use super::{
    binding::{read_bindings, write_bindings},
    item::{advance, distance, ItemKey, RangeHeader},
};
use crate::{
    log::{Error, ErrorKind},
    names::NameTable,
    scope::{Callsite, GeneratedRange, Position},
    vlq::{Cursor, Fields},
};

const FLAG_HAS_DEFINITION: u64 = 0x1;
const FLAG_HAS_CALLSITE: u64 = 0x2;
const FLAG_IS_STACK_FRAME: u64 = 0x4;
const FLAG_IS_HIDDEN: u64 = 0x8;

/// How a definition reference is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Definitions {
    /// A source delta, then an index delta that is relative only within
    /// the same source.
    PerSource,
    /// One index delta against the last global item index.
    Global,
}

/// Which optional parts a generated header carries inline.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HeaderLayout {
    pub definitions: Definitions,
    pub bindings: bool,
}

/// Running delta state of the generated range tree.
#[derive(Debug, Default)]
pub(crate) struct GeneratedState {
    /// The position of the last start or end item.
    pub position: Position,
    definition: ItemKey,
    callsite: Callsite,
}

/// A position relative to some earlier position.
///
/// The column is relative when the line did not change, and absolute
/// otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Delta {
    pub line: u64,
    pub column: u64,
    /// The bits between the line-changed bit and the column.
    pub marker: u64,
}

impl Delta {
    /// Return the position this delta leads to from `from`.
    pub fn apply(self, from: Position) -> Result<Position, Error> {
        if self.line == 0 {
            Ok(Position::new(from.line, advance(from.column, self.column)?))
        } else {
            Ok(Position::new(advance(from.line, self.line)?, advance(0, self.column)?))
        }
    }
}

/// Write `to` relative to `from` as a position token, and move `from` there.
///
/// The token is `column << shift | marker << 1 | lineChanged`, followed by
/// the line delta when the line changed.
pub(crate) fn write_position(
    fields: &mut Fields,
    from: &mut Position,
    to: Position,
    shift: u32,
    marker: u64,
) -> Result<(), Error> {
    let line = distance(from.line, to.line, "generated range line")?;
    let column = if line == 0 {
        distance(from.column, to.column, "generated range column")?
    } else {
        u64::from(to.column)
    };

    fields.unsigned(column << shift | marker << 1 | u64::from(line != 0));
    if line != 0 {
        fields.unsigned(line);
    }
    *from = to;

    Ok(())
}

/// Read a position token written by [`write_position`].
pub(crate) fn read_delta(cursor: &mut Cursor<'_>, shift: u32) -> Result<Delta, Error> {
    let token = cursor.next_unsigned()?;
    let line = if token & 1 != 0 {
        cursor.next_unsigned()?
    } else {
        0
    };

    Ok(Delta {
        line,
        column: token >> shift,
        marker: (token & ((1 << shift) - 1)) >> 1,
    })
}

/// Write the flags, definition, callsite and (when the layout says so)
/// bindings of `range`.
pub(crate) fn write_header(
    fields: &mut Fields,
    range: &GeneratedRange,
    definition: Option<ItemKey>,
    state: &mut GeneratedState,
    names: &mut NameTable,
    layout: HeaderLayout,
) -> Result<(), Error> {
    let mut flags = 0;
    if definition.is_some() {
        flags |= FLAG_HAS_DEFINITION;
    }
    if range.callsite.is_some() {
        flags |= FLAG_HAS_CALLSITE;
    }
    if range.is_stack_frame {
        flags |= FLAG_IS_STACK_FRAME;
    }
    if range.is_hidden {
        flags |= FLAG_IS_HIDDEN;
    }
    fields.unsigned(flags);

    if let Some(key) = definition {
        let last = state.definition;
        match layout.definitions {
            Definitions::PerSource => {
                fields.signed(key.stream as i64 - last.stream as i64);
                let base = if key.stream == last.stream { last.index } else { 0 };
                fields.signed(key.index as i64 - base as i64);
            }
            Definitions::Global => {
                fields.signed(key.index as i64 - last.index as i64);
            }
        }
        state.definition = key;
    }

    if let Some(callsite) = range.callsite {
        let last = state.callsite;
        let same_source = callsite.source_index == last.source_index;
        let line_base = if same_source { last.line } else { 0 };
        let column_base = if same_source && callsite.line == last.line {
            last.column
        } else {
            0
        };
        fields.signed(i64::from(callsite.source_index) - i64::from(last.source_index));
        fields.signed(i64::from(callsite.line) - i64::from(line_base));
        fields.signed(i64::from(callsite.column) - i64::from(column_base));
        state.callsite = callsite;
    }

    if layout.bindings {
        write_bindings(fields, &range.values, range.start, range.end, names)?;
    }

    Ok(())
}

fn error_definition(reason: String) -> Error {
    Error::build(ErrorKind::InvalidDefinitionReference, reason)
}

fn offset(base: usize, delta: i64, what: &str) -> Result<usize, Error> {
    i64::try_from(base)
        .ok()
        .and_then(|base| base.checked_add(delta))
        .and_then(|value| usize::try_from(value).ok())
        .ok_or_else(|| error_definition(format!("{what} {base} + {delta} is out of range")))
}

fn callsite_field(base: u32, delta: i64) -> Result<u32, Error> {
    i64::from(base)
        .checked_add(delta)
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| {
            Error::build(ErrorKind::MalformedItem, "callsite position is out of range")
                .with_help(format!("{base} + {delta} does not fit a callsite field"))
        })
}

/// Read the header written by [`write_header`].
///
/// `start` is the start of the range, which the first binding segment
/// starts at.
pub(crate) fn read_header(
    cursor: &mut Cursor<'_>,
    state: &mut GeneratedState,
    start: Position,
    names: &NameTable,
    layout: HeaderLayout,
) -> Result<RangeHeader, Error> {
    let flags = cursor.next_unsigned()?;

    let definition = if flags & FLAG_HAS_DEFINITION != 0 {
        let last = state.definition;
        let key = match layout.definitions {
            Definitions::PerSource => {
                let stream = offset(last.stream, cursor.next_signed()?, "definition source")?;
                let base = if stream == last.stream { last.index } else { 0 };
                ItemKey::new(stream, offset(base, cursor.next_signed()?, "definition index")?)
            }
            Definitions::Global => {
                ItemKey::new(0, offset(last.index, cursor.next_signed()?, "definition index")?)
            }
        };
        state.definition = key;
        Some(key)
    } else {
        None
    };

    let callsite = if flags & FLAG_HAS_CALLSITE != 0 {
        let last = state.callsite;
        let source_index = callsite_field(last.source_index, cursor.next_signed()?)?;
        let same_source = source_index == last.source_index;
        let line = callsite_field(if same_source { last.line } else { 0 }, cursor.next_signed()?)?;
        let column_base = if same_source && line == last.line {
            last.column
        } else {
            0
        };
        let column = callsite_field(column_base, cursor.next_signed()?)?;
        let callsite = Callsite::new(source_index, line, column);
        state.callsite = callsite;
        Some(callsite)
    } else {
        None
    };

    let bindings = if layout.bindings {
        read_bindings(cursor, start, names)?
    } else {
        vec![]
    };

    Ok(RangeHeader {
        definition,
        callsite,
        is_stack_frame: flags & FLAG_IS_STACK_FRAME != 0,
        is_hidden: flags & FLAG_IS_HIDDEN != 0,
        bindings,
    })
}
