//! Variable bindings of generated ranges.
//!
//! A binding is stored as a signed token `v`. When `v >= -1` it is the name
//! index of one expression for the whole range, `-1` meaning unavailable.
//! Otherwise `-v` segments follow: the value index of the first segment,
//! then a `(lineDelta, columnDelta, valueIndex)` triple for the start of
//! each following segment. Segment ends are never stored.
use super::item::Segment;
use crate::{
    log::{error_name_reference, error_scope_info, Error, ErrorKind},
    names::NameTable,
    scope::{Binding, BindingRange, Position},
    vlq::{Cursor, Fields},
};

const UNAVAILABLE: i64 = -1;

fn error_start_mismatch<T>(reason: T) -> Error
where
    T: Into<String>,
{
    Error::build(ErrorKind::BindingStartMismatch, reason)
}

fn value_index(value: Option<&str>, names: &mut NameTable) -> i64 {
    value.map_or(UNAVAILABLE, |value| names.intern(value) as i64)
}

/// Write the bindings of a range spanning `start` to `end`.
pub(crate) fn write_bindings(
    fields: &mut Fields,
    values: &[Binding],
    start: Position,
    end: Position,
    names: &mut NameTable,
) -> Result<(), Error> {
    fields.unsigned(values.len() as u64);
    for binding in values {
        write_binding(fields, binding, start, end, names)?;
    }

    Ok(())
}

fn write_binding(
    fields: &mut Fields,
    binding: &Binding,
    start: Position,
    end: Position,
    names: &mut NameTable,
) -> Result<(), Error> {
    let segments = match binding {
        Binding::Unavailable => {
            fields.signed(UNAVAILABLE);
            return Ok(());
        }
        Binding::Expression(value) => {
            fields.signed(value_index(Some(value), names));
            return Ok(());
        }
        Binding::Ranges(segments) => segments,
    };

    let (first, last) = match (segments.first(), segments.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(error_scope_info("binding has no segments")),
    };
    if first.from != start {
        return Err(error_start_mismatch(format!(
            "first binding segment starts at {}:{}, but its range starts at {}:{}",
            first.from.line, first.from.column, start.line, start.column
        )));
    }
    if last.to != end {
        return Err(error_scope_info("last binding segment does not end with its range"));
    }
    if let Some(segment) = segments.iter().find(|segment| segment.from > segment.to) {
        return Err(error_scope_info(format!(
            "binding segment ends at {}:{} before it starts at {}:{}",
            segment.to.line, segment.to.column, segment.from.line, segment.from.column
        )));
    }
    for pair in segments.windows(2) {
        if pair[0].to != pair[1].from {
            return Err(error_scope_info("binding segments are not contiguous"));
        }
    }

    // A lone segment is the same as a bare value.
    if segments.len() == 1 {
        fields.signed(value_index(first.value.as_deref(), names));
        return Ok(());
    }

    fields.signed(-(segments.len() as i64));
    fields.signed(value_index(first.value.as_deref(), names));
    for pair in segments.windows(2) {
        let (previous, segment) = (pair[0].from, pair[1].from);
        if segment < previous {
            return Err(error_scope_info("binding segments are out of order"));
        }
        let line = segment.line - previous.line;
        let column = if line == 0 {
            segment.column - previous.column
        } else {
            segment.column
        };
        fields.signed(i64::from(line));
        fields.signed(i64::from(column));
        fields.signed(value_index(pair[1].value.as_deref(), names));
    }

    Ok(())
}

fn read_value(cursor: &mut Cursor<'_>, names: &NameTable) -> Result<Option<String>, Error> {
    let index = cursor.next_signed()?;
    match index {
        UNAVAILABLE => Ok(None),
        _ => {
            let index = u64::try_from(index).map_err(|_| error_name_reference(index, names.len()))?;
            Ok(Some(names.get(index)?.to_string()))
        }
    }
}

fn to_u32(value: i64) -> Result<u32, Error> {
    u32::try_from(value)
        .map_err(|_| error_start_mismatch(format!("binding segment position {value} is out of range")))
}

/// Read the bindings of a range starting at `start`.
pub(crate) fn read_bindings(
    cursor: &mut Cursor<'_>,
    start: Position,
    names: &NameTable,
) -> Result<Vec<Vec<Segment>>, Error> {
    let count = cursor.next_unsigned()?;
    let mut bindings = vec![];
    for _ in 0..count {
        bindings.push(read_binding(cursor, start, names)?);
    }

    Ok(bindings)
}

fn read_binding(
    cursor: &mut Cursor<'_>,
    start: Position,
    names: &NameTable,
) -> Result<Vec<Segment>, Error> {
    let head = cursor.next_signed()?;
    if head >= UNAVAILABLE {
        let value = match head {
            UNAVAILABLE => None,
            index => Some(names.get(index as u64)?.to_string()),
        };
        return Ok(vec![Segment { from: start, value }]);
    }

    let count = head.unsigned_abs();
    let mut segments = vec![Segment {
        from: start,
        value: read_value(cursor, names)?,
    }];
    let mut from = start;
    for _ in 1..count {
        let line = cursor.next_signed()?;
        let column = cursor.next_signed()?;
        let next_line = to_u32(i64::from(from.line).saturating_add(line))?;
        let next_column = if line == 0 {
            to_u32(i64::from(from.column).saturating_add(column))?
        } else {
            to_u32(column)?
        };
        from = Position::new(next_line, next_column);
        segments.push(Segment {
            from,
            value: read_value(cursor, names)?,
        });
    }

    Ok(segments)
}

/// Turn stored segments into a [`Binding`] once the range `end` is known.
///
/// Each segment ends where the next one starts, and the last one ends with
/// the range. A single segment becomes a bare value.
pub(crate) fn resolve(segments: Vec<Segment>, start: Position, end: Position) -> Result<Binding, Error> {
    if segments.len() == 1 {
        return Ok(match segments.into_iter().next().and_then(|segment| segment.value) {
            Some(value) => Binding::Expression(value),
            None => Binding::Unavailable,
        });
    }

    let mut previous = start;
    for segment in &segments {
        if segment.from < previous || segment.from > end {
            return Err(error_start_mismatch(format!(
                "binding segment starts at {}:{}, outside of its range {}:{} to {}:{}",
                segment.from.line, segment.from.column, start.line, start.column, end.line, end.column
            )));
        }
        previous = segment.from;
    }

    let ends: Vec<Position> = segments
        .iter()
        .skip(1)
        .map(|segment| segment.from)
        .chain(std::iter::once(end))
        .collect();
    let ranges = segments
        .into_iter()
        .zip(ends)
        .map(|(segment, to)| BindingRange {
            from: segment.from,
            to,
            value: segment.value,
        })
        .collect();

    Ok(Binding::Ranges(ranges))
}
