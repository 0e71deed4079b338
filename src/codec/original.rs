//! Fields of original scope items.
use super::item::{advance, distance, ScopeHeader};
use crate::{
    log::{error_name_reference, Error},
    names::NameTable,
    scope::OriginalScope,
    vlq::{Cursor, Fields},
};

const FLAG_HAS_NAME: u64 = 0x1;
const FLAG_HAS_KIND: u64 = 0x2;
const FLAG_IS_STACK_FRAME: u64 = 0x4;

/// Running delta state of one original scope tree.
///
/// The state is reset at every root.
#[derive(Debug, Default)]
pub(crate) struct OriginalState {
    /// The line of the last start or end item.
    pub line: u32,
    /// The name index of the last kind.
    kind: i64,
}

impl OriginalState {
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Return the delta from the running line to `line`, and move there.
    pub fn line_delta(&mut self, line: u32) -> Result<u64, Error> {
        let delta = distance(self.line, line, "original scope line")?;
        self.line = line;

        Ok(delta)
    }

    /// Apply a decoded line delta and return the new line.
    pub fn advance_line(&mut self, delta: u64) -> Result<u32, Error> {
        self.line = advance(self.line, delta)?;

        Ok(self.line)
    }
}

/// Write the flags, name, kind and (when `variables` is set) variables of
/// `scope`.
pub(crate) fn write_header(
    fields: &mut Fields,
    scope: &OriginalScope,
    state: &mut OriginalState,
    names: &mut NameTable,
    variables: bool,
) {
    let mut flags = 0;
    if scope.name.is_some() {
        flags |= FLAG_HAS_NAME;
    }
    if scope.kind.is_some() {
        flags |= FLAG_HAS_KIND;
    }
    if scope.is_stack_frame {
        flags |= FLAG_IS_STACK_FRAME;
    }
    fields.unsigned(flags);

    if let Some(name) = &scope.name {
        fields.unsigned(names.intern(name) as u64);
    }
    if let Some(kind) = &scope.kind {
        let index = names.intern(kind) as i64;
        fields.signed(index - state.kind);
        state.kind = index;
    }
    if variables {
        fields.unsigned(scope.variables.len() as u64);
        write_variables(fields, &scope.variables, names);
    }
}

/// Write one name index per variable, without a count.
pub(crate) fn write_variables(fields: &mut Fields, variables: &[String], names: &mut NameTable) {
    for variable in variables {
        fields.unsigned(names.intern(variable) as u64);
    }
}

/// Read the header written by [`write_header`].
pub(crate) fn read_header(
    cursor: &mut Cursor<'_>,
    state: &mut OriginalState,
    names: &NameTable,
    variables: bool,
) -> Result<ScopeHeader, Error> {
    let flags = cursor.next_unsigned()?;

    let name = if flags & FLAG_HAS_NAME != 0 {
        Some(names.get(cursor.next_unsigned()?)?.to_string())
    } else {
        None
    };
    let kind = if flags & FLAG_HAS_KIND != 0 {
        state.kind = state.kind.saturating_add(cursor.next_signed()?);
        let index = u64::try_from(state.kind)
            .map_err(|_| error_name_reference(state.kind, names.len()))?;

        Some(names.get(index)?.to_string())
    } else {
        None
    };
    let variables = if variables {
        let count = cursor.next_unsigned()?;
        read_variables(cursor, count, names)?
    } else {
        vec![]
    };

    Ok(ScopeHeader {
        name,
        kind,
        is_stack_frame: flags & FLAG_IS_STACK_FRAME != 0,
        variables,
    })
}

/// Read `count` variable name indices.
pub(crate) fn read_variables(
    cursor: &mut Cursor<'_>,
    count: u64,
    names: &NameTable,
) -> Result<Vec<String>, Error> {
    let mut variables = vec![];
    for _ in 0..count {
        variables.push(names.get(cursor.next_unsigned()?)?.to_string());
    }

    Ok(variables)
}
