use super::{framing::Builder, item::ItemKey};
use crate::{
    log::{error_scope_info, Error, ErrorKind},
    names::NameTable,
    scope::{GeneratedRange, OriginalScope, Position, ScopeInfo},
};
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// Maps an original scope to the key of its start item.
type Keys = FxHashMap<*const OriginalScope, ItemKey>;

/// Walk both trees of `info` in document order and feed them to `builder`.
///
/// Every root scope is walked before the first range, so each definition
/// reference points backwards.
pub(crate) fn walk(
    info: &ScopeInfo,
    builder: &mut dyn Builder,
    names: &mut NameTable,
) -> Result<(), Error> {
    let mut keys = Keys::default();
    for (source, root) in info.scopes.iter().enumerate() {
        builder.begin_source(source);
        walk_scope(root, builder, names, &mut keys)?;
    }

    let mut previous = None;
    for range in &info.ranges {
        check_sibling(previous, range.start, range.end, "generated range")?;
        walk_range(range, builder, names, &keys)?;
        previous = Some(range.end);
    }

    Ok(())
}

/// Check that a node starts after its previous sibling and does not end
/// before it starts.
fn check_sibling(
    previous: Option<Position>,
    start: Position,
    end: Position,
    what: &str,
) -> Result<(), Error> {
    if start > end {
        return Err(error_scope_info(format!(
            "{what} ends at {}:{} before it starts at {}:{}",
            end.line, end.column, start.line, start.column
        )));
    }
    if previous.is_some_and(|previous| start < previous) {
        return Err(error_scope_info(format!("{what} overlaps its previous sibling")));
    }

    Ok(())
}

fn check_children(
    start: Position,
    end: Position,
    children: impl Iterator<Item = (Position, Position)>,
    what: &str,
) -> Result<(), Error> {
    let mut previous = None;
    for (child_start, child_end) in children {
        check_sibling(previous, child_start, child_end, what)?;
        if child_start < start || child_end > end {
            return Err(error_scope_info(format!("{what} is not contained in its parent")));
        }
        previous = Some(child_end);
    }

    Ok(())
}

fn walk_scope(
    scope: &Rc<OriginalScope>,
    builder: &mut dyn Builder,
    names: &mut NameTable,
    keys: &mut Keys,
) -> Result<(), Error> {
    check_sibling(None, scope.start, scope.end, "original scope")?;
    check_children(
        scope.start,
        scope.end,
        scope.children.iter().map(|child| (child.start, child.end)),
        "original scope",
    )?;

    let key = builder.start_scope(scope, names)?;
    keys.insert(Rc::as_ptr(scope), key);
    for child in &scope.children {
        walk_scope(child, builder, names, keys)?;
    }

    builder.end_scope(scope)
}

fn walk_range(
    range: &GeneratedRange,
    builder: &mut dyn Builder,
    names: &mut NameTable,
    keys: &Keys,
) -> Result<(), Error> {
    check_children(
        range.start,
        range.end,
        range.children.iter().map(|child| (child.start, child.end)),
        "generated range",
    )?;

    let definition = match &range.original_scope {
        Some(scope) => Some(*keys.get(&Rc::as_ptr(scope)).ok_or_else(|| {
            Error::build(
                ErrorKind::InvalidDefinitionReference,
                "generated range refers to an original scope outside of the scope info",
            )
            .with_help("build ranges with `Rc` clones of the scopes in `ScopeInfo::scopes`")
        })?),
        None => None,
    };

    // One value per variable of the definition, none without a definition.
    let variables = range.original_scope.as_ref().map_or(0, |scope| scope.variables.len());
    if range.values.len() != variables {
        return Err(error_scope_info(format!(
            "generated range has {} values for {variables} variables",
            range.values.len()
        )));
    }

    builder.start_range(range, definition, names)?;
    for child in &range.children {
        walk_range(child, builder, names, keys)?;
    }

    builder.end_range(range)
}
