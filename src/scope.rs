//! The scope info model.
//!
//! Two trees are described: [`OriginalScope`] trees over the authored
//! sources, one root per source, and [`GeneratedRange`] trees over the
//! generated code. A generated range may point at the original scope it
//! implements by holding a shared [`Rc`] to it.
use std::rc::Rc;

/// A zero-based line and column.
///
/// Positions order by line first, then column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    /// Create a new Position.
    #[inline]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl From<(u32, u32)> for Position {
    fn from((line, column): (u32, u32)) -> Self {
        Self { line, column }
    }
}

/// A lexical scope of an authored source.
///
/// # Examples
///
/// ```
/// use scopemap::OriginalScope;
///
/// let scope = OriginalScope::new((0, 0), (10, 1))
///     .with_kind("global")
///     .with_variables(["x"])
///     .with_child(OriginalScope::new((2, 0), (4, 1)).with_name("f").stack_frame());
///
/// assert_eq!(scope.children.len(), 1);
/// assert!(scope.children[0].is_stack_frame);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OriginalScope {
    pub start: Position,
    pub end: Position,
    /// A free-form category such as `function` or `block`.
    pub kind: Option<String>,
    pub name: Option<String>,
    /// True if the scope shows up as a frame in stack traces.
    pub is_stack_frame: bool,
    /// Names declared in the scope, matched by position with
    /// [`GeneratedRange::values`].
    pub variables: Vec<String>,
    pub children: Vec<Rc<OriginalScope>>,
}

impl OriginalScope {
    /// Create a new OriginalScope spanning `start` to `end`.
    pub fn new(start: impl Into<Position>, end: impl Into<Position>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            ..Self::default()
        }
    }

    /// Set the kind.
    pub fn with_kind<T>(mut self, kind: T) -> Self
    where
        T: Into<String>,
    {
        self.kind = Some(kind.into());

        self
    }

    /// Set the name.
    pub fn with_name<T>(mut self, name: T) -> Self
    where
        T: Into<String>,
    {
        self.name = Some(name.into());

        self
    }

    /// Mark the scope as a stack frame.
    pub fn stack_frame(mut self) -> Self {
        self.is_stack_frame = true;

        self
    }

    /// Set the variables declared in the scope.
    pub fn with_variables<I, T>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.variables = variables.into_iter().map(Into::into).collect();

        self
    }

    /// Append a child scope.
    pub fn with_child(mut self, child: impl Into<Rc<OriginalScope>>) -> Self {
        self.children.push(child.into());

        self
    }
}

/// The location in an authored source that a generated range was inlined from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Callsite {
    pub source_index: u32,
    pub line: u32,
    pub column: u32,
}

impl Callsite {
    /// Create a new Callsite.
    #[inline]
    pub const fn new(source_index: u32, line: u32, column: u32) -> Self {
        Self {
            source_index,
            line,
            column,
        }
    }
}

/// How the value of one variable is recovered inside a generated range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// The value is not available anywhere in the range.
    Unavailable,
    /// One expression yields the value throughout the range.
    Expression(String),
    /// The expression changes within the range.
    Ranges(Vec<BindingRange>),
}

/// One piece of a [`Binding::Ranges`] binding.
///
/// Pieces are contiguous: the first starts at the range start, each `to` is
/// the next piece's `from`, and the last ends at the range end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingRange {
    pub from: Position,
    pub to: Position,
    /// The expression, or `None` where the value is unavailable.
    pub value: Option<String>,
}

impl BindingRange {
    /// Create a new BindingRange.
    pub fn new(from: impl Into<Position>, to: impl Into<Position>, value: Option<&str>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            value: value.map(str::to_string),
        }
    }
}

/// A region of generated code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GeneratedRange {
    pub start: Position,
    pub end: Position,
    /// The original scope this range implements.
    pub original_scope: Option<Rc<OriginalScope>>,
    pub is_stack_frame: bool,
    /// True if the range should be skipped when stepping.
    pub is_hidden: bool,
    pub callsite: Option<Callsite>,
    /// One binding per variable of `original_scope`.
    pub values: Vec<Binding>,
    pub children: Vec<GeneratedRange>,
}

impl GeneratedRange {
    /// Create a new GeneratedRange spanning `start` to `end`.
    pub fn new(start: impl Into<Position>, end: impl Into<Position>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            ..Self::default()
        }
    }

    /// Set the original scope this range implements.
    ///
    /// The scope must be one of the `Rc`s reachable from
    /// [`ScopeInfo::scopes`], since it is identified by pointer when encoding.
    pub fn with_definition(mut self, scope: &Rc<OriginalScope>) -> Self {
        self.original_scope = Some(Rc::clone(scope));

        self
    }

    /// Mark the range as a stack frame.
    pub fn stack_frame(mut self) -> Self {
        self.is_stack_frame = true;

        self
    }

    /// Mark the range as hidden.
    pub fn hidden(mut self) -> Self {
        self.is_hidden = true;

        self
    }

    /// Set the callsite.
    pub fn with_callsite(mut self, callsite: Callsite) -> Self {
        self.callsite = Some(callsite);

        self
    }

    /// Set the bindings.
    pub fn with_values<I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = Binding>,
    {
        self.values = values.into_iter().collect();

        self
    }

    /// Append a child range.
    pub fn with_child(mut self, child: GeneratedRange) -> Self {
        self.children.push(child);

        self
    }
}

/// The scope info of one source map.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScopeInfo {
    /// One root scope per source, in source order.
    pub scopes: Vec<Rc<OriginalScope>>,
    /// Top-level generated ranges, in document order.
    pub ranges: Vec<GeneratedRange>,
}

impl ScopeInfo {
    /// Create a new ScopeInfo.
    #[inline]
    pub fn new(scopes: Vec<Rc<OriginalScope>>, ranges: Vec<GeneratedRange>) -> Self {
        Self { scopes, ranges }
    }

    /// Return the parent of `scope`, or `None` for a root or a scope that is
    /// not part of this info.
    ///
    /// Scopes are compared by identity, not by value.
    pub fn parent_of(&self, scope: &OriginalScope) -> Option<&Rc<OriginalScope>> {
        let mut stack: Vec<&Rc<OriginalScope>> = self.scopes.iter().collect();
        while let Some(parent) = stack.pop() {
            for child in &parent.children {
                if std::ptr::eq(Rc::as_ptr(child), scope) {
                    return Some(parent);
                }
                stack.push(child);
            }
        }

        None
    }

    /// Return the index of the source whose tree holds `scope`.
    pub fn source_of(&self, scope: &OriginalScope) -> Option<usize> {
        fn contains(node: &Rc<OriginalScope>, scope: &OriginalScope) -> bool {
            std::ptr::eq(Rc::as_ptr(node), scope)
                || node.children.iter().any(|child| contains(child, scope))
        }

        self.scopes.iter().position(|root| contains(root, scope))
    }
}

#[cfg(test)]
mod tests {
    use super::{OriginalScope, Position, ScopeInfo};
    use std::rc::Rc;

    #[test]
    fn test_position_order() {
        assert!(Position::new(1, 9) < Position::new(2, 0));
        assert!(Position::new(2, 0) < Position::new(2, 1));
    }

    #[test]
    fn test_parent_of() {
        let inner = Rc::new(OriginalScope::new((2, 0), (3, 0)));
        let middle = Rc::new(OriginalScope::new((1, 0), (4, 0)).with_child(Rc::clone(&inner)));
        let root = Rc::new(OriginalScope::new((0, 0), (5, 0)).with_child(Rc::clone(&middle)));
        let info = ScopeInfo::new(vec![Rc::clone(&root)], vec![]);

        assert!(Rc::ptr_eq(info.parent_of(&inner).unwrap(), &middle));
        assert!(Rc::ptr_eq(info.parent_of(&middle).unwrap(), &root));
        assert!(info.parent_of(&root).is_none());
    }

    #[test]
    fn test_parent_of_uses_identity() {
        let root = Rc::new(OriginalScope::new((0, 0), (5, 0)).with_child(OriginalScope::new((1, 0), (2, 0))));
        let info = ScopeInfo::new(vec![root], vec![]);
        let lookalike = OriginalScope::new((1, 0), (2, 0));

        assert!(info.parent_of(&lookalike).is_none());
    }

    #[test]
    fn test_source_of() {
        let second = Rc::new(OriginalScope::new((0, 0), (1, 0)));
        let info = ScopeInfo::new(
            vec![Rc::new(OriginalScope::new((0, 0), (9, 0))), Rc::clone(&second)],
            vec![],
        );

        assert_eq!(info.source_of(&second), Some(1));
    }
}
