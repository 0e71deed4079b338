use crate::{
    log::{error_scope_info, Error, ErrorKind},
    scope::{Callsite, Position},
};

/// Identifies an original scope by the item that started it.
///
/// Two-field strategies count items per source, so `stream` is the source
/// index. Single-stream strategies count items globally and keep `stream`
/// at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) struct ItemKey {
    pub stream: usize,
    pub index: usize,
}

impl ItemKey {
    #[inline]
    pub fn new(stream: usize, index: usize) -> Self {
        Self { stream, index }
    }
}

/// The decoded payload of an original scope start item.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ScopeHeader {
    pub name: Option<String>,
    pub kind: Option<String>,
    pub is_stack_frame: bool,
    pub variables: Vec<String>,
}

/// One stored binding segment, before its `to` is known.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Segment {
    pub from: Position,
    pub value: Option<String>,
}

/// The decoded payload of a generated range start item.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RangeHeader {
    pub definition: Option<ItemKey>,
    pub callsite: Option<Callsite>,
    pub is_stack_frame: bool,
    pub is_hidden: bool,
    /// One segment list per variable.
    pub bindings: Vec<Vec<Segment>>,
}

/// An item of a token stream, with absolute positions.
///
/// Every framing decodes its own grammar into this one shape, so the tree
/// assembly only has to be written once.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Item {
    /// The original scope stream of one source is exhausted.
    SourceEnd,
    ScopeStart {
        key: ItemKey,
        start: Position,
        header: ScopeHeader,
    },
    ScopeEnd {
        end: Position,
    },
    RangeStart {
        start: Position,
        header: RangeHeader,
    },
    RangeEnd {
        end: Position,
    },
}

/// Move `base` forward by a decoded delta.
pub(crate) fn advance(base: u32, delta: u64) -> Result<u32, Error> {
    u64::from(base)
        .checked_add(delta)
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| {
            Error::build(ErrorKind::MalformedItem, "position does not fit in 32 bits")
                .with_help(format!("{base} + {delta} overflows a line or column"))
        })
}

/// Return how far `to` is past `from`.
pub(crate) fn distance(from: u32, to: u32, what: &str) -> Result<u64, Error> {
    to.checked_sub(from)
        .map(u64::from)
        .ok_or_else(|| error_scope_info(format!("{what} {to} comes before {from}")))
}
