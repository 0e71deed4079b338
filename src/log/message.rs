use super::{Error, ErrorKind};
use crate::region::Region;
use std::fmt::Display;

pub const UNEXPECTED_EOF: &str = "unexpected end of token stream";
pub const UNEXPECTED_CHARACTER: &str = "unexpected character";
pub const NUMBER_OVERFLOW: &str = "number does not fit its field";
pub const UNBALANCED_END: &str = "end item without a matching start item";
pub const UNCLOSED_START: &str = "start item is never closed";

/// Return an [`Error`] explaining that the token stream ended in the middle
/// of a number.
pub fn error_eof(source: &str) -> Error {
    let source_len = source.len();
    Error::build(ErrorKind::MalformedVlq, UNEXPECTED_EOF)
        .with_pointer(source, source_len..source_len)
        .with_help("the last digit still has its continuation bit set, is the stream truncated?")
}

/// Return an [`Error`] explaining that a character outside of the base64
/// alphabet was found.
pub fn error_character(source: &str, index: usize, char: char) -> Error {
    Error::build(ErrorKind::MalformedVlq, UNEXPECTED_CHARACTER)
        .with_pointer(source, index..index + char.len_utf8())
        .with_help(format!(
            "expected one of `A-Z`, `a-z`, `0-9`, `+`, `/`, found `{char}`"
        ))
}

/// Return an [`Error`] explaining that a decoded number is too large, or
/// negative where only non-negative numbers are allowed.
pub fn error_overflow<T>(source: &str, region: T) -> Error
where
    T: Into<Region>,
{
    Error::build(ErrorKind::MalformedVlq, NUMBER_OVERFLOW).with_pointer(source, region)
}

/// Return an [`Error`] describing a source map field that must be present.
pub fn error_missing_field(field: &str) -> Error {
    Error::build(
        ErrorKind::MissingFields,
        format!("source map has no `{field}` field"),
    )
    .with_help("was the map encoded with the same strategy it is decoded with?")
}

/// Return an [`Error`] describing a name index outside of the name table.
pub fn error_name_reference<T>(index: T, len: usize) -> Error
where
    T: Display,
{
    Error::build(
        ErrorKind::InvalidNameReference,
        format!("name index {index} is out of bounds"),
    )
    .with_help(format!("the `names` table only holds {len} entries"))
}

/// Return an [`Error`] describing an encode-side invariant violation.
pub fn error_scope_info<T>(reason: T) -> Error
where
    T: Into<String>,
{
    Error::build(ErrorKind::InvalidScopeInfo, reason)
}
