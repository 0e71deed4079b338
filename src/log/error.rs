use super::{Pointer, RED, RESET};
use crate::{log::Visual, region::Region};
use std::fmt::{Debug, Display, Formatter, Result};

/// The category of an [`Error`].
///
/// Every category is fatal to the `encode` or `decode` call that produced it.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ErrorKind {
    /// The source map lacks `names` or the fields a strategy stores its
    /// token streams in.
    MissingFields,
    /// A number could not be read from the token stream.
    MalformedVlq,
    /// An item is framed incorrectly, such as a length prefix that is shorter
    /// than the fields it guards.
    MalformedItem,
    /// Original scope start and end items are not nested properly.
    UnbalancedScopeTree,
    /// Generated range start and end items are not nested properly.
    UnbalancedRangeTree,
    /// A generated range refers to an original scope that does not exist.
    InvalidDefinitionReference,
    /// A name index points outside of the name table.
    InvalidNameReference,
    /// A binding segment starts somewhere its range does not allow.
    BindingStartMismatch,
    /// The scope info given to `encode` violates an invariant of the model.
    InvalidScopeInfo,
    /// The source map JSON could not be read or written.
    Json,
    /// Decoding an encoded map did not reproduce the original scope info.
    RoundTripMismatch,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            ErrorKind::MissingFields => write!(f, "missing fields"),
            ErrorKind::MalformedVlq => write!(f, "malformed vlq"),
            ErrorKind::MalformedItem => write!(f, "malformed item"),
            ErrorKind::UnbalancedScopeTree => write!(f, "unbalanced scope tree"),
            ErrorKind::UnbalancedRangeTree => write!(f, "unbalanced range tree"),
            ErrorKind::InvalidDefinitionReference => write!(f, "invalid definition reference"),
            ErrorKind::InvalidNameReference => write!(f, "invalid name reference"),
            ErrorKind::BindingStartMismatch => write!(f, "binding start mismatch"),
            ErrorKind::InvalidScopeInfo => write!(f, "invalid scope info"),
            ErrorKind::Json => write!(f, "json"),
            ErrorKind::RoundTripMismatch => write!(f, "round trip mismatch"),
        }
    }
}

/// Describes an error, and allows adding a contextual help text and visualization.
///
/// # Examples
///
/// Creating an [`Error`] that includes a [`Visual`] of type [`Pointer`]:
///
/// ```
/// use scopemap::{Error, ErrorKind};
///
/// let error = Error::build(ErrorKind::MalformedVlq, "unexpected character")
///     .with_pointer("AAgC!A", 4..5)
///     .with_name("generatedRanges")
///     .with_help("expected one of `A-Z`, `a-z`, `0-9`, `+`, `/`");
///
/// assert_eq!(error.kind(), ErrorKind::MalformedVlq);
/// ```
///
/// When printed with `println!("{:#}", error)` the [`Error`] produces this output:
///
/// ```text
/// error: unexpected character
///   --> generatedRanges:4
///    |
///    | AAgC!A
///    |     ^--
///    |
///   = help: expected one of `A-Z`, `a-z`, `0-9`, `+`, `/`
/// ```
pub struct Error {
    /// The category of the [`Error`].
    kind: ErrorKind,
    /// Describes the cause of the [`Error`].
    reason: String,
    /// A visualization to help illustrate the [`Error`].
    visual: Option<Box<dyn Visual>>,
    /// Additional information to display with the [`Error`].
    help: Option<String>,
    /// The source map field that the [`Error`] comes from.
    name: Option<String>,
}

impl Error {
    /// Create a new [`Error`] of the given kind with the given reason text.
    ///
    /// The additional fields may be populated using the various methods
    /// defined on `Error`.
    ///
    /// # Examples
    ///
    /// ```
    /// use scopemap::{Error, ErrorKind};
    ///
    /// Error::build(ErrorKind::MissingFields, "source map has no `names`")
    ///     .with_help("add an empty `names` array");
    /// ```
    pub fn build<T>(kind: ErrorKind, reason: T) -> Self
    where
        T: Into<String>,
    {
        Error {
            kind,
            reason: reason.into(),
            name: None,
            visual: None,
            help: None,
        }
    }

    /// Set the reason text, which is a short summary of the [`Error`].
    pub fn with_reason<T>(mut self, text: T) -> Self
    where
        T: Into<String>,
    {
        self.reason = text.into();

        self
    }

    /// Set the name text, which names the source map field (such as
    /// `originalScopes[1]`) that the [`Error`] is related to.
    pub fn with_name<T>(mut self, text: T) -> Self
    where
        T: Into<String>,
    {
        self.name = Some(text.into());

        self
    }

    /// Set the [`Visual`], which is a visualization that helps illustrate the
    /// cause of the error.
    pub fn with_visual(mut self, visual: impl Visual + 'static) -> Self {
        self.visual = Some(Box::new(visual));

        self
    }

    /// Set the visualization to a new [`Pointer`] with the given token
    /// stream and [`Region`].
    ///
    /// This is a shortcut method for creating a `Pointer` yourself and then
    /// passing it to `with_visual`.
    pub fn with_pointer<T>(mut self, source: &str, region: T) -> Self
    where
        T: Into<Region>,
    {
        self.visual = Some(Box::new(Pointer::new(source, region.into())));

        self
    }

    /// Set the help text, which is contextual information to accompany the
    /// reason text.
    pub fn with_help<T>(mut self, text: T) -> Self
    where
        T: Into<String>,
    {
        self.help = Some(text.into());

        self
    }

    /// Return the [`ErrorKind`] of the error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Return the reason text.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Return the help text, if any.
    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    /// Return the name of the source map field that the error is related to.
    pub fn get_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Return true if the error carries a visualization.
    pub fn has_visual(&self) -> bool {
        self.visual.is_some()
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        if !f.alternate() {
            writeln!(f, "{self:#}")?;
        }
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("reason", &self.reason)
            .field("name", &self.name)
            .field("visual", &self.visual)
            .field("help", &self.help)
            .finish()?;

        Ok(())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let header = format!("{RED}error{RESET}");
        write!(f, "{header}: {}", self.reason)?;

        if f.alternate() {
            if let Some(visual) = &self.visual {
                return visual.display(f, self.name.as_deref(), self.help.as_deref());
            }
            if let Some(help) = &self.help {
                write!(f, "\n  = help: {help}")?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for Error {}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.reason == other.reason
            && self.help == other.help
            && self.name == other.name
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::build(ErrorKind::Json, value.to_string())
            .with_help("the source map must be a JSON object")
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind};

    #[test]
    fn test_builder_fields() {
        let error = Error::build(ErrorKind::UnbalancedScopeTree, "unexpected end item")
            .with_name("originalScopes[0]")
            .with_help("did you close every scope?");

        assert_eq!(error.kind(), ErrorKind::UnbalancedScopeTree);
        assert_eq!(error.reason(), "unexpected end item");
        assert_eq!(error.get_name(), Some("originalScopes[0]"));
        assert_eq!(error.help(), Some("did you close every scope?"));
        assert!(!error.has_visual());
    }

    #[test]
    fn test_alternate_display_includes_pointer() {
        let error = Error::build(ErrorKind::MalformedVlq, "unexpected character")
            .with_pointer("AAgC!A", 4..5)
            .with_name("scopes")
            .with_help("remove it");
        let text = format!("{error:#}");

        assert!(text.contains("unexpected character"));
        assert!(text.contains("--> scopes:4"));
        assert!(text.contains("AAgC!A"));
        assert!(text.contains("help: remove it"));
    }

    #[test]
    fn test_equality_ignores_visual() {
        let left = Error::build(ErrorKind::MalformedItem, "short").with_pointer("AAAA", 0..1);
        let right = Error::build(ErrorKind::MalformedItem, "short");

        assert_eq!(left, right);
    }
}
