mod assemble;
mod binding;
mod framing;
mod generated;
mod item;
mod original;
mod walk;

use self::{
    assemble::assemble,
    framing::{
        Builder, CombinedBuilder, CombinedReader, InlineBuilder, InlineReader, SplitBuilder,
        SplitReader,
    },
    walk::walk,
};
use crate::{
    log::{error_missing_field, Error, ErrorKind},
    map::SourceMap,
    names::NameTable,
    scope::{Binding, GeneratedRange, ScopeInfo},
    vlq::Numbering,
};
use std::fmt::{Display, Formatter};
use tracing::debug;

/// How items are laid out in the token streams of a source map.
///
/// Every strategy carries the same information and round-trips the same
/// [`ScopeInfo`]. They differ only in size and in how much a decoder can
/// skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
    /// Separate start and end items with inline marker bits, in
    /// `originalScopes` and `generatedRanges`.
    #[default]
    InlineFlags,
    /// Like `InlineFlags`, with every item preceded by its token count.
    LengthPrefixed,
    /// Start and end items of both trees in `scopes`, each preceded by a tag
    /// and its token count.
    TagSplit,
    /// One tagged item per node in `scopes`, closed by a bare close tag.
    TagCombined,
    /// Like `TagCombined`, with variables and bindings in their own items.
    SplitVariables,
}

impl Strategy {
    /// Every strategy, baseline first.
    pub const ALL: [Strategy; 5] = [
        Strategy::InlineFlags,
        Strategy::LengthPrefixed,
        Strategy::TagSplit,
        Strategy::TagCombined,
        Strategy::SplitVariables,
    ];

    /// Return the names of the source map fields the strategy writes.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            Strategy::InlineFlags | Strategy::LengthPrefixed => &["originalScopes", "generatedRanges"],
            Strategy::TagSplit | Strategy::TagCombined | Strategy::SplitVariables => &["scopes"],
        }
    }
}

/// Encodes and decodes scope info with one [`Strategy`] and [`Numbering`].
///
/// # Examples
///
/// ```
/// use scopemap::{Codec, GeneratedRange, OriginalScope, ScopeInfo, SourceMap, Strategy};
/// use std::rc::Rc;
///
/// let scope = Rc::new(OriginalScope::new((0, 0), (10, 1)).with_name("f"));
/// let range = GeneratedRange::new((0, 0), (3, 0)).with_definition(&scope);
/// let info = ScopeInfo::new(vec![scope], vec![range]);
///
/// let codec = Codec::new(Strategy::TagCombined);
/// let map = codec.encode(&info, &SourceMap::new()).unwrap();
///
/// assert!(map.scopes.is_some());
/// assert_eq!(codec.decode(&map).unwrap(), info);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Codec {
    strategy: Strategy,
    numbering: Numbering,
}

impl Codec {
    /// Create a new Codec with signed numbering.
    #[inline]
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            numbering: Numbering::default(),
        }
    }

    /// Set the [`Numbering`].
    ///
    /// Returns the Codec, so additional methods may be chained.
    #[inline]
    pub fn with_numbering(mut self, numbering: Numbering) -> Self {
        self.numbering = numbering;

        self
    }

    /// Return every strategy in both numberings.
    pub fn all() -> Vec<Codec> {
        Strategy::ALL
            .into_iter()
            .flat_map(|strategy| {
                [Numbering::Signed, Numbering::Unsigned]
                    .map(|numbering| Codec::new(strategy).with_numbering(numbering))
            })
            .collect()
    }

    /// Return the [`Strategy`] used to lay out items.
    #[inline]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Return the [`Numbering`] used for non-negative fields.
    #[inline]
    pub fn numbering(&self) -> Numbering {
        self.numbering
    }

    /// Return the display name of the codec.
    pub fn name(&self) -> &'static str {
        match (self.strategy, self.numbering) {
            (Strategy::InlineFlags, Numbering::Signed) => "Proposal",
            (Strategy::InlineFlags, Numbering::Unsigned) => "Proposal (unsigned)",
            (Strategy::LengthPrefixed, Numbering::Signed) => "Remaining (Option B)",
            (Strategy::LengthPrefixed, Numbering::Unsigned) => "Remaining (Option B, unsigned)",
            (Strategy::TagSplit, Numbering::Signed) => "Tag-Value-Length Split (Option C)",
            (Strategy::TagSplit, Numbering::Unsigned) => "Tag-Value-Length Split (Option C, unsigned)",
            (Strategy::TagCombined, Numbering::Signed) => "Tag-Value-Length Combined (Option D)",
            (Strategy::TagCombined, Numbering::Unsigned) => {
                "Tag-Value-Length Combined (Option D, unsigned)"
            }
            (Strategy::SplitVariables, Numbering::Signed) => "Tag-Value-Length Variables (Option E)",
            (Strategy::SplitVariables, Numbering::Unsigned) => {
                "Tag-Value-Length Variables (Option E, unsigned)"
            }
        }
    }

    /// Return a one-line description of the codec.
    pub fn description(&self) -> String {
        let layout = match self.strategy {
            Strategy::InlineFlags => "The currently proposed \"Scopes\" (stage 3) encoding.",
            Strategy::LengthPrefixed => {
                "Add a \"remaining VLQs count\" to items for unknown flags."
            }
            Strategy::TagSplit => "Prefix start/end items with a tag and their length.",
            Strategy::TagCombined => {
                "Prefix original/generated items with a tag and their length. Combine start/end items."
            }
            Strategy::SplitVariables => {
                "Prefix original/generated items with a tag and their length. Combine start/end items. \
                 Separate items for variables/bindings."
            }
        };

        match self.numbering {
            Numbering::Signed => layout.to_string(),
            Numbering::Unsigned => format!("{layout} Use unsigned VLQ where appropriate."),
        }
    }

    fn builder(&self) -> Box<dyn Builder> {
        let numbering = self.numbering;
        match self.strategy {
            Strategy::InlineFlags => Box::new(InlineBuilder::new(numbering, false)),
            Strategy::LengthPrefixed => Box::new(InlineBuilder::new(numbering, true)),
            Strategy::TagSplit => Box::new(SplitBuilder::new(numbering)),
            Strategy::TagCombined => Box::new(CombinedBuilder::new(numbering, false)),
            Strategy::SplitVariables => Box::new(CombinedBuilder::new(numbering, true)),
        }
    }

    /// Encode `info` into a copy of `map`.
    ///
    /// The copy holds the fields of this codec's strategy, has the fields of
    /// every other strategy removed, and has `names` extended by the strings
    /// it did not hold yet. Every other field of `map` is kept.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if `info` breaks an invariant of the model, such
    /// as children out of order, a range referring to a scope outside of
    /// `info`, or bindings that do not cover their range.
    pub fn encode(&self, info: &ScopeInfo, map: &SourceMap) -> Result<SourceMap, Error> {
        let mut names = NameTable::from_names(map.names.clone().unwrap_or_default());
        let existing = names.len();

        let mut builder = self.builder();
        walk(info, builder.as_mut(), &mut names)?;

        let mut map = map.clone();
        map.clear_scope_fields();
        builder.build(&mut map);
        debug!(
            codec = self.name(),
            scopes = info.scopes.len(),
            ranges = info.ranges.len(),
            names = names.len() - existing,
            "encoded scope info"
        );
        map.names = Some(names.into_names());

        Ok(map)
    }

    /// Decode the scope info stored in `map`.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] of kind `MissingFields` when `map` lacks `names`
    /// or the strategy's fields, and an error describing the first malformed
    /// item otherwise.
    pub fn decode(&self, map: &SourceMap) -> Result<ScopeInfo, Error> {
        let names = map
            .names
            .clone()
            .map(NameTable::from_names)
            .ok_or_else(|| error_missing_field("names"))?;
        let numbering = self.numbering;

        let info = match self.strategy {
            Strategy::InlineFlags => assemble(InlineReader::new(map, numbering, false)?, &names),
            Strategy::LengthPrefixed => assemble(InlineReader::new(map, numbering, true)?, &names),
            Strategy::TagSplit => assemble(SplitReader::new(map, numbering)?, &names),
            Strategy::TagCombined => assemble(CombinedReader::new(map, numbering, false)?, &names),
            Strategy::SplitVariables => assemble(CombinedReader::new(map, numbering, true)?, &names),
        }?;
        debug!(
            codec = self.name(),
            scopes = info.scopes.len(),
            ranges = info.ranges.len(),
            "decoded scope info"
        );

        Ok(info)
    }

    /// Encode `info`, decode the result and check that nothing was lost.
    ///
    /// # Errors
    ///
    /// Returns the error of `encode` or `decode`, or an [`Error`] of kind
    /// `RoundTripMismatch` when the decoded info differs from `info`.
    pub fn verify(&self, info: &ScopeInfo, map: &SourceMap) -> Result<SourceMap, Error> {
        let encoded = self.encode(info, map)?;
        let decoded = self.decode(&encoded)?;
        if decoded != *info {
            let error = Error::build(
                ErrorKind::RoundTripMismatch,
                format!("{} did not reproduce the scope info", self.name()),
            );
            return Err(if has_single_segment(&info.ranges) {
                error.with_help("a single-segment binding decodes as a bare value")
            } else {
                error
            });
        }

        Ok(encoded)
    }
}

/// Return true if any range in the trees holds a [`Binding::Ranges`] with
/// exactly one segment.
fn has_single_segment(ranges: &[GeneratedRange]) -> bool {
    ranges.iter().any(|range| {
        range
            .values
            .iter()
            .any(|value| matches!(value, Binding::Ranges(segments) if segments.len() == 1))
            || has_single_segment(&range.children)
    })
}

impl Display for Codec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
