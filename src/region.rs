use std::ops::{Index, Range};

/// Represents an area within a token stream.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub struct Region {
    /// The beginning of the range, inclusive.
    pub begin: usize,
    /// The ending of the range, exclusive.
    pub end: usize,
}

impl Region {
    /// Create a new Region from the given range.
    pub fn new(position: Range<usize>) -> Self {
        Self {
            begin: position.start,
            end: position.end,
        }
    }

    /// Access the literal text of a [`Region`].
    ///
    /// Returns an empty string if the `Region` is out of bounds in the given
    /// token stream.
    pub fn literal<'source>(&self, source: &'source str) -> &'source str {
        source.get(self.begin..self.end).unwrap_or_default()
    }
}

impl Index<Region> for str {
    type Output = str;

    fn index(&self, region: Region) -> &Self::Output {
        let Region { begin, end } = region;

        &self[begin..end]
    }
}

impl From<Range<usize>> for Region {
    fn from(value: Range<usize>) -> Self {
        Self {
            begin: value.start,
            end: value.end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal() {
        let source = "AAgCACAA";
        let region = Region::new(2..4);

        assert_eq!(region.literal(source), "gC");
        assert_eq!(&source[region], "gC");
    }

    #[test]
    fn test_out_of_bounds_literal() {
        let source = "AAgC";
        let region = Region::new(2..7);

        assert_eq!(region.literal(source), "");
    }
}
