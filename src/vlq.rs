//! Base64 variable-length quantities.
//!
//! A number is split into 5-bit digits, least significant first. Each digit
//! is written as one character of the base64 alphabet, and every digit except
//! the last has its continuation bit (32) set.
//!
//! Signed numbers keep their sign in the lowest bit, so that small numbers of
//! either polarity cost the fewest digits:
//!
//! ```
//! use scopemap::vlq::{encode_signed, encode_unsigned, Cursor};
//!
//! assert_eq!(encode_signed(-1), "D");
//! assert_eq!(encode_unsigned(16), "Q");
//! assert_eq!(encode_signed(16), "gB");
//!
//! let mut cursor = Cursor::new("DgB");
//! assert_eq!(cursor.next_signed().unwrap(), -1);
//! assert_eq!(cursor.next_signed().unwrap(), 16);
//! assert!(!cursor.has_more());
//! ```
use crate::log::{error_character, error_eof, error_overflow, Error};

/// The 64 characters used as digits, in digit order.
pub const BASE64_CHARS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const VLQ_BASE_SHIFT: u32 = 5;
const VLQ_BASE_MASK: u128 = 0x1f;
const VLQ_CONTINUATION_BIT: u8 = 0x20;
/// Seventy bits hold every signed and unsigned 64-bit value plus the sign.
const VLQ_MAX_SHIFT: u32 = 70;

/// How fields that can never be negative are written.
///
/// `Signed` writes every number as a signed VLQ, which is what the scopes
/// proposal does today. `Unsigned` spends the sign bit on magnitude for
/// fields that are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Numbering {
    /// Every number is written as a signed VLQ.
    #[default]
    Signed,
    /// Non-negative fields are written as unsigned VLQs.
    Unsigned,
}

impl Numbering {
    /// Write a non-negative field.
    pub(crate) fn write_unsigned(self, out: &mut String, n: u64) {
        match self {
            Numbering::Signed => write_raw(out, u128::from(n) << 1),
            Numbering::Unsigned => write_raw(out, u128::from(n)),
        }
    }
}

/// Encode a signed number.
pub fn encode_signed(n: i64) -> String {
    let mut out = String::new();
    write_signed(&mut out, n);

    out
}

/// Encode a non-negative number without a sign bit.
pub fn encode_unsigned(n: u64) -> String {
    let mut out = String::new();
    write_raw(&mut out, u128::from(n));

    out
}

/// Append a signed number to `out`.
pub(crate) fn write_signed(out: &mut String, n: i64) {
    let raw = (u128::from(n.unsigned_abs()) << 1) | u128::from(n < 0);
    write_raw(out, raw);
}

fn write_raw(out: &mut String, mut raw: u128) {
    loop {
        let digit = (raw & VLQ_BASE_MASK) as usize;
        raw >>= VLQ_BASE_SHIFT;
        if raw == 0 {
            out.push(BASE64_CHARS[digit] as char);
            break;
        }
        out.push(BASE64_CHARS[digit | VLQ_CONTINUATION_BIT as usize] as char);
    }
}

/// Return the digit value of a base64 character.
fn decode_digit(byte: u8) -> Option<u8> {
    match byte {
        b'A'..=b'Z' => Some(byte - b'A'),
        b'a'..=b'z' => Some(byte - b'a' + 26),
        b'0'..=b'9' => Some(byte - b'0' + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

/// One number of an item, tagged with how it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Number {
    Signed(i64),
    Unsigned(u64),
}

/// The numbers that make up one item, in emission order.
///
/// Collecting an item before writing it lets length-prefixed framings emit
/// the token count ahead of the tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Fields {
    numbers: Vec<Number>,
}

impl Fields {
    /// Create an empty list of fields.
    #[inline]
    pub fn new() -> Self {
        Self { numbers: vec![] }
    }

    /// Push a number that may be negative.
    pub fn signed(&mut self, n: i64) -> &mut Self {
        self.numbers.push(Number::Signed(n));

        self
    }

    /// Push a number that is never negative.
    pub fn unsigned(&mut self, n: u64) -> &mut Self {
        self.numbers.push(Number::Unsigned(n));

        self
    }

    /// Return the number of tokens in the item.
    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    /// Write every number to `out`.
    pub fn write(&self, out: &mut String, numbering: Numbering) {
        for number in &self.numbers {
            match *number {
                Number::Signed(n) => write_signed(out, n),
                Number::Unsigned(n) => numbering.write_unsigned(out, n),
            }
        }
    }
}

/// Reads numbers from a token stream.
#[derive(Debug, Clone)]
pub struct Cursor<'source> {
    /// Reference to the token stream.
    source: &'source str,
    /// Byte position within the token stream.
    position: usize,
    /// How non-negative fields were written.
    numbering: Numbering,
    /// Count of numbers read so far.
    consumed: usize,
}

impl<'source> Cursor<'source> {
    /// Create a new [`Cursor`] that reads non-negative fields as unsigned VLQs.
    ///
    /// This is the plain base64 VLQ reading, unlike [`Numbering::default`]
    /// which follows the scope codecs. Use [`Cursor::with_numbering`] to read
    /// a stream written by a [`Codec`](crate::Codec).
    #[inline]
    pub fn new(source: &'source str) -> Self {
        Self::with_numbering(source, Numbering::Unsigned)
    }

    /// Create a new [`Cursor`] that reads non-negative fields according to
    /// the given [`Numbering`].
    #[inline]
    pub fn with_numbering(source: &'source str, numbering: Numbering) -> Self {
        Self {
            source,
            position: 0,
            numbering,
            consumed: 0,
        }
    }

    /// Return true if there are characters left to read.
    #[inline]
    pub fn has_more(&self) -> bool {
        self.position < self.source.len()
    }

    /// Return the byte position of the next character.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Return the count of numbers read so far.
    #[inline]
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Return the token stream this cursor reads from.
    #[inline]
    pub fn source(&self) -> &'source str {
        self.source
    }

    /// Read the next signed number.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the stream ends inside a number, a character
    /// outside of the alphabet is found, or the number does not fit an `i64`.
    pub fn next_signed(&mut self) -> Result<i64, Error> {
        let begin = self.position;
        let raw = self.next_raw()?;
        let magnitude = (raw >> 1) as i128;
        let value = if raw & 1 == 1 { -magnitude } else { magnitude };

        i64::try_from(value).map_err(|_| error_overflow(self.source, begin..self.position))
    }

    /// Read the next non-negative number.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] for the same reasons as [`Cursor::next_signed`],
    /// and when a signed field holds a negative number.
    pub fn next_unsigned(&mut self) -> Result<u64, Error> {
        let begin = self.position;
        let raw = self.next_raw()?;
        let value = match self.numbering {
            Numbering::Unsigned => raw,
            // Negative zero is tolerated, any other negative is not.
            Numbering::Signed if raw & 1 == 1 && raw > 1 => {
                return Err(error_overflow(self.source, begin..self.position)
                    .with_help("a field that is never negative holds a negative number"));
            }
            Numbering::Signed => raw >> 1,
        };

        u64::try_from(value).map_err(|_| error_overflow(self.source, begin..self.position))
    }

    /// Read the next non-negative number and narrow it to a `u32`.
    pub(crate) fn next_u32(&mut self) -> Result<u32, Error> {
        let begin = self.position;
        let value = self.next_unsigned()?;

        u32::try_from(value).map_err(|_| error_overflow(self.source, begin..self.position))
    }

    /// Read and discard `count` numbers.
    pub fn skip(&mut self, count: usize) -> Result<(), Error> {
        for _ in 0..count {
            self.next_raw()?;
        }

        Ok(())
    }

    /// Peek at the next non-negative number without advancing.
    pub(crate) fn peek_unsigned(&self) -> Option<u64> {
        self.clone().next_unsigned().ok()
    }

    fn next_raw(&mut self) -> Result<u128, Error> {
        let begin = self.position;
        let bytes = self.source.as_bytes();
        let mut result: u128 = 0;
        let mut shift = 0;

        loop {
            let Some(&byte) = bytes.get(self.position) else {
                return Err(error_eof(self.source));
            };
            let Some(digit) = decode_digit(byte) else {
                // Only ASCII digits advance the cursor, so the position is
                // always a char boundary.
                let char = self.source[self.position..].chars().next().unwrap_or('?');
                return Err(error_character(self.source, self.position, char));
            };
            self.position += 1;

            if shift >= VLQ_MAX_SHIFT {
                return Err(error_overflow(self.source, begin..self.position));
            }
            result |= (u128::from(digit) & VLQ_BASE_MASK) << shift;
            shift += VLQ_BASE_SHIFT;

            if digit & VLQ_CONTINUATION_BIT == 0 {
                break;
            }
        }
        self.consumed += 1;

        Ok(result)
    }
}
