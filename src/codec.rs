//! Percent-escape codec for the line protocol.
//!
//! Command and response tokens escape reserved bytes as `%XX` (two hex
//! digits); a decoded escape maps to the character with that code point.
//! Everything here is a pure function: no I/O, no state.

use std::collections::HashMap;

use thiserror::Error;

/// Key/value fields extracted from a decoded response or status line.
pub type FieldMap = HashMap<String, String>;

/// Errors from percent-escape decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// A `%` followed by fewer than two characters, or by non-hex digits.
    #[error("malformed percent escape at byte {position}")]
    MalformedEscape {
        /// Byte offset of the `%` that started the bad escape.
        position: usize,
    },
}

/// Convenient Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Decodes a percent-escaped token.
///
/// Scans left to right: a `%` consumes the next two characters as a
/// base-16 byte value and appends the corresponding character; everything
/// else is copied through. Total over well-formed input.
pub fn decode(s: &str) -> CodecResult<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.char_indices();

    while let Some((position, c)) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let hi = chars.next().and_then(|(_, c)| c.to_digit(16));
        let lo = chars.next().and_then(|(_, c)| c.to_digit(16));
        match (hi, lo) {
            (Some(hi), Some(lo)) => out.push(char::from((hi * 16 + lo) as u8)),
            _ => return Err(CodecError::MalformedEscape { position }),
        }
    }

    Ok(out)
}

/// Escapes the characters the protocol reserves.
///
/// Inverse of [`decode`] for the reserved set: space and line terminators
/// (token and line separators), `:` (field separator), and `%` itself.
/// Other characters pass through unchanged, so `decode(encode(s)) == s`.
#[must_use]
pub fn encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            ' ' | ':' | '%' | '\n' | '\r' => {
                out.push('%');
                out.push_str(&format!("{:02X}", c as u32));
            }
            _ => out.push(c),
        }
    }
    out
}

/// Builds a [`FieldMap`] from decoded tokens of the form `key:value`.
///
/// Tokens without a `:` are skipped; the split is at the first `:`, so
/// values may themselves contain colons. Duplicate keys keep the last
/// value.
#[must_use]
pub fn fields_from_tokens<S: AsRef<str>>(tokens: &[S]) -> FieldMap {
    let mut fields = FieldMap::new();
    for token in tokens {
        if let Some((key, value)) = token.as_ref().split_once(':') {
            fields.insert(key.to_string(), value.to_string());
        }
    }
    fields
}
