use std::{cmp::Ordering, hash::Hasher, sync::Arc};

use crate::encoding::{Character, Characters, EncodingRef};
use crate::RubyResult;

/// Storage backing a [`crate::MutableString`].
#[derive(Debug, Clone)]
pub(crate) enum Content {
    /// Encoded bytes.
    Bytes(Vec<u8>),
    /// Decoded characters, the working form once text is edited.
    Chars(Vec<char>),
    /// Wrapped literal text, promoted to `Chars` on first write.
    Str(Arc<str>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    Binary,
    Characters,
    Literal,
}

/// A character, or a run of bytes that does not decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit<'a> {
    Char(char),
    Invalid(&'a [u8]),
}

pub enum Units<'a> {
    Bytes(Characters<'a>),
    Chars(std::slice::Iter<'a, char>),
    Str(std::str::Chars<'a>),
}

impl Content {
    pub fn representation(&self) -> Representation {
        match self {
            Self::Bytes(_) => Representation::Binary,
            Self::Chars(_) => Representation::Characters,
            Self::Str(_) => Representation::Literal,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Bytes(bytes) => bytes.is_empty(),
            Self::Chars(chars) => chars.is_empty(),
            Self::Str(text) => text.is_empty(),
        }
    }

    /// Empty content of the same kind, literals become characters.
    pub fn emptied(&self) -> Self {
        match self {
            Self::Bytes(_) => Self::Bytes(Vec::new()),
            Self::Chars(_) | Self::Str(_) => Self::Chars(Vec::new()),
        }
    }

    pub fn units<'a>(&'a self, encoding: EncodingRef) -> Units<'a> {
        match self {
            Self::Bytes(bytes) => Units::Bytes(encoding.characters(bytes)),
            Self::Chars(chars) => Units::Chars(chars.iter()),
            Self::Str(text) => Units::Str(text.chars()),
        }
    }

    pub fn is_ascii(&self) -> bool {
        match self {
            Self::Bytes(bytes) => bytes.is_ascii(),
            Self::Chars(chars) => chars.iter().all(char::is_ascii),
            Self::Str(text) => text.is_ascii(),
        }
    }

    /// Feeds the decoded characters to `hasher`. Every representation of
    /// the same text produces the same stream.
    pub fn hash_into(&self, encoding: EncodingRef, hasher: &mut impl Hasher) {
        for unit in self.units(encoding) {
            match unit {
                Unit::Char(c) => hasher.write_u32(c as u32),
                Unit::Invalid(run) => {
                    for &b in run {
                        hasher.write_u32(0x11_0000 + b as u32);
                    }
                }
            }
        }
    }
}

impl<'a> Iterator for Units<'a> {
    type Item = Unit<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Bytes(chars) => chars.next().map(|ch| match ch {
                Character::Valid { value, .. } => Unit::Char(value),
                Character::Invalid(run) => Unit::Invalid(run),
            }),
            Self::Chars(chars) => chars.next().copied().map(Unit::Char),
            Self::Str(chars) => chars.next().map(Unit::Char),
        }
    }
}

/// Byte offset of the `index`th character, `None` past the end.
/// Invalid runs count as one character.
pub(crate) fn byte_offset(
    bytes: &[u8],
    encoding: EncodingRef,
    index: usize,
) -> Option<usize> {
    if encoding.decodes_every_byte() {
        return (index <= bytes.len()).then_some(index);
    }
    let mut chars = encoding.characters(bytes);
    let mut offset = 0;
    for _ in 0..index {
        offset += chars.next()?.bytes().len();
    }
    Some(offset)
}

/// Byte range covering characters `start..start + count`, clipped to the
/// end of the content.
pub(crate) fn byte_range(
    bytes: &[u8],
    encoding: EncodingRef,
    start: usize,
    count: usize,
) -> Option<(usize, usize)> {
    let begin = byte_offset(bytes, encoding, start)?;
    if encoding.decodes_every_byte() {
        return Some((begin, begin + count.min(bytes.len() - begin)));
    }
    let len: usize = encoding
        .characters(&bytes[begin..])
        .take(count)
        .map(|ch| ch.bytes().len())
        .sum();
    Some((begin, begin + len))
}

/// Ordinal comparison of two contents sharing `encoding`.
///
/// Mixed pairs are handled once and mirrored, so each pair of
/// representations has exactly one implementation.
pub(crate) fn compare(
    left: &Content,
    right: &Content,
    encoding: EncodingRef,
) -> Ordering {
    use Content::*;
    match (left, right) {
        (Bytes(a), Bytes(b)) => a.cmp(b),
        (Chars(a), Chars(b)) => compare_chars(a, b, encoding),
        (Str(a), Str(b)) if encoding.is_utf8() => a.as_bytes().cmp(b.as_bytes()),
        (Str(a), Str(b)) => compare_chars(
            &a.chars().collect::<Vec<_>>(),
            &b.chars().collect::<Vec<_>>(),
            encoding,
        ),
        (Chars(a), Str(b)) => {
            compare_chars(a, &b.chars().collect::<Vec<_>>(), encoding)
        }
        (Str(_), Chars(_)) => compare(right, left, encoding).reverse(),
        (Bytes(a), Str(b)) if encoding.is_utf8() => {
            a.as_slice().cmp(b.as_bytes())
        }
        (Bytes(a), Str(b)) => {
            compare_bytes_chars(a, &b.chars().collect::<Vec<_>>(), encoding)
        }
        (Bytes(a), Chars(b)) => compare_bytes_chars(a, b, encoding),
        (Chars(_) | Str(_), Bytes(_)) => {
            compare(right, left, encoding).reverse()
        }
    }
}

/// Orders decoded text as its encoded bytes would be ordered. UTF-8 byte
/// order is code point order already.
fn compare_chars(a: &[char], b: &[char], encoding: EncodingRef) -> Ordering {
    if encoding.is_utf8() {
        return a.cmp(b);
    }
    match (encoding.encode(a), encoding.encode(b)) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

fn compare_bytes_chars(
    bytes: &[u8],
    chars: &[char],
    encoding: EncodingRef,
) -> Ordering {
    match encoding.encode(chars) {
        Ok(encoded) => bytes.cmp(&encoded),
        // unencodable text never equals decoded bytes
        Err(_) => {
            let decoded = encoding.characters(bytes).flat_map(|ch| {
                let code: Vec<u32> = match ch {
                    Character::Valid { value, .. } => vec![value as u32],
                    Character::Invalid(run) => {
                        run.iter().map(|&b| 0x11_0000 + b as u32).collect()
                    }
                };
                code
            });
            decoded.cmp(chars.iter().map(|&c| c as u32))
        }
    }
}

/// Concatenation of two contents sharing `encoding`. Bytes win over
/// characters so invalid sequences survive.
pub(crate) fn concat(
    left: &Content,
    right: &Content,
    encoding: EncodingRef,
) -> RubyResult<Content> {
    use Content::*;
    Ok(match (left, right) {
        (Bytes(a), Bytes(b)) => Bytes([a.as_slice(), b.as_slice()].concat()),
        (Bytes(a), Chars(b)) => Bytes([a.clone(), encoding.encode(b)?].concat()),
        (Bytes(a), Str(b)) => {
            Bytes([a.clone(), encoding.encode_str(b)?].concat())
        }
        (Chars(a), Bytes(b)) => Bytes([encoding.encode(a)?, b.clone()].concat()),
        (Str(a), Bytes(b)) => {
            Bytes([encoding.encode_str(a)?, b.clone()].concat())
        }
        (Chars(a), Chars(b)) => Chars([a.as_slice(), b.as_slice()].concat()),
        (Chars(a), Str(b)) => Chars(a.iter().copied().chain(b.chars()).collect()),
        (Str(a), Chars(b)) => Chars(a.chars().chain(b.iter().copied()).collect()),
        (Str(a), Str(b)) => Str(Arc::from(format!("{a}{b}"))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{BINARY, SHIFT_JIS, UTF_8};

    fn chars(text: &str) -> Content {
        Content::Chars(text.chars().collect())
    }

    #[test]
    fn compare_is_representation_independent() {
        let bytes = Content::Bytes("héllo".as_bytes().to_vec());
        let literal = Content::Str(Arc::from("héllo"));
        assert_eq!(compare(&bytes, &chars("héllo"), &UTF_8), Ordering::Equal);
        assert_eq!(compare(&chars("héllo"), &bytes, &UTF_8), Ordering::Equal);
        assert_eq!(compare(&literal, &bytes, &UTF_8), Ordering::Equal);
        assert_eq!(compare(&bytes, &chars("hz"), &UTF_8), Ordering::Greater);
        assert_eq!(compare(&chars("ha"), &bytes, &UTF_8), Ordering::Less);
    }

    #[test]
    fn legacy_compare_goes_through_the_encoder() {
        let bytes = Content::Bytes(b"\x82\xA0".to_vec());
        assert_eq!(
            compare(&bytes, &chars("\u{3042}"), &SHIFT_JIS),
            Ordering::Equal
        );
        assert_ne!(
            compare(&bytes, &chars("\u{1F600}"), &SHIFT_JIS),
            Ordering::Equal
        );
    }

    #[test]
    fn legacy_character_order_follows_bytes() {
        // U+03A9 is 83 B6 and U+3042 is 82 A0 in Shift_JIS
        let omega = chars("\u{3A9}");
        let hiragana = chars("\u{3042}");
        assert_eq!(compare(&omega, &hiragana, &SHIFT_JIS), Ordering::Greater);
        let omega_bytes = Content::Bytes(b"\x83\xB6".to_vec());
        assert_eq!(compare(&omega_bytes, &hiragana, &SHIFT_JIS), Ordering::Greater);
        let omega_literal = Content::Str(Arc::from("\u{3A9}"));
        assert_eq!(compare(&omega_literal, &hiragana, &SHIFT_JIS), Ordering::Greater);
        assert_eq!(compare(&omega, &hiragana, &UTF_8), Ordering::Less);
    }

    #[test]
    fn byte_range_counts_invalid_runs_once() {
        let bytes = b"a\xFF\xE3\x81\x82b";
        assert_eq!(byte_range(bytes, &UTF_8, 1, 2), Some((1, 5)));
        assert_eq!(byte_range(bytes, &UTF_8, 3, 10), Some((5, 6)));
        assert_eq!(byte_range(bytes, &UTF_8, 5, 1), None);
        assert_eq!(byte_range(bytes, &BINARY, 2, 100), Some((2, 6)));
    }

    #[test]
    fn concat_prefers_bytes() {
        let joined = concat(
            &Content::Bytes(vec![0xFF]),
            &chars("é"),
            &UTF_8,
        )
        .unwrap();
        match joined {
            Content::Bytes(bytes) => assert_eq!(bytes, vec![0xFF, 0xC3, 0xA9]),
            other => panic!("expected bytes, got {other:?}"),
        }
        assert!(matches!(
            concat(&chars("a"), &Content::Str(Arc::from("b")), &UTF_8),
            Ok(Content::Chars(_))
        ));
    }
}
