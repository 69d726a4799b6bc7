//! Encoding descriptors.
//!
//! Every encoding in the catalog is ASCII compatible: bytes below 0x80 are
//! the ASCII characters they name. Legacy multi-byte and code page encodings
//! delegate to `encoding_rs`.

use std::fmt;

use crate::{EncodingErrorKind, RubyError, RubyResult};

#[derive(Debug)]
enum Codec {
    /// Raw bytes, read as Latin-1 when characters are needed.
    Binary,
    Ascii,
    Utf8,
    Legacy(&'static encoding_rs::Encoding),
}

#[derive(Debug)]
pub struct Encoding {
    name: &'static str,
    aliases: &'static [&'static str],
    codec: Codec,
    max_bytes_per_char: usize,
    basic_plane: bool,
    ordinal: u16,
}

pub type EncodingRef = &'static Encoding;

/// One decoded unit of a byte sequence: either a character with the bytes
/// that spell it, or a run of bytes that is not valid in the encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Character<'a> {
    Valid { value: char, bytes: &'a [u8] },
    Invalid(&'a [u8]),
}

pub struct Characters<'a> {
    encoding: EncodingRef,
    rest: &'a [u8],
}

pub static BINARY: Encoding = Encoding {
    name: "ASCII-8BIT",
    aliases: &["BINARY"],
    codec: Codec::Binary,
    max_bytes_per_char: 1,
    basic_plane: true,
    ordinal: 0,
};

pub static US_ASCII: Encoding = Encoding {
    name: "US-ASCII",
    aliases: &["ASCII", "ANSI_X3.4-1968", "646"],
    codec: Codec::Ascii,
    max_bytes_per_char: 1,
    basic_plane: true,
    ordinal: 1,
};

pub static UTF_8: Encoding = Encoding {
    name: "UTF-8",
    aliases: &["CP65001", "UTF8"],
    codec: Codec::Utf8,
    max_bytes_per_char: 4,
    basic_plane: false,
    ordinal: 2,
};

pub static SHIFT_JIS: Encoding = Encoding {
    name: "Shift_JIS",
    aliases: &["SJIS", "CP932", "Windows-31J"],
    codec: Codec::Legacy(&encoding_rs::SHIFT_JIS_INIT),
    max_bytes_per_char: 2,
    basic_plane: true,
    ordinal: 3,
};

pub static EUC_JP: Encoding = Encoding {
    name: "EUC-JP",
    aliases: &["eucJP"],
    codec: Codec::Legacy(&encoding_rs::EUC_JP_INIT),
    max_bytes_per_char: 3,
    basic_plane: true,
    ordinal: 4,
};

pub static EUC_KR: Encoding = Encoding {
    name: "EUC-KR",
    aliases: &["eucKR", "CP949"],
    codec: Codec::Legacy(&encoding_rs::EUC_KR_INIT),
    max_bytes_per_char: 2,
    basic_plane: true,
    ordinal: 5,
};

pub static GBK: Encoding = Encoding {
    name: "GBK",
    aliases: &["CP936", "GB18030"],
    codec: Codec::Legacy(&encoding_rs::GBK_INIT),
    max_bytes_per_char: 4,
    basic_plane: false,
    ordinal: 6,
};

pub static BIG5: Encoding = Encoding {
    name: "Big5",
    aliases: &["CP950", "Big5-HKSCS"],
    codec: Codec::Legacy(&encoding_rs::BIG5_INIT),
    max_bytes_per_char: 2,
    basic_plane: false,
    ordinal: 7,
};

pub static WINDOWS_1252: Encoding = Encoding {
    name: "Windows-1252",
    aliases: &["CP1252"],
    codec: Codec::Legacy(&encoding_rs::WINDOWS_1252_INIT),
    max_bytes_per_char: 1,
    basic_plane: true,
    ordinal: 8,
};

pub static WINDOWS_1251: Encoding = Encoding {
    name: "Windows-1251",
    aliases: &["CP1251"],
    codec: Codec::Legacy(&encoding_rs::WINDOWS_1251_INIT),
    max_bytes_per_char: 1,
    basic_plane: true,
    ordinal: 9,
};

pub static ISO_8859_2: Encoding = Encoding {
    name: "ISO-8859-2",
    aliases: &["ISO8859-2", "Latin2"],
    codec: Codec::Legacy(&encoding_rs::ISO_8859_2_INIT),
    max_bytes_per_char: 1,
    basic_plane: true,
    ordinal: 10,
};

pub static KOI8_R: Encoding = Encoding {
    name: "KOI8-R",
    aliases: &["CP878"],
    codec: Codec::Legacy(&encoding_rs::KOI8_R_INIT),
    max_bytes_per_char: 1,
    basic_plane: true,
    ordinal: 11,
};

pub static ENCODINGS: [EncodingRef; 12] = [
    &BINARY,
    &US_ASCII,
    &UTF_8,
    &SHIFT_JIS,
    &EUC_JP,
    &EUC_KR,
    &GBK,
    &BIG5,
    &WINDOWS_1252,
    &WINDOWS_1251,
    &ISO_8859_2,
    &KOI8_R,
];

/// Looks an encoding up by name or alias, ignoring case.
pub fn find(name: &str) -> Option<EncodingRef> {
    ENCODINGS.iter().copied().find(|encoding| {
        encoding.name.eq_ignore_ascii_case(name)
            || encoding
                .aliases
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(name))
    })
}

pub fn require(name: &str) -> RubyResult<EncodingRef> {
    find(name).ok_or_else(|| {
        RubyError::argument(format!("unknown encoding name - {name}"))
    })
}

/// Resolves both ends of a conversion.
pub fn converter(
    from: &str,
    to: &str,
) -> RubyResult<(EncodingRef, EncodingRef)> {
    match (find(from), find(to)) {
        (Some(from), Some(to)) => Ok((from, to)),
        _ => Err(RubyError::encoding(
            EncodingErrorKind::ConverterNotFound,
            format!("code converter not found ({from} to {to})"),
        )),
    }
}

pub(crate) fn escape_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("\\x{b:02X}")).collect()
}

impl Encoding {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn aliases(&self) -> &'static [&'static str] {
        self.aliases
    }

    pub fn max_bytes_per_char(&self) -> usize {
        self.max_bytes_per_char
    }

    pub fn is_single_byte(&self) -> bool {
        self.max_bytes_per_char == 1
    }

    pub fn is_binary(&self) -> bool {
        matches!(self.codec, Codec::Binary)
    }

    pub fn is_utf8(&self) -> bool {
        matches!(self.codec, Codec::Utf8)
    }

    /// Every byte on its own is a valid character, so byte and character
    /// offsets coincide.
    pub fn decodes_every_byte(&self) -> bool {
        match self.codec {
            Codec::Binary => true,
            Codec::Legacy(_) => self.is_single_byte(),
            Codec::Ascii | Codec::Utf8 => false,
        }
    }

    /// No character of this encoding lies outside the basic multilingual
    /// plane.
    pub fn in_basic_plane(&self) -> bool {
        self.basic_plane
    }

    /// Position in the catalog; orders strings that differ only in their
    /// encoding.
    pub fn ordinal(&self) -> u16 {
        self.ordinal
    }

    pub fn characters<'a>(&'static self, bytes: &'a [u8]) -> Characters<'a> {
        Characters {
            encoding: self,
            rest: bytes,
        }
    }

    /// Decodes the first character of a non-empty byte sequence.
    pub fn decode_one<'a>(&self, bytes: &'a [u8]) -> Character<'a> {
        let first = bytes[0];
        if first < 0x80 {
            return Character::Valid {
                value: first as char,
                bytes: &bytes[..1],
            };
        }
        match self.codec {
            Codec::Binary => Character::Valid {
                value: first as char,
                bytes: &bytes[..1],
            },
            Codec::Ascii => Character::Invalid(&bytes[..1]),
            Codec::Utf8 => {
                let window = &bytes[..bytes.len().min(4)];
                let valid = match std::str::from_utf8(window) {
                    Ok(text) => text,
                    Err(err) if err.valid_up_to() > 0 => {
                        // the prefix was just validated
                        std::str::from_utf8(&window[..err.valid_up_to()])
                            .unwrap_or_default()
                    }
                    Err(err) => {
                        let len = err.error_len().unwrap_or(window.len());
                        return Character::Invalid(&bytes[..len]);
                    }
                };
                match valid.chars().next() {
                    Some(value) => Character::Valid {
                        value,
                        bytes: &bytes[..value.len_utf8()],
                    },
                    None => Character::Invalid(&bytes[..1]),
                }
            }
            Codec::Legacy(codec) => {
                let longest = bytes.len().min(self.max_bytes_per_char);
                for len in 1..=longest {
                    let Some(text) = codec
                        .decode_without_bom_handling_and_without_replacement(
                            &bytes[..len],
                        )
                    else {
                        continue;
                    };
                    let mut chars = text.chars();
                    if let (Some(value), None) = (chars.next(), chars.next()) {
                        return Character::Valid {
                            value,
                            bytes: &bytes[..len],
                        };
                    }
                }
                Character::Invalid(&bytes[..1])
            }
        }
    }

    /// Strict decode: any invalid sequence fails.
    pub fn decode(&'static self, bytes: &[u8]) -> RubyResult<Vec<char>> {
        match self.codec {
            Codec::Binary => Ok(bytes.iter().map(|&b| b as char).collect()),
            Codec::Utf8 => match std::str::from_utf8(bytes) {
                Ok(text) => Ok(text.chars().collect()),
                Err(_) => Err(self.invalid_sequence_error(bytes)),
            },
            // Per character, so sequences mapping to several code points
            // are rejected here as they are by `decode_one`.
            Codec::Legacy(_) => self
                .characters(bytes)
                .map(|ch| match ch {
                    Character::Valid { value, .. } => Ok(value),
                    Character::Invalid(_) => Err(self.invalid_sequence_error(bytes)),
                })
                .collect(),
            Codec::Ascii => {
                if bytes.is_ascii() {
                    Ok(bytes.iter().map(|&b| b as char).collect())
                } else {
                    Err(self.invalid_sequence_error(bytes))
                }
            }
        }
    }

    /// Encodes characters, failing on the first one without a mapping.
    pub fn encode(&self, chars: &[char]) -> RubyResult<Vec<u8>> {
        if chars.iter().all(char::is_ascii) {
            return Ok(chars.iter().map(|&c| c as u8).collect());
        }
        match self.codec {
            Codec::Binary => chars
                .iter()
                .map(|&c| u8::try_from(c).map_err(|_| self.undefined(c)))
                .collect(),
            Codec::Ascii => match chars.iter().find(|c| !c.is_ascii()) {
                Some(&c) => Err(self.undefined(c)),
                None => Ok(chars.iter().map(|&c| c as u8).collect()),
            },
            Codec::Utf8 => Ok(chars.iter().collect::<String>().into_bytes()),
            Codec::Legacy(codec) => {
                let text: String = chars.iter().collect();
                let (bytes, _, unmappable) = codec.encode(&text);
                if !unmappable {
                    return Ok(bytes.into_owned());
                }
                let mut buf = [0u8; 4];
                let bad = chars
                    .iter()
                    .copied()
                    .find(|c| codec.encode(c.encode_utf8(&mut buf)).2)
                    .unwrap_or(char::REPLACEMENT_CHARACTER);
                Err(self.undefined(bad))
            }
        }
    }

    pub fn encode_str(&self, text: &str) -> RubyResult<Vec<u8>> {
        if self.is_utf8() || text.is_ascii() {
            return Ok(text.as_bytes().to_vec());
        }
        self.encode(&text.chars().collect::<Vec<_>>())
    }

    pub fn encode_char(&self, c: char) -> RubyResult<Vec<u8>> {
        self.encode(&[c])
    }

    /// Number of bytes `c` takes in this encoding.
    pub fn encoded_len(&self, c: char) -> RubyResult<usize> {
        match self.codec {
            _ if c.is_ascii() => Ok(1),
            Codec::Utf8 => Ok(c.len_utf8()),
            _ => self.encode_char(c).map(|bytes| bytes.len()),
        }
    }

    pub(crate) fn undefined(&self, c: char) -> RubyError {
        RubyError::encoding(
            EncodingErrorKind::UndefinedConversion,
            format!("U+{:04X} from UTF-8 to {}", c as u32, self.name),
        )
    }

    pub(crate) fn invalid_sequence_error(&'static self, bytes: &[u8]) -> RubyError {
        let bad = self
            .characters(bytes)
            .find_map(|ch| match ch {
                Character::Invalid(run) => Some(run),
                Character::Valid { .. } => None,
            })
            .unwrap_or(bytes);
        RubyError::encoding(
            EncodingErrorKind::InvalidByteSequence,
            format!("\"{}\" on {}", escape_bytes(bad), self.name),
        )
    }
}

impl PartialEq for Encoding {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for Encoding {}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl<'a> Character<'a> {
    pub fn bytes(&self) -> &'a [u8] {
        match self {
            Self::Valid { bytes, .. } => bytes,
            Self::Invalid(bytes) => bytes,
        }
    }

    pub fn value(&self) -> Option<char> {
        match self {
            Self::Valid { value, .. } => Some(*value),
            Self::Invalid(_) => None,
        }
    }
}

impl<'a> Iterator for Characters<'a> {
    type Item = Character<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let ch = self.encoding.decode_one(self.rest);
        self.rest = &self.rest[ch.bytes().len()..];
        Some(ch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn find_resolves_names_and_aliases() {
        assert_eq!(find("utf-8"), Some(&UTF_8));
        assert_eq!(find("BINARY"), Some(&BINARY));
        assert_eq!(find("sjis"), Some(&SHIFT_JIS));
        assert_eq!(find("klingon"), None);
        assert!(matches!(
            require("klingon"),
            Err(RubyError::Argument(msg)) if msg == "unknown encoding name - klingon"
        ));
    }

    #[test]
    fn converter_requires_both_ends() {
        let err = converter("UTF-8", "EBCDIC").unwrap_err();
        assert_eq!(
            err.encoding_kind(),
            Some(EncodingErrorKind::ConverterNotFound)
        );
        assert_eq!(err.to_string(), "code converter not found (UTF-8 to EBCDIC)");
        assert!(converter("EUC-JP", "UTF-8").is_ok());
    }

    #[test]
    fn binary_is_latin1_transparent() {
        let chars = BINARY.decode(&[0x41, 0xE9, 0xFF]).unwrap();
        assert_eq!(chars, vec!['A', '\u{e9}', '\u{ff}']);
        assert_eq!(BINARY.encode(&chars).unwrap(), vec![0x41, 0xE9, 0xFF]);
        let err = BINARY.encode(&['\u{100}']).unwrap_err();
        assert_eq!(
            err.encoding_kind(),
            Some(EncodingErrorKind::UndefinedConversion)
        );
    }

    #[test]
    fn strict_decode_reports_the_bad_bytes() {
        let err = UTF_8.decode(b"ab\xFFcd").unwrap_err();
        assert_eq!(err.to_string(), "\"\\xFF\" on UTF-8");
        assert!(US_ASCII.decode(b"\x80").is_err());
        assert!(SHIFT_JIS.decode(b"\x82").is_err(), "truncated lead byte");
    }

    #[test]
    fn characters_split_valid_and_invalid_runs() {
        let units: Vec<_> = UTF_8.characters(b"a\xE3\x81\x82\xFFb").collect();
        assert_eq!(units.len(), 4);
        assert_eq!(units[1].value(), Some('\u{3042}'));
        assert_eq!(units[1].bytes().len(), 3);
        assert_eq!(units[2], Character::Invalid(b"\xFF"));
        assert_eq!(units[3].value(), Some('b'));
    }

    #[test]
    fn legacy_multibyte_characters() {
        // "あ" in Shift_JIS and EUC-JP
        let sjis: Vec<_> = SHIFT_JIS.characters(b"\x82\xA0x").collect();
        assert_eq!(sjis.len(), 2);
        assert_eq!(sjis[0].value(), Some('\u{3042}'));
        let euc = EUC_JP.decode(b"\xA4\xA2").unwrap();
        assert_eq!(euc, vec!['\u{3042}']);
        assert_eq!(EUC_JP.encode(&euc).unwrap(), b"\xA4\xA2".to_vec());
    }

    #[test]
    fn multi_code_point_sequence_is_invalid_everywhere() {
        // Big5-HKSCS 88 62 maps to two code points
        let pair = b"\x88\x62";
        assert!(matches!(BIG5.decode_one(pair), Character::Invalid(_)));
        let err = BIG5.decode(pair).unwrap_err();
        assert_eq!(err.to_string(), "\"\\x88\" on Big5");
        let string = crate::MutableString::from_bytes(pair.to_vec(), &BIG5);
        assert!(string.char_count().is_err());
        assert!(!string.is_valid_encoding());
        assert_eq!(string.character_count(), 2, "invalid byte, then 'b'");
    }

    #[test]
    fn legacy_unmappable_character_is_undefined() {
        let err = SHIFT_JIS.encode(&['\u{1F600}']).unwrap_err();
        assert_eq!(err.to_string(), "U+1F600 from UTF-8 to Shift_JIS");
    }

    #[test]
    fn encoded_len_per_codec() {
        assert_eq!(UTF_8.encoded_len('\u{e9}').unwrap(), 2);
        assert_eq!(BINARY.encoded_len('\u{e9}').unwrap(), 1);
        assert_eq!(SHIFT_JIS.encoded_len('\u{3042}').unwrap(), 2);
        assert!(US_ASCII.encoded_len('\u{e9}').is_err());
    }

    proptest! {
        #[test]
        fn utf8_round_trips(text in ".*") {
            let chars: Vec<char> = text.chars().collect();
            let bytes = UTF_8.encode(&chars).unwrap();
            prop_assert_eq!(UTF_8.decode(&bytes).unwrap(), chars);
        }

        #[test]
        fn binary_round_trips(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let chars = BINARY.decode(&bytes).unwrap();
            prop_assert_eq!(BINARY.encode(&chars).unwrap(), bytes);
        }

        #[test]
        fn characters_cover_every_byte(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            for encoding in ENCODINGS {
                let total: usize = encoding.characters(&bytes).map(|c| c.bytes().len()).sum();
                prop_assert_eq!(total, bytes.len());
            }
        }
    }
}
