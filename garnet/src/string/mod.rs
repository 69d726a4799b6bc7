//! Encoding-aware mutable strings.
//!
//! A [`MutableString`] keeps its text either as encoded bytes, as decoded
//! characters, or as a wrapped literal, and moves between those forms on
//! demand. Character indices count decoded characters, with every run of
//! bytes that fails to decode counting as one character.

mod builder;
mod content;
mod flags;
mod inspect;
mod mutate;
mod search;
mod translate;

use std::{
    borrow::Cow,
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

pub use builder::MutableStringBuilder;
pub use content::{Representation, Unit, Units};
pub use flags::StringFlags;

use content::Content;
use flags::{FlagCell, HashCache};

use crate::encoding::{self, EncodingRef};
use crate::{EncodingErrorKind, RubyError, RubyResult};

#[derive(Debug, Clone)]
pub struct MutableString {
    content: Content,
    encoding: EncodingRef,
    flags: FlagCell,
    version: u64,
    hash: HashCache,
}

impl MutableString {
    fn from_content(content: Content, encoding: EncodingRef) -> Self {
        Self {
            content,
            encoding,
            flags: FlagCell::default(),
            version: 0,
            hash: HashCache::default(),
        }
    }

    /// An empty string. Binary strings start out as bytes, everything else
    /// as characters.
    pub fn new(encoding: EncodingRef) -> Self {
        Self::with_capacity(0, encoding)
    }

    pub fn with_capacity(capacity: usize, encoding: EncodingRef) -> Self {
        let content = if encoding.is_binary() {
            Content::Bytes(Vec::with_capacity(capacity))
        } else {
            Content::Chars(Vec::with_capacity(capacity))
        };
        let string = Self::from_content(content, encoding);
        string.learn_empty();
        string
    }

    /// Wraps literal text. The text is not copied until the string is first
    /// modified.
    pub fn literal(text: &str) -> Self {
        Self::from_content(Content::Str(Arc::from(text)), &encoding::UTF_8)
    }

    /// A literal in `encoding`. Non UTF-8 literals are encoded up front.
    pub fn literal_in(text: &str, encoding: EncodingRef) -> RubyResult<Self> {
        if encoding.is_utf8() {
            return Ok(Self::literal(text));
        }
        Ok(Self::from_bytes(encoding.encode_str(text)?, encoding))
    }

    pub fn from_bytes(bytes: Vec<u8>, encoding: EncodingRef) -> Self {
        let string = Self::from_content(Content::Bytes(bytes), encoding);
        if encoding.in_basic_plane() {
            string.learn_supplementary(false);
        }
        string
    }

    pub fn binary(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes, &encoding::BINARY)
    }

    pub fn from_chars(chars: Vec<char>, encoding: EncodingRef) -> Self {
        Self::from_content(Content::Chars(chars), encoding)
    }

    /// Copy carrying the same taint but never the frozen state.
    pub fn duplicate(&self) -> Self {
        let copy = self.clone();
        copy.flags.remove(StringFlags::FROZEN);
        copy
    }

    /// Empty string of the same encoding and taint.
    pub fn create_instance(&self) -> Self {
        let instance = Self::new(self.encoding);
        instance.taint_by(self);
        instance
    }

    pub fn encoding(&self) -> EncodingRef {
        self.encoding
    }

    pub fn representation(&self) -> Representation {
        self.content.representation()
    }

    pub fn is_binary_representation(&self) -> bool {
        self.representation() == Representation::Binary
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn flags(&self) -> StringFlags {
        self.flags.get()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn units(&self) -> Units<'_> {
        self.content.units(self.encoding)
    }

    // frozen / taint

    pub fn is_frozen(&self) -> bool {
        self.flags.contains(StringFlags::FROZEN)
    }

    pub fn freeze(&self) {
        self.flags.insert(StringFlags::FROZEN);
    }

    pub fn frozen(self) -> Self {
        self.freeze();
        self
    }

    pub fn require_not_frozen(&self) -> RubyResult<()> {
        if self.is_frozen() {
            return Err(RubyError::frozen("String"));
        }
        Ok(())
    }

    pub fn is_tainted(&self) -> bool {
        self.flags.contains(StringFlags::TAINTED)
    }

    pub fn set_tainted(&self, value: bool) {
        self.flags.set(StringFlags::TAINTED, value);
    }

    pub fn is_untrusted(&self) -> bool {
        self.flags.contains(StringFlags::UNTRUSTED)
    }

    pub fn set_untrusted(&self, value: bool) {
        self.flags.set(StringFlags::UNTRUSTED, value);
    }

    /// Picks up taint and untrust from `other`.
    pub fn taint_by(&self, other: &MutableString) -> &Self {
        self.flags
            .insert(other.flags.get() & StringFlags::TAINT_FLAGS);
        self
    }

    // cached properties

    fn learn_ascii(&self, value: bool) {
        self.flags
            .learn(StringFlags::ASCII_KNOWN, StringFlags::IS_ASCII, value);
    }

    fn learn_supplementary(&self, value: bool) {
        self.flags.learn(
            StringFlags::SUPPLEMENTARY_KNOWN,
            StringFlags::HAS_SUPPLEMENTARY,
            value,
        );
    }

    fn learn_empty(&self) {
        self.learn_ascii(true);
        self.learn_supplementary(false);
    }

    /// All bytes (or characters) are below 0x80.
    pub fn is_ascii(&self) -> bool {
        let flags = self.flags.get();
        if flags.contains(StringFlags::ASCII_KNOWN) {
            return flags.contains(StringFlags::IS_ASCII);
        }
        let value = self.content.is_ascii();
        self.learn_ascii(value);
        value
    }

    pub fn knows_ascii(&self) -> bool {
        self.flags.contains(StringFlags::ASCII_KNOWN)
    }

    /// Some character lies outside the basic multilingual plane.
    pub fn has_supplementary_chars(&self) -> bool {
        let flags = self.flags.get();
        if flags.contains(StringFlags::SUPPLEMENTARY_KNOWN) {
            return flags.contains(StringFlags::HAS_SUPPLEMENTARY);
        }
        let value = self.units().any(|unit| match unit {
            Unit::Char(c) => c > '\u{FFFF}',
            Unit::Invalid(_) => false,
        });
        self.learn_supplementary(value);
        value
    }

    // change tracking, called after a mutation succeeded

    fn changed(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    /// Anything may have changed.
    fn changed_unknown(&mut self) {
        self.changed();
        self.flags
            .forget(StringFlags::ASCII_KNOWN, StringFlags::IS_ASCII);
        self.forget_supplementary();
    }

    fn forget_supplementary(&mut self) {
        if self.is_binary_representation() && self.encoding.in_basic_plane() {
            self.learn_supplementary(false);
        } else {
            self.flags.forget(
                StringFlags::SUPPLEMENTARY_KNOWN,
                StringFlags::HAS_SUPPLEMENTARY,
            );
        }
    }

    /// One character was added.
    fn changed_char(&mut self, c: char) {
        self.changed();
        self.note_char(c);
    }

    /// One character was overwritten with `c`.
    fn changed_replace(&mut self, c: char) {
        self.changed_remove();
        self.note_char(c);
    }

    fn note_char(&mut self, c: char) {
        if !c.is_ascii() {
            self.learn_ascii(false);
        }
        if c > '\u{FFFF}' {
            self.learn_supplementary(true);
        } else if self.is_binary_representation() {
            self.forget_supplementary();
        }
    }

    /// A run of text of known asciiness was added. An ascii run keeps
    /// whatever was known about asciiness.
    fn changed_run(&mut self, ascii: bool) {
        self.changed();
        if !ascii {
            self.learn_ascii(false);
            self.forget_supplementary();
        } else if self.is_binary_representation() {
            self.forget_supplementary();
        }
    }

    /// Text was removed: an ascii string stays ascii.
    fn changed_remove(&mut self) {
        self.changed();
        let flags = self.flags.get();
        if !flags.contains(StringFlags::ASCII_KNOWN | StringFlags::IS_ASCII) {
            self.flags
                .forget(StringFlags::ASCII_KNOWN, StringFlags::IS_ASCII);
        }
        let known_none = flags.contains(StringFlags::SUPPLEMENTARY_KNOWN)
            && !flags.contains(StringFlags::HAS_SUPPLEMENTARY);
        if !known_none || self.is_binary_representation() {
            self.forget_supplementary();
        }
    }

    // representation switching

    /// Encodes the content into bytes.
    pub fn switch_to_bytes(&mut self) -> RubyResult<()> {
        let bytes = match &self.content {
            Content::Bytes(_) => return Ok(()),
            Content::Chars(chars) => self.encoding.encode(chars)?,
            Content::Str(text) => self.encoding.encode_str(text)?,
        };
        log::trace!("string switched to bytes ({} bytes)", bytes.len());
        self.content = Content::Bytes(bytes);
        Ok(())
    }

    /// Decodes the content into characters. Fails on invalid bytes.
    pub fn switch_to_chars(&mut self) -> RubyResult<()> {
        let chars = match &self.content {
            Content::Chars(_) => return Ok(()),
            Content::Bytes(bytes) => self.encoding.decode(bytes)?,
            Content::Str(text) => text.chars().collect(),
        };
        log::trace!("string switched to characters ({} chars)", chars.len());
        self.content = Content::Chars(chars);
        Ok(())
    }

    /// Makes character indexing direct.
    pub fn prepare_for_character_read(&mut self) -> RubyResult<()> {
        match self.content {
            Content::Bytes(_) if !self.encoding.decodes_every_byte() => {
                self.switch_to_chars()
            }
            _ => Ok(()),
        }
    }

    /// Makes character writes direct, promoting literals.
    pub fn prepare_for_character_write(&mut self) -> RubyResult<()> {
        match self.content {
            Content::Bytes(_) if self.encoding.decodes_every_byte() => Ok(()),
            _ => self.switch_to_chars(),
        }
    }

    pub(crate) fn chars_mut(&mut self) -> RubyResult<&mut Vec<char>> {
        self.switch_to_chars()?;
        match &mut self.content {
            Content::Chars(chars) => Ok(chars),
            Content::Bytes(_) | Content::Str(_) => unreachable!(),
        }
    }

    pub(crate) fn bytes_mut(&mut self) -> RubyResult<&mut Vec<u8>> {
        self.switch_to_bytes()?;
        match &mut self.content {
            Content::Bytes(bytes) => Ok(bytes),
            Content::Chars(_) | Content::Str(_) => unreachable!(),
        }
    }

    // reads

    /// Encoded bytes, borrowed when no conversion is needed.
    pub fn bytes(&self) -> RubyResult<Cow<'_, [u8]>> {
        Ok(match &self.content {
            Content::Bytes(bytes) => Cow::Borrowed(bytes.as_slice()),
            Content::Str(text) if self.encoding.is_utf8() || text.is_ascii() => {
                Cow::Borrowed(text.as_bytes())
            }
            Content::Str(text) => Cow::Owned(self.encoding.encode_str(text)?),
            Content::Chars(chars) => Cow::Owned(self.encoding.encode(chars)?),
        })
    }

    /// Decoded characters, borrowed when already decoded.
    pub fn chars(&self) -> RubyResult<Cow<'_, [char]>> {
        Ok(match &self.content {
            Content::Chars(chars) => Cow::Borrowed(chars.as_slice()),
            Content::Str(text) => Cow::Owned(text.chars().collect()),
            Content::Bytes(bytes) => Cow::Owned(self.encoding.decode(bytes)?),
        })
    }

    pub fn to_bytes(&self) -> RubyResult<Vec<u8>> {
        self.bytes().map(Cow::into_owned)
    }

    pub fn to_chars(&self) -> RubyResult<Vec<char>> {
        self.chars().map(Cow::into_owned)
    }

    /// Text with invalid byte runs replaced by U+FFFD.
    pub fn to_string_lossy(&self) -> String {
        if let Content::Str(text) = &self.content {
            return text.to_string();
        }
        self.units()
            .map(|unit| match unit {
                Unit::Char(c) => c,
                Unit::Invalid(_) => char::REPLACEMENT_CHARACTER,
            })
            .collect()
    }

    /// Number of characters. Fails when the bytes do not decode.
    pub fn char_count(&self) -> RubyResult<usize> {
        match &self.content {
            Content::Chars(chars) => Ok(chars.len()),
            Content::Str(text) if text.is_ascii() => Ok(text.len()),
            Content::Str(text) => Ok(text.chars().count()),
            Content::Bytes(bytes) if self.encoding.decodes_every_byte() => {
                Ok(bytes.len())
            }
            Content::Bytes(bytes) => {
                let mut count = 0;
                for unit in self.encoding.characters(bytes) {
                    if unit.value().is_none() {
                        return Err(self.encoding.invalid_sequence_error(bytes));
                    }
                    count += 1;
                }
                Ok(count)
            }
        }
    }

    /// Number of characters, counting each invalid byte run as one.
    pub fn character_count(&self) -> usize {
        match &self.content {
            Content::Chars(chars) => chars.len(),
            Content::Bytes(bytes) if self.encoding.decodes_every_byte() => {
                bytes.len()
            }
            _ => self.units().count(),
        }
    }

    pub fn byte_count(&self) -> RubyResult<usize> {
        match &self.content {
            Content::Bytes(bytes) => Ok(bytes.len()),
            Content::Str(text) if self.encoding.is_utf8() || text.is_ascii() => {
                Ok(text.len())
            }
            Content::Str(text) => text
                .chars()
                .map(|c| self.encoding.encoded_len(c))
                .sum(),
            Content::Chars(chars) => chars
                .iter()
                .map(|&c| self.encoding.encoded_len(c))
                .sum(),
        }
    }

    fn index_error(index: usize) -> RubyError {
        RubyError::index(format!("index {index} out of string"))
    }

    pub fn get_char(&self, index: usize) -> RubyResult<char> {
        let unit = match &self.content {
            Content::Chars(chars) => chars.get(index).copied().map(Unit::Char),
            Content::Str(text) if text.is_ascii() => {
                text.as_bytes().get(index).map(|&b| Unit::Char(b as char))
            }
            Content::Str(text) => text.chars().nth(index).map(Unit::Char),
            Content::Bytes(bytes) if self.encoding.decodes_every_byte() => {
                bytes.get(index).map(std::slice::from_ref).map(|byte| {
                    match self.encoding.decode_one(byte).value() {
                        Some(c) => Unit::Char(c),
                        None => Unit::Invalid(byte),
                    }
                })
            }
            Content::Bytes(_) => self.units().nth(index),
        };
        match unit {
            Some(Unit::Char(c)) => Ok(c),
            Some(Unit::Invalid(run)) => {
                Err(self.encoding.invalid_sequence_error(run))
            }
            None => Err(Self::index_error(index)),
        }
    }

    pub fn get_byte(&self, index: usize) -> RubyResult<u8> {
        match &self.content {
            Content::Bytes(bytes) => bytes.get(index).copied(),
            Content::Str(text) if self.encoding.is_utf8() || text.is_ascii() => {
                text.as_bytes().get(index).copied()
            }
            _ if self.encoding.is_single_byte() => {
                if index >= self.character_count() {
                    return Err(Self::index_error(index));
                }
                self.encoding.encode_char(self.get_char(index)?)?.first().copied()
            }
            _ => self.bytes()?.get(index).copied(),
        }
        .ok_or_else(|| Self::index_error(index))
    }

    pub fn first_char(&self) -> RubyResult<Option<char>> {
        if self.is_empty() {
            return Ok(None);
        }
        self.get_char(0).map(Some)
    }

    pub fn last_char(&self) -> RubyResult<Option<char>> {
        match self.character_count() {
            0 => Ok(None),
            len => self.get_char(len - 1).map(Some),
        }
    }

    /// Copy of characters `start..start + count`. Never fails: a start
    /// outside the string (negative included) yields an empty string and
    /// the count is clipped to what is available.
    pub fn get_slice(&self, start: isize, count: usize) -> MutableString {
        let len = self.character_count();
        let sliced = match usize::try_from(start) {
            Ok(start) if start < len => {
                let end = start + count.min(len - start);
                match &self.content {
                    Content::Chars(chars) => Content::Chars(chars[start..end].to_vec()),
                    Content::Str(text) => Content::Str(Arc::from(
                        text.chars()
                            .skip(start)
                            .take(end - start)
                            .collect::<String>(),
                    )),
                    Content::Bytes(bytes) => {
                        match content::byte_range(bytes, self.encoding, start, end - start) {
                            Some((from, to)) => Content::Bytes(bytes[from..to].to_vec()),
                            None => Content::Bytes(Vec::new()),
                        }
                    }
                }
            }
            _ => self.content.emptied(),
        };
        let slice = Self::from_content(sliced, self.encoding);
        if self.knows_ascii() && self.is_ascii() {
            slice.learn_ascii(true);
        }
        slice.taint_by(self);
        slice
    }

    /// Copy of bytes `start..start + count`, with the same tolerance as
    /// [`Self::get_slice`].
    pub fn get_byte_slice(
        &self,
        start: isize,
        count: usize,
    ) -> RubyResult<MutableString> {
        let bytes = self.bytes()?;
        let slice = match usize::try_from(start) {
            Ok(start) if start < bytes.len() => {
                bytes[start..start + count.min(bytes.len() - start)].to_vec()
            }
            _ => Vec::new(),
        };
        let slice = Self::from_bytes(slice, self.encoding);
        slice.taint_by(self);
        Ok(slice)
    }

    /// Every byte sequence decodes and every character encodes.
    pub fn is_valid_encoding(&self) -> bool {
        match &self.content {
            Content::Bytes(_) => {
                self.units().all(|unit| matches!(unit, Unit::Char(_)))
            }
            Content::Str(_) | Content::Chars(_) => self.bytes().is_ok(),
        }
    }

    // encodings

    /// Encoding the concatenation of `self` and `other` would have.
    pub fn compatible_encoding(&self, other: &MutableString) -> Option<EncodingRef> {
        if self.encoding == other.encoding || other.is_empty() {
            return Some(self.encoding);
        }
        if self.is_empty() {
            return Some(other.encoding);
        }
        if other.is_ascii() {
            return Some(self.encoding);
        }
        if self.is_ascii() {
            return Some(other.encoding);
        }
        None
    }

    pub fn require_compatible_encoding(
        &self,
        other: &MutableString,
    ) -> RubyResult<EncodingRef> {
        self.compatible_encoding(other).ok_or_else(|| {
            RubyError::encoding(
                EncodingErrorKind::Compatibility,
                format!(
                    "incompatible character encodings: {} and {}",
                    self.encoding, other.encoding
                ),
            )
        })
    }

    /// Relabels the string. Non-ascii characters are first encoded in the
    /// current encoding so the bytes stay the same.
    pub fn force_encoding(&mut self, encoding: EncodingRef) -> RubyResult<()> {
        self.require_not_frozen()?;
        if encoding == self.encoding {
            return Ok(());
        }
        if !self.is_binary_representation() && !self.is_ascii() {
            self.switch_to_bytes()?;
        }
        self.encoding = encoding;
        self.changed();
        self.forget_supplementary();
        Ok(())
    }

    /// Converts the text into `to`, keeping the representation kind.
    pub fn transcode(&mut self, to: EncodingRef) -> RubyResult<()> {
        self.require_not_frozen()?;
        if to == self.encoding {
            return Ok(());
        }
        let chars = self.to_chars()?;
        let bytes = to.encode(&chars)?;
        log::trace!("transcoding {} -> {}", self.encoding, to);
        self.content = match self.content {
            Content::Bytes(_) => Content::Bytes(bytes),
            Content::Chars(_) | Content::Str(_) => Content::Chars(chars),
        };
        self.encoding = to;
        self.changed();
        self.forget_supplementary();
        Ok(())
    }

    /// Transcoded copy.
    pub fn encoded(&self, to: EncodingRef) -> RubyResult<MutableString> {
        let mut copy = self.duplicate();
        copy.transcode(to)?;
        Ok(copy)
    }

    // comparison and hashing

    fn lossless_bytes(&self) -> Cow<'_, [u8]> {
        match self.bytes() {
            Ok(bytes) => bytes,
            Err(_) => Cow::Owned(self.to_string_lossy().into_bytes()),
        }
    }

    /// Ordinal comparison. Strings in different encodings compare by bytes
    /// unless both are ascii; equal bytes are then ordered by encoding.
    pub fn ordinal_compare(&self, other: &MutableString) -> Ordering {
        if self.encoding == other.encoding || (self.is_ascii() && other.is_ascii()) {
            return content::compare(&self.content, &other.content, self.encoding);
        }
        self.lossless_bytes()
            .cmp(&other.lossless_bytes())
            .then_with(|| self.encoding.ordinal().cmp(&other.encoding.ordinal()))
    }

    /// Content hash, identical for every representation of the same text.
    pub fn hash_code(&self) -> u64 {
        if let Some(hash) = self.hash.get(self.version) {
            return hash;
        }
        let mut hasher = ahash::AHasher::default();
        self.content.hash_into(self.encoding, &mut hasher);
        let hash = hasher.finish();
        self.hash.store(self.version, hash);
        hash
    }

    /// Concatenation of two strings as a new string.
    pub fn concat(&self, other: &MutableString) -> RubyResult<MutableString> {
        let encoding = self.require_compatible_encoding(other)?;
        let content = content::concat(&self.content, &other.content, encoding)?;
        let result = Self::from_content(content, encoding);
        result.taint_by(self).taint_by(other);
        Ok(result)
    }
}

impl PartialEq for MutableString {
    fn eq(&self, other: &Self) -> bool {
        let (left, right) = (self.flags.get(), other.flags.get());
        if left.contains(StringFlags::ASCII_KNOWN)
            && right.contains(StringFlags::ASCII_KNOWN)
            && left.contains(StringFlags::IS_ASCII)
                != right.contains(StringFlags::IS_ASCII)
        {
            return false;
        }
        self.ordinal_compare(other) == Ordering::Equal
    }
}

impl Eq for MutableString {}

impl PartialOrd for MutableString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MutableString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordinal_compare(other)
    }
}

impl Hash for MutableString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code());
    }
}

impl fmt::Display for MutableString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl From<&str> for MutableString {
    fn from(text: &str) -> Self {
        Self::literal(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{BINARY, SHIFT_JIS, US_ASCII, UTF_8};
    use proptest::prelude::*;

    fn chars(text: &str) -> MutableString {
        MutableString::from_chars(text.chars().collect(), &UTF_8)
    }

    fn bytes(text: &str) -> MutableString {
        MutableString::from_bytes(text.as_bytes().to_vec(), &UTF_8)
    }

    #[test]
    fn literal_promotes_on_first_write() {
        let mut s = MutableString::literal("abc");
        assert_eq!(s.representation(), Representation::Literal);
        s.append_char('d').unwrap();
        assert_eq!(s.representation(), Representation::Characters);
        assert_eq!(s.to_string(), "abcd");
    }

    #[test]
    fn counts_per_representation() {
        let s = bytes("héllo");
        assert_eq!(s.char_count().unwrap(), 5);
        assert_eq!(s.byte_count().unwrap(), 6);
        assert_eq!(chars("héllo").byte_count().unwrap(), 6);
        assert_eq!(MutableString::literal("héllo").char_count().unwrap(), 5);
    }

    #[test]
    fn char_count_rejects_invalid_bytes() {
        let s = MutableString::from_bytes(b"ab\xFF".to_vec(), &UTF_8);
        let err = s.char_count().unwrap_err();
        assert_eq!(
            err.encoding_kind(),
            Some(EncodingErrorKind::InvalidByteSequence)
        );
        assert_eq!(s.character_count(), 3);
        assert!(!s.is_valid_encoding());
    }

    #[test]
    fn indexed_access_is_bounds_checked() {
        let s = bytes("héllo");
        assert_eq!(s.get_char(1).unwrap(), 'é');
        assert_eq!(s.get_byte(1).unwrap(), 0xC3);
        assert!(matches!(s.get_char(5), Err(RubyError::Index(_))));
        assert!(matches!(s.get_byte(6), Err(RubyError::Index(_))));
        let c = chars("héllo");
        assert_eq!(c.get_byte(2).unwrap(), 0xA9);
        assert_eq!(
            c.get_char(9).unwrap_err().to_string(),
            "index 9 out of string"
        );
    }

    #[test]
    fn slice_is_out_of_range_tolerant() {
        let s = chars("hello");
        assert_eq!(s.get_slice(1, 3).to_string(), "ell");
        assert_eq!(s.get_slice(3, 100).to_string(), "lo");
        assert!(s.get_slice(5, 1).is_empty());
        assert!(s.get_slice(-1, 2).is_empty());
        assert!(s.get_slice(isize::MAX, usize::MAX).is_empty());
    }

    #[test]
    fn slice_copies_eagerly() {
        let mut s = chars("hello");
        let slice = s.get_slice(0, 2);
        s.set_char(0, 'j').unwrap();
        assert_eq!(slice.to_string(), "he");
    }

    #[test]
    fn byte_slices_of_multibyte_text() {
        let s = bytes("aé\u{3042}b");
        assert_eq!(s.get_slice(1, 2).to_string(), "é\u{3042}");
        assert!(s.get_slice(1, 2).is_binary_representation());
        assert_eq!(s.get_byte_slice(1, 2).unwrap().to_bytes().unwrap(), vec![0xC3, 0xA9]);
    }

    #[test]
    fn equal_text_hashes_equal_across_representations() {
        let a = bytes("hé");
        let b = chars("hé");
        let c = MutableString::literal("hé");
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.hash_code(), b.hash_code());
        assert_eq!(b.hash_code(), c.hash_code());
    }

    #[test]
    fn hash_is_recomputed_after_mutation() {
        let mut s = chars("ab");
        let before = s.hash_code();
        s.append_char('c').unwrap();
        assert_ne!(before, s.hash_code());
        assert_eq!(s.hash_code(), chars("abc").hash_code());
    }

    #[test]
    fn ascii_strings_compare_across_encodings() {
        let a = MutableString::literal("abc");
        let b = MutableString::from_bytes(b"abc".to_vec(), &US_ASCII);
        assert_eq!(a.ordinal_compare(&b), Ordering::Equal);
        assert_eq!(a.hash_code(), b.hash_code());
    }

    #[test]
    fn non_ascii_strings_in_different_encodings_differ() {
        let a = MutableString::from_bytes(vec![0xE9], &BINARY);
        let b = MutableString::from_bytes(vec![0xE9], &crate::encoding::WINDOWS_1252);
        assert_ne!(a, b);
        assert_eq!(a.ordinal_compare(&b), Ordering::Less);
    }

    #[test]
    fn ascii_flag_fast_rejects() {
        let a = chars("abc");
        let b = chars("abé");
        assert!(a.is_ascii());
        assert!(!b.is_ascii());
        assert_ne!(a, b);
    }

    #[test]
    fn ascii_flag_survives_ascii_appends() {
        let mut s = chars("abc");
        assert!(s.is_ascii());
        s.append_str("def").unwrap();
        assert!(s.knows_ascii(), "ascii run keeps the known flag");
        assert!(s.is_ascii());
        s.append_char('é').unwrap();
        assert!(s.knows_ascii());
        assert!(!s.is_ascii());
    }

    #[test]
    fn supplementary_flag() {
        let mut s = chars("a");
        assert!(!s.has_supplementary_chars());
        s.append_char('\u{1F600}').unwrap();
        assert!(s.has_supplementary_chars());
        let sjis = MutableString::from_bytes(b"\x82\xA0".to_vec(), &SHIFT_JIS);
        assert!(sjis.flags().contains(StringFlags::SUPPLEMENTARY_KNOWN));
        assert!(!sjis.has_supplementary_chars());
    }

    #[test]
    fn frozen_strings_reject_mutation() {
        let mut s = chars("abc").frozen();
        assert!(matches!(s.append_char('d'), Err(RubyError::Frozen { .. })));
        assert!(matches!(s.remove(0, 1), Err(RubyError::Frozen { .. })));
        assert_eq!(s.to_string(), "abc");
        let copy = s.duplicate();
        assert!(!copy.is_frozen());
        assert!(s.clone().is_frozen());
    }

    #[test]
    fn taint_propagates_to_slices_and_concat() {
        let s = chars("abc");
        s.set_tainted(true);
        assert!(s.get_slice(0, 1).is_tainted());
        assert!(chars("x").concat(&s).unwrap().is_tainted());
        assert!(s.duplicate().is_tainted());
    }

    #[test]
    fn incompatible_encodings_fail_to_concat() {
        let utf8 = chars("é");
        let sjis = MutableString::from_bytes(b"\x82\xA0".to_vec(), &SHIFT_JIS);
        let err = utf8.concat(&sjis).unwrap_err();
        assert_eq!(
            err.to_string(),
            "incompatible character encodings: UTF-8 and Shift_JIS"
        );
        let ascii = chars("a");
        assert_eq!(ascii.concat(&sjis).unwrap().encoding(), &SHIFT_JIS);
    }

    #[test]
    fn force_encoding_keeps_bytes() {
        let mut s = chars("é");
        s.force_encoding(&BINARY).unwrap();
        assert_eq!(s.to_bytes().unwrap(), vec![0xC3, 0xA9]);
        assert_eq!(s.char_count().unwrap(), 2);
    }

    #[test]
    fn transcode_converts_text() {
        let mut s = bytes("\u{3042}");
        s.transcode(&SHIFT_JIS).unwrap();
        assert_eq!(s.to_bytes().unwrap(), vec![0x82, 0xA0]);
        assert!(s.is_binary_representation());
        let mut emoji = chars("\u{1F600}");
        let err = emoji.transcode(&SHIFT_JIS).unwrap_err();
        assert_eq!(
            err.encoding_kind(),
            Some(EncodingErrorKind::UndefinedConversion)
        );
        assert_eq!(emoji.encoding(), &UTF_8, "failed transcode changes nothing");
    }

    #[test]
    fn switching_representation_preserves_text() {
        let mut s = chars("héllo");
        s.switch_to_bytes().unwrap();
        assert!(s.is_binary_representation());
        s.prepare_for_character_read().unwrap();
        assert_eq!(s.representation(), Representation::Characters);
        let mut bin = MutableString::binary(vec![0xFF]);
        bin.prepare_for_character_write().unwrap();
        assert!(bin.is_binary_representation(), "binary stays bytes");
    }

    fn any_representation(text: String, pick: u8) -> MutableString {
        match pick % 3 {
            0 => MutableString::literal(&text),
            1 => MutableString::from_chars(text.chars().collect(), &UTF_8),
            _ => MutableString::from_bytes(text.into_bytes(), &UTF_8),
        }
    }

    proptest! {
        #[test]
        fn equal_strings_hash_equal(text in ".{0,16}", a in 0u8..3, b in 0u8..3) {
            let left = any_representation(text.clone(), a);
            let right = any_representation(text, b);
            prop_assert_eq!(left.ordinal_compare(&right), Ordering::Equal);
            prop_assert_eq!(left.hash_code(), right.hash_code());
        }

        #[test]
        fn compare_agrees_across_representations(
            x in ".{0,8}", y in ".{0,8}", a in 0u8..3, b in 0u8..3
        ) {
            let expected = x.cmp(&y);
            let left = any_representation(x, a);
            let right = any_representation(y, b);
            prop_assert_eq!(left.ordinal_compare(&right), expected);
        }

        #[test]
        fn slice_never_fails(text in ".{0,16}", start in any::<isize>(), count in any::<usize>(), pick in 0u8..3) {
            let s = any_representation(text, pick);
            let slice = s.get_slice(start, count);
            let len = s.character_count();
            if start < 0 || start as usize >= len {
                prop_assert!(slice.is_empty());
            } else {
                prop_assert_eq!(slice.character_count(), count.min(len - start as usize));
            }
        }
    }
}
