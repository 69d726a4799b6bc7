use crate::RubyResult;

use super::content::{Content, Unit};
use super::MutableString;

fn find_slice<T: PartialEq>(haystack: &[T], needle: &[T], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    if needle.is_empty() {
        return Some(from);
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|i| i + from)
}

/// Last occurrence starting at or before `from`.
fn rfind_slice<T: PartialEq>(haystack: &[T], needle: &[T], from: usize) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    let last = from.min(haystack.len() - needle.len());
    (0..=last).rev().find(|&i| &haystack[i..i + needle.len()] == needle)
}

impl MutableString {
    /// Characters with each invalid byte run as one unit, so searching
    /// works on text that does not decode.
    fn unit_vec(&self) -> Vec<Unit<'_>> {
        self.units().collect()
    }

    pub fn index_of_char(&self, c: char, start: usize) -> RubyResult<Option<usize>> {
        let units = self.unit_vec();
        if start > units.len() {
            return Ok(None);
        }
        Ok(units[start..]
            .iter()
            .position(|&x| x == Unit::Char(c))
            .map(|i| i + start))
    }

    /// Character index of the first occurrence of `needle` at or after
    /// `start`.
    pub fn index_of(
        &self,
        needle: &MutableString,
        start: usize,
    ) -> RubyResult<Option<usize>> {
        self.require_compatible_encoding(needle)?;
        if let (Content::Bytes(hay), Content::Bytes(pat)) = (&self.content, &needle.content) {
            if self.encoding.decodes_every_byte() && self.encoding == needle.encoding {
                return Ok(find_slice(hay, pat, start));
            }
        }
        Ok(find_slice(&self.unit_vec(), &needle.unit_vec(), start))
    }

    /// Character index of the last occurrence of `needle` starting at or
    /// before `start`.
    pub fn last_index_of(
        &self,
        needle: &MutableString,
        start: usize,
    ) -> RubyResult<Option<usize>> {
        self.require_compatible_encoding(needle)?;
        Ok(rfind_slice(&self.unit_vec(), &needle.unit_vec(), start))
    }

    /// Byte offset of the first `b` at or after `start`.
    pub fn index_of_byte(&self, b: u8, start: usize) -> RubyResult<Option<usize>> {
        let bytes = self.bytes()?;
        if start > bytes.len() {
            return Ok(None);
        }
        Ok(bytes[start..].iter().position(|&x| x == b).map(|i| i + start))
    }

    pub fn starts_with(&self, prefix: &MutableString) -> RubyResult<bool> {
        self.require_compatible_encoding(prefix)?;
        Ok(self.unit_vec().starts_with(&prefix.unit_vec()))
    }

    pub fn ends_with(&self, suffix: &MutableString) -> RubyResult<bool> {
        self.require_compatible_encoding(suffix)?;
        Ok(self.unit_vec().ends_with(&suffix.unit_vec()))
    }

    pub fn contains(&self, needle: &MutableString) -> RubyResult<bool> {
        Ok(self.index_of(needle, 0)?.is_some())
    }

    /// Splits on every `separator`, keeping empty pieces. Pieces carry the
    /// encoding and taint of `self`.
    pub fn split_on_char(&self, separator: char) -> RubyResult<Vec<MutableString>> {
        let chars = self.chars()?;
        let pieces = chars
            .split(|&c| c == separator)
            .map(|piece| {
                let mut part = MutableString::from_chars(piece.to_vec(), self.encoding);
                if self.is_binary_representation() {
                    part.switch_to_bytes()?;
                }
                part.taint_by(self);
                Ok(part)
            })
            .collect::<RubyResult<Vec<_>>>()?;
        Ok(pieces)
    }
}
