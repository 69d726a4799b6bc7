use crate::encoding::Character;
use crate::RubyResult;

use super::content::{self, Content};
use super::MutableString;

impl MutableString {
    pub fn append_char(&mut self, c: char) -> RubyResult<()> {
        self.require_not_frozen()?;
        if let Content::Bytes(bytes) = &mut self.content {
            if c.is_ascii() {
                bytes.push(c as u8);
            } else {
                bytes.extend_from_slice(&self.encoding.encode_char(c)?);
            }
        } else {
            self.encoding.encoded_len(c)?;
            self.chars_mut()?.push(c);
        }
        self.changed_char(c);
        Ok(())
    }

    /// Appends a raw byte. Character content takes an ascii byte (or a byte
    /// of a single byte code page) as a character; otherwise the string
    /// switches to bytes first.
    pub fn append_byte(&mut self, b: u8) -> RubyResult<()> {
        self.require_not_frozen()?;
        if let Content::Bytes(bytes) = &mut self.content {
            bytes.push(b);
        } else if b.is_ascii() {
            self.chars_mut()?.push(b as char);
        } else if let Some(c) = self.code_page_char(b) {
            self.chars_mut()?.push(c);
        } else {
            self.bytes_mut()?.push(b);
        }
        self.changed_run(b.is_ascii());
        Ok(())
    }

    /// The character a lone byte stands for in a single byte code page.
    fn code_page_char(&self, b: u8) -> Option<char> {
        if self.encoding.is_binary() || !self.encoding.decodes_every_byte() {
            return None;
        }
        self.encoding.decode_one(&[b]).value()
    }

    pub fn append_str(&mut self, text: &str) -> RubyResult<()> {
        self.require_not_frozen()?;
        if let Content::Bytes(bytes) = &mut self.content {
            bytes.extend_from_slice(&self.encoding.encode_str(text)?);
        } else {
            self.chars_mut()?.extend(text.chars());
        }
        self.changed_run(text.is_ascii());
        Ok(())
    }

    pub fn append_chars(&mut self, chars: &[char]) -> RubyResult<()> {
        self.require_not_frozen()?;
        if let Content::Bytes(bytes) = &mut self.content {
            bytes.extend_from_slice(&self.encoding.encode(chars)?);
        } else {
            self.chars_mut()?.extend_from_slice(chars);
        }
        self.changed_run(chars.iter().all(char::is_ascii));
        Ok(())
    }

    pub fn append_bytes(&mut self, data: &[u8]) -> RubyResult<()> {
        self.require_not_frozen()?;
        if let Content::Bytes(bytes) = &mut self.content {
            bytes.extend_from_slice(data);
        } else if data.is_ascii() {
            self.chars_mut()?.extend(data.iter().map(|&b| b as char));
        } else if !self.encoding.is_binary() && self.encoding.decodes_every_byte() {
            let decoded = self.encoding.decode(data)?;
            self.chars_mut()?.extend(decoded);
        } else {
            self.bytes_mut()?.extend_from_slice(data);
        }
        self.changed_run(data.is_ascii());
        Ok(())
    }

    /// Appends another string, adopting the compatible encoding of the two.
    pub fn append_string(&mut self, other: &MutableString) -> RubyResult<()> {
        let encoding = self.require_compatible_encoding(other)?;
        self.require_not_frozen()?;
        let previous = std::mem::replace(&mut self.encoding, encoding);
        let result = match &other.content {
            Content::Bytes(bytes) => self.append_bytes(bytes),
            Content::Chars(chars) => self.append_chars(chars),
            Content::Str(text) => self.append_str(text),
        };
        if result.is_err() {
            self.encoding = previous;
        } else {
            self.taint_by(other);
        }
        result
    }

    pub fn append_multiple(
        &mut self,
        other: &MutableString,
        repeat: usize,
    ) -> RubyResult<()> {
        self.require_compatible_encoding(other)?;
        for _ in 0..repeat {
            self.append_string(other)?;
        }
        Ok(())
    }

    fn insert_run(&mut self, index: usize, run: &[char]) -> RubyResult<()> {
        if let Content::Bytes(bytes) = &mut self.content {
            let offset = content::byte_offset(bytes, self.encoding, index)
                .ok_or_else(|| Self::index_error(index))?;
            let encoded = self.encoding.encode(run)?;
            bytes.splice(offset..offset, encoded);
        } else {
            let chars = self.chars_mut()?;
            if index > chars.len() {
                return Err(Self::index_error(index));
            }
            chars.splice(index..index, run.iter().copied());
        }
        Ok(())
    }

    pub fn insert_char(&mut self, index: usize, c: char) -> RubyResult<()> {
        self.require_not_frozen()?;
        self.insert_run(index, &[c])?;
        self.changed_char(c);
        Ok(())
    }

    pub fn insert_str(&mut self, index: usize, text: &str) -> RubyResult<()> {
        self.require_not_frozen()?;
        self.insert_run(index, &text.chars().collect::<Vec<_>>())?;
        self.changed_run(text.is_ascii());
        Ok(())
    }

    /// Inserts raw bytes at a byte offset.
    pub fn insert_bytes(&mut self, offset: usize, data: &[u8]) -> RubyResult<()> {
        self.require_not_frozen()?;
        let bytes = self.bytes_mut()?;
        if offset > bytes.len() {
            return Err(Self::index_error(offset));
        }
        bytes.splice(offset..offset, data.iter().copied());
        self.changed_run(data.is_ascii());
        Ok(())
    }

    pub fn insert_string(
        &mut self,
        index: usize,
        other: &MutableString,
    ) -> RubyResult<()> {
        let encoding = self.require_compatible_encoding(other)?;
        self.require_not_frozen()?;
        let previous = std::mem::replace(&mut self.encoding, encoding);
        let result = match &other.content {
            Content::Bytes(data) => self.bytes_mut().and_then(|bytes| {
                let offset = content::byte_offset(bytes, encoding, index)
                    .ok_or_else(|| Self::index_error(index))?;
                bytes.splice(offset..offset, data.iter().copied());
                Ok(())
            }),
            Content::Chars(_) | Content::Str(_) => other
                .chars()
                .and_then(|run| self.insert_run(index, &run)),
        };
        if let Err(err) = result {
            self.encoding = previous;
            return Err(err);
        }
        self.changed_run(other.is_ascii());
        self.taint_by(other);
        Ok(())
    }

    /// Removes `count` characters from `start`, clipping at the end.
    pub fn remove(&mut self, start: usize, count: usize) -> RubyResult<()> {
        self.require_not_frozen()?;
        if let Content::Bytes(bytes) = &mut self.content {
            let (from, to) =
                content::byte_range(bytes, self.encoding, start, count)
                    .ok_or_else(|| Self::index_error(start))?;
            bytes.drain(from..to);
        } else {
            let chars = self.chars_mut()?;
            if start > chars.len() {
                return Err(Self::index_error(start));
            }
            let end = start + count.min(chars.len() - start);
            chars.drain(start..end);
        }
        self.changed_remove();
        Ok(())
    }

    pub fn remove_bytes(&mut self, start: usize, count: usize) -> RubyResult<()> {
        self.require_not_frozen()?;
        let bytes = self.bytes_mut()?;
        if start > bytes.len() {
            return Err(Self::index_error(start));
        }
        let end = start + count.min(bytes.len() - start);
        bytes.drain(start..end);
        self.changed_remove();
        Ok(())
    }

    /// Keeps only characters `start..start + count`.
    pub fn trim(&mut self, start: usize, count: usize) -> RubyResult<()> {
        self.require_not_frozen()?;
        if let Content::Bytes(bytes) = &mut self.content {
            let (from, to) =
                content::byte_range(bytes, self.encoding, start, count)
                    .ok_or_else(|| Self::index_error(start))?;
            bytes.truncate(to);
            bytes.drain(..from);
        } else {
            let chars = self.chars_mut()?;
            if start > chars.len() {
                return Err(Self::index_error(start));
            }
            chars.truncate(start + count.min(chars.len() - start));
            chars.drain(..start);
        }
        self.changed_remove();
        Ok(())
    }

    pub fn clear(&mut self) -> RubyResult<()> {
        self.require_not_frozen()?;
        self.content = self.content.emptied();
        self.changed();
        self.learn_empty();
        Ok(())
    }

    pub fn set_char(&mut self, index: usize, c: char) -> RubyResult<()> {
        self.require_not_frozen()?;
        if let Content::Bytes(bytes) = &mut self.content {
            let (from, to) = content::byte_range(bytes, self.encoding, index, 1)
                .filter(|(from, to)| from < to)
                .ok_or_else(|| Self::index_error(index))?;
            let encoded = self.encoding.encode_char(c)?;
            bytes.splice(from..to, encoded);
        } else {
            let slot = self
                .chars_mut()?
                .get_mut(index)
                .ok_or_else(|| Self::index_error(index))?;
            *slot = c;
        }
        self.changed_replace(c);
        Ok(())
    }

    pub fn set_byte(&mut self, index: usize, b: u8) -> RubyResult<()> {
        self.require_not_frozen()?;
        let slot = self
            .bytes_mut()?
            .get_mut(index)
            .ok_or_else(|| Self::index_error(index))?;
        *slot = b;
        self.changed_remove();
        if !b.is_ascii() {
            self.learn_ascii(false);
        }
        Ok(())
    }

    /// Overwrites bytes at `offset`, growing the string with NULs as
    /// needed.
    pub fn write(&mut self, offset: usize, data: &[u8]) -> RubyResult<()> {
        self.require_not_frozen()?;
        let end = offset
            .checked_add(data.len())
            .ok_or_else(|| Self::index_error(offset))?;
        let bytes = self.bytes_mut()?;
        if end > bytes.len() {
            bytes.resize(end, 0);
        }
        bytes[offset..end].copy_from_slice(data);
        self.changed_unknown();
        Ok(())
    }

    /// Replaces characters `start..start + count` with `other`. Either the
    /// whole replacement happens or nothing changes.
    pub fn replace(
        &mut self,
        start: usize,
        count: usize,
        other: &MutableString,
    ) -> RubyResult<()> {
        self.require_compatible_encoding(other)?;
        self.require_not_frozen()?;
        let mut updated = self.clone();
        updated.remove(start, count)?;
        updated.insert_string(start, other)?;
        *self = updated;
        Ok(())
    }

    pub fn reverse(&mut self) -> RubyResult<()> {
        self.require_not_frozen()?;
        let encoding = self.encoding;
        if let Content::Bytes(bytes) = &mut self.content {
            if encoding.decodes_every_byte() {
                bytes.reverse();
            } else {
                let reversed: Vec<u8> = {
                    let units: Vec<&[u8]> =
                        encoding.characters(bytes).map(|ch| ch.bytes()).collect();
                    units.iter().rev().flat_map(|unit| unit.iter().copied()).collect()
                };
                *bytes = reversed;
            }
        } else {
            self.chars_mut()?.reverse();
        }
        self.changed();
        Ok(())
    }

    /// Truncates to `count` characters or pads with NUL characters.
    pub fn set_char_count(&mut self, count: usize) -> RubyResult<()> {
        self.require_not_frozen()?;
        let current = self.character_count();
        if let Content::Bytes(bytes) = &mut self.content {
            match content::byte_offset(bytes, self.encoding, count) {
                Some(offset) => bytes.truncate(offset),
                None => bytes.resize(bytes.len() + (count - current), 0),
            }
        } else {
            self.chars_mut()?.resize(count, '\0');
        }
        if count < current {
            self.changed_remove();
        } else {
            self.changed_run(true);
        }
        Ok(())
    }

    pub fn set_byte_count(&mut self, count: usize) -> RubyResult<()> {
        self.require_not_frozen()?;
        let bytes = self.bytes_mut()?;
        let shrinking = count < bytes.len();
        bytes.resize(count, 0);
        if shrinking {
            self.changed_remove();
        } else {
            self.changed_run(true);
        }
        Ok(())
    }

    /// Applies `map` to every ascii letter, given its character index.
    /// Other characters, including every non-ascii one, are left alone.
    fn map_ascii_letters(
        &mut self,
        map: impl Fn(usize, char) -> char,
    ) -> RubyResult<bool> {
        self.require_not_frozen()?;
        let encoding = self.encoding;
        let mut changed = false;
        if let Content::Bytes(bytes) = &mut self.content {
            let mut edits = Vec::new();
            let mut offset = 0;
            for (index, ch) in encoding.characters(bytes).enumerate() {
                if let Character::Valid { value, .. } = ch {
                    if value.is_ascii_alphabetic() {
                        let mapped = map(index, value);
                        if mapped != value {
                            edits.push((offset, mapped as u8));
                        }
                    }
                }
                offset += ch.bytes().len();
            }
            changed = !edits.is_empty();
            for (offset, b) in edits {
                bytes[offset] = b;
            }
        } else {
            for (index, slot) in self.chars_mut()?.iter_mut().enumerate() {
                if slot.is_ascii_alphabetic() {
                    let mapped = map(index, *slot);
                    changed |= mapped != *slot;
                    *slot = mapped;
                }
            }
        }
        if changed {
            self.changed();
        }
        Ok(changed)
    }

    pub fn upcase(&mut self) -> RubyResult<bool> {
        self.map_ascii_letters(|_, c| c.to_ascii_uppercase())
    }

    pub fn downcase(&mut self) -> RubyResult<bool> {
        self.map_ascii_letters(|_, c| c.to_ascii_lowercase())
    }

    pub fn swapcase(&mut self) -> RubyResult<bool> {
        self.map_ascii_letters(|_, c| {
            if c.is_ascii_uppercase() {
                c.to_ascii_lowercase()
            } else {
                c.to_ascii_uppercase()
            }
        })
    }

    pub fn capitalize(&mut self) -> RubyResult<bool> {
        self.map_ascii_letters(|index, c| {
            if index == 0 {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            }
        })
    }
}
