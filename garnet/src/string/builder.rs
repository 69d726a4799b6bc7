use crate::encoding::EncodingRef;
use crate::{EncodingErrorKind, RubyError, RubyResult};

use super::content::Content;
use super::{MutableString, StringFlags};

/// Builds a [`MutableString`] piece by piece.
///
/// Characters are collected as they come. The first byte turns the builder
/// into a byte builder: characters still pending are encoded into the byte
/// buffer before the byte lands, so the output keeps the order of the
/// appends.
#[derive(Debug)]
pub struct MutableStringBuilder {
    encoding: EncodingRef,
    bytes: Option<Vec<u8>>,
    pending: Vec<char>,
    taint: StringFlags,
}

impl MutableStringBuilder {
    pub fn new(encoding: EncodingRef) -> Self {
        Self {
            encoding,
            bytes: None,
            pending: Vec::new(),
            taint: StringFlags::empty(),
        }
    }

    pub fn with_capacity(capacity: usize, encoding: EncodingRef) -> Self {
        Self {
            pending: Vec::with_capacity(capacity),
            ..Self::new(encoding)
        }
    }

    pub fn encoding(&self) -> EncodingRef {
        self.encoding
    }

    /// Characters plus bytes appended so far.
    pub fn len_hint(&self) -> usize {
        self.pending.len() + self.bytes.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len_hint() == 0
    }

    /// Encodes pending characters into the byte buffer.
    fn flush(&mut self) -> RubyResult<&mut Vec<u8>> {
        let bytes = self.bytes.get_or_insert_with(Vec::new);
        if !self.pending.is_empty() {
            let encoded = self.encoding.encode(&self.pending)?;
            log::trace!("builder flushed {} pending chars", self.pending.len());
            bytes.extend_from_slice(&encoded);
            self.pending.clear();
        }
        Ok(bytes)
    }

    pub fn append_char(&mut self, c: char) -> &mut Self {
        self.pending.push(c);
        self
    }

    pub fn append_str(&mut self, text: &str) -> &mut Self {
        self.pending.extend(text.chars());
        self
    }

    pub fn append_byte(&mut self, b: u8) -> RubyResult<&mut Self> {
        self.flush()?.push(b);
        Ok(self)
    }

    pub fn append_bytes(&mut self, data: &[u8]) -> RubyResult<&mut Self> {
        self.flush()?.extend_from_slice(data);
        Ok(self)
    }

    /// Appends another string's content and picks up its taint. The string
    /// must be ascii or share the builder's encoding.
    pub fn append_string(&mut self, other: &MutableString) -> RubyResult<&mut Self> {
        if other.encoding() != self.encoding && !other.is_ascii() {
            return Err(RubyError::encoding(
                EncodingErrorKind::Compatibility,
                format!(
                    "incompatible character encodings: {} and {}",
                    self.encoding,
                    other.encoding()
                ),
            ));
        }
        match &other.content {
            Content::Bytes(bytes) => {
                self.append_bytes(bytes)?;
            }
            Content::Chars(chars) => self.pending.extend_from_slice(chars),
            Content::Str(text) => self.pending.extend(text.chars()),
        }
        self.taint |= other.flags() & StringFlags::TAINT_FLAGS;
        Ok(self)
    }

    /// Finishes the string. A builder that never saw a byte yields
    /// character content.
    pub fn to_mutable_string(mut self) -> RubyResult<MutableString> {
        let content = if self.bytes.is_none() {
            Content::Chars(std::mem::take(&mut self.pending))
        } else {
            Content::Bytes(std::mem::take(self.flush()?))
        };
        let string = MutableString::from_content(content, self.encoding);
        string.flags.insert(self.taint);
        Ok(string)
    }
}
