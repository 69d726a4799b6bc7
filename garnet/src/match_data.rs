//! Results of a successful pattern match.

use std::{ops::Range, sync::Arc};

use crate::encoding::EncodingRef;
use crate::{MutableString, RubyError, RubyResult, Shared, StringRef};

/// Match as reported by the pattern engine: character ranges per group,
/// `None` for groups that did not participate, plus group names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMatch {
    pub groups: Vec<Option<Range<usize>>>,
    pub names: Vec<(String, usize)>,
}

impl RawMatch {
    pub fn new(groups: Vec<Option<Range<usize>>>) -> Self {
        Self {
            groups,
            names: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>, group: usize) -> Self {
        self.names.push((name.into(), group));
        self
    }
}

/// Group offsets in bytes of a legacy encoding: start and length.
type ByteTable = Vec<Option<(usize, usize)>>;

#[derive(Debug, Clone)]
pub struct MatchData {
    raw: Arc<RawMatch>,
    input: StringRef,
    byte_table: Option<Arc<ByteTable>>,
}

impl MatchData {
    /// `None` when the match failed. The input is frozen: a frozen input is
    /// shared, anything else is copied first.
    ///
    /// With a multibyte `kcode` other than the input's own encoding, group
    /// offsets are reported in bytes of `kcode`.
    pub fn new(
        raw: Option<RawMatch>,
        input: &StringRef,
        kcode: Option<EncodingRef>,
    ) -> RubyResult<Option<Self>> {
        Self::new_at(raw, input, kcode, 0)
    }

    /// Like [`Self::new`] for a match that started `byte_offset` bytes into
    /// a larger buffer. The offset only shifts byte-table starts.
    pub fn new_at(
        raw: Option<RawMatch>,
        input: &StringRef,
        kcode: Option<EncodingRef>,
        byte_offset: usize,
    ) -> RubyResult<Option<Self>> {
        let Some(raw) = raw else {
            return Ok(None);
        };
        if !matches!(raw.groups.first(), Some(Some(_))) {
            return Ok(None);
        }
        let input = {
            let string = input.read();
            if string.is_frozen() {
                input.clone()
            } else {
                Shared::new(string.duplicate().frozen())
            }
        };
        let byte_table = {
            let string = input.read();
            let count = string.character_count();
            let outside = raw
                .groups
                .iter()
                .flatten()
                .find(|range| range.end > count || range.start > range.end);
            if let Some(range) = outside {
                return Err(RubyError::index(format!(
                    "match {}..{} out of string",
                    range.start, range.end
                )));
            }
            match kcode {
                Some(kcode)
                    if kcode.max_bytes_per_char() > 1 && kcode != string.encoding() =>
                {
                    let chars = string.to_chars()?;
                    Some(Arc::new(byte_table(&raw, &chars, kcode, byte_offset)?))
                }
                _ => None,
            }
        };
        Ok(Some(Self {
            raw: Arc::new(raw),
            input,
            byte_table,
        }))
    }

    pub fn input(&self) -> &StringRef {
        &self.input
    }

    pub fn has_byte_table(&self) -> bool {
        self.byte_table.is_some()
    }

    /// Number of groups, the whole match included.
    pub fn group_count(&self) -> usize {
        self.raw.groups.len()
    }

    pub fn group_success(&self, group: usize) -> bool {
        matches!(self.raw.groups.get(group), Some(Some(_)))
    }

    fn range(&self, group: usize) -> RubyResult<Option<&Range<usize>>> {
        match self.raw.groups.get(group) {
            Some(range) => Ok(range.as_ref()),
            None => Err(RubyError::index(format!("index {group} out of matches"))),
        }
    }

    /// Start and length of a group in the coordinates of this match.
    fn span(&self, group: usize) -> RubyResult<Option<(usize, usize)>> {
        let Some(range) = self.range(group)? else {
            return Ok(None);
        };
        Ok(match &self.byte_table {
            Some(table) => table.get(group).copied().flatten(),
            None => Some((range.start, range.len())),
        })
    }

    pub fn group_start(&self, group: usize) -> RubyResult<Option<usize>> {
        Ok(self.span(group)?.map(|(start, _)| start))
    }

    pub fn group_length(&self, group: usize) -> RubyResult<Option<usize>> {
        Ok(self.span(group)?.map(|(_, length)| length))
    }

    pub fn group_end(&self, group: usize) -> RubyResult<Option<usize>> {
        Ok(self.span(group)?.map(|(start, length)| start + length))
    }

    fn slice(&self, start: usize, count: usize) -> MutableString {
        self.input.read().get_slice(start as isize, count)
    }

    /// Text of a group as a new string.
    pub fn get_group_value(&self, group: usize) -> RubyResult<Option<MutableString>> {
        Ok(self
            .range(group)?
            .map(|range| self.slice(range.start, range.len())))
    }

    /// Text of a named group. The last group registered under the name
    /// wins.
    pub fn named(&self, name: &str) -> RubyResult<Option<MutableString>> {
        let group = self
            .raw
            .names
            .iter()
            .rev()
            .find(|(candidate, _)| candidate == name)
            .map(|&(_, group)| group)
            .ok_or_else(|| {
                RubyError::index(format!("undefined group name reference: {name}"))
            })?;
        self.get_group_value(group)
    }

    pub fn names(&self) -> Vec<&str> {
        self.raw.names.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn whole(&self) -> Range<usize> {
        self.raw.groups.first().cloned().flatten().unwrap_or_default()
    }

    pub fn pre_match(&self) -> MutableString {
        self.slice(0, self.whole().start)
    }

    pub fn post_match(&self) -> MutableString {
        let end = self.whole().end;
        let count = self.input.read().character_count();
        self.slice(end, count.saturating_sub(end))
    }

    /// Values of every group but the whole match.
    pub fn captures(&self) -> Vec<Option<MutableString>> {
        self.to_a().into_iter().skip(1).collect()
    }

    pub fn to_a(&self) -> Vec<Option<MutableString>> {
        self.raw
            .groups
            .iter()
            .map(|range| range.as_ref().map(|r| self.slice(r.start, r.len())))
            .collect()
    }

    /// Shares the group table and the input.
    pub fn duplicate(&self) -> Self {
        self.clone()
    }
}

fn byte_table(
    raw: &RawMatch,
    chars: &[char],
    kcode: EncodingRef,
    base: usize,
) -> RubyResult<ByteTable> {
    let mut offsets = Vec::with_capacity(chars.len() + 1);
    let mut offset = 0;
    offsets.push(0);
    for &c in chars {
        offset += kcode.encoded_len(c)?;
        offsets.push(offset);
    }
    Ok(raw
        .groups
        .iter()
        .map(|group| {
            group.as_ref().map(|range| {
                let start = offsets[range.start];
                (base + start, offsets[range.end] - start)
            })
        })
        .collect())
}
