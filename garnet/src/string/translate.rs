use crate::charmap::CharacterMap;
use crate::{RubyError, RubyResult};

use super::{MutableString, MutableStringBuilder, Unit};

/// What happens to one character during a rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Keep,
    Drop,
    Replace(char),
}

impl MutableString {
    /// Rebuilds the content from per-character edits. Invalid byte runs are
    /// always kept. Returns whether anything changed.
    fn rewrite(&mut self, mut edit: impl FnMut(Unit<'_>) -> Edit) -> RubyResult<bool> {
        self.require_not_frozen()?;
        let mut builder =
            MutableStringBuilder::with_capacity(self.character_count(), self.encoding);
        let mut changed = false;
        for unit in self.units() {
            match (unit, edit(unit)) {
                (_, Edit::Drop) => changed = true,
                (Unit::Char(c), Edit::Replace(mapped)) if mapped != c => {
                    changed = true;
                    builder.append_char(mapped);
                }
                (Unit::Char(c), _) => {
                    builder.append_char(c);
                }
                (Unit::Invalid(run), _) => {
                    builder.append_bytes(run)?;
                }
            }
        }
        if !changed {
            return Ok(false);
        }
        let mut rebuilt = builder.to_mutable_string()?;
        if self.is_binary_representation() {
            rebuilt.switch_to_bytes()?;
        }
        self.content = rebuilt.content;
        self.changed_unknown();
        Ok(true)
    }

    fn require_specs(&self, specs: &[MutableString]) -> RubyResult<CharacterMap> {
        if specs.is_empty() {
            return Err(RubyError::wrong_arguments(0, 1));
        }
        for spec in specs {
            self.require_compatible_encoding(spec)?;
        }
        CharacterMap::from_specs(specs)
    }

    /// Translates characters of `from` into the matching characters of
    /// `to`. An empty `to` deletes them instead.
    pub fn tr_in_place(
        &mut self,
        from: &MutableString,
        to: &MutableString,
    ) -> RubyResult<bool> {
        self.require_not_frozen()?;
        if from.is_empty() {
            return Ok(false);
        }
        if to.is_empty() {
            return self.delete_in_place(std::slice::from_ref(from));
        }
        self.require_compatible_encoding(from)?;
        self.require_compatible_encoding(to)?;
        let map = CharacterMap::from_strings(from, to)?;
        self.rewrite(|unit| match unit {
            Unit::Char(c) => map.try_map(c).map_or(Edit::Keep, Edit::Replace),
            Unit::Invalid(_) => Edit::Keep,
        })
    }

    pub fn tr(&self, from: &MutableString, to: &MutableString) -> RubyResult<MutableString> {
        let mut copy = self.duplicate();
        copy.tr_in_place(from, to)?;
        Ok(copy)
    }

    /// Like [`Self::tr_in_place`], then collapses runs of the same
    /// translated character into one.
    pub fn tr_s_in_place(
        &mut self,
        from: &MutableString,
        to: &MutableString,
    ) -> RubyResult<bool> {
        self.require_not_frozen()?;
        if from.is_empty() {
            return Ok(false);
        }
        if to.is_empty() {
            return self.delete_in_place(std::slice::from_ref(from));
        }
        self.require_compatible_encoding(from)?;
        self.require_compatible_encoding(to)?;
        let map = CharacterMap::from_strings(from, to)?;
        let mut last = None;
        self.rewrite(|unit| {
            let mapped = match unit {
                Unit::Char(c) => map.try_map(c),
                Unit::Invalid(_) => None,
            };
            let previous = std::mem::replace(&mut last, mapped);
            match mapped {
                Some(m) if previous == Some(m) => Edit::Drop,
                Some(m) => Edit::Replace(m),
                None => Edit::Keep,
            }
        })
    }

    pub fn tr_s(&self, from: &MutableString, to: &MutableString) -> RubyResult<MutableString> {
        let mut copy = self.duplicate();
        copy.tr_s_in_place(from, to)?;
        Ok(copy)
    }

    /// Removes every character selected by all of `specs`.
    pub fn delete_in_place(&mut self, specs: &[MutableString]) -> RubyResult<bool> {
        self.require_not_frozen()?;
        let map = self.require_specs(specs)?;
        self.rewrite(|unit| match unit {
            Unit::Char(c) if map.selects(c) => Edit::Drop,
            _ => Edit::Keep,
        })
    }

    pub fn delete(&self, specs: &[MutableString]) -> RubyResult<MutableString> {
        let mut copy = self.duplicate();
        copy.delete_in_place(specs)?;
        Ok(copy)
    }

    /// Number of characters selected by all of `specs`.
    pub fn count(&self, specs: &[MutableString]) -> RubyResult<usize> {
        let map = self.require_specs(specs)?;
        Ok(self
            .units()
            .filter(|unit| matches!(unit, Unit::Char(c) if map.selects(*c)))
            .count())
    }

    /// Collapses runs of a repeated character. With specs, only characters
    /// selected by all of them are collapsed.
    pub fn squeeze_in_place(&mut self, specs: &[MutableString]) -> RubyResult<bool> {
        self.require_not_frozen()?;
        let map = match specs {
            [] => None,
            _ => Some(self.require_specs(specs)?),
        };
        let mut previous = None;
        self.rewrite(|unit| {
            let current = match unit {
                Unit::Char(c) => Some(c),
                Unit::Invalid(_) => None,
            };
            let before = std::mem::replace(&mut previous, current);
            let repeated = current.is_some() && before == current;
            match current {
                Some(c) if repeated && map.as_ref().is_none_or(|map| map.selects(c)) => {
                    Edit::Drop
                }
                _ => Edit::Keep,
            }
        })
    }

    pub fn squeeze(&self, specs: &[MutableString]) -> RubyResult<MutableString> {
        let mut copy = self.duplicate();
        copy.squeeze_in_place(specs)?;
        Ok(copy)
    }
}
