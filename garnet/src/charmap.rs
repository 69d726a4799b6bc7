//! Character translation tables for `tr`, `delete`, `count` and `squeeze`.
//!
//! A spec is a run of characters where `a-z` stands for a range and a
//! leading `^` (in a spec longer than one character) negates the set.
//! A `-` at either end, or between a descending pair, is an ordinary
//! character.

use std::ops::RangeInclusive;

use hashbrown::{HashMap, HashSet};

use crate::{MutableString, RubyResult};

/// Widest character span that still gets a direct lookup table.
const DENSE_SPAN: u32 = 0x400;

/// Expands a spec into its characters.
///
/// In repeating mode the last character is produced forever once the
/// spec runs out, which is how a short `to` spec pads itself to the
/// length of `from`.
#[derive(Debug, Clone)]
pub struct RangeExpander<'a> {
    spec: &'a [char],
    pos: usize,
    range: Option<RangeInclusive<char>>,
    last: Option<char>,
    repeat_last: bool,
}

impl<'a> RangeExpander<'a> {
    pub fn new(spec: &'a [char]) -> Self {
        Self {
            spec,
            pos: 0,
            range: None,
            last: None,
            repeat_last: false,
        }
    }

    pub fn repeating(spec: &'a [char]) -> Self {
        Self {
            repeat_last: true,
            ..Self::new(spec)
        }
    }
}

impl Iterator for RangeExpander<'_> {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        if let Some(range) = &mut self.range {
            // char ranges step over the surrogate gap
            if let Some(c) = range.next() {
                self.last = Some(c);
                return Some(c);
            }
            self.range = None;
        }
        let Some(&c) = self.spec.get(self.pos) else {
            return if self.repeat_last { self.last } else { None };
        };
        match self.spec.get(self.pos + 1..self.pos + 3) {
            Some(&['-', hi]) if c <= hi => {
                self.pos += 3;
                self.range = Some(c..=hi);
                self.next()
            }
            _ => {
                self.pos += 1;
                self.last = Some(c);
                Some(c)
            }
        }
    }
}

/// Membership bits over `[min, min + 64 * words.len())`.
#[derive(Debug, Clone, Default)]
struct Bitmap {
    min: u32,
    words: Vec<u64>,
}

impl Bitmap {
    fn of(chars: &[char]) -> Self {
        let Some((min, max)) = bounds(chars.iter().copied()) else {
            return Self::default();
        };
        let mut words = vec![0u64; (max - min) as usize / 64 + 1];
        for &c in chars {
            let i = (c as u32 - min) as usize;
            words[i / 64] |= 1u64 << (i % 64);
        }
        Self { min, words }
    }

    fn contains(&self, c: char) -> bool {
        let Some(i) = (c as u32).checked_sub(self.min) else {
            return false;
        };
        let i = i as usize;
        self.words
            .get(i / 64)
            .is_some_and(|&word| word & (1u64 << (i % 64)) != 0)
    }
}

#[derive(Debug, Clone)]
enum Image {
    Dense { min: u32, table: Vec<Option<char>> },
    Sparse(HashMap<char, char>),
}

impl Image {
    fn build(pairs: &[(char, char)]) -> Self {
        match bounds(pairs.iter().map(|&(from, _)| from)) {
            Some((min, max)) if max - min < DENSE_SPAN => {
                let mut table = vec![None; (max - min) as usize + 1];
                for &(from, to) in pairs {
                    table[(from as u32 - min) as usize] = Some(to);
                }
                Self::Dense { min, table }
            }
            _ => Self::Sparse(pairs.iter().copied().collect()),
        }
    }

    fn get(&self, c: char) -> Option<char> {
        match self {
            Self::Dense { min, table } => {
                let i = (c as u32).checked_sub(*min)?;
                table.get(i as usize).copied().flatten()
            }
            Self::Sparse(map) => map.get(&c).copied(),
        }
    }
}

fn bounds(chars: impl Iterator<Item = char>) -> Option<(u32, u32)> {
    chars.fold(None, |acc, c| {
        let c = c as u32;
        Some(match acc {
            None => (c, c),
            Some((lo, hi)) => (lo.min(c), hi.max(c)),
        })
    })
}

fn split_negation(spec: &[char]) -> (bool, &[char]) {
    match spec {
        ['^', rest @ ..] if !rest.is_empty() => (true, rest),
        _ => (false, spec),
    }
}

/// Compiled `from`/`to` translation.
///
/// A negated map only keeps the bitmap of the characters it excludes and
/// sends everything else to the complement character. A plain map with a
/// `to` spec keeps an image table; one without only keeps its bitmap.
#[derive(Debug, Clone)]
pub struct CharacterMap {
    bitmap: Option<Bitmap>,
    image: Option<Image>,
    complement: Option<char>,
    complemental: bool,
}

impl CharacterMap {
    pub fn create(from: &[char], to: &[char]) -> Self {
        let (complemental, from) = split_negation(from);
        let domain: Vec<char> = RangeExpander::new(from).collect();
        if complemental {
            return Self {
                bitmap: Some(Bitmap::of(&domain)),
                image: None,
                complement: RangeExpander::new(to).last(),
                complemental,
            };
        }
        if to.is_empty() {
            return Self::selection(&domain, false);
        }
        let pairs: Vec<(char, char)> = domain
            .iter()
            .copied()
            .zip(RangeExpander::repeating(to))
            .collect();
        Self {
            bitmap: None,
            image: Some(Image::build(&pairs)),
            complement: None,
            complemental,
        }
    }

    /// Map over the characters every spec selects, as used by `delete`,
    /// `count` and `squeeze`.
    pub fn intersection(specs: &[&[char]]) -> Self {
        let mut positive: Option<HashSet<char>> = None;
        let mut negative = HashSet::new();
        for spec in specs {
            let (negated, spec) = split_negation(spec);
            if negated {
                negative.extend(RangeExpander::new(spec));
                continue;
            }
            let set: HashSet<char> = RangeExpander::new(spec).collect();
            positive = Some(match positive {
                None => set,
                Some(prev) => prev.intersection(&set).copied().collect(),
            });
        }
        match positive {
            Some(set) => {
                let chars: Vec<char> =
                    set.into_iter().filter(|c| !negative.contains(c)).collect();
                Self::selection(&chars, false)
            }
            None => Self::selection(&negative.into_iter().collect::<Vec<_>>(), true),
        }
    }

    fn selection(chars: &[char], complemental: bool) -> Self {
        Self {
            bitmap: Some(Bitmap::of(chars)),
            image: None,
            complement: None,
            complemental,
        }
    }

    pub fn from_strings(from: &MutableString, to: &MutableString) -> RubyResult<Self> {
        Ok(Self::create(&from.chars()?, &to.chars()?))
    }

    pub fn from_specs(specs: &[MutableString]) -> RubyResult<Self> {
        let specs = specs
            .iter()
            .map(|spec| spec.to_chars())
            .collect::<RubyResult<Vec<_>>>()?;
        let slices: Vec<&[char]> = specs.iter().map(Vec::as_slice).collect();
        Ok(Self::intersection(&slices))
    }

    /// The translated character, if `c` translates at all.
    pub fn try_map(&self, c: char) -> Option<char> {
        if self.complemental {
            if self.is_mapped(c) {
                return None;
            }
            return self.complement;
        }
        self.image.as_ref()?.get(c)
    }

    /// `c` appears in the (un-negated) `from` set.
    pub fn is_mapped(&self, c: char) -> bool {
        match (&self.bitmap, &self.image) {
            (Some(bitmap), _) => bitmap.contains(c),
            (None, Some(image)) => image.get(c).is_some(),
            (None, None) => false,
        }
    }

    /// `c` is selected once negation is taken into account.
    pub fn selects(&self, c: char) -> bool {
        self.is_mapped(c) != self.complemental
    }

    pub fn is_complemental(&self) -> bool {
        self.complemental
    }

    pub fn complement(&self) -> Option<char> {
        self.complement
    }

    /// Every character outside the negated set translates.
    pub fn has_full_map(&self) -> bool {
        self.complemental && self.complement.is_some()
    }

    pub fn has_bitmap(&self) -> bool {
        self.bitmap.is_some()
    }
}
