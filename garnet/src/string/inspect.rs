use std::borrow::Cow;

use crate::encoding::{self, escape_bytes};
use crate::RubyResult;

use super::{MutableString, MutableStringBuilder, Unit};

fn named_escape(c: char) -> Option<&'static str> {
    Some(match c {
        '"' => "\\\"",
        '\\' => "\\\\",
        '\n' => "\\n",
        '\t' => "\\t",
        '\r' => "\\r",
        '\u{c}' => "\\f",
        '\u{b}' => "\\v",
        '\u{7}' => "\\a",
        '\u{8}' => "\\b",
        '\u{1b}' => "\\e",
        _ => return None,
    })
}

/// The character that follows the backslash when `c` is escaped in a
/// regular expression.
fn regex_escape(c: char) -> Option<char> {
    Some(match c {
        '\t' => 't',
        '\n' => 'n',
        '\r' => 'r',
        '\u{c}' => 'f',
        '\u{b}' => 'v',
        ' ' | '[' | ']' | '{' | '}' | '(' | ')' | '|' | '-' | '*' | '.' | '\\'
        | '?' | '+' | '^' | '$' | '#' => c,
        _ => return None,
    })
}

fn unicode_escape(out: &mut String, c: char) {
    if c > '\u{FFFF}' {
        out.push_str(&format!("\\u{{{:X}}}", c as u32));
    } else {
        out.push_str(&format!("\\u{:04X}", c as u32));
    }
}

impl MutableString {
    /// Non-ascii characters of this encoding can be shown as they are.
    fn shows_non_ascii(&self) -> bool {
        !self.encoding.is_binary() && self.encoding != &encoding::US_ASCII
    }

    fn escape_non_ascii(&self, out: &mut String, c: char) {
        match self.encoding.encode_char(c) {
            Ok(bytes) if !self.encoding.is_utf8() => out.push_str(&escape_bytes(&bytes)),
            _ => unicode_escape(out, c),
        }
    }

    fn escaped(&self, dump: bool) -> MutableString {
        let units: Vec<Unit<'_>> = self.units().collect();
        let mut out = String::with_capacity(units.len() + 2);
        out.push('"');
        for (i, unit) in units.iter().enumerate() {
            let c = match *unit {
                Unit::Invalid(run) => {
                    out.push_str(&escape_bytes(run));
                    continue;
                }
                Unit::Char(c) => c,
            };
            if let Some(escape) = named_escape(c) {
                out.push_str(escape);
            } else if c == '#' {
                let next = units.get(i + 1);
                if matches!(next, Some(Unit::Char('{' | '$' | '@'))) {
                    out.push('\\');
                }
                out.push('#');
            } else if c.is_ascii_control() {
                out.push_str(&format!("\\x{:02X}", c as u32));
            } else if c.is_ascii() {
                out.push(c);
            } else if dump || !self.shows_non_ascii() || c.is_control() {
                self.escape_non_ascii(&mut out, c);
            } else {
                out.push(c);
            }
        }
        out.push('"');
        let result = if out.is_ascii() {
            MutableString::literal(&out)
        } else {
            MutableString::from_chars(out.chars().collect(), self.encoding)
        };
        result.taint_by(self);
        result
    }

    /// Quoted, escaped form with printable characters shown as they are.
    pub fn inspect(&self) -> MutableString {
        self.escaped(false)
    }

    /// Like [`Self::inspect`] but the result is always ascii.
    pub fn dump(&self) -> MutableString {
        self.escaped(true)
    }

    /// Escapes regular expression metacharacters. Borrows `self` when no
    /// character needs escaping.
    pub fn escape_regular_expression(&self) -> RubyResult<Cow<'_, MutableString>> {
        let needs_escape = self.units().any(|unit| match unit {
            Unit::Char(c) => regex_escape(c).is_some(),
            Unit::Invalid(_) => false,
        });
        if !needs_escape {
            return Ok(Cow::Borrowed(self));
        }
        let mut builder = MutableStringBuilder::new(self.encoding);
        for unit in self.units() {
            match unit {
                Unit::Char(c) => match regex_escape(c) {
                    Some(escaped) => {
                        builder.append_char('\\').append_char(escaped);
                    }
                    None => {
                        builder.append_char(c);
                    }
                },
                Unit::Invalid(run) => {
                    builder.append_bytes(run)?;
                }
            }
        }
        let escaped = builder.to_mutable_string()?;
        escaped.taint_by(self);
        Ok(Cow::Owned(escaped))
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use crate::encoding::{BINARY, SHIFT_JIS, UTF_8};
    use crate::MutableString;

    #[test]
    fn inspect_escapes_quotes_and_controls() {
        let s = MutableString::literal("a\"b\\c\n\u{1}\u{7f}");
        assert_eq!(s.inspect().to_string(), "\"a\\\"b\\\\c\\n\\x01\\x7F\"");
    }

    #[test]
    fn inspect_guards_interpolation() {
        let s = MutableString::literal("#{x} #$y #@z #a");
        assert_eq!(s.inspect().to_string(), "\"\\#{x} \\#$y \\#@z #a\"");
    }

    #[test]
    fn inspect_keeps_printable_unicode() {
        let s = MutableString::literal("h\u{e9}\u{3042}");
        assert_eq!(s.inspect().to_string(), "\"h\u{e9}\u{3042}\"");
        assert_eq!(s.dump().to_string(), "\"h\\u00E9\\u3042\"");
        assert_eq!(
            MutableString::literal("\u{1F600}").dump().to_string(),
            "\"\\u{1F600}\""
        );
    }

    #[test]
    fn invalid_and_binary_bytes_become_hex() {
        let s = MutableString::from_bytes(b"a\xFFb".to_vec(), &UTF_8);
        assert_eq!(s.inspect().to_string(), "\"a\\xFFb\"");
        let bin = MutableString::from_bytes(vec![0xE9], &BINARY);
        assert_eq!(bin.inspect().to_string(), "\"\\xE9\"");
        let sjis = MutableString::from_bytes(b"\x82\xA0".to_vec(), &SHIFT_JIS);
        assert_eq!(sjis.dump().to_string(), "\"\\x82\\xA0\"");
        assert!(sjis.dump().is_ascii());
    }

    #[test]
    fn regex_escape_borrows_when_clean() {
        let clean = MutableString::literal("plain_text");
        assert!(matches!(
            clean.escape_regular_expression().unwrap(),
            Cow::Borrowed(_)
        ));
        let dirty = MutableString::literal("a.b c\n(d)");
        let escaped = dirty.escape_regular_expression().unwrap();
        assert_eq!(escaped.to_string(), "a\\.b\\ c\\n\\(d\\)");
    }

    #[test]
    fn regex_escape_keeps_invalid_bytes() {
        let s = MutableString::from_bytes(b"\xFF.".to_vec(), &UTF_8);
        let escaped = s.escape_regular_expression().unwrap();
        assert_eq!(escaped.to_bytes().unwrap(), b"\xFF\\.".to_vec());
    }
}
