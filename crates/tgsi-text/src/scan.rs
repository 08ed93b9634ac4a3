//! Character-level cursor over the assembly source.
//!
//! The translator has no separate lexing pass. It reads characters directly through a
//! [`Scanner`], and because the scanner is `Copy` a tentative match is just a copy of the
//! cursor that is written back only when the match succeeds.

/// Cursor into the source text. Positions are byte offsets.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scanner<'a> {
    text: &'a [u8],
    pos: usize,
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self {
            text: text.as_bytes(),
            pos: 0,
        }
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.text.get(self.pos).copied()
    }

    pub(crate) fn bump(&mut self) {
        if !self.at_end() {
            self.pos += 1;
        }
    }

    /// Consumes `c` if it is the next character.
    pub(crate) fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Skips whitespace and `;` comments, returning whether anything was skipped.
    pub(crate) fn eat_white(&mut self) -> bool {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() {
                self.pos += 1;
            } else if c == b';' {
                while let Some(c) = self.peek() {
                    if c == b'\n' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
        self.pos != start
    }

    pub(crate) fn eat_opt_white(&mut self) {
        self.eat_white();
    }

    /// Whether the next character could continue an identifier.
    pub(crate) fn at_ident_char(&self) -> bool {
        self.peek().is_some_and(is_ident_char)
    }

    /// Consumes `s` if the input starts with it, ignoring ASCII case.
    pub(crate) fn match_no_case(&mut self, s: &str) -> bool {
        let end = self.pos + s.len();
        match self.text.get(self.pos..end) {
            Some(head) if head.eq_ignore_ascii_case(s.as_bytes()) => {
                self.pos = end;
                true
            }
            _ => false,
        }
    }

    /// Like [`Scanner::match_no_case`], but only if `s` is not immediately followed by
    /// another identifier character.
    pub(crate) fn match_word(&mut self, s: &str) -> bool {
        let mut probe = *self;
        if probe.match_no_case(s) && !probe.at_ident_char() {
            *self = probe;
            true
        } else {
            false
        }
    }

    /// Decimal digits. Values too large for `u64` saturate; callers range-check.
    pub(crate) fn parse_uint(&mut self) -> Option<u64> {
        let start = self.pos;
        let mut value = 0u64;
        while let Some(c) = self.peek().filter(u8::is_ascii_digit) {
            value = value
                .saturating_mul(10)
                .saturating_add(u64::from(c - b'0'));
            self.pos += 1;
        }
        (self.pos != start).then_some(value)
    }

    /// An optionally signed integer. White space may separate the sign from the digits.
    pub(crate) fn parse_int(&mut self) -> Option<i64> {
        let mut probe = *self;
        let negative = if probe.eat(b'-') {
            true
        } else {
            probe.eat(b'+');
            false
        };
        probe.eat_opt_white();
        let magnitude = i64::try_from(probe.parse_uint()?).unwrap_or(i64::MAX);
        *self = probe;
        Some(if negative { -magnitude } else { magnitude })
    }

    /// A decimal floating point literal: `[+-]digits[.digits][e[+-]digits]`, where either
    /// the integral or the fractional digits may be missing but not both.
    pub(crate) fn parse_float(&mut self) -> Option<f32> {
        let start = self.pos;
        let mut probe = *self;
        if !probe.eat(b'-') {
            probe.eat(b'+');
        }
        let integral = probe.skip_digits();
        let fractional = probe.eat(b'.') && probe.skip_digits();
        if !integral && !fractional {
            return None;
        }
        if matches!(probe.peek(), Some(b'e' | b'E')) {
            probe.bump();
            if !probe.eat(b'-') {
                probe.eat(b'+');
            }
            if !probe.skip_digits() {
                return None;
            }
        }
        let literal = std::str::from_utf8(&self.text[start..probe.pos]).ok()?;
        let value = literal.parse::<f32>().ok()?;
        *self = probe;
        Some(value)
    }

    fn skip_digits(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        self.pos != start
    }

    /// 1-based line and column of byte offset `pos`.
    pub(crate) fn location(&self, pos: usize) -> (usize, usize) {
        let before = &self.text[..pos.min(self.text.len())];
        let line = before.iter().filter(|&&c| c == b'\n').count() + 1;
        let line_start = before
            .iter()
            .rposition(|&c| c == b'\n')
            .map_or(0, |i| i + 1);
        (line, pos - line_start + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn white_space_includes_comments() {
        let mut s = Scanner::new("  ; comment\n\tMOV");
        assert!(s.eat_white());
        assert!(s.match_no_case("mov"));
        assert!(s.at_end());
        assert!(!s.eat_white());
    }

    #[test]
    fn match_word_needs_a_boundary() {
        let mut s = Scanner::new("ENDIF");
        assert!(!s.match_word("END"));
        assert_eq!(s.pos(), 0);
        assert!(s.match_word("endif"));
    }

    #[test]
    fn floats() {
        for (text, value, rest) in [
            ("2*(", 2.0, "*("),
            ("1.0-(", 1.0, "-("),
            (".5)", 0.5, ")"),
            ("-1.5e2,", -150.0, ","),
            ("3.}", 3.0, "}"),
        ] {
            let mut s = Scanner::new(text);
            assert_eq!(s.parse_float(), Some(value), "{text}");
            assert_eq!(&text[s.pos()..], rest);
        }

        for text in ["", ".", "-", "e5", "1e"] {
            let mut s = Scanner::new(text);
            assert_eq!(s.parse_float(), None, "{text:?}");
            assert_eq!(s.pos(), 0);
        }
    }

    #[test]
    fn integers() {
        let mut s = Scanner::new("123]");
        assert_eq!(s.parse_uint(), Some(123));
        assert_eq!(s.peek(), Some(b']'));

        let mut s = Scanner::new("-7");
        assert_eq!(s.parse_uint(), None);
        assert_eq!(s.parse_int(), Some(-7));

        let mut s = Scanner::new("+ 3]");
        assert_eq!(s.parse_int(), Some(3));
        assert_eq!(s.peek(), Some(b']'));

        let mut s = Scanner::new("- ]");
        assert_eq!(s.parse_int(), None);
        assert_eq!(s.pos(), 0);

        let mut s = Scanner::new("99999999999999999999999");
        assert_eq!(s.parse_uint(), Some(u64::MAX));
    }

    #[test]
    fn locations_are_one_based() {
        let s = Scanner::new("FRAG1.1\nDCL IN[0]\n");
        assert_eq!(s.location(0), (1, 1));
        assert_eq!(s.location(8), (2, 1));
        assert_eq!(s.location(12), (2, 5));
    }
}
