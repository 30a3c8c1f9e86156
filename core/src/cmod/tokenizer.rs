//! Lexer for text model files.
//!
//! Produces [`Token`]s from an in-memory UTF-8 buffer:
//!
//! - names: `[A-Za-z_][A-Za-z0-9_]*`
//! - double-quoted strings with `\"`, `\\`, `\n`, `\t` and `\uXXXX` escapes
//! - numbers with optional sign, fraction and exponent
//!
//! `#` starts a comment running to the end of the line. A single token can be
//! pushed back and read again, which the recursive-descent reader uses to
//! peek at block keywords.

use std::borrow::Cow;

/// One lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    Name(&'a str),
    String(Cow<'a, str>),
    Number(f64),
    End,
    /// Input that is not a valid token, e.g. a stray symbol or an
    /// unterminated string.
    Error,
}

/// Pull-based token source over a text buffer.
pub struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
    line: u32,
    current: Token<'a>,
    current_integer: Option<i64>,
    pushed_back: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a str) -> Self {
        let src = src.strip_prefix('\u{feff}').unwrap_or(src);
        Self {
            src,
            pos: 0,
            line: 1,
            current: Token::End,
            current_integer: None,
            pushed_back: false,
        }
    }

    /// Read the next token, or re-read the last one after [`push_back`](Self::push_back).
    pub fn next_token(&mut self) -> Token<'a> {
        if self.pushed_back {
            self.pushed_back = false;
            return self.current.clone();
        }
        self.current_integer = None;
        self.current = self.scan();
        self.current.clone()
    }

    /// Make the next call to [`next_token`](Self::next_token) return the
    /// current token again.
    pub fn push_back(&mut self) {
        self.pushed_back = true;
    }

    /// 1-based line of the current position.
    pub fn line_number(&self) -> u32 {
        self.line
    }

    /// Value of the current token if it is an integer literal.
    ///
    /// `-0` is read as a float so that negative zero survives.
    pub fn integer_value(&self) -> Option<i64> {
        match self.current {
            Token::Number(_) => self.current_integer,
            _ => None,
        }
    }

    /// Bytes not yet consumed. Every further token needs at least one.
    pub fn remaining_len(&self) -> usize {
        self.src.len() - self.pos
    }

    fn peek_byte(&self, at: usize) -> Option<u8> {
        self.src.as_bytes().get(at).copied()
    }

    fn scan(&mut self) -> Token<'a> {
        self.skip_whitespace();

        let Some(c) = self.peek_byte(self.pos) else {
            return Token::End;
        };
        match c {
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => self.scan_name(),
            b'0'..=b'9' | b'+' | b'-' | b'.' => self.scan_number(),
            b'"' => self.scan_string(),
            _ => {
                let len = self.src[self.pos..]
                    .chars()
                    .next()
                    .map_or(1, char::len_utf8);
                self.pos += len;
                Token::Error
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_byte(self.pos) {
            match c {
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                b'#' => {
                    self.pos = self.src[self.pos..]
                        .find('\n')
                        .map_or(self.src.len(), |n| self.pos + n);
                }
                _ => break,
            }
        }
    }

    fn scan_name(&mut self) -> Token<'a> {
        let src = self.src;
        let start = self.pos;
        while matches!(self.peek_byte(self.pos), Some(c) if c.is_ascii_alphanumeric() || c == b'_')
        {
            self.pos += 1;
        }
        Token::Name(&src[start..self.pos])
    }

    fn count_digits(&mut self) -> usize {
        let start = self.pos;
        while matches!(self.peek_byte(self.pos), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        self.pos - start
    }

    fn scan_number(&mut self) -> Token<'a> {
        let start = self.pos;
        let negative = self.peek_byte(start) == Some(b'-');
        if matches!(self.peek_byte(start), Some(b'+' | b'-')) {
            self.pos += 1;
        }

        let mut is_integer = true;
        let mut digits = self.count_digits();
        if self.peek_byte(self.pos) == Some(b'.') {
            self.pos += 1;
            is_integer = false;
            digits += self.count_digits();
        }
        if digits == 0 {
            return Token::Error;
        }

        if matches!(self.peek_byte(self.pos), Some(b'e' | b'E')) {
            let mut exp = self.pos + 1;
            if matches!(self.peek_byte(exp), Some(b'+' | b'-')) {
                exp += 1;
            }
            if matches!(self.peek_byte(exp), Some(c) if c.is_ascii_digit()) {
                self.pos = exp;
                self.count_digits();
                is_integer = false;
            }
        }

        let text = &self.src[start..self.pos];
        let Ok(value) = text.parse::<f64>() else {
            return Token::Error;
        };
        if is_integer {
            self.current_integer = text.parse::<i64>().ok().filter(|&i| !(negative && i == 0));
        }
        Token::Number(value)
    }

    fn scan_string(&mut self) -> Token<'a> {
        let src = self.src;
        let body = self.pos + 1;
        let rest = &src[body..];
        let mut owned: Option<String> = None;
        let mut run_start = 0;

        let mut chars = rest.char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos = body + i + 1;
                    let value = match owned {
                        Some(mut s) => {
                            s.push_str(&rest[run_start..i]);
                            Cow::Owned(s)
                        }
                        None => Cow::Borrowed(&rest[..i]),
                    };
                    return Token::String(value);
                }
                '\r' => {
                    owned
                        .get_or_insert_with(String::new)
                        .push_str(&rest[run_start..i]);
                    run_start = i + 1;
                }
                '\n' => self.line += 1,
                '\\' => {
                    let s = owned.get_or_insert_with(String::new);
                    s.push_str(&rest[run_start..i]);
                    let next = chars.next();
                    let escaped = match next {
                        Some((_, '"')) => Some(('"', 2)),
                        Some((_, '\\')) => Some(('\\', 2)),
                        Some((_, 'n')) => Some(('\n', 2)),
                        Some((_, 't')) => Some(('\t', 2)),
                        Some((_, 'u')) => {
                            let code = rest
                                .get(i + 2..i + 6)
                                .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
                                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                                .and_then(char::from_u32);
                            for _ in 0..4 {
                                chars.next();
                            }
                            code.map(|ch| (ch, 6))
                        }
                        _ => None,
                    };
                    let Some((ch, len)) = escaped else {
                        // Resume after the offending character.
                        self.pos = match next {
                            Some((j, c)) => body + j + c.len_utf8(),
                            None => src.len(),
                        };
                        return Token::Error;
                    };
                    s.push(ch);
                    run_start = i + len;
                }
                _ => {}
            }
        }

        // Unterminated string.
        self.pos = self.src.len();
        Token::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token<'_>> {
        let mut t = Tokenizer::new(src);
        let mut out = Vec::new();
        loop {
            let token = t.next_token();
            if token == Token::End {
                return out;
            }
            out.push(token);
        }
    }

    #[test]
    fn test_names_strings_numbers() {
        assert_eq!(
            tokens("material diffuse 1 0.5 -2e3\n\"tex.png\" end_material"),
            vec![
                Token::Name("material"),
                Token::Name("diffuse"),
                Token::Number(1.0),
                Token::Number(0.5),
                Token::Number(-2000.0),
                Token::String(Cow::Borrowed("tex.png")),
                Token::Name("end_material"),
            ]
        );
    }

    #[test]
    fn test_comments_and_lines() {
        let mut t = Tokenizer::new("# header comment\nmesh # trailing\r\n\n  end_mesh");
        assert_eq!(t.next_token(), Token::Name("mesh"));
        assert_eq!(t.line_number(), 2);
        assert_eq!(t.next_token(), Token::Name("end_mesh"));
        assert_eq!(t.line_number(), 4);
        assert_eq!(t.next_token(), Token::End);
    }

    #[test]
    fn test_byte_order_mark_is_skipped() {
        assert_eq!(tokens("\u{feff}vertices"), vec![Token::Name("vertices")]);
    }

    #[test]
    fn test_integer_values() {
        let mut t = Tokenizer::new("42 -7 +3 1.0 1e2 -0 .5 5.");
        let expected = [
            (42.0, Some(42)),
            (-7.0, Some(-7)),
            (3.0, Some(3)),
            (1.0, None),
            (100.0, None),
            (-0.0, None),
            (0.5, None),
            (5.0, None),
        ];
        for (value, integer) in expected {
            assert_eq!(t.next_token(), Token::Number(value));
            assert_eq!(t.integer_value(), integer, "integer value of {value}");
        }
        assert!(matches!(Tokenizer::new("-0").next_token(), Token::Number(z) if z.is_sign_negative()));
    }

    #[test]
    fn test_exponent_needs_digits() {
        // "2e" is the number 2 followed by the name "e".
        assert_eq!(tokens("2e"), vec![Token::Number(2.0), Token::Name("e")]);
        assert_eq!(tokens("2e-x"), vec![Token::Number(2.0), Token::Name("e"), Token::Error, Token::Name("x")]);
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            tokens(r#""a\"b\\c\ndé""#),
            vec![Token::String(Cow::Owned("a\"b\\c\nd\u{e9}".to_string()))]
        );
        assert_eq!(tokens("\"multi\r\nline\""), vec![Token::String(Cow::Owned("multi\nline".to_string()))]);
    }

    #[test]
    fn test_string_line_counting() {
        let mut t = Tokenizer::new("\"a\nb\" next");
        t.next_token();
        assert_eq!(t.next_token(), Token::Name("next"));
        assert_eq!(t.line_number(), 2);
    }

    #[test]
    fn test_errors() {
        assert_eq!(tokens("{"), vec![Token::Error]);
        assert_eq!(tokens("\"unterminated"), vec![Token::Error]);
        assert_eq!(tokens("\"bad \\q escape\""), vec![Token::Error, Token::Name("escape"), Token::Error]);
        assert_eq!(tokens("- 1"), vec![Token::Error, Token::Number(1.0)]);
    }

    #[test]
    fn test_bad_escape_of_multibyte_char() {
        assert_eq!(tokens("\"\\é x"), vec![Token::Error, Token::Name("x")]);
        assert_eq!(tokens("\"\\日本\" y"), vec![Token::Error, Token::Error, Token::Error]);
        assert_eq!(tokens("\"\\"), vec![Token::Error]);
    }

    #[test]
    fn test_push_back() {
        let mut t = Tokenizer::new("mesh 3");
        assert_eq!(t.next_token(), Token::Name("mesh"));
        t.push_back();
        assert_eq!(t.next_token(), Token::Name("mesh"));
        assert_eq!(t.next_token(), Token::Number(3.0));
        assert_eq!(t.integer_value(), Some(3));
        t.push_back();
        assert_eq!(t.next_token(), Token::Number(3.0));
        assert_eq!(t.integer_value(), Some(3), "pushed back numbers keep their integer value");
        assert_eq!(t.next_token(), Token::End);
    }
}
