// This file is part of cppp, a C/Objective-C preprocessor core.
// Copyright 2022 Jeffrey Sharp
//
// SPDX-License-Identifier: GPL-3.0-or-later
//
// cppp is free software: you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published
// by the Free Software Foundation, either version 3 of the License,
// or (at your option) any later version.
//
// cppp is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See
// the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with cppp.  If not, see <http://www.gnu.org/licenses/>.

//! The physical-token lexer: turns a [`JoinReader`]'s character stream into
//! one [`Token`] per call.

mod esc;
mod ident;
mod num;
mod punct;
mod quoted;

use std::rc::Rc;

use crate::error::Diagnostic;
use crate::flags::Features;
use crate::location::Location;
use crate::reader::JoinReader;
use crate::token::{Token, TokenKind, Value};

/// Produces preprocessing tokens from one source file or string.
///
/// Tracks beginning-of-line and header-name-mode flags itself; the driver
/// toggles [`set_in_include`](Self::set_in_include) only while scanning the
/// operand of an `#include`/`#include_next`/`#import` directive.
pub struct LexerSource {
    reader: JoinReader,
    path: Rc<str>,
    features: Features,
    beginning_of_line: bool,
    in_include: bool,
    at_eof: bool,
    pending: Vec<Diagnostic>,
}

impl LexerSource {
    pub fn new(path: impl Into<Rc<str>>, text: &str, features: Features) -> Self {
        Self {
            reader: JoinReader::new(text),
            path: path.into(),
            features,
            beginning_of_line: true,
            in_include: false,
            at_eof: false,
            pending: Vec::new(),
        }
    }

    pub fn path(&self) -> &Rc<str> {
        &self.path
    }

    pub fn location(&self) -> Location {
        self.reader.location()
    }

    /// Enables or disables header-name lexing, for the duration of scanning
    /// an `#include` operand.
    pub fn set_in_include(&mut self, value: bool) {
        self.in_include = value;
    }

    pub fn is_beginning_of_line(&self) -> bool {
        self.beginning_of_line
    }

    /// Drains non-fatal diagnostics (e.g. unrecognized escapes) accumulated
    /// since the last call.
    pub fn take_pending_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.pending)
    }

    fn invalid(&mut self, loc: Location, diag: Diagnostic, text: impl Into<Rc<str>>) -> Token {
        let reason: Rc<str> = diag.to_string().into();
        self.pending.push(diag);
        Token::new(TokenKind::Invalid, text, loc).with_value(Value::Invalid(reason))
    }

    /// Returns the next token. Returns `EOF` forever once the underlying
    /// reader is exhausted.
    pub fn next(&mut self) -> Token {
        if self.at_eof {
            return Token::eof(self.reader.location());
        }

        let loc = self.reader.location();

        let c = match self.reader.next() {
            Some(c) => c,
            None => {
                self.at_eof = true;
                return Token::eof(loc);
            }
        };

        // Non-newline spacing.
        if c == ' ' || c == '\t' {
            let mut text = String::new();
            text.push(c);
            while let Some(n) = self.reader.peek() {
                if n == ' ' || n == '\t' {
                    self.reader.next();
                    text.push(n);
                } else {
                    break;
                }
            }
            return Token::new(TokenKind::Whitespace, text, loc);
        }

        // Newlines: JoinReader has already normalized every recognized
        // newline form to '\n'. Consecutive newlines collapse into a
        // single NL token.
        if c == '\n' {
            let mut text = String::from("\n");
            while self.reader.peek() == Some('\n') {
                self.reader.next();
                text.push('\n');
            }
            self.beginning_of_line = true;
            return Token::new(TokenKind::Newline, text, loc);
        }

        let bol = self.beginning_of_line;
        self.beginning_of_line = false;

        // Comments.
        if c == '/' {
            match self.reader.peek() {
                Some('*') => {
                    self.reader.next();
                    return self.scan_c_comment(loc);
                }
                Some('/') => {
                    self.reader.next();
                    return self.scan_cpp_comment(loc);
                }
                _ => {}
            }
        }

        // `#` at the very start of a logical line is always HASH, never the
        // first half of `##`.
        if c == '#' && bol {
            return Token::punct(crate::token::Punct::Hash, loc);
        }

        if self.in_include {
            if c == '<' {
                return match quoted::scan_header_angle(&mut self.reader, loc) {
                    Ok(q) => Token::new(TokenKind::Header, q.text, loc)
                        .with_value(Value::Str(q.decoded.into())),
                    Err(e) => self.invalid(loc, e, "<"),
                };
            }
            if c == '"' {
                return match quoted::scan_header_quote(&mut self.reader, loc) {
                    Ok(q) => Token::new(TokenKind::StringLit, q.text, loc)
                        .with_value(Value::Str(q.decoded.into())),
                    Err(e) => self.invalid(loc, e, "\""),
                };
            }
        }

        if c == '\'' {
            return match quoted::scan_char(&mut self.reader, loc) {
                Ok(q) if q.decoded.is_empty() => {
                    self.invalid(loc, Diagnostic::EmptyCharLiteral { loc }, q.text)
                }
                Ok(q) => {
                    for w in q.warnings {
                        self.pending.push(w);
                    }
                    let value = q.decoded.chars().next().unwrap();
                    Token::new(TokenKind::Character, q.text, loc).with_value(Value::Char(value))
                }
                Err(e) => self.invalid(loc, e, "'"),
            };
        }

        if c == '"' {
            return match quoted::scan_string(&mut self.reader, loc) {
                Ok(q) => {
                    for w in q.warnings {
                        self.pending.push(w);
                    }
                    Token::new(TokenKind::StringLit, q.text, loc)
                        .with_value(Value::Str(q.decoded.into()))
                }
                Err(e) => self.invalid(loc, e, "\""),
            };
        }

        if c.is_ascii_digit() {
            return match num::scan(&mut self.reader, c, loc) {
                Ok(n) => Token::new(TokenKind::Integer, n.text, loc).with_value(Value::Int(n.value)),
                Err(e) => {
                    let text = if let Diagnostic::BadNumericSuffix { ref suffix, .. } = e {
                        suffix.to_string()
                    } else {
                        c.to_string()
                    };
                    self.invalid(loc, e, text)
                }
            };
        }

        if ident::is_start(c, self.features) {
            let mut text = String::new();
            text.push(c);
            ident::scan(&mut self.reader, self.features, &mut text);
            return Token::new(TokenKind::Identifier, text, loc);
        }

        if c.is_ascii_control() {
            return self.invalid(
                loc,
                Diagnostic::IllegalControlChar { loc, ch: c },
                c.to_string(),
            );
        }

        let p = punct::scan(&mut self.reader, c, self.features);
        Token::punct(p, loc)
    }

    fn scan_c_comment(&mut self, loc: Location) -> Token {
        let mut text = String::from("/*");
        loop {
            match self.reader.next() {
                None => {
                    return self.invalid(loc, Diagnostic::UnterminatedComment { loc }, text);
                }
                Some('*') => {
                    text.push('*');
                    if self.reader.peek() == Some('/') {
                        self.reader.next();
                        text.push('/');
                        break;
                    }
                }
                Some(c) => text.push(c),
            }
        }
        Token::new(TokenKind::CComment, text, loc)
    }

    fn scan_cpp_comment(&mut self, loc: Location) -> Token {
        let mut text = String::from("//");
        while let Some(c) = self.reader.peek() {
            if c == '\n' {
                break;
            }
            self.reader.next();
            text.push(c);
        }
        Token::new(TokenKind::CppComment, text, loc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(text: &str) -> Vec<Token> {
        let mut lexer = LexerSource::new("test.c", text, Features::empty());
        let mut tokens = Vec::new();
        loop {
            let t = lexer.next();
            let done = t.kind == TokenKind::Eof;
            tokens.push(t);
            if done {
                break;
            }
        }
        tokens
    }

    #[test]
    fn lexes_whitespace_and_identifier() {
        let tokens = lex_all("  foo");
        assert_eq!(tokens[0].kind, TokenKind::Whitespace);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(&*tokens[1].text, "foo");
        assert_eq!(tokens[2].kind, TokenKind::Eof);
    }

    #[test]
    fn lexes_integer() {
        let tokens = lex_all("123");
        assert_eq!(tokens[0].int_value(), Some(123));
    }

    #[test]
    fn lexes_string() {
        let tokens = lex_all("\"hi\"");
        assert_eq!(tokens[0].kind, TokenKind::StringLit);
        assert_eq!(tokens[0].str_value(), Some("hi"));
    }

    #[test]
    fn collapses_consecutive_newlines() {
        let tokens = lex_all("a\n\n\nb");
        assert_eq!(tokens[1].kind, TokenKind::Newline);
        assert_eq!(&*tokens[1].text, "\n\n\n");
    }

    #[test]
    fn hash_at_beginning_of_line_is_not_pasted() {
        let tokens = lex_all("##");
        // Not at start of line relative to lexer state machine start --
        // the lexer begins at beginning-of-line, so this is still HASH at
        // BOL, then a second HASH (not HASHHASH) since BOL's special rule
        // only applies to the very first '#'.
        assert_eq!(tokens[0].kind, TokenKind::Punct(crate::token::Punct::Hash));
    }

    #[test]
    fn hash_hash_when_not_at_beginning_of_line() {
        let tokens = lex_all("a ##");
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Punct(crate::token::Punct::HashHash)));
    }

    #[test]
    fn c_comment_round_trips() {
        let tokens = lex_all("/* hi */");
        assert_eq!(tokens[0].kind, TokenKind::CComment);
        assert_eq!(&*tokens[0].text, "/* hi */");
    }

    #[test]
    fn cpp_comment_stops_before_newline() {
        let tokens = lex_all("// hi\nx");
        assert_eq!(tokens[0].kind, TokenKind::CppComment);
        assert_eq!(&*tokens[0].text, "// hi");
        assert_eq!(tokens[1].kind, TokenKind::Newline);
    }

    #[test]
    fn eof_is_returned_repeatedly() {
        let mut lexer = LexerSource::new("t", "", Features::empty());
        assert_eq!(lexer.next().kind, TokenKind::Eof);
        assert_eq!(lexer.next().kind, TokenKind::Eof);
    }

    #[test]
    fn unterminated_string_is_invalid() {
        let tokens = lex_all("\"abc");
        assert_eq!(tokens[0].kind, TokenKind::Invalid);
    }

    #[test]
    fn empty_char_literal_is_invalid() {
        let tokens = lex_all("''");
        assert_eq!(tokens[0].kind, TokenKind::Invalid);
    }

    #[test]
    fn nonempty_char_literal_is_a_character_token() {
        let tokens = lex_all("'x'");
        assert_eq!(tokens[0].kind, TokenKind::Character);
    }
}
