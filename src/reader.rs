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

//! The physical-character layer: backslash-newline splicing and newline
//! normalization, beneath the token lexer.

use crate::location::Location;

/// The one piece of state needed to undo a single [`JoinReader::next`] call.
#[derive(Clone, Copy)]
struct Pending {
    pos: usize,
    line: i32,
    column: i32,
}

/// A rewindable cursor over logical characters, splicing backslash-newline
/// continuations and normalizing every recognized newline form to `'\n'`
/// before a lexer ever sees it.
///
/// Recognized newline forms: `\n`, `\r`, `\r\n`, U+2028 (LINE SEPARATOR),
/// U+2029 (PARAGRAPH SEPARATOR), U+000B (VT), U+000C (FF), and U+0085 (NEL).
/// Each collapses to a single logical `'\n'`; `\r\n` consumes both bytes but
/// yields one newline.
pub struct JoinReader {
    chars: Vec<char>,
    pos: usize,
    line: i32,
    column: i32,
    last: Option<Pending>,
}

#[inline]
fn is_newline_start(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}' | '\u{0B}' | '\u{0C}' | '\u{0085}')
}

impl JoinReader {
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            line: 0,
            column: 0,
            last: None,
        }
    }

    /// The location of the character that the next call to [`next`](Self::next)
    /// will return.
    #[inline]
    pub fn location(&self) -> Location {
        Location::new(self.line, self.column)
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    /// Advances past one raw (unspliced) character, normalizing any
    /// recognized newline form to `'\n'` and folding `\r\n` into one
    /// newline. Updates line/column. Returns `None` at end of input.
    fn advance_raw(&mut self) -> Option<char> {
        let c = *self.chars.get(self.pos)?;
        self.pos += 1;

        if is_newline_start(c) {
            if c == '\r' && self.chars.get(self.pos) == Some(&'\n') {
                self.pos += 1;
            }
            self.line += 1;
            self.column = 0;
            Some('\n')
        } else {
            self.column += 1;
            Some(c)
        }
    }

    /// Returns the next logical character, splicing away any number of
    /// consecutive backslash-newline continuations first.
    pub fn next(&mut self) -> Option<char> {
        loop {
            let pending = Pending { pos: self.pos, line: self.line, column: self.column };

            let c = match self.advance_raw() {
                Some(c) => c,
                None => {
                    self.last = None;
                    return None;
                }
            };

            if c == '\\' {
                let splice_point = self.pos;
                match self.advance_raw() {
                    Some('\n') => continue,
                    _ => {
                        self.pos = splice_point;
                    }
                }
            }

            self.last = Some(pending);
            return Some(c);
        }
    }

    /// Un-reads the single character most recently returned by
    /// [`next`](Self::next).
    ///
    /// # Panics
    ///
    /// Panics if called twice in a row without an intervening `next()`.
    pub fn unread(&mut self) {
        let pending = self
            .last
            .take()
            .expect("JoinReader::unread called without a preceding next()");
        self.pos = pending.pos;
        self.line = pending.line;
        self.column = pending.column;
    }

    /// Returns the next logical character without consuming it.
    ///
    /// Does not disturb whatever pending state a prior, still-unconsumed
    /// `next()` left behind, so a caller may freely interleave `peek()`
    /// with a later `unread()` of that earlier character.
    pub fn peek(&mut self) -> Option<char> {
        let saved = self.last;
        let c = self.next();
        if let Some(pending) = self.last.take() {
            self.pos = pending.pos;
            self.line = pending.line;
            self.column = pending.column;
        }
        self.last = saved;
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_eof() {
        let mut r = JoinReader::new("");
        assert!(r.is_eof());
        assert_eq!(r.next(), None);
    }

    #[test]
    fn plain_text() {
        let mut r = JoinReader::new("ab");
        assert_eq!(r.next(), Some('a'));
        assert_eq!(r.next(), Some('b'));
        assert_eq!(r.next(), None);
    }

    #[test]
    fn splices_backslash_lf() {
        let mut r = JoinReader::new("a\\\nb");
        assert_eq!(r.next(), Some('a'));
        assert_eq!(r.next(), Some('b'));
        assert_eq!(r.next(), None);
    }

    #[test]
    fn splices_backslash_crlf() {
        let mut r = JoinReader::new("a\\\r\nb");
        assert_eq!(r.next(), Some('a'));
        assert_eq!(r.next(), Some('b'));
        assert_eq!(r.next(), None);
    }

    #[test]
    fn splices_multiple_continuations() {
        let mut r = JoinReader::new("a\\\n\\\nb");
        assert_eq!(r.next(), Some('a'));
        assert_eq!(r.next(), Some('b'));
    }

    #[test]
    fn backslash_not_followed_by_newline_is_literal() {
        let mut r = JoinReader::new("a\\b");
        assert_eq!(r.next(), Some('a'));
        assert_eq!(r.next(), Some('\\'));
        assert_eq!(r.next(), Some('b'));
    }

    #[test]
    fn normalizes_crlf_to_lf() {
        let mut r = JoinReader::new("a\r\nb");
        assert_eq!(r.next(), Some('a'));
        assert_eq!(r.next(), Some('\n'));
        assert_eq!(r.next(), Some('b'));
    }

    #[test]
    fn normalizes_unicode_newlines() {
        for nl in ['\u{2028}', '\u{2029}', '\u{0B}', '\u{0C}', '\u{0085}'] {
            let text: String = ['x', nl, 'y'].iter().collect();
            let mut r = JoinReader::new(&text);
            assert_eq!(r.next(), Some('x'));
            assert_eq!(r.next(), Some('\n'));
            assert_eq!(r.next(), Some('y'));
        }
    }

    #[test]
    fn tracks_line_and_column() {
        let mut r = JoinReader::new("ab\ncd");
        assert_eq!(r.location(), Location::new(0, 0));
        r.next();
        assert_eq!(r.location(), Location::new(0, 1));
        r.next();
        assert_eq!(r.location(), Location::new(0, 2));
        r.next(); // newline
        assert_eq!(r.location(), Location::new(1, 0));
        r.next();
        assert_eq!(r.location(), Location::new(1, 1));
    }

    #[test]
    fn unread_restores_position_and_location() {
        let mut r = JoinReader::new("ab");
        r.next();
        let loc = r.location();
        r.next();
        r.unread();
        assert_eq!(r.location(), loc);
        assert_eq!(r.next(), Some('b'));
    }

    #[test]
    #[should_panic]
    fn unread_without_next_panics() {
        let mut r = JoinReader::new("ab");
        r.unread();
    }

    #[test]
    fn peek_does_not_consume() {
        let mut r = JoinReader::new("ab");
        assert_eq!(r.peek(), Some('a'));
        assert_eq!(r.peek(), Some('a'));
        assert_eq!(r.next(), Some('a'));
        assert_eq!(r.next(), Some('b'));
    }

    #[test]
    fn peek_does_not_disturb_pending_unread() {
        let mut r = JoinReader::new("abc");
        assert_eq!(r.next(), Some('a'));
        assert_eq!(r.peek(), Some('b'));
        assert_eq!(r.peek(), Some('b'));
        r.unread();
        assert_eq!(r.next(), Some('a'));
        assert_eq!(r.next(), Some('b'));
    }

    #[test]
    fn eof_is_idempotent() {
        let mut r = JoinReader::new("a");
        assert_eq!(r.next(), Some('a'));
        assert_eq!(r.next(), None);
        assert_eq!(r.next(), None);
    }
}
