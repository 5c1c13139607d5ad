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

//! Punctuator sublexer: longest match from the multi-character table, plus
//! digraphs under [`Features::DIGRAPHS`].

use crate::flags::Features;
use crate::reader::JoinReader;
use crate::token::Punct;

/// Scans a punctuator given its first character `first`, already consumed
/// by the caller. Consumes as many further characters as the longest
/// matching punctuator requires.
pub fn scan(reader: &mut JoinReader, first: char, features: Features) -> Punct {
    if features.contains(Features::DIGRAPHS) {
        if let Some(p) = scan_digraph(reader, first) {
            return p;
        }
    }

    match first {
        '&' => {
            if eat(reader, '&') {
                if eat(reader, '=') { Punct::AmpAmpEq } else { Punct::AmpAmp }
            } else if eat(reader, '=') {
                Punct::AmpEq
            } else {
                Punct::Char(b'&')
            }
        }
        '-' => {
            if eat(reader, '>') {
                Punct::Arrow
            } else if eat(reader, '-') {
                Punct::MinusMinus
            } else if eat(reader, '=') {
                Punct::MinusEq
            } else {
                Punct::Char(b'-')
            }
        }
        '/' => {
            if eat(reader, '=') { Punct::SlashEq } else { Punct::Char(b'/') }
        }
        '.' => {
            if eat(reader, '.') {
                if eat(reader, '.') { Punct::Ellipsis } else { Punct::DotDot }
            } else {
                Punct::Char(b'.')
            }
        }
        '=' => {
            if eat(reader, '=') { Punct::EqEq } else { Punct::Char(b'=') }
        }
        '>' => {
            if eat(reader, '=') {
                Punct::GtEq
            } else if eat(reader, '>') {
                if eat(reader, '=') { Punct::GtGtEq } else { Punct::GtGt }
            } else {
                Punct::Char(b'>')
            }
        }
        '<' => {
            if eat(reader, '=') {
                Punct::LtEq
            } else if eat(reader, '<') {
                if eat(reader, '=') { Punct::LtLtEq } else { Punct::LtLt }
            } else {
                Punct::Char(b'<')
            }
        }
        '#' => {
            if eat(reader, '#') { Punct::HashHash } else { Punct::Hash }
        }
        '+' => {
            if eat(reader, '+') {
                Punct::PlusPlus
            } else if eat(reader, '=') {
                Punct::PlusEq
            } else {
                Punct::Char(b'+')
            }
        }
        '|' => {
            if eat(reader, '|') {
                if eat(reader, '=') { Punct::PipePipeEq } else { Punct::PipePipe }
            } else if eat(reader, '=') {
                Punct::PipeEq
            } else {
                Punct::Char(b'|')
            }
        }
        '%' => {
            if eat(reader, '=') { Punct::PercentEq } else { Punct::Char(b'%') }
        }
        '*' => {
            if eat(reader, '=') { Punct::StarEq } else { Punct::Char(b'*') }
        }
        '!' => {
            if eat(reader, '=') { Punct::BangEq } else { Punct::Char(b'!') }
        }
        '^' => {
            if eat(reader, '=') { Punct::CaretEq } else { Punct::Char(b'^') }
        }
        c if c.is_ascii() => Punct::Char(c as u8),
        _ => Punct::Char(b'?'),
    }
}

fn scan_digraph(reader: &mut JoinReader, first: char) -> Option<Punct> {
    match first {
        '<' if eat(reader, ':') => Some(Punct::Char(b'[')),
        '<' if eat(reader, '%') => Some(Punct::Char(b'{')),
        ':' if eat(reader, '>') => Some(Punct::Char(b']')),
        '%' if eat(reader, '>') => Some(Punct::Char(b'}')),
        '%' if eat(reader, ':') => {
            // Look ahead for a second "%:" without committing to consuming
            // the '%' unless the ':' that must follow it is also present.
            match reader.next() {
                Some('%') => {
                    if eat(reader, ':') {
                        Some(Punct::HashHash)
                    } else {
                        reader.unread();
                        Some(Punct::Hash)
                    }
                }
                Some(_) => {
                    reader.unread();
                    Some(Punct::Hash)
                }
                None => Some(Punct::Hash),
            }
        }
        _ => None,
    }
}

fn eat(reader: &mut JoinReader, want: char) -> bool {
    match reader.peek() {
        Some(c) if c == want => {
            reader.next();
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_str(s: &str, features: Features) -> Punct {
        let mut chars = s.chars();
        let first = chars.next().unwrap();
        let mut r = JoinReader::new(chars.as_str());
        scan(&mut r, first, features)
    }

    #[test]
    fn single_char_punctuators() {
        assert_eq!(scan_str("(", Features::empty()), Punct::Char(b'('));
        assert_eq!(scan_str(";", Features::empty()), Punct::Char(b';'));
    }

    #[test]
    fn multi_char_punctuators() {
        assert_eq!(scan_str("->", Features::empty()), Punct::Arrow);
        assert_eq!(scan_str("...", Features::empty()), Punct::Ellipsis);
        assert_eq!(scan_str("..", Features::empty()), Punct::DotDot);
        assert_eq!(scan_str("##", Features::empty()), Punct::HashHash);
        assert_eq!(scan_str("&&=", Features::empty()), Punct::AmpAmpEq);
        assert_eq!(scan_str(">>=", Features::empty()), Punct::GtGtEq);
    }

    #[test]
    fn digraphs_require_feature() {
        assert_eq!(scan_str("<:", Features::empty()), Punct::Char(b'<'));
        assert_eq!(scan_str("<:", Features::DIGRAPHS), Punct::Char(b'['));
        assert_eq!(scan_str(":>", Features::DIGRAPHS), Punct::Char(b']'));
        assert_eq!(scan_str("<%", Features::DIGRAPHS), Punct::Char(b'{'));
        assert_eq!(scan_str("%>", Features::DIGRAPHS), Punct::Char(b'}'));
        assert_eq!(scan_str("%:", Features::DIGRAPHS), Punct::Hash);
        assert_eq!(scan_str("%:%:", Features::DIGRAPHS), Punct::HashHash);
    }
}
