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

//! Character and string literal sublexer, plus header-name scanning for the
//! operand of `#include`.

use crate::error::Diagnostic;
use crate::lexer::esc;
use crate::location::Location;
use crate::reader::JoinReader;

pub struct Quoted {
    /// Raw source text, including the delimiters.
    pub text: String,
    /// Decoded contents (no delimiters, escapes resolved).
    pub decoded: String,
    /// Non-fatal diagnostics accumulated while decoding (unrecognized
    /// escapes).
    pub warnings: Vec<Diagnostic>,
}

/// Scans a character constant. `reader` is positioned just after the
/// opening `'`.
pub fn scan_char(reader: &mut JoinReader, loc: Location) -> Result<Quoted, Diagnostic> {
    scan_quoted(reader, loc, '\'', Diagnostic::UnterminatedChar { loc })
}

/// Scans a string literal. `reader` is positioned just after the opening
/// `"`.
pub fn scan_string(reader: &mut JoinReader, loc: Location) -> Result<Quoted, Diagnostic> {
    scan_quoted(reader, loc, '"', Diagnostic::UnterminatedString { loc })
}

fn scan_quoted(
    reader: &mut JoinReader,
    loc: Location,
    quote: char,
    unterminated: Diagnostic,
) -> Result<Quoted, Diagnostic> {
    let mut text = String::new();
    text.push(quote);
    let mut decoded = String::new();
    let mut warnings = Vec::new();

    loop {
        match reader.next() {
            None | Some('\n') => return Err(unterminated),
            Some(c) if c == quote => {
                text.push(c);
                break;
            }
            Some('\\') => {
                text.push('\\');
                let escape_loc = reader.location();
                let e = esc::decode_escape(reader, escape_loc)?;
                decoded.push(e.value);
                if let Some(w) = e.unrecognized {
                    warnings.push(w);
                }
            }
            Some(c) => {
                text.push(c);
                decoded.push(c);
            }
        }
    }

    Ok(Quoted { text, decoded, warnings })
}

/// Scans a `<...>` header name (no escape processing; closes at the first
/// unescaped `>`). `reader` is positioned just after the opening `<`.
pub fn scan_header_angle(reader: &mut JoinReader, loc: Location) -> Result<Quoted, Diagnostic> {
    let mut text = String::from("<");
    let mut decoded = String::new();

    loop {
        match reader.next() {
            None | Some('\n') => {
                return Err(Diagnostic::MalformedDirective {
                    loc,
                    directive: "include".into(),
                    expected: "a closing '>'".into(),
                    found: "end of line".into(),
                })
            }
            Some('>') => {
                text.push('>');
                break;
            }
            Some(c) => {
                text.push(c);
                decoded.push(c);
            }
        }
    }

    Ok(Quoted { text, decoded, warnings: Vec::new() })
}

/// Scans a `"..."` header name in header-name mode: backslashes are *not*
/// escapes here, unlike an ordinary string literal.
pub fn scan_header_quote(reader: &mut JoinReader, loc: Location) -> Result<Quoted, Diagnostic> {
    let mut text = String::from("\"");
    let mut decoded = String::new();

    loop {
        match reader.next() {
            None | Some('\n') => return Err(Diagnostic::UnterminatedString { loc }),
            Some('"') => {
                text.push('"');
                break;
            }
            Some(c) => {
                text.push(c);
                decoded.push(c);
            }
        }
    }

    Ok(Quoted { text, decoded, warnings: Vec::new() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_simple_string() {
        let mut r = JoinReader::new("hello\"");
        let q = scan_string(&mut r, Location::BOF).unwrap();
        assert_eq!(q.decoded, "hello");
        assert_eq!(q.text, "\"hello\"");
    }

    #[test]
    fn scans_string_with_escape() {
        let mut r = JoinReader::new("a\\nb\"");
        let q = scan_string(&mut r, Location::BOF).unwrap();
        assert_eq!(q.decoded, "a\nb");
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let mut r = JoinReader::new("abc");
        assert!(scan_string(&mut r, Location::BOF).is_err());
    }

    #[test]
    fn unterminated_string_at_newline_is_an_error() {
        let mut r = JoinReader::new("abc\ndef\"");
        assert!(scan_string(&mut r, Location::BOF).is_err());
    }

    #[test]
    fn scans_char_constant() {
        let mut r = JoinReader::new("x'");
        let q = scan_char(&mut r, Location::BOF).unwrap();
        assert_eq!(q.decoded, "x");
    }

    #[test]
    fn header_angle_ignores_escapes() {
        let mut r = JoinReader::new("foo\\bar.h>");
        let q = scan_header_angle(&mut r, Location::BOF).unwrap();
        assert_eq!(q.decoded, "foo\\bar.h");
    }

    #[test]
    fn header_quote_ignores_escapes() {
        let mut r = JoinReader::new("foo\\bar.h\"");
        let q = scan_header_quote(&mut r, Location::BOF).unwrap();
        assert_eq!(q.decoded, "foo\\bar.h");
    }
}
