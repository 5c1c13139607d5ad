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

//! Escape sequence sublexer, shared by character and string literal scanning.
//!
//! Sequence | Description
//! ---------|:-----------
//! `\a`     | bell
//! `\b`     | backspace
//! `\f`     | form feed
//! `\n`     | line feed
//! `\r`     | carriage return
//! `\t`     | horizontal tab
//! `\v`     | vertical tab
//! `\\`     | backslash
//! `\'`     | single quote
//! `\"`     | double quote
//! `\NNN`   | octal, 1 to 3 digits
//! `\xHH`   | hex, 1 to 2 digits
//!
//! Any other character following `\` is not a recognized escape: it is
//! passed through verbatim, and the caller is told so it can raise a
//! non-fatal warning.

use crate::error::Diagnostic;
use crate::location::Location;
use crate::reader::JoinReader;

/// Outcome of decoding one escape sequence.
pub struct Escape {
    /// The decoded character.
    pub value: char,
    /// Set when the escape was not one of the recognized forms and was
    /// passed through literally.
    pub unrecognized: Option<Diagnostic>,
}

/// Decodes one escape sequence. The reader must be positioned just after the
/// introducing backslash. Returns `Err` only for a malformed `\x`/octal
/// escape that consumed no valid digits, or for an escape immediately
/// followed by end of input.
pub fn decode_escape(reader: &mut JoinReader, loc: Location) -> Result<Escape, Diagnostic> {
    let c = reader.next().ok_or(Diagnostic::UnterminatedChar { loc })?;

    let value = match c {
        'a' => '\u{7}',
        'b' => '\u{8}',
        'f' => '\u{C}',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'v' => '\u{B}',
        '\\' => '\\',
        '\'' => '\'',
        '"' => '"',
        '0'..='7' => {
            let mut n = c.to_digit(8).unwrap();
            for _ in 0..2 {
                match reader.peek() {
                    Some(d) if d.is_digit(8) => {
                        reader.next();
                        n = n * 8 + d.to_digit(8).unwrap();
                    }
                    _ => break,
                }
            }
            return Ok(Escape { value: char::from_u32(n).unwrap_or('\u{FFFD}'), unrecognized: None });
        }
        'x' => {
            let mut n: u32 = 0;
            let mut count = 0;
            for _ in 0..2 {
                match reader.peek() {
                    Some(d) if d.is_ascii_hexdigit() => {
                        reader.next();
                        n = n * 16 + d.to_digit(16).unwrap();
                        count += 1;
                    }
                    _ => break,
                }
            }
            if count == 0 {
                return Err(Diagnostic::BadEscape { loc, escape: 'x' });
            }
            return Ok(Escape { value: char::from_u32(n).unwrap_or('\u{FFFD}'), unrecognized: None });
        }
        other => {
            return Ok(Escape {
                value: other,
                unrecognized: Some(Diagnostic::BadEscape { loc, escape: other }),
            });
        }
    };

    Ok(Escape { value, unrecognized: None })
}
