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

//! Numeric constant sublexer: octal (`0` prefix), hex (`0x`/`0X` prefix),
//! and decimal integers, with suffix letters `u`/`U`/`l`/`L`/`i`/`I` in any
//! combination.

use crate::error::Diagnostic;
use crate::location::Location;
use crate::reader::JoinReader;

pub struct Number {
    pub text: String,
    pub value: i64,
}

fn is_suffix_char(c: char) -> bool {
    matches!(c, 'u' | 'U' | 'l' | 'L' | 'i' | 'I')
}

/// Scans the remainder of a numeric constant, given that its first digit
/// `first` has already been consumed by the caller.
pub fn scan(
    reader: &mut JoinReader,
    first: char,
    loc: Location,
) -> Result<Number, Diagnostic> {
    let mut text = String::new();
    text.push(first);

    let radix = if first == '0' {
        match reader.peek() {
            Some('x') | Some('X') => {
                text.push(reader.next().unwrap());
                16
            }
            Some(c) if c.is_digit(8) => 8,
            _ => 8,
        }
    } else {
        10
    };

    while let Some(c) = reader.peek() {
        if c.is_digit(radix) {
            reader.next();
            text.push(c);
        } else {
            break;
        }
    }

    let digits_end = text.len();

    let mut suffix = String::new();
    while let Some(c) = reader.peek() {
        if is_suffix_char(c) {
            reader.next();
            suffix.push(c);
            text.push(c);
        } else {
            break;
        }
    }

    // Anything else continuing the token as an identifier character is a
    // malformed suffix (e.g. `123abc`).
    if let Some(c) = reader.peek() {
        if c.is_alphanumeric() || c == '_' {
            reader.next();
            text.push(c);
            return Err(Diagnostic::BadNumericSuffix { loc, suffix: text.into() });
        }
    }

    let digits = &text[if radix == 16 { 2 } else { 0 }..digits_end];
    let digits = if digits.is_empty() { "0" } else { digits };

    let value = i64::from_str_radix(digits, radix).unwrap_or(0);

    Ok(Number { text, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_str(s: &str) -> Number {
        let mut chars = s.chars();
        let first = chars.next().unwrap();
        let mut r = JoinReader::new(chars.as_str());
        scan(&mut r, first, Location::BOF).unwrap()
    }

    #[test]
    fn decimal() {
        let n = scan_str("123");
        assert_eq!(n.value, 123);
        assert_eq!(n.text, "123");
    }

    #[test]
    fn hex() {
        let n = scan_str("0xFF");
        assert_eq!(n.value, 255);
    }

    #[test]
    fn octal() {
        let n = scan_str("017");
        assert_eq!(n.value, 15);
    }

    #[test]
    fn zero_is_octal_with_no_digits() {
        let n = scan_str("0");
        assert_eq!(n.value, 0);
    }

    #[test]
    fn suffix_is_retained_in_text() {
        let n = scan_str("42UL");
        assert_eq!(n.value, 42);
        assert_eq!(n.text, "42UL");
    }

    #[test]
    fn bad_suffix_is_an_error() {
        let mut chars = "12xyz".chars();
        let first = chars.next().unwrap();
        let mut r = JoinReader::new(chars.as_str());
        assert!(scan(&mut r, first, Location::BOF).is_err());
    }
}
