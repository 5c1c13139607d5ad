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

use std::fmt::{self, Display, Formatter};

/// A source code location: a 0-indexed line and column, or the synthetic
/// sentinel `-1, -1` for tokens that were not produced by lexing real text
/// (builtin-macro expansions, pasted identifiers, stringification results).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct Location {
    /// 0-indexed line number, or `-1` if synthetic.
    pub line: i32,

    /// 0-indexed column number, or `-1` if synthetic.
    pub column: i32,
}

impl Location {
    /// A location that does not correspond to real source text.
    pub const SYNTHETIC: Self = Self::new(-1, -1);

    /// The first position of a file.
    pub const BOF: Self = Self::new(0, 0);

    pub const fn new(line: i32, column: i32) -> Self {
        Self { line, column }
    }

    /// Returns `true` if this location was not produced by lexing real text.
    #[inline]
    pub const fn is_synthetic(&self) -> bool {
        self.line < 0 || self.column < 0
    }
}

impl Default for Location {
    #[inline]
    fn default() -> Self {
        Self::SYNTHETIC
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.is_synthetic() {
            write!(f, "?")
        } else {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_is_synthetic() {
        assert!(Location::SYNTHETIC.is_synthetic());
        assert!(!Location::BOF.is_synthetic());
    }

    #[test]
    fn display_real() {
        assert_eq!(format!("{}", Location::new(3, 7)), "3:7");
    }

    #[test]
    fn display_synthetic() {
        assert_eq!(format!("{}", Location::SYNTHETIC), "?");
    }
}
