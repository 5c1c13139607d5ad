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

//! Diagnostic payloads and the one truly fatal error condition.

use std::rc::Rc;
use thiserror::Error;

use crate::location::Location;

/// Every documented error condition, carrying enough context to format a
/// one-line message. This is the payload passed to
/// [`crate::listener::Listener::handle_warning`] /
/// [`handle_error`](crate::listener::Listener::handle_error).
#[derive(Error, Clone, Debug, PartialEq)]
pub enum Diagnostic {
    #[error("{loc}: unterminated string literal")]
    UnterminatedString { loc: Location },

    #[error("{loc}: unterminated character literal")]
    UnterminatedChar { loc: Location },

    #[error("{loc}: empty character literal")]
    EmptyCharLiteral { loc: Location },

    #[error("{loc}: unterminated comment")]
    UnterminatedComment { loc: Location },

    #[error("{loc}: invalid escape sequence '\\{escape}'")]
    BadEscape { loc: Location, escape: char },

    #[error("{loc}: invalid numeric suffix '{suffix}'")]
    BadNumericSuffix { loc: Location, suffix: Rc<str> },

    #[error("{loc}: illegal control character {ch:?}")]
    IllegalControlChar { loc: Location, ch: char },

    #[error("{loc}: #{directive} expects {expected}, found '{found}'")]
    MalformedDirective { loc: Location, directive: Rc<str>, expected: Rc<str>, found: Rc<str> },

    #[error("{loc}: #{directive} is not permitted here")]
    MisplacedDirective { loc: Location, directive: Rc<str> },

    #[error("{loc}: unknown directive '#{directive}'")]
    UnknownDirective { loc: Location, directive: Rc<str> },

    #[error("{loc}: unterminated conditional (missing #endif)")]
    UnterminatedConditional { loc: Location },

    #[error("{loc}: #{directive} without matching #if")]
    UnmatchedConditional { loc: Location, directive: Rc<str> },

    #[error("{loc}: '{name}' redefined with a different replacement list")]
    MacroRedefined { loc: Location, name: Rc<str> },

    #[error("{loc}: macro '{name}' expects {expected} argument(s), got {found}")]
    ArgumentCountMismatch { loc: Location, name: Rc<str>, expected: usize, found: usize },

    #[error("{loc}: '##' cannot paste '{left}' and '{right}' into a valid token")]
    InvalidPaste { loc: Location, left: Rc<str>, right: Rc<str> },

    #[error("{loc}: '#' is not followed by a macro parameter")]
    StringifyNonParameter { loc: Location },

    #[error("{loc}: division by zero in '#if' expression (treated as 0)")]
    DivisionByZero { loc: Location },

    #[error("{loc}: '{name}' is not defined")]
    UndefinedInExpression { loc: Location, name: Rc<str> },

    #[error("{loc}: malformed '#if' expression: {reason}")]
    MalformedExpression { loc: Location, reason: Rc<str> },

    #[error("{loc}: cannot find '{name}' in any of the searched directories")]
    IncludeNotFound { loc: Location, name: Rc<str> },

    #[error("{loc}: failed to read '{path}': {reason}")]
    IncludeReadError { loc: Location, path: Rc<str>, reason: Rc<str> },

    #[error("{loc}: include nesting too deep")]
    IncludeTooDeep { loc: Location },

    #[error("{loc}: unterminated argument list in call to macro '{name}'")]
    UnterminatedMacroCall { loc: Location, name: Rc<str> },

    #[error("{loc}: unknown pragma '{name}'")]
    UnknownPragma { loc: Location, name: Rc<str> },

    #[error("{loc}: {message}")]
    UserMessage { loc: Location, message: Rc<str> },
}

impl Diagnostic {
    /// Returns the location this diagnostic is anchored to.
    pub fn location(&self) -> Location {
        use Diagnostic::*;
        match *self {
            UnterminatedString { loc }
            | UnterminatedChar { loc }
            | EmptyCharLiteral { loc }
            | UnterminatedComment { loc }
            | BadEscape { loc, .. }
            | BadNumericSuffix { loc, .. }
            | IllegalControlChar { loc, .. }
            | MalformedDirective { loc, .. }
            | MisplacedDirective { loc, .. }
            | UnknownDirective { loc, .. }
            | UnterminatedConditional { loc }
            | UnmatchedConditional { loc, .. }
            | MacroRedefined { loc, .. }
            | ArgumentCountMismatch { loc, .. }
            | InvalidPaste { loc, .. }
            | StringifyNonParameter { loc }
            | DivisionByZero { loc }
            | UndefinedInExpression { loc, .. }
            | MalformedExpression { loc, .. }
            | IncludeNotFound { loc, .. }
            | IncludeReadError { loc, .. }
            | IncludeTooDeep { loc }
            | UnterminatedMacroCall { loc, .. }
            | UnknownPragma { loc, .. }
            | UserMessage { loc, .. } => loc,
        }
    }
}

/// The one truly unrecoverable condition: a warning or error was raised
/// while no [`Listener`](crate::listener::Listener) was registered to
/// receive it.
#[derive(Error, Clone, Debug, PartialEq)]
#[error("{0} (no listener registered to receive it)")]
pub struct FatalError(pub Diagnostic);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_formats_location() {
        let d = Diagnostic::UnterminatedString { loc: Location::new(3, 5) };
        assert_eq!(format!("{}", d), "3:5: unterminated string literal");
        assert_eq!(d.location(), Location::new(3, 5));
    }

    #[test]
    fn fatal_error_wraps_diagnostic() {
        let d = Diagnostic::DivisionByZero { loc: Location::BOF };
        let e = FatalError(d.clone());
        assert!(format!("{}", e).contains("no listener registered"));
    }
}
