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

//! Configuration bitsets.
//!
//! A preprocessor library has no on-disk configuration format of its own --
//! the CLI layer that would read one is out of scope -- so these flags are
//! set through `Default` plus builder-style `with_*` methods on
//! [`crate::driver::Preprocessor`].

use bitflags::bitflags;

bitflags! {
    /// Feature toggles that change how the preprocessor lexes or emits
    /// tokens.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct Features: u32 {
        /// Recognize `<:`, `:>`, `<%`, `%>`, `%:`, `%:%:` as `[`, `]`, `{`,
        /// `}`, `#`, `##` respectively.
        const DIGRAPHS         = 1 << 0;
        /// Emit `# <line> "<path>"<flags>` line markers at file entry/return.
        const LINEMARKERS      = 1 << 1;
        /// Recognize `#include_next`.
        const INCLUDENEXT      = 1 << 2;
        /// Preserve `//` and `/* */` comments as tokens outside directives.
        const KEEPCOMMENTS     = 1 << 3;
        /// Preserve comments even inside directive lines.
        const KEEPALLCOMMENTS  = 1 << 4;
        /// Enable verbose internal tracing beyond the `log` crate's usual
        /// level filtering.
        const DEBUG            = 1 << 5;
        /// Surface lex-level errors (bad escapes, unterminated literals) to
        /// the listener in addition to producing `INVALID` tokens.
        const CSYNTAX          = 1 << 6;
        /// Accept identifiers containing non-ASCII `XID_Start`/`XID_Continue`
        /// characters, per `unicode-xid`.
        const UNICODE_IDENT     = 1 << 7;
    }
}

bitflags! {
    /// Diagnostic toggles controlling which conditions warn.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct Warnings: u32 {
        /// Promote every warning to an error.
        const ERROR          = 1 << 0;
        /// Warn when `#endif`/`#else` carry a trailing comment-free label.
        const ENDIF_LABELS   = 1 << 1;
        /// Warn when an undefined identifier appears in a `#if` expression.
        const UNDEF          = 1 << 2;
    }
}
