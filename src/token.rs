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

//! Preprocessing tokens.

use std::fmt::{self, Display, Formatter};
use std::rc::Rc;

use crate::location::Location;

/// A punctuator token's canonical spelling.
///
/// `Char` covers every single-character ASCII punctuator (`(`, `)`, `;`,
/// `.`, and so on); the named variants cover the multi-character
/// punctuators that a C preprocessor must recognize as a single token.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Punct {
    /// Any single-byte punctuator, e.g. `(`, `}`, `;`, `.`, `+`.
    Char(u8),

    /// `&=`
    AmpEq,
    /// `->`
    Arrow,
    /// `--`
    MinusMinus,
    /// `/=`
    SlashEq,
    /// `...`
    Ellipsis,
    /// `==`
    EqEq,
    /// `>=`
    GtEq,
    /// `#`
    Hash,
    /// `++`
    PlusPlus,
    /// `&&`
    AmpAmp,
    /// `&&=`
    AmpAmpEq,
    /// `<=`
    LtEq,
    /// `||`
    PipePipe,
    /// `||=`
    PipePipeEq,
    /// `<<`
    LtLt,
    /// `<<=`
    LtLtEq,
    /// `%=`
    PercentEq,
    /// `*=`
    StarEq,
    /// `!=`
    BangEq,
    /// `|=`
    PipeEq,
    /// `##`
    HashHash,
    /// `+=`
    PlusEq,
    /// `..`
    DotDot,
    /// `>>`
    GtGt,
    /// `>>=`
    GtGtEq,
    /// `-=`
    MinusEq,
    /// `^=`
    CaretEq,
}

impl Punct {
    /// Returns the canonical spelling of this punctuator.
    pub fn spelling(&self) -> &'static str {
        use Punct::*;
        match self {
            Char(b'(') => "(",
            Char(b')') => ")",
            Char(b'{') => "{",
            Char(b'}') => "}",
            Char(b'[') => "[",
            Char(b']') => "]",
            Char(b';') => ";",
            Char(b',') => ",",
            Char(b'.') => ".",
            Char(b'+') => "+",
            Char(b'-') => "-",
            Char(b'*') => "*",
            Char(b'/') => "/",
            Char(b'%') => "%",
            Char(b'=') => "=",
            Char(b'<') => "<",
            Char(b'>') => ">",
            Char(b'!') => "!",
            Char(b'~') => "~",
            Char(b'&') => "&",
            Char(b'|') => "|",
            Char(b'^') => "^",
            Char(b'?') => "?",
            Char(b':') => ":",
            Char(_)    => "",
            AmpEq      => "&=",
            Arrow      => "->",
            MinusMinus => "--",
            SlashEq    => "/=",
            Ellipsis   => "...",
            EqEq       => "==",
            GtEq       => ">=",
            Hash       => "#",
            PlusPlus   => "++",
            AmpAmp     => "&&",
            AmpAmpEq   => "&&=",
            LtEq       => "<=",
            PipePipe   => "||",
            PipePipeEq => "||=",
            LtLt       => "<<",
            LtLtEq     => "<<=",
            PercentEq  => "%=",
            StarEq     => "*=",
            BangEq     => "!=",
            PipeEq     => "|=",
            HashHash   => "##",
            PlusEq     => "+=",
            DotDot     => "..",
            GtGt       => ">>",
            GtGtEq     => ">>=",
            MinusEq    => "-=",
            CaretEq    => "^=",
        }
    }
}

/// The kind of a preprocessing token.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TokenKind {
    /// An identifier or keyword: `{letter|_|$}{letter|digit|_|$}*`.
    Identifier,
    /// An integer constant, decoded into the token's [`Value::Int`].
    Integer,
    /// A character constant, decoded into the token's [`Value::Char`].
    Character,
    /// A string literal, decoded into the token's [`Value::Str`].
    StringLit,
    /// A `<...>` or `"..."` header name, valid only while scanning the
    /// operand of `#include`.
    Header,
    /// A run of non-newline spacing characters.
    Whitespace,
    /// A `/* ... */` comment, text including the delimiters.
    CComment,
    /// A `// ...` comment, text including the delimiters.
    CppComment,
    /// One or more consecutive newlines, collapsed to a single token.
    Newline,
    /// A punctuator; see [`Punct`] for the exact spelling.
    Punct(Punct),
    /// Internal: a reference to macro argument `i` in a replacement list.
    MArg(usize),
    /// Internal: a token-paste marker; operands follow in the replacement list.
    MPaste,
    /// Internal: a stringification of macro argument `i`.
    MString(usize),
    /// A synthesized `# <line> "<path>" <flags>` line marker.
    PLine,
    /// End of input. Terminal; may be returned repeatedly.
    Eof,
    /// A token that could not be lexed; [`Value::Invalid`] carries the reason.
    Invalid,
}

/// The decoded semantic payload of a token, when it has one.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// The decoded value of an `Integer` or a `Character` token (the latter
    /// holding the integer value of its first character), or the result of
    /// `defined`/`__has_include`/etc. during expression evaluation.
    Int(i64),
    /// The decoded value of a `StringLit` or `Header` token.
    Str(Rc<str>),
    /// The decoded value of a `Character` token.
    Char(char),
    /// The reason a token could not be lexed.
    Invalid(Rc<str>),
}

/// A single preprocessing token.
///
/// Immutable once created. `text` is the raw source spelling (escapes and
/// whitespace preserved verbatim); `value` is the decoded semantic payload,
/// present only for the kinds that have one.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: Rc<str>,
    pub value: Option<Value>,
    pub loc: Location,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<Rc<str>>, loc: Location) -> Self {
        Self { kind, text: text.into(), value: None, loc }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_value_opt(mut self, value: Option<Value>) -> Self {
        self.value = value;
        self
    }

    /// Synthesizes a token with no corresponding source text location.
    pub fn synthetic(kind: TokenKind, text: impl Into<Rc<str>>) -> Self {
        Self::new(kind, text, Location::SYNTHETIC)
    }

    /// Returns a punctuator token with its canonical spelling as text.
    pub fn punct(p: Punct, loc: Location) -> Self {
        Self::new(TokenKind::Punct(p), p.spelling(), loc)
    }

    pub fn eof(loc: Location) -> Self {
        Self::new(TokenKind::Eof, "", loc)
    }

    /// Returns `true` for whitespace, comments -- tokens that carry no
    /// syntactic meaning of their own.
    pub fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Whitespace | TokenKind::CComment | TokenKind::CppComment
        )
    }

    pub fn int_value(&self) -> Option<i64> {
        match &self.value {
            Some(Value::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn str_value(&self) -> Option<&str> {
        match &self.value {
            Some(Value::Str(s)) => Some(s),
            _ => None,
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}
