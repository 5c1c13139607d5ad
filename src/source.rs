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

//! The source stack: a polymorphic pull source of tokens.
//!
//! Conceptually a singly linked stack (current source, its caller, ...);
//! the natural Rust expression of that shape is a `Vec` held by the
//! [`crate::driver::Preprocessor`] and pushed/popped as a unit, one
//! [`Source`] per level, rather than a hand-rolled linked list of owned
//! boxes.

use std::rc::Rc;

use crate::error::Diagnostic;
use crate::flags::Features;
use crate::lexer::LexerSource;
use crate::location::Location;
use crate::macros::MacroTokenSource;
use crate::token::Token;

/// Plays back a fixed, in-memory list of tokens as a Source. Used for
/// macro argument pre-expansion and for built-in macros like `__LINE__`
/// that expand to exactly one synthesized token.
pub struct FixedTokenSource {
    tokens: Vec<Token>,
    pos: usize,
}

impl FixedTokenSource {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn next(&mut self) -> Token {
        match self.tokens.get(self.pos) {
            Some(t) => {
                self.pos += 1;
                t.clone()
            }
            None => Token::eof(Location::SYNTHETIC),
        }
    }
}

/// A variant over the kinds of token producers that can occupy one level
/// of the source stack.
pub enum SourceKind {
    Lexer(LexerSource),
    Fixed(FixedTokenSource),
    Macro(Box<MacroTokenSource>),
}

/// One level of the source stack: a token producer plus the bookkeeping
/// the driver needs regardless of which kind of producer it is.
pub struct Source {
    pub kind: SourceKind,

    /// `false` while lexing inside a dead `#if` branch.
    pub active: bool,

    /// Whether this source should be popped automatically when it yields
    /// `EOF`, rather than leaving the decision to the driver.
    pub auto_pop: bool,

    /// Name used in diagnostics and `__FILE__`/line markers.
    pub path: Rc<str>,

    /// The macro this source is expanding, if it is a `Macro` source --
    /// used by the recursion guard.
    pub expanding: Option<Rc<str>>,

    /// For a `Lexer` source opened via `#include`/`#include_next`: the
    /// search-list index the file was found at, so a nested
    /// `#include_next` knows where to resume.
    pub search_index: Option<usize>,

    /// Diagnostics produced by a `Lexer` source since the last drain.
    features: Features,
}

impl Source {
    pub fn from_lexer(lexer: LexerSource, auto_pop: bool) -> Self {
        let path = lexer.path().clone();
        Self {
            kind: SourceKind::Lexer(lexer),
            active: true,
            auto_pop,
            path,
            expanding: None,
            search_index: None,
            features: Features::empty(),
        }
    }

    pub fn from_fixed(tokens: Vec<Token>, path: impl Into<Rc<str>>, auto_pop: bool) -> Self {
        Self {
            kind: SourceKind::Fixed(FixedTokenSource::new(tokens)),
            active: true,
            auto_pop,
            path: path.into(),
            expanding: None,
            search_index: None,
            features: Features::empty(),
        }
    }

    pub fn from_macro(src: MacroTokenSource, name: Rc<str>, path: impl Into<Rc<str>>) -> Self {
        Self {
            kind: SourceKind::Macro(Box::new(src)),
            active: true,
            auto_pop: true,
            path: path.into(),
            expanding: Some(name),
            search_index: None,
            features: Features::empty(),
        }
    }

    /// Pulls the next token from this source.
    pub fn next(&mut self) -> Token {
        match &mut self.kind {
            SourceKind::Lexer(l) => l.next(),
            SourceKind::Fixed(f) => f.next(),
            SourceKind::Macro(m) => m.next(),
        }
    }

    pub fn location(&self) -> Location {
        match &self.kind {
            SourceKind::Lexer(l) => l.location(),
            _ => Location::SYNTHETIC,
        }
    }

    pub fn set_in_include(&mut self, value: bool) {
        if let SourceKind::Lexer(l) = &mut self.kind {
            l.set_in_include(value);
        }
    }

    pub fn is_beginning_of_line(&self) -> bool {
        match &self.kind {
            SourceKind::Lexer(l) => l.is_beginning_of_line(),
            _ => false,
        }
    }

    /// Drains diagnostics (lex-level, or malformed pastes) accumulated
    /// since the last call.
    pub fn take_pending_diagnostics(&mut self) -> Vec<Diagnostic> {
        match &mut self.kind {
            SourceKind::Lexer(l) => l.take_pending_diagnostics(),
            SourceKind::Macro(m) => m.take_pending_diagnostics(),
            SourceKind::Fixed(_) => Vec::new(),
        }
    }
}
