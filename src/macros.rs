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

//! Macro storage and replacement-list playback.
//!
//! A macro's replacement list is stored once, as parsed by `#define`, with
//! parameter references already rewritten to `M_ARG`/`M_STRING` and `##` to
//! the `M_PASTE` prefix marker. Each invocation gets its own
//! [`MacroTokenSource`] that walks that shared list, holding only the
//! per-call [`Argument`]s it needs to substitute in.

use std::collections::VecDeque;
use std::rc::Rc;

use log::trace;

use crate::error::Diagnostic;
use crate::flags::Features;
use crate::lexer::LexerSource;
use crate::location::Location;
use crate::token::{Punct, Token, TokenKind};

/// A stored macro definition.
#[derive(Clone, Debug, PartialEq)]
pub struct Macro {
    pub name: Rc<str>,

    /// `None` for an object-like macro. `Some(params)` for a function-like
    /// macro, where `params` includes a trailing `__VA_ARGS__` entry when
    /// `variadic` is set.
    pub params: Option<Vec<Rc<str>>>,

    pub variadic: bool,

    /// The replacement list, with parameter references already rewritten
    /// to `M_ARG(i)`/`M_STRING(i)` and `##` to the `M_PASTE` prefix marker.
    /// Shared (never cloned) across every invocation of this macro.
    pub replacement: Rc<Vec<Token>>,
}

impl Macro {
    pub fn is_function_like(&self) -> bool {
        self.params.is_some()
    }

    /// The number of formal parameters, not counting a variadic tail.
    pub fn arity(&self) -> usize {
        match &self.params {
            None => 0,
            Some(p) if self.variadic => p.len() - 1,
            Some(p) => p.len(),
        }
    }
}

/// One macro-call argument: the raw tokens as delimited at the call site,
/// and their expansion (computed once, up front, before the replacement
/// list is walked, matching the prescan-then-substitute order a C
/// preprocessor uses for nested macro calls in arguments).
#[derive(Clone, Debug, PartialEq)]
pub struct Argument {
    pub raw: Vec<Token>,
    pub expanded: Vec<Token>,
}

impl Argument {
    pub fn new(raw: Vec<Token>, expanded: Vec<Token>) -> Self {
        Self { raw, expanded }
    }

    fn raw_text(&self) -> String {
        self.raw
            .iter()
            .filter(|t| !matches!(t.kind, TokenKind::CComment | TokenKind::CppComment))
            .map(|t| t.text.as_ref())
            .collect()
    }
}

/// Plays back a [`Macro`]'s replacement list for one invocation,
/// substituting argument references, performing stringification, and
/// re-lexing pasted operands.
pub struct MacroTokenSource {
    replacement: Rc<Vec<Token>>,
    args: Vec<Argument>,
    pos: usize,
    sub: Option<std::vec::IntoIter<Token>>,
    queued: VecDeque<Token>,
    path: Rc<str>,
    features: Features,
    pub pending: Vec<Diagnostic>,
}

impl MacroTokenSource {
    pub fn new(
        replacement: Rc<Vec<Token>>,
        args: Vec<Argument>,
        path: impl Into<Rc<str>>,
        features: Features,
    ) -> Self {
        Self {
            replacement,
            args,
            pos: 0,
            sub: None,
            queued: VecDeque::new(),
            path: path.into(),
            features,
            pending: Vec::new(),
        }
    }

    pub fn next(&mut self) -> Token {
        loop {
            if let Some(t) = self.queued.pop_front() {
                return t;
            }

            if let Some(sub) = &mut self.sub {
                match sub.next() {
                    Some(t) => return t,
                    None => self.sub = None,
                }
                continue;
            }

            let tok = match self.replacement.get(self.pos) {
                Some(t) => t.clone(),
                None => return Token::eof(Location::SYNTHETIC),
            };
            self.pos += 1;

            match tok.kind {
                TokenKind::MArg(i) => {
                    let expanded = self.args.get(i).map(|a| a.expanded.clone()).unwrap_or_default();
                    self.sub = Some(expanded.into_iter());
                }
                TokenKind::MString(i) => {
                    return self.stringify(i, tok.loc);
                }
                TokenKind::MPaste => {
                    return self.paste(tok.loc);
                }
                _ => return tok,
            }
        }
    }

    fn stringify(&mut self, i: usize, loc: Location) -> Token {
        let raw_text = self.args.get(i).map(|a| a.raw_text()).unwrap_or_default();
        let mut out = String::with_capacity(raw_text.len() + 2);
        out.push('"');
        for c in raw_text.chars() {
            if c == '\\' || c == '"' {
                out.push('\\');
            }
            out.push(c);
        }
        out.push('"');
        Token::new(TokenKind::StringLit, out, loc)
    }

    /// Consumes the next operand of a `##`, recursively resolving a
    /// chained `M_PASTE` operand (see the `a##b##c` encoding note in
    /// `driver.rs`'s directive parsing).
    fn resolve_operand(&mut self) -> String {
        let tok = match self.replacement.get(self.pos) {
            Some(t) => t.clone(),
            None => return String::new(),
        };
        self.pos += 1;

        if tok.kind == TokenKind::MPaste {
            let left = self.resolve_operand();
            let right = self.resolve_operand();
            return left + &right;
        }

        match tok.kind {
            TokenKind::MArg(i) => self.args.get(i).map(|a| a.raw_text()).unwrap_or_default(),
            TokenKind::CComment | TokenKind::CppComment => String::new(),
            _ => tok.text.to_string(),
        }
    }

    fn paste(&mut self, loc: Location) -> Token {
        if self.replacement.get(self.pos).is_none() {
            self.pending.push(Diagnostic::InvalidPaste {
                loc,
                left: "".into(),
                right: "".into(),
            });
            return Token::punct(Punct::HashHash, loc);
        }

        let left = self.resolve_operand();
        let right = self.resolve_operand();
        trace!("pasting '{left}' and '{right}'");
        let text = left + &right;

        if text.is_empty() {
            return Token::new(TokenKind::Whitespace, "", loc);
        }

        let mut lexer = LexerSource::new(self.path.clone(), &text, self.features);
        let mut produced = Vec::new();
        loop {
            let t = lexer.next();
            if t.kind == TokenKind::Eof {
                break;
            }
            produced.push(t);
        }

        if produced.len() != 1 {
            self.pending.push(Diagnostic::InvalidPaste {
                loc,
                left: text.clone().into(),
                right: "".into(),
            });
        }

        if produced.is_empty() {
            return Token::new(TokenKind::Invalid, text, loc);
        }

        let first = produced.remove(0);
        for t in produced {
            self.queued.push_back(t);
        }
        Token::new(first.kind, first.text, loc).with_value_opt(first.value)
    }

    /// Drains non-fatal diagnostics (malformed pastes) accumulated since
    /// the last call.
    pub fn take_pending_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Value;

    fn tok(kind: TokenKind, text: &str) -> Token {
        Token::synthetic(kind, text)
    }

    #[test]
    fn object_like_replacement_plays_back_verbatim() {
        let repl = Rc::new(vec![
            tok(TokenKind::Integer, "1").with_value(Value::Int(1)),
            Token::punct(Punct::Char(b'+'), Location::SYNTHETIC),
            tok(TokenKind::Integer, "2").with_value(Value::Int(2)),
        ]);
        let mut src = MacroTokenSource::new(repl, Vec::new(), "t", Features::empty());
        assert_eq!(src.next().int_value(), Some(1));
        assert_eq!(src.next().kind, TokenKind::Punct(Punct::Char(b'+')));
        assert_eq!(src.next().int_value(), Some(2));
        assert_eq!(src.next().kind, TokenKind::Eof);
    }

    #[test]
    fn substitutes_macro_argument() {
        let repl = Rc::new(vec![tok(TokenKind::MArg(0), "")]);
        let args = vec![Argument::new(
            vec![tok(TokenKind::Identifier, "x")],
            vec![tok(TokenKind::Identifier, "x")],
        )];
        let mut src = MacroTokenSource::new(repl, args, "t", Features::empty());
        let t = src.next();
        assert_eq!(t.kind, TokenKind::Identifier);
        assert_eq!(&*t.text, "x");
    }

    #[test]
    fn stringifies_argument_from_raw_tokens() {
        let repl = Rc::new(vec![tok(TokenKind::MString(0), "")]);
        let args = vec![Argument::new(
            vec![
                tok(TokenKind::Identifier, "a"),
                tok(TokenKind::Whitespace, " "),
                tok(TokenKind::Identifier, "b"),
            ],
            vec![],
        )];
        let mut src = MacroTokenSource::new(repl, args, "t", Features::empty());
        let t = src.next();
        assert_eq!(t.kind, TokenKind::StringLit);
        assert_eq!(&*t.text, "\"a b\"");
    }

    #[test]
    fn pastes_two_identifiers_into_one() {
        let repl = Rc::new(vec![
            tok(TokenKind::MPaste, ""),
            tok(TokenKind::MArg(0), ""),
            tok(TokenKind::MArg(1), ""),
        ]);
        let args = vec![
            Argument::new(vec![tok(TokenKind::Identifier, "foo")], vec![]),
            Argument::new(vec![tok(TokenKind::Integer, "42")], vec![]),
        ];
        let mut src = MacroTokenSource::new(repl, args, "t", Features::empty());
        let t = src.next();
        assert_eq!(t.kind, TokenKind::Identifier);
        assert_eq!(&*t.text, "foo42");
    }

    #[test]
    fn chained_paste_concatenates_three_operands() {
        // a##b##c encoded as PASTE a PASTE b c
        let repl = Rc::new(vec![
            tok(TokenKind::MPaste, ""),
            tok(TokenKind::Identifier, "a"),
            tok(TokenKind::MPaste, ""),
            tok(TokenKind::Identifier, "b"),
            tok(TokenKind::Identifier, "c"),
        ]);
        let mut src = MacroTokenSource::new(repl, Vec::new(), "t", Features::empty());
        let t = src.next();
        assert_eq!(&*t.text, "abc");
    }

    #[test]
    fn paste_at_end_of_replacement_warns_and_emits_literal() {
        let repl = Rc::new(vec![tok(TokenKind::MPaste, "")]);
        let mut src = MacroTokenSource::new(repl, Vec::new(), "t", Features::empty());
        let t = src.next();
        assert_eq!(&*t.text, "##");
        assert_eq!(src.take_pending_diagnostics().len(), 1);
    }

    #[test]
    fn macro_arity_excludes_variadic_tail() {
        let m = Macro {
            name: "LOG".into(),
            params: Some(vec!["fmt".into(), "__VA_ARGS__".into()]),
            variadic: true,
            replacement: Rc::new(Vec::new()),
        };
        assert_eq!(m.arity(), 1);
        assert!(m.is_function_like());
    }
}
