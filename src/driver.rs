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

//! The preprocessor driver: source stack management, directive dispatch,
//! macro expansion, and `#if`/`#elif` expression evaluation.
//!
//! `token()` is the single public pull entry point. Everything else here
//! exists to serve that one call: deciding whether the current stack top
//! is at the beginning of a line (so a `HASH` there starts a directive),
//! dispatching the directive keywords, expanding macro invocations, and
//! evaluating `#if`/`#elif` constant expressions through an
//! [`expr::ExprContext`] adapter.

use std::collections::VecDeque;
use std::rc::Rc;

use indexmap::IndexMap;
use log::{debug, trace};

use crate::cond::CondStack;
use crate::error::{Diagnostic, FatalError};
use crate::expr::{self, ExprContext};
use crate::flags::{Features, Warnings};
use crate::include::IncludeResolver;
use crate::lexer::LexerSource;
use crate::listener::{Listener, SourceEvent};
use crate::location::Location;
use crate::macros::{Argument, Macro, MacroTokenSource};
use crate::source::{Source, SourceKind};
use crate::token::{Punct, Token, TokenKind};
use crate::vfs::{RealFileSystem, VirtualFile, VirtualFileSystem};

const BUILTIN_NAMES: [&str; 3] = ["__LINE__", "__FILE__", "__COUNTER__"];

/// Owns the macro table, conditional stack, source stack, and the
/// configuration that shapes how all three behave. One instance
/// processes one logical run of top-level inputs to completion.
pub struct Preprocessor {
    macros: IndexMap<Rc<str>, Rc<Macro>>,
    cond: CondStack,
    sources: Vec<Source>,
    pending_inputs: VecDeque<(Rc<str>, String)>,
    pending_marker: Option<Token>,
    line_start: bool,
    counter: i64,

    include_resolver: IncludeResolver,
    vfs: Box<dyn VirtualFileSystem>,
    listener: Option<Box<dyn Listener>>,
    features: Features,
    warnings: Warnings,
    feature_names: Vec<String>,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self {
            macros: IndexMap::new(),
            cond: CondStack::new(),
            sources: Vec::new(),
            pending_inputs: VecDeque::new(),
            pending_marker: None,
            line_start: true,
            counter: 0,
            include_resolver: IncludeResolver::new(),
            vfs: Box::new(RealFileSystem),
            listener: None,
            features: Features::empty(),
            warnings: Warnings::empty(),
            feature_names: Vec::new(),
        }
    }
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(mut self, listener: impl Listener + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn with_vfs(mut self, vfs: impl VirtualFileSystem + 'static) -> Self {
        self.vfs = Box::new(vfs);
        self
    }

    pub fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    pub fn with_warnings(mut self, warnings: Warnings) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn add_quote_path(&mut self, path: impl Into<String>) {
        self.include_resolver.add_quote_path(path);
    }

    pub fn add_system_path(&mut self, path: impl Into<String>) {
        self.include_resolver.add_system_path(path);
    }

    pub fn add_framework_path(&mut self, path: impl Into<String>) {
        self.include_resolver.add_framework_path(path);
    }

    /// Registers a name `__has_feature` should report as present.
    pub fn add_feature_name(&mut self, name: impl Into<String>) {
        self.feature_names.push(name.into());
    }

    /// Queues a named, in-memory input to be lexed once the source stack
    /// drains. Inputs are processed in the order queued.
    pub fn push_input(&mut self, name: impl Into<Rc<str>>, text: impl Into<String>) {
        self.pending_inputs.push_back((name.into(), text.into()));
    }

    /// Directly defines an object-like macro, bypassing `#define` parsing --
    /// for `-D`-style embedder configuration.
    pub fn define_object_like(&mut self, name: impl Into<Rc<str>>, replacement: Vec<Token>) {
        let name = name.into();
        if self.is_reserved_name(&name) {
            return;
        }
        self.macros.insert(
            name.clone(),
            Rc::new(Macro { name, params: None, variadic: false, replacement: Rc::new(replacement) }),
        );
    }

    fn is_reserved_name(&self, name: &str) -> bool {
        name == "defined" || BUILTIN_NAMES.contains(&name)
    }

    fn is_macro_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name) || BUILTIN_NAMES.contains(&name)
    }

    // -- location/path helpers ------------------------------------------

    fn current_path(&self) -> Rc<str> {
        self.sources.last().map(|s| s.path.clone()).unwrap_or_else(|| Rc::from("<input>"))
    }

    fn current_location(&self) -> Location {
        self.sources.last().map(Source::location).unwrap_or(Location::SYNTHETIC)
    }

    fn current_dir(&self) -> String {
        let path = self.current_path();
        std::path::Path::new(path.as_ref())
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn current_search_index(&self) -> Option<usize> {
        self.sources.last().and_then(|s| s.search_index)
    }

    fn notify_source_change(&mut self, path: &str, event: SourceEvent) {
        if let Some(l) = &mut self.listener {
            l.handle_source_change(path, event);
        }
    }

    // -- diagnostics -------------------------------------------------------

    fn report(&mut self, diag: Diagnostic) -> Result<(), FatalError> {
        // An undefined identifier in a '#if' expression is standard,
        // well-defined behavior (it evaluates to 0); only mention it
        // when the embedder opted in via Warnings::UNDEF.
        if matches!(diag, Diagnostic::UndefinedInExpression { .. })
            && !self.warnings.contains(Warnings::UNDEF)
        {
            return Ok(());
        }
        let is_error = default_is_error(&diag);
        self.report_with_severity(diag, is_error)
    }

    fn report_with_severity(&mut self, diag: Diagnostic, is_error: bool) -> Result<(), FatalError> {
        let loc = diag.location();
        let message = diag.to_string();
        let is_error = is_error || self.warnings.contains(Warnings::ERROR);
        let path = self.current_path();
        match &mut self.listener {
            Some(l) => {
                if is_error {
                    l.handle_error(&path, loc.line, loc.column, &message);
                } else {
                    l.handle_warning(&path, loc.line, loc.column, &message);
                }
                Ok(())
            }
            None => Err(FatalError(diag)),
        }
    }

    // -- line markers --------------------------------------------------

    fn make_line_marker(path: &str, line: i32, flag: u8) -> Token {
        let text = format!("# {line} \"{}\" {flag}\n", escape_path(path));
        Token::new(TokenKind::PLine, text, Location::SYNTHETIC)
    }

    fn push_file_source(&mut self, name: Rc<str>, text: String) {
        debug!("entering {name} ({} bytes)", text.len());
        let lexer = LexerSource::new(name.clone(), &text, self.features);
        self.notify_source_change(&name, SourceEvent::Push);
        self.sources.push(Source::from_lexer(lexer, true));
        self.line_start = true;
        if self.features.contains(Features::LINEMARKERS) {
            self.pending_marker = Some(Self::make_line_marker(&name, 0, 1));
        }
    }

    fn on_pop(&mut self, popped: Source) {
        trace!("leaving {}", popped.path);
        self.notify_source_change(&popped.path, SourceEvent::Pop);
        if self.features.contains(Features::LINEMARKERS) && matches!(popped.kind, SourceKind::Lexer(_)) {
            if let Some(top) = self.sources.last() {
                if matches!(top.kind, SourceKind::Lexer(_)) {
                    let path = top.path.clone();
                    let line = top.location().line;
                    self.pending_marker = Some(Self::make_line_marker(&path, line, 2));
                }
            }
        }
    }

    // -- raw pull mechanics ----------------------------------------------

    /// Pulls the next token straight from the source stack, with no
    /// macro expansion and no directive handling -- just the stack
    /// mechanics: dequeuing a pending top-level input when the stack
    /// runs dry, auto-popping an exhausted source, and surfacing any
    /// queued line marker. A non-auto-pop source (used to bound argument
    /// pre-expansion, see `expand_argument_tokens`) yields its `EOF`
    /// straight through instead of being popped.
    fn pull_raw(&mut self) -> Result<Token, FatalError> {
        loop {
            if let Some(marker) = self.pending_marker.take() {
                return Ok(marker);
            }

            if self.sources.is_empty() {
                match self.pending_inputs.pop_front() {
                    Some((name, text)) => {
                        self.push_file_source(name, text);
                        continue;
                    }
                    None => return Ok(Token::eof(Location::SYNTHETIC)),
                }
            }

            let is_lexer = matches!(self.sources.last().unwrap().kind, SourceKind::Lexer(_));
            let is_macro = matches!(self.sources.last().unwrap().kind, SourceKind::Macro(_));
            let tok = self.sources.last_mut().unwrap().next();

            // Lex-level diagnostics (bad escapes, unterminated literals)
            // are gated behind CSYNTAX since they duplicate the INVALID
            // token already produced; paste diagnostics from a macro
            // source are always surfaced.
            if is_lexer && self.features.contains(Features::CSYNTAX) || is_macro {
                let diags = self.sources.last_mut().unwrap().take_pending_diagnostics();
                for d in diags {
                    self.report(d)?;
                }
            }

            if tok.kind == TokenKind::Eof {
                let auto_pop = self.sources.last().unwrap().auto_pop;
                if auto_pop {
                    let popped = self.sources.pop().unwrap();
                    self.on_pop(popped);
                    continue;
                }
                return Ok(tok);
            }

            if is_lexer {
                match tok.kind {
                    TokenKind::Newline => self.line_start = true,
                    TokenKind::Whitespace | TokenKind::CComment | TokenKind::CppComment => {}
                    TokenKind::Punct(Punct::Hash) => {} // token() decides whether this was at BOL
                    _ => self.line_start = false,
                }
            }

            return Ok(tok);
        }
    }

    fn push_back(&mut self, tokens: Vec<Token>) {
        if tokens.is_empty() {
            return;
        }
        let path = self.current_path();
        self.sources.push(Source::from_fixed(tokens, path, true));
    }

    fn push_fixed_single(&mut self, token: Token) {
        let path = self.current_path();
        self.sources.push(Source::from_fixed(vec![token], path, true));
    }

    fn next_skip_trivia(&mut self) -> Result<Token, FatalError> {
        loop {
            let t = self.pull_raw()?;
            if !t.is_trivia() {
                return Ok(t);
            }
        }
    }

    /// Reads raw tokens, treating comments as a one-space boundary and
    /// trimming leading/trailing whitespace, until `NL`/`EOF`.
    fn consume_to_eol(&mut self) -> Result<(), FatalError> {
        loop {
            let t = self.pull_raw()?;
            match t.kind {
                TokenKind::Newline | TokenKind::Eof => return Ok(()),
                _ => {}
            }
        }
    }

    fn collect_rest_of_line(&mut self) -> Result<Vec<String>, FatalError> {
        let mut out = Vec::new();
        loop {
            let t = self.pull_raw()?;
            match t.kind {
                TokenKind::Newline | TokenKind::Eof => return Ok(out),
                TokenKind::Whitespace | TokenKind::CComment | TokenKind::CppComment => {}
                _ => out.push(t.text.to_string()),
            }
        }
    }

    // -- macro expansion ---------------------------------------------------

    fn is_expanding(&self, name: &str) -> bool {
        self.sources.iter().any(|s| s.expanding.as_deref() == Some(name))
    }

    /// Pulls one token with macro expansion applied: identifiers that
    /// name a live macro are expanded (pushing a new source) and the
    /// loop continues; everything else, including an identifier that
    /// turns out not to be a call, is returned.
    fn pull_expanded(&mut self) -> Result<Token, FatalError> {
        loop {
            let t = self.pull_raw()?;
            if t.kind == TokenKind::Identifier {
                match self.try_expand(&t)? {
                    Some(lit) => return Ok(lit),
                    None => continue,
                }
            }
            return Ok(t);
        }
    }

    /// `Some(tok)` if `tok` should be forwarded literally (not a macro,
    /// a function-like macro with no following `(`, or the recursion
    /// guard fired); `None` if a new source was pushed and the caller
    /// should pull again.
    fn try_expand(&mut self, tok: &Token) -> Result<Option<Token>, FatalError> {
        let name = tok.text.clone();

        if self.is_expanding(&name) {
            return Ok(Some(tok.clone()));
        }

        match &*name {
            "__LINE__" => {
                let line = self.current_location().line;
                let t = Token::new(TokenKind::Integer, line.to_string(), tok.loc)
                    .with_value(crate::token::Value::Int(line as i64));
                self.push_fixed_single(t);
                return Ok(None);
            }
            "__FILE__" => {
                let path = self.current_path();
                let text = format!("\"{}\"", escape_path(&path));
                let t = Token::new(TokenKind::StringLit, text, tok.loc)
                    .with_value(crate::token::Value::Str(path));
                self.push_fixed_single(t);
                return Ok(None);
            }
            "__COUNTER__" => {
                let n = self.counter;
                self.counter += 1;
                let t = Token::new(TokenKind::Integer, n.to_string(), tok.loc)
                    .with_value(crate::token::Value::Int(n));
                self.push_fixed_single(t);
                return Ok(None);
            }
            _ => {}
        }

        let m = match self.macros.get(&name) {
            Some(m) => m.clone(),
            None => return Ok(Some(tok.clone())),
        };

        if m.is_function_like() {
            let mut skipped = Vec::new();
            let mut found_paren = false;
            loop {
                let t = self.pull_raw()?;
                match t.kind {
                    TokenKind::Whitespace
                    | TokenKind::CComment
                    | TokenKind::CppComment
                    | TokenKind::Newline => skipped.push(t),
                    TokenKind::Punct(Punct::Char(b'(')) => {
                        found_paren = true;
                        break;
                    }
                    TokenKind::Eof => break,
                    _ => {
                        skipped.push(t);
                        break;
                    }
                }
            }
            if !found_paren {
                self.push_back(skipped);
                return Ok(Some(tok.clone()));
            }

            let groups = match self.parse_call_arguments(&m, tok.loc)? {
                Some(g) => g,
                None => return Ok(None),
            };
            let args = self.expand_arguments(groups)?;
            self.push_macro_source(m, args);
        } else {
            self.push_macro_source(m, Vec::new());
        }

        Ok(None)
    }

    fn push_macro_source(&mut self, m: Rc<Macro>, args: Vec<Argument>) {
        trace!("expanding '{}' with {} argument(s)", m.name, args.len());
        let path = self.current_path();
        self.notify_source_change(&path, SourceEvent::Push);
        let src = MacroTokenSource::new(m.replacement.clone(), args, path.clone(), self.features);
        self.sources.push(Source::from_macro(src, m.name.clone(), path));
    }

    /// Scans a macro call's argument list: top-level `,`
    /// separates arguments (absorbed into the final variadic argument
    /// once that slot is reached), top-level `)` ends the list, `EOF` is
    /// an error. Returns `None` (already reported) on `EOF` or an
    /// argument-count mismatch.
    fn parse_call_arguments(&mut self, m: &Macro, loc: Location) -> Result<Option<Vec<Vec<Token>>>, FatalError> {
        let mut groups: Vec<Vec<Token>> = vec![Vec::new()];
        let mut depth: i32 = 0;

        loop {
            let t = self.pull_raw()?;
            match t.kind {
                TokenKind::Eof => {
                    self.report(Diagnostic::UnterminatedMacroCall { loc, name: m.name.clone() })?;
                    return Ok(None);
                }
                TokenKind::Punct(Punct::Char(b'(')) => {
                    depth += 1;
                    groups.last_mut().unwrap().push(t);
                }
                TokenKind::Punct(Punct::Char(b')')) => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    groups.last_mut().unwrap().push(t);
                }
                TokenKind::Punct(Punct::Char(b',')) if depth == 0 => {
                    // Once the variadic group itself has been opened (by
                    // the comma that follows the last fixed parameter),
                    // every further top-level comma is absorbed into it
                    // literally rather than starting a new group.
                    let variadic_slot = m.variadic && groups.len() > m.arity();
                    if variadic_slot {
                        groups.last_mut().unwrap().push(t);
                    } else {
                        groups.push(Vec::new());
                    }
                }
                TokenKind::Whitespace | TokenKind::Newline | TokenKind::CComment | TokenKind::CppComment => {
                    let g = groups.last_mut().unwrap();
                    let needs_space = !g.is_empty() && g.last().unwrap().kind != TokenKind::Whitespace;
                    if needs_space {
                        g.push(Token::new(TokenKind::Whitespace, " ", t.loc));
                    }
                }
                _ => groups.last_mut().unwrap().push(t),
            }
        }

        for g in &mut groups {
            while g.first().map(|t| t.kind) == Some(TokenKind::Whitespace) {
                g.remove(0);
            }
            while g.last().map(|t| t.kind) == Some(TokenKind::Whitespace) {
                g.pop();
            }
        }

        if !m.variadic && m.arity() == 0 && groups.len() == 1 && groups[0].is_empty() {
            groups.clear();
        }
        if m.variadic {
            if let Some(params) = &m.params {
                if groups.len() + 1 == params.len() {
                    groups.push(Vec::new());
                }
            }
        }

        let expected = m.params.as_ref().map_or(0, |p| p.len());
        if groups.len() != expected {
            self.report(Diagnostic::ArgumentCountMismatch {
                loc,
                name: m.name.clone(),
                expected,
                found: groups.len(),
            })?;
            return Ok(None);
        }

        Ok(Some(groups))
    }

    fn expand_arguments(&mut self, groups: Vec<Vec<Token>>) -> Result<Vec<Argument>, FatalError> {
        let mut args = Vec::with_capacity(groups.len());
        for raw in groups {
            let expanded = self.expand_argument_tokens(raw.clone())?;
            args.push(Argument::new(raw, expanded));
        }
        Ok(args)
    }

    /// Pre-expands one argument's raw tokens by pushing
    /// them as a non-auto-pop boundary source and draining the expander
    /// until that boundary itself yields `EOF` (meaning every nested
    /// expansion triggered from within it has resolved back down to it).
    fn expand_argument_tokens(&mut self, raw: Vec<Token>) -> Result<Vec<Token>, FatalError> {
        let path = self.current_path();
        self.sources.push(Source::from_fixed(raw, path, false));
        let mut out = Vec::new();
        loop {
            let t = self.pull_expanded()?;
            if t.kind == TokenKind::Eof {
                break;
            }
            out.push(t);
        }
        self.sources.pop();
        Ok(out)
    }

    // -- #if/#elif expression evaluation -----------------------------------

    fn eval_constant_expr(&mut self) -> Result<bool, FatalError> {
        let mut ctx = DriverExprCtx { pp: self, fatal: None };
        let v = expr::eval(&mut ctx);
        if let Some(e) = ctx.fatal.take() {
            return Err(e);
        }
        Ok(v != 0)
    }

    /// As [`pull_expanded`](Self::pull_expanded), but never expands
    /// `defined`/`__has_include`/`__has_include_next`/`__has_feature` --
    /// the expression evaluator intercepts those identifiers itself --
    /// and drops whitespace/comments, since the evaluator works over a
    /// whitespace-free stream.
    fn pull_expr_token(&mut self) -> Result<Token, FatalError> {
        loop {
            let t = self.pull_raw()?;
            if t.is_trivia() {
                continue;
            }
            if t.kind == TokenKind::Identifier && !is_expr_special(&t.text) {
                match self.try_expand(&t)? {
                    Some(lit) => return Ok(lit),
                    None => continue,
                }
            }
            return Ok(t);
        }
    }

    fn eval_has_include(&mut self, next: bool) -> Result<bool, FatalError> {
        let (name, quoted) = match self.read_parenthesized_header()? {
            Some(x) => x,
            None => return Ok(false),
        };
        let dir = self.current_dir();
        let after = if next { self.current_search_index() } else { None };
        if next {
            Ok(self.include_resolver.resolve(self.vfs.as_ref(), &dir, &name, quoted, after).is_some())
        } else {
            Ok(self.include_resolver.check_only(self.vfs.as_ref(), &dir, &name, quoted))
        }
    }

    fn eval_has_feature(&mut self) -> Result<bool, FatalError> {
        let open = self.next_skip_trivia()?;
        if open.kind != TokenKind::Punct(Punct::Char(b'(')) {
            self.report(Diagnostic::MalformedExpression {
                loc: open.loc,
                reason: "expected '(' after '__has_feature'".into(),
            })?;
            return Ok(false);
        }
        let name_tok = self.next_skip_trivia()?;
        let close = self.next_skip_trivia()?;
        if close.kind != TokenKind::Punct(Punct::Char(b')')) {
            self.report(Diagnostic::MalformedExpression { loc: close.loc, reason: "expected ')'".into() })?;
        }
        Ok(self.feature_names.iter().any(|f| f.as_str() == &*name_tok.text))
    }

    /// Reads the next non-trivia token with header-name lexing enabled, so
    /// a `<...>` or `"..."` immediately following is read as a whole
    /// header/string token rather than ordinary punctuators.
    fn read_header_token(&mut self) -> Result<Token, FatalError> {
        loop {
            if let Some(top) = self.sources.last_mut() {
                top.set_in_include(true);
            }
            let t = self.pull_raw();
            if let Some(top) = self.sources.last_mut() {
                top.set_in_include(false);
            }
            let t = t?;
            if t.is_trivia() {
                continue;
            }
            return Ok(t);
        }
    }

    /// Reads a bare header-name operand, as in `#include <foo.h>` (no
    /// surrounding parentheses).
    fn read_header_name(&mut self, directive: &str) -> Result<Option<(String, bool)>, FatalError> {
        let t = self.read_header_token()?;
        match t.kind {
            TokenKind::Header => Ok(Some((t.str_value().unwrap_or("").to_string(), false))),
            TokenKind::StringLit => Ok(Some((t.str_value().unwrap_or("").to_string(), true))),
            _ => {
                self.report(Diagnostic::MalformedDirective {
                    loc: t.loc,
                    directive: directive.into(),
                    expected: "a header name".into(),
                    found: t.text.clone(),
                })?;
                Ok(None)
            }
        }
    }

    /// Reads `( <header-name> )`. Used by `__has_include` and
    /// `__has_include_next`, which appear as pseudo-function calls inside
    /// an expression rather than as a directive operand.
    fn read_parenthesized_header(&mut self) -> Result<Option<(String, bool)>, FatalError> {
        let open = self.next_skip_trivia()?;
        if open.kind != TokenKind::Punct(Punct::Char(b'(')) {
            self.report(Diagnostic::MalformedExpression {
                loc: open.loc,
                reason: "expected '(' before a header name".into(),
            })?;
            return Ok(None);
        }

        let t = self.read_header_token()?;
        let result = match t.kind {
            TokenKind::Header => Some((t.str_value().unwrap_or("").to_string(), false)),
            TokenKind::StringLit => Some((t.str_value().unwrap_or("").to_string(), true)),
            _ => {
                self.report(Diagnostic::MalformedExpression {
                    loc: t.loc,
                    reason: "expected a header name".into(),
                })?;
                None
            }
        };

        let close = self.next_skip_trivia()?;
        if close.kind != TokenKind::Punct(Punct::Char(b')')) {
            self.report(Diagnostic::MalformedExpression { loc: close.loc, reason: "expected ')'".into() })?;
        }

        Ok(result)
    }

    // -- directive dispatch -------------------------------------------------

    fn handle_hash(&mut self, _hash_loc: Location) -> Result<(), FatalError> {
        let kw = self.pull_raw()?;
        let name = match kw.kind {
            TokenKind::Newline => {
                self.line_start = true;
                return Ok(());
            }
            TokenKind::Eof => return Ok(()),
            TokenKind::Identifier => kw.text.clone(),
            _ => {
                self.report(Diagnostic::MalformedDirective {
                    loc: kw.loc,
                    directive: "".into(),
                    expected: "a directive name".into(),
                    found: kw.text.clone(),
                })?;
                self.consume_to_eol()?;
                return Ok(());
            }
        };

        trace!("directive #{name}");
        match &*name {
            "define" => self.directive_define(kw.loc),
            "undef" => self.directive_undef(kw.loc),
            "include" => self.directive_include(kw.loc, false, false),
            "include_next" if self.features.contains(Features::INCLUDENEXT) => {
                self.directive_include(kw.loc, false, true)
            }
            "import" => self.directive_include(kw.loc, true, false),
            "if" => self.directive_if(kw.loc),
            "elif" => self.directive_elif(kw.loc),
            "ifdef" => self.directive_ifdef(kw.loc, false),
            "ifndef" => self.directive_ifdef(kw.loc, true),
            "else" => self.directive_else(kw.loc),
            "endif" => self.directive_endif(kw.loc),
            "line" => self.consume_to_eol(),
            "pragma" => self.directive_pragma(kw.loc),
            "warning" => self.directive_message(kw.loc, false),
            "error" => self.directive_message(kw.loc, true),
            _ => {
                self.report(Diagnostic::UnknownDirective { loc: kw.loc, directive: name })?;
                self.consume_to_eol()
            }
        }
    }

    fn directive_define(&mut self, loc: Location) -> Result<(), FatalError> {
        if !self.cond.is_active() {
            return self.consume_to_eol();
        }

        let name_tok = self.pull_raw()?;
        if name_tok.kind != TokenKind::Identifier {
            self.report(Diagnostic::MalformedDirective {
                loc,
                directive: "define".into(),
                expected: "a macro name".into(),
                found: name_tok.text.clone(),
            })?;
            return self.consume_to_eol();
        }
        let name = name_tok.text.clone();
        if self.is_reserved_name(&name) {
            self.report(Diagnostic::MalformedDirective {
                loc,
                directive: "define".into(),
                expected: "a non-reserved macro name".into(),
                found: name.clone(),
            })?;
            return self.consume_to_eol();
        }

        // A `(` immediately after the name (no intervening whitespace)
        // makes this function-like; anything else (including whitespace)
        // makes it object-like.
        let next = self.pull_raw()?;
        let (params, variadic) = if next.kind == TokenKind::Punct(Punct::Char(b'(')) {
            self.parse_macro_params(loc)?
        } else {
            self.push_back(vec![next]);
            (None, false)
        };

        let raw = self.read_replacement_list()?;
        let (replacement, diags) = fold_pastes(raw, &params);
        for d in diags {
            self.report(d)?;
        }

        let m = Rc::new(Macro { name: name.clone(), params, variadic, replacement: Rc::new(replacement) });
        if let Some(old) = self.macros.get(&name) {
            if **old != *m {
                self.report(Diagnostic::MacroRedefined { loc, name: name.clone() })?;
            }
        }
        debug!("#define {name}");
        self.macros.insert(name, m);
        Ok(())
    }

    /// Parses `ident (, ident)* (, ...)? )` or a bare `...)`, having
    /// already consumed the opening `(`. Returns the parameter list
    /// (with a trailing synthetic `__VA_ARGS__` entry when variadic) and
    /// whether it is variadic.
    fn parse_macro_params(&mut self, loc: Location) -> Result<(Option<Vec<Rc<str>>>, bool), FatalError> {
        let mut params = Vec::new();
        let mut variadic = false;

        loop {
            let t = self.next_skip_trivia()?;
            match t.kind {
                TokenKind::Punct(Punct::Char(b')')) => break,
                TokenKind::Punct(Punct::Ellipsis) => {
                    variadic = true;
                    let close = self.next_skip_trivia()?;
                    if close.kind != TokenKind::Punct(Punct::Char(b')')) {
                        self.report(Diagnostic::MalformedDirective {
                            loc,
                            directive: "define".into(),
                            expected: "')' after '...'".into(),
                            found: close.text.clone(),
                        })?;
                    }
                    break;
                }
                TokenKind::Identifier => {
                    params.push(t.text.clone());
                    let sep = self.next_skip_trivia()?;
                    match sep.kind {
                        TokenKind::Punct(Punct::Char(b',')) => continue,
                        TokenKind::Punct(Punct::Char(b')')) => break,
                        TokenKind::Punct(Punct::Ellipsis) => {
                            variadic = true;
                            let close = self.next_skip_trivia()?;
                            if close.kind != TokenKind::Punct(Punct::Char(b')')) {
                                self.report(Diagnostic::MalformedDirective {
                                    loc,
                                    directive: "define".into(),
                                    expected: "')' after '...'".into(),
                                    found: close.text.clone(),
                                })?;
                            }
                            break;
                        }
                        _ => {
                            self.report(Diagnostic::MalformedDirective {
                                loc,
                                directive: "define".into(),
                                expected: "',' or ')' in parameter list".into(),
                                found: sep.text.clone(),
                            })?;
                            break;
                        }
                    }
                }
                _ => {
                    self.report(Diagnostic::MalformedDirective {
                        loc,
                        directive: "define".into(),
                        expected: "a parameter name, '...', or ')'".into(),
                        found: t.text.clone(),
                    })?;
                    break;
                }
            }
        }

        if variadic {
            params.push(Rc::from("__VA_ARGS__"));
        }
        Ok((Some(params), variadic))
    }

    /// Reads the raw replacement-list tokens up to `NL`/`EOF`, trimming
    /// leading/trailing whitespace and coalescing internal whitespace
    /// runs (including comments) to a single space token.
    fn read_replacement_list(&mut self) -> Result<Vec<Token>, FatalError> {
        let mut out: Vec<Token> = Vec::new();
        loop {
            let t = self.pull_raw()?;
            match t.kind {
                TokenKind::Newline | TokenKind::Eof => break,
                TokenKind::Whitespace | TokenKind::CComment | TokenKind::CppComment => {
                    let needs_space = !out.is_empty() && out.last().unwrap().kind != TokenKind::Whitespace;
                    if needs_space {
                        out.push(Token::new(TokenKind::Whitespace, " ", t.loc));
                    }
                }
                _ => out.push(t),
            }
        }
        while out.last().map(|t| t.kind) == Some(TokenKind::Whitespace) {
            out.pop();
        }
        if out.first().map(|t| t.kind) == Some(TokenKind::Whitespace) {
            out.remove(0);
        }
        Ok(out)
    }

    fn directive_undef(&mut self, loc: Location) -> Result<(), FatalError> {
        if !self.cond.is_active() {
            return self.consume_to_eol();
        }
        let name_tok = self.pull_raw()?;
        if name_tok.kind != TokenKind::Identifier {
            self.report(Diagnostic::MalformedDirective {
                loc,
                directive: "undef".into(),
                expected: "an identifier".into(),
                found: name_tok.text.clone(),
            })?;
        } else {
            debug!("#undef {}", name_tok.text);
            self.macros.shift_remove(&name_tok.text);
        }
        self.consume_to_eol()
    }

    fn directive_include(&mut self, loc: Location, is_import: bool, is_next: bool) -> Result<(), FatalError> {
        if !self.cond.is_active() {
            return self.consume_to_eol();
        }

        let current_dir = self.current_dir();
        let directive_name = if is_import { "import" } else if is_next { "include_next" } else { "include" };
        let (name, quoted) = match self.read_header_name(directive_name)? {
            Some(x) => x,
            None => return self.consume_to_eol(),
        };
        // Discard the rest of this line -- including its own trailing
        // newline -- on the *current* source before pushing the
        // included file's, so that newline doesn't resurface after the
        // included content once this source resumes.
        self.consume_to_eol()?;

        let after = if is_next { self.current_search_index() } else { None };
        let resolved = self.include_resolver.resolve(self.vfs.as_ref(), &current_dir, &name, quoted, after);
        match resolved {
            Some(r) if is_import && r.already_imported => {}
            Some(r) => {
                let path: Rc<str> = r.file.get_path().into();
                match r.file.open_as_source(self.features) {
                    Ok(lexer) => {
                        self.notify_source_change(&path, SourceEvent::Push);
                        let mut src = Source::from_lexer(lexer, true);
                        src.search_index = Some(r.search_index);
                        self.sources.push(src);
                        self.line_start = true;
                        if is_import {
                            self.include_resolver.mark_imported(path.to_string());
                        }
                        if self.features.contains(Features::LINEMARKERS) {
                            self.pending_marker = Some(Self::make_line_marker(&path, 0, 1));
                        }
                    }
                    Err(e) => {
                        self.report(Diagnostic::IncludeReadError { loc, path, reason: e.to_string().into() })?;
                    }
                }
            }
            None => {
                self.report(Diagnostic::IncludeNotFound { loc, name: name.into() })?;
            }
        }
        Ok(())
    }

    fn directive_if(&mut self, loc: Location) -> Result<(), FatalError> {
        let cond = if self.cond.is_active() {
            let v = self.eval_constant_expr()?;
            self.consume_to_eol()?;
            v
        } else {
            self.consume_to_eol()?;
            false
        };
        let _ = loc;
        self.cond.push(cond);
        Ok(())
    }

    fn directive_elif(&mut self, loc: Location) -> Result<(), FatalError> {
        let cond = if self.cond.parent_active() {
            let v = self.eval_constant_expr()?;
            self.consume_to_eol()?;
            v
        } else {
            self.consume_to_eol()?;
            false
        };
        if self.cond.elif_branch(cond).is_err() {
            self.report(Diagnostic::UnmatchedConditional { loc, directive: "elif".into() })?;
        }
        Ok(())
    }

    fn directive_ifdef(&mut self, loc: Location, negate: bool) -> Result<(), FatalError> {
        let name_tok = self.pull_raw()?;
        let defined = if name_tok.kind == TokenKind::Identifier {
            self.is_macro_defined(&name_tok.text)
        } else {
            self.report(Diagnostic::MalformedDirective {
                loc,
                directive: if negate { "ifndef".into() } else { "ifdef".into() },
                expected: "an identifier".into(),
                found: name_tok.text.clone(),
            })?;
            false
        };
        self.consume_to_eol()?;
        self.cond.push(if negate { !defined } else { defined });
        Ok(())
    }

    fn directive_else(&mut self, loc: Location) -> Result<(), FatalError> {
        if self.cond.else_branch().is_err() {
            self.report(Diagnostic::UnmatchedConditional { loc, directive: "else".into() })?;
        }
        self.consume_to_eol()
    }

    fn directive_endif(&mut self, loc: Location) -> Result<(), FatalError> {
        if self.cond.pop().is_err() {
            self.report(Diagnostic::UnmatchedConditional { loc, directive: "endif".into() })?;
        }
        self.consume_to_eol()
    }

    fn directive_pragma(&mut self, loc: Location) -> Result<(), FatalError> {
        if !self.cond.is_active() {
            return self.consume_to_eol();
        }
        let words = self.collect_rest_of_line()?;
        let name: Rc<str> = words.join(" ").into();
        self.report(Diagnostic::UnknownPragma { loc, name })?;
        Ok(())
    }

    fn directive_message(&mut self, loc: Location, is_error: bool) -> Result<(), FatalError> {
        if !self.cond.is_active() {
            return self.consume_to_eol();
        }
        let words = self.collect_rest_of_line()?;
        let message: Rc<str> = words.join(" ").into();
        self.report_with_severity(Diagnostic::UserMessage { loc, message }, is_error)
    }

    // -- public entry point -------------------------------------------------

    /// Returns the next preprocessing token. `EOF` is a terminal sentinel
    /// that may be returned repeatedly once every pending input and
    /// source has been exhausted.
    pub fn token(&mut self) -> Result<Token, FatalError> {
        loop {
            let t = self.pull_raw()?;

            if t.kind == TokenKind::Eof && self.sources.is_empty() {
                if self.cond.depth() > 1 {
                    self.report(Diagnostic::UnterminatedConditional { loc: t.loc })?;
                    // Reset so a repeated call for this terminal EOF
                    // doesn't report the same thing again.
                    self.cond = CondStack::new();
                }
                return Ok(t);
            }
            if t.kind == TokenKind::PLine {
                return Ok(t);
            }

            let is_lexer_top = self.sources.last().map_or(false, |s| matches!(s.kind, SourceKind::Lexer(_)));

            if is_lexer_top && t.kind == TokenKind::Punct(Punct::Hash) {
                let was_bol = self.line_start;
                self.line_start = false;
                if was_bol {
                    self.handle_hash(t.loc)?;
                    continue;
                }
            }

            if !self.cond.is_active() {
                continue;
            }

            if t.kind == TokenKind::Identifier {
                match self.try_expand(&t)? {
                    Some(lit) => return Ok(lit),
                    None => continue,
                }
            }

            return Ok(t);
        }
    }
}

fn is_expr_special(name: &str) -> bool {
    matches!(name, "defined" | "__has_include" | "__has_include_next" | "__has_feature")
}

fn escape_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

fn default_is_error(diag: &Diagnostic) -> bool {
    use Diagnostic::*;
    matches!(
        diag,
        ArgumentCountMismatch { .. }
            | UnterminatedConditional { .. }
            | UnmatchedConditional { .. }
            | IncludeNotFound { .. }
            | IncludeReadError { .. }
            | IncludeTooDeep { .. }
            | UnterminatedMacroCall { .. }
    )
}

/// Parses a `#define` replacement list's raw tokens into the `M_ARG` /
/// `M_STRING` / `M_PASTE`-prefix encoding `MacroTokenSource` expects.
/// `params` is `None` for an object-like macro (no `M_ARG`/`M_STRING`
/// rewriting is possible, only `##`).
fn fold_pastes(raw: Vec<Token>, params: &Option<Vec<Rc<str>>>) -> (Vec<Token>, Vec<Diagnostic>) {
    // Rewrite parameter references to M_ARG and `# param` to M_STRING
    // first, then strip whitespace adjacent to a literal `##`, then walk
    // the result grouping `##`-chained operands under prefix markers.
    let mut diags = Vec::new();
    let mut rewritten: Vec<Token> = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let t = &raw[i];
        if t.kind == TokenKind::Punct(Punct::Hash) && params.is_some() {
            match next_param_ref(&raw, i + 1, params) {
                Some((j, param_idx)) => {
                    rewritten.push(Token::new(TokenKind::MString(param_idx), "", t.loc));
                    i = j + 1;
                    continue;
                }
                None => diags.push(Diagnostic::StringifyNonParameter { loc: t.loc }),
            }
        }
        if t.kind == TokenKind::Identifier {
            if let Some(idx) = param_index(&t.text, params) {
                rewritten.push(Token::new(TokenKind::MArg(idx), t.text.clone(), t.loc));
                i += 1;
                continue;
            }
        }
        rewritten.push(t.clone());
        i += 1;
    }

    let mut cleaned: Vec<Token> = Vec::with_capacity(rewritten.len());
    for (idx, t) in rewritten.iter().enumerate() {
        if t.kind == TokenKind::Whitespace {
            let prev_is_paste = idx > 0 && rewritten[idx - 1].kind == TokenKind::Punct(Punct::HashHash);
            let next_is_paste = rewritten.get(idx + 1).map(|n| n.kind) == Some(TokenKind::Punct(Punct::HashHash));
            if prev_is_paste || next_is_paste {
                continue;
            }
        }
        cleaned.push(t.clone());
    }

    let mut out: Vec<Token> = Vec::with_capacity(cleaned.len());
    let mut i = 0;
    while i < cleaned.len() {
        if cleaned[i].kind == TokenKind::Punct(Punct::HashHash) {
            // Collect this chain's operands: the token already emitted to
            // `out` (the left operand of the first `##`) plus every operand
            // following each subsequent `##` in the run.
            let loc = cleaned[i].loc;
            let mut operands = Vec::new();
            if let Some(last) = out.pop() {
                operands.push(last);
            }
            while i < cleaned.len() && cleaned[i].kind == TokenKind::Punct(Punct::HashHash) {
                i += 1;
                if let Some(operand) = cleaned.get(i) {
                    operands.push(operand.clone());
                    i += 1;
                } else {
                    break;
                }
            }

            if operands.len() < 2 {
                // A dangling '##' with no right-hand operand: leave the
                // left operand as an ordinary token and emit a bare
                // MPaste marker so MacroTokenSource::paste reports it.
                out.extend(operands);
                out.push(Token::new(TokenKind::MPaste, "", loc));
                continue;
            }

            // MPaste precedes every operand but the last, matching
            // MacroTokenSource::resolve_operand's recursive chain.
            let last = operands.len() - 1;
            for (k, operand) in operands.into_iter().enumerate() {
                if k != last {
                    out.push(Token::new(TokenKind::MPaste, "", loc));
                }
                out.push(operand);
            }
            continue;
        }
        out.push(cleaned[i].clone());
        i += 1;
    }

    (out, diags)
}

fn param_index(name: &str, params: &Option<Vec<Rc<str>>>) -> Option<usize> {
    params.as_ref().and_then(|p| p.iter().position(|p| p.as_ref() == name))
}

/// Looks ahead from `start` (skipping at most one run of whitespace) for
/// a parameter identifier following a stringification `#`. Returns the
/// index of that identifier token and its parameter index.
fn next_param_ref(raw: &[Token], start: usize, params: &Option<Vec<Rc<str>>>) -> Option<(usize, usize)> {
    let mut j = start;
    while j < raw.len() && raw[j].kind == TokenKind::Whitespace {
        j += 1;
    }
    let t = raw.get(j)?;
    if t.kind != TokenKind::Identifier {
        return None;
    }
    let idx = param_index(&t.text, params)?;
    Some((j, idx))
}

/// Adapts a [`Preprocessor`] to drive [`expr::eval`]. Fatal errors from
/// `report()` (no listener registered) are stashed since `ExprContext`'s
/// methods cannot return `Result`; `eval_constant_expr` propagates them
/// after `eval()` returns.
struct DriverExprCtx<'a> {
    pp: &'a mut Preprocessor,
    fatal: Option<FatalError>,
}

impl<'a> ExprContext for DriverExprCtx<'a> {
    fn next_token(&mut self) -> Token {
        match self.pp.pull_expr_token() {
            Ok(t) => t,
            Err(e) => {
                self.fatal = Some(e);
                Token::eof(Location::SYNTHETIC)
            }
        }
    }

    fn is_defined(&mut self, name: &str) -> bool {
        self.pp.is_macro_defined(name)
    }

    fn has_include(&mut self) -> bool {
        match self.pp.eval_has_include(false) {
            Ok(b) => b,
            Err(e) => {
                self.fatal = Some(e);
                false
            }
        }
    }

    fn has_include_next(&mut self) -> bool {
        match self.pp.eval_has_include(true) {
            Ok(b) => b,
            Err(e) => {
                self.fatal = Some(e);
                false
            }
        }
    }

    fn has_feature(&mut self) -> bool {
        match self.pp.eval_has_feature() {
            Ok(b) => b,
            Err(e) => {
                self.fatal = Some(e);
                false
            }
        }
    }

    fn report(&mut self, diag: Diagnostic) {
        if let Err(e) = self.pp.report(diag) {
            self.fatal = Some(e);
        }
    }
}
