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

//! Constant-expression evaluation for `#if`/`#elif`.
//!
//! Precedence-climbing parser over an already-expanded, whitespace-free
//! token stream, except that the identifier `defined` is never macro
//! expanded by the caller and is recognized here instead. `__has_include`,
//! `__has_include_next`, and `__has_feature` delegate their parenthesized
//! operand entirely to the [`ExprContext`], since reading a header-name
//! operand requires the driver to switch the lexer into header-name mode.

use crate::error::Diagnostic;
use crate::location::Location;
use crate::token::{Punct, Token, TokenKind, Value};

/// What the evaluator needs from the driver: a pull source of already
/// macro-expanded, non-whitespace tokens, plus the three pseudo-function
/// hooks that cannot be expressed as ordinary macro expansion.
pub trait ExprContext {
    /// Returns the next expanded, non-whitespace/comment token.
    fn next_token(&mut self) -> Token;

    fn is_defined(&mut self, name: &str) -> bool;

    /// Consumes a parenthesized header-name operand and resolves it,
    /// without pushing a source.
    fn has_include(&mut self) -> bool;

    /// As [`has_include`](Self::has_include), but resuming the search past
    /// the file containing the current `#if`.
    fn has_include_next(&mut self) -> bool;

    /// Consumes a parenthesized identifier operand and reports whether the
    /// named feature is recognized.
    fn has_feature(&mut self) -> bool;

    fn report(&mut self, diag: Diagnostic);
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum BinOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Xor,
    Or,
    LogAnd,
    LogOr,
}

fn binop_of(p: Punct) -> Option<(BinOp, u8)> {
    use Punct::*;
    Some(match p {
        Char(b'*') => (BinOp::Mul, 11),
        Char(b'/') => (BinOp::Div, 11),
        Char(b'%') => (BinOp::Rem, 11),
        Char(b'+') => (BinOp::Add, 10),
        Char(b'-') => (BinOp::Sub, 10),
        LtLt => (BinOp::Shl, 9),
        GtGt => (BinOp::Shr, 9),
        Char(b'<') => (BinOp::Lt, 8),
        Char(b'>') => (BinOp::Gt, 8),
        LtEq => (BinOp::Le, 8),
        GtEq => (BinOp::Ge, 8),
        EqEq => (BinOp::Eq, 7),
        BangEq => (BinOp::Ne, 7),
        Char(b'&') => (BinOp::And, 6),
        Char(b'^') => (BinOp::Xor, 5),
        Char(b'|') => (BinOp::Or, 4),
        AmpAmp => (BinOp::LogAnd, 3),
        PipePipe => (BinOp::LogOr, 2),
        _ => return None,
    })
}

/// Drives the precedence-climbing parse against one [`ExprContext`].
struct Evaluator<'a> {
    ctx: &'a mut dyn ExprContext,
    lookahead: Option<Token>,
    loc: Location,
}

impl<'a> Evaluator<'a> {
    fn new(ctx: &'a mut dyn ExprContext) -> Self {
        Self { ctx, lookahead: None, loc: Location::SYNTHETIC }
    }

    fn peek(&mut self) -> &Token {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.ctx.next_token());
        }
        self.lookahead.as_ref().unwrap()
    }

    fn bump(&mut self) -> Token {
        self.peek();
        let t = self.lookahead.take().unwrap();
        self.loc = t.loc;
        t
    }

    fn expect_punct(&mut self, want: Punct, reason: &str) {
        let t = self.bump();
        if t.kind != TokenKind::Punct(want) {
            self.ctx.report(Diagnostic::MalformedExpression {
                loc: t.loc,
                reason: reason.into(),
            });
        }
    }

    /// Parses `#if`/`#elif`'s full expression, including `?:`.
    fn parse_expr(&mut self) -> i64 {
        let cond = self.parse_binary(2);
        if self.peek().kind == TokenKind::Punct(Punct::Char(b'?')) {
            self.bump();
            let then_val = self.parse_expr();
            self.expect_punct(Punct::Char(b':'), "expected ':' in '?:'");
            let else_val = self.parse_expr();
            if cond != 0 { then_val } else { else_val }
        } else {
            cond
        }
    }

    fn parse_binary(&mut self, min_prec: u8) -> i64 {
        let mut lhs = self.parse_unary();
        loop {
            let op = match self.peek().kind {
                TokenKind::Punct(p) => binop_of(p),
                _ => None,
            };
            let (op, prec) = match op {
                Some(x) if x.1 >= min_prec => x,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_binary(prec + 1);
            lhs = self.apply(op, lhs, rhs);
        }
        lhs
    }

    fn apply(&mut self, op: BinOp, lhs: i64, rhs: i64) -> i64 {
        match op {
            BinOp::Mul => lhs.wrapping_mul(rhs),
            BinOp::Div => {
                if rhs == 0 {
                    self.ctx.report(Diagnostic::DivisionByZero { loc: self.loc });
                    0
                } else {
                    lhs.wrapping_div(rhs)
                }
            }
            BinOp::Rem => {
                if rhs == 0 {
                    self.ctx.report(Diagnostic::DivisionByZero { loc: self.loc });
                    0
                } else {
                    lhs.wrapping_rem(rhs)
                }
            }
            BinOp::Add => lhs.wrapping_add(rhs),
            BinOp::Sub => lhs.wrapping_sub(rhs),
            BinOp::Shl => lhs.wrapping_shl(rhs as u32),
            BinOp::Shr => lhs.wrapping_shr(rhs as u32),
            BinOp::Lt => (lhs < rhs) as i64,
            BinOp::Gt => (lhs > rhs) as i64,
            BinOp::Le => (lhs <= rhs) as i64,
            BinOp::Ge => (lhs >= rhs) as i64,
            BinOp::Eq => (lhs == rhs) as i64,
            BinOp::Ne => (lhs != rhs) as i64,
            BinOp::And => lhs & rhs,
            BinOp::Xor => lhs ^ rhs,
            BinOp::Or => lhs | rhs,
            BinOp::LogAnd => ((lhs != 0) && (rhs != 0)) as i64,
            BinOp::LogOr => ((lhs != 0) || (rhs != 0)) as i64,
        }
    }

    fn parse_unary(&mut self) -> i64 {
        match self.peek().kind {
            TokenKind::Punct(Punct::Char(b'-')) => {
                self.bump();
                self.parse_unary().wrapping_neg()
            }
            TokenKind::Punct(Punct::Char(b'~')) => {
                self.bump();
                !self.parse_unary()
            }
            TokenKind::Punct(Punct::Char(b'!')) => {
                self.bump();
                (self.parse_unary() == 0) as i64
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> i64 {
        let t = self.bump();
        match t.kind {
            TokenKind::Integer => t.int_value().unwrap_or(0),
            TokenKind::Character => match &t.value {
                Some(Value::Char(c)) => *c as i64,
                Some(Value::Int(n)) => *n,
                _ => 0,
            },
            TokenKind::Punct(Punct::Char(b'(')) => {
                let v = self.parse_expr();
                self.expect_punct(Punct::Char(b')'), "expected ')'");
                v
            }
            TokenKind::Identifier if &*t.text == "defined" => self.parse_defined(),
            TokenKind::Identifier if &*t.text == "__has_include" => self.ctx.has_include() as i64,
            TokenKind::Identifier if &*t.text == "__has_include_next" => self.ctx.has_include_next() as i64,
            TokenKind::Identifier if &*t.text == "__has_feature" => self.ctx.has_feature() as i64,
            TokenKind::Identifier => {
                self.ctx.report(Diagnostic::UndefinedInExpression { loc: t.loc, name: t.text.clone() });
                0
            }
            TokenKind::Eof => {
                self.ctx.report(Diagnostic::MalformedExpression {
                    loc: t.loc,
                    reason: "unexpected end of expression".into(),
                });
                0
            }
            _ => {
                self.ctx.report(Diagnostic::MalformedExpression {
                    loc: t.loc,
                    reason: format!("unexpected token '{}'", t.text).into(),
                });
                0
            }
        }
    }

    fn parse_defined(&mut self) -> i64 {
        let parenthesized = self.peek().kind == TokenKind::Punct(Punct::Char(b'('));
        if parenthesized {
            self.bump();
        }
        let name_tok = self.bump();
        let name = name_tok.text.clone();
        if name_tok.kind != TokenKind::Identifier {
            self.ctx.report(Diagnostic::MalformedExpression {
                loc: name_tok.loc,
                reason: "'defined' expects an identifier".into(),
            });
        }
        if parenthesized {
            self.expect_punct(Punct::Char(b')'), "expected ')' after 'defined(name'");
        }
        self.ctx.is_defined(&name) as i64
    }
}

/// Evaluates one `#if`/`#elif` constant expression, driving `ctx` for
/// tokens and pseudo-function operands.
pub fn eval(ctx: &mut dyn ExprContext) -> i64 {
    let mut evaluator = Evaluator::new(ctx);
    evaluator.parse_expr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct FakeContext {
        tokens: VecDeque<Token>,
        defined: Vec<&'static str>,
        diagnostics: Vec<Diagnostic>,
    }

    impl FakeContext {
        fn new(tokens: Vec<Token>) -> Self {
            Self { tokens: tokens.into(), defined: Vec::new(), diagnostics: Vec::new() }
        }
    }

    impl ExprContext for FakeContext {
        fn next_token(&mut self) -> Token {
            self.tokens.pop_front().unwrap_or_else(|| Token::eof(Location::SYNTHETIC))
        }
        fn is_defined(&mut self, name: &str) -> bool {
            self.defined.contains(&name)
        }
        fn has_include(&mut self) -> bool {
            false
        }
        fn has_include_next(&mut self) -> bool {
            false
        }
        fn has_feature(&mut self) -> bool {
            false
        }
        fn report(&mut self, diag: Diagnostic) {
            self.diagnostics.push(diag);
        }
    }

    fn int(n: i64) -> Token {
        Token::synthetic(TokenKind::Integer, n.to_string()).with_value(Value::Int(n))
    }

    fn punct(p: Punct) -> Token {
        Token::punct(p, Location::SYNTHETIC)
    }

    fn ident(s: &str) -> Token {
        Token::synthetic(TokenKind::Identifier, s)
    }

    #[test]
    fn evaluates_addition_with_precedence() {
        // 1 + 1 == 2
        let mut ctx = FakeContext::new(vec![
            int(1),
            punct(Punct::Char(b'+')),
            int(1),
            punct(Punct::EqEq),
            int(2),
        ]);
        assert_eq!(eval(&mut ctx), 1);
    }

    #[test]
    fn ternary_picks_branch_by_condition() {
        // 0 ? 1 : 2
        let mut ctx = FakeContext::new(vec![
            int(0),
            punct(Punct::Char(b'?')),
            int(1),
            punct(Punct::Char(b':')),
            int(2),
        ]);
        assert_eq!(eval(&mut ctx), 2);
    }

    #[test]
    fn division_by_zero_reports_and_yields_zero() {
        let mut ctx = FakeContext::new(vec![int(4), punct(Punct::Char(b'/')), int(0)]);
        assert_eq!(eval(&mut ctx), 0);
        assert_eq!(ctx.diagnostics.len(), 1);
    }

    #[test]
    fn defined_consults_context() {
        let mut ctx = FakeContext::new(vec![
            ident("defined"),
            punct(Punct::Char(b'(')),
            ident("Y"),
            punct(Punct::Char(b')')),
            punct(Punct::AmpAmp),
            punct(Punct::Char(b'!')),
            ident("defined"),
            ident("Z"),
        ]);
        ctx.defined.push("Y");
        assert_eq!(eval(&mut ctx), 1);
    }

    #[test]
    fn undefined_identifier_evaluates_to_zero() {
        let mut ctx = FakeContext::new(vec![ident("NOPE")]);
        assert_eq!(eval(&mut ctx), 0);
    }

    #[test]
    fn parenthesized_subexpression_and_unary_minus() {
        // -(3 - 5) == 2
        let mut ctx = FakeContext::new(vec![
            punct(Punct::Char(b'-')),
            punct(Punct::Char(b'(')),
            int(3),
            punct(Punct::Char(b'-')),
            int(5),
            punct(Punct::Char(b')')),
            punct(Punct::EqEq),
            int(2),
        ]);
        assert_eq!(eval(&mut ctx), 1);
    }
}
