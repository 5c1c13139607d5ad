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

//! Property tests: arbitrary well-formed whitespace/identifier/number/
//! string text always lexes as exactly one token of the expected kind,
//! with its text preserved verbatim.

use cppp::{Features, LexerSource, TokenKind};
use proptest::prelude::*;

fn lex_all(text: &str) -> Vec<cppp::Token> {
    let mut lexer = LexerSource::new("t.c", text, Features::empty());
    let mut tokens = Vec::new();
    loop {
        let t = lexer.next();
        let done = t.kind == TokenKind::Eof;
        tokens.push(t);
        if done {
            break;
        }
    }
    tokens
}

proptest! {
    #[test]
    fn arbitrary_identifiers_lex_as_one_token(input in "[a-zA-Z_][a-zA-Z0-9_]{0,31}") {
        let tokens = lex_all(&input);
        prop_assert_eq!(tokens.len(), 2); // identifier, then EOF
        prop_assert_eq!(tokens[0].kind, TokenKind::Identifier);
        prop_assert_eq!(&*tokens[0].text, input.as_str());
    }

    #[test]
    fn arbitrary_decimal_integers_lex_as_one_token(input in "[0-9]{1,18}") {
        let tokens = lex_all(&input);
        prop_assert_eq!(tokens.len(), 2);
        prop_assert_eq!(tokens[0].kind, TokenKind::Integer);
        prop_assert_eq!(&*tokens[0].text, input.as_str());
    }

    #[test]
    fn whitespace_runs_are_preserved_verbatim(input in "[ \t]{1,16}") {
        let tokens = lex_all(&input);
        prop_assert_eq!(tokens.len(), 2);
        prop_assert_eq!(tokens[0].kind, TokenKind::Whitespace);
        prop_assert_eq!(&*tokens[0].text, input.as_str());
    }

    #[test]
    fn arbitrary_strings_lex_as_one_token(input in "[a-zA-Z0-9_ ]{0,32}") {
        let source = format!("\"{}\"", input);
        let tokens = lex_all(&source);
        prop_assert_eq!(tokens.len(), 2);
        prop_assert_eq!(tokens[0].kind, TokenKind::StringLit);
        prop_assert_eq!(tokens[0].str_value(), Some(input.as_str()));
    }

    #[test]
    fn arbitrary_text_re_lexed_in_isolation_round_trips(input in "[a-zA-Z_][a-zA-Z0-9_]{0,31}") {
        // The first universal invariant: a token's text round-trips
        // through the lexer verbatim when re-lexed on its own.
        let first_pass = lex_all(&input);
        let second_pass = lex_all(&first_pass[0].text);
        prop_assert_eq!(&first_pass[0].text, &second_pass[0].text);
        prop_assert_eq!(first_pass[0].kind, second_pass[0].kind);
    }
}
