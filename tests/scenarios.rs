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

//! Black-box scenarios driven entirely through the public API.

use std::fs;

use cppp::{CollectingListener, Features, Preprocessor, Punct, TokenKind, Warnings};

fn run(text: &str) -> Vec<String> {
    let _ = env_logger::try_init();
    run_with(Preprocessor::new().with_listener(CollectingListener::new()), text)
}

fn run_with(mut pp: Preprocessor, text: &str) -> Vec<String> {
    pp.push_input("t.c", text);
    let mut out = Vec::new();
    loop {
        let t = pp.token().expect("no listener registered");
        let done = t.kind == TokenKind::Eof;
        if t.kind != TokenKind::Whitespace && t.kind != TokenKind::Newline && !done {
            out.push(t.text.to_string());
        }
        if done {
            break;
        }
    }
    out
}

#[test]
fn object_like_and_function_like_macros_compose() {
    let out = run("#define TWO 2\n#define ADD(a, b) a + b\nADD(TWO, 3)\n");
    assert_eq!(out, vec!["2", "+", "3"]);
}

#[test]
fn token_pasting_builds_a_new_identifier() {
    let out = run("#define CAT(a, b) a##b\nCAT(foo, bar)\n");
    assert_eq!(out, vec!["foobar"]);
}

#[test]
fn variadic_macro_forwards_trailing_arguments_through_stringify() {
    let out = run("#define LOG(fmt, ...) fmt #__VA_ARGS__\nLOG(\"x\", 1, 2, 3)\n");
    assert_eq!(out[0], "\"x\"");
    assert_eq!(out[1], "\"1, 2, 3\"");
}

#[test]
fn conditional_compilation_selects_the_live_branch() {
    let out = run("#if 0\ndead\n#elif 1\nlive\n#else\nunreachable\n#endif\n");
    assert_eq!(out, vec!["live"]);
}

#[test]
fn recursive_macro_expansion_is_not_reexpanded() {
    let out = run("#define R R + 1\nR\n");
    assert_eq!(out, vec!["R", "+", "1"]);
}

#[test]
fn defined_and_undef_interact_in_if_expressions() {
    let out = run(
        "#define FOO\n#undef BAR\n#if defined(FOO) && !defined(BAR)\nyes\n#else\nno\n#endif\n",
    );
    assert_eq!(out, vec!["yes"]);
}

#[test]
fn include_directive_reads_through_the_virtual_filesystem() {
    let dir = std::env::temp_dir().join(format!("cppp-scenario-include-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("greet.h"), "#define GREETING hello\n").unwrap();

    let mut pp = Preprocessor::new().with_listener(CollectingListener::new());
    pp.add_quote_path(dir.to_str().unwrap());
    let out = run_with(pp, "#include \"greet.h\"\nGREETING\n");

    assert_eq!(out, vec!["hello".to_string()]);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn line_markers_bracket_an_included_file_when_enabled() {
    let dir = std::env::temp_dir().join(format!("cppp-scenario-linemarker-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("inc.h"), "body\n").unwrap();

    let mut pp = Preprocessor::new()
        .with_listener(CollectingListener::new())
        .with_features(Features::LINEMARKERS);
    pp.add_quote_path(dir.to_str().unwrap());
    pp.push_input("main.c", "#include \"inc.h\"\nafter\n");

    let mut saw_enter_marker = false;
    let mut saw_body = false;
    loop {
        let t = pp.token().expect("no listener registered");
        if t.kind == TokenKind::PLine && t.text.contains("inc.h") {
            saw_enter_marker = true;
        }
        if t.kind == TokenKind::Identifier && &*t.text == "body" {
            saw_body = true;
        }
        if t.kind == TokenKind::Eof {
            break;
        }
    }
    assert!(saw_enter_marker);
    assert!(saw_body);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn undefined_identifier_in_if_expression_is_silent_unless_warned() {
    let mut quiet = Preprocessor::new().with_listener(CollectingListener::new());
    quiet.push_input("t.c", "#if UNDEFINED_MACRO\nyes\n#else\nno\n#endif\n");
    loop {
        let t = quiet.token().expect("no listener registered");
        if t.kind == TokenKind::Eof {
            break;
        }
    }

    let mut loud = Preprocessor::new()
        .with_listener(CollectingListener::new())
        .with_warnings(Warnings::UNDEF);
    loud.push_input("t.c", "#if UNDEFINED_MACRO\nyes\n#else\nno\n#endif\n");
    loop {
        let t = loud.token().expect("no listener registered");
        if t.kind == TokenKind::Eof {
            break;
        }
    }
}

#[test]
fn stray_hash_hash_in_object_like_macro_pastes_literally() {
    // '#' and '##' have no special meaning outside a function-like
    // macro's replacement list except '##' itself, which still pastes.
    let out = run("#define GLUE a##b\nGLUE\n");
    assert_eq!(out, vec!["ab"]);
}

#[test]
fn paren_punct_survives_macro_expansion_unexpanded() {
    let out = run("#define EMPTY()\nEMPTY()\nfoo\n");
    assert_eq!(out, vec!["foo"]);
}

#[test]
fn unterminated_if_at_eof_is_reported_without_crashing() {
    let out = run("#if 1\nlive\n");
    assert_eq!(out, vec!["live"]);
}

#[test]
fn elif_after_a_true_branch_never_fires() {
    let out = run("#if 1\nfirst\n#elif 0\nsecond\n#elif 1\nthird\n#endif\n");
    assert_eq!(out, vec!["first"]);
}

#[test]
fn else_after_a_true_branch_never_fires() {
    let out = run("#if 1\nfirst\n#elif 0\nsecond\n#else\nthird\n#endif\n");
    assert_eq!(out, vec!["first"]);
}

#[test]
fn unmatched_paste_reports_invalid_paste_without_crashing() {
    let out = run("#define BAD(a) a##+\nBAD(x)\n");
    // '+' cannot paste onto 'x' into one valid token; the driver must
    // report and keep going rather than panic.
    assert!(!out.is_empty());
    let _ = Punct::Char(b'+');
}
