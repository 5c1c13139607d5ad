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

//! `cppp` is a C/Objective-C preprocessor core: a pull-based token
//! pipeline covering trigraph/line-splice joining, tokenization,
//! macro object-like/function-like expansion, `##`/`#` operators,
//! conditional compilation, and `#include`/`#import` resolution over
//! a pluggable virtual filesystem.
//!
//! The entry point is [`Preprocessor`]; construct one with
//! [`Preprocessor::new`], feed it source text with
//! [`Preprocessor::push_input`], and pull tokens with
//! [`Preprocessor::token`] until it yields [`token::TokenKind::Eof`].

mod cond;
mod error;
mod expr;
mod flags;
mod include;
mod lexer;
mod listener;
mod location;
mod macros;
mod reader;
mod source;
mod token;
mod vfs;

mod driver;

pub use driver::Preprocessor;
pub use error::{Diagnostic, FatalError};
pub use flags::{Features, Warnings};
pub use include::IncludeResolver;
pub use lexer::LexerSource;
pub use listener::{CollectingListener, Listener, SourceEvent};
pub use location::Location;
pub use token::{Punct, Token, TokenKind, Value};
pub use vfs::{RealFileSystem, VirtualFile, VirtualFileSystem};
