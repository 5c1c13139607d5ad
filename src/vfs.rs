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

//! The path→file resolution interface used for `#include`, and a default
//! implementation backed by the real filesystem.

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::flags::Features;
use crate::lexer::LexerSource;

/// A resolved (but not necessarily readable) file or directory handle.
pub trait VirtualFile {
    fn is_file(&self) -> bool;
    fn get_path(&self) -> &str;
    fn get_name(&self) -> &str;
    fn get_parent(&self) -> Option<Box<dyn VirtualFile>>;
    fn get_child(&self, name: &str) -> Option<Box<dyn VirtualFile>>;

    /// Opens this file for lexing. Only meaningful when [`is_file`] is
    /// true.
    fn open_as_source(&self, features: Features) -> std::io::Result<LexerSource>;
}

/// Resolves a `(directory, name)` pair to a [`VirtualFile`].
pub trait VirtualFileSystem {
    fn get_file(&self, dir: &str, name: &str) -> Box<dyn VirtualFile>;
}

/// The default [`VirtualFileSystem`], backed by `std::fs`.
#[derive(Default, Debug, Clone, Copy)]
pub struct RealFileSystem;

impl VirtualFileSystem for RealFileSystem {
    fn get_file(&self, dir: &str, name: &str) -> Box<dyn VirtualFile> {
        let path = if dir.is_empty() { PathBuf::from(name) } else { Path::new(dir).join(name) };
        Box::new(RealFile { path })
    }
}

struct RealFile {
    path: PathBuf,
}

impl VirtualFile for RealFile {
    fn is_file(&self) -> bool {
        self.path.is_file()
    }

    fn get_path(&self) -> &str {
        self.path.to_str().unwrap_or("")
    }

    fn get_name(&self) -> &str {
        self.path.file_name().and_then(|n| n.to_str()).unwrap_or("")
    }

    fn get_parent(&self) -> Option<Box<dyn VirtualFile>> {
        self.path.parent().map(|p| Box::new(RealFile { path: p.to_path_buf() }) as Box<dyn VirtualFile>)
    }

    fn get_child(&self, name: &str) -> Option<Box<dyn VirtualFile>> {
        Some(Box::new(RealFile { path: self.path.join(name) }))
    }

    fn open_as_source(&self, features: Features) -> std::io::Result<LexerSource> {
        let text = fs::read_to_string(&self.path)?;
        let path: Rc<str> = self.get_path().into();
        Ok(LexerSource::new(path, &text, features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_file_system_resolves_nonexistent_as_not_a_file() {
        let vfs = RealFileSystem;
        let f = vfs.get_file("/does/not/exist", "nope.h");
        assert!(!f.is_file());
        assert_eq!(f.get_name(), "nope.h");
    }

    #[test]
    fn real_file_system_reads_an_existing_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("cppp-vfs-test-{}.h", std::process::id()));
        fs::write(&path, "int x;\n").unwrap();

        let vfs = RealFileSystem;
        let f = vfs.get_file(dir.to_str().unwrap(), path.file_name().unwrap().to_str().unwrap());
        assert!(f.is_file());
        let mut src = f.open_as_source(Features::empty()).unwrap();
        let t = src.next();
        assert_eq!(&*t.text, "int");

        let _ = fs::remove_file(&path);
    }
}
