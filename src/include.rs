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

//! `#include`/`#include_next`/`#import` path search.
//!
//! A quoted include (`"foo.h"`) searches, in order: the directory of the
//! file doing the including, the quote-path list, then the system-path
//! list. An angle include (`<foo.h>`) skips straight to the system-path
//! list. A name containing a `/` additionally tries each framework path as
//! `<name-before-/>.framework/Headers/<rest>`.
//!
//! `#include_next` resumes the same search one entry past wherever the
//! *current* file was found, so a header can `#include_next` a
//! same-named header further down the search path.

use indexmap::IndexSet;
use log::{debug, trace};

use crate::vfs::{VirtualFile, VirtualFileSystem};

/// Re-exported so embedders can write `include::RealFileSystem`, the name
/// this module's directory-resolution logic is paired with; the type
/// itself lives in `vfs` alongside the trait it implements.
pub use crate::vfs::RealFileSystem;

/// One entry in the combined search list.
enum Dir<'a> {
    /// The directory containing the file that issued the `#include`.
    Current(&'a str),
    Quote(&'a str),
    System(&'a str),
}

/// The result of a successful, recording resolution.
pub struct Resolved {
    pub file: Box<dyn VirtualFile>,
    /// Index into the combined search list the file was found at, for a
    /// later `#include_next` to resume after.
    pub search_index: usize,
    /// `true` if this exact canonical path has been resolved via `#import`
    /// (or a prior `#import` of the same path) and must be skipped.
    pub already_imported: bool,
}

/// Ordered include/quote/framework path lists, plus the set of paths ever
/// `#import`ed.
#[derive(Default)]
pub struct IncludeResolver {
    quote_paths: Vec<String>,
    system_paths: Vec<String>,
    framework_paths: Vec<String>,
    imported: IndexSet<String>,
}

impl IncludeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_quote_path(&mut self, path: impl Into<String>) {
        self.quote_paths.push(path.into());
    }

    pub fn add_system_path(&mut self, path: impl Into<String>) {
        self.system_paths.push(path.into());
    }

    pub fn add_framework_path(&mut self, path: impl Into<String>) {
        self.framework_paths.push(path.into());
    }

    fn search_list<'a>(&'a self, current_dir: &'a str, quoted: bool) -> Vec<Dir<'a>> {
        let mut dirs = Vec::new();
        if quoted {
            dirs.push(Dir::Current(current_dir));
            dirs.extend(self.quote_paths.iter().map(|p| Dir::Quote(p)));
        }
        dirs.extend(self.system_paths.iter().map(|p| Dir::System(p)));
        dirs
    }

    /// Resolves `name` as it appears in an `#include`/`#include_next`.
    ///
    /// `after` is `Some(index)` for `#include_next`: only search-list
    /// entries strictly after `index` are tried.
    pub fn resolve(
        &mut self,
        vfs: &dyn VirtualFileSystem,
        current_dir: &str,
        name: &str,
        quoted: bool,
        after: Option<usize>,
    ) -> Option<Resolved> {
        let dirs = self.search_list(current_dir, quoted);
        for (i, dir) in dirs.iter().enumerate() {
            if after.map_or(false, |a| i <= a) {
                continue;
            }
            let d = match dir {
                Dir::Current(d) | Dir::Quote(d) | Dir::System(d) => *d,
            };
            trace!("searching '{d}' for '{name}'");
            let file = vfs.get_file(d, name);
            if file.is_file() {
                let already_imported = self.imported.contains(file.get_path());
                debug!("resolved '{name}' to '{}'", file.get_path());
                return Some(Resolved { file, search_index: i, already_imported });
            }
        }

        if let Some((framework, rest)) = name.split_once('/') {
            let header_dir = format!("{framework}.framework/Headers");
            for fw in &self.framework_paths {
                if let Some(file) = vfs.get_file(fw, &header_dir).get_child(rest) {
                    if file.is_file() {
                        let already_imported = self.imported.contains(file.get_path());
                        return Some(Resolved { file, search_index: dirs.len(), already_imported });
                    }
                }
            }
        }

        None
    }

    /// Checks whether `name` resolves, without registering an import.
    /// Backs `__has_include`/`__has_include_next`.
    pub fn check_only(&self, vfs: &dyn VirtualFileSystem, current_dir: &str, name: &str, quoted: bool) -> bool {
        let dirs = self.search_list(current_dir, quoted);
        for dir in &dirs {
            let d = match dir {
                Dir::Current(d) | Dir::Quote(d) | Dir::System(d) => *d,
            };
            if vfs.get_file(d, name).is_file() {
                return true;
            }
        }
        if let Some((framework, rest)) = name.split_once('/') {
            let header_dir = format!("{framework}.framework/Headers");
            for fw in &self.framework_paths {
                if let Some(file) = vfs.get_file(fw, &header_dir).get_child(rest) {
                    if file.is_file() {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Records that `path` has now been `#import`ed, so a later `#import`
    /// of the same canonical path is a no-op.
    pub fn mark_imported(&mut self, path: impl Into<String>) {
        self.imported.insert(path.into());
    }

    pub fn is_imported(&self, path: &str) -> bool {
        self.imported.contains(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::RealFileSystem;
    use std::fs;

    #[test]
    fn resolves_via_current_dir_for_quoted_include() {
        let dir = std::env::temp_dir().join(format!("cppp-include-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("local.h"), "").unwrap();

        let mut r = IncludeResolver::new();
        let vfs = RealFileSystem;
        let found = r.resolve(&vfs, dir.to_str().unwrap(), "local.h", true, None);
        assert!(found.is_some());
        assert!(!found.unwrap().already_imported);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn angle_include_does_not_search_current_dir() {
        let dir = std::env::temp_dir().join(format!("cppp-include-test2-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("local2.h"), "").unwrap();

        let mut r = IncludeResolver::new();
        let vfs = RealFileSystem;
        let found = r.resolve(&vfs, dir.to_str().unwrap(), "local2.h", false, None);
        assert!(found.is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn import_is_tracked_and_idempotent() {
        let mut r = IncludeResolver::new();
        assert!(!r.is_imported("/a/b.h"));
        r.mark_imported("/a/b.h");
        assert!(r.is_imported("/a/b.h"));
        r.mark_imported("/a/b.h");
        assert_eq!(r.imported.len(), 1);
    }

    #[test]
    fn include_next_skips_up_to_and_including_given_index() {
        let dir1 = std::env::temp_dir().join(format!("cppp-inc-next-a-{}", std::process::id()));
        let dir2 = std::env::temp_dir().join(format!("cppp-inc-next-b-{}", std::process::id()));
        fs::create_dir_all(&dir1).unwrap();
        fs::create_dir_all(&dir2).unwrap();
        fs::write(dir1.join("dup.h"), "").unwrap();
        fs::write(dir2.join("dup.h"), "").unwrap();

        let mut r = IncludeResolver::new();
        r.add_system_path(dir1.to_str().unwrap());
        r.add_system_path(dir2.to_str().unwrap());
        let vfs = RealFileSystem;

        let first = r.resolve(&vfs, "", "dup.h", false, None).unwrap();
        let second = r.resolve(&vfs, "", "dup.h", false, Some(first.search_index)).unwrap();
        assert!(second.search_index > first.search_index);

        let _ = fs::remove_dir_all(&dir1);
        let _ = fs::remove_dir_all(&dir2);
    }
}
