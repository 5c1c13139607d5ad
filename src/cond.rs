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

//! The conditional (`#if`/`#ifdef`/`#elif`/`#else`/`#endif`) state stack.

/// One nested `#if`/`#ifdef`/`#ifndef` level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct State {
    /// Were we already inside a dead branch of an enclosing conditional
    /// when this level was entered?
    pub parent_active: bool,

    /// Did the currently selected branch of this level evaluate true?
    pub active: bool,

    /// Has any branch at this level (the `#if`/`#ifdef`/`#ifndef` or a
    /// later `#elif`) evaluated true yet? Once set, no later `#elif` or
    /// `#else` may go live, regardless of what `active` was reset to.
    pub branch_taken: bool,

    /// Has a `#else` already been seen at this level?
    pub saw_else: bool,
}

impl State {
    pub const fn root() -> Self {
        Self { parent_active: true, active: true, branch_taken: true, saw_else: false }
    }

    fn new(parent_active: bool, active: bool) -> Self {
        Self { parent_active, active, branch_taken: active, saw_else: false }
    }

    /// Whether tokens under this level should be treated as live, i.e.
    /// both this level and every enclosing level are active.
    pub fn is_live(&self) -> bool {
        self.parent_active && self.active
    }
}

/// The nested-conditional state stack. Always has at least one entry; the
/// bottom entry is [`State::root`] and is never popped.
pub struct CondStack {
    stack: Vec<State>,
}

impl CondStack {
    pub fn new() -> Self {
        Self { stack: vec![State::root()] }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Whether the driver is currently inside a live (non-skipped) region.
    pub fn is_active(&self) -> bool {
        self.stack.last().map(State::is_live).unwrap_or(false)
    }

    /// Whether the level enclosing the current one is live. Used by
    /// `#elif` to decide whether its condition needs evaluating at all: a
    /// `#elif` nested inside an already-dead outer branch must still push
    /// no new depth, but evaluating its expression would be wasted work
    /// and could spuriously touch `__has_include` &c.
    pub fn parent_active(&self) -> bool {
        self.stack.last().map(|s| s.parent_active).unwrap_or(false)
    }

    /// Pushes a new level for `#if`/`#ifdef`/`#ifndef`. `condition` is the
    /// evaluated truth of this level's first branch.
    pub fn push(&mut self, condition: bool) {
        let parent_active = self.is_active();
        self.stack.push(State::new(parent_active, condition));
    }

    /// Handles `#else`. Returns `Err` if a `#else` was already seen at
    /// this level.
    pub fn else_branch(&mut self) -> Result<(), ()> {
        let top = self.stack.last_mut().ok_or(())?;
        if top.saw_else {
            return Err(());
        }
        top.saw_else = true;
        top.active = !top.branch_taken;
        Ok(())
    }

    /// Handles `#elif cond`. Returns `Err` if a `#else` was already seen
    /// at this level.
    pub fn elif_branch(&mut self, condition: bool) -> Result<(), ()> {
        let top = self.stack.last_mut().ok_or(())?;
        if top.saw_else {
            return Err(());
        }
        // Only the first branch to evaluate true within a level stays
        // active; once any branch has fired, every later #elif/#else
        // must stay dead regardless of its own condition.
        top.active = !top.branch_taken && condition;
        top.branch_taken |= top.active;
        Ok(())
    }

    /// Handles `#endif`. Returns `Err` if this would pop the root state.
    pub fn pop(&mut self) -> Result<(), ()> {
        if self.stack.len() <= 1 {
            return Err(());
        }
        self.stack.pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_depth_one_and_active() {
        let c = CondStack::new();
        assert_eq!(c.depth(), 1);
        assert!(c.is_active());
    }

    #[test]
    fn push_and_pop_round_trip_depth() {
        let mut c = CondStack::new();
        c.push(true);
        assert_eq!(c.depth(), 2);
        assert!(c.pop().is_ok());
        assert_eq!(c.depth(), 1);
    }

    #[test]
    fn pop_below_root_is_an_error() {
        let mut c = CondStack::new();
        assert!(c.pop().is_err());
    }

    #[test]
    fn inactive_parent_keeps_child_inactive() {
        let mut c = CondStack::new();
        c.push(false);
        assert!(!c.is_active());
        c.push(true);
        assert!(!c.is_active());
        c.pop().unwrap();
        c.pop().unwrap();
        assert!(c.is_active());
    }

    #[test]
    fn else_flips_active_once() {
        let mut c = CondStack::new();
        c.push(false);
        assert!(!c.is_active());
        c.else_branch().unwrap();
        assert!(c.is_active());
        assert!(c.else_branch().is_err());
    }

    #[test]
    fn elif_only_fires_if_no_prior_branch_was_active() {
        let mut c = CondStack::new();
        c.push(false);
        c.elif_branch(false).unwrap();
        assert!(!c.is_active());
        c.elif_branch(true).unwrap();
        assert!(c.is_active());
        // A later elif must not re-activate even if true.
        c.elif_branch(true).unwrap();
        assert!(!c.is_active());
    }

    #[test]
    fn elif_does_not_fire_after_an_earlier_branch_already_did() {
        let mut c = CondStack::new();
        c.push(true);
        c.elif_branch(false).unwrap();
        assert!(!c.is_active());
        c.elif_branch(true).unwrap();
        assert!(!c.is_active());
    }

    #[test]
    fn else_does_not_fire_after_an_earlier_branch_already_did() {
        let mut c = CondStack::new();
        c.push(true);
        c.elif_branch(false).unwrap();
        c.else_branch().unwrap();
        assert!(!c.is_active());
    }
}
