//! Trail (undo log) for non-destructive backtracking.
//!
//! Every reversible state change made while a mark is outstanding is
//! recorded here: variable bindings and arbitrary undo actions. Undoing to a
//! mark replays entries in reverse and truncates the log, so the state after
//! `undo_to(m)` is exactly the state when `mark()` returned `m`.
//!
//! Until the first `mark()` nothing can be undone, so bindings made before it
//! are not recorded.

use std::fmt;

use crate::backend::models::{Term, VarRef};

/// One reversible change
pub enum TrailEntry {
    /// Unbind a variable
    Bind(VarRef),
    /// Run an arbitrary undo action
    Action(Box<dyn FnOnce() + Send>),
}

impl fmt::Debug for TrailEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrailEntry::Bind(v) => write!(f, "Bind({:?})", v),
            TrailEntry::Action(_) => write!(f, "Action"),
        }
    }
}

/// The undo log of one engine
#[derive(Debug, Default)]
pub struct Trail {
    entries: Vec<TrailEntry>,
    mark_requested: bool,
}

/// A whole trail saved away while a nested goal runs
#[derive(Debug)]
pub struct TrailSnapshot {
    entries: Vec<TrailEntry>,
    mark_requested: bool,
}

impl Trail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current position; undoing to it restores the present state
    #[inline]
    pub fn mark(&mut self) -> usize {
        self.mark_requested = true;
        self.entries.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any mark has been taken since creation or the last snapshot
    #[inline]
    pub fn mark_requested(&self) -> bool {
        self.mark_requested
    }

    /// Bind an unbound variable and record the binding
    pub fn bind(&mut self, var: &VarRef, value: Term) {
        var.set(value);
        if self.mark_requested {
            self.entries.push(TrailEntry::Bind(var.clone()));
        }
    }

    /// Record an undo action to run when backtracking past this point
    pub fn record_action(&mut self, action: impl FnOnce() + Send + 'static) {
        if self.mark_requested {
            self.entries.push(TrailEntry::Action(Box::new(action)));
        }
    }

    /// Undo every entry above `mark`, newest first
    pub fn undo_to(&mut self, mark: usize) {
        while self.entries.len() > mark {
            match self.entries.pop() {
                Some(TrailEntry::Bind(var)) => var.reset(),
                Some(TrailEntry::Action(action)) => action(),
                None => break,
            }
        }
    }

    /// Move the whole log out, leaving an empty one that still records
    /// bindings (a nested goal always starts by taking a mark).
    pub fn take_snapshot(&mut self) -> TrailSnapshot {
        let snapshot = TrailSnapshot {
            entries: std::mem::take(&mut self.entries),
            mark_requested: self.mark_requested,
        };
        self.mark_requested = true;
        snapshot
    }

    /// Put a saved log back, discarding the current one.
    ///
    /// The current log must already have been undone.
    pub fn restore(&mut self, snapshot: TrailSnapshot) {
        debug_assert!(self.entries.is_empty(), "restoring over a live trail");
        self.entries = snapshot.entries;
        self.mark_requested = snapshot.mark_requested;
    }
}
