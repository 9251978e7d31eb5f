//! Choice-point stack.
//!
//! Every choice point carries the trail mark taken when it was pushed.
//! Backtracking undoes the trail to that mark before acting on the payload;
//! every payload except an in-code alternative is popped first (an
//! alternative stays until `trust_me` removes it). Cutting discards entries
//! above a height without touching the trail.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::backend::bytecode::BytecodeChunk;
use crate::backend::models::Term;
use crate::backend::predicate::Callee;

/// A local environment slot
#[derive(Debug, Clone, Default)]
pub enum Slot {
    #[default]
    Empty,
    Term(Term),
    Barrier(Barrier),
}

/// A saved cut position: choice-stack height plus trail mark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Barrier {
    pub choice: usize,
    pub trail: usize,
}

/// What to do when backtracking reaches a choice point
pub enum ChoiceKind {
    /// Redo a callee that succeeded with alternatives, then continue the
    /// caller at `resume`
    Retry {
        callee: Callee,
        args: Arc<[Term]>,
        resume: usize,
        call_ip: usize,
    },
    /// Resume the current activation at `resume` (try/retry_me_else)
    Alternative { resume: usize },
    /// Redo state owned by a native predicate
    Native { state: Box<dyn Any + Send> },
    /// Bottom of an activation; backtracking into it fails the activation
    FrameEntry { chunk: Arc<BytecodeChunk> },
    /// An activation that returned with alternatives left
    FrameExit { env: Vec<Slot>, entry: usize },
    /// A cleanup goal run when this entry is cut or backtracked through
    Cleanup { goal: Term },
}

impl fmt::Debug for ChoiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChoiceKind::Retry { resume, call_ip, .. } => f
                .debug_struct("Retry")
                .field("resume", resume)
                .field("call_ip", call_ip)
                .finish(),
            ChoiceKind::Alternative { resume } => {
                f.debug_struct("Alternative").field("resume", resume).finish()
            }
            ChoiceKind::Native { .. } => write!(f, "Native"),
            ChoiceKind::FrameEntry { chunk } => {
                f.debug_struct("FrameEntry").field("chunk", &chunk.name()).finish()
            }
            ChoiceKind::FrameExit { env, entry } => f
                .debug_struct("FrameExit")
                .field("env", &env.len())
                .field("entry", entry)
                .finish(),
            ChoiceKind::Cleanup { goal } => f.debug_struct("Cleanup").field("goal", goal).finish(),
        }
    }
}

/// A resumption record
#[derive(Debug)]
pub struct ChoicePoint {
    pub trail_mark: usize,
    pub kind: ChoiceKind,
}

/// Returned by `push` when the configured limit is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityExceeded {
    pub limit: usize,
}

/// The choice-point stack of one engine
#[derive(Debug)]
pub struct ChoiceStack {
    entries: Vec<ChoicePoint>,
    limit: usize,
}

impl ChoiceStack {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::with_capacity(64),
            limit,
        }
    }

    pub fn push(&mut self, point: ChoicePoint) -> Result<(), CapacityExceeded> {
        if self.entries.len() >= self.limit {
            return Err(CapacityExceeded { limit: self.limit });
        }
        self.entries.push(point);
        Ok(())
    }

    #[inline]
    pub fn pop(&mut self) -> Option<ChoicePoint> {
        self.entries.pop()
    }

    #[inline]
    pub fn peek(&self) -> Option<&ChoicePoint> {
        self.entries.last()
    }

    #[inline]
    pub fn peek_mut(&mut self) -> Option<&mut ChoicePoint> {
        self.entries.last_mut()
    }

    /// The entry at `index`, counted from the bottom
    #[inline]
    pub fn get(&self, index: usize) -> Option<&ChoicePoint> {
        self.entries.get(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Discard every entry above `height` without undoing the trail.
    ///
    /// Returns the goals of discarded cleanup holders, newest first, for the
    /// caller to run.
    pub fn cut_to(&mut self, height: usize) -> Vec<Term> {
        if self.entries.len() <= height {
            return Vec::new();
        }
        self.entries
            .drain(height..)
            .rev()
            .filter_map(|cp| match cp.kind {
                ChoiceKind::Cleanup { goal } => Some(goal),
                _ => None,
            })
            .collect()
    }

    /// Take every entry out, leaving the stack empty
    pub(crate) fn take_all(&mut self) -> Vec<ChoicePoint> {
        std::mem::take(&mut self.entries)
    }

    /// Replace the entries with a saved set.
    ///
    /// The current stack must be empty.
    pub(crate) fn restore_all(&mut self, entries: Vec<ChoicePoint>) {
        debug_assert!(self.entries.is_empty(), "restoring over live choice points");
        self.entries = entries;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alt(resume: usize) -> ChoicePoint {
        ChoicePoint {
            trail_mark: 0,
            kind: ChoiceKind::Alternative { resume },
        }
    }

    #[test]
    fn test_push_pop_peek() {
        let mut stack = ChoiceStack::new(8);
        stack.push(alt(1)).expect("room");
        stack.push(alt(2)).expect("room");
        assert_eq!(stack.len(), 2);
        assert!(matches!(
            stack.peek().map(|cp| &cp.kind),
            Some(ChoiceKind::Alternative { resume: 2 })
        ));
        assert!(stack.pop().is_some());
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_limit() {
        let mut stack = ChoiceStack::new(1);
        stack.push(alt(1)).expect("room");
        assert_eq!(stack.push(alt(2)), Err(CapacityExceeded { limit: 1 }));
    }

    #[test]
    fn test_cut_returns_cleanups() {
        let mut stack = ChoiceStack::new(8);
        stack.push(alt(1)).expect("room");
        stack
            .push(ChoicePoint {
                trail_mark: 0,
                kind: ChoiceKind::Cleanup {
                    goal: Term::Integer(1),
                },
            })
            .expect("room");
        stack.push(alt(2)).expect("room");
        stack
            .push(ChoicePoint {
                trail_mark: 0,
                kind: ChoiceKind::Cleanup {
                    goal: Term::Integer(2),
                },
            })
            .expect("room");

        let cleanups = stack.cut_to(1);
        assert_eq!(stack.len(), 1);
        let order: Vec<_> = cleanups.iter().filter_map(|t| t.as_integer()).collect();
        assert_eq!(order, vec![2, 1]);
        assert!(stack.cut_to(5).is_empty());
    }

    #[test]
    fn test_peek_mut_updates_top_in_place() {
        let mut stack = ChoiceStack::new(8);
        stack.push(alt(1)).expect("room");
        stack.push(alt(2)).expect("room");
        if let Some(ChoiceKind::Alternative { resume }) = stack.peek_mut().map(|cp| &mut cp.kind) {
            *resume = 9;
        }
        assert!(matches!(
            stack.get(1).map(|cp| &cp.kind),
            Some(ChoiceKind::Alternative { resume: 9 })
        ));
        assert!(matches!(
            stack.get(0).map(|cp| &cp.kind),
            Some(ChoiceKind::Alternative { resume: 1 })
        ));
        assert!(stack.get(2).is_none());
    }

    #[test]
    fn test_take_and_restore() {
        let mut stack = ChoiceStack::new(8);
        stack.push(alt(1)).expect("room");
        let saved = stack.take_all();
        assert!(stack.is_empty());
        stack.restore_all(saved);
        assert_eq!(stack.len(), 1);
    }
}
