//! The uniform predicate calling contract.
//!
//! Compiled predicates and natives both answer a call with one of three
//! outcomes, or a [`Signal`]. After `SuccessMore` the caller may ask again
//! with `is_redo = true`; at that point the choice-point stack looks exactly
//! as the callee left it when it returned, so the callee finds its own
//! redo state on top.

use std::fmt;
use std::sync::Arc;

use crate::backend::bytecode::BytecodeChunk;
use crate::backend::engine::Engine;
use crate::backend::errors::Signal;
use crate::backend::models::Term;

/// Result of one call or redo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    /// Succeeded; a redo may produce more solutions
    SuccessMore,
    /// Succeeded; no more solutions
    SuccessFinal,
    /// No (more) solutions
    Fail,
}

/// What every predicate implementation returns
pub type ExecResult = Result<ExecOutcome, Signal>;

/// A predicate implemented in Rust.
///
/// A native that wants to be redone pushes its redo state with
/// [`Engine::push_native_state`] *before* making the bindings of the
/// solution it reports, returns `SuccessMore`, and on redo takes the state
/// back with [`Engine::pop_native_state`], which also undoes those
/// bindings.
pub trait NativePredicate: Send + Sync {
    fn execute(&self, engine: &mut Engine, is_redo: bool, args: &[Term]) -> ExecResult;
}

impl<F> NativePredicate for F
where
    F: Fn(&mut Engine, bool, &[Term]) -> ExecResult + Send + Sync,
{
    fn execute(&self, engine: &mut Engine, is_redo: bool, args: &[Term]) -> ExecResult {
        self(engine, is_redo, args)
    }
}

/// Something a call instruction can invoke
#[derive(Clone)]
pub enum Callee {
    Compiled(Arc<BytecodeChunk>),
    Native(Arc<dyn NativePredicate>),
}

impl fmt::Debug for Callee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callee::Compiled(chunk) => write!(f, "Compiled({})", chunk.name()),
            Callee::Native(_) => write!(f, "Native"),
        }
    }
}
