//! Control natives.
//!
//! Predicates implemented in Rust on top of the public native contract
//! ([`NativePredicate`](crate::backend::NativePredicate)): they only use
//! engine unification, native redo state and nested goals.
//!
//! | Predicate          | Solutions |
//! |--------------------|-----------|
//! | `between/3`        | many, via native redo state |
//! | `findall/3`        | one, via a nested goal |
//! | `call_cleanup/2`   | as many as the goal |
//! | `halt/0`, `halt/1` | raises the halt signal |

use std::sync::Arc;

use tracing::warn;

use crate::backend::bytecode::BytecodeChunk;
use crate::backend::choice::ChoiceKind;
use crate::backend::database::Database;
use crate::backend::engine::Engine;
use crate::backend::errors::{PrologError, Signal};
use crate::backend::models::Term;
use crate::backend::predicate::{Callee, ExecOutcome, ExecResult};

type NativeFn = fn(&mut Engine, bool, &[Term]) -> ExecResult;

const BUILTINS: [(&str, usize, NativeFn); 5] = [
    ("between", 3, between),
    ("findall", 3, findall),
    ("call_cleanup", 2, call_cleanup),
    ("halt", 0, halt),
    ("halt", 1, halt),
];

/// Register the control natives with a database
pub fn register_builtins(db: &Database) {
    for (name, arity, native) in BUILTINS {
        let tag = db.interner().tag_named(name, arity);
        if let Err(err) = db.register_native(tag, native) {
            warn!(target: "horn::database", predicate = name, arity, error = %err, "builtin not registered");
        }
    }
}

// === between/3 ===

/// Redo state: the next value to report and the inclusive upper bound
struct BetweenState {
    next: i64,
    high: Option<i64>,
}

fn integer_arg(engine: &Engine, term: &Term) -> Result<i64, PrologError> {
    match term.deref() {
        Term::Var(_) => Err(PrologError::instantiation_error(engine.interner())),
        Term::Integer(n) => Ok(n),
        other => Err(PrologError::type_error(engine.interner(), "integer", &other)),
    }
}

/// Upper bound; `inf` and `infinite` mean unbounded
fn upper_bound(engine: &Engine, term: &Term) -> Result<Option<i64>, PrologError> {
    if let Some(atom) = term.as_atom() {
        let name = engine.interner().name(atom);
        if name == "inf" || name == "infinite" {
            return Ok(None);
        }
    }
    integer_arg(engine, term).map(Some)
}

fn between(engine: &mut Engine, is_redo: bool, args: &[Term]) -> ExecResult {
    let (current, high) = if is_redo {
        let state = engine
            .pop_native_state()
            .and_then(|state| state.downcast::<BetweenState>().ok());
        match state {
            Some(state) => (state.next, state.high),
            None => return Ok(ExecOutcome::Fail),
        }
    } else {
        let low = integer_arg(engine, &args[0])?;
        let high = upper_bound(engine, &args[1])?;
        match args[2].deref() {
            Term::Var(_) => (low, high),
            Term::Integer(x) => {
                let within = x >= low && high.map_or(true, |h| x <= h);
                return Ok(if within {
                    ExecOutcome::SuccessFinal
                } else {
                    ExecOutcome::Fail
                });
            }
            other => return Err(PrologError::type_error(engine.interner(), "integer", &other).into()),
        }
    };

    if high.is_some_and(|h| current > h) {
        return Ok(ExecOutcome::Fail);
    }

    let last = current == i64::MAX || high == Some(current);
    if !last {
        engine.push_native_state(Box::new(BetweenState {
            next: current + 1,
            high,
        }))?;
    }
    if !engine.unify(&args[2], &Term::Integer(current)) {
        // X was unbound on the first call, so this cannot fail
        return Ok(ExecOutcome::Fail);
    }
    Ok(if last {
        ExecOutcome::SuccessFinal
    } else {
        ExecOutcome::SuccessMore
    })
}

// === findall/3 ===

fn findall(engine: &mut Engine, _is_redo: bool, args: &[Term]) -> ExecResult {
    let results = engine.collect(&args[0], &args[1], None)?;
    let list = Term::list(engine.interner(), results, None);
    Ok(if engine.unify(&args[2], &list) {
        ExecOutcome::SuccessFinal
    } else {
        ExecOutcome::Fail
    })
}

// === call_cleanup/2 ===

/// Redo state: the goal's temporary predicate and its arguments
struct CleanupState {
    chunk: Arc<BytecodeChunk>,
    vars: Arc<[Term]>,
}

fn call_cleanup(engine: &mut Engine, is_redo: bool, args: &[Term]) -> ExecResult {
    let (chunk, vars, result) = if is_redo {
        let state = engine
            .pop_native_state()
            .and_then(|state| state.downcast::<CleanupState>().ok());
        let Some(state) = state else {
            return Ok(ExecOutcome::Fail);
        };
        let callee = Callee::Compiled(Arc::clone(&state.chunk));
        let result = engine.invoke(&callee, &state.vars, true);
        (state.chunk, state.vars, result)
    } else {
        let meta_call = engine.interner().known().meta_call;
        let (chunk, vars) = engine.compile_goal(meta_call, &args[0])?;
        engine.push_choice(ChoiceKind::Cleanup {
            goal: args[1].clone(),
        })?;
        let callee = Callee::Compiled(Arc::clone(&chunk));
        let result = engine.invoke(&callee, &vars, false);
        (chunk, vars, result)
    };

    if let Ok(ExecOutcome::SuccessMore) = result {
        engine.push_native_state(Box::new(CleanupState { chunk, vars }))?;
        return result;
    }

    // The goal is finished: its frame is gone and the holder is on top
    if let Some(cleanup) = engine.pop_cleanup() {
        if let Err(Signal::Halt(code)) = engine.run_cleanups(vec![cleanup]) {
            return Err(Signal::Halt(code));
        }
    }
    result
}

// === halt/0, halt/1 ===

fn halt(engine: &mut Engine, _is_redo: bool, args: &[Term]) -> ExecResult {
    let code = match args.first() {
        None => 0,
        Some(status) => {
            let n = integer_arg(engine, status)?;
            i32::try_from(n)
                .map_err(|_| PrologError::representation_error(engine.interner(), "exit_status"))?
        }
    };
    Err(Signal::Halt(code))
}
