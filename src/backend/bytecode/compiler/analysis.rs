//! Pass 1: goal classification, reserved-slot counting and variable slots.
//!
//! Environment layout of a compiled predicate:
//!
//! ```text
//! [0]            predicate cut barrier
//! [1 ..= R]      reserved slots (if-then-else, negation, catch)
//! [R + 1 ..]     one slot per distinct clause variable
//! ```
//!
//! Codegen hands out reserved slots in the same traversal order used here,
//! so both passes agree on the numbering without sharing a table.

use std::collections::HashMap;

use crate::backend::models::{Clause, Term, VarRef};
use crate::backend::symbol::{Interner, Tag};

use super::error::{CompileError, CompileResult};

/// A body goal seen through the control constructs the compiler inlines
pub(super) enum Shape {
    Variable(VarRef),
    True,
    Fail,
    Cut,
    Conjunction(Term, Term),
    Disjunction(Term, Term),
    IfThenElse(Term, Term, Term),
    IfThen(Term, Term),
    Not(Term),
    Unify(Term, Term),
    Throw(Term),
    Catch(Term, Term, Term),
    Call(Tag, Vec<Term>),
    NotCallable(Term),
}

/// Classify a body goal
pub(super) fn shape(interner: &Interner, goal: &Term) -> Shape {
    let known = interner.known();
    match goal.deref() {
        Term::Var(v) => Shape::Variable(v),
        Term::Atom(a) if a == known.true_ => Shape::True,
        Term::Atom(a) if a == known.fail || a == known.false_ => Shape::Fail,
        Term::Atom(a) if a == known.cut => Shape::Cut,
        Term::Atom(a) => Shape::Call(interner.tag(a, 0), Vec::new()),
        Term::Compound(c) => {
            let tag = c.tag();
            let args = c.args();
            if tag == known.comma {
                Shape::Conjunction(args[0].clone(), args[1].clone())
            } else if tag == known.semicolon {
                match args[0].as_compound() {
                    Some(cond) if cond.tag() == known.arrow => Shape::IfThenElse(
                        cond.args()[0].clone(),
                        cond.args()[1].clone(),
                        args[1].clone(),
                    ),
                    _ => Shape::Disjunction(args[0].clone(), args[1].clone()),
                }
            } else if tag == known.arrow {
                Shape::IfThen(args[0].clone(), args[1].clone())
            } else if tag == known.not {
                Shape::Not(args[0].clone())
            } else if tag == known.unify {
                Shape::Unify(args[0].clone(), args[1].clone())
            } else if tag == known.throw {
                Shape::Throw(args[0].clone())
            } else if tag == known.catch {
                Shape::Catch(args[0].clone(), args[1].clone(), args[2].clone())
            } else {
                Shape::Call(tag, args.to_vec())
            }
        }
        other => Shape::NotCallable(other),
    }
}

/// Reserved slots a body needs
pub(super) fn reserved_slots(interner: &Interner, body: &Term) -> CompileResult<usize> {
    let mut total = 0;
    // Leftmost goal on top, so the first non-callable goal is reported
    let mut pending = vec![body.clone()];
    while let Some(goal) = pending.pop() {
        match shape(interner, &goal) {
            Shape::Conjunction(a, b) | Shape::Disjunction(a, b) => pending.extend([b, a]),
            Shape::IfThenElse(c, t, e) => {
                total += 1;
                pending.extend([e, t, c]);
            }
            Shape::IfThen(c, t) => {
                total += 1;
                pending.extend([t, c]);
            }
            Shape::Not(g) => {
                total += 1;
                pending.push(g);
            }
            Shape::Catch(g, _, r) => {
                total += 2;
                pending.extend([r, g]);
            }
            Shape::NotCallable(goal) => return Err(CompileError::NotCallable(goal)),
            Shape::Variable(_)
            | Shape::True
            | Shape::Fail
            | Shape::Cut
            | Shape::Unify(..)
            | Shape::Throw(_)
            | Shape::Call(..) => {}
        }
    }
    Ok(total)
}

/// Check that a clause can be compiled, without generating code
pub fn validate_clause(interner: &Interner, clause: &Clause) -> CompileResult<()> {
    if !clause.head_ref().is_callable() {
        return Err(CompileError::InvalidHead(clause.head_ref().deref()));
    }
    reserved_slots(interner, clause.body_ref()).map(|_| ())
}

/// Result of pass 1 over a clause set
#[derive(Debug)]
pub(super) struct Analysis {
    /// Number of reserved slots across all clauses
    pub reserved: u16,
    /// Variable id to environment slot
    pub slots: HashMap<u64, u16>,
    /// Each clause's distinct variables, in order of first occurrence
    pub clause_variables: Vec<Vec<VarRef>>,
    /// Total environment size
    pub env_size: u16,
}

pub(super) fn analyze(interner: &Interner, clauses: &[Clause]) -> CompileResult<Analysis> {
    let mut reserved = 0usize;
    for clause in clauses {
        validate_clause(interner, clause)?;
        reserved += reserved_slots(interner, clause.body_ref())?;
    }

    let mut next = 1 + reserved;
    let mut slots = HashMap::new();
    let mut clause_variables = Vec::with_capacity(clauses.len());
    for clause in clauses {
        let mut variables = clause.head_ref().variables();
        for v in clause.body_ref().variables() {
            if !variables.iter().any(|seen| seen.same(&v)) {
                variables.push(v);
            }
        }
        for v in &variables {
            if let std::collections::hash_map::Entry::Vacant(entry) = slots.entry(v.id()) {
                let slot = u16::try_from(next).map_err(|_| CompileError::TooManySlots)?;
                entry.insert(slot);
                next += 1;
            }
        }
        clause_variables.push(variables);
    }

    Ok(Analysis {
        reserved: u16::try_from(reserved).map_err(|_| CompileError::TooManySlots)?,
        slots,
        clause_variables,
        env_size: u16::try_from(next).map_err(|_| CompileError::TooManySlots)?,
    })
}
