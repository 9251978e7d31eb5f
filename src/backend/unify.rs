//! Unification.
//!
//! Two entry points with different rollback responsibility:
//!
//! - [`unify_in_place`] trails every binding but leaves partial bindings in
//!   place when it fails. The compiled `unify` instruction and clause head
//!   matching use it: a failure there always backtracks, and the choice
//!   point being resumed undoes the trail past those bindings.
//! - [`unify`] takes its own trail mark and undoes to it on failure, so a
//!   failed call leaves no bindings behind. Natives and the goal driver use
//!   it because they may carry on after a failed attempt.
//!
//! There is no occurs check.

use smallvec::SmallVec;

use crate::backend::models::{float_eq, Term, VarRef};
use crate::backend::trail::Trail;

/// Unify without undoing partial bindings on failure
pub fn unify_in_place(trail: &mut Trail, a: &Term, b: &Term) -> bool {
    let mut work: SmallVec<[(Term, Term); 16]> = SmallVec::new();
    work.push((a.clone(), b.clone()));

    while let Some((a, b)) = work.pop() {
        let a = a.deref();
        let b = b.deref();
        match (&a, &b) {
            (Term::Var(x), Term::Var(y)) => {
                if !x.same(y) {
                    bind_vars(trail, x, y);
                }
            }
            (Term::Var(x), _) => trail.bind(x, b.clone()),
            (_, Term::Var(y)) => trail.bind(y, a.clone()),
            (Term::Atom(x), Term::Atom(y)) => {
                if x != y {
                    return false;
                }
            }
            (Term::Integer(x), Term::Integer(y)) => {
                if x != y {
                    return false;
                }
            }
            (Term::BigInt(x), Term::BigInt(y)) => {
                if x != y {
                    return false;
                }
            }
            (Term::Rational(x), Term::Rational(y)) => {
                if x != y {
                    return false;
                }
            }
            (Term::Float(x), Term::Float(y)) => {
                if !float_eq(*x, *y) {
                    return false;
                }
            }
            (Term::Opaque(x), Term::Opaque(y)) => {
                if !x.same(y) {
                    return false;
                }
            }
            (Term::Compound(x), Term::Compound(y)) => {
                if std::sync::Arc::ptr_eq(x, y) {
                    continue;
                }
                if x.tag() != y.tag() {
                    return false;
                }
                // Reversed so arguments are visited left to right
                for (p, q) in x.args().iter().zip(y.args()).rev() {
                    work.push((p.clone(), q.clone()));
                }
            }
            _ => return false,
        }
    }
    true
}

/// Unify, undoing every binding made by this call if it fails
pub fn unify(trail: &mut Trail, a: &Term, b: &Term) -> bool {
    let mark = trail.mark();
    if unify_in_place(trail, a, b) {
        true
    } else {
        trail.undo_to(mark);
        false
    }
}

/// Bind the younger of two unbound variables to the older, so binding
/// chains always point back in creation order and never form a cycle.
fn bind_vars(trail: &mut Trail, x: &VarRef, y: &VarRef) {
    if x.id() > y.id() {
        trail.bind(x, Term::Var(y.clone()));
    } else {
        trail.bind(y, Term::Var(x.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::symbol::Interner;

    fn f2(interner: &Interner, name: &str, a: Term, b: Term) -> Term {
        Term::compound(interner.tag_named(name, 2), vec![a, b])
    }

    #[test]
    fn test_unify_binds_both_sides() {
        let interner = Interner::new();
        let mut trail = Trail::new();
        let x = Term::var();
        let y = Term::var();
        let left = f2(&interner, "f", x.clone(), Term::Integer(1));
        let right = f2(&interner, "f", Term::Integer(2), y.clone());

        assert!(unify(&mut trail, &left, &right));
        assert_eq!(x.deref().as_integer(), Some(2));
        assert_eq!(y.deref().as_integer(), Some(1));
    }

    #[test]
    fn test_failed_unify_keeps_no_bindings() {
        let interner = Interner::new();
        let mut trail = Trail::new();
        let x = Term::var();
        let left = f2(&interner, "f", x.clone(), Term::Integer(1));
        let right = f2(&interner, "g", x.clone(), Term::Integer(1));

        let before = trail.mark();
        assert!(!unify(&mut trail, &left, &right));
        assert!(x.is_var());
        assert_eq!(trail.len(), before);
    }

    #[test]
    fn test_late_mismatch_rolls_back_earlier_bindings() {
        let interner = Interner::new();
        let mut trail = Trail::new();
        let x = Term::var();
        let left = f2(&interner, "f", x.clone(), Term::Integer(1));
        let right = f2(&interner, "f", Term::Integer(9), Term::Integer(2));

        trail.mark();
        assert!(!unify(&mut trail, &left, &right));
        assert!(x.is_var());
    }

    #[test]
    fn test_in_place_leaves_partial_bindings_for_caller() {
        let interner = Interner::new();
        let mut trail = Trail::new();
        let x = Term::var();
        let left = f2(&interner, "f", x.clone(), Term::Integer(1));
        let right = f2(&interner, "f", Term::Integer(9), Term::Integer(2));

        let mark = trail.mark();
        assert!(!unify_in_place(&mut trail, &left, &right));
        assert_eq!(x.deref().as_integer(), Some(9));
        assert_eq!(trail.len(), mark + 1);

        trail.undo_to(mark);
        assert!(x.is_var());
    }

    #[test]
    fn test_var_var_binds_younger_to_older() {
        let mut trail = Trail::new();
        let older = VarRef::fresh();
        let younger = VarRef::fresh();
        trail.mark();

        assert!(unify(&mut trail, &Term::Var(older.clone()), &Term::Var(younger.clone())));
        assert!(!older.is_bound());
        assert!(younger.is_bound());

        // Unifying again in the other direction must not create a cycle
        assert!(unify(&mut trail, &Term::Var(younger.clone()), &Term::Var(older.clone())));
        assert!(!older.is_bound());
    }

    #[test]
    fn test_integer_and_float_never_unify() {
        let mut trail = Trail::new();
        assert!(!unify(&mut trail, &Term::Integer(1), &Term::Float(1.0)));
        assert!(unify(&mut trail, &Term::Float(0.1 + 0.2), &Term::Float(0.3)));
    }

    #[test]
    fn test_shared_subterms_unify_trivially() {
        let interner = Interner::new();
        let mut trail = Trail::new();
        let shared = f2(&interner, "p", Term::var(), Term::var());
        let a = f2(&interner, "f", shared.clone(), shared.clone());
        assert!(unify(&mut trail, &a, &a.clone()));
        assert!(shared.variables().len() == 2);
    }
}
