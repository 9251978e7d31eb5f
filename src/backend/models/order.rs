//! Standard order of terms.
//!
//! `Var < Number < Atom < Compound < Opaque`. Variables are ordered by age,
//! numbers by value with a float before an equal integer, atoms by name, and
//! compounds by arity, then name, then arguments left to right. Opaque host
//! values order by address, which is stable for the life of the value.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::backend::symbol::Interner;

use super::number::Number;
use super::term::Term;

fn class(term: &Term) -> u8 {
    match term {
        Term::Var(_) => 0,
        Term::Integer(_) | Term::BigInt(_) | Term::Rational(_) | Term::Float(_) => 1,
        Term::Atom(_) => 2,
        Term::Compound(_) => 3,
        Term::Opaque(_) => 4,
    }
}

/// Compare two terms in the standard order
pub fn compare_terms(interner: &Interner, a: &Term, b: &Term) -> Ordering {
    // Argument pairs still to compare, leftmost on top
    let mut pending = vec![(a.clone(), b.clone())];
    while let Some((a, b)) = pending.pop() {
        let order = compare_heads(interner, &a.deref(), &b.deref(), &mut pending);
        if order != Ordering::Equal {
            return order;
        }
    }
    Ordering::Equal
}

/// Compare the principal functors; equal compounds queue their arguments
fn compare_heads(
    interner: &Interner,
    a: &Term,
    b: &Term,
    pending: &mut Vec<(Term, Term)>,
) -> Ordering {
    match class(a).cmp(&class(b)) {
        Ordering::Equal => {}
        other => return other,
    }
    match (a, b) {
        (Term::Var(x), Term::Var(y)) => x.id().cmp(&y.id()),
        (Term::Atom(x), Term::Atom(y)) => interner.name(*x).cmp(interner.name(*y)),
        (Term::Compound(x), Term::Compound(y)) => {
            if Arc::ptr_eq(x, y) {
                return Ordering::Equal;
            }
            let (xn, xa) = interner.tag_parts(x.tag());
            let (yn, ya) = interner.tag_parts(y.tag());
            let order = xa.cmp(&ya).then_with(|| interner.name(xn).cmp(interner.name(yn)));
            if order == Ordering::Equal {
                pending.extend(x.args().iter().cloned().zip(y.args().iter().cloned()).rev());
            }
            order
        }
        (Term::Opaque(x), Term::Opaque(y)) => x.addr().cmp(&y.addr()),
        _ => compare_numbers(a, b),
    }
}

fn compare_numbers(a: &Term, b: &Term) -> Ordering {
    let (Some(x), Some(y)) = (Number::from_term(a), Number::from_term(b)) else {
        return Ordering::Equal;
    };
    match x.compare(&y) {
        Ordering::Equal => match (x.is_float(), y.is_float()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => Ordering::Equal,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_order() {
        let interner = Interner::new();
        let var = Term::var();
        let num = Term::Integer(100);
        let atom = Term::Atom(interner.atom("a"));
        let compound = Term::compound(interner.tag_named("f", 1), vec![Term::Integer(0)]);

        assert_eq!(compare_terms(&interner, &var, &num), Ordering::Less);
        assert_eq!(compare_terms(&interner, &num, &atom), Ordering::Less);
        assert_eq!(compare_terms(&interner, &atom, &compound), Ordering::Less);
    }

    #[test]
    fn test_float_before_equal_integer() {
        let interner = Interner::new();
        assert_eq!(
            compare_terms(&interner, &Term::Float(1.0), &Term::Integer(1)),
            Ordering::Less
        );
        assert_eq!(
            compare_terms(&interner, &Term::Integer(1), &Term::Float(1.5)),
            Ordering::Less
        );
    }

    #[test]
    fn test_compound_arity_then_name() {
        let interner = Interner::new();
        let z1 = Term::compound(interner.tag_named("z", 1), vec![Term::Integer(0)]);
        let a2 = Term::compound(
            interner.tag_named("a", 2),
            vec![Term::Integer(0), Term::Integer(0)],
        );
        let b1 = Term::compound(interner.tag_named("b", 1), vec![Term::Integer(0)]);
        assert_eq!(compare_terms(&interner, &z1, &a2), Ordering::Less);
        assert_eq!(compare_terms(&interner, &b1, &z1), Ordering::Less);
    }

    #[test]
    fn test_long_lists_compare_by_first_difference() {
        let interner = Interner::new();
        let mut items: Vec<Term> = (0..100_000).map(Term::Integer).collect();
        let left = Term::list(&interner, items.clone(), None);
        items[99_999] = Term::Integer(100_000);
        let right = Term::list(&interner, items, None);

        assert_eq!(compare_terms(&interner, &left, &right), Ordering::Less);
        assert_eq!(compare_terms(&interner, &left, &left.clone()), Ordering::Equal);
        assert_eq!(
            compare_terms(&interner, &left, &left.resolve_copy()),
            Ordering::Equal
        );
    }
}
