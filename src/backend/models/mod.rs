pub mod format;
pub mod number;
pub mod order;
pub mod term;

pub use number::{float_eq, Number, FLOAT_EPSILON};
pub use order::compare_terms;
pub use term::{Compound, Opaque, Term, VarRef};

use std::sync::Arc;

use crate::backend::symbol::{Interner, Tag};

/// A stored clause: `Head :- Body`
/// Uses Arc so clause lists can be snapshotted for compilation cheaply
#[derive(Debug, Clone)]
pub struct Clause {
    pub head: Arc<Term>,
    pub body: Arc<Term>,
}

impl Clause {
    /// Create a new clause from owned terms (wraps in Arc)
    pub fn new(head: Term, body: Term) -> Self {
        Clause {
            head: Arc::new(head),
            body: Arc::new(body),
        }
    }

    /// A fact: `Head :- true`
    pub fn fact(interner: &Interner, head: Term) -> Self {
        Clause::new(head, Term::Atom(interner.known().true_))
    }

    /// Split a `Head :- Body` term, or treat any other term as a fact
    pub fn from_term(interner: &Interner, term: &Term) -> Self {
        let neck = interner.tag_named(":-", 2);
        match term.as_compound() {
            Some(c) if c.tag() == neck => Clause::new(c.args()[0].clone(), c.args()[1].clone()),
            _ => Clause::fact(interner, term.clone()),
        }
    }

    /// Get a reference to the head
    #[inline]
    pub fn head_ref(&self) -> &Term {
        &self.head
    }

    /// Get a reference to the body
    #[inline]
    pub fn body_ref(&self) -> &Term {
        &self.body
    }

    /// The predicate this clause belongs to, if the head is callable
    pub fn predicate(&self, interner: &Interner) -> Option<Tag> {
        self.head.callable_parts(interner).map(|(tag, _)| tag)
    }

    /// A fresh copy of the clause as a `Head :- Body` term
    pub fn to_term(&self, interner: &Interner) -> Term {
        let neck = interner.tag_named(":-", 2);
        let mut map = std::collections::HashMap::new();
        let head = self.head.copy_with(&mut map);
        let body = self.body.copy_with(&mut map);
        Term::compound(neck, vec![head, body])
    }
}
