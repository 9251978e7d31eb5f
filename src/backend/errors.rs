//! Exceptions as terms.
//!
//! Everything that can go wrong at run time surfaces as a thrown term of the
//! shape `error(Formal, Context)`. [`PrologError`] is the public carrier of
//! such a term; [`Signal`] is what travels up through predicate calls inside
//! the engine, where a halt request is distinct from an exception.

use std::fmt;

use crate::backend::models::Term;
use crate::backend::symbol::{Interner, Tag};

/// Non-local exit from a predicate call
#[derive(Debug, Clone)]
pub enum Signal {
    /// An exception; the ball is already a binding-independent copy
    Throw(Term),
    /// `halt/0,1`: stop the engine without running handlers
    Halt(i32),
}

impl Signal {
    /// Throw a copy of `ball` taken now, so later undo cannot alter it
    pub fn throw(ball: &Term) -> Signal {
        Signal::Throw(ball.resolve_copy())
    }
}

impl From<PrologError> for Signal {
    fn from(err: PrologError) -> Self {
        Signal::Throw(err.ball)
    }
}

/// An uncaught exception, carrying the thrown term
#[derive(Clone)]
pub struct PrologError {
    ball: Term,
    rendered: String,
}

impl PrologError {
    /// Wrap an arbitrary thrown term
    pub fn new(interner: &Interner, ball: &Term) -> Self {
        let ball = ball.resolve_copy();
        let rendered = interner.format_term(&ball);
        Self { ball, rendered }
    }

    /// The thrown term
    pub fn ball(&self) -> &Term {
        &self.ball
    }

    /// Consume the error, returning the thrown term
    pub fn into_ball(self) -> Term {
        self.ball
    }

    /// The `Formal` part of `error(Formal, Context)`, if the ball has that shape
    pub fn formal(&self, interner: &Interner) -> Option<Term> {
        self.ball
            .as_compound()
            .filter(|c| c.tag() == interner.known().error)
            .map(|c| c.args()[0].clone())
    }

    /// The name of the formal term, e.g. `"type_error"`
    pub fn kind<'i>(&self, interner: &'i Interner) -> Option<&'i str> {
        let formal = self.formal(interner)?;
        match formal.deref() {
            Term::Atom(a) => Some(interner.name(a)),
            Term::Compound(c) => Some(interner.name(interner.tag_name(c.tag()))),
            _ => None,
        }
    }

    fn iso(interner: &Interner, formal: Term) -> Self {
        let ball = Term::compound(interner.known().error, vec![formal, Term::var()]);
        Self::new(interner, &ball)
    }

    fn atom(interner: &Interner, name: &str) -> Term {
        Term::Atom(interner.atom(name))
    }

    fn structure(interner: &Interner, name: &str, args: Vec<Term>) -> Term {
        Term::compound(interner.tag_named(name, args.len()), args)
    }

    pub fn instantiation_error(interner: &Interner) -> Self {
        Self::iso(interner, Self::atom(interner, "instantiation_error"))
    }

    /// `type_error(Type, Culprit)`
    pub fn type_error(interner: &Interner, expected: &str, culprit: &Term) -> Self {
        let formal = Self::structure(
            interner,
            "type_error",
            vec![Self::atom(interner, expected), culprit.clone()],
        );
        Self::iso(interner, formal)
    }

    /// `domain_error(Domain, Culprit)`
    pub fn domain_error(interner: &Interner, domain: &str, culprit: &Term) -> Self {
        let formal = Self::structure(
            interner,
            "domain_error",
            vec![Self::atom(interner, domain), culprit.clone()],
        );
        Self::iso(interner, formal)
    }

    /// `representation_error(Flag)`
    pub fn representation_error(interner: &Interner, flag: &str) -> Self {
        let formal = Self::structure(
            interner,
            "representation_error",
            vec![Self::atom(interner, flag)],
        );
        Self::iso(interner, formal)
    }

    /// `existence_error(Kind, Culprit)`
    pub fn existence_error(interner: &Interner, kind: &str, culprit: &Term) -> Self {
        let formal = Self::structure(
            interner,
            "existence_error",
            vec![Self::atom(interner, kind), culprit.clone()],
        );
        Self::iso(interner, formal)
    }

    /// `existence_error(procedure, Name/Arity)`
    pub fn unknown_procedure(interner: &Interner, tag: Tag) -> Self {
        let indicator = indicator(interner, tag);
        Self::existence_error(interner, "procedure", &indicator)
    }

    /// `permission_error(Action, Type, Culprit)`
    pub fn permission_error(interner: &Interner, action: &str, kind: &str, culprit: &Term) -> Self {
        let formal = Self::structure(
            interner,
            "permission_error",
            vec![
                Self::atom(interner, action),
                Self::atom(interner, kind),
                culprit.clone(),
            ],
        );
        Self::iso(interner, formal)
    }

    /// `evaluation_error(Error)`
    pub fn evaluation_error(interner: &Interner, error: &str) -> Self {
        let formal = Self::structure(interner, "evaluation_error", vec![Self::atom(interner, error)]);
        Self::iso(interner, formal)
    }

    /// `resource_error(Resource)`
    pub fn resource_error(interner: &Interner, resource: &str) -> Self {
        let formal = Self::structure(interner, "resource_error", vec![Self::atom(interner, resource)]);
        Self::iso(interner, formal)
    }

    /// `system_error(Message)`
    pub fn system_error(interner: &Interner, message: &str) -> Self {
        let formal = Self::structure(interner, "system_error", vec![Self::atom(interner, message)]);
        Self::iso(interner, formal)
    }
}

/// `Name/Arity` for a predicate tag
pub fn indicator(interner: &Interner, tag: Tag) -> Term {
    let (name, arity) = interner.tag_parts(tag);
    Term::compound(
        interner.known().slash,
        vec![Term::Atom(name), Term::Integer(arity as i64)],
    )
}

impl fmt::Debug for PrologError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PrologError").field(&self.rendered).finish()
    }
}

impl fmt::Display for PrologError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uncaught exception: {}", self.rendered)
    }
}

impl std::error::Error for PrologError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_shapes() {
        let interner = Interner::new();
        let err = PrologError::type_error(&interner, "callable", &Term::Integer(3));
        assert_eq!(err.kind(&interner), Some("type_error"));
        assert!(err.to_string().contains("type_error(callable,3)"));

        let err = PrologError::instantiation_error(&interner);
        assert_eq!(err.kind(&interner), Some("instantiation_error"));
    }

    #[test]
    fn test_unknown_procedure_indicator() {
        let interner = Interner::new();
        let tag = interner.tag_named("missing", 2);
        let err = PrologError::unknown_procedure(&interner, tag);
        assert!(err
            .to_string()
            .contains("existence_error(procedure,/(missing,2))"));
    }

    #[test]
    fn test_ball_is_copied() {
        let interner = Interner::new();
        let x = crate::backend::models::VarRef::fresh();
        let ball = Term::compound(interner.tag_named("oops", 1), vec![Term::Var(x.clone())]);
        let err = PrologError::new(&interner, &ball);
        let inner = err.ball().as_compound().expect("compound").args()[0].clone();
        assert!(matches!(inner, Term::Var(ref v) if !v.same(&x)));
    }
}
