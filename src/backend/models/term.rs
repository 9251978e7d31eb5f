//! Terms, variable cells and structure copying.
//!
//! A `Term` is a cheap-to-clone handle: compounds, big numbers and opaque host
//! values are reference counted, so argument slots of different structures can
//! alias one subterm. Variables are shared cells that are bound at most once
//! between two backtrack points; binding and unbinding go through the trail
//! (see `backend::trail`).
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, ToPrimitive};
use parking_lot::Mutex;

use crate::backend::symbol::{Atom, Interner, Tag};

static NEXT_VAR_ID: AtomicU64 = AtomicU64::new(0);

/// Storage behind a logic variable
pub struct VarCell {
    id: u64,
    binding: Mutex<Option<Term>>,
}

/// Handle to a logic variable
#[derive(Clone)]
pub struct VarRef(Arc<VarCell>);

impl VarRef {
    /// Create a fresh unbound variable
    pub fn fresh() -> Self {
        VarRef(Arc::new(VarCell {
            id: NEXT_VAR_ID.fetch_add(1, Ordering::Relaxed),
            binding: Mutex::new(None),
        }))
    }

    /// Creation order of this variable; older variables have smaller ids
    #[inline]
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// The term this variable is bound to, if any
    #[inline]
    pub fn binding(&self) -> Option<Term> {
        self.0.binding.lock().clone()
    }

    #[inline]
    pub fn is_bound(&self) -> bool {
        self.0.binding.lock().is_some()
    }

    /// Whether two handles name the same variable
    #[inline]
    pub fn same(&self, other: &VarRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Bind without trailing. Only the trail and unifier call this.
    pub(crate) fn set(&self, value: Term) {
        let mut slot = self.0.binding.lock();
        debug_assert!(slot.is_none(), "variable rebound without undo");
        *slot = Some(value);
    }

    pub(crate) fn reset(&self) {
        *self.0.binding.lock() = None;
    }
}

impl Drop for VarCell {
    fn drop(&mut self) {
        if let Some(bound) = self.binding.get_mut().take() {
            release(vec![bound]);
        }
    }
}

/// Drop terms without recursing into their structure.
///
/// Compounds and variable cells whose last handle is being dropped are
/// emptied into `pending` before they are freed, so the drop glue of each
/// one only ever sees an empty argument array or an unbound cell. Long
/// lists and binding chains are therefore freed in constant stack space.
fn release(mut pending: Vec<Term>) {
    while let Some(term) = pending.pop() {
        match term {
            Term::Compound(c) => {
                if let Ok(mut c) = Arc::try_unwrap(c) {
                    pending.extend(std::mem::take(&mut c.args).into_vec());
                }
            }
            Term::Var(VarRef(cell)) => {
                if let Ok(mut cell) = Arc::try_unwrap(cell) {
                    pending.extend(cell.binding.get_mut().take());
                }
            }
            _ => {}
        }
    }
}

impl fmt::Debug for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_G{}", self.0.id)
    }
}

/// A compound term: tag plus owned argument array
pub struct Compound {
    tag: Tag,
    args: Box<[Term]>,
}

impl Drop for Compound {
    fn drop(&mut self) {
        if self.args.is_empty() {
            return;
        }
        release(std::mem::take(&mut self.args).into_vec());
    }
}

impl Compound {
    #[inline]
    pub fn tag(&self) -> Tag {
        self.tag
    }

    #[inline]
    pub fn args(&self) -> &[Term] {
        &self.args
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

/// An opaque host value carried through the engine untouched.
///
/// Two opaque terms are identical only when they share one allocation.
#[derive(Clone)]
pub struct Opaque(Arc<dyn Any + Send + Sync>);

impl Opaque {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Opaque(Arc::new(value))
    }

    /// Borrow the host value if it has type `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    #[inline]
    pub fn same(&self, other: &Opaque) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the shared allocation
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

/// A logic term
#[derive(Clone)]
pub enum Term {
    /// A variable, possibly bound
    Var(VarRef),
    /// An interned atom
    Atom(Atom),
    /// A machine integer
    Integer(i64),
    /// An integer outside the `i64` range
    BigInt(Arc<BigInt>),
    /// A rational with denominator other than one
    Rational(Arc<BigRational>),
    /// A double precision float
    Float(f64),
    /// A compound structure
    Compound(Arc<Compound>),
    /// A host value
    Opaque(Opaque),
}

impl Term {
    /// A fresh unbound variable
    #[inline]
    pub fn var() -> Term {
        Term::Var(VarRef::fresh())
    }

    #[inline]
    pub fn atom(atom: Atom) -> Term {
        Term::Atom(atom)
    }

    #[inline]
    pub fn integer(n: i64) -> Term {
        Term::Integer(n)
    }

    #[inline]
    pub fn float(f: f64) -> Term {
        Term::Float(f)
    }

    /// An arbitrary precision integer, normalised to `Integer` when it fits
    pub fn big_integer(n: BigInt) -> Term {
        match n.to_i64() {
            Some(small) => Term::Integer(small),
            None => Term::BigInt(Arc::new(n)),
        }
    }

    /// A rational, normalised to an integer when the denominator is one
    pub fn rational(r: BigRational) -> Term {
        if r.denom().is_one() {
            Term::big_integer(r.to_integer())
        } else {
            Term::Rational(Arc::new(r))
        }
    }

    /// A compound term. The tag arity must match the argument count.
    pub fn compound(tag: Tag, args: Vec<Term>) -> Term {
        Term::Compound(Arc::new(Compound {
            tag,
            args: args.into_boxed_slice(),
        }))
    }

    pub fn opaque<T: Any + Send + Sync>(value: T) -> Term {
        Term::Opaque(Opaque::new(value))
    }

    /// Follow the binding chain to its end.
    ///
    /// Iterative so long variable chains cannot exhaust the stack. The result
    /// is either a non-variable term or an unbound variable, so
    /// `t.deref().deref()` is always `t.deref()`.
    pub fn deref(&self) -> Term {
        let mut current = self.clone();
        loop {
            let next = match &current {
                Term::Var(v) => match v.binding() {
                    Some(bound) => bound,
                    None => return current,
                },
                _ => return current,
            };
            current = next;
        }
    }

    #[inline]
    pub fn is_var(&self) -> bool {
        matches!(self.deref(), Term::Var(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(
            self.deref(),
            Term::Integer(_) | Term::BigInt(_) | Term::Rational(_) | Term::Float(_)
        )
    }

    /// Atoms and compounds are callable
    pub fn is_callable(&self) -> bool {
        matches!(self.deref(), Term::Atom(_) | Term::Compound(_))
    }

    pub fn as_atom(&self) -> Option<Atom> {
        match self.deref() {
            Term::Atom(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self.deref() {
            Term::Integer(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self.deref() {
            Term::Float(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<Arc<Compound>> {
        match self.deref() {
            Term::Compound(c) => Some(c),
            _ => None,
        }
    }

    /// The predicate tag and arguments of a callable term
    pub fn callable_parts(&self, interner: &Interner) -> Option<(Tag, Vec<Term>)> {
        match self.deref() {
            Term::Atom(a) => Some((interner.tag(a, 0), Vec::new())),
            Term::Compound(c) => Some((c.tag(), c.args().to_vec())),
            _ => None,
        }
    }

    /// Term kind name as used in `type_error/2`
    pub fn type_name(&self) -> &'static str {
        match self.deref() {
            Term::Var(_) => "variable",
            Term::Atom(_) => "atom",
            Term::Integer(_) | Term::BigInt(_) => "integer",
            Term::Rational(_) => "rational",
            Term::Float(_) => "float",
            Term::Compound(_) => "compound",
            Term::Opaque(_) => "opaque",
        }
    }

    /// Deep copy sharing `map` between calls, so one variable occurring
    /// several times maps to one new variable.
    ///
    /// Bound variables are copied through; ground atomic terms are shared.
    pub fn copy_with(&self, map: &mut HashMap<u64, Term>) -> Term {
        enum Step {
            Copy(Term),
            Assemble(Tag, usize),
        }

        let mut steps = vec![Step::Copy(self.clone())];
        let mut done: Vec<Term> = Vec::new();
        while let Some(step) = steps.pop() {
            match step {
                Step::Copy(term) => match term.deref() {
                    Term::Var(v) => done.push(map.entry(v.id()).or_insert_with(Term::var).clone()),
                    Term::Compound(c) => {
                        steps.push(Step::Assemble(c.tag(), c.arity()));
                        steps.extend(c.args().iter().rev().cloned().map(Step::Copy));
                    }
                    other => done.push(other),
                },
                Step::Assemble(tag, arity) => {
                    let args = done.split_off(done.len() - arity);
                    done.push(Term::compound(tag, args));
                }
            }
        }
        done.pop().unwrap_or_else(Term::var)
    }

    /// A binding-independent copy: every bound variable is replaced by its
    /// value and every unbound one by a fresh variable.
    pub fn resolve_copy(&self) -> Term {
        self.copy_with(&mut HashMap::new())
    }

    /// The distinct unbound variables of this term, in depth-first
    /// left-to-right order of first occurrence.
    pub fn variables(&self) -> Vec<VarRef> {
        let mut seen = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(term) = stack.pop() {
            match term.deref() {
                Term::Var(v) => {
                    if !seen.iter().any(|s: &VarRef| s.same(&v)) {
                        seen.push(v);
                    }
                }
                Term::Compound(c) => stack.extend(c.args().iter().rev().cloned()),
                _ => {}
            }
        }
        seen
    }

    /// Build a proper list (or a partial list when `tail` is not `[]`)
    pub fn list(interner: &Interner, items: Vec<Term>, tail: Option<Term>) -> Term {
        let dot = interner.known().dot;
        let mut result = tail.unwrap_or(Term::Atom(interner.known().nil));
        for item in items.into_iter().rev() {
            result = Term::compound(dot, vec![item, result]);
        }
        result
    }

    /// The elements of a proper list, or `None` for partial and improper lists
    pub fn list_items(&self, interner: &Interner) -> Option<Vec<Term>> {
        let known = interner.known();
        let mut items = Vec::new();
        let mut current = self.deref();
        loop {
            match current {
                Term::Atom(a) if a == known.nil => return Some(items),
                Term::Compound(c) if c.tag() == known.dot => {
                    items.push(c.args()[0].clone());
                    current = c.args()[1].deref();
                }
                _ => return None,
            }
        }
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(v) => match v.binding() {
                Some(bound) => write!(f, "{:?}={:?}", v, bound),
                None => write!(f, "{:?}", v),
            },
            Term::Atom(a) => write!(f, "{:?}", a),
            Term::Integer(n) => write!(f, "{}", n),
            Term::BigInt(n) => write!(f, "{}", n),
            Term::Rational(r) => write!(f, "{}", r),
            Term::Float(x) => write!(f, "{:?}", x),
            Term::Compound(c) => f.debug_tuple(&format!("{:?}", c.tag())).field(&c.args()).finish(),
            Term::Opaque(_) => write!(f, "<opaque>"),
        }
    }
}

impl From<VarRef> for Term {
    fn from(v: VarRef) -> Self {
        Term::Var(v)
    }
}

impl From<Atom> for Term {
    fn from(a: Atom) -> Self {
        Term::Atom(a)
    }
}

impl From<i64> for Term {
    fn from(n: i64) -> Self {
        Term::Integer(n)
    }
}
