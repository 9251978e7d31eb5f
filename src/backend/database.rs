//! Clause database.
//!
//! Holds the predicate table shared by every engine built on it: ordered
//! clause lists for user predicates, native implementations, and the
//! compiled-code cache. The database owns the [`Interner`].
//!
//! # Invalidation
//!
//! Every mutation bumps a global generation counter, evicts the changed
//! predicate's compiled code and notifies subscribers. Call sites remember
//! the generation they resolved at, so no engine keeps calling stale code.
//!
//! # Thread Safety
//!
//! `Database` is `Send + Sync`. The predicate table sits behind a
//! `parking_lot::RwLock`; the code cache is a `DashMap`. Mutating while a
//! goal is running on another engine must still be serialized by the
//! caller.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::backend::bytecode::{compile_predicate, validate_clause, BytecodeChunk, CodeCache, CodeCacheStats};
use crate::backend::errors::{indicator, PrologError};
use crate::backend::models::{Clause, Term};
use crate::backend::native;
use crate::backend::predicate::NativePredicate;
use crate::backend::symbol::{Interner, Tag};
use crate::config::UnknownPolicy;

/// How a predicate is implemented
#[derive(Clone)]
enum Predicate {
    User(Vec<Clause>),
    Native(Arc<dyn NativePredicate>),
}

/// What a call to a tag resolves to
#[derive(Clone)]
pub enum Resolved {
    /// Compiled clauses
    Compiled(Arc<BytecodeChunk>),
    /// A Rust implementation
    Native(Arc<dyn NativePredicate>),
    /// A control construct (`,/2`, `call/N`, ...) called by tag
    Control,
    /// No such predicate
    Undefined,
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Compiled(chunk) => write!(f, "Compiled({})", chunk.name()),
            Resolved::Native(_) => write!(f, "Native"),
            Resolved::Control => write!(f, "Control"),
            Resolved::Undefined => write!(f, "Undefined"),
        }
    }
}

/// A database change, as seen by subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// The clause list of a predicate changed
    Clauses(Tag),
    /// A native was registered
    Native(Tag),
    /// A predicate was removed entirely
    Abolished(Tag),
    /// A database-wide flag changed
    Flags,
}

type Listener = Box<dyn Fn(&Change) + Send + Sync>;

/// Predicate table plus compiled-code cache
pub struct Database {
    interner: Interner,
    predicates: RwLock<HashMap<Tag, Predicate>>,
    code_cache: CodeCache,
    generation: AtomicU64,
    unknown: RwLock<Option<UnknownPolicy>>,
    listeners: RwLock<Vec<Listener>>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("predicates", &self.predicates.read().len())
            .field("generation", &self.generation())
            .field("code_cache", &self.code_cache.stats())
            .finish()
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    /// An empty database with the control natives registered
    pub fn new() -> Self {
        let db = Self {
            interner: Interner::new(),
            predicates: RwLock::new(HashMap::new()),
            code_cache: CodeCache::new(),
            generation: AtomicU64::new(0),
            unknown: RwLock::new(None),
            listeners: RwLock::new(Vec::new()),
        };
        native::register_builtins(&db);
        db
    }

    /// The interner shared by everything built on this database
    #[inline]
    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    /// Current generation; changes on every mutation
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn code_cache_stats(&self) -> CodeCacheStats {
        self.code_cache.stats()
    }

    /// Whether `tag` names a control construct
    pub fn is_control(&self, tag: Tag) -> bool {
        let k = self.interner.known();
        tag == k.comma
            || tag == k.semicolon
            || tag == k.arrow
            || tag == k.cut0
            || tag == k.catch
            || tag == k.unify
            || tag == k.throw
            || tag == k.true0
            || tag == k.fail0
            || tag == k.false0
            || tag == k.not
            || k.call.contains(&tag)
    }

    // === Mutation ===

    /// Append a clause (`Head :- Body` or a fact)
    pub fn add_clause(&self, term: &Term) -> Result<(), PrologError> {
        let (tag, clause) = self.prepare_clause(term)?;
        self.with_clauses(tag, |clauses| clauses.push(clause));
        self.changed(Change::Clauses(tag));
        Ok(())
    }

    /// Prepend a clause
    pub fn add_clause_front(&self, term: &Term) -> Result<(), PrologError> {
        let (tag, clause) = self.prepare_clause(term)?;
        self.with_clauses(tag, |clauses| clauses.insert(0, clause));
        self.changed(Change::Clauses(tag));
        Ok(())
    }

    /// Remove the clause at `index`; `false` if there is none
    pub fn remove_clause(&self, tag: Tag, index: usize) -> Result<bool, PrologError> {
        self.check_modifiable(tag)?;
        let removed = match self.predicates.write().get_mut(&tag) {
            Some(Predicate::User(clauses)) if index < clauses.len() => {
                clauses.remove(index);
                true
            }
            _ => false,
        };
        if removed {
            self.changed(Change::Clauses(tag));
        }
        Ok(removed)
    }

    /// Replace the whole clause list of a predicate
    pub fn define(&self, tag: Tag, clauses: Vec<Clause>) -> Result<(), PrologError> {
        self.check_modifiable(tag)?;
        for clause in &clauses {
            validate_clause(&self.interner, clause)
                .map_err(|e| e.to_prolog_error(&self.interner))?;
            if clause.predicate(&self.interner) != Some(tag) {
                let head = clause.head_ref().clone();
                return Err(PrologError::domain_error(&self.interner, "clause_head", &head));
            }
        }
        self.predicates.write().insert(tag, Predicate::User(clauses));
        self.changed(Change::Clauses(tag));
        Ok(())
    }

    /// Register (or replace) a native implementation
    pub fn register_native(
        &self,
        tag: Tag,
        native: impl NativePredicate + 'static,
    ) -> Result<(), PrologError> {
        if self.is_control(tag) {
            return Err(self.permission_error(tag));
        }
        self.predicates
            .write()
            .insert(tag, Predicate::Native(Arc::new(native)));
        self.changed(Change::Native(tag));
        Ok(())
    }

    /// Remove a predicate entirely; `false` if it did not exist
    pub fn abolish(&self, tag: Tag) -> Result<bool, PrologError> {
        if self.is_control(tag) {
            return Err(self.permission_error(tag));
        }
        let removed = self.predicates.write().remove(&tag).is_some();
        if removed {
            self.changed(Change::Abolished(tag));
        }
        Ok(removed)
    }

    /// Override the engines' `unknown` policy; `None` defers to each
    /// engine's configuration
    pub fn set_unknown(&self, policy: Option<UnknownPolicy>) {
        *self.unknown.write() = policy;
        self.changed(Change::Flags);
    }

    pub fn unknown(&self) -> Option<UnknownPolicy> {
        *self.unknown.read()
    }

    /// Call `listener` after every change
    pub fn subscribe(&self, listener: impl Fn(&Change) + Send + Sync + 'static) {
        self.listeners.write().push(Box::new(listener));
    }

    // === Lookup ===

    /// Snapshot of a user predicate's clauses
    pub fn clauses(&self, tag: Tag) -> Option<Vec<Clause>> {
        match self.predicates.read().get(&tag) {
            Some(Predicate::User(clauses)) => Some(clauses.clone()),
            _ => None,
        }
    }

    /// Whether `tag` has a definition (clauses or native)
    pub fn is_defined(&self, tag: Tag) -> bool {
        self.predicates.read().contains_key(&tag)
    }

    /// Resolve a tag for calling, compiling user predicates on demand
    pub fn resolve(&self, tag: Tag) -> Result<Resolved, PrologError> {
        if self.is_control(tag) {
            return Ok(Resolved::Control);
        }

        let generation = self.generation();
        let clauses = match self.predicates.read().get(&tag) {
            None => return Ok(Resolved::Undefined),
            Some(Predicate::Native(native)) => return Ok(Resolved::Native(Arc::clone(native))),
            Some(Predicate::User(clauses)) => clauses.clone(),
        };

        if let Some(chunk) = self.code_cache.get(tag) {
            return Ok(Resolved::Compiled(chunk));
        }

        let chunk = compile_predicate(&self.interner, tag, &clauses)
            .map_err(|e| e.to_prolog_error(&self.interner))?;
        let chunk = Arc::new(chunk);
        // A concurrent change may have landed while compiling
        if self.generation() == generation {
            self.code_cache.insert(tag, Arc::clone(&chunk));
        }
        Ok(Resolved::Compiled(chunk))
    }

    /// Disassembly of a user predicate's compiled code
    pub fn disassemble(&self, tag: Tag) -> Result<Option<String>, PrologError> {
        match self.resolve(tag)? {
            Resolved::Compiled(chunk) => Ok(Some(chunk.disassemble(&self.interner))),
            _ => Ok(None),
        }
    }

    // === Internals ===

    fn prepare_clause(&self, term: &Term) -> Result<(Tag, Clause), PrologError> {
        let term = term.resolve_copy();
        if term.is_var() {
            return Err(PrologError::instantiation_error(&self.interner));
        }
        let clause = Clause::from_term(&self.interner, &term);
        validate_clause(&self.interner, &clause).map_err(|e| e.to_prolog_error(&self.interner))?;
        let tag = clause
            .predicate(&self.interner)
            .ok_or_else(|| PrologError::type_error(&self.interner, "callable", clause.head_ref()))?;
        self.check_modifiable(tag)?;
        Ok((tag, clause))
    }

    fn with_clauses(&self, tag: Tag, f: impl FnOnce(&mut Vec<Clause>)) {
        let mut predicates = self.predicates.write();
        let entry = predicates
            .entry(tag)
            .or_insert_with(|| Predicate::User(Vec::new()));
        if let Predicate::User(clauses) = entry {
            f(clauses);
        }
    }

    fn check_modifiable(&self, tag: Tag) -> Result<(), PrologError> {
        let native = matches!(self.predicates.read().get(&tag), Some(Predicate::Native(_)));
        if native || self.is_control(tag) {
            return Err(self.permission_error(tag));
        }
        Ok(())
    }

    fn permission_error(&self, tag: Tag) -> PrologError {
        PrologError::permission_error(
            &self.interner,
            "modify",
            "static_procedure",
            &indicator(&self.interner, tag),
        )
    }

    fn changed(&self, change: Change) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let evicted = match change {
            Change::Clauses(tag) | Change::Native(tag) | Change::Abolished(tag) => {
                self.code_cache.evict(tag)
            }
            Change::Flags => false,
        };
        debug!(
            target: "horn::database",
            ?change,
            generation,
            evicted,
            "database changed"
        );
        for listener in self.listeners.read().iter() {
            listener(&change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::models::Term;
    use std::sync::atomic::AtomicUsize;

    fn fact(db: &Database, name: &str, n: i64) -> Term {
        Term::compound(db.interner().tag_named(name, 1), vec![Term::Integer(n)])
    }

    #[test]
    fn test_add_and_list_clauses() {
        let db = Database::new();
        let tag = db.interner().tag_named("p", 1);
        db.add_clause(&fact(&db, "p", 1)).expect("added");
        db.add_clause(&fact(&db, "p", 2)).expect("added");
        db.add_clause_front(&fact(&db, "p", 0)).expect("added");

        let heads: Vec<i64> = db
            .clauses(tag)
            .expect("defined")
            .iter()
            .filter_map(|c| c.head_ref().as_compound().and_then(|h| h.args()[0].as_integer()))
            .collect();
        assert_eq!(heads, vec![0, 1, 2]);

        assert!(db.remove_clause(tag, 1).expect("modifiable"));
        assert!(!db.remove_clause(tag, 9).expect("modifiable"));
        assert_eq!(db.clauses(tag).map(|c| c.len()), Some(2));
    }

    #[test]
    fn test_every_mutation_bumps_generation_and_evicts() {
        let db = Database::new();
        let tag = db.interner().tag_named("p", 1);
        db.add_clause(&fact(&db, "p", 1)).expect("added");

        assert!(matches!(db.resolve(tag), Ok(Resolved::Compiled(_))));
        assert_eq!(db.code_cache_stats().entries, 1);

        let before = db.generation();
        db.add_clause(&fact(&db, "p", 2)).expect("added");
        assert!(db.generation() > before);
        assert_eq!(db.code_cache_stats().entries, 0);
    }

    #[test]
    fn test_resolve_classifies() {
        let db = Database::new();
        let k = db.interner().known().clone();
        assert!(matches!(db.resolve(k.comma), Ok(Resolved::Control)));
        assert!(matches!(db.resolve(k.call[3]), Ok(Resolved::Control)));
        let between = db.interner().tag_named("between", 3);
        assert!(matches!(db.resolve(between), Ok(Resolved::Native(_))));
        let missing = db.interner().tag_named("missing", 0);
        assert!(matches!(db.resolve(missing), Ok(Resolved::Undefined)));
    }

    #[test]
    fn test_control_and_native_are_not_modifiable() {
        let db = Database::new();
        let clause = Term::compound(
            db.interner().tag_named("between", 3),
            vec![Term::Integer(1), Term::Integer(2), Term::Integer(3)],
        );
        let err = db.add_clause(&clause).expect_err("native is static");
        assert_eq!(err.kind(db.interner()), Some("permission_error"));

        let err = db.abolish(db.interner().known().comma).expect_err("control");
        assert_eq!(err.kind(db.interner()), Some("permission_error"));
    }

    #[test]
    fn test_invalid_clauses_are_rejected() {
        let db = Database::new();
        let err = db.add_clause(&Term::Integer(3)).expect_err("not callable");
        assert_eq!(err.kind(db.interner()), Some("type_error"));

        let err = db.add_clause(&Term::var()).expect_err("unbound");
        assert_eq!(err.kind(db.interner()), Some("instantiation_error"));

        let neck = db.interner().tag_named(":-", 2);
        let body = Term::compound(db.interner().known().comma, vec![Term::Integer(1), Term::var()]);
        let rule = Term::compound(neck, vec![Term::Atom(db.interner().atom("p")), body]);
        let err = db.add_clause(&rule).expect_err("body not callable");
        assert_eq!(err.kind(db.interner()), Some("type_error"));
    }

    #[test]
    fn test_stored_clause_is_independent_of_caller_bindings() {
        let db = Database::new();
        let x = Term::var();
        let head = Term::compound(db.interner().tag_named("p", 1), vec![x.clone()]);
        db.add_clause(&head).expect("added");

        let mut trail = crate::backend::trail::Trail::new();
        trail.mark();
        assert!(crate::backend::unify::unify(&mut trail, &x, &Term::Integer(5)));

        let clauses = db.clauses(db.interner().tag_named("p", 1)).expect("defined");
        let arg = clauses[0].head_ref().as_compound().expect("compound").args()[0].clone();
        assert!(arg.is_var());
    }

    #[test]
    fn test_listeners_see_changes() {
        let db = Database::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        db.subscribe(move |change| {
            if matches!(change, Change::Clauses(_) | Change::Flags) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        db.add_clause(&fact(&db, "p", 1)).expect("added");
        db.set_unknown(Some(UnknownPolicy::Fail));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(db.unknown(), Some(UnknownPolicy::Fail));
    }

    #[test]
    fn test_define_rejects_foreign_heads() {
        let db = Database::new();
        let p = db.interner().tag_named("p", 1);
        let clause = Clause::fact(db.interner(), fact(&db, "q", 1));
        let err = db.define(p, vec![clause]).expect_err("wrong head");
        assert_eq!(err.kind(db.interner()), Some("domain_error"));
    }

    #[test]
    fn test_disassemble_user_predicate() {
        let db = Database::new();
        db.add_clause(&fact(&db, "p", 1)).expect("added");
        let text = db
            .disassemble(db.interner().tag_named("p", 1))
            .expect("compiles")
            .expect("user predicate");
        assert!(text.contains("=== p/1 ==="));
        assert!(text.contains("push_argument"));
    }
}
