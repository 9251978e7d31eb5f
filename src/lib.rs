//! Horn - a WAM-style logic programming runtime
//!
//! Clauses are compiled per predicate to a compact bytecode and executed by a
//! stack-based interpreter with chronological backtracking, cut, exceptions
//! and cleanup handlers.
//!
//! # Architecture
//!
//! 1. **Terms and symbols** (`backend::models`, `backend::symbol`)
//!    - Atoms and `Name/Arity` tags are interned once per database
//!    - Variables are shared cells bound through the trail
//!
//! 2. **Search state** (`backend::trail`, `backend::choice`, `backend::unify`)
//!    - The trail records bindings so backtracking can undo them
//!    - The choice-point stack holds alternatives, redo state and barriers
//!
//! 3. **Bytecode** (`backend::bytecode`)
//!    - Two-pass clause compiler, assembler and interpreter
//!
//! 4. **Goal driver** (`backend::engine`, `backend::database`)
//!    - Goals run against a shared database, possibly nested inside natives
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use horn::backend::{Database, Engine, GoalOutcome, Term};
//! use horn::config::EngineConfig;
//!
//! let db = Arc::new(Database::new());
//! let p = db.interner().tag_named("p", 1);
//! db.add_clause(&Term::compound(p, vec![Term::Integer(42)])).unwrap();
//!
//! let mut engine = Engine::new(Arc::clone(&db), EngineConfig::default());
//! let x = Term::var();
//! let mut goal = engine.prepare_goal(&Term::compound(p, vec![x.clone()])).unwrap();
//! assert_eq!(engine.execute(&mut goal).unwrap(), GoalOutcome::Final);
//! assert_eq!(x.as_integer(), Some(42));
//! engine.stop(goal);
//! ```

pub mod backend;
pub mod config;
pub mod logging;

pub use backend::{Database, Engine, Goal, GoalOutcome, PrologError, Signal, Term};
pub use config::{EngineConfig, UnknownPolicy};
