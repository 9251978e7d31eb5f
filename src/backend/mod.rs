//! Logic-programming runtime
//!
//! - `symbol`, `models`: interned atoms and tags, terms and clauses
//! - `trail`, `choice`, `unify`: the search state primitives
//! - `bytecode`: clause compiler, assembler and interpreter
//! - `database`: predicate table and compiled-code cache
//! - `engine`: the goal driver
//! - `native`: control natives (`between/3`, `findall/3`, ...)

pub mod bytecode;
pub mod choice;
pub mod database;
pub mod engine;
pub mod errors;
pub mod models;
pub mod native;
pub mod predicate;
pub mod symbol;
pub mod trail;
pub mod unify;

pub use choice::{Barrier, ChoiceKind, ChoicePoint, ChoiceStack, Slot};
pub use database::{Change, Database, Resolved};
pub use engine::{Engine, Goal, GoalOutcome};
pub use errors::{indicator, PrologError, Signal};
pub use models::*;
pub use predicate::{Callee, ExecOutcome, ExecResult, NativePredicate};
pub use symbol::{Atom, Interner, Known, Tag};
pub use trail::{Trail, TrailEntry};
