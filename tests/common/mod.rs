//! Shared fixtures for the integration tests
//!
//! A [`World`] bundles a database with one engine and offers terse term
//! constructors, so test bodies read close to the clauses they load.

#![allow(dead_code)]

use std::sync::Arc;

use horn::backend::{Database, Engine, GoalOutcome, PrologError, Signal, Term};
use horn::config::EngineConfig;

pub struct World {
    pub db: Arc<Database>,
    pub engine: Engine,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        horn::logging::init();
        let db = Arc::new(Database::new());
        let engine = Engine::new(Arc::clone(&db), config);
        Self { db, engine }
    }

    pub fn atom(&self, name: &str) -> Term {
        Term::Atom(self.db.interner().atom(name))
    }

    pub fn s(&self, name: &str, args: Vec<Term>) -> Term {
        Term::compound(self.db.interner().tag_named(name, args.len()), args)
    }

    /// `Head :- Body`
    pub fn rule(&self, head: Term, body: Term) -> Term {
        self.s(":-", vec![head, body])
    }

    /// Right-nested conjunction of `goals`
    pub fn conj(&self, goals: Vec<Term>) -> Term {
        let mut iter = goals.into_iter().rev();
        let last = iter.next().unwrap_or_else(|| self.atom("true"));
        iter.fold(last, |acc, goal| self.s(",", vec![goal, acc]))
    }

    pub fn fact(&self, term: Term) {
        self.db.add_clause(&term).expect("clause accepted");
    }

    pub fn facts(&self, name: &str, values: impl IntoIterator<Item = i64>) {
        for n in values {
            self.fact(self.s(name, vec![Term::Integer(n)]));
        }
    }

    /// All solutions of `goal`, as copies of `template`
    pub fn all(&mut self, template: &Term, goal: &Term) -> Vec<Term> {
        self.engine
            .collect(template, goal, None)
            .unwrap_or_else(|err| panic!("goal raised: {}", self.describe(err)))
    }

    /// Integer solutions of `template`
    pub fn ints(&mut self, template: &Term, goal: &Term) -> Vec<i64> {
        self.all(template, goal)
            .iter()
            .map(|t| t.as_integer().expect("integer solution"))
            .collect()
    }

    /// Run `goal` to completion and return the uncaught error
    pub fn error(&mut self, goal: &Term) -> PrologError {
        let mut prepared = self.engine.prepare_goal(goal).expect("goal prepared");
        let result = loop {
            match self.engine.execute(&mut prepared) {
                Ok(GoalOutcome::More) => continue,
                Ok(outcome) => break Err(outcome),
                Err(err) => break Ok(err),
            }
        };
        self.engine.stop(prepared);
        match result {
            Ok(err) => err,
            Err(outcome) => panic!("expected an exception, goal ended with {:?}", outcome),
        }
    }

    /// The name of the formal term of an uncaught error
    pub fn error_kind(&mut self, goal: &Term) -> String {
        let err = self.error(goal);
        err.kind(self.db.interner())
            .map(str::to_string)
            .unwrap_or_else(|| self.db.interner().format_term(err.ball()))
    }

    fn describe(&self, signal: Signal) -> String {
        match signal {
            Signal::Throw(ball) => self.db.interner().format_term(&ball),
            Signal::Halt(code) => format!("halt({})", code),
        }
    }
}
