//! Goal driver.
//!
//! An [`Engine`] runs goals against a shared [`Database`]. It owns the
//! mutable search state (trail, choice-point stack, call depth) and hands
//! it to the bytecode VM for every predicate activation.
//!
//! # Goals
//!
//! A goal is compiled as a temporary predicate over its variables, then
//! driven with [`Engine::execute`] until it reports a final outcome, and
//! released with [`Engine::stop`]. Preparing a goal while another one is
//! active (from inside a native, for example) saves the whole search state
//! on a stack of return points; stopping the nested goal restores it, so
//! the outer search continues exactly where it was.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use horn::backend::{Database, Engine, Term};
//! use horn::config::EngineConfig;
//!
//! let db = Arc::new(Database::new());
//! let i = db.interner();
//! let p = i.tag_named("p", 1);
//! for n in 1..=3 {
//!     db.add_clause(&Term::compound(p, vec![Term::Integer(n)])).unwrap();
//! }
//!
//! let mut engine = Engine::new(Arc::clone(&db), EngineConfig::default());
//! let x = Term::var();
//! let solutions = engine
//!     .solve_all(&Term::compound(p, vec![x.clone()]), None)
//!     .unwrap();
//! assert_eq!(solutions.len(), 3);
//! ```

use std::any::Any;
use std::io;
use std::sync::Arc;
use std::thread;

use tracing::{debug, trace, warn};

use crate::backend::bytecode::{compile_predicate, vm, BytecodeChunk, CompileError};
use crate::backend::choice::{ChoiceKind, ChoicePoint, ChoiceStack};
use crate::backend::database::Database;
use crate::backend::errors::{PrologError, Signal};
use crate::backend::models::{Clause, Term};
use crate::backend::predicate::{Callee, ExecOutcome, ExecResult};
use crate::backend::symbol::{Atom, Interner, Tag};
use crate::backend::trail::{Trail, TrailSnapshot};
use crate::backend::unify;
use crate::config::{EngineConfig, UnknownPolicy};

/// Outcome of one `execute` of a goal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalOutcome {
    /// Succeeded; execute again for the next solution
    More,
    /// Succeeded with no further solutions
    Final,
    /// No (more) solutions
    Fail,
    /// `halt/0,1` was called
    Halt(i32),
}

/// A prepared goal
#[derive(Debug)]
pub struct Goal {
    id: u64,
    chunk: Arc<BytecodeChunk>,
    args: Arc<[Term]>,
    term: Term,
    started: bool,
    done: bool,
    nested: bool,
}

impl Goal {
    /// The goal term; its variables carry the bindings of the current
    /// solution
    pub fn term(&self) -> &Term {
        &self.term
    }

    /// Whether the goal has reported a final outcome
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Whether the goal runs nested inside another one
    pub fn is_nested(&self) -> bool {
        self.nested
    }
}

/// Search state of an outer goal, parked while a nested goal runs
#[derive(Debug)]
struct ReturnPoint {
    choices: Vec<ChoicePoint>,
    trail: TrailSnapshot,
    active: Option<u64>,
}

/// Execution context for goals over one database
#[derive(Debug)]
pub struct Engine {
    db: Arc<Database>,
    config: EngineConfig,
    pub(crate) trail: Trail,
    pub(crate) choices: ChoiceStack,
    depth: usize,
    /// Native stack position of the outermost activation
    stack_base: usize,
    return_points: Vec<ReturnPoint>,
    active: Option<u64>,
    next_goal: u64,
}

impl Engine {
    pub fn new(db: Arc<Database>, config: EngineConfig) -> Self {
        let choices = ChoiceStack::new(config.max_choice_points);
        Self {
            db,
            config,
            trail: Trail::new(),
            choices,
            depth: 0,
            stack_base: 0,
            return_points: Vec::new(),
            active: None,
            next_goal: 0,
        }
    }

    /// Run `work` with a fresh engine on a thread whose stack holds
    /// `config.max_stack_bytes` plus headroom.
    ///
    /// Use it when goals recurse deeper than the calling thread's stack
    /// allows. Fails only if the thread cannot be spawned; a panic in
    /// `work` is resumed on the caller.
    pub fn run_on_thread<T, F>(db: Arc<Database>, config: EngineConfig, work: F) -> io::Result<T>
    where
        T: Send,
        F: FnOnce(&mut Engine) -> T + Send,
    {
        let stack_size = config.thread_stack_size();
        thread::scope(|scope| {
            let handle = thread::Builder::new()
                .name("horn-engine".to_string())
                .stack_size(stack_size)
                .spawn_scoped(scope, move || {
                    let mut engine = Engine::new(db, config);
                    work(&mut engine)
                })?;
            Ok(handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
        })
    }

    #[inline]
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    #[inline]
    pub fn interner(&self) -> &Interner {
        self.db.interner()
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The effective `unknown` policy: the database override, else the
    /// engine configuration
    pub fn unknown_policy(&self) -> UnknownPolicy {
        self.db.unknown().unwrap_or(self.config.unknown)
    }

    /// Number of goals currently parked under the active one
    pub fn nesting(&self) -> usize {
        self.return_points.len()
    }

    // === Goals ===

    /// Compile `goal` and make it the active goal.
    ///
    /// If a goal is already active, its search state is saved and restored
    /// by [`Engine::stop`] on the returned goal.
    pub fn prepare_goal(&mut self, goal: &Term) -> Result<Goal, PrologError> {
        let query = self.interner().known().query;
        let (chunk, args) = self.compile_goal(query, goal)?;

        let nested = self.active.is_some();
        if nested {
            self.return_points.push(ReturnPoint {
                choices: self.choices.take_all(),
                trail: self.trail.take_snapshot(),
                active: self.active,
            });
        }

        let id = self.next_goal;
        self.next_goal += 1;
        self.active = Some(id);
        self.trail.mark();

        debug!(
            target: "horn::engine",
            goal = id,
            nesting = self.return_points.len(),
            term = %self.interner().format_term(goal),
            "prepare goal"
        );

        Ok(Goal {
            id,
            chunk,
            args,
            term: goal.clone(),
            started: false,
            done: false,
            nested,
        })
    }

    /// Find the next solution of the active goal.
    ///
    /// Whatever the outcome, including an error, the goal must still be
    /// released with [`Engine::stop`]. For a nested goal that is what
    /// restores the outer search, so a native must stop its goal before
    /// propagating the error.
    pub fn execute(&mut self, goal: &mut Goal) -> Result<GoalOutcome, PrologError> {
        if goal.done {
            return Ok(GoalOutcome::Fail);
        }
        if self.active != Some(goal.id) {
            return Err(PrologError::system_error(self.interner(), "goal_not_active"));
        }

        let callee = Callee::Compiled(Arc::clone(&goal.chunk));
        let args = Arc::clone(&goal.args);
        let result = self.invoke(&callee, &args, goal.started);
        goal.started = true;

        let outcome = match result {
            Ok(ExecOutcome::SuccessMore) => GoalOutcome::More,
            Ok(ExecOutcome::SuccessFinal) => GoalOutcome::Final,
            Ok(ExecOutcome::Fail) => GoalOutcome::Fail,
            Err(Signal::Halt(code)) => GoalOutcome::Halt(code),
            Err(Signal::Throw(ball)) => {
                goal.done = true;
                let err = PrologError::new(self.interner(), &ball);
                debug!(target: "horn::engine", goal = goal.id, error = %err, "goal raised");
                return Err(err);
            }
        };
        if outcome != GoalOutcome::More {
            goal.done = true;
        }
        trace!(target: "horn::engine", goal = goal.id, ?outcome, "execute");
        Ok(outcome)
    }

    /// Release a goal: discard its choice points (running cleanup goals),
    /// undo its bindings and restore the goal it was nested in
    pub fn stop(&mut self, goal: Goal) {
        if self.active != Some(goal.id) {
            warn!(target: "horn::engine", goal = goal.id, "stop of a goal that is not active");
            return;
        }

        let cleanups = self.choices.cut_to(0);
        if let Err(Signal::Halt(code)) = self.run_cleanups(cleanups) {
            warn!(target: "horn::engine", goal = goal.id, code, "halt during cleanup ignored");
        }
        self.trail.undo_to(0);

        if goal.nested {
            if let Some(saved) = self.return_points.pop() {
                self.choices.restore_all(saved.choices);
                self.trail.restore(saved.trail);
                self.active = saved.active;
            }
        } else {
            self.active = None;
        }
        debug!(target: "horn::engine", goal = goal.id, nesting = self.return_points.len(), "stop goal");
    }

    /// Resolved copies of `template` for each solution of `goal`, up to
    /// `limit`
    pub fn collect(
        &mut self,
        template: &Term,
        goal: &Term,
        limit: Option<usize>,
    ) -> Result<Vec<Term>, Signal> {
        let mut prepared = self.prepare_goal(goal)?;
        let mut results = Vec::new();
        let outcome = loop {
            if limit.is_some_and(|n| results.len() >= n) {
                break Ok(());
            }
            match self.execute(&mut prepared) {
                Ok(GoalOutcome::More) => results.push(template.resolve_copy()),
                Ok(GoalOutcome::Final) => {
                    results.push(template.resolve_copy());
                    break Ok(());
                }
                Ok(GoalOutcome::Fail) => break Ok(()),
                Ok(GoalOutcome::Halt(code)) => break Err(Signal::Halt(code)),
                Err(err) => break Err(Signal::from(err)),
            }
        };
        self.stop(prepared);
        outcome.map(|()| results)
    }

    /// Resolved copies of `goal` for each of its solutions, up to `limit`
    pub fn solve_all(&mut self, goal: &Term, limit: Option<usize>) -> Result<Vec<Term>, Signal> {
        self.collect(goal, goal, limit)
    }

    /// Whether `goal` has a solution; its bindings are not kept
    pub fn run_once(&mut self, goal: &Term) -> Result<bool, Signal> {
        let mut prepared = self.prepare_goal(goal)?;
        let outcome = self.execute(&mut prepared);
        self.stop(prepared);
        match outcome {
            Ok(GoalOutcome::More | GoalOutcome::Final) => Ok(true),
            Ok(GoalOutcome::Fail) => Ok(false),
            Ok(GoalOutcome::Halt(code)) => Err(Signal::Halt(code)),
            Err(err) => Err(err.into()),
        }
    }

    // === Primitives for natives ===

    /// Unify two terms; a failed attempt leaves no bindings
    pub fn unify(&mut self, a: &Term, b: &Term) -> bool {
        unify::unify(&mut self.trail, a, b)
    }

    /// Current trail mark
    pub fn mark(&mut self) -> usize {
        self.trail.mark()
    }

    /// Undo every binding made since `mark`
    pub fn undo_to(&mut self, mark: usize) {
        self.trail.undo_to(mark);
    }

    /// Push redo state for the native being executed.
    ///
    /// Call it before making the bindings of the solution being reported,
    /// so [`Engine::pop_native_state`] undoes them.
    pub fn push_native_state(&mut self, state: Box<dyn Any + Send>) -> Result<(), Signal> {
        Ok(self.push_choice(ChoiceKind::Native { state })?)
    }

    /// Take back the redo state pushed by the native being redone, undoing
    /// the bindings made after it was pushed
    pub fn pop_native_state(&mut self) -> Option<Box<dyn Any + Send>> {
        if !matches!(self.choices.peek().map(|cp| &cp.kind), Some(ChoiceKind::Native { .. })) {
            return None;
        }
        let point = self.choices.pop()?;
        self.trail.undo_to(point.trail_mark);
        match point.kind {
            ChoiceKind::Native { state } => Some(state),
            _ => None,
        }
    }

    /// The most recent choice point
    pub fn peek_choice_point(&self) -> Option<&ChoicePoint> {
        self.choices.peek()
    }

    /// Number of live choice points
    pub fn choice_point_count(&self) -> usize {
        self.choices.len()
    }

    // === Crate internals ===

    /// Call or redo a predicate implementation
    pub(crate) fn invoke(&mut self, callee: &Callee, args: &[Term], is_redo: bool) -> ExecResult {
        if self.depth >= self.config.max_call_depth {
            return Err(PrologError::resource_error(self.interner(), "calls").into());
        }
        if self.depth == 0 {
            self.stack_base = stack_position();
        } else if stack_position().abs_diff(self.stack_base) > self.config.max_stack_bytes {
            warn!(
                target: "horn::engine",
                depth = self.depth,
                limit = self.config.max_stack_bytes,
                "native stack budget exhausted"
            );
            return Err(PrologError::resource_error(self.interner(), "stack").into());
        }
        self.depth += 1;
        let result = match callee {
            Callee::Compiled(chunk) => vm::execute(self, chunk, args, is_redo),
            Callee::Native(native) => native.execute(self, is_redo, args),
        };
        self.depth -= 1;
        result
    }

    /// Push a choice point marked at the current trail position
    pub(crate) fn push_choice(&mut self, kind: ChoiceKind) -> Result<(), PrologError> {
        let trail_mark = self.trail.mark();
        if self.choices.push(ChoicePoint { trail_mark, kind }).is_err() {
            warn!(
                target: "horn::vm::nondet",
                limit = self.config.max_choice_points,
                "choice point limit reached"
            );
            return Err(PrologError::resource_error(self.interner(), "choice_points"));
        }
        Ok(())
    }

    /// Pop a cleanup holder if it is on top, without undoing the trail
    pub(crate) fn pop_cleanup(&mut self) -> Option<Term> {
        if !matches!(self.choices.peek().map(|cp| &cp.kind), Some(ChoiceKind::Cleanup { .. })) {
            return None;
        }
        match self.choices.pop()?.kind {
            ChoiceKind::Cleanup { goal } => Some(goal),
            _ => None,
        }
    }

    /// Run cleanup goals once each, as nested goals.
    ///
    /// Exceptions and failures are ignored; a halt stops and propagates.
    pub(crate) fn run_cleanups(&mut self, goals: Vec<Term>) -> Result<(), Signal> {
        for goal in goals {
            match self.run_once(&goal) {
                Ok(_) => {}
                Err(Signal::Halt(code)) => return Err(Signal::Halt(code)),
                Err(Signal::Throw(ball)) => {
                    warn!(
                        target: "horn::engine",
                        ball = %self.interner().format_term(&ball),
                        "exception in cleanup goal ignored"
                    );
                }
            }
        }
        Ok(())
    }

    /// Compile `goal` as the single clause of a temporary predicate
    /// `name(V1, ..., Vn)` over its variables
    pub(crate) fn compile_goal(
        &self,
        name: Atom,
        goal: &Term,
    ) -> Result<(Arc<BytecodeChunk>, Arc<[Term]>), PrologError> {
        let interner = self.interner();
        let goal = goal.deref();
        if goal.is_var() {
            return Err(PrologError::instantiation_error(interner));
        }
        if !goal.is_callable() {
            return Err(PrologError::type_error(interner, "callable", &goal));
        }

        let vars: Vec<Term> = goal.variables().into_iter().map(Term::Var).collect();
        let tag = interner.tag(name, vars.len());
        let head = if vars.is_empty() {
            Term::Atom(name)
        } else {
            Term::compound(tag, vars.clone())
        };

        let clause = Clause::new(head, goal.clone());
        let chunk = compile_predicate(interner, tag, &[clause]).map_err(|e| match e {
            CompileError::NotCallable(_) => PrologError::type_error(interner, "callable", &goal),
            other => other.to_prolog_error(interner),
        })?;
        Ok((Arc::new(chunk), vars.into()))
    }

    /// The temporary chunk and arguments for a control construct called
    /// by tag (`call/N`, or `','/2` and friends reached through it)
    pub(crate) fn meta_call_target(
        &self,
        tag: Tag,
        args: &[Term],
    ) -> Result<(Arc<BytecodeChunk>, Arc<[Term]>), PrologError> {
        let interner = self.interner();
        let known = interner.known();

        let goal = if let Some(extra) = known.call.iter().position(|&t| t == tag) {
            let target = args[0].deref();
            let extra_args = &args[1..=extra];
            match &target {
                Term::Var(_) => return Err(PrologError::instantiation_error(interner)),
                _ if extra_args.is_empty() => target,
                Term::Atom(name) => Term::compound(interner.tag(*name, extra_args.len()), extra_args.to_vec()),
                Term::Compound(c) => {
                    let mut all = c.args().to_vec();
                    all.extend_from_slice(extra_args);
                    let name = interner.tag_name(c.tag());
                    Term::compound(interner.tag(name, all.len()), all)
                }
                _ => return Err(PrologError::type_error(interner, "callable", &target)),
            }
        } else if args.is_empty() {
            Term::Atom(interner.tag_name(tag))
        } else {
            Term::compound(tag, args.to_vec())
        };

        self.compile_goal(known.meta_call, &goal)
    }
}

/// Address of a fresh local, as a measure of how deep the native stack is
#[inline(never)]
fn stack_position() -> usize {
    let marker = 0u8;
    std::hint::black_box(&marker) as *const u8 as usize
}
