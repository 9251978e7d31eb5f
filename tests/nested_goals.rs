//! Nested goals and the primitives natives build on

mod common;

use std::sync::{Arc, Mutex};

use common::World;
use horn::backend::{Engine, ExecOutcome, ExecResult, GoalOutcome, Signal, Term};

/// What `observe/1` saw about the outer search while its nested goal ran
#[derive(Debug, Default, Clone, PartialEq)]
struct Observation {
    choices_before: usize,
    choices_after: usize,
    nesting_inside: usize,
    inner_solutions: Vec<i64>,
    outer_binding_kept: bool,
}

/// Register `observe(Outer)`: runs `q(Y)` to completion as a nested goal
fn observer(w: &World) -> Arc<Mutex<Observation>> {
    let seen = Arc::new(Mutex::new(Observation::default()));
    let record = Arc::clone(&seen);
    let interner = w.db.interner();
    let q = interner.tag_named("q", 1);
    let tag = interner.tag_named("observe", 1);

    w.db.register_native(tag, move |engine: &mut Engine, _: bool, args: &[Term]| -> ExecResult {
        let mut obs = Observation {
            choices_before: engine.choice_point_count(),
            ..Observation::default()
        };

        let y = Term::var();
        let mut inner = engine.prepare_goal(&Term::compound(q, vec![y.clone()]))?;
        obs.nesting_inside = engine.nesting();
        let finished = loop {
            match engine.execute(&mut inner) {
                Ok(GoalOutcome::More) => obs.inner_solutions.extend(y.as_integer()),
                Ok(GoalOutcome::Final) => {
                    obs.inner_solutions.extend(y.as_integer());
                    break Ok(());
                }
                Ok(GoalOutcome::Fail) => break Ok(()),
                Ok(GoalOutcome::Halt(code)) => break Err(Signal::Halt(code)),
                Err(err) => break Err(Signal::from(err)),
            }
        };
        // The goal is released before any error propagates
        engine.stop(inner);
        finished?;

        obs.choices_after = engine.choice_point_count();
        obs.outer_binding_kept = args[0].as_integer().is_some();
        *record.lock().unwrap() = obs;
        Ok(ExecOutcome::SuccessFinal)
    })
    .unwrap();
    seen
}

#[test]
fn test_nested_goal_leaves_outer_state_untouched() {
    let mut w = World::new();
    w.facts("p", 1..=2);
    w.facts("q", [10, 20, 30]);
    let seen = observer(&w);

    let x = Term::var();
    let goal = w.conj(vec![w.s("p", vec![x.clone()]), w.s("observe", vec![x.clone()])]);
    // Both outer solutions survive the nested search
    assert_eq!(w.ints(&x, &goal), vec![1, 2]);

    let obs = seen.lock().unwrap().clone();
    assert_eq!(obs.inner_solutions, vec![10, 20, 30]);
    assert_eq!(obs.nesting_inside, 1);
    assert_eq!(obs.choices_before, obs.choices_after);
    assert!(obs.outer_binding_kept);
    assert_eq!(w.engine.nesting(), 0);
}

#[test]
fn test_native_stops_raising_nested_goal_before_propagating() {
    let mut w = World::new();
    w.facts("p", 1..=2);
    // q(_) :- throw(boom).
    w.fact(w.rule(
        w.s("q", vec![Term::var()]),
        w.s("throw", vec![w.atom("boom")]),
    ));
    let seen = observer(&w);

    let x = Term::var();
    let goal = w.conj(vec![
        w.s("p", vec![x.clone()]),
        w.s("catch", vec![w.s("observe", vec![x.clone()]), w.atom("boom"), w.atom("true")]),
    ]);
    // The outer choice point on p/1 survives the error raised inside
    assert_eq!(w.ints(&x, &goal), vec![1, 2]);
    assert_eq!(w.engine.nesting(), 0);
    assert_eq!(w.engine.choice_point_count(), 0);
    assert!(seen.lock().unwrap().inner_solutions.is_empty());
}

#[test]
fn test_inner_bindings_do_not_leak() {
    let mut w = World::new();
    let x = Term::var();
    let list = Term::var();
    // findall(X, X = 1, L), X = 2: X is free again once findall returns
    let goal = w.conj(vec![
        w.s(
            "findall",
            vec![x.clone(), w.s("=", vec![x.clone(), Term::Integer(1)]), list.clone()],
        ),
        w.s("=", vec![x.clone(), Term::Integer(2)]),
    ]);
    assert_eq!(w.ints(&x, &goal), vec![2]);
}

#[test]
fn test_findall_inside_findall() {
    let mut w = World::new();
    w.facts("p", 1..=2);
    let x = Term::var();
    let inner = Term::var();
    let outer = Term::var();
    let goal = w.s(
        "findall",
        vec![
            inner.clone(),
            w.s(
                "findall",
                vec![x.clone(), w.s("p", vec![x.clone()]), inner.clone()],
            ),
            outer.clone(),
        ],
    );
    let solutions = w.all(&outer, &goal);
    assert_eq!(w.db.interner().format_term(&solutions[0]), "[[1,2]]");
}

#[test]
fn test_exception_in_nested_goal_restores_outer() {
    let mut w = World::new();
    w.facts("p", 1..=2);
    let x = Term::var();
    let e = Term::var();
    // p(X), catch(findall(_, throw(inner), _), E, true)
    let nested = w.s(
        "findall",
        vec![Term::var(), w.s("throw", vec![w.atom("inner")]), Term::var()],
    );
    let goal = w.conj(vec![
        w.s("p", vec![x.clone()]),
        w.s("catch", vec![nested, e, w.atom("true")]),
    ]);
    assert_eq!(w.ints(&x, &goal), vec![1, 2]);
    assert_eq!(w.engine.nesting(), 0);
}

#[test]
fn test_stop_of_inactive_goal_is_ignored() {
    let mut w = World::new();
    w.facts("p", 1..=2);
    let outer = w.engine.prepare_goal(&w.s("p", vec![Term::var()])).unwrap();
    let mut inner = w.engine.prepare_goal(&w.s("p", vec![Term::var()])).unwrap();
    assert!(inner.is_nested());

    // The outer goal is parked; stopping it now must not disturb the inner one
    w.engine.stop(outer);
    assert_eq!(w.engine.nesting(), 1);
    assert_eq!(w.engine.execute(&mut inner).unwrap(), GoalOutcome::More);
    w.engine.stop(inner);
    assert_eq!(w.engine.nesting(), 0);
}

// ========================================================================
// Unification and the trail
// ========================================================================

#[test]
fn test_unify_binds_both_sides() {
    let mut w = World::new();
    let x = Term::var();
    let y = Term::var();
    let a = w.s("f", vec![x.clone(), Term::Integer(1)]);
    let b = w.s("f", vec![Term::Integer(2), y.clone()]);
    assert!(w.engine.unify(&a, &b));
    assert_eq!(x.as_integer(), Some(2));
    assert_eq!(y.as_integer(), Some(1));
}

#[test]
fn test_failed_unify_keeps_no_bindings() {
    let mut w = World::new();
    let x = Term::var();
    let a = w.s("f", vec![x.clone(), Term::Integer(1)]);
    let b = w.s("g", vec![x.clone(), Term::Integer(1)]);
    assert!(!w.engine.unify(&a, &b));
    assert!(x.is_var());

    // Fails only at the second argument, after binding X
    let c = w.s("f", vec![x.clone(), Term::Integer(1)]);
    let d = w.s("f", vec![Term::Integer(5), Term::Integer(2)]);
    assert!(!w.engine.unify(&c, &d));
    assert!(x.is_var());
}

#[test]
fn test_undo_to_mark_restores_unbound_state() {
    let mut w = World::new();
    let x = Term::var();
    let y = Term::var();
    let mark = w.engine.mark();
    assert!(w.engine.unify(&x, &w.atom("a")));
    assert!(w.engine.unify(&y, &x));
    w.engine.undo_to(mark);
    assert!(x.is_var());
    assert!(y.is_var());
}

#[test]
fn test_integer_and_float_never_unify() {
    let mut w = World::new();
    assert!(!w.engine.unify(&Term::Integer(1), &Term::Float(1.0)));
    assert!(w.engine.unify(&Term::Float(0.1 + 0.2), &Term::Float(0.3)));
}

#[test]
fn test_native_state_round_trip() {
    let mut w = World::new();
    let x = Term::var();
    let base = w.engine.choice_point_count();
    w.engine.push_native_state(Box::new(7_u32)).unwrap();
    assert!(w.engine.unify(&x, &Term::Integer(1)));
    assert_eq!(w.engine.choice_point_count(), base + 1);

    let state = w.engine.pop_native_state().expect("state on top");
    assert_eq!(state.downcast_ref::<u32>(), Some(&7));
    assert!(x.is_var());
    assert!(w.engine.pop_native_state().is_none());
}
