//! Backtracking throughput benchmarks
//!
//! - `enumerate_facts`: redo through a long clause chain
//! - `naive_reverse`: deterministic recursion with list construction
//! - `cut_and_catch`: if-then-else and catch/3 on every iteration
//! - `compile_predicate`: clause compiler and assembler alone
//!
//! Run with `HORN_LOG=horn::vm::nondet=trace` to see choice-point traffic.

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use horn::backend::bytecode::compile_predicate;
use horn::backend::{Clause, Database, Engine, Term};
use horn::config::EngineConfig;

fn s(db: &Database, name: &str, args: Vec<Term>) -> Term {
    Term::compound(db.interner().tag_named(name, args.len()), args)
}

fn atom(db: &Database, name: &str) -> Term {
    Term::Atom(db.interner().atom(name))
}

fn rule(db: &Database, head: Term, body: Term) -> Term {
    s(db, ":-", vec![head, body])
}

fn engine_with(db: &Arc<Database>) -> Engine {
    horn::logging::init();
    Engine::new(Arc::clone(db), EngineConfig::default())
}

fn bench_enumerate_facts(c: &mut Criterion) {
    let mut group = c.benchmark_group("enumerate_facts");
    for size in [10_i64, 100, 1000] {
        let db = Arc::new(Database::new());
        for n in 0..size {
            db.add_clause(&s(&db, "p", vec![Term::Integer(n)])).unwrap();
        }
        let mut engine = engine_with(&db);
        let goal = s(&db, "p", vec![Term::var()]);

        group.bench_with_input(BenchmarkId::from_parameter(size), &goal, |b, goal| {
            b.iter(|| black_box(engine.solve_all(goal, None).unwrap().len()))
        });
    }
    group.finish();
}

/// app([], L, L).  app([H|T], L, [H|R]) :- app(T, L, R).
/// nrev([], []).   nrev([H|T], R) :- nrev(T, RT), app(RT, [H], R).
fn load_nrev(db: &Database) {
    let nil = atom(db, "[]");
    let cons = |h: Term, t: Term| s(db, ".", vec![h, t]);

    let l = Term::var();
    db.add_clause(&s(db, "app", vec![nil.clone(), l.clone(), l])).unwrap();
    let (h, t, l, r) = (Term::var(), Term::var(), Term::var(), Term::var());
    db.add_clause(&rule(
        db,
        s(db, "app", vec![cons(h.clone(), t.clone()), l.clone(), cons(h, r.clone())]),
        s(db, "app", vec![t, l, r]),
    ))
    .unwrap();

    db.add_clause(&s(db, "nrev", vec![nil.clone(), nil.clone()])).unwrap();
    let (h, t, r, rt) = (Term::var(), Term::var(), Term::var(), Term::var());
    let body = s(
        db,
        ",",
        vec![
            s(db, "nrev", vec![t.clone(), rt.clone()]),
            s(db, "app", vec![rt, cons(h.clone(), nil), r.clone()]),
        ],
    );
    db.add_clause(&rule(db, s(db, "nrev", vec![cons(h, t), r]), body)).unwrap();
}

fn bench_naive_reverse(c: &mut Criterion) {
    let db = Arc::new(Database::new());
    load_nrev(&db);
    let mut engine = engine_with(&db);

    let mut group = c.benchmark_group("naive_reverse");
    for len in [8_i64, 16, 30] {
        let items = (0..len).map(Term::Integer).collect();
        let list = Term::list(db.interner(), items, None);
        let goal = s(&db, "nrev", vec![list, Term::var()]);
        group.bench_with_input(BenchmarkId::from_parameter(len), &goal, |b, goal| {
            b.iter(|| black_box(engine.run_once(goal).unwrap()))
        });
    }
    group.finish();
}

fn bench_cut_and_catch(c: &mut Criterion) {
    let db = Arc::new(Database::new());
    for n in 0..50 {
        db.add_clause(&s(&db, "p", vec![Term::Integer(n)])).unwrap();
    }
    // step(X) :- catch(( p(X), X = 25 -> throw(found(X)) ; true ), found(_), true).
    let x = Term::var();
    let cond = s(
        &db,
        ",",
        vec![s(&db, "p", vec![x.clone()]), s(&db, "=", vec![x.clone(), Term::Integer(25)])],
    );
    let ite = s(
        &db,
        ";",
        vec![
            s(&db, "->", vec![cond, s(&db, "throw", vec![s(&db, "found", vec![x.clone()])])]),
            atom(&db, "true"),
        ],
    );
    let body = s(
        &db,
        "catch",
        vec![ite, s(&db, "found", vec![Term::var()]), atom(&db, "true")],
    );
    db.add_clause(&rule(&db, s(&db, "step", vec![x]), body)).unwrap();

    let mut engine = engine_with(&db);
    let goal = s(&db, "step", vec![Term::var()]);
    c.bench_function("cut_and_catch", |b| {
        b.iter(|| black_box(engine.run_once(&goal).unwrap()))
    });
}

fn bench_compile(c: &mut Criterion) {
    let db = Database::new();
    let interner = db.interner();
    let tag = interner.tag_named("p", 2);
    let clauses: Vec<Clause> = (0..200)
        .map(|n| {
            let head = s(&db, "p", vec![Term::Integer(n), s(&db, "f", vec![Term::var(), Term::var()])]);
            Clause::fact(interner, head)
        })
        .collect();

    c.bench_function("compile_predicate_200", |b| {
        b.iter(|| black_box(compile_predicate(interner, tag, black_box(&clauses)).unwrap()))
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(5));
    targets = bench_enumerate_facts, bench_naive_reverse, bench_cut_and_catch, bench_compile
}
criterion_main!(benches);
