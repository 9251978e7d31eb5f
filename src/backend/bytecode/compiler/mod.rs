//! Clause compiler
//!
//! Translates the ordered clause list of one predicate into symbolic
//! instructions in two passes:
//!
//! 1. **Analysis** (`analysis.rs`): classifies body goals, counts the
//!    reserved environment slots (cut barriers, catch state) and gives every
//!    clause variable a slot that is never reused.
//! 2. **Codegen** (this module and `control_flow.rs`): emits the
//!    try/retry/trust clause chain, head unification and bodies.
//!
//! The resulting [`Program`] is packed into a [`BytecodeChunk`] by the
//! assembler.

mod analysis;
mod context;
mod control_flow;
mod error;
mod instruction;


use tracing::{debug, trace};

use crate::backend::models::{Clause, Term, VarRef};
use crate::backend::symbol::{Interner, Tag};

use super::assembler::assemble;
use super::chunk::BytecodeChunk;

use analysis::{analyze, shape, Shape};
pub use analysis::validate_clause;
pub use context::CompileContext;
pub use error::{CompileError, CompileResult};
pub use instruction::{Instruction, Label, Program, SymbolicHandler};

/// Compile a predicate's clauses to a bytecode chunk
pub fn compile_predicate(
    interner: &Interner,
    tag: Tag,
    clauses: &[Clause],
) -> CompileResult<BytecodeChunk> {
    let program = compile_program(interner, tag, clauses)?;
    let chunk = assemble(&program)?;
    debug!(
        target: "horn::compiler",
        predicate = %program.name,
        clauses = clauses.len(),
        env = chunk.env_size(),
        bytes = chunk.len(),
        "compiled predicate"
    );
    Ok(chunk)
}

/// Compile a predicate's clauses to symbolic instructions
pub fn compile_program(interner: &Interner, tag: Tag, clauses: &[Clause]) -> CompileResult<Program> {
    let arity = u16::try_from(interner.tag_arity(tag)).map_err(|_| CompileError::TooManyArguments)?;
    let analysis = analyze(interner, clauses)?;
    let mut compiler = Compiler::new(interner, CompileContext::new(analysis.slots, analysis.reserved));

    if clauses.is_empty() {
        compiler.emit(Instruction::Fail);
    } else {
        compiler.emit(Instruction::Allocate(analysis.env_size));
        compiler.emit(Instruction::SaveCut(0));
        compiler.compile_clauses(clauses, &analysis.clause_variables)?;
    }

    Ok(Program {
        name: interner.tag_indicator(tag),
        arity,
        env_size: if clauses.is_empty() { 0 } else { analysis.env_size },
        instructions: compiler.code,
        handlers: compiler.handlers,
    })
}

/// Codegen state for one predicate
pub(crate) struct Compiler<'i> {
    interner: &'i Interner,
    pub(crate) context: CompileContext,
    pub(crate) code: Vec<Instruction>,
    pub(crate) handlers: Vec<SymbolicHandler>,
}

impl<'i> Compiler<'i> {
    fn new(interner: &'i Interner, context: CompileContext) -> Self {
        Self {
            interner,
            context,
            code: Vec::with_capacity(64),
            handlers: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn emit(&mut self, instruction: Instruction) {
        self.code.push(instruction);
    }

    #[inline]
    pub(crate) fn place(&mut self, label: Label) {
        self.code.push(Instruction::Label(label));
    }

    /// Chain the clauses with try_me_else / retry_me_else / trust_me
    fn compile_clauses(&mut self, clauses: &[Clause], variables: &[Vec<VarRef>]) -> CompileResult<()> {
        let last = clauses.len() - 1;
        let mut next: Option<Label> = None;

        for (i, (clause, vars)) in clauses.iter().zip(variables).enumerate() {
            if let Some(label) = next.take() {
                self.place(label);
            }
            if last > 0 {
                if i == 0 {
                    let label = self.context.label();
                    self.emit(Instruction::TryMeElse(label));
                    next = Some(label);
                } else if i < last {
                    let label = self.context.label();
                    self.emit(Instruction::RetryMeElse(label));
                    next = Some(label);
                } else {
                    self.emit(Instruction::TrustMe);
                }
            }
            self.compile_clause(clause, vars)?;
        }
        Ok(())
    }

    fn compile_clause(&mut self, clause: &Clause, variables: &[VarRef]) -> CompileResult<()> {
        let (_, args) = clause
            .head_ref()
            .callable_parts(self.interner)
            .ok_or_else(|| CompileError::InvalidHead(clause.head_ref().deref()))?;
        let direct = context::direct_arguments(&args);

        for var in variables {
            let stored_directly = direct.iter().flatten().any(|d| d.same(var));
            if !stored_directly {
                let slot = self.context.slot(var)?;
                self.emit(Instruction::CreateVariable);
                self.emit(Instruction::StoreEnvironment(slot));
            }
        }

        for (i, (arg, direct)) in args.iter().zip(&direct).enumerate() {
            let index = u16::try_from(i).map_err(|_| CompileError::TooManyArguments)?;
            self.emit(Instruction::PushArgument(index));
            match direct {
                Some(var) => {
                    let slot = self.context.slot(var)?;
                    self.emit(Instruction::StoreEnvironment(slot));
                }
                None => {
                    self.build(arg)?;
                    self.emit(Instruction::Unify);
                }
            }
        }

        self.compile_body(clause.body_ref(), 0)?;
        self.emit(Instruction::Return);
        Ok(())
    }

    /// Emit code leaving `term` on the operand stack.
    ///
    /// Arguments are emitted before their compound's `create_compound`.
    /// When every argument came out as a single constant the compound is
    /// ground, and those pushes are folded into one constant built from the
    /// values they carry.
    pub(crate) fn build(&mut self, term: &Term) -> CompileResult<()> {
        enum Step {
            Build(Term),
            Create(Tag, usize),
        }

        let mut steps = vec![Step::Build(term.clone())];
        while let Some(step) = steps.pop() {
            match step {
                Step::Build(term) => match term.deref() {
                    Term::Var(v) => {
                        let slot = self.context.slot(&v)?;
                        self.emit(Instruction::PushEnvironment(slot));
                    }
                    Term::Compound(c) => {
                        steps.push(Step::Create(c.tag(), c.arity()));
                        steps.extend(c.args().iter().rev().cloned().map(Step::Build));
                    }
                    constant => self.emit(Instruction::PushConstant(constant)),
                },
                Step::Create(tag, arity) => {
                    let first = self.code.len().saturating_sub(arity);
                    let ground = self.code.len() >= arity
                        && self.code[first..]
                            .iter()
                            .all(|i| matches!(i, Instruction::PushConstant(_)));
                    if ground {
                        let args = self
                            .code
                            .split_off(first)
                            .into_iter()
                            .filter_map(|i| match i {
                                Instruction::PushConstant(value) => Some(value),
                                _ => None,
                            })
                            .collect();
                        self.emit(Instruction::PushConstant(Term::compound(tag, args)));
                    } else {
                        self.emit(Instruction::CreateCompound(tag));
                    }
                }
            }
        }
        Ok(())
    }

    /// Compile a body goal; `barrier` is the slot `!` cuts to
    pub(crate) fn compile_body(&mut self, goal: &Term, barrier: u16) -> CompileResult<()> {
        // Walk the right spine of a conjunction in a loop
        let mut goal = goal.clone();
        while let Shape::Conjunction(a, b) = shape(self.interner, &goal) {
            self.compile_body(&a, barrier)?;
            goal = b;
        }
        match shape(self.interner, &goal) {
            Shape::Variable(v) => {
                let slot = self.context.slot(&v)?;
                self.emit(Instruction::PushEnvironment(slot));
                self.emit(Instruction::Call(self.interner.known().call[0]));
            }
            Shape::True => self.emit(Instruction::True),
            Shape::Fail => self.emit(Instruction::Fail),
            Shape::Cut => self.emit(Instruction::Cut(barrier)),
            Shape::Conjunction(a, b) => {
                self.compile_body(&a, barrier)?;
                self.compile_body(&b, barrier)?;
            }
            Shape::Disjunction(a, b) => self.compile_disjunction(&a, &b, barrier)?,
            Shape::IfThenElse(c, t, e) => self.compile_if_then_else(&c, &t, Some(&e), barrier)?,
            Shape::IfThen(c, t) => self.compile_if_then_else(&c, &t, None, barrier)?,
            Shape::Not(g) => self.compile_not(&g)?,
            Shape::Catch(g, catcher, recovery) => self.compile_catch(&g, &catcher, &recovery)?,
            Shape::Unify(a, b) => {
                self.build(&a)?;
                self.build(&b)?;
                self.emit(Instruction::Unify);
            }
            Shape::Throw(ball) => {
                self.build(&ball)?;
                self.emit(Instruction::Throw);
            }
            Shape::Call(tag, args) => {
                for arg in &args {
                    self.build(arg)?;
                }
                trace!(target: "horn::compiler", callee = %self.interner.tag_indicator(tag), "call");
                self.emit(Instruction::Call(tag));
            }
            Shape::NotCallable(goal) => return Err(CompileError::NotCallable(goal)),
        }
        Ok(())
    }
}
