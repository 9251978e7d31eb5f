//! Bytecode Virtual Machine
//!
//! Executes one activation of a compiled predicate. The VM keeps an explicit
//! operand stack and a fixed environment array for the activation, and
//! shares the engine's trail and choice-point stack with every other
//! activation. Calls recurse through [`Engine::invoke`], so each callee gets
//! its own `BytecodeVM`.
//!
//! An activation is delimited on the choice stack by a `FrameEntry` marker
//! pushed on entry. Returning with choice points left above the marker
//! pushes a `FrameExit` holding the environment; a redo pops it and
//! backtracks into the activation.
//!
//! This module is organized into submodules by functionality:
//! - `types`: VmError, Interrupt, VmResult
//! - `stack`: operand stack and operand decoding
//! - `value_ops`: term construction and environment slots
//! - `control_flow`: jumps, calls, returns and unification
//! - `nondeterminism`: clause alternatives, cut and backtracking
//! - `exceptions`: handler dispatch and unwinding

use std::ops::ControlFlow;
use std::sync::Arc;

use tracing::trace;

use super::chunk::BytecodeChunk;
use super::opcodes::Opcode;
use crate::backend::choice::{ChoiceKind, Slot};
use crate::backend::engine::Engine;
use crate::backend::errors::Signal;
use crate::backend::models::Term;
use crate::backend::predicate::{ExecOutcome, ExecResult};

// === Submodules ===

mod control_flow;
mod exceptions;
mod nondeterminism;
mod stack;
mod types;
mod value_ops;


// === Re-exports ===

pub use types::{Interrupt, VmError, VmResult};

/// Outcome of executing one instruction
pub(crate) type Step = VmResult<ControlFlow<ExecOutcome>>;

/// Run (or redo) one activation of `chunk` with the given call arguments
pub fn execute(
    engine: &mut Engine,
    chunk: &Arc<BytecodeChunk>,
    args: &[Term],
    is_redo: bool,
) -> ExecResult {
    let max_operands = engine.config().max_operand_stack;
    let trace = engine.config().trace;
    let mut vm = BytecodeVM {
        engine,
        chunk: Arc::clone(chunk),
        args,
        ip: 0,
        fault_ip: 0,
        operands: Vec::with_capacity(16),
        env: Vec::new(),
        entry: 0,
        max_operands,
        trace,
    };

    if is_redo {
        if let Err(err) = vm.resume() {
            return Err(Signal::Throw(vm.fault_ball(&err)));
        }
        vm.run(true)
    } else {
        vm.enter()?;
        vm.run(false)
    }
}

// === BytecodeVM Struct ===

/// One activation of a compiled predicate
pub struct BytecodeVM<'e> {
    /// The engine owning the trail and choice stack
    pub(super) engine: &'e mut Engine,

    /// Code being executed
    pub(super) chunk: Arc<BytecodeChunk>,

    /// Call arguments
    pub(super) args: &'e [Term],

    /// Current instruction pointer
    pub(super) ip: usize,

    /// Start of the instruction being executed; handler lookup uses it
    pub(super) fault_ip: usize,

    /// Operand stack
    pub(super) operands: Vec<Term>,

    /// Local environment
    pub(super) env: Vec<Slot>,

    /// Choice-stack height just above this activation's entry marker
    pub(super) entry: usize,

    pub(super) max_operands: usize,
    pub(super) trace: bool,
}

impl BytecodeVM<'_> {
    /// Push the entry marker for a fresh activation
    fn enter(&mut self) -> Result<(), Signal> {
        self.engine.push_choice(ChoiceKind::FrameEntry {
            chunk: Arc::clone(&self.chunk),
        })?;
        self.entry = self.engine.choices.len();
        trace!(
            target: "horn::vm::nondet",
            predicate = self.chunk.name(),
            entry = self.entry,
            "enter"
        );
        Ok(())
    }

    /// Reinstate the environment saved by the last `return` with
    /// alternatives left
    fn resume(&mut self) -> Result<(), VmError> {
        let on_top = matches!(
            self.engine.choices.peek().map(|cp| &cp.kind),
            Some(ChoiceKind::FrameExit { .. })
        );
        if !on_top {
            return Err(VmError::NoFrameExit);
        }
        let exit = self.engine.choices.pop().ok_or(VmError::NoFrameExit)?;
        let ChoiceKind::FrameExit { env, entry } = exit.kind else {
            return Err(VmError::NoFrameExit);
        };
        self.engine.trail.undo_to(exit.trail_mark);
        self.env = env;
        self.entry = entry;
        trace!(
            target: "horn::vm::nondet",
            predicate = self.chunk.name(),
            entry = self.entry,
            "redo"
        );
        Ok(())
    }

    /// Fetch-decode-execute until the activation succeeds, fails or raises
    fn run(&mut self, redo: bool) -> ExecResult {
        let mut next = if redo {
            self.backtrack()
        } else {
            Ok(ControlFlow::Continue(()))
        };
        loop {
            match next {
                Ok(ControlFlow::Continue(())) => {}
                Ok(ControlFlow::Break(outcome)) => return Ok(outcome),
                Err(interrupt) => self.settle(interrupt)?,
            }
            next = self.step();
        }
    }

    /// Route an interrupt: dispatch to a handler in this activation, or
    /// unwind it and hand the signal to the caller
    fn settle(&mut self, interrupt: Interrupt) -> Result<(), Signal> {
        let ball = match interrupt {
            Interrupt::Signal(Signal::Halt(code)) => return Err(Signal::Halt(code)),
            Interrupt::Signal(Signal::Throw(ball)) => ball,
            Interrupt::Fault(err) => self.fault_ball(&err),
        };
        self.handle_throw(ball)
    }

    /// Execute a single instruction
    pub(crate) fn step(&mut self) -> Step {
        self.fault_ip = self.ip;
        let byte = self.chunk.read_byte(self.ip).ok_or(VmError::IpOutOfBounds)?;
        let opcode = Opcode::from_byte(byte).ok_or(VmError::InvalidOpcode(byte))?;

        if self.trace {
            let (disasm, _) = self
                .chunk
                .disassemble_instruction(self.engine.interner(), self.ip);
            trace!(
                target: "horn::vm::step",
                predicate = self.chunk.name(),
                ip = self.ip,
                instruction = %disasm,
                operands = self.operands.len(),
                choice_points = self.engine.choices.len()
            );
        }

        self.ip += 1;

        match opcode {
            // Operand stack
            Opcode::Pop => self.op_pop()?,
            Opcode::Dup => self.op_dup()?,

            // Term construction
            Opcode::PushConstant => self.op_push_constant()?,
            Opcode::PushArgument => self.op_push_argument()?,
            Opcode::PushEnvironment => self.op_push_environment()?,
            Opcode::CreateVariable => self.op_create_variable()?,
            Opcode::CreateCompound => self.op_create_compound()?,

            // Environment
            Opcode::Allocate => self.op_allocate()?,
            Opcode::StoreEnvironment => self.op_store_environment()?,

            // Control flow
            Opcode::Jump => self.op_jump()?,
            Opcode::Call => return self.op_call(),
            Opcode::Return => return self.op_return(),
            Opcode::True => {}

            // Unification
            Opcode::Unify => return self.op_unify(),

            // Nondeterminism
            Opcode::TryMeElse => self.op_try_me_else()?,
            Opcode::RetryMeElse => self.op_retry_me_else()?,
            Opcode::TrustMe => self.op_trust_me()?,
            Opcode::Fail => return self.backtrack(),
            Opcode::Cut => self.op_cut()?,
            Opcode::SaveCut => self.op_save_cut()?,

            // Exceptions
            Opcode::Throw => return self.op_throw(),
        }

        Ok(ControlFlow::Continue(()))
    }
}
