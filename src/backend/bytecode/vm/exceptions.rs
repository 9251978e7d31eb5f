//! Exception handling for the bytecode VM.
//!
//! A thrown ball is matched against the chunk's handler table using the
//! offset of the instruction that raised it. The first range covering that
//! offset wins (ranges are innermost-first). Without a match the activation
//! is unwound to its entry marker and the ball is re-raised to the caller.

use tracing::{debug, trace, warn};

use super::types::VmError;
use super::{BytecodeVM, Step};
use crate::backend::choice::Slot;
use crate::backend::errors::{PrologError, Signal};
use crate::backend::models::Term;

impl BytecodeVM<'_> {
    /// Pop the ball and raise it; an unbound ball is an instantiation error
    pub(super) fn op_throw(&mut self) -> Step {
        let ball = self.pop()?;
        if ball.is_var() {
            return Err(PrologError::instantiation_error(self.engine.interner()).into());
        }
        trace!(
            target: "horn::vm::exception",
            ip = self.fault_ip,
            ball = %self.engine.interner().format_term(&ball),
            "throw"
        );
        Err(Signal::throw(&ball).into())
    }

    /// The ball an interpreter fault is thrown as
    pub(super) fn fault_ball(&self, err: &VmError) -> Term {
        let interner = self.engine.interner();
        warn!(
            target: "horn::vm::exception",
            predicate = self.chunk.name(),
            ip = self.fault_ip,
            error = %err,
            "interpreter fault"
        );
        let error = match err {
            VmError::OperandStackOverflow => PrologError::resource_error(interner, "operand_stack"),
            other => PrologError::system_error(interner, &other.to_string()),
        };
        error.into_ball()
    }

    /// Dispatch `ball` to a handler of this activation, or unwind it.
    ///
    /// `Ok` means execution continues at a handler; `Err` carries the signal
    /// for the caller after every binding made since entry has been undone.
    pub(super) fn handle_throw(&mut self, ball: Term) -> Result<(), Signal> {
        let range = self.chunk.handler_for(self.fault_ip).copied();
        let barrier = range.and_then(|r| match self.env.get(r.barrier_slot as usize) {
            Some(Slot::Barrier(barrier)) => Some((r, *barrier)),
            _ => None,
        });

        if let Some((range, barrier)) = barrier {
            let cleanups = self.engine.choices.cut_to(barrier.choice.max(self.entry));
            self.engine.run_cleanups(cleanups)?;
            self.engine.trail.undo_to(barrier.trail);
            self.operands.clear();
            self.operands.push(ball);
            self.ip = range.handler as usize;
            debug!(
                target: "horn::vm::exception",
                predicate = self.chunk.name(),
                ip = self.fault_ip,
                handler = range.handler,
                "dispatch to handler"
            );
            return Ok(());
        }

        let bottom = self.entry.saturating_sub(1);
        let mark = self.engine.choices.get(bottom).map(|cp| cp.trail_mark);
        let cleanups = self.engine.choices.cut_to(bottom);
        self.engine.run_cleanups(cleanups)?;
        if let Some(mark) = mark {
            self.engine.trail.undo_to(mark);
        }
        trace!(
            target: "horn::vm::exception",
            predicate = self.chunk.name(),
            ip = self.fault_ip,
            "unwind"
        );
        Err(Signal::Throw(ball))
    }
}
