//! Nondeterminism operations for the bytecode VM.
//!
//! Clause alternatives follow the try/retry/trust discipline: `try_me_else`
//! pushes an alternative, backtracking resumes at it while leaving it in
//! place, `retry_me_else` points it at the next clause and `trust_me`
//! removes it.

use std::ops::ControlFlow;

use tracing::trace;

use super::types::{VmError, VmResult};
use super::{BytecodeVM, Step};
use crate::backend::choice::{Barrier, ChoiceKind, ChoicePoint, Slot};
use crate::backend::predicate::ExecOutcome;

impl BytecodeVM<'_> {
    // === Alternatives ===

    pub(super) fn op_try_me_else(&mut self) -> VmResult<()> {
        let resume = self.read_target()?;
        self.engine.push_choice(ChoiceKind::Alternative { resume })?;
        trace!(
            target: "horn::vm::nondet",
            ip = self.fault_ip,
            resume,
            choice_points = self.engine.choices.len(),
            "try_me_else"
        );
        Ok(())
    }

    pub(super) fn op_retry_me_else(&mut self) -> VmResult<()> {
        let target = self.read_target()?;
        match self.engine.choices.peek_mut() {
            Some(ChoicePoint {
                kind: ChoiceKind::Alternative { resume },
                ..
            }) => {
                *resume = target;
                trace!(target: "horn::vm::nondet", ip = self.fault_ip, resume = target, "retry_me_else");
                Ok(())
            }
            _ => Err(VmError::NoAlternative.into()),
        }
    }

    pub(super) fn op_trust_me(&mut self) -> VmResult<()> {
        let on_top = matches!(
            self.engine.choices.peek().map(|cp| &cp.kind),
            Some(ChoiceKind::Alternative { .. })
        );
        if !on_top {
            return Err(VmError::NoAlternative.into());
        }
        self.engine.choices.pop();
        trace!(target: "horn::vm::nondet", ip = self.fault_ip, "trust_me");
        Ok(())
    }

    // === Cut ===

    pub(super) fn op_save_cut(&mut self) -> VmResult<()> {
        let slot = self.read_u16()?;
        let barrier = Barrier {
            choice: self.engine.choices.len(),
            trail: self.engine.trail.mark(),
        };
        *self.slot_mut(slot)? = Slot::Barrier(barrier);
        Ok(())
    }

    /// Discard the choice points above the barrier in a slot, never below
    /// this activation's entry, running any cleanup goals they held
    pub(super) fn op_cut(&mut self) -> VmResult<()> {
        let slot = self.read_u16()?;
        let barrier = self.barrier(slot)?;
        let height = barrier.choice.max(self.entry);
        let cleanups = self.engine.choices.cut_to(height);
        trace!(
            target: "horn::vm::nondet",
            ip = self.fault_ip,
            height,
            cleanups = cleanups.len(),
            "cut"
        );
        if !cleanups.is_empty() {
            self.engine.run_cleanups(cleanups)?;
        }
        Ok(())
    }

    pub(super) fn barrier(&self, slot: u16) -> VmResult<Barrier> {
        match self.env.get(slot as usize) {
            Some(Slot::Barrier(barrier)) => Ok(*barrier),
            Some(_) => Err(VmError::SlotKind {
                slot,
                expected: "cut barrier",
            }
            .into()),
            None => Err(VmError::InvalidSlot(slot).into()),
        }
    }

    // === Backtracking ===

    /// Resume at the most recent choice point of this activation.
    ///
    /// Reaching the entry marker fails the whole activation, after undoing
    /// every binding made since it was entered.
    pub(crate) fn backtrack(&mut self) -> Step {
        loop {
            if self.engine.choices.len() < self.entry {
                return Err(VmError::FrameCorrupted.into());
            }

            if let Some(ChoicePoint {
                trail_mark,
                kind: ChoiceKind::Alternative { resume },
            }) = self.engine.choices.peek()
            {
                let (mark, resume) = (*trail_mark, *resume);
                self.engine.trail.undo_to(mark);
                self.operands.clear();
                self.ip = resume;
                trace!(target: "horn::vm::nondet", resume, "backtrack to alternative");
                return Ok(ControlFlow::Continue(()));
            }

            let point = self.engine.choices.pop().ok_or(VmError::FrameCorrupted)?;
            self.engine.trail.undo_to(point.trail_mark);

            match point.kind {
                ChoiceKind::FrameEntry { .. } => {
                    trace!(target: "horn::vm::nondet", predicate = self.chunk.name(), "fail");
                    return Ok(ControlFlow::Break(ExecOutcome::Fail));
                }
                ChoiceKind::Retry {
                    callee,
                    args,
                    resume,
                    call_ip,
                } => {
                    self.operands.clear();
                    self.ip = resume;
                    self.fault_ip = call_ip;
                    trace!(target: "horn::vm::nondet", ip = call_ip, "redo call");
                    match self.engine.invoke(&callee, &args, true)? {
                        ExecOutcome::SuccessMore => {
                            self.engine.push_choice(ChoiceKind::Retry {
                                callee,
                                args,
                                resume,
                                call_ip,
                            })?;
                            return Ok(ControlFlow::Continue(()));
                        }
                        ExecOutcome::SuccessFinal => return Ok(ControlFlow::Continue(())),
                        ExecOutcome::Fail => {}
                    }
                }
                ChoiceKind::Cleanup { goal } => {
                    self.engine.run_cleanups(vec![goal])?;
                }
                // Orphaned redo state; nothing can resume it any more
                ChoiceKind::Alternative { .. }
                | ChoiceKind::Native { .. }
                | ChoiceKind::FrameExit { .. } => {}
            }
        }
    }
}
