//! Control flow operations for the bytecode VM.
//!
//! Jumps, predicate calls, returns and unification.

use std::ops::ControlFlow;
use std::sync::Arc;

use tracing::trace;

use super::types::{VmError, VmResult};
use super::{BytecodeVM, Step};
use crate::backend::choice::ChoiceKind;
use crate::backend::database::Resolved;
use crate::backend::errors::PrologError;
use crate::backend::models::Term;
use crate::backend::predicate::{Callee, ExecOutcome};
use crate::backend::symbol::Tag;
use crate::backend::unify::unify_in_place;
use crate::config::UnknownPolicy;

impl BytecodeVM<'_> {
    // === Jumps ===

    pub(super) fn op_jump(&mut self) -> VmResult<()> {
        self.ip = self.read_target()?;
        Ok(())
    }

    // === Calls ===

    /// Pop the arguments, resolve the tag and invoke the callee.
    ///
    /// Success with alternatives pushes a retry point that resumes after
    /// this instruction.
    pub(super) fn op_call(&mut self) -> Step {
        let index = self.read_u16()?;
        let tag = self.chunk.get_tag(index).ok_or(VmError::InvalidTag(index))?;
        let arity = self.engine.interner().tag_arity(tag);
        let args: Arc<[Term]> = self.pop_n(arity)?.into();

        let Some((callee, args)) = self.resolve_call(index, tag, args)? else {
            return self.backtrack();
        };

        trace!(
            target: "horn::vm::call",
            ip = self.fault_ip,
            callee = %self.engine.interner().tag_indicator(tag),
            "call"
        );

        match self.engine.invoke(&callee, &args, false)? {
            ExecOutcome::SuccessMore => {
                self.engine.push_choice(ChoiceKind::Retry {
                    callee,
                    args,
                    resume: self.ip,
                    call_ip: self.fault_ip,
                })?;
                Ok(ControlFlow::Continue(()))
            }
            ExecOutcome::SuccessFinal => Ok(ControlFlow::Continue(())),
            ExecOutcome::Fail => self.backtrack(),
        }
    }

    /// What a call to `tag` invokes, with the arguments to pass it.
    ///
    /// `None` means the call fails (undefined procedure under the `fail`
    /// policy).
    fn resolve_call(
        &mut self,
        index: u16,
        tag: Tag,
        args: Arc<[Term]>,
    ) -> VmResult<Option<(Callee, Arc<[Term]>)>> {
        let db = Arc::clone(self.engine.database());
        let generation = db.generation();
        let site = self.chunk.call_site(index);

        if let Some(callee) = site.and_then(|s| s.get(generation)) {
            return Ok(Some((callee, args)));
        }

        let callee = match db.resolve(tag)? {
            Resolved::Compiled(chunk) => Callee::Compiled(chunk),
            Resolved::Native(native) => Callee::Native(native),
            Resolved::Control => {
                // Control constructs called by tag run as a temporary clause
                let (chunk, vars) = self.engine.meta_call_target(tag, &args)?;
                return Ok(Some((Callee::Compiled(chunk), vars)));
            }
            Resolved::Undefined => {
                return match self.engine.unknown_policy() {
                    UnknownPolicy::Fail => Ok(None),
                    UnknownPolicy::Error => {
                        Err(PrologError::unknown_procedure(db.interner(), tag).into())
                    }
                };
            }
        };

        if let Some(site) = site {
            site.store(generation, callee.clone());
        }
        Ok(Some((callee, args)))
    }

    // === Return ===

    /// Leave the activation.
    ///
    /// With nothing above the entry marker the activation is finished and
    /// the marker is dropped; otherwise the environment is parked in a
    /// frame-exit marker so a redo can backtrack into it.
    pub(super) fn op_return(&mut self) -> Step {
        let height = self.engine.choices.len();
        if height < self.entry {
            return Err(VmError::FrameCorrupted.into());
        }

        if height == self.entry {
            self.engine.choices.pop();
            trace!(target: "horn::vm::nondet", predicate = self.chunk.name(), "exit");
            return Ok(ControlFlow::Break(ExecOutcome::SuccessFinal));
        }

        let env = std::mem::take(&mut self.env);
        self.engine.push_choice(ChoiceKind::FrameExit {
            env,
            entry: self.entry,
        })?;
        trace!(
            target: "horn::vm::nondet",
            predicate = self.chunk.name(),
            alternatives = height - self.entry,
            "exit with alternatives"
        );
        Ok(ControlFlow::Break(ExecOutcome::SuccessMore))
    }

    // === Unification ===

    /// Pop two terms and unify them; partial bindings of a failed attempt
    /// are undone by the backtrack that follows
    pub(super) fn op_unify(&mut self) -> Step {
        let b = self.pop()?;
        let a = self.pop()?;
        if unify_in_place(&mut self.engine.trail, &a, &b) {
            Ok(ControlFlow::Continue(()))
        } else {
            self.backtrack()
        }
    }
}
