//! Control constructs compiled inline: disjunction, if-then-else, negation
//! and catch/3.

use crate::backend::models::Term;

use super::error::CompileResult;
use super::instruction::{Instruction, SymbolicHandler};
use super::Compiler;

impl Compiler<'_> {
    /// `(A ; B)`: both branches share the enclosing cut barrier
    ///
    /// ```text
    ///     try_me_else L
    ///     <A>
    ///     jump End
    /// L:  trust_me
    ///     <B>
    /// End:
    /// ```
    pub(crate) fn compile_disjunction(&mut self, a: &Term, b: &Term, barrier: u16) -> CompileResult<()> {
        let alternative = self.context.label();
        let end = self.context.label();

        self.emit(Instruction::TryMeElse(alternative));
        self.compile_body(a, barrier)?;
        self.emit(Instruction::Jump(end));
        self.place(alternative);
        self.emit(Instruction::TrustMe);
        self.compile_body(b, barrier)?;
        self.place(end);
        Ok(())
    }

    /// `(C -> T ; E)`, or `(C -> T)` when `otherwise` is `None`.
    ///
    /// The barrier is saved after the alternative is pushed, so a cut in the
    /// condition only removes the condition's own choice points.
    ///
    /// ```text
    ///     try_me_else Else
    ///     save_cut S
    ///     <C>            ; ! cuts to S
    ///     cut S
    ///     trust_me       ; drop the Else alternative
    ///     <T>
    ///     jump End
    /// Else:
    ///     trust_me
    ///     <E>
    /// End:
    /// ```
    pub(crate) fn compile_if_then_else(
        &mut self,
        condition: &Term,
        then: &Term,
        otherwise: Option<&Term>,
        barrier: u16,
    ) -> CompileResult<()> {
        let slot = self.context.reserve()?;
        let else_label = self.context.label();
        let end = self.context.label();

        self.emit(Instruction::TryMeElse(else_label));
        self.emit(Instruction::SaveCut(slot));
        self.compile_body(condition, slot)?;
        self.emit(Instruction::Cut(slot));
        self.emit(Instruction::TrustMe);
        self.compile_body(then, barrier)?;
        self.emit(Instruction::Jump(end));

        self.place(else_label);
        self.emit(Instruction::TrustMe);
        match otherwise {
            Some(goal) => self.compile_body(goal, barrier)?,
            None => self.emit(Instruction::Fail),
        }
        self.place(end);
        Ok(())
    }

    /// `\+ G` as `(G -> fail ; true)`
    pub(crate) fn compile_not(&mut self, goal: &Term) -> CompileResult<()> {
        let slot = self.context.reserve()?;
        let else_label = self.context.label();

        self.emit(Instruction::TryMeElse(else_label));
        self.emit(Instruction::SaveCut(slot));
        self.compile_body(goal, slot)?;
        self.emit(Instruction::Cut(slot));
        self.emit(Instruction::TrustMe);
        self.emit(Instruction::Fail);

        self.place(else_label);
        self.emit(Instruction::TrustMe);
        Ok(())
    }

    /// `catch(G, C, R)` with a protected range around `G`.
    ///
    /// Slot `B` receives the ball; slot `H` holds the barrier saved on entry.
    /// On a throw inside the range the interpreter cuts and undoes to `H`
    /// and jumps to `Handler` with the ball on the operand stack.
    ///
    /// ```text
    ///     save_cut H
    /// Start:
    ///     <G>              ; ! cuts to H
    /// End:
    ///     jump Done
    /// Handler:
    ///     store_environment B
    ///     try_me_else Rethrow
    ///     <C>
    ///     push_environment B
    ///     unify
    ///     trust_me
    ///     <R>              ; ! cuts to H
    ///     jump Done
    /// Rethrow:
    ///     trust_me
    ///     push_environment B
    ///     throw
    /// Done:
    /// ```
    pub(crate) fn compile_catch(&mut self, goal: &Term, catcher: &Term, recovery: &Term) -> CompileResult<()> {
        let ball_slot = self.context.reserve()?;
        let barrier_slot = self.context.reserve()?;
        let start = self.context.label();
        let end = self.context.label();
        let handler = self.context.label();
        let rethrow = self.context.label();
        let done = self.context.label();

        self.emit(Instruction::SaveCut(barrier_slot));
        self.place(start);
        self.compile_body(goal, barrier_slot)?;
        self.place(end);
        self.emit(Instruction::Jump(done));

        self.place(handler);
        self.emit(Instruction::StoreEnvironment(ball_slot));
        self.emit(Instruction::TryMeElse(rethrow));
        self.build(catcher)?;
        self.emit(Instruction::PushEnvironment(ball_slot));
        self.emit(Instruction::Unify);
        self.emit(Instruction::TrustMe);
        self.compile_body(recovery, barrier_slot)?;
        self.emit(Instruction::Jump(done));

        self.place(rethrow);
        self.emit(Instruction::TrustMe);
        self.emit(Instruction::PushEnvironment(ball_slot));
        self.emit(Instruction::Throw);
        self.place(done);

        // Ranges nested inside G were pushed while compiling it, so the
        // list stays innermost first.
        self.handlers.push(SymbolicHandler {
            start,
            end,
            handler,
            barrier_slot,
        });
        Ok(())
    }
}
