//! Operand stack and operand decoding for the bytecode VM.

use crate::backend::models::Term;

use super::types::{VmError, VmResult};
use super::BytecodeVM;

impl BytecodeVM<'_> {
    // === Stack Operations ===

    #[inline]
    pub(super) fn push(&mut self, term: Term) -> VmResult<()> {
        if self.operands.len() >= self.max_operands {
            return Err(VmError::OperandStackOverflow.into());
        }
        self.operands.push(term);
        Ok(())
    }

    #[inline]
    pub(super) fn pop(&mut self) -> VmResult<Term> {
        Ok(self.operands.pop().ok_or(VmError::StackUnderflow)?)
    }

    #[inline]
    pub(super) fn peek(&self) -> VmResult<&Term> {
        Ok(self.operands.last().ok_or(VmError::StackUnderflow)?)
    }

    /// Pop the top `n` operands, keeping their push order
    pub(super) fn pop_n(&mut self, n: usize) -> VmResult<Vec<Term>> {
        let len = self.operands.len();
        if n > len {
            return Err(VmError::StackUnderflow.into());
        }
        Ok(self.operands.split_off(len - n))
    }

    pub(super) fn op_pop(&mut self) -> VmResult<()> {
        self.pop().map(drop)
    }

    pub(super) fn op_dup(&mut self) -> VmResult<()> {
        let term = self.peek()?.clone();
        self.push(term)
    }

    // === Operand decoding ===

    #[inline]
    pub(super) fn read_u16(&mut self) -> VmResult<u16> {
        let value = self.chunk.read_u16(self.ip).ok_or(VmError::IpOutOfBounds)?;
        self.ip += 2;
        Ok(value)
    }

    #[inline]
    pub(super) fn read_u32(&mut self) -> VmResult<u32> {
        let value = self.chunk.read_u32(self.ip).ok_or(VmError::IpOutOfBounds)?;
        self.ip += 4;
        Ok(value)
    }

    /// Read a jump target and check it lands inside the chunk
    pub(super) fn read_target(&mut self) -> VmResult<usize> {
        let target = self.read_u32()? as usize;
        if target >= self.chunk.len() {
            return Err(VmError::IpOutOfBounds.into());
        }
        Ok(target)
    }
}
