//! Term construction and environment slot operations.

use crate::backend::choice::Slot;
use crate::backend::models::Term;

use super::types::{VmError, VmResult};
use super::BytecodeVM;

impl BytecodeVM<'_> {
    // === Term Construction ===

    pub(super) fn op_push_constant(&mut self) -> VmResult<()> {
        let index = self.read_u16()?;
        let term = self
            .chunk
            .get_constant(index)
            .ok_or(VmError::InvalidConstant(index))?
            .clone();
        self.push(term)
    }

    pub(super) fn op_push_argument(&mut self) -> VmResult<()> {
        let index = self.read_u16()?;
        let term = self
            .args
            .get(index as usize)
            .ok_or(VmError::InvalidArgument(index))?
            .clone();
        self.push(term)
    }

    pub(super) fn op_create_variable(&mut self) -> VmResult<()> {
        self.push(Term::var())
    }

    /// Pop the arguments (pushed left to right) and build the compound
    pub(super) fn op_create_compound(&mut self) -> VmResult<()> {
        let index = self.read_u16()?;
        let tag = self.chunk.get_tag(index).ok_or(VmError::InvalidTag(index))?;
        let arity = self.engine.interner().tag_arity(tag);
        let args = self.pop_n(arity)?;
        self.push(Term::compound(tag, args))
    }

    // === Environment ===

    pub(super) fn op_allocate(&mut self) -> VmResult<()> {
        let size = self.read_u16()? as usize;
        self.env.clear();
        self.env.resize(size, Slot::Empty);
        Ok(())
    }

    pub(super) fn op_store_environment(&mut self) -> VmResult<()> {
        let slot = self.read_u16()?;
        let term = self.pop()?;
        *self.slot_mut(slot)? = Slot::Term(term);
        Ok(())
    }

    pub(super) fn op_push_environment(&mut self) -> VmResult<()> {
        let slot = self.read_u16()?;
        let term = match self.env.get(slot as usize) {
            Some(Slot::Term(term)) => term.clone(),
            Some(_) => {
                return Err(VmError::SlotKind {
                    slot,
                    expected: "term",
                }
                .into())
            }
            None => return Err(VmError::InvalidSlot(slot).into()),
        };
        self.push(term)
    }

    #[inline]
    pub(super) fn slot_mut(&mut self, slot: u16) -> VmResult<&mut Slot> {
        Ok(self
            .env
            .get_mut(slot as usize)
            .ok_or(VmError::InvalidSlot(slot))?)
    }
}
