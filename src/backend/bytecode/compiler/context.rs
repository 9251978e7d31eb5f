//! Compilation context for tracking environment slots and labels.

use std::collections::{HashMap, HashSet};

use crate::backend::models::{Term, VarRef};

use super::error::{CompileError, CompileResult};
use super::instruction::Label;

/// Slot bookkeeping shared by every clause of one predicate
#[derive(Debug)]
pub struct CompileContext {
    /// Variable id to environment slot
    slots: HashMap<u64, u16>,
    /// Next reserved slot to hand out
    next_reserved: u16,
    /// Last reserved slot counted by analysis
    reserved_limit: u16,
    /// Next label number
    next_label: u32,
}

impl CompileContext {
    pub fn new(slots: HashMap<u64, u16>, reserved: u16) -> Self {
        Self {
            slots,
            next_reserved: 1,
            reserved_limit: reserved,
            next_label: 0,
        }
    }

    /// Environment slot of a clause variable
    pub fn slot(&self, var: &VarRef) -> CompileResult<u16> {
        self.slots
            .get(&var.id())
            .copied()
            .ok_or(CompileError::VariableNotFound(var.id()))
    }

    /// Hand out the next reserved slot
    pub fn reserve(&mut self) -> CompileResult<u16> {
        if self.next_reserved > self.reserved_limit {
            return Err(CompileError::TooManySlots);
        }
        let slot = self.next_reserved;
        self.next_reserved += 1;
        Ok(slot)
    }

    /// A fresh label
    pub fn label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }
}

/// Head arguments that are the first occurrence of a variable.
///
/// Such a variable is stored straight from its argument instead of being
/// created and unified. Returns, per argument, the variable if so.
pub fn direct_arguments(args: &[Term]) -> Vec<Option<VarRef>> {
    let mut seen: HashSet<u64> = HashSet::new();
    args.iter()
        .map(|arg| {
            let direct = match arg.deref() {
                Term::Var(v) if !seen.contains(&v.id()) => Some(v),
                _ => None,
            };
            seen.extend(arg.variables().iter().map(VarRef::id));
            direct
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::symbol::Interner;

    #[test]
    fn test_direct_arguments() {
        let interner = Interner::new();
        let f = interner.tag_named("f", 1);
        let x = VarRef::fresh();
        let y = VarRef::fresh();
        // p(X, X, f(Y), Y)
        let args = vec![
            Term::Var(x.clone()),
            Term::Var(x.clone()),
            Term::compound(f, vec![Term::Var(y.clone())]),
            Term::Var(y),
        ];
        let direct = direct_arguments(&args);
        assert!(matches!(&direct[0], Some(v) if v.same(&x)));
        assert!(direct[1].is_none());
        assert!(direct[2].is_none());
        assert!(direct[3].is_none());
    }

    #[test]
    fn test_reserve_respects_analysis() {
        let mut context = CompileContext::new(HashMap::new(), 2);
        assert_eq!(context.reserve().ok(), Some(1));
        assert_eq!(context.reserve().ok(), Some(2));
        assert!(context.reserve().is_err());
    }
}
