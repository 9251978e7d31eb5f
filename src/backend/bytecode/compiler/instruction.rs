//! Symbolic instructions produced by codegen.
//!
//! Jumps refer to labels; the assembler resolves them to absolute offsets
//! and moves constants and tags into the chunk's side tables.

use std::fmt;

use crate::backend::models::Term;
use crate::backend::symbol::{Interner, Tag};

use super::super::opcodes::Opcode;

/// A jump target, placed with [`Instruction::Label`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub(crate) u32);

/// One symbolic instruction
#[derive(Clone)]
pub enum Instruction {
    Pop,
    Dup,
    PushConstant(Term),
    PushArgument(u16),
    PushEnvironment(u16),
    CreateVariable,
    CreateCompound(Tag),
    Allocate(u16),
    StoreEnvironment(u16),
    Jump(Label),
    Call(Tag),
    Return,
    True,
    Unify,
    TryMeElse(Label),
    RetryMeElse(Label),
    TrustMe,
    Fail,
    Cut(u16),
    SaveCut(u16),
    Throw,
    /// Marks the position of a label; emits nothing
    Label(Label),
}

impl Instruction {
    /// The opcode this instruction assembles to, `None` for labels
    pub fn opcode(&self) -> Option<Opcode> {
        Some(match self {
            Self::Pop => Opcode::Pop,
            Self::Dup => Opcode::Dup,
            Self::PushConstant(_) => Opcode::PushConstant,
            Self::PushArgument(_) => Opcode::PushArgument,
            Self::PushEnvironment(_) => Opcode::PushEnvironment,
            Self::CreateVariable => Opcode::CreateVariable,
            Self::CreateCompound(_) => Opcode::CreateCompound,
            Self::Allocate(_) => Opcode::Allocate,
            Self::StoreEnvironment(_) => Opcode::StoreEnvironment,
            Self::Jump(_) => Opcode::Jump,
            Self::Call(_) => Opcode::Call,
            Self::Return => Opcode::Return,
            Self::True => Opcode::True,
            Self::Unify => Opcode::Unify,
            Self::TryMeElse(_) => Opcode::TryMeElse,
            Self::RetryMeElse(_) => Opcode::RetryMeElse,
            Self::TrustMe => Opcode::TrustMe,
            Self::Fail => Opcode::Fail,
            Self::Cut(_) => Opcode::Cut,
            Self::SaveCut(_) => Opcode::SaveCut,
            Self::Throw => Opcode::Throw,
            Self::Label(_) => return None,
        })
    }

    /// Render with names resolved, for compiler diagnostics
    pub fn render(&self, interner: &Interner) -> String {
        match self {
            Self::PushConstant(term) => format!("push_constant {}", interner.format_term(term)),
            Self::CreateCompound(tag) => format!("create_compound {}", interner.tag_indicator(*tag)),
            Self::Call(tag) => format!("call {}", interner.tag_indicator(*tag)),
            other => format!("{:?}", other),
        }
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(opcode) = self.opcode() else {
            if let Self::Label(label) = self {
                return write!(f, "L{}:", label.0);
            }
            return Ok(());
        };
        let name = opcode.mnemonic();
        match self {
            Self::PushConstant(term) => write!(f, "{} {:?}", name, term),
            Self::PushArgument(n)
            | Self::PushEnvironment(n)
            | Self::Allocate(n)
            | Self::StoreEnvironment(n)
            | Self::Cut(n)
            | Self::SaveCut(n) => write!(f, "{} {}", name, n),
            Self::CreateCompound(tag) | Self::Call(tag) => write!(f, "{} {:?}", name, tag),
            Self::Jump(label) | Self::TryMeElse(label) | Self::RetryMeElse(label) => {
                write!(f, "{} L{}", name, label.0)
            }
            _ => f.write_str(name),
        }
    }
}

/// A protected range in symbolic form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolicHandler {
    pub start: Label,
    pub end: Label,
    pub handler: Label,
    pub barrier_slot: u16,
}

/// The symbolic program for one predicate
#[derive(Debug, Clone)]
pub struct Program {
    pub name: String,
    pub arity: u16,
    pub env_size: u16,
    pub instructions: Vec<Instruction>,
    /// Innermost first
    pub handlers: Vec<SymbolicHandler>,
}

impl Program {
    /// The instructions without label markers
    pub fn opcodes(&self) -> Vec<Opcode> {
        self.instructions.iter().filter_map(Instruction::opcode).collect()
    }
}
