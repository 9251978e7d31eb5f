//! Compiler error types for the clause compiler.

use crate::backend::errors::PrologError;
use crate::backend::models::Term;
use crate::backend::symbol::Interner;

/// Compiler error types
#[derive(Debug, Clone)]
pub enum CompileError {
    /// A body goal that is neither a variable nor callable
    NotCallable(Term),
    /// Clause head is a variable or not callable
    InvalidHead(Term),
    /// Too many constants in chunk
    TooManyConstants,
    /// Too many distinct tags in chunk
    TooManyTags,
    /// Environment larger than a slot operand can address
    TooManySlots,
    /// More arguments than an argument operand can address
    TooManyArguments,
    /// Code offset does not fit a jump operand
    CodeTooLarge,
    /// A jump refers to a label that was never placed
    UnboundLabel(u32),
    /// A variable reached codegen without an assigned slot
    VariableNotFound(u64),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotCallable(goal) => write!(f, "Goal is not callable: {:?}", goal),
            Self::InvalidHead(head) => write!(f, "Invalid clause head: {:?}", head),
            Self::TooManyConstants => write!(f, "Too many constants (max 65535)"),
            Self::TooManyTags => write!(f, "Too many distinct functors (max 65535)"),
            Self::TooManySlots => write!(f, "Too many environment slots (max 65535)"),
            Self::TooManyArguments => write!(f, "Too many arguments (max 65535)"),
            Self::CodeTooLarge => write!(f, "Compiled code exceeds 4 GiB"),
            Self::UnboundLabel(label) => write!(f, "Label L{} was never placed", label),
            Self::VariableNotFound(id) => write!(f, "Variable _G{} has no slot", id),
        }
    }
}

impl std::error::Error for CompileError {}

impl CompileError {
    /// The error term a failed compilation throws
    pub fn to_prolog_error(&self, interner: &Interner) -> PrologError {
        match self {
            Self::NotCallable(goal) => PrologError::type_error(interner, "callable", goal),
            Self::InvalidHead(head) if head.is_var() => PrologError::instantiation_error(interner),
            Self::InvalidHead(head) => PrologError::type_error(interner, "callable", head),
            Self::TooManyConstants => PrologError::resource_error(interner, "constants"),
            Self::TooManyTags => PrologError::resource_error(interner, "functors"),
            Self::TooManySlots => PrologError::resource_error(interner, "environment"),
            Self::TooManyArguments => PrologError::representation_error(interner, "max_arity"),
            Self::CodeTooLarge => PrologError::resource_error(interner, "code"),
            Self::UnboundLabel(_) | Self::VariableNotFound(_) => {
                PrologError::system_error(interner, &self.to_string())
            }
        }
    }
}

/// Result type for compilation
pub type CompileResult<T> = Result<T, CompileError>;
