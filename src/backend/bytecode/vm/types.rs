//! Type definitions for the bytecode VM.
//!
//! - VmError: interpreter faults (malformed code, exhausted operand stack)
//! - Interrupt: everything that stops straight-line execution of an
//!   activation other than failure
//! - VmResult: result type threaded through the instruction handlers

use crate::backend::errors::{PrologError, Signal};

/// Result of VM execution
pub type VmResult<T> = Result<T, Interrupt>;

/// Errors that can occur during VM execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Operand stack underflow
    StackUnderflow,
    /// Operand stack exceeded `max_operand_stack`
    OperandStackOverflow,
    /// Invalid opcode byte
    InvalidOpcode(u8),
    /// Invalid constant index
    InvalidConstant(u16),
    /// Invalid tag index
    InvalidTag(u16),
    /// Environment slot out of range
    InvalidSlot(u16),
    /// Argument index out of range
    InvalidArgument(u16),
    /// Environment slot read before it was written, or of the wrong kind
    SlotKind { slot: u16, expected: &'static str },
    /// Instruction pointer out of bounds
    IpOutOfBounds,
    /// retry_me_else / trust_me without an alternative on top
    NoAlternative,
    /// Redo requested but the activation left no exit marker
    NoFrameExit,
    /// The activation's entry marker is missing from the choice stack
    FrameCorrupted,
}

impl std::fmt::Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StackUnderflow => write!(f, "Stack underflow"),
            Self::OperandStackOverflow => write!(f, "Operand stack overflow"),
            Self::InvalidOpcode(b) => write!(f, "Invalid opcode: 0x{:02x}", b),
            Self::InvalidConstant(i) => write!(f, "Invalid constant index: {}", i),
            Self::InvalidTag(i) => write!(f, "Invalid tag index: {}", i),
            Self::InvalidSlot(i) => write!(f, "Invalid environment slot: {}", i),
            Self::InvalidArgument(i) => write!(f, "Invalid argument index: {}", i),
            Self::SlotKind { slot, expected } => {
                write!(f, "Environment slot {} does not hold a {}", slot, expected)
            }
            Self::IpOutOfBounds => write!(f, "Instruction pointer out of bounds"),
            Self::NoAlternative => write!(f, "No alternative on the choice stack"),
            Self::NoFrameExit => write!(f, "No frame exit marker to resume"),
            Self::FrameCorrupted => write!(f, "Frame entry marker missing"),
        }
    }
}

impl std::error::Error for VmError {}

/// Why an activation stopped executing instructions in sequence
#[derive(Debug, Clone)]
pub enum Interrupt {
    /// A thrown ball or a halt request
    Signal(Signal),
    /// An interpreter fault, thrown as `error(system_error(Msg), _)`
    Fault(VmError),
}

impl From<Signal> for Interrupt {
    fn from(signal: Signal) -> Self {
        Interrupt::Signal(signal)
    }
}

impl From<VmError> for Interrupt {
    fn from(err: VmError) -> Self {
        Interrupt::Fault(err)
    }
}

impl From<PrologError> for Interrupt {
    fn from(err: PrologError) -> Self {
        Interrupt::Signal(err.into())
    }
}
