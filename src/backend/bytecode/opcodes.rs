//! Bytecode opcodes for the clause VM
//!
//! Opcodes are grouped by category and assigned contiguous ranges.
//! Operands follow the opcode byte in big-endian order: slot, argument,
//! tag and constant indices are 2 bytes, jump targets are 4-byte absolute
//! offsets.

/// Bytecode opcode enumeration
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // === Operand Stack (0x00-0x0F) ===
    /// Discard top of stack
    Pop = 0x01,
    /// Duplicate top of stack
    Dup = 0x02,

    // === Term Construction (0x10-0x2F) ===
    /// Push a constant, index is next 2 bytes
    PushConstant = 0x10,
    /// Push a call argument, index is next 2 bytes
    PushArgument = 0x11,
    /// Push the term in an environment slot, slot is next 2 bytes
    PushEnvironment = 0x12,
    /// Push a fresh unbound variable
    CreateVariable = 0x13,
    /// Pop arity args and push a compound, tag index is next 2 bytes
    CreateCompound = 0x14,

    // === Environment (0x30-0x3F) ===
    /// Size the environment, slot count is next 2 bytes
    Allocate = 0x30,
    /// Pop into an environment slot, slot is next 2 bytes
    StoreEnvironment = 0x31,

    // === Control Flow (0x50-0x6F) ===
    /// Unconditional jump, absolute target is next 4 bytes
    Jump = 0x50,
    /// Pop arity args and call by tag, tag index is next 2 bytes
    Call = 0x60,
    /// Leave the activation
    Return = 0x61,
    /// Succeed (no-op)
    True = 0x62,

    // === Unification (0x80-0x8F) ===
    /// Pop two terms and unify them, backtracking on failure
    Unify = 0x80,

    // === Nondeterminism (0xF0-0xF7) ===
    /// Push an alternative resuming at the target, next 4 bytes
    TryMeElse = 0xF0,
    /// Push the next alternative after a backtrack, next 4 bytes
    RetryMeElse = 0xF1,
    /// Commit to the last alternative
    TrustMe = 0xF2,
    /// Backtrack
    Fail = 0xF3,
    /// Cut to the barrier in a slot, slot is next 2 bytes
    Cut = 0xF4,
    /// Save a cut barrier into a slot, slot is next 2 bytes
    SaveCut = 0xF5,

    // === Exceptions (0xF8-0xFF) ===
    /// Pop a term and throw it
    Throw = 0xF8,
}

impl Opcode {
    /// Convert byte to opcode, returns None if invalid
    #[inline]
    pub fn from_byte(byte: u8) -> Option<Self> {
        OPCODE_TABLE.get(byte as usize).copied().flatten()
    }

    /// Convert opcode to byte
    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Get the number of immediate bytes following this opcode
    #[inline]
    pub fn immediate_size(self) -> usize {
        match self {
            Self::Pop
            | Self::Dup
            | Self::CreateVariable
            | Self::Return
            | Self::True
            | Self::Unify
            | Self::TrustMe
            | Self::Fail
            | Self::Throw => 0,

            Self::PushConstant
            | Self::PushArgument
            | Self::PushEnvironment
            | Self::CreateCompound
            | Self::Allocate
            | Self::StoreEnvironment
            | Self::Call
            | Self::Cut
            | Self::SaveCut => 2,

            Self::Jump | Self::TryMeElse | Self::RetryMeElse => 4,
        }
    }

    /// Check if this opcode takes a jump target
    #[inline]
    pub fn is_jump(self) -> bool {
        matches!(self, Self::Jump | Self::TryMeElse | Self::RetryMeElse)
    }

    /// Check if this opcode references the tag table
    #[inline]
    pub fn uses_tag(self) -> bool {
        matches!(self, Self::Call | Self::CreateCompound)
    }

    /// Check if control never falls through to the next instruction
    #[inline]
    pub fn is_terminator(self) -> bool {
        matches!(self, Self::Jump | Self::Return | Self::Fail | Self::Throw)
    }

    /// Get the mnemonic name for this opcode
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Pop => "pop",
            Self::Dup => "dup",
            Self::PushConstant => "push_constant",
            Self::PushArgument => "push_argument",
            Self::PushEnvironment => "push_environment",
            Self::CreateVariable => "create_variable",
            Self::CreateCompound => "create_compound",
            Self::Allocate => "allocate",
            Self::StoreEnvironment => "store_environment",
            Self::Jump => "jump",
            Self::Call => "call",
            Self::Return => "return",
            Self::True => "true",
            Self::Unify => "unify",
            Self::TryMeElse => "try_me_else",
            Self::RetryMeElse => "retry_me_else",
            Self::TrustMe => "trust_me",
            Self::Fail => "fail",
            Self::Cut => "cut",
            Self::SaveCut => "save_cut",
            Self::Throw => "throw",
        }
    }
}

/// Lookup table for byte -> opcode conversion
static OPCODE_TABLE: [Option<Opcode>; 256] = {
    let mut table = [None; 256];

    table[0x01] = Some(Opcode::Pop);
    table[0x02] = Some(Opcode::Dup);

    table[0x10] = Some(Opcode::PushConstant);
    table[0x11] = Some(Opcode::PushArgument);
    table[0x12] = Some(Opcode::PushEnvironment);
    table[0x13] = Some(Opcode::CreateVariable);
    table[0x14] = Some(Opcode::CreateCompound);

    table[0x30] = Some(Opcode::Allocate);
    table[0x31] = Some(Opcode::StoreEnvironment);

    table[0x50] = Some(Opcode::Jump);
    table[0x60] = Some(Opcode::Call);
    table[0x61] = Some(Opcode::Return);
    table[0x62] = Some(Opcode::True);

    table[0x80] = Some(Opcode::Unify);

    table[0xF0] = Some(Opcode::TryMeElse);
    table[0xF1] = Some(Opcode::RetryMeElse);
    table[0xF2] = Some(Opcode::TrustMe);
    table[0xF3] = Some(Opcode::Fail);
    table[0xF4] = Some(Opcode::Cut);
    table[0xF5] = Some(Opcode::SaveCut);

    table[0xF8] = Some(Opcode::Throw);

    table
};

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Opcode; 21] = [
        Opcode::Pop,
        Opcode::Dup,
        Opcode::PushConstant,
        Opcode::PushArgument,
        Opcode::PushEnvironment,
        Opcode::CreateVariable,
        Opcode::CreateCompound,
        Opcode::Allocate,
        Opcode::StoreEnvironment,
        Opcode::Jump,
        Opcode::Call,
        Opcode::Return,
        Opcode::True,
        Opcode::Unify,
        Opcode::TryMeElse,
        Opcode::RetryMeElse,
        Opcode::TrustMe,
        Opcode::Fail,
        Opcode::Cut,
        Opcode::SaveCut,
        Opcode::Throw,
    ];

    #[test]
    fn test_opcode_table_matches_discriminants() {
        for op in ALL {
            let decoded = Opcode::from_byte(op.to_byte()).expect("Should decode valid opcode");
            assert_eq!(op, decoded, "Opcode {:?} table entry is wrong", op);
        }
        let defined = (0..=255u8).filter(|b| Opcode::from_byte(*b).is_some()).count();
        assert_eq!(defined, ALL.len());
    }

    #[test]
    fn test_invalid_opcode() {
        assert!(Opcode::from_byte(0x00).is_none());
        assert!(Opcode::from_byte(0xFF).is_none());
    }

    #[test]
    fn test_immediate_sizes() {
        assert_eq!(Opcode::Return.immediate_size(), 0);
        assert_eq!(Opcode::Call.immediate_size(), 2);
        assert_eq!(Opcode::TryMeElse.immediate_size(), 4);
    }

    #[test]
    fn test_opcode_categories() {
        assert!(Opcode::RetryMeElse.is_jump());
        assert!(!Opcode::Call.is_jump());
        assert!(Opcode::CreateCompound.uses_tag());
        assert!(Opcode::Throw.is_terminator());
        assert!(!Opcode::TrustMe.is_terminator());
    }

    #[test]
    fn test_mnemonic() {
        assert_eq!(Opcode::TryMeElse.mnemonic(), "try_me_else");
        assert_eq!(Opcode::StoreEnvironment.mnemonic(), "store_environment");
    }
}
