//! Bytecode chunk representation
//!
//! A BytecodeChunk is the compiled form of one predicate: the instruction
//! stream, its side tables (tags, constants, call-site caches) and the
//! exception-handler ranges.

use std::collections::HashMap;

use crate::backend::models::Term;
use crate::backend::symbol::{Atom, Interner, Tag};

use super::cache::CallSiteCache;
use super::compiler::{CompileError, CompileResult};
use super::opcodes::Opcode;

/// A protected instruction range and the handler guarding it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerRange {
    /// First protected offset
    pub start: u32,
    /// One past the last protected offset
    pub end: u32,
    /// Handler entry point
    pub handler: u32,
    /// Slot holding the cut barrier saved when the range was entered
    pub barrier_slot: u16,
}

impl HandlerRange {
    #[inline]
    pub fn covers(&self, offset: usize) -> bool {
        (self.start as usize) <= offset && offset < (self.end as usize)
    }
}

/// A compiled bytecode chunk
///
/// Chunks are immutable after compilation and shared across engines; only
/// the call-site caches change, behind their own locks.
#[derive(Debug)]
pub struct BytecodeChunk {
    /// The bytecode instructions
    code: Vec<u8>,

    /// Predicate/functor tags used by call and create_compound
    tags: Vec<Tag>,

    /// One lazily filled resolution cache per tag
    call_sites: Box<[CallSiteCache]>,

    /// Constant pool
    constants: Vec<Term>,

    /// Handler ranges, innermost first
    handlers: Vec<HandlerRange>,

    /// Name of this chunk (for debugging)
    name: String,

    /// Number of environment slots
    env_size: u16,

    /// Number of call arguments
    arity: u16,
}

/// Position of a jump operand to patch once its target is known
#[derive(Debug, Clone, Copy)]
pub struct JumpLabel {
    offset: usize,
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum ConstantKey {
    Atom(Atom),
    Integer(i64),
    Float(u64),
}

impl ConstantKey {
    fn of(term: &Term) -> Option<ConstantKey> {
        match term {
            Term::Atom(a) => Some(ConstantKey::Atom(*a)),
            Term::Integer(n) => Some(ConstantKey::Integer(*n)),
            Term::Float(f) => Some(ConstantKey::Float(f.to_bits())),
            _ => None,
        }
    }
}

/// Builder for constructing BytecodeChunks
#[derive(Debug)]
pub struct ChunkBuilder {
    code: Vec<u8>,
    tags: Vec<Tag>,
    tag_index: HashMap<Tag, u16>,
    constants: Vec<Term>,
    constant_index: HashMap<ConstantKey, u16>,
    handlers: Vec<HandlerRange>,
    name: String,
    env_size: u16,
    arity: u16,
}

impl BytecodeChunk {
    /// Create a builder for constructing a chunk
    pub fn builder(name: impl Into<String>) -> ChunkBuilder {
        ChunkBuilder::new(name)
    }

    /// Get the bytecode instructions
    #[inline]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Get the length of the bytecode
    #[inline]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Check if the chunk is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Get a byte at the given offset
    #[inline]
    pub fn read_byte(&self, offset: usize) -> Option<u8> {
        self.code.get(offset).copied()
    }

    /// Get an opcode at the given offset
    #[inline]
    pub fn read_opcode(&self, offset: usize) -> Option<Opcode> {
        self.code.get(offset).and_then(|&b| Opcode::from_byte(b))
    }

    /// Read a u16 from the bytecode (big-endian)
    #[inline]
    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        let bytes = self.code.get(offset..offset + 2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Read a u32 from the bytecode (big-endian)
    #[inline]
    pub fn read_u32(&self, offset: usize) -> Option<u32> {
        let bytes = self.code.get(offset..offset + 4)?;
        Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Get a constant from the pool
    #[inline]
    pub fn get_constant(&self, index: u16) -> Option<&Term> {
        self.constants.get(index as usize)
    }

    /// Get the number of constants
    #[inline]
    pub fn constant_count(&self) -> usize {
        self.constants.len()
    }

    /// Get a tag from the tag table
    #[inline]
    pub fn get_tag(&self, index: u16) -> Option<Tag> {
        self.tags.get(index as usize).copied()
    }

    /// Get the number of distinct tags
    #[inline]
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// The resolution cache belonging to a tag index
    #[inline]
    pub fn call_site(&self, index: u16) -> Option<&CallSiteCache> {
        self.call_sites.get(index as usize)
    }

    /// Handler ranges, innermost first
    #[inline]
    pub fn handlers(&self) -> &[HandlerRange] {
        &self.handlers
    }

    /// The innermost handler range covering an instruction offset
    pub fn handler_for(&self, offset: usize) -> Option<&HandlerRange> {
        self.handlers.iter().find(|range| range.covers(offset))
    }

    /// Get the chunk name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of environment slots
    #[inline]
    pub fn env_size(&self) -> u16 {
        self.env_size
    }

    /// Get the arity
    #[inline]
    pub fn arity(&self) -> u16 {
        self.arity
    }

    /// Disassemble the chunk to a string
    pub fn disassemble(&self, interner: &Interner) -> String {
        let mut output = String::new();
        output.push_str(&format!("=== {} ===\n", self.name));
        output.push_str(&format!(
            "env: {}, arity: {}, tags: {}, constants: {}\n",
            self.env_size,
            self.arity,
            self.tags.len(),
            self.constants.len()
        ));
        for range in &self.handlers {
            output.push_str(&format!(
                "handler [{:04x}, {:04x}) -> {:04x} barrier={}\n",
                range.start, range.end, range.handler, range.barrier_slot
            ));
        }

        let mut offset = 0;
        while offset < self.code.len() {
            let (disasm, next_offset) = self.disassemble_instruction(interner, offset);
            output.push_str(&format!("{:04x} {}\n", offset, disasm));
            offset = next_offset;
        }

        output
    }

    /// Disassemble a single instruction, returns (string, next_offset)
    pub fn disassemble_instruction(&self, interner: &Interner, offset: usize) -> (String, usize) {
        let Some(opcode) = self.read_opcode(offset) else {
            return (
                format!("??? (0x{:02x})", self.code.get(offset).copied().unwrap_or(0)),
                offset + 1,
            );
        };

        let mnemonic = opcode.mnemonic();
        let next_offset = offset + 1 + opcode.immediate_size();

        let operand_str = match opcode.immediate_size() {
            0 => String::new(),
            2 => {
                let value = self.read_u16(offset + 1).unwrap_or(0);
                match opcode {
                    Opcode::Call | Opcode::CreateCompound => {
                        let tag_str = self
                            .get_tag(value)
                            .map(|t| interner.tag_indicator(t))
                            .unwrap_or_else(|| "???".to_string());
                        format!(" #{} ({})", value, tag_str)
                    }
                    Opcode::PushConstant => {
                        let const_str = self
                            .get_constant(value)
                            .map(|c| interner.format_term(c))
                            .unwrap_or_else(|| "???".to_string());
                        format!(" #{} ({})", value, const_str)
                    }
                    _ => format!(" {}", value),
                }
            }
            4 => {
                let target = self.read_u32(offset + 1).unwrap_or(0);
                format!(" -> {:04x}", target)
            }
            _ => String::new(),
        };

        (format!("{}{}", mnemonic, operand_str), next_offset)
    }
}

impl ChunkBuilder {
    /// Create a new chunk builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            code: Vec::with_capacity(128),
            tags: Vec::new(),
            tag_index: HashMap::new(),
            constants: Vec::new(),
            constant_index: HashMap::new(),
            handlers: Vec::new(),
            name: name.into(),
            env_size: 0,
            arity: 0,
        }
    }

    /// Set the number of environment slots
    pub fn set_env_size(&mut self, size: u16) {
        self.env_size = size;
    }

    /// Set the arity
    pub fn set_arity(&mut self, arity: u16) {
        self.arity = arity;
    }

    /// Get the current bytecode offset
    #[inline]
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    /// Emit a single opcode
    pub fn emit(&mut self, opcode: Opcode) {
        debug_assert_eq!(opcode.immediate_size(), 0);
        self.code.push(opcode.to_byte());
    }

    /// Emit an opcode with a 2-byte operand (big-endian)
    pub fn emit_u16(&mut self, opcode: Opcode, operand: u16) {
        debug_assert_eq!(opcode.immediate_size(), 2);
        self.code.push(opcode.to_byte());
        self.code.extend_from_slice(&operand.to_be_bytes());
    }

    /// Emit an opcode with a 4-byte operand (big-endian)
    pub fn emit_u32(&mut self, opcode: Opcode, operand: u32) {
        debug_assert_eq!(opcode.immediate_size(), 4);
        self.code.push(opcode.to_byte());
        self.code.extend_from_slice(&operand.to_be_bytes());
    }

    /// Emit a jump whose target is not known yet
    pub fn emit_jump(&mut self, opcode: Opcode) -> JumpLabel {
        debug_assert!(opcode.is_jump());
        let offset = self.code.len();
        self.code.push(opcode.to_byte());
        // Placeholder for jump target
        self.code.extend_from_slice(&[0xFF; 4]);
        JumpLabel { offset: offset + 1 }
    }

    /// Patch a jump label with an absolute target
    pub fn patch_jump(&mut self, label: JumpLabel, target: usize) -> CompileResult<()> {
        let target = u32::try_from(target).map_err(|_| CompileError::CodeTooLarge)?;
        self.code[label.offset..label.offset + 4].copy_from_slice(&target.to_be_bytes());
        Ok(())
    }

    /// Add a tag to the tag table, returns its index
    pub fn add_tag(&mut self, tag: Tag) -> CompileResult<u16> {
        if let Some(&index) = self.tag_index.get(&tag) {
            return Ok(index);
        }
        let index = u16::try_from(self.tags.len()).map_err(|_| CompileError::TooManyTags)?;
        self.tags.push(tag);
        self.tag_index.insert(tag, index);
        Ok(index)
    }

    /// Add a constant to the pool, returns its index.
    ///
    /// Atoms, integers and floats are deduplicated.
    pub fn add_constant(&mut self, value: Term) -> CompileResult<u16> {
        let key = ConstantKey::of(&value);
        if let Some(index) = key.as_ref().and_then(|k| self.constant_index.get(k)) {
            return Ok(*index);
        }
        let index =
            u16::try_from(self.constants.len()).map_err(|_| CompileError::TooManyConstants)?;
        self.constants.push(value);
        if let Some(key) = key {
            self.constant_index.insert(key, index);
        }
        Ok(index)
    }

    /// Register a handler range; inner ranges must be added first
    pub fn add_handler(&mut self, range: HandlerRange) {
        self.handlers.push(range);
    }

    /// Build the chunk
    pub fn build(self) -> BytecodeChunk {
        let call_sites = self.tags.iter().map(|_| CallSiteCache::default()).collect();
        BytecodeChunk {
            code: self.code,
            tags: self.tags,
            call_sites,
            constants: self.constants,
            handlers: self.handlers,
            name: self.name,
            env_size: self.env_size,
            arity: self.arity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operands_are_big_endian() {
        let mut builder = ChunkBuilder::new("test");
        builder.emit_u16(Opcode::Allocate, 0x0102);
        builder.emit_u32(Opcode::Jump, 0x0A0B0C0D);
        let chunk = builder.build();

        assert_eq!(chunk.code(), &[0x30, 0x01, 0x02, 0x50, 0x0A, 0x0B, 0x0C, 0x0D]);
        assert_eq!(chunk.read_u16(1), Some(0x0102));
        assert_eq!(chunk.read_u32(4), Some(0x0A0B0C0D));
        assert_eq!(chunk.read_u32(5), None);
    }

    #[test]
    fn test_patch_jump() {
        let mut builder = ChunkBuilder::new("test");
        let label = builder.emit_jump(Opcode::TryMeElse);
        builder.emit(Opcode::Fail);
        let target = builder.current_offset();
        builder.emit(Opcode::Return);
        builder.patch_jump(label, target).expect("fits");
        let chunk = builder.build();

        assert_eq!(chunk.read_u32(1), Some(6));
        assert_eq!(chunk.read_opcode(6), Some(Opcode::Return));
    }

    #[test]
    fn test_tags_and_constants_are_deduplicated() {
        let interner = Interner::new();
        let mut builder = ChunkBuilder::new("test");
        let f = interner.tag_named("f", 1);
        let g = interner.tag_named("g", 1);

        assert_eq!(builder.add_tag(f).ok(), Some(0));
        assert_eq!(builder.add_tag(g).ok(), Some(1));
        assert_eq!(builder.add_tag(f).ok(), Some(0));

        let a = Term::Atom(interner.atom("a"));
        assert_eq!(builder.add_constant(a.clone()).ok(), Some(0));
        assert_eq!(builder.add_constant(Term::Integer(7)).ok(), Some(1));
        assert_eq!(builder.add_constant(a).ok(), Some(0));

        let chunk = builder.build();
        assert_eq!(chunk.tag_count(), 2);
        assert!(chunk.call_site(1).is_some());
        assert_eq!(chunk.constant_count(), 2);
    }

    #[test]
    fn test_handler_lookup_prefers_innermost() {
        let mut builder = ChunkBuilder::new("test");
        let inner = HandlerRange {
            start: 10,
            end: 20,
            handler: 30,
            barrier_slot: 2,
        };
        let outer = HandlerRange {
            start: 5,
            end: 40,
            handler: 50,
            barrier_slot: 1,
        };
        builder.add_handler(inner);
        builder.add_handler(outer);
        let chunk = builder.build();

        assert_eq!(chunk.handler_for(12), Some(&inner));
        assert_eq!(chunk.handler_for(25), Some(&outer));
        assert_eq!(chunk.handler_for(40), None);
    }

    #[test]
    fn test_disassemble_names_tags() {
        let interner = Interner::new();
        let mut builder = ChunkBuilder::new("p/1");
        let tag = builder.add_tag(interner.tag_named("q", 1)).expect("room");
        builder.emit_u16(Opcode::PushArgument, 0);
        builder.emit_u16(Opcode::Call, tag);
        builder.emit(Opcode::Return);
        let text = builder.build().disassemble(&interner);

        assert!(text.contains("push_argument 0"));
        assert!(text.contains("call #0 (q/1)"));
        assert!(text.contains("return"));
    }
}
