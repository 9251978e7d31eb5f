//! Assembler: symbolic [`Program`] to packed [`BytecodeChunk`].
//!
//! Labels are resolved in one pass: forward jumps are emitted with a
//! placeholder and patched once every label position is known. Tags and
//! constants go through the builder, which deduplicates them.

use std::collections::HashMap;

use super::chunk::{BytecodeChunk, ChunkBuilder, HandlerRange, JumpLabel};
use super::compiler::{CompileError, CompileResult, Instruction, Label, Program};
use super::opcodes::Opcode;

/// Assemble a symbolic program into a chunk
pub fn assemble(program: &Program) -> CompileResult<BytecodeChunk> {
    let mut builder = ChunkBuilder::new(program.name.clone());
    builder.set_env_size(program.env_size);
    builder.set_arity(program.arity);

    let mut positions: HashMap<Label, usize> = HashMap::new();
    let mut fixups: Vec<(JumpLabel, Label)> = Vec::new();

    for instruction in &program.instructions {
        match instruction {
            Instruction::Label(label) => {
                positions.insert(*label, builder.current_offset());
            }
            Instruction::PushConstant(term) => {
                let index = builder.add_constant(term.clone())?;
                builder.emit_u16(Opcode::PushConstant, index);
            }
            Instruction::CreateCompound(tag) | Instruction::Call(tag) => {
                let index = builder.add_tag(*tag)?;
                if let Some(opcode) = instruction.opcode() {
                    builder.emit_u16(opcode, index);
                }
            }
            Instruction::PushArgument(n)
            | Instruction::PushEnvironment(n)
            | Instruction::Allocate(n)
            | Instruction::StoreEnvironment(n)
            | Instruction::Cut(n)
            | Instruction::SaveCut(n) => {
                if let Some(opcode) = instruction.opcode() {
                    builder.emit_u16(opcode, *n);
                }
            }
            Instruction::Jump(label)
            | Instruction::TryMeElse(label)
            | Instruction::RetryMeElse(label) => {
                if let Some(opcode) = instruction.opcode() {
                    fixups.push((builder.emit_jump(opcode), *label));
                }
            }
            Instruction::Pop
            | Instruction::Dup
            | Instruction::CreateVariable
            | Instruction::Return
            | Instruction::True
            | Instruction::Unify
            | Instruction::TrustMe
            | Instruction::Fail
            | Instruction::Throw => {
                if let Some(opcode) = instruction.opcode() {
                    builder.emit(opcode);
                }
            }
        }
    }

    let resolve = |label: Label| -> CompileResult<usize> {
        positions
            .get(&label)
            .copied()
            .ok_or(CompileError::UnboundLabel(label.0))
    };

    for (jump, label) in fixups {
        builder.patch_jump(jump, resolve(label)?)?;
    }

    for handler in &program.handlers {
        let offset = |label| -> CompileResult<u32> {
            u32::try_from(resolve(label)?).map_err(|_| CompileError::CodeTooLarge)
        };
        builder.add_handler(HandlerRange {
            start: offset(handler.start)?,
            end: offset(handler.end)?,
            handler: offset(handler.handler)?,
            barrier_slot: handler.barrier_slot,
        });
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::bytecode::compiler::SymbolicHandler;
    use crate::backend::models::Term;
    use crate::backend::symbol::Interner;

    fn program(instructions: Vec<Instruction>, handlers: Vec<SymbolicHandler>) -> Program {
        Program {
            name: "test/0".to_string(),
            arity: 0,
            env_size: 2,
            instructions,
            handlers,
        }
    }

    #[test]
    fn test_forward_and_backward_labels() {
        let top = Label(0);
        let end = Label(1);
        let chunk = assemble(
            &program(
                vec![
                    Instruction::Label(top),
                    Instruction::TryMeElse(end),
                    Instruction::Jump(top),
                    Instruction::Label(end),
                    Instruction::Return,
                ],
                Vec::new(),
            ),
        )
        .expect("assembles");

        assert_eq!(chunk.read_u32(1), Some(10));
        assert_eq!(chunk.read_u32(6), Some(0));
        assert_eq!(chunk.read_opcode(10), Some(Opcode::Return));
        assert_eq!(chunk.env_size(), 2);
    }

    #[test]
    fn test_tags_shared_between_calls_and_compounds() {
        let interner = Interner::new();
        let f = interner.tag_named("f", 1);
        let chunk = assemble(
            &program(
                vec![
                    Instruction::PushConstant(Term::Integer(1)),
                    Instruction::CreateCompound(f),
                    Instruction::PushConstant(Term::Integer(1)),
                    Instruction::Call(f),
                    Instruction::Return,
                ],
                Vec::new(),
            ),
        )
        .expect("assembles");

        assert_eq!(chunk.tag_count(), 1);
        assert_eq!(chunk.constant_count(), 1);
    }

    #[test]
    fn test_unplaced_label_is_an_error() {
        let result = assemble(&program(vec![Instruction::Jump(Label(7))], Vec::new()));
        assert!(matches!(result, Err(CompileError::UnboundLabel(7))));
    }

    #[test]
    fn test_handler_offsets() {
        let (start, end, handler) = (Label(0), Label(1), Label(2));
        let chunk = assemble(
            &program(
                vec![
                    Instruction::SaveCut(1),
                    Instruction::Label(start),
                    Instruction::True,
                    Instruction::Label(end),
                    Instruction::Return,
                    Instruction::Label(handler),
                    Instruction::Throw,
                ],
                vec![SymbolicHandler {
                    start,
                    end,
                    handler,
                    barrier_slot: 1,
                }],
            ),
        )
        .expect("assembles");

        let range = chunk.handler_for(3).copied().expect("range covers true");
        assert_eq!((range.start, range.end, range.handler), (3, 4, 5));
        assert!(chunk.handler_for(4).is_none());
    }
}
