//! Bytecode compilation and execution
//!
//! Clauses are compiled to a compact WAM-style instruction set and run by a
//! stack-based interpreter that cooperates with the engine's trail and
//! choice-point stack.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                 Clause list of one predicate                      │
//! └───────────────────────────────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                    Clause Compiler                                │
//! │   pass 1: slots and reserved barriers   pass 2: instructions      │
//! └───────────────────────────────────────────────────────────────────┘
//!                                 │  Program (symbolic, labels)
//!                                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                    Assembler                                      │
//! │     bytes + tag table + constants + handler ranges                │
//! └───────────────────────────────────────────────────────────────────┘
//!                                 │  BytecodeChunk
//!                                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                    Bytecode VM                                    │
//! │                                                                   │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────────────────┐  │
//! │  │ Operand     │  │ Environment │  │ Engine: trail and        │  │
//! │  │ Stack       │  │ Slots       │  │ choice-point stack       │  │
//! │  └─────────────┘  └─────────────┘  └──────────────────────────┘  │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`opcodes`]: instruction set (21 opcodes)
//! - [`chunk`]: `BytecodeChunk`, `ChunkBuilder` and the disassembler
//! - [`compiler`]: two-pass clause compiler
//! - [`assembler`]: symbolic program to chunk
//! - [`cache`]: compiled-code and call-site caches
//! - [`vm`]: the interpreter loop
//!
//! # Example
//!
//! ```
//! use horn::backend::bytecode::compile_predicate;
//! use horn::backend::{Clause, Interner, Term};
//!
//! let interner = Interner::new();
//! let p = interner.tag_named("p", 1);
//! let clauses: Vec<Clause> = (1..=2)
//!     .map(|n| Clause::fact(&interner, Term::compound(p, vec![Term::Integer(n)])))
//!     .collect();
//!
//! let chunk = compile_predicate(&interner, p, &clauses).expect("compiles");
//! let listing = chunk.disassemble(&interner);
//! assert!(listing.contains("try_me_else"));
//! assert!(listing.contains("trust_me"));
//! ```

pub mod assembler;
pub mod cache;
pub mod chunk;
pub mod compiler;
pub mod opcodes;
pub mod vm;

pub use assembler::assemble;
pub use cache::{CallSiteCache, CodeCache, CodeCacheStats};
pub use chunk::{BytecodeChunk, ChunkBuilder, HandlerRange, JumpLabel};
pub use compiler::{
    compile_predicate, compile_program, validate_clause, CompileError, CompileResult, Instruction,
    Label, Program,
};
pub use opcodes::Opcode;
pub use vm::{VmError, VmResult};
