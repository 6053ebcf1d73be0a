/*!
## Rust Machine Module

Code generation, the executable image, and the virtual machine that
runs it.

*/

/// Byte offset into the image.
pub type Address = usize;

/// Bytes in a machine word.
pub const WORD_SIZE: usize = 4;

mod arena;
mod asm;
mod codegen;
mod compile;
mod link;
mod listing;
mod opcode;
mod program;
mod runtime;
mod stack;
mod symbol;

pub use arena::{Arena, Mark};
pub use asm::Assembler;
pub use codegen::{codegen, place_symbol};
pub use compile::{compile, compile_with, Compiler, Config, PRELUDE};
pub use link::Label;
pub use listing::{Instruction, Listing};
pub use opcode::{Format, Opcode, TRAP_GET_CHAR, TRAP_PUT_CHAR};
pub use program::{CodeRange, Program, HEADER_SIZE};
pub use runtime::{Event, Runtime};
pub use stack::Stack;
pub use symbol::{StorageClass, Symbol, SymbolId, SymbolTable, Type};
