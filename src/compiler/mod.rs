// Rask Compiler Module
// Symbol resolution and bytecode generation over an external syntax tree

pub mod codegen;
pub mod opcode;
pub mod symbol;
pub mod unit;

pub use codegen::{compile, compile_body};
pub use opcode::OpCode;
pub use unit::{CodeUnit, Const, ConstPool, Instr, Program};
