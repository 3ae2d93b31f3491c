// Rask Virtual Machine Module
// Frame-stack interpreter, heap, coercion, and native functions

pub mod builtins;
pub mod frame;
pub mod heap;
pub mod ops;
pub mod value;
pub mod vm;

pub use builtins::{BuiltinCtx, BuiltinFlow, Host, NoopHost};
pub use heap::{GcStats, Heap};
pub use value::{Handle, Value, ValueKind};
pub use vm::Vm;
