// Rask Bytecode Instructions

use serde::{Deserialize, Serialize};

/// Bytecode operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum OpCode {
    // Stack operations
    PopTop, // Pop top of stack
    DupTop, // Duplicate top of stack

    // Literal loads
    LoadConst,     // Push constant-pool entry
    LoadZero,      // Push the canonical number zero
    LoadTrue,      // Push true
    LoadFalse,     // Push false
    LoadNull,      // Push null
    LoadUndefined, // Push undefined

    // Unary operators
    UnaryPositive, // +a
    UnaryNegative, // -a
    UnaryNot,      // !a
    UnaryInvert,   // ~a
    UnaryTypeof,   // typeof a

    // Binary arithmetic
    BinaryPower,      // a ** b
    BinaryMultiply,   // a * b
    BinaryModulo,     // a % b
    BinaryAdd,        // a + b
    BinarySubtract,   // a - b
    BinaryTrueDivide, // a / b
    BinaryInc,        // a + 1 (prefix/postfix helper)
    BinaryDec,        // a - 1

    // Bitwise and shifts
    BinaryLshift,  // a << b
    BinaryRshift,  // a >> b
    BinaryUrshift, // a >>> b
    BinaryAnd,     // a & b
    BinaryXor,     // a ^ b
    BinaryOr,      // a | b

    // Comparisons
    CompareLess,           // a < b
    CompareLessEqual,      // a <= b
    CompareGreater,        // a > b
    CompareGreaterEqual,   // a >= b
    CompareEqual,          // a == b
    CompareNotEqual,       // a != b
    CompareStrictEqual,    // a === b
    CompareStrictNotEqual, // a !== b

    // Name storage and load, one pair per storage class
    StoreName,   // Bind local name in current environment
    LoadName,    // Load local name (walks frames outward)
    StoreGlobal, // Bind name in the global environment
    LoadGlobal,  // Load name from the global environment
    StoreFast,   // Bind fast-local name in current environment
    LoadFast,    // Load fast-local name from current environment
    StoreDeref,  // Write into the bound closure-capture object
    LoadDeref,   // Read from the bound closure-capture object
    LoadClosure, // Load current binding of a captured spelling (for MakeFunction)

    // Control transfer
    JumpAbsolute,      // Unconditional jump to instruction index
    JumpForward,       // Relative jump: target = own index + 2 + operand
    JumpIfFalseOrPop,  // Short-circuit and: keep falsy, pop truthy
    JumpIfTrueOrPop,   // Short-circuit or: keep truthy, pop falsy
    PopJumpIfFalse,    // Pop, jump when falsy
    PopJumpIfTrue,     // Pop, jump when truthy

    // Aggregates
    BuildList, // Build array from N stack elements
    BuildMap,  // Build object from N key-value pairs

    // Attributes and subscripts
    LoadAttr,     // obj.name
    StoreAttr,    // obj.name = value
    BinarySubscr, // obj[index]
    StoreSubscr,  // obj[index] = value
    LoadMethod,   // Push bound method and receiver for CallMethod

    // Functions
    MakeFunction,   // Materialize function value from a unit template
    CallFunction,   // Call with N positional arguments
    CallMethod,     // Call with N arguments and a bound receiver
    CallFunctionEx, // Call with an argument array (variadic form)
    ReturnValue,    // Pop result, return to caller
}

impl OpCode {
    /// Number of integer operands this opcode carries.
    pub fn operand_count(&self) -> usize {
        match self {
            OpCode::LoadConst
            | OpCode::StoreName
            | OpCode::LoadName
            | OpCode::StoreGlobal
            | OpCode::LoadGlobal
            | OpCode::StoreFast
            | OpCode::LoadFast
            | OpCode::StoreDeref
            | OpCode::LoadDeref
            | OpCode::LoadClosure
            | OpCode::JumpAbsolute
            | OpCode::JumpForward
            | OpCode::JumpIfFalseOrPop
            | OpCode::JumpIfTrueOrPop
            | OpCode::PopJumpIfFalse
            | OpCode::PopJumpIfTrue
            | OpCode::BuildList
            | OpCode::BuildMap
            | OpCode::LoadAttr
            | OpCode::StoreAttr
            | OpCode::LoadMethod
            | OpCode::CallFunction
            | OpCode::CallMethod => 1,
            OpCode::MakeFunction => 2,
            _ => 0,
        }
    }

    /// Printable name, matching the disassembler column.
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::PopTop => "POP_TOP",
            OpCode::DupTop => "DUP_TOP",
            OpCode::LoadConst => "LOAD_CONST",
            OpCode::LoadZero => "LOAD_ZERO",
            OpCode::LoadTrue => "LOAD_TRUE",
            OpCode::LoadFalse => "LOAD_FALSE",
            OpCode::LoadNull => "LOAD_NULL",
            OpCode::LoadUndefined => "LOAD_UNDEFINED",
            OpCode::UnaryPositive => "UNARY_POSITIVE",
            OpCode::UnaryNegative => "UNARY_NEGATIVE",
            OpCode::UnaryNot => "UNARY_NOT",
            OpCode::UnaryInvert => "UNARY_INVERT",
            OpCode::UnaryTypeof => "UNARY_TYPEOF",
            OpCode::BinaryPower => "BINARY_POWER",
            OpCode::BinaryMultiply => "BINARY_MULTIPLY",
            OpCode::BinaryModulo => "BINARY_MODULO",
            OpCode::BinaryAdd => "BINARY_ADD",
            OpCode::BinarySubtract => "BINARY_SUBTRACT",
            OpCode::BinaryTrueDivide => "BINARY_TRUE_DIVIDE",
            OpCode::BinaryInc => "BINARY_INC",
            OpCode::BinaryDec => "BINARY_DEC",
            OpCode::BinaryLshift => "BINARY_LSHIFT",
            OpCode::BinaryRshift => "BINARY_RSHIFT",
            OpCode::BinaryUrshift => "BINARY_URSHIFT",
            OpCode::BinaryAnd => "BINARY_AND",
            OpCode::BinaryXor => "BINARY_XOR",
            OpCode::BinaryOr => "BINARY_OR",
            OpCode::CompareLess => "COMPARE_LESS",
            OpCode::CompareLessEqual => "COMPARE_LESS_EQUAL",
            OpCode::CompareGreater => "COMPARE_GREATER",
            OpCode::CompareGreaterEqual => "COMPARE_GREATER_EQUAL",
            OpCode::CompareEqual => "COMPARE_EQUAL",
            OpCode::CompareNotEqual => "COMPARE_NOT_EQUAL",
            OpCode::CompareStrictEqual => "COMPARE_STRICT_EQUAL",
            OpCode::CompareStrictNotEqual => "COMPARE_STRICT_NOT_EQUAL",
            OpCode::StoreName => "STORE_NAME",
            OpCode::LoadName => "LOAD_NAME",
            OpCode::StoreGlobal => "STORE_GLOBAL",
            OpCode::LoadGlobal => "LOAD_GLOBAL",
            OpCode::StoreFast => "STORE_FAST",
            OpCode::LoadFast => "LOAD_FAST",
            OpCode::StoreDeref => "STORE_DEREF",
            OpCode::LoadDeref => "LOAD_DEREF",
            OpCode::LoadClosure => "LOAD_CLOSURE",
            OpCode::JumpAbsolute => "JUMP_ABSOLUTE",
            OpCode::JumpForward => "JUMP_FORWARD",
            OpCode::JumpIfFalseOrPop => "JUMP_IF_FALSE_OR_POP",
            OpCode::JumpIfTrueOrPop => "JUMP_IF_TRUE_OR_POP",
            OpCode::PopJumpIfFalse => "POP_JUMP_IF_FALSE",
            OpCode::PopJumpIfTrue => "POP_JUMP_IF_TRUE",
            OpCode::BuildList => "BUILD_LIST",
            OpCode::BuildMap => "BUILD_MAP",
            OpCode::LoadAttr => "LOAD_ATTR",
            OpCode::StoreAttr => "STORE_ATTR",
            OpCode::BinarySubscr => "BINARY_SUBSCR",
            OpCode::StoreSubscr => "STORE_SUBSCR",
            OpCode::LoadMethod => "LOAD_METHOD",
            OpCode::MakeFunction => "MAKE_FUNCTION",
            OpCode::CallFunction => "CALL_FUNCTION",
            OpCode::CallMethod => "CALL_METHOD",
            OpCode::CallFunctionEx => "CALL_FUNCTION_EX",
            OpCode::ReturnValue => "RETURN_VALUE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_counts() {
        assert_eq!(OpCode::BinaryAdd.operand_count(), 0);
        assert_eq!(OpCode::LoadConst.operand_count(), 1);
        assert_eq!(OpCode::JumpForward.operand_count(), 1);
        assert_eq!(OpCode::MakeFunction.operand_count(), 2);
    }
}
