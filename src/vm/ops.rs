// Rask Operator Semantics
// The pairwise implicit-coercion matrix: dispatch on the opcode first, then
// on the operand kinds, written out as exhaustive matches.

use crate::compiler::opcode::OpCode;
use crate::error::{RaskError, RaskResult};
use crate::vm::heap::Heap;
use crate::vm::value::{str_to_number, Handle, Value};

/// Truncation helper backing the bitwise operators: NaN and the infinities
/// become zero, everything else truncates toward zero.
pub fn fix(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        0.0
    } else {
        n.trunc()
    }
}

/// Two's-complement 32-bit view of a number, reduced modulo 2^32.
pub fn fix32(n: f64) -> i32 {
    let t = fix(n) % 4294967296.0;
    (t as i64) as u32 as i32
}

/// Shift counts are reduced modulo 32, with negative counts wrapped into
/// [0, 32).
pub fn shift_count(n: f64) -> u32 {
    let m = fix(n) % 32.0;
    let m = if m < 0.0 { m + 32.0 } else { m };
    m as u32
}

/// Numeric coercion of any value kind.
pub fn to_number(heap: &Heap, handle: Handle) -> f64 {
    match heap.get(handle) {
        Value::Number(n) => *n,
        Value::Str(s) => str_to_number(s).as_number(),
        Value::Boolean(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Null => 0.0,
        Value::Undefined => f64::NAN,
        // Arrays coerce through their rendered form: [] is 0, [5] is 5,
        // [1,2] is NaN.
        Value::Array(_) => str_to_number(&heap.render(handle)).as_number(),
        Value::Object(_) | Value::Function(_) | Value::Regex(_) => f64::NAN,
    }
}

/// Operand kinds that force `+` into concatenation.
fn is_textual(value: &Value) -> bool {
    matches!(
        value,
        Value::Str(_) | Value::Object(_) | Value::Array(_) | Value::Function(_) | Value::Regex(_)
    )
}

/// Apply a binary operator to two values, producing a new value (or, for the
/// zero-dividend division fast path, the left operand itself).
pub fn binary(heap: &mut Heap, op: OpCode, a: Handle, b: Handle) -> RaskResult<Handle> {
    match op {
        OpCode::BinaryAdd => Ok(add(heap, a, b)),
        OpCode::BinarySubtract => Ok(arith(heap, a, b, |x, y| x - y)),
        OpCode::BinaryMultiply => Ok(arith(heap, a, b, |x, y| x * y)),
        OpCode::BinaryModulo => Ok(arith(heap, a, b, |x, y| x % y)),
        OpCode::BinaryPower => Ok(arith(heap, a, b, f64::powf)),
        OpCode::BinaryTrueDivide => Ok(divide(heap, a, b)),

        OpCode::BinaryLshift => {
            let x = fix32(to_number(heap, a));
            let s = shift_count(to_number(heap, b));
            Ok(heap.number(x.wrapping_shl(s) as f64))
        }
        OpCode::BinaryRshift => {
            let x = fix32(to_number(heap, a));
            let s = shift_count(to_number(heap, b));
            Ok(heap.number(x.wrapping_shr(s) as f64))
        }
        OpCode::BinaryUrshift => {
            let x = fix32(to_number(heap, a)) as u32;
            let s = shift_count(to_number(heap, b));
            Ok(heap.number(x.wrapping_shr(s) as f64))
        }
        OpCode::BinaryAnd => {
            let (x, y) = (fix32(to_number(heap, a)), fix32(to_number(heap, b)));
            Ok(heap.number((x & y) as f64))
        }
        OpCode::BinaryOr => {
            let (x, y) = (fix32(to_number(heap, a)), fix32(to_number(heap, b)));
            Ok(heap.number((x | y) as f64))
        }
        OpCode::BinaryXor => {
            let (x, y) = (fix32(to_number(heap, a)), fix32(to_number(heap, b)));
            Ok(heap.number((x ^ y) as f64))
        }

        OpCode::CompareLess => {
            let result = relational(heap, a, b, |o| o == std::cmp::Ordering::Less);
            Ok(heap.boolean(result))
        }
        OpCode::CompareLessEqual => {
            let result = relational(heap, a, b, |o| o != std::cmp::Ordering::Greater);
            Ok(heap.boolean(result))
        }
        OpCode::CompareGreater => {
            let result = relational(heap, a, b, |o| o == std::cmp::Ordering::Greater);
            Ok(heap.boolean(result))
        }
        OpCode::CompareGreaterEqual => {
            let result = relational(heap, a, b, |o| o != std::cmp::Ordering::Less);
            Ok(heap.boolean(result))
        }

        OpCode::CompareEqual => {
            let eq = loose_eq(heap, a, b);
            Ok(heap.boolean(eq))
        }
        OpCode::CompareNotEqual => {
            let eq = loose_eq(heap, a, b);
            Ok(heap.boolean(!eq))
        }
        OpCode::CompareStrictEqual => {
            let eq = strict_eq(heap, a, b);
            Ok(heap.boolean(eq))
        }
        OpCode::CompareStrictNotEqual => {
            let eq = strict_eq(heap, a, b);
            Ok(heap.boolean(!eq))
        }

        other => Err(RaskError::internal(format!(
            "{} is not a binary operator",
            other.name()
        ))),
    }
}

/// Apply a unary operator. The increment/decrement helpers live here too.
pub fn unary(heap: &mut Heap, op: OpCode, a: Handle) -> RaskResult<Handle> {
    match op {
        OpCode::UnaryPositive => {
            let n = to_number(heap, a);
            Ok(heap.number(n))
        }
        OpCode::UnaryNegative => {
            let n = to_number(heap, a);
            Ok(heap.number(-n))
        }
        OpCode::UnaryNot => {
            let b = heap.get(a).to_bool();
            Ok(heap.boolean(!b))
        }
        OpCode::UnaryInvert => {
            let x = fix32(to_number(heap, a));
            Ok(heap.number(!x as f64))
        }
        OpCode::UnaryTypeof => {
            let name = heap.get(a).type_of();
            Ok(heap.string(name))
        }
        OpCode::BinaryInc => {
            let n = to_number(heap, a);
            Ok(heap.number(n + 1.0))
        }
        OpCode::BinaryDec => {
            let n = to_number(heap, a);
            Ok(heap.number(n - 1.0))
        }
        other => Err(RaskError::internal(format!(
            "{} is not a unary operator",
            other.name()
        ))),
    }
}

/// `+` concatenates whenever either operand is a string, object, array,
/// function, or regex, rendering both sides; otherwise numeric addition.
fn add(heap: &mut Heap, a: Handle, b: Handle) -> Handle {
    let textual = is_textual(heap.get(a)) || is_textual(heap.get(b));
    if textual {
        let s = format!("{}{}", heap.render(a), heap.render(b));
        heap.string(s)
    } else {
        let n = to_number(heap, a) + to_number(heap, b);
        heap.number(n)
    }
}

fn arith(heap: &mut Heap, a: Handle, b: Handle, f: impl Fn(f64, f64) -> f64) -> Handle {
    let n = f(to_number(heap, a), to_number(heap, b));
    heap.number(n)
}

/// Division. A zero dividend over a usable divisor is returned unchanged, so
/// a literal zero flows through as the same canonical zero value.
fn divide(heap: &mut Heap, a: Handle, b: Handle) -> Handle {
    if let Value::Number(x) = heap.get(a) {
        if *x == 0.0 {
            let d = to_number(heap, b);
            if d != 0.0 && !d.is_nan() {
                return a;
            }
        }
    }
    let n = to_number(heap, a) / to_number(heap, b);
    heap.number(n)
}

/// Relational comparison: string-to-string is lexicographic, everything else
/// goes through numeric coercion; any NaN makes the comparison false.
fn relational(heap: &Heap, a: Handle, b: Handle, check: impl Fn(std::cmp::Ordering) -> bool) -> bool {
    if let (Value::Str(s), Value::Str(t)) = (heap.get(a), heap.get(b)) {
        return check(s.cmp(t));
    }
    let x = to_number(heap, a);
    let y = to_number(heap, b);
    match x.partial_cmp(&y) {
        Some(ordering) => check(ordering),
        None => false,
    }
}

fn bool_num(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Coercing equality: number/string/boolean cross-coerce numerically, null
/// equals only undefined and itself, reference kinds compare by identity and
/// never equal non-reference kinds.
fn loose_eq(heap: &Heap, a: Handle, b: Handle) -> bool {
    match (heap.get(a), heap.get(b)) {
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Number(x), Value::Str(s)) => *x == str_to_number(s).as_number(),
        (Value::Str(s), Value::Number(y)) => str_to_number(s).as_number() == *y,
        (Value::Number(x), Value::Boolean(y)) => *x == bool_num(*y),
        (Value::Boolean(x), Value::Number(y)) => bool_num(*x) == *y,
        (Value::Str(s), Value::Str(t)) => s == t,
        (Value::Str(s), Value::Boolean(y)) => str_to_number(s).as_number() == bool_num(*y),
        (Value::Boolean(x), Value::Str(t)) => bool_num(*x) == str_to_number(t).as_number(),
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        (Value::Null, Value::Null)
        | (Value::Null, Value::Undefined)
        | (Value::Undefined, Value::Null)
        | (Value::Undefined, Value::Undefined) => true,
        (va, vb) if va.is_reference() && vb.is_reference() => a == b,
        _ => false,
    }
}

/// Strict equality additionally forbids cross-kind coercion.
fn strict_eq(heap: &Heap, a: Handle, b: Handle) -> bool {
    match (heap.get(a), heap.get(b)) {
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Str(s), Value::Str(t)) => s == t,
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        (Value::Null, Value::Null) => true,
        (Value::Undefined, Value::Undefined) => true,
        (va, vb) if va.is_reference() && vb.is_reference() && va.kind() == vb.kind() => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::value::PropMap;

    fn bin(heap: &mut Heap, op: OpCode, a: Handle, b: Handle) -> Handle {
        binary(heap, op, a, b).unwrap()
    }

    fn as_bool(heap: &Heap, h: Handle) -> bool {
        match heap.get(h) {
            Value::Boolean(b) => *b,
            other => panic!("expected boolean, got {:?}", other),
        }
    }

    #[test]
    fn test_addition_table() {
        let mut heap = Heap::new();
        // 1 + "2" concatenates
        let one = heap.number(1.0);
        let two_str = heap.string("2");
        let r = bin(&mut heap, OpCode::BinaryAdd, one, two_str);
        assert_eq!(heap.render(r), "12");
        // 1 + 2 adds
        let two = heap.number(2.0);
        let r = bin(&mut heap, OpCode::BinaryAdd, one, two);
        assert_eq!(heap.render(r), "3");
        // "" + {} renders the object
        let empty = heap.string("");
        let obj = heap.object(PropMap::new());
        let r = bin(&mut heap, OpCode::BinaryAdd, empty, obj);
        assert_eq!(heap.render(r), "[object Object]");
        // null + 1 is numeric
        let null = heap.null();
        let r = bin(&mut heap, OpCode::BinaryAdd, null, one);
        assert_eq!(heap.render(r), "1");
        // undefined + 1 is NaN
        let undef = heap.undefined();
        let r = bin(&mut heap, OpCode::BinaryAdd, undef, one);
        assert_eq!(heap.render(r), "NaN");
    }

    #[test]
    fn test_array_addition_renders_elements() {
        let mut heap = Heap::new();
        let one = heap.number(1.0);
        let two = heap.number(2.0);
        let arr = heap.array(vec![one, two]);
        let empty = heap.string("");
        let r = bin(&mut heap, OpCode::BinaryAdd, arr, empty);
        assert_eq!(heap.render(r), "1,2");
    }

    #[test]
    fn test_zero_dividend_passes_through() {
        let mut heap = Heap::new();
        let zero = heap.zero();
        let neg_one = heap.number(-1.0);
        let r = bin(&mut heap, OpCode::BinaryTrueDivide, zero, neg_one);
        // The canonical zero comes back unchanged.
        assert_eq!(r, zero);
        assert_eq!(heap.render(r), "0");
    }

    #[test]
    fn test_negation_of_zero_is_negative_zero() {
        let mut heap = Heap::new();
        let zero = heap.zero();
        let r = unary(&mut heap, OpCode::UnaryNegative, zero).unwrap();
        assert_eq!(heap.render(r), "-0");
    }

    #[test]
    fn test_division_special_cases() {
        let mut heap = Heap::new();
        let zero = heap.zero();
        let one = heap.number(1.0);
        let r = bin(&mut heap, OpCode::BinaryTrueDivide, zero, zero);
        assert_eq!(heap.render(r), "NaN");
        let r = bin(&mut heap, OpCode::BinaryTrueDivide, one, zero);
        assert_eq!(heap.render(r), "Infinity");
        let neg = heap.number(-0.0);
        let r = bin(&mut heap, OpCode::BinaryTrueDivide, one, neg);
        assert_eq!(heap.render(r), "-Infinity");
    }

    #[test]
    fn test_relational_comparisons() {
        let mut heap = Heap::new();
        // 1 < "2" coerces the string
        let one = heap.number(1.0);
        let two_str = heap.string("2");
        let r = bin(&mut heap, OpCode::CompareLess, one, two_str);
        assert!(as_bool(&heap, r));
        // "abc" < "abd" is lexicographic
        let abc = heap.string("abc");
        let abd = heap.string("abd");
        let r = bin(&mut heap, OpCode::CompareLess, abc, abd);
        assert!(as_bool(&heap, r));
        // undefined never compares
        let undef = heap.undefined();
        let r = bin(&mut heap, OpCode::CompareLess, undef, one);
        assert!(!as_bool(&heap, r));
        let r = bin(&mut heap, OpCode::CompareGreaterEqual, undef, one);
        assert!(!as_bool(&heap, r));
        // blank string acts as zero
        let blank = heap.string("  ");
        let r = bin(&mut heap, OpCode::CompareLess, blank, one);
        assert!(as_bool(&heap, r));
    }

    #[test]
    fn test_loose_equality_table() {
        let mut heap = Heap::new();
        let one = heap.number(1.0);
        let one_str = heap.string("1");
        let yes = heap.boolean(true);
        let null = heap.null();
        let undef = heap.undefined();
        let zero = heap.zero();

        let r = bin(&mut heap, OpCode::CompareEqual, one, one_str);
        assert!(as_bool(&heap, r));
        let r = bin(&mut heap, OpCode::CompareEqual, one, yes);
        assert!(as_bool(&heap, r));
        let r = bin(&mut heap, OpCode::CompareEqual, null, undef);
        assert!(as_bool(&heap, r));
        let r = bin(&mut heap, OpCode::CompareEqual, null, zero);
        assert!(!as_bool(&heap, r));
        // NaN never equals itself
        let nan = heap.number(f64::NAN);
        let r = bin(&mut heap, OpCode::CompareEqual, nan, nan);
        assert!(!as_bool(&heap, r));
        // empty string coerces to zero
        let empty = heap.string("");
        let r = bin(&mut heap, OpCode::CompareEqual, zero, empty);
        assert!(as_bool(&heap, r));
    }

    #[test]
    fn test_reference_kinds_compare_by_identity() {
        let mut heap = Heap::new();
        let a = heap.new_object();
        let b = heap.new_object();
        let r = bin(&mut heap, OpCode::CompareEqual, a, b);
        assert!(!as_bool(&heap, r));
        let r = bin(&mut heap, OpCode::CompareEqual, a, a);
        assert!(as_bool(&heap, r));
        // Objects never equal primitives, even falsy ones
        let zero = heap.zero();
        let r = bin(&mut heap, OpCode::CompareEqual, a, zero);
        assert!(!as_bool(&heap, r));
    }

    #[test]
    fn test_strict_equality_forbids_coercion() {
        let mut heap = Heap::new();
        let one = heap.number(1.0);
        let one_str = heap.string("1");
        let r = bin(&mut heap, OpCode::CompareStrictEqual, one, one_str);
        assert!(!as_bool(&heap, r));
        let other_one = heap.number(1.0);
        let r = bin(&mut heap, OpCode::CompareStrictEqual, one, other_one);
        assert!(as_bool(&heap, r));
        // Distinct string values are strictly equal by content.
        let also_one_str = heap.string("1");
        let r = bin(&mut heap, OpCode::CompareStrictEqual, one_str, also_one_str);
        assert!(as_bool(&heap, r));
        let null = heap.null();
        let undef = heap.undefined();
        let r = bin(&mut heap, OpCode::CompareStrictEqual, null, undef);
        assert!(!as_bool(&heap, r));
    }

    #[test]
    fn test_fix32_edge_cases() {
        assert_eq!(fix32(f64::NAN), 0);
        assert_eq!(fix32(f64::INFINITY), 0);
        assert_eq!(fix32(f64::NEG_INFINITY), 0);
        assert_eq!(fix32(0.0), 0);
        assert_eq!(fix32(-0.0), 0);
        assert_eq!(fix32(1.9), 1);
        assert_eq!(fix32(-1.9), -1);
        assert_eq!(fix32(2147483648.0), -2147483648);
        assert_eq!(fix32(3000000000.0), -1294967296);
        assert_eq!(fix32(-3000000000.0), 1294967296);
        assert_eq!(fix32(4294967296.0), 0);
        assert_eq!(fix32(1e300), 0); // beyond 2^32 after modulo: 1e300 % 2^32 == 0
    }

    #[test]
    fn test_shift_count_normalization() {
        assert_eq!(shift_count(0.0), 0);
        assert_eq!(shift_count(31.0), 31);
        assert_eq!(shift_count(32.0), 0);
        assert_eq!(shift_count(33.0), 1);
        assert_eq!(shift_count(-1.0), 31);
        assert_eq!(shift_count(-33.0), 31);
        assert_eq!(shift_count(f64::NAN), 0);
        assert_eq!(shift_count(f64::INFINITY), 0);
    }

    #[test]
    fn test_shift_operators() {
        let mut heap = Heap::new();
        let one = heap.number(1.0);
        let three = heap.number(3.0);
        let r = bin(&mut heap, OpCode::BinaryLshift, one, three);
        assert_eq!(heap.render(r), "8");

        // Negative left operand keeps two's-complement semantics.
        let neg_eight = heap.number(-8.0);
        let r = bin(&mut heap, OpCode::BinaryRshift, neg_eight, one);
        assert_eq!(heap.render(r), "-4");
        let r = bin(&mut heap, OpCode::BinaryUrshift, neg_eight, one);
        assert_eq!(heap.render(r), "2147483644");

        // NaN >>> 0 is 0.
        let nan = heap.number(f64::NAN);
        let zero = heap.zero();
        let r = bin(&mut heap, OpCode::BinaryUrshift, nan, zero);
        assert_eq!(heap.render(r), "0");

        // -1 >>> 0 is the full unsigned range.
        let neg_one = heap.number(-1.0);
        let r = bin(&mut heap, OpCode::BinaryUrshift, neg_one, zero);
        assert_eq!(heap.render(r), "4294967295");
    }

    #[test]
    fn test_bitwise_operators_coerce_operands() {
        let mut heap = Heap::new();
        let s = heap.string("6");
        let three = heap.number(3.0);
        let r = bin(&mut heap, OpCode::BinaryAnd, s, three);
        assert_eq!(heap.render(r), "2");
        let r = bin(&mut heap, OpCode::BinaryOr, s, three);
        assert_eq!(heap.render(r), "7");
        let r = bin(&mut heap, OpCode::BinaryXor, s, three);
        assert_eq!(heap.render(r), "5");
        let t = heap.boolean(true);
        let r = unary(&mut heap, OpCode::UnaryInvert, t).unwrap();
        assert_eq!(heap.render(r), "-2");
    }

    #[test]
    fn test_arithmetic_coercions() {
        let mut heap = Heap::new();
        let yes = heap.boolean(true);
        let two = heap.number(2.0);
        let r = bin(&mut heap, OpCode::BinaryMultiply, yes, two);
        assert_eq!(heap.render(r), "2");
        let null = heap.null();
        let r = bin(&mut heap, OpCode::BinarySubtract, two, null);
        assert_eq!(heap.render(r), "2");
        let undef = heap.undefined();
        let r = bin(&mut heap, OpCode::BinaryMultiply, undef, two);
        assert_eq!(heap.render(r), "NaN");
        // NaN ** 0 is 1 per the power rules.
        let nan = heap.number(f64::NAN);
        let zero = heap.zero();
        let r = bin(&mut heap, OpCode::BinaryPower, nan, zero);
        assert_eq!(heap.render(r), "1");
        // Modulo follows IEEE remainder semantics.
        let five = heap.number(5.0);
        let r = bin(&mut heap, OpCode::BinaryModulo, five, two);
        assert_eq!(heap.render(r), "1");
        let r = bin(&mut heap, OpCode::BinaryModulo, five, zero);
        assert_eq!(heap.render(r), "NaN");
    }

    #[test]
    fn test_typeof_strings() {
        let mut heap = Heap::new();
        let cases = [
            (heap.number(1.0), "number"),
            (heap.string("x"), "string"),
            (heap.boolean(true), "boolean"),
            (heap.null(), "object"),
            (heap.undefined(), "undefined"),
        ];
        for (value, expected) in cases {
            let r = unary(&mut heap, OpCode::UnaryTypeof, value).unwrap();
            assert_eq!(heap.render(r), expected);
        }
        let f = heap.new_object();
        let r = unary(&mut heap, OpCode::UnaryTypeof, f).unwrap();
        assert_eq!(heap.render(r), "object");
    }

    #[test]
    fn test_increment_decrement() {
        let mut heap = Heap::new();
        let s = heap.string("41");
        let r = unary(&mut heap, OpCode::BinaryInc, s).unwrap();
        assert_eq!(heap.render(r), "42");
        let r = unary(&mut heap, OpCode::BinaryDec, r).unwrap();
        assert_eq!(heap.render(r), "41");
    }
}
