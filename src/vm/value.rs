// Rask Runtime Values
// The nine value kinds, their shared capability set, and the numeric
// string conversions the coercion matrix depends on.

use crate::vm::builtins::BuiltinFn;
use crate::vm::frame::UnitTemplate;
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// Generation-checked index into the heap's value registry. Frames and
/// environments store handles, never references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pub index: u32,
    pub generation: u32,
}

/// Kind tag; also the freelist index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum ValueKind {
    Number = 0,
    Str = 1,
    Boolean = 2,
    Object = 3,
    Array = 4,
    Function = 5,
    Regex = 6,
    Null = 7,
    Undefined = 8,
}

pub const KIND_COUNT: usize = 9;

/// Object payload preserving property insertion order for enumeration.
#[derive(Debug, Clone, Default)]
pub struct PropMap {
    keys: Vec<String>,
    map: FxHashMap<String, Handle>,
}

impl PropMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Handle) {
        let key = key.into();
        if self.map.insert(key.clone(), value).is_none() {
            self.keys.push(key);
        }
    }

    pub fn get(&self, key: &str) -> Option<Handle> {
        self.map.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = Handle> + '_ {
        self.keys.iter().filter_map(|k| self.map.get(k).copied())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Handle)> + '_ {
        self.keys
            .iter()
            .filter_map(|k| self.map.get(k).map(|h| (k.as_str(), *h)))
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.map.clear();
    }
}

#[derive(Debug, Clone)]
pub struct RegexValue {
    pub source: String,
    pub compiled: Option<regex::Regex>,
}

#[derive(Debug, Clone)]
pub enum FunctionKind {
    Compiled {
        template: Rc<UnitTemplate>,
        closure: Option<Handle>,
    },
    Builtin(BuiltinFn),
}

#[derive(Debug, Clone)]
pub struct FunctionValue {
    pub name: String,
    pub kind: FunctionKind,
}

/// One live runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    Str(String),
    Boolean(bool),
    Object(PropMap),
    Array(Vec<Handle>),
    Function(FunctionValue),
    Regex(RegexValue),
    Null,
    Undefined,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Number(_) => ValueKind::Number,
            Value::Str(_) => ValueKind::Str,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Object(_) => ValueKind::Object,
            Value::Array(_) => ValueKind::Array,
            Value::Function(_) => ValueKind::Function,
            Value::Regex(_) => ValueKind::Regex,
            Value::Null => ValueKind::Null,
            Value::Undefined => ValueKind::Undefined,
        }
    }

    /// Boolean coercion shared by every kind.
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Boolean(b) => *b,
            Value::Object(_) | Value::Array(_) | Value::Function(_) | Value::Regex(_) => true,
            Value::Null | Value::Undefined => false,
        }
    }

    /// The `typeof` string.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Object(_) | Value::Array(_) | Value::Regex(_) | Value::Null => "object",
            Value::Function(_) => "function",
            Value::Undefined => "undefined",
        }
    }

    /// True for the kinds compared by identity.
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Value::Object(_) | Value::Array(_) | Value::Function(_) | Value::Regex(_)
        )
    }
}

/// Result of coercing a string to a number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericParse {
    /// The empty string.
    Empty,
    /// Whitespace only.
    Blank,
    Numeric(f64),
    Malformed,
}

impl NumericParse {
    /// Numeric view used by arithmetic: empty and blank act as zero.
    pub fn as_number(self) -> f64 {
        match self {
            NumericParse::Empty | NumericParse::Blank => 0.0,
            NumericParse::Numeric(n) => n,
            NumericParse::Malformed => f64::NAN,
        }
    }
}

/// Coerce a string to a number, classifying the failure modes.
pub fn str_to_number(s: &str) -> NumericParse {
    if s.is_empty() {
        return NumericParse::Empty;
    }
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return NumericParse::Blank;
    }
    if !is_number_syntax(trimmed) {
        return NumericParse::Malformed;
    }
    match trimmed.parse::<f64>() {
        Ok(n) => NumericParse::Numeric(n),
        Err(_) => NumericParse::Malformed,
    }
}

/// Accepted spellings: optional sign, then either `Infinity`, digits with an
/// optional fraction, or a bare fraction, with an optional decimal exponent.
/// Keeps Rust-specific forms like `inf` and `NaN` malformed.
fn is_number_syntax(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    if s[i..].eq("Infinity") {
        return true;
    }
    let int_digits = count_digits(&bytes[i..]);
    i += int_digits;
    let mut frac_digits = 0;
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        frac_digits = count_digits(&bytes[i..]);
        i += frac_digits;
    }
    if int_digits == 0 && frac_digits == 0 {
        return false;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        i += 1;
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        let exp_digits = count_digits(&bytes[i..]);
        if exp_digits == 0 {
            return false;
        }
        i += exp_digits;
    }
    i == bytes.len()
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

/// Render a number the way the language prints it: shortest decimal digit
/// sequence that round-trips to the same IEEE value, fixed notation for
/// decimal exponents in (-7, 21], exponential otherwise. Negative zero keeps
/// its sign.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return if n.is_sign_negative() {
            "-0".to_string()
        } else {
            "0".to_string()
        };
    }
    if n.is_infinite() {
        return if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        };
    }

    let negative = n < 0.0;
    let magnitude = n.abs();

    // Shortest round-trip digits come from the exponential formatter.
    let formatted = format!("{:e}", magnitude);
    let (mantissa, exp_part) = formatted
        .split_once('e')
        .unwrap_or((formatted.as_str(), "0"));
    let exp: i64 = exp_part.parse().unwrap_or(0);
    let mut digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    while digits.len() > 1 && digits.ends_with('0') {
        digits.pop();
    }
    let k = digits.len() as i64;
    // Decimal point position: magnitude == 0.digits * 10^point
    let point = exp + 1;

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if point >= k && point <= 21 {
        // Whole number, zero-padded.
        out.push_str(&digits);
        for _ in 0..(point - k) {
            out.push('0');
        }
    } else if point > 0 && point <= 21 {
        out.push_str(&digits[..point as usize]);
        out.push('.');
        out.push_str(&digits[point as usize..]);
    } else if point > -6 && point <= 0 {
        out.push_str("0.");
        for _ in 0..(-point) {
            out.push('0');
        }
        out.push_str(&digits);
    } else {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push('e');
        let e = point - 1;
        if e >= 0 {
            out.push('+');
        }
        out.push_str(&e.to_string());
    }
    out
}
