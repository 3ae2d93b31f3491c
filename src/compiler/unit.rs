// Rask Bytecode Units
// Instruction lists, per-unit constant pools, and compiled programs

use super::opcode::OpCode;
use crate::error::Span;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// One VM operation with its source provenance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Instr {
    pub op: OpCode,
    pub op1: u32,
    pub op2: u32,
    pub span: Span,
}

impl Instr {
    pub fn new(op: OpCode, span: Span) -> Self {
        Self {
            op,
            op1: 0,
            op2: 0,
            span,
        }
    }
}

/// Entries of the literal-constant namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Const {
    Number(f64),
    Str(String),
    Regex(String),
    /// Index of a nested function unit within the enclosing `Program`.
    Unit(usize),
}

/// Per-unit interned constant storage.
///
/// Four independent namespaces: literal constants, local names, global names,
/// and closure (deref) names. Each is deduplicated so repeated literals and
/// spellings share one slot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstPool {
    pub consts: Vec<Const>,
    pub names: Vec<String>,
    pub globals: Vec<String>,
    pub derefs: Vec<String>,

    #[serde(skip)]
    number_index: FxHashMap<u64, usize>,
    #[serde(skip)]
    string_index: FxHashMap<String, usize>,
    #[serde(skip)]
    regex_index: FxHashMap<String, usize>,
    #[serde(skip)]
    name_index: FxHashMap<String, usize>,
    #[serde(skip)]
    global_index: FxHashMap<String, usize>,
    #[serde(skip)]
    deref_index: FxHashMap<String, usize>,
}

/// Numbers are keyed by IEEE value with `-0` collapsed into `0`; the literal
/// zero never reaches the pool (it compiles to the dedicated zero-load).
fn number_key(value: f64) -> u64 {
    if value == 0.0 {
        0.0_f64.to_bits()
    } else if value.is_nan() {
        f64::NAN.to_bits()
    } else {
        value.to_bits()
    }
}

/// The dedup indexes are derived state rebuilt on insertion; equality is
/// decided by the four namespaces alone, so deserialized pools compare equal
/// to their originals.
impl PartialEq for ConstPool {
    fn eq(&self, other: &Self) -> bool {
        self.consts == other.consts
            && self.names == other.names
            && self.globals == other.globals
            && self.derefs == other.derefs
    }
}

impl ConstPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_number(&mut self, value: f64) -> usize {
        let key = number_key(value);
        if let Some(&index) = self.number_index.get(&key) {
            return index;
        }
        let index = self.consts.len();
        self.consts.push(Const::Number(f64::from_bits(key)));
        self.number_index.insert(key, index);
        index
    }

    pub fn add_string(&mut self, value: &str) -> usize {
        if let Some(&index) = self.string_index.get(value) {
            return index;
        }
        let index = self.consts.len();
        self.consts.push(Const::Str(value.to_string()));
        self.string_index.insert(value.to_string(), index);
        index
    }

    pub fn add_regex(&mut self, source: &str) -> usize {
        if let Some(&index) = self.regex_index.get(source) {
            return index;
        }
        let index = self.consts.len();
        self.consts.push(Const::Regex(source.to_string()));
        self.regex_index.insert(source.to_string(), index);
        index
    }

    /// Nested units are referenced by program-wide id; never deduplicated.
    pub fn add_unit(&mut self, unit_id: usize) -> usize {
        let index = self.consts.len();
        self.consts.push(Const::Unit(unit_id));
        index
    }

    pub fn add_name(&mut self, spelling: &str) -> usize {
        if let Some(&index) = self.name_index.get(spelling) {
            return index;
        }
        let index = self.names.len();
        self.names.push(spelling.to_string());
        self.name_index.insert(spelling.to_string(), index);
        index
    }

    pub fn add_global(&mut self, spelling: &str) -> usize {
        if let Some(&index) = self.global_index.get(spelling) {
            return index;
        }
        let index = self.globals.len();
        self.globals.push(spelling.to_string());
        self.global_index.insert(spelling.to_string(), index);
        index
    }

    pub fn add_deref(&mut self, spelling: &str) -> usize {
        if let Some(&index) = self.deref_index.get(spelling) {
            return index;
        }
        let index = self.derefs.len();
        self.derefs.push(spelling.to_string());
        self.deref_index.insert(spelling.to_string(), index);
        index
    }

    pub fn deref_contains(&self, spelling: &str) -> bool {
        self.deref_index.contains_key(spelling)
    }
}

/// One compiled function (or the top-level program).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeUnit {
    pub name: String,
    pub args: Vec<String>,
    pub instrs: Vec<Instr>,
    pub pool: ConstPool,
}

impl CodeUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Captured-closure spellings, in registration order.
    pub fn closures(&self) -> &[String] {
        &self.pool.derefs
    }

    pub fn emit(&mut self, op: OpCode, span: Span) -> usize {
        let index = self.instrs.len();
        self.instrs.push(Instr::new(op, span));
        index
    }

    pub fn emit1(&mut self, op: OpCode, op1: usize, span: Span) -> usize {
        let index = self.emit(op, span);
        self.instrs[index].op1 = op1 as u32;
        index
    }

    pub fn emit2(&mut self, op: OpCode, op1: usize, op2: usize, span: Span) -> usize {
        let index = self.emit(op, span);
        self.instrs[index].op1 = op1 as u32;
        self.instrs[index].op2 = op2 as u32;
        index
    }

    pub fn current_index(&self) -> usize {
        self.instrs.len()
    }

    /// Point a previously emitted jump at the current end of the unit.
    pub fn patch_jump(&mut self, at: usize) {
        self.patch_jump_to(at, self.instrs.len());
    }

    /// Point a previously emitted jump at an explicit instruction index.
    /// Absolute for every jump except `JumpForward`, whose operand is
    /// relative to its own index plus two.
    pub fn patch_jump_to(&mut self, at: usize, target: usize) {
        let op1 = match self.instrs[at].op {
            OpCode::JumpForward => {
                debug_assert!(target >= at + 2, "backward JUMP_FORWARD");
                target - at - 2
            }
            _ => target,
        };
        self.instrs[at].op1 = op1 as u32;
    }

    /// Resolve a jump instruction's operand to an absolute target index.
    pub fn jump_target(&self, at: usize) -> usize {
        let instr = &self.instrs[at];
        match instr.op {
            OpCode::JumpForward => at + 2 + instr.op1 as usize,
            _ => instr.op1 as usize,
        }
    }

    /// Render a human-readable listing of the unit.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "--- {} ---", self.name);
        let _ = writeln!(
            out,
            "{} instructions, {} consts, {} names, {} globals, {} derefs",
            self.instrs.len(),
            self.pool.consts.len(),
            self.pool.names.len(),
            self.pool.globals.len(),
            self.pool.derefs.len()
        );
        for (index, instr) in self.instrs.iter().enumerate() {
            let _ = write!(
                out,
                "{:04} {:>4} {:<24}",
                index,
                instr.span.start.line,
                instr.op.name()
            );
            match instr.op.operand_count() {
                0 => {}
                1 => {
                    let _ = write!(out, " {:<6}", instr.op1);
                    let _ = write!(out, "{}", self.operand_note(instr));
                }
                _ => {
                    let _ = write!(out, " {:<3} {:<3}", instr.op1, instr.op2);
                    let _ = write!(out, "{}", self.operand_note(instr));
                }
            }
            out.push('\n');
        }
        out
    }

    fn operand_note(&self, instr: &Instr) -> String {
        let index = instr.op1 as usize;
        match instr.op {
            OpCode::LoadConst | OpCode::MakeFunction => match self.pool.consts.get(index) {
                Some(Const::Number(n)) => format!("({})", n),
                Some(Const::Str(s)) => format!("({:?})", s),
                Some(Const::Regex(r)) => format!("(/{}/)", r),
                Some(Const::Unit(id)) => format!("(unit #{})", id),
                None => String::new(),
            },
            OpCode::LoadName | OpCode::StoreName => match self.pool.names.get(index) {
                Some(name) => format!("({})", name),
                None => String::new(),
            },
            OpCode::LoadFast | OpCode::StoreFast => match self.pool.names.get(index) {
                Some(name) => format!("({})", name),
                None => String::new(),
            },
            OpCode::LoadGlobal | OpCode::StoreGlobal => match self.pool.globals.get(index) {
                Some(name) => format!("({})", name),
                None => String::new(),
            },
            OpCode::LoadDeref | OpCode::StoreDeref => match self.pool.derefs.get(index) {
                Some(name) => format!("({})", name),
                None => String::new(),
            },
            // Capture wiring reads from the creating unit's own environment,
            // so the operand indexes the names table.
            OpCode::LoadClosure => match self.pool.names.get(index) {
                Some(name) => format!("({})", name),
                None => String::new(),
            },
            OpCode::LoadAttr | OpCode::StoreAttr | OpCode::LoadMethod => {
                match self.pool.consts.get(index) {
                    Some(Const::Str(s)) => format!("({})", s),
                    _ => String::new(),
                }
            }
            _ => String::new(),
        }
    }
}

/// A fully generated program: unit 0 is the top level, nested functions are
/// referenced through `Const::Unit` ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub file: String,
    pub units: Vec<CodeUnit>,
}

impl Program {
    pub fn top_level(&self) -> &CodeUnit {
        &self.units[0]
    }

    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for unit in &self.units {
            out.push_str(&unit.disassemble());
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_dedup_collapses_signed_zero() {
        let mut pool = ConstPool::new();
        let a = pool.add_number(-0.0);
        let b = pool.add_number(0.0);
        assert_eq!(a, b);
        // The stored key is the positive zero.
        match pool.consts[a] {
            Const::Number(n) => assert!(n == 0.0 && n.is_sign_positive()),
            _ => panic!("expected number"),
        }
    }

    #[test]
    fn test_name_namespaces_are_independent() {
        let mut pool = ConstPool::new();
        let n = pool.add_name("x");
        let g = pool.add_global("x");
        let d = pool.add_deref("x");
        assert_eq!((n, g, d), (0, 0, 0));
        assert_eq!(pool.add_name("x"), 0);
        assert_eq!(pool.names.len(), 1);
    }

    #[test]
    fn test_closure_wiring_disassembles_with_the_local_spelling() {
        // The names and derefs tables disagree on purpose; the annotation
        // must come from names.
        let mut unit = CodeUnit::new("test");
        unit.pool.add_deref("captured");
        let index = unit.pool.add_name("local");
        unit.emit1(OpCode::LoadClosure, index, Span::default());
        let listing = unit.disassemble();
        assert!(listing.contains("(local)"), "listing: {}", listing);
        assert!(!listing.contains("(captured)"), "listing: {}", listing);
    }

    #[test]
    fn test_jump_forward_is_relative() {
        let mut unit = CodeUnit::new("test");
        let jump = unit.emit(OpCode::JumpForward, Span::default());
        unit.emit(OpCode::LoadTrue, Span::default());
        unit.emit(OpCode::PopTop, Span::default());
        unit.patch_jump(jump);
        assert_eq!(unit.instrs[jump].op1, 1); // 0 + 2 + 1 == 3
        assert_eq!(unit.jump_target(jump), 3);
    }

    #[test]
    fn test_absolute_jump_patching() {
        let mut unit = CodeUnit::new("test");
        unit.emit(OpCode::LoadTrue, Span::default());
        let jump = unit.emit(OpCode::JumpAbsolute, Span::default());
        unit.emit(OpCode::PopTop, Span::default());
        unit.patch_jump_to(jump, 0);
        assert_eq!(unit.jump_target(jump), 0);
    }
}
