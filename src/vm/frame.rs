// Rask Call Frames
// Prepared (heap-materialized) code units and the per-call execution frame.

use crate::compiler::unit::{Const, Instr, Program};
use crate::error::{ErrorKind, RaskError, RaskResult, Span};
use crate::vm::heap::Heap;
use crate::vm::value::{Handle, RegexValue, Value};
use smallvec::SmallVec;
use std::rc::Rc;

/// A constant-pool entry after preparation: either a pinned heap value or a
/// nested prepared unit.
#[derive(Debug)]
pub enum TemplateConst {
    Value(Handle),
    Unit(Rc<UnitTemplate>),
}

/// A code unit with its constant pool materialized onto the heap. Prepared
/// once per unit; every call to the same function shares one template.
#[derive(Debug)]
pub struct UnitTemplate {
    pub name: String,
    pub file: String,
    pub args: Vec<String>,
    pub instrs: Vec<Instr>,
    pub names: Vec<String>,
    pub globals: Vec<String>,
    pub derefs: Vec<String>,
    pub consts: Vec<TemplateConst>,
}

impl UnitTemplate {
    /// Materialize a unit and, recursively, every nested unit it references.
    /// Constant values are pinned so collection cycles never invalidate them.
    pub fn prepare(program: &Program, unit_id: usize, heap: &mut Heap) -> RaskResult<Rc<Self>> {
        let unit = program.units.get(unit_id).ok_or_else(|| {
            RaskError::internal(format!("unknown code unit #{}", unit_id))
        })?;

        let mut consts = Vec::with_capacity(unit.pool.consts.len());
        for entry in &unit.pool.consts {
            let prepared = match entry {
                Const::Number(n) => TemplateConst::Value(heap.pin(Value::Number(*n))),
                Const::Str(s) => TemplateConst::Value(heap.pin(Value::Str(s.clone()))),
                Const::Regex(source) => {
                    let compiled = regex::Regex::new(source).map_err(|e| {
                        RaskError::raised(
                            ErrorKind::SyntaxError,
                            format!("invalid regex /{}/: {}", source, e),
                        )
                    })?;
                    TemplateConst::Value(heap.pin(Value::Regex(RegexValue {
                        source: source.clone(),
                        compiled: Some(compiled),
                    })))
                }
                Const::Unit(id) => TemplateConst::Unit(Self::prepare(program, *id, heap)?),
            };
            consts.push(prepared);
        }

        Ok(Rc::new(Self {
            name: unit.name.clone(),
            file: program.file.clone(),
            args: unit.args.clone(),
            instrs: unit.instrs.clone(),
            names: unit.pool.names.clone(),
            globals: unit.pool.globals.clone(),
            derefs: unit.pool.derefs.clone(),
            consts,
        }))
    }
}

/// One entry of the call stack: template, program counter, operand stack,
/// environment object, captured-closure object, and return-value slot.
#[derive(Debug)]
pub struct Frame {
    pub template: Rc<UnitTemplate>,
    pub pc: usize,
    pub stack: SmallVec<[Handle; 8]>,
    /// Environment object holding this frame's named bindings.
    pub env: Handle,
    /// Capture object shared with the function value, when one exists.
    pub closure: Option<Handle>,
    /// Latest return value observed by this frame.
    pub ret: Handle,
    pub call_span: Span,
}

impl Frame {
    pub fn new(
        template: Rc<UnitTemplate>,
        env: Handle,
        closure: Option<Handle>,
        ret: Handle,
        call_span: Span,
    ) -> Self {
        Self {
            template,
            pc: 0,
            stack: SmallVec::new(),
            env,
            closure,
            ret,
            call_span,
        }
    }

    pub fn push(&mut self, handle: Handle) {
        self.stack.push(handle);
    }

    /// Popping an empty operand stack means the generator emitted unbalanced
    /// code; surfaced as an internal error rather than a panic.
    pub fn pop(&mut self) -> RaskResult<Handle> {
        self.stack
            .pop()
            .ok_or_else(|| RaskError::internal("operand stack underflow"))
    }

    pub fn peek(&self) -> RaskResult<Handle> {
        self.stack
            .last()
            .copied()
            .ok_or_else(|| RaskError::internal("operand stack underflow"))
    }

    pub fn instr(&self) -> Option<&Instr> {
        self.template.instrs.get(self.pc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::opcode::OpCode;
    use crate::compiler::unit::CodeUnit;

    fn program_with_units(units: Vec<CodeUnit>) -> Program {
        Program {
            file: "test.rk".to_string(),
            units,
        }
    }

    #[test]
    fn test_prepare_pins_constants() {
        let mut unit = CodeUnit::new("<main>");
        let n = unit.pool.add_number(7.0);
        let s = unit.pool.add_string("hi");
        unit.emit1(OpCode::LoadConst, n, Span::default());
        unit.emit1(OpCode::LoadConst, s, Span::default());
        let program = program_with_units(vec![unit]);

        let mut heap = Heap::new();
        let template = UnitTemplate::prepare(&program, 0, &mut heap).unwrap();
        assert_eq!(template.consts.len(), 2);

        // Constants survive a collection with no roots at all.
        heap.collect([], []);
        for entry in &template.consts {
            match entry {
                TemplateConst::Value(h) => assert!(heap.is_live(*h)),
                TemplateConst::Unit(_) => panic!("unexpected nested unit"),
            }
        }
    }

    #[test]
    fn test_prepare_recurses_into_nested_units() {
        let mut inner = CodeUnit::new("f");
        inner.args.push("x".to_string());
        inner.pool.add_number(1.0);

        let mut outer = CodeUnit::new("<main>");
        let unit_const = outer.pool.add_unit(1);
        outer.emit2(OpCode::MakeFunction, unit_const, 0, Span::default());

        let program = program_with_units(vec![outer, inner]);
        let mut heap = Heap::new();
        let template = UnitTemplate::prepare(&program, 0, &mut heap).unwrap();
        match &template.consts[0] {
            TemplateConst::Unit(nested) => {
                assert_eq!(nested.name, "f");
                assert_eq!(nested.args, ["x".to_string()]);
            }
            other => panic!("expected nested unit, got {:?}", other),
        }
    }

    #[test]
    fn test_prepare_rejects_bad_regex() {
        let mut unit = CodeUnit::new("<main>");
        unit.pool.add_regex("(unclosed");
        let program = program_with_units(vec![unit]);
        let mut heap = Heap::new();
        assert!(UnitTemplate::prepare(&program, 0, &mut heap).is_err());
    }

    #[test]
    fn test_frame_stack_underflow_is_an_error() {
        let program = program_with_units(vec![CodeUnit::new("<main>")]);
        let mut heap = Heap::new();
        let template = UnitTemplate::prepare(&program, 0, &mut heap).unwrap();
        let env = heap.new_object();
        let undefined = heap.undefined();
        let mut frame = Frame::new(template, env, None, undefined, Span::default());
        assert!(frame.pop().is_err());
        frame.push(undefined);
        assert_eq!(frame.pop().unwrap(), undefined);
    }
}
