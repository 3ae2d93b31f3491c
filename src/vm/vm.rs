// Rask Virtual Machine
// Frame-stack interpreter over generated code units. One dispatch loop runs
// every frame, including frames pushed by re-entrant builtins.

use crate::compiler::opcode::OpCode;
use crate::compiler::unit::Program;
use crate::error::{ErrorKind, RaskError, RaskResult, Span, StackFrame};
use crate::vm::builtins::{self, BuiltinCtx, BuiltinFlow, Host, NoopHost};
use crate::vm::frame::{Frame, TemplateConst, UnitTemplate};
use crate::vm::heap::Heap;
use crate::vm::ops;
use crate::vm::value::{FunctionKind, Handle, PropMap, Value};
use std::rc::Rc;

/// The interpreter. Owns the heap, the frame stack, and the host services.
pub struct Vm {
    pub heap: Heap,
    frames: Vec<Frame>,
    host: Box<dyn Host>,
    /// Print each instruction before executing it.
    pub trace_steps: bool,
    /// Instructions between collection cycles.
    gc_stride: u32,
    steps_since_gc: u32,
    result: Handle,
}

impl Vm {
    pub fn new() -> Self {
        Self::with_host(Box::new(NoopHost))
    }

    pub fn with_host(host: Box<dyn Host>) -> Self {
        let heap = Heap::new();
        let result = heap.undefined();
        Self {
            heap,
            frames: Vec::new(),
            host,
            trace_steps: false,
            gc_stride: 1,
            steps_since_gc: 0,
            result,
        }
    }

    /// Collect every `stride` instructions instead of every instruction.
    /// Values stay alive while reachable either way; a larger stride only
    /// delays reclamation.
    pub fn set_gc_stride(&mut self, stride: u32) {
        self.gc_stride = stride.max(1);
    }

    /// Run a generated program to completion and return its top-level result.
    pub fn eval_program(&mut self, program: &Program) -> RaskResult<Handle> {
        let template = UnitTemplate::prepare(program, 0, &mut self.heap)?;
        let global_env = self.heap.new_object();
        builtins::install(&mut self.heap, global_env);
        let undefined = self.heap.undefined();
        self.frames.push(Frame::new(
            template,
            global_env,
            None,
            undefined,
            Span::default(),
        ));
        let outcome = self.run();
        self.frames.clear();
        outcome
    }

    pub fn render(&self, handle: Handle) -> String {
        self.heap.render(handle)
    }

    // ==================== Dispatch ====================

    fn run(&mut self) -> RaskResult<Handle> {
        loop {
            self.steps_since_gc += 1;
            if self.steps_since_gc >= self.gc_stride {
                self.collect_garbage();
                self.steps_since_gc = 0;
            }

            let frame_index = match self.frames.len().checked_sub(1) {
                Some(i) => i,
                None => return Ok(self.result),
            };
            let at = self.frames[frame_index].pc;
            let instr = match self.frames[frame_index].instr() {
                Some(instr) => *instr,
                None => {
                    // Units always end in an explicit return; an empty or
                    // truncated unit finishes with undefined.
                    let undefined = self.heap.undefined();
                    if self.finish_frame(undefined) {
                        return Ok(self.result);
                    }
                    continue;
                }
            };
            if self.trace_steps {
                eprintln!(
                    "[{}] {:04} {} {} {}",
                    self.frames[frame_index].template.name,
                    at,
                    instr.op.name(),
                    instr.op1,
                    instr.op2
                );
            }
            self.frames[frame_index].pc += 1;

            match self.execute(instr, at) {
                Ok(Some(result)) => return Ok(result),
                Ok(None) => {}
                Err(err) => return Err(self.locate(err, instr.span)),
            }
        }
    }

    /// Execute one instruction. Returns the final program result once the
    /// outermost frame returns.
    fn execute(&mut self, instr: crate::compiler::unit::Instr, at: usize) -> RaskResult<Option<Handle>> {
        let span = instr.span;
        match instr.op {
            OpCode::PopTop => {
                self.pop()?;
            }
            OpCode::DupTop => {
                let top = self.peek()?;
                self.push(top);
            }

            // ---------- Loads ----------
            OpCode::LoadConst => {
                let value = self.const_value(instr.op1 as usize)?;
                self.push(value);
            }
            OpCode::LoadZero => {
                let zero = self.heap.zero();
                self.push(zero);
            }
            OpCode::LoadTrue => {
                let v = self.heap.boolean(true);
                self.push(v);
            }
            OpCode::LoadFalse => {
                let v = self.heap.boolean(false);
                self.push(v);
            }
            OpCode::LoadNull => {
                let v = self.heap.null();
                self.push(v);
            }
            OpCode::LoadUndefined => {
                let v = self.heap.undefined();
                self.push(v);
            }

            // ---------- Unary and binary operators ----------
            OpCode::UnaryPositive
            | OpCode::UnaryNegative
            | OpCode::UnaryNot
            | OpCode::UnaryInvert
            | OpCode::UnaryTypeof
            | OpCode::BinaryInc
            | OpCode::BinaryDec => {
                let a = self.pop()?;
                let r = ops::unary(&mut self.heap, instr.op, a)?;
                self.push(r);
            }
            OpCode::BinaryPower
            | OpCode::BinaryMultiply
            | OpCode::BinaryModulo
            | OpCode::BinaryAdd
            | OpCode::BinarySubtract
            | OpCode::BinaryTrueDivide
            | OpCode::BinaryLshift
            | OpCode::BinaryRshift
            | OpCode::BinaryUrshift
            | OpCode::BinaryAnd
            | OpCode::BinaryXor
            | OpCode::BinaryOr
            | OpCode::CompareLess
            | OpCode::CompareLessEqual
            | OpCode::CompareGreater
            | OpCode::CompareGreaterEqual
            | OpCode::CompareEqual
            | OpCode::CompareNotEqual
            | OpCode::CompareStrictEqual
            | OpCode::CompareStrictNotEqual => {
                let b = self.pop()?;
                let a = self.pop()?;
                let r = ops::binary(&mut self.heap, instr.op, a, b)?;
                self.push(r);
            }

            // ---------- Names ----------
            OpCode::StoreName | OpCode::StoreFast => {
                let name = self.local_name(instr.op1 as usize)?;
                let value = self.peek()?;
                let env = self.top_frame()?.env;
                self.env_set(env, &name, value);
            }
            OpCode::LoadName => {
                let name = self.local_name(instr.op1 as usize)?;
                match self.lookup_outward(&name) {
                    Some(value) => self.push(value),
                    None => {
                        return Err(RaskError::raised(
                            ErrorKind::NameError,
                            format!("{} is not defined", name),
                        ));
                    }
                }
            }
            OpCode::LoadFast => {
                let name = self.local_name(instr.op1 as usize)?;
                let env = self.top_frame()?.env;
                match self.env_get(env, &name) {
                    Some(value) => self.push(value),
                    None => {
                        return Err(RaskError::raised(
                            ErrorKind::NameError,
                            format!("{} is not defined", name),
                        ));
                    }
                }
            }
            OpCode::StoreGlobal => {
                let name = self.global_name(instr.op1 as usize)?;
                let value = self.peek()?;
                let env = self.global_env()?;
                self.env_set(env, &name, value);
            }
            OpCode::LoadGlobal => {
                let name = self.global_name(instr.op1 as usize)?;
                let env = self.global_env()?;
                match self.env_get(env, &name) {
                    Some(value) => self.push(value),
                    None => {
                        return Err(RaskError::raised(
                            ErrorKind::ReferenceError,
                            format!("{} is not defined", name),
                        ));
                    }
                }
            }
            OpCode::StoreDeref => {
                let name = self.deref_name(instr.op1 as usize)?;
                let value = self.peek()?;
                let closure = self.top_frame()?.closure.ok_or_else(|| {
                    RaskError::internal("store to a captured name without a closure")
                })?;
                self.env_set(closure, &name, value);
            }
            OpCode::LoadDeref => {
                let name = self.deref_name(instr.op1 as usize)?;
                let closure = self.top_frame()?.closure;
                let value = closure.and_then(|c| self.env_get(c, &name));
                match value {
                    Some(value) => self.push(value),
                    None => {
                        return Err(RaskError::raised(
                            ErrorKind::NameError,
                            format!("{} is not defined", name),
                        ));
                    }
                }
            }
            OpCode::LoadClosure => {
                // Capture time: resolve the spelling against the creating
                // frame so transitive captures chain outward. A hoisted
                // declaration that has not run yet captures undefined.
                let name = self.local_name(instr.op1 as usize)?;
                let frame = self.top_frame()?;
                let own = self
                    .env_get(frame.env, &name)
                    .or_else(|| frame.closure.and_then(|c| self.env_get(c, &name)))
                    .or_else(|| self.lookup_outward(&name));
                let value = own.unwrap_or_else(|| self.heap.undefined());
                self.push(value);
            }

            // ---------- Jumps ----------
            OpCode::JumpAbsolute => {
                self.top_frame_mut()?.pc = instr.op1 as usize;
            }
            OpCode::JumpForward => {
                self.top_frame_mut()?.pc = at + 2 + instr.op1 as usize;
            }
            OpCode::PopJumpIfFalse => {
                let v = self.pop()?;
                if !self.heap.get(v).to_bool() {
                    self.top_frame_mut()?.pc = instr.op1 as usize;
                }
            }
            OpCode::PopJumpIfTrue => {
                let v = self.pop()?;
                if self.heap.get(v).to_bool() {
                    self.top_frame_mut()?.pc = instr.op1 as usize;
                }
            }
            OpCode::JumpIfFalseOrPop => {
                let v = self.peek()?;
                if !self.heap.get(v).to_bool() {
                    self.top_frame_mut()?.pc = instr.op1 as usize;
                } else {
                    self.pop()?;
                }
            }
            OpCode::JumpIfTrueOrPop => {
                let v = self.peek()?;
                if self.heap.get(v).to_bool() {
                    self.top_frame_mut()?.pc = instr.op1 as usize;
                } else {
                    self.pop()?;
                }
            }

            // ---------- Aggregates ----------
            OpCode::BuildList => {
                let count = instr.op1 as usize;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.pop()?);
                }
                items.reverse();
                let array = self.heap.array(items);
                self.push(array);
            }
            OpCode::BuildMap => {
                let count = instr.op1 as usize;
                let mut pairs = Vec::with_capacity(count);
                for _ in 0..count {
                    let value = self.pop()?;
                    let key = self.pop()?;
                    pairs.push((self.heap.render(key), value));
                }
                pairs.reverse();
                let mut props = PropMap::new();
                for (key, value) in pairs {
                    props.insert(key, value);
                }
                let object = self.heap.object(props);
                self.push(object);
            }

            // ---------- Attributes and elements ----------
            OpCode::LoadAttr => {
                let name = self.const_string(instr.op1 as usize)?;
                let receiver = self.pop()?;
                let value = self.read_attr(receiver, &name)?;
                self.push(value);
            }
            OpCode::StoreAttr => {
                let name = self.const_string(instr.op1 as usize)?;
                let receiver = self.pop()?;
                let value = self.pop()?;
                self.write_attr(receiver, &name, value)?;
            }
            OpCode::BinarySubscr => {
                let index = self.pop()?;
                let receiver = self.pop()?;
                let value = self.read_element(receiver, index)?;
                self.push(value);
            }
            OpCode::StoreSubscr => {
                let index = self.pop()?;
                let receiver = self.pop()?;
                let value = self.pop()?;
                self.write_element(receiver, index, value)?;
            }
            OpCode::LoadMethod => {
                let name = self.const_string(instr.op1 as usize)?;
                let receiver = self.pop()?;
                let method = self.read_method(receiver, &name)?;
                self.push(method);
                self.push(receiver);
            }

            // ---------- Functions ----------
            OpCode::MakeFunction => {
                let name_handle = self.pop()?;
                let closure = if instr.op2 & 1 != 0 {
                    Some(self.pop()?)
                } else {
                    None
                };
                let template = self.const_unit(instr.op1 as usize)?;
                let name = match self.heap.get(name_handle) {
                    Value::Str(s) if !s.is_empty() => s.clone(),
                    _ => template.name.clone(),
                };
                let function = self.heap.function(
                    name,
                    FunctionKind::Compiled { template, closure },
                );
                self.push(function);
            }
            OpCode::CallFunction => {
                let args = self.pop_args(instr.op1 as usize)?;
                let callee = self.pop()?;
                self.call_value(callee, None, args, span)?;
            }
            OpCode::CallMethod => {
                let args = self.pop_args(instr.op1 as usize)?;
                let receiver = self.pop()?;
                let method = self.pop()?;
                self.call_value(method, Some(receiver), args, span)?;
            }
            OpCode::CallFunctionEx => {
                let packed = self.pop()?;
                let callee = self.pop()?;
                let args = match self.heap.get(packed) {
                    Value::Array(items) => items.clone(),
                    _ => {
                        return Err(RaskError::raised(
                            ErrorKind::TypeError,
                            "spread argument is not an array",
                        ));
                    }
                };
                self.call_value(callee, None, args, span)?;
            }
            OpCode::ReturnValue => {
                let value = self.pop()?;
                if self.finish_frame(value) {
                    return Ok(Some(self.result));
                }
            }
        }
        Ok(None)
    }

    // ==================== Calls ====================

    fn call_value(
        &mut self,
        callee: Handle,
        receiver: Option<Handle>,
        args: Vec<Handle>,
        span: Span,
    ) -> RaskResult<()> {
        let function = match self.heap.get(callee) {
            Value::Function(f) => f.clone(),
            _ => {
                let rendered = self.heap.render(callee);
                return Err(RaskError::raised(
                    ErrorKind::TypeError,
                    format!("{} is not a function", rendered),
                ));
            }
        };
        match function.kind {
            FunctionKind::Compiled { template, closure } => {
                let env = self.heap.new_object();
                let undefined = self.heap.undefined();
                for (i, param) in template.args.iter().enumerate() {
                    let value = args.get(i).copied().unwrap_or(undefined);
                    self.env_set(env, param, value);
                }
                let arguments = self.heap.array(args);
                self.env_set(env, "arguments", arguments);
                self.frames
                    .push(Frame::new(template, env, closure, undefined, span));
            }
            FunctionKind::Builtin(builtin) => {
                let stack_trace = self.capture_stack_trace(span);
                let mut ctx = BuiltinCtx {
                    heap: &mut self.heap,
                    host: &mut *self.host,
                    receiver,
                    args,
                    span,
                    stack_trace,
                };
                match builtin(&mut ctx)? {
                    BuiltinFlow::Value(value) => self.push(value),
                    BuiltinFlow::Frame(frame) => self.frames.push(*frame),
                }
            }
        }
        Ok(())
    }

    /// Pop the finished frame and deliver its result. Returns true when the
    /// outermost frame finished.
    fn finish_frame(&mut self, value: Handle) -> bool {
        self.frames.pop();
        match self.frames.last_mut() {
            Some(caller) => {
                caller.ret = value;
                caller.push(value);
                false
            }
            None => {
                self.result = value;
                true
            }
        }
    }

    fn pop_args(&mut self, count: usize) -> RaskResult<Vec<Handle>> {
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            args.push(self.pop()?);
        }
        args.reverse();
        Ok(args)
    }

    // ==================== Attributes and elements ====================

    fn read_attr(&mut self, receiver: Handle, name: &str) -> RaskResult<Handle> {
        match self.heap.get(receiver) {
            Value::Null | Value::Undefined => Err(RaskError::raised(
                ErrorKind::TypeError,
                format!(
                    "cannot read property '{}' of {}",
                    name,
                    self.heap.render(receiver)
                ),
            )),
            Value::Object(props) => match props.get(name) {
                Some(value) => Ok(value),
                None => Ok(self.heap.undefined()),
            },
            _ => match builtins::kind_attr(&mut self.heap, receiver, name) {
                Some(value) => Ok(value),
                None => Ok(self.heap.undefined()),
            },
        }
    }

    fn write_attr(&mut self, receiver: Handle, name: &str, value: Handle) -> RaskResult<()> {
        match self.heap.get_mut(receiver) {
            Value::Object(props) => {
                props.insert(name, value);
                Ok(())
            }
            Value::Null | Value::Undefined => Err(RaskError::raised(
                ErrorKind::TypeError,
                format!("cannot set property '{}' of {}", name, self.heap.render(receiver)),
            )),
            _ => Err(RaskError::raised(
                ErrorKind::TypeError,
                format!("cannot set property '{}' on this value", name),
            )),
        }
    }

    fn read_element(&mut self, receiver: Handle, index: Handle) -> RaskResult<Handle> {
        match self.heap.get(receiver) {
            Value::Null | Value::Undefined => {
                return Err(RaskError::raised(
                    ErrorKind::TypeError,
                    format!(
                        "cannot read element of {}",
                        self.heap.render(receiver)
                    ),
                ));
            }
            Value::Array(items) => {
                let n = ops::to_number(&self.heap, index);
                if n.fract() == 0.0 && n >= 0.0 && (n as usize) < items.len() {
                    return Ok(items[n as usize]);
                }
                return Ok(self.heap.undefined());
            }
            Value::Str(s) => {
                let n = ops::to_number(&self.heap, index);
                if n.fract() == 0.0 && n >= 0.0 {
                    if let Some(c) = s.chars().nth(n as usize) {
                        return Ok(self.heap.string(c.to_string()));
                    }
                }
                return Ok(self.heap.undefined());
            }
            _ => {}
        }
        let key = self.heap.render(index);
        match self.heap.get(receiver) {
            Value::Object(props) => match props.get(&key) {
                Some(value) => Ok(value),
                None => Ok(self.heap.undefined()),
            },
            _ => Ok(self.heap.undefined()),
        }
    }

    fn write_element(&mut self, receiver: Handle, index: Handle, value: Handle) -> RaskResult<()> {
        let is_array = matches!(self.heap.get(receiver), Value::Array(_));
        if is_array {
            let n = ops::to_number(&self.heap, index);
            if n.fract() != 0.0 || n < 0.0 || !n.is_finite() {
                return Err(RaskError::raised(
                    ErrorKind::IndexError,
                    format!("invalid array index {}", self.heap.render(index)),
                ));
            }
            let undefined = self.heap.undefined();
            let target = n as usize;
            match self.heap.get_mut(receiver) {
                Value::Array(items) => {
                    while items.len() <= target {
                        items.push(undefined);
                    }
                    items[target] = value;
                }
                _ => unreachable!(),
            }
            return Ok(());
        }
        let key = self.heap.render(index);
        match self.heap.get_mut(receiver) {
            Value::Object(props) => {
                props.insert(key, value);
                Ok(())
            }
            Value::Null | Value::Undefined => Err(RaskError::raised(
                ErrorKind::TypeError,
                format!("cannot set element of {}", self.heap.render(receiver)),
            )),
            _ => Err(RaskError::raised(
                ErrorKind::TypeError,
                "cannot set element on this value",
            )),
        }
    }

    fn read_method(&mut self, receiver: Handle, name: &str) -> RaskResult<Handle> {
        if let Value::Null | Value::Undefined = self.heap.get(receiver) {
            return Err(RaskError::raised(
                ErrorKind::TypeError,
                format!(
                    "cannot read property '{}' of {}",
                    name,
                    self.heap.render(receiver)
                ),
            ));
        }
        if let Value::Object(props) = self.heap.get(receiver) {
            if let Some(value) = props.get(name) {
                return Ok(value);
            }
        }
        match builtins::kind_method(&mut self.heap, receiver, name) {
            Some(method) => Ok(method),
            None => Err(RaskError::raised(
                ErrorKind::AttributeError,
                format!("no method '{}' on this value", name),
            )),
        }
    }

    // ==================== Name plumbing ====================

    fn top_frame(&self) -> RaskResult<&Frame> {
        self.frames
            .last()
            .ok_or_else(|| RaskError::internal("no active frame"))
    }

    fn top_frame_mut(&mut self) -> RaskResult<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| RaskError::internal("no active frame"))
    }

    fn push(&mut self, handle: Handle) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push(handle);
        }
    }

    fn pop(&mut self) -> RaskResult<Handle> {
        self.top_frame_mut()?.pop()
    }

    fn peek(&self) -> RaskResult<Handle> {
        self.top_frame()?.peek()
    }

    fn global_env(&self) -> RaskResult<Handle> {
        self.frames
            .first()
            .map(|f| f.env)
            .ok_or_else(|| RaskError::internal("no active frame"))
    }

    fn env_get(&self, env: Handle, name: &str) -> Option<Handle> {
        match self.heap.get(env) {
            Value::Object(props) => props.get(name),
            _ => None,
        }
    }

    fn env_set(&mut self, env: Handle, name: &str, value: Handle) {
        if let Value::Object(props) = self.heap.get_mut(env) {
            props.insert(name, value);
        }
    }

    /// Search every frame's environment from the innermost outward, then the
    /// innermost closure objects along the way.
    fn lookup_outward(&self, name: &str) -> Option<Handle> {
        for frame in self.frames.iter().rev() {
            if let Some(value) = self.env_get(frame.env, name) {
                return Some(value);
            }
            if let Some(closure) = frame.closure {
                if let Some(value) = self.env_get(closure, name) {
                    return Some(value);
                }
            }
        }
        None
    }

    fn local_name(&self, index: usize) -> RaskResult<String> {
        let frame = self.top_frame()?;
        frame
            .template
            .names
            .get(index)
            .cloned()
            .ok_or_else(|| RaskError::internal(format!("name index {} out of range", index)))
    }

    fn global_name(&self, index: usize) -> RaskResult<String> {
        let frame = self.top_frame()?;
        frame
            .template
            .globals
            .get(index)
            .cloned()
            .ok_or_else(|| RaskError::internal(format!("global index {} out of range", index)))
    }

    fn deref_name(&self, index: usize) -> RaskResult<String> {
        let frame = self.top_frame()?;
        frame
            .template
            .derefs
            .get(index)
            .cloned()
            .ok_or_else(|| RaskError::internal(format!("deref index {} out of range", index)))
    }

    fn const_value(&self, index: usize) -> RaskResult<Handle> {
        let frame = self.top_frame()?;
        match frame.template.consts.get(index) {
            Some(TemplateConst::Value(handle)) => Ok(*handle),
            Some(TemplateConst::Unit(_)) => Err(RaskError::internal(
                "unit constant loaded outside MAKE_FUNCTION",
            )),
            None => Err(RaskError::internal(format!(
                "constant index {} out of range",
                index
            ))),
        }
    }

    fn const_string(&self, index: usize) -> RaskResult<String> {
        let handle = self.const_value(index)?;
        match self.heap.get(handle) {
            Value::Str(s) => Ok(s.clone()),
            _ => Err(RaskError::internal("expected a string constant")),
        }
    }

    fn const_unit(&self, index: usize) -> RaskResult<Rc<UnitTemplate>> {
        let frame = self.top_frame()?;
        match frame.template.consts.get(index) {
            Some(TemplateConst::Unit(template)) => Ok(Rc::clone(template)),
            _ => Err(RaskError::internal("expected a unit constant")),
        }
    }

    // ==================== Collection ====================

    /// Roots are everything the frame stack can still reach: operand stacks
    /// at stack level, environments, closures, return slots, and the final
    /// result at environment level.
    fn collect_garbage(&mut self) {
        let mut stack_roots = Vec::new();
        let mut env_roots = Vec::new();
        for frame in &self.frames {
            stack_roots.extend_from_slice(&frame.stack);
            env_roots.push(frame.env);
            if let Some(closure) = frame.closure {
                env_roots.push(closure);
            }
            env_roots.push(frame.ret);
        }
        env_roots.push(self.result);
        self.heap.collect(stack_roots, env_roots);
    }

    // ==================== Errors ====================

    fn capture_stack_trace(&self, span: Span) -> Vec<StackFrame> {
        let mut trace = Vec::with_capacity(self.frames.len());
        let mut location = span;
        for frame in self.frames.iter().rev() {
            trace.push(StackFrame::new(
                frame.template.name.clone(),
                frame.template.file.clone(),
                location.start.line,
                location.start.column,
            ));
            location = frame.call_span;
        }
        trace
    }

    /// Attach the failing instruction's location, a source excerpt when the
    /// host has one, and the call stack.
    fn locate(&self, mut err: RaskError, span: Span) -> RaskError {
        if err.file == "<vm>" {
            let file = self
                .frames
                .last()
                .map(|f| f.template.file.clone())
                .unwrap_or_else(|| "<vm>".to_string());
            err = err.located(span, file);
        }
        if let Some(source) = self.host.source(&err.file) {
            err = err.with_source(&source);
        }
        if err.stack_trace.is_empty() {
            err = err.with_stack_trace(self.capture_stack_trace(span));
        }
        err
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
