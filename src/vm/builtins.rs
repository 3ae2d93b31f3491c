// Rask Native Functions
// Host-provided functions callable from bytecode. A builtin either returns a
// finished value or hands the interpreter a new frame to run, which is how
// nested file execution re-enters the dispatch loop.

use crate::compiler::unit::Program;
use crate::error::{ErrorKind, RaskError, RaskResult, Span, StackFrame};
use crate::vm::frame::{Frame, UnitTemplate};
use crate::vm::heap::Heap;
use crate::vm::value::{FunctionKind, Handle, PropMap, Value};

/// Outcome of a builtin call.
#[derive(Debug)]
pub enum BuiltinFlow {
    /// The call finished; push this value.
    Value(Handle),
    /// The call set up compiled code; push this frame and keep dispatching.
    Frame(Box<Frame>),
}

/// Everything a builtin may touch while the interpreter is suspended.
pub struct BuiltinCtx<'a> {
    pub heap: &'a mut Heap,
    pub host: &'a mut dyn Host,
    pub receiver: Option<Handle>,
    pub args: Vec<Handle>,
    pub span: Span,
    pub stack_trace: Vec<StackFrame>,
}

pub type BuiltinFn = fn(&mut BuiltinCtx) -> RaskResult<BuiltinFlow>;

/// Services the embedding application provides to the runtime.
pub trait Host {
    /// Load and generate code for another source file.
    fn load_program(&mut self, path: &str) -> RaskResult<Program>;

    /// Source text for error excerpts, when available.
    fn source(&self, file: &str) -> Option<String>;
}

/// Host that refuses file loading; used by embedders that evaluate a single
/// in-memory program.
#[derive(Debug, Default)]
pub struct NoopHost;

impl Host for NoopHost {
    fn load_program(&mut self, path: &str) -> RaskResult<Program> {
        Err(RaskError::raised(
            ErrorKind::RuntimeError,
            format!("file execution is not available (requested {:?})", path),
        ))
    }

    fn source(&self, _file: &str) -> Option<String> {
        None
    }
}

/// Register the standard namespace objects into a global environment.
pub fn install(heap: &mut Heap, global_env: Handle) {
    let log = heap.function("log", FunctionKind::Builtin(console_log));
    let trace = heap.function("trace", FunctionKind::Builtin(console_trace));
    let mut console = PropMap::new();
    console.insert("log", log);
    console.insert("trace", trace);
    let console = heap.object(console);

    let exec_file = heap.function("exec_file", FunctionKind::Builtin(sys_exec_file));
    let mut sys = PropMap::new();
    sys.insert("exec_file", exec_file);
    let sys = heap.object(sys);

    let keys = heap.function("__keys", FunctionKind::Builtin(enumeration_keys));

    match heap.get_mut(global_env) {
        Value::Object(props) => {
            props.insert("console", console);
            props.insert("sys", sys);
            props.insert("__keys", keys);
        }
        _ => unreachable!("global environment is always an object"),
    }
}

fn render_args(ctx: &BuiltinCtx) -> String {
    let parts: Vec<String> = ctx.args.iter().map(|h| ctx.heap.render(*h)).collect();
    parts.join(" ")
}

fn console_log(ctx: &mut BuiltinCtx) -> RaskResult<BuiltinFlow> {
    println!("{}", render_args(ctx));
    Ok(BuiltinFlow::Value(ctx.heap.undefined()))
}

fn console_trace(ctx: &mut BuiltinCtx) -> RaskResult<BuiltinFlow> {
    let header = render_args(ctx);
    if header.is_empty() {
        println!("Trace");
    } else {
        println!("Trace: {}", header);
    }
    for frame in &ctx.stack_trace {
        println!(
            "    at {} ({}:{}:{})",
            frame.function_name, frame.file, frame.line, frame.column
        );
    }
    Ok(BuiltinFlow::Value(ctx.heap.undefined()))
}

/// Execute another source file on the same frame stack. The loaded program
/// runs to completion before the caller resumes, and its top-level return
/// value becomes this call's result.
fn sys_exec_file(ctx: &mut BuiltinCtx) -> RaskResult<BuiltinFlow> {
    let path = match ctx.args.first() {
        Some(h) => ctx.heap.render(*h),
        None => {
            return Err(RaskError::raised(ErrorKind::ArgumentError, "exec_file expects a path argument"));
        }
    };
    let program = ctx.host.load_program(&path)?;
    let template = UnitTemplate::prepare(&program, 0, ctx.heap)?;
    let env = ctx.heap.new_object();
    let undefined = ctx.heap.undefined();
    let frame = Frame::new(template, env, None, undefined, ctx.span);
    Ok(BuiltinFlow::Frame(Box::new(frame)))
}

/// Enumeration keys for `for (k in v)`: object property names in insertion
/// order, array indices as decimal strings, empty for every other kind.
fn enumeration_keys(ctx: &mut BuiltinCtx) -> RaskResult<BuiltinFlow> {
    let subject = match ctx.args.first() {
        Some(h) => *h,
        None => {
            let empty = ctx.heap.array(Vec::new());
            return Ok(BuiltinFlow::Value(empty));
        }
    };
    let keys: Vec<String> = match ctx.heap.get(subject) {
        Value::Object(props) => props.keys().to_vec(),
        Value::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    };
    let handles: Vec<Handle> = keys.into_iter().map(|k| ctx.heap.string(k)).collect();
    let array = ctx.heap.array(handles);
    Ok(BuiltinFlow::Value(array))
}

/// Kind-level attribute lookup consulted before failing an attribute read.
pub fn kind_attr(heap: &mut Heap, receiver: Handle, name: &str) -> Option<Handle> {
    let length = match (heap.get(receiver), name) {
        (Value::Str(s), "length") => Some(s.chars().count() as f64),
        (Value::Array(items), "length") => Some(items.len() as f64),
        _ => None,
    }?;
    Some(heap.number(length))
}

/// Kind-level method lookup consulted by method calls on non-object
/// receivers.
pub fn kind_method(heap: &mut Heap, receiver: Handle, name: &str) -> Option<Handle> {
    let builtin: BuiltinFn = match (heap.get(receiver).kind(), name) {
        (crate::vm::value::ValueKind::Array, "join") => array_join,
        (crate::vm::value::ValueKind::Regex, "test") => regex_test,
        _ => return None,
    };
    Some(heap.function(name, FunctionKind::Builtin(builtin)))
}

fn array_join(ctx: &mut BuiltinCtx) -> RaskResult<BuiltinFlow> {
    let receiver = ctx
        .receiver
        .ok_or_else(|| RaskError::raised(ErrorKind::TypeError, "join called without a receiver"))?;
    let separator = match ctx.args.first() {
        Some(h) => ctx.heap.render(*h),
        None => ",".to_string(),
    };
    let items = match ctx.heap.get(receiver) {
        Value::Array(items) => items.clone(),
        _ => return Err(RaskError::raised(ErrorKind::TypeError, "join requires an array receiver")),
    };
    let parts: Vec<String> = items
        .iter()
        .map(|h| match ctx.heap.get(*h) {
            Value::Null | Value::Undefined => String::new(),
            _ => ctx.heap.render(*h),
        })
        .collect();
    let joined = ctx.heap.string(parts.join(&separator));
    Ok(BuiltinFlow::Value(joined))
}

fn regex_test(ctx: &mut BuiltinCtx) -> RaskResult<BuiltinFlow> {
    let receiver = ctx
        .receiver
        .ok_or_else(|| RaskError::raised(ErrorKind::TypeError, "test called without a receiver"))?;
    let subject = match ctx.args.first() {
        Some(h) => ctx.heap.render(*h),
        None => String::new(),
    };
    let matched = match ctx.heap.get(receiver) {
        Value::Regex(r) => match &r.compiled {
            Some(re) => re.is_match(&subject),
            None => false,
        },
        _ => return Err(RaskError::raised(ErrorKind::TypeError, "test requires a regex receiver")),
    };
    Ok(BuiltinFlow::Value(ctx.heap.boolean(matched)))
}
