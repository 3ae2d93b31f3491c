// Rask Code Generator
// Lowers the symbol graph to stack bytecode. Each function body becomes one
// code unit; name references resolve once per spelling to one of four
// storage classes and keep that class for the whole unit.

use crate::ast::Node;
use crate::compiler::opcode::OpCode;
use crate::compiler::symbol::{
    BinaryOp, Expr, ForInit, FunctionDef, Lit, MemberSeg, PostfixOp, Stmt, SymbolBuilder, UnaryOp,
    VarDecl,
};
use crate::compiler::unit::{CodeUnit, Program};
use crate::error::{RaskError, RaskResult, Span};
use rustc_hash::{FxHashMap, FxHashSet};

/// Where a resolved name lives at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Storage {
    /// Named binding in the current environment, top-level form.
    Local(usize),
    /// Named binding in the current environment, function-local form.
    Fast(usize),
    /// Captured binding in the closure object.
    Deref(usize),
    /// Binding in the outermost environment.
    Global(usize),
}

/// Jump sites waiting for the end (or the update point) of the loop being
/// generated.
#[derive(Debug, Default)]
struct LoopCtx {
    breaks: Vec<usize>,
    continues: Vec<usize>,
}

struct FunctionScope {
    unit: CodeUnit,
    /// Parameters plus every hoisted declaration of this function.
    declared: FxHashSet<String>,
    /// Storage decisions already made; a spelling never changes class.
    resolved: FxHashMap<String, Storage>,
    loops: Vec<LoopCtx>,
}

/// Compile a parsed tree into a program.
pub fn compile(root: &Node, file: &str) -> RaskResult<Program> {
    let body = SymbolBuilder::new(file).build_program(root)?;
    compile_body(&body, file)
}

/// Compile an already-built statement list into a program.
pub fn compile_body(body: &[Stmt], file: &str) -> RaskResult<Program> {
    let mut gen = CodeGen {
        file,
        scopes: Vec::new(),
        units: Vec::new(),
        temp_counter: 0,
    };
    gen.gen_unit("<main>", &[], body, false, Span::default())?;
    Ok(Program {
        file: file.to_string(),
        units: gen.units,
    })
}

struct CodeGen<'a> {
    file: &'a str,
    scopes: Vec<FunctionScope>,
    units: Vec<CodeUnit>,
    temp_counter: usize,
}

impl<'a> CodeGen<'a> {
    fn syntax(&self, message: impl Into<String>, span: Span) -> RaskError {
        RaskError::syntax(message, span, self.file)
    }

    fn scope(&mut self) -> &mut FunctionScope {
        self.scopes.last_mut().expect("scope stack is never empty")
    }

    fn unit(&mut self) -> &mut CodeUnit {
        &mut self.scope().unit
    }

    // ==================== Units ====================

    /// Generate one code unit and return its program-wide id.
    fn gen_unit(
        &mut self,
        name: &str,
        params: &[String],
        body: &[Stmt],
        is_function: bool,
        span: Span,
    ) -> RaskResult<usize> {
        let mut declared = FxHashSet::default();
        for param in params {
            if !declared.insert(param.clone()) {
                return Err(self.syntax(format!("duplicate parameter {}", param), span));
            }
        }
        if is_function {
            declared.insert("arguments".to_string());
        }
        self.hoist(body, &mut declared)?;

        let unit_id = self.units.len();
        self.units.push(CodeUnit::default());

        let mut unit = CodeUnit::new(name);
        unit.args = params.to_vec();
        self.scopes.push(FunctionScope {
            unit,
            declared,
            resolved: FxHashMap::default(),
            loops: Vec::new(),
        });

        // Function declarations bind before any other statement runs.
        for stmt in body {
            if let Stmt::Function(def) = stmt {
                let name = def
                    .name
                    .clone()
                    .ok_or_else(|| self.syntax("function declaration needs a name", def.span))?;
                self.gen_function_value(def, None)?;
                let storage = self.resolve(&name);
                self.emit_store(storage, def.span);
                self.unit().emit(OpCode::PopTop, def.span);
            }
        }
        for stmt in body {
            if !matches!(stmt, Stmt::Function(_)) {
                self.gen_stmt(stmt)?;
            }
        }
        // Implicit `return undefined` closes every unit.
        self.unit().emit(OpCode::LoadUndefined, span);
        self.unit().emit(OpCode::ReturnValue, span);

        let scope = self.scopes.pop().expect("scope stack is never empty");
        self.units[unit_id] = scope.unit;
        Ok(unit_id)
    }

    /// Emit the value form of a function: generate its unit, wire the
    /// captures it registered, then MAKE_FUNCTION.
    fn gen_function_value(&mut self, def: &FunctionDef, hint: Option<&str>) -> RaskResult<()> {
        let span = def.span;
        let display = def
            .name
            .clone()
            .or_else(|| hint.map(str::to_string))
            .unwrap_or_default();
        let unit_name = if display.is_empty() {
            "<anonymous>".to_string()
        } else {
            display.clone()
        };
        let child = self.gen_unit(&unit_name, &def.params, &def.body, true, span)?;

        let captures = self.units[child].closures().to_vec();
        for capture in &captures {
            let key = self.unit().pool.add_string(capture);
            self.unit().emit1(OpCode::LoadConst, key, span);
            let name = self.unit().pool.add_name(capture);
            self.unit().emit1(OpCode::LoadClosure, name, span);
        }
        if !captures.is_empty() {
            let count = captures.len();
            self.unit().emit1(OpCode::BuildMap, count, span);
        }
        let debug_name = self.unit().pool.add_string(&display);
        self.unit().emit1(OpCode::LoadConst, debug_name, span);
        let unit_const = self.unit().pool.add_unit(child);
        let flags = if captures.is_empty() { 0 } else { 1 };
        self.unit().emit2(OpCode::MakeFunction, unit_const, flags, span);
        Ok(())
    }

    /// Collect the declarations a unit hoists: `var` names, `for`/`for-in`
    /// declarations, and function-declaration names. Nested function bodies
    /// hoist into their own units. Declaring a spelling twice in one unit,
    /// or on top of a parameter, is a compile error.
    fn hoist(&self, body: &[Stmt], declared: &mut FxHashSet<String>) -> RaskResult<()> {
        for stmt in body {
            match stmt {
                Stmt::Var { decls, .. } => {
                    for decl in decls {
                        self.declare(&decl.name, decl.span, declared)?;
                    }
                }
                Stmt::Block { body, .. } => self.hoist(body, declared)?,
                Stmt::If {
                    then_branch,
                    else_branch,
                    ..
                } => {
                    self.hoist(std::slice::from_ref(then_branch), declared)?;
                    if let Some(else_branch) = else_branch {
                        self.hoist(std::slice::from_ref(else_branch), declared)?;
                    }
                }
                Stmt::While { body, .. } => self.hoist(std::slice::from_ref(body), declared)?,
                Stmt::For { init, body, .. } => {
                    if let Some(ForInit::Var(decls)) = init {
                        for decl in decls {
                            self.declare(&decl.name, decl.span, declared)?;
                        }
                    }
                    self.hoist(std::slice::from_ref(body), declared)?;
                }
                Stmt::ForIn {
                    declares,
                    name,
                    body,
                    span,
                    ..
                } => {
                    if *declares {
                        self.declare(name, *span, declared)?;
                    }
                    self.hoist(std::slice::from_ref(body), declared)?;
                }
                Stmt::Function(def) => {
                    if let Some(name) = &def.name {
                        self.declare(name, def.span, declared)?;
                    }
                }
                Stmt::Expr { .. }
                | Stmt::Empty
                | Stmt::Break { .. }
                | Stmt::Continue { .. }
                | Stmt::Return { .. } => {}
            }
        }
        Ok(())
    }

    fn declare(
        &self,
        name: &str,
        span: Span,
        declared: &mut FxHashSet<String>,
    ) -> RaskResult<()> {
        if !declared.insert(name.to_string()) {
            return Err(self.syntax(format!("duplicate declaration of {}", name), span));
        }
        Ok(())
    }

    // ==================== Name resolution ====================

    /// Decide a name's storage class. Declared here wins, then a declaration
    /// in an enclosing function turns into a capture (registered through
    /// every scope in between), otherwise the name is global. The decision
    /// is cached so the class never shifts within a unit.
    fn resolve(&mut self, name: &str) -> Storage {
        let depth = self.scopes.len() - 1;
        if let Some(storage) = self.scopes[depth].resolved.get(name) {
            return *storage;
        }
        let storage = if self.scopes[depth].declared.contains(name) {
            let index = self.scopes[depth].unit.pool.add_name(name);
            if depth == 0 {
                Storage::Local(index)
            } else {
                Storage::Fast(index)
            }
        } else {
            let mut declaring = None;
            for d in (1..depth).rev() {
                if self.scopes[d].declared.contains(name) {
                    declaring = Some(d);
                    break;
                }
            }
            match declaring {
                Some(d) => {
                    for mid in d + 1..depth {
                        self.scopes[mid].unit.pool.add_deref(name);
                    }
                    let index = self.scopes[depth].unit.pool.add_deref(name);
                    Storage::Deref(index)
                }
                None => {
                    let index = self.scopes[depth].unit.pool.add_global(name);
                    Storage::Global(index)
                }
            }
        };
        self.scopes[depth]
            .resolved
            .insert(name.to_string(), storage);
        storage
    }

    fn emit_load(&mut self, storage: Storage, span: Span) {
        match storage {
            Storage::Local(i) => self.unit().emit1(OpCode::LoadName, i, span),
            Storage::Fast(i) => self.unit().emit1(OpCode::LoadFast, i, span),
            Storage::Deref(i) => self.unit().emit1(OpCode::LoadDeref, i, span),
            Storage::Global(i) => self.unit().emit1(OpCode::LoadGlobal, i, span),
        };
    }

    fn emit_store(&mut self, storage: Storage, span: Span) {
        match storage {
            Storage::Local(i) => self.unit().emit1(OpCode::StoreName, i, span),
            Storage::Fast(i) => self.unit().emit1(OpCode::StoreFast, i, span),
            Storage::Deref(i) => self.unit().emit1(OpCode::StoreDeref, i, span),
            Storage::Global(i) => self.unit().emit1(OpCode::StoreGlobal, i, span),
        };
    }

    // ==================== Statements ====================

    fn gen_stmt(&mut self, stmt: &Stmt) -> RaskResult<()> {
        match stmt {
            Stmt::Var { decls, .. } => {
                for decl in decls {
                    self.gen_var_decl(decl)?;
                }
                Ok(())
            }
            Stmt::Expr { expr, span } => {
                self.gen_expr(expr)?;
                self.unit().emit(OpCode::PopTop, *span);
                Ok(())
            }
            Stmt::Block { body, .. } => {
                for stmt in body {
                    self.gen_stmt(stmt)?;
                }
                Ok(())
            }
            Stmt::Empty => Ok(()),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                span,
            } => self.gen_if(cond, then_branch, else_branch.as_deref(), *span),
            Stmt::While { cond, body, span } => self.gen_while(cond, body, *span),
            Stmt::For {
                init,
                cond,
                update,
                body,
                span,
            } => self.gen_for(init.as_ref(), cond.as_ref(), update.as_ref(), body, *span),
            Stmt::ForIn {
                declares,
                name,
                object,
                body,
                span,
            } => self.gen_for_in(*declares, name, object, body, *span),
            Stmt::Break { span } => {
                if self.scope().loops.is_empty() {
                    return Err(self.syntax("break outside of a loop", *span));
                }
                let at = self.unit().emit1(OpCode::JumpAbsolute, 0, *span);
                if let Some(ctx) = self.scope().loops.last_mut() {
                    ctx.breaks.push(at);
                }
                Ok(())
            }
            Stmt::Continue { span } => {
                if self.scope().loops.is_empty() {
                    return Err(self.syntax("continue outside of a loop", *span));
                }
                let at = self.unit().emit1(OpCode::JumpAbsolute, 0, *span);
                if let Some(ctx) = self.scope().loops.last_mut() {
                    ctx.continues.push(at);
                }
                Ok(())
            }
            Stmt::Return { expr, span } => {
                match expr {
                    Some(expr) => self.gen_expr(expr)?,
                    None => {
                        self.unit().emit(OpCode::LoadUndefined, *span);
                    }
                }
                self.unit().emit(OpCode::ReturnValue, *span);
                Ok(())
            }
            // Declarations at the top of a body were bound during the
            // hoisting pass; one nested inside a block binds where it
            // appears.
            Stmt::Function(def) => {
                self.gen_function_value(def, None)?;
                let name = def
                    .name
                    .clone()
                    .ok_or_else(|| self.syntax("function declaration needs a name", def.span))?;
                let storage = self.resolve(&name);
                self.emit_store(storage, def.span);
                self.unit().emit(OpCode::PopTop, def.span);
                Ok(())
            }
        }
    }

    fn gen_var_decl(&mut self, decl: &VarDecl) -> RaskResult<()> {
        match &decl.init {
            Some(init) => self.gen_named_value(init, &decl.name)?,
            None => {
                self.unit().emit(OpCode::LoadUndefined, decl.span);
            }
        }
        let storage = self.resolve(&decl.name);
        self.emit_store(storage, decl.span);
        self.unit().emit(OpCode::PopTop, decl.span);
        Ok(())
    }

    /// Expression generation with a declaration-site name hint for anonymous
    /// functions.
    fn gen_named_value(&mut self, expr: &Expr, hint: &str) -> RaskResult<()> {
        match expr {
            Expr::Function(def) if def.name.is_none() => self.gen_function_value(def, Some(hint)),
            _ => self.gen_expr(expr),
        }
    }

    fn gen_if(
        &mut self,
        cond: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
        span: Span,
    ) -> RaskResult<()> {
        self.gen_expr(cond)?;
        let skip_then = self.unit().emit(OpCode::PopJumpIfFalse, span);
        self.gen_stmt(then_branch)?;
        match else_branch {
            Some(else_branch) => {
                // An absolute jump here tolerates an empty else branch.
                let skip_else = self.unit().emit(OpCode::JumpAbsolute, span);
                self.unit().patch_jump(skip_then);
                self.gen_stmt(else_branch)?;
                self.unit().patch_jump(skip_else);
            }
            None => {
                self.unit().patch_jump(skip_then);
            }
        }
        Ok(())
    }

    fn gen_while(&mut self, cond: &Expr, body: &Stmt, span: Span) -> RaskResult<()> {
        let cond_at = self.unit().current_index();
        self.gen_expr(cond)?;
        let exit = self.unit().emit(OpCode::PopJumpIfFalse, span);

        self.scope().loops.push(LoopCtx::default());
        self.gen_stmt(body)?;
        self.unit().emit1(OpCode::JumpAbsolute, cond_at, span);
        let ctx = self.scope().loops.pop().unwrap_or_default();

        self.unit().patch_jump(exit);
        self.patch_loop(ctx, cond_at);
        Ok(())
    }

    fn gen_for(
        &mut self,
        init: Option<&ForInit>,
        cond: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
        span: Span,
    ) -> RaskResult<()> {
        match init {
            Some(ForInit::Var(decls)) => {
                for decl in decls {
                    self.gen_var_decl(decl)?;
                }
            }
            Some(ForInit::Expr(expr)) => {
                self.gen_expr(expr)?;
                self.unit().emit(OpCode::PopTop, span);
            }
            None => {}
        }

        let cond_at = self.unit().current_index();
        let exit = match cond {
            Some(cond) => {
                self.gen_expr(cond)?;
                Some(self.unit().emit(OpCode::PopJumpIfFalse, span))
            }
            None => None,
        };

        self.scope().loops.push(LoopCtx::default());
        self.gen_stmt(body)?;
        let ctx = self.scope().loops.pop().unwrap_or_default();

        let update_at = self.unit().current_index();
        if let Some(update) = update {
            self.gen_expr(update)?;
            self.unit().emit(OpCode::PopTop, span);
        }
        self.unit().emit1(OpCode::JumpAbsolute, cond_at, span);

        if let Some(exit) = exit {
            self.unit().patch_jump(exit);
        }
        self.patch_loop(ctx, update_at);
        Ok(())
    }

    /// `for (k in v)` lowers to an index walk over the enumeration keys of
    /// `v`, fetched through the `__keys` intrinsic.
    fn gen_for_in(
        &mut self,
        declares: bool,
        name: &str,
        object: &Expr,
        body: &Stmt,
        span: Span,
    ) -> RaskResult<()> {
        let _ = declares; // hoisting already recorded the declaration
        let iter_name = format!("#iter{}", self.temp_counter);
        let idx_name = format!("#idx{}", self.temp_counter);
        self.temp_counter += 1;
        self.scope().declared.insert(iter_name.clone());
        self.scope().declared.insert(idx_name.clone());
        let iter = self.resolve(&iter_name);
        let idx = self.resolve(&idx_name);

        // #iter = __keys(object)
        let keys_fn = self.unit().pool.add_global("__keys");
        self.unit().emit1(OpCode::LoadGlobal, keys_fn, span);
        self.gen_expr(object)?;
        self.unit().emit1(OpCode::CallFunction, 1, span);
        self.emit_store(iter, span);
        self.unit().emit(OpCode::PopTop, span);

        // #idx = 0
        self.unit().emit(OpCode::LoadZero, span);
        self.emit_store(idx, span);
        self.unit().emit(OpCode::PopTop, span);

        // while (#idx < #iter.length)
        let cond_at = self.unit().current_index();
        self.emit_load(idx, span);
        self.emit_load(iter, span);
        let length = self.unit().pool.add_string("length");
        self.unit().emit1(OpCode::LoadAttr, length, span);
        self.unit().emit(OpCode::CompareLess, span);
        let exit = self.unit().emit(OpCode::PopJumpIfFalse, span);

        // name = #iter[#idx]
        self.emit_load(iter, span);
        self.emit_load(idx, span);
        self.unit().emit(OpCode::BinarySubscr, span);
        let target = self.resolve(name);
        self.emit_store(target, span);
        self.unit().emit(OpCode::PopTop, span);

        self.scope().loops.push(LoopCtx::default());
        self.gen_stmt(body)?;
        let ctx = self.scope().loops.pop().unwrap_or_default();

        // #idx = #idx + 1
        let update_at = self.unit().current_index();
        self.emit_load(idx, span);
        self.unit().emit(OpCode::BinaryInc, span);
        self.emit_store(idx, span);
        self.unit().emit(OpCode::PopTop, span);
        self.unit().emit1(OpCode::JumpAbsolute, cond_at, span);

        self.unit().patch_jump(exit);
        self.patch_loop(ctx, update_at);
        Ok(())
    }

    fn patch_loop(&mut self, ctx: LoopCtx, continue_target: usize) {
        for at in ctx.breaks {
            self.unit().patch_jump(at);
        }
        for at in ctx.continues {
            self.unit().patch_jump_to(at, continue_target);
        }
    }

    // ==================== Expressions ====================

    fn gen_expr(&mut self, expr: &Expr) -> RaskResult<()> {
        match expr {
            Expr::Literal { lit, span } => {
                self.gen_literal(lit, *span);
                Ok(())
            }
            Expr::Ident { name, span } => {
                let storage = self.resolve(name);
                self.emit_load(storage, *span);
                Ok(())
            }
            Expr::Unary { op, expr, span } => self.gen_unary(*op, expr, *span),
            Expr::Postfix { op, expr, span } => self.gen_postfix(*op, expr, *span),
            Expr::Binary { op, lhs, rhs, span } => self.gen_binary(*op, lhs, rhs, *span),
            Expr::Ternary {
                cond,
                then_val,
                else_val,
                span,
            } => {
                self.gen_expr(cond)?;
                let skip_then = self.unit().emit(OpCode::PopJumpIfFalse, *span);
                self.gen_expr(then_val)?;
                let skip_else = self.unit().emit(OpCode::JumpForward, *span);
                self.unit().patch_jump(skip_then);
                self.gen_expr(else_val)?;
                self.unit().patch_jump(skip_else);
                Ok(())
            }
            Expr::Assign {
                target,
                op,
                value,
                span,
            } => self.gen_assign(target, *op, value, *span),
            Expr::Member { base, segs, .. } => {
                self.gen_expr(base)?;
                for seg in segs {
                    self.gen_member_load(seg)?;
                }
                Ok(())
            }
            Expr::Call {
                callee,
                method,
                args,
                span,
            } => {
                self.gen_expr(callee)?;
                if let Some((name, name_span)) = method {
                    let method_const = self.unit().pool.add_string(name);
                    self.unit().emit1(OpCode::LoadMethod, method_const, *name_span);
                }
                for arg in args {
                    self.gen_expr(arg)?;
                }
                let count = args.len();
                match method {
                    Some(_) => self.unit().emit1(OpCode::CallMethod, count, *span),
                    None => self.unit().emit1(OpCode::CallFunction, count, *span),
                };
                Ok(())
            }
            Expr::Array { items, span } => {
                for item in items {
                    self.gen_expr(item)?;
                }
                let count = items.len();
                self.unit().emit1(OpCode::BuildList, count, *span);
                Ok(())
            }
            Expr::Object { props, span } => {
                for (key, value) in props {
                    let key_const = self.unit().pool.add_string(key);
                    self.unit().emit1(OpCode::LoadConst, key_const, *span);
                    self.gen_named_value(value, key)?;
                }
                let count = props.len();
                self.unit().emit1(OpCode::BuildMap, count, *span);
                Ok(())
            }
            Expr::Function(def) => self.gen_function_value(def, None),
            Expr::Sequence { exprs, span } => {
                let last = exprs.len().saturating_sub(1);
                for (i, expr) in exprs.iter().enumerate() {
                    self.gen_expr(expr)?;
                    if i != last {
                        self.unit().emit(OpCode::PopTop, *span);
                    }
                }
                Ok(())
            }
        }
    }

    fn gen_literal(&mut self, lit: &Lit, span: Span) {
        match lit {
            Lit::Number(n) => {
                if *n == 0.0 && n.is_sign_positive() {
                    self.unit().emit(OpCode::LoadZero, span);
                } else {
                    let index = self.unit().pool.add_number(*n);
                    self.unit().emit1(OpCode::LoadConst, index, span);
                }
            }
            Lit::Str(s) => {
                let index = self.unit().pool.add_string(s);
                self.unit().emit1(OpCode::LoadConst, index, span);
            }
            Lit::Regex(r) => {
                let index = self.unit().pool.add_regex(r);
                self.unit().emit1(OpCode::LoadConst, index, span);
            }
            Lit::True => {
                self.unit().emit(OpCode::LoadTrue, span);
            }
            Lit::False => {
                self.unit().emit(OpCode::LoadFalse, span);
            }
            Lit::Null => {
                self.unit().emit(OpCode::LoadNull, span);
            }
            Lit::Undefined => {
                self.unit().emit(OpCode::LoadUndefined, span);
            }
        }
    }

    fn gen_unary(&mut self, op: UnaryOp, expr: &Expr, span: Span) -> RaskResult<()> {
        let opcode = match op {
            UnaryOp::Positive => OpCode::UnaryPositive,
            UnaryOp::Negative => OpCode::UnaryNegative,
            UnaryOp::Not => OpCode::UnaryNot,
            UnaryOp::Invert => OpCode::UnaryInvert,
            UnaryOp::Typeof => OpCode::UnaryTypeof,
            UnaryOp::PreInc => return self.gen_prefix_step(OpCode::BinaryInc, expr, span),
            UnaryOp::PreDec => return self.gen_prefix_step(OpCode::BinaryDec, expr, span),
        };
        self.gen_expr(expr)?;
        self.unit().emit(opcode, span);
        Ok(())
    }

    /// `++x`: the stepped value is both stored and left as the result.
    fn gen_prefix_step(&mut self, step: OpCode, target: &Expr, span: Span) -> RaskResult<()> {
        match target {
            Expr::Ident { name, span: at } => {
                let storage = self.resolve(name);
                self.emit_load(storage, *at);
                self.unit().emit(step, span);
                self.unit().emit(OpCode::DupTop, span);
                self.emit_store(storage, span);
                self.unit().emit(OpCode::PopTop, span);
                Ok(())
            }
            Expr::Member { base, segs, span: at } => {
                self.gen_member_read(base, segs)?;
                self.unit().emit(step, span);
                self.unit().emit(OpCode::DupTop, span);
                self.gen_member_store(base, segs, *at)?;
                Ok(())
            }
            other => Err(self.syntax("invalid increment target", other.span())),
        }
    }

    /// `x++`: the old value is the result; the stepped value is stored.
    fn gen_postfix(&mut self, op: PostfixOp, target: &Expr, span: Span) -> RaskResult<()> {
        let step = match op {
            PostfixOp::Inc => OpCode::BinaryInc,
            PostfixOp::Dec => OpCode::BinaryDec,
        };
        match target {
            Expr::Ident { name, span: at } => {
                let storage = self.resolve(name);
                self.emit_load(storage, *at);
                self.unit().emit(OpCode::DupTop, span);
                self.unit().emit(step, span);
                self.emit_store(storage, span);
                self.unit().emit(OpCode::PopTop, span);
                Ok(())
            }
            Expr::Member { base, segs, span: at } => {
                self.gen_member_read(base, segs)?;
                self.unit().emit(OpCode::DupTop, span);
                self.unit().emit(step, span);
                self.gen_member_store(base, segs, *at)?;
                Ok(())
            }
            other => Err(self.syntax("invalid increment target", other.span())),
        }
    }

    fn gen_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr, span: Span) -> RaskResult<()> {
        match op {
            BinaryOp::LogicalAnd => {
                self.gen_expr(lhs)?;
                let end = self.unit().emit(OpCode::JumpIfFalseOrPop, span);
                self.gen_expr(rhs)?;
                self.unit().patch_jump(end);
                Ok(())
            }
            BinaryOp::LogicalOr => {
                self.gen_expr(lhs)?;
                let end = self.unit().emit(OpCode::JumpIfTrueOrPop, span);
                self.gen_expr(rhs)?;
                self.unit().patch_jump(end);
                Ok(())
            }
            _ => {
                self.gen_expr(lhs)?;
                self.gen_expr(rhs)?;
                self.unit().emit(binary_opcode(op), span);
                Ok(())
            }
        }
    }

    fn gen_assign(
        &mut self,
        target: &Expr,
        op: Option<BinaryOp>,
        value: &Expr,
        span: Span,
    ) -> RaskResult<()> {
        match target {
            Expr::Ident { name, span: at } => {
                match op {
                    Some(op) => {
                        let storage = self.resolve(name);
                        self.emit_load(storage, *at);
                        self.gen_expr(value)?;
                        self.unit().emit(binary_opcode(op), span);
                    }
                    None => self.gen_named_value(value, name)?,
                }
                let storage = self.resolve(name);
                self.emit_store(storage, span);
                Ok(())
            }
            Expr::Member { base, segs, span: at } => {
                match op {
                    Some(op) => {
                        self.gen_member_read(base, segs)?;
                        self.gen_expr(value)?;
                        self.unit().emit(binary_opcode(op), span);
                    }
                    None => self.gen_expr(value)?,
                }
                self.unit().emit(OpCode::DupTop, span);
                self.gen_member_store(base, segs, *at)?;
                Ok(())
            }
            other => Err(self.syntax("invalid assignment target", other.span())),
        }
    }

    /// Push the current value of a member chain.
    fn gen_member_read(&mut self, base: &Expr, segs: &[MemberSeg]) -> RaskResult<()> {
        self.gen_expr(base)?;
        for seg in segs {
            self.gen_member_load(seg)?;
        }
        Ok(())
    }

    fn gen_member_load(&mut self, seg: &MemberSeg) -> RaskResult<()> {
        match seg {
            MemberSeg::Attr(name, at) => {
                let index = self.unit().pool.add_string(name);
                self.unit().emit1(OpCode::LoadAttr, index, *at);
            }
            MemberSeg::Index(expr, at) => {
                self.gen_expr(expr)?;
                self.unit().emit(OpCode::BinarySubscr, *at);
            }
        }
        Ok(())
    }

    /// Store the stack top into a member chain's final segment. The receiver
    /// expression is re-evaluated here, so chains with side effects in the
    /// receiver run it once per access.
    fn gen_member_store(&mut self, base: &Expr, segs: &[MemberSeg], span: Span) -> RaskResult<()> {
        let (last, prefix) = match segs.split_last() {
            Some(pair) => pair,
            None => return Err(self.syntax("invalid assignment target", span)),
        };
        self.gen_expr(base)?;
        for seg in prefix {
            self.gen_member_load(seg)?;
        }
        match last {
            MemberSeg::Attr(name, at) => {
                let index = self.unit().pool.add_string(name);
                self.unit().emit1(OpCode::StoreAttr, index, *at);
            }
            MemberSeg::Index(expr, at) => {
                self.gen_expr(expr)?;
                self.unit().emit(OpCode::StoreSubscr, *at);
            }
        }
        Ok(())
    }
}

fn binary_opcode(op: BinaryOp) -> OpCode {
    match op {
        BinaryOp::Add => OpCode::BinaryAdd,
        BinaryOp::Sub => OpCode::BinarySubtract,
        BinaryOp::Mul => OpCode::BinaryMultiply,
        BinaryOp::Div => OpCode::BinaryTrueDivide,
        BinaryOp::Mod => OpCode::BinaryModulo,
        BinaryOp::Power => OpCode::BinaryPower,
        BinaryOp::Lshift => OpCode::BinaryLshift,
        BinaryOp::Rshift => OpCode::BinaryRshift,
        BinaryOp::Urshift => OpCode::BinaryUrshift,
        BinaryOp::BitAnd => OpCode::BinaryAnd,
        BinaryOp::BitOr => OpCode::BinaryOr,
        BinaryOp::BitXor => OpCode::BinaryXor,
        BinaryOp::Less => OpCode::CompareLess,
        BinaryOp::LessEqual => OpCode::CompareLessEqual,
        BinaryOp::Greater => OpCode::CompareGreater,
        BinaryOp::GreaterEqual => OpCode::CompareGreaterEqual,
        BinaryOp::Equal => OpCode::CompareEqual,
        BinaryOp::NotEqual => OpCode::CompareNotEqual,
        BinaryOp::StrictEqual => OpCode::CompareStrictEqual,
        BinaryOp::StrictNotEqual => OpCode::CompareStrictNotEqual,
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
            // Short-circuit forms never reach here.
            OpCode::PopTop
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::vm::vm::Vm;

    fn sp() -> Span {
        Span::default()
    }

    fn num(n: f64) -> Expr {
        Expr::Literal {
            lit: Lit::Number(n),
            span: sp(),
        }
    }

    fn string(s: &str) -> Expr {
        Expr::Literal {
            lit: Lit::Str(s.to_string()),
            span: sp(),
        }
    }

    fn ident(name: &str) -> Expr {
        Expr::Ident {
            name: name.to_string(),
            span: sp(),
        }
    }

    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            span: sp(),
        }
    }

    fn assign(target: Expr, value: Expr) -> Expr {
        Expr::Assign {
            target: Box::new(target),
            op: None,
            value: Box::new(value),
            span: sp(),
        }
    }

    fn call(callee: Expr, args: Vec<Expr>) -> Expr {
        Expr::Call {
            callee: Box::new(callee),
            method: None,
            args,
            span: sp(),
        }
    }

    fn var(name: &str, init: Expr) -> Stmt {
        Stmt::Var {
            decls: vec![VarDecl {
                name: name.to_string(),
                init: Some(init),
                span: sp(),
            }],
            span: sp(),
        }
    }

    fn expr_stmt(expr: Expr) -> Stmt {
        Stmt::Expr { expr, span: sp() }
    }

    fn ret(expr: Expr) -> Stmt {
        Stmt::Return {
            expr: Some(expr),
            span: sp(),
        }
    }

    fn function(name: &str, params: &[&str], body: Vec<Stmt>) -> FunctionDef {
        FunctionDef {
            name: Some(name.to_string()),
            params: params.iter().map(|p| p.to_string()).collect(),
            body,
            span: sp(),
        }
    }

    fn eval(body: Vec<Stmt>) -> String {
        let program = compile_body(&body, "test.rk").unwrap();
        let mut vm = Vm::new();
        let result = vm.eval_program(&program).unwrap();
        vm.render(result)
    }

    fn eval_err(body: Vec<Stmt>) -> crate::error::RaskError {
        let program = compile_body(&body, "test.rk").unwrap();
        let mut vm = Vm::new();
        vm.eval_program(&program).unwrap_err()
    }

    #[test]
    fn test_var_and_arithmetic() {
        // var x = 1 + 2; return x;
        let body = vec![
            var("x", binary(BinaryOp::Add, num(1.0), num(2.0))),
            ret(ident("x")),
        ];
        assert_eq!(eval(body), "3");
    }

    #[test]
    fn test_function_call() {
        // function double(x) { return x * 2; } return double(21);
        let body = vec![
            Stmt::Function(function(
                "double",
                &["x"],
                vec![ret(binary(BinaryOp::Mul, ident("x"), num(2.0)))],
            )),
            ret(call(ident("double"), vec![num(21.0)])),
        ];
        assert_eq!(eval(body), "42");
    }

    #[test]
    fn test_closure_counter() {
        // function make() {
        //   var n = 0;
        //   return function() { n = n + 1; return n; };
        // }
        // var f = make(); return f() + f();
        let inner = FunctionDef {
            name: None,
            params: vec![],
            body: vec![
                expr_stmt(assign(
                    ident("n"),
                    binary(BinaryOp::Add, ident("n"), num(1.0)),
                )),
                ret(ident("n")),
            ],
            span: sp(),
        };
        let body = vec![
            Stmt::Function(function(
                "make",
                &[],
                vec![
                    var("n", num(0.0)),
                    Stmt::Return {
                        expr: Some(Expr::Function(inner)),
                        span: sp(),
                    },
                ],
            )),
            var("f", call(ident("make"), vec![])),
            ret(binary(
                BinaryOp::Add,
                call(ident("f"), vec![]),
                call(ident("f"), vec![]),
            )),
        ];
        assert_eq!(eval(body), "3");
    }

    #[test]
    fn test_coercing_comparisons() {
        let body = vec![ret(binary(BinaryOp::Less, num(1.0), string("2")))];
        assert_eq!(eval(body), "true");
        let body = vec![ret(binary(BinaryOp::Less, string("abc"), string("abd")))];
        assert_eq!(eval(body), "true");
    }

    #[test]
    fn test_short_circuit_keeps_operand_value() {
        // return 0 || "x";
        let body = vec![ret(binary(BinaryOp::LogicalOr, num(0.0), string("x")))];
        assert_eq!(eval(body), "x");
        // return 0 && missing(); — the right side never evaluates
        let body = vec![ret(binary(
            BinaryOp::LogicalAnd,
            num(0.0),
            call(ident("missing"), vec![]),
        ))];
        assert_eq!(eval(body), "0");
    }

    #[test]
    fn test_ternary() {
        let body = vec![ret(Expr::Ternary {
            cond: Box::new(string("")),
            then_val: Box::new(num(1.0)),
            else_val: Box::new(num(2.0)),
            span: sp(),
        })];
        assert_eq!(eval(body), "2");
    }

    #[test]
    fn test_while_with_break_and_continue() {
        // var sum = 0; var i = 0;
        // while (true) {
        //   i = i + 1;
        //   if (i == 5) continue;
        //   if (i > 8) break;
        //   sum = sum + i;
        // }
        // return sum; — 1+2+3+4+6+7+8 == 31
        let body = vec![
            var("sum", num(0.0)),
            var("i", num(0.0)),
            Stmt::While {
                cond: Expr::Literal {
                    lit: Lit::True,
                    span: sp(),
                },
                body: Box::new(Stmt::Block {
                    body: vec![
                        expr_stmt(assign(
                            ident("i"),
                            binary(BinaryOp::Add, ident("i"), num(1.0)),
                        )),
                        Stmt::If {
                            cond: binary(BinaryOp::Equal, ident("i"), num(5.0)),
                            then_branch: Box::new(Stmt::Continue { span: sp() }),
                            else_branch: None,
                            span: sp(),
                        },
                        Stmt::If {
                            cond: binary(BinaryOp::Greater, ident("i"), num(8.0)),
                            then_branch: Box::new(Stmt::Break { span: sp() }),
                            else_branch: None,
                            span: sp(),
                        },
                        expr_stmt(assign(
                            ident("sum"),
                            binary(BinaryOp::Add, ident("sum"), ident("i")),
                        )),
                    ],
                    span: sp(),
                }),
                span: sp(),
            },
            ret(ident("sum")),
        ];
        assert_eq!(eval(body), "31");
    }

    #[test]
    fn test_for_loop() {
        // var sum = 0; for (var i = 0; i < 5; i++) sum = sum + i; return sum;
        let body = vec![
            var("sum", num(0.0)),
            Stmt::For {
                init: Some(ForInit::Var(vec![VarDecl {
                    name: "i".to_string(),
                    init: Some(num(0.0)),
                    span: sp(),
                }])),
                cond: Some(binary(BinaryOp::Less, ident("i"), num(5.0))),
                update: Some(Expr::Postfix {
                    op: PostfixOp::Inc,
                    expr: Box::new(ident("i")),
                    span: sp(),
                }),
                body: Box::new(expr_stmt(assign(
                    ident("sum"),
                    binary(BinaryOp::Add, ident("sum"), ident("i")),
                ))),
                span: sp(),
            },
            ret(ident("sum")),
        ];
        assert_eq!(eval(body), "10");
    }

    #[test]
    fn test_for_in_over_object_keys() {
        // var s = ""; for (var k in {a: 1, b: 2}) s = s + k; return s;
        let body = vec![
            var("s", string("")),
            Stmt::ForIn {
                declares: true,
                name: "k".to_string(),
                object: Expr::Object {
                    props: vec![("a".to_string(), num(1.0)), ("b".to_string(), num(2.0))],
                    span: sp(),
                },
                body: Box::new(expr_stmt(assign(
                    ident("s"),
                    binary(BinaryOp::Add, ident("s"), ident("k")),
                ))),
                span: sp(),
            },
            ret(ident("s")),
        ];
        assert_eq!(eval(body), "ab");
    }

    #[test]
    fn test_for_in_over_array_indices() {
        let body = vec![
            var("s", string("")),
            Stmt::ForIn {
                declares: true,
                name: "k".to_string(),
                object: Expr::Array {
                    items: vec![num(9.0), num(9.0), num(9.0)],
                    span: sp(),
                },
                body: Box::new(expr_stmt(assign(
                    ident("s"),
                    binary(BinaryOp::Add, ident("s"), ident("k")),
                ))),
                span: sp(),
            },
            ret(ident("s")),
        ];
        assert_eq!(eval(body), "012");
    }

    #[test]
    fn test_member_stores() {
        // var o = {}; o.a = 5; o["b"] = 6; return o.a + o.b;
        let attr = |name: &str| Expr::Member {
            base: Box::new(ident("o")),
            segs: vec![MemberSeg::Attr(name.to_string(), sp())],
            span: sp(),
        };
        let index = Expr::Member {
            base: Box::new(ident("o")),
            segs: vec![MemberSeg::Index(string("b"), sp())],
            span: sp(),
        };
        let body = vec![
            var(
                "o",
                Expr::Object {
                    props: vec![],
                    span: sp(),
                },
            ),
            expr_stmt(assign(attr("a"), num(5.0))),
            expr_stmt(assign(index, num(6.0))),
            ret(binary(BinaryOp::Add, attr("a"), attr("b"))),
        ];
        assert_eq!(eval(body), "11");
    }

    #[test]
    fn test_compound_and_postfix_steps() {
        // var x = 1; x += 2; return x++ + x; — 3 + 4
        let body = vec![
            var("x", num(1.0)),
            expr_stmt(Expr::Assign {
                target: Box::new(ident("x")),
                op: Some(BinaryOp::Add),
                value: Box::new(num(2.0)),
                span: sp(),
            }),
            ret(binary(
                BinaryOp::Add,
                Expr::Postfix {
                    op: PostfixOp::Inc,
                    expr: Box::new(ident("x")),
                    span: sp(),
                },
                ident("x"),
            )),
        ];
        assert_eq!(eval(body), "7");
    }

    #[test]
    fn test_prefix_step_yields_new_value() {
        // var x = 1; return ++x + x; — 2 + 2
        let body = vec![
            var("x", num(1.0)),
            ret(binary(
                BinaryOp::Add,
                Expr::Unary {
                    op: UnaryOp::PreInc,
                    expr: Box::new(ident("x")),
                    span: sp(),
                },
                ident("x"),
            )),
        ];
        assert_eq!(eval(body), "4");
    }

    #[test]
    fn test_typeof() {
        let body = vec![ret(Expr::Unary {
            op: UnaryOp::Typeof,
            expr: Box::new(num(1.0)),
            span: sp(),
        })];
        assert_eq!(eval(body), "number");
    }

    #[test]
    fn test_signed_zero_distinction() {
        // return 0 / -1; — stays "0"
        let body = vec![ret(binary(BinaryOp::Div, num(0.0), num(-1.0)))];
        assert_eq!(eval(body), "0");
        // return -(0); — renders "-0"
        let body = vec![ret(Expr::Unary {
            op: UnaryOp::Negative,
            expr: Box::new(num(0.0)),
            span: sp(),
        })];
        assert_eq!(eval(body), "-0");
    }

    #[test]
    fn test_undeclared_read_is_a_reference_error() {
        let body = vec![ret(ident("missing"))];
        let err = eval_err(body);
        assert_eq!(err.kind, ErrorKind::ReferenceError);
    }

    #[test]
    fn test_undeclared_assignment_creates_a_global() {
        // function f() { g = 5; } f(); return g;
        let body = vec![
            Stmt::Function(function(
                "f",
                &[],
                vec![expr_stmt(assign(ident("g"), num(5.0)))],
            )),
            expr_stmt(call(ident("f"), vec![])),
            ret(ident("g")),
        ];
        assert_eq!(eval(body), "5");
    }

    #[test]
    fn test_assignment_to_literal_is_rejected() {
        let body = vec![expr_stmt(assign(num(1.0), num(2.0)))];
        let err = compile_body(&body, "test.rk").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SyntaxError);
    }

    #[test]
    fn test_break_outside_loop_is_rejected() {
        let body = vec![Stmt::Break { span: sp() }];
        let err = compile_body(&body, "test.rk").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SyntaxError);
    }

    #[test]
    fn test_parameters_use_fast_storage() {
        let body = vec![Stmt::Function(function(
            "f",
            &["x"],
            vec![ret(ident("x"))],
        ))];
        let program = compile_body(&body, "test.rk").unwrap();
        let f = &program.units[1];
        assert!(f.instrs.iter().any(|i| i.op == OpCode::LoadFast));
        assert!(f.instrs.iter().all(|i| i.op != OpCode::LoadName));
    }

    #[test]
    fn test_capture_registers_once_per_spelling() {
        // Both the load and the store of `n` share one deref slot.
        let inner = FunctionDef {
            name: None,
            params: vec![],
            body: vec![
                expr_stmt(assign(
                    ident("n"),
                    binary(BinaryOp::Add, ident("n"), num(1.0)),
                )),
                ret(ident("n")),
            ],
            span: sp(),
        };
        let body = vec![Stmt::Function(function(
            "make",
            &[],
            vec![
                var("n", num(0.0)),
                Stmt::Return {
                    expr: Some(Expr::Function(inner)),
                    span: sp(),
                },
            ],
        ))];
        let program = compile_body(&body, "test.rk").unwrap();
        let inner_unit = program
            .units
            .iter()
            .find(|u| u.name == "<anonymous>")
            .unwrap();
        assert_eq!(inner_unit.closures(), ["n".to_string()]);
    }

    #[test]
    fn test_transitive_capture_chains_through_middle_unit() {
        // function outer() {
        //   var n = 7;
        //   var mid = function() { return function() { return n; }; };
        //   return mid()();
        // }
        // return outer();
        let innermost = FunctionDef {
            name: None,
            params: vec![],
            body: vec![ret(ident("n"))],
            span: sp(),
        };
        let mid = FunctionDef {
            name: None,
            params: vec![],
            body: vec![Stmt::Return {
                expr: Some(Expr::Function(innermost)),
                span: sp(),
            }],
            span: sp(),
        };
        let body = vec![
            Stmt::Function(function(
                "outer",
                &[],
                vec![
                    var("n", num(7.0)),
                    var("mid", Expr::Function(mid)),
                    ret(call(call(ident("mid"), vec![]), vec![])),
                ],
            )),
            ret(call(ident("outer"), vec![])),
        ];
        let program = compile_body(&body, "test.rk").unwrap();
        let mid_unit = program.units.iter().find(|u| u.name == "mid").unwrap();
        assert_eq!(mid_unit.closures(), ["n".to_string()]);
        let mut vm = Vm::new();
        let result = vm.eval_program(&program).unwrap();
        assert_eq!(vm.render(result), "7");
    }

    #[test]
    fn test_method_call_through_namespace_object() {
        // var parts = [1, 2, 3]; return parts.join("-");
        let body = vec![
            var(
                "parts",
                Expr::Array {
                    items: vec![num(1.0), num(2.0), num(3.0)],
                    span: sp(),
                },
            ),
            ret(Expr::Call {
                callee: Box::new(ident("parts")),
                method: Some(("join".to_string(), sp())),
                args: vec![string("-")],
                span: sp(),
            }),
        ];
        assert_eq!(eval(body), "1-2-3");
    }

    #[test]
    fn test_duplicate_function_declaration_is_rejected() {
        let body = vec![
            Stmt::Function(function("f", &[], vec![])),
            Stmt::Function(function("f", &[], vec![])),
        ];
        let err = compile_body(&body, "test.rk").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SyntaxError);
    }

    #[test]
    fn test_duplicate_var_declaration_is_rejected() {
        // var x = 1; var x = 2;
        let body = vec![var("x", num(1.0)), var("x", num(2.0))];
        let err = compile_body(&body, "test.rk").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SyntaxError);
    }

    #[test]
    fn test_var_shadowing_a_parameter_is_rejected() {
        // function f(x) { var x = 1; }
        let body = vec![Stmt::Function(function(
            "f",
            &["x"],
            vec![var("x", num(1.0))],
        ))];
        let err = compile_body(&body, "test.rk").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SyntaxError);
    }

    #[test]
    fn test_var_colliding_with_function_declaration_is_rejected() {
        // function f() {} var f = 1;
        let body = vec![
            Stmt::Function(function("f", &[], vec![])),
            var("f", num(1.0)),
        ];
        let err = compile_body(&body, "test.rk").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SyntaxError);
    }

    #[test]
    fn test_duplicate_parameter_is_rejected() {
        let body = vec![Stmt::Function(function("f", &["a", "a"], vec![]))];
        let err = compile_body(&body, "test.rk").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SyntaxError);
    }

    #[test]
    fn test_comma_sequence_keeps_last_value() {
        let body = vec![ret(Expr::Sequence {
            exprs: vec![num(1.0), num(2.0), num(3.0)],
            span: sp(),
        })];
        assert_eq!(eval(body), "3");
    }
}
