// Rask Symbol Graph
// One bottom-up rewrite of the parser's tree into typed expression and
// statement symbols. The rewrite returns its results directly; nothing is
// threaded through shared mutable state.

use crate::ast::{CollKind, Keyword, Node, NodeKind, OpToken};
use crate::error::{RaskError, RaskResult, Span};

/// Literal payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    Number(f64),
    Str(String),
    Regex(String),
    True,
    False,
    Null,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Positive,
    Negative,
    Not,
    Invert,
    Typeof,
    PreInc,
    PreDec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostfixOp {
    Inc,
    Dec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Power,
    Lshift,
    Rshift,
    Urshift,
    BitAnd,
    BitOr,
    BitXor,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    LogicalAnd,
    LogicalOr,
}

/// One trailing access of a member chain.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberSeg {
    Attr(String, Span),
    Index(Expr, Span),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal {
        lit: Lit,
        span: Span,
    },
    Ident {
        name: String,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        span: Span,
    },
    Postfix {
        op: PostfixOp,
        expr: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    Ternary {
        cond: Box<Expr>,
        then_val: Box<Expr>,
        else_val: Box<Expr>,
        span: Span,
    },
    /// `target = value`, or compound when `op` is set.
    Assign {
        target: Box<Expr>,
        op: Option<BinaryOp>,
        value: Box<Expr>,
        span: Span,
    },
    /// Dot and index accesses accumulated into one chain so the final
    /// access can become a store when used as an assignment target.
    Member {
        base: Box<Expr>,
        segs: Vec<MemberSeg>,
        span: Span,
    },
    /// `method` is set for the receiver-bound form `a.b(...)`.
    Call {
        callee: Box<Expr>,
        method: Option<(String, Span)>,
        args: Vec<Expr>,
        span: Span,
    },
    Array {
        items: Vec<Expr>,
        span: Span,
    },
    Object {
        props: Vec<(String, Expr)>,
        span: Span,
    },
    Function(FunctionDef),
    /// Comma expression; evaluates all, keeps the last.
    Sequence {
        exprs: Vec<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal { span, .. }
            | Expr::Ident { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Postfix { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Ternary { span, .. }
            | Expr::Assign { span, .. }
            | Expr::Member { span, .. }
            | Expr::Call { span, .. }
            | Expr::Array { span, .. }
            | Expr::Object { span, .. }
            | Expr::Sequence { span, .. } => *span,
            Expr::Function(def) => def.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    Var(Vec<VarDecl>),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Var {
        decls: Vec<VarDecl>,
        span: Span,
    },
    Expr {
        expr: Expr,
        span: Span,
    },
    Block {
        body: Vec<Stmt>,
        span: Span,
    },
    Empty,
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    For {
        init: Option<ForInit>,
        cond: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
        span: Span,
    },
    ForIn {
        declares: bool,
        name: String,
        object: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    Break {
        span: Span,
    },
    Continue {
        span: Span,
    },
    Return {
        expr: Option<Expr>,
        span: Span,
    },
    Function(FunctionDef),
}

/// Rewrites one parsed tree into a statement list for the top-level unit.
pub struct SymbolBuilder<'a> {
    file: &'a str,
}

impl<'a> SymbolBuilder<'a> {
    pub fn new(file: &'a str) -> Self {
        Self { file }
    }

    pub fn build_program(&self, root: &Node) -> RaskResult<Vec<Stmt>> {
        match &root.kind {
            NodeKind::Root => self.build_stmts(&root.children),
            NodeKind::Coll(CollKind::Program) | NodeKind::Coll(CollKind::SourceElements) => {
                self.build_stmts(&root.children)
            }
            _ => Err(self.syntax("expected a program root", root.span)),
        }
    }

    fn syntax(&self, message: impl Into<String>, span: Span) -> RaskError {
        RaskError::syntax(message, span, self.file)
    }

    fn build_stmts<'n>(
        &self,
        nodes: impl IntoIterator<Item = &'n Node>,
    ) -> RaskResult<Vec<Stmt>> {
        let mut out = Vec::new();
        for node in nodes {
            out.push(self.build_stmt(node)?);
        }
        Ok(out)
    }

    pub fn build_stmt(&self, node: &Node) -> RaskResult<Stmt> {
        let kind = match node.coll_kind() {
            Some(kind) => kind,
            None => return Err(self.syntax("expected a statement", node.span)),
        };
        let span = node.span;
        match kind {
            CollKind::SourceElements | CollKind::StatementList => Ok(Stmt::Block {
                body: self.build_stmts(&node.children)?,
                span,
            }),
            CollKind::Block => Ok(Stmt::Block {
                body: self.build_stmts(strip_tokens(&node.children))?,
                span,
            }),
            CollKind::EmptyStatement => Ok(Stmt::Empty),
            CollKind::VarStatement => Ok(Stmt::Var {
                decls: self.build_var_decls(node)?,
                span,
            }),
            CollKind::ExprStatement => {
                let children = strip_tokens(&node.children);
                let expr = self.expect_one_expr(&children, span)?;
                Ok(Stmt::Expr { expr, span })
            }
            CollKind::IfStatement => {
                let parts = strip_tokens(&node.children);
                if parts.len() < 2 {
                    return Err(self.syntax("malformed if statement", span));
                }
                let cond = self.build_expr(parts[0])?;
                let then_branch = Box::new(self.build_stmt(parts[1])?);
                let else_branch = match parts.get(2) {
                    Some(stmt) => Some(Box::new(self.build_stmt(stmt)?)),
                    None => None,
                };
                Ok(Stmt::If {
                    cond,
                    then_branch,
                    else_branch,
                    span,
                })
            }
            CollKind::WhileStatement => {
                let parts = strip_tokens(&node.children);
                if parts.len() != 2 {
                    return Err(self.syntax("malformed while statement", span));
                }
                Ok(Stmt::While {
                    cond: self.build_expr(parts[0])?,
                    body: Box::new(self.build_stmt(parts[1])?),
                    span,
                })
            }
            CollKind::ForStatement => self.build_for(node),
            CollKind::ForInStatement => self.build_for_in(node),
            CollKind::BreakStatement => Ok(Stmt::Break { span }),
            CollKind::ContinueStatement => Ok(Stmt::Continue { span }),
            CollKind::ReturnStatement => {
                let children = strip_tokens(&node.children);
                let expr = match children.len() {
                    0 => None,
                    _ => Some(self.expect_one_expr(&children, span)?),
                };
                Ok(Stmt::Return { expr, span })
            }
            CollKind::FunctionDecl => Ok(Stmt::Function(self.build_function(node, true)?)),
            _ => {
                // An expression-kind collection in statement position.
                let expr = self.build_expr(node)?;
                Ok(Stmt::Expr { expr, span })
            }
        }
    }

    fn build_var_decls(&self, node: &Node) -> RaskResult<Vec<VarDecl>> {
        let mut decls = Vec::new();
        for child in strip_tokens(&node.children) {
            match child.coll_kind() {
                Some(CollKind::VarDeclList) => {
                    decls.extend(self.build_var_decls(child)?);
                }
                Some(CollKind::VarDecl) => {
                    decls.push(self.build_var_decl(child)?);
                }
                _ => return Err(self.syntax("malformed var statement", child.span)),
            }
        }
        Ok(decls)
    }

    fn build_var_decl(&self, node: &Node) -> RaskResult<VarDecl> {
        let parts = strip_tokens(&node.children);
        let name = match parts.first().and_then(|n| n.as_ident()) {
            Some(name) => name.to_string(),
            None => return Err(self.syntax("expected an identifier to declare", node.span)),
        };
        let init = match parts.get(1) {
            Some(expr) => Some(self.build_expr(expr)?),
            None => None,
        };
        Ok(VarDecl {
            name,
            init,
            span: node.span,
        })
    }

    /// `for (init; cond; update) body` — absent pieces arrive as empty
    /// statements so the four slots stay positional.
    fn build_for(&self, node: &Node) -> RaskResult<Stmt> {
        let parts = strip_tokens(&node.children);
        if parts.len() != 4 {
            return Err(self.syntax("malformed for statement", node.span));
        }
        let init = match parts[0].coll_kind() {
            Some(CollKind::EmptyStatement) => None,
            Some(CollKind::VarStatement) | Some(CollKind::VarDeclList) => {
                Some(ForInit::Var(self.build_var_decls(parts[0])?))
            }
            _ => Some(ForInit::Expr(self.build_expr(parts[0])?)),
        };
        let cond = match parts[1].coll_kind() {
            Some(CollKind::EmptyStatement) => None,
            _ => Some(self.build_expr(parts[1])?),
        };
        let update = match parts[2].coll_kind() {
            Some(CollKind::EmptyStatement) => None,
            _ => Some(self.build_expr(parts[2])?),
        };
        Ok(Stmt::For {
            init,
            cond,
            update,
            body: Box::new(self.build_stmt(parts[3])?),
            span: node.span,
        })
    }

    fn build_for_in(&self, node: &Node) -> RaskResult<Stmt> {
        let declares = node
            .children
            .iter()
            .any(|c| c.as_keyword() == Some(Keyword::Var));
        let parts = strip_tokens(&node.children);
        if parts.len() != 3 {
            return Err(self.syntax("malformed for-in statement", node.span));
        }
        let name = match parts[0].as_ident() {
            Some(name) => name.to_string(),
            None => {
                return Err(self.syntax("for-in loop variable must be an identifier", parts[0].span))
            }
        };
        Ok(Stmt::ForIn {
            declares,
            name,
            object: self.build_expr(parts[1])?,
            body: Box::new(self.build_stmt(parts[2])?),
            span: node.span,
        })
    }

    fn build_function(&self, node: &Node, named: bool) -> RaskResult<FunctionDef> {
        let parts = strip_keywords(&node.children);
        let mut cursor = 0;
        let name = if named {
            match parts.first().and_then(|n| n.as_ident()) {
                Some(name) => {
                    cursor += 1;
                    Some(name.to_string())
                }
                None => return Err(self.syntax("function declaration needs a name", node.span)),
            }
        } else {
            // An anonymous function may still carry a self-reference name.
            match parts.first().and_then(|n| n.as_ident()) {
                Some(name) => {
                    cursor += 1;
                    Some(name.to_string())
                }
                None => None,
            }
        };

        let mut params = Vec::new();
        if let Some(list) = parts.get(cursor) {
            if list.coll_kind() == Some(CollKind::FormalParameterList) {
                for param in strip_tokens(&list.children) {
                    match param.as_ident() {
                        Some(p) => params.push(p.to_string()),
                        None => {
                            return Err(self.syntax("parameter must be an identifier", param.span))
                        }
                    }
                }
                cursor += 1;
            }
        }

        let body_node = match parts.get(cursor) {
            Some(body) if body.coll_kind() == Some(CollKind::FunctionBody) => body,
            _ => return Err(self.syntax("function needs a body", node.span)),
        };
        let body = self.build_stmts(strip_tokens(&body_node.children))?;

        Ok(FunctionDef {
            name,
            params,
            body,
            span: node.span,
        })
    }

    fn expect_one_expr(&self, nodes: &[&Node], span: Span) -> RaskResult<Expr> {
        match nodes.len() {
            1 => self.build_expr(nodes[0]),
            _ => Err(self.syntax("expected a single expression", span)),
        }
    }

    pub fn build_expr(&self, node: &Node) -> RaskResult<Expr> {
        let span = node.span;
        match &node.kind {
            NodeKind::Num(n) => Ok(Expr::Literal {
                lit: Lit::Number(*n),
                span,
            }),
            NodeKind::Str(s) => Ok(Expr::Literal {
                lit: Lit::Str(s.clone()),
                span,
            }),
            NodeKind::Regex(r) => Ok(Expr::Literal {
                lit: Lit::Regex(r.clone()),
                span,
            }),
            NodeKind::Ident(name) => Ok(Expr::Ident {
                name: name.clone(),
                span,
            }),
            NodeKind::Keyword(kw) => {
                let lit = match kw {
                    Keyword::True => Lit::True,
                    Keyword::False => Lit::False,
                    Keyword::Null => Lit::Null,
                    Keyword::Undefined => Lit::Undefined,
                    _ => return Err(self.syntax("keyword is not an expression", span)),
                };
                Ok(Expr::Literal { lit, span })
            }
            NodeKind::Coll(kind) => self.build_coll_expr(*kind, node),
            _ => Err(self.syntax("expected an expression", span)),
        }
    }

    fn build_coll_expr(&self, kind: CollKind, node: &Node) -> RaskResult<Expr> {
        let span = node.span;
        match kind {
            CollKind::BinaryExpression => self.build_binary(node),
            CollKind::UnaryExpression => self.build_unary(node),
            CollKind::PostfixExpression => self.build_postfix(node),
            CollKind::TernaryExpression => {
                let parts = strip_tokens(&node.children);
                if parts.len() != 3 {
                    return Err(self.syntax("malformed ternary expression", span));
                }
                Ok(Expr::Ternary {
                    cond: Box::new(self.build_expr(parts[0])?),
                    then_val: Box::new(self.build_expr(parts[1])?),
                    else_val: Box::new(self.build_expr(parts[2])?),
                    span,
                })
            }
            CollKind::AssignmentExpression => self.build_assign(node),
            CollKind::MemberDotExpression => self.build_member_dot(node),
            CollKind::MemberIndexExpression => self.build_member_index(node),
            CollKind::CallExpression => self.build_call(node),
            CollKind::ArrayLiteral => {
                let mut items = Vec::new();
                for item in strip_tokens(&node.children) {
                    items.push(self.build_expr(item)?);
                }
                Ok(Expr::Array { items, span })
            }
            CollKind::ObjectLiteral => {
                let mut props = Vec::new();
                for prop in strip_tokens(&node.children) {
                    if prop.coll_kind() != Some(CollKind::PropertyAssignment) {
                        return Err(self.syntax("malformed object literal", prop.span));
                    }
                    let parts = strip_tokens(&prop.children);
                    if parts.len() != 2 {
                        return Err(self.syntax("malformed property", prop.span));
                    }
                    let key = match &parts[0].kind {
                        NodeKind::Ident(name) => name.clone(),
                        NodeKind::Str(s) => s.clone(),
                        NodeKind::Num(n) => crate::vm::value::number_to_string(*n),
                        _ => return Err(self.syntax("invalid property key", parts[0].span)),
                    };
                    props.push((key, self.build_expr(parts[1])?));
                }
                Ok(Expr::Object { props, span })
            }
            CollKind::AnonymousFunction => {
                Ok(Expr::Function(self.build_function(node, false)?))
            }
            CollKind::FunctionDecl => Ok(Expr::Function(self.build_function(node, true)?)),
            CollKind::ExpressionSequence => {
                let parts = strip_tokens(&node.children);
                let mut exprs = Vec::with_capacity(parts.len());
                for part in &parts {
                    exprs.push(self.build_expr(part)?);
                }
                match exprs.len() {
                    0 => Err(self.syntax("empty expression sequence", span)),
                    1 => Ok(exprs.pop().unwrap()),
                    _ => Ok(Expr::Sequence { exprs, span }),
                }
            }
            _ => Err(self.syntax(
                format!("unsupported construct {:?} in expression position", kind),
                span,
            )),
        }
    }

    /// Operands interleaved with operator tokens. Folds left-associative,
    /// except a pure power chain which folds right.
    fn build_binary(&self, node: &Node) -> RaskResult<Expr> {
        let span = node.span;
        let mut operands = Vec::new();
        let mut ops = Vec::new();
        for child in &node.children {
            match child.as_op() {
                Some(op) => ops.push(self.binary_op(op, child.span)?),
                None => operands.push(self.build_expr(child)?),
            }
        }
        if operands.len() != ops.len() + 1 || ops.is_empty() {
            return Err(self.syntax("malformed binary expression", span));
        }
        if ops.iter().all(|(op, _)| *op == BinaryOp::Power) {
            // Right-associative fold.
            let mut result = operands.pop().unwrap();
            while let Some(lhs) = operands.pop() {
                let merged = lhs.span().merge(result.span());
                result = Expr::Binary {
                    op: BinaryOp::Power,
                    lhs: Box::new(lhs),
                    rhs: Box::new(result),
                    span: merged,
                };
            }
            return Ok(result);
        }
        let mut iter = operands.into_iter();
        let mut result = iter.next().unwrap();
        for ((op, _), rhs) in ops.into_iter().zip(iter) {
            let merged = result.span().merge(rhs.span());
            result = Expr::Binary {
                op,
                lhs: Box::new(result),
                rhs: Box::new(rhs),
                span: merged,
            };
        }
        Ok(result)
    }

    fn build_unary(&self, node: &Node) -> RaskResult<Expr> {
        let span = node.span;
        let mut ops = Vec::new();
        let mut operand = None;
        for child in &node.children {
            if let Some(op) = child.as_op() {
                ops.push(self.unary_op(op, child.span)?);
            } else if child.as_keyword() == Some(Keyword::Typeof) {
                ops.push(UnaryOp::Typeof);
            } else {
                operand = Some(self.build_expr(child)?);
            }
        }
        let mut result = match operand {
            Some(expr) => expr,
            None => return Err(self.syntax("unary expression needs an operand", span)),
        };
        for op in ops.into_iter().rev() {
            result = Expr::Unary {
                op,
                expr: Box::new(result),
                span,
            };
        }
        Ok(result)
    }

    fn build_postfix(&self, node: &Node) -> RaskResult<Expr> {
        let span = node.span;
        let parts: Vec<&Node> = node.children.iter().collect();
        if parts.len() != 2 {
            return Err(self.syntax("malformed postfix expression", span));
        }
        let op = match parts[1].as_op() {
            Some(OpToken::Inc) => PostfixOp::Inc,
            Some(OpToken::Dec) => PostfixOp::Dec,
            _ => return Err(self.syntax("invalid postfix operator", parts[1].span)),
        };
        Ok(Expr::Postfix {
            op,
            expr: Box::new(self.build_expr(parts[0])?),
            span,
        })
    }

    fn build_assign(&self, node: &Node) -> RaskResult<Expr> {
        let span = node.span;
        let mut target = None;
        let mut op_token = None;
        let mut value = None;
        for child in &node.children {
            if let Some(op) = child.as_op() {
                op_token = Some((op, child.span));
            } else if target.is_none() {
                target = Some(self.build_expr(child)?);
            } else {
                value = Some(self.build_expr(child)?);
            }
        }
        let (op, op_span) = match op_token {
            Some(pair) => pair,
            None => return Err(self.syntax("malformed assignment", span)),
        };
        let (target, value) = match (target, value) {
            (Some(t), Some(v)) => (t, v),
            _ => return Err(self.syntax("malformed assignment", span)),
        };
        let compound = match op {
            OpToken::Assign => None,
            other => match other.compound_base() {
                Some(base) => Some(self.binary_op(base, op_span)?.0),
                None => return Err(self.syntax("invalid assignment operator", op_span)),
            },
        };
        Ok(Expr::Assign {
            target: Box::new(target),
            op: compound,
            value: Box::new(value),
            span,
        })
    }

    fn build_member_dot(&self, node: &Node) -> RaskResult<Expr> {
        let span = node.span;
        let parts = strip_tokens(&node.children);
        if parts.len() < 2 {
            return Err(self.syntax("malformed member access", span));
        }
        let base = self.build_expr(parts[0])?;
        let mut segs = Vec::new();
        for part in &parts[1..] {
            match part.as_ident() {
                Some(name) => segs.push(MemberSeg::Attr(name.to_string(), part.span)),
                None => return Err(self.syntax("member name must be an identifier", part.span)),
            }
        }
        Ok(merge_member(base, segs, span))
    }

    fn build_member_index(&self, node: &Node) -> RaskResult<Expr> {
        let span = node.span;
        let parts = strip_tokens(&node.children);
        if parts.len() < 2 {
            return Err(self.syntax("malformed index access", span));
        }
        let base = self.build_expr(parts[0])?;
        let mut segs = Vec::new();
        for part in &parts[1..] {
            let index = self.build_expr(part)?;
            segs.push(MemberSeg::Index(index, part.span));
        }
        Ok(merge_member(base, segs, span))
    }

    /// A call on a dot chain becomes the receiver-bound method form:
    /// `a.b()` binds `a`, `a.b.c()` binds `a.b` and detaches `c`.
    fn build_call(&self, node: &Node) -> RaskResult<Expr> {
        let span = node.span;
        let parts = strip_tokens(&node.children);
        if parts.len() != 2 || parts[1].coll_kind() != Some(CollKind::Arguments) {
            return Err(self.syntax("malformed call expression", span));
        }
        let mut args = Vec::new();
        for arg in strip_tokens(&parts[1].children) {
            args.push(self.build_expr(arg)?);
        }
        let callee = self.build_expr(parts[0])?;
        match callee {
            Expr::Member {
                base,
                mut segs,
                span: member_span,
            } => match segs.pop() {
                Some(MemberSeg::Attr(name, name_span)) => {
                    let receiver = if segs.is_empty() {
                        *base
                    } else {
                        Expr::Member {
                            base,
                            segs,
                            span: member_span,
                        }
                    };
                    Ok(Expr::Call {
                        callee: Box::new(receiver),
                        method: Some((name, name_span)),
                        args,
                        span,
                    })
                }
                Some(seg @ MemberSeg::Index(..)) => {
                    segs.push(seg);
                    Ok(Expr::Call {
                        callee: Box::new(Expr::Member {
                            base,
                            segs,
                            span: member_span,
                        }),
                        method: None,
                        args,
                        span,
                    })
                }
                None => Err(self.syntax("malformed member call", member_span)),
            },
            other => Ok(Expr::Call {
                callee: Box::new(other),
                method: None,
                args,
                span,
            }),
        }
    }

    fn binary_op(&self, op: OpToken, span: Span) -> RaskResult<(BinaryOp, Span)> {
        let mapped = match op {
            OpToken::Add => BinaryOp::Add,
            OpToken::Sub => BinaryOp::Sub,
            OpToken::Mul => BinaryOp::Mul,
            OpToken::Div => BinaryOp::Div,
            OpToken::Mod => BinaryOp::Mod,
            OpToken::Power => BinaryOp::Power,
            OpToken::Lshift => BinaryOp::Lshift,
            OpToken::Rshift => BinaryOp::Rshift,
            OpToken::Urshift => BinaryOp::Urshift,
            OpToken::BitAnd => BinaryOp::BitAnd,
            OpToken::BitOr => BinaryOp::BitOr,
            OpToken::BitXor => BinaryOp::BitXor,
            OpToken::Less => BinaryOp::Less,
            OpToken::LessEqual => BinaryOp::LessEqual,
            OpToken::Greater => BinaryOp::Greater,
            OpToken::GreaterEqual => BinaryOp::GreaterEqual,
            OpToken::Equal => BinaryOp::Equal,
            OpToken::NotEqual => BinaryOp::NotEqual,
            OpToken::StrictEqual => BinaryOp::StrictEqual,
            OpToken::StrictNotEqual => BinaryOp::StrictNotEqual,
            OpToken::LogicalAnd => BinaryOp::LogicalAnd,
            OpToken::LogicalOr => BinaryOp::LogicalOr,
            _ => return Err(self.syntax("invalid binary operator", span)),
        };
        Ok((mapped, span))
    }

    fn unary_op(&self, op: OpToken, span: Span) -> RaskResult<UnaryOp> {
        Ok(match op {
            OpToken::Add => UnaryOp::Positive,
            OpToken::Sub => UnaryOp::Negative,
            OpToken::LogicalNot => UnaryOp::Not,
            OpToken::BitNot => UnaryOp::Invert,
            OpToken::Inc => UnaryOp::PreInc,
            OpToken::Dec => UnaryOp::PreDec,
            _ => return Err(self.syntax("invalid unary operator", span)),
        })
    }
}

fn merge_member(base: Expr, mut segs: Vec<MemberSeg>, span: Span) -> Expr {
    match base {
        Expr::Member {
            base: inner,
            segs: mut inner_segs,
            ..
        } => {
            inner_segs.append(&mut segs);
            Expr::Member {
                base: inner,
                segs: inner_segs,
                span,
            }
        }
        other => Expr::Member {
            base: Box::new(other),
            segs,
            span,
        },
    }
}

/// Drop pure punctuation (operator tokens and structural keywords) from a
/// child list. Used by the shapes that do not consume operators themselves.
fn strip_tokens(children: &[Node]) -> Vec<&Node> {
    children
        .iter()
        .filter(|c| !matches!(c.kind, NodeKind::Op(_) | NodeKind::Keyword(Keyword::Var)
            | NodeKind::Keyword(Keyword::Function)
            | NodeKind::Keyword(Keyword::If)
            | NodeKind::Keyword(Keyword::Else)
            | NodeKind::Keyword(Keyword::While)
            | NodeKind::Keyword(Keyword::For)
            | NodeKind::Keyword(Keyword::In)
            | NodeKind::Keyword(Keyword::Do)
            | NodeKind::Keyword(Keyword::Return)
            | NodeKind::Keyword(Keyword::Break)
            | NodeKind::Keyword(Keyword::Continue)))
        .collect()
}

fn strip_keywords(children: &[Node]) -> Vec<&Node> {
    children
        .iter()
        .filter(|c| !matches!(c.kind, NodeKind::Keyword(Keyword::Function)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Node;
    use crate::error::Span;

    fn sp() -> Span {
        Span::default()
    }

    fn builder() -> SymbolBuilder<'static> {
        SymbolBuilder::new("<test>")
    }

    #[test]
    fn test_binary_left_fold() {
        // 1 - 2 - 3 folds as (1 - 2) - 3
        let node = Node::coll(
            CollKind::BinaryExpression,
            vec![
                Node::number(1.0, sp()),
                Node::op(OpToken::Sub, sp()),
                Node::number(2.0, sp()),
                Node::op(OpToken::Sub, sp()),
                Node::number(3.0, sp()),
            ],
        );
        let expr = builder().build_expr(&node).unwrap();
        match expr {
            Expr::Binary { op, lhs, rhs, .. } => {
                assert_eq!(op, BinaryOp::Sub);
                assert!(matches!(*lhs, Expr::Binary { .. }));
                assert!(matches!(*rhs, Expr::Literal { lit: Lit::Number(n), .. } if n == 3.0));
            }
            other => panic!("unexpected expr: {:?}", other),
        }
    }

    #[test]
    fn test_block_keeps_only_statement_children() {
        // { return 1; } with a stray structural keyword in the child list.
        let ret = Node::coll(
            CollKind::ReturnStatement,
            vec![
                Node::keyword(Keyword::Return, sp()),
                Node::number(1.0, sp()),
            ],
        );
        let node = Node::coll(
            CollKind::Block,
            vec![Node::keyword(Keyword::Do, sp()), ret],
        );
        let stmt = builder().build_stmt(&node).unwrap();
        match stmt {
            Stmt::Block { body, .. } => {
                assert_eq!(body.len(), 1);
                assert!(matches!(body[0], Stmt::Return { .. }));
            }
            other => panic!("unexpected stmt: {:?}", other),
        }
    }

    #[test]
    fn test_power_right_fold() {
        // 2 ** 3 ** 2 folds as 2 ** (3 ** 2)
        let node = Node::coll(
            CollKind::BinaryExpression,
            vec![
                Node::number(2.0, sp()),
                Node::op(OpToken::Power, sp()),
                Node::number(3.0, sp()),
                Node::op(OpToken::Power, sp()),
                Node::number(2.0, sp()),
            ],
        );
        let expr = builder().build_expr(&node).unwrap();
        match expr {
            Expr::Binary { op, lhs, rhs, .. } => {
                assert_eq!(op, BinaryOp::Power);
                assert!(matches!(*lhs, Expr::Literal { .. }));
                assert!(matches!(*rhs, Expr::Binary { .. }));
            }
            other => panic!("unexpected expr: {:?}", other),
        }
    }

    #[test]
    fn test_method_call_detaches_trailing_segment() {
        // a.b.c() keeps a.b as the receiver and detaches c
        let member = Node::coll(
            CollKind::MemberDotExpression,
            vec![
                Node::ident("a", sp()),
                Node::ident("b", sp()),
                Node::ident("c", sp()),
            ],
        );
        let call = Node::coll(
            CollKind::CallExpression,
            vec![member, Node::coll(CollKind::Arguments, vec![])],
        );
        let expr = builder().build_expr(&call).unwrap();
        match expr {
            Expr::Call {
                callee, method, ..
            } => {
                assert_eq!(method.unwrap().0, "c");
                match *callee {
                    Expr::Member { segs, .. } => assert_eq!(segs.len(), 1),
                    other => panic!("unexpected receiver: {:?}", other),
                }
            }
            other => panic!("unexpected expr: {:?}", other),
        }
    }

    #[test]
    fn test_member_chains_accumulate() {
        // a.b[0].c becomes one member symbol with three segments
        let dot = Node::coll(
            CollKind::MemberDotExpression,
            vec![Node::ident("a", sp()), Node::ident("b", sp())],
        );
        let index = Node::coll(
            CollKind::MemberIndexExpression,
            vec![dot, Node::number(0.0, sp())],
        );
        let outer = Node::coll(
            CollKind::MemberDotExpression,
            vec![index, Node::ident("c", sp())],
        );
        let expr = builder().build_expr(&outer).unwrap();
        match expr {
            Expr::Member { base, segs, .. } => {
                assert!(matches!(*base, Expr::Ident { .. }));
                assert_eq!(segs.len(), 3);
            }
            other => panic!("unexpected expr: {:?}", other),
        }
    }

    #[test]
    fn test_literal_is_not_a_statement_keyword() {
        let node = Node::keyword(Keyword::Return, sp());
        assert!(builder().build_expr(&node).is_err());
    }

    #[test]
    fn test_compound_assignment() {
        let node = Node::coll(
            CollKind::AssignmentExpression,
            vec![
                Node::ident("x", sp()),
                Node::op(OpToken::AssignAdd, sp()),
                Node::number(1.0, sp()),
            ],
        );
        let expr = builder().build_expr(&node).unwrap();
        match expr {
            Expr::Assign { op, .. } => assert_eq!(op, Some(BinaryOp::Add)),
            other => panic!("unexpected expr: {:?}", other),
        }
    }
}
