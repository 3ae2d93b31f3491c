// Syntax tree input contract
//
// The tokenizer and parser live outside this crate; they hand the compiler a
// tree of typed, positioned nodes in this shape. Tests build trees through the
// same constructors the parser uses.

use crate::error::Span;
use std::fmt;
use std::fmt::Write as _;

/// Named kind of a composite node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollKind {
    Program,
    SourceElements,
    Block,
    StatementList,
    VarStatement,
    VarDeclList,
    VarDecl,
    EmptyStatement,
    ExprStatement,
    IfStatement,
    WhileStatement,
    ForStatement,
    ForInStatement,
    ContinueStatement,
    BreakStatement,
    ReturnStatement,
    FunctionDecl,
    AnonymousFunction,
    FormalParameterList,
    FunctionBody,
    ArrayLiteral,
    ObjectLiteral,
    PropertyAssignment,
    Arguments,
    ExpressionSequence,
    /// Operands interleaved with operator tokens: `a + b - c` is
    /// `[a, +, b, -, c]`.
    BinaryExpression,
    UnaryExpression,
    PostfixExpression,
    TernaryExpression,
    AssignmentExpression,
    MemberDotExpression,
    MemberIndexExpression,
    CallExpression,
}

/// Reserved words the compiler consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Var,
    Function,
    If,
    Else,
    While,
    For,
    In,
    Do,
    Break,
    Continue,
    Return,
    Null,
    Undefined,
    True,
    False,
    Typeof,
}

/// Operator tokens, as classified by the external tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpToken {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Power,
    Inc,
    Dec,
    Assign,
    AssignAdd,
    AssignSub,
    AssignMul,
    AssignDiv,
    AssignMod,
    AssignPower,
    AssignLshift,
    AssignRshift,
    AssignUrshift,
    AssignAnd,
    AssignOr,
    AssignXor,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    LogicalNot,
    LogicalAnd,
    LogicalOr,
    BitNot,
    BitAnd,
    BitOr,
    BitXor,
    Lshift,
    Rshift,
    Urshift,
    Query,
    Colon,
    Comma,
    Dot,
}

impl OpToken {
    /// The binary operator a compound-assignment token applies, if any.
    pub fn compound_base(self) -> Option<OpToken> {
        Some(match self {
            OpToken::AssignAdd => OpToken::Add,
            OpToken::AssignSub => OpToken::Sub,
            OpToken::AssignMul => OpToken::Mul,
            OpToken::AssignDiv => OpToken::Div,
            OpToken::AssignMod => OpToken::Mod,
            OpToken::AssignPower => OpToken::Power,
            OpToken::AssignLshift => OpToken::Lshift,
            OpToken::AssignRshift => OpToken::Rshift,
            OpToken::AssignUrshift => OpToken::Urshift,
            OpToken::AssignAnd => OpToken::BitAnd,
            OpToken::AssignOr => OpToken::BitOr,
            OpToken::AssignXor => OpToken::BitXor,
            _ => return None,
        })
    }
}

/// Payload of one syntax-tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Coll(CollKind),
    Keyword(Keyword),
    Op(OpToken),
    Ident(String),
    Str(String),
    Num(f64),
    Regex(String),
}

/// One node of the parser's output tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self {
            kind,
            span,
            children: Vec::new(),
        }
    }

    pub fn root(children: Vec<Node>) -> Self {
        let span = cover_span(&children);
        Self {
            kind: NodeKind::Root,
            span,
            children,
        }
    }

    pub fn coll(kind: CollKind, children: Vec<Node>) -> Self {
        let span = cover_span(&children);
        Self {
            kind: NodeKind::Coll(kind),
            span,
            children,
        }
    }

    pub fn coll_at(kind: CollKind, span: Span, children: Vec<Node>) -> Self {
        Self {
            kind: NodeKind::Coll(kind),
            span,
            children,
        }
    }

    pub fn keyword(kw: Keyword, span: Span) -> Self {
        Self::new(NodeKind::Keyword(kw), span)
    }

    pub fn op(op: OpToken, span: Span) -> Self {
        Self::new(NodeKind::Op(op), span)
    }

    pub fn ident(name: impl Into<String>, span: Span) -> Self {
        Self::new(NodeKind::Ident(name.into()), span)
    }

    pub fn string(value: impl Into<String>, span: Span) -> Self {
        Self::new(NodeKind::Str(value.into()), span)
    }

    pub fn number(value: f64, span: Span) -> Self {
        Self::new(NodeKind::Num(value), span)
    }

    pub fn regex(source: impl Into<String>, span: Span) -> Self {
        Self::new(NodeKind::Regex(source.into()), span)
    }

    pub fn coll_kind(&self) -> Option<CollKind> {
        match self.kind {
            NodeKind::Coll(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_op(&self) -> Option<OpToken> {
        match self.kind {
            NodeKind::Op(op) => Some(op),
            _ => None,
        }
    }

    pub fn as_keyword(&self) -> Option<Keyword> {
        match self.kind {
            NodeKind::Keyword(kw) => Some(kw),
            _ => None,
        }
    }

    /// Render the tree with one node per line, indented by depth.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_rec(0, &mut out);
        out
    }

    fn dump_rec(&self, level: usize, out: &mut String) {
        for _ in 0..level {
            out.push_str("  ");
        }
        let _ = writeln!(
            out,
            "{} [{}:{}]",
            self.describe(),
            self.span.start.line,
            self.span.start.column
        );
        for child in &self.children {
            child.dump_rec(level + 1, out);
        }
    }

    fn describe(&self) -> String {
        match &self.kind {
            NodeKind::Root => "root".to_string(),
            NodeKind::Coll(kind) => format!("{:?}", kind),
            NodeKind::Keyword(kw) => format!("keyword {:?}", kw),
            NodeKind::Op(op) => format!("op {:?}", op),
            NodeKind::Ident(name) => format!("id \"{}\"", name),
            NodeKind::Str(s) => format!("string {:?}", s),
            NodeKind::Num(n) => format!("number {}", n),
            NodeKind::Regex(r) => format!("regex {}", r),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dump())
    }
}

fn cover_span(children: &[Node]) -> Span {
    let mut iter = children.iter();
    let first = match iter.next() {
        Some(node) => node.span,
        None => return Span::default(),
    };
    iter.fold(first, |acc, node| acc.merge(node.span))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Position;

    fn sp(col: usize) -> Span {
        Span::single(1, col, col)
    }

    #[test]
    fn test_coll_span_covers_children() {
        let node = Node::coll(
            CollKind::BinaryExpression,
            vec![
                Node::number(1.0, sp(1)),
                Node::op(OpToken::Add, sp(3)),
                Node::number(2.0, sp(5)),
            ],
        );
        assert_eq!(node.span.start, Position::new(1, 1, 1));
        assert_eq!(node.span.end, Position::new(1, 5, 5));
    }

    #[test]
    fn test_dump_indents_children() {
        let node = Node::coll(
            CollKind::ExprStatement,
            vec![Node::ident("x", sp(1))],
        );
        let text = node.dump();
        assert!(text.starts_with("ExprStatement"));
        assert!(text.contains("\n  id \"x\""));
    }
}
