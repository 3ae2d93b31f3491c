// Rask Programming Language Runtime
// A stack-bytecode compiler and virtual machine for an ECMAScript-like
// language. Parsing happens elsewhere: the embedder hands over a generic
// syntax tree ([`ast::Node`]), the compiler lowers it to code units, and the
// virtual machine interprets them over a mark-sweep heap.

pub mod ast;
pub mod binary;
pub mod compiler;
pub mod error;
pub mod vm;

pub use error::{ErrorKind, RaskError, RaskResult};

/// Compile and run a syntax tree in a fresh virtual machine, returning the
/// rendered top-level result.
pub fn eval_tree(root: &ast::Node, file: &str) -> RaskResult<String> {
    let program = compiler::compile(root, file)?;
    let mut vm = vm::Vm::new();
    let result = vm.eval_program(&program)?;
    Ok(vm.render(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CollKind, Keyword, Node, OpToken};
    use crate::error::Span;

    #[test]
    fn test_eval_tree_end_to_end() {
        // var x = 20 + 22; return x;
        let sp = Span::default;
        let decl = Node::coll(
            CollKind::VarStatement,
            vec![
                Node::keyword(Keyword::Var, sp()),
                Node::coll(
                    CollKind::VarDecl,
                    vec![
                        Node::ident("x", sp()),
                        Node::op(OpToken::Assign, sp()),
                        Node::coll(
                            CollKind::BinaryExpression,
                            vec![
                                Node::number(20.0, sp()),
                                Node::op(OpToken::Add, sp()),
                                Node::number(22.0, sp()),
                            ],
                        ),
                    ],
                ),
            ],
        );
        let ret = Node::coll(
            CollKind::ReturnStatement,
            vec![Node::keyword(Keyword::Return, sp()), Node::ident("x", sp())],
        );
        let root = Node::root(vec![decl, ret]);
        assert_eq!(eval_tree(&root, "test.rk").unwrap(), "42");
    }
}
