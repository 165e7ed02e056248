use oxc_allocator::Allocator;
use oxc_ast::{ast::*, AstBuilder};
use oxc_ast_visit::VisitMut;
use oxc_codegen::Codegen;
use oxc_span::{GetSpan, SPAN};
use std::collections::HashSet;
use tracing::debug;

use crate::ir::NodeId;

/// Replaces each extracted render expression with a `null` placeholder exactly once.
pub struct RenderPlaceholder<'a> {
    ast: AstBuilder<'a>,
    pending: HashSet<NodeId>,
    pub replaced: usize,
}

impl<'a> RenderPlaceholder<'a> {
    pub fn new(allocator: &'a Allocator, spans: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            ast: AstBuilder::new(allocator),
            pending: spans.into_iter().collect(),
            replaced: 0,
        }
    }
}

impl<'a> VisitMut<'a> for RenderPlaceholder<'a> {
    fn visit_expression(&mut self, expr: &mut Expression<'a>) {
        let id = NodeId::from(expr.span());
        if self.pending.remove(&id) {
            *expr = self.ast.expression_null_literal(SPAN);
            self.replaced += 1;
            return;
        }
        oxc_ast_visit::walk_mut::walk_expression(self, expr);
    }
}

/// Rewrites `program` in place and prints it.
pub fn rewrite_program<'a>(allocator: &'a Allocator, program: &mut Program<'a>, spans: &[NodeId]) -> String {
    let mut placeholder = RenderPlaceholder::new(allocator, spans.iter().copied());
    placeholder.visit_program(program);
    debug!(replaced = placeholder.replaced, "render expressions replaced");
    Codegen::new().build(program).code
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    #[test]
    fn test_render_expression_becomes_null_once() {
        let source = "function A() { return <div>{x}</div>; }";
        let allocator = Allocator::default();
        let mut program = Parser::new(&allocator, source, SourceType::jsx()).parse().program;
        let start = source.find("<div>").unwrap() as u32;
        let end = (source.find("</div>").unwrap() + "</div>".len()) as u32;
        let spans = [NodeId::new(start, end), NodeId::new(start, end)];

        let mut placeholder = RenderPlaceholder::new(&allocator, spans.iter().copied());
        placeholder.visit_program(&mut program);
        assert_eq!(placeholder.replaced, 1);

        let code = Codegen::new().build(&program).code;
        assert!(code.contains("return null"));
        assert!(!code.contains("<div>"));
    }
}
