//! Writes assigned hex paths back into the source as literal `key` markers.

use crate::annotate::PathTable;
use crate::ir::{ElementNode, Expr, ExpressionNode, FunctionBody, RenderNode};
use crate::visitor::{walk_element, RenderVisitor};

/// Returns `source` with `key="<path>"` spliced into every unkeyed element of `render`.
pub fn annotate_source_keys(source: &str, render: &RenderNode, paths: &PathTable) -> String {
    splice_keys(source, key_sites(render, paths))
}

/// Insertion points for the unkeyed elements of `render`, as (offset, path).
///
/// Loop item elements are left alone: one item template stands for many rendered items.
pub fn key_sites(render: &RenderNode, paths: &PathTable) -> Vec<(u32, String)> {
    let mut collector = KeySites {
        paths,
        sites: Vec::new(),
    };
    collector.visit_node(render);
    collector.sites
}

/// Applies sites collected from any number of components of the same source.
pub fn splice_keys(source: &str, mut sites: Vec<(u32, String)>) -> String {
    sites.sort_by(|a, b| b.0.cmp(&a.0));
    sites.dedup_by_key(|site| site.0);

    let mut out = source.to_string();
    for (offset, path) in sites {
        let offset = offset as usize;
        if offset <= out.len() && out.is_char_boundary(offset) {
            out.insert_str(offset, &format!(" key=\"{}\"", path));
        }
    }
    out
}

struct KeySites<'t> {
    paths: &'t PathTable,
    sites: Vec<(u32, String)>,
}

impl<'r, 't> RenderVisitor<'r> for KeySites<'t> {
    fn visit_element(&mut self, element: &'r ElementNode) {
        if element.key.is_none() && element.attribute("key").is_none() {
            if let Some(path) = self.paths.path_of(element.id) {
                self.sites.push((element.name_end, path.to_string()));
            }
        }
        walk_element(self, element);
    }

    fn visit_expression(&mut self, expression: &'r ExpressionNode) {
        self.visit_render_positions(&expression.expr);
    }
}

impl<'t> KeySites<'t> {
    fn visit_render_positions<'r>(&mut self, expr: &'r Expr) {
        match expr {
            Expr::Jsx { node } => self.visit_node(node),
            Expr::Conditional {
                consequent,
                alternate,
                ..
            } => {
                self.visit_render_positions(consequent);
                self.visit_render_positions(alternate);
            }
            Expr::Logical { left, right, .. } => {
                self.visit_render_positions(left);
                self.visit_render_positions(right);
            }
            Expr::Array { elements } => {
                for e in elements {
                    self.visit_render_positions(e);
                }
            }
            Expr::Function {
                body: FunctionBody::Expression { expr },
                ..
            } => self.visit_render_positions(expr),
            // Loop callbacks render once per item.
            Expr::Call { .. } => {}
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::assign_paths;
    use crate::hex_path::HexPathAllocator;
    use crate::jsx_lowerer::JsxLowerer;
    use oxc_allocator::Allocator;
    use oxc_ast::ast::{Expression, Statement};
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    fn keyed(source: &str) -> String {
        let allocator = Allocator::default();
        let parsed = Parser::new(&allocator, source, SourceType::jsx()).parse();
        let Some(Statement::ExpressionStatement(stmt)) = parsed.program.body.first() else {
            panic!("expected an expression statement");
        };
        let expr: &Expression = &stmt.expression;
        let render = JsxLowerer::new(source).lower_render(expr);
        let paths = assign_paths(&render, &mut HexPathAllocator::new());
        annotate_source_keys(source, &render, &paths)
    }

    #[test]
    fn test_unkeyed_elements_get_paths() {
        let out = keyed("<div><span>a</span><b key=\"x\" /></div>;");
        assert!(out.starts_with("<div key=\"1\"><span key=\"1.1\">a</span>"));
        assert!(out.contains("<b key=\"x\" />"));
    }

    #[test]
    fn test_existing_markers_are_kept() {
        let out = keyed("<div key=\"1\"><p>x</p></div>;");
        assert_eq!(out.matches("key=").count(), 2);
        assert!(out.contains("<p key=\"1.1\">"));
    }

    #[test]
    fn test_loop_items_are_not_keyed() {
        let out = keyed("<ul>{items.map(i => <li>{i}</li>)}</ul>;");
        assert!(out.contains("<ul key=\"1\">"));
        assert!(out.contains("<li>"));
    }
}
