use crate::ir::{ElementNode, Expr, ExpressionNode, FragmentNode, FunctionBody, RenderNode, TextNode};

/// The RenderVisitor trait is the single traversal mechanism for lowered render trees.
///
/// Rules:
/// 1. Traversal order is document order and fixed.
/// 2. Implementers override `visit_*` methods to add behavior.
/// 3. Implementers call the matching `walk_*` function to continue traversal unless pruning is intended.
/// 4. JSX nested inside expressions (conditional arms, logical operands, map callbacks) is visited too.
pub trait RenderVisitor<'r> {
    fn visit_node(&mut self, node: &'r RenderNode) {
        walk_node(self, node);
    }

    fn visit_element(&mut self, element: &'r ElementNode) {
        walk_element(self, element);
    }

    fn visit_fragment(&mut self, fragment: &'r FragmentNode) {
        walk_children(self, &fragment.children);
    }

    fn visit_text(&mut self, _text: &'r TextNode) {
        // Leaf node, nothing to walk by default
    }

    fn visit_expression(&mut self, expression: &'r ExpressionNode) {
        walk_expr(self, &expression.expr);
    }
}

pub fn walk_node<'r, V: RenderVisitor<'r> + ?Sized>(visitor: &mut V, node: &'r RenderNode) {
    match node {
        RenderNode::Element(el) => visitor.visit_element(el),
        RenderNode::Fragment(f) => visitor.visit_fragment(f),
        RenderNode::Text(t) => visitor.visit_text(t),
        RenderNode::Expression(e) => visitor.visit_expression(e),
    }
}

pub fn walk_children<'r, V: RenderVisitor<'r> + ?Sized>(visitor: &mut V, children: &'r [RenderNode]) {
    for child in children {
        visitor.visit_node(child);
    }
}

pub fn walk_element<'r, V: RenderVisitor<'r> + ?Sized>(visitor: &mut V, element: &'r ElementNode) {
    walk_children(visitor, &element.children);
}

/// Visits every JSX node reachable through the expression's render-producing positions.
pub fn walk_expr<'r, V: RenderVisitor<'r> + ?Sized>(visitor: &mut V, expr: &'r Expr) {
    match expr {
        Expr::Jsx { node } => visitor.visit_node(node),
        Expr::Conditional {
            consequent,
            alternate,
            ..
        } => {
            walk_expr(visitor, consequent);
            walk_expr(visitor, alternate);
        }
        Expr::Logical { left, right, .. } => {
            walk_expr(visitor, left);
            walk_expr(visitor, right);
        }
        Expr::Call { args, .. } => {
            for arg in args {
                walk_expr(visitor, arg);
            }
        }
        Expr::Function {
            body: FunctionBody::Expression { expr },
            ..
        } => walk_expr(visitor, expr),
        Expr::Array { elements } => {
            for e in elements {
                walk_expr(visitor, e);
            }
        }
        _ => {}
    }
}
