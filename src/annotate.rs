//! Hex path assignment over a component's render tree.
//!
//! Paths live in a side table keyed by `NodeId`; the render tree itself is never
//! mutated. Fragments are transparent: their children are addressed at the
//! fragment's parent level.

use std::collections::{BTreeSet, HashMap};

use crate::hex_path::{build_path, get_parent_path, is_valid_path, last_segment, HexPathAllocator};
use crate::ir::{ElementNode, Expr, ExpressionNode, FunctionBody, NodeId, RenderNode};

/// One addressable position under a parent.
#[derive(Debug, Clone, Copy)]
pub enum ChildUnit<'r> {
    Element(&'r ElementNode),
    /// Consecutive text and interpolation children, compiled as one text template.
    TextRun(&'r [&'r RenderNode]),
    /// An interpolation producing elements: a conditional, a logical guard or a loop.
    Structural(&'r ExpressionNode),
}

/// Splits `children` into addressable units, flattening fragments first.
pub fn flatten_children(children: &[RenderNode]) -> Vec<&RenderNode> {
    let mut out = Vec::new();
    for child in children {
        match child {
            RenderNode::Fragment(frag) => out.extend(flatten_children(&frag.children)),
            other => out.push(other),
        }
    }
    out
}

pub fn child_units<'r>(flat: &'r [&'r RenderNode]) -> Vec<ChildUnit<'r>> {
    let mut units = Vec::new();
    let mut run_start: Option<usize> = None;
    for (i, node) in flat.iter().enumerate() {
        let unit = match node {
            RenderNode::Element(el) => Some(ChildUnit::Element(el)),
            RenderNode::Expression(e) if e.expr.contains_jsx() => Some(ChildUnit::Structural(e)),
            _ => None,
        };
        match unit {
            Some(unit) => {
                if let Some(start) = run_start.take() {
                    units.push(ChildUnit::TextRun(&flat[start..i]));
                }
                units.push(unit);
            }
            None => {
                if run_start.is_none() {
                    run_start = Some(i);
                }
            }
        }
    }
    if let Some(start) = run_start {
        units.push(ChildUnit::TextRun(&flat[start..]));
    }
    units
}

/// Marker segment of an element whose literal `key` is a hex path under `parent`.
pub fn marker_segment<'e>(element: &'e ElementNode, parent: &str) -> Option<&'e str> {
    let key = element.key.as_deref()?;
    if is_valid_path(key) && get_parent_path(key) == parent {
        Some(last_segment(key))
    } else {
        None
    }
}

#[derive(Debug, Default, Clone)]
pub struct PathTable {
    pub paths: HashMap<NodeId, String>,
    /// Explicit key markers that were honored.
    pub markers: BTreeSet<String>,
}

impl PathTable {
    pub fn path_of(&self, id: NodeId) -> Option<&str> {
        self.paths.get(&id).map(String::as_str)
    }
}

/// Assigns a hex path to every element, text run and structural node under `root`.
pub fn assign_paths(root: &RenderNode, allocator: &mut HexPathAllocator) -> PathTable {
    let mut table = PathTable::default();
    let roots = [root];
    let flat = match root {
        RenderNode::Fragment(frag) => flatten_children(&frag.children),
        _ => roots.to_vec(),
    };
    assign_level(&flat, "", allocator, &mut table);
    table
}

fn assign_level(flat: &[&RenderNode], parent: &str, allocator: &mut HexPathAllocator, table: &mut PathTable) {
    let units = child_units(flat);

    // Reserve explicit markers first so generated siblings never take them.
    for unit in &units {
        let segment = match unit {
            ChildUnit::Element(el) => marker_segment(el, parent),
            ChildUnit::Structural(e) => branch_marker_segment(&e.expr, parent),
            ChildUnit::TextRun(_) => None,
        };
        if let Some(segment) = segment {
            allocator.reserve(parent, segment);
        }
    }

    for unit in units {
        match unit {
            ChildUnit::Element(el) => {
                let path = match marker_segment(el, parent) {
                    Some(segment) => {
                        let path = build_path(parent, segment);
                        table.markers.insert(path.clone());
                        path
                    }
                    None => build_path(parent, &allocator.next(parent)),
                };
                assign_element(el, &path, allocator, table);
            }
            ChildUnit::TextRun(nodes) => {
                let path = build_path(parent, &allocator.next(parent));
                for node in nodes {
                    table.paths.insert(node.id(), path.clone());
                }
            }
            ChildUnit::Structural(expr) => {
                let path = match branch_marker_segment(&expr.expr, parent) {
                    Some(segment) => build_path(parent, segment),
                    None => build_path(parent, &allocator.next(parent)),
                };
                table.paths.insert(expr.id, path.clone());
                assign_structural(&expr.expr, &path, allocator, table);
            }
        }
    }
}

/// Marker carried by the first keyed branch root of a conditional.
fn branch_marker_segment<'e>(expr: &'e Expr, parent: &str) -> Option<&'e str> {
    match expr {
        Expr::Jsx { node } => match node.as_ref() {
            RenderNode::Element(el) => marker_segment(el, parent),
            _ => None,
        },
        Expr::Conditional {
            consequent,
            alternate,
            ..
        } => branch_marker_segment(consequent, parent).or_else(|| branch_marker_segment(alternate, parent)),
        Expr::Logical { right, .. } => branch_marker_segment(right, parent),
        _ => None,
    }
}

fn assign_element(el: &ElementNode, path: &str, allocator: &mut HexPathAllocator, table: &mut PathTable) {
    table.paths.insert(el.id, path.to_string());
    let flat = flatten_children(&el.children);
    assign_level(&flat, path, allocator, table);
}

/// Branch and loop-item roots render at the structural node's own position;
/// their descendants share one counter under it.
fn assign_structural(expr: &Expr, path: &str, allocator: &mut HexPathAllocator, table: &mut PathTable) {
    match expr {
        Expr::Jsx { node } => match node.as_ref() {
            RenderNode::Element(el) => {
                if el.key.as_deref() == Some(path) {
                    table.markers.insert(path.to_string());
                }
                assign_element(el, path, allocator, table)
            }
            RenderNode::Fragment(frag) => {
                table.paths.insert(frag.id, path.to_string());
                let flat = flatten_children(&frag.children);
                assign_level(&flat, path, allocator, table);
            }
            other => {
                table.paths.insert(other.id(), path.to_string());
            }
        },
        Expr::Conditional {
            consequent,
            alternate,
            ..
        } => {
            assign_structural(consequent, path, allocator, table);
            assign_structural(alternate, path, allocator, table);
        }
        Expr::Logical { left, right, .. } => {
            assign_structural(left, path, allocator, table);
            assign_structural(right, path, allocator, table);
        }
        Expr::Call { args, .. } => {
            for arg in args {
                assign_structural(arg, path, allocator, table);
            }
        }
        Expr::Function {
            body: FunctionBody::Expression { expr },
            ..
        } => assign_structural(expr, path, allocator, table),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FragmentNode, TextNode};
    use std::collections::HashSet;

    fn text(start: u32, value: &str) -> RenderNode {
        RenderNode::Text(TextNode {
            id: NodeId::new(start, start + 1),
            value: value.to_string(),
        })
    }

    fn interp(start: u32, name: &str) -> RenderNode {
        RenderNode::Expression(ExpressionNode {
            id: NodeId::new(start, start + 1),
            expr: Expr::ident(name),
            code: name.to_string(),
        })
    }

    fn element(start: u32, key: Option<&str>, children: Vec<RenderNode>) -> RenderNode {
        RenderNode::Element(ElementNode {
            id: NodeId::new(start, start + 1),
            tag: "div".to_string(),
            attributes: vec![],
            children,
            key: key.map(str::to_string),
            name_end: start + 1,
        })
    }

    #[test]
    fn test_fragment_root_children_take_root_paths() {
        let root = RenderNode::Fragment(FragmentNode {
            id: NodeId::new(0, 10),
            children: vec![interp(2, "count")],
        });
        let table = assign_paths(&root, &mut HexPathAllocator::new());
        assert_eq!(table.path_of(NodeId::new(2, 3)), Some("1"));
    }

    #[test]
    fn test_adjacent_text_shares_one_path() {
        let root = element(0, None, vec![text(1, "Count: "), interp(2, "count"), element(3, None, vec![]), interp(4, "total")]);
        let table = assign_paths(&root, &mut HexPathAllocator::new());
        assert_eq!(table.path_of(NodeId::new(0, 1)), Some("1"));
        assert_eq!(table.path_of(NodeId::new(1, 2)), Some("1.1"));
        assert_eq!(table.path_of(NodeId::new(2, 3)), Some("1.1"));
        assert_eq!(table.path_of(NodeId::new(3, 4)), Some("1.2"));
        assert_eq!(table.path_of(NodeId::new(4, 5)), Some("1.3"));
    }

    #[test]
    fn test_key_markers_are_kept_and_reserved() {
        let root = element(
            0,
            Some("1"),
            vec![element(1, None, vec![]), element(2, Some("1.1"), vec![]), element(3, Some("9.9"), vec![])],
        );
        let table = assign_paths(&root, &mut HexPathAllocator::new());
        assert_eq!(table.path_of(NodeId::new(2, 3)), Some("1.1"));
        // "1.1" is reserved, so the unkeyed first child skips it
        assert_eq!(table.path_of(NodeId::new(1, 2)), Some("1.2"));
        // wrong parent: not a marker
        assert_eq!(table.path_of(NodeId::new(3, 4)), Some("1.3"));
        assert_eq!(table.markers.iter().cloned().collect::<Vec<_>>(), vec!["1", "1.1"]);
    }

    #[test]
    fn test_keyed_branch_root_is_a_marker() {
        let branch = RenderNode::Expression(ExpressionNode {
            id: NodeId::new(2, 3),
            expr: Expr::Conditional {
                test: Box::new(Expr::ident("open")),
                consequent: Box::new(Expr::Jsx {
                    node: Box::new(element(4, Some("1.2"), vec![])),
                }),
                alternate: Box::new(Expr::literal(serde_json::Value::Null)),
            },
            code: "open ? <div key=\"1.2\" /> : null".to_string(),
        });
        let root = element(0, None, vec![element(1, None, vec![]), branch]);
        let table = assign_paths(&root, &mut HexPathAllocator::new());
        assert_eq!(table.path_of(NodeId::new(2, 3)), Some("1.2"));
        assert_eq!(table.path_of(NodeId::new(4, 5)), Some("1.2"));
        assert_eq!(table.path_of(NodeId::new(1, 2)), Some("1.1"));
        assert!(table.markers.contains("1.2"));
    }

    #[test]
    fn test_paths_are_unique_in_wide_trees() {
        let children = (1..40).map(|i| element(i, None, vec![])).collect();
        let root = element(0, None, children);
        let table = assign_paths(&root, &mut HexPathAllocator::new());
        let unique: HashSet<_> = table.paths.values().collect();
        assert_eq!(unique.len(), table.paths.len());
    }
}
