//! State-origin dependency analysis and render-zone classification.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::ir::{AttributeValue, ComponentIR, ElementNode, Expr, ExpressionNode, FragmentNode, NodeId, RenderNode, StateOrigin, TextNode};
use crate::visitor::{walk_children, walk_expr, RenderVisitor};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub origin: StateOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    /// Never updates.
    Static,
    /// Needs a server round trip.
    Server,
    /// Updates locally.
    Client,
    Hybrid,
}

/// Derived state is recomputed where it is read; `other` origins stay on the server.
pub fn zone_of_origin(origin: StateOrigin) -> Zone {
    match origin {
        StateOrigin::Server | StateOrigin::Other => Zone::Server,
        StateOrigin::Client | StateOrigin::Derived => Zone::Client,
    }
}

pub fn classify(deps: &BTreeSet<Dependency>) -> Zone {
    let zones: BTreeSet<Zone> = deps.iter().map(|d| zone_of_origin(d.origin)).collect();
    match zones.len() {
        0 => Zone::Static,
        1 => zones.into_iter().next().unwrap_or(Zone::Static),
        _ => Zone::Hybrid,
    }
}

/// Every identifier read by `expr` that names a slot, with that slot's origin.
///
/// Reads of local bindings are followed into their initializers.
pub fn dependencies(expr: &Expr, ir: &ComponentIR) -> BTreeSet<Dependency> {
    let mut out = BTreeSet::new();
    let mut visiting = HashSet::new();
    for name in expr.free_reads() {
        resolve_read(&name, ir, &mut visiting, &mut out);
    }
    out
}

fn resolve_read(name: &str, ir: &ComponentIR, visiting: &mut HashSet<String>, out: &mut BTreeSet<Dependency>) {
    if let Some(slot) = ir.slot_by_name(name) {
        out.insert(Dependency {
            name: name.to_string(),
            origin: slot.origin,
        });
        return;
    }
    if !visiting.insert(name.to_string()) {
        return;
    }
    if let Some(local) = ir.locals.iter().find(|l| l.name == name) {
        for read in &local.reads {
            resolve_read(read, ir, visiting, out);
        }
    }
}

/// Union of an element's templatable attributes and its whole subtree.
pub fn node_dependencies(node: &RenderNode, ir: &ComponentIR) -> BTreeSet<Dependency> {
    match node {
        RenderNode::Element(el) => element_dependencies(el, ir),
        RenderNode::Fragment(frag) => frag
            .children
            .iter()
            .flat_map(|c| node_dependencies(c, ir))
            .collect(),
        RenderNode::Text(_) => BTreeSet::new(),
        RenderNode::Expression(e) => dependencies(&e.expr, ir),
    }
}

fn element_dependencies(el: &ElementNode, ir: &ComponentIR) -> BTreeSet<Dependency> {
    let mut deps = BTreeSet::new();
    for attr in el.attributes.iter().filter(|a| a.is_templatable()) {
        if let AttributeValue::Dynamic { expr, .. } = &attr.value {
            deps.extend(dependencies(expr, ir));
        }
    }
    for child in &el.children {
        deps.extend(node_dependencies(child, ir));
    }
    deps
}

// ═══════════════════════════════════════════════════════════════════════════════
// ZONE TABLE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, Clone)]
pub struct ZoneTable {
    pub zones: HashMap<NodeId, Zone>,
    pub dependencies: HashMap<NodeId, BTreeSet<Dependency>>,
}

impl ZoneTable {
    pub fn zone_of(&self, id: NodeId) -> Zone {
        self.zones.get(&id).copied().unwrap_or(Zone::Static)
    }

    fn record(&mut self, id: NodeId, deps: BTreeSet<Dependency>) {
        self.zones.insert(id, classify(&deps));
        self.dependencies.insert(id, deps);
    }
}

/// Labels every node of the render tree, including JSX nested in expressions.
pub fn classify_tree(root: &RenderNode, ir: &ComponentIR) -> ZoneTable {
    let mut classifier = ZoneClassifier {
        ir,
        table: ZoneTable::default(),
    };
    classifier.visit_node(root);
    classifier.table
}

struct ZoneClassifier<'c> {
    ir: &'c ComponentIR,
    table: ZoneTable,
}

impl<'r, 'c> RenderVisitor<'r> for ZoneClassifier<'c> {
    fn visit_element(&mut self, element: &'r ElementNode) {
        let deps = element_dependencies(element, self.ir);
        self.table.record(element.id, deps);
        walk_children(self, &element.children);
    }

    fn visit_fragment(&mut self, fragment: &'r FragmentNode) {
        let deps = fragment
            .children
            .iter()
            .flat_map(|c| node_dependencies(c, self.ir))
            .collect();
        self.table.record(fragment.id, deps);
        walk_children(self, &fragment.children);
    }

    fn visit_text(&mut self, text: &'r TextNode) {
        self.table.record(text.id, BTreeSet::new());
    }

    fn visit_expression(&mut self, expression: &'r ExpressionNode) {
        let deps = dependencies(&expression.expr, self.ir);
        self.table.record(expression.id, deps);
        walk_expr(self, &expression.expr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Hook, Lowered, LocalBinding, Slot};
    use proptest::prelude::*;
    use serde_json::json;

    fn slot(index: usize, name: &str, origin: StateOrigin) -> Slot {
        Slot {
            index,
            name: Some(name.to_string()),
            setter: None,
            origin,
            hook: Hook::State {
                initial: Lowered::Literal(json!(0)),
            },
        }
    }

    fn origin_strategy() -> impl Strategy<Value = StateOrigin> {
        prop_oneof![
            Just(StateOrigin::Server),
            Just(StateOrigin::Client),
            Just(StateOrigin::Derived),
            Just(StateOrigin::Other),
        ]
    }

    proptest! {
        #[test]
        fn prop_classification_follows_origins(origins in prop::collection::vec(origin_strategy(), 0..6)) {
            let deps: BTreeSet<Dependency> = origins
                .iter()
                .enumerate()
                .map(|(i, o)| Dependency { name: format!("s{}", i), origin: *o })
                .collect();
            let zones: BTreeSet<Zone> = origins.iter().map(|o| zone_of_origin(*o)).collect();
            let zone = classify(&deps);
            if origins.is_empty() {
                prop_assert_eq!(zone, Zone::Static);
            } else if zones.len() == 1 {
                prop_assert_eq!(zone, zone_of_origin(origins[0]));
            } else {
                prop_assert_eq!(zone, Zone::Hybrid);
            }
        }
    }

    #[test]
    fn test_dependencies_follow_locals_and_ignore_params() {
        let mut ir = ComponentIR::new("Cart");
        ir.slots.push(slot(0, "items", StateOrigin::Server));
        ir.slots.push(slot(1, "query", StateOrigin::Client));
        ir.locals.push(LocalBinding {
            name: "label".to_string(),
            code: "query.trim()".to_string(),
            expr: None,
            is_function: false,
            portable: true,
            reads: vec!["query".to_string()],
        });
        let expr = Expr::Binary {
            op: crate::ir::BinaryOp::Add,
            left: Box::new(Expr::ident("label")),
            right: Box::new(Expr::member(Expr::ident("items"), "length")),
        };
        let deps = dependencies(&expr, &ir);
        assert_eq!(deps.len(), 2);
        assert_eq!(classify(&deps), Zone::Hybrid);

        let shadowed = Expr::Function {
            params: vec!["items".to_string()],
            body: crate::ir::FunctionBody::Expression {
                expr: Box::new(Expr::ident("items")),
            },
            is_async: false,
            is_generator: false,
        };
        assert!(dependencies(&shadowed, &ir).is_empty());
    }
}
