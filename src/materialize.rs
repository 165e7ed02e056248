//! Reference materializer: reproduces render output from templates and a state snapshot.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::static_eval::{lookup_path, loop_scope, normalize, VNode};
use crate::templates::{ConditionalElement, LoopTemplate, Pattern, StructuralNode};
use crate::transform::{apply, display, is_truthy, to_js_string};

/// Substitutes every placeholder of `pattern` from `scope`.
pub fn materialize_pattern(pattern: &Pattern, scope: &Value) -> String {
    let values: Vec<String> = pattern
        .bindings
        .iter()
        .enumerate()
        .map(|(i, binding)| binding_text(pattern, i, &lookup_path(scope, binding)))
        .collect();

    let mut out = String::new();
    let mut chars = pattern.template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut digits = String::new();
                for d in chars.by_ref() {
                    if d == '}' {
                        break;
                    }
                    digits.push(d);
                }
                if let Some(value) = digits.parse::<usize>().ok().and_then(|i| values.get(i)) {
                    out.push_str(value);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn binding_text(pattern: &Pattern, index: usize, value: &Value) -> String {
    if pattern.conditional_binding_index == Some(index) {
        if let Some(arms) = &pattern.conditional_templates {
            let key = if is_truthy(value) { "true" } else { "false" };
            return arms.get(key).cloned().unwrap_or_default();
        }
    }
    let value = match &pattern.transform {
        Some(bound) if bound.binding_index == index => apply(&bound.transform, value),
        _ => value.clone(),
    };
    if pattern.string_bindings.contains(&index) {
        to_js_string(&value)
    } else {
        display(&value)
    }
}

/// Expands a structural descriptor; `None` when it contains a non-reproducible part.
pub fn materialize_structure(node: &StructuralNode, scope: &Value) -> Option<Vec<VNode>> {
    let nodes = match node {
        StructuralNode::Element {
            tag,
            attributes,
            children,
            ..
        } => {
            let mut attrs = BTreeMap::new();
            for attr in attributes {
                let pattern = attr.pattern.as_ref()?;
                attrs.insert(attr.name.clone(), materialize_pattern(pattern, scope));
            }
            let mut out = Vec::new();
            for child in children {
                out.extend(materialize_structure(child, scope)?);
            }
            vec![VNode::Element {
                tag: tag.clone(),
                attributes: attrs,
                children: normalize(out),
            }]
        }
        StructuralNode::Fragment { children } => {
            let mut out = Vec::new();
            for child in children {
                out.extend(materialize_structure(child, scope)?);
            }
            out
        }
        StructuralNode::Text { pattern, .. } => vec![VNode::Text {
            value: materialize_pattern(pattern, scope),
        }],
        StructuralNode::Conditional(conditional) => materialize_conditional(conditional, scope)?,
        StructuralNode::Loop(template) => materialize_loop(template, scope)?,
        StructuralNode::Dynamic { .. } => return None,
    };
    Some(normalize(nodes))
}

pub fn materialize_conditional(conditional: &ConditionalElement, scope: &Value) -> Option<Vec<VNode>> {
    let condition = conditional.condition.as_ref()?;
    let branch = if condition.evaluate(scope) {
        &conditional.when_true
    } else {
        &conditional.when_false
    };
    match branch {
        Some(node) => materialize_structure(node, scope),
        None => Some(vec![]),
    }
}

/// One item structure per collection element, in order.
pub fn materialize_loop(template: &LoopTemplate, scope: &Value) -> Option<Vec<VNode>> {
    let Value::Array(items) = lookup_path(scope, &template.array_binding) else {
        return Some(vec![]);
    };
    let params: Vec<String> = template
        .item_var
        .iter()
        .chain(template.index_var.iter())
        .cloned()
        .collect();
    let mut out = Vec::new();
    for (i, item) in items.iter().enumerate() {
        let item_scope = loop_scope(scope, &params, item, i);
        out.extend(materialize_structure(&template.item_template, &item_scope)?);
    }
    Some(out)
}
