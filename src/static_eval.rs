//! Reference Evaluator
//!
//! Evaluates the closed expression subset directly against a JSON state
//! snapshot, and expands a render tree into plain virtual nodes. Template
//! materialization is checked against this.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ir::{AttributeValue, BinaryOp, Expr, FunctionBody, LogicalOp, RenderNode, UnaryOp};
use crate::jsx_lowerer::number_value;
use crate::transform::{apply, display, is_truthy, recognize, to_js_string, to_number};

/// A rendered node with every value resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum VNode {
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
        children: Vec<VNode>,
    },
    Text {
        value: String,
    },
}

/// Merges adjacent text and drops empty text, as a DOM would show it.
pub fn normalize(nodes: Vec<VNode>) -> Vec<VNode> {
    let mut out: Vec<VNode> = Vec::new();
    for node in nodes {
        match node {
            VNode::Text { value } if value.is_empty() => {}
            VNode::Text { value } => match out.last_mut() {
                Some(VNode::Text { value: prev }) => prev.push_str(&value),
                _ => out.push(VNode::Text { value }),
            },
            element => out.push(element),
        }
    }
    out
}

/// Resolves a dotted path (`user.profile.name`, `items.length`) in a scope object.
pub fn lookup_path(scope: &Value, path: &str) -> Value {
    let mut current = scope.clone();
    for segment in path.split('.') {
        current = property(&current, segment);
    }
    current
}

fn property(value: &Value, name: &str) -> Value {
    match value {
        Value::Object(map) => map.get(name).cloned().unwrap_or(Value::Null),
        Value::Array(items) if name == "length" => Value::from(items.len()),
        Value::String(s) if name == "length" => Value::from(s.chars().count()),
        Value::Array(items) => name
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i).cloned())
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// Scope with loop parameters bound.
pub fn with_bindings(scope: &Value, bindings: &[(&str, Value)]) -> Value {
    let mut map = match scope {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    for (name, value) in bindings {
        map.insert(name.to_string(), value.clone());
    }
    Value::Object(map)
}

fn loose_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(_), _) | (_, Value::Number(_)) | (Value::Bool(_), _) | (_, Value::Bool(_)) => {
            to_number(a) == to_number(b)
        }
        _ => a == b,
    }
}

pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

pub fn compare(op: BinaryOp, a: &Value, b: &Value) -> Option<bool> {
    let result = match op {
        BinaryOp::Eq => loose_equals(a, b),
        BinaryOp::NotEq => !loose_equals(a, b),
        BinaryOp::StrictEq => strict_equals(a, b),
        BinaryOp::StrictNotEq => !strict_equals(a, b),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let ordering = match (a, b) {
                (Value::String(x), Value::String(y)) => x.partial_cmp(y),
                _ => to_number(a).partial_cmp(&to_number(b)),
            };
            let Some(ordering) = ordering else {
                return Some(false);
            };
            match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::LtEq => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }
        }
        _ => return None,
    };
    Some(result)
}

fn arithmetic(op: BinaryOp, a: &Value, b: &Value) -> Option<Value> {
    if op == BinaryOp::Add && (a.is_string() || b.is_string()) {
        return Some(Value::String(format!("{}{}", to_js_string(a), to_js_string(b))));
    }
    let (x, y) = (to_number(a), to_number(b));
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
        BinaryOp::Rem => x % y,
        _ => return compare(op, a, b).map(Value::Bool),
    };
    Some(number_value(result))
}

/// Direct evaluation of the closed subset; `None` for anything outside it.
pub fn evaluate(expr: &Expr, scope: &Value) -> Option<Value> {
    match expr {
        Expr::Literal { value } => Some(value.clone()),
        Expr::Ident { name } => Some(lookup_path(scope, name)),
        Expr::Member {
            object, property: name, ..
        } => Some(property(&evaluate(object, scope)?, name)),
        Expr::Index { object, index } => {
            let object = evaluate(object, scope)?;
            let key = evaluate(index, scope)?;
            Some(property(&object, &to_js_string(&key)))
        }
        Expr::Call { callee, args, .. } => {
            if let Some((receiver, transform)) = recognize(expr) {
                return Some(apply(&transform, &evaluate(receiver, scope)?));
            }
            // items.map(item => ...)
            let Expr::Member { object, property, .. } = callee.as_ref() else {
                return None;
            };
            if property != "map" {
                return None;
            }
            let Some(Expr::Function {
                params,
                body: FunctionBody::Expression { expr: body },
                ..
            }) = args.first()
            else {
                return None;
            };
            let Value::Array(items) = evaluate(object, scope)? else {
                return None;
            };
            items
                .iter()
                .enumerate()
                .map(|(i, item)| evaluate(body, &loop_scope(scope, params, item, i)))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array)
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if is_truthy(&evaluate(test, scope)?) {
                evaluate(consequent, scope)
            } else {
                evaluate(alternate, scope)
            }
        }
        Expr::Logical { op, left, right } => {
            let left = evaluate(left, scope)?;
            match op {
                LogicalOp::And if !is_truthy(&left) => Some(left),
                LogicalOp::Or if is_truthy(&left) => Some(left),
                LogicalOp::Coalesce if !left.is_null() => Some(left),
                _ => evaluate(right, scope),
            }
        }
        Expr::Binary { op, left, right } => {
            arithmetic(*op, &evaluate(left, scope)?, &evaluate(right, scope)?)
        }
        Expr::Unary { op, argument } => {
            let value = evaluate(argument, scope)?;
            match op {
                UnaryOp::Not => Some(Value::Bool(!is_truthy(&value))),
                UnaryOp::Neg => Some(number_value(-to_number(&value))),
                UnaryOp::Plus => Some(number_value(to_number(&value))),
                UnaryOp::Other => None,
            }
        }
        Expr::Template {
            quasis,
            expressions,
        } => {
            let mut out = String::new();
            for (i, quasi) in quasis.iter().enumerate() {
                out.push_str(quasi);
                if let Some(e) = expressions.get(i) {
                    out.push_str(&to_js_string(&evaluate(e, scope)?));
                }
            }
            Some(Value::String(out))
        }
        Expr::Array { elements } => elements
            .iter()
            .map(|e| evaluate(e, scope))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        Expr::Object { properties } => {
            let mut map = Map::new();
            for (key, value) in properties {
                map.insert(key.clone(), evaluate(value, scope)?);
            }
            Some(Value::Object(map))
        }
        Expr::Function { .. } | Expr::Jsx { .. } | Expr::Opaque { .. } => None,
    }
}

pub fn loop_scope(scope: &Value, params: &[String], item: &Value, index: usize) -> Value {
    let mut bindings = Vec::new();
    if let Some(item_var) = params.first() {
        bindings.push((item_var.as_str(), item.clone()));
    }
    if let Some(index_var) = params.get(1) {
        bindings.push((index_var.as_str(), Value::from(index)));
    }
    with_bindings(scope, &bindings)
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIRECT RENDER EXPANSION
// ═══════════════════════════════════════════════════════════════════════════════

/// `camelCase` style keys as CSS property names.
pub fn kebab_case(name: &str) -> String {
    let mut out = String::new();
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn attribute_value(expr: &Expr, scope: &Value) -> Option<String> {
    if let Expr::Object { properties } = expr {
        let mut parts = Vec::new();
        for (key, value) in properties {
            parts.push(format!("{}: {}", kebab_case(key), display(&evaluate(value, scope)?)));
        }
        return Some(parts.join("; "));
    }
    Some(display(&evaluate(expr, scope)?))
}

pub fn expand(node: &RenderNode, scope: &Value) -> Option<Vec<VNode>> {
    let nodes = match node {
        RenderNode::Element(el) => {
            let mut attributes = BTreeMap::new();
            for attr in el.attributes.iter().filter(|a| a.is_templatable()) {
                let value = match &attr.value {
                    AttributeValue::Static { value } => value.clone(),
                    AttributeValue::Boolean => String::new(),
                    AttributeValue::Dynamic { expr, .. } => attribute_value(expr, scope)?,
                    AttributeValue::Spread { .. } => continue,
                };
                attributes.insert(attr.name.clone(), value);
            }
            let mut children = Vec::new();
            for child in &el.children {
                children.extend(expand(child, scope)?);
            }
            vec![VNode::Element {
                tag: el.tag.clone(),
                attributes,
                children: normalize(children),
            }]
        }
        RenderNode::Fragment(frag) => {
            let mut children = Vec::new();
            for child in &frag.children {
                children.extend(expand(child, scope)?);
            }
            children
        }
        RenderNode::Text(t) => vec![VNode::Text {
            value: t.value.clone(),
        }],
        RenderNode::Expression(e) => expand_expr(&e.expr, scope)?,
    };
    Some(normalize(nodes))
}

/// Expands an interpolation; JSX-producing shapes render their chosen branch or items.
pub fn expand_expr(expr: &Expr, scope: &Value) -> Option<Vec<VNode>> {
    if !expr.contains_jsx() {
        let value = evaluate(expr, scope)?;
        return Some(vec![VNode::Text {
            value: display(&value),
        }]);
    }
    match expr {
        Expr::Jsx { node } => expand(node, scope),
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if is_truthy(&evaluate(test, scope)?) {
                expand_expr(consequent, scope)
            } else {
                expand_expr(alternate, scope)
            }
        }
        Expr::Logical {
            op: LogicalOp::And,
            left,
            right,
        } => {
            let left = evaluate(left, scope)?;
            if is_truthy(&left) {
                expand_expr(right, scope)
            } else {
                Some(vec![VNode::Text {
                    value: display(&left),
                }])
            }
        }
        Expr::Call { callee, args, .. } => {
            let Expr::Member {
                object, property, ..
            } = callee.as_ref()
            else {
                return None;
            };
            let Some(Expr::Function {
                params,
                body: FunctionBody::Expression { expr: body },
                ..
            }) = args.first()
            else {
                return None;
            };
            if property != "map" {
                return None;
            }
            let Value::Array(items) = evaluate(object, scope)? else {
                return Some(vec![]);
            };
            let mut out = Vec::new();
            for (i, item) in items.iter().enumerate() {
                out.extend(expand_expr(body, &loop_scope(scope, params, item, i))?);
            }
            Some(out)
        }
        _ => None,
    }
}
