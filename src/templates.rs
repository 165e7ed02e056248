//! Template extraction.
//!
//! Produces the path-keyed template families for one component: text and
//! attribute templates, conditional element descriptors and loop templates.
//! Anything outside the recognized expression subset becomes a `Fallback`
//! record instead of a template.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::annotate::{child_units, flatten_children, ChildUnit, PathTable};
use crate::dependencies::{classify, dependencies, Zone, ZoneTable};
use crate::ir::{
    AttributeValue, BinaryOp, ComponentIR, ElementNode, Expr, ExpressionNode, FunctionBody,
    LogicalOp, NodeId, RenderNode, UnaryOp,
};
use crate::jsx_lowerer::literal_value;
use crate::static_eval::{compare, kebab_case, lookup_path};
use crate::transform::{display, is_truthy, recognize, to_js_string, Transform};

fn is_false(b: &bool) -> bool {
    !*b
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATE TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundTransform {
    /// Index into `bindings` of the value the transform applies to.
    pub binding_index: usize,
    #[serde(flatten)]
    pub transform: Transform,
}

/// A template string with `{n}` placeholders and one binding per placeholder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    pub template: String,
    pub bindings: Vec<String>,
    /// Character offset of each placeholder in `template`.
    pub slots: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_templates: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_binding_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<BoundTransform>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub nullable: bool,
    /// Bindings interpolated inside a template literal, stringified as `String(value)`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub string_bindings: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TemplateKind {
    Static,
    Dynamic,
    Attribute,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(flatten)]
    pub pattern: Pattern,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: TemplateKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    pub zone: Zone,
}

/// Closed condition descriptor; anything else is not evaluable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Condition {
    Binding { binding: String },
    Not { operand: Box<Condition> },
    And { left: Box<Condition>, right: Box<Condition> },
    Or { left: Box<Condition>, right: Box<Condition> },
    Compare { binding: String, op: BinaryOp, value: Value },
    Literal { value: Value },
}

fn is_comparison(op: BinaryOp) -> bool {
    matches!(
        op,
        BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::StrictEq
            | BinaryOp::StrictNotEq
            | BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq
    )
}

fn flip(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Lt => BinaryOp::Gt,
        BinaryOp::LtEq => BinaryOp::GtEq,
        BinaryOp::Gt => BinaryOp::Lt,
        BinaryOp::GtEq => BinaryOp::LtEq,
        other => other,
    }
}

impl Condition {
    pub fn from_expr(expr: &Expr) -> Option<Self> {
        if let Some(value) = literal_value(expr) {
            return Some(Condition::Literal { value });
        }
        if let Some(binding) = expr.binding_path() {
            return Some(Condition::Binding { binding });
        }
        match expr {
            Expr::Unary {
                op: UnaryOp::Not,
                argument,
            } => Some(Condition::Not {
                operand: Box::new(Self::from_expr(argument)?),
            }),
            Expr::Logical { op, left, right } => {
                let left = Box::new(Self::from_expr(left)?);
                let right = Box::new(Self::from_expr(right)?);
                match op {
                    LogicalOp::And => Some(Condition::And { left, right }),
                    LogicalOp::Or => Some(Condition::Or { left, right }),
                    LogicalOp::Coalesce => None,
                }
            }
            Expr::Binary { op, left, right } if is_comparison(*op) => {
                match (left.binding_path(), literal_value(right)) {
                    (Some(binding), Some(value)) => Some(Condition::Compare { binding, op: *op, value }),
                    _ => match (literal_value(left), right.binding_path()) {
                        (Some(value), Some(binding)) => Some(Condition::Compare {
                            binding,
                            op: flip(*op),
                            value,
                        }),
                        _ => None,
                    },
                }
            }
            _ => None,
        }
    }

    pub fn bindings(&self) -> Vec<String> {
        let mut out = BTreeSet::new();
        self.collect_bindings(&mut out);
        out.into_iter().collect()
    }

    fn collect_bindings(&self, out: &mut BTreeSet<String>) {
        match self {
            Condition::Binding { binding } | Condition::Compare { binding, .. } => {
                out.insert(binding.clone());
            }
            Condition::Not { operand } => operand.collect_bindings(out),
            Condition::And { left, right } | Condition::Or { left, right } => {
                left.collect_bindings(out);
                right.collect_bindings(out);
            }
            Condition::Literal { .. } => {}
        }
    }

    pub fn evaluate(&self, scope: &Value) -> bool {
        match self {
            Condition::Binding { binding } => is_truthy(&lookup_path(scope, binding)),
            Condition::Not { operand } => !operand.evaluate(scope),
            Condition::And { left, right } => left.evaluate(scope) && right.evaluate(scope),
            Condition::Or { left, right } => left.evaluate(scope) || right.evaluate(scope),
            Condition::Compare { binding, op, value } => {
                compare(*op, &lookup_path(scope, binding), value).unwrap_or(false)
            }
            Condition::Literal { value } => is_truthy(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeTemplate {
    pub name: String,
    /// `None` when the value is outside the template subset.
    pub pattern: Option<Pattern>,
}

/// Fully expanded structure of a branch or loop item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StructuralNode {
    Element {
        tag: String,
        path: String,
        attributes: Vec<AttributeTemplate>,
        children: Vec<StructuralNode>,
    },
    Text {
        path: String,
        #[serde(flatten)]
        pattern: Pattern,
    },
    Fragment {
        children: Vec<StructuralNode>,
    },
    Conditional(Box<ConditionalElement>),
    Loop(Box<LoopTemplate>),
    /// Not reproducible from templates; needs a render.
    Dynamic { path: String, code: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalElement {
    pub path: String,
    pub condition: Option<Condition>,
    pub condition_code: String,
    pub condition_bindings: Vec<String>,
    pub evaluable: bool,
    pub when_true: Option<StructuralNode>,
    pub when_false: Option<StructuralNode>,
    pub zone: Zone,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopTemplate {
    pub path: String,
    pub array_binding: String,
    pub item_var: Option<String>,
    pub index_var: Option<String>,
    pub key_binding: Option<String>,
    pub item_template: StructuralNode,
    pub zone: Zone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FallbackReason {
    UnsupportedExpression,
    ReadsLocal,
    MultipleTransforms,
    MultipleConditionals,
    /// One interpolation unit mixing server and client state; emitted whole, server-zoned.
    HybridLeaf,
    NonEvaluableCondition,
    UnsupportedLoop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fallback {
    pub path: String,
    pub reason: FallbackReason,
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateSet {
    pub templates: BTreeMap<String, Template>,
    pub conditional_elements: BTreeMap<String, ConditionalElement>,
    pub loop_templates: BTreeMap<String, LoopTemplate>,
    pub fallbacks: Vec<Fallback>,
}

pub fn attribute_key(path: &str, attribute: &str) -> String {
    format!("{}@{}", path, attribute)
}

// ═══════════════════════════════════════════════════════════════════════════════
// PATTERN BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

struct PatternBuilder<'c> {
    pattern: Pattern,
    locals: &'c HashSet<String>,
    bound: &'c [String],
    /// Nesting depth of template literals being flattened.
    template_depth: usize,
}

impl<'c> PatternBuilder<'c> {
    fn new(locals: &'c HashSet<String>, bound: &'c [String]) -> Self {
        Self {
            pattern: Pattern::default(),
            locals,
            bound,
            template_depth: 0,
        }
    }

    fn stringify(&self, value: &Value) -> String {
        if self.template_depth > 0 {
            to_js_string(value)
        } else {
            display(value)
        }
    }

    fn literal(&mut self, text: &str) {
        for c in text.chars() {
            match c {
                '{' => self.pattern.template.push_str("{{"),
                '}' => self.pattern.template.push_str("}}"),
                other => self.pattern.template.push(other),
            }
        }
    }

    fn placeholder(&mut self, binding: String) -> Result<usize, FallbackReason> {
        let root = binding.split('.').next().unwrap_or_default();
        if self.locals.contains(root) && !self.bound.iter().any(|b| b == root) {
            return Err(FallbackReason::ReadsLocal);
        }
        let index = self.pattern.bindings.len();
        self.pattern.slots.push(self.pattern.template.chars().count());
        self.pattern.template.push_str(&format!("{{{}}}", index));
        self.pattern.bindings.push(binding);
        if self.template_depth > 0 {
            self.pattern.string_bindings.push(index);
        }
        Ok(index)
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), FallbackReason> {
        if let Some(value) = literal_value(expr) {
            let text = self.stringify(&value);
            self.literal(&text);
            return Ok(());
        }
        if let Some(binding) = expr.binding_path() {
            self.pattern.nullable |= expr.is_optional_chain();
            self.placeholder(binding)?;
            return Ok(());
        }
        if let Some((receiver, transform)) = recognize(expr) {
            let binding = receiver
                .binding_path()
                .ok_or(FallbackReason::UnsupportedExpression)?;
            if self.pattern.transform.is_some() {
                return Err(FallbackReason::MultipleTransforms);
            }
            self.pattern.nullable |= receiver.is_optional_chain();
            let binding_index = self.placeholder(binding)?;
            self.pattern.transform = Some(BoundTransform {
                binding_index,
                transform,
            });
            return Ok(());
        }
        match expr {
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                let (binding, negated) = match test.as_ref() {
                    Expr::Unary {
                        op: UnaryOp::Not,
                        argument,
                    } => (argument.binding_path(), true),
                    other => (other.binding_path(), false),
                };
                let binding = binding.ok_or(FallbackReason::UnsupportedExpression)?;
                let (when_true, when_false) = match (literal_value(consequent), literal_value(alternate)) {
                    (Some(c), Some(a)) => (self.stringify(&c), self.stringify(&a)),
                    _ => return Err(FallbackReason::UnsupportedExpression),
                };
                if self.pattern.conditional_templates.is_some() {
                    return Err(FallbackReason::MultipleConditionals);
                }
                let (when_true, when_false) = if negated {
                    (when_false, when_true)
                } else {
                    (when_true, when_false)
                };
                let index = self.placeholder(binding)?;
                let mut arms = BTreeMap::new();
                arms.insert("true".to_string(), when_true);
                arms.insert("false".to_string(), when_false);
                self.pattern.conditional_templates = Some(arms);
                self.pattern.conditional_binding_index = Some(index);
                Ok(())
            }
            Expr::Template {
                quasis,
                expressions,
            } => {
                self.template_depth += 1;
                for (i, quasi) in quasis.iter().enumerate() {
                    self.literal(quasi);
                    if let Some(e) = expressions.get(i) {
                        self.expr(e)?;
                    }
                }
                self.template_depth -= 1;
                Ok(())
            }
            _ => Err(FallbackReason::UnsupportedExpression),
        }
    }

    /// Attribute values: style objects render as `kebab-key: value; ...`.
    fn attribute(&mut self, expr: &Expr) -> Result<(), FallbackReason> {
        if let Expr::Object { properties } = expr {
            for (i, (key, value)) in properties.iter().enumerate() {
                if i > 0 {
                    self.literal("; ");
                }
                self.literal(&format!("{}: ", kebab_case(key)));
                self.expr(value)?;
            }
            return Ok(());
        }
        self.expr(expr)
    }

    fn finish(self) -> Pattern {
        self.pattern
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXTRACTOR
// ═══════════════════════════════════════════════════════════════════════════════

pub struct TemplateContext<'c> {
    pub ir: &'c ComponentIR,
    pub paths: &'c PathTable,
    pub zones: &'c ZoneTable,
}

pub fn extract_templates(root: &RenderNode, ctx: &TemplateContext) -> TemplateSet {
    let locals = ctx
        .ir
        .locals
        .iter()
        .filter(|l| ctx.ir.slot_by_name(&l.name).is_none())
        .map(|l| l.name.clone())
        .collect();
    let mut extractor = TemplateExtractor {
        ctx,
        locals,
        set: TemplateSet::default(),
    };
    let roots = [root];
    let flat = match root {
        RenderNode::Fragment(frag) => flatten_children(&frag.children),
        _ => roots.to_vec(),
    };
    extractor.level(&flat);
    debug!(
        component = %ctx.ir.name,
        templates = extractor.set.templates.len(),
        conditionals = extractor.set.conditional_elements.len(),
        loops = extractor.set.loop_templates.len(),
        fallbacks = extractor.set.fallbacks.len(),
        "extracted templates"
    );
    extractor.set
}

struct TemplateExtractor<'c> {
    ctx: &'c TemplateContext<'c>,
    locals: HashSet<String>,
    set: TemplateSet,
}

impl<'c> TemplateExtractor<'c> {
    fn path_of(&self, id: NodeId) -> String {
        self.ctx.paths.path_of(id).unwrap_or_default().to_string()
    }

    fn fallback(&mut self, path: &str, reason: FallbackReason, code: &str) {
        self.set.fallbacks.push(Fallback {
            path: path.to_string(),
            reason,
            code: code.to_string(),
        });
    }

    /// Top-level document positions: templates are registered by path.
    fn level(&mut self, flat: &[&RenderNode]) {
        for unit in child_units(flat) {
            match unit {
                ChildUnit::Element(el) => self.element(el),
                ChildUnit::TextRun(nodes) => {
                    let path = self.path_of(nodes[0].id());
                    self.text_run(nodes, &path);
                }
                ChildUnit::Structural(e) => {
                    let path = self.path_of(e.id);
                    let node = self.structural(e, &path, &[]);
                    match node {
                        StructuralNode::Conditional(c) => {
                            self.set.conditional_elements.insert(path, *c);
                        }
                        StructuralNode::Loop(l) => {
                            self.set.loop_templates.insert(path, *l);
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    fn element(&mut self, el: &ElementNode) {
        self.register_attributes(el);
        let flat = flatten_children(&el.children);
        self.level(&flat);
    }

    fn register_attributes(&mut self, el: &ElementNode) {
        let path = self.path_of(el.id);
        for attr in el.attributes.iter().filter(|a| a.is_templatable()) {
            let AttributeValue::Dynamic { expr, code } = &attr.value else {
                continue;
            };
            let key = attribute_key(&path, &attr.name);
            let mut builder = PatternBuilder::new(&self.locals, &[]);
            match builder.attribute(expr) {
                Ok(()) => {
                    let pattern = builder.finish();
                    let deps = dependencies(expr, self.ctx.ir);
                    let zone = self.leaf_zone(classify(&deps), &key, code);
                    let template = Template {
                        pattern,
                        path: path.clone(),
                        kind: TemplateKind::Attribute,
                        attribute: Some(attr.name.clone()),
                        zone,
                    };
                    self.set.templates.insert(key, template);
                }
                Err(reason) => self.fallback(&key, reason, code),
            }
        }
    }

    /// Hybrid leaves keep one whole template, zoned server, and are recorded.
    fn leaf_zone(&mut self, zone: Zone, key: &str, code: &str) -> Zone {
        if zone == Zone::Hybrid {
            self.fallback(key, FallbackReason::HybridLeaf, code);
            Zone::Server
        } else {
            zone
        }
    }

    fn run_pattern(&self, nodes: &[&RenderNode], bound: &[String]) -> Result<Pattern, FallbackReason> {
        let mut builder = PatternBuilder::new(&self.locals, bound);
        for node in nodes {
            match node {
                RenderNode::Text(t) => builder.literal(&t.value),
                RenderNode::Expression(e) => builder.expr(&e.expr)?,
                _ => return Err(FallbackReason::UnsupportedExpression),
            }
        }
        Ok(builder.finish())
    }

    fn text_run(&mut self, nodes: &[&RenderNode], path: &str) {
        let code = run_code(nodes);
        match self.run_pattern(nodes, &[]) {
            Ok(pattern) => {
                let deps = nodes
                    .iter()
                    .filter_map(|n| self.ctx.zones.dependencies.get(&n.id()))
                    .flatten()
                    .cloned()
                    .collect();
                let zone = self.leaf_zone(classify(&deps), path, &code);
                let kind = if pattern.bindings.is_empty() {
                    TemplateKind::Static
                } else {
                    TemplateKind::Dynamic
                };
                self.set.templates.insert(
                    path.to_string(),
                    Template {
                        pattern,
                        path: path.to_string(),
                        kind,
                        attribute: None,
                        zone,
                    },
                );
            }
            Err(reason) => self.fallback(path, reason, &code),
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Structural descriptors
    // ───────────────────────────────────────────────────────────────────────────

    fn structural(&mut self, e: &ExpressionNode, path: &str, bound: &[String]) -> StructuralNode {
        let zone = self.ctx.zones.zone_of(e.id);
        match self.structural_expr(&e.expr, path, bound, zone) {
            Some(node) => node,
            None => {
                self.fallback(path, FallbackReason::UnsupportedExpression, &e.code);
                StructuralNode::Dynamic {
                    path: path.to_string(),
                    code: e.code.clone(),
                }
            }
        }
    }

    fn structural_expr(&mut self, expr: &Expr, path: &str, bound: &[String], zone: Zone) -> Option<StructuralNode> {
        match expr {
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                let when_true = self.arm(consequent, path, bound, zone);
                let when_false = self.arm(alternate, path, bound, zone);
                Some(self.conditional(test, when_true, when_false, path, zone))
            }
            Expr::Logical {
                op: LogicalOp::And,
                left,
                right,
            } => {
                let when_true = self.arm(right, path, bound, zone);
                let when_false = self.guard_value(left, path, bound);
                Some(self.conditional(left, when_true, when_false, path, zone))
            }
            Expr::Call { .. } => self.loop_template(expr, path, bound, zone),
            _ => None,
        }
    }

    /// A falsy `&&` guard renders its own value (`0`, `""`); `false` and `null` display empty.
    fn guard_value(&self, left: &Expr, path: &str, bound: &[String]) -> Option<StructuralNode> {
        left.binding_path()?;
        let mut builder = PatternBuilder::new(&self.locals, bound);
        Some(match builder.expr(left) {
            Ok(()) => StructuralNode::Text {
                path: path.to_string(),
                pattern: builder.finish(),
            },
            Err(_) => StructuralNode::Dynamic {
                path: path.to_string(),
                code: describe(left),
            },
        })
    }

    fn conditional(
        &mut self,
        test: &Expr,
        when_true: Option<StructuralNode>,
        when_false: Option<StructuralNode>,
        path: &str,
        zone: Zone,
    ) -> StructuralNode {
        let condition = Condition::from_expr(test);
        let condition_code = describe(test);
        if condition.is_none() {
            self.fallback(path, FallbackReason::NonEvaluableCondition, &condition_code);
        }
        StructuralNode::Conditional(Box::new(ConditionalElement {
            path: path.to_string(),
            condition_bindings: condition.as_ref().map(Condition::bindings).unwrap_or_default(),
            evaluable: condition.is_some(),
            condition,
            condition_code,
            when_true,
            when_false,
            zone,
        }))
    }

    fn loop_template(&mut self, expr: &Expr, path: &str, bound: &[String], zone: Zone) -> Option<StructuralNode> {
        let (array, params, body) = loop_shape(expr)?;
        let Some(array_binding) = array.binding_path() else {
            self.fallback(path, FallbackReason::UnsupportedLoop, &describe(expr));
            return Some(StructuralNode::Dynamic {
                path: path.to_string(),
                code: describe(expr),
            });
        };
        let mut item_bound = bound.to_vec();
        item_bound.extend(params.iter().cloned());
        let key_binding = match body {
            Expr::Jsx { node } => match node.as_ref() {
                RenderNode::Element(el) => el.attribute("key").and_then(|a| match &a.value {
                    AttributeValue::Dynamic { expr, .. } => expr.binding_path(),
                    _ => None,
                }),
                _ => None,
            },
            _ => None,
        };
        let item_template = self.arm(body, path, &item_bound, zone)?;
        Some(StructuralNode::Loop(Box::new(LoopTemplate {
            path: path.to_string(),
            array_binding,
            item_var: params.first().cloned(),
            index_var: params.get(1).cloned(),
            key_binding,
            item_template,
            zone,
        })))
    }

    /// Descriptor for one branch or loop body; `None` for a null-like arm.
    fn arm(&mut self, expr: &Expr, path: &str, bound: &[String], zone: Zone) -> Option<StructuralNode> {
        if expr.is_null_like() {
            return None;
        }
        if let Expr::Jsx { node } = expr {
            return Some(self.structural_node(node, bound));
        }
        if expr.contains_jsx() {
            if let Some(node) = self.structural_expr(expr, path, bound, zone) {
                return Some(node);
            }
            self.fallback(path, FallbackReason::UnsupportedExpression, &describe(expr));
            return Some(StructuralNode::Dynamic {
                path: path.to_string(),
                code: describe(expr),
            });
        }
        let mut builder = PatternBuilder::new(&self.locals, bound);
        Some(match builder.expr(expr) {
            Ok(()) => StructuralNode::Text {
                path: path.to_string(),
                pattern: builder.finish(),
            },
            Err(reason) => {
                self.fallback(path, reason, &describe(expr));
                StructuralNode::Dynamic {
                    path: path.to_string(),
                    code: describe(expr),
                }
            }
        })
    }

    fn structural_node(&mut self, node: &RenderNode, bound: &[String]) -> StructuralNode {
        match node {
            RenderNode::Element(el) => self.structural_element(el, bound),
            RenderNode::Fragment(frag) => {
                let flat = flatten_children(&frag.children);
                StructuralNode::Fragment {
                    children: self.structural_children(&flat, bound),
                }
            }
            other => {
                let flat = [other];
                let mut children = self.structural_children(&flat, bound);
                match children.len() {
                    1 => children.remove(0),
                    _ => StructuralNode::Fragment { children },
                }
            }
        }
    }

    /// Outside loops, descendants are also registered at their own paths.
    fn structural_element(&mut self, el: &ElementNode, bound: &[String]) -> StructuralNode {
        if bound.is_empty() {
            self.register_attributes(el);
        }
        let attributes = el
            .attributes
            .iter()
            .filter(|a| a.is_templatable())
            .map(|a| {
                let mut builder = PatternBuilder::new(&self.locals, bound);
                let pattern = match &a.value {
                    AttributeValue::Static { value } => {
                        builder.literal(value);
                        Some(builder.finish())
                    }
                    AttributeValue::Boolean => Some(builder.finish()),
                    AttributeValue::Dynamic { expr, .. } => match builder.attribute(expr) {
                        Ok(()) => Some(builder.finish()),
                        Err(_) => None,
                    },
                    AttributeValue::Spread { .. } => None,
                };
                AttributeTemplate {
                    name: a.name.clone(),
                    pattern,
                }
            })
            .collect();
        let flat = flatten_children(&el.children);
        StructuralNode::Element {
            tag: el.tag.clone(),
            path: self.path_of(el.id),
            attributes,
            children: self.structural_children(&flat, bound),
        }
    }

    fn structural_children(&mut self, flat: &[&RenderNode], bound: &[String]) -> Vec<StructuralNode> {
        let register = bound.is_empty();
        let mut children = Vec::new();
        for unit in child_units(flat) {
            let child = match unit {
                ChildUnit::Element(el) => self.structural_element(el, bound),
                ChildUnit::TextRun(nodes) => {
                    let child_path = self.path_of(nodes[0].id());
                    if register {
                        self.text_run(nodes, &child_path);
                    }
                    match self.run_pattern(nodes, bound) {
                        Ok(pattern) => StructuralNode::Text {
                            path: child_path,
                            pattern,
                        },
                        Err(_) => StructuralNode::Dynamic {
                            path: child_path,
                            code: run_code(nodes),
                        },
                    }
                }
                ChildUnit::Structural(e) => {
                    let child_path = self.path_of(e.id);
                    let child = self.structural(e, &child_path, bound);
                    if register {
                        match &child {
                            StructuralNode::Conditional(c) => {
                                self.set.conditional_elements.insert(child_path, (**c).clone());
                            }
                            StructuralNode::Loop(l) => {
                                self.set.loop_templates.insert(child_path, (**l).clone());
                            }
                            _ => {}
                        }
                    }
                    child
                }
            };
            children.push(child);
        }
        children
    }
}

/// `array.map((item, index) => body)` with an expression body.
fn loop_shape(expr: &Expr) -> Option<(&Expr, &[String], &Expr)> {
    let Expr::Call { callee, args, .. } = expr else {
        return None;
    };
    let Expr::Member {
        object, property, ..
    } = callee.as_ref()
    else {
        return None;
    };
    if property != "map" || args.len() != 1 {
        return None;
    }
    match &args[0] {
        Expr::Function {
            params,
            body: FunctionBody::Expression { expr: body },
            ..
        } => Some((object.as_ref(), params.as_slice(), body.as_ref())),
        _ => None,
    }
}

fn run_code(nodes: &[&RenderNode]) -> String {
    nodes
        .iter()
        .map(|n| match n {
            RenderNode::Text(t) => t.value.clone(),
            RenderNode::Expression(e) => format!("{{{}}}", e.code),
            _ => String::new(),
        })
        .collect()
}

/// Short readable form of an expression for fallback records.
fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Opaque { code, .. } => code.clone(),
        other => other
            .binding_path()
            .unwrap_or_else(|| serde_json::to_string(other).unwrap_or_default()),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DOCUMENT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDocument {
    pub component: String,
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub templates: BTreeMap<String, Template>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conditional_elements: BTreeMap<String, ConditionalElement>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub loop_templates: BTreeMap<String, LoopTemplate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<Fallback>,
}

impl TemplateDocument {
    pub fn new(component: &str, set: TemplateSet) -> Self {
        let version = content_version(&set);
        Self {
            component: component.to_string(),
            version,
            generated_at: Utc::now(),
            templates: set.templates,
            conditional_elements: set.conditional_elements,
            loop_templates: set.loop_templates,
            fallbacks: set.fallbacks,
        }
    }
}

/// First 16 hex digits of a SHA-256 over the serialized template maps.
pub fn content_version(set: &TemplateSet) -> String {
    let payload = serde_json::to_vec(&(&set.templates, &set.conditional_elements, &set.loop_templates))
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&payload);
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}
