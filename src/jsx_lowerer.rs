//! Lowering from the oxc syntax tree into the owned render tree and expression IR.

use oxc_ast::ast::*;
use oxc_span::GetSpan;
use oxc_syntax::operator::{BinaryOperator, LogicalOperator, UnaryOperator};
use serde_json::{Number, Value};

use crate::ir::{
    Attribute, AttributeValue, BinaryOp, ElementNode, Expr, ExpressionNode, FragmentNode,
    FunctionBody, Lowered, LogicalOp, RenderNode, TextNode, UnaryOp,
};
use crate::scope::{free_reads_of_expression, free_reads_of_statements};

// ═══════════════════════════════════════════════════════════════════════════════
// JSX LOWERER
// Turns JSX and expressions into RenderNode / Expr, keeping source text for opaque parts
// ═══════════════════════════════════════════════════════════════════════════════

pub struct JsxLowerer<'s> {
    pub source: &'s str,
}

impl<'s> JsxLowerer<'s> {
    pub fn new(source: &'s str) -> Self {
        Self { source }
    }

    pub fn text_of(&self, span: oxc_span::Span) -> String {
        self.source
            .get(span.start as usize..span.end as usize)
            .unwrap_or_default()
            .to_string()
    }

    fn opaque(&self, expr: &Expression) -> Expr {
        Expr::Opaque {
            code: self.text_of(expr.span()),
            reads: free_reads_of_expression(expr),
        }
    }

    pub fn lower_render(&self, expr: &Expression) -> RenderNode {
        match expr {
            Expression::JSXElement(el) => self.lower_jsx_element(el),
            Expression::JSXFragment(frag) => self.lower_jsx_fragment(frag),
            Expression::ParenthesizedExpression(p) => self.lower_render(&p.expression),
            _ => RenderNode::Expression(ExpressionNode {
                id: expr.span().into(),
                expr: self.lower_expression(expr),
                code: self.text_of(expr.span()),
            }),
        }
    }

    pub fn lower_initializer(&self, expr: &Expression) -> Lowered {
        match literal_value(&self.lower_expression(expr)) {
            Some(value) => Lowered::Literal(value),
            None => Lowered::Code(self.text_of(expr.span())),
        }
    }

    pub fn lower_expression(&self, expr: &Expression) -> Expr {
        match expr {
            Expression::BooleanLiteral(b) => Expr::literal(Value::Bool(b.value)),
            Expression::NullLiteral(_) => Expr::literal(Value::Null),
            Expression::NumericLiteral(n) => Expr::literal(number_value(n.value)),
            Expression::StringLiteral(s) => Expr::literal(Value::String(s.value.to_string())),
            Expression::TemplateLiteral(tpl) => Expr::Template {
                quasis: tpl
                    .quasis
                    .iter()
                    .map(|q| match &q.value.cooked {
                        Some(cooked) => cooked.to_string(),
                        None => q.value.raw.to_string(),
                    })
                    .collect(),
                expressions: tpl
                    .expressions
                    .iter()
                    .map(|e| self.lower_expression(e))
                    .collect(),
            },
            Expression::Identifier(id) => {
                if id.name == "undefined" {
                    Expr::literal(Value::Null)
                } else {
                    Expr::ident(&id.name)
                }
            }
            Expression::StaticMemberExpression(m) => self.lower_static_member(m),
            Expression::ComputedMemberExpression(m) => self.lower_computed_member(m),
            Expression::CallExpression(call) => self.lower_call(call),
            Expression::ChainExpression(chain) => match &chain.expression {
                ChainElement::CallExpression(call) => self.lower_call(call),
                ChainElement::StaticMemberExpression(m) => self.lower_static_member(m),
                ChainElement::ComputedMemberExpression(m) => self.lower_computed_member(m),
                _ => self.opaque(expr),
            },
            Expression::ConditionalExpression(c) => Expr::Conditional {
                test: Box::new(self.lower_expression(&c.test)),
                consequent: Box::new(self.lower_expression(&c.consequent)),
                alternate: Box::new(self.lower_expression(&c.alternate)),
            },
            Expression::LogicalExpression(l) => Expr::Logical {
                op: match l.operator {
                    LogicalOperator::And => LogicalOp::And,
                    LogicalOperator::Or => LogicalOp::Or,
                    LogicalOperator::Coalesce => LogicalOp::Coalesce,
                },
                left: Box::new(self.lower_expression(&l.left)),
                right: Box::new(self.lower_expression(&l.right)),
            },
            Expression::BinaryExpression(b) => Expr::Binary {
                op: binary_op(b.operator),
                left: Box::new(self.lower_expression(&b.left)),
                right: Box::new(self.lower_expression(&b.right)),
            },
            Expression::UnaryExpression(u) => Expr::Unary {
                op: match u.operator {
                    UnaryOperator::LogicalNot => UnaryOp::Not,
                    UnaryOperator::UnaryNegation => UnaryOp::Neg,
                    UnaryOperator::UnaryPlus => UnaryOp::Plus,
                    _ => UnaryOp::Other,
                },
                argument: Box::new(self.lower_expression(&u.argument)),
            },
            Expression::ParenthesizedExpression(p) => self.lower_expression(&p.expression),
            Expression::TSAsExpression(e) => self.lower_expression(&e.expression),
            Expression::TSNonNullExpression(e) => self.lower_expression(&e.expression),
            Expression::TSSatisfiesExpression(e) => self.lower_expression(&e.expression),
            Expression::ArrowFunctionExpression(arrow) => {
                let params = param_names(&arrow.params);
                let body = if arrow.expression {
                    match arrow.body.statements.first() {
                        Some(Statement::ExpressionStatement(s)) => FunctionBody::Expression {
                            expr: Box::new(self.lower_expression(&s.expression)),
                        },
                        _ => self.block_body(&arrow.body),
                    }
                } else {
                    self.block_body(&arrow.body)
                };
                Expr::Function {
                    params,
                    body,
                    is_async: arrow.r#async,
                    is_generator: false,
                }
            }
            Expression::FunctionExpression(func) => {
                let body = match &func.body {
                    Some(body) => self.block_body(body),
                    None => FunctionBody::Block {
                        code: String::new(),
                        reads: vec![],
                    },
                };
                Expr::Function {
                    params: param_names(&func.params),
                    body,
                    is_async: func.r#async,
                    is_generator: func.generator,
                }
            }
            Expression::ArrayExpression(arr) => {
                let mut elements = Vec::new();
                for elem in &arr.elements {
                    match elem.as_expression() {
                        Some(e) => elements.push(self.lower_expression(e)),
                        None => return self.opaque(expr),
                    }
                }
                Expr::Array { elements }
            }
            Expression::ObjectExpression(obj) => {
                let mut properties = Vec::new();
                for prop in &obj.properties {
                    let ObjectPropertyKind::ObjectProperty(p) = prop else {
                        return self.opaque(expr);
                    };
                    if p.computed {
                        return self.opaque(expr);
                    }
                    let key = match &p.key {
                        PropertyKey::StaticIdentifier(id) => id.name.to_string(),
                        PropertyKey::StringLiteral(s) => s.value.to_string(),
                        _ => return self.opaque(expr),
                    };
                    properties.push((key, self.lower_expression(&p.value)));
                }
                Expr::Object { properties }
            }
            Expression::JSXElement(_) | Expression::JSXFragment(_) => Expr::Jsx {
                node: Box::new(self.lower_render(expr)),
            },
            _ => self.opaque(expr),
        }
    }

    /// A statement body with a single `return <expr>` is as good as an expression body.
    fn block_body(&self, body: &oxc_ast::ast::FunctionBody<'_>) -> FunctionBody {
        if let [Statement::ReturnStatement(ret)] = &body.statements[..] {
            if let Some(arg) = &ret.argument {
                return FunctionBody::Expression {
                    expr: Box::new(self.lower_expression(arg)),
                };
            }
        }
        FunctionBody::Block {
            code: self.text_of(body.span),
            reads: free_reads_of_statements(&body.statements),
        }
    }

    fn lower_static_member(&self, m: &StaticMemberExpression) -> Expr {
        Expr::Member {
            object: Box::new(self.lower_expression(&m.object)),
            property: m.property.name.to_string(),
            optional: m.optional,
        }
    }

    fn lower_computed_member(&self, m: &ComputedMemberExpression) -> Expr {
        Expr::Index {
            object: Box::new(self.lower_expression(&m.object)),
            index: Box::new(self.lower_expression(&m.expression)),
        }
    }

    fn lower_call(&self, call: &CallExpression) -> Expr {
        let mut args = Vec::new();
        for arg in &call.arguments {
            match arg {
                Argument::SpreadElement(spread) => args.push(Expr::Opaque {
                    code: self.text_of(arg.span()),
                    reads: free_reads_of_expression(&spread.argument),
                }),
                _ => match arg.as_expression() {
                    Some(e) => args.push(self.lower_expression(e)),
                    None => args.push(Expr::Opaque {
                        code: self.text_of(arg.span()),
                        reads: vec![],
                    }),
                },
            }
        }
        Expr::Call {
            callee: Box::new(self.lower_expression(&call.callee)),
            args,
            optional: call.optional,
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // JSX
    // ───────────────────────────────────────────────────────────────────────────

    fn lower_jsx_element(&self, element: &JSXElement) -> RenderNode {
        let opening = &element.opening_element;
        let tag = get_tag_name(&opening.name);
        let mut attributes = Vec::new();
        let mut key = None;

        for item in &opening.attributes {
            match item {
                JSXAttributeItem::Attribute(attr) => {
                    let name = match &attr.name {
                        JSXAttributeName::Identifier(id) => id.name.to_string(),
                        JSXAttributeName::NamespacedName(ns) => {
                            format!("{}:{}", ns.namespace.name, ns.name.name)
                        }
                    };
                    let value = match &attr.value {
                        None => AttributeValue::Boolean,
                        Some(JSXAttributeValue::StringLiteral(s)) => AttributeValue::Static {
                            value: s.value.to_string(),
                        },
                        Some(JSXAttributeValue::ExpressionContainer(container)) => {
                            match container.expression.as_expression() {
                                Some(e) => AttributeValue::Dynamic {
                                    expr: self.lower_expression(e),
                                    code: self.text_of(e.span()),
                                },
                                None => AttributeValue::Boolean,
                            }
                        }
                        Some(JSXAttributeValue::Element(el)) => AttributeValue::Dynamic {
                            expr: Expr::Jsx {
                                node: Box::new(self.lower_jsx_element(el)),
                            },
                            code: self.text_of(el.span),
                        },
                        Some(JSXAttributeValue::Fragment(frag)) => AttributeValue::Dynamic {
                            expr: Expr::Jsx {
                                node: Box::new(self.lower_jsx_fragment(frag)),
                            },
                            code: self.text_of(frag.span),
                        },
                    };
                    if name == "key" {
                        if let AttributeValue::Static { value } = &value {
                            key = Some(value.clone());
                        }
                    }
                    attributes.push(Attribute { name, value });
                }
                JSXAttributeItem::SpreadAttribute(spread) => {
                    attributes.push(Attribute {
                        name: "...".to_string(),
                        value: AttributeValue::Spread {
                            expr: self.lower_expression(&spread.argument),
                            code: self.text_of(spread.argument.span()),
                        },
                    });
                }
            }
        }

        RenderNode::Element(ElementNode {
            id: element.span.into(),
            tag,
            attributes,
            children: self.lower_children(&element.children),
            key,
            name_end: opening.name.span().end,
        })
    }

    fn lower_jsx_fragment(&self, fragment: &JSXFragment) -> RenderNode {
        RenderNode::Fragment(FragmentNode {
            id: fragment.span.into(),
            children: self.lower_children(&fragment.children),
        })
    }

    fn lower_children(&self, children: &[JSXChild]) -> Vec<RenderNode> {
        let mut nodes = Vec::new();
        for child in children {
            match child {
                JSXChild::Text(t) => {
                    if let Some(value) = normalize_jsx_text(&t.value) {
                        nodes.push(RenderNode::Text(TextNode {
                            id: t.span.into(),
                            value,
                        }));
                    }
                }
                JSXChild::Element(el) => nodes.push(self.lower_jsx_element(el)),
                JSXChild::Fragment(frag) => nodes.push(self.lower_jsx_fragment(frag)),
                JSXChild::ExpressionContainer(container) => {
                    // `{/* comment */}` lowers to nothing
                    if let Some(e) = container.expression.as_expression() {
                        nodes.push(RenderNode::Expression(ExpressionNode {
                            id: container.span.into(),
                            expr: self.lower_expression(e),
                            code: self.text_of(e.span()),
                        }));
                    }
                }
                JSXChild::Spread(spread) => {
                    nodes.push(RenderNode::Expression(ExpressionNode {
                        id: spread.span.into(),
                        expr: self.opaque(&spread.expression),
                        code: self.text_of(spread.expression.span()),
                    }));
                }
            }
        }
        nodes
    }
}

fn get_tag_name(name: &JSXElementName) -> String {
    match name {
        JSXElementName::Identifier(id) => id.name.to_string(),
        JSXElementName::IdentifierReference(id) => id.name.to_string(),
        JSXElementName::NamespacedName(ns) => format!("{}:{}", ns.namespace.name, ns.name.name),
        JSXElementName::MemberExpression(me) => get_member_name(me),
        JSXElementName::ThisExpression(_) => "this".to_string(),
    }
}

fn get_member_name(me: &JSXMemberExpression) -> String {
    let object = match &me.object {
        JSXMemberExpressionObject::IdentifierReference(id) => id.name.to_string(),
        JSXMemberExpressionObject::MemberExpression(inner) => get_member_name(inner),
        _ => "unknown".to_string(),
    };
    format!("{}.{}", object, me.property.name)
}

pub fn param_names(params: &FormalParameters) -> Vec<String> {
    let mut names = Vec::new();
    for param in &params.items {
        collect_pattern_names(&param.pattern, &mut names);
    }
    names
}

pub fn collect_pattern_names(pattern: &BindingPattern, names: &mut Vec<String>) {
    match pattern {
        BindingPattern::BindingIdentifier(id) => names.push(id.name.to_string()),
        BindingPattern::ObjectPattern(obj) => {
            for prop in &obj.properties {
                collect_pattern_names(&prop.value, names);
            }
            if let Some(rest) = &obj.rest {
                collect_pattern_names(&rest.argument, names);
            }
        }
        BindingPattern::ArrayPattern(arr) => {
            for elem in arr.elements.iter().flatten() {
                collect_pattern_names(elem, names);
            }
            if let Some(rest) = &arr.rest {
                collect_pattern_names(&rest.argument, names);
            }
        }
        BindingPattern::AssignmentPattern(assign) => collect_pattern_names(&assign.left, names),
        #[allow(unreachable_patterns)]
        _ => {}
    }
}

fn binary_op(op: BinaryOperator) -> BinaryOp {
    match op {
        BinaryOperator::Addition => BinaryOp::Add,
        BinaryOperator::Subtraction => BinaryOp::Sub,
        BinaryOperator::Multiplication => BinaryOp::Mul,
        BinaryOperator::Division => BinaryOp::Div,
        BinaryOperator::Remainder => BinaryOp::Rem,
        BinaryOperator::Equality => BinaryOp::Eq,
        BinaryOperator::StrictEquality => BinaryOp::StrictEq,
        BinaryOperator::Inequality => BinaryOp::NotEq,
        BinaryOperator::StrictInequality => BinaryOp::StrictNotEq,
        BinaryOperator::LessThan => BinaryOp::Lt,
        BinaryOperator::LessEqualThan => BinaryOp::LtEq,
        BinaryOperator::GreaterThan => BinaryOp::Gt,
        BinaryOperator::GreaterEqualThan => BinaryOp::GtEq,
        _ => BinaryOp::Other,
    }
}

pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// JSON value of a literal-only expression tree.
pub fn literal_value(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Literal { value } => Some(value.clone()),
        Expr::Template {
            quasis,
            expressions,
        } if expressions.is_empty() => Some(Value::String(quasis.concat())),
        Expr::Unary {
            op: UnaryOp::Neg,
            argument,
        } => match literal_value(argument)? {
            Value::Number(n) => n.as_f64().map(|f| number_value(-f)),
            _ => None,
        },
        Expr::Array { elements } => elements
            .iter()
            .map(literal_value)
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        Expr::Object { properties } => {
            let mut map = serde_json::Map::new();
            for (key, value) in properties {
                map.insert(key.clone(), literal_value(value)?);
            }
            Some(Value::Object(map))
        }
        _ => None,
    }
}

/// JSX whitespace rule: lines are trimmed, blank lines dropped, the rest joined by one space.
pub fn normalize_jsx_text(raw: &str) -> Option<String> {
    if !raw.contains('\n') {
        return if raw.is_empty() {
            None
        } else {
            Some(raw.to_string())
        };
    }
    let lines: Vec<&str> = raw.lines().collect();
    let last = lines.len().saturating_sub(1);
    let mut parts = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let mut text = *line;
        if i != 0 {
            text = text.trim_start();
        }
        if i != last {
            text = text.trim_end();
        }
        if !text.is_empty() {
            parts.push(text);
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}
