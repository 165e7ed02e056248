//! Component extraction.
//!
//! Walks the top-level declarations of one parsed file and builds a
//! `ComponentIR` for every component and hook bundle. All per-file state lives
//! in an explicit `ExtractContext`; nothing is kept in module-level state.

use std::collections::{HashMap, HashSet};

use oxc_ast::ast::*;
use oxc_ast_visit::{walk, Visit};
use oxc_span::{GetSpan, Span};
use oxc_syntax::scope::ScopeFlags;
use tracing::{debug, warn};

use crate::error::{
    line_col, Diagnostic, DIAG_MULTIPLE_RETURNS, DIAG_NESTED_HOOK, DIAG_NO_RENDER, DIAG_UNREGISTERED_HOOK,
};
use crate::hooks::{bundle_fragment_index, extract_instance, extract_slot, is_hook_name, HookBinding, HookCall};
use crate::ir::{
    AttributeValue, ComponentIR, EventHandler, Expr, ExpressionNode, LocalBinding, Prop,
    RenderNode, SlotKind,
};
use crate::jsx_lowerer::{collect_pattern_names, JsxLowerer};
use crate::scope::{free_reads_of_expression, free_reads_of_function, imported_bindings};
use crate::types::{find_named_object_type, parse_type_members, TypeMember, TypeTable};
use crate::visitor::{walk_expr, RenderVisitor};

/// Inputs shared by every component of one file.
pub struct ExtractContext<'s> {
    pub source: &'s str,
    pub file_path: &'s str,
    pub types: &'s dyn TypeTable,
    /// Hook names registered as externally authored bundles.
    pub registered_bundles: &'s [String],
}

#[derive(Debug, Default)]
pub struct Extraction {
    pub components: Vec<ComponentIR>,
    pub diagnostics: Vec<Diagnostic>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CANDIDATES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy)]
enum Candidate<'b, 'a> {
    Function(&'b Function<'a>),
    Arrow(&'b ArrowFunctionExpression<'a>),
}

impl<'b, 'a> Candidate<'b, 'a> {
    fn params(&self) -> &'b FormalParameters<'a> {
        match *self {
            Candidate::Function(f) => &f.params,
            Candidate::Arrow(a) => &a.params,
        }
    }

    fn statements(&self) -> &'b [Statement<'a>] {
        match *self {
            Candidate::Function(f) => match &f.body {
                Some(body) => &body.statements[..],
                None => &[],
            },
            Candidate::Arrow(a) => &a.body.statements[..],
        }
    }

    fn is_expression_body(&self) -> bool {
        matches!(*self, Candidate::Arrow(a) if a.expression)
    }

    fn span(&self) -> Span {
        match *self {
            Candidate::Function(f) => f.span,
            Candidate::Arrow(a) => a.span,
        }
    }
}

fn candidate_from_declarator<'b, 'a>(decl: &'b VariableDeclarator<'a>) -> Option<(String, Candidate<'b, 'a>)> {
    let BindingPattern::BindingIdentifier(id) = &decl.id else {
        return None;
    };
    let candidate = match decl.init.as_ref()? {
        Expression::ArrowFunctionExpression(a) => Candidate::Arrow(a),
        Expression::FunctionExpression(f) => Candidate::Function(f),
        _ => return None,
    };
    Some((id.name.to_string(), candidate))
}

fn push_declaration<'b, 'a>(decl: &'b Declaration<'a>, out: &mut Vec<(String, Candidate<'b, 'a>)>) {
    match decl {
        Declaration::FunctionDeclaration(f) => {
            if let Some(id) = &f.id {
                out.push((id.name.to_string(), Candidate::Function(f)));
            }
        }
        Declaration::VariableDeclaration(v) => {
            out.extend(v.declarations.iter().filter_map(candidate_from_declarator));
        }
        _ => {}
    }
}

fn collect_candidates<'b, 'a>(program: &'b Program<'a>) -> Vec<(String, Candidate<'b, 'a>)> {
    let mut out = Vec::new();
    for stmt in &program.body {
        match stmt {
            Statement::FunctionDeclaration(f) => {
                if let Some(id) = &f.id {
                    out.push((id.name.to_string(), Candidate::Function(f)));
                }
            }
            Statement::VariableDeclaration(v) => {
                out.extend(v.declarations.iter().filter_map(candidate_from_declarator));
            }
            Statement::ExportNamedDeclaration(e) => {
                if let Some(decl) = &e.declaration {
                    push_declaration(decl, &mut out);
                }
            }
            Statement::ExportDefaultDeclaration(e) => {
                if let ExportDefaultDeclarationKind::FunctionDeclaration(f) = &e.declaration {
                    if let Some(id) = &f.id {
                        out.push((id.name.to_string(), Candidate::Function(f)));
                    }
                }
            }
            _ => {}
        }
    }
    out
}

fn is_component_name(name: &str) -> bool {
    name.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false)
}

/// First top-level `return <expr>` of a body, with the number of top-level returns.
fn find_return<'b, 'a>(statements: &'b [Statement<'a>]) -> (Option<&'b Expression<'a>>, usize) {
    let mut first = None;
    let mut count = 0;
    for stmt in statements {
        if let Statement::ReturnStatement(ret) = stmt {
            count += 1;
            if first.is_none() {
                first = ret.argument.as_ref();
            }
        }
    }
    (first, count)
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXTRACTION
// ═══════════════════════════════════════════════════════════════════════════════

pub fn extract_components(program: &Program, ctx: &ExtractContext) -> Extraction {
    let mut extraction = Extraction::default();
    let lowerer = JsxLowerer::new(ctx.source);
    let imports = imported_bindings(program);
    let candidates = collect_candidates(program);

    // Same-file `use*` functions are bundles; their fragment index is known up front.
    let mut bundles: HashSet<String> = ctx.registered_bundles.iter().cloned().collect();
    let mut fragment_indices = HashMap::new();
    for (name, candidate) in &candidates {
        if !is_hook_name(name) {
            continue;
        }
        bundles.insert(name.clone());
        if let (Some(ret), _) = find_return(candidate.statements()) {
            if let Some(index) = bundle_fragment_index(&lowerer.lower_expression(ret)) {
                fragment_indices.insert(name.clone(), index);
            }
        }
    }

    for (name, candidate) in &candidates {
        let is_bundle = bundles.contains(name) && is_hook_name(name);
        if !is_component_name(name) && !is_bundle {
            continue;
        }
        let mut builder = ComponentBuilder {
            ctx,
            lowerer: &lowerer,
            imports: &imports,
            bundles: &bundles,
            fragment_indices: &fragment_indices,
            ir: ComponentIR::new(name),
            diagnostics: Vec::new(),
        };
        builder.ir.is_bundle = is_bundle;
        builder.build(*candidate);
        debug!(
            component = %name,
            slots = builder.ir.slots.len(),
            locals = builder.ir.locals.len(),
            instances = builder.ir.instances.len(),
            "extracted component"
        );
        extraction.components.push(builder.ir);
        extraction.diagnostics.extend(builder.diagnostics);
    }
    extraction
}

struct ComponentBuilder<'c, 's> {
    ctx: &'c ExtractContext<'s>,
    lowerer: &'c JsxLowerer<'s>,
    imports: &'c HashSet<String>,
    bundles: &'c HashSet<String>,
    fragment_indices: &'c HashMap<String, usize>,
    ir: ComponentIR,
    diagnostics: Vec<Diagnostic>,
}

impl<'c, 's> ComponentBuilder<'c, 's> {
    fn warn(&mut self, code: &str, message: String, span: Span) {
        warn!(component = %self.ir.name, code, "{}", message);
        let diagnostic = Diagnostic::warning(code, message, Some(&self.ir.name))
            .at(line_col(self.ctx.source, span.start));
        self.diagnostics.push(diagnostic);
    }

    fn build(&mut self, candidate: Candidate) {
        self.ir.props = self.extract_props(candidate.params());
        let statements = candidate.statements();

        if candidate.is_expression_body() {
            if let Some(Statement::ExpressionStatement(s)) = statements.first() {
                self.report_nested_hooks(|calls| calls.visit_expression(&s.expression));
                self.set_render(&s.expression);
            }
        } else {
            for stmt in statements {
                self.visit_statement(stmt);
            }
            let (ret, count) = find_return(statements);
            if count > 1 {
                self.warn(
                    DIAG_MULTIPLE_RETURNS,
                    format!("{} has {} top-level returns; only the first is compiled", self.ir.name, count),
                    candidate.span(),
                );
            }
            if let Some(ret) = ret {
                self.set_render(ret);
            }
        }

        if self.ir.render.is_none() && !self.ir.is_bundle {
            self.warn(
                DIAG_NO_RENDER,
                format!("{} has no render expression", self.ir.name),
                candidate.span(),
            );
        }

        self.mark_portability();
        self.resolve_fragments();
        if let Some(render) = self.ir.render.clone() {
            let mut generated = 0;
            self.collect_handlers(&render, &mut generated);
        }
    }

    fn set_render(&mut self, expr: &Expression) {
        if self.ir.is_bundle {
            // return [value, setter, <ui/>]
            let lowered = self.lowerer.lower_expression(expr);
            if let Expr::Array { elements } = lowered {
                if let Some(Expr::Jsx { node }) = elements.into_iter().find(|e| matches!(e, Expr::Jsx { .. })) {
                    self.ir.render_span = Some(node.id());
                    self.ir.render = Some(*node);
                }
            }
            return;
        }
        self.ir.render = Some(self.lowerer.lower_render(expr));
        self.ir.render_span = Some(expr.span().into());
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Props
    // ───────────────────────────────────────────────────────────────────────────

    fn annotation_text(&self, param: &FormalParameter) -> Option<String> {
        let start = param.pattern.span().end as usize;
        let end = param.span.end as usize;
        let text = self.ctx.source.get(start..end)?.trim();
        let text = text.strip_prefix('?').unwrap_or(text).trim_start();
        let text = text.strip_prefix(':')?;
        let text = text.split('=').next().unwrap_or_default().trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }

    fn type_members(&self, annotation: &str) -> Vec<TypeMember> {
        if annotation.starts_with('{') {
            parse_type_members(annotation)
        } else {
            find_named_object_type(self.ctx.source, annotation)
                .map(parse_type_members)
                .unwrap_or_default()
        }
    }

    fn extract_props(&self, params: &FormalParameters) -> Vec<Prop> {
        let Some(param) = params.items.first() else {
            return vec![];
        };
        let members = self
            .annotation_text(param)
            .map(|a| self.type_members(&a))
            .unwrap_or_default();
        let resolve = |member: Option<&TypeMember>| member.and_then(|m| self.ctx.types.resolve(&m.annotation));

        match &param.pattern {
            BindingPattern::ObjectPattern(obj) => obj
                .properties
                .iter()
                .filter_map(|p| {
                    let PropertyKey::StaticIdentifier(key) = &p.key else {
                        return None;
                    };
                    let name = key.name.to_string();
                    let member = members.iter().find(|m| m.name == name);
                    let has_default = matches!(p.value, BindingPattern::AssignmentPattern(_));
                    Some(Prop {
                        type_name: resolve(member),
                        optional: has_default || member.map(|m| m.optional).unwrap_or(false),
                        name,
                    })
                })
                .collect(),
            _ => members
                .iter()
                .map(|m| Prop {
                    name: m.name.clone(),
                    type_name: resolve(Some(m)),
                    optional: m.optional,
                })
                .collect(),
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Body
    // ───────────────────────────────────────────────────────────────────────────

    fn visit_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::VariableDeclaration(v) => {
                for decl in &v.declarations {
                    let Some(init) = &decl.init else { continue };
                    match hook_callee(init) {
                        Some((callee, call)) => {
                            self.report_nested_hooks(|calls| calls.visit_arguments(&call.arguments));
                            let binding = hook_binding(&decl.id);
                            self.visit_hook(callee, call, binding);
                        }
                        None => {
                            self.report_nested_hooks(|calls| calls.visit_expression(init));
                            self.add_local(&decl.id, init);
                        }
                    }
                }
            }
            Statement::ExpressionStatement(s) => match hook_callee(&s.expression) {
                Some((callee, call)) => {
                    self.report_nested_hooks(|calls| calls.visit_arguments(&call.arguments));
                    self.visit_hook(callee, call, HookBinding::None);
                }
                None => self.report_nested_hooks(|calls| calls.visit_expression(&s.expression)),
            },
            Statement::FunctionDeclaration(f) => {
                self.report_nested_hooks(|calls| calls.visit_function(f, ScopeFlags::empty()));
                if let Some(id) = &f.id {
                    let name = id.name.to_string();
                    self.ir.locals.push(LocalBinding {
                        code: self.lowerer.text_of(f.span),
                        expr: None,
                        is_function: true,
                        portable: true,
                        reads: free_reads_of_function(f)
                            .into_iter()
                            .filter(|r| *r != name)
                            .collect(),
                        name,
                    });
                }
            }
            other => self.report_nested_hooks(|calls| calls.visit_statement(other)),
        }
    }

    /// Hooks only count as slots at the top level of the body; anything deeper is reported and skipped.
    fn report_nested_hooks(&mut self, scan: impl FnOnce(&mut NestedHookCalls)) {
        let mut calls = NestedHookCalls::default();
        scan(&mut calls);
        for (name, span) in calls.found {
            self.warn(
                DIAG_NESTED_HOOK,
                format!("{} is not called at the top level of {}; skipped", name, self.ir.name),
                span,
            );
        }
    }

    fn add_local(&mut self, pattern: &BindingPattern, init: &Expression) {
        let code = self.lowerer.text_of(init.span());
        let reads = free_reads_of_expression(init);
        let is_function = matches!(
            init,
            Expression::ArrowFunctionExpression(_) | Expression::FunctionExpression(_)
        );
        if let BindingPattern::BindingIdentifier(id) = pattern {
            self.ir.locals.push(LocalBinding {
                name: id.name.to_string(),
                code,
                expr: Some(self.lowerer.lower_expression(init)),
                is_function,
                portable: true,
                reads,
            });
            return;
        }
        let mut names = Vec::new();
        collect_pattern_names(pattern, &mut names);
        for name in names {
            self.ir.locals.push(LocalBinding {
                name,
                code: code.clone(),
                expr: None,
                is_function: false,
                portable: true,
                reads: reads.clone(),
            });
        }
    }

    fn visit_hook(&mut self, callee: &str, call: &CallExpression, binding: HookBinding) {
        let hook_call = HookCall {
            callee: callee.to_string(),
            args: call
                .arguments
                .iter()
                .filter_map(|a| a.as_expression())
                .map(|e| self.lowerer.lower_expression(e))
                .collect(),
            arg_codes: call
                .arguments
                .iter()
                .map(|a| self.lowerer.text_of(a.span()))
                .collect(),
            arg_lowered: call
                .arguments
                .iter()
                .filter_map(|a| a.as_expression())
                .map(|e| self.lowerer.lower_initializer(e))
                .collect(),
            binding,
        };

        if let Some(kind) = SlotKind::from_hook_name(callee) {
            match extract_slot(kind, &hook_call, self.ir.slots.len()) {
                Ok(slot) => self.ir.slots.push(slot),
                Err(err) => self.warn(err.code, err.message, call.span),
            }
            return;
        }

        if !self.bundles.contains(callee) {
            self.warn(
                DIAG_UNREGISTERED_HOOK,
                format!("{} is not a known hook or a registered hook bundle; skipped", callee),
                call.span,
            );
            return;
        }

        match extract_instance(&hook_call) {
            Ok(mut instance) => {
                if let Some(&index) = self.fragment_indices.get(callee) {
                    instance.fragment = instance.outputs.get(index).cloned().flatten();
                }
                self.ir.instances.push(instance);
            }
            Err(err) => self.warn(err.code, err.message, call.span),
        }
    }

    /// Locals reading an imported name, directly or through another local, are not portable.
    fn mark_portability(&mut self) {
        let mut tainted: HashSet<String> = self.imports.clone();
        loop {
            let mut changed = false;
            for local in &self.ir.locals {
                if !tainted.contains(&local.name) && local.reads.iter().any(|r| tainted.contains(r)) {
                    tainted.insert(local.name.clone());
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        for local in &mut self.ir.locals {
            local.portable = !tainted.contains(&local.name);
        }
    }

    /// Bundle outputs used as a standalone `{output}` child are render fragments.
    fn resolve_fragments(&mut self) {
        let Some(render) = &self.ir.render else {
            return;
        };
        let mut standalone = StandaloneIdents::default();
        standalone.visit_node(render);
        let names: HashSet<String> = standalone.names.into_iter().map(str::to_string).collect();
        for instance in &mut self.ir.instances {
            if instance.fragment.is_none() {
                instance.fragment = instance
                    .outputs
                    .iter()
                    .flatten()
                    .find(|o| names.contains(o.as_str()))
                    .cloned();
            }
        }
    }

    fn collect_handlers(&mut self, node: &RenderNode, generated: &mut usize) {
        match node {
            RenderNode::Element(el) => {
                for attr in el.attributes.iter().filter(|a| a.is_event()) {
                    let AttributeValue::Dynamic { expr, code } = &attr.value else {
                        continue;
                    };
                    if let Some(handler) = self.handler_for(&attr.name, expr, code, generated) {
                        self.ir.handlers.push(handler);
                    }
                }
                for child in &el.children {
                    self.collect_handlers(child, generated);
                }
            }
            RenderNode::Fragment(frag) => {
                for child in &frag.children {
                    self.collect_handlers(child, generated);
                }
            }
            _ => {}
        }
    }

    fn handler_for(&self, event: &str, expr: &Expr, code: &str, generated: &mut usize) -> Option<EventHandler> {
        let (name, params, code, reads, inline) = match expr {
            Expr::Ident { name } => {
                let local = self.ir.locals.iter().find(|l| l.name == *name && l.is_function)?;
                let params = match &local.expr {
                    Some(Expr::Function { params, .. }) => params.clone(),
                    _ => vec![],
                };
                (name.clone(), params, local.code.clone(), local.reads.clone(), false)
            }
            Expr::Function { params, .. } => {
                *generated += 1;
                let reads = expr.free_reads().into_iter().collect();
                (format!("Handle{}", generated), params.clone(), code.to_string(), reads, true)
            }
            _ => return None,
        };
        let updates = reads
            .iter()
            .filter_map(|r| self.ir.state_for_setter(r))
            .filter_map(|slot| slot.name.clone())
            .collect();
        Some(EventHandler {
            name,
            event: event.to_string(),
            params,
            code,
            updates,
            inline,
        })
    }
}

/// Hook calls anywhere in the visited subtree.
#[derive(Default)]
struct NestedHookCalls {
    found: Vec<(String, Span)>,
}

impl<'a> Visit<'a> for NestedHookCalls {
    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if let Expression::Identifier(id) = &call.callee {
            if is_hook_name(&id.name) {
                self.found.push((id.name.to_string(), call.span));
            }
        }
        walk::walk_call_expression(self, call);
    }
}

fn hook_callee<'b, 'a>(expr: &'b Expression<'a>) -> Option<(&'b str, &'b CallExpression<'a>)> {
    let Expression::CallExpression(call) = expr else {
        return None;
    };
    match &call.callee {
        Expression::Identifier(id) if is_hook_name(&id.name) => Some((id.name.as_str(), call)),
        _ => None,
    }
}

fn hook_binding(pattern: &BindingPattern) -> HookBinding {
    match pattern {
        BindingPattern::BindingIdentifier(id) => HookBinding::Single(id.name.to_string()),
        BindingPattern::ArrayPattern(arr) => HookBinding::Tuple(
            arr.elements
                .iter()
                .map(|e| match e {
                    Some(BindingPattern::BindingIdentifier(id)) => Some(id.name.to_string()),
                    _ => None,
                })
                .collect(),
        ),
        _ => {
            let mut names = Vec::new();
            collect_pattern_names(pattern, &mut names);
            HookBinding::Object(names)
        }
    }
}

/// Identifiers rendered as a standalone `{name}` child anywhere in the tree.
#[derive(Default)]
struct StandaloneIdents<'r> {
    names: HashSet<&'r str>,
}

impl<'r> RenderVisitor<'r> for StandaloneIdents<'r> {
    fn visit_expression(&mut self, expression: &'r ExpressionNode) {
        if let Expr::Ident { name } = &expression.expr {
            self.names.insert(name);
        }
        walk_expr(self, &expression.expr);
    }
}
