//! Per-kind hook extractors.
//!
//! Each recognized hook call is turned into exactly one `Slot`. Dispatch is an
//! exhaustive match over `SlotKind`, so a new kind cannot be added without an
//! extractor.

use serde_json::Value;

use crate::error::{DIAG_BUNDLE_NAMESPACE, DIAG_HOOK_LITERAL, DIAG_HOOK_SHAPE};
use crate::ir::{Expr, Hook, Lowered, NestedInstance, Slot, SlotKind};
use crate::jsx_lowerer::literal_value;

/// How the call result is bound.
#[derive(Debug, Clone, PartialEq)]
pub enum HookBinding {
    None,
    Single(String),
    Tuple(Vec<Option<String>>),
    Object(Vec<String>),
}

/// A hook call with its arguments already lowered.
#[derive(Debug, Clone)]
pub struct HookCall {
    pub callee: String,
    pub args: Vec<Expr>,
    pub arg_codes: Vec<String>,
    pub arg_lowered: Vec<Lowered>,
    pub binding: HookBinding,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HookShapeError {
    pub code: &'static str,
    pub message: String,
}

impl HookShapeError {
    fn shape(call: &HookCall, expected: &str) -> Self {
        Self {
            code: DIAG_HOOK_SHAPE,
            message: format!("{} must be bound as {}", call.callee, expected),
        }
    }

    fn literal(call: &HookCall, what: &str) -> Self {
        Self {
            code: DIAG_HOOK_LITERAL,
            message: format!("{} requires a string literal {} argument", call.callee, what),
        }
    }
}

/// `useX` where `X` starts upper-case.
pub fn is_hook_name(name: &str) -> bool {
    name.strip_prefix("use")
        .and_then(|rest| rest.chars().next())
        .map(|c| c.is_ascii_uppercase())
        .unwrap_or(false)
}

// ═══════════════════════════════════════════════════════════════════════════════
// ARGUMENT HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

impl HookCall {
    fn code(&self, index: usize) -> Option<String> {
        self.arg_codes.get(index).cloned()
    }

    fn lowered(&self, index: usize) -> Option<Lowered> {
        self.arg_lowered.get(index).cloned()
    }

    fn initial(&self) -> Lowered {
        self.lowered(0).unwrap_or_else(Lowered::undefined)
    }

    fn string_literal(&self, index: usize) -> Option<String> {
        match self.args.get(index) {
            Some(Expr::Literal {
                value: Value::String(s),
            }) => Some(s.clone()),
            Some(Expr::Template {
                quasis,
                expressions,
            }) if expressions.is_empty() => Some(quasis.concat()),
            _ => None,
        }
    }

    fn deps(&self, index: usize) -> Option<Vec<String>> {
        match self.args.get(index) {
            Some(Expr::Array { elements }) => {
                Some(elements.iter().filter_map(|e| e.binding_path()).collect())
            }
            _ => None,
        }
    }

    fn option(&self, index: usize, key: &str) -> Option<Value> {
        match self.args.get(index) {
            Some(Expr::Object { properties }) => properties
                .iter()
                .find(|(k, _)| k == key)
                .and_then(|(_, v)| literal_value(v)),
            _ => None,
        }
    }

    fn function_params(&self, index: usize) -> Vec<String> {
        match self.args.get(index) {
            Some(Expr::Function { params, .. }) => params.clone(),
            _ => vec![],
        }
    }

    fn is_generator(&self, index: usize) -> bool {
        matches!(
            self.args.get(index),
            Some(Expr::Function {
                is_generator: true,
                ..
            })
        )
    }

    fn single(&self) -> Result<String, HookShapeError> {
        match &self.binding {
            HookBinding::Single(name) => Ok(name.clone()),
            _ => Err(HookShapeError::shape(self, "a single identifier")),
        }
    }

    fn pair(&self) -> Result<(String, Option<String>), HookShapeError> {
        match &self.binding {
            HookBinding::Tuple(names) => match names.first() {
                Some(Some(value)) => Ok((value.clone(), names.get(1).cloned().flatten())),
                _ => Err(HookShapeError::shape(self, "an ordered [value, setter] pair")),
            },
            _ => Err(HookShapeError::shape(self, "an ordered [value, setter] pair")),
        }
    }

    fn pair_or_single(&self) -> Result<(String, Option<String>), HookShapeError> {
        match &self.binding {
            HookBinding::Single(name) => Ok((name.clone(), None)),
            _ => self.pair(),
        }
    }

    fn unbound(&self) -> Result<(), HookShapeError> {
        match &self.binding {
            HookBinding::None => Ok(()),
            _ => Err(HookShapeError::shape(self, "a bare statement")),
        }
    }
}

fn callback_code(call: &HookCall) -> Result<String, HookShapeError> {
    match call.args.first() {
        Some(Expr::Function { .. }) | Some(Expr::Ident { .. }) => Ok(call.code(0).unwrap_or_default()),
        _ => Err(HookShapeError {
            code: DIAG_HOOK_SHAPE,
            message: format!("{} requires a callback as its first argument", call.callee),
        }),
    }
}

fn runtime_option(call: &HookCall, index: usize) -> String {
    match call.option(index, "runtime") {
        Some(Value::String(s)) => s,
        _ => "server".to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXTRACTORS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn extract_slot(kind: SlotKind, call: &HookCall, index: usize) -> Result<Slot, HookShapeError> {
    let (name, setter, hook) = match kind {
        SlotKind::State => {
            let (value, setter) = call.pair()?;
            (Some(value), setter, Hook::State { initial: call.initial() })
        }
        SlotKind::ClientState => {
            let (value, setter) = call.pair()?;
            (Some(value), setter, Hook::ClientState { initial: call.initial() })
        }
        SlotKind::Computed => {
            let name = call.single()?;
            let compute = callback_code(call)?;
            let deps = call.deps(1).unwrap_or_default();
            (Some(name), None, Hook::Computed { compute, deps })
        }
        SlotKind::Ref => {
            let name = call.single()?;
            (Some(name), None, Hook::Ref { initial: call.initial() })
        }
        SlotKind::Effect => {
            call.unbound()?;
            let callback = callback_code(call)?;
            (None, None, Hook::Effect { callback, deps: call.deps(1) })
        }
        SlotKind::MicroTask => {
            call.unbound()?;
            (None, None, Hook::MicroTask { callback: callback_code(call)? })
        }
        SlotKind::MacroTask => {
            call.unbound()?;
            let callback = callback_code(call)?;
            let delay = match call.args.get(1) {
                Some(Expr::Literal { value }) => value.as_u64(),
                _ => None,
            };
            (None, None, Hook::MacroTask { callback, delay })
        }
        SlotKind::Markdown => {
            let (value, setter) = call.pair()?;
            let hook = Hook::Markdown {
                initial: call.initial(),
                parser: "markdown".to_string(),
            };
            (Some(value), setter, hook)
        }
        SlotKind::Template => {
            call.unbound()?;
            let layout = call
                .string_literal(0)
                .ok_or_else(|| HookShapeError::literal(call, "layout name"))?;
            (None, None, Hook::Template { layout, props: call.lowered(1) })
        }
        SlotKind::Validation => {
            let name = call.single()?;
            let field = call
                .string_literal(0)
                .ok_or_else(|| HookShapeError::literal(call, "field name"))?;
            (Some(name), None, Hook::Validation { field, rules: call.lowered(1) })
        }
        SlotKind::Modal => (Some(call.single()?), None, Hook::Modal),
        SlotKind::Toggle => {
            let (value, setter) = call.pair()?;
            let initial = call
                .lowered(0)
                .unwrap_or(Lowered::Literal(Value::Bool(false)));
            (Some(value), setter, Hook::Toggle { initial })
        }
        SlotKind::Dropdown => {
            let name = call.single()?;
            (Some(name), None, Hook::Dropdown { route: call.code(0) })
        }
        SlotKind::Pub => {
            let name = call.single()?;
            let channel = call
                .string_literal(0)
                .ok_or_else(|| HookShapeError::literal(call, "channel"))?;
            (Some(name), None, Hook::Pub { channel })
        }
        SlotKind::Sub => {
            let name = call.single()?;
            let channel = call
                .string_literal(0)
                .ok_or_else(|| HookShapeError::literal(call, "channel"))?;
            (Some(name), None, Hook::Sub { channel, callback: call.code(1) })
        }
        SlotKind::SignalR => {
            let name = call.single()?;
            let hub = call
                .string_literal(0)
                .ok_or_else(|| HookShapeError::literal(call, "hub"))?;
            (Some(name), None, Hook::SignalR { hub, callback: call.code(1) })
        }
        SlotKind::PredictHint => {
            call.unbound()?;
            // usePredictHint('hintId', predicted, confidence?) or usePredictHint(predicted)
            let (hint_id, rest) = match call.string_literal(0) {
                Some(id) => (Some(id), 1),
                None => (None, 0),
            };
            let predicted = call.lowered(rest).unwrap_or_else(Lowered::undefined);
            let confidence = match call.args.get(rest + 1) {
                Some(Expr::Literal { value }) => value.as_f64(),
                _ => None,
            };
            (None, None, Hook::PredictHint { hint_id, predicted, confidence })
        }
        SlotKind::ServerTask => {
            let name = call.single()?;
            let callback = callback_code(call)?;
            let streaming = call.is_generator(0)
                || matches!(call.option(1, "stream"), Some(Value::Bool(true)));
            let hook = Hook::ServerTask {
                callback,
                params: call.function_params(0),
                runtime: runtime_option(call, 1),
                streaming,
            };
            (Some(name), None, hook)
        }
        SlotKind::PaginatedServerTask => {
            let name = call.single()?;
            let callback = callback_code(call)?;
            let hook = Hook::PaginatedServerTask {
                callback,
                params: call.function_params(0),
                runtime: runtime_option(call, 1),
                page_size: call.option(1, "pageSize").and_then(|v| v.as_u64()),
            };
            (Some(name), None, hook)
        }
        SlotKind::MvcState => {
            let (value, setter) = call.pair_or_single()?;
            let property = call
                .string_literal(0)
                .ok_or_else(|| HookShapeError::literal(call, "property"))?;
            (Some(value), setter, Hook::MvcState { property })
        }
        SlotKind::MvcViewModel => (Some(call.single()?), None, Hook::MvcViewModel),
    };

    Ok(Slot {
        index,
        name,
        setter,
        origin: kind.origin(),
        hook,
    })
}

/// A registered custom hook, compiled as a child-component instantiation.
pub fn extract_instance(call: &HookCall) -> Result<NestedInstance, HookShapeError> {
    let namespace = call.string_literal(0).ok_or_else(|| HookShapeError {
        code: DIAG_BUNDLE_NAMESPACE,
        message: format!(
            "{} must be called with a string literal namespace first",
            call.callee
        ),
    })?;
    let outputs = match &call.binding {
        HookBinding::Tuple(names) => names.clone(),
        HookBinding::Single(name) => vec![Some(name.clone())],
        HookBinding::Object(names) => names.iter().map(|n| Some(n.clone())).collect(),
        HookBinding::None => vec![],
    };
    Ok(NestedInstance {
        hook: call.callee.clone(),
        namespace,
        args: call.arg_lowered.iter().skip(1).cloned().collect(),
        outputs,
        fragment: None,
    })
}

/// Index of the JSX element in a bundle's `return [..., <ui/>]`.
pub fn bundle_fragment_index(returned: &Expr) -> Option<usize> {
    match returned {
        Expr::Array { elements } => elements
            .iter()
            .position(|e| matches!(e, Expr::Jsx { .. })),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionBody, StateOrigin};
    use rstest::rstest;
    use serde_json::json;

    fn call(callee: &str, args: Vec<Expr>, binding: HookBinding) -> HookCall {
        let arg_lowered = args
            .iter()
            .map(|a| match literal_value(a) {
                Some(v) => Lowered::Literal(v),
                None => Lowered::Code("<expr>".to_string()),
            })
            .collect();
        HookCall {
            callee: callee.to_string(),
            arg_codes: args.iter().map(|_| "<expr>".to_string()).collect(),
            args,
            arg_lowered,
            binding,
        }
    }

    fn pair(a: &str, b: &str) -> HookBinding {
        HookBinding::Tuple(vec![Some(a.to_string()), Some(b.to_string())])
    }

    fn callback() -> Expr {
        Expr::Function {
            params: vec![],
            body: FunctionBody::Block {
                code: "{}".to_string(),
                reads: vec![],
            },
            is_async: true,
            is_generator: false,
        }
    }

    #[rstest]
    #[case("useCounter", true)]
    #[case("useState", true)]
    #[case("user", false)]
    #[case("use", false)]
    #[case("useless", false)]
    fn test_is_hook_name(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_hook_name(name), expected);
    }

    #[test]
    fn test_state_pair() {
        let c = call("useState", vec![Expr::literal(json!(0))], pair("count", "setCount"));
        let slot = extract_slot(SlotKind::State, &c, 0).unwrap();
        assert_eq!(slot.name.as_deref(), Some("count"));
        assert_eq!(slot.setter.as_deref(), Some("setCount"));
        assert_eq!(slot.origin, StateOrigin::Server);
        assert_eq!(slot.hook, Hook::State { initial: Lowered::Literal(json!(0)) });
    }

    #[test]
    fn test_state_not_destructured_is_rejected() {
        let c = call("useState", vec![], HookBinding::Single("count".to_string()));
        let err = extract_slot(SlotKind::State, &c, 0).unwrap_err();
        assert_eq!(err.code, DIAG_HOOK_SHAPE);
    }

    #[test]
    fn test_client_state_origin() {
        let c = call("useClientState", vec![Expr::literal(json!(""))], pair("query", "setQuery"));
        let slot = extract_slot(SlotKind::ClientState, &c, 3).unwrap();
        assert_eq!(slot.origin, StateOrigin::Client);
        assert_eq!(slot.index, 3);
    }

    #[test]
    fn test_effect_deps() {
        let c = call(
            "useEffect",
            vec![callback(), Expr::Array { elements: vec![Expr::ident("count")] }],
            HookBinding::None,
        );
        let slot = extract_slot(SlotKind::Effect, &c, 1).unwrap();
        match slot.hook {
            Hook::Effect { deps, .. } => assert_eq!(deps, Some(vec!["count".to_string()])),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_channel_requires_literal() {
        let c = call("useSub", vec![Expr::ident("name")], HookBinding::Single("msg".to_string()));
        let err = extract_slot(SlotKind::Sub, &c, 0).unwrap_err();
        assert_eq!(err.code, DIAG_HOOK_LITERAL);
    }

    #[test]
    fn test_server_task_options() {
        let options = Expr::Object {
            properties: vec![
                ("runtime".to_string(), Expr::literal(json!("rust"))),
                ("stream".to_string(), Expr::literal(json!(true))),
            ],
        };
        let c = call("useServerTask", vec![callback(), options], HookBinding::Single("task".to_string()));
        let slot = extract_slot(SlotKind::ServerTask, &c, 0).unwrap();
        match slot.hook {
            Hook::ServerTask { runtime, streaming, .. } => {
                assert_eq!(runtime, "rust");
                assert!(streaming);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_instance_requires_namespace() {
        let c = call("useCounter", vec![Expr::literal(json!(0))], pair("count", "inc"));
        assert_eq!(extract_instance(&c).unwrap_err().code, DIAG_BUNDLE_NAMESPACE);

        let c = call(
            "useCounter",
            vec![Expr::literal(json!("counter1")), Expr::literal(json!(5))],
            HookBinding::Tuple(vec![Some("count".into()), None, Some("counterUI".into())]),
        );
        let instance = extract_instance(&c).unwrap();
        assert_eq!(instance.namespace, "counter1");
        assert_eq!(instance.args, vec![Lowered::Literal(json!(5))]);
        assert_eq!(instance.outputs.len(), 3);
    }
}
