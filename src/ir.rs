use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

// ═══════════════════════════════════════════════════════════════════════════════
// NODE IDENTITY
// ═══════════════════════════════════════════════════════════════════════════════

/// Identity of a syntax node within one compilation: its source span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    pub start: u32,
    pub end: u32,
}

impl NodeId {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

impl From<oxc_span::Span> for NodeId {
    fn from(span: oxc_span::Span) -> Self {
        Self::new(span.start, span.end)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogicalOp {
    And,
    Or,
    Coalesce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    StrictEq,
    NotEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FunctionBody {
    Expression { expr: Box<Expr> },
    /// Statement body; never descended, only its free reads are kept.
    Block { code: String, reads: Vec<String> },
}

/// Lowered expression. Shapes outside the recognized subset become `Opaque`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Expr {
    Literal {
        value: Value,
    },
    Ident {
        name: String,
    },
    Member {
        object: Box<Expr>,
        property: String,
        optional: bool,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        optional: bool,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        argument: Box<Expr>,
    },
    Template {
        quasis: Vec<String>,
        expressions: Vec<Expr>,
    },
    Function {
        params: Vec<String>,
        body: FunctionBody,
        is_async: bool,
        is_generator: bool,
    },
    Array {
        elements: Vec<Expr>,
    },
    Object {
        properties: Vec<(String, Expr)>,
    },
    Jsx {
        node: Box<RenderNode>,
    },
    Opaque {
        code: String,
        reads: Vec<String>,
    },
}

impl Expr {
    pub fn ident(name: &str) -> Self {
        Expr::Ident {
            name: name.to_string(),
        }
    }

    pub fn literal(value: Value) -> Self {
        Expr::Literal { value }
    }

    pub fn member(object: Expr, property: &str) -> Self {
        Expr::Member {
            object: Box::new(object),
            property: property.to_string(),
            optional: false,
        }
    }

    /// Dotted path for `a`, `a.b.c` and `a?.b`; `None` for anything else.
    pub fn binding_path(&self) -> Option<String> {
        match self {
            Expr::Ident { name } => Some(name.clone()),
            Expr::Member {
                object, property, ..
            } => object
                .binding_path()
                .map(|base| format!("{}.{}", base, property)),
            _ => None,
        }
    }

    pub fn is_optional_chain(&self) -> bool {
        match self {
            Expr::Member {
                object, optional, ..
            } => *optional || object.is_optional_chain(),
            _ => false,
        }
    }

    pub fn contains_jsx(&self) -> bool {
        match self {
            Expr::Jsx { .. } => true,
            Expr::Conditional {
                consequent,
                alternate,
                ..
            } => consequent.contains_jsx() || alternate.contains_jsx(),
            Expr::Logical { left, right, .. } => left.contains_jsx() || right.contains_jsx(),
            Expr::Call { args, .. } => args.iter().any(|a| a.contains_jsx()),
            Expr::Function { body, .. } => match body {
                FunctionBody::Expression { expr } => expr.contains_jsx(),
                FunctionBody::Block { .. } => false,
            },
            Expr::Array { elements } => elements.iter().any(|e| e.contains_jsx()),
            _ => false,
        }
    }

    pub fn is_null_like(&self) -> bool {
        matches!(self, Expr::Literal { value } if value.is_null() || *value == Value::Bool(false))
    }

    /// Root identifiers read by the expression, minus names bound by nested function params.
    pub fn free_reads(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_reads(&mut Vec::new(), &mut out);
        out
    }

    fn collect_reads(&self, bound: &mut Vec<String>, out: &mut BTreeSet<String>) {
        fn read(name: &String, bound: &[String], out: &mut BTreeSet<String>) {
            if !bound.contains(name) {
                out.insert(name.clone());
            }
        }
        match self {
            Expr::Literal { .. } => {}
            Expr::Ident { name } => read(name, bound, out),
            Expr::Member { object, .. } => object.collect_reads(bound, out),
            Expr::Index { object, index } => {
                object.collect_reads(bound, out);
                index.collect_reads(bound, out);
            }
            Expr::Call { callee, args, .. } => {
                callee.collect_reads(bound, out);
                for arg in args {
                    arg.collect_reads(bound, out);
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                test.collect_reads(bound, out);
                consequent.collect_reads(bound, out);
                alternate.collect_reads(bound, out);
            }
            Expr::Logical { left, right, .. } | Expr::Binary { left, right, .. } => {
                left.collect_reads(bound, out);
                right.collect_reads(bound, out);
            }
            Expr::Unary { argument, .. } => argument.collect_reads(bound, out),
            Expr::Template { expressions, .. } => {
                for e in expressions {
                    e.collect_reads(bound, out);
                }
            }
            Expr::Function { params, body, .. } => {
                let depth = bound.len();
                bound.extend(params.iter().cloned());
                match body {
                    FunctionBody::Expression { expr } => expr.collect_reads(bound, out),
                    FunctionBody::Block { reads, .. } => {
                        for name in reads {
                            read(name, bound, out);
                        }
                    }
                }
                bound.truncate(depth);
            }
            Expr::Array { elements } => {
                for e in elements {
                    e.collect_reads(bound, out);
                }
            }
            Expr::Object { properties } => {
                for (_, value) in properties {
                    value.collect_reads(bound, out);
                }
            }
            Expr::Jsx { node } => node.collect_reads(bound, out),
            Expr::Opaque { reads, .. } => {
                for name in reads {
                    read(name, bound, out);
                }
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RENDER TREE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RenderNode {
    Element(ElementNode),
    Fragment(FragmentNode),
    Text(TextNode),
    Expression(ExpressionNode),
}

impl RenderNode {
    pub fn id(&self) -> NodeId {
        match self {
            RenderNode::Element(e) => e.id,
            RenderNode::Fragment(f) => f.id,
            RenderNode::Text(t) => t.id,
            RenderNode::Expression(e) => e.id,
        }
    }

    fn collect_reads(&self, bound: &mut Vec<String>, out: &mut BTreeSet<String>) {
        match self {
            RenderNode::Element(el) => {
                for attr in &el.attributes {
                    match &attr.value {
                        AttributeValue::Dynamic { expr, .. } | AttributeValue::Spread { expr, .. } => {
                            expr.collect_reads(bound, out)
                        }
                        AttributeValue::Static { .. } | AttributeValue::Boolean => {}
                    }
                }
                for child in &el.children {
                    child.collect_reads(bound, out);
                }
            }
            RenderNode::Fragment(frag) => {
                for child in &frag.children {
                    child.collect_reads(bound, out);
                }
            }
            RenderNode::Text(_) => {}
            RenderNode::Expression(e) => e.expr.collect_reads(bound, out),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub id: NodeId,
    pub tag: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<RenderNode>,
    /// Literal `key="..."` value, the explicit address marker when it is a hex path.
    pub key: Option<String>,
    /// Byte offset right after the tag name, where a key attribute can be spliced in.
    pub name_end: u32,
}

impl ElementNode {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentNode {
    pub id: NodeId,
    pub children: Vec<RenderNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    pub id: NodeId,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionNode {
    pub id: NodeId,
    pub expr: Expr,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
}

impl Attribute {
    pub fn is_event(&self) -> bool {
        let bytes = self.name.as_bytes();
        bytes.len() > 2
            && bytes[0] == b'o'
            && bytes[1] == b'n'
            && bytes[2].is_ascii_uppercase()
    }

    /// Event, key, ref and spread attributes are never templated.
    pub fn is_templatable(&self) -> bool {
        !self.is_event()
            && self.name != "key"
            && self.name != "ref"
            && !matches!(self.value, AttributeValue::Spread { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AttributeValue {
    Static { value: String },
    Boolean,
    Dynamic { expr: Expr, code: String },
    Spread { expr: Expr, code: String },
}

// ═══════════════════════════════════════════════════════════════════════════════
// SLOTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StateOrigin {
    Server,
    Client,
    Derived,
    Other,
}

/// Closed set of slot kinds. Adding a variant forces every match to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotKind {
    State,
    ClientState,
    Computed,
    Ref,
    Effect,
    MicroTask,
    MacroTask,
    Markdown,
    Template,
    Validation,
    Modal,
    Toggle,
    Dropdown,
    Pub,
    Sub,
    SignalR,
    PredictHint,
    ServerTask,
    PaginatedServerTask,
    MvcState,
    MvcViewModel,
}

impl SlotKind {
    pub fn from_hook_name(name: &str) -> Option<Self> {
        let kind = match name {
            "useState" => SlotKind::State,
            "useClientState" => SlotKind::ClientState,
            "useComputed" => SlotKind::Computed,
            "useRef" => SlotKind::Ref,
            "useEffect" => SlotKind::Effect,
            "useMicroTask" => SlotKind::MicroTask,
            "useMacroTask" => SlotKind::MacroTask,
            "useMarkdown" => SlotKind::Markdown,
            "useTemplate" => SlotKind::Template,
            "useValidation" => SlotKind::Validation,
            "useModal" => SlotKind::Modal,
            "useToggle" => SlotKind::Toggle,
            "useDropdown" => SlotKind::Dropdown,
            "usePub" => SlotKind::Pub,
            "useSub" => SlotKind::Sub,
            "useSignalR" => SlotKind::SignalR,
            "usePredictHint" => SlotKind::PredictHint,
            "useServerTask" => SlotKind::ServerTask,
            "usePaginatedServerTask" => SlotKind::PaginatedServerTask,
            "useMvcState" => SlotKind::MvcState,
            "useMvcViewModel" => SlotKind::MvcViewModel,
            _ => return None,
        };
        Some(kind)
    }

    pub fn hook_name(&self) -> &'static str {
        match self {
            SlotKind::State => "useState",
            SlotKind::ClientState => "useClientState",
            SlotKind::Computed => "useComputed",
            SlotKind::Ref => "useRef",
            SlotKind::Effect => "useEffect",
            SlotKind::MicroTask => "useMicroTask",
            SlotKind::MacroTask => "useMacroTask",
            SlotKind::Markdown => "useMarkdown",
            SlotKind::Template => "useTemplate",
            SlotKind::Validation => "useValidation",
            SlotKind::Modal => "useModal",
            SlotKind::Toggle => "useToggle",
            SlotKind::Dropdown => "useDropdown",
            SlotKind::Pub => "usePub",
            SlotKind::Sub => "useSub",
            SlotKind::SignalR => "useSignalR",
            SlotKind::PredictHint => "usePredictHint",
            SlotKind::ServerTask => "useServerTask",
            SlotKind::PaginatedServerTask => "usePaginatedServerTask",
            SlotKind::MvcState => "useMvcState",
            SlotKind::MvcViewModel => "useMvcViewModel",
        }
    }

    pub fn origin(&self) -> StateOrigin {
        match self {
            SlotKind::State
            | SlotKind::Markdown
            | SlotKind::Validation
            | SlotKind::Modal
            | SlotKind::Toggle
            | SlotKind::Dropdown
            | SlotKind::Sub
            | SlotKind::SignalR
            | SlotKind::ServerTask
            | SlotKind::PaginatedServerTask
            | SlotKind::MvcState
            | SlotKind::MvcViewModel => StateOrigin::Server,
            SlotKind::ClientState => StateOrigin::Client,
            SlotKind::Computed => StateOrigin::Derived,
            SlotKind::Ref
            | SlotKind::Effect
            | SlotKind::MicroTask
            | SlotKind::MacroTask
            | SlotKind::Template
            | SlotKind::Pub
            | SlotKind::PredictHint => StateOrigin::Other,
        }
    }
}

/// Initializer after lowering: a JSON literal when it is one, otherwise source code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Lowered {
    Literal(Value),
    Code(String),
}

impl Lowered {
    pub fn undefined() -> Self {
        Lowered::Literal(Value::Null)
    }
}

/// Kind-specific slot metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Hook {
    State {
        initial: Lowered,
    },
    ClientState {
        initial: Lowered,
    },
    Computed {
        compute: String,
        deps: Vec<String>,
    },
    Ref {
        initial: Lowered,
    },
    Effect {
        callback: String,
        deps: Option<Vec<String>>,
    },
    MicroTask {
        callback: String,
    },
    MacroTask {
        callback: String,
        delay: Option<u64>,
    },
    Markdown {
        initial: Lowered,
        parser: String,
    },
    Template {
        layout: String,
        props: Option<Lowered>,
    },
    Validation {
        field: String,
        rules: Option<Lowered>,
    },
    Modal,
    Toggle {
        initial: Lowered,
    },
    Dropdown {
        route: Option<String>,
    },
    Pub {
        channel: String,
    },
    Sub {
        channel: String,
        callback: Option<String>,
    },
    SignalR {
        hub: String,
        callback: Option<String>,
    },
    PredictHint {
        hint_id: Option<String>,
        predicted: Lowered,
        confidence: Option<f64>,
    },
    ServerTask {
        callback: String,
        params: Vec<String>,
        runtime: String,
        streaming: bool,
    },
    PaginatedServerTask {
        callback: String,
        params: Vec<String>,
        runtime: String,
        page_size: Option<u64>,
    },
    MvcState {
        property: String,
    },
    MvcViewModel,
}

impl Hook {
    pub fn kind(&self) -> SlotKind {
        match self {
            Hook::State { .. } => SlotKind::State,
            Hook::ClientState { .. } => SlotKind::ClientState,
            Hook::Computed { .. } => SlotKind::Computed,
            Hook::Ref { .. } => SlotKind::Ref,
            Hook::Effect { .. } => SlotKind::Effect,
            Hook::MicroTask { .. } => SlotKind::MicroTask,
            Hook::MacroTask { .. } => SlotKind::MacroTask,
            Hook::Markdown { .. } => SlotKind::Markdown,
            Hook::Template { .. } => SlotKind::Template,
            Hook::Validation { .. } => SlotKind::Validation,
            Hook::Modal => SlotKind::Modal,
            Hook::Toggle { .. } => SlotKind::Toggle,
            Hook::Dropdown { .. } => SlotKind::Dropdown,
            Hook::Pub { .. } => SlotKind::Pub,
            Hook::Sub { .. } => SlotKind::Sub,
            Hook::SignalR { .. } => SlotKind::SignalR,
            Hook::PredictHint { .. } => SlotKind::PredictHint,
            Hook::ServerTask { .. } => SlotKind::ServerTask,
            Hook::PaginatedServerTask { .. } => SlotKind::PaginatedServerTask,
            Hook::MvcState { .. } => SlotKind::MvcState,
            Hook::MvcViewModel => SlotKind::MvcViewModel,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub index: usize,
    /// Readable binding (`count` in `[count, setCount]`).
    pub name: Option<String>,
    pub setter: Option<String>,
    pub origin: StateOrigin,
    pub hook: Hook,
}

impl Slot {
    pub fn kind(&self) -> SlotKind {
        self.hook.kind()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENT IR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prop {
    pub name: String,
    /// Resolved target type name; `None` means dynamic.
    pub type_name: Option<String>,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHandler {
    pub name: String,
    pub event: String,
    pub params: Vec<String>,
    pub code: String,
    /// State names whose setters the handler calls.
    pub updates: Vec<String>,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalBinding {
    pub name: String,
    pub code: String,
    pub expr: Option<Expr>,
    pub is_function: bool,
    pub portable: bool,
    pub reads: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedInstance {
    pub hook: String,
    pub namespace: String,
    pub args: Vec<Lowered>,
    pub outputs: Vec<Option<String>>,
    pub fragment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentIR {
    pub name: String,
    pub is_bundle: bool,
    pub props: Vec<Prop>,
    pub slots: Vec<Slot>,
    pub handlers: Vec<EventHandler>,
    pub locals: Vec<LocalBinding>,
    pub instances: Vec<NestedInstance>,
    pub render: Option<RenderNode>,
    /// Span of the render expression in the source tree.
    #[serde(skip)]
    pub render_span: Option<NodeId>,
}

impl ComponentIR {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_bundle: false,
            props: vec![],
            slots: vec![],
            handlers: vec![],
            locals: vec![],
            instances: vec![],
            render: None,
            render_span: None,
        }
    }

    /// The slot whose readable binding is `name`.
    pub fn slot_by_name(&self, name: &str) -> Option<&Slot> {
        self.slots
            .iter()
            .find(|s| s.name.as_deref() == Some(name))
    }

    pub fn state_for_setter(&self, setter: &str) -> Option<&Slot> {
        self.slots
            .iter()
            .find(|s| s.setter.as_deref() == Some(setter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_binding_path() {
        let e = Expr::member(Expr::member(Expr::ident("user"), "profile"), "name");
        assert_eq!(e.binding_path().as_deref(), Some("user.profile.name"));
        assert_eq!(Expr::literal(json!(1)).binding_path(), None);
    }

    #[test]
    fn test_free_reads_respect_params() {
        let e = Expr::Call {
            callee: Box::new(Expr::member(Expr::ident("items"), "map")),
            args: vec![Expr::Function {
                params: vec!["item".to_string()],
                body: FunctionBody::Expression {
                    expr: Box::new(Expr::Binary {
                        op: BinaryOp::Add,
                        left: Box::new(Expr::member(Expr::ident("item"), "price")),
                        right: Box::new(Expr::ident("tax")),
                    }),
                },
                is_async: false,
                is_generator: false,
            }],
            optional: false,
        };
        let reads: Vec<_> = e.free_reads().into_iter().collect();
        assert_eq!(reads, vec!["items", "tax"]);
    }

    #[test]
    fn test_event_attribute_detection() {
        let attr = |name: &str| Attribute {
            name: name.to_string(),
            value: AttributeValue::Boolean,
        };
        assert!(attr("onClick").is_event());
        assert!(!attr("one").is_event());
        assert!(!attr("key").is_templatable());
        assert!(attr("className").is_templatable());
    }

    #[test]
    fn test_hook_names_round_trip_through_kind() {
        for name in ["useState", "useSignalR", "usePaginatedServerTask", "useMvcViewModel"] {
            let kind = SlotKind::from_hook_name(name).unwrap();
            assert_eq!(kind.hook_name(), name);
        }
        assert_eq!(SlotKind::from_hook_name("useCounter"), None);
    }

    #[test]
    fn test_hook_serializes_kind_fields() {
        let hook = Hook::ServerTask {
            callback: "async () => 1".to_string(),
            params: vec![],
            runtime: "rust".to_string(),
            streaming: true,
        };
        let json = serde_json::to_value(&hook).unwrap();
        assert_eq!(json["type"], "serverTask");
        assert_eq!(json["streaming"], true);
    }
}
