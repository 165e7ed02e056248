#[cfg(test)]
mod tests {
    use crate::component::{extract_components, ExtractContext, Extraction};
    use crate::error::{
        DIAG_BUNDLE_NAMESPACE, DIAG_HOOK_LITERAL, DIAG_HOOK_SHAPE, DIAG_NESTED_HOOK, DIAG_UNREGISTERED_HOOK,
    };
    use crate::ir::{ComponentIR, Hook, Lowered, SlotKind, StateOrigin};
    use crate::types::{DynamicTypeTable, MappedTypeTable, TypeTable};
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;
    use serde_json::json;

    fn extract_with(source: &str, bundles: &[String], types: &dyn TypeTable) -> Extraction {
        let allocator = Allocator::default();
        let source_type = SourceType::default()
            .with_module(true)
            .with_typescript(true)
            .with_jsx(true);
        let ret = Parser::new(&allocator, source, source_type).parse();
        assert!(ret.errors.is_empty(), "parse errors: {:?}", ret.errors);
        let ctx = ExtractContext {
            source,
            file_path: "Test.tsx",
            types,
            registered_bundles: bundles,
        };
        extract_components(&ret.program, &ctx)
    }

    fn extract(source: &str) -> Extraction {
        extract_with(source, &[], &DynamicTypeTable)
    }

    fn component<'e>(extraction: &'e Extraction, name: &str) -> &'e ComponentIR {
        extraction
            .components
            .iter()
            .find(|c| c.name == name)
            .unwrap_or_else(|| panic!("{} not extracted", name))
    }

    #[test]
    fn test_only_upper_case_functions_are_components() {
        let e = extract(
            r#"
            function helper() { return <div />; }
            export const Panel = () => <section />;
            export default function App() { return <main />; }
            "#,
        );
        let names: Vec<_> = e.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Panel", "App"]);
    }

    #[test]
    fn test_props_resolve_through_type_table() {
        let types = MappedTypeTable::new().with("string", "String").with("number", "Int32");
        let e = extract_with(
            r#"
            type CardProps = { title: string; count?: number; extra: Foo };
            function Card({ title, count = 1, extra }: CardProps) { return <h1>{title}</h1>; }
            "#,
            &[],
            &types,
        );
        let props = &component(&e, "Card").props;
        assert_eq!(props.len(), 3);
        assert_eq!(props[0].type_name.as_deref(), Some("String"));
        assert!(!props[0].optional);
        assert_eq!(props[1].type_name.as_deref(), Some("Int32"));
        assert!(props[1].optional);
        assert_eq!(props[2].type_name, None);
    }

    #[test]
    fn test_slots_follow_hook_kinds() {
        let e = extract(
            r#"
            function Dashboard() {
                const [count, setCount] = useState(0);
                const [query, setQuery] = useClientState("");
                const doubled = useComputed(() => count * 2, [count]);
                const input = useRef(null);
                useEffect(() => { document.title = query; }, [query]);
                const feed = useSub("news", (msg) => msg);
                const report = useServerTask(async () => 1, { runtime: "rust" });
                return <div>{count}{doubled}</div>;
            }
            "#,
        );
        let c = component(&e, "Dashboard");
        let kinds: Vec<_> = c.slots.iter().map(|s| s.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                SlotKind::State,
                SlotKind::ClientState,
                SlotKind::Computed,
                SlotKind::Ref,
                SlotKind::Effect,
                SlotKind::Sub,
                SlotKind::ServerTask,
            ]
        );
        assert_eq!(c.slots[0].setter.as_deref(), Some("setCount"));
        assert_eq!(c.slots[0].hook, Hook::State { initial: Lowered::Literal(json!(0)) });
        assert_eq!(c.slots[1].origin, StateOrigin::Client);
        assert_eq!(c.slots[2].origin, StateOrigin::Derived);
        assert!(matches!(&c.slots[4].hook, Hook::Effect { deps: Some(d), .. } if d == &vec!["query".to_string()]));
        assert!(matches!(&c.slots[5].hook, Hook::Sub { channel, .. } if channel == "news"));
        assert!(matches!(&c.slots[6].hook, Hook::ServerTask { runtime, streaming: false, .. } if runtime == "rust"));
        assert!(c.slots.iter().enumerate().all(|(i, s)| s.index == i));
    }

    #[test]
    fn test_malformed_hook_is_skipped_with_diagnostic() {
        let e = extract(
            r#"
            function Broken() {
                const count = useState(0);
                const [name, setName] = useState("a");
                const channel = usePub(topicName);
                return <p>{name}</p>;
            }
            "#,
        );
        let c = component(&e, "Broken");
        assert_eq!(c.slots.len(), 1);
        assert_eq!(c.slots[0].name.as_deref(), Some("name"));
        assert_eq!(c.slots[0].index, 0);
        let codes: Vec<_> = e.diagnostics.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec![DIAG_HOOK_SHAPE, DIAG_HOOK_LITERAL]);
        assert!(e.diagnostics.iter().all(|d| d.component.as_deref() == Some("Broken")));
        assert_eq!(e.diagnostics[0].line, 3);
    }

    #[test]
    fn test_nested_hook_calls_are_reported_and_skipped() {
        let e = extract(
            r#"
            function Gate() {
                const [on, setOn] = useState(false);
                if (on) { useEffect(() => {}); }
                const label = on ? useClientState("a") : null;
                useEffect(() => { const [x] = useState(1); });
                return <p>{on}</p>;
            }
            "#,
        );
        let c = component(&e, "Gate");
        let kinds: Vec<_> = c.slots.iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec![SlotKind::State, SlotKind::Effect]);
        let nested: Vec<_> = e.diagnostics.iter().filter(|d| d.code == DIAG_NESTED_HOOK).collect();
        assert_eq!(nested.iter().map(|d| d.line).collect::<Vec<_>>(), vec![4, 5, 6]);
    }

    #[test]
    fn test_registered_bundle_becomes_nested_instance() {
        let bundles = vec!["useCounter".to_string()];
        let e = extract_with(
            r#"
            function Page() {
                const [count, increment, counterUi] = useCounter("counter", 5);
                const [other] = useCounter(5);
                return <div>{counterUi}</div>;
            }
            "#,
            &bundles,
            &DynamicTypeTable,
        );
        let c = component(&e, "Page");
        assert!(c.slots.is_empty());
        assert_eq!(c.instances.len(), 1);
        let instance = &c.instances[0];
        assert_eq!(instance.namespace, "counter");
        assert_eq!(instance.args, vec![Lowered::Literal(json!(5))]);
        assert_eq!(instance.fragment.as_deref(), Some("counterUi"));
        assert_eq!(e.diagnostics[0].code, DIAG_BUNDLE_NAMESPACE);
    }

    #[test]
    fn test_same_file_bundle_is_compiled_like_a_component() {
        let e = extract(
            r#"
            function useSwitch(label) {
                const [on, setOn] = useState(false);
                return [on, setOn, <button>{label}</button>];
            }
            function Settings() {
                const [on, setOn, ui] = useSwitch("wifi", "Wi-Fi");
                return <section>{on ? "on" : "off"}</section>;
            }
            "#,
        );
        let bundle = component(&e, "useSwitch");
        assert!(bundle.is_bundle);
        assert!(bundle.render.is_some());
        assert_eq!(bundle.slots.len(), 1);

        let settings = component(&e, "Settings");
        assert_eq!(settings.instances[0].fragment.as_deref(), Some("ui"));
        assert!(e.diagnostics.is_empty());
    }

    #[test]
    fn test_unregistered_custom_hook_is_reported() {
        let e = extract(
            r#"
            function Widget() {
                const data = useFetcher("/api");
                return <div />;
            }
            "#,
        );
        assert!(component(&e, "Widget").slots.is_empty());
        assert_eq!(e.diagnostics[0].code, DIAG_UNREGISTERED_HOOK);
    }

    #[test]
    fn test_locals_reading_imports_are_not_portable() {
        let e = extract(
            r#"
            import { format } from "./format";
            function Price() {
                const [amount, setAmount] = useState(1);
                const label = format(amount);
                const shout = label + "!";
                const plain = amount * 2;
                return <p>{plain}</p>;
            }
            "#,
        );
        let c = component(&e, "Price");
        let portable = |name: &str| c.locals.iter().find(|l| l.name == name).unwrap().portable;
        assert!(!portable("label"));
        assert!(!portable("shout"));
        assert!(portable("plain"));
    }

    #[test]
    fn test_event_handlers_record_state_updates() {
        let e = extract(
            r#"
            function Counter() {
                const [count, setCount] = useState(0);
                function reset() { setCount(0); }
                return (
                    <div>
                        <button onClick={() => setCount(count + 1)}>+</button>
                        <button onClick={reset}>reset</button>
                    </div>
                );
            }
            "#,
        );
        let c = component(&e, "Counter");
        assert_eq!(c.handlers.len(), 2);
        assert_eq!(c.handlers[0].name, "Handle1");
        assert!(c.handlers[0].inline);
        assert_eq!(c.handlers[0].updates, vec!["count"]);
        assert_eq!(c.handlers[1].name, "reset");
        assert_eq!(c.handlers[1].updates, vec!["count"]);
        assert!(!c.handlers[1].inline);
    }

    #[test]
    fn test_render_span_points_at_returned_expression() {
        let source = "function A() { return <div>{1}</div>; }";
        let e = extract(source);
        let span = component(&e, "A").render_span.unwrap();
        assert_eq!(&source[span.start as usize..span.end as usize], "<div>{1}</div>");
    }
}
