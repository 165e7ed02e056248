#[cfg(test)]
mod tests {
    use crate::compile::{compile_source, CompileOptions, CompileOutput};
    use crate::error::{CompileError, DIAG_DEGRADED_DOCUMENT};
    use crate::ir::SlotKind;
    use crate::signature::StructuralChange;
    use crate::store::DocumentStore;
    use std::fs;
    use std::path::Path;

    fn options(dir: &Path) -> CompileOptions {
        CompileOptions {
            store_dir: Some(dir.to_path_buf()),
            source_file: Some("src/Counter.tsx".to_string()),
            ..CompileOptions::default()
        }
    }

    fn compile(source: &str, options: &CompileOptions) -> CompileOutput {
        compile_source(source, "Counter.tsx", options).unwrap()
    }

    fn counter(hooks: &str, body: &str) -> String {
        format!("function Counter() {{\n{}\nreturn {};\n}}", hooks, body)
    }

    #[test]
    fn test_first_compilation_has_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path());
        let out = compile(&counter("const [a, setA] = useState(0);", "<p>{a}</p>"), &opts);
        let c = &out.components[0];
        assert!(c.changes.is_empty());
        assert!(c.store_error.is_none());
        assert!(dir.path().join("Counter.hooks.json").exists());
        assert!(dir.path().join("Counter.keys.json").exists());
        assert!(dir.path().join("Counter.templates.json").exists());
        assert!(!dir.path().join("Counter.changes.json").exists());

        let stored = DocumentStore::new(dir.path()).load_templates("Counter").into_option().unwrap();
        assert_eq!(stored.version, c.templates.version);
        assert!(stored.templates.contains_key("1.1"));
    }

    #[test]
    fn test_added_hook_is_reported_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path());
        compile(&counter("const [a, setA] = useState(0);", "<p>{a}</p>"), &opts);
        let out = compile(
            &counter("const [a, setA] = useState(0);\nconst b = useRef(null);", "<p>{a}</p>"),
            &opts,
        );
        assert_eq!(
            out.components[0].changes,
            vec![StructuralChange::HookAdded {
                index: 1,
                hook_type: SlotKind::Ref,
                var_name: Some("b".to_string()),
            }]
        );
        let document = DocumentStore::new(dir.path()).load_changes("Counter").into_option().unwrap();
        assert_eq!(document.source_file, "src/Counter.tsx");
        assert_eq!(document.changes.len(), 1);

        // The new signature is the baseline: recompiling the same source reports nothing.
        let again = compile(
            &counter("const [a, setA] = useState(0);\nconst b = useRef(null);", "<p>{a}</p>"),
            &opts,
        );
        assert!(again.components[0].changes.is_empty());
        assert!(!dir.path().join("Counter.changes.json").exists());
    }

    #[test]
    fn test_type_change_precedes_rename_at_same_index() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path());
        let prefix = "const [x, setX] = useState(0);\nconst [y, setY] = useState(0);\n";
        compile(&counter(&format!("{}const [a, setA] = useState(0);", prefix), "<p>{x}</p>"), &opts);
        let out = compile(&counter(&format!("{}const b = useRef(null);", prefix), "<p>{x}</p>"), &opts);
        assert_eq!(
            out.components[0].changes,
            vec![
                StructuralChange::HookTypeChanged {
                    index: 2,
                    old_type: SlotKind::State,
                    new_type: SlotKind::Ref,
                },
                StructuralChange::HookVariableChanged {
                    index: 2,
                    old_name: Some("a".to_string()),
                    new_name: Some("b".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_removed_key_marker_is_a_tree_deletion() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path());
        let hooks = "const [a, setA] = useState(0);";
        let first = compile(&counter(hooks, "<div><p>{a}</p><span>x</span></div>"), &opts);

        // Recompile the keyed snapshot, then drop the paragraph.
        let keyed = first.keyed_source;
        assert!(keyed.contains("<p key=\"1.1\">"));
        compile(&keyed, &opts);
        let edited = keyed.replace("<p key=\"1.1\">{a}</p>", "");
        let out = compile(&edited, &opts);
        let changes = &out.components[0].changes;
        assert_eq!(
            changes,
            &vec![StructuralChange::TreeDeleted {
                address: "1.1".to_string()
            }]
        );
        // The surviving sibling keeps its address.
        assert!(out.components[0].templates.templates.contains_key("1.2.1"));
    }

    #[test]
    fn test_removed_keyed_branch_is_a_tree_deletion() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path());
        let hooks = "const [open, setOpen] = useState(true);";
        let first = compile(&counter(hooks, "<div>{open ? <p>a</p> : null}<span>x</span></div>"), &opts);
        let keyed = first.keyed_source;
        assert!(keyed.contains("<p key=\"1.1\">a</p>"));

        let recompiled = compile(&keyed, &opts);
        assert!(recompiled.components[0].paths.markers.contains("1.1"));
        let edited = keyed.replace("{open ? <p key=\"1.1\">a</p> : null}", "");
        let out = compile(&edited, &opts);
        assert_eq!(
            out.components[0].changes,
            vec![StructuralChange::TreeDeleted {
                address: "1.1".to_string()
            }]
        );
    }

    #[test]
    fn test_corrupt_signature_degrades_to_first_run() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Counter.hooks.json"), "[1, 2").unwrap();
        let out = compile(&counter("const [a, setA] = useState(0);", "<p>{a}</p>"), &options(dir.path()));
        assert!(out.components[0].changes.is_empty());
        assert!(out.diagnostics.iter().any(|d| d.code == DIAG_DEGRADED_DOCUMENT));
        assert!(DocumentStore::new(dir.path()).load_signature("Counter").into_option().is_some());
    }

    #[test]
    fn test_unwritable_store_is_reported_per_component() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("store");
        fs::write(&blocker, "not a directory").unwrap();
        let opts = CompileOptions {
            store_dir: Some(blocker),
            ..CompileOptions::default()
        };
        let out = compile(
            "function A() { return <p>a</p>; }\nfunction B() { return <p>b</p>; }",
            &opts,
        );
        assert_eq!(out.components.len(), 2);
        assert!(out.components.iter().all(|c| c.store_error.is_some()));
    }

    #[test]
    fn test_render_expressions_become_null_in_output() {
        let out = compile(
            "function A() { return <p>a</p>; }\nconst B = () => { return <b>b</b>; };",
            &CompileOptions::default(),
        );
        assert_eq!(out.code.matches("return null").count(), 2);
        assert!(!out.code.contains("<p>"));
    }

    #[test]
    fn test_each_component_gets_its_own_allocator() {
        let out = compile(
            "function A() { return <p>a</p>; }\nfunction B() { return <p>b</p>; }",
            &CompileOptions::default(),
        );
        for c in &out.components {
            assert!(c.templates.templates.contains_key("1.1"), "{} misses 1.1", c.ir.name);
        }
    }

    #[test]
    fn test_parse_failure_is_fatal() {
        let err = compile_source("function A( { return <p>; }", "Broken.tsx", &CompileOptions::default());
        assert!(matches!(err, Err(CompileError::Parse { file, .. }) if file == "Broken.tsx"));
    }

    #[test]
    fn test_options_from_camel_case_json() {
        let opts =
            CompileOptions::from_json(r#"{ "hookBundles": ["useCounter"], "storeDir": "/tmp/x" }"#).unwrap();
        assert_eq!(opts.hook_bundles, vec!["useCounter"]);
        assert_eq!(opts.store_dir.as_deref(), Some(Path::new("/tmp/x")));
        assert_eq!(opts.source_file, None);
        assert!(matches!(CompileOptions::from_json("{ \"hookBundles\": 3 }"), Err(CompileError::Options(_))));
    }

    #[test]
    fn test_template_document_version_is_content_hash() {
        let source = counter("const [a, setA] = useState(0);", "<p>{a}</p>");
        let one = compile(&source, &CompileOptions::default());
        let two = compile(&source, &CompileOptions::default());
        let version = &one.components[0].templates.version;
        assert_eq!(version.len(), 16);
        assert_eq!(version, &two.components[0].templates.version);

        let other = compile(&counter("const [a, setA] = useState(0);", "<p>{a}!</p>"), &CompileOptions::default());
        assert_ne!(version, &other.components[0].templates.version);
    }
}
