//! File-level pipeline: parse, extract, analyze each component, persist, rewrite.

use std::collections::BTreeMap;
use std::path::PathBuf;

use oxc_allocator::Allocator;
use oxc_parser::Parser;
use oxc_span::SourceType;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::annotate::{assign_paths, PathTable};
use crate::component::{extract_components, ExtractContext};
use crate::dependencies::{classify_tree, Zone, ZoneTable};
use crate::error::{CompileError, Diagnostic, DIAG_DEGRADED_DOCUMENT};
use crate::hex_path::HexPathAllocator;
use crate::ir::{ComponentIR, NodeId};
use crate::keys::{key_sites, splice_keys};
use crate::rewrite::rewrite_program;
use crate::signature::{diff, diff_addresses, extract_signature, ChangesDocument, HookSignature, KeyDocument, StructuralChange};
use crate::store::{DocumentStore, Loaded};
use crate::templates::{extract_templates, TemplateContext, TemplateDocument, TemplateSet};
use crate::types::{DynamicTypeTable, TypeTable};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompileOptions {
    /// Externally authored hook bundles, compiled as nested instances.
    pub hook_bundles: Vec<String>,
    /// Directory for signature, key, template and change documents. `None` disables persistence.
    pub store_dir: Option<PathBuf>,
    /// Recorded in change documents instead of the compiled file path.
    pub source_file: Option<String>,
}

impl CompileOptions {
    pub fn from_json(json: &str) -> Result<Self, CompileError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentOutput {
    pub ir: ComponentIR,
    #[serde(skip)]
    pub paths: PathTable,
    #[serde(skip)]
    pub zones: ZoneTable,
    /// Zone of every addressed node, keyed by hex path.
    pub addresses: BTreeMap<String, Zone>,
    pub templates: TemplateDocument,
    pub signature: HookSignature,
    pub changes: Vec<StructuralChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOutput {
    pub components: Vec<ComponentOutput>,
    pub diagnostics: Vec<Diagnostic>,
    /// The file with every render expression replaced by `null`.
    pub code: String,
    /// The original source with hex path keys written into unkeyed elements.
    pub keyed_source: String,
}

/// Compiles every component of one file. Only a parse failure is fatal.
pub fn compile_source(source: &str, file_path: &str, options: &CompileOptions) -> Result<CompileOutput, CompileError> {
    compile_source_with_types(source, file_path, options, &DynamicTypeTable)
}

pub fn compile_source_with_types(
    source: &str,
    file_path: &str,
    options: &CompileOptions,
    types: &dyn TypeTable,
) -> Result<CompileOutput, CompileError> {
    let allocator = Allocator::default();
    let source_type = SourceType::default()
        .with_module(true)
        .with_typescript(true)
        .with_jsx(true);
    let ret = Parser::new(&allocator, source, source_type).parse();
    if ret.panicked || !ret.errors.is_empty() {
        let message = ret
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(CompileError::Parse {
            file: file_path.to_string(),
            message,
        });
    }
    let mut program = ret.program;

    let ctx = ExtractContext {
        source,
        file_path,
        types,
        registered_bundles: &options.hook_bundles,
    };
    let extraction = extract_components(&program, &ctx);
    let mut diagnostics = extraction.diagnostics;
    debug!(file = file_path, components = extraction.components.len(), "extraction finished");

    let pipeline = Pipeline {
        source_file: options.source_file.as_deref().unwrap_or(file_path),
        store: options.store_dir.as_ref().map(DocumentStore::new),
    };
    let results: Vec<(ComponentOutput, Vec<Diagnostic>)> = extraction
        .components
        .into_par_iter()
        .map(|ir| pipeline.compile_component(ir))
        .collect();

    let mut components = Vec::with_capacity(results.len());
    let mut sites = Vec::new();
    for (output, component_diagnostics) in results {
        if let Some(render) = &output.ir.render {
            sites.extend(key_sites(render, &output.paths));
        }
        diagnostics.extend(component_diagnostics);
        components.push(output);
    }

    let spans: Vec<NodeId> = components.iter().filter_map(|c| c.ir.render_span).collect();
    let code = rewrite_program(&allocator, &mut program, &spans);

    Ok(CompileOutput {
        components,
        diagnostics,
        code,
        keyed_source: splice_keys(source, sites),
    })
}

struct Pipeline<'o> {
    source_file: &'o str,
    store: Option<DocumentStore>,
}

impl<'o> Pipeline<'o> {
    /// Path assignment, zones, templates, signature diff and persistence for one component.
    fn compile_component(&self, ir: ComponentIR) -> (ComponentOutput, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let mut allocator = HexPathAllocator::new();
        let (paths, zones, set) = match &ir.render {
            Some(root) => {
                let paths = assign_paths(root, &mut allocator);
                let zones = classify_tree(root, &ir);
                let set = extract_templates(
                    root,
                    &TemplateContext {
                        ir: &ir,
                        paths: &paths,
                        zones: &zones,
                    },
                );
                (paths, zones, set)
            }
            None => (PathTable::default(), ZoneTable::default(), TemplateSet::default()),
        };

        let mut addresses = BTreeMap::new();
        for (id, path) in &paths.paths {
            let zone = zones.zone_of(*id);
            addresses
                .entry(path.clone())
                .and_modify(|z: &mut Zone| *z = merge_zone(*z, zone))
                .or_insert(zone);
        }

        let templates = TemplateDocument::new(&ir.name, set);
        let signature = extract_signature(&ir);
        let mut changes = Vec::new();
        let mut store_error = None;

        if let Some(store) = &self.store {
            let previous = self.degrade(store.load_signature(&ir.name), &ir.name, "hook signature", &mut diagnostics);
            let previous_keys = self.degrade(store.load_keys(&ir.name), &ir.name, "key markers", &mut diagnostics);
            changes.extend(diff(previous.as_ref(), &signature));
            changes.extend(diff_addresses(previous_keys.as_ref().map(|k| &k.keys), &paths.markers));

            let keys = KeyDocument::new(&ir.name, paths.markers.clone());
            let document = ChangesDocument::new(&ir.name, self.source_file, changes.clone());
            let written = store
                .save_signature(&signature)
                .and_then(|_| store.save_keys(&keys))
                .and_then(|_| store.save_templates(&templates))
                .and_then(|_| store.save_changes(&document));
            if let Err(e) = written {
                warn!(component = %ir.name, error = %e, "failed to persist documents");
                store_error = Some(e.to_string());
            }
        }

        debug!(
            component = %ir.name,
            templates = templates.templates.len(),
            fallbacks = templates.fallbacks.len(),
            changes = changes.len(),
            "component compiled"
        );

        let output = ComponentOutput {
            ir,
            paths,
            zones,
            addresses,
            templates,
            signature,
            changes,
            store_error,
        };
        (output, diagnostics)
    }

    fn degrade<T>(&self, loaded: Loaded<T>, component: &str, what: &str, diagnostics: &mut Vec<Diagnostic>) -> Option<T> {
        if let Loaded::Degraded { reason } = &loaded {
            diagnostics.push(Diagnostic::warning(
                DIAG_DEGRADED_DOCUMENT,
                format!("previous {} unreadable ({}); compiling as first run", what, reason),
                Some(component),
            ));
        }
        loaded.into_option()
    }
}

/// Text run members share one path; their zones combine.
fn merge_zone(a: Zone, b: Zone) -> Zone {
    match (a, b) {
        (x, y) if x == y => x,
        (Zone::Static, other) | (other, Zone::Static) => other,
        _ => Zone::Hybrid,
    }
}
