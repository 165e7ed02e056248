//! # Predictive Component Compiler
//!
//! Compiles JSX components into a normalized IR plus parameterized templates
//! that let a runtime predictor reproduce future render output without running
//! the render function again.
//!
//! ## Pipeline
//!
//! 1. **Extraction** (`component`, `hooks`): every upper-case function or hook
//!    bundle becomes a `ComponentIR`. Hook calls map onto a closed `SlotKind`
//!    enumeration; registered bundles become nested instances.
//! 2. **Addressing** (`hex_path`, `annotate`): every element, text run and
//!    structural expression gets a hex path. Literal `key` markers keep their
//!    address across recompilations.
//! 3. **Zones** (`dependencies`): each node is labeled static, server, client or
//!    hybrid from the origins of the slots it reads.
//! 4. **Templates** (`templates`, `transform`): text, attribute, conditional and
//!    loop templates keyed by hex path. Whatever falls outside the recognized
//!    expression subset is recorded as a fallback.
//! 5. **Signatures** (`signature`, `store`): the ordered hook inventory is diffed
//!    against the previous compilation to detect state-shape changes.
//!
//! ## Invariants
//!
//! 1. **Side tables**: the lowered render tree is never mutated. Paths, zones and
//!    templates are keyed by `NodeId` (the node's source span).
//! 2. **One allocator per component**: `HexPathAllocator` is never shared, which
//!    lets components compile in parallel.
//! 3. **Single replacement**: each render expression is replaced by `null` in the
//!    output program exactly once.
//! 4. **Atomic documents**: persisted documents are replaced by rename, never
//!    written in place.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod annotate;
mod compile;
mod component;
mod dependencies;
mod error;
mod hex_path;
mod hooks;
mod ir;
mod jsx_lowerer;
mod keys;
mod materialize;
mod rewrite;
mod scope;
mod signature;
mod static_eval;
mod store;
mod templates;
mod transform;
mod types;
mod visitor;

#[cfg(test)]
mod compile_tests;
#[cfg(test)]
mod component_tests;

pub use annotate::{assign_paths, PathTable};
pub use compile::{compile_source, compile_source_with_types, CompileOptions, CompileOutput, ComponentOutput};
pub use component::{extract_components, ExtractContext, Extraction};
pub use dependencies::{classify, classify_tree, dependencies, Dependency, Zone, ZoneTable};
pub use error::{CompileError, Diagnostic, PathError, Severity, StoreError};
pub use hex_path::{
    build_path, generate_path_between, get_depth, get_parent_path, has_sufficient_gap, is_ancestor_of,
    parse_path, HexPathAllocator,
};
pub use ir::{ComponentIR, Expr, Hook, NodeId, RenderNode, Slot, SlotKind, StateOrigin};
pub use keys::annotate_source_keys;
pub use materialize::{materialize_pattern, materialize_structure};
pub use signature::{diff, diff_addresses, extract_signature, ChangesDocument, HookSignature, KeyDocument, StructuralChange};
pub use static_eval::{evaluate, expand, VNode};
pub use store::{DocumentStore, Loaded};
pub use templates::{extract_templates, Pattern, StructuralNode, Template, TemplateContext, TemplateDocument, TemplateSet};
pub use transform::is_truthy;
pub use types::{DynamicTypeTable, MappedTypeTable, TypeTable};

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi]
pub fn compile_source_native(
    source: String,
    file_path: String,
    options_json: Option<String>,
) -> napi::Result<serde_json::Value> {
    let options = match options_json {
        Some(json) => CompileOptions::from_json(&json).map_err(|e| napi::Error::from_reason(e.to_string()))?,
        None => CompileOptions::default(),
    };
    let output = compile_source(&source, &file_path, &options).map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_value(output).map_err(|e| napi::Error::from_reason(e.to_string()))
}
