//! Hook signatures and the structural diff between two compilations.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ir::{ComponentIR, Hook, SlotKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookEntry {
    #[serde(rename = "type")]
    pub kind: SlotKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var_name: Option<String>,
    pub index: usize,
    /// Kind fields compared between compilations but never reported as changes.
    #[serde(flatten)]
    pub discriminants: Discriminants,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discriminants {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming: Option<bool>,
}

impl Discriminants {
    fn of(hook: &Hook) -> Self {
        match hook {
            Hook::Pub { channel } | Hook::Sub { channel, .. } => Self {
                channel: Some(channel.clone()),
                ..Self::default()
            },
            Hook::SignalR { hub, .. } => Self {
                channel: Some(hub.clone()),
                ..Self::default()
            },
            Hook::ServerTask {
                runtime, streaming, ..
            } => Self {
                runtime: Some(runtime.clone()),
                streaming: Some(*streaming),
                ..Self::default()
            },
            Hook::PaginatedServerTask { runtime, .. } => Self {
                runtime: Some(runtime.clone()),
                ..Self::default()
            },
            _ => Self::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSignature {
    pub component_name: String,
    pub timestamp: DateTime<Utc>,
    pub hooks: Vec<HookEntry>,
}

pub fn extract_signature(ir: &ComponentIR) -> HookSignature {
    let hooks = ir
        .slots
        .iter()
        .map(|slot| HookEntry {
            kind: slot.kind(),
            var_name: slot.name.clone(),
            index: slot.index,
            discriminants: Discriminants::of(&slot.hook),
        })
        .collect();
    HookSignature {
        component_name: ir.name.clone(),
        timestamp: Utc::now(),
        hooks,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STRUCTURAL CHANGES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum StructuralChange {
    HookAdded {
        index: usize,
        hook_type: SlotKind,
        var_name: Option<String>,
    },
    HookRemoved {
        index: usize,
        hook_type: SlotKind,
        var_name: Option<String>,
    },
    HookTypeChanged {
        index: usize,
        old_type: SlotKind,
        new_type: SlotKind,
    },
    HookVariableChanged {
        index: usize,
        old_name: Option<String>,
        new_name: Option<String>,
    },
    TreeDeleted {
        address: String,
    },
}

/// Index-aligned comparison. No baseline means a first compilation, never a change.
pub fn diff(previous: Option<&HookSignature>, current: &HookSignature) -> Vec<StructuralChange> {
    let Some(previous) = previous else {
        return vec![];
    };
    let len = previous.hooks.len().max(current.hooks.len());
    let mut changes = Vec::new();
    for index in 0..len {
        match (previous.hooks.get(index), current.hooks.get(index)) {
            (None, Some(cur)) => changes.push(StructuralChange::HookAdded {
                index,
                hook_type: cur.kind,
                var_name: cur.var_name.clone(),
            }),
            (Some(prev), None) => changes.push(StructuralChange::HookRemoved {
                index,
                hook_type: prev.kind,
                var_name: prev.var_name.clone(),
            }),
            (Some(prev), Some(cur)) => {
                if prev.kind != cur.kind {
                    changes.push(StructuralChange::HookTypeChanged {
                        index,
                        old_type: prev.kind,
                        new_type: cur.kind,
                    });
                }
                if prev.var_name != cur.var_name {
                    changes.push(StructuralChange::HookVariableChanged {
                        index,
                        old_name: prev.var_name.clone(),
                        new_name: cur.var_name.clone(),
                    });
                }
                if prev.kind == cur.kind && prev.discriminants != cur.discriminants {
                    info!(
                        component = %current.component_name,
                        index,
                        before = ?prev.discriminants,
                        after = ?cur.discriminants,
                        "non-structural hook field change"
                    );
                }
            }
            (None, None) => {}
        }
    }
    changes
}

/// Markers present before and absent now are deleted subtrees.
pub fn diff_addresses(previous: Option<&BTreeSet<String>>, current: &BTreeSet<String>) -> Vec<StructuralChange> {
    previous
        .map(|prev| {
            prev.difference(current)
                .map(|address| StructuralChange::TreeDeleted {
                    address: address.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}

// ═══════════════════════════════════════════════════════════════════════════════
// DOCUMENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDocument {
    pub component_name: String,
    pub timestamp: DateTime<Utc>,
    pub keys: BTreeSet<String>,
}

impl KeyDocument {
    pub fn new(component_name: &str, keys: BTreeSet<String>) -> Self {
        Self {
            component_name: component_name.to_string(),
            timestamp: Utc::now(),
            keys,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesDocument {
    pub component_name: String,
    pub timestamp: DateTime<Utc>,
    pub source_file: String,
    pub changes: Vec<StructuralChange>,
}

impl ChangesDocument {
    pub fn new(component_name: &str, source_file: &str, changes: Vec<StructuralChange>) -> Self {
        Self {
            component_name: component_name.to_string(),
            timestamp: Utc::now(),
            source_file: source_file.to_string(),
            changes,
        }
    }
}
