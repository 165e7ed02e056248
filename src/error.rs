use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const DIAG_HOOK_SHAPE: &str = "MC-HOOK-001";
pub const DIAG_HOOK_LITERAL: &str = "MC-HOOK-002";
pub const DIAG_UNREGISTERED_HOOK: &str = "MC-HOOK-003";
pub const DIAG_BUNDLE_NAMESPACE: &str = "MC-HOOK-004";
pub const DIAG_NESTED_HOOK: &str = "MC-HOOK-005";
pub const DIAG_MULTIPLE_RETURNS: &str = "MC-RENDER-001";
pub const DIAG_NO_RENDER: &str = "MC-RENDER-002";
pub const DIAG_DEGRADED_DOCUMENT: &str = "MC-STORE-001";

fn guarantee(code: &str) -> &'static str {
    match code {
        DIAG_HOOK_SHAPE => "Stateful hooks are destructured in the shape their kind requires.",
        DIAG_HOOK_LITERAL => "Channel, field, layout and property names are string literals.",
        DIAG_UNREGISTERED_HOOK => "Custom hooks compile as registered nested instances.",
        DIAG_BUNDLE_NAMESPACE => "Hook bundle calls start with a literal namespace.",
        DIAG_NESTED_HOOK => "Hooks are called at the top level of the component body.",
        DIAG_MULTIPLE_RETURNS => "A component has exactly one top-level render expression.",
        DIAG_NO_RENDER => "A component returns a render expression.",
        DIAG_DEGRADED_DOCUMENT => "Unreadable persisted documents count as a first compilation.",
        _ => "Unknown diagnostic.",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A skip-level problem. Extraction of the remaining slots and components continues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub guarantee: String,
    pub component: Option<String>,
    pub line: u32,
    pub column: u32,
}

impl Diagnostic {
    pub fn warning(code: &str, message: impl Into<String>, component: Option<&str>) -> Self {
        Self {
            code: code.to_string(),
            severity: Severity::Warning,
            message: message.into(),
            guarantee: guarantee(code).to_string(),
            component: component.map(|c| c.to_string()),
            line: 0,
            column: 0,
        }
    }

    pub fn at(mut self, (line, column): (u32, u32)) -> Self {
        self.line = line;
        self.column = column;
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to parse {file}: {message}")]
    Parse { file: String, message: String },

    #[error("invalid compile options: {0}")]
    Options(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document io failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("document serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("atomic replace of {path} failed: {source}")]
    Persist {
        path: String,
        #[source]
        source: tempfile::PersistError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("invalid hex segment '{0}'")]
    InvalidSegment(String),

    #[error("no address fits between '{0}' and '{1}'; the level needs a full re-issue")]
    GapExhausted(String, String),

    #[error("'{0}' does not sort before '{1}'")]
    Unordered(String, String),
}

/// 1-based line and column for a byte offset.
pub fn line_col(source: &str, offset: u32) -> (u32, u32) {
    let offset = (offset as usize).min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() as u32 + 1;
    let column = match before.rfind('\n') {
        Some(idx) => (offset - idx) as u32,
        None => offset as u32 + 1,
    };
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col() {
        let src = "ab\ncd\nef";
        assert_eq!(line_col(src, 0), (1, 1));
        assert_eq!(line_col(src, 4), (2, 2));
        assert_eq!(line_col(src, 6), (3, 1));
    }

    #[test]
    fn test_diagnostic_carries_guarantee() {
        let d = Diagnostic::warning(DIAG_HOOK_SHAPE, "bad", Some("Counter")).at((3, 5));
        assert_eq!(d.line, 3);
        assert!(d.guarantee.contains("destructured"));
        assert_eq!(d.component.as_deref(), Some("Counter"));
    }
}
