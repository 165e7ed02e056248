//! Prop type resolution seam.
//!
//! The translation from source annotations to target type names is owned by the
//! emitter side; the extractor only asks a `TypeTable`.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

pub trait TypeTable: Sync {
    /// Target type name for a source annotation, `None` when it stays dynamic.
    fn resolve(&self, annotation: &str) -> Option<String>;
}

/// Resolves nothing: every prop is dynamic.
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamicTypeTable;

impl TypeTable for DynamicTypeTable {
    fn resolve(&self, _annotation: &str) -> Option<String> {
        None
    }
}

#[derive(Debug, Default, Clone)]
pub struct MappedTypeTable {
    entries: HashMap<String, String>,
}

impl MappedTypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, annotation: &str, target: &str) -> Self {
        self.entries
            .insert(annotation.to_string(), target.to_string());
        self
    }
}

impl TypeTable for MappedTypeTable {
    fn resolve(&self, annotation: &str) -> Option<String> {
        self.entries.get(annotation.trim()).cloned()
    }
}

lazy_static! {
    static ref MEMBER_RE: Regex =
        Regex::new(r"([A-Za-z_$][\w$]*)\s*(\?)?\s*:\s*([^;,\n}]+)").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMember {
    pub name: String,
    pub annotation: String,
    pub optional: bool,
}

/// Members of an object type body such as `{ title: string; count?: number }`.
pub fn parse_type_members(body: &str) -> Vec<TypeMember> {
    let inner = body
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}');
    MEMBER_RE
        .captures_iter(inner)
        .map(|cap| TypeMember {
            name: cap[1].to_string(),
            optional: cap.get(2).is_some(),
            annotation: cap[3].trim().to_string(),
        })
        .collect()
}

/// Body of a same-file `interface Name { ... }` or `type Name = { ... }`.
pub fn find_named_object_type<'s>(source: &'s str, name: &str) -> Option<&'s str> {
    let pattern = format!(
        r"(?:interface\s+{0}\s*|type\s+{0}\s*=\s*)(\{{[^}}]*\}})",
        regex::escape(name)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(source)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_type_members() {
        let members = parse_type_members("{ title: string; count?: number, tags: string[] }");
        assert_eq!(members.len(), 3);
        assert_eq!(members[0].name, "title");
        assert_eq!(members[1].annotation, "number");
        assert!(members[1].optional);
        assert_eq!(members[2].annotation, "string[]");
    }

    #[test]
    fn test_find_named_object_type() {
        let src = "interface CardProps { title: string }\nfunction Card() {}";
        assert_eq!(
            find_named_object_type(src, "CardProps"),
            Some("{ title: string }")
        );
        let src = "type Props = { a: number };";
        assert_eq!(find_named_object_type(src, "Props"), Some("{ a: number }"));
        assert_eq!(find_named_object_type(src, "Missing"), None);
    }

    #[test]
    fn test_mapped_table() {
        let table = MappedTypeTable::new().with("number", "double");
        assert_eq!(table.resolve(" number "), Some("double".to_string()));
        assert_eq!(DynamicTypeTable.resolve("number"), None);
    }
}
