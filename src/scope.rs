use oxc_ast::ast::{
    BindingIdentifier, Expression, Function, IdentifierReference, ImportDeclarationSpecifier,
    Program, Statement,
};
use oxc_ast_visit::Visit;
use oxc_syntax::scope::ScopeFlags;
use std::collections::{BTreeSet, HashSet};

/// Collects identifier references and the names bound inside the visited subtree.
#[derive(Default)]
pub struct ScopeAwareCollector {
    pub references: Vec<String>,
    pub bindings: HashSet<String>,
}

impl<'a> Visit<'a> for ScopeAwareCollector {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        self.references.push(ident.name.to_string());
    }

    fn visit_binding_identifier(&mut self, ident: &BindingIdentifier<'a>) {
        self.bindings.insert(ident.name.to_string());
    }
}

impl ScopeAwareCollector {
    /// References not bound inside the subtree, deduplicated and sorted.
    pub fn free_reads(self) -> Vec<String> {
        let bindings = self.bindings;
        self.references
            .into_iter()
            .filter(|r| !bindings.contains(r))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

pub fn free_reads_of_expression(expr: &Expression) -> Vec<String> {
    let mut collector = ScopeAwareCollector::default();
    collector.visit_expression(expr);
    collector.free_reads()
}

pub fn free_reads_of_function(func: &Function) -> Vec<String> {
    let mut collector = ScopeAwareCollector::default();
    collector.visit_function(func, ScopeFlags::empty());
    collector.free_reads()
}

pub fn free_reads_of_statements(statements: &[Statement]) -> Vec<String> {
    let mut collector = ScopeAwareCollector::default();
    for stmt in statements {
        collector.visit_statement(stmt);
    }
    collector.free_reads()
}

/// Local names bound by `import` declarations.
pub fn imported_bindings(program: &Program) -> HashSet<String> {
    let mut names = HashSet::new();
    for stmt in &program.body {
        if let Statement::ImportDeclaration(decl) = stmt {
            if let Some(specifiers) = &decl.specifiers {
                for spec in specifiers {
                    let local = match spec {
                        ImportDeclarationSpecifier::ImportSpecifier(s) => &s.local,
                        ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => &s.local,
                        ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => &s.local,
                    };
                    names.insert(local.name.to_string());
                }
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    #[test]
    fn test_free_reads_skip_inner_bindings() {
        let allocator = Allocator::default();
        let source_type = SourceType::default().with_jsx(true).with_module(true);
        let expr = Parser::new(&allocator, "items.map(item => item.id + offset)", source_type)
            .parse_expression()
            .unwrap();
        assert_eq!(free_reads_of_expression(&expr), vec!["items", "offset"]);
    }

    #[test]
    fn test_imported_bindings() {
        let allocator = Allocator::default();
        let source_type = SourceType::default().with_module(true);
        let ret = Parser::new(
            &allocator,
            "import a, { b as c } from 'x'; import * as ns from 'y';",
            source_type,
        )
        .parse();
        let names = imported_bindings(&ret.program);
        assert!(names.contains("a"));
        assert!(names.contains("c"));
        assert!(names.contains("ns"));
        assert!(!names.contains("b"));
    }
}
