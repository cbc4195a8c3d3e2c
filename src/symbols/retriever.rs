//! Read-only queries over a normalized symbol tree: structural overviews,
//! name-path lookup, and body text extraction.

use lsp_types::SymbolKind;

use super::model::{Span, Symbol, SymbolTree};
use super::namepath::{matches_kinds, Pattern};

/// One entry in a file's structural overview.
#[derive(Debug, Clone)]
pub struct OverviewEntry {
    /// The symbol's full name path.
    pub name_path: String,
    /// The symbol's kind.
    pub kind: SymbolKind,
    /// 1-indexed line the symbol starts on.
    pub line: u32,
    /// Depth in the tree, 0 for a top-level symbol.
    pub depth: usize,
}

/// Flattens a file's symbol tree into a depth-annotated overview, optionally
/// bounded to `max_depth` levels.
#[must_use]
pub fn symbols_overview(tree: &SymbolTree, max_depth: Option<usize>) -> Vec<OverviewEntry> {
    let mut out = Vec::new();
    for root in &tree.roots {
        overview_recurse(root, 0, max_depth, &mut out);
    }
    out
}

fn overview_recurse(symbol: &Symbol, depth: usize, max_depth: Option<usize>, out: &mut Vec<OverviewEntry>) {
    out.push(OverviewEntry {
        name_path: symbol.name_path(),
        kind: symbol.kind,
        line: symbol.range.start_line,
        depth,
    });
    if max_depth.is_some_and(|max| depth >= max) {
        return;
    }
    for child in &symbol.children {
        overview_recurse(child, depth + 1, max_depth, out);
    }
}

/// Finds every symbol in `tree` whose name path matches `pattern` and,
/// when given, whose kind is one of `kinds` (the leaf-kind filter; interior
/// segments of the name path are never kind-checked). `substring_matching`
/// relaxes literal segments from exact match to substring containment.
#[must_use]
pub fn find_symbol<'a>(
    tree: &'a SymbolTree,
    pattern: &Pattern,
    kinds: Option<&[SymbolKind]>,
    substring_matching: bool,
) -> Vec<&'a Symbol> {
    tree.walk()
        .filter(|s| pattern.matches(&s.path, substring_matching) && matches_kinds(kinds, s.kind))
        .collect()
}

/// Flattens a symbol's descendants, excluding itself, up to `max_depth`
/// levels (1 = direct children only). Used to attach bounded child context
/// to a `find_symbol` match without pulling in the whole subtree.
#[must_use]
pub fn symbol_descendants(symbol: &Symbol, max_depth: usize) -> Vec<OverviewEntry> {
    let mut out = Vec::new();
    if max_depth == 0 {
        return out;
    }
    for child in &symbol.children {
        overview_recurse(child, 0, Some(max_depth - 1), &mut out);
    }
    out
}

/// Finds the innermost symbol in `tree` whose range contains 1-indexed
/// `line`, if any. Used to map a reference location back to its enclosing
/// symbol.
#[must_use]
pub fn containing_symbol(tree: &SymbolTree, line: u32) -> Option<&Symbol> {
    let mut best: Option<&Symbol> = None;
    for symbol in tree.walk() {
        if symbol.range.start_line <= line && line <= symbol.range.end_line {
            let better = best.is_none_or(|b| {
                let current_span = symbol.range.end_line - symbol.range.start_line;
                let best_span = b.range.end_line - b.range.start_line;
                current_span <= best_span
            });
            if better {
                best = Some(symbol);
            }
        }
    }
    best
}

/// Extracts the exact source text covered by `span`'s full lines
/// (`start_line..=end_line`) out of a file's full `source` text, preserving
/// the trailing newline of the last line. Column bounds are ignored: a
/// symbol's body is every full line it spans, not a column-trimmed slice.
#[must_use]
pub fn extract_span(source: &str, span: Span) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let start_idx = (span.start_line as usize).saturating_sub(1);
    if start_idx >= lines.len() {
        return String::new();
    }
    let end_idx = (span.end_line as usize)
        .saturating_sub(1)
        .min(lines.len().saturating_sub(1));

    let mut out = String::new();
    for line in &lines[start_idx..=end_idx] {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Extracts a symbol's full body text, including its signature/decorators,
/// inclusive of the trailing newline of its last line, out of `source`.
#[must_use]
pub fn symbol_body(source: &str, symbol: &Symbol) -> String {
    extract_span(source, symbol.range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample_tree() -> SymbolTree {
        let bar = Symbol {
            name: "bar".to_string(),
            kind: SymbolKind::METHOD,
            range: Span {
                start_line: 2,
                start_column: 1,
                end_line: 2,
                end_column: 10,
            },
            selection_range: Span {
                start_line: 2,
                start_column: 1,
                end_line: 2,
                end_column: 4,
            },
            container_name: None,
            children: Vec::new(),
            path: vec!["Foo".to_string(), "bar".to_string()],
        };
        let foo = Symbol {
            name: "Foo".to_string(),
            kind: SymbolKind::STRUCT,
            range: Span {
                start_line: 1,
                start_column: 1,
                end_line: 3,
                end_column: 1,
            },
            selection_range: Span {
                start_line: 1,
                start_column: 1,
                end_line: 1,
                end_column: 4,
            },
            container_name: None,
            children: vec![bar],
            path: vec!["Foo".to_string()],
        };
        SymbolTree {
            file: PathBuf::from("a.rs"),
            roots: vec![foo],
        }
    }

    #[test]
    fn test_symbols_overview_includes_depth() {
        let tree = sample_tree();
        let overview = symbols_overview(&tree, None);
        assert_eq!(overview.len(), 2);
        assert_eq!(overview[0].depth, 0);
        assert_eq!(overview[1].depth, 1);
    }

    #[test]
    fn test_symbols_overview_respects_max_depth() {
        let tree = sample_tree();
        let overview = symbols_overview(&tree, Some(0));
        assert_eq!(overview.len(), 1);
    }

    #[test]
    fn test_find_symbol_by_name_path() {
        let tree = sample_tree();
        let pattern = Pattern::parse("Foo/bar").unwrap();
        let found = find_symbol(&tree, &pattern, None, false);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "bar");
    }

    #[test]
    fn test_find_symbol_exact_match_excludes_substring() {
        let tree = sample_tree();
        let pattern = Pattern::parse("ba").unwrap();
        assert!(find_symbol(&tree, &pattern, None, false).is_empty());
        let found = find_symbol(&tree, &pattern, None, true);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "bar");
    }

    #[test]
    fn test_find_symbol_filters_by_kind() {
        let tree = sample_tree();
        let pattern = Pattern::parse("*/bar").unwrap();
        assert!(find_symbol(&tree, &pattern, Some(&[SymbolKind::STRUCT]), false).is_empty());
        let found = find_symbol(&tree, &pattern, Some(&[SymbolKind::METHOD]), false);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_containing_symbol_prefers_innermost() {
        let tree = sample_tree();
        let found = containing_symbol(&tree, 2).unwrap();
        assert_eq!(found.name, "bar");
    }

    #[test]
    fn test_extract_span_single_line_includes_trailing_newline() {
        let source = "line one\nline two\nline three";
        let span = Span {
            start_line: 2,
            start_column: 1,
            end_line: 2,
            end_column: 5,
        };
        assert_eq!(extract_span(source, span), "line two\n");
    }

    #[test]
    fn test_extract_span_multi_line_keeps_leading_indentation() {
        let source = "class Calculator:\n    def add(self, a, b):\n        return a + b\n";
        let span = Span {
            start_line: 2,
            start_column: 5,
            end_line: 3,
            end_column: 22,
        };
        assert_eq!(
            extract_span(source, span),
            "    def add(self, a, b):\n        return a + b\n"
        );
    }
}
