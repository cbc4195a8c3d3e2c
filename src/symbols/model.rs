//! The normalized symbol tree and its conversion from raw LSP responses.

use std::path::PathBuf;

use lsp_types::{DocumentSymbolResponse, SymbolKind};
use serde::{Deserialize, Serialize};

use crate::lsp::types::from_lsp_position;

/// A 1-indexed line/column span, as surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// 1-indexed start line.
    pub start_line: u32,
    /// 1-indexed start column.
    pub start_column: u32,
    /// 1-indexed end line.
    pub end_line: u32,
    /// 1-indexed end column.
    pub end_column: u32,
}

impl Span {
    fn from_lsp(range: lsp_types::Range) -> Self {
        let (start_line, start_column) = from_lsp_position(range.start);
        let (end_line, end_column) = from_lsp_position(range.end);
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }
}

/// A single symbol in the normalized tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    /// The symbol's name.
    pub name: String,
    /// What kind of symbol this is (function, struct, ...).
    pub kind: SymbolKind,
    /// The symbol's full extent, including its body.
    pub range: Span,
    /// The narrower range of just the symbol's name token.
    pub selection_range: Span,
    /// Name of the enclosing symbol, when the source reported one but
    /// didn't nest it (flat `SymbolInformation` responses).
    pub container_name: Option<String>,
    /// Nested child symbols.
    pub children: Vec<Symbol>,
    /// Name-path segments from the tree root down to and including this
    /// symbol, e.g. `["Foo", "bar"]` for method `bar` on struct `Foo`.
    pub path: Vec<String>,
}

impl Symbol {
    /// Renders this symbol's `path` as a `/`-joined name path.
    #[must_use]
    pub fn name_path(&self) -> String {
        self.path.join("/")
    }

    fn from_document_symbol(doc: &lsp_types::DocumentSymbol, mut path: Vec<String>) -> Self {
        path.push(doc.name.clone());
        let children = doc
            .children
            .as_ref()
            .map(|kids| {
                kids.iter()
                    .map(|k| Symbol::from_document_symbol(k, path.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            name: doc.name.clone(),
            kind: doc.kind,
            range: Span::from_lsp(doc.range),
            selection_range: Span::from_lsp(doc.selection_range),
            container_name: None,
            children,
            path,
        }
    }

    fn from_symbol_information(info: &lsp_types::SymbolInformation) -> Self {
        let span = Span::from_lsp(info.location.range);
        Self {
            name: info.name.clone(),
            kind: info.kind,
            range: span,
            selection_range: span,
            container_name: info.container_name.clone(),
            children: Vec::new(),
            path: vec![info.name.clone()],
        }
    }

    /// Depth-first iterator over this symbol and all descendants.
    pub fn walk(&self) -> impl Iterator<Item = &Symbol> + '_ {
        SymbolWalk { stack: vec![self] }
    }
}

struct SymbolWalk<'a> {
    stack: Vec<&'a Symbol>,
}

impl<'a> Iterator for SymbolWalk<'a> {
    type Item = &'a Symbol;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        for child in next.children.iter().rev() {
            self.stack.push(child);
        }
        Some(next)
    }
}

/// Reconstructs a hierarchy out of a flat `SymbolInformation` list by range
/// containment: a symbol becomes the child of the smallest other symbol
/// whose range encloses it. Servers that only report flat symbols (older
/// LSP implementations) still produce a navigable tree this way.
fn nest_by_containment(mut flat: Vec<Symbol>) -> Vec<Symbol> {
    flat.sort_by(|a, b| {
        span_len(b.range)
            .cmp(&span_len(a.range))
            .then((a.range.start_line, a.range.start_column).cmp(&(b.range.start_line, b.range.start_column)))
    });

    let mut roots: Vec<Symbol> = Vec::new();
    for symbol in flat {
        insert_into_forest(&mut roots, symbol);
    }
    fix_paths(&mut roots, &Vec::new());
    roots
}

fn span_len(s: Span) -> u64 {
    let lines = u64::from(s.end_line.saturating_sub(s.start_line));
    lines * 1_000_000 + u64::from(s.end_column)
}

fn span_contains(outer: Span, inner: Span) -> bool {
    (outer.start_line, outer.start_column) <= (inner.start_line, inner.start_column)
        && (inner.end_line, inner.end_column) <= (outer.end_line, outer.end_column)
}

fn insert_into_forest(nodes: &mut Vec<Symbol>, symbol: Symbol) {
    for node in nodes.iter_mut() {
        if node.range != symbol.range && span_contains(node.range, symbol.range) {
            insert_into_forest(&mut node.children, symbol);
            return;
        }
    }
    nodes.push(symbol);
}

fn fix_paths(nodes: &mut [Symbol], prefix: &[String]) {
    for node in nodes.iter_mut() {
        let mut path = prefix.to_vec();
        path.push(node.name.clone());
        fix_paths(&mut node.children, &path);
        node.path = path;
    }
}

/// The normalized symbol tree for a single file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolTree {
    /// The file this tree describes.
    pub file: PathBuf,
    /// Top-level symbols in the file.
    pub roots: Vec<Symbol>,
}

impl SymbolTree {
    /// Builds a normalized tree from a raw LSP `textDocument/documentSymbol`
    /// response, handling both the nested and flat response shapes.
    #[must_use]
    pub fn from_lsp(file: PathBuf, response: DocumentSymbolResponse) -> Self {
        let roots = match response {
            DocumentSymbolResponse::Nested(symbols) => symbols
                .iter()
                .map(|s| Symbol::from_document_symbol(s, Vec::new()))
                .collect(),
            DocumentSymbolResponse::Flat(symbols) => {
                let flat: Vec<Symbol> = symbols.iter().map(Symbol::from_symbol_information).collect();
                nest_by_containment(flat)
            }
        };
        Self { file, roots }
    }

    /// Depth-first iterator over every symbol in the tree.
    pub fn walk(&self) -> impl Iterator<Item = &Symbol> + '_ {
        self.roots.iter().flat_map(Symbol::walk)
    }
}
