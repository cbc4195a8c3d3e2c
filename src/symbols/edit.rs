//! Structural edits over a file's source text, driven by symbol ranges:
//! replace/insert/delete a symbol's body. Renames go through the language
//! server's own rename support (`lsp::client::LspClient::rename_symbol`)
//! since that's the only way to safely update call sites across files;
//! everything here is local, single-file text surgery.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use lsp_types::{DocumentChanges, OneOf, SymbolKind, TextEdit, WorkspaceEdit};

use crate::error::ToolError;

use super::model::{Span, Symbol, SymbolTree};
use super::namepath::Pattern;
use super::retriever::find_symbol;

/// Resolves `pattern` (and optional `kind` filter) against `tree` to exactly
/// one symbol.
///
/// ## Errors
/// Returns [`ToolError::NoSuchSymbol`] if nothing matches, or
/// [`ToolError::Ambiguous`] if more than one symbol matches.
pub fn resolve_unique<'a>(
    tree: &'a SymbolTree,
    pattern: &Pattern,
    kind: Option<SymbolKind>,
) -> Result<&'a Symbol, ToolError> {
    let kinds = kind.map(|k| [k]);
    let mut matches = find_symbol(tree, pattern, kinds.as_ref().map(<[SymbolKind; 1]>::as_slice), false);
    match matches.len() {
        0 => Err(ToolError::NoSuchSymbol(format!(
            "{} (searched {})",
            pattern.source(),
            tree.file.display()
        ))),
        1 => Ok(matches.remove(0)),
        _ => Err(ToolError::Ambiguous {
            name_path: pattern.source().to_string(),
            candidates: matches.iter().map(|s| s.name_path()).collect(),
        }),
    }
}

fn line_bounds(source: &str, span: Span) -> (usize, usize) {
    let lines: Vec<&str> = source.lines().collect();
    let start = (span.start_line as usize).saturating_sub(1).min(lines.len());
    let end = (span.end_line as usize).min(lines.len());
    (start, end)
}

fn rebuild(source: &str, start_line: usize, end_line: usize, replacement: Option<&str>) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let mut out: Vec<String> = Vec::new();
    out.extend(lines[..start_line].iter().map(|s| (*s).to_string()));
    if let Some(text) = replacement {
        out.extend(text.lines().map(|s| s.to_string()));
    }
    out.extend(lines[end_line..].iter().map(|s| (*s).to_string()));
    let mut joined = out.join("\n");
    if source.ends_with('\n') && !joined.ends_with('\n') {
        joined.push('\n');
    }
    joined
}

/// Replaces a symbol's full body (its entire range) with `new_body`.
#[must_use]
pub fn replace_symbol_body(source: &str, symbol: &Symbol, new_body: &str) -> String {
    let (start, end) = line_bounds(source, symbol.range);
    rebuild(source, start, end, Some(new_body))
}

/// Inserts `text` as new lines immediately before a symbol's range.
#[must_use]
pub fn insert_before_symbol(source: &str, symbol: &Symbol, text: &str) -> String {
    let (start, _) = line_bounds(source, symbol.range);
    rebuild(source, start, start, Some(text))
}

/// Inserts `text` as new lines immediately after a symbol's range.
#[must_use]
pub fn insert_after_symbol(source: &str, symbol: &Symbol, text: &str) -> String {
    let (_, end) = line_bounds(source, symbol.range);
    rebuild(source, end, end, Some(text))
}

/// Deletes a symbol's full range from the source.
#[must_use]
pub fn delete_symbol(source: &str, symbol: &Symbol) -> String {
    let (start, end) = line_bounds(source, symbol.range);
    rebuild(source, start, end, None)
}

/// Writes `content` to `path` atomically: write to a sibling temp file,
/// then rename it into place, so a crash mid-write never leaves a
/// half-written file at `path`.
///
/// ## Errors
/// Returns [`std::io::Error`] if the temp file can't be written or the
/// rename fails.
pub async fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let tmp = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("")
    ));
    tokio::fs::write(&tmp, content).await?;
    tokio::fs::rename(&tmp, path).await
}

fn position_to_offset(source: &str, position: lsp_types::Position) -> usize {
    let mut offset = 0;
    for (i, line) in source.split('\n').enumerate() {
        if i == position.line as usize {
            return offset + (position.character as usize).min(line.len());
        }
        offset += line.len() + 1;
    }
    source.len()
}

/// Applies a language server's `WorkspaceEdit` directly to the files on
/// disk (rather than asking the server to apply it itself, since most
/// LSP servers in navigation-only setups expect the client to own file
/// writes). Returns the list of files touched.
///
/// Edits within a file are applied from the last position to the first,
/// so that applying one edit never invalidates the offsets of edits that
/// precede it.
///
/// ## Errors
/// Returns [`std::io::Error`] if any touched file can't be read or
/// written.
pub async fn apply_workspace_edit(edit: &WorkspaceEdit) -> std::io::Result<Vec<PathBuf>> {
    let mut per_file: HashMap<PathBuf, Vec<TextEdit>> = HashMap::new();

    if let Some(changes) = &edit.changes {
        for (uri, edits) in changes {
            if let Ok(path) = uri.to_file_path() {
                per_file.entry(path).or_default().extend(edits.iter().cloned());
            }
        }
    }
    if let Some(DocumentChanges::Edits(doc_edits)) = &edit.document_changes {
        for doc_edit in doc_edits {
            if let Ok(path) = doc_edit.text_document.uri.to_file_path() {
                let edits = doc_edit.edits.iter().map(|e| match e {
                    OneOf::Left(text_edit) => text_edit.clone(),
                    OneOf::Right(annotated) => annotated.text_edit.clone(),
                });
                per_file.entry(path).or_default().extend(edits);
            }
        }
    }

    let mut touched = Vec::new();
    for (path, mut edits) in per_file {
        let mut content = tokio::fs::read_to_string(&path).await?;
        edits.sort_by(|a, b| b.range.start.cmp(&a.range.start));
        for text_edit in &edits {
            let start = position_to_offset(&content, text_edit.range.start);
            let end = position_to_offset(&content, text_edit.range.end);
            content.replace_range(start..end, &text_edit.new_text);
        }
        write_atomic(&path, &content).await?;
        touched.push(path);
    }
    Ok(touched)
}
