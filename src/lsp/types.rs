//! Additional type definitions for LSP operations.
//!
//! This module provides helper types and conversions for working with
//! LSP types in the context of code navigation.
//!
//! Note: Functions here are used by the MCP server layer but may appear
//! unused due to macro-generated code.

// Allow dead code warnings for functions used by MCP layer
#![allow(dead_code)]

use lsp_types::{Position, Url};
use std::path::Path;

use crate::error::LspError;

use super::LspResult;

/// Converts a path to an LSP file:// URI.
///
/// This handles both absolute and relative paths, converting them to
/// properly formatted file:// URIs that LSP servers expect.
/// ## Errors
pub fn path_to_url(path: &Path) -> LspResult<Url> {
    // Make path absolute
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| {
                LspError::DocumentNotFound(format!("failed to get current directory: {e}"))
            })?
            .join(path)
    };

    // Canonicalize to resolve symlinks and normalize path
    let canonical = absolute.canonicalize().map_err(|e| {
        LspError::DocumentNotFound(format!(
            "failed to canonicalize path '{}': {}",
            path.display(),
            e
        ))
    })?;

    // Use Url::from_file_path which handles platform-specific details
    Url::from_file_path(&canonical)
        .map_err(|()| LspError::DocumentNotFound(format!("invalid path: {}", canonical.display())))
}

/// Extension trait for converting paths to LSP Url.
pub trait PathToUri {
    /// Converts a path to an LSP Url.
    /// ## Errors
    /// `LspError`
    fn to_lsp_uri(&self) -> LspResult<Url>;
}

impl PathToUri for Path {
    fn to_lsp_uri(&self) -> LspResult<Url> {
        path_to_url(self)
    }
}

/// Converts user-facing 1-indexed position to LSP 0-indexed position.
///
/// # Arguments
///
/// * `line` - 1-indexed line number
/// * `column` - 1-indexed column number
///
/// # Returns
///
/// LSP Position (0-indexed)
///
/// # Errors
///
/// Returns error if line or column is 0.
pub fn to_lsp_position(line: u32, column: u32) -> LspResult<Position> {
    if line == 0 {
        return Err(LspError::InvalidPosition { line, column });
    }
    if column == 0 {
        return Err(LspError::InvalidPosition { line, column });
    }
    Ok(Position {
        line: line - 1,
        character: column - 1,
    })
}

/// Converts LSP 0-indexed position to user-facing 1-indexed position.
///
/// # Arguments
///
/// * `position` - LSP Position (0-indexed)
///
/// # Returns
///
/// Tuple of (line, column) both 1-indexed
pub fn from_lsp_position(position: Position) -> (u32, u32) {
    (position.line + 1, position.character + 1)
}

/// Converts an LSP symbol kind to a human-readable string.
pub fn symbol_kind_to_string(kind: lsp_types::SymbolKind) -> &'static str {
    use lsp_types::SymbolKind;
    match kind {
        SymbolKind::FILE => "file",
        SymbolKind::MODULE => "module",
        SymbolKind::NAMESPACE => "namespace",
        SymbolKind::PACKAGE => "package",
        SymbolKind::CLASS => "class",
        SymbolKind::METHOD => "method",
        SymbolKind::PROPERTY => "property",
        SymbolKind::FIELD => "field",
        SymbolKind::CONSTRUCTOR => "constructor",
        SymbolKind::ENUM => "enum",
        SymbolKind::INTERFACE => "interface",
        SymbolKind::FUNCTION => "function",
        SymbolKind::VARIABLE => "variable",
        SymbolKind::CONSTANT => "constant",
        SymbolKind::STRING => "string",
        SymbolKind::NUMBER => "number",
        SymbolKind::BOOLEAN => "boolean",
        SymbolKind::ARRAY => "array",
        SymbolKind::OBJECT => "object",
        SymbolKind::KEY => "key",
        SymbolKind::NULL => "null",
        SymbolKind::ENUM_MEMBER => "enum_member",
        SymbolKind::STRUCT => "struct",
        SymbolKind::EVENT => "event",
        SymbolKind::OPERATOR => "operator",
        SymbolKind::TYPE_PARAMETER => "type_parameter",
        _ => "unknown",
    }
}

/// Parses a human-readable symbol kind name back into an [`lsp_types::SymbolKind`].
/// Case-insensitive; the inverse of [`symbol_kind_to_string`].
#[must_use]
pub fn symbol_kind_from_str(name: &str) -> Option<lsp_types::SymbolKind> {
    use lsp_types::SymbolKind;
    Some(match name.to_ascii_lowercase().as_str() {
        "file" => SymbolKind::FILE,
        "module" => SymbolKind::MODULE,
        "namespace" => SymbolKind::NAMESPACE,
        "package" => SymbolKind::PACKAGE,
        "class" => SymbolKind::CLASS,
        "method" => SymbolKind::METHOD,
        "property" => SymbolKind::PROPERTY,
        "field" => SymbolKind::FIELD,
        "constructor" => SymbolKind::CONSTRUCTOR,
        "enum" => SymbolKind::ENUM,
        "interface" => SymbolKind::INTERFACE,
        "function" => SymbolKind::FUNCTION,
        "variable" => SymbolKind::VARIABLE,
        "constant" => SymbolKind::CONSTANT,
        "string" => SymbolKind::STRING,
        "number" => SymbolKind::NUMBER,
        "boolean" => SymbolKind::BOOLEAN,
        "array" => SymbolKind::ARRAY,
        "object" => SymbolKind::OBJECT,
        "key" => SymbolKind::KEY,
        "null" => SymbolKind::NULL,
        "enum_member" => SymbolKind::ENUM_MEMBER,
        "struct" => SymbolKind::STRUCT,
        "event" => SymbolKind::EVENT,
        "operator" => SymbolKind::OPERATOR,
        "type_parameter" => SymbolKind::TYPE_PARAMETER,
        _ => return None,
    })
}
