//! MCP tool definitions for code navigation.
//!
//! This module defines the tools exposed by the MCP server. Each tool
//! corresponds to a language server capability and provides LLM-friendly
//! access to semantic code navigation.
//!
//! Note: Types here appear unused because they're consumed by proc macros.
//!
//! # Available Tools

// Allow dead code warnings - types are used by #[tool] and #[tool_router] macros
#![allow(dead_code)]
//!
//! ## High Priority (Must Have)
//! - `goto_definition` - Jump to symbol definition
//! - `find_references` - Find all references to a symbol
//! - `hover` - Get type info and documentation
//! - `document_symbols` - List symbols in a file
//! - `workspace_symbols` - Search symbols across workspace
//! - `incoming_calls` - Find callers of a function
//! - `outgoing_calls` - Find functions called by a function
//! - `implementations` - Find implementations of a trait/interface
//! - `type_definition` - Jump to type definition
//!
//! ## Nice to Have (Future)
//! - `diagnostics` - Get errors and warnings
//! - `signature_help` - Get function signature info
//! - `rename_preview` - Preview rename refactoring
//! - `code_actions` - Get available quick fixes

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Common input for position-based tool calls.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PositionParams {
    /// Path to the file.
    #[schemars(description = "Absolute path to the source file")]
    pub file_path: String,
    /// Line number (1-indexed for user-friendliness).
    #[schemars(description = "Line number (1-indexed)")]
    pub line: u32,
    /// Column number (1-indexed for user-friendliness).
    #[schemars(description = "Column number (1-indexed)")]
    pub column: u32,
}

/// Input for symbol-based queries by name with an optional file path filter.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SymbolNameParams {
    /// The symbol name to search for.
    #[schemars(description = "The symbol name to search for")]
    pub symbol: String,
    /// Optional file path to narrow the search.
    #[schemars(description = "Optional file path to narrow the search scope")]
    pub file_path: Option<String>,
}

/// Input for symbol-based queries that can use either position or symbol name.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum SymbolQuery {
    /// Query by position in a file.
    Position(PositionParams),
    /// Query by symbol name.
    Name(SymbolNameParams),
}

/// Parameters for the `goto_definition` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GotoDefinitionParams {
    /// The symbol to find the definition of.
    #[schemars(description = "The symbol to find the definition of (by position or name)")]
    pub query: SymbolQuery,
}

/// Parameters for the `find_references` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FindReferencesParams {
    /// The symbol to find references to.
    #[schemars(description = "The symbol to find references to (by position or name)")]
    pub query: SymbolQuery,
    /// Whether to include the declaration in the results.
    #[serde(default)]
    #[schemars(description = "Whether to include the declaration in the results (default: false)")]
    pub include_declaration: bool,
}

/// Parameters for the hover tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HoverParams {
    /// Position to get hover info for.
    #[schemars(description = "Position in the file to get hover info for")]
    pub position: PositionParams,
}

/// Parameters for the `document_symbols` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSymbolsParams {
    /// Path to the file.
    #[schemars(description = "Absolute path to the source file to list symbols from")]
    pub file_path: String,
}

/// Parameters for the `workspace_symbols` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSymbolsParams {
    /// Query string to search for.
    #[schemars(description = "Query string to search for symbols across the workspace")]
    pub query: String,
    /// Maximum number of results to return.
    #[serde(default = "default_max_results")]
    #[schemars(description = "Maximum number of results to return (default: 50)")]
    pub max_results: u32,
}

fn default_max_results() -> u32 {
    50
}

/// Parameters for the `incoming_calls` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IncomingCallsParams {
    /// Position of the function to find callers for.
    #[schemars(description = "Position of the function to find callers for")]
    pub position: PositionParams,
}

/// Parameters for the `outgoing_calls` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingCallsParams {
    /// Position of the function to find callees for.
    #[schemars(description = "Position of the function to find callees for")]
    pub position: PositionParams,
}

/// Parameters for the implementations tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImplementationsParams {
    /// The trait/interface to find implementations for.
    #[schemars(
        description = "The trait/interface to find implementations for (by position or name)"
    )]
    pub query: SymbolQuery,
}

/// Parameters for the `type_definition` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TypeDefinitionParams {
    /// Position to get type definition for.
    #[schemars(description = "Position in the file to get type definition for")]
    pub position: PositionParams,
}

/// A location in the source code with context.
/// Note: Currently unused - reserved for future structured JSON responses.
#[allow(dead_code)]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocationWithContext {
    /// Path to the file.
    pub file_path: String,
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed).
    pub column: u32,
    /// The source code line at this location.
    pub context: String,
    /// Additional context lines before.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_before: Option<Vec<String>>,
    /// Additional context lines after.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_after: Option<Vec<String>>,
}

/// A symbol with its location.
/// Note: Currently unused - reserved for future structured JSON responses.
#[allow(dead_code)]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    /// The symbol name.
    pub name: String,
    /// The kind of symbol (function, struct, trait, etc.).
    pub kind: String,
    /// Location of the symbol.
    pub location: LocationWithContext,
    /// Container name (e.g., the struct a method belongs to).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

/// Result of a hover operation.
/// Note: Currently unused - reserved for future structured JSON responses.
#[allow(dead_code)]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HoverResult {
    /// The type signature or declaration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Documentation for the symbol.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

/// Information about a call relationship.
/// Note: Currently unused - reserved for future structured JSON responses.
#[allow(dead_code)]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallInfo {
    /// The function making or receiving the call.
    pub function: SymbolInfo,
    /// Locations where the call occurs within the function.
    pub call_sites: Vec<LocationWithContext>,
}

/// Parameters for the `get_symbols_overview` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetSymbolsOverviewParams {
    /// Path to the file.
    #[schemars(description = "Absolute path to the source file to summarize")]
    pub file_path: String,
    /// How many levels of nesting to include.
    #[schemars(description = "Maximum nesting depth to include (omit for the full tree)")]
    pub max_depth: Option<usize>,
}

/// Parameters for the `find_symbol` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FindSymbolParams {
    /// Scope to search within: a file searches just that file, a directory
    /// searches every recognized source file under it, and omitting it
    /// searches the whole workspace.
    #[schemars(description = "Absolute path to a file or directory to search within (default: the whole workspace)")]
    pub within_path: Option<String>,
    /// The name-path pattern to resolve, e.g. `Foo/bar` or `*/on_click`.
    #[schemars(description = "Name-path pattern: literal, `*` wildcard, or `re:<pattern>` segments joined by `/`")]
    pub name_path: String,
    /// Restricts matches to symbols of these kinds. Only applied to the
    /// pattern's terminal (leaf) segment.
    #[serde(default)]
    #[schemars(description = "Restrict matches to these symbol kinds, e.g. [\"function\", \"method\"] (default: any kind)")]
    pub kinds: Vec<String>,
    /// When set, a literal name-path segment matches if it's contained in
    /// the symbol name rather than requiring an exact match.
    #[serde(default)]
    #[schemars(description = "Match literal name-path segments as a substring instead of exactly (default: false)")]
    pub substring_matching: bool,
    /// How many descendant levels of each match's children to include.
    #[schemars(description = "Levels of descendant children to include per match (default: none)")]
    pub depth: Option<usize>,
    /// Whether to include the symbol's full body text in the result.
    #[serde(default)]
    #[schemars(description = "Whether to include the symbol's body text (default: false)")]
    pub include_body: bool,
}

/// Parameters for the `find_referencing_symbols` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FindReferencingSymbolsParams {
    /// Path to the file the target symbol is defined in.
    #[schemars(description = "Absolute path to the source file the target symbol is defined in")]
    pub file_path: String,
    /// The name-path pattern identifying the target symbol.
    #[schemars(description = "Name-path pattern identifying the symbol to find references to")]
    pub name_path: String,
}

/// Parameters for the `search_for_pattern` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchForPatternParams {
    /// Root directory to search from.
    #[schemars(description = "Absolute path to the directory to search within")]
    pub root_path: String,
    /// Regex pattern to search for.
    #[schemars(description = "Regular expression to search for in file contents")]
    pub pattern: String,
    /// Glob patterns for files to include.
    #[serde(default)]
    #[schemars(description = "Glob patterns of files to include (default: all files)")]
    pub include_globs: Vec<String>,
    /// Glob patterns for files to exclude.
    #[serde(default)]
    #[schemars(description = "Glob patterns of files to exclude")]
    pub exclude_globs: Vec<String>,
}

/// Parameters for the `replace_symbol_body` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceSymbolBodyParams {
    /// Path to the file containing the symbol.
    #[schemars(description = "Absolute path to the source file containing the symbol")]
    pub file_path: String,
    /// Name-path pattern identifying the symbol to replace.
    #[schemars(description = "Name-path pattern identifying the symbol to replace")]
    pub name_path: String,
    /// The replacement source text.
    #[schemars(description = "New source text to replace the symbol's full body with")]
    pub new_body: String,
}

/// Parameters for the `insert_before_symbol` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InsertBeforeSymbolParams {
    /// Path to the file containing the symbol.
    #[schemars(description = "Absolute path to the source file containing the symbol")]
    pub file_path: String,
    /// Name-path pattern identifying the anchor symbol.
    #[schemars(description = "Name-path pattern identifying the symbol to insert before")]
    pub name_path: String,
    /// Text to insert.
    #[schemars(description = "Source text to insert immediately before the symbol")]
    pub text: String,
}

/// Parameters for the `insert_after_symbol` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InsertAfterSymbolParams {
    /// Path to the file containing the symbol.
    #[schemars(description = "Absolute path to the source file containing the symbol")]
    pub file_path: String,
    /// Name-path pattern identifying the anchor symbol.
    #[schemars(description = "Name-path pattern identifying the symbol to insert after")]
    pub name_path: String,
    /// Text to insert.
    #[schemars(description = "Source text to insert immediately after the symbol")]
    pub text: String,
}

/// Parameters for the `delete_symbol` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSymbolParams {
    /// Path to the file containing the symbol.
    #[schemars(description = "Absolute path to the source file containing the symbol")]
    pub file_path: String,
    /// Name-path pattern identifying the symbol to delete.
    #[schemars(description = "Name-path pattern identifying the symbol to delete")]
    pub name_path: String,
}

/// Parameters for the `rename_symbol` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenameSymbolParams {
    /// Position of the symbol to rename.
    #[schemars(description = "Position of the symbol to rename")]
    pub position: PositionParams,
    /// The new name.
    #[schemars(description = "The symbol's new name")]
    pub new_name: String,
}

/// Parameters for the `read_file` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadFileParams {
    /// Path to the file.
    #[schemars(description = "Absolute path to the file to read")]
    pub file_path: String,
    /// 1-indexed start line, inclusive.
    #[schemars(description = "1-indexed start line to read from (omit to read from the start)")]
    pub start_line: Option<u32>,
    /// 1-indexed end line, inclusive.
    #[schemars(description = "1-indexed end line to read to, inclusive (omit to read to the end)")]
    pub end_line: Option<u32>,
}

/// Parameters for the `create_text_file` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTextFileParams {
    /// Path to the file to create or overwrite.
    #[schemars(description = "Absolute path to the file to create or overwrite")]
    pub file_path: String,
    /// The file's full content.
    #[schemars(description = "Full text content to write")]
    pub content: String,
}

/// Parameters for the `list_dir` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListDirParams {
    /// Path to the directory.
    #[schemars(description = "Absolute path to the directory to list")]
    pub dir_path: String,
    /// Whether to recurse into subdirectories.
    #[serde(default)]
    #[schemars(description = "Whether to recurse into subdirectories (default: false)")]
    pub recursive: bool,
}

/// Parameters for the `find_file` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FindFileParams {
    /// Root directory to search from.
    #[schemars(description = "Absolute path to the directory to search within")]
    pub root_path: String,
    /// Glob pattern to match file names against.
    #[schemars(description = "Glob pattern to match file names against, e.g. `**/*.rs`")]
    pub glob: String,
}

/// One call within a `batch_execute_tools` request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchToolCall {
    /// The tool's name, matching one of this server's other `#[tool]`
    /// methods.
    #[schemars(description = "Name of the tool to call")]
    pub tool_name: String,
    /// The tool's parameters, as a JSON object.
    #[schemars(description = "Parameters for the tool call, matching that tool's own parameter shape")]
    pub tool_params: serde_json::Map<String, serde_json::Value>,
}

/// Parameters for the `batch_execute_tools` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchExecuteToolsParams {
    /// The calls to execute.
    #[schemars(description = "The tool calls to execute, dependency-ordered and run in parallel where possible")]
    pub calls: Vec<BatchToolCall>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_params_serialization() {
        let params = PositionParams {
            file_path: "/path/to/file.rs".to_string(),
            line: 10,
            column: 5,
        };
        let json = serde_json::to_string(&params).unwrap();
        assert!(json.contains("filePath"));
        assert!(json.contains("/path/to/file.rs"));
    }

    #[test]
    fn test_symbol_query_deserialization() {
        // Position query
        let json = r#"{"kind": "position", "data": { "filePath": "/path/to/file.rs", "line": 10, "column": 5} }"#;
        let query: SymbolQuery = serde_json::from_str(json).unwrap();
        assert!(matches!(query, SymbolQuery::Position(_)));

        // Name query
        let json = r#"{"kind": "name", "data": { "symbol": "MyStruct"} }"#;
        let query: SymbolQuery = serde_json::from_str(json).unwrap();
        assert!(matches!(query, SymbolQuery::Name { .. }));
    }
}
