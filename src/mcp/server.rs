//! MCP server implementation for kadabra-broker.
//!
//! This module contains the `BrokerServer` struct that implements the MCP server
//! with code navigation and structural editing tools powered by a polyglot
//! LSP router, a symbol cache, and a parallel batch executor.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use globset::{Glob, GlobSet, GlobSetBuilder};
use lsp_types::{DocumentSymbolResponse, GotoDefinitionResponse};
use regex::Regex;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::wrapper::Parameters,
    model::{
        CallToolResult, Content, ErrorCode, Implementation, ProtocolVersion, ServerCapabilities,
        ServerInfo,
    },
    tool, tool_handler, tool_router,
};
use serde::Serialize;
use serde_json::Value;
use walkdir::WalkDir;

use crate::cache::entry::CacheEntry;
use crate::cache::{CacheKey, Coalescer, PersistentCache, SessionCache};
use crate::error::{Error, ToolError};
use crate::exec::executor::is_fatal_default;
use crate::exec::{ExecutorOutcome, ParallelExecutor, ToolCall};
use crate::hooks::{HookContext, HookEvent, HookRegistry};
use crate::lsp::client::LspClient;
use crate::lsp::manager::LSPManager;
use crate::lsp::types::{from_lsp_position, symbol_kind_from_str, symbol_kind_to_string};
use crate::symbols::edit::{
    apply_workspace_edit, delete_symbol, insert_after_symbol, insert_before_symbol,
    replace_symbol_body, resolve_unique, write_atomic,
};
use crate::symbols::model::{Symbol, SymbolTree};
use crate::symbols::namepath::Pattern;
use crate::symbols::retriever::{containing_symbol, find_symbol, symbol_descendants, symbols_overview};

use super::tools::{
    BatchExecuteToolsParams, CreateTextFileParams, DeleteSymbolParams, DocumentSymbolsParams,
    FindFileParams, FindReferencesParams, FindReferencingSymbolsParams, FindSymbolParams,
    GetSymbolsOverviewParams, GotoDefinitionParams, HoverParams, ImplementationsParams,
    IncomingCallsParams, InsertAfterSymbolParams, InsertBeforeSymbolParams, ListDirParams,
    OutgoingCallsParams, ReadFileParams, RenameSymbolParams, ReplaceSymbolBodyParams,
    SearchForPatternParams, SymbolNameParams, SymbolQuery, TypeDefinitionParams,
    WorkspaceSymbolsParams,
};

const SESSION_CACHE_MAX_ENTRIES: usize = 500;
const SESSION_CACHE_MAX_BYTES: usize = 64 * 1024 * 1024;

/// Tools that mutate workspace files or LSP-tracked documents; gated by
/// [`ProjectPolicy::read_only`].
const WRITE_TOOLS: &[&str] = &[
    "replace_symbol_body",
    "insert_before_symbol",
    "insert_after_symbol",
    "delete_symbol",
    "rename_symbol",
    "create_text_file",
];

/// Per-project tool gating, derived from a [`ProjectDescriptor`](crate::project::descriptor::ProjectDescriptor).
#[derive(Debug, Default, Clone)]
struct ProjectPolicy {
    read_only: bool,
    excluded_tools: std::collections::HashSet<String>,
}

impl ProjectPolicy {
    fn check(&self, tool_name: &str) -> Result<(), Error> {
        if self.excluded_tools.contains(tool_name) {
            return Err(Error::Tool(ToolError::Disabled(tool_name.to_string())));
        }
        if self.read_only && WRITE_TOOLS.contains(&tool_name) {
            return Err(Error::Tool(ToolError::ReadOnly(tool_name.to_string())));
        }
        Ok(())
    }
}

/// MCP server for semantic code navigation and editing.
///
/// Routes file-scoped operations through a polyglot [`LSPManager`], caches
/// parsed symbol trees (session + on-disk + in-flight coalescing), and
/// executes `batch_execute_tools` requests through the dependency-aware
/// [`ParallelExecutor`].
#[derive(Clone)]
pub struct BrokerServer {
    /// Root directory of the workspace to navigate.
    workspace_root: PathBuf,
    /// Polyglot language server router.
    manager: Arc<LSPManager>,
    /// In-memory LRU of parsed symbol trees.
    tree_cache: Arc<SessionCache<SymbolTree>>,
    /// Debounced on-disk backing store for the same.
    persistent_cache: Arc<PersistentCache<SymbolTree>>,
    /// Coalesces concurrent symbol-tree parses for the same file.
    coalescer: Arc<Coalescer<CacheKey, SymbolTree>>,
    /// Dependency-aware parallel executor for `batch_execute_tools`.
    executor: Arc<ParallelExecutor>,
    /// Lifecycle hook registry, fired around every tool dispatch.
    hooks: Arc<HookRegistry>,
    /// Read-only/excluded-tools gating, derived from the project descriptor.
    policy: Arc<ProjectPolicy>,
    #[allow(dead_code)]
    tool_router: ToolRouter<BrokerServer>,
}

impl BrokerServer {
    /// Creates a new `BrokerServer` instance rooted at `workspace_root`,
    /// routing file operations through `manager`.
    ///
    /// ## Errors
    /// Returns [`Error::Cache`] if the on-disk symbol cache directory under
    /// `<workspace_root>/.kadabra-broker/cache` can't be created.
    pub fn new(workspace_root: PathBuf, manager: LSPManager) -> Result<Self, Error> {
        let cache_dir = workspace_root.join(".kadabra-broker").join("cache");
        Ok(Self {
            manager: Arc::new(manager),
            tree_cache: Arc::new(SessionCache::new(SESSION_CACHE_MAX_ENTRIES, SESSION_CACHE_MAX_BYTES)),
            persistent_cache: Arc::new(PersistentCache::new(cache_dir)?),
            coalescer: Arc::new(Coalescer::default()),
            executor: Arc::new(ParallelExecutor::with_defaults()),
            hooks: Arc::new(HookRegistry::new()),
            policy: Arc::new(ProjectPolicy::default()),
            workspace_root,
            tool_router: Self::tool_router(),
        })
    }

    /// Returns the workspace root path.
    pub fn workspace_root(&self) -> &PathBuf {
        &self.workspace_root
    }

    /// Exposes the hook registry so callers can register hooks before the
    /// server starts serving requests.
    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    /// Applies a project descriptor's `read_only`/`excluded_tools` policy
    /// to every subsequent tool dispatch.
    pub fn apply_project_descriptor(&mut self, descriptor: &crate::project::descriptor::ProjectDescriptor) {
        self.policy = Arc::new(ProjectPolicy {
            read_only: descriptor.read_only,
            excluded_tools: descriptor.excluded_tools.iter().cloned().collect(),
        });
    }

    async fn client_for(&self, path: &Path) -> Result<Arc<LspClient>, Error> {
        match self.manager.server_for_file(path).await {
            Some(Ok(client)) => Ok(client),
            Some(Err(e)) => Err(Error::Lsp(e)),
            None => Err(Error::Tool(ToolError::FileNotFound(format!(
                "no configured language server handles {}",
                path.display()
            )))),
        }
    }

    async fn read_source(path: &Path) -> Result<String, Error> {
        Ok(tokio::fs::read_to_string(path).await?)
    }

    async fn fetch_symbol_tree(manager: Arc<LSPManager>, path: PathBuf) -> Result<SymbolTree, Error> {
        let client = match manager.server_for_file(&path).await {
            Some(Ok(client)) => client,
            Some(Err(e)) => return Err(Error::Lsp(e)),
            None => {
                return Err(Error::Tool(ToolError::FileNotFound(format!(
                    "no configured language server handles {}",
                    path.display()
                ))))
            }
        };
        client.did_open(&path).await?;
        let response = client.document_symbols(&path).await?;
        Ok(SymbolTree::from_lsp(path, response))
    }

    /// Resolves a file's symbol tree, going session cache -> persistent
    /// cache -> coalesced LSP fetch, in that order, each checked against
    /// the file's current `(mtime_ns, size)` fingerprint.
    async fn symbol_tree(&self, path: &Path) -> Result<SymbolTree, Error> {
        let metadata = tokio::fs::metadata(path).await?;
        let fingerprint = (mtime_ns(&metadata), metadata.len());
        let key = CacheKey::new(path, "symbol_tree", "");

        if let Some(tree) = self.tree_cache.get(&key, fingerprint) {
            return Ok(tree);
        }
        if let Some(on_disk) = self.persistent_cache.get(&key).await {
            if on_disk.fingerprint == fingerprint {
                self.tree_cache.put(
                    key.clone(),
                    CacheEntry {
                        value: on_disk.value.clone(),
                        fingerprint,
                        bytes_estimate: estimate_bytes(&on_disk.value),
                    },
                );
                return Ok(on_disk.value);
            }
        }

        let manager = Arc::clone(&self.manager);
        let owned_path = path.to_path_buf();
        let tree = self
            .coalescer
            .get_or_compute(key.clone(), async move { Self::fetch_symbol_tree(manager, owned_path).await })
            .await?;

        let bytes = estimate_bytes(&tree);
        self.tree_cache.put(
            key.clone(),
            CacheEntry {
                value: tree.clone(),
                fingerprint,
                bytes_estimate: bytes,
            },
        );
        self.persistent_cache
            .put(
                key,
                CacheEntry {
                    value: tree.clone(),
                    fingerprint,
                    bytes_estimate: bytes,
                },
            )
            .await;
        Ok(tree)
    }

    /// Drops every cache entry (session, persistent, in-flight) derived
    /// from `path`. Called by every write tool after it touches disk.
    async fn invalidate_file(&self, path: &Path) {
        self.tree_cache.invalidate_prefix(path);
        let _ = self.persistent_cache.invalidate_prefix(path).await;
        let owned = path.to_path_buf();
        self.coalescer.invalidate(move |k: &CacheKey| k.file == owned).await;
    }

    /// Resolves a `SymbolQuery::Name` to a concrete file position: if the
    /// query carries a file path, resolves the name path against that
    /// file's symbol tree; otherwise falls back to a workspace-wide symbol
    /// search across every already-started language server.
    async fn resolve_symbol_name(&self, name: &SymbolNameParams) -> Result<(PathBuf, u32, u32), Error> {
        if let Some(file_path) = &name.file_path {
            let path = PathBuf::from(file_path);
            let tree = self.symbol_tree(&path).await?;
            let pattern = Pattern::parse(&name.symbol)?;
            let symbol = resolve_unique(&tree, &pattern, None)?;
            return Ok((path, symbol.selection_range.start_line, symbol.selection_range.start_column));
        }

        for client in self.manager.all_working().await {
            let Ok(symbols) = client.workspace_symbols(&name.symbol).await else {
                continue;
            };
            if let Some(found) = symbols.into_iter().find(|s| s.name == name.symbol) {
                let path = found.location.uri.to_file_path().map_err(|()| {
                    Error::Tool(ToolError::InvalidArguments(
                        "symbol location is not a file URI".to_string(),
                    ))
                })?;
                let (line, column) = from_lsp_position(found.location.range.start);
                return Ok((path, line, column));
            }
        }
        Err(Error::Tool(ToolError::NoSuchSymbol(name.symbol.clone())))
    }
}

fn mtime_ns(metadata: &std::fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

fn estimate_bytes(tree: &SymbolTree) -> usize {
    tree.walk().map(|s| s.name.len() + 64).sum::<usize>().max(64)
}

fn to_mcp_error(e: Error) -> McpError {
    match &e {
        Error::Tool(
            ToolError::InvalidArguments(_)
            | ToolError::NoSuchSymbol(_)
            | ToolError::Ambiguous { .. }
            | ToolError::FileNotFound(_),
        ) => McpError::new(ErrorCode::INVALID_PARAMS, e.to_string(), None),
        _ => McpError::new(ErrorCode::INTERNAL_ERROR, e.to_string(), None),
    }
}

fn build_glob_set(patterns: &[String]) -> Result<Option<GlobSet>, Error> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::Tool(ToolError::InvalidArguments(format!("invalid glob '{pattern}': {e}"))))?;
        builder.add(glob);
    }
    let set = builder
        .build()
        .map_err(|e| Error::Config(format!("failed to build glob set: {e}")))?;
    Ok(Some(set))
}

fn search_files(
    root: &Path,
    pattern: &Regex,
    include: Option<&GlobSet>,
    exclude: Option<&GlobSet>,
) -> Vec<(PathBuf, usize, String)> {
    let mut results = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if include.is_some_and(|set| !set.is_match(relative)) {
            continue;
        }
        if exclude.is_some_and(|set| set.is_match(relative)) {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(path) else {
            continue;
        };
        for (idx, line) in content.lines().enumerate() {
            if pattern.is_match(line) {
                results.push((path.to_path_buf(), idx + 1, line.to_string()));
            }
        }
    }
    results
}

// Helper functions for formatting LSP responses.
// Note: These are called by the #[tool_router] macro-generated code and by
// the `do_*` helpers below; the compiler's dead code analysis doesn't see
// through macros.

/// Reads context lines around a specific line in a file.
///
/// Returns a formatted string with line numbers and a marker for the target line.
fn read_context_lines(path: &Path, line: u32, context: usize) -> Result<String, std::io::Error> {
    let file_content = std::fs::read_to_string(path)?;
    let lines: Vec<_> = file_content.lines().collect();
    let line_idx = line.saturating_sub(1) as usize;

    let start = line_idx.saturating_sub(context);
    let end = (line_idx + context + 1).min(lines.len());

    let mut result = String::new();
    for (idx, line_text) in lines[start..end].iter().enumerate() {
        let line_num = start + idx + 1;
        let marker = if line_num == (line_idx + 1) { ">" } else { " " };
        let _ = writeln!(result, "{marker} {line_num:4} | {line_text}");
    }
    Ok(result)
}

/// Formats a single LSP location with source context.
fn format_location(loc: &lsp_types::Location, context_lines: usize) -> Result<String, Error> {
    let file_path = loc
        .uri
        .to_file_path()
        .map_err(|()| Error::Tool(ToolError::InvalidArguments("invalid file URI in LSP response".to_string())))?;

    let (line, column) = from_lsp_position(loc.range.start);
    let context = read_context_lines(&file_path, line, context_lines)?;

    Ok(format!("{}:{}:{}\n{}", file_path.display(), line, column, context))
}

/// Formats multiple LSP locations with context.
fn format_locations(locations: &[lsp_types::Location], context_lines: usize) -> Result<String, Error> {
    if locations.is_empty() {
        return Ok("No results found.".to_string());
    }
    let results: Result<Vec<String>, Error> =
        locations.iter().map(|loc| format_location(loc, context_lines)).collect();
    Ok(results?.join("\n\n---\n\n"))
}

/// Converts `GotoDefinitionResponse` to a list of locations.
fn goto_response_to_locations(response: GotoDefinitionResponse) -> Vec<lsp_types::Location> {
    match response {
        GotoDefinitionResponse::Scalar(loc) => vec![loc],
        GotoDefinitionResponse::Array(locs) => locs,
        GotoDefinitionResponse::Link(links) => links
            .into_iter()
            .map(|link| lsp_types::Location {
                uri: link.target_uri,
                range: link.target_range,
            })
            .collect(),
    }
}

/// Extracts markdown text from `MarkupContent` or string.
fn extract_hover_text(content: lsp_types::HoverContents) -> String {
    match content {
        lsp_types::HoverContents::Scalar(marked_string) => match marked_string {
            lsp_types::MarkedString::String(s) => s,
            lsp_types::MarkedString::LanguageString(ls) => {
                format!("```{}\n{}\n```", ls.language, ls.value)
            }
        },
        lsp_types::HoverContents::Array(marked_strings) => marked_strings
            .into_iter()
            .map(|ms| match ms {
                lsp_types::MarkedString::String(s) => s,
                lsp_types::MarkedString::LanguageString(ls) => {
                    format!("```{}\n{}\n```", ls.language, ls.value)
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
        lsp_types::HoverContents::Markup(markup) => markup.value,
    }
}

/// Formats document symbols recursively.
fn format_document_symbols(symbols: &[lsp_types::DocumentSymbol], indent: usize) -> String {
    let mut result = String::new();
    let indent_str = "  ".repeat(indent);

    for symbol in symbols {
        let kind = symbol_kind_to_string(symbol.kind);
        let (line, _) = from_lsp_position(symbol.selection_range.start);
        let _ = writeln!(result, "{indent_str}[{kind}] {} (line {line})", symbol.name);

        if let Some(children) = &symbol.children {
            result.push_str(&format_document_symbols(children, indent + 1));
        }
    }

    result
}

/// Formats flat symbol information.
fn format_symbol_information(symbols: &[lsp_types::SymbolInformation]) -> String {
    let mut result = String::new();

    for symbol in symbols {
        let kind = symbol_kind_to_string(symbol.kind);
        let file_path = symbol
            .location
            .uri
            .to_file_path()
            .map_or_else(|()| symbol.location.uri.to_string(), |p| p.display().to_string());
        let (line, _) = from_lsp_position(symbol.location.range.start);

        let container = symbol
            .container_name
            .as_ref()
            .map_or_else(Default::default, |c| format!(" (in {c})"));

        let _ = writeln!(result, "[{kind}] {}{container} - {file_path}:{line}", symbol.name);
    }

    result
}

impl BrokerServer {
    async fn do_goto_definition(&self, params: GotoDefinitionParams) -> Result<String, Error> {
        let (file_path, line, column) = match &params.query {
            SymbolQuery::Position(pos) => (PathBuf::from(&pos.file_path), pos.line, pos.column),
            SymbolQuery::Name(name) => self.resolve_symbol_name(name).await?,
        };
        let client = self.client_for(&file_path).await?;
        client.did_open(&file_path).await?;
        let response = client.goto_definition(&file_path, line, column).await?;
        format_locations(&goto_response_to_locations(response), 2)
    }

    async fn do_find_references(&self, params: FindReferencesParams) -> Result<String, Error> {
        let (file_path, line, column) = match &params.query {
            SymbolQuery::Position(pos) => (PathBuf::from(&pos.file_path), pos.line, pos.column),
            SymbolQuery::Name(name) => self.resolve_symbol_name(name).await?,
        };
        let client = self.client_for(&file_path).await?;
        client.did_open(&file_path).await?;
        let locations = client
            .find_references(&file_path, line, column, params.include_declaration)
            .await?;
        format_locations(&locations, 2)
    }

    async fn do_hover(&self, params: HoverParams) -> Result<String, Error> {
        let file_path = PathBuf::from(&params.position.file_path);
        let client = self.client_for(&file_path).await?;
        client.did_open(&file_path).await?;
        let hover_result = client.hover(&file_path, params.position.line, params.position.column).await?;
        Ok(match hover_result {
            Some(hover) => {
                let text = extract_hover_text(hover.contents);
                if text.is_empty() {
                    "No hover information available.".to_string()
                } else {
                    text
                }
            }
            None => "No hover information available.".to_string(),
        })
    }

    async fn do_document_symbols(&self, params: DocumentSymbolsParams) -> Result<String, Error> {
        let file_path = PathBuf::from(&params.file_path);
        let client = self.client_for(&file_path).await?;
        client.did_open(&file_path).await?;
        let response = client.document_symbols(&file_path).await?;
        Ok(match response {
            DocumentSymbolResponse::Flat(symbols) => {
                if symbols.is_empty() {
                    "No symbols found in document.".to_string()
                } else {
                    format_symbol_information(&symbols)
                }
            }
            DocumentSymbolResponse::Nested(symbols) => {
                if symbols.is_empty() {
                    "No symbols found in document.".to_string()
                } else {
                    format_document_symbols(&symbols, 0)
                }
            }
        })
    }

    /// Searches across every already-started language server (workspace
    /// symbols are only meaningful for languages whose server has seen at
    /// least one file, given lazy startup).
    async fn do_workspace_symbols(&self, params: WorkspaceSymbolsParams) -> Result<String, Error> {
        let mut all_symbols = Vec::new();
        for client in self.manager.all_working().await {
            if let Ok(symbols) = client.workspace_symbols(&params.query).await {
                all_symbols.extend(symbols);
            }
        }
        let limited: Vec<_> = all_symbols.into_iter().take(params.max_results as usize).collect();
        Ok(if limited.is_empty() {
            format!("No symbols found matching '{}'.", params.query)
        } else {
            format_symbol_information(&limited)
        })
    }

    async fn do_incoming_calls(&self, params: IncomingCallsParams) -> Result<String, Error> {
        let file_path = PathBuf::from(&params.position.file_path);
        let client = self.client_for(&file_path).await?;
        client.did_open(&file_path).await?;
        let calls = client
            .incoming_calls(&file_path, params.position.line, params.position.column)
            .await?;

        let mut formatted = String::new();
        if calls.is_empty() {
            formatted.push_str("No incoming calls found.");
        } else {
            for call in calls {
                let kind = symbol_kind_to_string(call.from.kind);
                let file_path = call
                    .from
                    .uri
                    .to_file_path()
                    .map_or_else(|()| call.from.uri.to_string(), |p| p.display().to_string());
                let (line, _) = from_lsp_position(call.from.selection_range.start);
                let _ = writeln!(formatted, "\n[{kind}] {} - {file_path}:{line}", call.from.name);
                for range in &call.from_ranges {
                    let (call_line, call_col) = from_lsp_position(range.start);
                    let _ = writeln!(formatted, "  Call site: line {call_line}, column {call_col}");
                }
            }
        }
        Ok(formatted)
    }

    async fn do_outgoing_calls(&self, params: OutgoingCallsParams) -> Result<String, Error> {
        let file_path = PathBuf::from(&params.position.file_path);
        let client = self.client_for(&file_path).await?;
        client.did_open(&file_path).await?;
        let calls = client
            .outgoing_calls(&file_path, params.position.line, params.position.column)
            .await?;

        let mut formatted = String::new();
        if calls.is_empty() {
            formatted.push_str("No outgoing calls found.");
        } else {
            for call in calls {
                let kind = symbol_kind_to_string(call.to.kind);
                let file_path = call
                    .to
                    .uri
                    .to_file_path()
                    .map_or_else(|()| call.to.uri.to_string(), |p| p.display().to_string());
                let (line, _) = from_lsp_position(call.to.selection_range.start);
                let _ = writeln!(formatted, "\n[{kind}] {} - {file_path}:{line}", call.to.name);
                for range in &call.from_ranges {
                    let (call_line, call_col) = from_lsp_position(range.start);
                    let _ = writeln!(formatted, "  Call site: line {call_line}, column {call_col}");
                }
            }
        }
        Ok(formatted)
    }

    async fn do_implementations(&self, params: ImplementationsParams) -> Result<String, Error> {
        let (file_path, line, column) = match &params.query {
            SymbolQuery::Position(pos) => (PathBuf::from(&pos.file_path), pos.line, pos.column),
            SymbolQuery::Name(name) => self.resolve_symbol_name(name).await?,
        };
        let client = self.client_for(&file_path).await?;
        client.did_open(&file_path).await?;
        let response = client.implementations(&file_path, line, column).await?;
        format_locations(&goto_response_to_locations(response), 2)
    }

    async fn do_type_definition(&self, params: TypeDefinitionParams) -> Result<String, Error> {
        let file_path = PathBuf::from(&params.position.file_path);
        let client = self.client_for(&file_path).await?;
        client.did_open(&file_path).await?;
        let response = client
            .type_definition(&file_path, params.position.line, params.position.column)
            .await?;
        format_locations(&goto_response_to_locations(response), 2)
    }

    async fn do_get_symbols_overview(&self, params: GetSymbolsOverviewParams) -> Result<String, Error> {
        let path = PathBuf::from(&params.file_path);
        let tree = self.symbol_tree(&path).await?;
        let overview = symbols_overview(&tree, params.max_depth);
        if overview.is_empty() {
            return Ok("No symbols found in document.".to_string());
        }
        let mut out = String::new();
        for entry in overview {
            let indent = "  ".repeat(entry.depth);
            let kind = symbol_kind_to_string(entry.kind);
            let _ = writeln!(out, "{indent}[{kind}] {} (line {})", entry.name_path, entry.line);
        }
        Ok(out)
    }

    /// Resolves a `find_symbol` scope path to the set of files to search:
    /// the file itself if `within_path` names one, every recognized source
    /// file under it if it's a directory, or every recognized source file
    /// under the workspace root if absent.
    async fn resolve_find_symbol_scope(&self, within_path: Option<&str>) -> Result<Vec<PathBuf>, Error> {
        let root = within_path.map(PathBuf::from).unwrap_or_else(|| self.workspace_root.clone());
        let metadata = tokio::fs::metadata(&root).await?;
        if metadata.is_file() {
            return Ok(vec![root]);
        }
        let manager = Arc::clone(&self.manager);
        tokio::task::spawn_blocking(move || {
            WalkDir::new(&root)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.path().to_path_buf())
                .filter(|path| manager.language_for_file(path).is_some())
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| Error::Config(e.to_string()))
    }

    async fn do_find_symbol(&self, params: FindSymbolParams) -> Result<String, Error> {
        let pattern = Pattern::parse(&params.name_path)?;
        let kinds = params
            .kinds
            .iter()
            .map(|name| {
                symbol_kind_from_str(name)
                    .ok_or_else(|| Error::Tool(ToolError::InvalidArguments(format!("unknown symbol kind '{name}'"))))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        let kinds = if kinds.is_empty() { None } else { Some(kinds) };

        let paths = self.resolve_find_symbol_scope(params.within_path.as_deref()).await?;
        let mut trees: Vec<(PathBuf, SymbolTree)> = Vec::with_capacity(paths.len());
        for path in paths {
            if let Ok(tree) = self.symbol_tree(&path).await {
                trees.push((path, tree));
            }
        }

        let mut matches: Vec<(&PathBuf, &Symbol)> = Vec::new();
        for (path, tree) in &trees {
            matches.extend(find_symbol(tree, &pattern, kinds.as_deref(), params.substring_matching).into_iter().map(|s| (path, s)));
        }
        matches.sort_by(|(pa, sa), (pb, sb)| {
            (pa.as_path(), sa.range.start_line, sa.selection_range.start_column)
                .cmp(&(pb.as_path(), sb.range.start_line, sb.selection_range.start_column))
        });

        if matches.is_empty() {
            return Ok(format!("No symbol matches '{}'.", params.name_path));
        }

        let mut sources: std::collections::HashMap<PathBuf, String> = std::collections::HashMap::new();
        let mut out = String::new();
        for (path, symbol) in matches {
            let kind = symbol_kind_to_string(symbol.kind);
            let _ = writeln!(
                out,
                "[{kind}] {} - {}:{}",
                symbol.name_path(),
                path.display(),
                symbol.range.start_line
            );
            if params.include_body {
                if !sources.contains_key(path.as_path()) {
                    let source = Self::read_source(path).await?;
                    sources.insert(path.clone(), source);
                }
                let source = &sources[path.as_path()];
                let _ = writeln!(out, "{}", crate::symbols::retriever::symbol_body(source, symbol));
            }
            if let Some(depth) = params.depth {
                for child in symbol_descendants(symbol, depth) {
                    let indent = "  ".repeat(child.depth + 1);
                    let child_kind = symbol_kind_to_string(child.kind);
                    let _ = writeln!(out, "{indent}[{child_kind}] {} (line {})", child.name_path, child.line);
                }
            }
            out.push_str("---\n");
        }
        Ok(out)
    }

    async fn do_find_referencing_symbols(&self, params: FindReferencingSymbolsParams) -> Result<String, Error> {
        let path = PathBuf::from(&params.file_path);
        let tree = self.symbol_tree(&path).await?;
        let pattern = Pattern::parse(&params.name_path)?;
        let symbol = resolve_unique(&tree, &pattern, None)?;
        let (line, column) = (symbol.selection_range.start_line, symbol.selection_range.start_column);

        let client = self.client_for(&path).await?;
        client.did_open(&path).await?;
        let locations = client.find_references(&path, line, column, false).await?;

        if locations.is_empty() {
            return Ok(format!("No references to '{}' found.", params.name_path));
        }

        let mut out = String::new();
        for location in &locations {
            let Ok(ref_path) = location.uri.to_file_path() else {
                continue;
            };
            let (ref_line, _) = from_lsp_position(location.range.start);
            let containing = match self.symbol_tree(&ref_path).await {
                Ok(ref_tree) => containing_symbol(&ref_tree, ref_line).map(|s| s.name_path()),
                Err(_) => None,
            };
            match containing {
                Some(name_path) => {
                    let _ = writeln!(out, "{name_path} - {}:{ref_line}", ref_path.display());
                }
                None => {
                    let _ = writeln!(out, "{}:{ref_line}", ref_path.display());
                }
            }
        }
        Ok(out)
    }

    async fn do_search_for_pattern(&self, params: SearchForPatternParams) -> Result<String, Error> {
        let root = PathBuf::from(&params.root_path);
        let pattern = Regex::new(&params.pattern)
            .map_err(|e| Error::Tool(ToolError::InvalidArguments(format!("invalid regex: {e}"))))?;
        let include = build_glob_set(&params.include_globs)?;
        let exclude = build_glob_set(&params.exclude_globs)?;

        let matches = tokio::task::spawn_blocking(move || search_files(&root, &pattern, include.as_ref(), exclude.as_ref()))
            .await
            .map_err(|e| Error::Config(e.to_string()))?;

        if matches.is_empty() {
            return Ok("No matches found.".to_string());
        }
        let mut out = String::new();
        for (path, line_no, line_text) in matches {
            let _ = writeln!(out, "{}:{line_no}: {}", path.display(), line_text.trim_end());
        }
        Ok(out)
    }

    async fn do_replace_symbol_body(&self, params: ReplaceSymbolBodyParams) -> Result<String, Error> {
        let path = PathBuf::from(&params.file_path);
        let tree = self.symbol_tree(&path).await?;
        let pattern = Pattern::parse(&params.name_path)?;
        let symbol = resolve_unique(&tree, &pattern, None)?;
        let source = Self::read_source(&path).await?;
        let updated = replace_symbol_body(&source, symbol, &params.new_body);
        write_atomic(&path, &updated).await?;
        self.invalidate_file(&path).await;
        if let Ok(client) = self.client_for(&path).await {
            let _ = client.did_change(&path, &updated).await;
        }
        Ok(format!("Replaced body of '{}' in {}.", params.name_path, path.display()))
    }

    async fn do_insert_before_symbol(&self, params: InsertBeforeSymbolParams) -> Result<String, Error> {
        let path = PathBuf::from(&params.file_path);
        let tree = self.symbol_tree(&path).await?;
        let pattern = Pattern::parse(&params.name_path)?;
        let symbol = resolve_unique(&tree, &pattern, None)?;
        let source = Self::read_source(&path).await?;
        let updated = insert_before_symbol(&source, symbol, &params.text);
        write_atomic(&path, &updated).await?;
        self.invalidate_file(&path).await;
        if let Ok(client) = self.client_for(&path).await {
            let _ = client.did_change(&path, &updated).await;
        }
        Ok(format!("Inserted text before '{}' in {}.", params.name_path, path.display()))
    }

    async fn do_insert_after_symbol(&self, params: InsertAfterSymbolParams) -> Result<String, Error> {
        let path = PathBuf::from(&params.file_path);
        let tree = self.symbol_tree(&path).await?;
        let pattern = Pattern::parse(&params.name_path)?;
        let symbol = resolve_unique(&tree, &pattern, None)?;
        let source = Self::read_source(&path).await?;
        let updated = insert_after_symbol(&source, symbol, &params.text);
        write_atomic(&path, &updated).await?;
        self.invalidate_file(&path).await;
        if let Ok(client) = self.client_for(&path).await {
            let _ = client.did_change(&path, &updated).await;
        }
        Ok(format!("Inserted text after '{}' in {}.", params.name_path, path.display()))
    }

    async fn do_delete_symbol(&self, params: DeleteSymbolParams) -> Result<String, Error> {
        let path = PathBuf::from(&params.file_path);
        let tree = self.symbol_tree(&path).await?;
        let pattern = Pattern::parse(&params.name_path)?;
        let symbol = resolve_unique(&tree, &pattern, None)?;
        let source = Self::read_source(&path).await?;
        let updated = delete_symbol(&source, symbol);
        write_atomic(&path, &updated).await?;
        self.invalidate_file(&path).await;
        if let Ok(client) = self.client_for(&path).await {
            let _ = client.did_change(&path, &updated).await;
        }
        Ok(format!("Deleted '{}' from {}.", params.name_path, path.display()))
    }

    async fn do_rename_symbol(&self, params: RenameSymbolParams) -> Result<String, Error> {
        let path = PathBuf::from(&params.position.file_path);
        let (line, column) = (params.position.line, params.position.column);
        let client = self.client_for(&path).await?;
        client.did_open(&path).await?;

        let edit = client
            .rename_symbol(&path, line, column, &params.new_name)
            .await?
            .ok_or_else(|| {
                Error::Tool(ToolError::ExecutionFailed(
                    "language server returned no workspace edit for this rename".to_string(),
                ))
            })?;

        let touched = apply_workspace_edit(&edit).await?;
        for file in &touched {
            self.invalidate_file(file).await;
        }
        client
            .notify_applied_edit(Some(&format!("rename to {}", params.new_name)))
            .await?;

        Ok(format!(
            "Renamed symbol to '{}' across {} file(s): {}",
            params.new_name,
            touched.len(),
            touched.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
        ))
    }

    async fn do_read_file(&self, params: ReadFileParams) -> Result<String, Error> {
        let path = PathBuf::from(&params.file_path);
        let content = Self::read_source(&path).await?;
        match (params.start_line, params.end_line) {
            (None, None) => Ok(content),
            (start, end) => {
                let lines: Vec<&str> = content.lines().collect();
                let start_idx = start.map(|l| l.saturating_sub(1) as usize).unwrap_or(0);
                let end_idx = end.map(|l| l as usize).unwrap_or(lines.len()).min(lines.len());
                if start_idx >= end_idx {
                    return Ok(String::new());
                }
                Ok(lines[start_idx..end_idx].join("\n"))
            }
        }
    }

    async fn do_create_text_file(&self, params: CreateTextFileParams) -> Result<String, Error> {
        let path = PathBuf::from(&params.file_path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        write_atomic(&path, &params.content).await?;
        self.invalidate_file(&path).await;
        Ok(format!("Wrote {} bytes to {}.", params.content.len(), path.display()))
    }

    async fn do_list_dir(&self, params: ListDirParams) -> Result<String, Error> {
        let root = PathBuf::from(&params.dir_path);
        let recursive = params.recursive;
        let entries = tokio::task::spawn_blocking(move || {
            let max_depth = if recursive { usize::MAX } else { 1 };
            WalkDir::new(&root)
                .max_depth(max_depth)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.path() != root)
                .map(|e| {
                    let kind = if e.file_type().is_dir() { "dir" } else { "file" };
                    format!("[{kind}] {}", e.path().display())
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| Error::Config(e.to_string()))?;

        Ok(if entries.is_empty() {
            "Directory is empty.".to_string()
        } else {
            entries.join("\n")
        })
    }

    async fn do_find_file(&self, params: FindFileParams) -> Result<String, Error> {
        let root = PathBuf::from(&params.root_path);
        let glob = Glob::new(&params.glob)
            .map_err(|e| Error::Tool(ToolError::InvalidArguments(format!("invalid glob '{}': {e}", params.glob))))?
            .compile_matcher();

        let matches = tokio::task::spawn_blocking(move || {
            WalkDir::new(&root)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .filter(|e| {
                    let relative = e.path().strip_prefix(&root).unwrap_or(e.path());
                    glob.is_match(relative)
                })
                .map(|e| e.path().display().to_string())
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| Error::Config(e.to_string()))?;

        Ok(if matches.is_empty() {
            format!("No files matched '{}'.", params.glob)
        } else {
            matches.join("\n")
        })
    }

    /// Single choke point every tool call (direct or via
    /// `batch_execute_tools`) runs through: fires before/after hooks, then
    /// dispatches by name to the matching `do_*` implementation.
    async fn dispatch_tool(&self, name: &str, params: serde_json::Map<String, Value>) -> Result<Value, Error> {
        self.policy.check(name)?;

        let mut before = HookContext::new();
        before.data.insert("tool_name".to_string(), Value::String(name.to_string()));
        before.data.insert("params".to_string(), Value::Object(params.clone()));
        self.hooks.trigger(HookEvent::ToolBeforeExecute, before);

        let value = Value::Object(params);
        macro_rules! dispatch {
            ($method:ident, $params_ty:ty) => {{
                let parsed: $params_ty = serde_json::from_value(value)
                    .map_err(|e| Error::Tool(ToolError::InvalidArguments(e.to_string())))?;
                self.$method(parsed).await.map(Value::String)
            }};
        }
        let result: Result<Value, Error> = match name {
            "goto_definition" => dispatch!(do_goto_definition, GotoDefinitionParams),
            "find_references" => dispatch!(do_find_references, FindReferencesParams),
            "hover" => dispatch!(do_hover, HoverParams),
            "document_symbols" => dispatch!(do_document_symbols, DocumentSymbolsParams),
            "workspace_symbols" => dispatch!(do_workspace_symbols, WorkspaceSymbolsParams),
            "incoming_calls" => dispatch!(do_incoming_calls, IncomingCallsParams),
            "outgoing_calls" => dispatch!(do_outgoing_calls, OutgoingCallsParams),
            "implementations" => dispatch!(do_implementations, ImplementationsParams),
            "type_definition" => dispatch!(do_type_definition, TypeDefinitionParams),
            "get_symbols_overview" => dispatch!(do_get_symbols_overview, GetSymbolsOverviewParams),
            "find_symbol" => dispatch!(do_find_symbol, FindSymbolParams),
            "find_referencing_symbols" => dispatch!(do_find_referencing_symbols, FindReferencingSymbolsParams),
            "search_for_pattern" => dispatch!(do_search_for_pattern, SearchForPatternParams),
            "replace_symbol_body" => dispatch!(do_replace_symbol_body, ReplaceSymbolBodyParams),
            "insert_before_symbol" => dispatch!(do_insert_before_symbol, InsertBeforeSymbolParams),
            "insert_after_symbol" => dispatch!(do_insert_after_symbol, InsertAfterSymbolParams),
            "delete_symbol" => dispatch!(do_delete_symbol, DeleteSymbolParams),
            "rename_symbol" => dispatch!(do_rename_symbol, RenameSymbolParams),
            "read_file" => dispatch!(do_read_file, ReadFileParams),
            "create_text_file" => dispatch!(do_create_text_file, CreateTextFileParams),
            "list_dir" => dispatch!(do_list_dir, ListDirParams),
            "find_file" => dispatch!(do_find_file, FindFileParams),
            other => Err(Error::Tool(ToolError::NotFound(other.to_string()))),
        };

        let mut after = HookContext::new();
        after.data.insert("tool_name".to_string(), Value::String(name.to_string()));
        after.data.insert("ok".to_string(), Value::Bool(result.is_ok()));
        self.hooks.trigger(HookEvent::ToolAfterExecute, after);

        result
    }

    /// Serializes `params`, dispatches through `dispatch_tool`, and wraps
    /// the result as an MCP tool response. Shared by every `#[tool]`
    /// method so that hook firing and error mapping stay in one place.
    async fn invoke<P: Serialize>(&self, name: &str, params: P) -> Result<CallToolResult, McpError> {
        let value = serde_json::to_value(params)
            .map_err(|e| McpError::new(ErrorCode::INVALID_PARAMS, e.to_string(), None))?;
        let map = match value {
            Value::Object(m) => m,
            _ => serde_json::Map::new(),
        };
        let result = self.dispatch_tool(name, map).await.map_err(to_mcp_error)?;
        let text = match result {
            Value::String(s) => s,
            other => other.to_string(),
        };
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

/// Tool implementations for `BrokerServer`.
#[tool_router]
impl BrokerServer {
    /// Jump to the definition of a symbol at a given position or by name.
    #[tool(
        description = "Jump to where a symbol is defined. Essential for tracing imports and understanding implementations."
    )]
    async fn goto_definition(&self, Parameters(params): Parameters<GotoDefinitionParams>) -> Result<CallToolResult, McpError> {
        self.invoke("goto_definition", params).await
    }

    /// Find all references to a symbol in the workspace.
    #[tool(
        description = "Find all usages of a symbol. Reveals dependencies, call sites, and impact of changes."
    )]
    async fn find_references(&self, Parameters(params): Parameters<FindReferencesParams>) -> Result<CallToolResult, McpError> {
        self.invoke("find_references", params).await
    }

    /// Get type information and documentation for a symbol.
    #[tool(
        description = "Get type signature and docs. Quick way to understand what something is without navigating away."
    )]
    async fn hover(&self, Parameters(params): Parameters<HoverParams>) -> Result<CallToolResult, McpError> {
        self.invoke("hover", params).await
    }

    /// List all symbols defined in a file.
    #[tool(
        description = "List all symbols in a file. Get a structural overview: functions, types, constants, etc."
    )]
    async fn document_symbols(&self, Parameters(params): Parameters<DocumentSymbolsParams>) -> Result<CallToolResult, McpError> {
        self.invoke("document_symbols", params).await
    }

    /// Search for symbols across the entire workspace.
    #[tool(
        description = "Search symbols by name across the workspace. Find types, functions, or modules without knowing their location."
    )]
    async fn workspace_symbols(&self, Parameters(params): Parameters<WorkspaceSymbolsParams>) -> Result<CallToolResult, McpError> {
        self.invoke("workspace_symbols", params).await
    }

    /// Find all functions that call the function at the given position.
    #[tool(
        description = "Find callers of a function. Build upward call graphs, trace who depends on this code."
    )]
    async fn incoming_calls(&self, Parameters(params): Parameters<IncomingCallsParams>) -> Result<CallToolResult, McpError> {
        self.invoke("incoming_calls", params).await
    }

    /// Find all functions called by the function at the given position.
    #[tool(
        description = "Find callees of a function. Build downward call graphs, trace execution flow."
    )]
    async fn outgoing_calls(&self, Parameters(params): Parameters<OutgoingCallsParams>) -> Result<CallToolResult, McpError> {
        self.invoke("outgoing_calls", params).await
    }

    /// Find all implementations of a trait or interface.
    #[tool(
        description = "Find trait/interface implementations. Discover concrete types, understand polymorphism."
    )]
    async fn implementations(&self, Parameters(params): Parameters<ImplementationsParams>) -> Result<CallToolResult, McpError> {
        self.invoke("implementations", params).await
    }

    /// Jump to the type definition of a symbol.
    #[tool(
        description = "Jump to a symbol's type definition. Understand what type a variable or expression has."
    )]
    async fn type_definition(&self, Parameters(params): Parameters<TypeDefinitionParams>) -> Result<CallToolResult, McpError> {
        self.invoke("type_definition", params).await
    }

    /// Summarize a file's symbol structure without reading the whole file.
    #[tool(
        description = "Get a structural overview of a file's symbols (name, kind, line, nesting depth) without reading the whole file."
    )]
    async fn get_symbols_overview(&self, Parameters(params): Parameters<GetSymbolsOverviewParams>) -> Result<CallToolResult, McpError> {
        self.invoke("get_symbols_overview", params).await
    }

    /// Find symbols in a file by name path, optionally with their body text.
    #[tool(
        description = "Find symbols in a file by name-path pattern (literal, `*` wildcard, or `re:` regex segments), optionally including body text."
    )]
    async fn find_symbol(&self, Parameters(params): Parameters<FindSymbolParams>) -> Result<CallToolResult, McpError> {
        self.invoke("find_symbol", params).await
    }

    /// Find symbols that reference a given symbol, grouped by enclosing symbol.
    #[tool(
        description = "Find every symbol that references the target symbol, reporting each reference's enclosing symbol rather than just a raw location."
    )]
    async fn find_referencing_symbols(
        &self,
        Parameters(params): Parameters<FindReferencingSymbolsParams>,
    ) -> Result<CallToolResult, McpError> {
        self.invoke("find_referencing_symbols", params).await
    }

    /// Search file contents by regex, with include/exclude glob filters.
    #[tool(
        description = "Search file contents by regular expression under a directory, with optional include/exclude glob filters."
    )]
    async fn search_for_pattern(&self, Parameters(params): Parameters<SearchForPatternParams>) -> Result<CallToolResult, McpError> {
        self.invoke("search_for_pattern", params).await
    }

    /// Replace a symbol's full body with new source text.
    #[tool(description = "Replace a symbol's full body (by name path) with new source text.")]
    async fn replace_symbol_body(&self, Parameters(params): Parameters<ReplaceSymbolBodyParams>) -> Result<CallToolResult, McpError> {
        self.invoke("replace_symbol_body", params).await
    }

    /// Insert text immediately before a symbol.
    #[tool(description = "Insert text immediately before a symbol's range (by name path).")]
    async fn insert_before_symbol(
        &self,
        Parameters(params): Parameters<InsertBeforeSymbolParams>,
    ) -> Result<CallToolResult, McpError> {
        self.invoke("insert_before_symbol", params).await
    }

    /// Insert text immediately after a symbol.
    #[tool(description = "Insert text immediately after a symbol's range (by name path).")]
    async fn insert_after_symbol(
        &self,
        Parameters(params): Parameters<InsertAfterSymbolParams>,
    ) -> Result<CallToolResult, McpError> {
        self.invoke("insert_after_symbol", params).await
    }

    /// Delete a symbol's full range from its file.
    #[tool(description = "Delete a symbol's full range (by name path) from its file.")]
    async fn delete_symbol(&self, Parameters(params): Parameters<DeleteSymbolParams>) -> Result<CallToolResult, McpError> {
        self.invoke("delete_symbol", params).await
    }

    /// Rename a symbol across the workspace via the language server.
    #[tool(
        description = "Rename the symbol at a position across the whole workspace, via the language server's own rename support."
    )]
    async fn rename_symbol(&self, Parameters(params): Parameters<RenameSymbolParams>) -> Result<CallToolResult, McpError> {
        self.invoke("rename_symbol", params).await
    }

    /// Read a file's contents, optionally bounded to a line range.
    #[tool(description = "Read a file's contents, optionally bounded to a 1-indexed, inclusive line range.")]
    async fn read_file(&self, Parameters(params): Parameters<ReadFileParams>) -> Result<CallToolResult, McpError> {
        self.invoke("read_file", params).await
    }

    /// Create or overwrite a text file.
    #[tool(description = "Create a new text file or overwrite an existing one with the given content.")]
    async fn create_text_file(&self, Parameters(params): Parameters<CreateTextFileParams>) -> Result<CallToolResult, McpError> {
        self.invoke("create_text_file", params).await
    }

    /// List a directory's contents, optionally recursively.
    #[tool(description = "List a directory's entries, optionally recursing into subdirectories.")]
    async fn list_dir(&self, Parameters(params): Parameters<ListDirParams>) -> Result<CallToolResult, McpError> {
        self.invoke("list_dir", params).await
    }

    /// Find files under a directory by glob pattern.
    #[tool(description = "Find files under a directory whose relative path matches a glob pattern.")]
    async fn find_file(&self, Parameters(params): Parameters<FindFileParams>) -> Result<CallToolResult, McpError> {
        self.invoke("find_file", params).await
    }

    /// Execute a batch of tool calls, dependency-ordered and run in
    /// parallel where possible.
    #[tool(
        description = "Execute multiple tool calls as one batch: independent calls run in parallel, calls touching the same file are ordered so writes never race reads."
    )]
    async fn batch_execute_tools(
        &self,
        Parameters(params): Parameters<BatchExecuteToolsParams>,
    ) -> Result<CallToolResult, McpError> {
        let calls: Vec<ToolCall> = params
            .calls
            .into_iter()
            .enumerate()
            .map(|(index, c)| ToolCall {
                name: c.tool_name,
                params: c.tool_params,
                index,
            })
            .collect();

        let this = self.clone();
        let outcome = self
            .executor
            .execute(calls, is_fatal_default, move |call| {
                let this = this.clone();
                async move { this.dispatch_tool(&call.name, call.params).await }
            })
            .await;

        let (results, early_stop) = match outcome {
            ExecutorOutcome::Completed(results) => (results, None),
            ExecutorOutcome::Partial { completed, error } => (completed, Some(error.to_string())),
        };

        let mut out = String::new();
        for result in results {
            match result.value {
                Ok(value) => {
                    let _ = writeln!(out, "[{}] ok: {value}", result.index);
                }
                Err(e) => {
                    let _ = writeln!(out, "[{}] error: {e}", result.index);
                }
            }
        }
        if let Some(reason) = early_stop {
            let _ = writeln!(out, "\nexecution stopped early: {reason}");
        }

        Ok(CallToolResult::success(vec![Content::text(out)]))
    }
}

#[tool_handler]
impl ServerHandler for BrokerServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "kadabra-broker".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Semantic code intelligence and structural editing via LSP, across Rust, Python, \
                 JavaScript, TypeScript, Go, C, C++, and Java in the same workspace. Enables: reverse \
                 engineering unfamiliar code, building call graphs, tracing dependencies, symbol-level \
                 reads and edits by name path, workspace-wide renames, and batched parallel tool \
                 execution."
                    .into(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_glob_set_empty_is_none() {
        assert!(build_glob_set(&[]).unwrap().is_none());
    }

    #[test]
    fn test_build_glob_set_rejects_invalid_pattern() {
        let result = build_glob_set(&["[invalid".to_string()]);
        assert!(result.is_err());
    }

    #[test]
    fn test_search_files_matches_pattern_in_included_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn marker() {}\n").unwrap();
        std::fs::write(dir.path().join("b.txt"), "marker\n").unwrap();

        let include = build_glob_set(&["*.rs".to_string()]).unwrap();
        let pattern = Regex::new("marker").unwrap();
        let matches = search_files(dir.path(), &pattern, include.as_ref(), None);
        assert_eq!(matches.len(), 1);
        assert!(matches[0].0.ends_with("a.rs"));
    }

    #[test]
    fn test_to_mcp_error_maps_invalid_arguments_to_invalid_params() {
        let err = to_mcp_error(Error::Tool(ToolError::InvalidArguments("bad".to_string())));
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }

    #[test]
    fn test_project_policy_blocks_write_tools_when_read_only() {
        let policy = ProjectPolicy {
            read_only: true,
            excluded_tools: Default::default(),
        };
        assert!(matches!(
            policy.check("rename_symbol"),
            Err(Error::Tool(ToolError::ReadOnly(_)))
        ));
        assert!(policy.check("read_file").is_ok());
    }

    #[test]
    fn test_project_policy_blocks_excluded_tools() {
        let policy = ProjectPolicy {
            read_only: false,
            excluded_tools: ["find_referencing_symbols".to_string()].into_iter().collect(),
        };
        assert!(matches!(
            policy.check("find_referencing_symbols"),
            Err(Error::Tool(ToolError::Disabled(_)))
        ));
        assert!(policy.check("find_symbol").is_ok());
    }
}
