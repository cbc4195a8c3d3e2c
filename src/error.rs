//! Error types for the kadabra-broker MCP server.
//!
//! This module defines all error types used throughout the application,
//! organized by subsystem: LSP, MCP, Transport, and Tools.
//!
//! Note: Error variants defined for comprehensive error handling and future use.

// Allow dead code warnings - error types are for comprehensive coverage
#![allow(dead_code)]

use thiserror::Error;

/// Errors related to LSP client operations.
#[derive(Debug, Error)]
pub enum LspError {
    /// The language server process failed to start.
    #[error("failed to start language server: {0}")]
    ServerStartFailed(String),

    /// The language server process exited unexpectedly.
    #[error("language server exited unexpectedly: {0}")]
    ServerExited(String),

    /// Failed to initialize the language server.
    #[error("language server initialization failed: {0}")]
    InitializationFailed(String),

    /// The language server returned an error response.
    #[error("language server error: {message} (code: {code})")]
    ServerError {
        /// The error code from the language server.
        code: i32,
        /// The error message from the language server.
        message: String,
    },

    /// A request to the language server timed out.
    #[error("language server request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The language server is not initialized.
    #[error("language server not initialized")]
    NotInitialized,

    /// Failed to send a request to the language server.
    #[error("failed to send request to language server: {0}")]
    RequestFailed(String),

    /// Failed to parse the response from the language server.
    #[error("failed to parse language server response: {0}")]
    ParseError(String),

    /// The requested capability is not supported by the language server.
    #[error("capability not supported: {0}")]
    CapabilityNotSupported(String),

    /// Invalid position in document.
    #[error("invalid position: line {line}, column {column}")]
    InvalidPosition {
        /// The line number.
        line: u32,
        /// The column number.
        column: u32,
    },

    /// Document not found or not open.
    #[error("document not found: {0}")]
    DocumentNotFound(String),
}

/// Errors related to MCP server operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// Failed to parse an MCP request.
    #[error("failed to parse MCP request: {0}")]
    ParseError(String),

    /// The requested method is not supported.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// Invalid parameters in the request.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// Internal server error during request processing.
    #[error("internal error: {0}")]
    InternalError(String),

    /// The server is shutting down.
    #[error("server is shutting down")]
    ShuttingDown,

    /// Tool execution failed.
    #[error("tool error: {0}")]
    ToolError(#[from] ToolError),

    /// Protocol version mismatch.
    #[error("protocol version mismatch: expected {expected}, got {actual}")]
    ProtocolVersionMismatch {
        /// The expected protocol version.
        expected: String,
        /// The actual protocol version received.
        actual: String,
    },
}

/// Errors related to transport layer operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to read from stdin.
    #[error("stdin read error: {0}")]
    StdinReadError(String),

    /// Failed to write to stdout.
    #[error("stdout write error: {0}")]
    StdoutWriteError(String),

    /// Connection was closed unexpectedly.
    #[error("connection closed")]
    ConnectionClosed,

    /// Failed to serialize a message.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Failed to deserialize a message.
    #[error("deserialization error: {0}")]
    DeserializationError(String),

    /// Invalid message format.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),

    /// IO error during transport operations.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors related to tool execution.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool was not found.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// Invalid arguments provided to the tool.
    #[error("invalid tool arguments: {0}")]
    InvalidArguments(String),

    /// The tool execution failed.
    #[error("tool execution failed: {0}")]
    ExecutionFailed(String),

    /// The file specified in the tool arguments was not found.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Failed to read the file content.
    #[error("failed to read file: {0}")]
    FileReadError(String),

    /// The symbol was not found at the specified location.
    #[error("symbol not found at position")]
    SymbolNotFound,

    /// LSP error during tool execution.
    #[error("LSP error: {0}")]
    LspError(#[from] LspError),

    /// A name-path query matched more than one symbol.
    #[error("ambiguous name path '{name_path}': {} candidates", candidates.len())]
    Ambiguous {
        /// The name path that was queried.
        name_path: String,
        /// The matching candidates, formatted for display.
        candidates: Vec<String>,
    },

    /// A name-path query matched no symbols.
    #[error("no symbol matches name path '{0}'")]
    NoSuchSymbol(String),

    /// The tool modifies files but the project descriptor marks the
    /// project `read_only`.
    #[error("tool '{0}' is disabled: project is read-only")]
    ReadOnly(String),

    /// The tool is listed in the project descriptor's `excluded_tools`.
    #[error("tool '{0}' is disabled for this project")]
    Disabled(String),
}

/// Errors related to the symbol cache (C5/C6).
#[derive(Debug, Error)]
pub enum CacheError {
    /// Failed to read or write the on-disk cache store.
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to (de)serialize a cache entry.
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors related to the tool dependency analyzer and parallel executor
/// (C8/C9).
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// A tool call's error was classified fatal; execution stopped after
    /// the current wave.
    #[error("wave execution stopped after a fatal error: {source}")]
    WaveFailed {
        /// The underlying error from the failing call.
        source: Box<Error>,
        /// Index of the failing call within the original request.
        index: usize,
    },

    /// A tool call exceeded its per-call timeout.
    #[error("tool call {0} timed out")]
    Timeout(usize),
}

/// Errors related to the multi-tenant registry (C10/C11).
#[derive(Debug, Error)]
pub enum TenantError {
    /// Could not acquire the advisory file lock within the timeout.
    #[error("could not acquire tenant registry lock within {0:?}")]
    LockTimeout(std::time::Duration),

    /// The tenant was not found in the registry.
    #[error("tenant not found: {0}")]
    NotFound(String),

    /// I/O error while reading or writing the registry file.
    #[error("tenant registry I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The registry file contained invalid JSON; it has been reset.
    #[error("tenant registry was corrupt and has been reset")]
    Corrupt,

    /// The tenant process could not be restarted after exhausting retries.
    #[error("exhausted {0} restart attempts for tenant {1}")]
    RestartExhausted(u32, String),
}

/// A unified error type for the entire application.
#[derive(Debug, Error)]
pub enum Error {
    /// LSP-related error.
    #[error("LSP error: {0}")]
    Lsp(#[from] LspError),

    /// MCP-related error.
    #[error("MCP error: {0}")]
    Mcp(#[from] McpError),

    /// Transport-related error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Tool-related error.
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Symbol cache error.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Parallel tool executor error.
    #[error("executor error: {0}")]
    Executor(#[from] ExecutorError),

    /// Tenant registry / health monitor error.
    #[error("tenant error: {0}")]
    Tenant(#[from] TenantError),
}

impl Error {
    /// Maps this error to a process exit code, per the CLI's documented
    /// exit-code contract: 0 success, 1 operational error, 2 configuration
    /// error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) => 2,
            _ => 1,
        }
    }
}

/// A specialized Result type for kadabra-broker operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lsp_error_display() {
        let err = LspError::ServerStartFailed("connection refused".to_string());
        assert_eq!(
            err.to_string(),
            "failed to start language server: connection refused"
        );
    }

    #[test]
    fn test_error_conversion() {
        let lsp_err = LspError::NotInitialized;
        let err: Error = lsp_err.into();
        assert!(matches!(err, Error::Lsp(LspError::NotInitialized)));
    }

    #[test]
    fn test_tool_error_from_lsp_error() {
        let lsp_err = LspError::DocumentNotFound("/path/to/file.rs".to_string());
        let tool_err: ToolError = lsp_err.into();
        assert!(matches!(tool_err, ToolError::LspError(_)));
    }

    #[test]
    fn test_exit_code_config_is_two() {
        let err = Error::Config("bad flag".to_string());
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_other_is_one() {
        let err: Error = LspError::NotInitialized.into();
        assert_eq!(err.exit_code(), 1);
    }
}
