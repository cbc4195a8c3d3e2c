//! Kadabra Broker MCP Server
//!
//! An MCP (Model Context Protocol) server that bridges LLM applications
//! (like Claude Code) with language servers (like rust-analyzer) to enable
//! semantic code navigation.
//!
//! # Overview
//!
//! This library provides:
//! - MCP server implementation with stdio transport
//! - LSP client for communicating with language servers
//! - Tools for semantic code navigation (goto definition, find references, etc.)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     stdio      ┌─────────────────┐
//! │   LLM Client    │◄──────────────►│   MCP Server    │
//! │  (Claude Code)  │    (MCP)       │ (kadabra-broker) │
//! └─────────────────┘                └────────┬────────┘
//!                                             │
//!                                      ┌──────▼──────┐
//!                                      │  LSP Client │
//!                                      └──────┬──────┘
//!                                             │ JSON-RPC
//!                                      ┌──────▼────────┐
//!                                      │   Language    │
//!                                      │   Server      │
//!                                      │(rust-analyzer)│
//!                                      └───────────────┘
//! ```
//!
//! # Modules
//!
//! - [`error`] - Error types for the entire application
//! - [`mcp`] - MCP server implementation
//! - [`lsp`] - LSP client and polyglot router implementation
//! - [`cache`] - Session LRU and on-disk symbol cache, request coalescing
//! - [`symbols`] - Symbol tree model, name-path queries, and edits
//! - [`exec`] - Tool dependency analysis and parallel execution
//! - [`tenant`] - Multi-tenant registry and health monitoring
//! - [`monitor`] - Process resource sampling
//! - [`hooks`] - Priority-ordered lifecycle hook registry
//! - [`project`] - Lazy project initialization and discovery
//! - [`config`] - `.mcp.json` configuration helper
//!
//! # Example
//!
//! ```ignore
//! use kadabra_broker::{lsp::language::Language, lsp::manager::LSPManager, mcp::BrokerServer};
//! use rmcp::{ServiceExt, transport::stdio};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let workspace = std::path::PathBuf::from(".").canonicalize()?;
//!     let manager = LSPManager::new(vec![Language::Rust], workspace.clone())?;
//!     let server = BrokerServer::new(workspace, manager)?;
//!     server.serve(stdio()).await?.waiting().await?;
//!     Ok(())
//! }
//! ```

// Enforce documentation and other quality attributes
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are too strict
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cache;
pub mod config;
pub mod error;
pub mod exec;
pub mod hooks;
pub mod lsp;
pub mod mcp;
pub mod monitor;
pub mod project;
pub mod symbols;
pub mod tenant;

// Re-export commonly used types at the crate root
pub use error::{Error, Result};
