//! MCP (Model Context Protocol) server module.
//!
//! This module implements the MCP server that exposes code navigation tools
//! to LLM applications like Claude Code. The server uses stdio transport
//! to communicate with clients.
//!
//! # Architecture
//!
//! The MCP module is organized into:
//! - `server`: The `BrokerServer` that implements `rmcp`'s `ServerHandler`
//! - `tools`: Tool parameter/response types exposed over MCP
//!
//! # Usage
//!
//! ```ignore
//! use kadabra_broker::mcp::BrokerServer;
//! use rmcp::{ServiceExt, transport::stdio};
//!
//! let server = BrokerServer::new(workspace_root, manager)?;
//! server.serve(stdio()).await?.waiting().await?;
//! ```

pub mod server;
pub mod tools;

// Re-export the BrokerServer for convenient access
pub use server::BrokerServer;

use crate::error::McpError;

/// Result type for MCP operations.
#[allow(dead_code)]
pub type McpResult<T> = std::result::Result<T, McpError>;
