//! Normalized symbol model, name-path queries, and structural read/edit
//! operations over document symbol trees.
//!
//! LSP servers report either a flat [`lsp_types::SymbolInformation`] list or
//! a nested [`lsp_types::DocumentSymbol`] tree depending on server
//! capability. Everything above this module works against the single
//! normalized [`model::Symbol`] tree instead.

pub mod edit;
pub mod model;
pub mod namepath;
pub mod retriever;

pub use model::{Symbol, SymbolTree};
pub use namepath::Pattern;
