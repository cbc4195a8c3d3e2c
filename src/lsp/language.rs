//! Language identification for polyglot routing.
//!
//! A project may mix several languages; [`Language`] is the routing key
//! the [`super::manager::LSPManager`] uses to pick which language server
//! handles a given file.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// A language the broker can route files to a dedicated language server
/// for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    /// Rust, served by rust-analyzer.
    Rust,
    /// Python, served by pylsp/pyright.
    Python,
    /// JavaScript, served by typescript-language-server.
    JavaScript,
    /// TypeScript, served by typescript-language-server.
    TypeScript,
    /// Go, served by gopls.
    Go,
    /// C, served by clangd.
    C,
    /// C++, served by clangd.
    Cpp,
    /// Java, served by jdtls.
    Java,
}

impl Language {
    /// All languages this broker knows how to route.
    pub const ALL: &'static [Language] = &[
        Language::Rust,
        Language::Python,
        Language::JavaScript,
        Language::TypeScript,
        Language::Go,
        Language::C,
        Language::Cpp,
        Language::Java,
    ];

    /// The LSP `languageId` string used in `textDocument/didOpen`.
    #[must_use]
    pub fn language_id(self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Java => "java",
        }
    }

    /// The default language-server command for this language.
    #[must_use]
    pub fn default_server_command(self) -> &'static str {
        match self {
            Language::Rust => "rust-analyzer",
            Language::Python => "pylsp",
            Language::JavaScript | Language::TypeScript => "typescript-language-server",
            Language::Go => "gopls",
            Language::C | Language::Cpp => "clangd",
            Language::Java => "jdtls",
        }
    }

    /// The default language-server args for this language, if any.
    #[must_use]
    pub fn default_server_args(self) -> &'static [&'static str] {
        match self {
            Language::JavaScript | Language::TypeScript => &["--stdio"],
            _ => &[],
        }
    }

    /// Parses a language id (as stored in a project descriptor, e.g.
    /// `"rust"`, `"python"`) back into a [`Language`].
    #[must_use]
    pub fn from_id(id: &str) -> Option<Language> {
        Self::ALL.iter().copied().find(|l| l.language_id() == id)
    }

    /// Determines the language for a file from its extension or well-known
    /// filename, mirroring `LSPManager.get_language_for_file`'s matcher
    /// concept in the original Python source.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Language> {
        let ext = path.extension().and_then(|e| e.to_str())?;
        match ext {
            "rs" => Some(Language::Rust),
            "py" | "pyi" => Some(Language::Python),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "ts" | "tsx" => Some(Language::TypeScript),
            "go" => Some(Language::Go),
            "c" | "h" => Some(Language::C),
            "cpp" | "cc" | "cxx" | "hpp" | "hh" => Some(Language::Cpp),
            "java" => Some(Language::Java),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.language_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_from_path_recognizes_rust() {
        assert_eq!(
            Language::from_path(&PathBuf::from("src/main.rs")),
            Some(Language::Rust)
        );
    }

    #[test]
    fn test_from_path_unknown_extension_is_none() {
        assert_eq!(Language::from_path(&PathBuf::from("README.md")), None);
    }

    #[test]
    fn test_default_server_command() {
        assert_eq!(Language::Go.default_server_command(), "gopls");
    }

    #[test]
    fn test_from_id_round_trips_language_id() {
        assert_eq!(Language::from_id("python"), Some(Language::Python));
        assert_eq!(Language::from_id("cobol"), None);
    }
}
