//! Per-language capability tiers for operations that aren't uniformly
//! supported across language servers (call hierarchy, rename).

use super::language::Language;

/// How well a language server is expected to support a given operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Support {
    /// Fully supported per the LSP spec.
    Full,
    /// Supported with known gaps (e.g. single-item call hierarchy).
    Partial,
    /// Not expected to be implemented by common servers for this language.
    Fallback,
}

/// Expected call-hierarchy support, used to decide whether to surface a
/// softer "may be incomplete" note alongside results rather than treat an
/// empty response as an error.
#[must_use]
pub fn call_hierarchy_support(language: Language) -> Support {
    match language {
        Language::Rust | Language::TypeScript | Language::JavaScript | Language::Java => {
            Support::Full
        }
        Language::Go | Language::Cpp | Language::C => Support::Partial,
        Language::Python => Support::Fallback,
    }
}

/// Expected rename support.
#[must_use]
pub fn rename_support(language: Language) -> Support {
    match language {
        Language::Rust | Language::TypeScript | Language::JavaScript | Language::Go => {
            Support::Full
        }
        Language::Python | Language::Java => Support::Partial,
        Language::C | Language::Cpp => Support::Fallback,
    }
}
