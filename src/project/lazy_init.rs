//! Lazily initializes a project descriptor on first use, so a project
//! needs no setup step before its first tool call.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use walkdir::{DirEntry, WalkDir};

use crate::lsp::language::Language;

use super::descriptor::ProjectDescriptor;

const SKIP_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "venv",
    ".venv",
    "__pycache__",
    "dist",
    "build",
];

const TOP_LANGUAGES: usize = 3;

/// The outcome of a (possibly no-op) initialization attempt.
#[derive(Debug)]
pub enum InitOutcome {
    /// A descriptor was freshly written.
    Created(ProjectDescriptor),
    /// A descriptor already existed.
    AlreadyExists(ProjectDescriptor),
    /// No recognized source files were found; the project root is still
    /// usable for file-level tools, just without a language-aware
    /// descriptor.
    NoSourceFound {
        /// A message suitable for surfacing to the MCP client.
        message: String,
    },
}

/// Ensures a project has a descriptor, scanning for one only once per
/// process even under concurrent first calls.
pub struct LazyProjectInitializer {
    project_root: PathBuf,
    attempted: Mutex<bool>,
}

impl LazyProjectInitializer {
    /// Creates an initializer for `project_root`.
    #[must_use]
    pub fn new(project_root: PathBuf) -> Self {
        Self {
            project_root,
            attempted: Mutex::new(false),
        }
    }

    /// Ensures `project_root` has a descriptor, scanning for languages on
    /// first call if none exists yet.
    ///
    /// Uses double-checked locking: an unlocked fast-path check first, then
    /// a locked recheck, so concurrent first calls from multiple tool
    /// invocations don't each re-walk the tree.
    ///
    /// ## Errors
    /// Returns [`std::io::Error`] if the scan or the descriptor write
    /// fails.
    pub async fn ensure_initialized(&self) -> std::io::Result<InitOutcome> {
        if let Some(descriptor) = ProjectDescriptor::load(&self.project_root).await {
            return Ok(InitOutcome::AlreadyExists(descriptor));
        }

        let mut attempted = self.attempted.lock().await;
        if *attempted {
            return Ok(match ProjectDescriptor::load(&self.project_root).await {
                Some(descriptor) => InitOutcome::AlreadyExists(descriptor),
                None => InitOutcome::NoSourceFound {
                    message: self.no_source_message(),
                },
            });
        }
        *attempted = true;

        let root = self.project_root.clone();
        let counts = tokio::task::spawn_blocking(move || scan_languages(&root))
            .await
            .map_err(std::io::Error::other)??;

        if counts.is_empty() {
            return Ok(InitOutcome::NoSourceFound {
                message: self.no_source_message(),
            });
        }

        let mut ranked: Vec<(String, (usize, u64))> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(b.1 .1.cmp(&a.1 .1)));
        let languages: Vec<String> = ranked.iter().take(TOP_LANGUAGES).map(|(k, _)| k.clone()).collect();
        let total_files: usize = ranked.iter().map(|(_, (c, _))| c).sum();

        let name = self
            .project_root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("project")
            .to_string();

        let descriptor = ProjectDescriptor::new(name, languages, total_files);
        descriptor.save(&self.project_root).await?;
        Ok(InitOutcome::Created(descriptor))
    }

    fn no_source_message(&self) -> String {
        format!(
            "No recognized source files were found under {}. File-level tools (read_file, list_dir, search_for_pattern) still work; symbol tools need a recognized language.",
            self.project_root.display()
        )
    }
}

fn should_skip(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| SKIP_DIRS.contains(&name))
}

fn scan_languages(root: &Path) -> std::io::Result<HashMap<String, (usize, u64)>> {
    let mut counts: HashMap<String, (usize, u64)> = HashMap::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|e| !should_skip(e));
    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(language) = Language::from_path(entry.path()) else {
            continue;
        };
        let bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
        let slot = counts.entry(language.language_id().to_string()).or_insert((0, 0));
        slot.0 += 1;
        slot.1 += bytes;
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_creates_descriptor_from_source_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();
        std::fs::write(dir.path().join("lib.rs"), "pub fn f() {}").unwrap();

        let initializer = LazyProjectInitializer::new(dir.path().to_path_buf());
        let outcome = initializer.ensure_initialized().await.unwrap();
        match outcome {
            InitOutcome::Created(descriptor) => {
                assert_eq!(descriptor.source_file_count, 2);
                assert!(descriptor.languages.contains(&"rust".to_string()));
            }
            other => panic!("expected Created, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_second_call_finds_existing_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();
        let initializer = LazyProjectInitializer::new(dir.path().to_path_buf());
        initializer.ensure_initialized().await.unwrap();
        let second = initializer.ensure_initialized().await.unwrap();
        assert!(matches!(second, InitOutcome::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_no_source_found_for_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let initializer = LazyProjectInitializer::new(dir.path().to_path_buf());
        let outcome = initializer.ensure_initialized().await.unwrap();
        assert!(matches!(outcome, InitOutcome::NoSourceFound { .. }));
    }
}
