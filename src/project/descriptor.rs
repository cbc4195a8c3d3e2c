//! The `.kadabra-broker/project.yml` descriptor format.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The marker file name that signals a directory is a recognized project
/// root.
pub const DESCRIPTOR_FILE_NAME: &str = "project.yml";

/// The per-project directory name holding the descriptor, cache, and tenant
/// state.
pub const STATE_DIR_NAME: &str = ".kadabra-broker";

/// A project's persisted descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    /// Human-readable project name, defaulting to the root directory name.
    #[serde(rename = "project_name")]
    pub name: String,
    /// The languages detected in the project, most file count first.
    pub languages: Vec<String>,
    /// Relative paths excluded from scanning and tool access, on top of
    /// `.gitignore` when [`Self::ignore_all_files_in_gitignore`] is set.
    #[serde(default)]
    pub ignored_paths: Vec<String>,
    /// Tool names disabled for this project.
    #[serde(default)]
    pub excluded_tools: Vec<String>,
    /// Optional tool names enabled for this project that aren't on by
    /// default.
    #[serde(default)]
    pub included_optional_tools: Vec<String>,
    /// When set, modification tools (`replace_symbol_body`, `rename_symbol`,
    /// `create_text_file`, ...) are rejected.
    #[serde(default)]
    pub read_only: bool,
    /// Whether `.gitignore` patterns are honored when scanning the project.
    #[serde(default = "default_true")]
    pub ignore_all_files_in_gitignore: bool,
    /// Free-form text surfaced to the agent on project activation.
    #[serde(default)]
    pub initial_prompt: String,
    /// Source file text encoding.
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Total number of source files counted during detection.
    #[serde(default)]
    pub source_file_count: usize,
}

fn default_true() -> bool {
    true
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

impl ProjectDescriptor {
    /// Builds a descriptor with the given name, detected languages, and
    /// file count, and every other field at its documented default.
    #[must_use]
    pub fn new(name: impl Into<String>, languages: Vec<String>, source_file_count: usize) -> Self {
        Self {
            name: name.into(),
            languages,
            ignored_paths: Vec::new(),
            excluded_tools: Vec::new(),
            included_optional_tools: Vec::new(),
            read_only: false,
            ignore_all_files_in_gitignore: true,
            initial_prompt: String::new(),
            encoding: default_encoding(),
            source_file_count,
        }
    }

    /// The descriptor file path for a given project root.
    #[must_use]
    pub fn path_for(project_root: &Path) -> PathBuf {
        project_root.join(STATE_DIR_NAME).join(DESCRIPTOR_FILE_NAME)
    }

    /// Loads a descriptor from `project_root`, if present and well-formed.
    pub async fn load(project_root: &Path) -> Option<Self> {
        let path = Self::path_for(project_root);
        let contents = tokio::fs::read_to_string(&path).await.ok()?;
        serde_yaml::from_str(&contents).ok()
    }

    /// Writes this descriptor to `project_root`, creating the state
    /// directory if needed.
    ///
    /// ## Errors
    /// Returns [`std::io::Error`] if the directory or file can't be
    /// written.
    pub async fn save(&self, project_root: &Path) -> std::io::Result<()> {
        let path = Self::path_for(project_root);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let yaml = serde_yaml::to_string(self)
            .map_err(std::io::Error::other)?;
        tokio::fs::write(&path, yaml).await
    }
}
