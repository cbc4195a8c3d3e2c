//! Scans a search root for existing project descriptors, and emits MCP
//! server config stanzas for each one found.

use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use super::descriptor::{ProjectDescriptor, DESCRIPTOR_FILE_NAME, STATE_DIR_NAME};

const MAX_SCAN_DEPTH: usize = 4;

/// One discovered project: its root plus its descriptor, if it had one.
#[derive(Debug)]
pub struct DiscoveredProject {
    /// The project's root directory.
    pub root: PathBuf,
    /// Its descriptor, if `project.yml` existed and parsed.
    pub descriptor: Option<ProjectDescriptor>,
}

/// An MCP server configuration stanza for a single discovered project,
/// suitable for embedding in a client's `mcpServers` map.
#[derive(Debug, Serialize)]
pub struct McpServerConfig {
    /// The command to launch (this binary).
    pub command: String,
    /// Arguments, including `start-server` and the project root.
    pub args: Vec<String>,
}

/// Scans `search_root` (up to [`MAX_SCAN_DEPTH`] levels deep) for
/// directories that look like project roots: either they already carry a
/// `.kadabra-broker/project.yml`, or they contain a `.git` directory.
pub struct ProjectDiscovery {
    search_root: PathBuf,
}

impl ProjectDiscovery {
    /// Creates a discovery scanner rooted at `search_root`.
    #[must_use]
    pub fn new(search_root: PathBuf) -> Self {
        Self { search_root }
    }

    /// Returns every project root found under the search root.
    pub async fn discover(&self) -> Vec<DiscoveredProject> {
        let mut found = Vec::new();
        let walker = WalkDir::new(&self.search_root)
            .max_depth(MAX_SCAN_DEPTH)
            .into_iter()
            .filter_entry(|e| e.file_type().is_dir());

        for entry in walker.filter_map(Result::ok) {
            let path = entry.path();
            if is_project_root(path) {
                let descriptor = ProjectDescriptor::load(path).await;
                found.push(DiscoveredProject {
                    root: path.to_path_buf(),
                    descriptor,
                });
            }
        }
        found
    }

    /// Builds an MCP config stanza for `project`, invoking `binary` with
    /// `start-server --project <root>`.
    #[must_use]
    pub fn mcp_config_for(binary: &str, project: &DiscoveredProject) -> McpServerConfig {
        McpServerConfig {
            command: binary.to_string(),
            args: vec![
                "start-server".to_string(),
                "--project".to_string(),
                project.root.display().to_string(),
            ],
        }
    }
}

fn is_project_root(path: &Path) -> bool {
    path.join(STATE_DIR_NAME).join(DESCRIPTOR_FILE_NAME).is_file() || path.join(".git").is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_discovers_git_project_without_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("proj");
        std::fs::create_dir_all(project.join(".git")).unwrap();

        let discovery = ProjectDiscovery::new(dir.path().to_path_buf());
        let found = discovery.discover().await;
        assert!(found.iter().any(|p| p.root == project && p.descriptor.is_none()));
    }

    #[tokio::test]
    async fn test_discovers_project_with_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("proj");
        std::fs::create_dir_all(&project).unwrap();
        let descriptor = ProjectDescriptor::new("proj", vec!["rust".to_string()], 1);
        descriptor.save(&project).await.unwrap();

        let discovery = ProjectDiscovery::new(dir.path().to_path_buf());
        let found = discovery.discover().await;
        let entry = found.iter().find(|p| p.root == project).unwrap();
        assert!(entry.descriptor.is_some());
    }

    #[test]
    fn test_mcp_config_shape() {
        let project = DiscoveredProject {
            root: PathBuf::from("/proj"),
            descriptor: None,
        };
        let config = ProjectDiscovery::mcp_config_for("kadabra-broker", &project);
        assert_eq!(config.command, "kadabra-broker");
        assert_eq!(config.args, vec!["start-server", "--project", "/proj"]);
    }
}
