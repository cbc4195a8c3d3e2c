//! Polyglot router: owns one [`LspClient`] per language in a project and
//! routes file-scoped operations to the right one.
//!
//! Grounded in `serena.lsp_manager.LSPManager` from the original Python
//! source: lazy-by-default startup, graceful degradation (one language's
//! startup failure never blocks another), and file-extension based
//! routing.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::error::{Error, LspError};

use super::client::{LspClient, LspClientBuilder};
use super::language::Language;

/// Per-client bound on [`LSPManager::shutdown_all`]; a client that exceeds
/// it is logged and skipped rather than raised as an error.
const SHUTDOWN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Manages multiple language-server instances for a polyglot project.
pub struct LSPManager {
    languages: Vec<Language>,
    workspace_root: std::path::PathBuf,
    servers: RwLock<HashMap<Language, Arc<LspClient>>>,
    failed: RwLock<HashSet<Language>>,
    /// Serializes concurrent lazy-start attempts for the same language.
    start_locks: HashMap<Language, Mutex<()>>,
}

impl LSPManager {
    /// Creates a manager for the given languages. An empty list is
    /// permitted: it represents a project whose [`LazyProjectInitializer`](crate::project::LazyProjectInitializer)
    /// found no recognized source files, so `language_for_file` never
    /// matches and every symbol tool reports "not applicable" while
    /// file-level tools keep working.
    pub fn new(languages: Vec<Language>, workspace_root: std::path::PathBuf) -> Result<Self, Error> {
        let start_locks = languages.iter().map(|l| (*l, Mutex::new(()))).collect();
        info!(count = languages.len(), "LSPManager initialized");
        Ok(Self {
            languages,
            workspace_root,
            servers: RwLock::new(HashMap::new()),
            failed: RwLock::new(HashSet::new()),
            start_locks,
        })
    }

    /// Starts every configured language server. If `eager` is false
    /// (the default), this is a no-op and servers start lazily on first
    /// use. If `eager` is true, all servers are started concurrently;
    /// failures are logged and recorded, never propagated (graceful
    /// degradation).
    pub async fn start_all(&self, eager: bool) {
        if !eager {
            info!("LSPManager configured for lazy initialization");
            return;
        }

        let mut tasks = Vec::new();
        for language in &self.languages {
            tasks.push(self.start_language(*language));
        }
        let results = futures::future::join_all(tasks).await;
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        info!(
            succeeded,
            failed = results.len() - succeeded,
            "eager LSP startup complete"
        );
    }

    async fn start_language(&self, language: Language) -> Result<Arc<LspClient>, LspError> {
        if self.failed.read().await.contains(&language) {
            return Err(LspError::ServerStartFailed(format!(
                "{language} previously failed to start"
            )));
        }
        if let Some(client) = self.servers.read().await.get(&language) {
            return Ok(Arc::clone(client));
        }

        let _guard = match self.start_locks.get(&language) {
            Some(lock) => lock.lock().await,
            None => {
                return Err(LspError::ServerStartFailed(format!(
                    "{language} is not configured for this project"
                )));
            }
        };
        // Re-check after acquiring the lock: another task may have started
        // it while we waited.
        if let Some(client) = self.servers.read().await.get(&language) {
            return Ok(Arc::clone(client));
        }
        if self.failed.read().await.contains(&language) {
            return Err(LspError::ServerStartFailed(format!(
                "{language} previously failed to start"
            )));
        }

        info!(%language, "starting language server");
        let build_result = LspClientBuilder::new()
            .server_command(language.default_server_command())
            .server_args(language.default_server_args().iter().map(|s| (*s).to_string()))
            .workspace_root(&self.workspace_root)
            .build()
            .await;

        match build_result {
            Ok(client) => {
                let client = Arc::new(client);
                self.servers
                    .write()
                    .await
                    .insert(language, Arc::clone(&client));
                info!(%language, "language server started successfully");
                Ok(client)
            }
            Err(e) => {
                error!(%language, error = %e, "failed to start language server");
                self.failed.write().await.insert(language);
                Err(e)
            }
        }
    }

    /// Determines which configured language a file belongs to.
    #[must_use]
    pub fn language_for_file(&self, path: &Path) -> Option<Language> {
        let detected = Language::from_path(path)?;
        self.languages.iter().find(|l| **l == detected).copied()
    }

    /// Returns the language server for `path`, starting it lazily if
    /// necessary. Returns `None` if the file's language isn't part of this
    /// project, or `Some(Err(_))` if the language is configured but its
    /// server failed (or fails now) to start.
    pub async fn server_for_file(&self, path: &Path) -> Option<Result<Arc<LspClient>, LspError>> {
        let language = self.language_for_file(path)?;
        Some(self.start_language(language).await)
    }

    /// Synchronous bridge for `server_for_file`, for callers that are not
    /// themselves `async`. Refuses to run if already inside a running
    /// tokio event loop, since blocking that loop would deadlock.
    ///
    /// ## Errors
    /// Returns [`Error::Config`] containing the substring "async context"
    /// when called from within an already-running event loop.
    pub fn server_for_file_sync(
        &self,
        path: &Path,
    ) -> Result<Option<Result<Arc<LspClient>, LspError>>, Error> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(Error::Config(
                "server_for_file_sync cannot be called from an async context".to_string(),
            ));
        }
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Config(format!("failed to build runtime: {e}")))?;
        Ok(rt.block_on(self.server_for_file(path)))
    }

    /// All successfully started, currently-working language servers.
    pub async fn all_working(&self) -> Vec<Arc<LspClient>> {
        self.servers.read().await.values().cloned().collect()
    }

    /// Shuts down every started language server. Each shutdown is bounded
    /// by [`SHUTDOWN_TIMEOUT`]; a client that doesn't respond in time is
    /// logged and skipped rather than blocking the others. Failures for one
    /// language are logged and do not prevent the others from shutting
    /// down.
    pub async fn shutdown_all(&self) {
        let servers: Vec<_> = {
            let mut guard = self.servers.write().await;
            guard.drain().collect()
        };
        info!(count = servers.len(), "shutting down language servers");
        for (language, client) in servers {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, client.shutdown()).await {
                Ok(Err(e)) => warn!(%language, error = %e, "error shutting down language server"),
                Err(_) => warn!(%language, timeout = ?SHUTDOWN_TIMEOUT, "language server shutdown timed out"),
                Ok(Ok(())) => {}
            }
        }
        self.failed.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_allows_empty_languages_for_no_source_projects() {
        let manager = LSPManager::new(vec![], std::path::PathBuf::from(".")).unwrap();
        assert_eq!(manager.language_for_file(Path::new("main.rs")), None);
    }

    #[tokio::test]
    async fn test_language_for_file_routes_by_extension() {
        let manager =
            LSPManager::new(vec![Language::Rust, Language::Python], std::path::PathBuf::from("."))
                .unwrap();
        assert_eq!(
            manager.language_for_file(Path::new("src/main.rs")),
            Some(Language::Rust)
        );
        assert_eq!(manager.language_for_file(Path::new("README.md")), None);
    }

    #[tokio::test]
    async fn test_language_for_file_excludes_unconfigured_languages() {
        let manager = LSPManager::new(vec![Language::Rust], std::path::PathBuf::from(".")).unwrap();
        assert_eq!(manager.language_for_file(Path::new("main.py")), None);
    }
}
