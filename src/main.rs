//! Kadabra Broker MCP Server - Entry Point
//!
//! Thin CLI front-end: discovers a project, constructs an [`LSPManager`]
//! and a [`BrokerServer`] around it, and routes agent tool calls through
//! the MCP stdio transport. Also exposes the tenant registry and project
//! descriptor operations as standalone subcommands, since those can be run
//! without a live server.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use rmcp::{ServiceExt, transport::stdio};
use sysinfo::{Pid, System};
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use kadabra_broker::error::{Error, Result};
use kadabra_broker::lsp::language::Language;
use kadabra_broker::lsp::manager::LSPManager;
use kadabra_broker::mcp::BrokerServer;
use kadabra_broker::monitor::ResourceMonitor;
use kadabra_broker::project::descriptor::ProjectDescriptor;
use kadabra_broker::project::discovery::ProjectDiscovery;
use kadabra_broker::project::lazy_init::{InitOutcome, LazyProjectInitializer};
use kadabra_broker::tenant::health::{AutoRestarter, BackgroundHealthMonitor, HealthThresholds};
use kadabra_broker::tenant::model::{TenantRecord, TenantStatus};
use kadabra_broker::tenant::registry::TenantRegistry;

/// Polyglot code-intelligence broker: bridges an agent's tool calls to a
/// fleet of per-language LSP servers over a project.
#[derive(Parser, Debug)]
#[command(name = "kadabra-broker", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level: trace, debug, info, warn, error.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the MCP server for a project over stdio.
    StartServer {
        /// Workspace root directory to navigate.
        #[arg(long, default_value = ".")]
        project: PathBuf,
        /// Transport to serve the MCP protocol over.
        #[arg(long, value_enum, default_value = "stdio")]
        transport: Transport,
        /// Optional tenant disambiguator, for running several servers
        /// against the same project root under different contexts.
        #[arg(long)]
        context: Option<String>,
    },
    /// Inspect and control tenants in the shared tenant registry.
    Tenants {
        #[command(subcommand)]
        action: TenantsAction,
    },
    /// Create, activate, or remove a project descriptor.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },
    /// Write a `kadabra-broker` entry into `.mcp.json` in the current directory.
    Config,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Transport {
    Stdio,
    Http,
}

#[derive(Subcommand, Debug)]
enum TenantsAction {
    /// List every tenant in the registry.
    List,
    /// Show one tenant's record in detail.
    Status {
        /// Tenant id, as printed by `tenants list`.
        id: String,
    },
    /// Attempt to restart a tenant marked `error`.
    Restart {
        /// Tenant id, as printed by `tenants list`.
        id: String,
    },
    /// Kill a tenant's process and mark it `stopped`.
    Stop {
        /// Tenant id, as printed by `tenants list`.
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum ProjectAction {
    /// Write a fresh project descriptor; fails if one already exists.
    Create {
        /// Project root directory.
        path: PathBuf,
    },
    /// Ensure a project descriptor exists, creating one if needed.
    Activate {
        /// Project root directory.
        path: PathBuf,
    },
    /// Delete a project's `.kadabra-broker` state directory.
    Remove {
        /// Project root directory.
        path: PathBuf,
    },
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(Error::Config(format!("invalid log level: {other}"))),
    }
}

/// Initializes the tracing subscriber for logging.
///
/// Reads `RUST_LOG` if set (the small set of environment variables the
/// core honors, per the project descriptor's ambient scope); otherwise
/// falls back to `--log-level`.
fn init_tracing(level: Level) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "kadabra_broker={level},tower={level},async_lsp={level}"
        ))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true),
        )
        .try_init()
        .map_err(|e| Error::Config(format!("failed to initialize tracing subscriber: {e}")))
}

/// The directory the tenant registry and tenant logs live under.
///
/// `KADABRA_BROKER_HOME`, if set, overrides `$HOME/.kadabra-broker`
/// directly. These and `RUST_LOG`/`--log-level` are the only environment
/// variables the core reads; everything else lives in the project
/// descriptor.
fn state_home_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("KADABRA_BROKER_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| Error::Config("HOME environment variable is not set".to_string()))?;
    Ok(home.join(".kadabra-broker"))
}

fn tenants_registry_path() -> Result<PathBuf> {
    Ok(state_home_dir()?.join("tenants.json"))
}

/// Slugifies a project root (plus optional context) into a stable tenant
/// id: non-alphanumeric path characters become `_`.
fn tenant_id_for(project_root: &Path, context: Option<&str>) -> String {
    let mut id: String = project_root
        .display()
        .to_string()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if let Some(ctx) = context {
        id.push('_');
        id.push_str(ctx);
    }
    id
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Runs a synchronous [`TenantRegistry`] call on the blocking thread pool
/// and flattens the join/tenant errors into the crate's [`Error`].
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> std::result::Result<T, kadabra_broker::error::TenantError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(inner) => inner.map_err(Error::from),
        Err(e) => Err(Error::Config(format!("blocking task panicked: {e}"))),
    }
}

async fn start_server(project: PathBuf, transport: Transport, context: Option<String>) -> Result<()> {
    if transport == Transport::Http {
        return Err(Error::Config(
            "http transport is not supported yet; use --transport stdio".to_string(),
        ));
    }

    let workspace = project
        .canonicalize()
        .map_err(|e| Error::Config(format!("failed to canonicalize project path {}: {e}", project.display())))?;

    info!(workspace = %workspace.display(), "starting kadabra-broker MCP server");

    let initializer = LazyProjectInitializer::new(workspace.clone());
    let descriptor = match initializer.ensure_initialized().await? {
        InitOutcome::Created(descriptor) => {
            info!(languages = ?descriptor.languages, "wrote new project descriptor");
            Some(descriptor)
        }
        InitOutcome::AlreadyExists(descriptor) => Some(descriptor),
        InitOutcome::NoSourceFound { message } => {
            warn!("{message}");
            None
        }
    };
    let languages: Vec<Language> = descriptor
        .as_ref()
        .map(|d| d.languages.iter().filter_map(|id| Language::from_id(id)).collect())
        .unwrap_or_default();

    let manager = LSPManager::new(languages, workspace.clone())?;
    manager.start_all(false).await;

    let mut server = BrokerServer::new(workspace.clone(), manager)?;
    if let Some(descriptor) = &descriptor {
        server.apply_project_descriptor(descriptor);
        if descriptor.read_only {
            info!("project descriptor marks this project read-only; modification tools are disabled");
        }
        if !descriptor.excluded_tools.is_empty() {
            info!(excluded = ?descriptor.excluded_tools, "project descriptor excludes tools");
        }
    }

    let registry = Arc::new(TenantRegistry::new(tenants_registry_path()?)?);
    let tenant_id = tenant_id_for(&workspace, context.as_deref());
    {
        let mut record = TenantRecord::new(tenant_id.clone(), workspace.display().to_string(), now_ms());
        record.pid = Some(std::process::id());
        record.status = TenantStatus::Running;
        let registry = Arc::clone(&registry);
        blocking(move || registry.register(record)).await?;
    }

    let thresholds = HealthThresholds::default();
    let health_registry = Arc::clone(&registry);
    tokio::spawn(BackgroundHealthMonitor::new(health_registry, thresholds, None).run());

    let resource_monitor = Arc::new(
        ResourceMonitor::new(thresholds)
            .on_warning(|snapshot| warn!(rss_mb = snapshot.rss_mb, cpu_percent = snapshot.cpu_percent, "resource usage crossed warning threshold"))
            .on_critical(|snapshot| warn!(rss_mb = snapshot.rss_mb, cpu_percent = snapshot.cpu_percent, "resource usage crossed critical threshold")),
    );
    tokio::spawn({
        let monitor = Arc::clone(&resource_monitor);
        async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(10));
            loop {
                ticker.tick().await;
                monitor.sample(now_ms());
            }
        }
    });

    let service = server
        .serve(stdio())
        .await
        .map_err(|e| Error::Config(format!("failed to start MCP server: {e}")))?;

    info!("MCP server started, waiting for messages");
    service
        .waiting()
        .await
        .map_err(|e| Error::Config(format!("MCP server terminated with an error: {e}")))?;

    info!("MCP server shut down gracefully");

    let cleanup_registry = Arc::clone(&registry);
    let cleanup_id = tenant_id.clone();
    if let Err(e) = blocking(move || cleanup_registry.update_status(&cleanup_id, TenantStatus::Stopped)).await {
        warn!(error = %e, "failed to mark tenant stopped on shutdown");
    }

    Ok(())
}

async fn tenants_command(action: TenantsAction) -> Result<()> {
    let registry = Arc::new(TenantRegistry::new(tenants_registry_path()?)?);

    match action {
        TenantsAction::List => {
            let registry = Arc::clone(&registry);
            let tenants = blocking(move || registry.list_all()).await?;
            if tenants.is_empty() {
                println!("No tenants registered.");
            }
            for tenant in tenants {
                println!(
                    "{}\tstatus={:?}\tpid={:?}\tproject={}",
                    tenant.id, tenant.status, tenant.pid, tenant.project_root
                );
            }
            Ok(())
        }
        TenantsAction::Status { id } => {
            let lookup_id = id.clone();
            let tenant = blocking(move || registry.get_tenant(&lookup_id)).await?;
            match tenant {
                Some(t) => {
                    println!("id: {}", t.id);
                    println!("project_root: {}", t.project_root);
                    println!("status: {:?}", t.status);
                    println!("pid: {:?}", t.pid);
                    println!("rss_mb: {:?}", t.rss_mb);
                    println!("cpu_percent: {:?}", t.cpu_percent);
                    println!("restart_attempts: {}", t.restart_attempts);
                    Ok(())
                }
                None => Err(Error::Tenant(kadabra_broker::error::TenantError::NotFound(id))),
            }
        }
        TenantsAction::Restart { id } => {
            let lookup_id = id.clone();
            let registry_for_lookup = Arc::clone(&registry);
            let tenant = blocking(move || registry_for_lookup.get_tenant(&lookup_id))
                .await?
                .ok_or_else(|| Error::Tenant(kadabra_broker::error::TenantError::NotFound(id.clone())))?;

            let restarter = AutoRestarter::new(Arc::clone(&registry));
            let args = vec!["start-server".to_string(), "--project".to_string(), tenant.project_root.clone()];
            restarter.restart(&id, "kadabra-broker", &args).await?;
            println!("restart requested for tenant '{id}'");
            Ok(())
        }
        TenantsAction::Stop { id } => {
            let lookup_id = id.clone();
            let registry_for_lookup = Arc::clone(&registry);
            let tenant = blocking(move || registry_for_lookup.get_tenant(&lookup_id))
                .await?
                .ok_or_else(|| Error::Tenant(kadabra_broker::error::TenantError::NotFound(id.clone())))?;

            if let Some(pid) = tenant.pid {
                let mut system = System::new_all();
                system.refresh_all();
                if let Some(process) = system.process(Pid::from_u32(pid)) {
                    let _ = process.kill();
                }
            }
            let stop_id = id.clone();
            blocking(move || registry.update_status(&stop_id, TenantStatus::Stopped)).await?;
            println!("stopped tenant '{id}'");
            Ok(())
        }
    }
}

async fn project_command(action: ProjectAction) -> Result<()> {
    match action {
        ProjectAction::Create { path } => {
            let root = path
                .canonicalize()
                .map_err(|e| Error::Config(format!("failed to canonicalize {}: {e}", path.display())))?;
            if ProjectDescriptor::load(&root).await.is_some() {
                return Err(Error::Config(format!(
                    "project already has a descriptor at {}; use 'project activate' to re-scan it",
                    ProjectDescriptor::path_for(&root).display()
                )));
            }
            match LazyProjectInitializer::new(root.clone()).ensure_initialized().await? {
                InitOutcome::Created(descriptor) => {
                    println!(
                        "created project descriptor for '{}' ({} source files, languages: {})",
                        descriptor.name,
                        descriptor.source_file_count,
                        descriptor.languages.join(", ")
                    );
                    Ok(())
                }
                InitOutcome::NoSourceFound { message } => Err(Error::Config(message)),
                InitOutcome::AlreadyExists(_) => unreachable!("checked above"),
            }
        }
        ProjectAction::Activate { path } => {
            let root = path
                .canonicalize()
                .map_err(|e| Error::Config(format!("failed to canonicalize {}: {e}", path.display())))?;
            match LazyProjectInitializer::new(root.clone()).ensure_initialized().await? {
                InitOutcome::Created(descriptor) | InitOutcome::AlreadyExists(descriptor) => {
                    println!(
                        "activated '{}' ({} source files, languages: {})",
                        descriptor.name,
                        descriptor.source_file_count,
                        descriptor.languages.join(", ")
                    );
                    Ok(())
                }
                InitOutcome::NoSourceFound { message } => {
                    println!("{message}");
                    Ok(())
                }
            }
        }
        ProjectAction::Remove { path } => {
            let root = path
                .canonicalize()
                .map_err(|e| Error::Config(format!("failed to canonicalize {}: {e}", path.display())))?;
            let state_dir = root.join(kadabra_broker::project::descriptor::STATE_DIR_NAME);
            if state_dir.is_dir() {
                tokio::fs::remove_dir_all(&state_dir).await?;
            }
            println!("removed project state at {}", state_dir.display());
            Ok(())
        }
    }
}

#[allow(dead_code)]
async fn list_discovered_projects(search_root: PathBuf) -> Vec<String> {
    ProjectDiscovery::new(search_root)
        .discover()
        .await
        .into_iter()
        .map(|p| p.root.display().to_string())
        .collect()
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(parse_log_level(&cli.log_level)?)?;

    match cli.command {
        Command::StartServer { project, transport, context } => start_server(project, transport, context).await,
        Command::Tenants { action } => tenants_command(action).await,
        Command::Project { action } => project_command(action).await,
        Command::Config => kadabra_broker::config::configure().map_err(|e| Error::Config(e.to_string())),
    }
}

/// Main entry point.
///
/// Exit codes follow the CLI contract: 0 on success, 1 on an operational
/// error, 2 on a configuration error (see [`Error::exit_code`]).
#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}
