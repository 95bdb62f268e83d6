//! CLI command implementations
//!
//! Command handlers return the process exit code; errors bubble up as
//! `PublishError` and are mapped to their exit code in `main`. The
//! transaction hooks are the one place where a non-error, non-zero exit
//! code exists: a failing hook propagates its own status.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

use chrono::Utc;

use crate::catalog::{CatalogHash, CatalogStore, JsonCatalogStore};
use crate::errors::{ErrorKind, PublishError, PublishResult};
use crate::gateway::LocalLease;
use crate::history::{JsonTagStore, RepositoryTagInput, Tag, TagHistoryStore};
use crate::hooks::call_server_hook;
use crate::mountpoint::SpoolMountpoint;
use crate::observability;
use crate::settings::Settings;
use crate::transaction::{Coordinator, CoordinatorConfig, SpoolArea};

use super::args::{Cli, Command};

/// Hours of remaining whitelist validity below which a warning is emitted
const WHITELIST_WARNING_H: i64 = 12;

/// Dispatch a parsed command line.
pub fn run_command(cli: Cli) -> PublishResult<i32> {
    match cli.command {
        Command::Init { config } => init(&config),
        Command::Transaction {
            repository,
            config,
            retry_timeout,
            template,
            template_from,
            template_to,
        } => transaction(
            &repository,
            &config,
            retry_timeout,
            template.as_deref(),
            template_from.as_deref(),
            template_to.as_deref(),
        ),
        Command::Tag {
            repository,
            config,
            add,
            channel,
            message,
            hash,
            remove,
            inspect,
            branches,
            list,
            force,
            machine_readable,
        } => tag(TagInvocation {
            repository,
            config,
            add,
            channel,
            message,
            hash,
            remove,
            inspect,
            branches,
            list,
            force,
            machine_readable,
        }),
    }
}

/// Initialize the data directory: catalog manifest, tag history, spool.
pub fn init(config: &Path) -> PublishResult<i32> {
    let settings = Settings::load(config)?;

    if settings.catalog_manifest_path().exists() {
        return Err(PublishError::input(format!(
            "repository {} is already initialized",
            settings.repository
        )));
    }

    fs::create_dir_all(settings.spool_dir()).map_err(|e| {
        PublishError::unspecified(format!("cannot create spool directory: {}", e))
    })?;
    JsonCatalogStore::create(&settings.catalog_manifest_path())?;
    let mut history = JsonTagStore::open(&settings.tag_history_path())?;
    history.push()?;

    observability::info("repository_initialized", &[("repo", &settings.repository)]);
    Ok(0)
}

/// Open a writer transaction.
pub fn transaction(
    repository_arg: &str,
    config: &Path,
    retry_timeout: Option<i64>,
    template: Option<&str>,
    template_from: Option<&str>,
    template_to: Option<&str>,
) -> PublishResult<i32> {
    // Repository name and lease path arrive as a single argument,
    // split on the first slash
    let (repository, lease_path) = match repository_arg.split_once('/') {
        Some((repo, path)) => (repo, path),
        None => (repository_arg, ""),
    };

    let mut settings = load_settings(config, repository)?;
    if let Some(timeout_s) = retry_timeout {
        settings.transaction.set_timeout(timeout_s);
    }
    apply_template_flags(&mut settings, template, template_from, template_to)?;
    settings.transaction.set_lease_path(lease_path);

    if settings.auto_managed_mount {
        return Err(PublishError::invocation(
            "the auto-managed mount on the repository has to be disabled",
        ));
    }
    check_write_permission(&settings)?;
    check_whitelist(&settings)?;

    let hooks = settings.hooks_script.clone();
    let rv = call_server_hook(hooks.as_deref(), "transaction_before_hook", repository)?;
    if rv != 0 {
        observability::log_stderr(
            observability::Severity::Error,
            "transaction_hook_failed",
            &[("hook", "transaction_before_hook"), ("repo", repository)],
        );
        return Ok(rv);
    }

    let mut coordinator = build_coordinator(&settings)?;
    coordinator.transaction()?;
    coordinator.session_mut().set_keep_alive(true)?;

    let rv = call_server_hook(hooks.as_deref(), "transaction_after_hook", repository)?;
    if rv != 0 {
        // The transaction stays open; the operator decides what to do
        observability::log_stderr(
            observability::Severity::Error,
            "transaction_hook_failed",
            &[("hook", "transaction_after_hook"), ("repo", repository)],
        );
        return Ok(rv);
    }

    Ok(0)
}

/// All `tag` command parameters
pub struct TagInvocation {
    pub repository: String,
    pub config: std::path::PathBuf,
    pub add: Option<String>,
    pub channel: Option<String>,
    pub message: Option<String>,
    pub hash: Option<String>,
    pub remove: Option<String>,
    pub inspect: Option<String>,
    pub branches: bool,
    pub list: bool,
    pub force: bool,
    pub machine_readable: bool,
}

/// Create, delete, inspect or list named snapshots.
pub fn tag(invocation: TagInvocation) -> PublishResult<i32> {
    let settings = load_settings(&invocation.config, &invocation.repository)?;
    let mut coordinator = build_coordinator(&settings)?;

    // Identify the tag to be added, if any
    let mut add_tags: Vec<Tag> = Vec::new();
    if let Some(name) = &invocation.add {
        let input = RepositoryTagInput {
            name: name.clone(),
            channel: invocation.channel.clone().unwrap_or_default(),
            description: invocation.message.clone().unwrap_or_default(),
        };
        let root_hash = match &invocation.hash {
            Some(hex) => Some(CatalogHash::from_hex(hex)?),
            None => None,
        };
        let branch = String::new();
        let tag = coordinator
            .tag_editor()
            .make_tag(&input, &branch, root_hash.as_ref())?;
        add_tags.push(tag);
    }

    // Identify the tag to be removed, if any
    let mut rm_tags: Vec<String> = Vec::new();
    if let Some(name) = &invocation.remove {
        if !invocation.force && !confirm_removal(name)? {
            println!("aborted");
            return Ok(0);
        }
        rm_tags.push(name.clone());
    }

    // Edit tags inside a single transaction, if applicable. The full
    // lease-acquiring path guards the history push against concurrent
    // writers in other processes.
    if !(add_tags.is_empty() && rm_tags.is_empty()) {
        coordinator.transaction()?;
        let result = coordinator.tag_editor().edit_tags(&add_tags, &rm_tags);
        coordinator.close();
        result?;
    }

    if let Some(name) = &invocation.inspect {
        let Some(tag) = coordinator.history().get(name) else {
            return Err(PublishError::input(format!("no such tag: {}", name)));
        };
        print_tags(std::slice::from_ref(&tag), invocation.machine_readable)?;
    }

    if invocation.list {
        let tags = coordinator.history().list();
        print_tags(&tags, invocation.machine_readable)?;
    }

    if invocation.branches {
        print_branches(coordinator.history(), invocation.machine_readable)?;
    }

    Ok(0)
}

fn load_settings(config: &Path, repository: &str) -> PublishResult<Settings> {
    let settings = Settings::load(config)?;
    if settings.repository != repository {
        return Err(PublishError::new(
            ErrorKind::RepositoryNotFound,
            format!(
                "repository {} not found in {}",
                repository,
                config.display()
            ),
        ));
    }
    Ok(settings)
}

fn apply_template_flags(
    settings: &mut Settings,
    template: Option<&str>,
    template_from: Option<&str>,
    template_to: Option<&str>,
) -> PublishResult<()> {
    if template_from.is_some() != template_to.is_some() {
        return Err(PublishError::input(
            "invalid parameter combination for templates",
        ));
    }
    if let (Some(from), Some(to)) = (template_from, template_to) {
        if template.is_some() {
            return Err(PublishError::input(
                "invalid parameter combination for templates",
            ));
        }
        settings.transaction.set_template(from, to)?;
    }
    if let Some(spec) = template {
        let Some((from, to)) = spec.split_once('=') else {
            return Err(PublishError::input(format!(
                "invalid syntax for --template parameter: {}",
                spec
            )));
        };
        settings.transaction.set_template(from, to)?;
    }
    Ok(())
}

/// Probe for write permission on the data directory.
fn check_write_permission(settings: &Settings) -> PublishResult<()> {
    let data_dir = settings.data_dir();
    let probe = data_dir.join(".caspub_probe");
    match fs::write(&probe, b"probe") {
        Ok(()) => {
            let _ = fs::remove_file(&probe);
            Ok(())
        }
        Err(_) => Err(PublishError::permission(
            "no write permission to repository",
        )),
    }
}

fn check_whitelist(settings: &Settings) -> PublishResult<()> {
    let Some(expiry) = settings.whitelist_expiry else {
        return Ok(());
    };
    let now = Utc::now();
    if expiry <= now {
        return Err(PublishError::new(
            ErrorKind::WhitelistExpired,
            format!("repository whitelist for {} is expired", settings.repository),
        ));
    }
    if expiry - now < chrono::Duration::hours(WHITELIST_WARNING_H) {
        observability::warn(
            "whitelist_expiring",
            &[
                ("expiry", &expiry.to_rfc3339()),
                ("repo", &settings.repository),
            ],
        );
    }
    Ok(())
}

/// Wire the concrete collaborators for a single-host repository. Gateway
/// deployments plug their session implementation in through the same
/// `LeaseSession` trait.
fn build_coordinator(settings: &Settings) -> PublishResult<Coordinator> {
    if settings.gateway_url.is_some() {
        return Err(PublishError::new(
            ErrorKind::RepositoryType,
            format!(
                "repository {} is gateway-published; only locally leased repositories are supported",
                settings.repository
            ),
        ));
    }

    fs::create_dir_all(settings.spool_dir()).map_err(|e| {
        PublishError::unspecified(format!("cannot create spool directory: {}", e))
    })?;

    let catalog = JsonCatalogStore::load(&settings.catalog_manifest_path())?;
    let head = catalog.head()?;
    let mountpoint = SpoolMountpoint::open(&settings.spool_dir(), head)?;
    let session = LocalLease::new(&settings.lease_lock_path());
    let history = JsonTagStore::open(&settings.tag_history_path())?;
    let spool = SpoolArea::new(&settings.spool_dir());

    let config = CoordinatorConfig {
        repository: settings.repository.clone(),
        lease_path: settings.transaction.lease_path.clone(),
        timeout_s: settings.transaction.retry_timeout_s,
        template: settings
            .transaction
            .template()
            .map(|(from, to)| (from.to_string(), to.to_string())),
        backoff_ms: (
            settings.backoff.init_delay_ms,
            settings.backoff.max_delay_ms,
            settings.backoff.reset_after_ms,
        ),
    };

    Ok(Coordinator::new(
        config,
        Box::new(session),
        Some(Box::new(mountpoint)),
        Box::new(catalog),
        Box::new(history),
        spool,
    ))
}

fn confirm_removal(name: &str) -> PublishResult<bool> {
    print!("really delete tag {}? [y/N] ", name);
    io::stdout()
        .flush()
        .map_err(|e| PublishError::unspecified(format!("cannot write to stdout: {}", e)))?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(|e| PublishError::unspecified(format!("cannot read confirmation: {}", e)))?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn print_tags(tags: &[&Tag], machine_readable: bool) -> PublishResult<()> {
    if machine_readable {
        let json = serde_json::to_string_pretty(tags)
            .map_err(|e| PublishError::unspecified(format!("cannot serialize tags: {}", e)))?;
        println!("{}", json);
        return Ok(());
    }
    for tag in tags {
        println!(
            "{}  revision {}  channel {}  {}  {}",
            tag.name,
            tag.revision,
            tag.channel,
            tag.timestamp.to_rfc3339(),
            tag.description
        );
    }
    Ok(())
}

fn print_branches(history: &dyn TagHistoryStore, machine_readable: bool) -> PublishResult<()> {
    let mut branches: Vec<&str> = history
        .list()
        .iter()
        .map(|tag| tag.branch.as_str())
        .collect();
    branches.sort_unstable();
    branches.dedup();

    if machine_readable {
        let json = serde_json::to_string_pretty(&branches)
            .map_err(|e| PublishError::unspecified(format!("cannot serialize branches: {}", e)))?;
        println!("{}", json);
        return Ok(());
    }
    for branch in branches {
        if branch.is_empty() {
            println!("(default)");
        } else {
            println!("{}", branch);
        }
    }
    Ok(())
}
