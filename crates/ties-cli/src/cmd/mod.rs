//! Subcommand implementations and the project plumbing they share.

pub mod block;
pub mod can;
pub mod completions;
pub mod events;
pub mod follow;
pub mod init;
pub mod message;
pub mod show;
pub mod user;

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::Args;
use serde::Serialize;
use tracing::debug;

use ties_core::config::{PROJECT_DIR, ProjectConfig, load_project_config};
use ties_core::db::DB_FILE_NAME;
use ties_core::event::JournalSink;
use ties_core::event::journal::JOURNAL_FILE_NAME;
use ties_core::store::sqlite::SqliteStore;
use ties_core::{
    ErrorCode, EventNotifier, MutationOutcome, RelationshipEvent, RelationshipService, UserId,
};

use crate::output::{OutputMode, render};

/// Failures locating or loading a project, before any engine call runs.
#[derive(Debug)]
pub enum ProjectError {
    NotInitialized { start: PathBuf },
    Config { detail: String },
}

impl ProjectError {
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized { .. } => ErrorCode::NotInitialized,
            Self::Config { .. } => ErrorCode::ConfigParseError,
        }
    }
}

impl fmt::Display for ProjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized { start } => write!(
                f,
                "not a ties project: no {PROJECT_DIR}/ found from {}",
                start.display()
            ),
            Self::Config { detail } => write!(f, "{detail}"),
        }
    }
}

impl std::error::Error for ProjectError {}

/// Find the `.ties` directory by walking up from `start`.
pub fn find_project_dir(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(PROJECT_DIR);
        if candidate.is_dir() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Like [`find_project_dir`], but missing projects are an error.
pub fn require_project_dir(start: &Path) -> Result<PathBuf, ProjectError> {
    find_project_dir(start).ok_or_else(|| ProjectError::NotInitialized {
        start: start.to_path_buf(),
    })
}

/// An opened project: config plus a service wired to its store and journal.
pub struct Project {
    pub config: ProjectConfig,
    /// Direct handle for listing reads; mutations go through `service`.
    pub store: Arc<SqliteStore>,
    pub service: RelationshipService,
}

impl Project {
    /// Locate the project above `start`, load its config, and open the store.
    pub fn open(start: &Path) -> anyhow::Result<Self> {
        let dir = require_project_dir(start)?;
        let root = dir.parent().unwrap_or(start);
        let config = load_project_config(root).map_err(|err| ProjectError::Config {
            detail: format!("{err:#}"),
        })?;

        let db_path = dir.join(DB_FILE_NAME);
        let store = SqliteStore::open(&db_path, config.storage.busy_timeout())
            .map(Arc::new)
            .with_context(|| format!("Failed to open store at {}", db_path.display()))?;

        let mut notifier = EventNotifier::new();
        if config.events.journal {
            let journal = JournalSink::open(&dir.join(JOURNAL_FILE_NAME))?;
            notifier.add_sink(Arc::new(journal));
        }

        debug!(
            dir = %dir.display(),
            visibility = %config.profiles.visibility,
            sinks = notifier.sink_count(),
            "opened project"
        );

        let service = RelationshipService::with_store(
            Arc::clone(&store),
            Arc::new(config.profiles.visibility),
            notifier,
        );

        Ok(Self {
            config,
            store,
            service,
        })
    }
}

/// The one positional argument shared by pairwise commands.
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// The other user.
    pub target: String,
}

impl TargetArgs {
    pub fn user(&self) -> ties_core::Result<UserId> {
        UserId::parse(&self.target)
    }
}

/// JSON/text report for follow, unfollow, block, and unblock.
#[derive(Debug, Serialize)]
pub struct MutationReport {
    pub action: &'static str,
    pub actor: UserId,
    pub target: UserId,
    pub outcome: &'static str,
    pub events: Vec<RelationshipEvent>,
}

impl MutationReport {
    pub fn new(
        action: &'static str,
        actor: UserId,
        target: UserId,
        outcome: &MutationOutcome,
    ) -> Self {
        Self {
            action,
            actor,
            target,
            outcome: outcome.as_str(),
            events: outcome.events().to_vec(),
        }
    }

    fn write_human(&self, w: &mut dyn Write) -> io::Result<()> {
        if self.events.is_empty() {
            return writeln!(
                w,
                "{} {} {}: unchanged",
                self.actor, self.action, self.target
            );
        }
        writeln!(w, "{} {} {}: applied", self.actor, self.action, self.target)?;
        for event in &self.events {
            writeln!(w, "  {} {} -> {}", event.kind, event.actor, event.target)?;
        }
        Ok(())
    }
}

/// Render a mutation result in the requested mode.
pub fn render_mutation(output: OutputMode, report: &MutationReport) -> anyhow::Result<()> {
    render(output, report, |r, w| r.write_human(w))
}

/// Resolve the actor and target, then open the project.
pub fn pair_context(
    actor_flag: Option<&str>,
    target: &TargetArgs,
    project_root: &Path,
) -> anyhow::Result<(Project, UserId, UserId)> {
    let actor = crate::actor::require_actor(actor_flag)?;
    let target = target.user()?;
    let project = Project::open(project_root)?;
    Ok((project, actor, target))
}
