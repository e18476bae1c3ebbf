//! `tie init`: create the `.ties/` project directory.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Args;
use serde::Serialize;

use ties_core::VisibilityPolicy;
use ties_core::config::{CONFIG_FILE_NAME, PROJECT_DIR, ProjectConfig, save_project_config};
use ties_core::db::DB_FILE_NAME;
use ties_core::store::sqlite::SqliteStore;

use crate::output::{OutputMode, pretty_kv, render};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite the config even if `.ties/` already exists. Stored
    /// relationships are kept.
    #[arg(long)]
    pub force: bool,

    /// Who may view a full profile when no block is in place.
    #[arg(long, default_value_t = VisibilityPolicy::Public)]
    pub visibility: VisibilityPolicy,

    /// Do not append events to `.ties/events.jsonl`.
    #[arg(long)]
    pub no_journal: bool,
}

#[derive(Debug, Serialize)]
struct InitReport {
    dir: PathBuf,
    config: PathBuf,
    database: PathBuf,
    visibility: VisibilityPolicy,
    journal: bool,
}

/// Execute `tie init`. Creates:
///
/// ```text
/// .ties/
///   config.toml     (profile visibility, event and storage settings)
///   ties.sqlite3    (users, follows, blocks, conversations)
/// ```
///
/// # Errors
///
/// Returns an error if `.ties/` already exists and `--force` is not set,
/// or if any filesystem or database operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let dir = project_root.join(PROJECT_DIR);
    if dir.exists() && !args.force {
        anyhow::bail!("{PROJECT_DIR}/ already exists. Use `tie init --force` to reinitialize.");
    }

    let mut config = ProjectConfig::default();
    config.profiles.visibility = args.visibility;
    config.events.journal = !args.no_journal;
    save_project_config(project_root, &config)?;

    let database = dir.join(DB_FILE_NAME);
    SqliteStore::open(&database, config.storage.busy_timeout())
        .with_context(|| format!("Failed to create {}", database.display()))?;

    tracing::info!(dir = %dir.display(), visibility = %args.visibility, "initialized project");

    let report = InitReport {
        config: dir.join(CONFIG_FILE_NAME),
        dir,
        database,
        visibility: config.profiles.visibility,
        journal: config.events.journal,
    };

    render(output, &report, |r, w| {
        pretty_kv(w, "initialized", r.dir.display().to_string())?;
        pretty_kv(w, "visibility", r.visibility.as_str())?;
        pretty_kv(w, "journal", if r.journal { "on" } else { "off" })?;
        writeln!(w)?;
        writeln!(w, "Next steps:")?;
        writeln!(w, "  tie user add alice bob")?;
        writeln!(w, "  tie --as alice follow bob")?;
        writeln!(w, "  tie --as alice can bob")
    })
}
