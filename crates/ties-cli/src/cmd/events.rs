//! `tie events`: print the tail of the event journal.

use std::path::Path;

use chrono::SecondsFormat;
use clap::Args;

use ties_core::event::journal::JOURNAL_FILE_NAME;
use ties_core::event::read_journal;
use ties_core::{EventKind, RelationshipEvent, UserId};

use crate::cmd::require_project_dir;
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct EventsArgs {
    /// Show at most this many of the most recent events.
    #[arg(long, short = 'n', default_value_t = 20)]
    pub limit: usize,

    /// Only events of this kind (e.g. `relationship.blocked`).
    #[arg(long)]
    pub kind: Option<EventKind>,

    /// Only events where this user is the actor or the target.
    #[arg(long)]
    pub user: Option<String>,
}

fn select(
    events: Vec<RelationshipEvent>,
    kind: Option<EventKind>,
    user: Option<&UserId>,
    limit: usize,
) -> Vec<RelationshipEvent> {
    let mut matching: Vec<_> = events
        .into_iter()
        .filter(|e| kind.is_none_or(|k| e.kind == k))
        .filter(|e| user.is_none_or(|u| &e.actor == u || &e.target == u))
        .collect();
    let skip = matching.len().saturating_sub(limit);
    matching.drain(..skip);
    matching
}

/// Execute `tie events`.
///
/// # Errors
///
/// Fails if the project is missing or the journal has a malformed line.
pub fn run_events(args: &EventsArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let user = args.user.as_deref().map(UserId::parse).transpose()?;
    let dir = require_project_dir(project_root)?;
    let events = read_journal(&dir.join(JOURNAL_FILE_NAME))?;
    let selected = select(events, args.kind, user.as_ref(), args.limit);

    render(output, &selected, |events, w| {
        for event in events {
            write!(
                w,
                "{} {:<24} {} -> {}",
                event.at.to_rfc3339_opts(SecondsFormat::Millis, true),
                event.kind.as_str(),
                event.actor,
                event.target
            )?;
            match &event.conversation {
                Some(id) => writeln!(w, " ({id})")?,
                None => writeln!(w)?,
            }
        }
        Ok(())
    })
}
