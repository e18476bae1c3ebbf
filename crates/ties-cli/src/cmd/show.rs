//! `tie show`: relationship state, either toward one target or for the
//! actor as a whole.

use std::io::Write;
use std::path::Path;

use clap::Args;
use serde::Serialize;

use ties_core::{
    Conversation, ConversationRegistry, PairEdges, PermissionSet, RelationshipGraph, UserId,
    VisibilityPolicy,
};

use crate::actor::require_actor;
use crate::cmd::Project;
use crate::output::{OutputMode, pretty_kv, render};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Show the pair state toward this user. Omit for the actor's overview.
    pub target: Option<String>,
}

#[derive(Debug, Serialize)]
struct PairReport {
    actor: UserId,
    target: UserId,
    edges: PairEdges,
    conversation: Option<Conversation>,
    permissions: PermissionSet,
    visibility: VisibilityPolicy,
}

#[derive(Debug, Serialize)]
struct OverviewReport {
    user: UserId,
    following: Vec<UserId>,
    followers: Vec<UserId>,
    blocked: Vec<UserId>,
    conversations: Vec<Conversation>,
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn join(users: &[UserId]) -> String {
    if users.is_empty() {
        return "-".to_string();
    }
    users.iter().map(UserId::as_str).collect::<Vec<_>>().join(", ")
}

impl PairReport {
    fn write_human(&self, w: &mut dyn Write) -> std::io::Result<()> {
        pretty_kv(w, "pair", format!("{} -> {}", self.actor, self.target))?;
        pretty_kv(w, "follows", yes_no(self.edges.a_follows_b))?;
        pretty_kv(w, "followed by", yes_no(self.edges.b_follows_a))?;
        pretty_kv(w, "blocks", yes_no(self.edges.a_blocks_b))?;
        pretty_kv(w, "blocked by", yes_no(self.edges.b_blocks_a))?;
        pretty_kv(
            w,
            "conversation",
            self.conversation
                .as_ref()
                .map_or("-", |c| c.id.as_str()),
        )?;
        pretty_kv(w, "visibility", self.visibility.as_str())?;
        pretty_kv(w, "permissions", self.permissions.to_string())
    }
}

impl OverviewReport {
    fn write_human(&self, w: &mut dyn Write) -> std::io::Result<()> {
        pretty_kv(w, "user", self.user.as_str())?;
        pretty_kv(w, "following", join(&self.following))?;
        pretty_kv(w, "followers", join(&self.followers))?;
        pretty_kv(w, "blocked", join(&self.blocked))?;
        pretty_kv(w, "conversations", self.conversations.len().to_string())?;
        for conversation in &self.conversations {
            let other = conversation
                .participants
                .other(&self.user)
                .map_or("?", UserId::as_str);
            writeln!(w, "  {} with {other}", conversation.id)?;
        }
        Ok(())
    }
}

/// Execute `tie show [target]`.
///
/// # Errors
///
/// Fails if the actor is missing or storage cannot be read.
pub fn run_show(
    args: &ShowArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let actor = require_actor(actor_flag)?;
    let target = args.target.as_deref().map(UserId::parse).transpose()?;
    let project = Project::open(project_root)?;

    match target {
        Some(target) => {
            let snapshot = project.service.snapshot(&actor, &target)?;
            let permissions = project.service.policy().decide(&snapshot);
            let report = PairReport {
                actor: snapshot.actor,
                target: snapshot.target,
                edges: snapshot.edges,
                conversation: snapshot.conversation,
                permissions,
                visibility: project.config.profiles.visibility,
            };
            render(output, &report, |r, w| r.write_human(w))
        }
        None => {
            let report = OverviewReport {
                following: project.store.following(&actor)?,
                followers: project.store.followers(&actor)?,
                blocked: project.store.blocked_by_user(&actor)?,
                conversations: project.store.conversations_for(&actor)?,
                user: actor,
            };
            render(output, &report, |r, w| r.write_human(w))
        }
    }
}
