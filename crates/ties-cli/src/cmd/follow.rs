//! `tie follow` and `tie unfollow`.

use std::path::Path;

use crate::cmd::{MutationReport, TargetArgs, pair_context, render_mutation};
use crate::output::OutputMode;

/// Execute `tie follow <target>`.
///
/// # Errors
///
/// Fails if the actor is missing, either user is unknown, or a block exists
/// between the pair.
pub fn run_follow(
    args: &TargetArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let (project, actor, target) = pair_context(actor_flag, args, project_root)?;
    let outcome = project.service.request_follow(&actor, &target)?;
    render_mutation(output, &MutationReport::new("follow", actor, target, &outcome))
}

/// Execute `tie unfollow <target>`.
///
/// # Errors
///
/// Fails if the actor is missing or either user is unknown.
pub fn run_unfollow(
    args: &TargetArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let (project, actor, target) = pair_context(actor_flag, args, project_root)?;
    let outcome = project.service.request_unfollow(&actor, &target)?;
    render_mutation(output, &MutationReport::new("unfollow", actor, target, &outcome))
}
