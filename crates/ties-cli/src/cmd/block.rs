//! `tie block` and `tie unblock`.
//!
//! Blocking severs follows in both directions. Unblocking removes only the
//! block; severed follows stay gone.

use std::path::Path;

use crate::cmd::{MutationReport, TargetArgs, pair_context, render_mutation};
use crate::output::OutputMode;

/// Execute `tie block <target>`.
///
/// # Errors
///
/// Fails if the actor is missing, either user is unknown, or the store
/// reports a torn pair after the block.
pub fn run_block(
    args: &TargetArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let (project, actor, target) = pair_context(actor_flag, args, project_root)?;
    let outcome = project.service.request_block(&actor, &target)?;
    render_mutation(output, &MutationReport::new("block", actor, target, &outcome))
}

/// Execute `tie unblock <target>`.
///
/// # Errors
///
/// Fails if the actor is missing or either user is unknown.
pub fn run_unblock(
    args: &TargetArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let (project, actor, target) = pair_context(actor_flag, args, project_root)?;
    let outcome = project.service.request_unblock(&actor, &target)?;
    render_mutation(output, &MutationReport::new("unblock", actor, target, &outcome))
}
