//! `tie can`: evaluate what the actor may do toward a target.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use clap::Args;
use serde::Serialize;

use ties_core::{Permission, PermissionSet, UserId};

use crate::cmd::{TargetArgs, pair_context};
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct CanArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Check one permission (e.g. `can_send_new_message`). The exit status is
    /// 1 when it is not granted.
    #[arg(long, short)]
    pub permission: Option<Permission>,
}

#[derive(Debug, Serialize)]
struct CanReport {
    actor: UserId,
    target: UserId,
    permissions: PermissionSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    permission: Option<Permission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed: Option<bool>,
}

impl CanReport {
    fn write_human(&self, w: &mut dyn Write) -> std::io::Result<()> {
        if let (Some(permission), Some(allowed)) = (self.permission, self.allowed) {
            let verdict = if allowed { "yes" } else { "no" };
            return writeln!(w, "{permission}: {verdict}");
        }
        if self.permissions.is_empty() {
            return writeln!(w, "(none)");
        }
        for permission in self.permissions.iter() {
            writeln!(w, "{permission}")?;
        }
        Ok(())
    }
}

/// Execute `tie can <target> [--permission <name>]`.
///
/// # Errors
///
/// Fails if the actor is missing, the target is not a valid identity, or
/// storage cannot be read.
pub fn run_can(
    args: &CanArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<ExitCode> {
    let (project, actor, target) = pair_context(actor_flag, &args.target, project_root)?;
    let permissions = project.service.evaluate(&actor, &target)?;
    let allowed = args.permission.map(|p| permissions.contains(p));

    let report = CanReport {
        actor,
        target,
        permissions,
        permission: args.permission,
        allowed,
    };
    render(output, &report, |r, w| r.write_human(w))?;

    Ok(if allowed == Some(false) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
