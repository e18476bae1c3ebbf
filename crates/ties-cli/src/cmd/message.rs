//! `tie message`: get or create the conversation with a target.

use std::path::Path;

use chrono::SecondsFormat;

use crate::cmd::{TargetArgs, pair_context};
use crate::output::{OutputMode, pretty_kv, render};

/// Execute `tie message <target>`.
///
/// Succeeds for an existing conversation whatever the follow state, as long
/// as no block is in place. A new conversation needs mutual follow.
///
/// # Errors
///
/// Fails with a blocked or not-permitted error when policy denies the
/// request, or if storage fails.
pub fn run_message(
    args: &TargetArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let (project, actor, target) = pair_context(actor_flag, args, project_root)?;
    let grant = project.service.get_or_create_conversation(&actor, &target)?;

    render(output, &grant, |g, w| {
        pretty_kv(w, "conversation", g.conversation.id.as_str())?;
        pretty_kv(
            w,
            "participants",
            format!(
                "{}, {}",
                g.conversation.participants.low(),
                g.conversation.participants.high()
            ),
        )?;
        pretty_kv(
            w,
            "created_at",
            g.conversation
                .created_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        )?;
        pretty_kv(w, "status", if g.created { "created" } else { "existing" })
    })
}
