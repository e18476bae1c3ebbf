//! `tie user`: manage the user directory.

use std::path::Path;

use clap::Subcommand;
use serde::Serialize;

use ties_core::UserId;

use crate::cmd::Project;
use crate::output::{OutputMode, render};

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    #[command(
        about = "Register one or more users",
        after_help = "EXAMPLES:\n    tie user add alice bob carol"
    )]
    Add {
        /// Identities to register. Existing users are left untouched.
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[derive(Debug, Serialize)]
struct Registered {
    user: UserId,
    created: bool,
}

/// Execute a `tie user` subcommand.
///
/// # Errors
///
/// Fails if any name is not a valid identity (nothing is registered in that
/// case) or if storage fails.
pub fn run_user(command: &UserCommand, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    match command {
        UserCommand::Add { names } => {
            let users = names
                .iter()
                .map(|name| UserId::parse(name))
                .collect::<Result<Vec<_>, _>>()?;

            let project = Project::open(project_root)?;
            let mut results = Vec::with_capacity(users.len());
            for user in users {
                let created = project.service.register_user(&user)?;
                results.push(Registered { user, created });
            }

            render(output, &results, |rows, w| {
                for row in rows {
                    let status = if row.created { "added" } else { "exists" };
                    writeln!(w, "{status} {}", row.user)?;
                }
                Ok(())
            })
        }
    }
}
