//! Actor identity resolution for CLI commands.
//!
//! The resolution chain: `--as` flag > `TIES_ACTOR` env > `USER` env (TTY only).
//! Commands that act on behalf of a user require an actor; `init`, `events`,
//! and `completions` work without one.

use std::env;

use ties_core::UserId;

/// Errors from actor resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorResolutionError {
    pub message: String,
    /// Machine error code.
    pub code: &'static str,
}

impl std::fmt::Display for ActorResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ActorResolutionError {}

/// Environment reader trait for dependency injection in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
    fn is_tty(&self) -> bool;
}

struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn is_tty(&self) -> bool {
        use std::io::IsTerminal;
        std::io::stdin().is_terminal()
    }
}

fn resolve_actor_with(cli_flag: Option<&str>, env: &dyn EnvReader) -> Option<String> {
    if let Some(actor) = cli_flag.filter(|a| !a.is_empty()) {
        return Some(actor.to_string());
    }

    if let Some(val) = env.get("TIES_ACTOR") {
        return Some(val);
    }

    // USER is only trusted interactively; scripts must name the actor.
    if env.is_tty() {
        return env.get("USER");
    }

    None
}

/// Resolve the acting user, returning an error if none is configured or the
/// configured name is not a valid identity.
pub fn require_actor(cli_flag: Option<&str>) -> Result<UserId, ActorResolutionError> {
    require_actor_with(cli_flag, &RealEnv)
}

fn require_actor_with(
    cli_flag: Option<&str>,
    env: &dyn EnvReader,
) -> Result<UserId, ActorResolutionError> {
    let raw = resolve_actor_with(cli_flag, env).ok_or_else(|| ActorResolutionError {
        message: "Actor identity required for this command. Set --as or TIES_ACTOR.".to_string(),
        code: "missing_actor",
    })?;

    UserId::parse(&raw).map_err(|err| ActorResolutionError {
        message: err.to_string(),
        code: "invalid_actor",
    })
}
