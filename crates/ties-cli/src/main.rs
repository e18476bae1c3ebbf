#![forbid(unsafe_code)]

mod actor;
mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use std::env;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "tie: follow, block, and messaging permissions between users",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Act as this user (skips env resolution).
    #[arg(long = "as", value_name = "USER", global = true)]
    actor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        resolve_output_mode(self.json)
    }

    fn actor_flag(&self) -> Option<&str> {
        self.actor.as_deref()
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a ties project",
        long_about = "Create .ties/ in the current directory with a config file and an empty store.",
        after_help = "EXAMPLES:\n    # Initialize with the default (public) profile visibility\n    tie init\n\n    # Only mutual followers see full profiles\n    tie init --visibility mutuals"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Manage known users",
        after_help = "EXAMPLES:\n    tie user add alice bob"
    )]
    User {
        #[command(subcommand)]
        command: cmd::user::UserCommand,
    },

    #[command(
        next_help_heading = "Relationships",
        about = "Follow a user",
        long_about = "Follow a user. Fails while a block exists in either direction. Following twice is a no-op.",
        after_help = "EXAMPLES:\n    tie --as alice follow bob"
    )]
    Follow(cmd::TargetArgs),

    #[command(
        next_help_heading = "Relationships",
        about = "Stop following a user",
        after_help = "EXAMPLES:\n    tie --as alice unfollow bob"
    )]
    Unfollow(cmd::TargetArgs),

    #[command(
        next_help_heading = "Relationships",
        about = "Block a user",
        long_about = "Block a user. Follows in both directions are removed in the same step and messaging stops, including existing conversations.",
        after_help = "EXAMPLES:\n    tie --as bob block alice"
    )]
    Block(cmd::TargetArgs),

    #[command(
        next_help_heading = "Relationships",
        about = "Remove a block",
        long_about = "Remove a block you placed. Follows severed by the block are not restored.",
        after_help = "EXAMPLES:\n    tie --as bob unblock alice"
    )]
    Unblock(cmd::TargetArgs),

    #[command(
        next_help_heading = "Queries",
        about = "List what the actor may do toward a user",
        after_help = "EXAMPLES:\n    # All granted permissions\n    tie --as alice can bob\n\n    # Exit status 1 unless alice may start a conversation\n    tie --as alice can bob --permission can_send_new_message"
    )]
    Can(cmd::can::CanArgs),

    #[command(
        next_help_heading = "Queries",
        about = "Show relationship state",
        after_help = "EXAMPLES:\n    # Pair state and permissions toward bob\n    tie --as alice show bob\n\n    # Alice's follows, followers, blocks, and conversations\n    tie --as alice show"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Messaging",
        about = "Open the conversation with a user",
        long_about = "Return the conversation between the actor and a user, creating it if the pair follows each other mutually. Existing conversations stay open regardless of follows unless a block exists.",
        after_help = "EXAMPLES:\n    tie --as alice message bob --json"
    )]
    Message(cmd::TargetArgs),

    #[command(
        next_help_heading = "Queries",
        about = "Show recent relationship events",
        after_help = "EXAMPLES:\n    tie events -n 5\n    tie events --kind relationship.blocked --user alice"
    )]
    Events(cmd::events::EventsArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    tie completions bash > ~/.local/share/bash-completion/completions/tie"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

/// Filter used when `TIES_LOG` is unset. Covers the binary and the engine.
const fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "tie=debug,ties_core=debug,info"
    } else {
        "tie=info,ties_core=info,warn"
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("TIES_LOG").unwrap_or_else(|_| {
        EnvFilter::new(default_filter(verbose || env::var("DEBUG").is_ok()))
    });

    let format = env::var("TIES_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: &Cli, output: OutputMode) -> anyhow::Result<ExitCode> {
    let project_root = env::current_dir()?;
    let actor = cli.actor_flag();

    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, output, &project_root)?,
        Commands::User { command } => cmd::user::run_user(command, output, &project_root)?,
        Commands::Follow(args) => cmd::follow::run_follow(args, actor, output, &project_root)?,
        Commands::Unfollow(args) => {
            cmd::follow::run_unfollow(args, actor, output, &project_root)?;
        }
        Commands::Block(args) => cmd::block::run_block(args, actor, output, &project_root)?,
        Commands::Unblock(args) => cmd::block::run_unblock(args, actor, output, &project_root)?,
        Commands::Can(args) => return cmd::can::run_can(args, actor, output, &project_root),
        Commands::Show(args) => cmd::show::run_show(args, actor, output, &project_root)?,
        Commands::Message(args) => cmd::message::run_message(args, actor, output, &project_root)?,
        Commands::Events(args) => cmd::events::run_events(args, output, &project_root)?,
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    debug!(command = ?cli.command, "starting");

    let output = cli.output_mode();
    match run(&cli, output) {
        Ok(code) => code,
        Err(err) => {
            let cli_error = CliError::from(&err);
            if render_error(output, &cli_error).is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}
