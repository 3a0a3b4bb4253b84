mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{check::CheckSubcommand, hook::HookSubcommand};
use redgreen_core::types::{Strictness, TaskKind};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "redgreen",
    about = "Red, green, refactor: test-first enforcement for AI coding agents",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .redgreen/ or .git/)
    #[arg(long, global = true, env = "REDGREEN_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Switch TDD mode on and begin a fresh cycle in RED
    Start {
        /// Task kind: feature, bug, or refactor
        kind: TaskKind,

        /// Short task description
        description: Vec<String>,

        /// Enforcement level: strict, standard, or relaxed
        #[arg(long)]
        strictness: Option<Strictness>,

        /// Command that runs the project's tests
        #[arg(long)]
        test_command: Option<String>,
    },

    /// Switch TDD mode off (cycle state is kept)
    Stop,

    /// Show mode, strictness, and cycle phase
    Status,

    /// Reset the cycle to RED
    Reset,

    /// Begin the next RED iteration of the current task
    Next {
        /// Allow advancing straight from GREEN
        #[arg(long)]
        skip_refactor: bool,
    },

    /// Show resolved settings and the layers they came from
    Settings,

    /// Dry-run classification without changing state
    Check {
        #[command(subcommand)]
        subcommand: CheckSubcommand,
    },

    /// Host hook adapters (read the event as JSON on stdin)
    Hook {
        #[command(subcommand)]
        subcommand: HookSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    // stdout belongs to the hook protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Start {
            kind,
            description,
            strictness,
            test_command,
        } => cmd::start::run(
            &root,
            kind,
            &description.join(" "),
            strictness,
            test_command,
            cli.json,
        ),
        Commands::Stop => cmd::stop::run(&root, cli.json),
        Commands::Status => cmd::status::run(&root, cli.json),
        Commands::Reset => cmd::reset::run(&root, cli.json),
        Commands::Next { skip_refactor } => cmd::next::run(&root, skip_refactor, cli.json),
        Commands::Settings => cmd::settings::run(&root, cli.json),
        Commands::Check { subcommand } => cmd::check::run(&root, subcommand, cli.json),
        Commands::Hook { subcommand } => match cmd::hook::run(&root, subcommand) {
            0 => Ok(()),
            code => std::process::exit(code),
        },
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
