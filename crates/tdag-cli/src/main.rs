#![forbid(unsafe_code)]

mod cmd;
mod config;
mod output;
mod validate;

use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cmd::Session;
use config::{Overrides, Settings};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "td: a task tracker built on a dependency DAG",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Output format (defaults to pretty on a terminal, text otherwise).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Data file to use; the extension picks the backend (.yaml, .yml, .db, .sqlite, .sqlite3).
    #[arg(long, global = true, value_name = "PATH")]
    data: Option<PathBuf>,

    /// Acting user, recorded in generated ids and request fields.
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn overrides(&self) -> Overrides<'_> {
        Overrides {
            data: self.data.as_deref(),
            user: self.user.as_deref(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Lifecycle",
        about = "Create a task",
        long_about = "Create a task, optionally wired to existing parents and children.",
        after_help = "EXAMPLES:\n    # Create a task\n    td add \"Write release notes\"\n\n    # Create a task that waits on two others\n    td add \"Ship v2\" --depends-on ab12,cd34 -p 5\n\n    # Emit machine-readable output\n    td add \"Write release notes\" --json"
    )]
    Add(cmd::add::AddArgs),

    #[command(
        next_help_heading = "Read",
        about = "List tasks",
        long_about = "List tasks with optional filters, ordered by priority or by dependencies.",
        after_help = "EXAMPLES:\n    # Tasks whose dependencies are all done\n    td list --ready\n\n    # Everything connected to one task, in dependency order\n    td list --component ab12 --topo\n\n    # Emit machine-readable output\n    td list --json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one task",
        long_about = "Show full details for a single task by id or unique prefix.",
        after_help = "EXAMPLES:\n    # Show a task\n    td show ab12\n\n    # Emit machine-readable output\n    td show ab12 --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Edit a task",
        long_about = "Edit fields and dependency links of one task in a single transaction.",
        after_help = "EXAMPLES:\n    # Retitle and reprioritize\n    td update ab12 --title \"Ship v2.1\" -p 7\n\n    # Rewire dependencies\n    td update ab12 --add-parent cd34 --remove-child ef56"
    )]
    Update(cmd::update::UpdateArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Mark a task as done",
        after_help = "EXAMPLES:\n    # Complete a task\n    td done ab12"
    )]
    Done(cmd::status::DoneArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Mark a task as in progress",
        after_help = "EXAMPLES:\n    # Start work on a task\n    td start ab12"
    )]
    Start(cmd::status::StartArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Set any status",
        long_about = "Set the status of a task. Accepts aliases such as todo, doing and wip.",
        after_help = "EXAMPLES:\n    # Put a task back in the queue\n    td status ab12 todo\n\n    # Revive a removed task\n    td status ab12 pending"
    )]
    Status(cmd::status::StatusArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Request work from someone",
        long_about = "Assign a task to someone and record who asked, when, and why.",
        after_help = "EXAMPLES:\n    # Ask a teammate to review\n    td request ab12 --to sam --note \"please review\"\n\n    # With a deadline\n    td request ab12 --to sam --due 2024-06-01"
    )]
    Request(cmd::request::RequestArgs),

    #[command(
        next_help_heading = "Graph",
        about = "Add a dependency edge",
        long_about = "Make CHILD depend on PARENT. Rejected if it would close a cycle.",
        after_help = "EXAMPLES:\n    # cd34 now waits on ab12\n    td link ab12 cd34"
    )]
    Link(cmd::link::LinkArgs),

    #[command(
        next_help_heading = "Graph",
        about = "Remove a dependency edge",
        after_help = "EXAMPLES:\n    # Drop the ab12 -> cd34 edge\n    td unlink ab12 cd34"
    )]
    Unlink(cmd::link::LinkArgs),

    #[command(
        next_help_heading = "Graph",
        about = "Insert a task between two linked tasks",
        long_about = "Create a task that depends on A and that B depends on, replacing the direct A -> B edge, which must exist.",
        after_help = "EXAMPLES:\n    # Add a review step between implement and release\n    td insert ab12 cd34 --title \"Review\""
    )]
    Insert(cmd::insert::InsertArgs),

    #[command(
        next_help_heading = "Graph",
        about = "Archive a task and its dependency tree",
        after_help = "EXAMPLES:\n    # Archive a finished project\n    td archive ab12"
    )]
    Archive(cmd::archive::ArchiveArgs),

    #[command(
        next_help_heading = "Graph",
        about = "Restore an archived dependency tree",
        after_help = "EXAMPLES:\n    # Bring a project back\n    td restore ab12"
    )]
    Restore(cmd::archive::ArchiveArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show raw dependency links",
        after_help = "EXAMPLES:\n    # Parents and children of a task\n    td deps ab12"
    )]
    Deps(cmd::deps::DepsArgs),

    #[command(
        next_help_heading = "Read",
        about = "Explain a task's position in the graph",
        long_about = "Show parents and children with their titles and statuses.",
        after_help = "EXAMPLES:\n    # Why is this task here?\n    td reason ab12"
    )]
    Reason(cmd::deps::DepsArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show everything a task waits on",
        after_help = "EXAMPLES:\n    # All ancestors\n    td blocked ab12\n\n    # Only unfinished ancestors\n    td blocked ab12 --open"
    )]
    Blocked(cmd::deps::BlockedArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Remove a task",
        long_about = "Mark a task as removed. With --hard, delete it and detach every edge.",
        after_help = "EXAMPLES:\n    # Soft remove\n    td rm ab12\n\n    # Delete for good\n    td rm ab12 --hard"
    )]
    Rm(cmd::rm::RmArgs),

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Check graph integrity",
        long_about = "Check edge symmetry, dangling references and cycles. Exits non-zero on findings.",
        after_help = "EXAMPLES:\n    # Verify the data file\n    td check\n\n    # Emit machine-readable output\n    td check --json"
    )]
    Check,

    #[command(
        next_help_heading = "Interoperability",
        about = "Export tasks as JSON",
        after_help = "EXAMPLES:\n    # Write a snapshot\n    td export backup.json"
    )]
    Export(cmd::exchange::ExportArgs),

    #[command(
        next_help_heading = "Interoperability",
        about = "Import tasks from JSON",
        long_about = "Replace the stored tasks with a JSON snapshot, or add only new ids with --merge.",
        after_help = "EXAMPLES:\n    # Restore a snapshot\n    td import backup.json\n\n    # Add tasks from another file\n    td import other.json --merge"
    )]
    Import(cmd::exchange::ImportArgs),

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Generate shell completion scripts",
        long_about = "Generate shell completion scripts for supported shells.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    td completions bash\n\n    # Generate zsh completions\n    td completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

/// Default directives when `TDAG_LOG` is unset. Covers both the library
/// (`tdag_core`) and the binary (`td`) targets.
const fn default_log_directives(debug: bool) -> &'static str {
    if debug {
        "tdag_core=debug,td=debug,info"
    } else {
        "tdag_core=info,td=info,warn"
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TDAG_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_log_directives(env::var("DEBUG").is_ok())));

    let format = env::var("TDAG_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());
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

fn dispatch(command: Commands, session: &Session) -> anyhow::Result<()> {
    match command {
        Commands::Add(args) => cmd::add::run_add(&args, session),
        Commands::List(args) => cmd::list::run_list(&args, session),
        Commands::Show(args) => cmd::show::run_show(&args, session),
        Commands::Update(args) => cmd::update::run_update(&args, session),
        Commands::Done(args) => cmd::status::run_done(&args, session),
        Commands::Start(args) => cmd::status::run_start(&args, session),
        Commands::Status(args) => cmd::status::run_status(&args, session),
        Commands::Request(args) => cmd::request::run_request(&args, session),
        Commands::Link(args) => cmd::link::run_link(&args, session),
        Commands::Unlink(args) => cmd::link::run_unlink(&args, session),
        Commands::Insert(args) => cmd::insert::run_insert(&args, session),
        Commands::Archive(args) => cmd::archive::run_archive(&args, session),
        Commands::Restore(args) => cmd::archive::run_restore(&args, session),
        Commands::Deps(args) => cmd::deps::run_deps(&args, session),
        Commands::Reason(args) => cmd::deps::run_reason(&args, session),
        Commands::Blocked(args) => cmd::deps::run_blocked(&args, session),
        Commands::Rm(args) => cmd::rm::run_rm(&args, session),
        Commands::Check => cmd::check::run_check(session),
        Commands::Export(args) => cmd::exchange::run_export(&args, session),
        Commands::Import(args) => cmd::exchange::run_import(&args, session),
        Commands::Completions(args) => completions(&args),
    }
}

fn completions(args: &cmd::completions::CompletionsArgs) -> anyhow::Result<()> {
    let mut command = Cli::command();
    cmd::completions::run_completions(args.shell, &mut command)
}

/// Load settings, open the store and run one command.
fn run(cli: Cli) -> Result<(), (OutputMode, anyhow::Error)> {
    let fallback = output::resolve_output_mode(cli.format, cli.json, None);

    if let Commands::Completions(args) = &cli.command {
        return completions(args).map_err(|e| (fallback, e));
    }

    let settings = Settings::load(cli.overrides()).map_err(|e| (fallback, e.into()))?;
    let mode = output::resolve_output_mode(cli.format, cli.json, settings.output.as_deref());
    debug!(
        home = %settings.home.display(),
        data = %settings.data_path.display(),
        actor = %settings.actor,
        "resolved settings"
    );

    let store = settings.open_store().map_err(|e| (mode, e.into()))?;
    let session = Session::new(store, settings.actor, mode);
    dispatch(cli.command, &session).map_err(|e| (mode, e))
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err((mode, err)) => {
            debug!(error = ?err, "command failed");
            if let Err(render_err) = output::render_error(mode, &CliError::from_anyhow(&err)) {
                eprintln!("error: {err:#} ({render_err})");
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_log_directives_cover_both_targets() {
        for debug in [false, true] {
            let directives = default_log_directives(debug);
            assert!(directives.contains("tdag_core="), "{directives}");
            assert!(directives.contains("td="), "{directives}");
            assert!(directives.parse::<EnvFilter>().is_ok());
        }
        assert!(default_log_directives(true).starts_with("tdag_core=debug"));
    }

    #[test]
    fn insert_help_says_the_edge_must_exist() {
        let cmd = Cli::command();
        let insert = cmd.find_subcommand("insert").unwrap();
        let about = insert.get_long_about().unwrap().to_string();
        assert!(about.contains("replacing the direct A -> B edge"), "{about}");
        assert!(!about.contains("any"), "{about}");
    }

    #[test]
    fn json_flag_parses_before_subcommand() {
        let cli = Cli::parse_from(["td", "--json", "list"]);
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::List(_)));
    }

    #[test]
    fn json_flag_after_subcommand() {
        let cli = Cli::parse_from(["td", "list", "--json"]);
        assert!(cli.json);
    }

    #[test]
    fn format_flag_is_global() {
        let cli = Cli::parse_from(["td", "show", "ab12", "--format", "text"]);
        assert_eq!(cli.format, Some(OutputMode::Text));
    }

    #[test]
    fn data_and_user_flags_become_overrides() {
        let cli = Cli::parse_from(["td", "--data", "/tmp/t.db", "--user", "sam", "check"]);
        let overrides = cli.overrides();
        assert_eq!(overrides.data, Some(std::path::Path::new("/tmp/t.db")));
        assert_eq!(overrides.user, Some("sam"));
        assert!(matches!(cli.command, Commands::Check));
    }

    #[test]
    fn overrides_are_empty_by_default() {
        let cli = Cli::parse_from(["td", "list"]);
        let overrides = cli.overrides();
        assert!(overrides.data.is_none());
        assert!(overrides.user.is_none());
    }

    #[test]
    fn link_takes_parent_then_child() {
        let cli = Cli::parse_from(["td", "link", "p", "c"]);
        match cli.command {
            Commands::Link(args) => {
                assert_eq!(args.parent, "p");
                assert_eq!(args.child, "c");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
