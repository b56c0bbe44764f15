use std::io::IsTerminal;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use quorum_assign::ReviewEngine;
use quorum_core::{
    DeactivationReport, OutputFormat, PullRequest, PullRequestShort, QuorumConfig, QuorumError,
    Stats, Team, User,
};
use quorum_store::SqliteStore;

#[derive(Parser)]
#[command(
    name = "quorum",
    version,
    about = "Reviewer assignment for pull requests",
    long_about = "Quorum assigns reviewers to pull requests from the author's team and keeps\n\
                   those assignments valid when people or whole teams leave review duty.\n\n\
                   Examples:\n  \
                     quorum team add --file backend.json      Register a team and its members\n  \
                     quorum pr create pr-1 'Add cache' --author u1\n  \
                     quorum pr reassign pr-1 --old u2         Swap one reviewer\n  \
                     quorum team deactivate backend           Deactivate a team and repair open PRs\n  \
                     quorum stats --format json               Assignment counts"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .quorum.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the SQLite database (overrides [store] path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text  Human-readable summaries (default)\n  \
                         json  Machine-readable JSON with snake_case keys"
    )]
    format: OutputFormat,

    /// Enable debug logging on stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Seed the reviewer picker for reproducible assignments
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Create a default .quorum.toml configuration file
    #[command(long_about = "Create a default .quorum.toml configuration file.\n\n\
        Generates a commented template with all available options.\n\
        Fails if .quorum.toml already exists.")]
    Init,
    /// Manage teams
    #[command(subcommand)]
    Team(TeamCommand),
    /// Manage users
    #[command(subcommand)]
    User(UserCommand),
    /// Create, merge, and reassign pull requests
    #[command(subcommand)]
    Pr(PrCommand),
    /// Show assignment statistics
    Stats,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum TeamCommand {
    /// Create a team with its members
    #[command(long_about = "Create a team with its members.\n\n\
        Reads a JSON team payload from a file or stdin. Members that already\n\
        exist move to the new team.\n\n\
        Example payload:\n  \
          {\"team_name\": \"backend\", \"members\": [\n    \
            {\"user_id\": \"u1\", \"username\": \"Alice\", \"is_active\": true}]}")]
    Add {
        /// Read the team payload from file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Show a team and its members
    Get {
        /// Team name
        team_name: String,
    },
    /// Deactivate every member and repair their open reviews
    #[command(long_about = "Deactivate every active member of a team.\n\n\
        Removes the members from all open pull requests and refills each affected\n\
        pull request from the remaining active users, in one transaction. Merged\n\
        pull requests are left untouched.")]
    Deactivate {
        /// Team name
        team_name: String,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    /// Activate or deactivate a user
    SetActive {
        /// User id
        user_id: String,
        /// New active flag (true or false)
        #[arg(action = clap::ArgAction::Set)]
        is_active: bool,
    },
    /// List the pull requests a user reviews
    Reviews {
        /// User id
        user_id: String,
    },
}

#[derive(Subcommand)]
enum PrCommand {
    /// Open a pull request and assign reviewers
    Create {
        /// Pull request id
        pull_request_id: String,
        /// Pull request title
        pull_request_name: String,
        /// Author user id
        #[arg(long)]
        author: String,
    },
    /// Mark a pull request merged
    Merge {
        /// Pull request id
        pull_request_id: String,
    },
    /// Replace one reviewer with another member of their team
    Reassign {
        /// Pull request id
        pull_request_id: String,
        /// Reviewer to replace
        #[arg(long)]
        old: String,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1mquorum\x1b[0m v{version}: reviewer assignment for pull requests\n");

        println!("Quick start:");
        println!("  \x1b[36mquorum init\x1b[0m                        Create a .quorum.toml config file");
        println!("  \x1b[36mquorum team add --file team.json\x1b[0m   Register a team");
        println!("  \x1b[36mquorum pr create ID NAME --author U\x1b[0m Open a pull request\n");

        println!("All commands:");
        println!("  \x1b[32mteam\x1b[0m   add, get, deactivate");
        println!("  \x1b[32muser\x1b[0m   set-active, reviews");
        println!("  \x1b[32mpr\x1b[0m     create, merge, reassign");
        println!("  \x1b[32mstats\x1b[0m  Assignment counts per reviewer and pull request");
        println!("  \x1b[32minit\x1b[0m   Create default configuration\n");
    } else {
        println!("quorum v{version}: reviewer assignment for pull requests\n");

        println!("Quick start:");
        println!("  quorum init                        Create a .quorum.toml config file");
        println!("  quorum team add --file team.json   Register a team");
        println!("  quorum pr create ID NAME --author U Open a pull request\n");

        println!("All commands:");
        println!("  team   add, get, deactivate");
        println!("  user   set-active, reviews");
        println!("  pr     create, merge, reassign");
        println!("  stats  Assignment counts per reviewer and pull request");
        println!("  init   Create default configuration\n");
    }

    println!("Run 'quorum <command> --help' for details.");
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<QuorumConfig> {
    let config = match path {
        Some(path) => QuorumConfig::from_file(path)?,
        None => {
            let default_path = Path::new(".quorum.toml");
            if default_path.exists() {
                QuorumConfig::from_file(default_path)?
            } else {
                QuorumConfig::default()
            }
        }
    };
    Ok(config)
}

fn read_team_input(file: Option<&Path>) -> Result<Team> {
    let input = match file {
        Some(path) => std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err(format!("reading {}", path.display()))?,
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .into_diagnostic()
                .wrap_err("reading stdin")?;
            input
        }
    };
    serde_json::from_str(&input)
        .into_diagnostic()
        .wrap_err("parsing team payload")
}

/// Attach whether the request itself was refused or the system failed.
fn classify(err: QuorumError) -> miette::Report {
    let context = if err.is_rejection() {
        "request rejected"
    } else {
        "infrastructure failure"
    };
    miette::Report::new(err).wrap_err(context)
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn print_team(team: &Team) {
    println!("Team {} ({} members)", team.team_name, team.members.len());
    for member in &team.members {
        let state = if member.is_active { "active" } else { "inactive" };
        println!("  {:<12} {:<20} {state}", member.user_id, member.username);
    }
}

fn print_pr(pr: &PullRequest) {
    println!(
        "{} [{}] {} (author {})",
        pr.pull_request_id, pr.status, pr.pull_request_name, pr.author_id
    );
    if pr.assigned_reviewers.is_empty() {
        println!("  reviewers: none");
    } else {
        println!("  reviewers: {}", pr.assigned_reviewers.join(", "));
    }
    if let Some(merged_at) = pr.merged_at {
        println!("  merged at: {}", merged_at.to_rfc3339());
    }
}

fn print_user(user: &User) {
    let state = if user.is_active { "active" } else { "inactive" };
    let team = user.team_name.as_deref().unwrap_or("-");
    println!("{} ({}) team {team}: {state}", user.user_id, user.username);
}

fn print_reviews(user_id: &str, prs: &[PullRequestShort]) {
    if prs.is_empty() {
        println!("{user_id} has no reviews");
        return;
    }
    println!("{user_id} reviews {} pull requests", prs.len());
    for pr in prs {
        println!(
            "  {:<12} {:<7} {} (author {})",
            pr.pull_request_id, pr.status, pr.pull_request_name, pr.author_id
        );
    }
}

fn print_report(team_name: &str, report: &DeactivationReport) {
    println!(
        "Deactivated {} members of {team_name}; {} open pull requests affected",
        report.deactivated_users_count, report.affected_prs_count
    );
}

fn print_stats(stats: &Stats) {
    println!(
        "Pull requests: {} total, {} open, {} merged",
        stats.total_prs, stats.open_prs, stats.merged_prs
    );
    if !stats.reviewer_stats.is_empty() {
        println!("\nReviewers:");
        for r in &stats.reviewer_stats {
            println!(
                "  {:<12} {:<20} {} assigned ({} open, {} merged)",
                r.user_id, r.username, r.total_assigned, r.open_assigned, r.merged_assigned
            );
        }
    }
    if !stats.pr_stats.is_empty() {
        println!("\nPull requests:");
        for p in &stats.pr_stats {
            println!(
                "  {:<12} {:<7} {} reviewers  {}",
                p.pull_request_id, p.status, p.reviewers_count, p.pull_request_name
            );
        }
    }
}

const DEFAULT_CONFIG: &str = r#"# Quorum Configuration

[store]
# SQLite database file, created on first use
# path = ".quorum/quorum.db"
# How long to wait for another process holding the write lock
# busy_timeout_ms = 5000

[assignment]
# Reviewers picked for each new pull request
# reviewers_per_pr = 2
"#;

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    let command = match cli.command {
        None => {
            print_welcome(use_color);
            return Ok(());
        }
        Some(Command::Init) => {
            let path = Path::new(".quorum.toml");
            if path.exists() {
                miette::bail!(".quorum.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .quorum.toml with default configuration");
            return Ok(());
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "quorum", &mut std::io::stdout());
            return Ok(());
        }
        Some(command) => command,
    };

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.store.path = db;
    }
    tracing::debug!(
        db = %config.store.path.display(),
        reviewers_per_pr = config.assignment.reviewers_per_pr,
        "configuration loaded"
    );

    let store = SqliteStore::open_with_config(&config.store).map_err(classify)?;
    let engine = match cli.seed {
        Some(seed) => ReviewEngine::with_seed(store, config.assignment, seed),
        None => ReviewEngine::new(store, config.assignment),
    };
    let json = cli.format == OutputFormat::Json;

    match command {
        Command::Team(TeamCommand::Add { file }) => {
            let team = read_team_input(file.as_deref())?;
            let team = engine.add_team(team).map_err(classify)?;
            if json {
                print_json(&serde_json::json!({ "team": team }))?;
            } else {
                print_team(&team);
            }
        }
        Command::Team(TeamCommand::Get { team_name }) => {
            let team = engine.get_team(&team_name).map_err(classify)?;
            if json {
                print_json(&serde_json::to_value(&team).into_diagnostic()?)?;
            } else {
                print_team(&team);
            }
        }
        Command::Team(TeamCommand::Deactivate { team_name }) => {
            let report = engine.deactivate_team(&team_name).map_err(classify)?;
            if json {
                print_json(&serde_json::to_value(report).into_diagnostic()?)?;
            } else {
                print_report(&team_name, &report);
            }
        }
        Command::User(UserCommand::SetActive { user_id, is_active }) => {
            let user = engine.set_user_active(&user_id, is_active).map_err(classify)?;
            if json {
                print_json(&serde_json::json!({ "user": user }))?;
            } else {
                print_user(&user);
            }
        }
        Command::User(UserCommand::Reviews { user_id }) => {
            let prs = engine.user_reviews(&user_id).map_err(classify)?;
            if json {
                print_json(&serde_json::json!({ "user_id": user_id, "pull_requests": prs }))?;
            } else {
                print_reviews(&user_id, &prs);
            }
        }
        Command::Pr(PrCommand::Create {
            pull_request_id,
            pull_request_name,
            author,
        }) => {
            let pr = engine
                .create_pr(&pull_request_id, &pull_request_name, &author)
                .map_err(classify)?;
            if json {
                print_json(&serde_json::json!({ "pr": pr }))?;
            } else {
                print_pr(&pr);
            }
        }
        Command::Pr(PrCommand::Merge { pull_request_id }) => {
            let pr = engine.merge_pr(&pull_request_id).map_err(classify)?;
            if json {
                print_json(&serde_json::json!({ "pr": pr }))?;
            } else {
                print_pr(&pr);
            }
        }
        Command::Pr(PrCommand::Reassign {
            pull_request_id,
            old,
        }) => {
            let result = engine.reassign_reviewer(&pull_request_id, &old).map_err(classify)?;
            if json {
                print_json(&serde_json::json!({
                    "pr": result.pr,
                    "replaced_by": result.replaced_by,
                }))?;
            } else {
                println!("Replaced {old} with {}", result.replaced_by);
                print_pr(&result.pr);
            }
        }
        Command::Stats => {
            let stats = engine.stats().map_err(classify)?;
            if json {
                print_json(&serde_json::to_value(&stats).into_diagnostic()?)?;
            } else {
                print_stats(&stats);
            }
        }
        Command::Init | Command::Completions { .. } => {
            unreachable!("handled before opening the store")
        }
    }

    Ok(())
}
