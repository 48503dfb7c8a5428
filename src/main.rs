//! plansync - keep phase documents, the project model and issues in step

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};

use plansync::config::{validate_consistency, ConfigLoader, SyncConfig};
use plansync::issues::IssuePublisher;
use plansync::model::load_model;
use plansync::reconcile::{Direction, Reconciler};
use plansync::report::render_summary;
use plansync::sync::{sync_from_markdown, PhaseOutcome};
use plansync::tasks::parse_file;
use plansync::tracker::GhCliTracker;
use plansync::SyncError;

#[derive(Parser)]
#[command(name = "plansync")]
#[command(version)]
#[command(about = "Synchronize Markdown phase plans with the project model and issues", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Config file to use instead of <project>/plansync.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Repository for issue operations (owner/name)
    #[arg(long, global = true, env = "GITHUB_REPOSITORY")]
    repo: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge phase documents into the project model
    Sync {
        /// Compute the merge without writing the model
        #[arg(long)]
        dry_run: bool,
    },

    /// Show a progress summary of the project model
    Status,

    /// Check configuration, documents and model for consistency
    Validate,

    /// Parse one phase document and print its tasks
    Parse {
        /// Markdown document to parse
        file: PathBuf,

        /// Print tasks as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage tracker issues
    Issues {
        #[command(subcommand)]
        action: IssuesAction,
    },

    /// Reconcile task status between documents and issues
    Reconcile {
        /// Which way to propagate status
        #[arg(long, value_enum, default_value = "both")]
        direction: DirectionArg,

        /// Report changes without writing documents or changing issues
        #[arg(long)]
        dry_run: bool,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum IssuesAction {
    /// Create one issue per model task that has none yet
    Create {
        /// List the issues that would be created
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the resolved configuration and where it came from
    Show,
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    IssuesToDocs,
    DocsToIssues,
    Both,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::IssuesToDocs => Direction::IssuesToDocuments,
            DirectionArg::DocsToIssues => Direction::DocumentsToIssues,
            DirectionArg::Both => Direction::Both,
        }
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose {
        "plansync=debug,info"
    } else {
        "plansync=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            let code = e.downcast_ref::<SyncError>().map_or(1, SyncError::exit_code);
            std::process::exit(code);
        }
    }
}

fn tracker_for(config: &SyncConfig, repo: Option<String>) -> plansync::Result<GhCliTracker> {
    GhCliTracker::check_available()?;
    let repo = repo.or_else(|| config.tracker.repo.clone());
    Ok(GhCliTracker::new(repo, &config.tracker.phase_label_prefix))
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    // Resolve project path
    let project_path = cli.project.canonicalize().unwrap_or(cli.project.clone());
    if !project_path.is_dir() {
        eprintln!(
            "{} Project directory does not exist: {}",
            "Error:".red().bold(),
            project_path.display()
        );
        return Ok(1);
    }

    let (config, sources) = ConfigLoader::new()
        .with_explicit_path(cli.config)
        .load(&project_path)?;

    match cli.command {
        Commands::Sync { dry_run } => {
            let (_, report) = sync_from_markdown(&config, &project_path, dry_run)?;

            for phase in &report.created {
                println!("{} Added phase {}", "New:".cyan(), phase);
            }
            for (phase, outcome) in &report.phases {
                match outcome {
                    PhaseOutcome::Replaced(count) => {
                        println!("   {}: {} task(s)", phase, count);
                    }
                    PhaseOutcome::Kept => {
                        println!("   {}: {}", phase, "document missing, kept".yellow());
                    }
                    PhaseOutcome::Unmapped => {
                        println!("   {}: {}", phase, "no document configured".dimmed());
                    }
                }
            }

            let verb = if report.written {
                "Synchronized"
            } else {
                "Dry run:"
            };
            println!(
                "{} {} {} phase(s), overall progress {:.1}%",
                "OK".green().bold(),
                verb,
                report.updated_count(),
                report.overall_progress
            );
            Ok(0)
        }

        Commands::Status => {
            let model = load_model(&config.model_path(&project_path))?;
            println!("{}", render_summary(&model));
            Ok(0)
        }

        Commands::Validate => {
            let report = validate_consistency(&config, &project_path);
            for error in &report.errors {
                println!("{} {}", "Error:".red().bold(), error);
            }
            for warning in &report.warnings {
                println!("{} {}", "Warning:".yellow(), warning);
            }
            if report.is_valid() {
                println!("{} {}", "OK".green().bold(), report.summary());
            } else {
                println!("{}", report.summary());
            }
            Ok(report.exit_code())
        }

        Commands::Parse { file, json } => {
            let path = resolve_input(&project_path, &file);
            let document = parse_file(&path, &config.parser);
            if let Some(warning) = &document.warning {
                eprintln!("{} {}", "Error:".red().bold(), warning);
                return Ok(1);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&document.tasks)?);
            } else {
                for task in &document.tasks {
                    match &task.completion_date {
                        Some(date) => println!("{} {} ({})", task.status.symbol(), task.title, date),
                        None => println!("{} {}", task.status.symbol(), task.title),
                    }
                }
                println!("{} task(s) in {}", document.tasks.len(), path.display());
            }
            Ok(0)
        }

        Commands::Issues {
            action: IssuesAction::Create { dry_run },
        } => {
            let model = load_model(&config.model_path(&project_path))?;
            let tracker = tracker_for(&config, cli.repo)?;
            let report = IssuePublisher::new(&config, &tracker)
                .with_dry_run(dry_run)
                .publish(&model)?;

            for label in &report.planned_labels {
                println!("{} {}", "Would ensure label:".cyan(), label);
            }
            for title in &report.planned {
                println!("{} {}", "Would create:".cyan(), title);
            }
            for issue in &report.created {
                println!("{} #{} {}", "Created:".green(), issue.id, issue.title);
            }
            println!(
                "{} {} created, {} already present, {} failed",
                "OK".green().bold(),
                report.created.len() + report.planned.len(),
                report.existing,
                report.failures
            );
            Ok(if report.failures > 0 { 1 } else { 0 })
        }

        Commands::Reconcile { direction, dry_run } => {
            let tracker = tracker_for(&config, cli.repo)?;
            let report = Reconciler::new(&config, &project_path, &tracker)
                .with_dry_run(dry_run)
                .run(direction.into())?;

            for path in &report.documents_updated {
                println!("{} {}", "Updated:".green(), path.display());
            }
            if report.dry_run {
                println!("{}", "Dry run: nothing was written".yellow());
            }
            println!(
                "{} {} line(s) marked done, {} issue(s) closed, {} reopened, {} skipped",
                "OK".green().bold(),
                report.lines_updated,
                report.issues_closed,
                report.issues_reopened,
                report.skipped
            );
            if report.failures > 0 {
                eprintln!(
                    "{} {} item(s) failed; see log for details",
                    "Warning:".yellow().bold(),
                    report.failures
                );
                return Ok(1);
            }
            Ok(0)
        }

        Commands::Config {
            action: ConfigAction::Show,
        } => {
            println!("{}", "Configuration sources:".cyan().bold());
            for source in &sources {
                let status = if source.loaded {
                    "loaded".green()
                } else {
                    "not found".dimmed()
                };
                match &source.path {
                    Some(path) => {
                        println!("   [{}] {} ({})", source.level, path.display(), status)
                    }
                    None => println!("   [{}] built in", source.level),
                }
            }
            println!();
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(0)
        }
    }
}

/// Relative input paths are taken relative to the project directory.
fn resolve_input(project: &Path, file: &Path) -> PathBuf {
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        project.join(file)
    }
}
