use radiation::config::Settings;
use radiation::copy_tree;
use radiation::engine::Engine;
use radiation::error::EngineError;
use radiation::output;
use radiation::report::ScorePolicy;
use radiation::scheduler::StopSignal;
use radiation::state;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "radiation", version, about = "Mutation testing for Python projects")]
struct Cli {
    /// Log progress to stderr (RADIATION_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SettingsArgs {
    /// Configuration file, .toml or .cfg (default: .radiation.toml, .radiation.cfg or pyproject.toml in the project)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Project root (default: nearest directory with a project marker)
    #[arg(short, long)]
    project: Option<PathBuf>,
    /// Files, directories or globs to mutate (repeatable)
    #[arg(long)]
    include: Vec<String>,
    /// Globs to leave alone (repeatable)
    #[arg(long)]
    exclude: Vec<String>,
    /// Test command, run through the shell from the project root
    #[arg(long, env = "RADIATION_RUN_COMMAND")]
    run_command: Option<String>,
    /// Per-mutant timeout in seconds
    #[arg(long)]
    timeout: Option<f64>,
    /// Worker pool size (default: available parallelism)
    #[arg(short, long)]
    workers: Option<usize>,
    /// Comma-separated rule names (arithmetic, logical, comparison, boolean)
    #[arg(long, value_delimiter = ',')]
    rules: Vec<String>,
    /// exclude-unscored, timeouts-as-killed or strict
    #[arg(long)]
    score_policy: Option<ScorePolicy>,
    /// Mutate the project in place with one worker (no working copies)
    #[arg(long)]
    in_place: bool,
    /// Skip the unmutated test run
    #[arg(long)]
    no_baseline: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run mutation testing
    Run {
        #[command(flatten)]
        settings: SettingsArgs,
        /// Output JSON instead of human-readable text
        #[arg(long)]
        json: bool,
        /// Exit code only, no output
        #[arg(short, long)]
        quiet: bool,
    },
    /// List the mutants a run would execute
    List {
        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Show details for a survived mutant by ref
    Show {
        /// Mutant ref (e.g. @m1 or m1)
        #[arg(value_name = "REF")]
        mutant_ref: String,
        #[arg(short, long)]
        project: Option<PathBuf>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Summary of last run
    Status {
        #[arg(short, long)]
        project: Option<PathBuf>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "radiation=info" } else { "radiation=warn" };
    let filter =
        EnvFilter::try_from_env("RADIATION_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match cli.command {
        Commands::Run {
            settings,
            json,
            quiet,
        } => cmd_run(settings, json, quiet),
        Commands::List { settings } => cmd_list(settings),
        Commands::Show {
            mutant_ref,
            project,
            json,
        } => cmd_show(mutant_ref, project, json),
        Commands::Status { project, json } => cmd_status(project, json),
    };

    process::exit(exit_code);
}

fn project_dir(project: Option<PathBuf>) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    match project {
        Some(p) if p.is_absolute() => p,
        Some(p) => cwd.join(p),
        None => copy_tree::find_project_root(&cwd),
    }
}

fn load_settings(args: SettingsArgs) -> Result<Settings, EngineError> {
    let explicit_project = args.project.is_some();
    let project = project_dir(args.project);
    let mut settings = match &args.config {
        Some(path) => Settings::read_config(path)?,
        None => Settings::read_default_config(&project)?,
    };
    if explicit_project || args.config.is_none() {
        settings.project_root = project;
    }
    if !args.include.is_empty() {
        settings.include = args.include;
    }
    if !args.exclude.is_empty() {
        settings.exclude.extend(args.exclude);
    }
    if let Some(cmd) = args.run_command {
        settings.run_command = cmd;
    }
    if args.timeout.is_some() {
        settings.tests_timeout = args.timeout;
    }
    if args.workers.is_some() {
        settings.workers = args.workers;
    }
    if !args.rules.is_empty() {
        settings.rules = args.rules;
    }
    if let Some(policy) = args.score_policy {
        settings.score_policy = policy;
    }
    settings.in_place |= args.in_place;
    if args.no_baseline {
        settings.baseline = false;
    }
    Ok(settings)
}

fn exit_code_for(err: &EngineError) -> i32 {
    match err {
        EngineError::Configuration { .. } => 2,
        _ => 3,
    }
}

fn report_error(err: &EngineError, json_mode: bool) -> i32 {
    if json_mode {
        let value = serde_json::json!({
            "error": { "code": err.code(), "message": err.to_string() }
        });
        println!("{}", value);
    } else {
        output::print_error(&err.to_string());
    }
    exit_code_for(err)
}

fn build_engine(args: SettingsArgs) -> Result<Engine, EngineError> {
    let settings = load_settings(args)?;
    Engine::new(settings)
}

/// First Ctrl-C lets in-flight mutants finish and restores sources; a second
/// one exits immediately and leaves restoration to the next run's backup check.
fn install_interrupt_handler(stop: StopSignal) {
    let result = ctrlc::set_handler(move || {
        if stop.is_stopped() {
            process::exit(130);
        }
        stop.stop();
        tracing::warn!("Interrupted, waiting for running mutants (Ctrl-C again to exit now)");
    });
    if let Err(e) = result {
        tracing::warn!("Could not install Ctrl-C handler: {}", e);
    }
}

fn cmd_run(args: SettingsArgs, json_mode: bool, quiet: bool) -> i32 {
    let engine = match build_engine(args) {
        Ok(e) => e,
        Err(e) => return if quiet { exit_code_for(&e) } else { report_error(&e, json_mode) },
    };
    install_interrupt_handler(engine.stop_signal());
    let project = engine.settings().project_root.clone();

    let report = match engine.run() {
        Ok(r) => r,
        Err(e) => return if quiet { exit_code_for(&e) } else { report_error(&e, json_mode) },
    };
    let summary = report.summary();

    if let Err(e) = state::save_last_run(&summary, &project) {
        tracing::warn!("Could not save run state: {}", e);
    }

    let code = if summary.counts.survived > 0 { 1 } else { 0 };
    if quiet {
        return code;
    }
    if json_mode {
        match serde_json::to_string(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                output::print_error(&format!("Failed to serialize summary: {}", e));
                return 3;
            }
        }
    } else if summary.counts.total == 0 && summary.file_errors.is_empty() {
        output::print_success("No mutable code found.");
    } else {
        output::print_run_result(&summary, &project);
    }
    code
}

fn cmd_list(args: SettingsArgs) -> i32 {
    match build_engine(args) {
        Ok(engine) => {
            output::print_plan(&engine.plan());
            0
        }
        Err(e) => report_error(&e, false),
    }
}

fn cmd_show(mutant_ref: String, project: Option<PathBuf>, json_mode: bool) -> i32 {
    let project = project_dir(project);
    let Some(last_run) = state::load_last_run(&project) else {
        output::print_error("No previous run found. Run `radiation run` first.");
        return 2;
    };

    match last_run.find_survivor(&mutant_ref) {
        Some(m) => {
            if json_mode {
                println!("{}", serde_json::json!(m));
            } else {
                output::print_mutant_detail(m);
            }
            0
        }
        None => {
            let valid: Vec<_> = last_run
                .survived_mutants
                .iter()
                .map(|m| format!("@{}", m.ref_id))
                .collect();
            output::print_error(&format!(
                "Mutant @{} not found. Valid refs: {}",
                mutant_ref.trim_start_matches('@'),
                valid.join(", ")
            ));
            2
        }
    }
}

fn cmd_status(project: Option<PathBuf>, json_mode: bool) -> i32 {
    let project = project_dir(project);
    match state::load_last_run(&project) {
        Some(summary) => {
            if json_mode {
                println!("{}", serde_json::json!(summary));
            } else {
                output::print_status(&summary);
            }
            0
        }
        None => {
            output::print_error("No previous run found. Run `radiation run` first.");
            2
        }
    }
}
