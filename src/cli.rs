use crate::config::Config;
use crate::notifier::{NotificationKind, Notifier};
use crate::pipeline::{Pipeline, RunOutcome, RunReport};
use crate::platform::Platform;
use crate::scheduler::Scheduler;
use crate::{log_debug, ui};
use anyhow::Context;
use clap::builder::{Styles, styling::AnsiColor};
use clap::{Parser, Subcommand, crate_version};
use colored::Colorize;
use std::path::{Path, PathBuf};

const LOG_FILE: &str = "dep-updater.log";

/// CLI structure defining the available commands and global arguments
#[derive(Parser)]
#[command(
    author,
    version = crate_version!(),
    about = "dep-updater: keep npm dependencies current",
    long_about = "dep-updater finds outdated npm dependencies, pushes safe updates as a pull request and emails you about major updates that need a human.",
    disable_version_flag = true,
    after_help = get_dynamic_help(),
    styles = get_styles(),
)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Subcommands available for the CLI
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Platform to open the review request on
    #[arg(
        short = 'p',
        long = "platform",
        global = true,
        default_value = Platform::default().name(),
        help = "Platform to open the review request on"
    )]
    pub platform: String,

    /// Echo debug output, including HTTP and TLS libraries
    #[arg(
        short = 'v',
        long = "verbose",
        global = true,
        help = "Echo debug output to the terminal"
    )]
    pub verbose: bool,

    /// Log debug messages to a file
    #[arg(
        short = 'l',
        long = "log",
        global = true,
        help = "Log debug messages to a file"
    )]
    pub log: bool,

    /// Specify a custom log file path
    #[arg(
        long = "log-file",
        global = true,
        help = "Specify a custom log file path"
    )]
    pub log_file: Option<String>,

    /// Working tree to update
    #[arg(
        short = 'C',
        long = "dir",
        global = true,
        help = "Working tree to update (defaults to the current directory)"
    )]
    pub dir: Option<PathBuf>,

    /// Suppress non-essential output (spinners, summaries)
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        help = "Suppress non-essential output"
    )]
    pub quiet: bool,

    /// Display the version
    #[arg(long = "version", global = true, help = "Display the version")]
    pub version: bool,
}

/// Enumeration of available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Check for updates once and deliver them
    #[command(
        about = "Check for updates once and deliver them",
        long_about = "Discover outdated dependencies, push safe updates on a new branch, open a review request and send notifications."
    )]
    Run,

    /// Run on a cron schedule
    #[command(
        about = "Run on a cron schedule",
        long_about = "Run repeatedly on a cron schedule. Five fields (minute hour day month weekday) or six/seven fields with seconds and year."
    )]
    Schedule {
        /// Cron expression, e.g. "0 3 * * 1"
        #[arg(help = "Cron expression, e.g. \"0 3 * * 1\"")]
        expression: String,
    },

    /// Anything else runs an update
    #[command(external_subcommand)]
    Other(Vec<String>),
}

/// Define custom styles for Clap
fn get_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Magenta.on_default().bold())
        .usage(AnsiColor::Cyan.on_default().bold())
        .literal(AnsiColor::Green.on_default().bold())
        .placeholder(AnsiColor::Yellow.on_default())
        .valid(AnsiColor::Blue.on_default().bold())
        .invalid(AnsiColor::Red.on_default().bold())
        .error(AnsiColor::Red.on_default().bold())
}

/// Parse the command-line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Help footer listing the supported platforms
fn get_dynamic_help() -> String {
    let platforms = Platform::all_names()
        .iter()
        .map(|p| format!("{}", p.bold()))
        .collect::<Vec<_>>()
        .join(" • ");

    format!("\nSupported platforms: {platforms}")
}

/// Main function to parse arguments and handle the command
pub async fn main() -> anyhow::Result<()> {
    let cli = parse_args();

    if cli.version {
        ui::print_version(crate_version!());
        return Ok(());
    }

    if cli.verbose {
        crate::logger::set_verbose_logging(true);
        log_debug!("Verbose logging enabled");
    }

    if cli.log || cli.log_file.is_some() {
        let log_file = cli.log_file.as_deref().unwrap_or(LOG_FILE);
        crate::logger::set_log_file(log_file)
            .with_context(|| format!("Failed to open log file {log_file}"))?;
    }

    if cli.quiet {
        ui::set_quiet_mode(true);
    }

    let workdir = match cli.dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to read the current directory")?,
    };
    let config = Config::load(&workdir)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => handle_run(&config, &cli.platform, &workdir).await,
        Commands::Schedule { expression } => {
            handle_schedule(&config, &cli.platform, &workdir, &expression).await
        }
        Commands::Other(args) => {
            log_debug!("Unrecognized command {:?}, running an update", args);
            handle_run(&config, &cli.platform, &workdir).await
        }
    }
}

/// One update run; a working tree that cannot be opened is reported as a failed run
async fn run_once(
    config: &Config,
    platform: &str,
    workdir: &Path,
    notifier: &Notifier,
) -> RunReport {
    match Pipeline::from_config(config, platform, workdir) {
        Ok(pipeline) => pipeline.run_and_notify(notifier).await,
        Err(e) => {
            let report = RunReport::setup_failure(&e);
            notifier.dispatch(&report.notifications).await;
            report
        }
    }
}

/// Handle the `Run` command
async fn handle_run(config: &Config, platform: &str, workdir: &Path) -> anyhow::Result<()> {
    let notifier = Notifier::from_config(&config.notification);

    let spinner = ui::create_spinner("Checking for dependency updates...");
    let report = run_once(config, platform, workdir, &notifier).await;
    spinner.finish_and_clear();

    print_report(&report);
    Ok(())
}

/// Handle the `Schedule` command
async fn handle_schedule(
    config: &Config,
    platform: &str,
    workdir: &Path,
    expression: &str,
) -> anyhow::Result<()> {
    let scheduler = Scheduler::new(expression)?;
    let notifier = Notifier::from_config(&config.notification);

    if let Some(next) = scheduler.next_run() {
        ui::print_info(&format!(
            "Scheduled dependency updates ({expression}), next run at {}",
            next.to_rfc3339()
        ));
    }

    let notifier = &notifier;
    scheduler
        .run(move || async move {
            let report = run_once(config, platform, workdir, notifier).await;
            print_report(&report);
        })
        .await?;
    Ok(())
}

fn print_report(report: &RunReport) {
    match report.outcome {
        RunOutcome::Idle => ui::print_info("All dependencies are up to date."),
        RunOutcome::Completed => {
            ui::print_success(&format!("Processed {} update(s).", report.updates.len()));
        }
        RunOutcome::Failed => ui::print_warning("Dependency update finished with errors."),
    }

    for delta in &report.updates.safe {
        ui::print_message(&format!("  {} {}", "safe ".green(), delta));
    }
    for delta in &report.updates.major {
        ui::print_message(&format!("  {} {}", "major".yellow(), delta));
    }
    if let Some(branch) = &report.branch {
        ui::print_message(&format!("Pushed branch {}", branch.cyan()));
    }
    if let Some(url) = &report.review_url {
        ui::print_success(&format!("Review request: {url}"));
    }

    for notification in &report.notifications {
        if matches!(
            notification.kind,
            NotificationKind::Failure | NotificationKind::ConfigError
        ) {
            ui::print_error(&notification.body);
        }
    }
}
