//! Merge version bumps forward across release branches.
//!
//! Runs once per push to a release branch. The pushed commit is merged into
//! every later release branch listed in the merge configuration, each branch
//! keeping its own version file, until a merge needs a human.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::builder::FalseyValueParser;
use clap::{Args, Parser, Subcommand};

use version_watcher::cli::{
    RunArgs, Trigger, exit_code, list_targets, milestone_branch, run_watcher,
};
use version_watcher::exit_codes;
use version_watcher::io::reporter::{ActionsReporter, Reporter};
use version_watcher::logging;

#[derive(Parser)]
#[command(
    name = "version-watcher",
    version,
    about = "Merge version bumps forward across release branches"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge the pushed version bump into every later release branch.
    Run(RunCmd),
    /// Print the merge targets configured for a base branch.
    Targets {
        /// Merge configuration (JSON).
        #[arg(long)]
        config_file: PathBuf,
        /// Branch the change lands on.
        #[arg(long)]
        base: String,
    },
    /// Print the release branch a milestone is assigned to.
    Milestone {
        #[arg(long)]
        config_file: PathBuf,
        number: u64,
    },
}

#[derive(Args)]
struct RunCmd {
    /// Merge configuration (JSON), relative to the repository.
    #[arg(long, env = "INPUT_CONFIG-FILE")]
    config_file: PathBuf,
    /// Version-marker file, relative to the repository root.
    #[arg(long, env = "INPUT_VERSION-FILE")]
    version_file: String,
    /// Skip configuring the bot's git identity.
    #[arg(long, env = "INPUT_DRY-RUN", value_parser = FalseyValueParser::new())]
    dry_run: bool,
    /// Push event payload to read the commit range from.
    #[arg(long, env = "GITHUB_EVENT_PATH")]
    event_path: Option<PathBuf>,
    /// Commit the branch pointed at before the push.
    #[arg(long)]
    before: Option<String>,
    /// Commit the branch points at after the push.
    #[arg(long)]
    head: Option<String>,
    /// Pushed ref, e.g. `refs/heads/release-2023`.
    #[arg(long = "ref")]
    git_ref: Option<String>,
    /// Working copy to operate on.
    #[arg(long, default_value = ".")]
    repo: PathBuf,
    /// Settings file (TOML), relative to the repository.
    #[arg(long)]
    settings: Option<PathBuf>,
}

impl RunCmd {
    fn into_args(self) -> Result<RunArgs> {
        let trigger = match (self.before, self.head, self.git_ref) {
            (Some(before), Some(head), Some(git_ref)) => Trigger::Explicit {
                git_ref,
                before,
                head,
            },
            (None, None, None) => match self.event_path {
                Some(path) => Trigger::EventFile(path),
                None => bail!("pass --event-path (or set GITHUB_EVENT_PATH) or --before/--head/--ref"),
            },
            _ => bail!("--before, --head and --ref must be given together"),
        };
        Ok(RunArgs {
            repo: self.repo,
            config_file: self.config_file,
            version_file: self.version_file,
            dry_run: self.dry_run,
            trigger,
            settings: self.settings,
        })
    }
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::FAILED
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(cmd) => {
            let reporter = ActionsReporter::stdout();
            let args = cmd.into_args()?;
            match run_watcher(&args, &reporter) {
                Ok(outcome) => Ok(exit_code(&outcome)),
                Err(err) => {
                    reporter.set_failed(&format!("{err:#}"));
                    Ok(exit_codes::FAILED)
                }
            }
        }
        Command::Targets { config_file, base } => {
            for target in list_targets(&config_file, &base)? {
                println!("{target}");
            }
            Ok(exit_codes::OK)
        }
        Command::Milestone {
            config_file,
            number,
        } => {
            println!("{}", milestone_branch(&config_file, number)?);
            Ok(exit_codes::OK)
        }
    }
}
