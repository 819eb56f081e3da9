//! CLI argument parsing using clap.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use clap::Subcommand;
use clap::builder::TypedValueParser;
use clap_complete::Shell;
use unspool_core::SourcePolicy;
use unspool_core::UnpackConfig;
use unspool_core::config::DEFAULT_CONCURRENCY;

#[derive(Parser)]
#[command(name = "unspool")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output results as JSON lines
    #[arg(short, long, global = true)]
    pub json: bool,

    #[command(flatten)]
    pub unpack: UnpackArgs,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch an inbox directory and unpack every file dropped into it
    Watch(WatchArgs),
    /// Dispatch a single file the way the watcher would (the file is consumed)
    Extract(ExtractArgs),
    /// Generate shell completions
    Completion(CompletionArgs),
}

/// Options shared by every command that unpacks.
#[derive(clap::Args)]
pub struct UnpackArgs {
    /// Maximum number of concurrently running extraction tasks
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_CONCURRENCY,
        value_parser = clap::value_parser!(u16).range(1..).map(usize::from)
    )]
    pub concurrency: usize,

    /// Levels of tar-inside-tar nesting unpacked automatically (0 disables)
    #[arg(long, global = true, default_value_t = 1)]
    pub max_depth: usize,

    /// Move failed and rejected inputs here instead of deleting them
    #[arg(long, global = true, value_name = "DIR")]
    pub quarantine: Option<PathBuf>,

    /// Do not apply mode bits recorded in archives
    #[arg(long, global = true)]
    pub no_preserve_permissions: bool,
}

impl UnpackArgs {
    pub fn to_config(&self) -> UnpackConfig {
        let policy = self
            .quarantine
            .clone()
            .map_or(SourcePolicy::Remove, SourcePolicy::Quarantine);

        UnpackConfig::default()
            .with_concurrency(self.concurrency)
            .with_max_nesting_depth(self.max_depth)
            .with_preserve_permissions(!self.no_preserve_permissions)
            .with_source_policy(policy)
    }
}

#[derive(clap::Args)]
pub struct WatchArgs {
    /// Directory to watch
    #[arg(value_name = "INBOX")]
    pub inbox: PathBuf,

    /// Directory archives are unpacked into
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Interval between empty-directory sweeps of the inbox, in milliseconds
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    pub reap_interval_ms: u64,

    /// Pause between a file appearing and its dispatch, in milliseconds
    #[arg(long, default_value_t = 500)]
    pub settle_ms: u64,
}

impl WatchArgs {
    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(clap::Args)]
pub struct ExtractArgs {
    /// File to dispatch
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Destination directory
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,
}

#[derive(clap::Args)]
pub struct CompletionArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}
