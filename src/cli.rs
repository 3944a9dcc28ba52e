use crate::trend::RankMetric;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gtally")]
#[command(about = "Contributor activity analysis for per-author and day-of-week performance reports")]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone)]
pub struct CommonArgs {
    #[arg(long, help = "Path to author aliases JSON file (canonical name to username list)")]
    pub aliases: Option<PathBuf>,

    #[arg(long = "events", help = "Activity event file, NDJSON or JSON array (repeatable)")]
    pub events: Vec<PathBuf>,

    #[arg(long = "repo", help = "Path to a local git repository to scan (repeatable)")]
    pub repos: Vec<PathBuf>,

    #[arg(long, help = "Include merge commits when scanning repositories", default_value_t = false)]
    pub include_merges: bool,

    #[arg(long, help = "Start of the window (RFC3339, YYYY-MM-DD, or a duration like '90d')")]
    pub since: Option<String>,

    #[arg(long, help = "End of the window (RFC3339, YYYY-MM-DD, or a duration like '90d')")]
    pub until: Option<String>,

    #[arg(long, help = "Window of the last N weeks (ignored when --since is given)")]
    pub weeks: Option<u32>,

    #[arg(long = "exclude", help = "Skip a username, e.g. a bot account (repeatable, case-insensitive)")]
    pub exclude: Vec<String>,

    #[arg(long, help = "Number of parallel source workers", default_value_t = 4)]
    pub jobs: usize,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Per-author performance report with day-of-week breakdowns
    Report {
        #[arg(long, help = "Output as JSON")]
        json: bool,

        #[arg(long, help = "Output as NDJSON rows")]
        ndjson: bool,

        #[arg(long, help = "Output as a markdown report")]
        markdown: bool,

        #[arg(long, help = "Output as CSV rows")]
        csv: bool,
    },
    /// Weekday activity totals across all authors
    Summary {
        #[arg(long, help = "Output as JSON")]
        json: bool,

        #[arg(long, help = "Output as NDJSON rows")]
        ndjson: bool,
    },
    /// Ranked authors with growth, peak-day, and consistency stats
    Trends {
        #[arg(long, help = "Output as JSON")]
        json: bool,

        #[arg(long, help = "Output as NDJSON rows")]
        ndjson: bool,

        #[arg(long, value_enum, default_value_t = RankMetric::Commits, help = "Ranking metric")]
        metric: RankMetric,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn execute(self) -> Result<()> {
        match self.command {
            Commands::Report { json, ndjson, markdown, csv } => {
                crate::report::exec(self.common, json, ndjson, markdown, csv)
            }
            Commands::Summary { json, ndjson } => {
                crate::summary::exec(self.common, json, ndjson)
            }
            Commands::Trends { json, ndjson, metric } => {
                crate::trend::exec(self.common, json, ndjson, metric)
            }
        }
    }
}
