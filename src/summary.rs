use crate::cli::CommonArgs;
use crate::model::{combined_day_totals, DayBucket, ReportRow, UnitWarning, Weekday, SCHEMA_VERSION};
use anyhow::Context;
use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SummaryOutput {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub partial: bool,
    pub days: Vec<ReportRow>,
    pub warnings: Vec<UnitWarning>,
}

pub fn exec(common: CommonArgs, json: bool, ndjson: bool) -> anyhow::Result<()> {
    let snapshot = crate::source::snapshot_from_args(&common, !json && !ndjson)
        .context("Failed to collect activity")?;
    let day_totals = combined_day_totals(&snapshot);

    let days: Vec<ReportRow> = Weekday::ALL
        .iter()
        .filter(|day| !day_totals[day.index()].is_empty())
        .map(|day| ReportRow::new("All", day.name(), &day_totals[day.index()]))
        .collect();

    if json {
        let output = SummaryOutput {
            version: SCHEMA_VERSION,
            generated_at: Utc::now(),
            since: common.since.clone(),
            until: common.until.clone(),
            partial: snapshot.partial,
            days,
            warnings: snapshot.warnings.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if ndjson {
        for row in &days {
            println!("{}", serde_json::to_string(row)?);
        }
    } else {
        output_week(&day_totals, &common);
        crate::report::output::print_warnings(&snapshot);
    }

    Ok(())
}

fn output_week(day_totals: &[DayBucket; 7], common: &CommonArgs) {
    if day_totals.iter().all(DayBucket::is_empty) {
        println!("No activity to display");
        return;
    }

    if let (Some(since), Some(until)) = (&common.since, &common.until) {
        println!("Activity from {} to {}", since, until);
    } else if let Some(since) = &common.since {
        println!("Activity since {}", since);
    } else if let Some(until) = &common.until {
        println!("Activity until {}", until);
    }

    let max_commits = day_totals.iter().map(|b| b.commits).max().unwrap_or(1).max(1);
    let max_lines = day_totals
        .iter()
        .map(DayBucket::lines_changed)
        .max()
        .unwrap_or(1)
        .max(1);

    println!("{}", style("Weekday Activity").bold());
    println!("{}", "─".repeat(60));

    for day in Weekday::ALL {
        let bucket = &day_totals[day.index()];
        let commit_intensity = ((bucket.commits as f64 / max_commits as f64) * 5.0) as u32;
        let lines_intensity = ((bucket.lines_changed() as f64 / max_lines as f64) * 5.0) as u32;

        let commit_char = match commit_intensity {
            0 => " ",
            1 => "▁",
            2 => "▃",
            3 => "▅",
            4 => "▇",
            _ => "█",
        };

        let lines_char = match lines_intensity {
            0 => " ",
            1 => "░",
            2 => "▒",
            3 => "▓",
            4 => "█",
            _ => "█",
        };

        println!(
            "{:<9} {} {} commits: {:>4}, lines: {:>7}, prs: {:>3}",
            day.name(),
            style(commit_char).green(),
            style(lines_char).blue(),
            bucket.commits,
            bucket.lines_changed(),
            bucket.prs_opened + bucket.prs_merged + bucket.prs_reviewed
        );
    }

    println!("\n{}", style("Legend").bold());
    println!("  {} commits intensity", style("▁▃▅▇█").green());
    println!("  {} lines intensity", style("░▒▓█").blue());
}
