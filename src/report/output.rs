use crate::cli::CommonArgs;
use crate::model::{PerformanceReport, Snapshot};
use console::style;

pub fn output_table(report: &PerformanceReport, common: &CommonArgs) {
    if report.authors.is_empty() {
        println!("No activity to display");
        return;
    }

    if let (Some(since), Some(until)) = (&common.since, &common.until) {
        println!("Activity from {} to {}", since, until);
    } else if let Some(since) = &common.since {
        println!("Activity since {}", since);
    } else if let Some(until) = &common.until {
        println!("Activity until {}", until);
    } else if let Some(weeks) = common.weeks {
        println!("Activity over the last {} weeks", weeks);
    }

    println!(
        "{:<25} {:>8} {:>9} {:>9} {:>8} {:>8} {:>8}",
        style("Author").bold(),
        style("Commits").bold(),
        style("Added").bold(),
        style("Deleted").bold(),
        style("PRs O").bold(),
        style("PRs M").bold(),
        style("PRs R").bold()
    );
    println!("{}", "─".repeat(82));

    for author in &report.authors {
        let display = if author.usernames.len() > 1 {
            format!("{}*", author.author)
        } else {
            author.author.clone()
        };
        let totals = &author.totals;
        println!(
            "{:<25} {:>8} {:>9} {:>9} {:>8} {:>8} {:>8}",
            display,
            totals.commits,
            totals.additions,
            totals.deletions,
            totals.prs_opened,
            totals.prs_merged,
            totals.prs_reviewed
        );
    }

    let aliased: Vec<_> = report
        .authors
        .iter()
        .filter(|a| a.usernames.len() > 1)
        .collect();
    if !aliased.is_empty() {
        println!();
        for author in aliased {
            println!(
                "{} {}: {}",
                style("*").dim(),
                author.author,
                style(author.usernames.join(", ")).dim()
            );
        }
    }

    let totals = &report.summary.totals;
    println!(
        "\n{} authors, {} commits, {} lines changed",
        style(report.summary.total_authors).cyan(),
        style(totals.commits).cyan(),
        style(totals.lines_changed()).cyan()
    );
}

pub fn print_warnings(snapshot: &Snapshot) {
    if snapshot.partial {
        eprintln!(
            "{} built from incomplete source data",
            style("warning:").yellow().bold()
        );
    }
    for warning in &snapshot.warnings {
        eprintln!(
            "{} {}: {}",
            style("warning:").yellow().bold(),
            warning.origin,
            warning.reason
        );
    }
}
