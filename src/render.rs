use crate::error::Result;
use crate::model::{PerformanceReport, ReportRow, Weekday};
use std::fmt::Write as _;

/// Closed set of file output formats, all rendering the same report through
/// one contract. The aggregation core stays ignorant of rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Markdown,
    Csv,
    Json,
}

impl ReportFormat {
    pub fn render(&self, report: &PerformanceReport) -> Result<Vec<u8>> {
        match self {
            ReportFormat::Markdown => Ok(render_markdown(report).into_bytes()),
            ReportFormat::Csv => Ok(render_csv(report).into_bytes()),
            ReportFormat::Json => Ok(serde_json::to_vec_pretty(report)?),
        }
    }
}

fn render_markdown(report: &PerformanceReport) -> String {
    let mut out = String::new();

    out.push_str("# Contributor Performance Report\n\n");
    let _ = writeln!(
        out,
        "Generated: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    match (&report.since, &report.until) {
        (Some(since), Some(until)) => {
            let _ = writeln!(out, "Window: {since} to {until}");
        }
        (Some(since), None) => {
            let _ = writeln!(out, "Window: since {since}");
        }
        (None, Some(until)) => {
            let _ = writeln!(out, "Window: until {until}");
        }
        (None, None) => {}
    }
    if report.partial {
        out.push_str("\n> Note: built from incomplete source data.\n");
    }

    out.push_str("\n## Summary\n\n");
    let totals = &report.summary.totals;
    let _ = writeln!(out, "- **Authors**: {}", report.summary.total_authors);
    let _ = writeln!(out, "- **Commits**: {}", totals.commits);
    let _ = writeln!(out, "- **Additions**: {}", totals.additions);
    let _ = writeln!(out, "- **Deletions**: {}", totals.deletions);
    let _ = writeln!(
        out,
        "- **PRs opened / merged / reviewed**: {} / {} / {}",
        totals.prs_opened, totals.prs_merged, totals.prs_reviewed
    );

    out.push_str("\n## Activity by Day of Week\n\n");
    out.push_str("| Day | Commits | Additions | Deletions | PRs Opened | PRs Merged | PRs Reviewed |\n");
    out.push_str("|-----|---------|-----------|-----------|------------|------------|--------------|\n");
    for row in &report.by_day {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} |",
            row.weekday,
            row.commits,
            row.additions,
            row.deletions,
            row.prs_opened,
            row.prs_merged,
            row.prs_reviewed
        );
    }

    out.push_str("\n## Performance by Author\n\n");
    out.push_str("| Author | Commits | Additions | Deletions | Lines Changed | PRs Opened | PRs Merged | PRs Reviewed |\n");
    out.push_str("|--------|---------|-----------|-----------|---------------|------------|------------|--------------|\n");
    for author in &report.authors {
        let totals = &author.totals;
        let display = if author.usernames.len() > 1 {
            format!("{}*", author.author)
        } else {
            author.author.clone()
        };
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} | {} |",
            display,
            totals.commits,
            totals.additions,
            totals.deletions,
            totals.additions + totals.deletions,
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
        out.push_str("\n_* Merged identities:_\n");
        for author in aliased {
            let _ = writeln!(out, "- {}: {}", author.author, author.usernames.join(", "));
        }
    }

    out.push_str("\n## Trends\n\n");
    out.push_str("| Author | Growth | Peak Day | Consistency |\n");
    out.push_str("|--------|--------|----------|-------------|\n");
    for author in &report.authors {
        let trend = &author.trend;
        let _ = writeln!(
            out,
            "| {} | {} | {} | {:.0}% |",
            author.author,
            trend.growth_rate,
            trend.peak_weekday,
            trend.consistency * 100.0
        );
    }

    out.push_str("\n## Activity by Author and Day\n\n");
    for author in &report.authors {
        let _ = writeln!(out, "### {}\n", author.author);
        out.push_str("| Mon | Tue | Wed | Thu | Fri | Sat | Sun | Total |\n");
        out.push_str("|-----|-----|-----|-----|-----|-----|-----|-------|\n");
        let mut cells: Vec<String> = Vec::with_capacity(8);
        for day in Weekday::ALL {
            let commits = author
                .by_day
                .iter()
                .find(|row| row.weekday == day.name())
                .map(|row| row.commits)
                .unwrap_or(0);
            cells.push(commits.to_string());
        }
        cells.push(author.totals.commits.to_string());
        let _ = writeln!(out, "| {} |", cells.join(" | "));
        out.push('\n');
    }

    if !report.warnings.is_empty() {
        out.push_str("## Warnings\n\n");
        for warning in &report.warnings {
            let _ = writeln!(out, "- {}: {}", warning.origin, warning.reason);
        }
    }

    out
}

fn render_csv(report: &PerformanceReport) -> String {
    let mut out = String::new();
    out.push_str("author,weekday,commits,additions,deletions,prs_opened,prs_merged,prs_reviewed\n");

    for author in &report.authors {
        for row in &author.by_day {
            push_csv_row(&mut out, row);
        }
        push_csv_row(&mut out, &author.totals);
    }
    for row in &report.by_day {
        push_csv_row(&mut out, row);
    }

    out
}

fn push_csv_row(out: &mut String, row: &ReportRow) {
    let _ = writeln!(
        out,
        "{},{},{},{},{},{},{},{}",
        csv_field(&row.author),
        csv_field(&row.weekday),
        row.commits,
        row.additions,
        row.deletions,
        row.prs_opened,
        row.prs_merged,
        row.prs_reviewed
    );
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
