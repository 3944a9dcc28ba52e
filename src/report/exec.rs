use crate::cli::CommonArgs;
use crate::model::{
    combined_day_totals, AuthorReport, DayBucket, PerformanceReport, ReportRow, ReportSummary,
    Snapshot, Weekday, SCHEMA_VERSION,
};
use crate::render::ReportFormat;
use crate::trend::{self, RankMetric};
use anyhow::Context;
use chrono::Utc;
use std::io::Write;

pub fn exec(
    common: CommonArgs,
    json: bool,
    ndjson: bool,
    markdown: bool,
    csv: bool,
) -> anyhow::Result<()> {
    let table = !json && !ndjson && !markdown && !csv;
    let snapshot = crate::source::snapshot_from_args(&common, table)
        .context("Failed to collect activity")?;
    let report = build_report(&snapshot, common.since.clone(), common.until.clone());

    if json {
        write_rendered(ReportFormat::Json, &report)?;
    } else if markdown {
        write_rendered(ReportFormat::Markdown, &report)?;
    } else if csv {
        write_rendered(ReportFormat::Csv, &report)?;
    } else if ndjson {
        for row in flat_rows(&report) {
            println!("{}", serde_json::to_string(row)?);
        }
    } else {
        super::output::output_table(&report, &common);
        super::output::print_warnings(&snapshot);
    }

    Ok(())
}

fn write_rendered(format: ReportFormat, report: &PerformanceReport) -> anyhow::Result<()> {
    let bytes = format.render(report).context("Failed to render report")?;
    std::io::stdout().write_all(&bytes)?;
    Ok(())
}

/// All rows of the report in its flat, stable-schema form: per-author day
/// rows, per-author totals, then cross-author day totals.
fn flat_rows(report: &PerformanceReport) -> impl Iterator<Item = &ReportRow> {
    report
        .authors
        .iter()
        .flat_map(|author| author.by_day.iter().chain(std::iter::once(&author.totals)))
        .chain(report.by_day.iter())
}

/// Assemble the report envelope from a finished snapshot. Authors are ordered
/// by total commits (name-tie-broken), day rows skip empty weekdays.
pub fn build_report(
    snapshot: &Snapshot,
    since: Option<String>,
    until: Option<String>,
) -> PerformanceReport {
    let day_totals = combined_day_totals(snapshot);
    let mut totals = DayBucket::default();
    for aggregate in snapshot.authors.values() {
        totals.add(&aggregate.overall);
    }

    let by_day = Weekday::ALL
        .iter()
        .filter(|day| !day_totals[day.index()].is_empty())
        .map(|day| ReportRow::new("All", day.name(), &day_totals[day.index()]))
        .collect();

    let authors = trend::rank_authors(snapshot.authors.values(), RankMetric::Commits)
        .into_iter()
        .map(|aggregate| AuthorReport {
            author: aggregate.author.clone(),
            usernames: aggregate.usernames.iter().cloned().collect(),
            totals: ReportRow::new(&aggregate.author, "All", &aggregate.overall),
            by_day: Weekday::ALL
                .iter()
                .filter(|day| !aggregate.combined[day.index()].is_empty())
                .map(|day| {
                    ReportRow::new(&aggregate.author, day.name(), &aggregate.combined[day.index()])
                })
                .collect(),
            trend: trend::summarize(aggregate),
        })
        .collect();

    PerformanceReport {
        version: SCHEMA_VERSION,
        generated_at: Utc::now(),
        since,
        until,
        partial: snapshot.partial,
        summary: ReportSummary {
            total_authors: snapshot.authors.len(),
            totals,
        },
        by_day,
        authors,
        warnings: snapshot.warnings.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::AliasResolver;
    use crate::engine::AggregationEngine;
    use crate::model::{ActivityUnit, PrKind};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    // 2024-01-01 00:00:00 UTC, a Monday.
    const MON: i64 = 1_704_067_200;

    fn snapshot() -> Snapshot {
        let resolver = AliasResolver::load(BTreeMap::from([(
            "alice".to_string(),
            vec!["alice1".to_string(), "alice2".to_string()],
        )]))
        .unwrap();
        let mut engine = AggregationEngine::new(resolver);
        engine.ingest(ActivityUnit::Commit {
            username: "alice1".into(),
            repo: "repo-a".into(),
            timestamp: MON,
            additions: 10,
            deletions: 2,
            commit_id: Some("a1".into()),
        });
        engine.ingest(ActivityUnit::Commit {
            username: "alice2".into(),
            repo: "repo-b".into(),
            timestamp: MON,
            additions: 3,
            deletions: 1,
            commit_id: Some("a2".into()),
        });
        engine.ingest(ActivityUnit::PullRequest {
            username: "bob".into(),
            repo: "repo-a".into(),
            timestamp: MON + 4 * 86_400,
            kind: PrKind::Opened,
            number: 7,
        });
        engine.finalize()
    }

    #[test]
    fn report_groups_aliases_and_keeps_stable_shapes() {
        let report = build_report(&snapshot(), None, None);

        assert_eq!(report.summary.total_authors, 2);
        assert_eq!(report.summary.totals.commits, 2);
        assert_eq!(report.summary.totals.additions, 13);

        // Authors ranked by commits, bob trailing with zero.
        assert_eq!(report.authors[0].author, "alice");
        assert_eq!(report.authors[1].author, "bob");
        assert_eq!(
            report.authors[0].usernames,
            vec!["alice1".to_string(), "alice2".to_string()]
        );

        let alice_monday = &report.authors[0].by_day[0];
        assert_eq!(alice_monday.weekday, "Monday");
        assert_eq!(alice_monday.commits, 2);
        assert_eq!(alice_monday.additions, 13);
        assert_eq!(alice_monday.deletions, 3);

        // Cross-author rows carry the same schema under author "All".
        assert_eq!(report.by_day[0].author, "All");
        assert_eq!(report.by_day[0].weekday, "Monday");
        assert_eq!(report.by_day[1].weekday, "Friday");
        assert_eq!(report.by_day[1].prs_opened, 1);
    }

    #[test]
    fn flat_rows_cover_authors_then_totals_then_days() {
        let report = build_report(&snapshot(), None, None);
        let rows: Vec<(&str, &str)> = flat_rows(&report)
            .map(|row| (row.author.as_str(), row.weekday.as_str()))
            .collect();
        assert_eq!(
            rows,
            [
                ("alice", "Monday"),
                ("alice", "All"),
                ("bob", "Friday"),
                ("bob", "All"),
                ("All", "Monday"),
                ("All", "Friday"),
            ]
        );
    }
}
