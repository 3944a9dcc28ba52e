use crate::cli::CommonArgs;
use crate::model::{
    AuthorAggregate, DayBucket, GrowthRate, TrendSummary, Weekday, SCHEMA_VERSION,
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use console::style;
use serde::Serialize;

/// Growth of total activity (commits plus PR events) between the week
/// halves Mon-Wed and Thu-Sun. `Undefined` when the first half is empty but
/// the second is not.
pub fn growth_rate(aggregate: &AuthorAggregate) -> GrowthRate {
    let first: u64 = aggregate.combined[..3].iter().map(DayBucket::events).sum();
    let second: u64 = aggregate.combined[3..].iter().map(DayBucket::events).sum();
    if first > 0 {
        GrowthRate::Ratio((second as f64 - first as f64) / first as f64)
    } else if second == 0 {
        GrowthRate::Ratio(0.0)
    } else {
        GrowthRate::Undefined
    }
}

/// Weekday with the most commits; ties break to the earliest weekday.
pub fn peak_weekday(aggregate: &AuthorAggregate) -> Weekday {
    let mut best = Weekday::Monday;
    for day in Weekday::ALL {
        if aggregate.combined[day.index()].commits > aggregate.combined[best.index()].commits {
            best = day;
        }
    }
    best
}

/// Fraction of weekdays with at least one commit, in `[0, 1]`.
pub fn consistency_score(aggregate: &AuthorAggregate) -> f64 {
    let active = aggregate
        .combined
        .iter()
        .filter(|bucket| bucket.commits > 0)
        .count();
    active as f64 / 7.0
}

pub fn summarize(aggregate: &AuthorAggregate) -> TrendSummary {
    TrendSummary {
        author: aggregate.author.clone(),
        growth_rate: growth_rate(aggregate),
        peak_weekday: peak_weekday(aggregate),
        consistency: consistency_score(aggregate),
        totals: aggregate.overall,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    Commits,
    Additions,
    Deletions,
    LinesChanged,
    PrsOpened,
    PrsMerged,
    PrsReviewed,
}

impl RankMetric {
    pub fn value(self, aggregate: &AuthorAggregate) -> u64 {
        let totals = &aggregate.overall;
        match self {
            RankMetric::Commits => totals.commits,
            RankMetric::Additions => totals.additions,
            RankMetric::Deletions => totals.deletions,
            RankMetric::LinesChanged => totals.lines_changed(),
            RankMetric::PrsOpened => totals.prs_opened,
            RankMetric::PrsMerged => totals.prs_merged,
            RankMetric::PrsReviewed => totals.prs_reviewed,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RankMetric::Commits => "commits",
            RankMetric::Additions => "additions",
            RankMetric::Deletions => "deletions",
            RankMetric::LinesChanged => "lines changed",
            RankMetric::PrsOpened => "PRs opened",
            RankMetric::PrsMerged => "PRs merged",
            RankMetric::PrsReviewed => "PRs reviewed",
        }
    }
}

/// Authors sorted descending by `metric`; ties break by canonical name so
/// rankings are reproducible.
pub fn rank_authors<'a, I>(aggregates: I, metric: RankMetric) -> Vec<&'a AuthorAggregate>
where
    I: IntoIterator<Item = &'a AuthorAggregate>,
{
    let mut ranked: Vec<&AuthorAggregate> = aggregates.into_iter().collect();
    ranked.sort_by(|a, b| {
        metric
            .value(b)
            .cmp(&metric.value(a))
            .then_with(|| a.author.cmp(&b.author))
    });
    ranked
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendsOutput {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub metric: RankMetric,
    pub trends: Vec<TrendSummary>,
}

pub fn exec(common: CommonArgs, json: bool, ndjson: bool, metric: RankMetric) -> anyhow::Result<()> {
    let snapshot = crate::source::snapshot_from_args(&common, !json && !ndjson)
        .context("Failed to collect activity")?;

    let ranked = rank_authors(snapshot.authors.values(), metric);
    let trends: Vec<TrendSummary> = ranked.iter().map(|agg| summarize(agg)).collect();

    if json {
        let output = TrendsOutput {
            version: SCHEMA_VERSION,
            generated_at: Utc::now(),
            metric,
            trends,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if ndjson {
        for trend in &trends {
            println!("{}", serde_json::to_string(trend)?);
        }
    } else {
        output_table(&ranked, &trends, metric);
        crate::report::output::print_warnings(&snapshot);
    }

    Ok(())
}

fn output_table(ranked: &[&AuthorAggregate], trends: &[TrendSummary], metric: RankMetric) {
    if ranked.is_empty() {
        println!("No activity to display");
        return;
    }

    println!(
        "{:<25} {:>12} {:>12} {:>10} {:>12}",
        style("Author").bold(),
        style(metric.label()).bold(),
        style("Growth").bold(),
        style("Peak").bold(),
        style("Consistency").bold()
    );
    println!("{}", "─".repeat(76));

    for (aggregate, trend) in ranked.iter().zip(trends) {
        println!(
            "{:<25} {:>12} {:>12} {:>10} {:>11.0}%",
            aggregate.author,
            metric.value(aggregate),
            trend.growth_rate.to_string(),
            trend.peak_weekday.short_name(),
            trend.consistency * 100.0
        );
    }
}
