use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const SCHEMA_VERSION: u32 = 1;

/// Calendar weekday of an event, derived from its own UTC timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    /// Weekday of a UTC epoch timestamp; `None` when the timestamp is outside
    /// the representable range.
    pub fn from_timestamp(secs: i64) -> Option<Weekday> {
        let dt = DateTime::<Utc>::from_timestamp(secs, 0)?;
        Some(Weekday::ALL[dt.weekday().num_days_from_monday() as usize])
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
            Weekday::Sunday => "Sunday",
        }
    }

    pub fn short_name(self) -> &'static str {
        &self.name()[..3]
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrKind {
    Opened,
    Merged,
    Reviewed,
}

impl PrKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PrKind::Opened => "opened",
            PrKind::Merged => "merged",
            PrKind::Reviewed => "reviewed",
        }
    }
}

/// One atomic, deduplicable activity event as it arrives from a source.
///
/// `timestamp` is UTC epoch seconds and `additions`/`deletions` are signed,
/// both exactly as received; the engine validates them so bad values become
/// warnings instead of parse failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityUnit {
    Commit {
        username: String,
        repo: String,
        timestamp: i64,
        additions: i64,
        deletions: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        commit_id: Option<String>,
    },
    PullRequest {
        username: String,
        repo: String,
        timestamp: i64,
        kind: PrKind,
        number: u64,
    },
}

impl ActivityUnit {
    pub fn username(&self) -> &str {
        match self {
            ActivityUnit::Commit { username, .. } => username,
            ActivityUnit::PullRequest { username, .. } => username,
        }
    }

    pub fn repo(&self) -> &str {
        match self {
            ActivityUnit::Commit { repo, .. } => repo,
            ActivityUnit::PullRequest { repo, .. } => repo,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            ActivityUnit::Commit { timestamp, .. } => *timestamp,
            ActivityUnit::PullRequest { timestamp, .. } => *timestamp,
        }
    }

    /// Natural dedup key. Usernames compare case-insensitively, commits
    /// without an id fall back to their timestamp.
    pub fn dedup_key(&self) -> String {
        match self {
            ActivityUnit::Commit {
                username,
                repo,
                commit_id: Some(id),
                ..
            } => format!("commit:{}:{}:{}", username.to_lowercase(), repo, id),
            ActivityUnit::Commit {
                username,
                repo,
                timestamp,
                ..
            } => format!("commit:{}:{}:@{}", username.to_lowercase(), repo, timestamp),
            ActivityUnit::PullRequest {
                username,
                repo,
                kind,
                number,
                ..
            } => format!(
                "pr:{}:{}:{}:{}",
                username.to_lowercase(),
                repo,
                kind.as_str(),
                number
            ),
        }
    }

    /// Short description for warning messages.
    pub fn describe(&self) -> String {
        match self {
            ActivityUnit::Commit {
                username,
                repo,
                timestamp,
                ..
            } => format!("commit by {username} in {repo} at {timestamp}"),
            ActivityUnit::PullRequest {
                username,
                repo,
                kind,
                number,
                ..
            } => format!("pr #{number} {} by {username} in {repo}", kind.as_str()),
        }
    }
}

/// Counters for one (author, repository, weekday) cell. All additive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayBucket {
    pub commits: u64,
    pub additions: u64,
    pub deletions: u64,
    pub prs_opened: u64,
    pub prs_merged: u64,
    pub prs_reviewed: u64,
}

impl DayBucket {
    pub fn add(&mut self, other: &DayBucket) {
        self.commits += other.commits;
        self.additions += other.additions;
        self.deletions += other.deletions;
        self.prs_opened += other.prs_opened;
        self.prs_merged += other.prs_merged;
        self.prs_reviewed += other.prs_reviewed;
    }

    pub fn lines_changed(&self) -> u64 {
        self.additions + self.deletions
    }

    /// Count of events (commits plus PR actions), the "total activity" used
    /// by trend calculations.
    pub fn events(&self) -> u64 {
        self.commits + self.prs_opened + self.prs_merged + self.prs_reviewed
    }

    pub fn is_empty(&self) -> bool {
        *self == DayBucket::default()
    }
}

pub fn empty_week() -> [DayBucket; 7] {
    [DayBucket::default(); 7]
}

/// All activity of one canonical author.
///
/// `combined[d]` is the sum over repositories for weekday `d`, and `overall`
/// the sum of `combined` over weekdays; both are maintained incrementally so
/// they hold after every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorAggregate {
    pub author: String,
    pub usernames: BTreeSet<String>,
    pub repos: BTreeMap<String, [DayBucket; 7]>,
    pub combined: [DayBucket; 7],
    pub overall: DayBucket,
}

impl AuthorAggregate {
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            usernames: BTreeSet::new(),
            repos: BTreeMap::new(),
            combined: empty_week(),
            overall: DayBucket::default(),
        }
    }

    /// Apply one accepted unit's delta to the `(repo, day)` cell and to the
    /// derived totals.
    pub fn record(&mut self, username: &str, repo: &str, day: Weekday, delta: &DayBucket) {
        self.usernames.insert(username.to_string());
        let buckets = self
            .repos
            .entry(repo.to_string())
            .or_insert_with(empty_week);
        buckets[day.index()].add(delta);
        self.combined[day.index()].add(delta);
        self.overall.add(delta);
    }

    /// Pure counter combination of two partial aggregates for the same
    /// canonical author. Associative and commutative in every counter.
    pub fn merge(&self, other: &AuthorAggregate) -> AuthorAggregate {
        debug_assert_eq!(self.author, other.author);
        let mut merged = self.clone();
        merged
            .usernames
            .extend(other.usernames.iter().cloned());
        for (repo, days) in &other.repos {
            let buckets = merged
                .repos
                .entry(repo.clone())
                .or_insert_with(empty_week);
            for (bucket, day) in buckets.iter_mut().zip(days.iter()) {
                bucket.add(day);
            }
        }
        for (bucket, day) in merged.combined.iter_mut().zip(other.combined.iter()) {
            bucket.add(day);
        }
        merged.overall.add(&other.overall);
        merged
    }
}

/// A skipped unit or source problem, carried alongside the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitWarning {
    pub origin: String,
    pub reason: String,
}

/// Immutable view of the engine state at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub authors: BTreeMap<String, AuthorAggregate>,
    pub warnings: Vec<UnitWarning>,
    pub partial: bool,
}

/// Per-weekday totals across all authors in a snapshot.
pub fn combined_day_totals(snapshot: &Snapshot) -> [DayBucket; 7] {
    let mut totals = empty_week();
    for aggregate in snapshot.authors.values() {
        for (total, day) in totals.iter_mut().zip(aggregate.combined.iter()) {
            total.add(day);
        }
    }
    totals
}

#[derive(Debug, Clone)]
pub struct DateRange {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new() -> Self {
        Self { since: None, until: None }
    }

    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        if let Some(since) = self.since {
            if timestamp < &since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if timestamp > &until {
                return false;
            }
        }
        true
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self::new()
    }
}

/// Weekday activity growth between week halves. `Undefined` stands in for a
/// division by zero and renders as the string `"undefined"`, never as a NaN
/// or infinity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GrowthRate {
    Ratio(f64),
    Undefined,
}

impl Serialize for GrowthRate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            GrowthRate::Ratio(r) => serializer.serialize_f64(*r),
            GrowthRate::Undefined => serializer.serialize_str("undefined"),
        }
    }
}

impl fmt::Display for GrowthRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrowthRate::Ratio(r) => write!(f, "{:+.0}%", r * 100.0),
            GrowthRate::Undefined => f.write_str("undefined"),
        }
    }
}

/// Derived, read-only trend view over one finished aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSummary {
    pub author: String,
    pub growth_rate: GrowthRate,
    pub peak_weekday: Weekday,
    pub consistency: f64,
    pub totals: DayBucket,
}

/// One flat output row. The column schema is stable regardless of alias-file
/// content; `weekday` is a day name, or `"All"` for totals rows, and summary
/// rows across authors carry `author = "All"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub author: String,
    pub weekday: String,
    pub commits: u64,
    pub additions: u64,
    pub deletions: u64,
    pub prs_opened: u64,
    pub prs_merged: u64,
    pub prs_reviewed: u64,
}

impl ReportRow {
    pub fn new(author: impl Into<String>, weekday: impl Into<String>, bucket: &DayBucket) -> Self {
        Self {
            author: author.into(),
            weekday: weekday.into(),
            commits: bucket.commits,
            additions: bucket.additions,
            deletions: bucket.deletions,
            prs_opened: bucket.prs_opened,
            prs_merged: bucket.prs_merged,
            prs_reviewed: bucket.prs_reviewed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub total_authors: usize,
    pub totals: DayBucket,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorReport {
    pub author: String,
    pub usernames: Vec<String>,
    pub totals: ReportRow,
    pub by_day: Vec<ReportRow>,
    pub trend: TrendSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub partial: bool,
    pub summary: ReportSummary,
    pub by_day: Vec<ReportRow>,
    pub authors: Vec<AuthorReport>,
    pub warnings: Vec<UnitWarning>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // 2024-01-01 00:00:00 UTC was a Monday.
    const MON: i64 = 1_704_067_200;

    fn commit_delta(additions: u64, deletions: u64) -> DayBucket {
        DayBucket {
            commits: 1,
            additions,
            deletions,
            ..DayBucket::default()
        }
    }

    #[test]
    fn weekday_from_midnight_is_that_day() {
        assert_eq!(Weekday::from_timestamp(MON), Some(Weekday::Monday));
        // One second earlier belongs to Sunday.
        assert_eq!(Weekday::from_timestamp(MON - 1), Some(Weekday::Sunday));
        // End of Monday is still Monday.
        assert_eq!(
            Weekday::from_timestamp(MON + 86_399),
            Some(Weekday::Monday)
        );
    }

    #[test]
    fn weekday_covers_the_whole_week() {
        let names: Vec<_> = (0..7)
            .map(|d| Weekday::from_timestamp(MON + d * 86_400).unwrap().name())
            .collect();
        assert_eq!(
            names,
            [
                "Monday",
                "Tuesday",
                "Wednesday",
                "Thursday",
                "Friday",
                "Saturday",
                "Sunday"
            ]
        );
    }

    #[test]
    fn dedup_key_is_case_insensitive_on_username() {
        let a = ActivityUnit::Commit {
            username: "Alice".into(),
            repo: "webapp".into(),
            timestamp: MON,
            additions: 1,
            deletions: 0,
            commit_id: Some("abc".into()),
        };
        let b = ActivityUnit::Commit {
            username: "alice".into(),
            repo: "webapp".into(),
            timestamp: MON,
            additions: 1,
            deletions: 0,
            commit_id: Some("abc".into()),
        };
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn pr_kinds_produce_distinct_keys_for_same_number() {
        let opened = ActivityUnit::PullRequest {
            username: "bob".into(),
            repo: "webapp".into(),
            timestamp: MON,
            kind: PrKind::Opened,
            number: 7,
        };
        let merged = ActivityUnit::PullRequest {
            username: "bob".into(),
            repo: "webapp".into(),
            timestamp: MON + 3600,
            kind: PrKind::Merged,
            number: 7,
        };
        assert_ne!(opened.dedup_key(), merged.dedup_key());
    }

    #[test]
    fn unit_wire_format_round_trips() {
        let line = r#"{"type":"pull_request","username":"bob","repo":"webapp","timestamp":1704067200,"kind":"reviewed","number":41}"#;
        let unit: ActivityUnit = serde_json::from_str(line).unwrap();
        assert_eq!(
            unit,
            ActivityUnit::PullRequest {
                username: "bob".into(),
                repo: "webapp".into(),
                timestamp: MON,
                kind: PrKind::Reviewed,
                number: 41,
            }
        );
    }

    #[test]
    fn record_maintains_combined_and_overall() {
        let mut agg = AuthorAggregate::new("alice");
        agg.record("alice1", "repo-a", Weekday::Monday, &commit_delta(10, 2));
        agg.record("alice2", "repo-b", Weekday::Monday, &commit_delta(3, 1));
        agg.record("alice1", "repo-a", Weekday::Friday, &commit_delta(5, 5));

        assert_eq!(agg.combined[Weekday::Monday.index()].commits, 2);
        assert_eq!(agg.combined[Weekday::Monday.index()].additions, 13);
        assert_eq!(agg.combined[Weekday::Monday.index()].deletions, 3);
        assert_eq!(agg.overall.commits, 3);
        assert_eq!(agg.overall.additions, 18);

        // combined[d] == sum over repos, overall == sum over days
        for day in Weekday::ALL {
            let mut sum = DayBucket::default();
            for days in agg.repos.values() {
                sum.add(&days[day.index()]);
            }
            assert_eq!(agg.combined[day.index()], sum);
        }
        let mut total = DayBucket::default();
        for bucket in &agg.combined {
            total.add(bucket);
        }
        assert_eq!(agg.overall, total);
    }

    #[test]
    fn merge_is_commutative_and_associative() {
        let mut a = AuthorAggregate::new("alice");
        a.record("alice1", "repo-a", Weekday::Monday, &commit_delta(10, 2));
        let mut b = AuthorAggregate::new("alice");
        b.record("alice2", "repo-b", Weekday::Tuesday, &commit_delta(3, 1));
        let mut c = AuthorAggregate::new("alice");
        c.record("alice1", "repo-a", Weekday::Monday, &commit_delta(7, 0));

        assert_eq!(a.merge(&b), b.merge(&a));
        assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
    }
}
