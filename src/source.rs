use crate::alias::AliasResolver;
use crate::cli::CommonArgs;
use crate::engine::AggregationEngine;
use crate::error::Result;
use crate::git::RepoSource;
use crate::model::{ActivityUnit, DateRange, Snapshot, UnitWarning};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::thread;

const DEFAULT_ALIASES_FILE: &str = "author_aliases.json";

/// One independently fetchable unit stream.
#[derive(Debug, Clone)]
pub enum Source {
    /// NDJSON or JSON-array event file.
    Events(PathBuf),
    /// Local git clone, walked commit by commit.
    Repo(PathBuf),
}

impl Source {
    pub fn label(&self) -> String {
        match self {
            Source::Events(path) => path.display().to_string(),
            Source::Repo(path) => path.display().to_string(),
        }
    }

    fn units(
        &self,
        range: &DateRange,
        include_merges: bool,
        progress: bool,
    ) -> Result<(Vec<ActivityUnit>, Vec<UnitWarning>)> {
        match self {
            Source::Events(path) => read_events(path),
            Source::Repo(path) => {
                let repo = RepoSource::open(path)?;
                let units = repo.collect_commit_units(range, include_merges, progress)?;
                Ok((units, Vec::new()))
            }
        }
    }
}

/// Read activity units from an event file. Undecodable records become
/// warnings carrying their file and line (or array index), never errors.
pub fn read_events(path: &Path) -> Result<(Vec<ActivityUnit>, Vec<UnitWarning>)> {
    let raw = std::fs::read_to_string(path)?;
    let mut units = Vec::new();
    let mut warnings = Vec::new();

    if raw.trim_start().starts_with('[') {
        let values: Vec<serde_json::Value> = serde_json::from_str(&raw)?;
        for (index, value) in values.into_iter().enumerate() {
            match serde_json::from_value::<ActivityUnit>(value) {
                Ok(unit) => units.push(unit),
                Err(e) => warnings.push(UnitWarning {
                    origin: format!("{}[{index}]", path.display()),
                    reason: format!("undecodable event: {e}"),
                }),
            }
        }
    } else {
        for (lineno, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<ActivityUnit>(line) {
                Ok(unit) => units.push(unit),
                Err(e) => warnings.push(UnitWarning {
                    origin: format!("{}:{}", path.display(), lineno + 1),
                    reason: format!("undecodable event: {e}"),
                }),
            }
        }
    }

    Ok((units, warnings))
}

#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub range: DateRange,
    pub include_merges: bool,
    /// Lowercased usernames to drop (bot and service accounts).
    pub exclude: Vec<String>,
    pub jobs: usize,
    pub progress: bool,
}

fn admitted(unit: &ActivityUnit, opts: &CollectOptions) -> bool {
    if opts.exclude.contains(&unit.username().to_lowercase()) {
        return false;
    }
    // Unrepresentable timestamps pass through so the engine records them.
    match DateTime::<Utc>::from_timestamp(unit.timestamp(), 0) {
        Some(ts) => opts.range.contains(&ts),
        None => true,
    }
}

fn ingest_source(engine: &mut AggregationEngine, source: &Source, opts: &CollectOptions, progress: bool) {
    match source.units(&opts.range, opts.include_merges, progress) {
        Ok((units, warnings)) => {
            for warning in warnings {
                engine.push_warning(warning.origin, warning.reason);
            }
            engine.ingest_all(units.into_iter().filter(|unit| admitted(unit, opts)));
        }
        Err(e) => {
            // The run continues on the remaining sources; the snapshot is
            // flagged as built from incomplete data.
            engine.push_warning(source.label(), format!("source failed: {e}"));
            engine.mark_partial();
        }
    }
}

/// Fold all sources into one engine.
///
/// Each worker processes a chunk of sources into a partial engine with no
/// shared state; the reducer merges the partials in source order, so the
/// result does not depend on worker completion order.
pub fn collect(sources: &[Source], resolver: &AliasResolver, opts: &CollectOptions) -> AggregationEngine {
    let workers = opts.jobs.max(1).min(sources.len().max(1));

    if workers <= 1 {
        let mut engine = AggregationEngine::new(resolver.clone());
        for source in sources {
            ingest_source(&mut engine, source, opts, opts.progress && sources.len() == 1);
        }
        return engine;
    }

    let chunk_size = sources.len().div_ceil(workers);
    thread::scope(|scope| {
        let handles: Vec<_> = sources
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    let mut engine = AggregationEngine::new(resolver.clone());
                    for source in chunk {
                        ingest_source(&mut engine, source, opts, false);
                    }
                    engine
                })
            })
            .collect();

        let mut merged = AggregationEngine::new(resolver.clone());
        for handle in handles {
            match handle.join() {
                Ok(partial) => merged = AggregationEngine::merge(merged, partial),
                Err(_) => {
                    merged.push_warning("worker", "source worker panicked");
                    merged.mark_partial();
                }
            }
        }
        merged
    })
}

pub fn load_resolver(common: &CommonArgs) -> anyhow::Result<AliasResolver> {
    match &common.aliases {
        Some(path) => AliasResolver::from_path(path)
            .with_context(|| format!("Failed to load aliases from {}", path.display())),
        None => {
            let default = Path::new(DEFAULT_ALIASES_FILE);
            if default.exists() {
                AliasResolver::from_path(default)
                    .with_context(|| format!("Failed to load aliases from {DEFAULT_ALIASES_FILE}"))
            } else {
                Ok(AliasResolver::default())
            }
        }
    }
}

pub fn build_sources(common: &CommonArgs) -> anyhow::Result<Vec<Source>> {
    let mut sources = Vec::new();
    for path in &common.events {
        anyhow::ensure!(path.exists(), "event file not found: {}", path.display());
        sources.push(Source::Events(path.clone()));
    }
    for path in &common.repos {
        anyhow::ensure!(path.exists(), "repository not found: {}", path.display());
        sources.push(Source::Repo(path.clone()));
    }
    anyhow::ensure!(
        !sources.is_empty(),
        "no sources given; pass --events <file> and/or --repo <path>"
    );
    Ok(sources)
}

/// The full pipeline behind every subcommand: aliases, window, sources,
/// parallel fold, snapshot.
pub fn snapshot_from_args(common: &CommonArgs, progress: bool) -> anyhow::Result<Snapshot> {
    let resolver = load_resolver(common)?;
    let range = crate::util::resolve_range(
        common.since.as_deref(),
        common.until.as_deref(),
        common.weeks,
    )
    .context("Failed to resolve date range")?;
    let sources = build_sources(common)?;

    let opts = CollectOptions {
        range,
        include_merges: common.include_merges,
        exclude: common.exclude.iter().map(|u| u.to_lowercase()).collect(),
        jobs: common.jobs,
        progress,
    };

    let engine = collect(&sources, &resolver, &opts);
    Ok(engine.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    // 2024-01-01 00:00:00 UTC, a Monday.
    const MON: i64 = 1_704_067_200;

    fn options() -> CollectOptions {
        CollectOptions {
            range: DateRange::new(),
            include_merges: false,
            exclude: Vec::new(),
            jobs: 1,
            progress: false,
        }
    }

    fn write_events(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(f, "{line}").unwrap();
        }
        path
    }

    #[test]
    fn ndjson_lines_parse_and_bad_lines_warn() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_events(
            dir.path(),
            "events.ndjson",
            &[
                r#"{"type":"commit","username":"alice","repo":"webapp","timestamp":1704067200,"additions":10,"deletions":2}"#,
                "",
                r#"{"type":"teleport","username":"alice"}"#,
                r#"{"type":"pull_request","username":"bob","repo":"webapp","timestamp":1704067200,"kind":"opened","number":1}"#,
            ],
        );

        let (units, warnings) = read_events(&path).unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].origin.ends_with(":3"));
    }

    #[test]
    fn json_arrays_are_accepted_too() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(
            &path,
            r#"[
                {"type":"commit","username":"alice","repo":"webapp","timestamp":1704067200,"additions":1,"deletions":0},
                {"type":"commit","username":"alice"}
            ]"#,
        )
        .unwrap();

        let (units, warnings) = read_events(&path).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].origin.ends_with("[1]"));
    }

    #[test]
    fn excluded_usernames_are_dropped_before_ingest() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_events(
            dir.path(),
            "events.ndjson",
            &[
                r#"{"type":"commit","username":"alice","repo":"webapp","timestamp":1704067200,"additions":1,"deletions":0}"#,
                r#"{"type":"commit","username":"CI-Bot","repo":"webapp","timestamp":1704067200,"additions":900,"deletions":0,"commit_id":"b1"}"#,
            ],
        );

        let mut opts = options();
        opts.exclude = vec!["ci-bot".to_string()];
        let snapshot = collect(&[Source::Events(path)], &AliasResolver::default(), &opts).finalize();
        assert_eq!(snapshot.authors.len(), 1);
        assert!(snapshot.authors.contains_key("alice"));
        assert!(snapshot.warnings.is_empty());
    }

    #[test]
    fn range_filter_drops_units_outside_the_window() {
        let dir = tempfile::tempdir().unwrap();
        let lines = [
            format!(
                r#"{{"type":"commit","username":"alice","repo":"webapp","timestamp":{MON},"additions":1,"deletions":0,"commit_id":"a1"}}"#
            ),
            format!(
                r#"{{"type":"commit","username":"alice","repo":"webapp","timestamp":{},"additions":1,"deletions":0,"commit_id":"a2"}}"#,
                MON + 30 * 86_400
            ),
        ];
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let path = write_events(dir.path(), "events.ndjson", &refs);

        let mut opts = options();
        opts.range = DateRange::new()
            .with_until(DateTime::<Utc>::from_timestamp(MON + 86_400, 0).unwrap());
        let snapshot = collect(&[Source::Events(path)], &AliasResolver::default(), &opts).finalize();
        assert_eq!(snapshot.authors["alice"].overall.commits, 1);
    }

    #[test]
    fn parallel_collect_matches_sequential() {
        let dir = tempfile::tempdir().unwrap();
        let mut sources = Vec::new();
        for i in 0..4 {
            let lines: Vec<String> = (0..5)
                .map(|j| {
                    format!(
                        r#"{{"type":"commit","username":"user{i}","repo":"repo{j}","timestamp":{},"additions":{j},"deletions":1,"commit_id":"c{i}{j}"}}"#,
                        MON + (i * 5 + j) * 86_400
                    )
                })
                .collect();
            let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
            let path = write_events(dir.path(), &format!("events{i}.ndjson"), &refs);
            sources.push(Source::Events(path));
        }

        let sequential = collect(&sources, &AliasResolver::default(), &options()).finalize();
        let mut opts = options();
        opts.jobs = 4;
        let parallel = collect(&sources, &AliasResolver::default(), &opts).finalize();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn missing_source_marks_snapshot_partial() {
        let missing = Source::Events(PathBuf::from("/nonexistent/events.ndjson"));
        let snapshot = collect(&[missing], &AliasResolver::default(), &options()).finalize();
        assert!(snapshot.partial);
        assert_eq!(snapshot.warnings.len(), 1);
        assert!(snapshot.warnings[0].reason.contains("source failed"));
    }
}
