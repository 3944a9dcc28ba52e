use crate::alias::AliasResolver;
use crate::model::{ActivityUnit, AuthorAggregate, DayBucket, Snapshot, UnitWarning, Weekday};
use std::collections::{BTreeMap, HashSet};

/// Folds activity units into per-author, per-repository, per-weekday buckets.
///
/// Ingestion is idempotent (a unit's natural key is only counted once per
/// run), resolution is total, and malformed units degrade to warnings rather
/// than errors. The author map is ordered so snapshots serialize
/// deterministically regardless of ingest order.
///
/// The run lifecycle is enforced by ownership: `snapshot` copies the state at
/// any point, while `finalize` consumes the engine, so nothing can be
/// ingested after finalization. A new run starts from a fresh engine.
pub struct AggregationEngine {
    resolver: AliasResolver,
    authors: BTreeMap<String, AuthorAggregate>,
    seen: HashSet<String>,
    warnings: Vec<UnitWarning>,
    partial: bool,
}

impl AggregationEngine {
    pub fn new(resolver: AliasResolver) -> Self {
        Self {
            resolver,
            authors: BTreeMap::new(),
            seen: HashSet::new(),
            warnings: Vec::new(),
            partial: false,
        }
    }

    /// Fold one unit into the aggregates.
    ///
    /// A unit whose key was already seen changes nothing. A unit with
    /// negative deltas or an unrepresentable timestamp is skipped, recorded
    /// as a warning, and not marked seen; it never touches any bucket.
    pub fn ingest(&mut self, unit: ActivityUnit) {
        let key = unit.dedup_key();
        if self.seen.contains(&key) {
            return;
        }

        let delta = match self.validate(&unit) {
            Ok(delta) => delta,
            Err(reason) => {
                self.warnings.push(UnitWarning {
                    origin: unit.describe(),
                    reason,
                });
                return;
            }
        };
        // Checked by validate above.
        let Some(day) = Weekday::from_timestamp(unit.timestamp()) else {
            return;
        };

        let canonical = self.resolver.resolve(unit.username()).to_string();
        self.authors
            .entry(canonical.clone())
            .or_insert_with(|| AuthorAggregate::new(canonical))
            .record(unit.username(), unit.repo(), day, &delta);
        self.seen.insert(key);
    }

    pub fn ingest_all<I: IntoIterator<Item = ActivityUnit>>(&mut self, units: I) {
        for unit in units {
            self.ingest(unit);
        }
    }

    fn validate(&self, unit: &ActivityUnit) -> std::result::Result<DayBucket, String> {
        if Weekday::from_timestamp(unit.timestamp()).is_none() {
            return Err(format!("timestamp {} is out of range", unit.timestamp()));
        }
        match unit {
            ActivityUnit::Commit {
                additions,
                deletions,
                ..
            } => {
                if *additions < 0 || *deletions < 0 {
                    return Err(format!(
                        "negative line counts (+{additions}/-{deletions})"
                    ));
                }
                Ok(DayBucket {
                    commits: 1,
                    additions: *additions as u64,
                    deletions: *deletions as u64,
                    ..DayBucket::default()
                })
            }
            ActivityUnit::PullRequest { kind, .. } => {
                let mut delta = DayBucket::default();
                match kind {
                    crate::model::PrKind::Opened => delta.prs_opened = 1,
                    crate::model::PrKind::Merged => delta.prs_merged = 1,
                    crate::model::PrKind::Reviewed => delta.prs_reviewed = 1,
                }
                Ok(delta)
            }
        }
    }

    /// Record a problem reported by a source (unreadable line, failed
    /// worker) so it travels with the snapshot.
    pub fn push_warning(&mut self, origin: impl Into<String>, reason: impl Into<String>) {
        self.warnings.push(UnitWarning {
            origin: origin.into(),
            reason: reason.into(),
        });
    }

    /// Flag the run as built from incomplete data. Set by the source layer
    /// when a worker fails mid-run; never set by the engine itself.
    pub fn mark_partial(&mut self) {
        self.partial = true;
    }

    /// Copy of the current state; callable at any point during ingestion.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            authors: self.authors.clone(),
            warnings: self.warnings.clone(),
            partial: self.partial,
        }
    }

    /// Consume the engine, ending the run.
    pub fn finalize(self) -> Snapshot {
        Snapshot {
            authors: self.authors,
            warnings: self.warnings,
            partial: self.partial,
        }
    }

    /// Fold two partial engines built from disjoint sources into one.
    ///
    /// Counters merge associatively and commutatively; dedup sets union so a
    /// unit delivered to both partials still counts once. Warnings keep
    /// `a`-then-`b` order, which is why the reducer folds partials in fixed
    /// source order.
    pub fn merge(a: Self, b: Self) -> Self {
        let mut merged = a;
        for (author, aggregate) in b.authors {
            match merged.authors.get_mut(&author) {
                Some(existing) => *existing = existing.merge(&aggregate),
                None => {
                    merged.authors.insert(author, aggregate);
                }
            }
        }
        merged.seen.extend(b.seen);
        merged.warnings.extend(b.warnings);
        merged.partial = merged.partial || b.partial;
        merged
    }
}
