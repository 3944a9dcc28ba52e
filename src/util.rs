use crate::error::{Result, TallyError};
use crate::model::DateRange;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::time::SystemTime;

/// Parse a window bound: RFC3339, `YYYY-MM-DD`, or a duration back from now
/// (e.g. `90d`, `12weeks`).
pub fn parse_date_expr(input: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(datetime) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&datetime));
        }
    }

    if let Ok(duration) = humantime::parse_duration(input.trim().trim_end_matches(" ago")) {
        let target = SystemTime::now()
            .checked_sub(duration)
            .ok_or_else(|| TallyError::InvalidDate(format!("Duration overflow for '{input}'")))?;
        return Ok(DateTime::<Utc>::from(target));
    }

    Err(TallyError::Parse(format!(
        "Invalid date expression '{input}' (expected RFC3339, YYYY-MM-DD, or a duration like '90d')"
    )))
}

pub fn resolve_range(
    since: Option<&str>,
    until: Option<&str>,
    weeks: Option<u32>,
) -> Result<DateRange> {
    let mut since_dt = since.map(parse_date_expr).transpose()?;
    let until_dt = until.map(parse_date_expr).transpose()?;

    // --weeks opens a window back from now when no explicit start is given.
    if since_dt.is_none() {
        if let Some(weeks) = weeks {
            let duration = chrono::Duration::weeks(i64::from(weeks));
            since_dt = Some(Utc::now() - duration);
        }
    }

    if let (Some(s), Some(u)) = (since_dt, until_dt) {
        if s > u {
            return Err(TallyError::InvalidDate(format!(
                "Invalid range: since ({s}) is after until ({u})"
            )));
        }
    }

    let mut range = DateRange::new();
    if let Some(s) = since_dt {
        range = range.with_since(s);
    }
    if let Some(u) = until_dt {
        range = range.with_until(u);
    }
    Ok(range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_and_plain_dates() {
        let a = parse_date_expr("2024-01-01T12:30:00Z").unwrap();
        assert_eq!(a.timestamp(), 1_704_112_200);
        let b = parse_date_expr("2024-01-01").unwrap();
        assert_eq!(b.timestamp(), 1_704_067_200);
    }

    #[test]
    fn parses_durations_back_from_now() {
        let cutoff = parse_date_expr("90d").unwrap();
        let days = (Utc::now() - cutoff).num_days();
        assert!((89..=90).contains(&days), "got {days}");
        // An " ago" suffix is tolerated.
        assert!(parse_date_expr("2weeks ago").is_ok());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_date_expr("not-a-date").is_err());
    }

    #[test]
    fn rejects_inverted_ranges() {
        let err = resolve_range(Some("2024-02-01"), Some("2024-01-01"), None).unwrap_err();
        assert!(matches!(err, TallyError::InvalidDate(_)), "got {err:?}");
    }

    #[test]
    fn weeks_window_sets_since_only_when_absent() {
        let range = resolve_range(None, None, Some(4)).unwrap();
        let since = range.since.unwrap();
        assert!((Utc::now() - since).num_days() >= 27);

        let explicit = resolve_range(Some("2024-01-01"), None, Some(4)).unwrap();
        assert_eq!(explicit.since.unwrap().timestamp(), 1_704_067_200);
    }
}
