//! Outreach results table (results.csv): one row per ref tag, recording
//! when the first email went out, when (if ever) a reply came back, and
//! the rep-assigned status.
//!
//! The mail-client sync never overwrites what a human recorded: an
//! existing DateReplied or non-empty Status survives any later upsert
//! for the same ref.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;

use crate::error::{StoreError, StoreResult};
use crate::metrics;
use crate::paths::AppPaths;
use crate::store::{self, Schema};

pub const RESULT_FIELDS: [&str; 8] = [
    "Ref",
    "Email",
    "Company",
    "Industry",
    "DateSent",
    "DateReplied",
    "Status",
    "Subject",
];

pub fn result_schema() -> Schema {
    Schema::new(&RESULT_FIELDS)
}

/// One parsed row of results.csv.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRecord {
    pub ref_tag: String,
    pub email: String,
    pub company: String,
    pub industry: String,
    pub date_sent: String,
    pub date_replied: String,
    pub status: String,
    pub subject: String,
}

impl ResultRecord {
    fn from_row(row: &[String], schema: &Schema) -> Self {
        ResultRecord {
            ref_tag: store::row_get(row, schema, "Ref").to_string(),
            email: store::row_get(row, schema, "Email").to_string(),
            company: store::row_get(row, schema, "Company").to_string(),
            industry: store::row_get(row, schema, "Industry").to_string(),
            date_sent: store::row_get(row, schema, "DateSent").to_string(),
            date_replied: store::row_get(row, schema, "DateReplied").to_string(),
            status: store::row_get(row, schema, "Status").to_string(),
            subject: store::row_get(row, schema, "Subject").to_string(),
        }
    }

    fn to_row(&self, schema: &Schema) -> Vec<String> {
        let mut row = vec![String::new(); schema.len()];
        store::row_set(&mut row, schema, "Ref", &self.ref_tag);
        store::row_set(&mut row, schema, "Email", &self.email);
        store::row_set(&mut row, schema, "Company", &self.company);
        store::row_set(&mut row, schema, "Industry", &self.industry);
        store::row_set(&mut row, schema, "DateSent", &self.date_sent);
        store::row_set(&mut row, schema, "DateReplied", &self.date_replied);
        store::row_set(&mut row, schema, "Status", &self.status);
        store::row_set(&mut row, schema, "Subject", &self.subject);
        row
    }

    pub fn replied(&self) -> bool {
        !self.date_replied.trim().is_empty()
    }
}

fn ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\[ref:([0-9a-f]{6,12})\]").unwrap())
}

/// Pull the ref tag out of a subject line, if present. Tags are matched
/// case-insensitively and normalized to lowercase.
pub fn parse_ref_tag(subject: &str) -> Option<String> {
    ref_re()
        .captures(subject)
        .map(|c| c[1].to_lowercase())
}

/// Load all results, newest activity first: rows with a reply sort by
/// DateReplied, the rest by DateSent.
pub fn load_results(paths: &AppPaths) -> StoreResult<Vec<ResultRecord>> {
    let schema = result_schema();
    let rows = store::load_table(&paths.results(), &schema)?;
    let mut records: Vec<ResultRecord> = rows
        .iter()
        .map(|r| ResultRecord::from_row(r, &schema))
        .collect();
    records.sort_by_key(|r| {
        let key = sort_instant(r);
        std::cmp::Reverse(key)
    });
    Ok(records)
}

fn sort_instant(record: &ResultRecord) -> Option<NaiveDateTime> {
    metrics::parse_any_datetime(&record.date_replied)
        .or_else(|| metrics::parse_any_datetime(&record.date_sent))
}

pub fn save_results(paths: &AppPaths, records: &[ResultRecord]) -> StoreResult<()> {
    let schema = result_schema();
    let rows: Vec<Vec<String>> = records.iter().map(|r| r.to_row(&schema)).collect();
    store::save_table(&paths.results(), &schema, &rows)
}

pub fn find_result(paths: &AppPaths, ref_tag: &str) -> StoreResult<Option<ResultRecord>> {
    let needle = ref_tag.trim().to_lowercase();
    Ok(load_results(paths)?
        .into_iter()
        .find(|r| r.ref_tag.trim().to_lowercase() == needle))
}

/// Insert or merge one result row keyed by Ref.
///
/// Merge rules: DateSent sticks once set (the anchor for campaign
/// delays), DateReplied and Status only fill blanks, descriptive fields
/// (Email/Company/Industry/Subject) update when the incoming row has
/// them.
pub fn upsert_result(paths: &AppPaths, incoming: &ResultRecord) -> StoreResult<()> {
    let needle = incoming.ref_tag.trim().to_lowercase();
    if needle.is_empty() {
        return Err(StoreError::InvalidInput("result row without a ref".into()));
    }

    let mut records = load_results(paths)?;
    match records
        .iter_mut()
        .find(|r| r.ref_tag.trim().to_lowercase() == needle)
    {
        Some(existing) => {
            if existing.date_sent.trim().is_empty() {
                existing.date_sent = incoming.date_sent.clone();
            }
            if existing.date_replied.trim().is_empty() {
                existing.date_replied = incoming.date_replied.clone();
            }
            if existing.status.trim().is_empty() {
                existing.status = incoming.status.clone();
            }
            for (slot, value) in [
                (&mut existing.email, &incoming.email),
                (&mut existing.company, &incoming.company),
                (&mut existing.industry, &incoming.industry),
                (&mut existing.subject, &incoming.subject),
            ] {
                if !value.trim().is_empty() {
                    *slot = value.clone();
                }
            }
        }
        None => records.push(incoming.clone()),
    }
    save_results(paths, &records)
}

/// Overwrite the status for one ref. Unlike the sync path this is a
/// deliberate edit, so it replaces rather than fills.
pub fn set_status(paths: &AppPaths, ref_tag: &str, status: &str) -> StoreResult<()> {
    let needle = ref_tag.trim().to_lowercase();
    let mut records = load_results(paths)?;
    let Some(record) = records
        .iter_mut()
        .find(|r| r.ref_tag.trim().to_lowercase() == needle)
    else {
        return Err(StoreError::InvalidInput(format!("unknown ref {ref_tag}")));
    };
    record.status = status.trim().to_string();
    save_results(paths, &records)
}

/// A reply observed in the mail client: the ref from the subject plus
/// the reply timestamp.
#[derive(Debug, Clone)]
pub struct ReplyUpdate {
    pub ref_tag: String,
    pub replied_at: String,
}

/// Apply a batch of reply sightings and stamp the sync marker.
/// Unknown refs are skipped; already-replied rows are left alone.
pub fn apply_reply_sync(
    paths: &AppPaths,
    updates: &[ReplyUpdate],
    synced_at: NaiveDateTime,
) -> StoreResult<usize> {
    let mut records = load_results(paths)?;
    let by_ref: HashMap<String, String> = updates
        .iter()
        .map(|u| (u.ref_tag.trim().to_lowercase(), u.replied_at.clone()))
        .collect();

    let mut applied = 0;
    for record in &mut records {
        if record.replied() {
            continue;
        }
        if let Some(at) = by_ref.get(&record.ref_tag.trim().to_lowercase()) {
            record.date_replied = at.clone();
            if record.status.trim().is_empty() {
                record.status = "Replied".to_string();
            }
            applied += 1;
        }
    }
    if applied > 0 {
        save_results(paths, &records)?;
    }

    let marker = paths.last_sync_marker();
    std::fs::write(&marker, synced_at.format("%Y-%m-%d %H:%M:%S").to_string())
        .map_err(|e| StoreError::io(&marker, e))?;
    log::info!("reply sync applied {} update(s)", applied);
    Ok(applied)
}

/// Read back the last sync stamp, if any.
pub fn last_sync_time(paths: &AppPaths) -> Option<NaiveDateTime> {
    let text = std::fs::read_to_string(paths.last_sync_marker()).ok()?;
    metrics::parse_any_datetime(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(ref_tag: &str, sent: &str, replied: &str) -> ResultRecord {
        ResultRecord {
            ref_tag: ref_tag.into(),
            email: format!("{ref_tag}@x.com"),
            company: "Acme".into(),
            date_sent: sent.into(),
            date_replied: replied.into(),
            ..ResultRecord::default()
        }
    }

    fn noon(date: &str) -> NaiveDateTime {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_ref_tag() {
        assert_eq!(
            parse_ref_tag("RE: Quick hello [ref:a1b2c3d4]"),
            Some("a1b2c3d4".to_string())
        );
        assert_eq!(
            parse_ref_tag("[REF:A1B2C3D4] follow-up"),
            Some("a1b2c3d4".to_string())
        );
        // Too short, not hex, or missing entirely.
        assert_eq!(parse_ref_tag("[ref:a1b2]"), None);
        assert_eq!(parse_ref_tag("[ref:zzzzzzzz]"), None);
        assert_eq!(parse_ref_tag("no tag here"), None);
    }

    #[test]
    fn test_load_sorts_newest_activity_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        save_results(
            &paths,
            &[
                record("aaaaaaaa", "2025-01-01 09:00:00", ""),
                record("bbbbbbbb", "2025-01-02 09:00:00", "2025-01-05 09:00:00"),
                record("cccccccc", "2025-01-03 09:00:00", ""),
            ],
        )
        .unwrap();
        let loaded = load_results(&paths).unwrap();
        let order: Vec<&str> = loaded.iter().map(|r| r.ref_tag.as_str()).collect();
        assert_eq!(order, vec!["bbbbbbbb", "cccccccc", "aaaaaaaa"]);
    }

    #[test]
    fn test_upsert_preserves_sent_and_reply() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        upsert_result(&paths, &record("aaaaaaaa", "2025-01-01 09:00:00", "")).unwrap();

        // A later upsert must not move the send anchor.
        let mut second = record("aaaaaaaa", "2025-02-01 09:00:00", "2025-02-02 10:00:00");
        second.status = "Replied".into();
        upsert_result(&paths, &second).unwrap();

        let merged = find_result(&paths, "aaaaaaaa").unwrap().unwrap();
        assert_eq!(merged.date_sent, "2025-01-01 09:00:00");
        assert_eq!(merged.date_replied, "2025-02-02 10:00:00");
        assert_eq!(merged.status, "Replied");
        assert_eq!(load_results(&paths).unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_without_ref_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        let err = upsert_result(&paths, &record("  ", "", "")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    #[test]
    fn test_set_status_overwrites() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        let mut r = record("aaaaaaaa", "2025-01-01 09:00:00", "");
        r.status = "Sent".into();
        upsert_result(&paths, &r).unwrap();
        set_status(&paths, "AAAAAAAA", "No Interest").unwrap();
        let updated = find_result(&paths, "aaaaaaaa").unwrap().unwrap();
        assert_eq!(updated.status, "No Interest");
        assert!(set_status(&paths, "missing", "x").is_err());
    }

    #[test]
    fn test_reply_sync_fills_blanks_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        save_results(
            &paths,
            &[
                record("aaaaaaaa", "2025-01-01 09:00:00", ""),
                record("bbbbbbbb", "2025-01-01 09:00:00", "2025-01-03 09:00:00"),
            ],
        )
        .unwrap();

        let updates = vec![
            ReplyUpdate {
                ref_tag: "aaaaaaaa".into(),
                replied_at: "2025-01-04 08:00:00".into(),
            },
            ReplyUpdate {
                ref_tag: "bbbbbbbb".into(),
                replied_at: "2025-01-09 08:00:00".into(),
            },
            ReplyUpdate {
                ref_tag: "ffffffff".into(),
                replied_at: "2025-01-04 08:00:00".into(),
            },
        ];
        let applied = apply_reply_sync(&paths, &updates, noon("2025-01-04")).unwrap();
        assert_eq!(applied, 1);

        let a = find_result(&paths, "aaaaaaaa").unwrap().unwrap();
        assert_eq!(a.date_replied, "2025-01-04 08:00:00");
        assert_eq!(a.status, "Replied");
        // The earlier reply on b is untouched.
        let b = find_result(&paths, "bbbbbbbb").unwrap().unwrap();
        assert_eq!(b.date_replied, "2025-01-03 09:00:00");

        assert_eq!(last_sync_time(&paths), Some(noon("2025-01-04")));
    }
}
