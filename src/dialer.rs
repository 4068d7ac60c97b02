//! Cold-call dialer: the dialer grid (dialer_leads.csv) and the
//! append-only call log (dialer_results.csv).
//!
//! The grid is a lead row plus three mutually-exclusive outcome-dot
//! columns headed by the outcome glyphs, plus eight free-text note
//! slots. An unset dot renders as "○". Green calls are mirrored into
//! the warm pipeline with the call note as Call 1.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::error::StoreResult;
use crate::leads::HEADER_FIELDS;
use crate::paths::AppPaths;
use crate::store::{self, Schema};
use crate::warm;

pub const GLYPH_GREEN: &str = "\u{1F642}";
pub const GLYPH_GRAY: &str = "\u{1F610}";
pub const GLYPH_RED: &str = "\u{1F641}";
/// Seen in files written before the red glyph was normalized.
pub const GLYPH_RED_LEGACY: &str = "\u{2639}\u{FE0F}";
pub const UNSET_DOT: &str = "\u{25CB}";

pub const NOTE_SLOTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Green,
    Gray,
    Red,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Green => "green",
            Outcome::Gray => "gray",
            Outcome::Red => "red",
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            Outcome::Green => GLYPH_GREEN,
            Outcome::Gray => GLYPH_GRAY,
            Outcome::Red => GLYPH_RED,
        }
    }
}

fn dialer_fields() -> Vec<String> {
    let mut fields: Vec<String> = HEADER_FIELDS.iter().map(|s| s.to_string()).collect();
    fields.push(GLYPH_GREEN.to_string());
    fields.push(GLYPH_GRAY.to_string());
    fields.push(GLYPH_RED.to_string());
    for i in 1..=NOTE_SLOTS {
        fields.push(format!("Note{}", i));
    }
    fields
}

pub fn dialer_schema() -> Schema {
    Schema::new(&dialer_fields()).with_alias(GLYPH_RED_LEGACY, GLYPH_RED)
}

pub const CALL_LOG_FIELDS: [&str; 14] = [
    "Timestamp",
    "Outcome",
    "Email",
    "First Name",
    "Last Name",
    "Company",
    "Industry",
    "Phone",
    "Address",
    "City",
    "State",
    "Reviews",
    "Website",
    "Note",
];

pub fn call_log_schema() -> Schema {
    Schema::new(&CALL_LOG_FIELDS)
}

/// Load the dialer grid, normalizing empty dot cells to "○".
pub fn load_dialer_grid(paths: &AppPaths) -> StoreResult<Vec<Vec<String>>> {
    let schema = dialer_schema();
    let mut rows = store::load_table(&paths.dialer_leads(), &schema)?;
    let dot_cols = HEADER_FIELDS.len()..HEADER_FIELDS.len() + 3;
    for row in &mut rows {
        for i in dot_cols.clone() {
            if row.get(i).map(|v| v.is_empty()).unwrap_or(true) {
                if row.len() <= i {
                    row.resize(schema.len(), String::new());
                }
                row[i] = UNSET_DOT.to_string();
            }
        }
    }
    Ok(rows)
}

pub fn save_dialer_grid(paths: &AppPaths, rows: &[Vec<String>]) -> StoreResult<()> {
    store::save_table(&paths.dialer_leads(), &dialer_schema(), rows)
}

/// Build a fresh grid row from a lead's contact fields: unset dots,
/// blank notes.
pub fn grid_row_from_lead(lead: &HashMap<String, String>) -> Vec<String> {
    let mut row: Vec<String> = HEADER_FIELDS
        .iter()
        .map(|h| lead.get(*h).cloned().unwrap_or_default())
        .collect();
    row.extend([UNSET_DOT.to_string(), UNSET_DOT.to_string(), UNSET_DOT.to_string()]);
    row.extend(std::iter::repeat(String::new()).take(NOTE_SLOTS));
    row
}

/// Append one lead to the dialer grid.
pub fn append_lead(paths: &AppPaths, lead: &HashMap<String, String>) -> StoreResult<()> {
    store::append_rows(&paths.dialer_leads(), &dialer_schema(), &[grid_row_from_lead(lead)])
}

/// Persist one call to the call log; green calls also land in the warm
/// pipeline with the note as Call 1.
pub fn log_call(
    paths: &AppPaths,
    lead: &HashMap<String, String>,
    outcome: Outcome,
    note: &str,
    now: NaiveDateTime,
) -> StoreResult<()> {
    let schema = call_log_schema();
    let mut row = vec![String::new(); schema.len()];
    store::row_set(
        &mut row,
        &schema,
        "Timestamp",
        &now.format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    store::row_set(&mut row, &schema, "Outcome", outcome.as_str());
    for name in CALL_LOG_FIELDS.iter().skip(2).filter(|n| **n != "Note") {
        store::row_set(&mut row, &schema, name, lead.get(*name).cloned().unwrap_or_default());
    }
    store::row_set(&mut row, &schema, "Note", note);
    store::append_rows(&paths.dialer_results(), &schema, &[row])?;

    if outcome == Outcome::Green {
        warm::add_from_dialer(paths, lead, note, now)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon(date: &str) -> NaiveDateTime {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn lead(email: &str, company: &str) -> HashMap<String, String> {
        HashMap::from([
            ("Email".to_string(), email.to_string()),
            ("First Name".to_string(), "Sam".to_string()),
            ("Company".to_string(), company.to_string()),
            ("Phone".to_string(), "555-1234".to_string()),
        ])
    }

    #[test]
    fn test_grid_row_shape() {
        let row = grid_row_from_lead(&lead("sam@acme.com", "Acme"));
        assert_eq!(row.len(), HEADER_FIELDS.len() + 3 + NOTE_SLOTS);
        assert_eq!(row[0], "sam@acme.com");
        assert_eq!(&row[HEADER_FIELDS.len()..HEADER_FIELDS.len() + 3], [UNSET_DOT, UNSET_DOT, UNSET_DOT]);
        assert!(row[HEADER_FIELDS.len() + 3..].iter().all(String::is_empty));
    }

    #[test]
    fn test_append_and_load_normalizes_dots() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        append_lead(&paths, &lead("sam@acme.com", "Acme")).unwrap();

        // Blank out a dot cell on disk; load restores the unset marker.
        let schema = dialer_schema();
        let mut rows = store::load_table(&paths.dialer_leads(), &schema).unwrap();
        rows[0][HEADER_FIELDS.len()] = String::new();
        store::save_table(&paths.dialer_leads(), &schema, &rows).unwrap();

        let rows = load_dialer_grid(&paths).unwrap();
        assert_eq!(rows[0][HEADER_FIELDS.len()], UNSET_DOT);
    }

    #[test]
    fn test_legacy_red_header_is_read() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        let mut header: Vec<String> = HEADER_FIELDS.iter().map(|s| s.to_string()).collect();
        header.extend([
            GLYPH_GREEN.to_string(),
            GLYPH_GRAY.to_string(),
            GLYPH_RED_LEGACY.to_string(),
        ]);
        for i in 1..=NOTE_SLOTS {
            header.push(format!("Note{}", i));
        }
        let mut row = grid_row_from_lead(&lead("sam@acme.com", "Acme"));
        row[HEADER_FIELDS.len() + 2] = GLYPH_RED_LEGACY.to_string();
        let mut text = header.join(",") + "\n";
        text.push_str(&row.join(","));
        text.push('\n');
        std::fs::write(paths.dialer_leads(), text).unwrap();

        let rows = load_dialer_grid(&paths).unwrap();
        assert_eq!(rows[0][HEADER_FIELDS.len() + 2], GLYPH_RED_LEGACY);
    }

    #[test]
    fn test_log_call_appends_to_log() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        log_call(&paths, &lead("sam@acme.com", "Acme"), Outcome::Gray, "voicemail", noon("2025-01-02")).unwrap();

        let schema = call_log_schema();
        let rows = store::load_table(&paths.dialer_results(), &schema).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(store::row_get(&rows[0], &schema, "Outcome"), "gray");
        assert_eq!(store::row_get(&rows[0], &schema, "Note"), "voicemail");
        // Gray call: nothing lands in the warm pipeline.
        assert!(warm::load_warm_leads(&paths).unwrap().is_empty());
    }

    #[test]
    fn test_green_call_mirrors_to_warm() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        log_call(&paths, &lead("sam@acme.com", "Acme"), Outcome::Green, "wants samples", noon("2025-01-02")).unwrap();

        let schema = warm::warm_schema();
        let rows = warm::load_warm_leads(&paths).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(store::row_get(&rows[0], &schema, "Company"), "Acme");
        assert_eq!(store::row_get(&rows[0], &schema, "Call 1"), "wants samples");
    }
}
