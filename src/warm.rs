//! Warm-lead nurture pipeline (warm_leads.csv) and the no-interest log.
//!
//! A warm lead carries 15 dated call-note slots that fill left to right;
//! a slot is never overwritten. Confirming an outcome resolves the row:
//! green promotes it to a customer with an opening order, red logs it to
//! no_interest.csv and removes it, gray just records the note.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};

use crate::customers;
use crate::error::{StoreError, StoreResult};
use crate::paths::AppPaths;
use crate::store::{self, Schema};

pub const CALL_SLOTS: usize = 15;

fn warm_fields() -> Vec<String> {
    let mut fields: Vec<String> = [
        "Company",
        "Prospect Name",
        "Phone #",
        "Email",
        "Location",
        "Industry",
        "Google Reviews",
        "Rep",
        "Samples?",
        "Timestamp",
        "Cost ($)",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    for i in 1..=CALL_SLOTS {
        fields.push(format!("Call {}", i));
    }
    fields.push("First Contact".to_string());
    fields
}

pub fn warm_schema() -> Schema {
    Schema::new(&warm_fields())
}

pub const NO_INTEREST_FIELDS: [&str; 13] = [
    "Timestamp",
    "Email",
    "First Name",
    "Last Name",
    "Company",
    "Industry",
    "Phone",
    "City",
    "State",
    "Website",
    "Note",
    "Source",
    "NoContactFlag",
];

pub fn no_interest_schema() -> Schema {
    // Some older files wrote the flag column as "NoContact".
    Schema::new(&NO_INTEREST_FIELDS).with_alias("NoContact", "NoContactFlag")
}

pub fn load_warm_leads(paths: &AppPaths) -> StoreResult<Vec<Vec<String>>> {
    store::load_table(&paths.warm_leads(), &warm_schema())
}

pub fn save_warm_leads(paths: &AppPaths, rows: &[Vec<String>]) -> StoreResult<()> {
    store::save_table(&paths.warm_leads(), &warm_schema(), rows)
}

/// Index (within the warm schema) of the first empty call slot, if any.
pub fn next_empty_call_slot(row: &[String], schema: &Schema) -> Option<usize> {
    for i in 1..=CALL_SLOTS {
        if let Some(idx) = schema.index_of(&format!("Call {}", i)) {
            if row.get(idx).map(|v| v.trim().is_empty()).unwrap_or(true) {
                return Some(idx);
            }
        }
    }
    None
}

/// Write a call note into the first empty slot. Full rows drop the note
/// rather than overwriting history.
pub fn record_call_note(row: &mut [String], schema: &Schema, note: &str) -> bool {
    let note = note.trim();
    if note.is_empty() {
        return false;
    }
    match next_empty_call_slot(row, schema) {
        Some(idx) => {
            row[idx] = note.to_string();
            true
        }
        None => {
            log::warn!("all call slots full; note dropped");
            false
        }
    }
}

fn lead_get(lead: &HashMap<String, String>, name: &str) -> String {
    lead.get(name).cloned().unwrap_or_default()
}

/// Append a warm lead built from a dialer-grid row (green call).
pub fn add_from_dialer(
    paths: &AppPaths,
    lead: &HashMap<String, String>,
    call1_note: &str,
    now: NaiveDateTime,
) -> StoreResult<()> {
    let schema = warm_schema();
    let ts = now.format("%Y-%m-%d %H:%M:%S").to_string();
    let prospect = format!(
        "{} {}",
        lead_get(lead, "First Name"),
        lead_get(lead, "Last Name")
    )
    .trim()
    .to_string();
    let location = {
        let city = lead_get(lead, "City");
        let state = lead_get(lead, "State");
        [city, state]
            .iter()
            .filter(|s| !s.trim().is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut row = vec![String::new(); schema.len()];
    store::row_set(&mut row, &schema, "Company", &lead_get(lead, "Company"));
    store::row_set(&mut row, &schema, "Prospect Name", &prospect);
    store::row_set(&mut row, &schema, "Phone #", &lead_get(lead, "Phone"));
    store::row_set(&mut row, &schema, "Email", &lead_get(lead, "Email"));
    store::row_set(&mut row, &schema, "Location", &location);
    store::row_set(&mut row, &schema, "Industry", &lead_get(lead, "Industry"));
    store::row_set(&mut row, &schema, "Google Reviews", &lead_get(lead, "Reviews"));
    store::row_set(&mut row, &schema, "Timestamp", &ts);
    store::row_set(&mut row, &schema, "First Contact", &ts);
    store::row_set(&mut row, &schema, "Call 1", call1_note.trim());

    store::append_rows(&paths.warm_leads(), &schema, &[row])
}

/// Append one rejection record to no_interest.csv.
pub fn append_no_interest(
    paths: &AppPaths,
    fields: &HashMap<String, String>,
    note: &str,
    no_contact: bool,
    source: &str,
    now: NaiveDateTime,
) -> StoreResult<()> {
    let schema = no_interest_schema();
    let mut row = vec![String::new(); schema.len()];
    store::row_set(
        &mut row,
        &schema,
        "Timestamp",
        &now.format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    for name in [
        "Email",
        "First Name",
        "Last Name",
        "Company",
        "Industry",
        "Phone",
        "City",
        "State",
        "Website",
    ] {
        store::row_set(&mut row, &schema, name, &lead_get(fields, name));
    }
    store::row_set(&mut row, &schema, "Note", note);
    store::row_set(&mut row, &schema, "Source", source);
    store::row_set(&mut row, &schema, "NoContactFlag", if no_contact { "1" } else { "0" });
    store::append_rows(&paths.no_interest(), &schema, &[row])
}

fn split_location(location: &str) -> (String, String) {
    match location.split_once(',') {
        Some((city, state)) => (city.trim().to_string(), state.trim().to_string()),
        None => (location.trim().to_string(), String::new()),
    }
}

/// Green confirm: record the note, promote the row to a customer with an
/// opening order, and remove it from the warm grid.
pub fn confirm_green(
    paths: &AppPaths,
    rows: &mut Vec<Vec<String>>,
    row_idx: usize,
    opening_amount: &str,
    note: &str,
    now: NaiveDateTime,
    today: NaiveDate,
) -> StoreResult<()> {
    let schema = warm_schema();
    let row = rows
        .get_mut(row_idx)
        .ok_or_else(|| StoreError::InvalidInput(format!("no warm row {row_idx}")))?;
    record_call_note(row, &schema, note);

    let company = store::row_get(row, &schema, "Company").to_string();
    let (city, state) = split_location(store::row_get(row, &schema, "Location"));
    let mut updates = HashMap::new();
    updates.insert("Prospect Name".to_string(), store::row_get(row, &schema, "Prospect Name").to_string());
    updates.insert("Phone #".to_string(), store::row_get(row, &schema, "Phone #").to_string());
    updates.insert("Email".to_string(), store::row_get(row, &schema, "Email").to_string());
    updates.insert("Industry".to_string(), store::row_get(row, &schema, "Industry").to_string());
    updates.insert("City".to_string(), city);
    updates.insert("State".to_string(), state);
    updates.insert("Reorder?".to_string(), "Yes".to_string());
    customers::update_by_company(paths, &company, &updates, today)?;
    customers::append_order(
        paths,
        &company,
        &now.format("%Y-%m-%d").to_string(),
        opening_amount,
        today,
    )?;

    rows.remove(row_idx);
    save_warm_leads(paths, rows)?;
    log::info!("warm lead {} converted to customer", company);
    Ok(())
}

/// Red confirm: log the rejection and remove the row.
pub fn confirm_red(
    paths: &AppPaths,
    rows: &mut Vec<Vec<String>>,
    row_idx: usize,
    note: &str,
    now: NaiveDateTime,
) -> StoreResult<()> {
    let schema = warm_schema();
    let row = rows
        .get(row_idx)
        .ok_or_else(|| StoreError::InvalidInput(format!("no warm row {row_idx}")))?;

    let prospect = store::row_get(row, &schema, "Prospect Name");
    let (first, last) = match prospect.split_once(' ') {
        Some((f, l)) => (f.to_string(), l.to_string()),
        None => (prospect.to_string(), String::new()),
    };
    let (city, state) = split_location(store::row_get(row, &schema, "Location"));
    let mut fields = HashMap::new();
    fields.insert("Email".to_string(), store::row_get(row, &schema, "Email").to_string());
    fields.insert("First Name".to_string(), first);
    fields.insert("Last Name".to_string(), last);
    fields.insert("Company".to_string(), store::row_get(row, &schema, "Company").to_string());
    fields.insert("Industry".to_string(), store::row_get(row, &schema, "Industry").to_string());
    fields.insert("Phone".to_string(), store::row_get(row, &schema, "Phone #").to_string());
    fields.insert("City".to_string(), city);
    fields.insert("State".to_string(), state);
    append_no_interest(paths, &fields, note, false, "Warm", now)?;

    rows.remove(row_idx);
    save_warm_leads(paths, rows)
}

/// Gray confirm: just record the note and persist the grid.
pub fn confirm_gray(
    paths: &AppPaths,
    rows: &mut [Vec<String>],
    row_idx: usize,
    note: &str,
) -> StoreResult<()> {
    let schema = warm_schema();
    let row = rows
        .get_mut(row_idx)
        .ok_or_else(|| StoreError::InvalidInput(format!("no warm row {row_idx}")))?;
    record_call_note(row, &schema, note);
    save_warm_leads(paths, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

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
            ("Last Name".to_string(), "Jones".to_string()),
            ("Company".to_string(), company.to_string()),
            ("Industry".to_string(), "Retail".to_string()),
            ("Phone".to_string(), "555-1234".to_string()),
            ("City".to_string(), "Austin".to_string()),
            ("State".to_string(), "TX".to_string()),
            ("Reviews".to_string(), "42".to_string()),
        ])
    }

    #[test]
    fn test_schema_has_fifteen_call_slots() {
        let schema = warm_schema();
        assert!(schema.index_of("Call 1").is_some());
        assert!(schema.index_of("Call 15").is_some());
        assert!(schema.index_of("Call 16").is_none());
        assert_eq!(schema.len(), 11 + CALL_SLOTS + 1);
    }

    #[test]
    fn test_add_from_dialer_maps_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        add_from_dialer(&paths, &lead("sam@acme.com", "Acme"), "great chat", noon("2025-01-02")).unwrap();

        let schema = warm_schema();
        let rows = load_warm_leads(&paths).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(store::row_get(&rows[0], &schema, "Prospect Name"), "Sam Jones");
        assert_eq!(store::row_get(&rows[0], &schema, "Location"), "Austin, TX");
        assert_eq!(store::row_get(&rows[0], &schema, "Google Reviews"), "42");
        assert_eq!(store::row_get(&rows[0], &schema, "Call 1"), "great chat");
        assert_eq!(store::row_get(&rows[0], &schema, "First Contact"), "2025-01-02 12:00:00");
    }

    #[test]
    fn test_call_notes_fill_left_to_right() {
        let schema = warm_schema();
        let mut row = vec![String::new(); schema.len()];
        assert!(record_call_note(&mut row, &schema, "first"));
        assert!(record_call_note(&mut row, &schema, "second"));
        assert_eq!(store::row_get(&row, &schema, "Call 1"), "first");
        assert_eq!(store::row_get(&row, &schema, "Call 2"), "second");

        for i in 3..=CALL_SLOTS {
            assert!(record_call_note(&mut row, &schema, &format!("call {i}")));
        }
        // All slots full: note dropped, nothing overwritten.
        assert!(!record_call_note(&mut row, &schema, "overflow"));
        assert_eq!(store::row_get(&row, &schema, "Call 15"), "call 15");
    }

    #[test]
    fn test_confirm_green_promotes_to_customer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        add_from_dialer(&paths, &lead("sam@acme.com", "Acme"), "intro", noon("2025-01-02")).unwrap();

        let mut rows = load_warm_leads(&paths).unwrap();
        confirm_green(&paths, &mut rows, 0, "$199.00", "ready to buy", noon("2025-01-05"), NaiveDate::from_ymd_opt(2025, 1, 5).unwrap()).unwrap();

        assert!(load_warm_leads(&paths).unwrap().is_empty());
        let cschema = customers::customer_schema();
        let customers = customers::load_customers(&paths, NaiveDate::from_ymd_opt(2025, 1, 5).unwrap()).unwrap();
        assert_eq!(customers.len(), 1);
        assert_eq!(store::row_get(&customers[0], &cschema, "Company"), "Acme");
        assert_eq!(store::row_get(&customers[0], &cschema, "City"), "Austin");
        assert_eq!(store::row_get(&customers[0], &cschema, "Reorder?"), "Yes");
        assert_eq!(store::row_get(&customers[0], &cschema, "CLTV"), "199.00");

        let orders = customers::load_orders(&paths).unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].amount, "199.00");
    }

    #[test]
    fn test_confirm_red_logs_no_interest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        add_from_dialer(&paths, &lead("sam@acme.com", "Acme"), "intro", noon("2025-01-02")).unwrap();

        let mut rows = load_warm_leads(&paths).unwrap();
        confirm_red(&paths, &mut rows, 0, "not a fit", noon("2025-01-05")).unwrap();

        assert!(load_warm_leads(&paths).unwrap().is_empty());
        let schema = no_interest_schema();
        let logged = store::load_table(&paths.no_interest(), &schema).unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(store::row_get(&logged[0], &schema, "Company"), "Acme");
        assert_eq!(store::row_get(&logged[0], &schema, "First Name"), "Sam");
        assert_eq!(store::row_get(&logged[0], &schema, "Note"), "not a fit");
        assert_eq!(store::row_get(&logged[0], &schema, "Source"), "Warm");
    }

    #[test]
    fn test_confirm_gray_keeps_row() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        add_from_dialer(&paths, &lead("sam@acme.com", "Acme"), "intro", noon("2025-01-02")).unwrap();

        let mut rows = load_warm_leads(&paths).unwrap();
        confirm_gray(&paths, &mut rows, 0, "call back in march").unwrap();

        let schema = warm_schema();
        let rows = load_warm_leads(&paths).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(store::row_get(&rows[0], &schema, "Call 2"), "call back in march");
    }

    #[test]
    fn test_legacy_no_contact_column_aliased() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        std::fs::write(
            paths.no_interest(),
            "Timestamp,Email,Company,NoContact\n2025-01-01 09:00:00,x@y.com,Acme,1\n",
        )
        .unwrap();
        let schema = no_interest_schema();
        let rows = store::load_table(&paths.no_interest(), &schema).unwrap();
        assert_eq!(store::row_get(&rows[0], &schema, "NoContactFlag"), "1");
    }
}
