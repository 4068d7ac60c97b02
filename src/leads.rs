//! Lead table (email_leads.csv), content-fingerprint identity, and the
//! drafted-once guard.
//!
//! A lead's identity is a SHA-1 fingerprint of its lowercased
//! Email|First Name|Company|Industry; the first 8 hex characters become
//! the `ref` correlation tag embedded in outbound subject lines.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::OnceLock;

use regex::Regex;
use sha1::{Digest, Sha1};

use crate::error::{StoreError, StoreResult};
use crate::paths::AppPaths;
use crate::store::{self, Schema};

/// Canonical lead columns, shared by the lead grid and the dialer grid.
pub const HEADER_FIELDS: [&str; 12] = [
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
    "Notes",
];

/// Short hex prefix length used for the `[ref:...]` correlation tag.
pub const REF_TAG_LEN: usize = 8;

pub fn lead_schema() -> Schema {
    Schema::new(&HEADER_FIELDS)
}

pub fn load_leads(paths: &AppPaths) -> StoreResult<Vec<Vec<String>>> {
    store::load_table(&paths.email_leads(), &lead_schema())
}

pub fn save_leads(paths: &AppPaths, rows: &[Vec<String>]) -> StoreResult<()> {
    store::save_table(&paths.email_leads(), &lead_schema(), rows)
}

fn field(map: &HashMap<String, String>, name: &str) -> String {
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.clone())
        .unwrap_or_default()
}

/// SHA-1 fingerprint over the lead's identity fields, lowercased.
pub fn fingerprint(lead: &HashMap<String, String>) -> String {
    let key = format!(
        "{}|{}|{}|{}",
        field(lead, "Email").to_lowercase(),
        field(lead, "First Name").to_lowercase(),
        field(lead, "Company").to_lowercase(),
        field(lead, "Industry").to_lowercase(),
    );
    let digest = Sha1::digest(key.as_bytes());
    hex::encode(digest)
}

/// The short correlation tag for a lead: a fingerprint prefix.
pub fn ref_tag(lead: &HashMap<String, String>) -> String {
    let mut fp = fingerprint(lead);
    fp.truncate(REF_TAG_LEN);
    fp
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
}

pub fn valid_email(address: &str) -> bool {
    email_re().is_match(address)
}

/// Find the original lead row for a ref's email (preferred) or company,
/// so follow-up templates can use fields like Industry that the thin
/// results row doesn't carry.
pub fn find_by_email_or_company(
    paths: &AppPaths,
    email: &str,
    company: &str,
) -> StoreResult<Option<HashMap<String, String>>> {
    let schema = lead_schema();
    let rows = load_leads(paths)?;
    let email_l = email.trim().to_lowercase();
    let company_l = company.trim().to_lowercase();

    if !email_l.is_empty() {
        for row in &rows {
            if store::row_get(row, &schema, "Email").trim().to_lowercase() == email_l {
                return Ok(Some(store::row_to_map(row, &schema)));
            }
        }
    }
    if !company_l.is_empty() {
        for row in &rows {
            if store::row_get(row, &schema, "Company").trim().to_lowercase() == company_l {
                return Ok(Some(store::row_to_map(row, &schema)));
            }
        }
    }
    Ok(None)
}

/// Load the set of fingerprints that have already been drafted against.
pub fn load_seen_set(paths: &AppPaths) -> StoreResult<HashSet<String>> {
    let path = paths.state_file();
    if !path.exists() {
        return Ok(HashSet::new());
    }
    let text = std::fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Record fingerprints as drafted (append-only).
pub fn append_seen(paths: &AppPaths, fingerprints: &[String]) -> StoreResult<()> {
    if fingerprints.is_empty() {
        return Ok(());
    }
    let path = paths.state_file();
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| StoreError::io(&path, e))?;
    for fp in fingerprints {
        writeln!(file, "{}", fp).map_err(|e| StoreError::io(&path, e))?;
    }
    Ok(())
}
