//! The single local account profile (accounts.csv).
//!
//! One header plus one data row. The password sits next to the email in
//! plain text; the file lives in the per-user app directory and gates a
//! first-run prompt, not anything remote. Older installs wrote an
//! accounts.json, which is silently purged on load.

use crate::error::{StoreError, StoreResult};
use crate::leads::valid_email;
use crate::paths::AppPaths;
use crate::store::{self, Schema};

pub const ACCOUNT_FIELDS: [&str; 4] = ["email", "password", "user", "company"];

/// Lowercase canonical header; Title Case and UPPERCASE variants from
/// hand-edited files read as the same columns.
pub fn account_schema() -> Schema {
    let mut schema = Schema::new(&ACCOUNT_FIELDS);
    for field in ACCOUNT_FIELDS {
        let mut title = field.to_string();
        if let Some(first) = title.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        schema = schema.with_alias(&title, field);
        schema = schema.with_alias(&field.to_uppercase(), field);
    }
    schema
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountProfile {
    pub email: String,
    pub password: String,
    pub user: String,
    pub company: String,
}

impl AccountProfile {
    fn from_row(row: &[String], schema: &Schema) -> Self {
        AccountProfile {
            email: store::row_get(row, schema, "email").trim().to_string(),
            password: store::row_get(row, schema, "password").trim().to_string(),
            user: store::row_get(row, schema, "user").trim().to_string(),
            company: store::row_get(row, schema, "company").trim().to_string(),
        }
    }

    fn to_row(&self, schema: &Schema) -> Vec<String> {
        let mut row = vec![String::new(); schema.len()];
        store::row_set(&mut row, schema, "email", &self.email);
        store::row_set(&mut row, schema, "password", &self.password);
        store::row_set(&mut row, schema, "user", &self.user);
        store::row_set(&mut row, schema, "company", &self.company);
        row
    }
}

fn purge_legacy_json(paths: &AppPaths) {
    let legacy = paths.accounts_legacy_json();
    if legacy.exists() {
        if let Err(e) = std::fs::remove_file(&legacy) {
            log::warn!("could not remove {}: {}", legacy.display(), e);
        }
    }
}

/// Load the active profile from the first data row, if one exists.
/// Removes the legacy json file first.
pub fn load_account(paths: &AppPaths) -> StoreResult<Option<AccountProfile>> {
    purge_legacy_json(paths);
    let schema = account_schema();
    let rows = store::load_table(&paths.accounts(), &schema)?;
    Ok(rows.first().map(|r| AccountProfile::from_row(r, &schema)))
}

pub fn account_exists(paths: &AppPaths) -> StoreResult<bool> {
    Ok(load_account(paths)?.is_some())
}

/// Reject profiles the first-run prompt should not accept.
pub fn validate_profile(profile: &AccountProfile) -> StoreResult<()> {
    if [&profile.email, &profile.password, &profile.user, &profile.company]
        .iter()
        .any(|v| v.trim().is_empty())
    {
        return Err(StoreError::InvalidInput("all four account fields are required".into()));
    }
    if !valid_email(&profile.email) {
        return Err(StoreError::InvalidInput(format!(
            "account email does not look valid: {}",
            profile.email
        )));
    }
    if profile.password.trim().len() < 3 {
        return Err(StoreError::InvalidInput("account password is too short".into()));
    }
    Ok(())
}

/// Overwrite accounts.csv with exactly this profile.
pub fn save_account(paths: &AppPaths, profile: &AccountProfile) -> StoreResult<()> {
    let schema = account_schema();
    store::save_table(&paths.accounts(), &schema, &[profile.to_row(&schema)])
}

/// Compare credentials against the stored row (email case-insensitive).
pub fn verify_login(paths: &AppPaths, email: &str, password: &str) -> StoreResult<bool> {
    Ok(match load_account(paths)? {
        Some(profile) => {
            profile.email.to_lowercase() == email.trim().to_lowercase()
                && profile.password == password.trim()
        }
        None => false,
    })
}

fn possessive(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        return String::new();
    }
    if name.to_lowercase().ends_with('s') {
        format!("{}'", name)
    } else {
        format!("{}'s", name)
    }
}

/// Display string for the title banner, e.g. "Sam's Acme".
pub fn banner_text(paths: &AppPaths, default: &str) -> String {
    let profile = match load_account(paths) {
        Ok(Some(p)) => p,
        _ => return default.to_string(),
    };
    match (profile.user.is_empty(), profile.company.is_empty()) {
        (false, false) => format!("{} {}", possessive(&profile.user), profile.company),
        (false, true) => possessive(&profile.user),
        (true, false) => profile.company,
        (true, true) => default.to_string(),
    }
}

/// Remove accounts.csv so the first-run prompt reappears next launch.
pub fn reset_account(paths: &AppPaths) -> StoreResult<()> {
    let path = paths.accounts();
    if path.exists() {
        std::fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> AccountProfile {
        AccountProfile {
            email: "sam@acme.com".into(),
            password: "hunter2".into(),
            user: "Sam".into(),
            company: "Acme".into(),
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        assert!(load_account(&paths).unwrap().is_none());

        save_account(&paths, &profile()).unwrap();
        assert_eq!(load_account(&paths).unwrap(), Some(profile()));
        assert!(account_exists(&paths).unwrap());
    }

    #[test]
    fn test_title_case_header_is_read() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        std::fs::write(
            paths.accounts(),
            "Email,Password,User,Company\nsam@acme.com,hunter2,Sam,Acme\n",
        )
        .unwrap();
        assert_eq!(load_account(&paths).unwrap(), Some(profile()));
    }

    #[test]
    fn test_legacy_json_purged_on_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        std::fs::write(paths.accounts_legacy_json(), "{}").unwrap();
        load_account(&paths).unwrap();
        assert!(!paths.accounts_legacy_json().exists());
    }

    #[test]
    fn test_verify_login_email_case_insensitive() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        save_account(&paths, &profile()).unwrap();

        assert!(verify_login(&paths, "SAM@ACME.COM", "hunter2").unwrap());
        assert!(!verify_login(&paths, "sam@acme.com", "wrong").unwrap());
        assert!(!verify_login(&paths, "other@acme.com", "hunter2").unwrap());
    }

    #[test]
    fn test_validate_rejects_blank_and_bad_email() {
        let mut p = profile();
        p.company = "  ".into();
        assert!(validate_profile(&p).is_err());

        let mut p = profile();
        p.email = "not-an-email".into();
        assert!(validate_profile(&p).is_err());

        assert!(validate_profile(&profile()).is_ok());
    }

    #[test]
    fn test_banner_text_possessive() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        assert_eq!(banner_text(&paths, "GrowthFarm"), "GrowthFarm");

        save_account(&paths, &profile()).unwrap();
        assert_eq!(banner_text(&paths, "GrowthFarm"), "Sam's Acme");

        let mut p = profile();
        p.user = "Ross".into();
        p.company = String::new();
        save_account(&paths, &p).unwrap();
        assert_eq!(banner_text(&paths, "GrowthFarm"), "Ross'");
    }
}
