//! Application data directory and the per-installation file map.
//!
//! A sidecar `app.ini` next to the executable selects the data-directory
//! name (section `[app]`, key `data_dir`), defaulting to "GrowthFarm".
//! The directory itself lives under the platform config dir (Roaming on
//! Windows), falling back to the home directory.
//!
//! `AppPaths` is the explicit context object threaded through every
//! component — there are no process-wide path globals, and tests construct
//! a throwaway `AppPaths::at(tempdir)` for isolation.

use std::path::{Path, PathBuf};

use configparser::ini::Ini;

use crate::error::{StoreError, StoreResult};
use crate::store;

pub const DEFAULT_DATA_DIR_NAME: &str = "GrowthFarm";

/// Resolved per-installation data directory plus accessors for every
/// persisted file.
#[derive(Debug, Clone)]
pub struct AppPaths {
    dir: PathBuf,
}

impl AppPaths {
    /// Resolve the data directory from the sidecar `app.ini` (if present)
    /// and the platform config dir.
    pub fn resolve() -> Self {
        let name = data_dir_name_from_sidecar().unwrap_or_else(|| DEFAULT_DATA_DIR_NAME.to_string());
        let base = dirs::config_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        AppPaths { dir: base.join(name) }
    }

    /// Construct against an explicit directory. Used by tests and by
    /// embedders that manage their own layout.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        AppPaths { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn email_leads(&self) -> PathBuf {
        self.dir.join("email_leads.csv")
    }

    pub fn results(&self) -> PathBuf {
        self.dir.join("results.csv")
    }

    pub fn warm_leads(&self) -> PathBuf {
        self.dir.join("warm_leads.csv")
    }

    pub fn no_interest(&self) -> PathBuf {
        self.dir.join("no_interest.csv")
    }

    pub fn customers(&self) -> PathBuf {
        self.dir.join("customers.csv")
    }

    pub fn orders(&self) -> PathBuf {
        self.dir.join("orders.csv")
    }

    pub fn dialer_results(&self) -> PathBuf {
        self.dir.join("dialer_results.csv")
    }

    pub fn dialer_leads(&self) -> PathBuf {
        self.dir.join("dialer_leads.csv")
    }

    pub fn templates_ini(&self) -> PathBuf {
        self.dir.join("templates.ini")
    }

    pub fn campaigns_ini(&self) -> PathBuf {
        self.dir.join("campaigns.ini")
    }

    /// Per-ref campaign enrollment state.
    pub fn campaigns(&self) -> PathBuf {
        self.dir.join("campaigns.csv")
    }

    /// Newline-delimited set of already-drafted lead fingerprints.
    pub fn state_file(&self) -> PathBuf {
        self.dir.join("state.txt")
    }

    pub fn accounts(&self) -> PathBuf {
        self.dir.join("accounts.csv")
    }

    /// Legacy profile file, purged on sight.
    pub fn accounts_legacy_json(&self) -> PathBuf {
        self.dir.join("accounts.json")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.dir.join("_backups")
    }

    pub fn last_sync_marker(&self) -> PathBuf {
        self.dir.join("last_outlook_sync.txt")
    }

    /// Filesystem outbox for the draft collaborator stand-in.
    pub fn drafts_dir(&self) -> PathBuf {
        self.dir.join("drafts")
    }
}

fn sidecar_ini_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.join("app.ini")))
        .unwrap_or_else(|| PathBuf::from("app.ini"))
}

fn data_dir_name_from_sidecar() -> Option<String> {
    let ini_path = sidecar_ini_path();
    if !ini_path.exists() {
        return None;
    }
    let mut ini = Ini::new();
    ini.load(&ini_path).ok()?;
    let name = ini.get("app", "data_dir")?;
    let name = name.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Create the data directory and seed every table with its header if
/// absent. Existing files with drifted headers are migrated in place.
pub fn ensure_app_files(paths: &AppPaths) -> StoreResult<()> {
    std::fs::create_dir_all(paths.dir()).map_err(|e| StoreError::io(paths.dir(), e))?;

    store::ensure_table(&paths.email_leads(), &crate::leads::lead_schema())?;
    store::ensure_table(&paths.results(), &crate::results::result_schema())?;
    store::ensure_table(&paths.warm_leads(), &crate::warm::warm_schema())?;
    store::ensure_table(&paths.no_interest(), &crate::warm::no_interest_schema())?;
    store::ensure_table(&paths.customers(), &crate::customers::customer_schema())?;
    store::ensure_table(&paths.orders(), &crate::customers::order_schema())?;
    store::ensure_table(&paths.dialer_results(), &crate::dialer::call_log_schema())?;
    store::ensure_table(&paths.dialer_leads(), &crate::dialer::dialer_schema())?;
    store::ensure_table(&paths.campaigns(), &crate::campaigns::engine::enrollment_schema())?;

    crate::campaigns::definition::ensure_templates_ini(paths)?;
    crate::campaigns::definition::ensure_campaigns_ini(paths)?;

    let state = paths.state_file();
    if !state.exists() {
        std::fs::write(&state, "").map_err(|e| StoreError::io(&state, e))?;
    }

    Ok(())
}
