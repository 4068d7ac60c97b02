//! GrowthFarm core engine: CSV-backed lead, dialer, and campaign
//! plumbing for small-team outreach.
//!
//! Everything persists as flat files in one per-user data directory
//! (see [`paths::AppPaths`]): human-readable CSV tables rewritten
//! atomically with timestamped backups, INI files for templates and
//! campaign definitions, and a newline set for the drafted-once guard.
//! There is no daemon and no database; any shell (GUI, cron job, the
//! bundled binary) drives the engines directly and a [`watcher`] polls
//! for edits made behind its back.
//!
//! The mail client itself stays out of the crate: drafting goes through
//! the [`outreach::Drafter`] trait, with a filesystem outbox as the
//! built-in implementation.

pub mod accounts;
pub mod analytics;
pub mod campaigns;
pub mod customers;
pub mod dialer;
mod error;
pub mod leads;
pub mod metrics;
pub mod outreach;
pub mod paths;
pub mod results;
pub mod store;
pub mod version;
pub mod warm;
pub mod watcher;

pub use error::{DraftError, StoreError, StoreResult};
