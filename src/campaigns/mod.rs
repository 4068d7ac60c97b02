//! Multi-step outreach campaigns: definitions (campaigns.ini), template
//! rendering, and the per-ref enrollment state machine.

pub mod definition;
pub mod engine;
pub mod placeholders;
