//! Per-ref campaign enrollment state (campaigns.csv) and the batch
//! sweep that advances it.
//!
//! One row per enrolled ref: Stage 0 means "intro drafted but not yet
//! observed as sent", 1..=2 mean "step n sent, awaiting the next
//! window", 3 is terminal pending cleanup. The sweep is idempotent: a
//! second run with no underlying change drafts nothing and moves
//! nothing, because every transition is gated on the currently
//! observed stage and result state.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::campaigns::definition::{self, CampaignDefinition};
use crate::campaigns::placeholders::apply_placeholders;
use crate::dialer;
use crate::error::{StoreError, StoreResult};
use crate::leads::{self, HEADER_FIELDS};
use crate::outreach::{DraftRequest, Drafter};
use crate::paths::AppPaths;
use crate::results::{self, ResultRecord};
use crate::store::{self, Schema};
use crate::metrics;

pub const ENROLLMENT_FIELDS: [&str; 6] = [
    "Ref",
    "Email",
    "Company",
    "CampaignKey",
    "Stage",
    "DivertToDialer",
];

pub fn enrollment_schema() -> Schema {
    Schema::new(&ENROLLMENT_FIELDS)
}

/// One row of campaigns.csv.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrollment {
    pub ref_tag: String,
    pub email: String,
    pub company: String,
    pub campaign_key: String,
    pub stage: u8,
    /// Explicit per-enrollment divert flag; `None` inherits the campaign
    /// definition's `send_to_dialer_after` setting.
    pub divert: Option<bool>,
}

impl Enrollment {
    fn from_row(row: &[String], schema: &Schema) -> Self {
        let divert = match store::row_get(row, schema, "DivertToDialer").trim() {
            "" => None,
            v => Some(matches!(v.to_lowercase().as_str(), "1" | "true" | "yes")),
        };
        Enrollment {
            ref_tag: store::row_get(row, schema, "Ref").to_string(),
            email: store::row_get(row, schema, "Email").to_string(),
            company: store::row_get(row, schema, "Company").to_string(),
            campaign_key: {
                let k = store::row_get(row, schema, "CampaignKey").trim();
                if k.is_empty() {
                    definition::DEFAULT_CAMPAIGN_KEY.to_string()
                } else {
                    k.to_string()
                }
            },
            stage: store::row_get(row, schema, "Stage").trim().parse().unwrap_or(0),
            divert,
        }
    }

    fn to_row(&self, schema: &Schema) -> Vec<String> {
        let mut row = vec![String::new(); schema.len()];
        store::row_set(&mut row, schema, "Ref", &self.ref_tag);
        store::row_set(&mut row, schema, "Email", &self.email);
        store::row_set(&mut row, schema, "Company", &self.company);
        store::row_set(&mut row, schema, "CampaignKey", &self.campaign_key);
        store::row_set(&mut row, schema, "Stage", self.stage.to_string());
        let divert = match self.divert {
            None => "",
            Some(true) => "1",
            Some(false) => "0",
        };
        store::row_set(&mut row, schema, "DivertToDialer", divert);
        row
    }
}

pub fn load_enrollments(paths: &AppPaths) -> StoreResult<Vec<Enrollment>> {
    let schema = enrollment_schema();
    let rows = store::load_table(&paths.campaigns(), &schema)?;
    Ok(rows.iter().map(|r| Enrollment::from_row(r, &schema)).collect())
}

pub fn save_enrollments(paths: &AppPaths, enrollments: &[Enrollment]) -> StoreResult<()> {
    let schema = enrollment_schema();
    let rows: Vec<Vec<String>> = enrollments.iter().map(|e| e.to_row(&schema)).collect();
    store::save_table(&paths.campaigns(), &schema, &rows)
}

pub fn is_enrolled(paths: &AppPaths, ref_tag: &str) -> StoreResult<bool> {
    let needle = ref_tag.trim().to_lowercase();
    Ok(load_enrollments(paths)?
        .iter()
        .any(|e| e.ref_tag.trim().to_lowercase() == needle))
}

/// Enroll a ref at stage 0. A ref already enrolled is left untouched
/// (Ref is unique within the table).
pub fn enroll(
    paths: &AppPaths,
    ref_tag: &str,
    email: &str,
    company: &str,
    campaign_key: &str,
    divert: Option<bool>,
) -> StoreResult<bool> {
    let ref_tag = ref_tag.trim();
    if ref_tag.is_empty() {
        return Err(StoreError::InvalidInput("enrollment without a ref".into()));
    }
    let mut enrollments = load_enrollments(paths)?;
    let needle = ref_tag.to_lowercase();
    if enrollments
        .iter()
        .any(|e| e.ref_tag.trim().to_lowercase() == needle)
    {
        return Ok(false);
    }
    enrollments.push(Enrollment {
        ref_tag: ref_tag.to_string(),
        email: email.to_string(),
        company: company.to_string(),
        campaign_key: if campaign_key.trim().is_empty() {
            definition::DEFAULT_CAMPAIGN_KEY.to_string()
        } else {
            campaign_key.trim().to_string()
        },
        stage: 0,
        divert,
    });
    save_enrollments(paths, &enrollments)?;
    Ok(true)
}

/// Enroll every un-replied result row whose Status matches (case
/// insensitive), up to `max_rows`. Returns the number newly enrolled.
pub fn bulk_enroll_by_status(
    paths: &AppPaths,
    status: &str,
    campaign_key: &str,
    divert: Option<bool>,
    max_rows: usize,
) -> StoreResult<usize> {
    let needle = status.trim().to_lowercase();
    let mut count = 0;
    for record in results::load_results(paths)? {
        if count >= max_rows {
            break;
        }
        if record.replied() || record.status.trim().to_lowercase() != needle {
            continue;
        }
        if record.ref_tag.trim().is_empty() {
            continue;
        }
        if enroll(
            paths,
            &record.ref_tag,
            &record.email,
            &record.company,
            campaign_key,
            divert,
        )? {
            count += 1;
        }
    }
    Ok(count)
}

pub fn remove_enrollment(paths: &AppPaths, ref_tag: &str) -> StoreResult<()> {
    let needle = ref_tag.trim().to_lowercase();
    let mut enrollments = load_enrollments(paths)?;
    enrollments.retain(|e| e.ref_tag.trim().to_lowercase() != needle);
    save_enrollments(paths, &enrollments)
}

/// What one sweep did.
#[derive(Debug, Default, Clone, PartialEq, serde::Serialize)]
pub struct SweepReport {
    pub drafted: usize,
    pub removed_replied: usize,
    pub diverted: usize,
    pub completed: usize,
}

fn elapsed_days(sent: NaiveDateTime, now: NaiveDateTime) -> i64 {
    (now - sent).num_days().max(0)
}

/// Whether the follow-up window for `next_stage` (2 or 3) is open.
/// Delays are cumulative from the *first* send, not chained step to
/// step.
fn due_for(
    record: &ResultRecord,
    next_stage: u8,
    def: &CampaignDefinition,
    now: NaiveDateTime,
) -> bool {
    let Some(sent) = metrics::parse_any_datetime(&record.date_sent) else {
        return false;
    };
    let (d2, d3) = def.follow_up_delays();
    let elapsed = elapsed_days(sent, now);
    match next_stage {
        2 => elapsed >= d2 as i64,
        3 => elapsed >= (d2 + d3) as i64,
        _ => false,
    }
}

/// Placeholder source for a ref: the original lead row when it can be
/// found (so Industry and friends resolve), else a thin map from the
/// enrollment and result rows.
fn row_for_placeholders(
    paths: &AppPaths,
    enrollment: &Enrollment,
    record: Option<&ResultRecord>,
) -> StoreResult<HashMap<String, String>> {
    let email = record
        .map(|r| r.email.clone())
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| enrollment.email.clone());
    if let Some(lead) = leads::find_by_email_or_company(paths, &email, &enrollment.company)? {
        return Ok(lead);
    }
    let mut thin: HashMap<String, String> =
        HEADER_FIELDS.iter().map(|h| (h.to_string(), String::new())).collect();
    thin.insert("Email".to_string(), email);
    thin.insert("Company".to_string(), enrollment.company.clone());
    if let Some(r) = record {
        thin.insert("Industry".to_string(), r.industry.clone());
    }
    Ok(thin)
}

fn draft_follow_up(
    paths: &AppPaths,
    drafter: &mut dyn Drafter,
    enrollment: &Enrollment,
    record: &ResultRecord,
    def: &CampaignDefinition,
    next_stage: u8,
) -> StoreResult<bool> {
    let row = row_for_placeholders(paths, enrollment, Some(record))?;
    let target = {
        let e = enrollment.email.trim();
        if e.is_empty() { record.email.trim() } else { e }
    };
    if target.is_empty() {
        return Ok(false);
    }
    let (subject_tpl, body_tpl) = def.subject_body_for_stage(next_stage);
    let request = DraftRequest {
        ref_tag: enrollment.ref_tag.clone(),
        to_email: target.to_string(),
        subject: apply_placeholders(&subject_tpl, &row),
        body: apply_placeholders(&body_tpl, &row),
        stage: next_stage,
    };
    match drafter.draft(&request) {
        Ok(()) => Ok(true),
        Err(e) => {
            // Stage is not advanced; the next sweep retries.
            log::warn!(
                "step {} draft failed for ref {}: {}",
                next_stage,
                enrollment.ref_tag,
                e
            );
            Ok(false)
        }
    }
}

/// One batch sweep over every enrollment row:
/// replied refs are removed; stage 0 rows whose result shows a send are
/// promoted to 1; stages 1 and 2 draft the next step once its window
/// opens; stage 3 rows are cleaned up, diverting to the dialer grid
/// unless the effective flag says otherwise.
pub fn sweep(
    paths: &AppPaths,
    drafter: &mut dyn Drafter,
    now: NaiveDateTime,
) -> StoreResult<SweepReport> {
    let enrollments = load_enrollments(paths)?;
    let by_ref: HashMap<String, ResultRecord> = results::load_results(paths)?
        .into_iter()
        .map(|r| (r.ref_tag.trim().to_lowercase(), r))
        .collect();

    let mut report = SweepReport::default();
    let mut kept: Vec<Enrollment> = Vec::with_capacity(enrollments.len());
    let mut changed = false;

    for mut enrollment in enrollments {
        let record = by_ref.get(&enrollment.ref_tag.trim().to_lowercase());

        if record.map(|r| r.replied()).unwrap_or(false) {
            report.removed_replied += 1;
            changed = true;
            continue;
        }

        // Stage 0 is promoted as soon as a send is observed; the first
        // send comes from the external drafting action, not this sweep.
        if enrollment.stage == 0 {
            let sent = record
                .map(|r| metrics::parse_any_datetime(&r.date_sent).is_some())
                .unwrap_or(false);
            if sent {
                enrollment.stage = 1;
                changed = true;
            }
        }

        let def = definition::load_campaign(paths, &enrollment.campaign_key)?;

        match enrollment.stage {
            1 | 2 => {
                let next_stage = enrollment.stage + 1;
                if let Some(record) = record {
                    if due_for(record, next_stage, &def, now)
                        && draft_follow_up(paths, drafter, &enrollment, record, &def, next_stage)?
                    {
                        enrollment.stage = next_stage;
                        report.drafted += 1;
                        changed = true;
                    }
                }
                kept.push(enrollment);
            }
            s if s >= 3 => {
                let divert = enrollment.divert.unwrap_or(def.settings.send_to_dialer_after);
                if divert {
                    let lead = row_for_placeholders(paths, &enrollment, record)?;
                    dialer::append_lead(paths, &lead)?;
                    report.diverted += 1;
                }
                report.completed += 1;
                changed = true;
            }
            _ => kept.push(enrollment),
        }
    }

    if changed {
        save_enrollments(paths, &kept)?;
    }
    if report != SweepReport::default() {
        log::info!(
            "campaign sweep: {} drafted, {} replied, {} completed ({} diverted)",
            report.drafted,
            report.removed_replied,
            report.completed,
            report.diverted
        );
    }
    Ok(report)
}
