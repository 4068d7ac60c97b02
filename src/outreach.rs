//! Drafting seam and the first-touch email batch.
//!
//! The mail client itself is an external collaborator; this module owns
//! the `Drafter` trait it hides behind, the HTML rendering shared by
//! every implementation, and the "fire emails" batch that drafts the
//! intro step for fresh leads exactly once (guarded by the fingerprint
//! seen-set in state.txt).

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::campaigns::definition::{self, TemplateSet};
use crate::campaigns::placeholders::apply_placeholders;
use crate::error::{DraftError, StoreResult};
use crate::leads;
use crate::paths::AppPaths;
use crate::results::{self, ResultRecord};
use crate::store;

/// A fully rendered outbound message, ready for the mail client.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftRequest {
    pub ref_tag: String,
    pub to_email: String,
    /// Rendered subject, without the `[ref:..]` tag (the drafter appends it).
    pub subject: String,
    /// Rendered plain-text body; paragraphs separated by blank lines.
    pub body: String,
    /// Campaign stage 1..=3 this draft belongs to.
    pub stage: u8,
}

impl DraftRequest {
    /// Subject line as it appears in the mail client.
    pub fn tagged_subject(&self) -> String {
        format!("{} [ref:{}]", self.subject, self.ref_tag)
    }
}

/// Creates draft messages in the user's mail client (or a stand-in).
pub trait Drafter {
    fn draft(&mut self, request: &DraftRequest) -> Result<(), DraftError>;
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render plain text as HTML paragraph blocks: blank lines split
/// paragraphs, single newlines become `<br>`.
pub fn blocks_to_html(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let parts: Vec<&str> = text.split("\n\n").filter(|p| !p.trim().is_empty()).collect();
    if parts.is_empty() {
        return "<p></p>".to_string();
    }
    parts
        .iter()
        .map(|p| {
            format!(
                "<p style=\"margin:0 0 12px 0;\">{}</p>",
                escape_html(p).replace('\n', "<br>")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wrap a rendered body in the standard message shell, embedding the
/// ref tag as an HTML comment for the sync side.
pub fn message_html(body_text: &str, ref_tag: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"></head>\n\
         <body style=\"margin:0;padding:0;\">\n\
         <div style=\"font-family:Segoe UI, Arial, sans-serif; font-size:14px; line-height:1.5; color:#111;\">\n\
         {}\n<!-- ref:{} -->\n</div>\n</body></html>",
        blocks_to_html(body_text),
        ref_tag
    )
}

/// Filesystem drafter: writes each draft as an .html file into the
/// drafts directory and caches a result row so the grid shows it.
///
/// Refuses to draft when the ref tag is already assigned to a different
/// address; truncated fingerprints make collisions possible, and
/// merging two leads' reply tracking would corrupt both.
pub struct OutboxDrafter {
    paths: AppPaths,
}

impl OutboxDrafter {
    pub fn new(paths: &AppPaths) -> Self {
        OutboxDrafter {
            paths: paths.clone(),
        }
    }
}

impl Drafter for OutboxDrafter {
    fn draft(&mut self, request: &DraftRequest) -> Result<(), DraftError> {
        if let Some(existing) = results::find_result(&self.paths, &request.ref_tag)? {
            let known = existing.email.trim().to_lowercase();
            let target = request.to_email.trim().to_lowercase();
            if !known.is_empty() && known != target {
                return Err(DraftError::RefCollision {
                    tag: request.ref_tag.clone(),
                    existing: existing.email,
                });
            }
        }

        let dir = self.paths.drafts_dir();
        std::fs::create_dir_all(&dir)?;
        let file = dir.join(format!("{}-s{}.html", request.ref_tag, request.stage));
        let html = format!(
            "<!-- to: {} -->\n<!-- subject: {} -->\n{}",
            request.to_email,
            request.tagged_subject(),
            message_html(&request.body, &request.ref_tag)
        );
        std::fs::write(&file, html)?;

        results::upsert_result(
            &self.paths,
            &ResultRecord {
                ref_tag: request.ref_tag.clone(),
                email: request.to_email.clone(),
                subject: request.subject.clone(),
                ..ResultRecord::default()
            },
        )?;
        log::info!(
            "drafted stage {} for ref {} -> {}",
            request.stage,
            request.ref_tag,
            file.display()
        );
        Ok(())
    }
}

/// In-memory drafter for tests and `--dry-run`: records every request,
/// optionally failing to simulate an unavailable mail client.
#[derive(Debug, Default)]
pub struct MemoryDrafter {
    pub requests: Vec<DraftRequest>,
    pub fail: bool,
}

impl Drafter for MemoryDrafter {
    fn draft(&mut self, request: &DraftRequest) -> Result<(), DraftError> {
        if self.fail {
            return Err(DraftError::Unavailable("drafting disabled".to_string()));
        }
        self.requests.push(request.clone());
        Ok(())
    }
}

/// Outcome of a first-touch batch.
#[derive(Debug, Default, Clone, PartialEq, serde::Serialize)]
pub struct BatchReport {
    pub drafted: usize,
    pub skipped_seen: usize,
    pub skipped_invalid: usize,
    pub failed: usize,
}

/// Draft the intro email for every lead that has a valid address and
/// has never been drafted against (fingerprint not in state.txt). The
/// template is chosen per lead from the industry map in templates.ini.
pub fn draft_new_leads(
    paths: &AppPaths,
    drafter: &mut dyn Drafter,
) -> StoreResult<BatchReport> {
    let templates = definition::load_templates(paths)?;
    let schema = leads::lead_schema();
    let rows = leads::load_leads(paths)?;
    let seen = leads::load_seen_set(paths)?;

    let mut report = BatchReport::default();
    let mut newly_seen = Vec::new();

    for row in &rows {
        let lead = store::row_to_map(row, &schema);
        let email = lead.get("Email").map(String::as_str).unwrap_or("").trim();
        if !leads::valid_email(email) {
            report.skipped_invalid += 1;
            continue;
        }
        let fp = leads::fingerprint(&lead);
        if seen.contains(&fp) || newly_seen.contains(&fp) {
            report.skipped_seen += 1;
            continue;
        }

        let request = intro_request(&lead, &templates);
        match drafter.draft(&request) {
            Ok(()) => {
                report.drafted += 1;
                newly_seen.push(fp);
            }
            Err(e) => {
                report.failed += 1;
                log::warn!("intro draft failed for {}: {}", request.ref_tag, e);
            }
        }
    }

    leads::append_seen(paths, &newly_seen)?;
    Ok(report)
}

fn intro_request(lead: &HashMap<String, String>, templates: &TemplateSet) -> DraftRequest {
    let industry = lead.get("Industry").map(String::as_str).unwrap_or("");
    let key = definition::choose_template_key(industry, templates);
    let subject_tpl = templates
        .subject_for(&key)
        .cloned()
        .unwrap_or_else(|| definition::DEFAULT_SUBJECT.to_string());
    let body_tpl = templates
        .template_for(&key)
        .cloned()
        .unwrap_or_else(|| definition::DEFAULT_BODY.to_string());
    DraftRequest {
        ref_tag: leads::ref_tag(lead),
        to_email: lead.get("Email").cloned().unwrap_or_default(),
        subject: apply_placeholders(&subject_tpl, lead),
        body: apply_placeholders(&body_tpl, lead),
        stage: 1,
    }
}

/// Record that a drafted message actually went out, anchoring the
/// campaign clock. A DateSent already on file is never moved.
pub fn record_sent(paths: &AppPaths, ref_tag: &str, at: NaiveDateTime) -> StoreResult<()> {
    results::upsert_result(
        paths,
        &ResultRecord {
            ref_tag: ref_tag.to_string(),
            date_sent: at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ..ResultRecord::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn seed_lead(paths: &AppPaths, email: &str, first: &str, company: &str, industry: &str) {
        let schema = leads::lead_schema();
        let mut rows = leads::load_leads(paths).unwrap();
        let mut row = vec![String::new(); schema.len()];
        store::row_set(&mut row, &schema, "Email", email);
        store::row_set(&mut row, &schema, "First Name", first);
        store::row_set(&mut row, &schema, "Company", company);
        store::row_set(&mut row, &schema, "Industry", industry);
        rows.push(row);
        leads::save_leads(paths, &rows).unwrap();
    }

    #[test]
    fn test_blocks_to_html_paragraphs_and_escaping() {
        let html = blocks_to_html("Hi <Sam>,\nline two\n\nBye & thanks");
        assert!(html.contains("&lt;Sam&gt;"));
        assert!(html.contains("line two"));
        assert!(html.contains("<br>"));
        assert!(html.contains("&amp; thanks"));
        assert_eq!(html.matches("<p ").count(), 2);
        assert_eq!(blocks_to_html(""), "<p></p>");
    }

    #[test]
    fn test_message_html_embeds_ref_comment() {
        let html = message_html("Hello", "a1b2c3d4");
        assert!(html.contains("<!-- ref:a1b2c3d4 -->"));
    }

    #[test]
    fn test_draft_new_leads_once_per_fingerprint() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        seed_lead(&paths, "sam@acme.com", "Sam", "Acme", "Retail");
        seed_lead(&paths, "not-an-email", "Jo", "Bad", "Retail");

        let mut drafter = MemoryDrafter::default();
        let report = draft_new_leads(&paths, &mut drafter).unwrap();
        assert_eq!(report.drafted, 1);
        assert_eq!(report.skipped_invalid, 1);
        assert_eq!(drafter.requests.len(), 1);
        assert_eq!(drafter.requests[0].to_email, "sam@acme.com");
        assert!(drafter.requests[0].subject.contains("YOUR COMPANY"));

        // Second run: the fingerprint is now in the seen set.
        let report = draft_new_leads(&paths, &mut drafter).unwrap();
        assert_eq!(report.drafted, 0);
        assert_eq!(report.skipped_seen, 1);
    }

    #[test]
    fn test_failed_draft_not_marked_seen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        seed_lead(&paths, "sam@acme.com", "Sam", "Acme", "Retail");

        let mut drafter = MemoryDrafter {
            fail: true,
            ..MemoryDrafter::default()
        };
        let report = draft_new_leads(&paths, &mut drafter).unwrap();
        assert_eq!(report.failed, 1);

        drafter.fail = false;
        let report = draft_new_leads(&paths, &mut drafter).unwrap();
        assert_eq!(report.drafted, 1);
    }

    #[test]
    fn test_outbox_drafter_writes_file_and_result() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        let mut drafter = OutboxDrafter::new(&paths);
        let request = DraftRequest {
            ref_tag: "a1b2c3d4".into(),
            to_email: "sam@acme.com".into(),
            subject: "Quick hello for Acme".into(),
            body: "Hi Sam,\n\nHello.".into(),
            stage: 2,
        };
        drafter.draft(&request).unwrap();

        let file = paths.drafts_dir().join("a1b2c3d4-s2.html");
        let html = std::fs::read_to_string(file).unwrap();
        assert!(html.contains("[ref:a1b2c3d4]"));
        assert!(html.contains("Hi Sam,"));

        let cached = results::find_result(&paths, "a1b2c3d4").unwrap().unwrap();
        assert_eq!(cached.email, "sam@acme.com");
        assert_eq!(cached.subject, "Quick hello for Acme");
    }

    #[test]
    fn test_outbox_drafter_rejects_ref_collision() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        results::upsert_result(
            &paths,
            &ResultRecord {
                ref_tag: "a1b2c3d4".into(),
                email: "other@elsewhere.com".into(),
                ..ResultRecord::default()
            },
        )
        .unwrap();

        let mut drafter = OutboxDrafter::new(&paths);
        let request = DraftRequest {
            ref_tag: "a1b2c3d4".into(),
            to_email: "sam@acme.com".into(),
            subject: "s".into(),
            body: "b".into(),
            stage: 1,
        };
        let err = drafter.draft(&request).unwrap_err();
        assert!(matches!(err, DraftError::RefCollision { .. }));
    }

    #[test]
    fn test_record_sent_keeps_existing_anchor() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        let noon = |d: &str| {
            NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap()
        };
        record_sent(&paths, "a1b2c3d4", noon("2025-01-01")).unwrap();
        record_sent(&paths, "a1b2c3d4", noon("2025-02-01")).unwrap();
        let r = results::find_result(&paths, "a1b2c3d4").unwrap().unwrap();
        assert_eq!(r.date_sent, "2025-01-01 12:00:00");
    }
}
