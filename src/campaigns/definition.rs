//! Campaign definitions persisted in campaigns.ini, plus the single-shot
//! intro templates in templates.ini.
//!
//! campaigns.ini layout (backward compatible):
//!
//! ```ini
//! [index]
//! keys = default,butcher shop
//!
//! [campaign:default]
//! subject1 = Quick intro from YOUR COMPANY
//! body1 = Hey {First Name},\n\n...
//! delay1 = 0
//! subject2 = ...
//! delay2 = 3
//! ...
//! send_to_dialer_after = 1
//! auto_sync_outlook = 0
//! hourly_campaign_runner = 1
//! ```
//!
//! Older installs wrote a single campaign as flat `[step1]`..`[step3]` +
//! `[settings]` sections; those still load as the "default" campaign.
//! Bodies are single-line in the file: newlines are stored as `\n`
//! escapes and restored on load.

use std::collections::HashMap;

use configparser::ini::Ini;

use crate::error::{StoreError, StoreResult};
use crate::paths::AppPaths;
use crate::results;

pub const DEFAULT_CAMPAIGN_KEY: &str = "default";

pub const DEFAULT_SUBJECT: &str = "Quick intro from YOUR COMPANY";
pub const DEFAULT_BODY: &str = "Hey {First Name},\n\nMy name is YOUR NAME with YOUR COMPANY. We help {Industry} MAIN GOAL. If it's useful, I can share examples or send over a couple of samples.\n\nThanks,\nYOUR NAME\nYOUR COMPANY\nPHONE\nWEBSITE";

const FALLBACK_SUBJECTS: [&str; 3] = [
    "Quick hello for {Company}",
    "Following up for {Company}",
    "Worth a quick chat about {Company}?",
];
const FALLBACK_BODIES: [&str; 3] = [
    "Hi {First Name},\n\nWanted to share something relevant to {Company}.\n\nCheers,\nMe",
    "Hi {First Name},\n\nCircling back in case my note missed you.\n\nBest,\nMe",
    "Hi {First Name},\n\nLast follow-up from me\u{2014}open to a quick call?\n\nThanks,\nMe",
];

/// One of a campaign's three sends.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignStep {
    pub subject: String,
    pub body: String,
    /// Days after the previous step. Step 1's delay is unused.
    pub delay_days: u32,
}

impl CampaignStep {
    fn blank(delay_days: u32) -> Self {
        CampaignStep {
            subject: String::new(),
            body: String::new(),
            delay_days,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.subject.trim().is_empty() || !self.body.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CampaignSettings {
    /// Push non-responders onto the dialer grid after the final step.
    pub send_to_dialer_after: bool,
    pub auto_sync_outlook: bool,
    pub hourly_campaign_runner: bool,
}

impl Default for CampaignSettings {
    fn default() -> Self {
        CampaignSettings {
            send_to_dialer_after: true,
            auto_sync_outlook: false,
            hourly_campaign_runner: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CampaignDefinition {
    pub steps: [CampaignStep; 3],
    pub settings: CampaignSettings,
}

impl Default for CampaignDefinition {
    fn default() -> Self {
        CampaignDefinition {
            steps: [
                CampaignStep {
                    subject: DEFAULT_SUBJECT.to_string(),
                    body: DEFAULT_BODY.to_string(),
                    delay_days: 0,
                },
                CampaignStep::blank(3),
                CampaignStep::blank(7),
            ],
            settings: CampaignSettings::default(),
        }
    }
}

impl CampaignDefinition {
    /// Follow-up delays: (step 2 delay, step 3 delay).
    pub fn follow_up_delays(&self) -> (u32, u32) {
        (self.steps[1].delay_days, self.steps[2].delay_days)
    }

    /// Subject and body for a stage (1..=3), falling back to stock copy
    /// when the step was left blank.
    pub fn subject_body_for_stage(&self, stage: u8) -> (String, String) {
        let idx = (stage.clamp(1, 3) - 1) as usize;
        let step = &self.steps[idx];
        let subject = if step.subject.trim().is_empty() {
            FALLBACK_SUBJECTS[idx].to_string()
        } else {
            step.subject.clone()
        };
        let body = if step.body.trim().is_empty() {
            FALLBACK_BODIES[idx].to_string()
        } else {
            step.body.clone()
        };
        (subject, body)
    }
}

// ---------------------------------------------------------------
// newline escaping for single-line INI values
// ---------------------------------------------------------------

fn escape_value(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\r', "")
        .replace('\n', "\\n")
}

fn unescape_value(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

// ---------------------------------------------------------------
// campaigns.ini IO
// ---------------------------------------------------------------

fn read_ini(paths: &AppPaths) -> StoreResult<Ini> {
    let path = paths.campaigns_ini();
    let mut ini = Ini::new();
    if path.exists() {
        ini.load(&path).map_err(StoreError::Config)?;
    }
    Ok(ini)
}

fn write_ini(paths: &AppPaths, ini: &Ini) -> StoreResult<()> {
    let path = paths.campaigns_ini();
    ini.write(&path).map_err(|e| StoreError::io(&path, e))
}

fn section_name(key: &str) -> String {
    let key = key.trim();
    let key = if key.is_empty() { DEFAULT_CAMPAIGN_KEY } else { key };
    format!("campaign:{}", key)
}

fn parse_flag(value: Option<String>, default: bool) -> bool {
    match value {
        Some(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

fn parse_delay(value: Option<String>) -> u32 {
    value
        .as_deref()
        .unwrap_or("")
        .trim()
        .parse::<u32>()
        .unwrap_or(0)
}

/// List campaign keys: the `[index]` CSV plus any stray `[campaign:*]`
/// sections, "default" when nothing is defined yet.
pub fn list_campaign_keys(paths: &AppPaths) -> StoreResult<Vec<String>> {
    let ini = read_ini(paths)?;
    let mut keys: Vec<String> = ini
        .get("index", "keys")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect();
    for section in ini.sections() {
        if let Some(k) = section.strip_prefix("campaign:") {
            let k = k.trim();
            if !k.is_empty() && !keys.iter().any(|e| e.eq_ignore_ascii_case(k)) {
                keys.push(k.to_string());
            }
        }
    }
    if keys.is_empty() {
        keys.push(DEFAULT_CAMPAIGN_KEY.to_string());
    }
    keys.sort_by_key(|k| k.to_lowercase());
    Ok(keys)
}

/// Load a campaign by key. An unknown key falls back to the legacy flat
/// layout, then to stock defaults, so loading never fails on content.
pub fn load_campaign(paths: &AppPaths, key: &str) -> StoreResult<CampaignDefinition> {
    let ini = read_ini(paths)?;
    let section = section_name(key);
    if !ini
        .sections()
        .iter()
        .any(|s| s.eq_ignore_ascii_case(&section))
    {
        return Ok(load_flat_campaign(&ini));
    }

    let defaults = CampaignDefinition::default();
    let mut steps = defaults.steps.clone();
    for (i, step) in steps.iter_mut().enumerate() {
        let n = i + 1;
        *step = CampaignStep {
            subject: ini
                .get(&section, &format!("subject{n}"))
                .unwrap_or_default(),
            body: unescape_value(&ini.get(&section, &format!("body{n}")).unwrap_or_default()),
            delay_days: parse_delay(ini.get(&section, &format!("delay{n}"))),
        };
    }
    let settings = CampaignSettings {
        send_to_dialer_after: parse_flag(ini.get(&section, "send_to_dialer_after"), true),
        auto_sync_outlook: parse_flag(ini.get(&section, "auto_sync_outlook"), false),
        hourly_campaign_runner: parse_flag(ini.get(&section, "hourly_campaign_runner"), true),
    };
    Ok(CampaignDefinition { steps, settings })
}

/// The pre-multi-campaign layout: `[step1]`..`[step3]` + `[settings]`.
fn load_flat_campaign(ini: &Ini) -> CampaignDefinition {
    let has_flat = ini
        .sections()
        .iter()
        .any(|s| s.eq_ignore_ascii_case("step1") || s.eq_ignore_ascii_case("settings"));
    if !has_flat {
        return CampaignDefinition::default();
    }
    let defaults = CampaignDefinition::default();
    let mut steps = defaults.steps.clone();
    for (i, step) in steps.iter_mut().enumerate() {
        let section = format!("step{}", i + 1);
        *step = CampaignStep {
            subject: ini.get(&section, "subject").unwrap_or_default(),
            body: unescape_value(&ini.get(&section, "body").unwrap_or_default()),
            delay_days: parse_delay(ini.get(&section, "delay_days")),
        };
    }
    CampaignDefinition {
        steps,
        settings: CampaignSettings {
            send_to_dialer_after: parse_flag(ini.get("settings", "send_to_dialer_after"), true),
            auto_sync_outlook: parse_flag(ini.get("settings", "auto_sync_outlook"), false),
            hourly_campaign_runner: parse_flag(ini.get("settings", "hourly_campaign_runner"), true),
        },
    }
}

pub fn save_campaign(
    paths: &AppPaths,
    key: &str,
    definition: &CampaignDefinition,
) -> StoreResult<()> {
    let key = key.trim();
    let key = if key.is_empty() { DEFAULT_CAMPAIGN_KEY } else { key };
    let mut ini = read_ini(paths)?;
    let section = section_name(key);

    for (i, step) in definition.steps.iter().enumerate() {
        let n = i + 1;
        ini.set(&section, &format!("subject{n}"), Some(step.subject.clone()));
        ini.set(&section, &format!("body{n}"), Some(escape_value(&step.body)));
        ini.set(&section, &format!("delay{n}"), Some(step.delay_days.to_string()));
    }
    let s = &definition.settings;
    ini.set(
        &section,
        "send_to_dialer_after",
        Some(if s.send_to_dialer_after { "1" } else { "0" }.to_string()),
    );
    ini.set(
        &section,
        "auto_sync_outlook",
        Some(if s.auto_sync_outlook { "1" } else { "0" }.to_string()),
    );
    ini.set(
        &section,
        "hourly_campaign_runner",
        Some(if s.hourly_campaign_runner { "1" } else { "0" }.to_string()),
    );

    let mut keys = list_campaign_keys(paths)?;
    if !keys.iter().any(|k| k.eq_ignore_ascii_case(key)) {
        keys.push(key.to_string());
        keys.sort_by_key(|k| k.to_lowercase());
    }
    ini.set("index", "keys", Some(keys.join(",")));
    write_ini(paths, &ini)
}

pub fn delete_campaign(paths: &AppPaths, key: &str) -> StoreResult<()> {
    let mut ini = read_ini(paths)?;
    let section = section_name(key);
    ini.remove_section(&section);
    let keys: Vec<String> = list_campaign_keys(paths)?
        .into_iter()
        .filter(|k| !k.eq_ignore_ascii_case(key.trim()))
        .collect();
    let keys = if keys.is_empty() {
        vec![DEFAULT_CAMPAIGN_KEY.to_string()]
    } else {
        keys
    };
    ini.set("index", "keys", Some(keys.join(",")));
    write_ini(paths, &ini)
}

/// Seed campaigns.ini with the stock default campaign if absent.
pub fn ensure_campaigns_ini(paths: &AppPaths) -> StoreResult<()> {
    if paths.campaigns_ini().exists() {
        return Ok(());
    }
    save_campaign(paths, DEFAULT_CAMPAIGN_KEY, &CampaignDefinition::default())
}

/// One line of the campaign overview table:
/// key, enabled step numbers, delays, to-dialer flag.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignSummary {
    pub key: String,
    pub enabled_steps: String,
    pub delays: String,
    pub to_dialer: bool,
}

pub fn summarize_campaign(paths: &AppPaths, key: &str) -> StoreResult<CampaignSummary> {
    let def = load_campaign(paths, key)?;
    let enabled: Vec<String> = def
        .steps
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_enabled())
        .map(|(i, _)| (i + 1).to_string())
        .collect();
    Ok(CampaignSummary {
        key: key.to_string(),
        enabled_steps: if enabled.is_empty() {
            "\u{2014}".to_string()
        } else {
            enabled.join(", ")
        },
        delays: def
            .steps
            .iter()
            .map(|s| s.delay_days.to_string())
            .collect::<Vec<_>>()
            .join(" / "),
        to_dialer: def.settings.send_to_dialer_after,
    })
}

/// Sent/replied counts for a campaign, by matching stored result
/// subjects against the campaign's step subjects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CampaignStats {
    pub sent: usize,
    pub replied: usize,
}

impl CampaignStats {
    pub fn response_pct(&self) -> f64 {
        if self.sent == 0 {
            0.0
        } else {
            self.replied as f64 / self.sent as f64 * 100.0
        }
    }
}

pub fn campaign_stats(paths: &AppPaths, key: &str) -> StoreResult<CampaignStats> {
    let def = load_campaign(paths, key)?;
    let subjects: Vec<String> = def
        .steps
        .iter()
        .map(|s| s.subject.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if subjects.is_empty() {
        return Ok(CampaignStats::default());
    }
    let mut stats = CampaignStats::default();
    for record in results::load_results(paths)? {
        if subjects.iter().any(|s| s == record.subject.trim()) {
            if !record.date_sent.trim().is_empty() {
                stats.sent += 1;
            }
            if record.replied() {
                stats.replied += 1;
            }
        }
    }
    Ok(stats)
}

// ---------------------------------------------------------------
// templates.ini (single-shot intro mail)
// ---------------------------------------------------------------

/// Parsed templates.ini: body templates, subjects, and the
/// industry-substring-to-template map.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    pub templates: HashMap<String, String>,
    pub subjects: HashMap<String, String>,
    pub industry_map: HashMap<String, String>,
}

impl TemplateSet {
    pub fn template_for(&self, key: &str) -> Option<&String> {
        self.templates.get(&key.to_lowercase())
    }

    pub fn subject_for(&self, key: &str) -> Option<&String> {
        self.subjects.get(&key.to_lowercase())
    }
}

/// Pick the template key for a lead's industry: first map entry whose
/// needle is a case-insensitive substring of the industry wins.
pub fn choose_template_key(industry: &str, set: &TemplateSet) -> String {
    let industry = industry.to_lowercase();
    for (needle, key) in &set.industry_map {
        if industry.contains(&needle.to_lowercase()) {
            return key.clone();
        }
    }
    DEFAULT_CAMPAIGN_KEY.to_string()
}

fn section_map(ini: &Ini, section: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    if let Some(map) = ini.get_map() {
        if let Some(entries) = map.get(section) {
            for (k, v) in entries {
                out.insert(k.clone(), unescape_value(v.as_deref().unwrap_or("")));
            }
        }
    }
    out
}

/// Load templates.ini, backfilling the stock default template and
/// subject so both maps always have a "default" entry.
pub fn load_templates(paths: &AppPaths) -> StoreResult<TemplateSet> {
    let path = paths.templates_ini();
    let mut ini = Ini::new();
    if path.exists() {
        ini.load(&path).map_err(StoreError::Config)?;
    }
    let mut set = TemplateSet {
        templates: section_map(&ini, "templates"),
        subjects: section_map(&ini, "subjects"),
        industry_map: section_map(&ini, "map"),
    };
    set.templates
        .entry(DEFAULT_CAMPAIGN_KEY.to_string())
        .or_insert_with(|| DEFAULT_BODY.to_string());
    set.subjects
        .entry(DEFAULT_CAMPAIGN_KEY.to_string())
        .or_insert_with(|| DEFAULT_SUBJECT.to_string());
    Ok(set)
}

/// Seed templates.ini with the stock default if absent.
pub fn ensure_templates_ini(paths: &AppPaths) -> StoreResult<()> {
    let path = paths.templates_ini();
    if path.exists() {
        return Ok(());
    }
    let mut ini = Ini::new();
    ini.set("templates", DEFAULT_CAMPAIGN_KEY, Some(escape_value(DEFAULT_BODY)));
    ini.set("subjects", DEFAULT_CAMPAIGN_KEY, Some(DEFAULT_SUBJECT.to_string()));
    ini.set("map", "_placeholder", None);
    ini.remove_key("map", "_placeholder");
    ini.write(&path).map_err(|e| StoreError::io(&path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> (tempfile::TempDir, AppPaths) {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::at(dir.path());
        (dir, paths)
    }

    #[test]
    fn test_escape_round_trip() {
        let body = "Hi {First Name},\n\nLine two\\with backslash";
        assert_eq!(unescape_value(&escape_value(body)), body);
        assert!(!escape_value(body).contains('\n'));
    }

    #[test]
    fn test_default_definition() {
        let def = CampaignDefinition::default();
        assert_eq!(def.follow_up_delays(), (3, 7));
        assert!(def.steps[0].is_enabled());
        assert!(!def.steps[1].is_enabled());
        assert!(def.settings.send_to_dialer_after);
    }

    #[test]
    fn test_save_load_round_trip() {
        let (_dir, paths) = paths();
        let mut def = CampaignDefinition::default();
        def.steps[1].subject = "Checking in with {Company}".to_string();
        def.steps[1].body = "Hi {First Name},\n\nStill interested?".to_string();
        def.steps[1].delay_days = 5;
        def.settings.send_to_dialer_after = false;
        save_campaign(&paths, "butcher shop", &def).unwrap();

        let loaded = load_campaign(&paths, "butcher shop").unwrap();
        assert_eq!(loaded, def);

        let keys = list_campaign_keys(&paths).unwrap();
        assert!(keys.iter().any(|k| k == "butcher shop"));
    }

    #[test]
    fn test_unknown_key_yields_defaults() {
        let (_dir, paths) = paths();
        let def = load_campaign(&paths, "nope").unwrap();
        assert_eq!(def, CampaignDefinition::default());
    }

    #[test]
    fn test_legacy_flat_layout_still_loads() {
        let (_dir, paths) = paths();
        let text = "[step1]\nsubject = Old intro\nbody = Hello {First Name}\ndelay_days = 0\n\n[step2]\nsubject =\nbody =\ndelay_days = 4\n\n[settings]\nsend_to_dialer_after = 0\n";
        std::fs::write(paths.campaigns_ini(), text).unwrap();
        let def = load_campaign(&paths, "default").unwrap();
        assert_eq!(def.steps[0].subject, "Old intro");
        assert_eq!(def.steps[1].delay_days, 4);
        assert!(!def.settings.send_to_dialer_after);
    }

    #[test]
    fn test_delete_campaign_prunes_index() {
        let (_dir, paths) = paths();
        save_campaign(&paths, "a", &CampaignDefinition::default()).unwrap();
        save_campaign(&paths, "b", &CampaignDefinition::default()).unwrap();
        delete_campaign(&paths, "a").unwrap();
        let keys = list_campaign_keys(&paths).unwrap();
        assert!(!keys.iter().any(|k| k == "a"));
        assert!(keys.iter().any(|k| k == "b"));
    }

    #[test]
    fn test_fallback_copy_for_blank_steps() {
        let def = CampaignDefinition {
            steps: [
                CampaignStep::blank(0),
                CampaignStep::blank(3),
                CampaignStep::blank(7),
            ],
            settings: CampaignSettings::default(),
        };
        let (subj, body) = def.subject_body_for_stage(2);
        assert_eq!(subj, "Following up for {Company}");
        assert!(body.contains("Circling back"));
    }

    #[test]
    fn test_templates_seed_and_choose() {
        let (_dir, paths) = paths();
        ensure_templates_ini(&paths).unwrap();
        let set = load_templates(&paths).unwrap();
        assert!(set.template_for("default").is_some());
        assert!(set.subject_for("default").is_some());

        let mut set = set;
        set.industry_map
            .insert("butcher".to_string(), "meat".to_string());
        assert_eq!(choose_template_key("Local Butcher Shop", &set), "meat");
        assert_eq!(choose_template_key("Florist", &set), "default");
    }
}
