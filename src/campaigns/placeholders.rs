//! `{Placeholder}` substitution for subjects and bodies.
//!
//! Tokens resolve against a lead row with forgiving matching: exact,
//! lowercased, and underscore-for-space spellings all hit the same
//! column. A missing first name degrades to "there" so greetings never
//! render as `Hi {First Name},`; any other unknown token is left
//! literal for the rep to spot.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([^{}]+)\}").unwrap())
}

/// Build the lookup used for token resolution: original keys plus their
/// lowercased and underscored spellings.
fn normalized(row: &HashMap<String, String>) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for (k, v) in row {
        let k = k.trim();
        out.entry(k.to_string()).or_insert_with(|| v.clone());
        out.entry(k.to_lowercase()).or_insert_with(|| v.clone());
        out.entry(k.to_lowercase().replace(' ', "_"))
            .or_insert_with(|| v.clone());
    }
    out
}

fn is_first_name_token(token: &str) -> bool {
    matches!(
        token.replace('_', " ").trim().to_lowercase().as_str(),
        "first name" | "firstname" | "first"
    )
}

/// Substitute `{Token}` placeholders in `text` from `row`.
pub fn apply_placeholders(text: &str, row: &HashMap<String, String>) -> String {
    if text.is_empty() {
        return String::new();
    }
    let values = normalized(row);
    placeholder_re()
        .replace_all(text, |caps: &Captures<'_>| {
            let token = caps[1].trim().to_string();
            let candidates = [
                token.clone(),
                token.to_lowercase(),
                token.to_lowercase().replace(' ', "_"),
            ];
            for c in &candidates {
                if let Some(v) = values.get(c) {
                    if !v.is_empty() {
                        return v.clone();
                    }
                }
            }
            if is_first_name_token(&token) {
                return "there".to_string();
            }
            format!("{{{}}}", token)
        })
        .into_owned()
}
