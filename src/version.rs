//! Release-tag comparison for the update check.
//!
//! Tags in the wild are either date-stamped ("2025-03-30") or dotted
//! numerics ("v1.4.2"); both reduce to a numeric tuple compared
//! lexicographically. Non-numeric fragments are ignored rather than
//! rejected, so a stray suffix never blocks an update.

/// Numeric components of a version tag. An unparsable tag is `[0]`,
/// which never beats a real one.
pub fn parse_version(tag: &str) -> Vec<u64> {
    let tag = tag.trim().to_lowercase();
    let tag = tag.strip_prefix('v').unwrap_or(&tag);
    let nums: Vec<u64> = tag
        .replace('.', "-")
        .split('-')
        .filter_map(|part| {
            if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) {
                part.parse().ok()
            } else {
                None
            }
        })
        .collect();
    if nums.is_empty() {
        vec![0]
    } else {
        nums
    }
}

/// Whether `candidate` is strictly newer than `current`.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    parse_version(candidate) > parse_version(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_and_dotted_tags() {
        assert_eq!(parse_version("2025-03-30"), vec![2025, 3, 30]);
        assert_eq!(parse_version("v1.4.2"), vec![1, 4, 2]);
        assert_eq!(parse_version(" V2.0 "), vec![2, 0]);
    }

    #[test]
    fn test_junk_fragments_ignored() {
        assert_eq!(parse_version("1.2-beta"), vec![1, 2]);
        assert_eq!(parse_version("nightly"), vec![0]);
        assert_eq!(parse_version(""), vec![0]);
    }

    #[test]
    fn test_is_newer_comparisons() {
        assert!(is_newer("2025-04-01", "2025-03-30"));
        assert!(!is_newer("2025-03-30", "2025-03-30"));
        assert!(is_newer("1.10.0", "1.9.9"));
        // A parsable tag always beats junk.
        assert!(is_newer("0.0.1", "garbage"));
        assert!(!is_newer("garbage", "0.0.1"));
    }
}
