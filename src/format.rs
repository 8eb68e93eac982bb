//! Name, date and body formatting shared by the importers.

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

use crate::config::Timezone;

lazy_static::lazy_static! {
    static ref INVALID_NAME_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_.\-]").unwrap();
}

/// Maximum repository description length accepted by the destination.
pub const MAX_DESCRIPTION_CHARS: usize = 255;

/// Turns a source display name into a destination user/org/repo name.
///
/// Spaces become underscores, anything outside `[a-zA-Z0-9_.-]` becomes a
/// dash. `plugins` is reserved on the destination and gets a `-user` suffix.
pub fn clean_name(name: &str) -> String {
    let spaced = name.replace(' ', "_");
    let cleaned = INVALID_NAME_CHARS.replace_all(&spaced, "-").into_owned();
    if cleaned.eq_ignore_ascii_case("plugins") {
        return format!("{cleaned}-user");
    }
    cleaned
}

/// Normalizes a source due date (`2024-01-15` or RFC 3339) to
/// `YYYY-MM-DDTHH:MM:SSZ`. Empty input yields `None`.
pub fn normalize_due_date(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(format!("{}T00:00:00Z", date.format("%Y-%m-%d")));
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

/// Truncates to the destination's description limit, counting characters.
/// Returns the text and whether it was cut.
pub fn truncate_description(description: &str) -> (String, bool) {
    if description.chars().count() <= MAX_DESCRIPTION_CHARS {
        return (description.to_string(), false);
    }
    (
        description.chars().take(MAX_DESCRIPTION_CHARS).collect(),
        true,
    )
}

pub fn format_timestamp(created_at: DateTime<Utc>, timezone: Timezone) -> String {
    const FORMAT: &str = "%Y-%m-%d %H:%M:%S %:z";
    match timezone {
        Timezone::Fixed(offset) => created_at.with_timezone(&offset).format(FORMAT).to_string(),
        Timezone::Named(tz) => created_at.with_timezone(&tz).format(FORMAT).to_string(),
    }
}

/// Issue bodies are prefixed with their creation time and, when the author
/// could not be impersonated, the author's name.
pub fn annotate_issue_body(body: &str, created: &str, author: Option<&str>) -> String {
    let mut annotated = format!("> Created: {created}\n");
    if let Some(author) = author {
        annotated.push_str(&format!("> Author: {author}\n"));
    }
    annotated.push('\n');
    annotated.push_str(body);
    annotated
}

/// Comment bodies carry the same annotation as a suffix.
pub fn annotate_comment_body(body: &str, created: &str, author: Option<&str>) -> String {
    let mut annotated = body.trim_end().to_string();
    annotated.push_str("\n\n");
    if let Some(author) = author {
        annotated.push_str(&format!("> Author: {author}\n"));
    }
    annotated.push_str(&format!("> Created: {created}"));
    annotated
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clean_name_replaces_spaces_and_symbols() {
        assert_eq!(clean_name("My Team"), "My_Team");
        assert_eq!(clean_name("Café Ops"), "Caf-_Ops");
        assert_eq!(clean_name("a/b:c"), "a-b-c");
    }

    #[test]
    fn test_clean_name_is_idempotent_on_clean_names() {
        for name in ["my-repo", "My_Repo", "v1.2", "plugins-user", "A_b.c-d"] {
            assert_eq!(clean_name(name), name);
            assert_eq!(clean_name(&clean_name(name)), clean_name(name));
        }
    }

    #[test]
    fn test_clean_name_reserves_plugins() {
        assert_eq!(clean_name("plugins"), "plugins-user");
        assert_eq!(clean_name("PlUgInS"), "PlUgInS-user");
    }

    #[test]
    fn test_normalize_due_date() {
        assert_eq!(
            normalize_due_date("2024-01-15").as_deref(),
            Some("2024-01-15T00:00:00Z")
        );
        assert_eq!(
            normalize_due_date("2024-01-15T10:00:00+02:00").as_deref(),
            Some("2024-01-15T08:00:00Z")
        );
        assert_eq!(normalize_due_date(""), None);
        assert_eq!(normalize_due_date("   "), None);
        assert_eq!(normalize_due_date("next tuesday"), None);
    }

    #[test]
    fn test_truncate_description_counts_chars() {
        let short = "short";
        assert_eq!(truncate_description(short), ("short".to_string(), false));

        let long = "ä".repeat(300);
        let (cut, truncated) = truncate_description(&long);
        assert!(truncated);
        assert_eq!(cut.chars().count(), MAX_DESCRIPTION_CHARS);
    }

    #[test]
    fn test_format_timestamp_localizes() {
        let created = Utc.with_ymd_and_hms(2024, 1, 10, 9, 30, 0).unwrap();
        let offset = Timezone::Fixed(FixedOffset::east_opt(3600).unwrap());
        assert_eq!(
            format_timestamp(created, offset),
            "2024-01-10 10:30:00 +01:00"
        );
    }

    #[test]
    fn test_format_timestamp_follows_daylight_saving() {
        let vienna = Timezone::Named(chrono_tz::Europe::Vienna);
        let winter = Utc.with_ymd_and_hms(2024, 1, 10, 9, 30, 0).unwrap();
        let summer = Utc.with_ymd_and_hms(2024, 7, 10, 9, 30, 0).unwrap();
        assert_eq!(format_timestamp(winter, vienna), "2024-01-10 10:30:00 +01:00");
        assert_eq!(format_timestamp(summer, vienna), "2024-07-10 11:30:00 +02:00");
    }

    #[test]
    fn test_annotations() {
        assert_eq!(
            annotate_issue_body("Broken.", "2024-01-10 10:30:00 +01:00", None),
            "> Created: 2024-01-10 10:30:00 +01:00\n\nBroken."
        );
        assert_eq!(
            annotate_issue_body("Broken.", "T", Some("Alice")),
            "> Created: T\n> Author: Alice\n\nBroken."
        );
        assert_eq!(
            annotate_comment_body("Me too.\n", "T", Some("Bob")),
            "Me too.\n\n> Author: Bob\n> Created: T"
        );
    }
}
