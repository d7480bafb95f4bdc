//! Shared utility functions for the ADW crate.

use serde_json::Value;

/// Generate a short 8-character workflow id.
pub fn make_adw_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

/// Parse JSON from agent output, unwrapping markdown code fences if present.
///
/// Handles the common output shapes:
/// - raw JSON
/// - ```json ... ```
/// - ``` ... ```
pub fn parse_json_lenient(text: &str) -> Option<Value> {
    let stripped = text.trim();

    if let Ok(value) = serde_json::from_str(stripped) {
        return Some(value);
    }

    let fenced = stripped
        .split_once("```")
        .map(|(_, rest)| rest.trim_start_matches("json"))
        .and_then(|rest| rest.split_once("```"))
        .map(|(inner, _)| inner.trim())?;
    serde_json::from_str(fenced).ok()
}

/// Truncate a string to at most `max` characters, appending an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adw_ids_are_eight_chars_and_unique() {
        let a = make_adw_id();
        let b = make_adw_id();
        assert_eq!(a.len(), 8);
        assert_eq!(b.len(), 8);
        assert_ne!(a, b);
    }

    #[test]
    fn parse_json_lenient_accepts_raw_json() {
        let value = parse_json_lenient(r#"{"approved": true}"#).unwrap();
        assert_eq!(value["approved"], Value::Bool(true));
    }

    #[test]
    fn parse_json_lenient_unwraps_json_fence() {
        let text = "Here you go:\n```json\n[{\"suite\": \"backend\", \"passed\": true}]\n```";
        let value = parse_json_lenient(text).unwrap();
        assert!(value.is_array());
    }

    #[test]
    fn parse_json_lenient_unwraps_bare_fence() {
        let text = "```\n{\"summary\": \"ok\"}\n```";
        let value = parse_json_lenient(text).unwrap();
        assert_eq!(value["summary"], "ok");
    }

    #[test]
    fn parse_json_lenient_rejects_prose() {
        assert!(parse_json_lenient("all tests passed").is_none());
    }

    #[test]
    fn truncate_leaves_short_strings_alone() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("0123456789abc", 10), "0123456789...");
    }
}
