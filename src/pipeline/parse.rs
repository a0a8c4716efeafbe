//! Recover the barcode and reference number from the model's answer.
//!
//! The prompt asks for bare JSON, but models regularly wrap it in a
//! ```` ```json ```` fence, prepend a sentence, or answer in prose. Three
//! tiers are tried in order and the first that yields a JSON object wins:
//!
//! 1. the first fenced block, with or without a language tag;
//! 2. the whole trimmed answer;
//! 3. a case-insensitive scan for `barcode` / `referenceNumber` / `referans`
//!    followed by a value token.
//!
//! Tier 3 cannot fail: fields it does not find are `None`. The only error is
//! an empty answer, which means the extractor broke its contract.
//!
//! ## Value coercion
//!
//! Strings are trimmed. Numbers keep their JSON text (`8690000000017`).
//! Empty strings and the placeholders `null`, `none`, `n/a` become `None`, as
//! do booleans, arrays and objects. Unknown keys are ignored.

use crate::error::AnalyzeError;
use crate::output::ExtractedFields;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

const BARCODE_KEYS: &[&str] = &["barcode"];
const REFERENCE_KEYS: &[&str] = &["referenceNumber", "reference_number", "referans"];

/// Parse a raw model answer into [`ExtractedFields`].
pub fn parse_answer(raw: &str) -> Result<ExtractedFields, AnalyzeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AnalyzeError::EmptyModelAnswer);
    }

    if let Some(fields) = fenced_block(trimmed).and_then(parse_object) {
        debug!("Answer parsed from fenced block");
        return Ok(fields);
    }

    if let Some(fields) = parse_object(trimmed) {
        debug!("Answer parsed as bare JSON");
        return Ok(fields);
    }

    debug!("Answer is not JSON; scanning text");
    Ok(scan_text(trimmed))
}

// ── Tier 1: fenced block ─────────────────────────────────────────────────────

static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").unwrap());

fn fenced_block(text: &str) -> Option<&str> {
    RE_FENCE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

// ── Tier 2: JSON object ──────────────────────────────────────────────────────

fn parse_object(text: &str) -> Option<ExtractedFields> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Object(map) => Some(ExtractedFields {
            barcode: lookup(&map, BARCODE_KEYS),
            reference_number: lookup(&map, REFERENCE_KEYS),
        }),
        _ => None,
    }
}

fn lookup(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| map.get(*k))
        .and_then(coerce_value)
}

fn coerce_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => normalise(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn normalise(s: &str) -> Option<String> {
    let s = s.trim();
    let placeholder = ["null", "none", "n/a"]
        .iter()
        .any(|p| s.eq_ignore_ascii_case(p));
    if s.is_empty() || placeholder {
        None
    } else {
        Some(s.to_string())
    }
}

// ── Tier 3: text scan ────────────────────────────────────────────────────────

static RE_BARCODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)barcode["\s:]+([^",}\s]+)"#).unwrap());

static RE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:reference_?number|referans)["\s:]+([^",}\s]+)"#).unwrap()
});

fn scan_text(text: &str) -> ExtractedFields {
    ExtractedFields {
        barcode: scan(&RE_BARCODE, text),
        reference_number: scan(&RE_REFERENCE, text),
    }
}

fn scan(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| normalise(m.as_str().trim_end_matches(['.', ';'])))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(barcode: Option<&str>, reference: Option<&str>) -> ExtractedFields {
        ExtractedFields {
            barcode: barcode.map(str::to_string),
            reference_number: reference.map(str::to_string),
        }
    }

    #[test]
    fn fenced_json_block() {
        let raw = "```json\n{\"barcode\":\"ABC123\",\"referenceNumber\":\"REF-9\"}\n```";
        assert_eq!(parse_answer(raw).unwrap(), fields(Some("ABC123"), Some("REF-9")));
    }

    #[test]
    fn untagged_fence_with_surrounding_prose() {
        let raw = "Here you go:\n```\n{\"barcode\": \"111\", \"referenceNumber\": null}\n```\nThanks";
        assert_eq!(parse_answer(raw).unwrap(), fields(Some("111"), None));
    }

    #[test]
    fn bare_json() {
        let raw = "  {\"barcode\": null, \"referenceNumber\": \"R-1\"}  ";
        assert_eq!(parse_answer(raw).unwrap(), fields(None, Some("R-1")));
    }

    #[test]
    fn prose_fallback() {
        let raw = "The barcode: XZ901 and referans: 44Q were found.";
        assert_eq!(parse_answer(raw).unwrap(), fields(Some("XZ901"), Some("44Q")));
    }

    #[test]
    fn nothing_found() {
        assert_eq!(parse_answer("No identifiers found.").unwrap(), fields(None, None));
    }

    #[test]
    fn empty_answer_is_error() {
        assert!(matches!(parse_answer(""), Err(AnalyzeError::EmptyModelAnswer)));
        assert!(matches!(parse_answer(" \n\t"), Err(AnalyzeError::EmptyModelAnswer)));
    }

    #[test]
    fn empty_object() {
        assert_eq!(parse_answer("{}").unwrap(), fields(None, None));
    }

    #[test]
    fn malformed_json_falls_back_to_scan() {
        let raw = r#"{"barcode": "8690000000017", "referenceNumber": "REF-42""#;
        assert_eq!(
            parse_answer(raw).unwrap(),
            fields(Some("8690000000017"), Some("REF-42"))
        );
    }

    #[test]
    fn malformed_json_null_literal_is_none() {
        let raw = r#"{"barcode": null, "referenceNumber": "REF-42""#;
        assert_eq!(parse_answer(raw).unwrap(), fields(None, Some("REF-42")));
    }

    #[test]
    fn numbers_are_coerced_to_strings() {
        let raw = r#"{"barcode": 8690000000017, "referenceNumber": 42}"#;
        assert_eq!(
            parse_answer(raw).unwrap(),
            fields(Some("8690000000017"), Some("42"))
        );
    }

    #[test]
    fn placeholders_and_odd_types_become_none() {
        let raw = r#"{"barcode": "N/A", "referenceNumber": ["a"], "extra": 1}"#;
        assert_eq!(parse_answer(raw).unwrap(), fields(None, None));
        let raw = r#"{"barcode": "  ", "referenceNumber": true}"#;
        assert_eq!(parse_answer(raw).unwrap(), fields(None, None));
    }

    #[test]
    fn alternative_reference_keys() {
        let raw = r#"{"barcode": "B", "reference_number": "R"}"#;
        assert_eq!(parse_answer(raw).unwrap(), fields(Some("B"), Some("R")));
        let raw = r#"{"referans": "TR-7"}"#;
        assert_eq!(parse_answer(raw).unwrap(), fields(None, Some("TR-7")));
    }

    #[test]
    fn non_object_json_falls_back() {
        assert_eq!(parse_answer("[1, 2]").unwrap(), fields(None, None));
        assert_eq!(parse_answer("\"barcode: Q1\"").unwrap(), fields(Some("Q1"), None));
    }

    #[test]
    fn fence_with_invalid_json_uses_scan() {
        let raw = "```json\n{barcode: XY-1, referenceNumber: RN-2}\n```";
        assert_eq!(parse_answer(raw).unwrap(), fields(Some("XY-1"), Some("RN-2")));
    }

    #[test]
    fn case_insensitive_scan() {
        let raw = "BARCODE: none; ReferenceNumber: 77.";
        assert_eq!(parse_answer(raw).unwrap(), fields(None, Some("77")));
    }

    #[test]
    fn idempotent() {
        let inputs = [
            "```json\n{\"barcode\":\"A\"}\n```",
            "garbage { not json",
            "No identifiers found.",
            "{}",
        ];
        for raw in inputs {
            assert_eq!(parse_answer(raw).unwrap(), parse_answer(raw).unwrap());
        }
    }
}
