//! Instruction pair sent with every extraction request.
//!
//! Both messages live here so the wording can change without touching the
//! extractor. Bump [`PROMPT_VERSION`] whenever the text changes; it is logged
//! with every model call so answers can be traced back to the prompt that
//! produced them.
//!
//! Callers can override the system prompt via
//! [`crate::config::AnalyzerConfig::system_prompt`].

/// Version tag of the built-in prompts.
pub const PROMPT_VERSION: &str = "2";

/// Default system prompt describing the task and the required output shape.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a document analysis expert. Your task is to find the barcode number and the reference number printed in a document.

The document is provided as one image per page, in page order. Read all pages together as a single document.

Return ONLY a JSON object with exactly these two fields:
- "barcode": the barcode number as a string, or null if there is none
- "referenceNumber": the reference number as a string, or null if there is none

Rules:
- Copy values exactly as printed, without spaces added or removed
- If a value cannot be found, set the field to null
- Do NOT add commentary, explanations, or any text outside the JSON object"#;

/// User instruction accompanying the page images.
pub const USER_PROMPT: &str =
    "Find the barcode and the reference number in this PDF and return them as JSON.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_names_both_fields() {
        assert!(DEFAULT_SYSTEM_PROMPT.contains("\"barcode\""));
        assert!(DEFAULT_SYSTEM_PROMPT.contains("\"referenceNumber\""));
        assert!(DEFAULT_SYSTEM_PROMPT.contains("null"));
    }

    #[test]
    fn user_prompt_asks_for_json() {
        assert!(USER_PROMPT.contains("JSON"));
    }
}
