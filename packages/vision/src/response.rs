//! Extraction and normalization of model replies.
//!
//! Models are asked for bare JSON but regularly wrap it in markdown fences
//! or chatter around it. [`parse_detection`] tries the cleaned reply as a
//! whole first and then falls back to the first balanced `{...}` block
//! that parses.

use roadwatch_issue_models::{DetectedKind, DetectionResult, Severity};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};

use crate::VisionError;

/// Maximum length of the reply preview carried in
/// [`VisionError::Unparseable`].
const RESPONSE_PREVIEW_LEN: usize = 500;

/// Loosely-typed detection as the model writes it.
#[derive(Debug, Default, Deserialize)]
struct RawDetection {
    issue_type: Option<String>,
    #[serde(default, deserialize_with = "loose_number")]
    severity: Option<f64>,
    description: Option<String>,
    #[serde(default, deserialize_with = "loose_number")]
    confidence_score: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
    Other(IgnoredAny),
}

/// Accepts `7`, `"7"` and `"0.8"`; anything unreadable counts as missing.
fn loose_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(value) => Some(value),
        NumberOrText::Text(text) => text.trim().parse().ok(),
        NumberOrText::Other(_) => None,
    })
}

/// Parses a model reply into a normalized [`DetectionResult`].
///
/// # Errors
///
/// Returns [`VisionError::Unparseable`] if the reply holds no JSON object
/// with the expected shape.
pub fn parse_detection(text: &str) -> Result<DetectionResult, VisionError> {
    let cleaned = strip_code_fences(text);

    let raw = serde_json::from_str::<RawDetection>(cleaned.trim())
        .ok()
        .or_else(|| {
            log::debug!("Reply is not bare JSON, scanning for an embedded object");
            json_objects(text).find_map(|candidate| serde_json::from_str(candidate).ok())
        })
        .ok_or_else(|| VisionError::Unparseable {
            response: preview(text),
        })?;

    Ok(normalize(raw))
}

/// Applies defaults and range clamping to a raw detection.
fn normalize(raw: RawDetection) -> DetectionResult {
    let kind = match raw.issue_type.as_deref().map(str::trim) {
        None | Some("") => DetectedKind::NoIssue,
        Some(value) => value.to_ascii_lowercase().parse().unwrap_or_else(|_| {
            log::warn!("Unknown issue_type from classifier: {value:?}, treating as none");
            DetectedKind::NoIssue
        }),
    };

    if kind == DetectedKind::NoIssue {
        return DetectionResult::no_issue();
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let severity = raw
        .severity
        .filter(|s| s.is_finite())
        .map_or(Severity::MIN, |s| s.round().clamp(0.0, f64::from(u8::MAX)) as u8);

    let confidence_score = raw
        .confidence_score
        .filter(|c| c.is_finite())
        .map_or(0.0, |c| c.clamp(0.0, 1.0));

    DetectionResult {
        issue_type: kind,
        severity: Severity::clamped(severity).value(),
        description: raw
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| DetectionResult::NO_ISSUE_DESCRIPTION.to_string()),
        confidence_score,
    }
}

/// Removes markdown code fence markers (```` ```json ```` and ```` ``` ````).
fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "")
}

/// Iterates over every balanced `{...}` span in `text`, in order of their
/// opening brace.
///
/// Braces inside JSON string literals are ignored. Spans are not
/// guaranteed to be valid JSON; callers try to parse each one.
fn json_objects(text: &str) -> impl Iterator<Item = &str> {
    text.char_indices()
        .filter(|(_, c)| *c == '{')
        .filter_map(move |(start, _)| balanced_end(&text[start..]).map(|len| &text[start..start + len]))
}

/// Given text starting at `{`, returns the byte length of the balanced
/// object, or `None` if it never closes.
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}

fn preview(text: &str) -> String {
    if text.len() > RESPONSE_PREVIEW_LEN {
        let cut = (0..=RESPONSE_PREVIEW_LEN)
            .rev()
            .find(|i| text.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}...", &text[..cut])
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json() {
        let result = parse_detection(
            r#"{"issue_type":"pothole","severity":7,"description":"deep hole","confidence_score":0.85}"#,
        )
        .unwrap();
        assert_eq!(result.issue_type, DetectedKind::Pothole);
        assert_eq!(result.severity, 7);
        assert_eq!(result.description, "deep hole");
        assert!((result.confidence_score - 0.85).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_fenced_json() {
        let text = "```json\n{\"issue_type\": \"trash\", \"severity\": 4, \"description\": \"bags\", \"confidence_score\": 0.7}\n```";
        let result = parse_detection(text).unwrap();
        assert_eq!(result.issue_type, DetectedKind::Trash);
        assert_eq!(result.severity, 4);
    }

    #[test]
    fn extracts_first_object_from_chatter() {
        let text = "Sure! Here is my analysis: {\"issue_type\": \"broken_light\", \"severity\": 6, \
                    \"description\": \"pole bent {badly}\", \"confidence_score\": 0.9} \
                    and also {\"issue_type\": \"trash\"}";
        let result = parse_detection(text).unwrap();
        assert_eq!(result.issue_type, DetectedKind::BrokenLight);
        assert_eq!(result.description, "pole bent {badly}");
    }

    #[test]
    fn skips_malformed_blocks() {
        let text = "{not json} then {\"issue_type\": \"pothole\", \"severity\": 3, \"confidence_score\": 0.6}";
        let result = parse_detection(text).unwrap();
        assert_eq!(result.issue_type, DetectedKind::Pothole);
        assert_eq!(result.description, DetectionResult::NO_ISSUE_DESCRIPTION);
    }

    #[test]
    fn reads_numbers_written_as_strings() {
        let result = parse_detection(
            r#"{"issue_type":"pothole","severity":"7","description":"deep","confidence_score":" 0.8 "}"#,
        )
        .unwrap();
        assert_eq!(result.severity, 7);
        assert!((result.confidence_score - 0.8).abs() < f64::EPSILON);

        let result = parse_detection(
            r#"{"issue_type":"trash","severity":"high","confidence_score":null}"#,
        )
        .unwrap();
        assert_eq!(result.issue_type, DetectedKind::Trash);
        assert_eq!(result.severity, Severity::MIN);
        assert!(result.confidence_score.abs() < f64::EPSILON);
    }

    #[test]
    fn none_applies_defaults() {
        let result = parse_detection(r#"{"issue_type": "none"}"#).unwrap();
        assert_eq!(result, DetectionResult::no_issue());
    }

    #[test]
    fn missing_kind_is_none() {
        let result = parse_detection(r#"{"severity": 5}"#).unwrap();
        assert_eq!(result.issue_type, DetectedKind::NoIssue);
    }

    #[test]
    fn unknown_kind_is_none() {
        let result =
            parse_detection(r#"{"issue_type": "graffiti", "confidence_score": 0.99}"#).unwrap();
        assert_eq!(result.issue_type, DetectedKind::NoIssue);
    }

    #[test]
    fn clamps_out_of_range_values() {
        let result = parse_detection(
            r#"{"issue_type": "POTHOLE", "severity": 14.6, "confidence_score": 1.7}"#,
        )
        .unwrap();
        assert_eq!(result.issue_type, DetectedKind::Pothole);
        assert_eq!(result.severity, 10);
        assert!((result.confidence_score - 1.0).abs() < f64::EPSILON);

        let result =
            parse_detection(r#"{"issue_type": "trash", "severity": 0, "confidence_score": -2}"#)
                .unwrap();
        assert_eq!(result.severity, 1);
        assert!(result.confidence_score.abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_text_without_json() {
        let err = parse_detection("I could not see anything useful.").unwrap_err();
        assert!(matches!(err, VisionError::Unparseable { .. }));
    }

    #[test]
    fn rejects_unclosed_object() {
        assert!(parse_detection("{\"issue_type\": \"pothole\"").is_err());
    }

    #[test]
    fn balanced_end_ignores_braces_in_strings() {
        assert_eq!(balanced_end(r#"{"a":"}"}"#), Some(9));
        assert_eq!(balanced_end(r#"{"a":"\"}"}"#), Some(11));
        assert_eq!(balanced_end("{{}"), None);
    }
}
