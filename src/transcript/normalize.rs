use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExportError;
use crate::providers::RawSegment;

/// One timestamped caption unit, the only segment shape used past the
/// provider boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Offset from the start of the video, in seconds
    pub start_seconds: f64,
    /// Caption text with newlines collapsed
    pub text: String,
}

/// Field names tried in priority order for the start offset. `tStartMs`
/// carries milliseconds and is converted.
const START_FIELDS: [&str; 5] = ["start", "start_seconds", "offset", "tStartMs", "t"];

/// Field names tried in priority order for the caption text. `segs` is the
/// json3 run list and is concatenated.
const TEXT_FIELDS: [&str; 2] = ["text", "content"];

/// Convert provider-native segment records into an ordered
/// [`TranscriptSegment`] sequence.
///
/// Records may be flat objects (`{start, text}`, `{offset, content}`) or
/// json3 events (`{tStartMs, segs: [{utf8}]}`); both are accepted. Records
/// whose start offset appears under no known field name fail the whole batch
/// item with [`ExportError::MalformedSegment`]. Records with a valid offset
/// but empty text (interleaved newline events) are dropped. Output is sorted
/// ascending by start time and consecutive duplicate lines are removed;
/// adjacent segments are never merged.
pub fn normalize(raw: &[RawSegment]) -> Result<Vec<TranscriptSegment>, ExportError> {
    let mut segments = Vec::with_capacity(raw.len());

    for (index, record) in raw.iter().enumerate() {
        let obj = record.as_object().ok_or_else(|| {
            ExportError::MalformedSegment(format!("record {} is not an object", index))
        })?;

        let start_seconds = extract_start(obj).ok_or_else(|| {
            ExportError::MalformedSegment(format!(
                "record {} has no start offset under any known field name",
                index
            ))
        })?;

        let text = extract_text(obj);
        let text = clean_text(&text);
        if text.is_empty() {
            continue;
        }

        segments.push(TranscriptSegment {
            start_seconds: start_seconds.max(0.0),
            text,
        });
    }

    segments.sort_by(|a, b| a.start_seconds.total_cmp(&b.start_seconds));

    // ASR tracks repeat the same line across adjacent cues
    segments.dedup_by(|a, b| a.text == b.text);

    Ok(segments)
}

fn extract_start(obj: &serde_json::Map<String, Value>) -> Option<f64> {
    for field in START_FIELDS {
        if let Some(value) = obj.get(field) {
            if let Some(seconds) = numeric(value) {
                return Some(if field == "tStartMs" {
                    seconds / 1000.0
                } else {
                    seconds
                });
            }
        }
    }
    None
}

fn extract_text(obj: &serde_json::Map<String, Value>) -> String {
    for field in TEXT_FIELDS {
        if let Some(Value::String(s)) = obj.get(field) {
            return s.clone();
        }
    }

    // json3 shape: a list of runs, each with a utf8 payload
    if let Some(Value::Array(segs)) = obj.get("segs") {
        return segs
            .iter()
            .filter_map(|seg| seg.get("utf8").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .concat();
    }

    String::new()
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn clean_text(text: &str) -> String {
    text.replace(['\n', '\r'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_record_shape() {
        let raw = vec![
            json!({"start": 0.0, "text": "hi"}),
            json!({"start": 5.0, "text": "there"}),
        ];
        let segments = normalize(&raw).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "hi");
        assert_eq!(segments[1].start_seconds, 5.0);
    }

    #[test]
    fn test_alternate_field_names() {
        let raw = vec![
            json!({"offset": 1.5, "content": "first"}),
            json!({"start_seconds": 3.0, "text": "second"}),
            json!({"t": "4.5", "text": "third"}),
        ];
        let segments = normalize(&raw).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].start_seconds, 1.5);
        assert_eq!(segments[2].start_seconds, 4.5);
    }

    #[test]
    fn test_json3_event_shape() {
        let raw = vec![
            json!({"tStartMs": 1200, "dDurationMs": 2000, "segs": [{"utf8": "split "}, {"utf8": "across runs"}]}),
            json!({"tStartMs": 4000, "segs": [{"utf8": "\n"}]}),
        ];
        let segments = normalize(&raw).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_seconds, 1.2);
        assert_eq!(segments[0].text, "split across runs");
    }

    #[test]
    fn test_out_of_order_input_is_sorted() {
        let raw = vec![
            json!({"start": 10.0, "text": "later"}),
            json!({"start": 2.0, "text": "earlier"}),
            json!({"start": 6.0, "text": "middle"}),
        ];
        let segments = normalize(&raw).unwrap();
        let starts: Vec<f64> = segments.iter().map(|s| s.start_seconds).collect();
        assert_eq!(starts, vec![2.0, 6.0, 10.0]);
    }

    #[test]
    fn test_empty_text_dropped_and_newlines_collapsed() {
        let raw = vec![
            json!({"start": 0.0, "text": "line\none"}),
            json!({"start": 1.0, "text": "   "}),
            json!({"start": 2.0, "text": ""}),
        ];
        let segments = normalize(&raw).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "line one");
    }

    #[test]
    fn test_consecutive_duplicates_removed() {
        let raw = vec![
            json!({"start": 0.0, "text": "same line"}),
            json!({"start": 2.0, "text": "same line"}),
            json!({"start": 4.0, "text": "new line"}),
            json!({"start": 6.0, "text": "same line"}),
        ];
        let segments = normalize(&raw).unwrap();
        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["same line", "new line", "same line"]);
    }

    #[test]
    fn test_unknown_start_field_is_malformed() {
        let raw = vec![json!({"begin": 0.0, "text": "hi"})];
        let err = normalize(&raw).unwrap_err();
        assert!(matches!(err, ExportError::MalformedSegment(_)));
    }

    #[test]
    fn test_non_object_record_is_malformed() {
        let raw = vec![json!([1, 2, 3])];
        assert!(normalize(&raw).is_err());
    }

    #[test]
    fn test_negative_start_clamped() {
        let raw = vec![json!({"start": -0.5, "text": "pre-roll"})];
        let segments = normalize(&raw).unwrap();
        assert_eq!(segments[0].start_seconds, 0.0);
    }
}
