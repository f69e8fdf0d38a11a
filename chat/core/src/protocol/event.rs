//! Event parsing
//!
//! Each frame is one JSON object `{ "type": ..., "data": ... }`. Three types
//! carry meaning for the client:
//!
//! | type      | data                                   | event                    |
//! |-----------|----------------------------------------|--------------------------|
//! | `sources` | `{ "items": [{ url\|link, score }] }`  | [`StreamEvent::Sources`] |
//! | `token`   | string, or `{ "text": string }`        | [`StreamEvent::Token`]   |
//! | `error`   | string, or `{ "message": string }`     | [`StreamEvent::Error`]   |
//!
//! Any other `type` parses to [`StreamEvent::Unknown`] so newer backends can
//! add event kinds without breaking older clients.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EventParseError;

/// Link used when a source item carries neither `url` nor `link`
pub const MISSING_SOURCE_URL: &str = "#";

/// A retrieved document backing the answer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceDoc {
    /// Where the document lives
    pub url: String,
    /// Retrieval relevance, if the backend reported one
    #[serde(default)]
    pub score: Option<f64>,
}

impl SourceDoc {
    /// Create a source entry
    pub fn new(url: impl Into<String>, score: Option<f64>) -> Self {
        Self {
            url: url.into(),
            score,
        }
    }

    /// Score rounded to two decimals, or `--` when unknown
    #[must_use]
    pub fn score_label(&self) -> String {
        match self.score {
            Some(score) if score.is_finite() => format!("{score:.2}"),
            _ => "--".to_string(),
        }
    }

    /// Badge text shown next to the link, e.g. `score: 0.87`
    #[must_use]
    pub fn badge(&self) -> String {
        format!("score: {}", self.score_label())
    }
}

/// One application-level event decoded from a frame
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// A batch of sources replacing the displayed set
    Sources(Vec<SourceDoc>),
    /// An answer fragment, possibly empty
    Token(String),
    /// A backend-reported error to show inline
    Error(String),
    /// A well-formed frame of a type this client does not know
    Unknown(String),
}

impl StreamEvent {
    /// Wire name of the event type
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Sources(_) => "sources",
            Self::Token(_) => "token",
            Self::Error(_) => "error",
            Self::Unknown(kind) => kind,
        }
    }
}

impl FromStr for StreamEvent {
    type Err = EventParseError;

    fn from_str(frame: &str) -> Result<Self, Self::Err> {
        parse(frame)
    }
}

/// Parse one frame.
///
/// # Errors
///
/// Returns [`EventParseError`] when the frame is not a JSON object with a
/// string `type`, or when a known type carries a malformed payload. Callers
/// drop such frames and keep reading.
pub fn parse(frame: &str) -> Result<StreamEvent, EventParseError> {
    let Value::Object(mut fields) = serde_json::from_str::<Value>(frame)? else {
        return Err(EventParseError::MissingType);
    };
    let Some(Value::String(kind)) = fields.remove("type") else {
        return Err(EventParseError::MissingType);
    };
    let data = fields.remove("data").unwrap_or(Value::Null);

    match kind.as_str() {
        "sources" => parse_sources(&data).map(StreamEvent::Sources),
        "token" => parse_text(&data, "token", "text").map(StreamEvent::Token),
        "error" => Ok(StreamEvent::Error(error_message(data))),
        _ => Ok(StreamEvent::Unknown(kind)),
    }
}

fn parse_sources(data: &Value) -> Result<Vec<SourceDoc>, EventParseError> {
    let items = match data.get("items") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(EventParseError::InvalidPayload {
                kind: "sources",
                reason: format!("`items` must be an array, got {}", json_type(other)),
            })
        }
    };

    Ok(items.iter().map(source_doc).collect())
}

/// A non-object entry keeps its slot as a placeholder link
fn source_doc(item: &Value) -> SourceDoc {
    let Value::Object(fields) = item else {
        return SourceDoc::new(MISSING_SOURCE_URL, None);
    };

    let url = ["url", "link"]
        .iter()
        .filter_map(|key| fields.get(*key).and_then(Value::as_str))
        .find(|value| !value.is_empty())
        .unwrap_or(MISSING_SOURCE_URL);
    let score = fields.get("score").and_then(Value::as_f64);

    SourceDoc::new(url, score)
}

fn parse_text(
    data: &Value,
    kind: &'static str,
    field: &str,
) -> Result<String, EventParseError> {
    match data {
        Value::Null => Ok(String::new()),
        Value::String(text) => Ok(text.clone()),
        Value::Object(fields) => match fields.get(field) {
            Some(Value::String(text)) => Ok(text.clone()),
            None | Some(Value::Null) => Ok(String::new()),
            Some(other) => Err(EventParseError::InvalidPayload {
                kind,
                reason: format!("`{field}` must be a string, got {}", json_type(other)),
            }),
        },
        other => Err(EventParseError::InvalidPayload {
            kind,
            reason: format!("expected a string, got {}", json_type(other)),
        }),
    }
}

fn error_message(data: Value) -> String {
    match data {
        Value::String(message) => message,
        Value::Object(mut fields) => match fields.remove("message") {
            Some(Value::String(message)) => message,
            Some(other) => other.to_string(),
            None => Value::Object(fields).to_string(),
        },
        other => other.to_string(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_token_string() {
        let event = parse(r#"{"type":"token","data":"Hel"}"#).unwrap();
        assert_eq!(event, StreamEvent::Token("Hel".to_string()));
    }

    #[test]
    fn test_token_object_and_empty() {
        assert_eq!(
            parse(r#"{"type":"token","data":{"text":"lo"}}"#).unwrap(),
            StreamEvent::Token("lo".to_string())
        );
        assert_eq!(
            parse(r#"{"type":"token","data":""}"#).unwrap(),
            StreamEvent::Token(String::new())
        );
        assert_eq!(
            parse(r#"{"type":"token"}"#).unwrap(),
            StreamEvent::Token(String::new())
        );
    }

    #[test]
    fn test_token_with_number_payload_is_rejected() {
        let err = parse(r#"{"type":"token","data":42}"#).unwrap_err();
        assert!(matches!(
            err,
            EventParseError::InvalidPayload { kind: "token", .. }
        ));
    }

    #[test]
    fn test_sources_with_url_and_link() {
        let event = parse(
            r#"{"type":"sources","data":{"items":[
                {"url":"http://x","score":0.873},
                {"link":"http://y","score":null},
                {"doc_id":"7"}
            ]}}"#,
        )
        .unwrap();

        assert_eq!(
            event,
            StreamEvent::Sources(vec![
                SourceDoc::new("http://x", Some(0.873)),
                SourceDoc::new("http://y", None),
                SourceDoc::new(MISSING_SOURCE_URL, None),
            ])
        );
    }

    #[test]
    fn test_sources_non_object_item_keeps_batch() {
        let event = parse(
            r#"{"type":"sources","data":{"items":[{"url":"http://x","score":0.5},"stray",null]}}"#,
        )
        .unwrap();

        assert_eq!(
            event,
            StreamEvent::Sources(vec![
                SourceDoc::new("http://x", Some(0.5)),
                SourceDoc::new(MISSING_SOURCE_URL, None),
                SourceDoc::new(MISSING_SOURCE_URL, None),
            ])
        );
    }

    #[test]
    fn test_sources_missing_items_is_empty_batch() {
        assert_eq!(
            parse(r#"{"type":"sources","data":{}}"#).unwrap(),
            StreamEvent::Sources(Vec::new())
        );
    }

    #[test]
    fn test_sources_non_array_items_is_rejected() {
        let err = parse(r#"{"type":"sources","data":{"items":"nope"}}"#).unwrap_err();
        assert!(err.to_string().contains("`items` must be an array"));
    }

    #[test]
    fn test_error_payload_shapes() {
        assert_eq!(
            parse(r#"{"type":"error","data":"LLM unavailable"}"#).unwrap(),
            StreamEvent::Error("LLM unavailable".to_string())
        );
        assert_eq!(
            parse(r#"{"type":"error","data":{"message":"timeout"}}"#).unwrap(),
            StreamEvent::Error("timeout".to_string())
        );
        assert_eq!(
            parse(r#"{"type":"error","data":503}"#).unwrap(),
            StreamEvent::Error("503".to_string())
        );
    }

    #[test]
    fn test_unknown_type_is_not_an_error() {
        let event: StreamEvent = r#"{"type":"usage","data":{"tokens":12}}"#.parse().unwrap();
        assert_eq!(event, StreamEvent::Unknown("usage".to_string()));
        assert_eq!(event.kind(), "usage");
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(parse("not json"), Err(EventParseError::Json(_))));
        assert!(matches!(
            parse(r#"{"data":"x"}"#),
            Err(EventParseError::MissingType)
        ));
        assert!(matches!(
            parse(r#"["token","x"]"#),
            Err(EventParseError::MissingType)
        ));
    }

    #[test]
    fn test_score_badge() {
        assert_eq!(SourceDoc::new("http://x", Some(0.873)).badge(), "score: 0.87");
        assert_eq!(SourceDoc::new("http://x", Some(1.0)).badge(), "score: 1.00");
        assert_eq!(SourceDoc::new("http://x", None).badge(), "score: --");
    }
}
