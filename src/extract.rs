//! Single-pass classification of a record's top-level fields.
//!
//! Values are visited as borrowed `&RawValue` slices of the input; anything
//! that ends up in [`Extracted`] is an owned copy.

use crate::config::{FieldNames, StackConfig};
use crate::event::Exception;
use crate::stack;
use serde::de::{self, Deserialize, Deserializer, MapAccess, Visitor};
use serde_json::value::RawValue;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// Fields pulled out of one record, ready for event assembly.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Extracted {
    pub message: Option<String>,
    pub fingerprint: Vec<String>,
    pub exceptions: Vec<Exception>,
    pub user_id: Option<String>,
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Object key that borrows from the input unless it contains escapes.
pub(crate) struct RecordKey<'de>(Cow<'de, str>);

impl RecordKey<'_> {
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for RecordKey<'de> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct KeyVisitor;

        impl<'de> Visitor<'de> for KeyVisitor {
            type Value = RecordKey<'de>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object key")
            }

            fn visit_borrowed_str<E: de::Error>(self, v: &'de str) -> Result<Self::Value, E> {
                Ok(RecordKey(Cow::Borrowed(v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(RecordKey(Cow::Owned(v.to_string())))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(RecordKey(Cow::Owned(v)))
            }
        }

        deserializer.deserialize_str(KeyVisitor)
    }
}

/// Translates record fields into event parts.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    fields: FieldNames,
    stack: StackConfig,
}

impl FieldExtractor {
    pub fn new(fields: FieldNames, stack: StackConfig) -> Self {
        Self { fields, stack }
    }

    /// Classify every top-level field of `data` in document order.
    ///
    /// **Returns**
    /// - `Some(Extracted)` for a well-formed JSON object.
    /// - `None` when the record is not a well-formed JSON object; the caller
    ///   drops it silently.
    ///
    /// A stack trace is captured only when the record carries at least one
    /// error field.
    pub fn extract(&self, data: &[u8]) -> Option<Extracted> {
        let mut de = serde_json::Deserializer::from_slice(data);
        let pass = (&mut de)
            .deserialize_map(FieldVisitor {
                fields: &self.fields,
            })
            .ok()?;
        de.end().ok()?;

        Some(self.finish(pass))
    }

    /// Post-pass: exception types and stack traces are assigned once the
    /// final message is known, then the explicit fingerprint override wins.
    fn finish(&self, pass: Pass) -> Extracted {
        let Pass {
            message,
            mut fingerprint,
            mut exceptions,
            user_id,
            extra,
            fingerprint_override,
        } = pass;

        if !exceptions.is_empty() {
            let stacktrace = stack::capture_trimmed(&self.stack);
            let ty = message.clone().unwrap_or_default();
            for exception in &mut exceptions {
                exception.ty = ty.clone();
                exception.stacktrace = stacktrace.clone();
            }
        }

        if let Some(explicit) = fingerprint_override.filter(|f| !f.is_empty()) {
            fingerprint = vec![explicit];
        }

        Extracted {
            message,
            fingerprint,
            exceptions,
            user_id,
            extra,
        }
    }
}

#[derive(Default)]
struct Pass {
    message: Option<String>,
    fingerprint: Vec<String>,
    exceptions: Vec<Exception>,
    user_id: Option<String>,
    extra: BTreeMap<String, serde_json::Value>,
    /// First `fingerprint` value, if it was a string.
    fingerprint_override: Option<String>,
}

struct FieldVisitor<'f> {
    fields: &'f FieldNames,
}

impl<'de, 'f> Visitor<'de> for FieldVisitor<'f> {
    type Value = Pass;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let names = self.fields;
        let mut pass = Pass::default();
        let mut fingerprint_seen = false;

        while let Some(key) = map.next_key::<RecordKey<'de>>()? {
            let key = key.as_str();
            let raw: &'de RawValue = map.next_value()?;

            if key == names.message {
                let text = value_text(raw);
                pass.fingerprint.push(text.clone());
                pass.message = Some(text);
            } else if key == names.error {
                let text = value_text(raw);
                pass.fingerprint.push(text.clone());
                pass.exceptions.push(Exception {
                    ty: String::new(),
                    value: text,
                    stacktrace: Vec::new(),
                });
            } else if key == names.level || key == names.timestamp {
                continue;
            } else if key == names.user_id {
                let text = value_text(raw);
                if pass.user_id.is_none() && !text.is_empty() {
                    pass.user_id = Some(text);
                }
                pass.extra.insert(key.to_string(), owned_value(raw)?);
            } else {
                if key == names.fingerprint && !fingerprint_seen {
                    fingerprint_seen = true;
                    pass.fingerprint_override = serde_json::from_str::<String>(raw.get()).ok();
                }
                pass.extra.insert(key.to_string(), owned_value(raw)?);
            }
        }

        Ok(pass)
    }
}

/// Decoded text of a string value; JSON text of anything else. Strings that
/// cannot be decoded (e.g. lone surrogate escapes) keep their escaped text
/// without the quotes.
fn value_text(raw: &RawValue) -> String {
    let text = raw.get();
    match serde_json::from_str::<String>(text) {
        Ok(decoded) => decoded,
        Err(_) => text
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .unwrap_or(text)
            .to_string(),
    }
}

fn owned_value<E: de::Error>(raw: &RawValue) -> Result<serde_json::Value, E> {
    serde_json::from_str(raw.get()).map_err(E::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extractor() -> FieldExtractor {
        FieldExtractor::new(FieldNames::default(), StackConfig::default())
    }

    #[test]
    fn message_then_errors_build_fingerprint_in_order() {
        let out = extractor()
            .extract(br#"{"level":"error","message":"M","error":"E1","error":"E2"}"#)
            .unwrap();
        assert_eq!(out.fingerprint, vec!["M", "E1", "E2"]);
        assert_eq!(out.message.as_deref(), Some("M"));
        assert_eq!(out.exceptions.len(), 2);
        assert_eq!(out.exceptions[0].value, "E1");
        assert_eq!(out.exceptions[1].value, "E2");
    }

    #[test]
    fn explicit_fingerprint_overrides_accumulated_one() {
        let out = extractor()
            .extract(br#"{"message":"M","error":"E1","fingerprint":"F"}"#)
            .unwrap();
        assert_eq!(out.fingerprint, vec!["F"]);
        assert_eq!(out.extra["fingerprint"], json!("F"));
    }

    #[test]
    fn empty_or_non_string_fingerprint_does_not_override() {
        let out = extractor().extract(br#"{"message":"M","fingerprint":""}"#).unwrap();
        assert_eq!(out.fingerprint, vec!["M"]);

        let out = extractor().extract(br#"{"message":"M","fingerprint":12}"#).unwrap();
        assert_eq!(out.fingerprint, vec!["M"]);
    }

    #[test]
    fn exception_type_is_final_message_even_when_error_comes_first() {
        let out = extractor()
            .extract(br#"{"error":"E1","error":"E2","message":"late message"}"#)
            .unwrap();
        assert_eq!(out.fingerprint, vec!["E1", "E2", "late message"]);
        assert!(out.exceptions.iter().all(|e| e.ty == "late message"));
    }

    #[test]
    fn record_without_error_has_no_exceptions() {
        let out = extractor().extract(br#"{"message":"just text","level":"error"}"#).unwrap();
        assert!(out.exceptions.is_empty());
        assert_eq!(out.fingerprint, vec!["just text"]);
    }

    #[test]
    fn record_without_message_fingerprints_on_errors() {
        let out = extractor().extract(br#"{"error":"disk full"}"#).unwrap();
        assert_eq!(out.message, None);
        assert_eq!(out.fingerprint, vec!["disk full"]);
        assert_eq!(out.exceptions[0].ty, "");
    }

    #[test]
    fn level_and_timestamp_are_skipped() {
        let out = extractor()
            .extract(br#"{"level":"error","timestamp":"2024-01-01T00:00:00Z","message":"m"}"#)
            .unwrap();
        assert!(out.extra.is_empty());
    }

    #[test]
    fn first_user_id_wins_and_is_kept_in_extra() {
        let out = extractor()
            .extract(br#"{"user_id":"u-1","user_id":"u-2","message":"m"}"#)
            .unwrap();
        assert_eq!(out.user_id.as_deref(), Some("u-1"));
        assert_eq!(out.extra["user_id"], json!("u-2"));

        let out = extractor().extract(br#"{"user_id":"","user_id":"u-2"}"#).unwrap();
        assert_eq!(out.user_id.as_deref(), Some("u-2"));

        let out = extractor().extract(br#"{"user_id":1234}"#).unwrap();
        assert_eq!(out.user_id.as_deref(), Some("1234"));
    }

    #[test]
    fn other_fields_land_in_extra_verbatim() {
        let out = extractor()
            .extract(br#"{"message":"m","count":3,"ok":false,"ctx":{"a":[1,"b"]},"note":null,"path":"/v1/\"q\""}"#)
            .unwrap();
        assert_eq!(out.extra["count"], json!(3));
        assert_eq!(out.extra["ok"], json!(false));
        assert_eq!(out.extra["ctx"], json!({"a": [1, "b"]}));
        assert_eq!(out.extra["note"], json!(null));
        assert_eq!(out.extra["path"], json!("/v1/\"q\""));
    }

    #[test]
    fn escaped_text_is_decoded_and_non_strings_keep_json_text() {
        let out = extractor()
            .extract(br#"{"message":"line\nbreak","error":{"code":7}}"#)
            .unwrap();
        assert_eq!(out.message.as_deref(), Some("line\nbreak"));
        assert_eq!(out.exceptions[0].value, r#"{"code":7}"#);
    }

    #[test]
    fn undecodable_strings_keep_their_escaped_text_unquoted() {
        let out = extractor()
            .extract(br#"{"message":"bad \ud800 text","error":"\udc00"}"#)
            .unwrap();
        assert_eq!(out.message.as_deref(), Some(r"bad \ud800 text"));
        assert_eq!(out.exceptions[0].value, r"\udc00");
        assert_eq!(out.fingerprint, vec![r"bad \ud800 text", r"\udc00"]);
    }

    #[test]
    fn escaped_keys_are_classified() {
        let out = extractor().extract(br#"{"mess\u0061ge":"m"}"#).unwrap();
        assert_eq!(out.message.as_deref(), Some("m"));
        assert!(out.extra.is_empty());
    }

    #[test]
    fn malformed_records_are_rejected() {
        let ex = extractor();
        assert!(ex.extract(br#"{"message":"m""#).is_none());
        assert!(ex.extract(br#"{"message":"m"} trailing"#).is_none());
        assert!(ex.extract(b"[1,2,3]").is_none());
        assert!(ex.extract(b"\xff\xfe").is_none());
        assert!(ex.extract(b"").is_none());
    }

    #[test]
    fn custom_field_names_are_honoured() {
        let fields = FieldNames {
            message: "msg".to_string(),
            error: "err".to_string(),
            ..FieldNames::default()
        };
        let out = FieldExtractor::new(fields, StackConfig::default())
            .extract(br#"{"msg":"M","err":"E","message":"other"}"#)
            .unwrap();
        assert_eq!(out.fingerprint, vec!["M", "E"]);
        assert_eq!(out.extra["message"], json!("other"));
    }

    #[test]
    fn every_exception_gets_a_stack_trace_copy() {
        let out = extractor().extract(br#"{"error":"a","error":"b"}"#).unwrap();
        assert_eq!(out.exceptions[0].stacktrace, out.exceptions[1].stacktrace);
    }
}
