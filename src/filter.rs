//! Severity gate applied before any field extraction.

use crate::extract::RecordKey;
use crate::severity::Severity;
use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::Deserializer as _;
use serde_json::value::RawValue;
use std::collections::HashSet;
use std::fmt;

/// Decides whether a raw record is worth translating, looking only at its
/// severity field.
#[derive(Debug, Clone)]
pub struct LevelFilter {
    enabled: HashSet<Severity>,
    level_field: String,
}

impl LevelFilter {
    pub fn new(enabled: impl IntoIterator<Item = Severity>, level_field: impl Into<String>) -> Self {
        Self {
            enabled: enabled.into_iter().collect(),
            level_field: level_field.into(),
        }
    }

    pub fn is_enabled(&self, severity: Severity) -> bool {
        self.enabled.contains(&severity)
    }

    /// Parse the record's severity and check it against the enabled set.
    ///
    /// **Returns**
    /// - `(None, false)` when the severity is missing, unparseable, or the
    ///   record is not a well-formed JSON object. This is not an error.
    /// - `(Some(severity), false)` when the severity is not enabled.
    /// - `(Some(severity), true)` otherwise.
    pub fn should_process(&self, data: &[u8]) -> (Option<Severity>, bool) {
        match parse_severity(data, &self.level_field) {
            Some(severity) => (Some(severity), self.is_enabled(severity)),
            None => (None, false),
        }
    }
}

fn parse_severity(data: &[u8], field: &str) -> Option<Severity> {
    let mut de = serde_json::Deserializer::from_slice(data);
    let raw = (&mut de).deserialize_map(LevelVisitor { field }).ok()?;
    de.end().ok()?;

    let text: String = serde_json::from_str(raw?.get()).ok()?;
    text.parse().ok()
}

/// Finds the first occurrence of the level key; every other value is skipped
/// without being materialized.
struct LevelVisitor<'f> {
    field: &'f str,
}

impl<'de, 'f> Visitor<'de> for LevelVisitor<'f> {
    type Value = Option<&'de RawValue>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut level = None;
        while let Some(key) = map.next_key::<RecordKey<'de>>()? {
            if level.is_none() && key.as_str() == self.field {
                level = Some(map.next_value::<&'de RawValue>()?);
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(level)
    }
}
