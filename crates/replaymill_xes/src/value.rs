//! Tagged cell values.
//!
//! Column types are discovered during parsing, not declared up front, so every
//! cell carries its own type tag. `Missing` is distinct from an empty string:
//! it marks an attribute the source never supplied and becomes a null in the
//! output table.

use chrono::{DateTime, SecondsFormat, Utc};

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    Missing,
}

impl AttrValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, AttrValue::Missing)
    }

    /// Textual form for columns that degraded to strings. `None` for missing.
    pub fn render(&self) -> Option<String> {
        match self {
            AttrValue::Str(s) => Some(s.clone()),
            AttrValue::Int(i) => Some(i.to_string()),
            AttrValue::Float(f) => Some(f.to_string()),
            AttrValue::Timestamp(ts) => Some(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            AttrValue::Missing => None,
        }
    }

    /// The case-id segment used when synthesizing event ids. Missing case ids
    /// yield an empty segment so orphaned rows stay identifiable.
    pub fn as_id_segment(&self) -> String {
        self.render().unwrap_or_default()
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn render_formats_each_kind() {
        assert_eq!(AttrValue::Str("x".into()).render().as_deref(), Some("x"));
        assert_eq!(AttrValue::Int(42).render().as_deref(), Some("42"));
        assert_eq!(AttrValue::Float(1.5).render().as_deref(), Some("1.5"));
        assert_eq!(AttrValue::Missing.render(), None);

        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            AttrValue::Timestamp(ts).render().as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
    }

    #[test]
    fn missing_case_id_yields_empty_segment() {
        assert_eq!(AttrValue::Missing.as_id_segment(), "");
        assert_eq!(AttrValue::Str("M1".into()).as_id_segment(), "M1");
    }
}
