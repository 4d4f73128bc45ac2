//! Flat event records.

use crate::value::AttrValue;

/// One flattened event: an ordered `key -> value` map.
///
/// Order is document order followed by inherited trace attributes; the schema
/// unifier uses that encounter order for columns outside the preferred prefix.
/// Records are append-only during assembly and never mutated after emission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventRecord {
    fields: Vec<(String, AttrValue)>,
}

impl EventRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing an existing value.
    pub fn insert(&mut self, key: impl Into<String>, value: AttrValue) {
        let key = key.into();
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.fields.push((key, value));
        }
    }

    /// Set `key` only if the record does not already define it. Used when
    /// merging trace attributes: event-level values win on conflict.
    pub fn insert_if_absent(&mut self, key: &str, value: AttrValue) {
        if !self.contains_key(key) {
            self.fields.push((key.to_string(), value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, AttrValue)> for EventRecord {
    fn from_iter<T: IntoIterator<Item = (String, AttrValue)>>(iter: T) -> Self {
        let mut record = Self::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_if_absent_keeps_event_value() {
        let mut record = EventRecord::new();
        record.insert("elo", AttrValue::Str("1800".into()));
        record.insert_if_absent("elo", AttrValue::Str("1500".into()));
        record.insert_if_absent("map_type", AttrValue::Str("arabia".into()));

        assert_eq!(record.get("elo"), Some(&AttrValue::Str("1800".into())));
        assert_eq!(
            record.get("map_type"),
            Some(&AttrValue::Str("arabia".into()))
        );
    }

    #[test]
    fn keys_preserve_insertion_order() {
        let mut record = EventRecord::new();
        record.insert("b", AttrValue::Int(1));
        record.insert("a", AttrValue::Int(2));
        record.insert("b", AttrValue::Int(3));

        let keys: Vec<&str> = record.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(record.get("b"), Some(&AttrValue::Int(3)));
    }
}
