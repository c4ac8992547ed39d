//! Flattened field records
//!
//! Both sides of output validation are compared as ordered `path → value` maps. Paths use
//! dotted keys with bracketed indices: `inventors[0].family_name`, `title`.

use crate::types::{fields, CanonicalEntity};
use serde_json::Value;
use std::collections::HashMap;

/// Ordered map from field path to string value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldRecord {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl FieldRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value; replacing keeps the original position
    pub fn insert(&mut self, path: impl Into<String>, value: impl Into<String>) {
        let path = path.into();
        let value = value.into();
        match self.index.get(&path) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(path.clone(), self.entries.len());
                self.entries.push((path, value));
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.index.get(path).map(|&i| self.entries[i].1.as_str())
    }

    /// Entries in document order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, v)| (p.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flatten a JSON document
    ///
    /// Objects become dotted keys, arrays become `[i]`, scalars are stringified and `null`
    /// becomes an empty value. An already-flat object maps onto itself.
    pub fn from_json(value: &Value) -> Self {
        let mut record = Self::new();
        flatten_into(&mut record, String::new(), value);
        record
    }

    /// Source record for canonical entities listed under `collection`
    pub fn from_canonical(collection: &str, entities: &[CanonicalEntity]) -> Self {
        let mut record = Self::new();
        for (i, entity) in entities.iter().enumerate() {
            let prefix = format!("{}[{}]", collection, i);
            for name in fields::NAME_FIELDS {
                if let Some(value) = entity.fields.get(name) {
                    record.insert(format!("{}.{}", prefix, name), value.as_str());
                }
            }
            for (field, value) in &entity.fields {
                if !fields::NAME_FIELDS.contains(&field.as_str()) {
                    record.insert(format!("{}.{}", prefix, field), value.as_str());
                }
            }
        }
        record
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (path, value) in iter {
            record.insert(path, value);
        }
        record
    }
}

fn flatten_into(record: &mut FieldRecord, path: String, value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                flatten_into(record, child_path, child);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                flatten_into(record, format!("{}[{}]", path, i), child);
            }
        }
        Value::Null => {
            if !path.is_empty() {
                record.insert(path, "");
            }
        }
        Value::String(s) => record.insert(path, s.as_str()),
        Value::Bool(b) => record.insert(path, b.to_string()),
        Value::Number(n) => record.insert(path, n.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_nested_document() {
        let record = FieldRecord::from_json(&json!({
            "title": "Widget",
            "inventors": [
                {"given_name": "Jane", "family_name": "Doe", "country": null},
                {"given_name": "Akira", "sequence": 2}
            ]
        }));

        let paths: Vec<&str> = record.iter().map(|(p, _)| p).collect();
        assert_eq!(
            paths,
            vec![
                "title",
                "inventors[0].given_name",
                "inventors[0].family_name",
                "inventors[0].country",
                "inventors[1].given_name",
                "inventors[1].sequence",
            ]
        );
        assert_eq!(record.get("inventors[0].country"), Some(""));
        assert_eq!(record.get("inventors[1].sequence"), Some("2"));
    }

    #[test]
    fn test_flat_object_maps_onto_itself() {
        let record = FieldRecord::from_json(&json!({"inventors[0].family_name": "Doe"}));
        assert_eq!(record.get("inventors[0].family_name"), Some("Doe"));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_from_canonical_lists_names_first() {
        let mut entity = CanonicalEntity::default();
        entity.fields.insert("city".into(), "Boston".into());
        entity.fields.insert("family_name".into(), "Smith".into());
        entity.fields.insert("given_name".into(), "John".into());

        let record = FieldRecord::from_canonical("inventors", &[entity]);
        let paths: Vec<&str> = record.iter().map(|(p, _)| p).collect();

        assert_eq!(
            paths,
            vec!["inventors[0].given_name", "inventors[0].family_name", "inventors[0].city"]
        );
    }
}
