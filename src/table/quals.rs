//! Key-column values pushed down from the caller
//!
//! A qual is either a single equality value or a list of candidate values
//! (an IN-style filter).

use std::collections::HashMap;

/// A pushed-down key-column value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualValue {
    Single(String),
    List(Vec<String>),
}

/// Key-column values by column name
#[derive(Debug, Clone, Default)]
pub struct Quals {
    values: HashMap<String, QualValue>,
}

impl Quals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: &str, value: QualValue) {
        self.values.insert(column.to_string(), value);
    }

    pub fn get(&self, column: &str) -> Option<&QualValue> {
        self.values.get(column)
    }

    /// The column's value if it is a single equality value
    pub fn single(&self, column: &str) -> Option<&str> {
        match self.values.get(column) {
            Some(QualValue::Single(value)) => Some(value),
            _ => None,
        }
    }

    /// Whether every named column has a single equality value
    pub fn has_all_single(&self, columns: &[&str]) -> bool {
        columns.iter().all(|c| self.single(c).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_accessor_ignores_list_values() {
        let mut quals = Quals::new();
        quals.insert("detector_id", QualValue::Single("d1".to_string()));
        quals.insert(
            "threat_intel_set_id",
            QualValue::List(vec!["t1".to_string(), "t2".to_string()]),
        );

        assert_eq!(quals.single("detector_id"), Some("d1"));
        assert_eq!(quals.single("threat_intel_set_id"), None);
        assert_eq!(quals.single("missing"), None);
    }

    #[test]
    fn has_all_single_requires_every_key() {
        let mut quals = Quals::new();
        quals.insert("detector_id", QualValue::Single("d1".to_string()));
        assert!(!quals.has_all_single(&["detector_id", "threat_intel_set_id"]));

        quals.insert("threat_intel_set_id", QualValue::Single("t1".to_string()));
        assert!(quals.has_all_single(&["detector_id", "threat_intel_set_id"]));
    }
}
