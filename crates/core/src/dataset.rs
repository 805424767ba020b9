//! Report dataset model.
//!
//! A [`Dataset`] maps an identity label (usually a username) to a pair of
//! [`Measures`]. On the wire each entry is `"label": [income, expense]`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Income and expense totals for one label.
///
/// Serialized as a two-element JSON array. Any other arity fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measures(pub f64, pub f64);

impl Measures {
    pub fn new(income: f64, expense: f64) -> Self {
        Self(income, expense)
    }

    pub fn income(&self) -> f64 {
        self.0
    }

    pub fn expense(&self) -> f64 {
        self.1
    }
}

/// Labels mapped to their measures.
///
/// Backed by a `BTreeMap` so iteration is sorted by label regardless of the
/// order the caller sent. An empty dataset is valid and renders a report
/// with no series data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset(BTreeMap<String, Measures>);

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the measures for `label`.
    pub fn insert(&mut self, label: impl Into<String>, measures: Measures) -> Option<Measures> {
        self.0.insert(label.into(), measures)
    }

    pub fn get(&self, label: &str) -> Option<&Measures> {
        self.0.get(label)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Measures)> {
        self.0.iter().map(|(label, m)| (label.as_str(), m))
    }

    /// Labels in sorted order (the chart's x axis).
    pub fn labels(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    /// Income values, aligned with [`labels`](Self::labels).
    pub fn incomes(&self) -> Vec<f64> {
        self.0.values().map(Measures::income).collect()
    }

    /// Expense values, aligned with [`labels`](Self::labels).
    pub fn expenses(&self) -> Vec<f64> {
        self.0.values().map(Measures::expense).collect()
    }
}

impl<L: Into<String>> FromIterator<(L, Measures)> for Dataset {
    fn from_iter<T: IntoIterator<Item = (L, Measures)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(l, m)| (l.into(), m)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_label_to_pair() {
        let ds: Dataset = serde_json::from_str(r#"{"alice":[100,20],"bob":[50.5,70]}"#).unwrap();

        assert_eq!(ds.len(), 2);
        assert_eq!(ds.get("alice"), Some(&Measures::new(100.0, 20.0)));
        assert_eq!(ds.get("bob").map(Measures::income), Some(50.5));
    }

    #[test]
    fn empty_object_is_valid() {
        let ds: Dataset = serde_json::from_str("{}").unwrap();
        assert!(ds.is_empty());
        assert!(ds.labels().is_empty());
    }

    #[test]
    fn rejects_single_value() {
        assert!(serde_json::from_str::<Dataset>(r#"{"alice":[100]}"#).is_err());
    }

    #[test]
    fn rejects_three_values() {
        assert!(serde_json::from_str::<Dataset>(r#"{"alice":[1,2,3]}"#).is_err());
    }

    #[test]
    fn rejects_non_numeric_value() {
        assert!(serde_json::from_str::<Dataset>(r#"{"alice":["100",20]}"#).is_err());
        assert!(serde_json::from_str::<Dataset>(r#"{"alice":[null,20]}"#).is_err());
    }

    #[test]
    fn series_are_sorted_by_label() {
        let ds: Dataset = [
            ("carol", Measures::new(3.0, 30.0)),
            ("alice", Measures::new(1.0, 10.0)),
            ("bob", Measures::new(2.0, 20.0)),
        ]
        .into_iter()
        .collect();

        assert_eq!(ds.labels(), vec!["alice", "bob", "carol"]);
        assert_eq!(ds.incomes(), vec![1.0, 2.0, 3.0]);
        assert_eq!(ds.expenses(), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn serializes_measures_as_array() {
        let mut ds = Dataset::new();
        ds.insert("alice", Measures::new(100.0, 20.0));

        let json = serde_json::to_value(&ds).unwrap();
        assert_eq!(json, serde_json::json!({"alice": [100.0, 20.0]}));
    }
}
