use crate::model::error::ModelError;
use ndarray::{Array2, ArrayViewMut1};
use std::collections::HashSet;
use std::path::Path;

/// Ordered list of the columns the scoring artifact was trained on.
///
/// The artifact consumes features positionally, so every input row has to be
/// laid out in exactly this order before scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureManifest {
    names: Vec<String>,
}

impl FeatureManifest {
    pub fn new(names: Vec<String>) -> Result<Self, ModelError> {
        if names.is_empty() {
            return Err(ModelError::InvalidManifest(
                "manifest lists no features".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(ModelError::InvalidManifest(format!(
                    "duplicate feature name '{}'",
                    name
                )));
            }
        }

        Ok(Self { names })
    }

    /// Load a manifest from a JSON array of feature names
    pub fn from_path(path: &Path) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let names: Vec<String> =
            serde_json::from_str(&raw).map_err(|source| ModelError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        Self::new(names)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Write a record into `row` following manifest order.
    ///
    /// Columns absent from the record are filled with zero, keys the manifest
    /// does not know about are ignored.
    fn fill_row<F>(&self, lookup: F, mut row: ArrayViewMut1<f64>)
    where
        F: Fn(&str) -> Option<f64>,
    {
        for (slot, name) in row.iter_mut().zip(&self.names) {
            *slot = lookup(name).unwrap_or(0.0);
        }
    }

    /// Reindex a single record into a manifest-ordered vector
    pub fn reindex<F>(&self, lookup: F) -> Vec<f64>
    where
        F: Fn(&str) -> Option<f64>,
    {
        self.names
            .iter()
            .map(|name| lookup(name).unwrap_or(0.0))
            .collect()
    }

    /// Reindex many records into a `(records, features)` matrix
    pub fn reindex_rows<'a, R, F>(&self, records: &'a [R], lookup: F) -> Array2<f64>
    where
        F: Fn(&'a R, &str) -> Option<f64>,
    {
        let mut matrix = Array2::<f64>::zeros((records.len(), self.names.len()));
        for (record, row) in records.iter().zip(matrix.rows_mut()) {
            self.fill_row(|name| lookup(record, name), row);
        }
        matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn manifest() -> FeatureManifest {
        FeatureManifest::new(vec![
            "spend_90d".to_string(),
            "recency_days".to_string(),
            "country_count".to_string(),
        ])
        .unwrap()
    }

    #[test]
    fn test_reindex_follows_manifest_order() {
        let record: HashMap<&str, f64> =
            HashMap::from([("country_count", 2.0), ("spend_90d", 10.0), ("recency_days", 5.0)]);

        let row = manifest().reindex(|name| record.get(name).copied());
        assert_eq!(row, vec![10.0, 5.0, 2.0]);
    }

    #[test]
    fn test_reindex_fills_missing_and_drops_extra() {
        let record: HashMap<&str, f64> = HashMap::from([("spend_90d", 10.0), ("unknown", 99.0)]);

        let row = manifest().reindex(|name| record.get(name).copied());
        assert_eq!(row, vec![10.0, 0.0, 0.0]);
    }

    #[test]
    fn test_reindex_rows() {
        let records = vec![
            HashMap::from([("spend_90d", 1.0)]),
            HashMap::from([("recency_days", 2.0), ("country_count", 3.0)]),
        ];

        let matrix = manifest().reindex_rows(&records, |record, name| record.get(name).copied());
        assert_eq!(matrix.shape(), &[2, 3]);
        assert_eq!(matrix.row(0).to_vec(), vec![1.0, 0.0, 0.0]);
        assert_eq!(matrix.row(1).to_vec(), vec![0.0, 2.0, 3.0]);
    }

    #[test]
    fn test_manifest_rejects_duplicates_and_empty() {
        let dup = FeatureManifest::new(vec!["a".to_string(), "a".to_string()]);
        assert!(matches!(dup, Err(ModelError::InvalidManifest(_))));

        let empty = FeatureManifest::new(vec![]);
        assert!(matches!(empty, Err(ModelError::InvalidManifest(_))));
    }
}
