use crate::model::artifact::{ScoringArtifact, POSITIVE_CLASS};
use crate::model::error::ModelError;
use crate::model::manifest::FeatureManifest;
use ndarray::Array2;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Loosely-typed feature record keyed by column name
pub type FeatureRecord = HashMap<String, f64>;

/// Bridges feature records to the frozen scoring artifact.
///
/// Built once at startup and never mutated afterwards. Handlers share it behind an
/// `Arc`, no locking required.
#[derive(Debug)]
pub struct ChurnModelService {
    artifact: ScoringArtifact,
    manifest: FeatureManifest,
}

impl ChurnModelService {
    /// Load the artifact and feature manifest from disk
    ///
    /// # Arguments
    ///
    /// * `model_path` - Path to the serialized scoring artifact
    /// * `manifest_path` - Path to the JSON list of training feature names
    ///
    /// # Returns
    ///
    /// * `Result<ChurnModelService>` - Fails if either file is missing or they disagree on width
    pub fn new(model_path: &Path, manifest_path: &Path) -> Result<Self, ModelError> {
        if !model_path.exists() {
            return Err(ModelError::ModelNotFound(model_path.to_path_buf()));
        }

        if !manifest_path.exists() {
            return Err(ModelError::ManifestNotFound(manifest_path.to_path_buf()));
        }

        let artifact = ScoringArtifact::from_path(model_path)?;
        let manifest = FeatureManifest::from_path(manifest_path)?;
        let service = Self::from_parts(artifact, manifest)?;

        info!(
            "Loaded {} model with {} features from {}",
            service.artifact.model_type(),
            service.manifest.len(),
            model_path.display()
        );

        Ok(service)
    }

    pub fn from_parts(
        artifact: ScoringArtifact,
        manifest: FeatureManifest,
    ) -> Result<Self, ModelError> {
        if artifact.num_features() != manifest.len() {
            return Err(ModelError::WidthMismatch {
                expected: artifact.num_features(),
                found: manifest.len(),
            });
        }

        Ok(Self { artifact, manifest })
    }

    pub fn feature_names(&self) -> &[String] {
        self.manifest.names()
    }

    pub fn model_type(&self) -> &'static str {
        self.artifact.model_type()
    }

    /// Churn probability for a single record
    pub fn predict_proba(&self, record: &FeatureRecord) -> Result<f64, ModelError> {
        let row = self.manifest.reindex(|name| record.get(name).copied());
        let width = row.len();
        let input = Array2::from_shape_vec((1, width), row).map_err(|_| {
            ModelError::ShapeMismatch {
                expected: self.manifest.len(),
                found: width,
            }
        })?;

        let proba = self.artifact.predict_proba(&input.view())?;
        let churn = proba[[0, POSITIVE_CLASS]];
        debug!("Scored record, churn probability {:.4}", churn);

        Ok(churn)
    }

    /// Churn probabilities for many records, in input order
    pub fn predict_proba_batch(&self, records: &[FeatureRecord]) -> Result<Vec<f64>, ModelError> {
        let input = self
            .manifest
            .reindex_rows(records, |record, name| record.get(name).copied());

        let proba = self.artifact.predict_proba(&input.view())?;
        Ok(proba.column(POSITIVE_CLASS).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::path::PathBuf;

    fn models_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("models")
    }

    fn service() -> ChurnModelService {
        let dir = models_dir();
        ChurnModelService::new(
            &dir.join("churn_model.json"),
            &dir.join("feature_columns.json"),
        )
        .unwrap()
    }

    fn full_record() -> FeatureRecord {
        HashMap::from([
            ("spend_90d".to_string(), 120.5),
            ("avg_basket_value".to_string(), 30.1),
            ("txn_count_90d".to_string(), 6.0),
            ("recency_days".to_string(), 12.0),
            ("unique_products_90d".to_string(), 18.0),
            ("country_count".to_string(), 1.0),
        ])
    }

    #[test]
    fn test_predict_proba_in_unit_interval() {
        let service = service();
        assert_eq!(service.feature_names().len(), 6);

        let p = service.predict_proba(&full_record()).unwrap();
        assert!((0.0..=1.0).contains(&p));

        let idle = HashMap::from([
            ("spend_90d".to_string(), 0.0),
            ("recency_days".to_string(), 400.0),
        ]);
        let p = service.predict_proba(&idle).unwrap();
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn test_missing_feature_equals_zero() {
        let service = service();

        let mut explicit = full_record();
        explicit.insert("country_count".to_string(), 0.0);

        let mut omitted = full_record();
        omitted.remove("country_count");

        assert_eq!(
            service.predict_proba(&explicit).unwrap(),
            service.predict_proba(&omitted).unwrap()
        );
    }

    #[test]
    fn test_extra_features_ignored() {
        let service = service();

        let mut extra = full_record();
        extra.insert("loyalty_tier".to_string(), 3.0);

        assert_eq!(
            service.predict_proba(&full_record()).unwrap(),
            service.predict_proba(&extra).unwrap()
        );
    }

    #[test]
    fn test_batch_matches_single() {
        let service = service();

        let mut second = full_record();
        second.insert("recency_days".to_string(), 80.0);
        second.insert("txn_count_90d".to_string(), 1.0);
        let records = vec![full_record(), second.clone(), HashMap::new()];

        let batch = service.predict_proba_batch(&records).unwrap();
        assert_eq!(batch.len(), 3);
        for (record, p) in records.iter().zip(&batch) {
            assert_relative_eq!(service.predict_proba(record).unwrap(), *p, epsilon = 1e-12);
        }

        assert!(service.predict_proba_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_missing_files_fail_fast() {
        let dir = models_dir();

        let err = ChurnModelService::new(
            &dir.join("does_not_exist.json"),
            &dir.join("feature_columns.json"),
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::ModelNotFound(_)));

        let err = ChurnModelService::new(
            &dir.join("churn_model.json"),
            &dir.join("does_not_exist.json"),
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::ManifestNotFound(_)));
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let artifact = ScoringArtifact::from_json_str(
            r#"{"model_type": "logistic_regression", "coefficients": [1.0, 2.0]}"#,
        )
        .unwrap();
        let manifest = FeatureManifest::new(vec!["spend_90d".to_string()]).unwrap();

        let err = ChurnModelService::from_parts(artifact, manifest).unwrap_err();
        assert!(matches!(
            err,
            ModelError::WidthMismatch {
                expected: 2,
                found: 1
            }
        ));
    }
}
