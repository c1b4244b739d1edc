use crate::api::error::FieldViolation;
use crate::model::FeatureRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const HIGH_RISK_THRESHOLD: f64 = 0.70;
pub const MEDIUM_RISK_THRESHOLD: f64 = 0.50;

const FLOAT_FEATURES: [&str; 2] = ["spend_90d", "avg_basket_value"];
const COUNT_FEATURES: [&str; 4] = [
    "txn_count_90d",
    "recency_days",
    "unique_products_90d",
    "country_count",
];

fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}

// i64::MAX as f64 rounds up to 2^63, so the upper bound must be strict
fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|v| v.fract() == 0.0 && *v >= i64::MIN as f64 && *v < i64::MAX as f64)
            .map(|v| v as i64)
    })
}

fn required<'a>(
    object: &'a Map<String, Value>,
    prefix: &str,
    field: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<&'a Value> {
    let value = object.get(field);
    if value.is_none() {
        violations.push(FieldViolation::new(join_path(prefix, field), "field required"));
    }
    value
}

fn non_negative_float(
    object: &Map<String, Value>,
    prefix: &str,
    field: &str,
    violations: &mut Vec<FieldViolation>,
) -> f64 {
    let Some(value) = required(object, prefix, field, violations) else {
        return 0.0;
    };

    match value.as_f64() {
        Some(v) if v >= 0.0 => v,
        Some(_) => {
            violations.push(FieldViolation::new(
                join_path(prefix, field),
                "must be greater than or equal to 0",
            ));
            0.0
        }
        None => {
            violations.push(FieldViolation::new(join_path(prefix, field), "must be a number"));
            0.0
        }
    }
}

fn non_negative_count(
    object: &Map<String, Value>,
    prefix: &str,
    field: &str,
    violations: &mut Vec<FieldViolation>,
) -> i64 {
    let Some(value) = required(object, prefix, field, violations) else {
        return 0;
    };

    match as_integer(value) {
        Some(v) if v >= 0 => v,
        Some(_) => {
            violations.push(FieldViolation::new(
                join_path(prefix, field),
                "must be greater than or equal to 0",
            ));
            0
        }
        None => {
            violations.push(FieldViolation::new(
                join_path(prefix, field),
                "must be an integer",
            ));
            0
        }
    }
}

/// The six engineered features the churn model was trained on.
///
/// Field names match the training columns exactly.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CustomerFeatures {
    pub spend_90d: f64,
    pub avg_basket_value: f64,
    pub txn_count_90d: i64,
    pub recency_days: i64,
    pub unique_products_90d: i64,
    pub country_count: i64,
}

impl CustomerFeatures {
    /// Validate an untrusted JSON object, collecting every violated field
    pub fn from_value(
        value: &Value,
        prefix: &str,
        violations: &mut Vec<FieldViolation>,
    ) -> Option<Self> {
        let Some(object) = value.as_object() else {
            violations.push(FieldViolation::new(prefix.to_string(), "must be an object"));
            return None;
        };

        let before = violations.len();
        let [spend_90d, avg_basket_value] =
            FLOAT_FEATURES.map(|field| non_negative_float(object, prefix, field, violations));
        let [txn_count_90d, recency_days, unique_products_90d, country_count] =
            COUNT_FEATURES.map(|field| non_negative_count(object, prefix, field, violations));

        if violations.len() > before {
            return None;
        }

        Some(Self {
            spend_90d,
            avg_basket_value,
            txn_count_90d,
            recency_days,
            unique_products_90d,
            country_count,
        })
    }

    pub fn to_record(&self) -> FeatureRecord {
        FeatureRecord::from([
            ("spend_90d".to_string(), self.spend_90d),
            ("avg_basket_value".to_string(), self.avg_basket_value),
            ("txn_count_90d".to_string(), self.txn_count_90d as f64),
            ("recency_days".to_string(), self.recency_days as f64),
            ("unique_products_90d".to_string(), self.unique_products_90d as f64),
            ("country_count".to_string(), self.country_count as f64),
        ])
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PredictRequest {
    pub customer_id: i64,
    pub features: CustomerFeatures,
}

impl PredictRequest {
    pub fn from_value(
        value: &Value,
        prefix: &str,
        violations: &mut Vec<FieldViolation>,
    ) -> Option<Self> {
        let Some(object) = value.as_object() else {
            let field = if prefix.is_empty() { "body" } else { prefix };
            violations.push(FieldViolation::new(field.to_string(), "must be an object"));
            return None;
        };

        let customer_id = match required(object, prefix, "customer_id", violations) {
            Some(value) => {
                let id = as_integer(value);
                if id.is_none() {
                    violations.push(FieldViolation::new(
                        join_path(prefix, "customer_id"),
                        "must be an integer",
                    ));
                }
                id
            }
            None => None,
        };

        let features = required(object, prefix, "features", violations).and_then(|value| {
            CustomerFeatures::from_value(value, &join_path(prefix, "features"), violations)
        });

        Some(Self {
            customer_id: customer_id?,
            features: features?,
        })
    }

    /// Parse and validate a single scoring body
    pub fn parse(value: &Value) -> Result<Self, Vec<FieldViolation>> {
        let mut violations = Vec::new();
        match Self::from_value(value, "", &mut violations) {
            Some(request) if violations.is_empty() => Ok(request),
            _ => Err(violations),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PredictBatchRequest {
    pub items: Vec<PredictRequest>,
}

impl PredictBatchRequest {
    /// Parse and validate a batch body; every item is checked before any is scored
    pub fn parse(value: &Value) -> Result<Self, Vec<FieldViolation>> {
        let mut violations = Vec::new();

        let Some(items) = value.get("items") else {
            return Err(vec![FieldViolation::new("items".to_string(), "field required")]);
        };

        let Some(items) = items.as_array() else {
            return Err(vec![FieldViolation::new("items".to_string(), "must be a list")]);
        };

        let parsed: Vec<Option<PredictRequest>> = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                PredictRequest::from_value(item, &format!("items[{}]", index), &mut violations)
            })
            .collect();

        if !violations.is_empty() {
            return Err(violations);
        }

        // no violations means every item parsed
        Ok(Self {
            items: parsed.into_iter().flatten().collect(),
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn from_probability(probability: f64) -> Self {
        if probability >= HIGH_RISK_THRESHOLD {
            RiskTier::High
        } else if probability >= MEDIUM_RISK_THRESHOLD {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PredictResponse {
    pub customer_id: i64,
    pub churn_probability: f64,
    pub risk_tier: RiskTier,
}

impl PredictResponse {
    pub fn new(customer_id: i64, churn_probability: f64) -> Self {
        Self {
            customer_id,
            churn_probability,
            risk_tier: RiskTier::from_probability(churn_probability),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PredictBatchResponse {
    pub results: Vec<PredictResponse>,
}
