use serde::{
    de::{self, Unexpected, Visitor},
    Deserialize, Deserializer, Serialize,
};
use std::{collections::BTreeMap, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultRiskResponse {
    pub default_probability: f64,
    pub prediction: u8,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentResponse {
    pub cluster: i64,
}

/// Fixed-shape body of `/recommend-products`. Every field is required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendRequest {
    pub monetary: f64,
    #[serde(deserialize_with = "integral")]
    pub frequency: i64,
    pub avg_txn_amount: f64,
    pub tenure: f64,
    pub income: f64,
    #[serde(deserialize_with = "integral")]
    pub credit_score: i64,
}

/// Accepts a JSON integer or a float with no fractional part (`5.0`).
fn integral<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    struct IntegralVisitor;

    impl<'de> Visitor<'de> for IntegralVisitor {
        type Value = i64;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("an integer")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
            i64::try_from(v).map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<i64, E> {
            // 2^63 itself is out of range, so the upper bound is exclusive.
            if v.is_finite() && v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
                Ok(v as i64)
            } else {
                Err(E::invalid_value(Unexpected::Float(v), &self))
            }
        }
    }

    deserializer.deserialize_any(IntegralVisitor)
}

impl RecommendRequest {
    /// Column order the scaler and the cluster assigner were fit with.
    pub const FEATURES: [&'static str; 6] = [
        "monetary",
        "frequency",
        "avg_txn_amount",
        "tenure",
        "income",
        "credit_score",
    ];

    /// Values in `FEATURES` order.
    pub fn values(&self) -> [f64; 6] {
        [
            self.monetary,
            self.frequency as f64,
            self.avg_txn_amount,
            self.tenure,
            self.income,
            self.credit_score as f64,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub cluster: i64,
    pub recommended_products: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub models_loaded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub path: String,
    pub format: String,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResponse {
    pub framework: String,
    pub service: String,
    pub models: BTreeMap<String, ArtifactInfo>,
    pub model_load_time_ms: f64,
    pub total_requests: u64,
    pub runtime_version: String,
    pub cpu_count: usize,
    pub memory_rss_mb: f64,
    pub cpu_percent: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_risk_level_serializes_capitalized() {
        let response = DefaultRiskResponse {
            default_probability: 0.82,
            prediction: 1,
            risk_level: RiskLevel::High,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["risk_level"], "High");
        assert_eq!(value["prediction"], 1);
    }

    #[test]
    fn test_recommend_request_requires_every_field() {
        let body = json!({
            "monetary": 1200.0,
            "frequency": 5,
            "avg_txn_amount": 240.0,
            "tenure": 3.5,
            "income": 60000.0
        });
        assert!(serde_json::from_value::<RecommendRequest>(body).is_err());
    }

    #[test]
    fn test_recommend_request_rejects_mistyped_integer() {
        let body = json!({
            "monetary": 1200.0,
            "frequency": "five",
            "avg_txn_amount": 240.0,
            "tenure": 3.5,
            "income": 60000.0,
            "credit_score": 700
        });
        assert!(serde_json::from_value::<RecommendRequest>(body).is_err());
    }

    #[test]
    fn test_recommend_request_accepts_whole_floats_for_integers() {
        let request: RecommendRequest = serde_json::from_value(json!({
            "monetary": 1200.0,
            "frequency": 5.0,
            "avg_txn_amount": 240.0,
            "tenure": 3.5,
            "income": 60000.0,
            "credit_score": 700.0
        }))
        .unwrap();
        assert_eq!(request.frequency, 5);
        assert_eq!(request.credit_score, 700);

        let negative: RecommendRequest = serde_json::from_value(json!({
            "monetary": 0.0,
            "frequency": -3.0,
            "avg_txn_amount": 0.0,
            "tenure": 0.0,
            "income": 0.0,
            "credit_score": -1
        }))
        .unwrap();
        assert_eq!(negative.frequency, -3);
    }

    #[test]
    fn test_recommend_request_rejects_fractional_and_text_integers() {
        for (frequency, credit_score) in [
            (json!(5.5), json!(700)),
            (json!(5), json!(700.25)),
            (json!("5"), json!(700)),
            (json!(5), json!(1e30)),
        ] {
            let body = json!({
                "monetary": 1200.0,
                "frequency": frequency,
                "avg_txn_amount": 240.0,
                "tenure": 3.5,
                "income": 60000.0,
                "credit_score": credit_score
            });
            assert!(serde_json::from_value::<RecommendRequest>(body).is_err());
        }
    }

    #[test]
    fn test_recommend_request_values_follow_feature_order() {
        let request: RecommendRequest = serde_json::from_value(json!({
            "credit_score": 700,
            "income": 60000.0,
            "tenure": 3.5,
            "avg_txn_amount": 240.0,
            "frequency": 5,
            "monetary": 1200.0
        }))
        .unwrap();

        assert_eq!(request.values(), [1200.0, 5.0, 240.0, 3.5, 60000.0, 700.0]);
    }
}
