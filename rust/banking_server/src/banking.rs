//! Banking rules applied on top of model outputs.

use common::{DefaultRiskResponse, RiskLevel};

/// Cluster id → ordered product names. Fixed at three segments.
pub const CLUSTER_PRODUCT_MAP: [(i64, &[&str]); 3] = [
    (0, &["Basic Savings Account", "Recurring Deposit"]),
    (1, &["Credit Card", "Personal Loan"]),
    (
        2,
        &["Wealth Management", "Fixed Deposit", "Premium Credit Card"],
    ),
];

pub fn products_for(cluster: i64) -> Option<&'static [&'static str]> {
    CLUSTER_PRODUCT_MAP
        .iter()
        .find(|(id, _)| *id == cluster)
        .map(|(_, products)| *products)
}

pub fn prediction(probability: f64) -> u8 {
    u8::from(probability > 0.5)
}

pub fn risk_level(probability: f64) -> RiskLevel {
    if probability > 0.7 {
        RiskLevel::High
    } else if probability > 0.4 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

pub fn assess(probability: f64) -> DefaultRiskResponse {
    DefaultRiskResponse {
        default_probability: probability,
        prediction: prediction(probability),
        risk_level: risk_level(probability),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_boundaries() {
        assert_eq!(risk_level(0.0), RiskLevel::Low);
        assert_eq!(risk_level(0.4), RiskLevel::Low);
        assert_eq!(risk_level(0.40001), RiskLevel::Medium);
        assert_eq!(risk_level(0.7), RiskLevel::Medium);
        assert_eq!(risk_level(0.70001), RiskLevel::High);
        assert_eq!(risk_level(1.0), RiskLevel::High);
    }

    #[test]
    fn test_prediction_threshold() {
        assert_eq!(prediction(0.5), 0);
        assert_eq!(prediction(0.50001), 1);
        assert_eq!(prediction(0.12), 0);
        assert_eq!(prediction(0.99), 1);
    }

    #[test]
    fn test_rules_agree_across_probability_grid() {
        for step in 0..=1000 {
            let p = step as f64 / 1000.0;
            let response = assess(p);

            assert_eq!(response.prediction == 1, p > 0.5);
            let expected = if p > 0.7 {
                RiskLevel::High
            } else if p > 0.4 {
                RiskLevel::Medium
            } else {
                RiskLevel::Low
            };
            assert_eq!(response.risk_level, expected);
            assert_eq!(response.default_probability, p);
        }
    }

    #[test]
    fn test_product_map() {
        assert_eq!(
            products_for(0),
            Some(&["Basic Savings Account", "Recurring Deposit"][..])
        );
        assert_eq!(products_for(1), Some(&["Credit Card", "Personal Loan"][..]));
        assert_eq!(
            products_for(2),
            Some(&["Wealth Management", "Fixed Deposit", "Premium Credit Card"][..])
        );
        assert_eq!(products_for(3), None);
        assert_eq!(products_for(-1), None);
    }
}
