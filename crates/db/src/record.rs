//! Storage form of a burn plan.
//!
//! Floats are written as fixed-point decimals so the stored JSON never holds
//! binary floating-point values; reads convert them back to `f64`.

use std::str::FromStr;

use billburn_core::domain::analysis::{LineItem, SpendingAnalysis};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::repositories::RepositoryError;

/// A persisted burn plan keyed by the session id handed to the caller.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BurnPlanRecord {
    pub id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub burn_plan: SpendingAnalysis,
}

impl BurnPlanRecord {
    pub fn new(id: impl Into<String>, burn_plan: SpendingAnalysis) -> Self {
        Self { id: id.into(), timestamp: Utc::now().timestamp_millis(), burn_plan }
    }

    pub fn with_timestamp(mut self, timestamp_ms: i64) -> Self {
        self.timestamp = timestamp_ms;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredLineItem {
    pub service_name: String,
    pub instance_type: String,
    pub quantity: u32,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub start_day: i64,
    pub end_day: i64,
    pub duration_used: String,
    pub usage_pattern: String,
    pub waste_factor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roast: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredBurnPlan {
    pub total_amount: String,
    pub timeline_days: i64,
    pub efficiency_level: String,
    pub architecture_type: String,
    pub burning_style: String,
    pub services_deployed: Vec<StoredLineItem>,
    pub total_calculated_cost: Decimal,
    pub deployment_scenario: String,
    pub key_mistakes: Vec<String>,
    pub recommendations: Vec<String>,
    pub roast: String,
}

impl StoredBurnPlan {
    pub fn from_analysis(analysis: &SpendingAnalysis) -> Result<Self, RepositoryError> {
        let services_deployed = analysis
            .services_deployed
            .iter()
            .map(|item| {
                Ok(StoredLineItem {
                    service_name: item.service_name.clone(),
                    instance_type: item.instance_type.clone(),
                    quantity: item.quantity,
                    unit_cost: to_decimal("unit_cost", item.unit_cost)?,
                    total_cost: to_decimal("total_cost", item.total_cost)?,
                    start_day: item.start_day,
                    end_day: item.end_day,
                    duration_used: item.duration_used.clone(),
                    usage_pattern: item.usage_pattern.clone(),
                    waste_factor: item.waste_factor.clone(),
                    roast: item.roast.clone(),
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(Self {
            total_amount: analysis.total_amount.clone(),
            timeline_days: analysis.timeline_days,
            efficiency_level: analysis.efficiency_level.clone(),
            architecture_type: analysis.architecture_type.clone(),
            burning_style: analysis.burning_style.clone(),
            services_deployed,
            total_calculated_cost: to_decimal(
                "total_calculated_cost",
                analysis.total_calculated_cost,
            )?,
            deployment_scenario: analysis.deployment_scenario.clone(),
            key_mistakes: analysis.key_mistakes.clone(),
            recommendations: analysis.recommendations.clone(),
            roast: analysis.roast.clone(),
        })
    }

    pub fn into_analysis(self) -> Result<SpendingAnalysis, RepositoryError> {
        let services_deployed = self
            .services_deployed
            .into_iter()
            .map(|item| {
                Ok(LineItem {
                    service_name: item.service_name,
                    instance_type: item.instance_type,
                    quantity: item.quantity,
                    unit_cost: to_float("unit_cost", item.unit_cost)?,
                    total_cost: to_float("total_cost", item.total_cost)?,
                    start_day: item.start_day,
                    end_day: item.end_day,
                    duration_used: item.duration_used,
                    usage_pattern: item.usage_pattern,
                    waste_factor: item.waste_factor,
                    roast: item.roast,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(SpendingAnalysis {
            total_amount: self.total_amount,
            timeline_days: self.timeline_days,
            efficiency_level: self.efficiency_level,
            architecture_type: self.architecture_type,
            burning_style: self.burning_style,
            services_deployed,
            total_calculated_cost: to_float("total_calculated_cost", self.total_calculated_cost)?,
            deployment_scenario: self.deployment_scenario,
            key_mistakes: self.key_mistakes,
            recommendations: self.recommendations,
            roast: self.roast,
        })
    }

    pub fn encode(analysis: &SpendingAnalysis) -> Result<String, RepositoryError> {
        let stored = Self::from_analysis(analysis)?;
        serde_json::to_string(&stored).map_err(|error| RepositoryError::Decode(error.to_string()))
    }

    pub fn decode(json: &str) -> Result<SpendingAnalysis, RepositoryError> {
        serde_json::from_str::<Self>(json)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?
            .into_analysis()
    }
}

// Goes through the shortest decimal rendering so every finite f64 that fits
// in 28 significant digits survives the round trip unchanged.
fn to_decimal(field: &str, value: f64) -> Result<Decimal, RepositoryError> {
    if !value.is_finite() {
        return Err(RepositoryError::Decode(format!("{field} is not finite: {value}")));
    }
    Decimal::from_str(&value.to_string()).map_err(|error| {
        RepositoryError::Decode(format!("{field} {value} cannot be stored as a decimal: {error}"))
    })
}

fn to_float(field: &str, value: Decimal) -> Result<f64, RepositoryError> {
    value
        .to_string()
        .parse::<f64>()
        .map_err(|error| {
            RepositoryError::Decode(format!("{field} {value} is not a float: {error}"))
        })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use billburn_core::domain::analysis::{LineItem, SpendingAnalysis};

    pub fn analysis(total_amount: &str, total: f64) -> SpendingAnalysis {
        SpendingAnalysis {
            total_amount: total_amount.to_string(),
            timeline_days: 45,
            efficiency_level: "Moderately stupid".to_string(),
            architecture_type: "mixed".to_string(),
            burning_style: "vertical".to_string(),
            services_deployed: vec![
                LineItem {
                    service_name: "Amazon EC2".to_string(),
                    instance_type: "p4d.24xlarge".to_string(),
                    quantity: 3,
                    unit_cost: 32.7726,
                    total_cost: total * 0.7,
                    start_day: 4,
                    end_day: 19,
                    duration_used: "15 days".to_string(),
                    usage_pattern: "training nothing".to_string(),
                    waste_factor: "GPU idle at 2%".to_string(),
                    roast: Some("A space heater with extra steps.".to_string()),
                },
                LineItem {
                    service_name: "Amazon S3".to_string(),
                    instance_type: "Glacier Instant Retrieval".to_string(),
                    quantity: 1,
                    unit_cost: 0.1,
                    total_cost: total * 0.3,
                    start_day: 0,
                    end_day: -1,
                    duration_used: "45 days".to_string(),
                    usage_pattern: "retrieved hourly".to_string(),
                    waste_factor: "cold storage, hot access".to_string(),
                    roast: None,
                },
            ],
            total_calculated_cost: total,
            deployment_scenario: "A training cluster with no dataset.".to_string(),
            key_mistakes: vec!["a".into(), "b".into(), "c".into()],
            recommendations: vec!["d".into(), "e".into(), "f".into(), "g".into()],
            roast: "Bold.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::fixtures::analysis;
    use super::StoredBurnPlan;
    use crate::repositories::RepositoryError;

    #[test]
    fn fixed_point_round_trip_reproduces_identical_values() {
        let original = analysis("$1000000", 1_012_345.67);
        let encoded = StoredBurnPlan::encode(&original).expect("encode");
        let decoded = StoredBurnPlan::decode(&encoded).expect("decode");
        assert_eq!(decoded, original);
    }

    #[test]
    fn stored_json_holds_decimals_as_strings() {
        let encoded = StoredBurnPlan::encode(&analysis("$1000", 1000.5)).expect("encode");
        let value: Value = serde_json::from_str(&encoded).expect("json");
        assert_eq!(value["total_calculated_cost"], Value::String("1000.5".to_string()));
        assert_eq!(value["services_deployed"][0]["unit_cost"], Value::String("32.7726".into()));
    }

    #[test]
    fn non_finite_costs_cannot_be_stored() {
        let mut plan = analysis("$1000", 1000.0);
        plan.total_calculated_cost = f64::NAN;
        assert!(matches!(StoredBurnPlan::encode(&plan), Err(RepositoryError::Decode(_))));
    }
}
