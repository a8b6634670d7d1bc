use serde::{Deserialize, Serialize};

/// Sentinel `end_day` meaning "runs until the end of the timeline".
pub const END_OF_TIMELINE: i64 = -1;

pub const MIN_FINDINGS: usize = 3;
pub const MAX_FINDINGS: usize = 5;

fn default_quantity() -> u32 {
    1
}

/// One simulated billed resource.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub service_name: String,
    pub instance_type: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub unit_cost: f64,
    pub total_cost: f64,
    pub start_day: i64,
    pub end_day: i64,
    pub duration_used: String,
    pub usage_pattern: String,
    pub waste_factor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roast: Option<String>,
}

impl LineItem {
    pub fn effective_end_day(&self, timeline_days: i64) -> i64 {
        if self.end_day == END_OF_TIMELINE {
            timeline_days
        } else {
            self.end_day
        }
    }

    pub fn runs_to_end(&self) -> bool {
        self.end_day == END_OF_TIMELINE
    }

    /// Lists every invariant this item breaks for the given timeline.
    pub fn validate(&self, timeline_days: i64) -> Vec<String> {
        let mut violations = Vec::new();
        let name = if self.service_name.trim().is_empty() {
            violations.push("service_name must not be empty".to_string());
            "<unnamed>"
        } else {
            self.service_name.as_str()
        };

        if self.quantity == 0 {
            violations.push(format!("{name}: quantity must be at least 1"));
        }
        if !self.unit_cost.is_finite() || self.unit_cost < 0.0 {
            violations.push(format!("{name}: unit_cost must be non-negative"));
        }
        if !self.total_cost.is_finite() || self.total_cost < 0.0 {
            violations.push(format!("{name}: total_cost must be non-negative"));
        }
        if !(0..=timeline_days).contains(&self.start_day) {
            violations.push(format!(
                "{name}: start_day {} is outside 0..={timeline_days}",
                self.start_day
            ));
        }
        if self.end_day != END_OF_TIMELINE && !(0..=timeline_days).contains(&self.end_day) {
            violations.push(format!(
                "{name}: end_day {} is outside 0..={timeline_days} and is not -1",
                self.end_day
            ));
        }
        if self.start_day > self.effective_end_day(timeline_days) {
            violations.push(format!(
                "{name}: start_day {} is after end_day {}",
                self.start_day,
                self.effective_end_day(timeline_days)
            ));
        }

        violations
    }
}

/// The structured reply of a burn-plan request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpendingAnalysis {
    pub total_amount: String,
    pub timeline_days: i64,
    pub efficiency_level: String,
    pub architecture_type: String,
    pub burning_style: String,
    pub services_deployed: Vec<LineItem>,
    pub total_calculated_cost: f64,
    pub deployment_scenario: String,
    pub key_mistakes: Vec<String>,
    pub recommendations: Vec<String>,
    pub roast: String,
}

impl SpendingAnalysis {
    pub fn line_item_total(&self) -> f64 {
        self.services_deployed.iter().map(|item| item.total_cost).sum()
    }

    pub fn validate(&self) -> Vec<String> {
        let mut violations = Vec::new();
        if self.timeline_days <= 0 {
            violations.push(format!("timeline_days must be positive, got {}", self.timeline_days));
        }
        if !self.total_calculated_cost.is_finite() || self.total_calculated_cost < 0.0 {
            violations.push("total_calculated_cost must be non-negative".to_string());
        }
        for item in &self.services_deployed {
            violations.extend(item.validate(self.timeline_days));
        }
        violations
    }

    /// Soft expectations the runtime does not guarantee.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let findings = [
            ("key_mistakes", self.key_mistakes.len()),
            ("recommendations", self.recommendations.len()),
        ];
        for (field, count) in findings {
            if !(MIN_FINDINGS..=MAX_FINDINGS).contains(&count) {
                warnings.push(format!(
                    "{field} has {count} entries, expected {MIN_FINDINGS}-{MAX_FINDINGS}"
                ));
            }
        }
        if self.services_deployed.is_empty() {
            warnings.push("services_deployed is empty".to_string());
        }
        warnings
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{analysis, line_item};
    use super::{LineItem, SpendingAnalysis};

    #[test]
    fn end_of_timeline_sentinel_maps_to_timeline_days() {
        let item = line_item("Amazon EC2", 10.0, 0, -1);
        assert_eq!(item.effective_end_day(45), 45);
        assert!(item.runs_to_end());

        let item = line_item("Amazon EC2", 10.0, 0, 12);
        assert_eq!(item.effective_end_day(45), 12);
    }

    #[test]
    fn line_item_reports_day_bound_violations() {
        let item = line_item("Amazon S3", 10.0, 5, 40);
        let violations = item.validate(30);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("end_day 40"));

        let item = line_item("Amazon S3", 10.0, 20, 10);
        assert!(item.validate(30).iter().any(|v| v.contains("after end_day")));
    }

    #[test]
    fn line_item_reports_empty_name_and_negative_costs() {
        let mut item = line_item("  ", -1.0, 0, -1);
        item.quantity = 0;
        let violations = item.validate(10);
        assert!(violations.iter().any(|v| v.contains("service_name")));
        assert!(violations.iter().any(|v| v.contains("quantity")));
        assert!(violations.iter().any(|v| v.contains("total_cost")));
    }

    #[test]
    fn quantity_defaults_to_one_and_roast_is_optional() {
        let item: LineItem = serde_json::from_str(
            r#"{"service_name":"AWS Lambda","instance_type":"10GB","unit_cost":1.5,
                "total_cost":1.5,"start_day":0,"end_day":-1,"duration_used":"entire",
                "usage_pattern":"recursive","waste_factor":"infinite loop"}"#,
        )
        .expect("deserialize");
        assert_eq!(item.quantity, 1);
        assert_eq!(item.roast, None);
    }

    #[test]
    fn analysis_sums_line_items_and_validates_clean() {
        let analysis = analysis();
        assert!((analysis.line_item_total() - 1000.5).abs() < f64::EPSILON);
        assert!(analysis.validate().is_empty());
        assert!(analysis.warnings().is_empty());
    }

    #[test]
    fn finding_counts_outside_range_are_warnings_only() {
        let mut analysis = analysis();
        analysis.key_mistakes.truncate(1);
        assert!(analysis.validate().is_empty());
        assert_eq!(analysis.warnings().len(), 1);
    }

    #[test]
    fn analysis_json_round_trip_keeps_values() {
        let original = analysis();
        let json = serde_json::to_string(&original).expect("serialize");
        let decoded: SpendingAnalysis = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(decoded, original);
    }
}
