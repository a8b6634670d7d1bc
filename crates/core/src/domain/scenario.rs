use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EfficiencyLevel {
    MildlyDumb,
    ModeratelyStupid,
    VeryStupid,
    BrainDamage,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArchitectureType {
    Serverless,
    Kubernetes,
    Traditional,
    Mixed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BurningStyle {
    Horizontal,
    Vertical,
}

impl EfficiencyLevel {
    pub const ALL: [Self; 4] =
        [Self::MildlyDumb, Self::ModeratelyStupid, Self::VeryStupid, Self::BrainDamage];

    pub fn label(self) -> &'static str {
        match self {
            Self::MildlyDumb => "Mildly dumb",
            Self::ModeratelyStupid => "Moderately stupid",
            Self::VeryStupid => "Very stupid",
            Self::BrainDamage => "Brain damage",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::MildlyDumb => "Some inefficient choices",
            Self::ModeratelyStupid => "Clearly wasteful configurations",
            Self::VeryStupid => "Extremely inefficient setups",
            Self::BrainDamage => "Maximum waste possible",
        }
    }
}

impl ArchitectureType {
    pub const ALL: [Self; 4] = [Self::Serverless, Self::Kubernetes, Self::Traditional, Self::Mixed];

    pub fn label(self) -> &'static str {
        match self {
            Self::Serverless => "serverless",
            Self::Kubernetes => "kubernetes",
            Self::Traditional => "traditional",
            Self::Mixed => "mixed",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Serverless => "Lambda, API Gateway, DynamoDB, etc.",
            Self::Kubernetes => "EKS, containers, orchestration",
            Self::Traditional => "EC2, RDS, classic infrastructure",
            Self::Mixed => "Combination of all approaches",
        }
    }
}

impl BurningStyle {
    pub const ALL: [Self; 2] = [Self::Horizontal, Self::Vertical];

    pub fn label(self) -> &'static str {
        match self {
            Self::Horizontal => "horizontal",
            Self::Vertical => "vertical",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Horizontal => "Regular spending spread over timeline",
            Self::Vertical => "One-shot bursts of spending",
        }
    }
}

/// Resolves a label against a closed set, accepting the canonical label in any
/// case or the 1-based position used by interactive menus.
fn parse_label<T: Copy>(
    raw: &str,
    all: &[T],
    label: fn(T) -> &'static str,
    kind: &'static str,
) -> Result<T, DomainError> {
    let normalized = raw.trim().to_ascii_lowercase().replace(['_', '-'], " ");

    if let Ok(index) = normalized.parse::<usize>() {
        if (1..=all.len()).contains(&index) {
            return Ok(all[index - 1]);
        }
    }

    all.iter()
        .copied()
        .find(|candidate| label(*candidate).to_ascii_lowercase() == normalized)
        .ok_or_else(|| {
            let expected = all.iter().map(|candidate| label(*candidate)).collect::<Vec<_>>();
            DomainError::UnknownLabel { kind, value: raw.to_string(), expected: expected.join("|") }
        })
}

impl FromStr for EfficiencyLevel {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        parse_label(value, &Self::ALL, Self::label, "efficiency level")
    }
}

impl FromStr for ArchitectureType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        parse_label(value, &Self::ALL, Self::label, "architecture type")
    }
}

impl FromStr for BurningStyle {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        parse_label(value, &Self::ALL, Self::label, "burning style")
    }
}

// Labels travel as their canonical text and are parsed leniently on the way in,
// since model replies are not consistent about case.
macro_rules! label_text_impls {
    ($($kind:ty),+) => {$(
        impl fmt::Display for $kind {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl Serialize for $kind {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.label())
            }
        }

        impl<'de> Deserialize<'de> for $kind {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(de::Error::custom)
            }
        }
    )+};
}

label_text_impls!(EfficiencyLevel, ArchitectureType, BurningStyle);

fn default_architecture() -> ArchitectureType {
    ArchitectureType::Mixed
}

fn default_burning_style() -> BurningStyle {
    BurningStyle::Horizontal
}

/// Parameters of one burn-plan request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnConfig {
    pub amount: String,
    pub timeline: i64,
    #[serde(alias = "efficiency_level", alias = "efficiency")]
    pub stupidity: EfficiencyLevel,
    #[serde(default = "default_architecture")]
    pub architecture: ArchitectureType,
    #[serde(default = "default_burning_style")]
    pub burning_style: BurningStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
}

impl BurnConfig {
    pub fn new(
        amount: impl Into<String>,
        timeline: i64,
        stupidity: EfficiencyLevel,
        architecture: ArchitectureType,
        burning_style: BurningStyle,
    ) -> Self {
        Self {
            amount: amount.into(),
            timeline,
            stupidity,
            architecture,
            burning_style,
            model_id: None,
        }
    }

    pub fn with_model(mut self, model_id: Option<String>) -> Self {
        self.model_id = model_id.filter(|value| !value.trim().is_empty());
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.amount.trim().is_empty() {
            return Err(DomainError::InvalidConfig("amount is required".to_string()));
        }
        if self.timeline <= 0 {
            return Err(DomainError::InvalidConfig(format!(
                "timeline must be a positive number of days, got {}",
                self.timeline
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ArchitectureType, BurnConfig, BurningStyle, EfficiencyLevel};
    use crate::errors::DomainError;

    #[test]
    fn efficiency_level_parses_labels_and_menu_indexes() {
        assert_eq!("Very stupid".parse::<EfficiencyLevel>(), Ok(EfficiencyLevel::VeryStupid));
        assert_eq!("brain_damage".parse::<EfficiencyLevel>(), Ok(EfficiencyLevel::BrainDamage));
        assert_eq!("2".parse::<EfficiencyLevel>(), Ok(EfficiencyLevel::ModeratelyStupid));
        assert!("5".parse::<EfficiencyLevel>().is_err());
    }

    #[test]
    fn unknown_architecture_reports_expected_values() {
        let error = "monolith".parse::<ArchitectureType>().expect_err("unknown label");
        assert!(matches!(
            error,
            DomainError::UnknownLabel { ref expected, .. }
                if expected == "serverless|kubernetes|traditional|mixed"
        ));
    }

    #[test]
    fn labels_serialize_with_canonical_wire_names() {
        let json = serde_json::to_string(&EfficiencyLevel::MildlyDumb).expect("serialize");
        assert_eq!(json, "\"Mildly dumb\"");
        let json = serde_json::to_string(&BurningStyle::Vertical).expect("serialize");
        assert_eq!(json, "\"vertical\"");
    }

    #[test]
    fn burn_config_defaults_architecture_and_style() {
        let config: BurnConfig = serde_json::from_str(
            r#"{"amount":"$1000","timeline":30,"stupidity":"Moderately stupid"}"#,
        )
        .expect("deserialize");

        assert_eq!(config.architecture, ArchitectureType::Mixed);
        assert_eq!(config.burning_style, BurningStyle::Horizontal);
        assert_eq!(config.model_id, None);
    }

    #[test]
    fn burn_config_accepts_efficiency_level_alias() {
        let config: BurnConfig = serde_json::from_str(
            r#"{
                "amount": "$10",
                "timeline": 3,
                "efficiency_level": "Brain damage",
                "architecture": "serverless",
                "burning_style": "vertical"
            }"#,
        )
        .expect("deserialize");

        assert_eq!(config.stupidity, EfficiencyLevel::BrainDamage);
    }

    #[test]
    fn burn_config_rejects_non_positive_timeline_and_empty_amount() {
        let mut config = BurnConfig::new(
            "$500",
            0,
            EfficiencyLevel::MildlyDumb,
            ArchitectureType::Traditional,
            BurningStyle::Horizontal,
        );
        assert!(matches!(config.validate(), Err(DomainError::InvalidConfig(_))));

        config.timeline = 14;
        config.amount = "  ".to_string();
        assert!(matches!(config.validate(), Err(DomainError::InvalidConfig(_))));

        config.amount = "$500".to_string();
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn blank_model_override_is_dropped() {
        let config = BurnConfig::new(
            "$1",
            1,
            EfficiencyLevel::MildlyDumb,
            ArchitectureType::Mixed,
            BurningStyle::Horizontal,
        )
        .with_model(Some("  ".to_string()));
        assert_eq!(config.model_id, None);
    }
}
