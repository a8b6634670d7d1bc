pub mod config;
pub mod domain;
pub mod errors;
pub mod prompt;
pub mod report;
pub mod sigv4;
pub mod validation;

pub use config::{AppConfig, ConfigError, LoadOptions};
pub use domain::analysis::{LineItem, SpendingAnalysis};
pub use domain::scenario::{ArchitectureType, BurnConfig, BurningStyle, EfficiencyLevel};
pub use errors::{DomainError, ErrorClass};
pub use prompt::RoastContext;
pub use validation::{validate_cost_match, validate_line_items, ValidationError};
