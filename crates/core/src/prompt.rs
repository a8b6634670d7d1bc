//! Prompt text sent to the agent runtime.
//!
//! The system prompt is fixed; per-request instructions are rendered from a
//! [`BurnConfig`] and only mention the architecture and burning style that
//! were actually chosen.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::domain::analysis::SpendingAnalysis;
use crate::domain::scenario::{ArchitectureType, BurnConfig, BurningStyle, EfficiencyLevel};

pub const BURN_PLAN_TASK: &str = "burn-plan-generator";
pub const ROAST_TASK: &str = "roast-generator";

const PERSONA: &str = "You are an AWS Cloud Cost Forensics Agent. Your job is to reverse-engineer \
what over-provisioned and over-engineered AWS resources were likely spun up to result in a given \
spending amount. Be creative while staying technically accurate about AWS services and pricing.";

const OUTPUT_SCHEMA: &str = "\
Your response will be structured as JSON with the following schema:
- total_amount: STRING - The spending amount provided (e.g., '$1500')
- timeline_days: INTEGER - The timeline period in days (e.g., 30, 14, 60)
- efficiency_level: STRING - The efficiency level provided
- architecture_type: STRING - The architecture type (serverless/kubernetes/traditional/mixed)
- burning_style: STRING - The burning style (horizontal/vertical)
- services_deployed: ARRAY of objects, each with:
  - service_name: STRING - AWS service name (e.g., 'EC2', 'RDS', 'S3')
  - instance_type: STRING - Instance type or config (e.g., 'r7g.16xlarge', 'Standard Storage')
  - quantity: INTEGER - Number of instances/resources (default 1)
  - unit_cost: FLOAT - Cost per unit in dollars
  - total_cost: FLOAT - Total cost for this service in dollars
  - start_day: INTEGER - Day number when service started (0 = Day 0)
  - end_day: INTEGER - Day number when service stopped (-1 = end of timeline)
  - duration_used: STRING - How long the service ran (e.g., '30 days', 'entire timeline')
  - usage_pattern: STRING - How it's used (e.g., 'Running 24/7', 'Intermittent')
  - waste_factor: STRING - Why it's wasteful
- total_calculated_cost: FLOAT - Sum of all service costs in dollars
- deployment_scenario: STRING - Detailed narrative of what happened
- key_mistakes: ARRAY of STRINGS - 3-5 key mistakes
- recommendations: ARRAY of STRINGS - 3-5 recommendations
- roast: STRING - A merciless roast of the wasteful spending. Be creative and funny and call out \
the absurdity of these choices.";

const CRITICAL_REQUIREMENTS: &str = "\
CRITICAL REQUIREMENTS:
1. The total_calculated_cost MUST closely match the total_amount provided (within 10% variance)
2. Adjust service quantities, instance types, and costs to match the target spending amount
3. All services_deployed objects MUST have ALL required fields including instance_type, quantity, \
start_day (INTEGER), end_day (INTEGER), and duration_used
4. Use realistic AWS pricing but scale quantities/durations to match the target amount
5. Day numbers must be between 0 and timeline_days, or -1 for end of timeline";

fn efficiency_guidelines(level: EfficiencyLevel) -> &'static [&'static str] {
    match level {
        EfficiencyLevel::MildlyDumb => &[
            "Over-provisioned EC2 instances (t3.2xlarge for a static website)",
            "Forgot to delete test resources after development",
            "Running RDS databases 24/7 for development environments",
            "Unnecessary data transfer between regions",
            "NAT Gateways left running when not needed",
            "Not using Reserved Instances or Savings Plans",
        ],
        EfficiencyLevel::ModeratelyStupid => &[
            "Multiple redundant databases (RDS, DynamoDB, DocumentDB for the same data)",
            "Expensive instance types for trivial workloads (r7g.16xlarge for a cron job)",
            "Storing logs in S3 Glacier Instant Retrieval then retrieving constantly",
            "Running SageMaker notebooks 24/7 with large ml instances",
            "Using AWS Transfer Family for SFTP when S3 would suffice",
            "Provisioned IOPS on all storage without need",
            "Running CloudFront for internal-only applications",
        ],
        EfficiencyLevel::VeryStupid => &[
            "Multi-region active-active setup for a personal blog",
            "Running EKS with 50 nodes for a single microservice",
            "Using AWS Outposts for a cloud-native application",
            "Managed Blockchain for a simple todo list application",
            "Multiple VPN connections, Direct Connect, and Transit Gateway for a simple app",
            "Running EMR clusters 24/7 with no data processing",
            "Running AWS Batch with maximum compute for minimal workloads",
        ],
        EfficiencyLevel::BrainDamage => &[
            "Running AWS RoboMaker simulations continuously",
            "Using AWS Ground Station for basic weather data",
            "Deploying AWS Snowmobile to transfer small amounts of data",
            "Using Amazon Braket quantum computing for basic calculations",
            "Provisioning AWS Local Zones in every location",
            "Running AWS Elemental MediaLive 24/7 for static content",
            "Using AWS Private 5G for a single IoT device",
            "Storing data in every storage class simultaneously",
        ],
    }
}

fn efficiency_summary(level: EfficiencyLevel) -> &'static str {
    match level {
        EfficiencyLevel::MildlyDumb => "Rookie mistakes and minor over-provisioning",
        EfficiencyLevel::ModeratelyStupid => {
            "Significant over-provisioning and wasteful patterns"
        }
        EfficiencyLevel::VeryStupid => "Extreme over-engineering and architectural disasters",
        EfficiencyLevel::BrainDamage => "Maximum over-engineering with obscure services",
    }
}

pub fn architecture_focus(architecture: ArchitectureType) -> &'static str {
    match architecture {
        ArchitectureType::Serverless => {
            "Lambda, API Gateway, DynamoDB, Step Functions, EventBridge, SQS, SNS, AppSync, Cognito"
        }
        ArchitectureType::Kubernetes => {
            "EKS, ECR, container instances, load balancers, persistent volumes, service mesh"
        }
        ArchitectureType::Traditional => {
            "EC2, RDS, EBS, ELB, Auto Scaling, VPC components, classic infrastructure"
        }
        ArchitectureType::Mixed => {
            "services from all architecture types combined in a chaotic over-engineered mess"
        }
    }
}

pub fn burning_style_rule(style: BurningStyle, timeline: i64) -> String {
    match style {
        BurningStyle::Horizontal => format!(
            "Spread spending regularly across the entire {timeline} day timeline. Services run \
             continuously or with consistent patterns. Most services should have start_day=0 and \
             end_day={timeline} or -1."
        ),
        BurningStyle::Vertical => "Create burst spending patterns with services spinning up and \
             down at different times. Use varied start_day and end_day values to show one-shot \
             expensive operations or short-lived resources that burn money quickly then shut down."
            .to_string(),
    }
}

/// Persona, per-efficiency guidelines, output schema and hard requirements.
pub fn system_prompt() -> String {
    let mut prompt = String::with_capacity(6 * 1024);
    prompt.push_str(PERSONA);
    prompt.push_str("\n\nEFFICIENCY LEVEL GUIDELINES:\n");
    for level in EfficiencyLevel::ALL {
        let _ = writeln!(prompt, "\n**{}** - {}:", level.label(), efficiency_summary(level));
        for guideline in efficiency_guidelines(level) {
            let _ = writeln!(prompt, "- {guideline}");
        }
    }
    prompt.push_str(
        "\nInclude specific instance types, quantities, and realistic AWS pricing. Mix obscure \
         services with common ones based on the efficiency level.\n\n",
    );
    prompt.push_str(OUTPUT_SCHEMA);
    prompt.push_str("\n\n");
    prompt.push_str(CRITICAL_REQUIREMENTS);
    prompt
}

pub fn burn_plan_instructions(config: &BurnConfig) -> String {
    let amount = config.amount.trim();
    let timeline = config.timeline;
    let mut text = String::with_capacity(2048);

    let _ = writeln!(
        text,
        "CRITICAL: You must analyze exactly {amount} in spending over {timeline} days."
    );
    let _ = writeln!(text);
    let _ = writeln!(text, "Scenario:");
    let _ = writeln!(text, "- Amount: {amount}");
    let _ = writeln!(text, "- Timeline: Day 0 to Day {timeline}");
    let _ = writeln!(
        text,
        "- Efficiency level: {} ({})",
        config.stupidity,
        config.stupidity.description()
    );
    let _ = writeln!(text, "- Architecture: {}", config.architecture);
    let _ = writeln!(text, "- Burning style: {}", config.burning_style);
    let _ = writeln!(text);
    let _ = writeln!(
        text,
        "ARCHITECTURE FOCUS ({}): {}",
        config.architecture,
        architecture_focus(config.architecture)
    );
    let _ = writeln!(
        text,
        "BURNING STYLE ({}): {}",
        config.burning_style,
        burning_style_rule(config.burning_style, timeline)
    );
    let _ = writeln!(text);
    let _ = writeln!(
        text,
        "Show how the {amount} is distributed across services over {timeline} days with \
         specific instance types, quantities, start day, end day, duration used, and realistic \
         AWS pricing. The total_calculated_cost must closely match {amount} (within 10% variance)."
    );
    let _ = write!(
        text,
        "Describe the likely use case and why these resources were chosen, then return the JSON \
         analysis only."
    );
    text
}

/// Condensed view of an analysis handed to the roast task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoastContext {
    pub total_amount: String,
    pub services: Vec<RoastService>,
    pub stupidity_level: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoastService {
    pub service_name: String,
    pub total_cost: f64,
    pub waste_factor: String,
}

impl From<&SpendingAnalysis> for RoastContext {
    fn from(analysis: &SpendingAnalysis) -> Self {
        Self {
            total_amount: analysis.total_amount.clone(),
            services: analysis
                .services_deployed
                .iter()
                .map(|item| RoastService {
                    service_name: item.service_name.clone(),
                    total_cost: item.total_cost,
                    waste_factor: item.waste_factor.clone(),
                })
                .collect(),
            stupidity_level: analysis.efficiency_level.clone(),
        }
    }
}

pub fn roast_instructions(context: &RoastContext) -> String {
    let mut text = format!(
        "Generate a witty roast commentary for someone who spent {} on AWS.\n\n\
         Efficiency Level: {}\n",
        context.total_amount, context.stupidity_level
    );
    if !context.services.is_empty() {
        text.push_str("\nServices:\n");
        for service in &context.services {
            let _ = writeln!(
                text,
                "- {} (${:.2}): {}",
                service.service_name, service.total_cost, service.waste_factor
            );
        }
    }
    text.push_str(
        "\nBe snarky but not mean. Compare costs to relatable items like burritos, coffee, or \
         Netflix. Focus on the absurdity of the spending choices. Return JSON with a single \
         `roast_text` field.",
    );
    text
}

#[cfg(test)]
mod tests {
    use super::{
        burn_plan_instructions, roast_instructions, system_prompt, RoastContext,
    };
    use crate::domain::analysis::fixtures::analysis;
    use crate::domain::scenario::{ArchitectureType, BurnConfig, BurningStyle, EfficiencyLevel};

    fn config(architecture: ArchitectureType, style: BurningStyle) -> BurnConfig {
        BurnConfig::new("$3000", 30, EfficiencyLevel::VeryStupid, architecture, style)
    }

    #[test]
    fn system_prompt_covers_every_efficiency_level_and_the_variance_rule() {
        let prompt = system_prompt();
        for level in EfficiencyLevel::ALL {
            assert!(prompt.contains(&format!("**{}**", level.label())), "{level} missing");
        }
        assert!(prompt.contains("within 10% variance"));
        assert!(prompt.contains("-1 for end of timeline"));
        assert!(prompt.contains("services_deployed"));
    }

    #[test]
    fn instructions_carry_scenario_header() {
        let request = config(ArchitectureType::Serverless, BurningStyle::Vertical);
        let text = burn_plan_instructions(&request);
        assert!(text.contains("exactly $3000 in spending over 30 days"));
        assert!(text.contains("Day 0 to Day 30"));
        assert!(text.contains("Very stupid"));
    }

    #[test]
    fn instructions_only_mention_chosen_architecture_focus() {
        let request = config(ArchitectureType::Serverless, BurningStyle::Vertical);
        let text = burn_plan_instructions(&request);
        assert!(text.contains("Step Functions"));
        assert!(!text.contains("service mesh"));
        assert!(text.contains("varied start_day and end_day"));
        assert!(!text.contains("start_day=0"));
    }

    #[test]
    fn horizontal_style_pins_start_and_end_days() {
        let text =
            burn_plan_instructions(&config(ArchitectureType::Kubernetes, BurningStyle::Horizontal));
        assert!(text.contains("start_day=0"));
        assert!(text.contains("end_day=30 or -1"));
        assert!(text.contains("service mesh"));
    }

    #[test]
    fn roast_instructions_list_services_from_analysis() {
        let context = RoastContext::from(&analysis());
        let text = roast_instructions(&context);
        assert!(text.contains("spent $1000 on AWS"));
        assert!(text.contains("Amazon RDS ($400.50)"));
        assert!(text.contains("roast_text"));
    }
}
