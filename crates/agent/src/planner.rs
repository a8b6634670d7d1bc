use std::sync::Arc;

use billburn_core::config::AppConfig;
use billburn_core::domain::analysis::SpendingAnalysis;
use billburn_core::domain::scenario::BurnConfig;
use billburn_core::prompt::{self, RoastContext, BURN_PLAN_TASK, ROAST_TASK};
use billburn_core::validation::{validate_cost_match, validate_line_items};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::client::{AgentClient, AgentError, RetryPolicy};
use crate::extract::{extract_analysis, extract_roast};
use crate::transport::{HttpAgentTransport, TransportError};

/// Builds prompts, invokes the runtime and accepts only replies that match the
/// analysis schema and land within the cost tolerance.
#[derive(Clone)]
pub struct BurnPlanner {
    client: AgentClient,
    default_model: Option<String>,
}

impl BurnPlanner {
    pub fn new(client: AgentClient) -> Self {
        Self { client, default_model: None }
    }

    /// Wires the HTTP transport from configuration; `None` when no runtime ARN
    /// is configured.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>, TransportError> {
        let Some(transport) = HttpAgentTransport::from_config(config)? else {
            return Ok(None);
        };
        info!(
            event_name = "planner.transport.configured",
            auth = transport.auth().describe(),
            max_retries = config.agent.max_retries,
            "agent runtime transport configured"
        );
        let client = AgentClient::new(Arc::new(transport), RetryPolicy::from_config(&config.agent));
        Ok(Some(Self::new(client).with_default_model(config.agent.model_id.clone())))
    }

    pub fn with_default_model(mut self, model_id: Option<String>) -> Self {
        self.default_model = model_id.filter(|value| !value.trim().is_empty());
        self
    }

    pub async fn generate_burn_plan(
        &self,
        config: &BurnConfig,
    ) -> Result<SpendingAnalysis, AgentError> {
        config.validate().map_err(|error| AgentError::InvalidRequest(error.to_string()))?;

        let instructions = prompt::burn_plan_instructions(config);
        let reply =
            self.client.invoke(BURN_PLAN_TASK, &instructions, self.parameters(config)).await?;

        let analysis = extract_analysis(reply)?;
        validate_cost_match(&config.amount, analysis.total_calculated_cost)?;
        validate_line_items(&analysis)?;

        let violations = analysis.validate();
        if !violations.is_empty() {
            return Err(AgentError::Parse(format!(
                "analysis breaks schema invariants: {}",
                violations.join("; ")
            )));
        }
        for warning in analysis.warnings() {
            warn!(event_name = "planner.analysis.warning", warning = %warning, "analysis warning");
        }

        info!(
            event_name = "planner.burn_plan.generated",
            amount = %config.amount,
            timeline = config.timeline,
            services = analysis.services_deployed.len(),
            total_calculated_cost = analysis.total_calculated_cost,
            "burn plan generated"
        );
        Ok(analysis)
    }

    pub async fn roast(&self, analysis: &SpendingAnalysis) -> Result<String, AgentError> {
        let context = RoastContext::from(analysis);
        let instructions = prompt::roast_instructions(&context);

        let mut parameters = Map::new();
        parameters.insert("total_amount".to_string(), json!(context.total_amount));
        parameters.insert("services".to_string(), json!(context.services));
        parameters.insert("stupidity_level".to_string(), json!(context.stupidity_level));

        let reply = self.client.invoke(ROAST_TASK, &instructions, parameters).await?;
        extract_roast(reply)
    }

    fn parameters(&self, config: &BurnConfig) -> Map<String, Value> {
        let mut parameters = Map::new();
        parameters.insert("amount".to_string(), json!(config.amount));
        parameters.insert("timeline".to_string(), json!(config.timeline));
        parameters.insert("stupidity".to_string(), json!(config.stupidity));
        parameters.insert("stupidity_level".to_string(), json!(config.stupidity));
        parameters.insert("architecture".to_string(), json!(config.architecture));
        parameters.insert("burning_style".to_string(), json!(config.burning_style));
        parameters.insert("system_prompt".to_string(), json!(prompt::system_prompt()));
        if let Some(model_id) = config.model_id.as_ref().or(self.default_model.as_ref()) {
            parameters.insert("model_id".to_string(), json!(model_id));
        }
        parameters
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use billburn_core::domain::scenario::{
        ArchitectureType, BurnConfig, BurningStyle, EfficiencyLevel,
    };
    use billburn_core::validation::ValidationError;
    use serde_json::{json, Value};

    use super::BurnPlanner;
    use crate::client::testing::ScriptedTransport;
    use crate::client::{AgentClient, AgentError, RetryPolicy};

    fn reply(total: f64, end_day: i64) -> String {
        json!({
            "status": "success",
            "analysis": {
                "total_amount": "$3000",
                "timeline_days": 30,
                "efficiency_level": "Very stupid",
                "architecture_type": "serverless",
                "burning_style": "vertical",
                "services_deployed": [
                    {"service_name": "AWS Lambda", "instance_type": "10240 MB", "quantity": 100,
                     "unit_cost": total / 200.0, "total_cost": total / 2.0, "start_day": 2,
                     "end_day": end_day, "duration_used": "5 days", "usage_pattern": "recursive",
                     "waste_factor": "loop"},
                    {"service_name": "Amazon DynamoDB", "instance_type": "provisioned 40k WCU",
                     "quantity": 1, "unit_cost": total / 2.0, "total_cost": total / 2.0,
                     "start_day": 10, "end_day": -1, "duration_used": "20 days",
                     "usage_pattern": "bursty", "waste_factor": "nobody reads it"}
                ],
                "total_calculated_cost": total,
                "deployment_scenario": "Event storm.",
                "key_mistakes": ["a", "b", "c"],
                "recommendations": ["d", "e", "f"],
                "roast": "Wow."
            }
        })
        .to_string()
    }

    fn config() -> BurnConfig {
        BurnConfig::new(
            "$3000",
            30,
            EfficiencyLevel::VeryStupid,
            ArchitectureType::Serverless,
            BurningStyle::Vertical,
        )
    }

    fn planner(replies: Vec<String>) -> (BurnPlanner, Arc<ScriptedTransport>) {
        let transport =
            Arc::new(ScriptedTransport::with_script(replies.into_iter().map(Ok).collect()));
        let client = AgentClient::new(transport.clone(), RetryPolicy::immediate(2));
        (BurnPlanner::new(client), transport)
    }

    #[tokio::test]
    async fn serverless_vertical_plan_lands_within_tolerance() {
        let (planner, transport) = planner(vec![reply(2950.0, 7)]);

        let analysis = planner.generate_burn_plan(&config()).await.expect("plan");
        assert!((2700.0..=3300.0).contains(&analysis.total_calculated_cost));
        assert!(analysis.services_deployed.iter().all(|item| !item.service_name.is_empty()));

        let requests = transport.requests().await;
        let payload = &requests[0].payload;
        assert_eq!(payload["stupidity_level"], json!("Very stupid"));
        assert_eq!(payload["architecture"], json!("serverless"));
        assert_eq!(payload["burning_style"], json!("vertical"));
        assert!(payload["prompt"].as_str().is_some_and(|text| text.contains("$3000")));
        assert!(payload.get("model_id").is_none());
    }

    #[tokio::test]
    async fn cost_outside_tolerance_is_rejected() {
        let (planner, _) = planner(vec![reply(5000.0, 7)]);
        let error = planner.generate_burn_plan(&config()).await.expect_err("mismatch");
        assert!(matches!(error, AgentError::CostMismatch(_)));
    }

    #[tokio::test]
    async fn total_that_ignores_its_line_items_is_rejected() {
        let mut lone_item: Value = serde_json::from_str(&reply(3000.0, 7)).expect("reply");
        let items = lone_item["analysis"]["services_deployed"].as_array_mut().expect("items");
        items.truncate(1);
        items[0]["unit_cost"] = json!(0.05);
        items[0]["total_cost"] = json!(5.0);

        let (planner, _) = planner(vec![lone_item.to_string()]);
        let error = planner.generate_burn_plan(&config()).await.expect_err("mismatch");
        assert!(matches!(
            error,
            AgentError::CostMismatch(ValidationError::LineItemMismatch { line_items, .. })
                if line_items == 5.0
        ));
    }

    #[tokio::test]
    async fn day_bound_violation_is_a_parse_error() {
        let (planner, _) = planner(vec![reply(3000.0, 45)]);
        let error = planner.generate_burn_plan(&config()).await.expect_err("violation");
        assert!(matches!(error, AgentError::Parse(ref message) if message.contains("end_day 45")));
    }

    #[tokio::test]
    async fn invalid_config_never_reaches_the_runtime() {
        let (planner, transport) = planner(vec![reply(3000.0, 7)]);
        let mut config = config();
        config.timeline = 0;

        let error = planner.generate_burn_plan(&config).await.expect_err("invalid");
        assert!(matches!(error, AgentError::InvalidRequest(_)));
        assert!(transport.requests().await.is_empty());
    }

    #[tokio::test]
    async fn model_override_wins_over_default_model() {
        let (planner, transport) = planner(vec![reply(3000.0, 7)]);
        let planner = planner.with_default_model(Some("amazon.nova-lite-v1:0".into()));
        let config = config().with_model(Some("anthropic.claude-x".into()));

        planner.generate_burn_plan(&config).await.expect("plan");
        let requests = transport.requests().await;
        assert_eq!(requests[0].payload["model_id"], Value::String("anthropic.claude-x".into()));
    }

    #[test]
    fn planner_is_absent_without_runtime_arn() {
        let config = billburn_core::config::AppConfig::default();
        assert!(BurnPlanner::from_config(&config).expect("from config").is_none());

        let mut config = billburn_core::config::AppConfig::default();
        config.agent.runtime_arn =
            Some("arn:aws:bedrock-agentcore:us-east-1:123456789012:runtime/bill".to_string());
        assert!(BurnPlanner::from_config(&config).expect("from config").is_some());
    }

    #[tokio::test]
    async fn roast_uses_roast_task_and_reads_roast_text() {
        let (planner, transport) = planner(vec![
            reply(3000.0, 7),
            json!({"roast_text": "That is 600 burritos."}).to_string(),
        ]);
        let analysis = planner.generate_burn_plan(&config()).await.expect("plan");

        let roast = planner.roast(&analysis).await.expect("roast");
        assert_eq!(roast, "That is 600 burritos.");

        let requests = transport.requests().await;
        assert_eq!(requests[1].task_name, "roast-generator");
        assert_eq!(requests[1].payload["services"][0]["service_name"], json!("AWS Lambda"));
    }
}
