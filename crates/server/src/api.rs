//! HTTP API for burn-plan generation.
//!
//! - `GET  /`                   - service banner
//! - `GET  /health`             - readiness summary
//! - `POST /burn-plan`          - generate, store and invoice a burn plan
//! - `GET  /burn-plan/recent`   - newest stored plans (`?limit=1..=20`)
//! - `POST /roast`              - session roast (not implemented)

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use billburn_agent::{AgentError, BurnPlanner};
use billburn_core::domain::analysis::SpendingAnalysis;
use billburn_core::domain::scenario::BurnConfig;
use billburn_core::errors::ErrorClass;
use billburn_db::repositories::MAX_RECENT_LIMIT;
use billburn_db::{BurnPlanRecord, BurnPlanRepository, RepositoryError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::health;
use crate::invoice::InvoiceRenderer;
use crate::storage::{invoice_key, upload_invoice, BlobStore, InvoiceUpload};

const DEFAULT_RECENT_LIMIT: i64 = 5;

#[derive(Clone)]
pub struct AppState {
    pub planner: Option<BurnPlanner>,
    pub store: Option<Arc<dyn BurnPlanRepository>>,
    pub blob_store: Option<Arc<dyn BlobStore>>,
    pub renderer: Arc<InvoiceRenderer>,
    pub invoice_expiration_secs: u64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(service_index))
        .route("/health", get(health::health))
        .route("/burn-plan", post(create_burn_plan))
        .route("/burn-plan/recent", get(recent_burn_plans))
        .route("/roast", post(roast))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct BurnPlanResponse {
    pub session_id: String,
    pub burn_plan: SpendingAnalysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_invoice: Option<InvoiceUpload>,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RecentBurnPlans {
    pub burn_plans: Vec<BurnPlanRecord>,
}

#[derive(Debug, Deserialize)]
pub struct RoastRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error(
        "agent runtime is not configured (set agent.runtime_arn or AGENTCORE_AGENT_RUNTIME_ARN)"
    )]
    NotConfigured,
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error("burn plan store unavailable: {0}")]
    Persistence(String),
    #[error("{0}")]
    NotImplemented(String),
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        Self::Persistence(error.to_string())
    }
}

impl ApiError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) => ErrorClass::Validation,
            Self::NotConfigured => ErrorClass::NotConfigured,
            Self::Agent(error) => error.class(),
            Self::Persistence(_) => ErrorClass::Persistence,
            Self::NotImplemented(_) => ErrorClass::NotImplemented,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.class() {
            ErrorClass::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorClass::NotConfigured | ErrorClass::Persistence => StatusCode::SERVICE_UNAVAILABLE,
            ErrorClass::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorClass::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorClass::Authentication
            | ErrorClass::InvalidRequest
            | ErrorClass::Upstream
            | ErrorClass::Parse
            | ErrorClass::CostMismatch => StatusCode::BAD_GATEWAY,
            ErrorClass::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Agent(error) if error.class() == ErrorClass::Upstream => {
                format!("Agent error: {error}")
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let class = self.class();
        let status = self.status();
        let message = self.message();
        let retry_after = match &self {
            Self::Agent(error) => error.retry_after(),
            _ => None,
        };

        if status.is_server_error() {
            error!(
                event_name = "api.request.failed",
                error_class = %class,
                status = status.as_u16(),
                error = %message,
                "request failed"
            );
        } else {
            warn!(
                event_name = "api.request.rejected",
                error_class = %class,
                status = status.as_u16(),
                error = %message,
                "request rejected"
            );
        }

        let mut response =
            (status, Json(ErrorBody { error: class.as_str(), message })).into_response();
        if let Some(seconds) = retry_after {
            response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn service_index() -> Json<Value> {
    Json(json!({
        "message": "AWS Bill Burner API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "burn_plan": "/burn-plan (POST)",
            "burn_plan_recent": "/burn-plan/recent (GET)",
            "roast": "/roast (POST)"
        }
    }))
}

async fn create_burn_plan(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<BurnPlanResponse>), ApiError> {
    let Json(body) = body.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
    let config = parse_burn_config(body)?;
    let planner = state.planner.as_ref().ok_or(ApiError::NotConfigured)?;

    let session_id = Uuid::new_v4().to_string();
    info!(
        event_name = "api.burn_plan.requested",
        correlation_id = %session_id,
        amount = %config.amount,
        timeline = config.timeline,
        efficiency = %config.stupidity,
        architecture = %config.architecture,
        burning_style = %config.burning_style,
        "burn plan requested"
    );

    let burn_plan = planner.generate_burn_plan(&config).await?;

    if let Some(store) = &state.store {
        store.save(BurnPlanRecord::new(session_id.clone(), burn_plan.clone())).await?;
    }

    let pdf_invoice = match &state.blob_store {
        Some(blob_store) => {
            Some(invoice_for(&state, blob_store.as_ref(), &burn_plan, &session_id).await)
        }
        None => None,
    };

    info!(
        event_name = "api.burn_plan.created",
        correlation_id = %session_id,
        total_calculated_cost = burn_plan.total_calculated_cost,
        invoice_uploaded = pdf_invoice.as_ref().is_some_and(|upload| upload.url.is_some()),
        "burn plan created"
    );
    Ok((StatusCode::CREATED, Json(BurnPlanResponse { session_id, burn_plan, pdf_invoice })))
}

async fn recent_burn_plans(
    State(state): State<AppState>,
    query: Result<Query<RecentQuery>, QueryRejection>,
) -> Result<Json<RecentBurnPlans>, ApiError> {
    let Query(query) = query.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    if !(1..=i64::from(MAX_RECENT_LIMIT)).contains(&limit) {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {MAX_RECENT_LIMIT}, got {limit}"
        )));
    }

    let store = state
        .store
        .as_ref()
        .ok_or_else(|| ApiError::Persistence("burn plan store is disabled".to_string()))?;
    let burn_plans = store.recent(limit as u32).await?;
    Ok(Json(RecentBurnPlans { burn_plans }))
}

async fn roast(body: Result<Json<RoastRequest>, JsonRejection>) -> ApiError {
    match body {
        Err(rejection) => ApiError::Validation(rejection.body_text()),
        Ok(Json(request)) if request.session_id.trim().is_empty() => {
            ApiError::Validation("session_id must not be empty".to_string())
        }
        Ok(Json(request)) => {
            info!(
                event_name = "api.roast.requested",
                correlation_id = %request.session_id,
                "roast requested"
            );
            ApiError::NotImplemented(
                "Session retrieval not yet implemented. \
                 Roast a saved analysis with `billburn roast`."
                    .to_string(),
            )
        }
    }
}

/// Accepts `{"config": {...}}` or the configuration fields at the top level.
fn parse_burn_config(body: Value) -> Result<BurnConfig, ApiError> {
    let config_value = match body {
        Value::Object(mut fields) => match fields.remove("config") {
            Some(inner @ Value::Object(_)) => inner,
            Some(other) => {
                fields.insert("config".to_string(), other);
                Value::Object(fields)
            }
            None => Value::Object(fields),
        },
        other => other,
    };

    let config = serde_json::from_value::<BurnConfig>(config_value)
        .map_err(|error| ApiError::Validation(format!("invalid burn configuration: {error}")))?;
    config.validate().map_err(|error| ApiError::Validation(error.to_string()))?;
    Ok(config)
}

async fn invoice_for(
    state: &AppState,
    blob_store: &dyn BlobStore,
    burn_plan: &SpendingAnalysis,
    session_id: &str,
) -> InvoiceUpload {
    match state.renderer.render(burn_plan).await {
        Ok(artifact) => {
            upload_invoice(blob_store, &artifact, state.invoice_expiration_secs, session_id).await
        }
        Err(error) => {
            warn!(
                event_name = "api.invoice.render_failed",
                correlation_id = %session_id,
                error = %error,
                "invoice rendering failed"
            );
            InvoiceUpload::failed(
                invoice_key("html", Utc::now(), session_id),
                blob_store.bucket().to_string(),
                "html",
                "RenderError",
                error.to_string(),
            )
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use billburn_agent::transport::{AgentRequest, AgentTransport, TransportError};
    use billburn_agent::{AgentClient, BurnPlanner, RetryPolicy};
    use billburn_db::BurnPlanRepository;
    use serde_json::json;
    use tokio::sync::Mutex;

    use super::AppState;
    use crate::invoice::InvoiceRenderer;
    use crate::storage::BlobStore;

    /// Replays canned runtime replies in order.
    #[derive(Default)]
    pub struct CannedTransport {
        replies: Mutex<VecDeque<Result<String, TransportError>>>,
    }

    impl CannedTransport {
        pub fn new(replies: Vec<Result<String, TransportError>>) -> Self {
            Self { replies: Mutex::new(replies.into()) }
        }
    }

    #[async_trait]
    impl AgentTransport for CannedTransport {
        async fn invoke(&self, _request: &AgentRequest) -> Result<String, TransportError> {
            self.replies
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Other("no canned reply left".to_string())))
        }
    }

    pub fn analysis_reply(amount: &str, timeline: i64, efficiency: &str, total: f64) -> String {
        json!({
            "status": "success",
            "analysis": {
                "total_amount": amount,
                "timeline_days": timeline,
                "efficiency_level": efficiency,
                "architecture_type": "mixed",
                "burning_style": "vertical",
                "services_deployed": [
                    {"service_name": "Amazon SageMaker", "instance_type": "ml.p4d.24xlarge",
                     "quantity": 8, "unit_cost": 37.69, "total_cost": total * 0.8,
                     "start_day": 3, "end_day": 17, "duration_used": "14 days",
                     "usage_pattern": "training on an empty bucket", "waste_factor": "no data"},
                    {"service_name": "NAT Gateway", "instance_type": "per-AZ",
                     "quantity": 3, "unit_cost": 0.045, "total_cost": total * 0.2,
                     "start_day": 0, "end_day": -1, "duration_used": "entire timeline",
                     "usage_pattern": "pulling images", "waste_factor": "no VPC endpoints"}
                ],
                "total_calculated_cost": total,
                "deployment_scenario": "A GPU fleet with nothing to learn.",
                "key_mistakes": ["a", "b", "c"],
                "recommendations": ["d", "e", "f"],
                "roast": "Astonishing."
            }
        })
        .to_string()
    }

    pub fn state(
        replies: Option<Vec<Result<String, TransportError>>>,
        store: Option<Arc<dyn BurnPlanRepository>>,
        blob_store: Option<Arc<dyn BlobStore>>,
    ) -> AppState {
        let planner = replies.map(|replies| {
            let transport = Arc::new(CannedTransport::new(replies));
            let client = AgentClient::new(transport, RetryPolicy::immediate(2));
            BurnPlanner::new(client)
        });
        AppState {
            planner,
            store,
            blob_store,
            renderer: Arc::new(InvoiceRenderer::html_only().expect("renderer")),
            invoice_expiration_secs: 21_600,
        }
    }
}
