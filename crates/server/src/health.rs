use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use billburn_db::BurnPlanRepository;
use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use crate::api::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub agentcore_configured: bool,
    pub storage_configured: bool,
    pub invoice_format: &'static str,
    pub database: HealthCheck,
    pub checked_at: String,
}

/// Always answers 200; an unreachable store only marks the service degraded.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(state.store.as_ref()).await;

    let payload = HealthResponse {
        status: if database.status == "degraded" { "degraded" } else { "healthy" },
        service: "aws-bill-burner",
        agentcore_configured: state.planner.is_some(),
        storage_configured: state.blob_store.is_some(),
        invoice_format: if state.renderer.pdf_enabled() { "pdf" } else { "html" },
        database,
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}

async fn database_check(store: Option<&Arc<dyn BurnPlanRepository>>) -> HealthCheck {
    let Some(store) = store else {
        return HealthCheck { status: "disabled", detail: "burn plan store disabled".to_string() };
    };
    match store.ping().await {
        Ok(()) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            warn!(
                event_name = "system.health.database_degraded",
                error = %error,
                "database check failed"
            );
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}
