use std::sync::Arc;
use std::time::{Duration, Instant};

use billburn_core::config::AgentConfig;
use billburn_core::errors::ErrorClass;
use billburn_core::validation::ValidationError;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::transport::{extract_retry_after, AgentRequest, AgentTransport, TransportError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AgentError {
    #[error("authentication/authorization failed: {0}")]
    Authentication(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("rate limit exceeded: {message}")]
    RateLimited { message: String, retry_after: Option<u64> },
    #[error("agent invocation timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("agent runtime server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("agent invocation failed: {0}")]
    Agent(String),
    #[error("failed to parse agent response: {0}")]
    Parse(String),
    #[error("agent response was blocked by the content filter")]
    ContentFiltered,
    #[error(transparent)]
    CostMismatch(#[from] ValidationError),
    #[error("agent runtime is not configured: {0}")]
    NotConfigured(String),
}

impl AgentError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Connection(_) | Self::Server { .. } | Self::Agent(_)
        )
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Authentication(_) => ErrorClass::Authentication,
            Self::InvalidRequest(_) => ErrorClass::InvalidRequest,
            Self::RateLimited { .. } => ErrorClass::RateLimited,
            Self::Timeout(_) => ErrorClass::Timeout,
            Self::Connection(_) | Self::Server { .. } | Self::Agent(_) => ErrorClass::Upstream,
            Self::Parse(_) | Self::ContentFiltered => ErrorClass::Parse,
            Self::CostMismatch(_) => ErrorClass::CostMismatch,
            Self::NotConfigured(_) => ErrorClass::NotConfigured,
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<TransportError> for AgentError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Status { status, body, retry_after } => {
                classify_status(status, body, retry_after)
            }
            TransportError::Timeout(message) => Self::Timeout(message),
            TransportError::Connection(message) => Self::Connection(message),
            TransportError::Request(message) => Self::InvalidRequest(message),
            TransportError::Other(message) => {
                let lowered = message.to_ascii_lowercase();
                if lowered.contains("timeout") || lowered.contains("timed out") {
                    Self::Timeout(message)
                } else if lowered.contains("connection") || lowered.contains("network") {
                    Self::Connection(message)
                } else {
                    Self::Agent(message)
                }
            }
        }
    }
}

fn classify_status(status: u16, body: String, retry_after: Option<u64>) -> AgentError {
    let throttled = body.contains("ThrottlingException") || body.contains("TooManyRequests");
    match status {
        429 => AgentError::RateLimited {
            retry_after: retry_after.or_else(|| extract_retry_after(&body)),
            message: body,
        },
        _ if throttled => AgentError::RateLimited {
            retry_after: retry_after.or_else(|| extract_retry_after(&body)),
            message: body,
        },
        401 | 403 => AgentError::Authentication(body),
        408 | 504 => AgentError::Timeout(body),
        400..=499 => AgentError::InvalidRequest(body),
        _ => AgentError::Server { status, message: body },
    }
}

/// Exponential backoff between attempts: `base * 2^attempt`, capped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_ms),
            ..Self::default()
        }
    }

    pub fn immediate(max_retries: u32) -> Self {
        Self { max_retries, base_delay: Duration::ZERO, max_delay: Duration::ZERO }
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u32 << exponent;
        self.base_delay.saturating_mul(multiplier).min(self.max_delay)
    }
}

/// Session identifiers must be at least 33 characters long.
pub fn new_session_id() -> String {
    let suffix = Uuid::new_v4().to_string();
    format!("{}-{}", Uuid::new_v4(), &suffix[..5])
}

/// Invokes named tasks on the agent runtime with classification and retries.
#[derive(Clone)]
pub struct AgentClient {
    transport: Arc<dyn AgentTransport>,
    policy: RetryPolicy,
}

impl AgentClient {
    pub fn new(transport: Arc<dyn AgentTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Sends `{"prompt": instructions, ...parameters}` and returns the decoded
    /// reply. Text that is not JSON comes back as a JSON string.
    pub async fn invoke(
        &self,
        task_name: &str,
        instructions: &str,
        parameters: Map<String, Value>,
    ) -> Result<Value, AgentError> {
        let mut payload = Map::with_capacity(parameters.len() + 1);
        payload.insert("prompt".to_string(), Value::String(instructions.to_string()));
        payload.extend(parameters);
        let payload = Value::Object(payload);

        let mut attempt = 0;
        loop {
            let request = AgentRequest {
                task_name: task_name.to_string(),
                session_id: new_session_id(),
                payload: payload.clone(),
            };
            let started = Instant::now();

            match self.transport.invoke(&request).await {
                Ok(body) => {
                    info!(
                        event_name = "agent.invoke.completed",
                        task = task_name,
                        session_id = %request.session_id,
                        correlation_id = %request.session_id,
                        attempt = attempt + 1,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "agent invocation completed"
                    );
                    return Ok(serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body)));
                }
                Err(transport_error) => {
                    let error = AgentError::from(transport_error);
                    warn!(
                        event_name = "agent.invoke.failed",
                        task = task_name,
                        session_id = %request.session_id,
                        correlation_id = %request.session_id,
                        attempt = attempt + 1,
                        max_retries = self.policy.max_retries,
                        error_class = %error.class(),
                        error = %error,
                        "agent invocation failed"
                    );

                    if !error.is_retryable() || attempt >= self.policy.max_retries {
                        return Err(error);
                    }

                    let delay = self.policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use billburn_core::errors::ErrorClass;
    use serde_json::{json, Map, Value};

    use super::testing::ScriptedTransport;
    use super::{new_session_id, AgentClient, AgentError, RetryPolicy};
    use crate::transport::TransportError;

    fn params() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("amount".to_string(), json!("$1000"));
        map.insert("timeline".to_string(), json!(30));
        map
    }

    fn server_error() -> Result<String, TransportError> {
        Err(TransportError::Status { status: 500, body: "boom".to_string(), retry_after: None })
    }

    #[test]
    fn session_ids_are_long_enough_and_unique() {
        let first = new_session_id();
        let second = new_session_id();
        assert_eq!(first.len(), 42);
        assert!(first.len() >= 33);
        assert_ne!(first, second);
    }

    #[test]
    fn backoff_doubles_from_base_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(10), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn payload_merges_prompt_with_parameters() {
        let transport = Arc::new(ScriptedTransport::with_script(vec![Ok("{\"ok\":true}".into())]));
        let client = AgentClient::new(transport.clone(), RetryPolicy::immediate(2));

        let reply = client.invoke("burn-plan-generator", "do it", params()).await.expect("invoke");
        assert_eq!(reply, json!({"ok": true}));

        let requests = transport.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].payload,
            json!({"prompt": "do it", "amount": "$1000", "timeline": 30})
        );
        assert_eq!(requests[0].task_name, "burn-plan-generator");
    }

    #[tokio::test]
    async fn transient_errors_are_retried_exactly_max_retries_times() {
        let transport = Arc::new(ScriptedTransport::with_script(vec![
            server_error(),
            server_error(),
            server_error(),
            Ok("{}".to_string()),
        ]));
        let client = AgentClient::new(transport.clone(), RetryPolicy::immediate(2));

        let error = client.invoke("task", "x", Map::new()).await.expect_err("exhausted");
        assert!(matches!(error, AgentError::Server { status: 500, .. }));
        assert_eq!(transport.requests().await.len(), 3);
    }

    #[tokio::test]
    async fn each_attempt_uses_a_fresh_session() {
        let transport = Arc::new(ScriptedTransport::with_script(vec![
            Err(TransportError::Timeout("slow".to_string())),
            Ok("{}".to_string()),
        ]));
        let client = AgentClient::new(transport.clone(), RetryPolicy::immediate(2));

        client.invoke("task", "x", Map::new()).await.expect("second attempt succeeds");
        let requests = transport.requests().await;
        assert_eq!(requests.len(), 2);
        assert_ne!(requests[0].session_id, requests[1].session_id);
    }

    #[tokio::test]
    async fn auth_invalid_request_and_rate_limit_are_not_retried() {
        let cases = vec![
            (TransportError::Status { status: 403, body: "denied".into(), retry_after: None },
             ErrorClass::Authentication),
            (TransportError::Status { status: 422, body: "bad".into(), retry_after: None },
             ErrorClass::InvalidRequest),
            (TransportError::Status {
                status: 429,
                body: "ThrottlingException: retry-after: 12".into(),
                retry_after: None,
            }, ErrorClass::RateLimited),
        ];

        for (failure, expected_class) in cases {
            let transport = Arc::new(ScriptedTransport::with_script(vec![
                Err(failure),
                Ok("{}".to_string()),
            ]));
            let client = AgentClient::new(transport.clone(), RetryPolicy::immediate(2));

            let error = client.invoke("task", "x", Map::new()).await.expect_err("fails");
            assert_eq!(error.class(), expected_class);
            assert_eq!(transport.requests().await.len(), 1, "{expected_class} must not retry");
            if expected_class == ErrorClass::RateLimited {
                assert_eq!(error.retry_after(), Some(12));
            }
        }
    }

    #[test]
    fn unclassified_failures_are_sniffed_for_timeouts_and_connections() {
        assert!(matches!(
            AgentError::from(TransportError::Other("read timed out".into())),
            AgentError::Timeout(_)
        ));
        assert!(matches!(
            AgentError::from(TransportError::Other("network unreachable".into())),
            AgentError::Connection(_)
        ));
        let generic = AgentError::from(TransportError::Other("weird".into()));
        assert!(matches!(generic, AgentError::Agent(_)));
        assert!(generic.is_retryable());
    }

    #[tokio::test]
    async fn non_json_reply_is_returned_as_text() {
        let transport =
            Arc::new(ScriptedTransport::with_script(vec![Ok("plain words".to_string())]));
        let client = AgentClient::new(transport, RetryPolicy::immediate(0));
        let reply = client.invoke("task", "x", Map::new()).await.expect("invoke");
        assert_eq!(reply, Value::String("plain words".to_string()));
    }
}
