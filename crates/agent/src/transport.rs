use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use billburn_core::config::AppConfig;
use billburn_core::sigv4::{self, AwsCredentials, SigningError, SigningParams};
use regex::Regex;
use reqwest::header::RETRY_AFTER;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use thiserror::Error;
use url::Url;

pub const SESSION_HEADER: &str = "X-Amzn-Bedrock-AgentCore-Runtime-Session-Id";
pub const SIGNING_SERVICE: &str = "bedrock-agentcore";

/// One invocation of a named agent task.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentRequest {
    pub task_name: String,
    pub session_id: String,
    pub payload: Value,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("agent runtime returned HTTP {status}: {body}")]
    Status { status: u16, body: String, retry_after: Option<u64> },
    #[error("agent runtime request timed out: {0}")]
    Timeout(String),
    #[error("agent runtime connection failed: {0}")]
    Connection(String),
    #[error("agent runtime request could not be built: {0}")]
    Request(String),
    #[error("agent runtime invocation failed: {0}")]
    Other(String),
}

impl From<SigningError> for TransportError {
    fn from(error: SigningError) -> Self {
        Self::Request(error.to_string())
    }
}

#[async_trait]
pub trait AgentTransport: Send + Sync {
    async fn invoke(&self, request: &AgentRequest) -> Result<String, TransportError>;
}

#[derive(Clone, Debug)]
pub enum AgentAuth {
    Bearer(SecretString),
    SigV4 { credentials: AwsCredentials, region: String },
    Anonymous,
}

impl AgentAuth {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Bearer(_) => "bearer",
            Self::SigV4 { .. } => "sigv4",
            Self::Anonymous => "anonymous",
        }
    }
}

/// Calls the hosted runtime's `invocations` REST endpoint.
#[derive(Clone, Debug)]
pub struct HttpAgentTransport {
    client: reqwest::Client,
    endpoint: String,
    runtime_arn: String,
    qualifier: String,
    auth: AgentAuth,
}

impl HttpAgentTransport {
    pub fn new(
        endpoint: impl Into<String>,
        runtime_arn: impl Into<String>,
        qualifier: impl Into<String>,
        auth: AgentAuth,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| TransportError::Request(error.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            runtime_arn: runtime_arn.into(),
            qualifier: qualifier.into(),
            auth,
        })
    }

    /// Builds the transport from configuration; `None` when no runtime is set.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>, TransportError> {
        let Some(runtime_arn) = config.agent.runtime_arn.as_deref().filter(|arn| !arn.is_empty())
        else {
            return Ok(None);
        };

        let auth = match (&config.agent.bearer_token, config.aws.credentials()) {
            (Some(token), _) => AgentAuth::Bearer(token.clone()),
            (None, Some(credentials)) => {
                AgentAuth::SigV4 { credentials, region: config.aws.region.clone() }
            }
            (None, None) => AgentAuth::Anonymous,
        };

        Self::new(
            config.agent.resolved_endpoint(&config.aws.region),
            runtime_arn,
            config.agent.qualifier.clone(),
            auth,
            Duration::from_secs(config.agent.timeout_secs),
        )
        .map(Some)
    }

    pub fn auth(&self) -> &AgentAuth {
        &self.auth
    }

    pub fn invocation_url(&self) -> Result<Url, TransportError> {
        let raw = format!(
            "{}/runtimes/{}/invocations",
            self.endpoint,
            sigv4::uri_encode(&self.runtime_arn, true)
        );
        let mut url = Url::parse(&raw).map_err(|error| TransportError::Request(error.to_string()))?;
        url.query_pairs_mut().append_pair("qualifier", &self.qualifier);
        Ok(url)
    }
}

#[async_trait]
impl AgentTransport for HttpAgentTransport {
    async fn invoke(&self, request: &AgentRequest) -> Result<String, TransportError> {
        let url = self.invocation_url()?;
        let body = serde_json::to_vec(&request.payload)
            .map_err(|error| TransportError::Request(error.to_string()))?;

        let mut headers = vec![
            ("content-type".to_string(), "application/json".to_string()),
            ("accept".to_string(), "application/json".to_string()),
            (SESSION_HEADER.to_ascii_lowercase(), request.session_id.clone()),
        ];
        match &self.auth {
            AgentAuth::Bearer(token) => headers
                .push(("authorization".to_string(), format!("Bearer {}", token.expose_secret()))),
            AgentAuth::SigV4 { credentials, region } => {
                let params = SigningParams::now(credentials, region, SIGNING_SERVICE);
                headers = sigv4::sign_headers(&params, "POST", &url, &headers, &body)?;
            }
            AgentAuth::Anonymous => {}
        }

        let mut builder = self.client.post(url);
        for (name, value) in &headers {
            if name == "host" {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.body(body).send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());
        let text = response.text().await.map_err(map_reqwest_error)?;

        if status.is_success() {
            return Ok(text);
        }

        Err(TransportError::Status { status: status.as_u16(), body: text, retry_after })
    }
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(error.to_string())
    } else if error.is_connect() {
        TransportError::Connection(error.to_string())
    } else if error.is_builder() {
        TransportError::Request(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}

/// Finds a `retry-after: N` or `retry after N` hint in an error message.
pub fn extract_retry_after(message: &str) -> Option<u64> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"(?i)retry[- ]after[:\s]+(\d+)").expect("retry-after pattern is valid")
    });
    pattern.captures(message)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{extract_retry_after, AgentAuth, HttpAgentTransport};

    #[test]
    fn invocation_url_encodes_runtime_arn_and_qualifier() {
        let transport = HttpAgentTransport::new(
            "https://bedrock-agentcore.us-east-1.amazonaws.com/",
            "arn:aws:bedrock-agentcore:us-east-1:123456789012:runtime/bill-agent",
            "DEFAULT",
            AgentAuth::Anonymous,
            Duration::from_secs(5),
        )
        .expect("transport");

        let url = transport.invocation_url().expect("url");
        assert_eq!(
            url.as_str(),
            "https://bedrock-agentcore.us-east-1.amazonaws.com/runtimes/\
             arn%3Aaws%3Abedrock-agentcore%3Aus-east-1%3A123456789012%3Aruntime%2Fbill-agent\
             /invocations?qualifier=DEFAULT"
        );
    }

    #[test]
    fn retry_after_hint_is_parsed_from_messages() {
        assert_eq!(extract_retry_after("ThrottlingException: Retry-After: 30"), Some(30));
        assert_eq!(extract_retry_after("slow down, retry after 7 seconds"), Some(7));
        assert_eq!(extract_retry_after("retry-after:12"), Some(12));
        assert_eq!(extract_retry_after("rate exceeded"), None);
        assert_eq!(extract_retry_after("retry after soon"), None);
        assert_eq!(extract_retry_after("RETRY AFTER soon, Retry-After: 4"), Some(4));
    }
}
