use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use billburn_core::config::AppConfig;
use billburn_core::config::LoadOptions;
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

/// One rendered configuration value and where it may have come from.
struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

impl Field {
    fn new(key: &'static str, env_keys: &'static [&'static str], value: impl Into<String>) -> Self {
        Self { key, env_keys, value: value.into() }
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    vec![
        Field::new(
            "database.enabled",
            &["BILLBURN_DATABASE_ENABLED"],
            config.database.enabled.to_string(),
        ),
        Field::new("database.url", &["BILLBURN_DATABASE_URL"], config.database.url.clone()),
        Field::new(
            "database.max_connections",
            &["BILLBURN_DATABASE_MAX_CONNECTIONS"],
            config.database.max_connections.to_string(),
        ),
        Field::new(
            "database.timeout_secs",
            &["BILLBURN_DATABASE_TIMEOUT_SECS"],
            config.database.timeout_secs.to_string(),
        ),
        Field::new(
            "agent.runtime_arn",
            &["BILLBURN_AGENT_RUNTIME_ARN", "AGENTCORE_AGENT_RUNTIME_ARN"],
            config.agent.runtime_arn.as_deref().unwrap_or("<unset>"),
        ),
        Field::new(
            "agent.endpoint",
            &["BILLBURN_AGENT_ENDPOINT"],
            config.agent.resolved_endpoint(&config.aws.region),
        ),
        Field::new(
            "agent.qualifier",
            &["BILLBURN_AGENT_QUALIFIER"],
            config.agent.qualifier.clone(),
        ),
        Field::new(
            "agent.bearer_token",
            &["BILLBURN_AGENT_BEARER_TOKEN"],
            redact_secret(config.agent.bearer_token.as_ref()),
        ),
        Field::new(
            "agent.model_id",
            &["BILLBURN_AGENT_MODEL_ID"],
            config.agent.model_id.as_deref().unwrap_or("<runtime default>"),
        ),
        Field::new(
            "agent.timeout_secs",
            &["BILLBURN_AGENT_TIMEOUT_SECS"],
            config.agent.timeout_secs.to_string(),
        ),
        Field::new(
            "agent.max_retries",
            &["BILLBURN_AGENT_MAX_RETRIES"],
            config.agent.max_retries.to_string(),
        ),
        Field::new("aws.region", &["BILLBURN_AWS_REGION", "AWS_REGION"], config.aws.region.clone()),
        Field::new(
            "aws.access_key_id",
            &["BILLBURN_AWS_ACCESS_KEY_ID", "AWS_ACCESS_KEY_ID"],
            config
                .aws
                .access_key_id
                .as_deref()
                .map(redact_key_id)
                .unwrap_or_else(|| "<unset>".to_string()),
        ),
        Field::new(
            "aws.secret_access_key",
            &["BILLBURN_AWS_SECRET_ACCESS_KEY", "AWS_SECRET_ACCESS_KEY"],
            redact_secret(config.aws.secret_access_key.as_ref()),
        ),
        Field::new(
            "aws.session_token",
            &["BILLBURN_AWS_SESSION_TOKEN", "AWS_SESSION_TOKEN"],
            redact_secret(config.aws.session_token.as_ref()),
        ),
        Field::new(
            "storage.enabled",
            &["BILLBURN_STORAGE_ENABLED"],
            config.storage.enabled.to_string(),
        ),
        Field::new(
            "storage.backend",
            &["BILLBURN_STORAGE_BACKEND"],
            format!("{:?}", config.storage.backend),
        ),
        Field::new(
            "storage.bucket",
            &["BILLBURN_STORAGE_BUCKET", "BILL_PDF_BUCKET"],
            config.storage.bucket.clone(),
        ),
        Field::new(
            "storage.local_dir",
            &["BILLBURN_STORAGE_LOCAL_DIR"],
            config.storage.local_dir.display().to_string(),
        ),
        Field::new(
            "storage.expiration_secs",
            &["BILLBURN_STORAGE_EXPIRATION_SECS"],
            config.storage.expiration_secs.to_string(),
        ),
        Field::new(
            "server.bind_address",
            &["BILLBURN_SERVER_BIND_ADDRESS"],
            config.server.bind_address.clone(),
        ),
        Field::new("server.port", &["BILLBURN_SERVER_PORT"], config.server.port.to_string()),
        Field::new(
            "logging.level",
            &["BILLBURN_LOGGING_LEVEL", "BILLBURN_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        Field::new(
            "logging.format",
            &["BILLBURN_LOGGING_FORMAT", "BILLBURN_LOG_FORMAT"],
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("billburn.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/billburn.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: Option<&SecretString>) -> String {
    match secret {
        Some(secret) if secret.expose_secret().trim().is_empty() => "<empty>".to_string(),
        Some(_) => "<redacted>".to_string(),
        None => "<unset>".to_string(),
    }
}

/// Keeps the first four characters (the key type prefix, e.g. `AKIA`).
fn redact_key_id(key_id: &str) -> String {
    let trimmed = key_id.trim();
    if trimmed.chars().count() <= 4 {
        return "<redacted>".to_string();
    }
    format!("{}***", trimmed.chars().take(4).collect::<String>())
}
