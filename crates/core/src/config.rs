use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sigv4::{AwsCredentials, MAX_PRESIGN_SECS};

pub const DEFAULT_BUCKET: &str = "aws-bill-invoices-demo";
pub const DEFAULT_EXPIRATION_SECS: u64 = 21_600;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub agent: AgentConfig,
    pub aws: AwsConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub enabled: bool,
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub runtime_arn: Option<String>,
    pub endpoint: Option<String>,
    pub qualifier: String,
    pub bearer_token: Option<SecretString>,
    pub model_id: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_ms: u64,
}

#[derive(Clone, Debug)]
pub struct AwsConfig {
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<SecretString>,
    pub session_token: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub enabled: bool,
    pub backend: StorageBackend,
    pub bucket: String,
    pub endpoint: Option<String>,
    pub path_style: bool,
    pub local_dir: PathBuf,
    pub expiration_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    S3,
    Local,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub database_enabled: Option<bool>,
    pub log_level: Option<String>,
    pub agent_runtime_arn: Option<String>,
    pub agent_endpoint: Option<String>,
    pub model_id: Option<String>,
    pub storage_backend: Option<StorageBackend>,
    pub storage_bucket: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                enabled: true,
                url: "sqlite://billburn.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            agent: AgentConfig {
                runtime_arn: None,
                endpoint: None,
                qualifier: "DEFAULT".to_string(),
                bearer_token: None,
                model_id: None,
                timeout_secs: 120,
                max_retries: 2,
                retry_base_ms: 1_000,
            },
            aws: AwsConfig {
                region: "us-east-1".to_string(),
                access_key_id: None,
                secret_access_key: None,
                session_token: None,
            },
            storage: StorageConfig {
                enabled: true,
                backend: StorageBackend::S3,
                bucket: DEFAULT_BUCKET.to_string(),
                endpoint: None,
                path_style: false,
                local_dir: PathBuf::from("invoices"),
                expiration_secs: DEFAULT_EXPIRATION_SECS,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "s3" => Ok(Self::S3),
            "local" => Ok(Self::Local),
            other => Err(ConfigError::Validation(format!(
                "unsupported storage backend `{other}` (expected s3|local)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AgentConfig {
    pub fn is_configured(&self) -> bool {
        self.runtime_arn.as_deref().is_some_and(|arn| !arn.trim().is_empty())
    }

    /// Runtime endpoint, derived from the region unless set explicitly.
    pub fn resolved_endpoint(&self, region: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://bedrock-agentcore.{region}.amazonaws.com"),
        }
    }
}

impl AwsConfig {
    pub fn credentials(&self) -> Option<AwsCredentials> {
        let access_key_id = self.access_key_id.as_ref()?;
        let secret = self.secret_access_key.as_ref()?;
        Some(AwsCredentials {
            access_key_id: access_key_id.clone(),
            secret_access_key: secret.clone(),
            session_token: self.session_token.clone(),
        })
    }
}

impl StorageConfig {
    pub fn resolved_endpoint(&self, region: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://s3.{region}.amazonaws.com"),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("billburn.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(enabled) = database.enabled {
                self.database.enabled = enabled;
            }
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(runtime_arn) = agent.runtime_arn {
                self.agent.runtime_arn = Some(runtime_arn);
            }
            if let Some(endpoint) = agent.endpoint {
                self.agent.endpoint = Some(endpoint);
            }
            if let Some(qualifier) = agent.qualifier {
                self.agent.qualifier = qualifier;
            }
            if let Some(bearer_token_value) = agent.bearer_token {
                self.agent.bearer_token = Some(secret_value(bearer_token_value));
            }
            if let Some(model_id) = agent.model_id {
                self.agent.model_id = Some(model_id);
            }
            if let Some(timeout_secs) = agent.timeout_secs {
                self.agent.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = agent.max_retries {
                self.agent.max_retries = max_retries;
            }
            if let Some(retry_base_ms) = agent.retry_base_ms {
                self.agent.retry_base_ms = retry_base_ms;
            }
        }

        if let Some(aws) = patch.aws {
            if let Some(region) = aws.region {
                self.aws.region = region;
            }
            if let Some(access_key_id) = aws.access_key_id {
                self.aws.access_key_id = Some(access_key_id);
            }
            if let Some(secret_access_key_value) = aws.secret_access_key {
                self.aws.secret_access_key = Some(secret_value(secret_access_key_value));
            }
            if let Some(session_token_value) = aws.session_token {
                self.aws.session_token = Some(secret_value(session_token_value));
            }
        }

        if let Some(storage) = patch.storage {
            if let Some(enabled) = storage.enabled {
                self.storage.enabled = enabled;
            }
            if let Some(backend) = storage.backend {
                self.storage.backend = backend;
            }
            if let Some(bucket) = storage.bucket {
                self.storage.bucket = bucket;
            }
            if let Some(endpoint) = storage.endpoint {
                self.storage.endpoint = Some(endpoint);
            }
            if let Some(path_style) = storage.path_style {
                self.storage.path_style = path_style;
            }
            if let Some(local_dir) = storage.local_dir {
                self.storage.local_dir = local_dir;
            }
            if let Some(expiration_secs) = storage.expiration_secs {
                self.storage.expiration_secs = expiration_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("BILLBURN_DATABASE_ENABLED") {
            self.database.enabled = parse_bool("BILLBURN_DATABASE_ENABLED", &value)?;
        }
        if let Some(value) = read_env("BILLBURN_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("BILLBURN_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("BILLBURN_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("BILLBURN_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("BILLBURN_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let runtime_arn = read_env("BILLBURN_AGENT_RUNTIME_ARN")
            .or_else(|| read_env("AGENTCORE_AGENT_RUNTIME_ARN"));
        if let Some(value) = runtime_arn {
            self.agent.runtime_arn = Some(value);
        }
        if let Some(value) = read_env("BILLBURN_AGENT_ENDPOINT") {
            self.agent.endpoint = Some(value);
        }
        if let Some(value) = read_env("BILLBURN_AGENT_QUALIFIER") {
            self.agent.qualifier = value;
        }
        if let Some(value) = read_env("BILLBURN_AGENT_BEARER_TOKEN") {
            self.agent.bearer_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("BILLBURN_AGENT_MODEL_ID") {
            self.agent.model_id = Some(value);
        }
        if let Some(value) = read_env("BILLBURN_AGENT_TIMEOUT_SECS") {
            self.agent.timeout_secs = parse_u64("BILLBURN_AGENT_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("BILLBURN_AGENT_MAX_RETRIES") {
            self.agent.max_retries = parse_u32("BILLBURN_AGENT_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("BILLBURN_AGENT_RETRY_BASE_MS") {
            self.agent.retry_base_ms = parse_u64("BILLBURN_AGENT_RETRY_BASE_MS", &value)?;
        }

        let region = read_env("BILLBURN_AWS_REGION").or_else(|| read_env("AWS_REGION"));
        if let Some(value) = region {
            self.aws.region = value;
        }
        let access_key_id =
            read_env("BILLBURN_AWS_ACCESS_KEY_ID").or_else(|| read_env("AWS_ACCESS_KEY_ID"));
        if let Some(value) = access_key_id {
            self.aws.access_key_id = Some(value);
        }
        let secret_access_key = read_env("BILLBURN_AWS_SECRET_ACCESS_KEY")
            .or_else(|| read_env("AWS_SECRET_ACCESS_KEY"));
        if let Some(value) = secret_access_key {
            self.aws.secret_access_key = Some(secret_value(value));
        }
        let session_token =
            read_env("BILLBURN_AWS_SESSION_TOKEN").or_else(|| read_env("AWS_SESSION_TOKEN"));
        if let Some(value) = session_token {
            self.aws.session_token = Some(secret_value(value));
        }

        if let Some(value) = read_env("BILLBURN_STORAGE_ENABLED") {
            self.storage.enabled = parse_bool("BILLBURN_STORAGE_ENABLED", &value)?;
        }
        if let Some(value) = read_env("BILLBURN_STORAGE_BACKEND") {
            self.storage.backend = value.parse()?;
        }
        let bucket = read_env("BILLBURN_STORAGE_BUCKET").or_else(|| read_env("BILL_PDF_BUCKET"));
        if let Some(value) = bucket {
            self.storage.bucket = value;
        }
        if let Some(value) = read_env("BILLBURN_STORAGE_ENDPOINT") {
            self.storage.endpoint = Some(value);
        }
        if let Some(value) = read_env("BILLBURN_STORAGE_PATH_STYLE") {
            self.storage.path_style = parse_bool("BILLBURN_STORAGE_PATH_STYLE", &value)?;
        }
        if let Some(value) = read_env("BILLBURN_STORAGE_LOCAL_DIR") {
            self.storage.local_dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("BILLBURN_STORAGE_EXPIRATION_SECS") {
            self.storage.expiration_secs =
                parse_u64("BILLBURN_STORAGE_EXPIRATION_SECS", &value)?;
        }

        if let Some(value) = read_env("BILLBURN_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("BILLBURN_SERVER_PORT") {
            self.server.port = parse_u16("BILLBURN_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("BILLBURN_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("BILLBURN_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("BILLBURN_LOGGING_LEVEL").or_else(|| read_env("BILLBURN_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("BILLBURN_LOGGING_FORMAT").or_else(|| read_env("BILLBURN_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(enabled) = overrides.database_enabled {
            self.database.enabled = enabled;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(runtime_arn) = overrides.agent_runtime_arn {
            self.agent.runtime_arn = Some(runtime_arn);
        }
        if let Some(endpoint) = overrides.agent_endpoint {
            self.agent.endpoint = Some(endpoint);
        }
        if let Some(model_id) = overrides.model_id {
            self.agent.model_id = Some(model_id);
        }
        if let Some(backend) = overrides.storage_backend {
            self.storage.backend = backend;
        }
        if let Some(bucket) = overrides.storage_bucket {
            self.storage.bucket = bucket;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_agent(&self.agent)?;
        validate_aws(&self.aws)?;
        validate_storage(&self.storage)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("billburn.toml"), PathBuf::from("config/billburn.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    if !database.enabled {
        return Ok(());
    }

    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.timeout_secs == 0 || agent.timeout_secs > 900 {
        return Err(ConfigError::Validation(
            "agent.timeout_secs must be in range 1..=900".to_string(),
        ));
    }

    if agent.max_retries > 10 {
        return Err(ConfigError::Validation("agent.max_retries must be at most 10".to_string()));
    }

    if let Some(arn) = &agent.runtime_arn {
        if !arn.trim().is_empty() && !arn.starts_with("arn:") {
            return Err(ConfigError::Validation(
                "agent.runtime_arn must be an ARN (`arn:aws:bedrock-agentcore:...`)".to_string(),
            ));
        }
    }

    if let Some(endpoint) = &agent.endpoint {
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ConfigError::Validation(
                "agent.endpoint must start with http:// or https://".to_string(),
            ));
        }
    }

    if agent.qualifier.trim().is_empty() {
        return Err(ConfigError::Validation("agent.qualifier must not be empty".to_string()));
    }

    Ok(())
}

fn validate_aws(aws: &AwsConfig) -> Result<(), ConfigError> {
    if aws.region.trim().is_empty() {
        return Err(ConfigError::Validation("aws.region must not be empty".to_string()));
    }

    let has_secret =
        aws.secret_access_key.as_ref().is_some_and(|value| !value.expose_secret().is_empty());
    if aws.access_key_id.is_some() != has_secret {
        return Err(ConfigError::Validation(
            "aws.access_key_id and aws.secret_access_key must be set together".to_string(),
        ));
    }

    Ok(())
}

fn validate_storage(storage: &StorageConfig) -> Result<(), ConfigError> {
    if !storage.enabled {
        return Ok(());
    }

    if storage.expiration_secs == 0 || storage.expiration_secs > MAX_PRESIGN_SECS {
        return Err(ConfigError::Validation(format!(
            "storage.expiration_secs must be in range 1..={MAX_PRESIGN_SECS}"
        )));
    }

    if storage.backend == StorageBackend::S3 && storage.bucket.trim().is_empty() {
        return Err(ConfigError::Validation(
            "storage.bucket is required for the s3 backend".to_string(),
        ));
    }

    if let Some(endpoint) = &storage.endpoint {
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ConfigError::Validation(
                "storage.endpoint must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    agent: Option<AgentPatch>,
    aws: Option<AwsPatch>,
    storage: Option<StoragePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    enabled: Option<bool>,
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    runtime_arn: Option<String>,
    endpoint: Option<String>,
    qualifier: Option<String>,
    bearer_token: Option<String>,
    model_id: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_base_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AwsPatch {
    region: Option<String>,
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    session_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StoragePatch {
    enabled: Option<bool>,
    backend: Option<StorageBackend>,
    bucket: Option<String>,
    endpoint: Option<String>,
    path_style: Option<bool>,
    local_dir: Option<PathBuf>,
    expiration_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
