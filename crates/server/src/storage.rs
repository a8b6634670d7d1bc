//! Blob storage for rendered invoices.
//!
//! `S3BlobStore` talks to the S3 REST API directly with SigV4-signed
//! requests; `LocalBlobStore` writes under a directory and hands out
//! `file://` URLs for development.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use billburn_core::config::{AppConfig, StorageBackend};
use billburn_core::sigv4::{self, AwsCredentials, SigningError, SigningParams};
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::invoice::InvoiceArtifact;

const SIGNING_SERVICE: &str = "s3";
const UPLOAD_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage service rejected the request ({code}): {message}")]
    Service { code: String, message: String },
    #[error("storage request failed: {0}")]
    Transport(String),
    #[error("request signing failed: {0}")]
    Signing(#[from] SigningError),
    #[error("storage io failed: {0}")]
    Io(String),
    #[error("storage is not configured: {0}")]
    NotConfigured(String),
}

impl StorageError {
    /// Short machine-readable code, surfaced as `error_code` on uploads.
    pub fn code(&self) -> &str {
        match self {
            Self::Service { code, .. } => code,
            Self::Transport(_) => "TransportError",
            Self::Signing(_) => "SigningError",
            Self::Io(_) => "IoError",
            Self::NotConfigured(_) => "NotConfigured",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Service { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Bucket (or directory label) reported alongside uploads.
    fn bucket(&self) -> &str;

    async fn put(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), StorageError>;

    async fn presigned_url(&self, key: &str, expires_secs: u64) -> Result<String, StorageError>;
}

pub fn from_config(config: &AppConfig) -> Result<Option<Box<dyn BlobStore>>, StorageError> {
    if !config.storage.enabled {
        return Ok(None);
    }
    let store: Box<dyn BlobStore> = match config.storage.backend {
        StorageBackend::S3 => Box::new(S3BlobStore::from_config(config)?),
        StorageBackend::Local => Box::new(LocalBlobStore::new(&config.storage.local_dir)),
    };
    Ok(Some(store))
}

pub struct S3BlobStore {
    client: reqwest::Client,
    endpoint: Url,
    bucket: String,
    region: String,
    credentials: Option<AwsCredentials>,
    path_style: bool,
}

impl S3BlobStore {
    pub fn new(
        endpoint: &str,
        bucket: impl Into<String>,
        region: impl Into<String>,
        credentials: Option<AwsCredentials>,
        path_style: bool,
    ) -> Result<Self, StorageError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|error| {
                StorageError::NotConfigured(format!("endpoint `{endpoint}`: {error}"))
            })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|error| StorageError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            bucket: bucket.into(),
            region: region.into(),
            credentials,
            path_style,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, StorageError> {
        Self::new(
            &config.storage.resolved_endpoint(&config.aws.region),
            config.storage.bucket.clone(),
            config.aws.region.clone(),
            config.aws.credentials(),
            config.storage.path_style,
        )
    }

    pub fn object_url(&self, key: &str) -> Result<Url, StorageError> {
        let encoded_key = sigv4::uri_encode(key, false);
        let mut url = self.endpoint.clone();

        if self.path_style {
            url.set_path(&format!("/{}/{encoded_key}", self.bucket));
        } else {
            let host = url.host_str().ok_or_else(|| {
                StorageError::NotConfigured(format!("endpoint `{}` has no host", self.endpoint))
            })?;
            let virtual_host = format!("{}.{host}", self.bucket);
            url.set_host(Some(&virtual_host))
                .map_err(|error| StorageError::NotConfigured(error.to_string()))?;
            url.set_path(&format!("/{encoded_key}"));
        }
        Ok(url)
    }

    fn credentials(&self) -> Result<&AwsCredentials, StorageError> {
        self.credentials.as_ref().ok_or_else(|| {
            StorageError::NotConfigured("no AWS credentials available for S3".to_string())
        })
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), StorageError> {
        let credentials = self.credentials()?;
        let url = self.object_url(key)?;
        let file_name = key.rsplit('/').next().unwrap_or(key);

        let headers = vec![
            ("content-type".to_string(), content_type.to_string()),
            ("content-disposition".to_string(), format!("inline; filename=\"{file_name}\"")),
            ("x-amz-meta-generated-at".to_string(), Utc::now().to_rfc3339()),
            ("x-amz-meta-content-type".to_string(), "aws_bill_invoice".to_string()),
        ];
        let params = SigningParams::now(credentials, &self.region, SIGNING_SERVICE);
        let signed = sigv4::sign_headers(&params, "PUT", &url, &headers, body)?;

        let mut request = self.client.put(url);
        for (name, value) in &signed {
            if name != "host" {
                request = request.header(name.as_str(), value.as_str());
            }
        }

        let response = request
            .body(body.to_vec())
            .send()
            .await
            .map_err(|error| StorageError::Transport(error.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        Err(service_error(status.as_u16(), &text))
    }

    async fn presigned_url(&self, key: &str, expires_secs: u64) -> Result<String, StorageError> {
        let credentials = self.credentials()?;
        let url = self.object_url(key)?;
        let params = SigningParams::now(credentials, &self.region, SIGNING_SERVICE);
        Ok(sigv4::presign_url(&params, "GET", &url, expires_secs)?.to_string())
    }
}

/// Reads `<Code>` and `<Message>` out of an S3 XML error document.
fn service_error(status: u16, body: &str) -> StorageError {
    let (code, message) = error_document_fields(body);
    StorageError::Service {
        code: code.unwrap_or_else(|| format!("HTTP{status}")),
        message: message.unwrap_or_else(|| format!("storage service answered HTTP {status}")),
    }
}

fn error_document_fields(body: &str) -> (Option<String>, Option<String>) {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut path: Vec<Vec<u8>> = Vec::new();
    let (mut code, mut message) = (None, None);
    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => path.push(element.name().as_ref().to_vec()),
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Text(text)) => {
                let field = match path.as_slice() {
                    [root, leaf] if root.as_slice() == b"Error" => match leaf.as_slice() {
                        b"Code" => &mut code,
                        b"Message" => &mut message,
                        _ => continue,
                    },
                    _ => continue,
                };
                if let Ok(value) = text.unescape() {
                    *field = Some(value.into_owned());
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            Ok(_) => {}
        }
    }
    (code, message)
}

pub struct LocalBlobStore {
    root: PathBuf,
    label: String,
}

impl LocalBlobStore {
    pub fn new(root: &Path) -> Self {
        Self { root: root.to_path_buf(), label: root.display().to_string() }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.split('/').any(|segment| segment.is_empty() || segment == "..") {
            return Err(StorageError::Io(format!("invalid object key `{key}`")));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn bucket(&self) -> &str {
        &self.label
    }

    async fn put(&self, key: &str, body: &[u8], _content_type: &str) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, body).await?;
        Ok(())
    }

    async fn presigned_url(&self, key: &str, _expires_secs: u64) -> Result<String, StorageError> {
        let path = tokio::fs::canonicalize(self.object_path(key)?).await?;
        Url::from_file_path(&path)
            .map(|url| url.to_string())
            .map_err(|()| StorageError::Io(format!("`{}` is not an absolute path", path.display())))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Uploaded,
    Error,
}

/// Outcome of an invoice upload, embedded in the burn-plan response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InvoiceUpload {
    pub upload_status: UploadStatus,
    pub format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub s3_key: String,
    pub bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl InvoiceUpload {
    pub fn failed(
        key: String,
        bucket: String,
        format: &'static str,
        code: &str,
        message: String,
    ) -> Self {
        Self {
            upload_status: UploadStatus::Error,
            format,
            url: None,
            s3_key: key,
            bucket,
            expiration_seconds: None,
            error_code: Some(code.to_string()),
            error_message: Some(message),
        }
    }
}

/// `invoices/{YYYYMMDD_HHMMSS}_{session}_aws_bill.{ext}`; the session id keeps
/// invoices finished in the same second apart.
pub fn invoice_key(extension: &str, at: DateTime<Utc>, session_id: &str) -> String {
    let session: String = session_id
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '-')
        .collect();
    format!("invoices/{}_{session}_aws_bill.{extension}", at.format("%Y%m%d_%H%M%S"))
}

/// Uploads the artifact and presigns a download link. Failures are reported
/// in the returned value, never as an error.
pub async fn upload_invoice(
    store: &dyn BlobStore,
    artifact: &InvoiceArtifact,
    expires_secs: u64,
    session_id: &str,
) -> InvoiceUpload {
    let key = invoice_key(artifact.extension(), Utc::now(), session_id);
    let bucket = store.bucket().to_string();
    let format = artifact.extension();

    let uploaded = async {
        store.put(&key, artifact.as_bytes(), artifact.content_type()).await?;
        store.presigned_url(&key, expires_secs).await
    }
    .await;

    match uploaded {
        Ok(url) => {
            info!(
                event_name = "storage.invoice.uploaded",
                correlation_id = %session_id,
                bucket = %bucket,
                key = %key,
                format,
                "invoice uploaded"
            );
            InvoiceUpload {
                upload_status: UploadStatus::Uploaded,
                format,
                url: Some(url),
                s3_key: key,
                bucket,
                expiration_seconds: Some(expires_secs),
                error_code: None,
                error_message: None,
            }
        }
        Err(error) => {
            warn!(
                event_name = "storage.invoice.failed",
                correlation_id = %session_id,
                bucket = %bucket,
                key = %key,
                error_code = error.code(),
                error = %error,
                "invoice upload failed"
            );
            InvoiceUpload::failed(key, bucket, format, error.code(), error.message())
        }
    }
}
