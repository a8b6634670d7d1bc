//! AWS Signature Version 4 for the two REST surfaces this workspace talks to:
//! header-signed agent runtime calls and query-presigned S3 object URLs.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use thiserror::Error;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Longest lifetime S3 accepts for a presigned URL (7 days).
pub const MAX_PRESIGN_SECS: u64 = 604_800;

#[derive(Clone, Debug)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub session_token: Option<SecretString>,
}

impl AwsCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: SecretString::from(secret_access_key.into()),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: Option<String>) -> Self {
        self.session_token = token.filter(|value| !value.is_empty()).map(SecretString::from);
        self
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SigningError {
    #[error("url `{0}` has no host to sign")]
    MissingHost(String),
    #[error("presign expiry must be in 1..={MAX_PRESIGN_SECS} seconds, got {0}")]
    InvalidExpiry(u64),
    #[error("hmac key rejected")]
    InvalidKey,
}

/// Signing scope for one request.
#[derive(Clone, Copy, Debug)]
pub struct SigningParams<'a> {
    pub credentials: &'a AwsCredentials,
    pub region: &'a str,
    pub service: &'a str,
    pub at: DateTime<Utc>,
}

impl<'a> SigningParams<'a> {
    pub fn now(credentials: &'a AwsCredentials, region: &'a str, service: &'a str) -> Self {
        Self { credentials, region, service, at: Utc::now() }
    }

    fn datestamp(&self) -> String {
        self.at.format("%Y%m%d").to_string()
    }

    fn amz_date(&self) -> String {
        self.at.format("%Y%m%dT%H%M%SZ").to_string()
    }

    fn credential_scope(&self) -> String {
        format!("{}/{}/{}/aws4_request", self.datestamp(), self.region, self.service)
    }

    // S3 signs the path exactly as sent; every other service double-encodes it.
    fn double_encode_path(&self) -> bool {
        self.service != "s3"
    }

    fn signature(&self, canonical_request: &str) -> Result<String, SigningError> {
        let string_to_sign = format!(
            "{ALGORITHM}\n{}\n{}\n{}",
            self.amz_date(),
            self.credential_scope(),
            sha256_hex(canonical_request.as_bytes())
        );

        let secret = format!("AWS4{}", self.credentials.secret_access_key.expose_secret());
        let k_date = hmac_sha256(secret.as_bytes(), self.datestamp().as_bytes())?;
        let k_region = hmac_sha256(&k_date, self.region.as_bytes())?;
        let k_service = hmac_sha256(&k_region, self.service.as_bytes())?;
        let k_signing = hmac_sha256(&k_service, b"aws4_request")?;

        Ok(encode_hex(&hmac_sha256(&k_signing, string_to_sign.as_bytes())?))
    }
}

/// Signs a request with an `Authorization` header.
///
/// `headers` are the caller's own headers to include in the signature. The
/// returned list holds every header that must be sent, sorted by name.
pub fn sign_headers(
    params: &SigningParams<'_>,
    method: &str,
    url: &Url,
    headers: &[(String, String)],
    payload: &[u8],
) -> Result<Vec<(String, String)>, SigningError> {
    let payload_hash = sha256_hex(payload);
    let mut signed: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
        .collect();
    signed.push(("host".to_string(), host_header(url)?));
    signed.push(("x-amz-date".to_string(), params.amz_date()));
    signed.push(("x-amz-content-sha256".to_string(), payload_hash.clone()));
    if let Some(token) = &params.credentials.session_token {
        signed.push(("x-amz-security-token".to_string(), token.expose_secret().to_string()));
    }
    signed.sort_by(|a, b| a.0.cmp(&b.0));

    let signed_headers = signed.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>().join(";");
    let canonical_headers: String =
        signed.iter().map(|(name, value)| format!("{name}:{value}\n")).collect();

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method,
        canonical_uri(url.path(), params.double_encode_path()),
        canonical_query(url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned()))),
        canonical_headers,
        signed_headers,
        payload_hash
    );
    let signature = params.signature(&canonical_request)?;

    signed.push((
        "authorization".to_string(),
        format!(
            "{ALGORITHM} Credential={}/{}, SignedHeaders={}, Signature={}",
            params.credentials.access_key_id,
            params.credential_scope(),
            signed_headers,
            signature
        ),
    ));
    Ok(signed)
}

/// Produces a query-string presigned URL valid for `expires_secs`.
pub fn presign_url(
    params: &SigningParams<'_>,
    method: &str,
    url: &Url,
    expires_secs: u64,
) -> Result<Url, SigningError> {
    if expires_secs == 0 || expires_secs > MAX_PRESIGN_SECS {
        return Err(SigningError::InvalidExpiry(expires_secs));
    }
    let host = host_header(url)?;

    let mut query: Vec<(String, String)> =
        url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
    query.push(("X-Amz-Algorithm".to_string(), ALGORITHM.to_string()));
    query.push((
        "X-Amz-Credential".to_string(),
        format!("{}/{}", params.credentials.access_key_id, params.credential_scope()),
    ));
    query.push(("X-Amz-Date".to_string(), params.amz_date()));
    query.push(("X-Amz-Expires".to_string(), expires_secs.to_string()));
    if let Some(token) = &params.credentials.session_token {
        query.push(("X-Amz-Security-Token".to_string(), token.expose_secret().to_string()));
    }
    query.push(("X-Amz-SignedHeaders".to_string(), "host".to_string()));

    let canonical_query = canonical_query(query);
    let canonical_request = format!(
        "{}\n{}\n{}\nhost:{}\n\nhost\n{}",
        method,
        canonical_uri(url.path(), params.double_encode_path()),
        canonical_query,
        host,
        UNSIGNED_PAYLOAD
    );
    let signature = params.signature(&canonical_request)?;

    let mut presigned = url.clone();
    presigned.set_query(Some(&format!("{canonical_query}&X-Amz-Signature={signature}")));
    Ok(presigned)
}

/// Percent-encodes everything outside the RFC 3986 unreserved set.
pub fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut output = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                output.push(byte as char)
            }
            b'/' if !encode_slash => output.push('/'),
            other => output.push_str(&format!("%{other:02X}")),
        }
    }
    output
}

fn canonical_uri(path: &str, double_encode: bool) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    if !double_encode {
        return path.to_string();
    }
    path.split('/').map(|segment| uri_encode(segment, true)).collect::<Vec<_>>().join("/")
}

fn canonical_query(pairs: impl IntoIterator<Item = (String, String)>) -> String {
    let mut encoded: Vec<(String, String)> = pairs
        .into_iter()
        .map(|(key, value)| (uri_encode(&key, true), uri_encode(&value, true)))
        .collect();
    encoded.sort();
    encoded.iter().map(|(key, value)| format!("{key}={value}")).collect::<Vec<_>>().join("&")
}

fn host_header(url: &Url) -> Result<String, SigningError> {
    let host = url.host_str().ok_or_else(|| SigningError::MissingHost(url.to_string()))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SigningError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SigningError::InvalidKey)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

pub fn sha256_hex(payload: &[u8]) -> String {
    encode_hex(Sha256::digest(payload).as_slice())
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}
