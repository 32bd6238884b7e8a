//! HTTP transport, error types, and shared context for the CLI.
//!
//! Every command performs exactly one call through [`Transport`]. The transport
//! returns either a decoded JSON value or a [`TransportError`]; network, TLS and
//! HTTP status failures are all normalised into that one type.

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use reqwest::{Certificate, Client, Method, StatusCode, Url};
use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::cli::OutputFormat;
use crate::settings::{Settings, SettingsError};

/// Field mapping sent as the JSON request body.
pub(crate) type Fields = Map<String, Value>;

/// Convenience alias for transport results.
pub(crate) type TransportResult<T> = Result<T, TransportError>;

const EXIT_FAILURE: i32 = 1;

/// Failure while talking to the lookup API.
#[derive(Debug, Error)]
pub(crate) enum TransportError {
    #[error("invalid API URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("admin token contains characters that cannot be sent in an HTTP header")]
    InvalidToken,
    #[error("failed to load CA bundle '{}': {detail}", .path.display())]
    CaBundle { path: PathBuf, detail: String },
    #[error("failed to build HTTP client: {detail}")]
    ClientBuild { detail: String },
    #[error("failed to encode request body: {source}")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
    #[error("request fields must form a JSON object")]
    FieldsNotObject,
    /// Network and TLS failures (DNS, refused connection, timeout, certificate validation).
    #[error("{method} {url} failed: {detail}")]
    Request {
        method: Method,
        url: String,
        detail: String,
    },
    #[error("failed to read response from {url}: {detail}")]
    Body { url: String, detail: String },
    /// The server answered with status >= 400 and a message.
    #[error("{message}")]
    Api { status: StatusCode, message: String },
    /// The server answered with status >= 400 but the body carried no message.
    #[error("malformed error response (status {status})")]
    MalformedErrorResponse { status: StatusCode },
}

/// Authenticated client for the lookup API, configured once per invocation.
#[derive(Clone, Debug)]
pub(crate) struct Transport {
    client: Client,
    base_url: String,
    authorization: Option<HeaderValue>,
}

impl Transport {
    /// Build the transport from the resolved settings.
    pub(crate) fn new(settings: &Settings) -> TransportResult<Self> {
        Self::build(
            &settings.api_url,
            settings.admin_token.as_deref(),
            settings.cafile.as_deref(),
        )
    }

    /// Build a transport for `base_url`, optionally authenticated and pinned to a CA bundle.
    pub(crate) fn build(
        base_url: &str,
        token: Option<&str>,
        cafile: Option<&Path>,
    ) -> TransportResult<Self> {
        let base_url = normalize_base_url(base_url)?;
        let authorization = token
            .filter(|value| !value.is_empty())
            .map(bearer_header)
            .transpose()?;

        let mut builder = Client::builder();
        if let Some(path) = cafile {
            builder = builder.tls_built_in_root_certs(false);
            for certificate in load_ca_bundle(path)? {
                builder = builder.add_root_certificate(certificate);
            }
        }
        let client = builder
            .build()
            .map_err(|err| TransportError::ClientBuild {
                detail: error_chain(&err),
            })?;

        Ok(Self {
            client,
            base_url,
            authorization,
        })
    }

    pub(crate) async fn get(&self, path: &str, query: &Fields) -> TransportResult<Value> {
        self.send(Method::GET, path, query).await
    }

    pub(crate) async fn post(&self, path: &str, fields: &Fields) -> TransportResult<Value> {
        self.send(Method::POST, path, fields).await
    }

    pub(crate) async fn delete(&self, path: &str, query: &Fields) -> TransportResult<Value> {
        self.send(Method::DELETE, path, query).await
    }

    fn resource_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    // Fields travel as a JSON body for every method, GET included; the server
    // reads them from there.
    async fn send(&self, method: Method, path: &str, fields: &Fields) -> TransportResult<Value> {
        let url = self.resource_url(path);
        let mut request = self.client.request(method.clone(), url.as_str());

        if let Some(authorization) = &self.authorization {
            request = request.header(AUTHORIZATION, authorization.clone());
        }

        if !fields.is_empty() {
            let body =
                serde_json::to_vec(fields).map_err(|source| TransportError::Encode { source })?;
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        tracing::debug!(%method, %url, "sending request");
        let response = request.send().await.map_err(|err| {
            tracing::debug!(%method, %url, error = %err, "request failed");
            TransportError::Request {
                method,
                url: url.clone(),
                detail: error_chain(&err),
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|err| TransportError::Body {
            url: url.clone(),
            detail: error_chain(&err),
        })?;
        tracing::debug!(%url, %status, bytes = text.len(), "received response");

        let body = decode_body(&text);
        if status.as_u16() >= 400 {
            return Err(error_from_body(status, &body));
        }
        Ok(body)
    }
}

/// Convert a request DTO into the field mapping accepted by [`Transport`].
pub(crate) fn fields_of<T: Serialize>(value: &T) -> TransportResult<Fields> {
    match serde_json::to_value(value) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(TransportError::FieldsNotObject),
        Err(source) => Err(TransportError::Encode { source }),
    }
}

/// Decode a response body, wrapping non-JSON payloads as `{"message": <text>}`.
///
/// The server's authentication layer answers with plain text, so any payload
/// that is not JSON is treated as a message.
pub(crate) fn decode_body(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "message": text }))
}

fn error_from_body(status: StatusCode, body: &Value) -> TransportError {
    match body.get("message") {
        Some(Value::String(message)) => TransportError::Api {
            status,
            message: message.clone(),
        },
        Some(Value::Null) | None => TransportError::MalformedErrorResponse { status },
        Some(other) => TransportError::Api {
            status,
            message: other.to_string(),
        },
    }
}

fn normalize_base_url(input: &str) -> TransportResult<String> {
    let trimmed = input.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed).map_err(|err| TransportError::InvalidUrl {
        url: input.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(TransportError::InvalidUrl {
            url: input.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    Ok(trimmed.to_string())
}

fn bearer_header(token: &str) -> TransportResult<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("bearer {token}"))
        .map_err(|_| TransportError::InvalidToken)?;
    value.set_sensitive(true);
    Ok(value)
}

fn load_ca_bundle(path: &Path) -> TransportResult<Vec<Certificate>> {
    let ca_error = |detail: String| TransportError::CaBundle {
        path: path.to_path_buf(),
        detail,
    };
    let pem = fs::read(path).map_err(|err| ca_error(err.to_string()))?;
    let certificates = Certificate::from_pem_bundle(&pem).map_err(|err| ca_error(error_chain(&err)))?;
    if certificates.is_empty() {
        return Err(ca_error("no PEM certificates found".to_string()));
    }
    Ok(certificates)
}

/// Render an error and its sources as a single line.
pub(crate) fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = inner.source();
    }
    message
}

/// CLI-level error type separating the failure categories callers report on.
#[derive(Debug)]
pub(crate) enum CliError {
    /// Response did not have the expected shape.
    Validation(String),
    /// Network, TLS or HTTP failure from the transport.
    Transport(TransportError),
    /// Configuration file could not be used.
    Settings(SettingsError),
    /// Local I/O and other operational failures.
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) | Self::Transport(_) | Self::Settings(_) | Self::Failure(_) => {
                EXIT_FAILURE
            }
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Transport(error) => error.to_string(),
            Self::Settings(error) => error.to_string(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }

    pub(crate) const fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Transport(_) => "transport",
            Self::Settings(_) => "settings",
            Self::Failure(_) => "failure",
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.display_message())
    }
}

impl StdError for CliError {}

impl From<TransportError> for CliError {
    fn from(error: TransportError) -> Self {
        Self::Transport(error)
    }
}

impl From<SettingsError> for CliError {
    fn from(error: SettingsError) -> Self {
        Self::Settings(error)
    }
}

/// Application context passed to command handlers.
pub(crate) struct AppContext {
    pub(crate) transport: Transport,
    pub(crate) known_hosts: PathBuf,
    pub(crate) output: OutputFormat,
}

impl AppContext {
    pub(crate) fn new(settings: &Settings, output: OutputFormat) -> CliResult<Self> {
        Ok(Self {
            transport: Transport::new(settings)?,
            known_hosts: settings.known_hosts.clone(),
            output,
        })
    }
}
