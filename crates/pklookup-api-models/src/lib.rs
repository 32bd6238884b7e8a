#![forbid(unsafe_code)]
#![warn(
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]
//! Shared HTTP DTOs for the pklookup administrative API.
//!
//! The server returns loosely typed JSON, so every response the CLI consumes is
//! decoded through [`parse_response`] into one of the envelopes below. A payload
//! that lacks a required field, or carries a field of the wrong type, surfaces
//! as a [`ShapeError`] instead of an unchecked lookup.

use std::fmt::{self, Display, Formatter};

use serde::de::{self, DeserializeOwned, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

/// Response payload did not match the expected shape.
#[derive(Debug, Error)]
#[error("unexpected response shape: {source}")]
pub struct ShapeError {
    /// Decoder error describing the first mismatch.
    #[source]
    pub source: serde_json::Error,
}

/// Validate a decoded response body against the expected envelope.
///
/// # Errors
///
/// Returns [`ShapeError`] when the value is not an object of the expected
/// form, a required key is missing, or a field has an unsupported type.
pub fn parse_response<T: DeserializeOwned>(value: Value) -> Result<T, ShapeError> {
    serde_json::from_value(value).map_err(|source| ShapeError { source })
}

/// Scalar field rendered as text.
///
/// Record fields arrive as strings or numbers depending on the server
/// revision; both are accepted. `null` renders as an empty string. Arrays and
/// objects are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scalar(String);

impl Scalar {
    /// Borrow the textual form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Scalar {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ScalarVisitor)
    }
}

struct ScalarVisitor;

impl Visitor<'_> for ScalarVisitor {
    type Value = Scalar;

    fn expecting(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("a string, number, boolean or null")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Scalar, E> {
        Ok(Scalar(value.to_string()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Scalar, E> {
        Ok(Scalar(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Scalar, E> {
        Ok(Scalar(value.to_string()))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Scalar, E> {
        Ok(Scalar(value.to_string()))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Scalar, E> {
        Ok(Scalar(value.to_string()))
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<Scalar, E> {
        Ok(Scalar(value.to_string()))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Scalar, E> {
        Ok(Scalar::default())
    }
}

/// Role granted to an API token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenRole {
    /// Full administrative access.
    Admin,
    /// May only register its own server key.
    Server,
}

impl TokenRole {
    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Server => "server",
        }
    }
}

/// Request body for `POST /token`.
#[derive(Debug, Clone, Serialize)]
pub struct TokenCreateRequest {
    /// Role to grant.
    pub role: TokenRole,
    /// Free-form note stored with the token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Request body for `POST /server`.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCreateRequest {
    /// OpenSSH formatted public key (`<type> <data> [comment]`).
    pub public_key: String,
}

/// Record selector used by `GET` and `DELETE` requests.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RecordIdQuery {
    /// Record identifier.
    pub id: i64,
}

/// Token as listed by `GET /token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Token identifier.
    pub id: Scalar,
    /// Granted role.
    pub role: Scalar,
    /// Free-form note.
    pub description: Scalar,
    /// Creation timestamp.
    pub created: Scalar,
}

impl TokenRecord {
    /// Column names in display order.
    pub const COLUMNS: [&'static str; 4] = ["id", "role", "description", "created"];

    /// Field values in [`Self::COLUMNS`] order.
    #[must_use]
    pub fn row(&self) -> Vec<&str> {
        vec![
            self.id.as_str(),
            self.role.as_str(),
            self.description.as_str(),
            self.created.as_str(),
        ]
    }
}

/// Envelope returned by `GET /token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenListResponse {
    /// Registered tokens.
    pub tokens: Vec<TokenRecord>,
}

/// Envelope returned by `POST /token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCreatedResponse {
    /// Newly issued bearer token.
    pub token: Scalar,
}

/// Registered server as listed by `GET /server`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    /// Server identifier.
    pub id: Scalar,
    /// Token the server registered with.
    pub token_id: Scalar,
    /// Address the key was registered from.
    pub ip: Scalar,
    /// Source port of the registration.
    pub port: Scalar,
    /// Key algorithm, e.g. `ssh-ed25519`.
    pub key_type: Scalar,
    /// Base64 key material.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_data: Option<Scalar>,
    /// Trailing key comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_comment: Option<Scalar>,
    /// Combined `<type> <data>` form used by older server revisions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<Scalar>,
    /// Creation timestamp.
    pub created: Scalar,
}

impl ServerRecord {
    /// Column names in display order.
    pub const COLUMNS: [&'static str; 8] = [
        "id",
        "token_id",
        "ip",
        "port",
        "key_type",
        "key_data",
        "key_comment",
        "created",
    ];

    /// Field values in [`Self::COLUMNS`] order.
    #[must_use]
    pub fn row(&self) -> Vec<&str> {
        let key_data = self
            .key_data
            .as_ref()
            .or(self.public_key.as_ref())
            .map_or("", Scalar::as_str);
        vec![
            self.id.as_str(),
            self.token_id.as_str(),
            self.ip.as_str(),
            self.port.as_str(),
            self.key_type.as_str(),
            key_data,
            self.key_comment.as_ref().map_or("", Scalar::as_str),
            self.created.as_str(),
        ]
    }

    /// Line to append to a known-hosts file, or `None` when the record
    /// carries no key material.
    #[must_use]
    pub fn known_hosts_entry(&self) -> Option<String> {
        if let Some(data) = &self.key_data {
            return Some(format!("{} {} {}", self.ip, self.key_type, data));
        }
        self.public_key
            .as_ref()
            .map(|public_key| format!("{} {}", self.ip, public_key))
    }
}

/// Envelope returned by `GET /server`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerListResponse {
    /// Registered servers.
    pub servers: Vec<ServerRecord>,
}

/// Confirmation envelope returned by create/delete endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Human-readable confirmation.
    pub message: Scalar,
}
