//! Command handlers, one transport call each.

pub(crate) mod servers;
pub(crate) mod tokens;

use pklookup_api_models::ShapeError;

use crate::client::CliError;

pub(crate) const TOKEN_PATH: &str = "token";
pub(crate) const SERVER_PATH: &str = "server";

pub(crate) const INVALID_RESPONSE: &str = "invalid response";
pub(crate) const INVALID_TOKEN_LIST: &str = "invalid token list";
pub(crate) const INVALID_SERVER_LIST: &str = "invalid server list";
pub(crate) const INVALID_SERVER_ID: &str = "invalid server id";

/// Map a shape mismatch to the user-facing validation message.
pub(crate) fn invalid(message: &'static str) -> impl FnOnce(ShapeError) -> CliError {
    move |err| {
        tracing::debug!(error = %err, "{message}");
        CliError::validation(message)
    }
}
