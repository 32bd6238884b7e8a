//! Configuration file loading.
//!
//! The file is INI with a single `[pklookup]` section:
//!
//! ```ini
//! [pklookup]
//! url = https://lookup.example.com
//! admin_token = ...
//! cafile = ~/ca.pem
//! known_hosts = ~/.ssh/known_hosts
//! ```

use std::borrow::Cow;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use config::{Config, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;

/// Config file consulted when `--config-file` is not given.
pub(crate) const DEFAULT_CONFIG_FILE: &str = "~/.pklookup.ini";
/// Known-hosts file used when the config does not name one.
pub(crate) const DEFAULT_KNOWN_HOSTS: &str = "~/known_hosts";
const API_PREFIX: &str = "api/v1";

/// Errors raised while resolving [`Settings`].
#[derive(Debug, Error)]
pub(crate) enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: config::ConfigError,
    },
    #[error("no 'url' in {path}")]
    MissingUrl { path: String },
    #[error("cannot expand path '{value}': {reason}")]
    Expand { value: String, reason: String },
    #[error("failed to read admin token: {source}")]
    Prompt {
        #[source]
        source: io::Error,
    },
    #[error("no 'admin_token' in {path} and no terminal to prompt on")]
    TokenRequired { path: String },
    #[error("admin token cannot be empty")]
    EmptyToken,
}

/// Resolved configuration, built once at startup and passed by reference.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    /// Versioned API root, without a trailing slash.
    pub(crate) api_url: String,
    /// Bearer token for the `authorization` header.
    pub(crate) admin_token: Option<String>,
    /// CA bundle replacing the built-in trust roots.
    pub(crate) cafile: Option<PathBuf>,
    /// File `server save-key` appends to.
    pub(crate) known_hosts: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    pklookup: RawSection,
}

#[derive(Debug, Default, Deserialize)]
struct RawSection {
    url: Option<String>,
    admin_token: Option<String>,
    cafile: Option<String>,
    known_hosts: Option<String>,
}

impl Settings {
    /// Read the config file at `config_file` (`~` is expanded).
    ///
    /// A missing file is treated like an empty one, which then fails on the
    /// absent `url`.
    pub(crate) fn load(config_file: &str) -> Result<Self, SettingsError> {
        let path = expand(config_file)?;
        let raw = Config::builder()
            .add_source(File::new(&path, FileFormat::Ini).required(false))
            .build()
            .and_then(|config| config.try_deserialize::<RawConfig>())
            .map_err(|source| SettingsError::Load {
                path: config_file.to_string(),
                source,
            })?
            .pklookup;

        let url = non_empty(raw.url).ok_or_else(|| SettingsError::MissingUrl {
            path: config_file.to_string(),
        })?;
        let known_hosts = non_empty(raw.known_hosts);
        let known_hosts = expand(known_hosts.as_deref().unwrap_or(DEFAULT_KNOWN_HOSTS))?;
        let cafile = non_empty(raw.cafile)
            .map(|value| expand(&value).map(PathBuf::from))
            .transpose()?;

        tracing::debug!(config = %path, %url, "loaded settings");
        Ok(Self {
            api_url: format!("{}/{API_PREFIX}", url.trim_end_matches('/')),
            admin_token: non_empty(raw.admin_token),
            cafile,
            known_hosts: PathBuf::from(known_hosts),
        })
    }

    /// Prompt for the admin token when the config file did not provide one.
    pub(crate) fn with_prompted_token(mut self, config_file: &str) -> Result<Self, SettingsError> {
        if self.admin_token.is_none() {
            self.admin_token = Some(prompt_admin_token(config_file)?);
        }
        Ok(self)
    }
}

fn prompt_admin_token(config_file: &str) -> Result<String, SettingsError> {
    if !io::stdin().is_terminal() {
        return Err(SettingsError::TokenRequired {
            path: config_file.to_string(),
        });
    }

    let token = rpassword::prompt_password("Admin token: ")
        .map_err(|source| SettingsError::Prompt { source })?;
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Err(SettingsError::EmptyToken);
    }
    Ok(trimmed.to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn expand(value: &str) -> Result<String, SettingsError> {
    shellexpand::full(value)
        .map(Cow::into_owned)
        .map_err(|err| SettingsError::Expand {
            value: value.to_string(),
            reason: err.to_string(),
        })
}
