// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::constants;
use crate::domain::error::AppError;
use crate::network::chain::NonceTag;
use alloy::signers::local::PrivateKeySigner;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize, Clone)]
pub struct RelaySettings {
    // General
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_false")]
    pub log_json: bool,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    // Endpoints
    #[serde(default = "default_relay_url")]
    pub relay_url: String,
    #[serde(default = "default_blocks_api_url")]
    pub blocks_api_url: String,
    pub http_provider: Option<String>,
    pub ws_provider: Option<String>,

    /// Reputation key used to sign relay request envelopes. Never a
    /// funds-holding key; generated fresh when absent.
    pub relay_auth_key: Option<String>,

    // Behavior
    #[serde(default = "default_nonce_tag")]
    pub nonce_tag: String,
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
    #[serde(default = "default_relay_timeout_ms")]
    pub relay_timeout_ms: u64,
    #[serde(default = "default_rate_limit_retries")]
    pub rate_limit_retries: u32,
    #[serde(default = "default_blocks_cache_capacity")]
    pub blocks_cache_capacity: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_false() -> bool {
    false
}
fn default_chain_id() -> u64 {
    constants::CHAIN_ETHEREUM
}
fn default_relay_url() -> String {
    constants::DEFAULT_RELAY_URL.to_string()
}
fn default_blocks_api_url() -> String {
    constants::DEFAULT_BLOCKS_API_URL.to_string()
}
fn default_nonce_tag() -> String {
    "latest".to_string()
}
fn default_wait_timeout_ms() -> u64 {
    constants::DEFAULT_WAIT_TIMEOUT_MS
}
fn default_relay_timeout_ms() -> u64 {
    constants::DEFAULT_RELAY_TIMEOUT_MS
}
fn default_rate_limit_retries() -> u32 {
    constants::DEFAULT_RATE_LIMIT_RETRIES
}
fn default_blocks_cache_capacity() -> usize {
    32
}

impl RelaySettings {
    pub fn load_with_path(path: Option<&str>) -> Result<Self, AppError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let mut builder = Config::builder();
        if let Some(selected_path) = path {
            builder = builder.add_source(File::from(Path::new(selected_path)).required(true));
        } else {
            builder = builder.add_source(File::with_name("config").required(false));
        }
        // Deterministic precedence: env/.env > selected profile file.
        builder = builder.add_source(Environment::default());

        let settings: RelaySettings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load() -> Result<Self, AppError> {
        Self::load_with_path(None)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        for (field, value) in [
            ("relay_url", &self.relay_url),
            ("blocks_api_url", &self.blocks_api_url),
        ] {
            Url::parse(value).map_err(|e| AppError::Validation {
                field: field.to_string(),
                message: format!("{value}: {e}"),
            })?;
        }
        self.parsed_nonce_tag()?;
        if self.relay_timeout_ms == 0 {
            return Err(AppError::Validation {
                field: "relay_timeout_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if let Some(key) = &self.relay_auth_key {
            PrivateKeySigner::from_str(key).map_err(|e| AppError::Validation {
                field: "relay_auth_key".to_string(),
                message: format!("not a valid private key: {e}"),
            })?;
        }
        Ok(())
    }

    pub fn parsed_nonce_tag(&self) -> Result<NonceTag, AppError> {
        NonceTag::from_str(&self.nonce_tag)
    }

    /// Envelope-signing identity: the configured key, or a throwaway one.
    pub fn auth_signer(&self) -> Result<PrivateKeySigner, AppError> {
        match &self.relay_auth_key {
            Some(key) => PrivateKeySigner::from_str(key)
                .map_err(|e| AppError::Config(format!("Invalid relay auth key: {e}"))),
            None => Ok(PrivateKeySigner::random()),
        }
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn relay_timeout(&self) -> Duration {
        Duration::from_millis(self.relay_timeout_ms)
    }
}
