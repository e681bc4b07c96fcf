// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Connection failed to endpoint: {0}")]
    Connection(String),

    #[error("Invalid bundle input: {0}")]
    InvalidBundle(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Relay rejected {method}: {message} (code {code})")]
    Relay {
        method: String,
        message: String,
        code: i64,
    },

    #[error("Inclusion watch timed out after {0:?}")]
    WatchTimeout(Duration),

    #[error("Diagnosis aborted: {0}")]
    Diagnosis(String),

    #[error("Validation failed for field {field}: {message}")]
    Validation { field: String, message: String },

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// True for relay-level rejections, false for every other fault class.
    pub fn is_relay_rejection(&self) -> bool {
        matches!(self, AppError::Relay { .. })
    }

    /// Relay error code, when this is a relay rejection.
    pub fn relay_code(&self) -> Option<i64> {
        match self {
            AppError::Relay { code, .. } => Some(*code),
            _ => None,
        }
    }
}
