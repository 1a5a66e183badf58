// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for runtara-repository.

use thiserror::Error;

/// Repository errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Deployment was not found.
    #[error("Deployment not found: {0}")]
    DeploymentNotFound(String),

    /// Request validation failed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get the machine-readable error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIGURATION_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Migration(_) => "MIGRATION_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::DeploymentNotFound(_) => "DEPLOYMENT_NOT_FOUND",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Other(_) => "INTERNAL_ERROR",
        }
    }
}

/// Result type using repository Error.
pub type Result<T> = std::result::Result<T, Error>;
