// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Harambee donation bot.

use thiserror::Error;

/// The primary error type used across all Harambee adapter traits and services.
#[derive(Debug, Error)]
pub enum HarambeeError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Every pooled connection is checked out; acquisition does not queue.
    #[error("connection pool exhausted ({size} connections in use)")]
    PoolExhausted { size: usize },

    /// Storage backend errors (connection failure, constraint, query failure).
    ///
    /// The underlying SQLite error is boxed so callers never match on it.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A payment with this internal reference already exists.
    #[error("duplicate payment reference: {0}")]
    DuplicateReference(String),

    /// A payment status outside the allowed set was supplied.
    #[error("invalid payment status: {0}")]
    InvalidStatus(String),

    /// Input failed validation before reaching storage or the gateway.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A verification task is already registered for this reference.
    #[error("verification already running for {0}")]
    DuplicateVerification(String),

    /// No verification task is registered for this reference.
    #[error("no active verification for {0}")]
    VerificationNotFound(String),

    /// The payment gateway could not be reached or answered unusably.
    #[error("payment gateway unavailable: {message}")]
    Gateway {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A completed payment's amount falls outside every configured tier.
    #[error("no reward tier matches amount {amount}")]
    NoTierMatch { amount: i64 },

    /// Outbound notification delivery failed.
    #[error("notification error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Schema bootstrap failed after bounded retries. Fatal at startup.
    #[error("schema initialization failed after {attempts} attempts: {source}")]
    SchemaInit {
        attempts: u32,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The verification engine is shutting down and rejects new work.
    #[error("verification engine is shutting down")]
    ShuttingDown,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HarambeeError {
    /// Wraps any storage-layer fault.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            source: Box::new(err),
        }
    }

    /// Builds a gateway error without an underlying cause.
    pub fn gateway(message: impl Into<String>) -> Self {
        Self::Gateway {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true for errors that leave the system usable and may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::PoolExhausted { .. } | Self::Gateway { .. } | Self::Channel { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_variants_render_their_subject() {
        let dup = HarambeeError::DuplicateReference("DON-1".into());
        assert!(dup.to_string().contains("DON-1"));

        let pool = HarambeeError::PoolExhausted { size: 5 };
        assert!(pool.to_string().contains('5'));

        let tier = HarambeeError::NoTierMatch { amount: 7 };
        assert_eq!(tier.to_string(), "no reward tier matches amount 7");

        let schema = HarambeeError::SchemaInit {
            attempts: 3,
            source: Box::new(std::io::Error::other("locked")),
        };
        assert!(schema.to_string().contains("3 attempts"));
    }

    #[test]
    fn transient_classification() {
        assert!(HarambeeError::PoolExhausted { size: 1 }.is_transient());
        assert!(HarambeeError::gateway("timeout").is_transient());
        assert!(!HarambeeError::InvalidStatus("paid".into()).is_transient());
        assert!(!HarambeeError::storage(std::io::Error::other("x")).is_transient());
    }
}
