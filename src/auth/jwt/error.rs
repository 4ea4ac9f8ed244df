// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rocket-jwt-policy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Error types for token validation and policy configuration
//!
//! Two families of errors exist:
//!
//! - [`TokenError`] describes why an inbound token was rejected. It never leaves
//!   the policy boundary: the policy logs it and treats the request as
//!   unauthenticated.
//! - [`PolicyError`] describes configuration problems (bad algorithm, key that
//!   does not fit the algorithm) and signing failures. These are surfaced to the
//!   caller at construction or issuance time.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::Algorithm;
use thiserror::Error;

/// Reasons an inbound token is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The token is not a structurally valid compact JWT, or its payload does
    /// not decode into claims
    #[error("malformed token: {0}")]
    Malformed(String),

    /// The signature does not verify against the configured key and algorithm
    #[error("signature verification failed")]
    InvalidSignature,

    /// The `exp` claim lies in the past, leeway included
    #[error("token has expired")]
    Expired,

    /// The `nbf` claim lies in the future, leeway included
    #[error("token is not valid yet")]
    NotYetValid,

    /// The `aud` claim does not contain the expected audience
    #[error("invalid audience")]
    AudienceMismatch,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                TokenError::InvalidSignature
            }
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::ImmatureSignature => TokenError::NotYetValid,
            ErrorKind::InvalidAudience => TokenError::AudienceMismatch,
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

/// Configuration and issuance errors
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("unsupported JWT algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("algorithm {0:?} requires a public key")]
    MissingPublicKey(Algorithm),

    #[error("key material does not fit algorithm {0:?}")]
    KeyAlgorithmMismatch(Algorithm),

    #[error("failed to sign token: {0}")]
    Signing(String),

    #[error("invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}

impl From<jsonwebtoken::errors::Error> for PolicyError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidKeyFormat
            | ErrorKind::InvalidRsaKey(_)
            | ErrorKind::InvalidEcdsaKey => PolicyError::InvalidKey(err.to_string()),
            ErrorKind::InvalidAlgorithmName => PolicyError::UnsupportedAlgorithm(err.to_string()),
            _ => PolicyError::Signing(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jsonwebtoken_kinds_map_to_token_errors() {
        let expired: TokenError = jsonwebtoken::errors::Error::from(ErrorKind::ExpiredSignature).into();
        assert_eq!(expired, TokenError::Expired);

        let aud: TokenError = jsonwebtoken::errors::Error::from(ErrorKind::InvalidAudience).into();
        assert_eq!(aud, TokenError::AudienceMismatch);

        let sig: TokenError = jsonwebtoken::errors::Error::from(ErrorKind::InvalidSignature).into();
        assert_eq!(sig, TokenError::InvalidSignature);

        let malformed: TokenError = jsonwebtoken::errors::Error::from(ErrorKind::InvalidToken).into();
        assert!(matches!(malformed, TokenError::Malformed(_)));
    }
}
