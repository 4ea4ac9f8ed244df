// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rocket-jwt-policy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Encoding and decoding of signed claims
//!
//! The codec knows nothing about requests: it signs a [`ClaimSet`] into a
//! compact JWT and turns a compact JWT back into [`Claims`], checking the
//! signature, the `exp`/`nbf` window and the audience.
//!
//! Time checks are performed against an explicit `now` rather than the system
//! clock, so that decoding is a pure function of its arguments.
//!
//! # Example
//!
//! ```
//! use chrono::{Duration, Utc};
//! use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
//! use rocket_jwt_policy::auth::jwt::{codec, ClaimSet, NumericDateEncoder};
//!
//! let payload = ClaimSet::new().with("sub", "alice");
//! let token = codec::encode(
//!     &payload,
//!     &EncodingKey::from_secret(b"secret"),
//!     Algorithm::HS256,
//!     &NumericDateEncoder,
//! )
//! .unwrap();
//!
//! let claims = codec::decode(
//!     &token,
//!     &DecodingKey::from_secret(b"secret"),
//!     Algorithm::HS256,
//!     Duration::zero(),
//!     None,
//!     Utc::now(),
//! )
//! .unwrap();
//! assert_eq!(claims.principal(), Some("alice"));
//! ```

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use std::collections::HashSet;

use super::claims::{numeric_date, Audience, ClaimSet, Claims};
use super::encoder::ClaimEncoder;
use super::error::{PolicyError, TokenError};

/// Not-before claim name, checked on decode when present
const NBF: &str = "nbf";

/// Sign `payload` into a compact JWT
///
/// Every value goes through `encoder` first. Reserved claims whose encoded
/// value has the wrong shape are dropped (see [`Claims::from_map`]).
///
/// # Errors
///
/// Only configuration problems fail: a key that does not belong to the
/// algorithm family, or a signing backend error.
pub fn encode(
    payload: &ClaimSet,
    key: &EncodingKey,
    algorithm: Algorithm,
    encoder: &dyn ClaimEncoder,
) -> Result<String, PolicyError> {
    let map: Map<String, Value> = payload
        .iter()
        .map(|(name, value)| (name.clone(), encoder.encode(value)))
        .collect();
    let claims = Claims::from_map(map);

    let header = Header::new(algorithm);
    let token = jsonwebtoken::encode(&header, &claims, key).map_err(|e| {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => {
                PolicyError::KeyAlgorithmMismatch(algorithm)
            }
            _ => PolicyError::from(e),
        }
    })?;

    Ok(token)
}

/// Verify `token` and return its claims
///
/// - The signature must verify with `key` under `algorithm`; a token whose
///   header names another algorithm is rejected.
/// - `exp`, when present, must satisfy `now < exp + leeway`.
/// - `nbf`, when present, must satisfy `nbf <= now + leeway`.
/// - `aud` is compared with `audience` only when both are present.
pub fn decode(
    token: &str,
    key: &DecodingKey,
    algorithm: Algorithm,
    leeway: Duration,
    audience: Option<&Audience>,
    now: DateTime<Utc>,
) -> Result<Claims, TokenError> {
    // Signature and algorithm only; the time and audience checks below follow
    // our own rules.
    let mut validation = Validation::new(algorithm);
    validation.required_spec_claims = HashSet::new();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    let token_data = jsonwebtoken::decode::<Claims>(token, key, &validation)?;
    let claims = token_data.claims;

    let now = now.timestamp();
    let leeway = leeway.num_seconds();

    if let Some(exp) = claims.exp {
        if now >= exp.saturating_add(leeway) {
            return Err(TokenError::Expired);
        }
    }

    if let Some(nbf) = claims.custom.get(NBF) {
        let nbf = numeric_date(nbf)
            .ok_or_else(|| TokenError::Malformed(format!("invalid '{}' claim: {}", NBF, nbf)))?;
        if nbf > now.saturating_add(leeway) {
            return Err(TokenError::NotYetValid);
        }
    }

    if let (Some(expected), Some(actual)) = (audience, claims.aud.as_ref()) {
        if !actual.intersects(expected) {
            return Err(TokenError::AudienceMismatch);
        }
    }

    Ok(claims)
}

/// Split a compact JWT into its three segments
pub fn segments(token: &str) -> Option<(&str, &str, &str)> {
    let mut parts = token.split('.');
    let header = parts.next()?;
    let payload = parts.next()?;
    let signature = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((header, payload, signature))
}
