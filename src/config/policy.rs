// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rocket-jwt-policy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Settings of the JWT authentication policy
//!
//! Key material is stored as text: HMAC secrets are used as-is, while the PEM
//! keys of asymmetric algorithms are base64 encoded so that they fit on a
//! single YAML line.

use base64::Engine;
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::extractor::{AUTHORIZATION, DEFAULT_SCHEME};
use crate::auth::jwt::{parse_algorithm, Audience, KeyMaterial, KeyType, PolicyError};

/// Policy settings, the `jwt` section of the configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicySettings {
    /// HMAC secret, or base64 encoded PEM private key for asymmetric algorithms
    #[serde(default = "default_private_key")]
    pub private_key: String,

    /// Base64 encoded PEM public key
    ///
    /// Ignored for HMAC algorithms. May be omitted for RSA algorithms, in which
    /// case it is derived from the private key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,

    /// Signing algorithm name, such as `HS512` or `RS256`
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Clock-skew tolerance in seconds
    #[serde(default)]
    pub leeway: u64,

    /// Default token lifetime in seconds; tokens never expire when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<u64>,

    /// Claims added to every issued token
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub default_claims: Map<String, Value>,

    /// Header carrying the token
    #[serde(default = "default_http_header")]
    pub http_header: String,

    /// Scheme expected in the `Authorization` header
    #[serde(default = "default_auth_type")]
    pub auth_type: String,

    /// Audience of issued tokens, also expected from inbound tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<Audience>,
}

/// Secret written to sample configurations, never fit for production
pub const DEFAULT_PRIVATE_KEY: &str = "change-this-secret";

fn default_private_key() -> String {
    DEFAULT_PRIVATE_KEY.to_string()
}

fn default_algorithm() -> String {
    "HS512".to_string()
}

fn default_http_header() -> String {
    AUTHORIZATION.to_string()
}

fn default_auth_type() -> String {
    DEFAULT_SCHEME.to_string()
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            private_key: default_private_key(),
            public_key: None,
            algorithm: default_algorithm(),
            leeway: 0,
            expiration: None,
            default_claims: Map::new(),
            http_header: default_http_header(),
            auth_type: default_auth_type(),
            audience: None,
        }
    }
}

impl PolicySettings {
    /// Parsed signing algorithm
    pub fn algorithm(&self) -> Result<Algorithm, PolicyError> {
        parse_algorithm(&self.algorithm)
    }

    /// Key material for `algorithm`, decoding base64 PEM keys when needed
    pub fn key_material(&self, algorithm: Algorithm) -> Result<KeyMaterial, PolicyError> {
        if KeyType::for_algorithm(algorithm) == KeyType::Symmetric {
            return Ok(KeyMaterial::secret(&self.private_key));
        }

        let private = decode_pem("private", &self.private_key)?;
        let public = self
            .public_key
            .as_deref()
            .map(|key| decode_pem("public", key))
            .transpose()?;

        Ok(KeyMaterial::Pem { private, public })
    }

    /// Whether an HMAC algorithm is configured with [`DEFAULT_PRIVATE_KEY`]
    pub fn uses_default_secret(&self) -> bool {
        self.private_key == DEFAULT_PRIVATE_KEY
            && self
                .algorithm()
                .is_ok_and(|algorithm| KeyType::for_algorithm(algorithm) == KeyType::Symmetric)
    }
}

fn decode_pem(which: &str, encoded: &str) -> Result<Vec<u8>, PolicyError> {
    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| PolicyError::InvalidKey(format!("{} key is not valid base64: {}", which, e)))
}
