// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rocket-jwt-policy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use anyhow::{Context, Result};
use base64::Engine;
use log::debug;

use super::{Config, CONFIG_SCHEMA};
use crate::auth::jwt::{parse_algorithm, KeyType};

/// Output the embedded JSON schema to stdout, formatted for readability
pub fn output_config_schema() -> Result<()> {
    println!("{}", config_schema()?);
    Ok(())
}

/// The embedded JSON schema, pretty-printed
pub fn config_schema() -> Result<String> {
    let schema: serde_json::Value =
        serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;
    serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")
}

/// Validates the configuration against additional rules that aren't covered by the JSON schema.
///
/// # Validation Rules
///
/// - **Algorithm**: the algorithm name is one `jsonwebtoken` supports
/// - **Private key**: present for every algorithm
/// - **Base64 Encoding**: asymmetric private and public keys decode as base64
/// - **Public key**: present for EC and EdDSA algorithms, RSA public keys
///   being derivable from the private key
/// - **Header contract**: the header name is not empty and the scheme holds
///   no whitespace
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");
    let jwt = &config.jwt;

    let algorithm = parse_algorithm(&jwt.algorithm)
        .with_context(|| format!("Invalid JWT algorithm: {}", jwt.algorithm))?;

    if jwt.private_key.is_empty() {
        anyhow::bail!("JWT private key is empty");
    }

    let key_type = KeyType::for_algorithm(algorithm);
    if key_type != KeyType::Symmetric {
        let _ = base64::engine::general_purpose::STANDARD
            .decode(jwt.private_key.trim())
            .context("JWT private key is not valid base64")?;

        match &jwt.public_key {
            Some(public_key) => {
                let _ = base64::engine::general_purpose::STANDARD
                    .decode(public_key.trim())
                    .context("JWT public key is not valid base64")?;
            }
            None if key_type != KeyType::Rsa => {
                anyhow::bail!("Algorithm {} requires a public key", jwt.algorithm);
            }
            None => debug!("RSA public key will be derived from the private key"),
        }
    } else if jwt.public_key.is_some() {
        debug!("Public key ignored for HMAC algorithm {}", jwt.algorithm);
    }

    if jwt.http_header.trim().is_empty() {
        anyhow::bail!("JWT header name is empty");
    }

    if jwt.auth_type.is_empty() || jwt.auth_type.contains(char::is_whitespace) {
        anyhow::bail!("Invalid authorization scheme: {:?}", jwt.auth_type);
    }

    Ok(())
}
