// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rocket-jwt-policy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the JWT authentication policy
//!
//! The configuration is backed by a YAML file and validated against an
//! embedded JSON schema before being deserialized. Its only section, `jwt`,
//! holds the [`PolicySettings`] of the policy.
//!
//! The same [`PolicySettings`] can be read from Rocket's figment instead (the
//! `jwt` key of `Rocket.toml` or `ROCKET_JWT_*` variables), see
//! [`JwtPolicyFairing`](crate::auth::JwtPolicyFairing).
//!
//! ## Usage
//!
//! ```no_run
//! use rocket_jwt_policy::auth::JwtAuthenticationPolicy;
//! use rocket_jwt_policy::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let config = Config::from_file(Path::new("config.yaml")).unwrap();
//! let policy = JwtAuthenticationPolicy::from_settings(&config.jwt).unwrap();
//! ```

pub mod policy;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

pub use policy::PolicySettings;
pub use utils::{output_config_schema, validate_specific_rules};

/// JSON schema the configuration file is validated against
pub(crate) const CONFIG_SCHEMA: &str = include_str!("../../resources/config.schema.json");

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Settings of the JWT authentication policy.
    ///
    /// If not specified in the configuration file, default values are used.
    #[serde(default)]
    pub jwt: PolicySettings,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Original path: {:?}, Sample path: {:?}", path, sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.exists() {
                debug!("Creating parent directory: {:?}", parent);
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with default values. A file that fails
    /// validation leaves a `<name>.sample.yaml` file with default values next
    /// to it and returns an error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                "No policy configuration at {:?}, writing one with the default secret",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Reading policy configuration {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Cannot read policy configuration {:?}", path))?;

        if let Err(err) = Self::check_schema(&contents) {
            error!("Policy configuration {:?} does not match the schema", path);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        let config: Config = match serde_yml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                error!("Policy configuration {:?} cannot be deserialized: {}", path, err);
                if let Err(e) = Self::create_sample_config(path) {
                    error!("No sample configuration written: {}", e);
                }
                return Err(err)
                    .with_context(|| format!("Invalid policy configuration {:?}", path));
            }
        };

        if let Err(err) = validate_specific_rules(&config) {
            error!("Policy configuration {:?} rejected: {}", path, err);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        if config.jwt.uses_default_secret() {
            warn!(
                "Policy configuration {:?} keeps the default secret, tokens can be forged",
                path
            );
        }

        Ok(config)
    }

    /// Validate a YAML document against [`CONFIG_SCHEMA`]
    fn check_schema(contents: &str) -> Result<()> {
        let yaml: serde_yml::Value =
            serde_yml::from_str(contents).context("Policy configuration is not valid YAML")?;
        let document = serde_json::to_value(&yaml)
            .context("Policy configuration cannot be represented as JSON")?;

        let schema: serde_json::Value =
            serde_json::from_str(CONFIG_SCHEMA).context("Embedded schema is not valid JSON")?;
        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        validator
            .validate(&document)
            .map_err(|error| anyhow::anyhow!("Schema validation failed: {}", error))
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }
}
