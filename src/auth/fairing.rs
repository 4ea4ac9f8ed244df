// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rocket-jwt-policy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Registration of the policy with a Rocket instance

use rocket::fairing::{self, Fairing, Info, Kind};
use rocket::{Build, Request, Rocket};
use std::sync::Arc;

use super::jwt::ClaimEncoder;
use super::policy::{GroupFinder, JwtAuthenticationPolicy};
use crate::config::PolicySettings;

/// Figment key holding the [`PolicySettings`]
pub const CONFIG_KEY: &str = "jwt";

enum PolicySource {
    Prebuilt(Arc<JwtAuthenticationPolicy>),
    Figment,
}

/// Ignite fairing placing an `Arc<JwtAuthenticationPolicy>` in managed state
///
/// The policy is either given ready-made, or built from the `jwt` section of
/// Rocket's figment. Ignition fails when the settings are missing or invalid.
pub struct JwtPolicyFairing {
    source: PolicySource,
    callback: Option<GroupFinder>,
    encoder: Option<Arc<dyn ClaimEncoder>>,
}

impl JwtPolicyFairing {
    /// Manage an already built policy
    pub fn from_policy(policy: JwtAuthenticationPolicy) -> Self {
        Self {
            source: PolicySource::Prebuilt(Arc::new(policy)),
            callback: None,
            encoder: None,
        }
    }

    /// Build the policy from the figment key `jwt` at ignition
    pub fn from_figment() -> Self {
        Self {
            source: PolicySource::Figment,
            callback: None,
            encoder: None,
        }
    }

    /// Post-authentication callback of a figment-built policy
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, &Request<'_>) -> Option<Vec<String>> + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Claim encoder of a figment-built policy
    pub fn with_encoder(mut self, encoder: Arc<dyn ClaimEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    fn build_from(&self, settings: &PolicySettings) -> Result<JwtAuthenticationPolicy, String> {
        let mut policy =
            JwtAuthenticationPolicy::from_settings(settings).map_err(|e| e.to_string())?;
        if let Some(callback) = &self.callback {
            policy = policy.with_group_finder(callback.clone());
        }
        if let Some(encoder) = &self.encoder {
            policy = policy.with_encoder(encoder.clone());
        }
        Ok(policy)
    }
}

#[rocket::async_trait]
impl Fairing for JwtPolicyFairing {
    fn info(&self) -> Info {
        Info {
            name: "JWT authentication policy",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> fairing::Result {
        let policy = match &self.source {
            PolicySource::Prebuilt(policy) => {
                if self.callback.is_some() || self.encoder.is_some() {
                    log::warn!("Callback and encoder only apply to figment-built policies");
                }
                policy.clone()
            }
            PolicySource::Figment => {
                let settings = match rocket.figment().extract_inner::<PolicySettings>(CONFIG_KEY)
                {
                    Ok(settings) => settings,
                    Err(e) => {
                        log::error!("Invalid '{}' configuration: {}", CONFIG_KEY, e);
                        return Err(rocket);
                    }
                };
                match self.build_from(&settings) {
                    Ok(policy) => Arc::new(policy),
                    Err(e) => {
                        log::error!("Cannot build JWT authentication policy: {}", e);
                        return Err(rocket);
                    }
                }
            }
        };

        log::debug!("Managing {:?}", policy);
        Ok(rocket.manage(policy))
    }
}
