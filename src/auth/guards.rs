// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rocket-jwt-policy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Request guards exposing the managed policy to route handlers
//!
//! All guards look up the `Arc<JwtAuthenticationPolicy>` placed in managed
//! state by [`JwtPolicyFairing`](super::JwtPolicyFairing) and fail with
//! `500 Internal Server Error` when it is missing.
//!
//! ```no_run
//! use rocket::{get, routes, Build, Rocket};
//! use rocket_jwt_policy::auth::{AuthenticatedPrincipal, JwtClaims, JwtPolicyFairing};
//!
//! #[get("/whoami")]
//! fn whoami(principal: AuthenticatedPrincipal) -> String {
//!     principal.0
//! }
//!
//! #[get("/claims")]
//! fn claims(claims: JwtClaims<'_>) -> String {
//!     format!("{:?}", claims.get("role"))
//! }
//!
//! fn build() -> Rocket<Build> {
//!     rocket::build()
//!         .attach(JwtPolicyFairing::from_figment())
//!         .mount("/", routes![whoami, claims])
//! }
//! # fn main() { let _ = build(); }
//! ```

use chrono::Duration;
use rocket::http::Status;
use rocket::request::{self, FromRequest, Request};
use std::ops::Deref;
use std::sync::Arc;
use thiserror::Error;

use super::jwt::{Audience, ClaimSet, Claims, PolicyError};
use super::policy::{AuthenticationPolicy, JwtAuthenticationPolicy};

/// Error type for authentication failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No policy is managed by the Rocket instance
    #[error("JWT authentication policy is not configured")]
    PolicyMissing,
    /// The request carries no valid token, or the callback refused its
    /// principal
    #[error("request is not authenticated")]
    Unauthenticated,
}

/// The policy managed by the Rocket instance serving `request`
pub fn managed_policy<'r>(
    request: &'r Request<'_>,
) -> Result<&'r Arc<JwtAuthenticationPolicy>, AuthError> {
    request
        .rocket()
        .state::<Arc<JwtAuthenticationPolicy>>()
        .ok_or_else(|| {
            log::error!("No JWT authentication policy in managed state, attach JwtPolicyFairing");
            AuthError::PolicyMissing
        })
}

/// Claims of the request token, empty when the request is unauthenticated
#[derive(Debug, Clone, Copy)]
pub struct JwtClaims<'r>(pub &'r Claims);

impl Deref for JwtClaims<'_> {
    type Target = Claims;

    fn deref(&self) -> &Claims {
        self.0
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for JwtClaims<'r> {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match managed_policy(request) {
            Ok(policy) => request::Outcome::Success(JwtClaims(policy.resolve_claims(request))),
            Err(e) => request::Outcome::Error((Status::InternalServerError, e)),
        }
    }
}

/// Principal of an authenticated request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedPrincipal(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedPrincipal {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let policy = match managed_policy(request) {
            Ok(policy) => policy,
            Err(e) => return request::Outcome::Error((Status::InternalServerError, e)),
        };

        match policy.authenticated_principal(request) {
            Some(principal) => request::Outcome::Success(AuthenticatedPrincipal(principal)),
            None => request::Outcome::Error((Status::Unauthorized, AuthError::Unauthenticated)),
        }
    }
}

/// Every principal the request acts as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectivePrincipals(pub Vec<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for EffectivePrincipals {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match managed_policy(request) {
            Ok(policy) => {
                request::Outcome::Success(EffectivePrincipals(policy.effective_principals(request)))
            }
            Err(e) => request::Outcome::Error((Status::InternalServerError, e)),
        }
    }
}

/// Access to token issuance from route handlers
#[derive(Debug, Clone, Copy)]
pub struct TokenIssuer<'r>(&'r JwtAuthenticationPolicy);

impl TokenIssuer<'_> {
    /// Issue a token for `principal`, see [`AuthenticationPolicy::issue`]
    pub fn issue(
        &self,
        principal: &str,
        expiration: Option<Duration>,
        audience: Option<Audience>,
        claims: ClaimSet,
    ) -> Result<String, PolicyError> {
        self.0.issue(principal, expiration, audience, claims)
    }

    pub fn policy(&self) -> &JwtAuthenticationPolicy {
        self.0
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for TokenIssuer<'r> {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match managed_policy(request) {
            Ok(policy) => request::Outcome::Success(TokenIssuer(policy.as_ref())),
            Err(e) => request::Outcome::Error((Status::InternalServerError, e)),
        }
    }
}
