// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rocket-jwt-policy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! JWT authentication for Rocket
//!
//! - [`jwt`]: claims codec, keys and errors
//! - [`extractor`]: reading the raw token out of request headers
//! - [`policy`]: the [`JwtAuthenticationPolicy`] issuing and resolving tokens
//! - [`guards`] and [`fairing`]: integration with Rocket

pub mod extractor;
pub mod fairing;
pub mod guards;
pub mod jwt;
pub mod policy;

pub use extractor::{extract_token, HeaderContract};
pub use fairing::JwtPolicyFairing;
pub use guards::{AuthError, AuthenticatedPrincipal, EffectivePrincipals, JwtClaims, TokenIssuer};
pub use policy::{
    AuthenticationPolicy, GroupFinder, JwtAuthenticationPolicy, AUTHENTICATED, EVERYONE,
};
