// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rocket-jwt-policy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rocket JWT authentication policy
//!
//! This library issues and validates JSON Web Tokens carrying a principal and
//! a set of claims, and exposes the result to Rocket route handlers through
//! request guards.
//!
//! An invalid, expired or missing token never fails a request by itself: the
//! request is simply unauthenticated, and handlers decide what to do through
//! the guards they ask for.

pub mod auth;
pub mod config;

pub use auth::jwt::{Audience, ClaimSet, ClaimValue, Claims, KeyMaterial, PolicyError, TokenError};
pub use auth::{AuthenticationPolicy, JwtAuthenticationPolicy, JwtPolicyFairing};
pub use config::{Config, PolicySettings};
