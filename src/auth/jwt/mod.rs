// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rocket-jwt-policy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! JWT claims codec
//!
//! Pure signing and verification of claims, independent of any request.

/// Claim structures and the claim precedence rules
pub mod claims;

/// Time source
pub mod clock;

/// Token encoding and decoding
pub mod codec;

/// Conversion of non-JSON claim values
pub mod encoder;

/// Error types
pub mod error;

/// Key material management
pub mod keys;

pub use claims::{layer_claims, Audience, ClaimSet, ClaimValue, Claims, DerivedClaims};
pub use clock::{Clock, FixedClock, SystemClock};
pub use encoder::{ClaimEncoder, NumericDateEncoder};
pub use error::{PolicyError, TokenError};
pub use keys::{parse_algorithm, KeyMaterial, KeyType, SigningKeys};
