// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rocket-jwt-policy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Conversion of claim values that have no native JSON form
//!
//! The policy receives its encoder at construction time. The default,
//! [`NumericDateEncoder`], writes date/time values as NumericDate so that
//! timestamps in custom claims follow the same convention as `iat` and `exp`.
//! Any `Fn(&ClaimValue) -> Value` closure can be used as an encoder as well.

use base64::Engine;
use serde_json::Value;

use super::claims::ClaimValue;

/// Strategy turning a [`ClaimValue`] into JSON
pub trait ClaimEncoder: Send + Sync {
    fn encode(&self, value: &ClaimValue) -> Value;
}

/// Default encoder
///
/// | Value      | JSON                                  |
/// |------------|---------------------------------------|
/// | `Json`     | unchanged                             |
/// | `DateTime` | integer seconds since the Unix epoch  |
/// | `Duration` | integer seconds                       |
/// | `Bytes`    | unpadded base64url string             |
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericDateEncoder;

impl ClaimEncoder for NumericDateEncoder {
    fn encode(&self, value: &ClaimValue) -> Value {
        match value {
            ClaimValue::Json(value) => value.clone(),
            ClaimValue::DateTime(at) => Value::from(at.timestamp()),
            ClaimValue::Duration(span) => Value::from(span.num_seconds()),
            ClaimValue::Bytes(bytes) => {
                Value::String(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
            }
        }
    }
}

impl<F> ClaimEncoder for F
where
    F: Fn(&ClaimValue) -> Value + Send + Sync,
{
    fn encode(&self, value: &ClaimValue) -> Value {
        self(value)
    }
}
