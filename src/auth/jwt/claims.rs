// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rocket-jwt-policy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! JWT claim structures
//!
//! This module defines the two shapes claims take in the policy:
//!
//! - [`ClaimSet`]: the payload being assembled before signing. Its values are
//!   [`ClaimValue`]s, which may still hold non-JSON types (date/time values,
//!   durations, raw bytes) until an encoder converts them.
//! - [`Claims`]: the decoded, JSON-only claims of a token. The reserved claims
//!   `sub`, `iat`, `exp` and `aud` are typed fields; everything else lives in
//!   [`Claims::custom`].
//!
//! The precedence between default claims, caller claims and the fields derived
//! by the policy is fixed by [`layer_claims`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};

/// Subject claim name
pub const SUB: &str = "sub";
/// Issued-at claim name
pub const IAT: &str = "iat";
/// Expiration claim name
pub const EXP: &str = "exp";
/// Audience claim name
pub const AUD: &str = "aud";

/// Intended recipient(s) of a token
///
/// Serialized as a plain string for a single audience and as a list of strings
/// otherwise, as RFC 7519 allows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(BTreeSet<String>),
}

impl Audience {
    /// Returns `true` if `name` is one of the audience members
    pub fn contains(&self, name: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == name,
            Audience::Multiple(auds) => auds.contains(name),
        }
    }

    /// Returns `true` if both audiences share at least one member
    pub fn intersects(&self, other: &Audience) -> bool {
        self.members().any(|name| other.contains(name))
    }

    /// Iterate over the audience members
    pub fn members(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match self {
            Audience::Single(aud) => Box::new(std::iter::once(aud.as_str())),
            Audience::Multiple(auds) => Box::new(auds.iter().map(String::as_str)),
        }
    }

    /// Returns `true` when the audience names nobody
    pub fn is_empty(&self) -> bool {
        match self {
            Audience::Single(aud) => aud.is_empty(),
            Audience::Multiple(auds) => auds.is_empty(),
        }
    }

    /// Read an audience out of a JSON value, if it has the right shape
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// JSON form of the audience
    pub fn to_value(&self) -> Value {
        match self {
            Audience::Single(aud) => Value::String(aud.clone()),
            Audience::Multiple(auds) => {
                Value::Array(auds.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

impl From<&str> for Audience {
    fn from(aud: &str) -> Self {
        Audience::Single(aud.to_string())
    }
}

impl From<String> for Audience {
    fn from(aud: String) -> Self {
        Audience::Single(aud)
    }
}

impl<S: Into<String>> FromIterator<S> for Audience {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Audience::Multiple(iter.into_iter().map(Into::into).collect())
    }
}

/// A claim value before encoding
///
/// JSON values are passed through untouched. The other variants have no native
/// JSON representation and are converted by a
/// [`ClaimEncoder`](super::encoder::ClaimEncoder) when the token is encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimValue {
    Json(Value),
    /// A point in time, NumericDate on the wire with the default encoder
    DateTime(DateTime<Utc>),
    /// A time span, integer seconds on the wire with the default encoder
    Duration(Duration),
    /// Raw bytes, unpadded base64url text on the wire with the default encoder
    Bytes(Vec<u8>),
}

impl From<Value> for ClaimValue {
    fn from(value: Value) -> Self {
        ClaimValue::Json(value)
    }
}

impl From<&str> for ClaimValue {
    fn from(value: &str) -> Self {
        ClaimValue::Json(Value::String(value.to_string()))
    }
}

impl From<String> for ClaimValue {
    fn from(value: String) -> Self {
        ClaimValue::Json(Value::String(value))
    }
}

impl From<bool> for ClaimValue {
    fn from(value: bool) -> Self {
        ClaimValue::Json(Value::Bool(value))
    }
}

impl From<i64> for ClaimValue {
    fn from(value: i64) -> Self {
        ClaimValue::Json(Value::from(value))
    }
}

impl From<Vec<String>> for ClaimValue {
    fn from(value: Vec<String>) -> Self {
        ClaimValue::Json(Value::from(value))
    }
}

impl From<DateTime<Utc>> for ClaimValue {
    fn from(value: DateTime<Utc>) -> Self {
        ClaimValue::DateTime(value)
    }
}

impl From<Duration> for ClaimValue {
    fn from(value: Duration) -> Self {
        ClaimValue::Duration(value)
    }
}

impl From<Vec<u8>> for ClaimValue {
    fn from(value: Vec<u8>) -> Self {
        ClaimValue::Bytes(value)
    }
}

impl From<Audience> for ClaimValue {
    fn from(value: Audience) -> Self {
        ClaimValue::Json(value.to_value())
    }
}

/// An unsigned claims payload
///
/// Used both for the default claims template of a policy and for the extra
/// claims a caller passes when issuing a token.
///
/// ```
/// use rocket_jwt_policy::auth::jwt::ClaimSet;
///
/// let claims = ClaimSet::new().with("role", "admin").with("level", 3i64);
/// assert_eq!(claims.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimSet(BTreeMap<String, ClaimValue>);

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`ClaimSet::insert`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ClaimValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a claim, returning the value it replaced
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ClaimValue>,
    ) -> Option<ClaimValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&ClaimValue> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ClaimValue> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ClaimValue> {
        self.0.iter()
    }

    /// Override this set key by key with the entries of `other`
    pub fn overlay(&mut self, other: &ClaimSet) {
        for (key, value) in other.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }
}

impl From<Map<String, Value>> for ClaimSet {
    fn from(map: Map<String, Value>) -> Self {
        ClaimSet(
            map.into_iter()
                .map(|(key, value)| (key, ClaimValue::Json(value)))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<ClaimValue>> FromIterator<(K, V)> for ClaimSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        ClaimSet(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl IntoIterator for ClaimSet {
    type Item = (String, ClaimValue);
    type IntoIter = btree_map::IntoIter<String, ClaimValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Fields the policy always derives itself when issuing a token
#[derive(Debug, Clone)]
pub struct DerivedClaims {
    /// Principal, always written to `sub`
    pub subject: String,
    /// Issuance instant, always written to `iat`
    pub issued_at: DateTime<Utc>,
    /// Written to `exp` as `issued_at + expiration` when present
    pub expiration: Option<Duration>,
    /// Written to `aud` when present
    pub audience: Option<Audience>,
}

/// Merge the claim layers of a new token
///
/// Precedence, lowest first:
///
/// 1. `defaults`, the policy's default claims template
/// 2. `extra`, the claims supplied by the caller
/// 3. `derived.subject` and `derived.issued_at`, which always win
/// 4. `derived.expiration` and `derived.audience`, which win only when present.
///    When absent, an `exp` or `aud` supplied through layers 1 and 2 is kept.
///
/// `iat` and `exp` are written as NumericDate integers so that the wire format
/// of the reserved claims never depends on the encoder.
pub fn layer_claims(defaults: &ClaimSet, extra: &ClaimSet, derived: &DerivedClaims) -> ClaimSet {
    let mut payload = defaults.clone();
    payload.overlay(extra);

    let iat = derived.issued_at.timestamp();
    payload.insert(SUB, derived.subject.as_str());
    payload.insert(IAT, iat);

    if let Some(expiration) = derived.expiration {
        payload.insert(EXP, iat.saturating_add(expiration.num_seconds()));
    }
    if let Some(audience) = &derived.audience {
        payload.insert(AUD, audience.clone());
    }

    payload
}

/// Decoded claims of a token
///
/// The empty value (`Claims::default()`) stands for an unauthenticated request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject, the principal the token asserts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Issued-at, seconds since the Unix epoch
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_numeric_date"
    )]
    pub iat: Option<i64>,

    /// Expiration, seconds since the Unix epoch
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_numeric_date"
    )]
    pub exp: Option<i64>,

    /// Audience
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// Every other claim
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

impl Claims {
    /// Build claims from an encoded JSON payload
    ///
    /// Reserved claims with a value of the wrong shape are dropped with a
    /// warning rather than failing the whole payload.
    pub fn from_map(mut map: Map<String, Value>) -> Self {
        let sub = match map.remove(SUB) {
            Some(Value::String(sub)) => Some(sub),
            Some(other) => {
                log::warn!("Dropping non-string '{}' claim: {}", SUB, other);
                None
            }
            None => None,
        };
        let iat = take_numeric_date(&mut map, IAT);
        let exp = take_numeric_date(&mut map, EXP);
        let aud = match map.remove(AUD) {
            Some(value) => {
                let aud = Audience::from_value(&value);
                if aud.is_none() {
                    log::warn!("Dropping malformed '{}' claim: {}", AUD, value);
                }
                aud
            }
            None => None,
        };

        Claims {
            sub,
            iat,
            exp,
            aud,
            custom: map,
        }
    }

    /// Returns `true` for the claims of an unauthenticated request
    pub fn is_empty(&self) -> bool {
        self.sub.is_none()
            && self.iat.is_none()
            && self.exp.is_none()
            && self.aud.is_none()
            && self.custom.is_empty()
    }

    /// The principal asserted by the token
    pub fn principal(&self) -> Option<&str> {
        self.sub.as_deref()
    }

    /// Look up any claim, reserved ones included, as JSON
    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            SUB => self.sub.clone().map(Value::String),
            IAT => self.iat.map(Value::from),
            EXP => self.exp.map(Value::from),
            AUD => self.aud.as_ref().map(Audience::to_value),
            _ => self.custom.get(key).cloned(),
        }
    }

    /// Issued-at as a date/time
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.iat.and_then(|iat| DateTime::from_timestamp(iat, 0))
    }

    /// Expiration as a date/time
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }
}

/// Whole seconds of a NumericDate
///
/// RFC 7519 allows fractional seconds, which are truncated toward the past.
pub(crate) fn numeric_date(value: &Value) -> Option<i64> {
    if let Some(seconds) = value.as_i64() {
        return Some(seconds);
    }
    let seconds = value.as_f64()?.floor();
    // i64::MAX as f64 rounds up to 2^63, itself out of range
    if seconds.is_finite() && seconds >= i64::MIN as f64 && seconds < i64::MAX as f64 {
        Some(seconds as i64)
    } else {
        None
    }
}

fn deserialize_numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => numeric_date(&value).map(Some).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid NumericDate: {}", value))
        }),
    }
}

fn take_numeric_date(map: &mut Map<String, Value>, key: &str) -> Option<i64> {
    let value = map.remove(key)?;
    match numeric_date(&value) {
        Some(timestamp) => Some(timestamp),
        None => {
            log::warn!("Dropping non-NumericDate '{}' claim: {}", key, value);
            None
        }
    }
}
