// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rocket-jwt-policy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! JWT authentication policy
//!
//! [`JwtAuthenticationPolicy`] ties the header extractor and the claims codec
//! together:
//!
//! - **Outbound**, [`issue`](AuthenticationPolicy::issue) builds a payload out
//!   of the default claims, the caller's claims and the fields the policy
//!   derives itself (`sub`, `iat`, and `exp`/`aud` when known), then signs it.
//! - **Inbound**, [`resolve_claims`](AuthenticationPolicy::resolve_claims)
//!   extracts the token of a request, validates it and caches the claims on the
//!   request. Any failure is logged and yields empty claims; the reason never
//!   reaches the request pipeline.
//!
//! The policy is immutable once built and is meant to be shared as
//! `Arc<JwtAuthenticationPolicy>` across all request handlers.
//!
//! # Example
//!
//! ```
//! use chrono::Duration;
//! use jsonwebtoken::Algorithm;
//! use rocket_jwt_policy::auth::jwt::{ClaimSet, KeyMaterial};
//! use rocket_jwt_policy::auth::{AuthenticationPolicy, JwtAuthenticationPolicy};
//!
//! let policy = JwtAuthenticationPolicy::new(Algorithm::HS512, &KeyMaterial::secret("secret"))
//!     .unwrap()
//!     .with_expiration(Duration::hours(1))
//!     .with_default_claims(ClaimSet::new().with("role", "guest"));
//!
//! let token = policy
//!     .issue("alice", None, None, ClaimSet::new().with("role", "admin"))
//!     .unwrap();
//! let claims = policy.decode_token(&token).unwrap();
//! assert_eq!(claims.principal(), Some("alice"));
//! assert_eq!(claims.get("role"), Some(serde_json::json!("admin")));
//! ```

use chrono::Duration;
use rocket::http::Header;
use rocket::Request;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use super::extractor::{extract_token, HeaderContract, AUTHORIZATION, DEFAULT_SCHEME};
use super::jwt::{
    codec, layer_claims, Audience, ClaimEncoder, ClaimSet, Claims, Clock, DerivedClaims,
    KeyMaterial, NumericDateEncoder, PolicyError, SigningKeys, SystemClock, TokenError,
};
use crate::config::PolicySettings;

/// Principal every request has
pub const EVERYONE: &str = "system.Everyone";

/// Principal every authenticated request has
pub const AUTHENTICATED: &str = "system.Authenticated";

/// Post-authentication callback
///
/// Called with the principal of a valid token. Returns the groups of the
/// principal, or `None` when the principal is not recognised, in which case
/// the request is considered unauthenticated.
pub type GroupFinder = Arc<dyn Fn(&str, &Request<'_>) -> Option<Vec<String>> + Send + Sync>;

/// Operations a request pipeline expects from an authentication policy
pub trait AuthenticationPolicy: Send + Sync {
    /// Issue a signed token for `principal`
    ///
    /// `expiration` and `audience` override the policy defaults when given.
    fn issue(
        &self,
        principal: &str,
        expiration: Option<Duration>,
        audience: Option<Audience>,
        claims: ClaimSet,
    ) -> Result<String, PolicyError>;

    /// Claims of the token carried by `request`, empty when there is no valid
    /// token. Computed once per request.
    fn resolve_claims<'r>(&self, request: &'r Request<'_>) -> &'r Claims;

    /// Principal asserted by the token of `request`, without consulting the
    /// callback
    fn principal_of(&self, request: &Request<'_>) -> Option<String> {
        self.resolve_claims(request).principal().map(str::to_string)
    }

    /// Principal of `request` once the callback accepted it
    fn authenticated_principal(&self, request: &Request<'_>) -> Option<String>;

    /// Every principal `request` acts as, groups included
    fn effective_principals(&self, request: &Request<'_>) -> Vec<String>;

    /// Headers that would remember `principal`; always empty for tokens
    fn remember(&self, request: &Request<'_>, principal: &str) -> Vec<Header<'static>>;

    /// Headers that would forget the current principal; always empty for tokens
    fn forget(&self, request: &Request<'_>) -> Vec<Header<'static>>;
}

static NEXT_POLICY_ID: AtomicU64 = AtomicU64::new(0);

/// Claims of one policy in the request-local cache
///
/// Rocket keys its local cache by type, so the claims of every policy that
/// resolves a request are chained from a single head slot.
struct CachedClaims {
    policy_id: u64,
    claims: Claims,
    next: OnceLock<Box<CachedClaims>>,
}

impl CachedClaims {
    fn new(policy_id: u64, claims: Claims) -> Self {
        Self {
            policy_id,
            claims,
            next: OnceLock::new(),
        }
    }
}

/// Authentication policy backed by JWT
pub struct JwtAuthenticationPolicy {
    id: u64,
    keys: SigningKeys,
    leeway: Duration,
    expiration: Option<Duration>,
    default_claims: ClaimSet,
    http_header: String,
    auth_type: String,
    contract: HeaderContract,
    audience: Option<Audience>,
    callback: Option<GroupFinder>,
    encoder: Arc<dyn ClaimEncoder>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for JwtAuthenticationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthenticationPolicy")
            .field("keys", &self.keys)
            .field("leeway", &self.leeway)
            .field("expiration", &self.expiration)
            .field("default_claims", &self.default_claims)
            .field("contract", &self.contract)
            .field("audience", &self.audience)
            .field("callback", &self.callback.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl JwtAuthenticationPolicy {
    /// Create a policy for `algorithm` with the given key material
    ///
    /// Defaults: no leeway, no expiration, no default claims,
    /// `Authorization: JWT <token>`, no audience, no callback,
    /// [`NumericDateEncoder`], [`SystemClock`].
    pub fn new(algorithm: jsonwebtoken::Algorithm, keys: &KeyMaterial) -> Result<Self, PolicyError> {
        let keys = SigningKeys::new(algorithm, keys)?;
        log::debug!("JWT authentication policy created with {:?}", algorithm);

        Ok(Self {
            id: NEXT_POLICY_ID.fetch_add(1, Ordering::Relaxed),
            keys,
            leeway: Duration::zero(),
            expiration: None,
            default_claims: ClaimSet::new(),
            http_header: AUTHORIZATION.to_string(),
            auth_type: DEFAULT_SCHEME.to_string(),
            contract: HeaderContract::default(),
            audience: None,
            callback: None,
            encoder: Arc::new(NumericDateEncoder),
            clock: Arc::new(SystemClock),
        })
    }

    /// Create a policy from deserialized settings
    pub fn from_settings(settings: &PolicySettings) -> Result<Self, PolicyError> {
        let algorithm = settings.algorithm()?;
        let keys = settings.key_material(algorithm)?;
        if settings.uses_default_secret() {
            log::warn!("JWT policy signs with the default secret, set jwt.private_key");
        }

        let mut policy = Self::new(algorithm, &keys)?
            .with_leeway(seconds_setting("leeway", settings.leeway)?)
            .with_default_claims(ClaimSet::from(settings.default_claims.clone()))
            .with_http_header(&settings.http_header)
            .with_auth_type(&settings.auth_type);

        if let Some(expiration) = settings.expiration {
            policy = policy.with_expiration(seconds_setting("expiration", expiration)?);
        }
        if let Some(audience) = &settings.audience {
            policy = policy.with_audience(audience.clone());
        }

        Ok(policy)
    }

    /// Clock-skew tolerance applied to `exp` and `nbf`
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Default lifetime of issued tokens; a zero duration means no expiration
    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = Some(expiration).filter(|e| *e != Duration::zero());
        self
    }

    /// Claims every issued token starts from
    pub fn with_default_claims(mut self, claims: ClaimSet) -> Self {
        self.default_claims = claims;
        self
    }

    /// Header carrying the token
    pub fn with_http_header(mut self, header: impl Into<String>) -> Self {
        self.http_header = header.into();
        self.contract = HeaderContract::new(&self.http_header, &self.auth_type);
        self
    }

    /// Scheme expected in the `Authorization` header
    pub fn with_auth_type(mut self, scheme: impl Into<String>) -> Self {
        self.auth_type = scheme.into();
        self.contract = HeaderContract::new(&self.http_header, &self.auth_type);
        self
    }

    /// Audience written into issued tokens and expected from inbound ones;
    /// an empty audience means none
    pub fn with_audience(mut self, audience: impl Into<Audience>) -> Self {
        self.audience = Some(audience.into()).filter(|a| !a.is_empty());
        self
    }

    /// Post-authentication callback
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, &Request<'_>) -> Option<Vec<String>> + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Shared form of [`with_callback`](Self::with_callback)
    pub fn with_group_finder(mut self, callback: GroupFinder) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Encoder for non-JSON claim values
    pub fn with_encoder(mut self, encoder: Arc<dyn ClaimEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Time source for `iat` and the validity checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn algorithm(&self) -> jsonwebtoken::Algorithm {
        self.keys.algorithm
    }

    pub fn contract(&self) -> &HeaderContract {
        &self.contract
    }

    pub fn audience(&self) -> Option<&Audience> {
        self.audience.as_ref()
    }

    pub fn expiration(&self) -> Option<Duration> {
        self.expiration
    }

    pub fn leeway(&self) -> Duration {
        self.leeway
    }

    /// Validate a raw token with the policy's key, leeway and audience
    pub fn decode_token(&self, token: &str) -> Result<Claims, TokenError> {
        codec::decode(
            token,
            &self.keys.decoding_key,
            self.keys.algorithm,
            self.leeway,
            self.audience.as_ref(),
            self.clock.now(),
        )
    }

    /// Uncached claims of `request`
    fn claims_of(&self, request: &Request<'_>) -> Claims {
        let Some(token) = extract_token(request.headers(), &self.contract) else {
            return Claims::default();
        };

        match self.decode_token(token) {
            Ok(claims) => claims,
            Err(err) => {
                let origin = request
                    .client_ip()
                    .map(|ip| ip.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                log::warn!("Invalid JWT token from {}: {}", origin, err);
                Claims::default()
            }
        }
    }

    /// Groups of `principal` according to the callback, `Some(vec![])` when
    /// no callback is configured
    fn groups_of(&self, principal: &str, request: &Request<'_>) -> Option<Vec<String>> {
        if principal == EVERYONE || principal == AUTHENTICATED {
            log::debug!("Refusing reserved principal '{}'", principal);
            return None;
        }
        match &self.callback {
            Some(callback) => callback(principal, request),
            None => Some(Vec::new()),
        }
    }
}

/// A duration setting given in seconds
fn seconds_setting(name: &'static str, seconds: u64) -> Result<Duration, PolicyError> {
    i64::try_from(seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| PolicyError::InvalidSetting {
            name,
            reason: format!("{} seconds is out of range", seconds),
        })
}

impl AuthenticationPolicy for JwtAuthenticationPolicy {
    fn issue(
        &self,
        principal: &str,
        expiration: Option<Duration>,
        audience: Option<Audience>,
        claims: ClaimSet,
    ) -> Result<String, PolicyError> {
        let derived = DerivedClaims {
            subject: principal.to_string(),
            issued_at: self.clock.now(),
            expiration: expiration
                .filter(|e| *e != Duration::zero())
                .or(self.expiration),
            audience: audience
                .filter(|a| !a.is_empty())
                .or_else(|| self.audience.clone()),
        };

        let payload = layer_claims(&self.default_claims, &claims, &derived);
        codec::encode(
            &payload,
            &self.keys.encoding_key,
            self.keys.algorithm,
            self.encoder.as_ref(),
        )
    }

    fn resolve_claims<'r>(&self, request: &'r Request<'_>) -> &'r Claims {
        let decode = || CachedClaims::new(self.id, self.claims_of(request));
        let mut slot = request.local_cache(decode);
        while slot.policy_id != self.id {
            slot = slot.next.get_or_init(|| Box::new(decode())).as_ref();
        }
        &slot.claims
    }

    fn authenticated_principal(&self, request: &Request<'_>) -> Option<String> {
        let principal = self.principal_of(request)?;
        self.groups_of(&principal, request).map(|_| principal)
    }

    fn effective_principals(&self, request: &Request<'_>) -> Vec<String> {
        let mut principals = vec![EVERYONE.to_string()];

        let Some(principal) = self.principal_of(request) else {
            return principals;
        };
        let Some(groups) = self.groups_of(&principal, request) else {
            return principals;
        };

        principals.push(AUTHENTICATED.to_string());
        principals.push(principal);
        principals.extend(groups);
        principals
    }

    fn remember(&self, _request: &Request<'_>, principal: &str) -> Vec<Header<'static>> {
        log::warn!(
            "remember() has no effect for '{}': JWT tokens must be returned to clients by the API that issues them",
            principal
        );
        Vec::new()
    }

    fn forget(&self, _request: &Request<'_>) -> Vec<Header<'static>> {
        log::warn!(
            "forget() has no effect: JWT tokens are discarded by the clients holding them"
        );
        Vec::new()
    }
}
