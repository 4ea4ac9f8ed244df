// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rocket-jwt-policy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Extraction of the raw token from request headers
//!
//! A policy reads its token through exactly one [`HeaderContract`]:
//!
//! - `Authorization: <scheme> <token>`, the scheme being configurable
//!   (`JWT` by default)
//! - any other header, whose whole value is the token
//!
//! Extraction never fails loudly: anything that does not match the contract
//! yields `None`, which the policy treats like an invalid token.

use rocket::http::HeaderMap;

/// Name of the standard authorization header
pub const AUTHORIZATION: &str = "Authorization";

/// Default authorization scheme
pub const DEFAULT_SCHEME: &str = "JWT";

/// How a token is carried by a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderContract {
    /// `Authorization: <scheme> <token>`
    Authorization { scheme: String },
    /// Raw token in the named header
    Named(String),
}

impl HeaderContract {
    /// Select the contract for a configured header name and scheme
    ///
    /// The authorization contract applies when `header_name` is the standard
    /// authorization header, compared case-insensitively as header names are.
    pub fn new(header_name: &str, scheme: &str) -> Self {
        if header_name.eq_ignore_ascii_case(AUTHORIZATION) {
            HeaderContract::Authorization {
                scheme: scheme.to_string(),
            }
        } else {
            HeaderContract::Named(header_name.to_string())
        }
    }

    /// Header the contract reads
    pub fn header_name(&self) -> &str {
        match self {
            HeaderContract::Authorization { .. } => AUTHORIZATION,
            HeaderContract::Named(name) => name,
        }
    }
}

impl Default for HeaderContract {
    fn default() -> Self {
        HeaderContract::new(AUTHORIZATION, DEFAULT_SCHEME)
    }
}

/// Split an authorization header value into scheme and credentials
///
/// Returns `None` when the value has no space separating the two parts.
pub fn parse_authorization(value: &str) -> Option<(&str, &str)> {
    let (scheme, credentials) = value.trim().split_once(' ')?;
    Some((scheme, credentials.trim()))
}

/// Read the raw token from `headers` under `contract`
pub fn extract_token<'h>(headers: &'h HeaderMap<'_>, contract: &HeaderContract) -> Option<&'h str> {
    let token = match contract {
        HeaderContract::Authorization { scheme } => {
            let value = headers.get_one(AUTHORIZATION)?;
            let (found, token) = parse_authorization(value)?;
            if found != scheme {
                log::debug!(
                    "Ignoring authorization scheme '{}', expected '{}'",
                    found,
                    scheme
                );
                return None;
            }
            token
        }
        HeaderContract::Named(name) => headers.get_one(name)?,
    };

    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::http::Header;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap<'static> {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.add(Header::new(*name, *value));
        }
        map
    }

    #[test]
    fn test_contract_selection() {
        assert_eq!(
            HeaderContract::new("authorization", "JWT"),
            HeaderContract::Authorization {
                scheme: "JWT".to_string()
            }
        );
        assert_eq!(
            HeaderContract::new("X-Token", "JWT"),
            HeaderContract::Named("X-Token".to_string())
        );
        assert_eq!(HeaderContract::default().header_name(), AUTHORIZATION);
    }

    #[test]
    fn test_authorization_with_matching_scheme() {
        let map = headers(&[("Authorization", "JWT abc.def.ghi")]);
        assert_eq!(
            extract_token(&map, &HeaderContract::default()),
            Some("abc.def.ghi")
        );
    }

    #[test]
    fn test_authorization_scheme_is_case_sensitive() {
        let contract = HeaderContract::default();
        assert_eq!(
            extract_token(&headers(&[("Authorization", "Bearer abc")]), &contract),
            None
        );
        assert_eq!(
            extract_token(&headers(&[("Authorization", "jwt abc")]), &contract),
            None
        );
    }

    #[test]
    fn test_malformed_authorization_is_absent() {
        let contract = HeaderContract::default();
        for value in ["", "JWT", "JWT ", "   ", "JWTabc"] {
            assert_eq!(
                extract_token(&headers(&[("Authorization", value)]), &contract),
                None,
                "value {:?}",
                value
            );
        }
        assert_eq!(extract_token(&headers(&[]), &contract), None);
    }

    #[test]
    fn test_named_header_is_read_verbatim() {
        let contract = HeaderContract::new("X-Api-Token", "JWT");
        let map = headers(&[("X-Api-Token", "abc.def.ghi"), ("Authorization", "JWT other")]);
        assert_eq!(extract_token(&map, &contract), Some("abc.def.ghi"));
        assert_eq!(extract_token(&headers(&[]), &contract), None);
    }

    #[test]
    fn test_parse_authorization() {
        assert_eq!(parse_authorization("JWT token"), Some(("JWT", "token")));
        assert_eq!(parse_authorization("Basic a b"), Some(("Basic", "a b")));
        assert_eq!(parse_authorization("token"), None);
    }
}
