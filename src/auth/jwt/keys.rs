// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rocket-jwt-policy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! JWT Key Management
//!
//! This module turns raw key material into the `jsonwebtoken` signing and
//! verification keys of a policy, checking that the material fits the chosen
//! algorithm. Symmetric algorithms use the same secret for both keys. For RSA
//! algorithms the public key may be omitted, in which case it is derived from
//! the private key.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::str::FromStr;

use super::error::PolicyError;

/// Types of JWT keys supported by the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// Symmetric key (HMAC)
    Symmetric,
    /// RSA key pair (RSxxx and PSxxx)
    Rsa,
    /// Elliptic Curve key pair
    Ec,
    /// Edwards curve key pair
    Ed,
}

impl KeyType {
    /// Key family required by `algorithm`
    pub fn for_algorithm(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => KeyType::Symmetric,
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => KeyType::Rsa,
            Algorithm::ES256 | Algorithm::ES384 => KeyType::Ec,
            Algorithm::EdDSA => KeyType::Ed,
        }
    }
}

/// Parse an algorithm identifier such as `"HS512"` or `"RS256"`
pub fn parse_algorithm(name: &str) -> Result<Algorithm, PolicyError> {
    Algorithm::from_str(name).map_err(|_| PolicyError::UnsupportedAlgorithm(name.to_string()))
}

/// Raw key material handed to a policy
#[derive(Clone)]
pub enum KeyMaterial {
    /// Shared secret for HMAC algorithms
    Secret(Vec<u8>),
    /// PEM encoded key pair for asymmetric algorithms
    Pem {
        private: Vec<u8>,
        public: Option<Vec<u8>>,
    },
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyMaterial::Secret(_) => f.debug_tuple("Secret").field(&"<secret>").finish(),
            KeyMaterial::Pem { public, .. } => f
                .debug_struct("Pem")
                .field("private", &"<private key>")
                .field("public", &public.as_ref().map(|_| "<public key>"))
                .finish(),
        }
    }
}

impl KeyMaterial {
    pub fn secret(secret: impl AsRef<[u8]>) -> Self {
        KeyMaterial::Secret(secret.as_ref().to_vec())
    }

    pub fn pem(private: impl AsRef<[u8]>, public: Option<&[u8]>) -> Self {
        KeyMaterial::Pem {
            private: private.as_ref().to_vec(),
            public: public.map(<[u8]>::to_vec),
        }
    }
}

/// Signing and verification keys of a policy
#[derive(Clone)]
pub struct SigningKeys {
    /// Algorithm both keys are bound to
    pub algorithm: Algorithm,
    /// Key family
    pub key_type: KeyType,
    /// Key used to sign issued tokens
    pub encoding_key: EncodingKey,
    /// Key used to verify inbound tokens
    pub decoding_key: DecodingKey,
}

impl std::fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeys")
            .field("algorithm", &self.algorithm)
            .field("key_type", &self.key_type)
            .field("encoding_key", &"<EncodingKey>")
            .field("decoding_key", &"<DecodingKey>")
            .finish()
    }
}

impl SigningKeys {
    /// Build the key pair for `algorithm` out of `material`
    ///
    /// # Errors
    ///
    /// - [`PolicyError::KeyAlgorithmMismatch`] when a secret is given for an
    ///   asymmetric algorithm or PEM keys for an HMAC algorithm
    /// - [`PolicyError::InvalidKey`] when a PEM key does not parse for the
    ///   algorithm family
    /// - [`PolicyError::MissingPublicKey`] when an EC or Ed key pair lacks its
    ///   public half
    pub fn new(algorithm: Algorithm, material: &KeyMaterial) -> Result<Self, PolicyError> {
        let key_type = KeyType::for_algorithm(algorithm);

        let (encoding_key, decoding_key) = match (key_type, material) {
            (KeyType::Symmetric, KeyMaterial::Secret(secret)) => {
                if secret.is_empty() {
                    return Err(PolicyError::InvalidKey("empty HMAC secret".to_string()));
                }
                (
                    EncodingKey::from_secret(secret),
                    DecodingKey::from_secret(secret),
                )
            }
            (KeyType::Symmetric, KeyMaterial::Pem { .. })
            | (_, KeyMaterial::Secret(_)) => {
                return Err(PolicyError::KeyAlgorithmMismatch(algorithm));
            }
            (KeyType::Rsa, KeyMaterial::Pem { private, public }) => {
                let public = match public {
                    Some(public) => public.clone(),
                    None => {
                        log::debug!("Deriving RSA public key from the private key");
                        derive_rsa_public_pem(private)?
                    }
                };
                (
                    EncodingKey::from_rsa_pem(private)?,
                    DecodingKey::from_rsa_pem(&public)?,
                )
            }
            (KeyType::Ec, KeyMaterial::Pem { private, public }) => {
                let public = public
                    .as_ref()
                    .ok_or(PolicyError::MissingPublicKey(algorithm))?;
                (
                    EncodingKey::from_ec_pem(private)?,
                    DecodingKey::from_ec_pem(public)?,
                )
            }
            (KeyType::Ed, KeyMaterial::Pem { private, public }) => {
                let public = public
                    .as_ref()
                    .ok_or(PolicyError::MissingPublicKey(algorithm))?;
                (
                    EncodingKey::from_ed_pem(private)?,
                    DecodingKey::from_ed_pem(public)?,
                )
            }
        };

        Ok(Self {
            algorithm,
            key_type,
            encoding_key,
            decoding_key,
        })
    }
}

/// Compute the SPKI PEM public key matching a PKCS#1 or PKCS#8 RSA private key
fn derive_rsa_public_pem(private_pem: &[u8]) -> Result<Vec<u8>, PolicyError> {
    let pem = std::str::from_utf8(private_pem)
        .map_err(|e| PolicyError::InvalidKey(format!("RSA private key is not UTF-8: {}", e)))?;

    let private_key = RsaPrivateKey::from_pkcs1_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
        .map_err(|e| PolicyError::InvalidKey(format!("invalid RSA private key: {}", e)))?;

    let public_key = RsaPublicKey::from(&private_key);
    let public_pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| PolicyError::InvalidKey(format!("cannot encode RSA public key: {}", e)))?;

    Ok(public_pem.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_algorithm() {
        assert_eq!(parse_algorithm("HS512").unwrap(), Algorithm::HS512);
        assert_eq!(parse_algorithm("RS256").unwrap(), Algorithm::RS256);
        assert!(matches!(
            parse_algorithm("none"),
            Err(PolicyError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_symmetric_keys() {
        let keys = SigningKeys::new(Algorithm::HS256, &KeyMaterial::secret("secret")).unwrap();
        assert_eq!(keys.key_type, KeyType::Symmetric);
    }

    #[test]
    fn test_secret_rejected_for_rsa() {
        let result = SigningKeys::new(Algorithm::RS256, &KeyMaterial::secret("secret"));
        assert!(matches!(
            result,
            Err(PolicyError::KeyAlgorithmMismatch(Algorithm::RS256))
        ));
    }

    #[test]
    fn test_pem_rejected_for_hmac() {
        let result = SigningKeys::new(Algorithm::HS512, &KeyMaterial::pem("pem", None));
        assert!(matches!(result, Err(PolicyError::KeyAlgorithmMismatch(_))));
    }

    #[test]
    fn test_ec_requires_public_key() {
        let result = SigningKeys::new(Algorithm::ES256, &KeyMaterial::pem("pem", None));
        assert!(matches!(result, Err(PolicyError::MissingPublicKey(_))));
    }

    #[test]
    fn test_garbage_rsa_key_is_invalid() {
        let result = SigningKeys::new(
            Algorithm::RS256,
            &KeyMaterial::pem("not a key", Some(b"not a key".as_slice())),
        );
        assert!(matches!(result, Err(PolicyError::InvalidKey(_))));
    }

    #[test]
    fn test_empty_secret_is_invalid() {
        let result = SigningKeys::new(Algorithm::HS256, &KeyMaterial::secret(""));
        assert!(matches!(result, Err(PolicyError::InvalidKey(_))));
    }
}
