//! Opaque HMAC-SHA256 token strategy.
//!
//! A token is `<key>.<signature>` where `key` is 32 random bytes and
//! `signature = HMAC-SHA256(global_secret, key)`, both base64url without
//! padding. Only the signature is stored, so a leaked database does not
//! yield usable tokens.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::AuthResult;
use crate::config::{MIN_GLOBAL_SECRET_LEN, Secret};
use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Number of random bytes in a token key.
const TOKEN_KEY_BYTES: usize = 32;

/// Generates and verifies opaque access and refresh tokens.
#[derive(Clone)]
pub struct HmacTokenStrategy {
    secret: Vec<u8>,
}

impl std::fmt::Debug for HmacTokenStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacTokenStrategy").finish_non_exhaustive()
    }
}

impl HmacTokenStrategy {
    /// Creates a strategy keyed with the global secret.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the secret is shorter than 32 bytes.
    pub fn new(secret: &Secret) -> AuthResult<Self> {
        if secret.expose().len() < MIN_GLOBAL_SECRET_LEN {
            return Err(AuthError::configuration(format!(
                "global secret must be at least {MIN_GLOBAL_SECRET_LEN} bytes"
            )));
        }
        Ok(Self {
            secret: secret.expose().as_bytes().to_vec(),
        })
    }

    /// Generates a new token and its signature.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if the MAC cannot be initialised.
    pub fn generate(&self) -> AuthResult<(String, String)> {
        let mut bytes = [0u8; TOKEN_KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let key = URL_SAFE_NO_PAD.encode(bytes);
        let signature = URL_SAFE_NO_PAD.encode(self.mac(&key)?.finalize().into_bytes());
        Ok((format!("{key}.{signature}"), signature))
    }

    /// Extracts the signature part of a presented token.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the token is not of the form
    /// `<key>.<signature>`.
    pub fn signature(&self, token: &str) -> AuthResult<String> {
        split_token(token).map(|(_, signature)| signature.to_string())
    }

    /// Verifies that the token's signature was produced with our secret.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the token is malformed or the signature
    /// does not match.
    pub fn validate(&self, token: &str) -> AuthResult<()> {
        let (key, signature) = split_token(token)?;
        let expected = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::invalid_request("token signature is not valid base64"))?;
        self.mac(key)?
            .verify_slice(&expected)
            .map_err(|_| AuthError::invalid_request("token signature does not match"))
    }

    fn mac(&self, key: &str) -> AuthResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AuthError::server_error(format!("HMAC init failed: {e}")))?;
        mac.update(key.as_bytes());
        Ok(mac)
    }
}

fn split_token(token: &str) -> AuthResult<(&str, &str)> {
    match token.split_once('.') {
        Some((key, signature))
            if !key.is_empty() && !signature.is_empty() && !signature.contains('.') =>
        {
            Ok((key, signature))
        }
        _ => Err(AuthError::invalid_request("token is malformed")),
    }
}
