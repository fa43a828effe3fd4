//! Manage json web tokens.
//!
//! Tokens are issued at login and handed to the caller; no route of this
//! service consumes them back. Session state is what gates requests.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Token lifetime, in seconds (30 days).
pub const EXPIRATION_TIME: u64 = 60 * 60 * 24 * 30;

/// Pieces of information asserted on a JWT.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Claims {
    /// Identifies the expiration time on or after which the JWT must not be
    /// accepted for processing.
    pub exp: u64,
    /// Identifies the time at which the JWT was issued.
    pub iat: u64,
    /// Identifies the organization that issued the JWT.
    pub iss: String,
    /// User ID.
    pub sub: String,
}

/// Manage JWT tokens.
#[derive(Clone)]
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    name: String,
}

impl TokenManager {
    /// Create a new [`TokenManager`] instance.
    pub fn new(name: &str, secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            name: name.to_owned(),
        }
    }

    /// Create a new signed token for `user_id`.
    pub fn create(&self, user_id: &str) -> Result<String> {
        let time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let header = Header::new(Algorithm::HS256);
        let claims = Claims {
            exp: time + EXPIRATION_TIME,
            iat: time,
            iss: self.name.clone(),
            sub: user_id.to_owned(),
        };

        Ok(encode(&header, &claims, &self.encoding_key)?)
    }

    /// Decode and check a token.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        Ok(decode::<Claims>(token, &self.decoding_key, &validation)?.claims)
    }
}
