// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! GitHub App JSON Web Tokens.
//!
//! See https://docs.github.com/en/apps/creating-github-apps/authenticating-with-a-github-app/generating-a-json-web-token-jwt-for-a-github-app
//! for more details.

use {
    crate::AppPrivateKey,
    jsonwebtoken::{Algorithm, EncodingKey, Header},
    serde::{Deserialize, Serialize},
    std::time::{SystemTime, SystemTimeError},
    thiserror::Error,
};

/// Lifetime of tokens minted for API requests.
///
/// GitHub refuses tokens expiring more than 10 minutes in the future.
pub const DEFAULT_APP_TOKEN_LIFETIME: u64 = 540;

/// Tolerated clock drift between us and GitHub.
const CLOCK_SKEW: u64 = 60;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct AppTokenClaims {
    pub(crate) iss: String,
    pub(crate) iat: u64,
    pub(crate) exp: u64,
}

/// A JWT authenticating as a GitHub App.
pub type AppJwt = String;

/// Mints JWTs for a GitHub App.
///
/// App JWTs are derived from:
///
/// * The App ID. This is a number shown on the App's settings page.
/// * The App's RSA private key.
#[derive(Clone)]
pub struct AppTokenEncoder {
    app_id: u64,
    encoding_key: EncodingKey,
}

impl AppTokenEncoder {
    /// Construct an instance from an [EncodingKey] instance.
    pub fn from_jwt_encoding_key(app_id: u64, encoding_key: EncodingKey) -> Self {
        Self {
            app_id,
            encoding_key,
        }
    }

    pub fn new(app_id: u64, key: &AppPrivateKey) -> Self {
        Self::from_jwt_encoding_key(app_id, key.encoding_key().clone())
    }

    pub fn app_id(&self) -> u64 {
        self.app_id
    }

    /// Mint a new JWT valid for `duration` seconds.
    ///
    /// The issued-at time is backdated to absorb clock drift.
    pub fn new_token(&self, duration: u64) -> Result<AppJwt, JwtError> {
        let header = Header::new(Algorithm::RS256);

        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)?
            .as_secs();

        let claims = AppTokenClaims {
            iss: self.app_id.to_string(),
            iat: now.saturating_sub(CLOCK_SKEW),
            exp: now + duration,
        };

        Ok(jsonwebtoken::encode(&header, &claims, &self.encoding_key)?)
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("system clock is before the UNIX epoch")]
    Clock(#[from] SystemTimeError),

    #[error("failed to sign app JWT")]
    Encode(#[from] jsonwebtoken::errors::Error),
}
