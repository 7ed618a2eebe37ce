//! Service-to-service credentials. Upstream calls carry a short-lived
//! HS256 bearer token; tokens are cached and reminted shortly before
//! expiry so concurrent callers share one signature.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::config::APP_NAME;
use crate::error::EngineError;

/// Renew this long before actual expiry so in-flight requests never
/// carry a token that dies mid-call.
const RENEWAL_LEEWAY: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: u64,
    exp: u64,
}

struct CachedToken {
    token: String,
    minted_at: Instant,
}

pub struct ServiceCredentials {
    key: EncodingKey,
    ttl: Duration,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceCredentials {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::from_secs(ttl_secs),
            cached: Mutex::new(None),
        }
    }

    /// Current bearer token, minting a fresh one when the cached token
    /// is absent or close to expiry.
    pub fn bearer_token(&self) -> Result<String, EngineError> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| EngineError::Internal("credential cache poisoned".into()))?;

        let fresh_until = self.ttl.saturating_sub(RENEWAL_LEEWAY);
        if let Some(entry) = cached.as_ref() {
            if entry.minted_at.elapsed() < fresh_until {
                return Ok(entry.token.clone());
            }
        }

        let token = self.mint()?;
        *cached = Some(CachedToken {
            token: token.clone(),
            minted_at: Instant::now(),
        });
        Ok(token)
    }

    fn mint(&self) -> Result<String, EngineError> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| EngineError::Internal(format!("clock error: {e}")))?
            .as_secs();
        let claims = Claims {
            sub: APP_NAME.to_string(),
            iat: now,
            exp: now + self.ttl.as_secs(),
        };
        encode(&Header::default(), &claims, &self.key)
            .map_err(|e| EngineError::Internal(format!("token signing failed: {e}")))
    }
}
