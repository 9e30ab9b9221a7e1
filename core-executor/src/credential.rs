//! Bearer token credential
//!
//! [`BearerCredential`] is both the interceptor and the unsuccessful-response
//! handler of a request: it stamps `Authorization: Bearer <token>` on every
//! attempt and, when the server rejects the token, asks a [`TokenRefresher`]
//! for a new one so the executor's single retry goes out with it.

use bridge_traits::{error::Result, BridgeError, HttpRequest, ResponseEnvelope};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};

use crate::request::{ExecuteInterceptor, UnsuccessfulResponseHandler};

/// Source of fresh access tokens (refresh-token grant, service account, ...).
pub trait TokenRefresher: Send + Sync {
    fn refresh_token(&self) -> Result<String>;
}

pub struct BearerCredential {
    access_token: RwLock<Option<String>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    refresh_lock: Mutex<()>,
}

impl BearerCredential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: RwLock::new(Some(access_token.into())),
            refresher: None,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Credential that can recover from a rejected token. `access_token`
    /// may be `None` to fetch the first token on the first rejection.
    pub fn with_refresher(access_token: Option<String>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            access_token: RwLock::new(access_token),
            refresher: Some(refresher),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.access_token.read().ok().and_then(|token| token.clone())
    }

    pub fn set_access_token(&self, token: impl Into<String>) -> Result<()> {
        let mut current = self
            .access_token
            .write()
            .map_err(|_| BridgeError::OperationFailed("credential lock poisoned".to_string()))?;
        *current = Some(token.into());
        Ok(())
    }

    /// Fetch a new token. Returns `false` when there is no refresher or it failed.
    pub fn refresh(&self) -> bool {
        let Some(refresher) = &self.refresher else {
            return false;
        };

        match refresher.refresh_token() {
            Ok(token) => match self.set_access_token(token) {
                Ok(()) => {
                    debug!("Access token refreshed");
                    true
                }
                Err(e) => {
                    warn!(error = %e, "Failed to store refreshed access token");
                    false
                }
            },
            Err(e) => {
                warn!(error = %e, "Access token refresh failed");
                false
            }
        }
    }
}

impl std::fmt::Debug for BearerCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerCredential")
            .field("access_token", &self.access_token().map(|_| "[REDACTED]"))
            .field("refreshable", &self.refresher.is_some())
            .finish()
    }
}

/// 401, or any status with a Bearer challenge saying the token is invalid.
fn token_rejected(response: &ResponseEnvelope) -> bool {
    response.status() == 401
        || response
            .headers()
            .get_all("WWW-Authenticate")
            .any(|challenge| {
                challenge.trim_start().to_ascii_lowercase().starts_with("bearer")
                    && challenge.contains("invalid_token")
            })
}

impl ExecuteInterceptor for BearerCredential {
    fn intercept(&self, request: &mut HttpRequest) -> Result<()> {
        if let Some(token) = self.access_token() {
            request
                .headers
                .set("Authorization", format!("Bearer {}", token));
        }
        Ok(())
    }
}

impl UnsuccessfulResponseHandler for BearerCredential {
    fn handle_response(
        &self,
        request: &HttpRequest,
        response: &ResponseEnvelope,
        _supports_retry: bool,
    ) -> Result<bool> {
        if !token_rejected(response) {
            return Ok(false);
        }

        let _guard = self
            .refresh_lock
            .lock()
            .map_err(|_| BridgeError::OperationFailed("credential lock poisoned".to_string()))?;

        // Another call may have refreshed while this one was in flight.
        let sent = request
            .headers
            .get("Authorization")
            .and_then(|value| value.strip_prefix("Bearer "));
        let current = self.access_token();
        if sent.is_some() && sent != current.as_deref() {
            return Ok(true);
        }

        Ok(self.refresh())
    }
}
