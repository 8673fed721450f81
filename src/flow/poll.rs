//! Token poll entry point: maps the state record behind a device code to
//! one of the four protocol outcomes.

use crate::cache::DeviceCodesCache;
use crate::flow::{FlowError, GRANT_TYPE_DEVICE_CODE};
use crate::records::DeviceState;
use crate::storage::now_millis;
use log::debug;
use serde::Serialize;
use std::sync::Arc;

/// An incoming token request from the polling device, already decoded from
/// its HTTP envelope. Client authentication, where required, is validated
/// upstream.
#[derive(Debug, Clone)]
pub struct DeviceTokenRequest {
    pub grant_type: String,
    pub device_code: String,
}

impl DeviceTokenRequest {
    pub fn new(device_code: impl Into<String>) -> Self {
        Self {
            grant_type: GRANT_TYPE_DEVICE_CODE.to_string(),
            device_code: device_code.into(),
        }
    }
}

/// Successful token response for an approved request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceTokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Remaining token lifetime in seconds.
    pub expires_in: u64,
}

/// The four protocol outcomes of a poll (RFC 8628 §3.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenPollOutcome {
    /// The user has not yet decided; poll again after the interval.
    AuthorizationPending,
    /// The user denied the request; terminal.
    AccessDenied,
    /// The device code is unknown or past its lifetime; terminal.
    ExpiredToken,
    /// The request was approved; carries the token response.
    Issued(DeviceTokenResponse),
}

impl TokenPollOutcome {
    /// OAuth error code for the non-success outcomes.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::AuthorizationPending => Some("authorization_pending"),
            Self::AccessDenied => Some("access_denied"),
            Self::ExpiredToken => Some("expired_token"),
            Self::Issued(_) => None,
        }
    }
}

pub struct TokenPollHandler {
    cache: Arc<DeviceCodesCache>,
}

impl TokenPollHandler {
    pub fn new(cache: Arc<DeviceCodesCache>) -> Self {
        Self { cache }
    }

    pub async fn handle(
        &self,
        request: &DeviceTokenRequest,
    ) -> Result<TokenPollOutcome, FlowError> {
        if request.grant_type != GRANT_TYPE_DEVICE_CODE {
            return Err(FlowError::InvalidMessage(format!(
                "unsupported grant type {}",
                request.grant_type
            )));
        }
        if request.device_code.is_empty() {
            return Err(FlowError::InvalidMessage("no device code".to_string()));
        }

        let Some(state) = self.cache.get_device_state(&request.device_code).await? else {
            debug!("Device code {} has expired", request.device_code);
            return Ok(TokenPollOutcome::ExpiredToken);
        };

        match state.state {
            DeviceState::Pending => {
                debug!(
                    "Request is still pending for device code {}",
                    request.device_code
                );
                Ok(TokenPollOutcome::AuthorizationPending)
            }
            DeviceState::Denied => {
                debug!(
                    "User has denied request for device code {}",
                    request.device_code
                );
                Ok(TokenPollOutcome::AccessDenied)
            }
            DeviceState::Approved => {
                // The cache validated the invariants on decode
                let (access_token, expires_at) = match (state.access_token, state.expires_at) {
                    (Some(token), Some(expires_at)) => (token, expires_at),
                    _ => {
                        return Err(FlowError::Cache(crate::cache::CacheError::Parse(
                            "approved state record without token".to_string(),
                        )))
                    }
                };
                // A poll after the token's own expiry still answers with the
                // token; the remaining lifetime just bottoms out at zero.
                let expires_in = expires_at.saturating_sub(now_millis()) / 1000;
                Ok(TokenPollOutcome::Issued(DeviceTokenResponse {
                    access_token,
                    token_type: "Bearer".to_string(),
                    expires_in,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{DeviceCodeRecord, DeviceStateRecord};
    use crate::storage::memory::InMemoryStorage;
    use crate::storage::Storage;
    use std::time::Duration;

    fn test_cache() -> Arc<DeviceCodesCache> {
        let storage = Storage::InMemory(InMemoryStorage::new(128).unwrap());
        Arc::new(DeviceCodesCache::new(storage).unwrap())
    }

    async fn seed(cache: &DeviceCodesCache, device_code: &str, user_code: &str) {
        let record =
            DeviceCodeRecord::new(device_code.to_string(), "rp1".to_string(), None).unwrap();
        assert!(cache
            .store_device_code(&record, user_code, Duration::from_secs(300))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_pending_outcome() {
        let cache = test_cache();
        seed(&cache, "DC1", "UC1").await;

        let outcome = TokenPollHandler::new(cache)
            .handle(&DeviceTokenRequest::new("DC1"))
            .await
            .unwrap();
        assert_eq!(outcome, TokenPollOutcome::AuthorizationPending);
        assert_eq!(outcome.error_code(), Some("authorization_pending"));
    }

    #[tokio::test]
    async fn test_denied_outcome() {
        let cache = test_cache();
        seed(&cache, "DC1", "UC1").await;
        assert!(cache
            .update_device_state("DC1", &DeviceStateRecord::denied(), Duration::from_secs(300))
            .await
            .unwrap());

        let outcome = TokenPollHandler::new(cache)
            .handle(&DeviceTokenRequest::new("DC1"))
            .await
            .unwrap();
        assert_eq!(outcome, TokenPollOutcome::AccessDenied);
        assert_eq!(outcome.error_code(), Some("access_denied"));
    }

    #[tokio::test]
    async fn test_expired_outcome_for_unknown_code() {
        let outcome = TokenPollHandler::new(test_cache())
            .handle(&DeviceTokenRequest::new("NOSUCH"))
            .await
            .unwrap();
        assert_eq!(outcome, TokenPollOutcome::ExpiredToken);
        assert_eq!(outcome.error_code(), Some("expired_token"));
    }

    #[tokio::test]
    async fn test_approved_outcome_carries_remaining_lifetime() {
        let cache = test_cache();
        seed(&cache, "DC1", "UC1").await;
        let expires_at = now_millis() + 60_000;
        assert!(cache
            .update_device_state(
                "DC1",
                &DeviceStateRecord::approved("tok123".to_string(), expires_at),
                Duration::from_secs(300)
            )
            .await
            .unwrap());

        let outcome = TokenPollHandler::new(cache)
            .handle(&DeviceTokenRequest::new("DC1"))
            .await
            .unwrap();
        let TokenPollOutcome::Issued(response) = outcome else {
            panic!("expected an issued token");
        };
        assert_eq!(response.access_token, "tok123");
        assert_eq!(response.token_type, "Bearer");
        assert!(response.expires_in <= 60 && response.expires_in >= 58);
    }

    #[tokio::test]
    async fn test_poll_after_token_expiry_reports_zero_lifetime() {
        let cache = test_cache();
        seed(&cache, "DC1", "UC1").await;
        assert!(cache
            .update_device_state(
                "DC1",
                &DeviceStateRecord::approved("tok123".to_string(), now_millis() - 1),
                Duration::from_secs(300)
            )
            .await
            .unwrap());

        let outcome = TokenPollHandler::new(cache)
            .handle(&DeviceTokenRequest::new("DC1"))
            .await
            .unwrap();
        let TokenPollOutcome::Issued(response) = outcome else {
            panic!("expected an issued token");
        };
        assert_eq!(response.expires_in, 0);
    }

    #[tokio::test]
    async fn test_wrong_grant_type_is_invalid_message() {
        let request = DeviceTokenRequest {
            grant_type: "authorization_code".to_string(),
            device_code: "DC1".to_string(),
        };
        assert!(matches!(
            TokenPollHandler::new(test_cache()).handle(&request).await,
            Err(FlowError::InvalidMessage(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_device_code_is_invalid_message() {
        assert!(matches!(
            TokenPollHandler::new(test_cache())
                .handle(&DeviceTokenRequest::new(""))
                .await,
            Err(FlowError::InvalidMessage(_))
        ));
    }
}
