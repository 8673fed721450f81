//! Device authorization entry point: generates the device/user code pair,
//! installs the linked records, and forms the success response.

use crate::cache::DeviceCodesCache;
use crate::codes::{
    clip_identifier, IdentifierGenerator, SecureRandomIdentifierGenerator, UserCodeGenerator,
};
use crate::config::DeviceFlowConfig;
use crate::flow::FlowError;
use crate::records::DeviceCodeRecord;
use log::{debug, error};
use serde::Serialize;
use std::sync::Arc;

/// How many fresh code pairs to try before giving up on a colliding store.
const MAX_STORE_ATTEMPTS: usize = 5;

/// An incoming device authorization request, already decoded from its HTTP
/// envelope by the caller.
#[derive(Debug, Clone)]
pub struct DeviceAuthorizationRequest {
    /// Relying party identifier, from a request parameter or from client
    /// authentication.
    pub client_id: String,
    /// Requested scope tokens, if any.
    pub scope: Option<Vec<String>>,
}

/// Device authorization success response (RFC 8628 §3.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceAuthorizationResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_uri_complete: Option<String>,
    /// Lifetime of the codes in seconds.
    pub expires_in: u64,
    /// Minimum seconds the device should wait between polls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
}

pub struct DeviceAuthorizationHandler {
    cache: Arc<DeviceCodesCache>,
    config: DeviceFlowConfig,
    device_code_generator: Box<dyn IdentifierGenerator>,
    user_code_generator: Box<dyn IdentifierGenerator>,
}

impl DeviceAuthorizationHandler {
    pub fn new(cache: Arc<DeviceCodesCache>, config: DeviceFlowConfig) -> Self {
        Self {
            cache,
            config,
            device_code_generator: Box::new(SecureRandomIdentifierGenerator::default()),
            user_code_generator: Box::new(UserCodeGenerator::default()),
        }
    }

    /// Replace the default generators, e.g. to widen the user-code alphabet.
    pub fn with_generators(
        mut self,
        device_code_generator: Box<dyn IdentifierGenerator>,
        user_code_generator: Box<dyn IdentifierGenerator>,
    ) -> Self {
        self.device_code_generator = device_code_generator;
        self.user_code_generator = user_code_generator;
        self
    }

    /// Issue a device/user code pair for the request.
    ///
    /// On a code collision the pair is regenerated and the store retried, up
    /// to [`MAX_STORE_ATTEMPTS`] times. A generator producing identifiers
    /// shorter than the configured length aborts immediately as a
    /// configuration error.
    pub async fn handle(
        &self,
        request: &DeviceAuthorizationRequest,
    ) -> Result<DeviceAuthorizationResponse, FlowError> {
        if request.client_id.is_empty() {
            return Err(FlowError::InvalidMessage("no client id".to_string()));
        }

        for attempt in 1..=MAX_STORE_ATTEMPTS {
            let device_code = clip_identifier(
                &self.device_code_generator.generate_identifier(),
                self.config.device_code_length,
            )
            .map_err(FlowError::Config)?;
            let user_code = clip_identifier(
                &self.user_code_generator.generate_identifier(),
                self.config.user_code_length,
            )
            .map_err(FlowError::Config)?;

            let record = DeviceCodeRecord::new(
                device_code.clone(),
                request.client_id.clone(),
                request.scope.clone(),
            )?;

            debug!(
                "Storing device code record for client {} per user code {}",
                request.client_id, user_code
            );
            if self
                .cache
                .store_device_code(&record, &user_code, self.config.code_lifetime())
                .await?
            {
                return Ok(self.response(device_code, user_code));
            }
            debug!(
                "Code collision on attempt {} of {}, regenerating",
                attempt, MAX_STORE_ATTEMPTS
            );
        }

        error!(
            "Failed to store device codes for client {} after {} attempts",
            request.client_id, MAX_STORE_ATTEMPTS
        );
        Err(FlowError::CodesExhausted(MAX_STORE_ATTEMPTS))
    }

    fn response(&self, device_code: String, user_code: String) -> DeviceAuthorizationResponse {
        let verification_uri = self.config.verification_uri.clone();
        let verification_uri_complete =
            format!("{}?user_code={}", verification_uri, user_code);
        DeviceAuthorizationResponse {
            device_code,
            user_code,
            verification_uri,
            verification_uri_complete: Some(verification_uri_complete),
            expires_in: self.config.code_lifetime_secs,
            interval: Some(self.config.interval_secs),
        }
    }
}
