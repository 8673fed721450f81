//! Boundary to the external token-issuance collaborator. The approval
//! handler asks an [`AccessTokenIssuer`] for the opaque access-token payload
//! it stores in an APPROVED state record; claims construction and
//! cryptographic sealing live behind this trait.

use crate::codes::{IdentifierGenerator, SecureRandomIdentifierGenerator};
use crate::storage::now_millis;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct TokenIssuanceError(pub String);

/// An issued access token and its absolute expiry in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_at: u64,
}

#[async_trait]
pub trait AccessTokenIssuer: Send + Sync {
    /// Issue an access token for the given relying party and scope, valid
    /// for `lifetime` from now.
    async fn issue(
        &self,
        client_id: &str,
        scope: Option<&[String]>,
        lifetime: Duration,
    ) -> Result<IssuedToken, TokenIssuanceError>;
}

/// Issuer of unstructured random bearer tokens. Suitable when a reference
/// table maps tokens back to grants; deployments sealing claims into the
/// token bring their own [`AccessTokenIssuer`].
pub struct OpaqueTokenIssuer {
    generator: SecureRandomIdentifierGenerator,
}

impl OpaqueTokenIssuer {
    pub fn new() -> Self {
        Self {
            generator: SecureRandomIdentifierGenerator::default(),
        }
    }
}

impl Default for OpaqueTokenIssuer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccessTokenIssuer for OpaqueTokenIssuer {
    async fn issue(
        &self,
        _client_id: &str,
        _scope: Option<&[String]>,
        lifetime: Duration,
    ) -> Result<IssuedToken, TokenIssuanceError> {
        Ok(IssuedToken {
            access_token: self.generator.generate_identifier(),
            expires_at: now_millis() + lifetime.as_millis() as u64,
        })
    }
}
