//! Server-side state machine for the OAuth 2.0 Device Authorization Grant
//! (RFC 8628).
//!
//! The crate is a library invoked by request-handling code; it owns the
//! device/user code lifecycle and nothing else. A device obtains a code pair
//! through [`flow::authorize::DeviceAuthorizationHandler`], the user's
//! decision on a second device is recorded through
//! [`flow::approve::ApprovalHandler`], and the device's polling loop is
//! answered by [`flow::poll::TokenPollHandler`]. All three share a
//! [`cache::DeviceCodesCache`] over a pluggable [`storage::Storage`]
//! backend (in-memory or Redis).
//!
//! HTTP envelope handling, user authentication, consent UI, and access-token
//! claims/sealing are external collaborators reached through the request
//! structs and the [`issuer::AccessTokenIssuer`] trait.

pub mod cache;
pub mod codes;
pub mod config;
pub mod flow;
pub mod issuer;
pub mod records;
pub mod storage;

pub use cache::{CacheError, DeviceCodesCache};
pub use config::DeviceFlowConfig;
pub use flow::approve::{ApprovalContext, ApprovalHandler};
pub use flow::authorize::{
    DeviceAuthorizationHandler, DeviceAuthorizationRequest, DeviceAuthorizationResponse,
};
pub use flow::poll::{DeviceTokenRequest, DeviceTokenResponse, TokenPollHandler, TokenPollOutcome};
pub use flow::FlowError;
pub use records::{DeviceCodeRecord, DeviceState, DeviceStateRecord};
pub use storage::{Storage, StorageBackend, StorageError};
