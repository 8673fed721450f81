//! Approval entry point: resolves the user code the human entered, obtains
//! an access token from the issuance collaborator when approved, and records
//! the terminal decision on the state record.

use crate::cache::DeviceCodesCache;
use crate::config::DeviceFlowConfig;
use crate::flow::FlowError;
use crate::issuer::AccessTokenIssuer;
use crate::records::{DeviceState, DeviceStateRecord};
use log::{debug, error};
use std::collections::HashMap;
use std::sync::Arc;

/// Parameter name the default user-code lookup reads.
pub const USER_CODE_PARAM: &str = "user_code";

/// Parameter name the default approval lookup reads; any value other than
/// `"true"` counts as a denial.
pub const APPROVAL_PARAM: &str = "approved";

/// Contextual state the surrounding web flow collected before invoking the
/// approval step: the verification form fields plus whatever the upstream
/// authentication and consent steps recorded.
#[derive(Debug, Clone, Default)]
pub struct ApprovalContext {
    pub params: HashMap<String, String>,
}

impl ApprovalContext {
    pub fn new(user_code: impl Into<String>, approved: bool) -> Self {
        let mut params = HashMap::new();
        params.insert(USER_CODE_PARAM.to_string(), user_code.into());
        params.insert(APPROVAL_PARAM.to_string(), approved.to_string());
        Self { params }
    }
}

/// Pluggable strategy locating the user code in the approval context.
pub type UserCodeLookup = Box<dyn Fn(&ApprovalContext) -> Option<String> + Send + Sync>;

/// Pluggable strategy locating the user's decision in the approval context.
pub type ApprovalLookup = Box<dyn Fn(&ApprovalContext) -> bool + Send + Sync>;

pub struct ApprovalHandler {
    cache: Arc<DeviceCodesCache>,
    issuer: Arc<dyn AccessTokenIssuer>,
    config: DeviceFlowConfig,
    user_code_lookup: UserCodeLookup,
    approval_lookup: ApprovalLookup,
}

impl ApprovalHandler {
    pub fn new(
        cache: Arc<DeviceCodesCache>,
        issuer: Arc<dyn AccessTokenIssuer>,
        config: DeviceFlowConfig,
    ) -> Self {
        Self {
            cache,
            issuer,
            config,
            user_code_lookup: Box::new(|ctx| ctx.params.get(USER_CODE_PARAM).cloned()),
            approval_lookup: Box::new(|ctx| {
                ctx.params.get(APPROVAL_PARAM).map(String::as_str) == Some("true")
            }),
        }
    }

    /// Replace the default user-code lookup, e.g. to read a differently
    /// named form field.
    pub fn with_user_code_lookup(mut self, lookup: UserCodeLookup) -> Self {
        self.user_code_lookup = lookup;
        self
    }

    /// Replace the default approval lookup.
    pub fn with_approval_lookup(mut self, lookup: ApprovalLookup) -> Self {
        self.approval_lookup = lookup;
        self
    }

    /// Record the user's decision for the pending request identified by the
    /// user code in `context`. Returns the terminal state that was stored.
    pub async fn handle(&self, context: &ApprovalContext) -> Result<DeviceState, FlowError> {
        let user_code = (self.user_code_lookup)(context)
            .filter(|code| !code.is_empty())
            .ok_or_else(|| FlowError::InvalidMessage("no user code".to_string()))?;

        let Some(pairing) = self.cache.get_device_code(&user_code).await? else {
            error!("No device code found for the presented user code");
            return Err(FlowError::InvalidMessage(
                "unknown or expired user code".to_string(),
            ));
        };

        let record = if (self.approval_lookup)(context) {
            let issued = self
                .issuer
                .issue(
                    &pairing.client_id,
                    pairing.scope.as_deref(),
                    self.config.access_token_lifetime(),
                )
                .await
                .map_err(|e| FlowError::TokenIssuance(e.to_string()))?;
            DeviceStateRecord::approved(issued.access_token, issued.expires_at)
        } else {
            DeviceStateRecord::denied()
        };

        if !self
            .cache
            .update_device_state(&pairing.device_code, &record, self.config.code_lifetime())
            .await?
        {
            error!(
                "Unable to update device state for device code {}: no record to update",
                pairing.device_code
            );
            return Err(FlowError::InvalidMessage(
                "device code state no longer present".to_string(),
            ));
        }
        debug!(
            "Device {} state updated as {:?}",
            pairing.device_code, record.state
        );
        Ok(record.state)
    }
}
