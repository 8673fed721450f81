//! Stored record shapes: the pairing record looked up by user code and the
//! state record looked up by device code.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Violations of the structural invariants a record must hold.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("device code must not be empty")]
    EmptyDeviceCode,
    #[error("client id must not be empty")]
    EmptyClientId,
    #[error("approved state requires an access token")]
    MissingAccessToken,
    #[error("an access token requires an expiry")]
    MissingExpiry,
}

/// The pairing record: the association of device code, relying party and
/// requested scope, stored under the user code. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCodeRecord {
    pub device_code: String,
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Vec<String>>,
}

impl DeviceCodeRecord {
    pub fn new(
        device_code: String,
        client_id: String,
        scope: Option<Vec<String>>,
    ) -> Result<Self, RecordError> {
        let record = Self {
            device_code,
            client_id,
            scope,
        };
        record.validate()?;
        Ok(record)
    }

    /// Check the structural invariants; applied to every decoded record so
    /// a corrupt store entry never reaches a handler.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.device_code.is_empty() {
            return Err(RecordError::EmptyDeviceCode);
        }
        if self.client_id.is_empty() {
            return Err(RecordError::EmptyClientId);
        }
        Ok(())
    }
}

/// Approval lifecycle of a device authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceState {
    Pending,
    Approved,
    Denied,
}

/// The state record stored under the device code.
///
/// Created as PENDING alongside the pairing record; the approval step
/// overwrites it exactly once with APPROVED or DENIED. The access token and
/// its expiry are present only for APPROVED records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStateRecord {
    pub state: DeviceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Absolute access-token expiry, epoch milliseconds. The wire name
    /// `expires_in` is kept for compatibility with existing stored records.
    #[serde(rename = "expires_in", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl DeviceStateRecord {
    pub fn new(
        state: DeviceState,
        access_token: Option<String>,
        expires_at: Option<u64>,
    ) -> Result<Self, RecordError> {
        let record = Self {
            state,
            access_token,
            expires_at,
        };
        record.validate()?;
        Ok(record)
    }

    /// Fresh record for a just-issued device code.
    pub fn pending() -> Self {
        Self {
            state: DeviceState::Pending,
            access_token: None,
            expires_at: None,
        }
    }

    pub fn approved(access_token: String, expires_at: u64) -> Self {
        Self {
            state: DeviceState::Approved,
            access_token: Some(access_token),
            expires_at: Some(expires_at),
        }
    }

    pub fn denied() -> Self {
        Self {
            state: DeviceState::Denied,
            access_token: None,
            expires_at: None,
        }
    }

    /// Check the structural invariants; applied to every decoded record so
    /// a corrupt store entry never reaches a handler.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.state == DeviceState::Approved && self.access_token.is_none() {
            return Err(RecordError::MissingAccessToken);
        }
        if self.access_token.is_some() && self.expires_at.is_none() {
            return Err(RecordError::MissingExpiry);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_code_record_round_trip() {
        let record = DeviceCodeRecord::new(
            "deviceCode_XYZ".to_string(),
            "clientID_XYZ".to_string(),
            Some(vec!["scope_XYZ".to_string()]),
        )
        .unwrap();

        let serialized = serde_json::to_string(&record).unwrap();
        let decoded: DeviceCodeRecord = serde_json::from_str(&serialized).unwrap();
        assert_eq!(record, decoded);
    }

    #[test]
    fn test_device_code_record_without_scope() {
        let record =
            DeviceCodeRecord::new("dc".to_string(), "rp".to_string(), None).unwrap();
        let serialized = serde_json::to_string(&record).unwrap();
        assert!(!serialized.contains("scope"));
        let decoded: DeviceCodeRecord = serde_json::from_str(&serialized).unwrap();
        assert_eq!(decoded.scope, None);
    }

    #[test]
    fn test_device_code_record_rejects_empty_fields() {
        assert_eq!(
            DeviceCodeRecord::new(String::new(), "rp".to_string(), None),
            Err(RecordError::EmptyDeviceCode)
        );
        assert_eq!(
            DeviceCodeRecord::new("dc".to_string(), String::new(), None),
            Err(RecordError::EmptyClientId)
        );
    }

    #[test]
    fn test_state_record_round_trip_all_states() {
        for record in [
            DeviceStateRecord::pending(),
            DeviceStateRecord::approved("tok123".to_string(), 171_717_171),
            DeviceStateRecord::denied(),
        ] {
            let serialized = serde_json::to_string(&record).unwrap();
            let decoded: DeviceStateRecord = serde_json::from_str(&serialized).unwrap();
            assert_eq!(record, decoded);
        }
    }

    #[test]
    fn test_state_record_wire_names() {
        let record = DeviceStateRecord::approved("tok123".to_string(), 171_717_171);
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&record).unwrap()).unwrap();
        assert_eq!(value["state"], "APPROVED");
        assert_eq!(value["access_token"], "tok123");
        assert_eq!(value["expires_in"], 171_717_171);

        let pending = serde_json::to_string(&DeviceStateRecord::pending()).unwrap();
        assert_eq!(pending, r#"{"state":"PENDING"}"#);
    }

    #[test]
    fn test_state_record_invariants() {
        assert_eq!(
            DeviceStateRecord::new(DeviceState::Approved, None, None),
            Err(RecordError::MissingAccessToken)
        );
        assert_eq!(
            DeviceStateRecord::new(DeviceState::Approved, Some("tok".to_string()), None),
            Err(RecordError::MissingExpiry)
        );
        assert_eq!(
            DeviceStateRecord::new(DeviceState::Denied, Some("tok".to_string()), None),
            Err(RecordError::MissingExpiry)
        );
        assert!(DeviceStateRecord::new(DeviceState::Denied, None, None).is_ok());
    }
}
