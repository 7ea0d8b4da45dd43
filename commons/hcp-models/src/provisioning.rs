use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a resource or of an asynchronous operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProvisioningState {
    Accepted,
    Provisioning,
    Updating,
    Deleting,
    Succeeded,
    Failed,
    Canceled,
}

impl ProvisioningState {
    pub const ALL: [ProvisioningState; 7] = [
        ProvisioningState::Accepted,
        ProvisioningState::Provisioning,
        ProvisioningState::Updating,
        ProvisioningState::Deleting,
        ProvisioningState::Succeeded,
        ProvisioningState::Failed,
        ProvisioningState::Canceled,
    ];

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProvisioningState::Succeeded
                | ProvisioningState::Failed
                | ProvisioningState::Canceled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisioningState::Accepted => "Accepted",
            ProvisioningState::Provisioning => "Provisioning",
            ProvisioningState::Updating => "Updating",
            ProvisioningState::Deleting => "Deleting",
            ProvisioningState::Succeeded => "Succeeded",
            ProvisioningState::Failed => "Failed",
            ProvisioningState::Canceled => "Canceled",
        }
    }
}

impl Default for ProvisioningState {
    fn default() -> Self {
        Self::Accepted
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProvisioningState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown provisioning state '{s}'"))
    }
}

/// Kind of mutating request an operation record was created for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OperationRequest {
    Create,
    Update,
    Delete,
    RequestCredential,
    RevokeCredentials,
}

impl OperationRequest {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationRequest::Create => "Create",
            OperationRequest::Update => "Update",
            OperationRequest::Delete => "Delete",
            OperationRequest::RequestCredential => "RequestCredential",
            OperationRequest::RevokeCredentials => "RevokeCredentials",
        }
    }

    /// Lowercase verb used in conflict messages.
    pub fn verb(&self) -> &'static str {
        match self {
            OperationRequest::Create => "create",
            OperationRequest::Update => "update",
            OperationRequest::Delete => "delete",
            OperationRequest::RequestCredential => "request credential for",
            OperationRequest::RevokeCredentials => "revoke credentials for",
        }
    }

    /// Status a freshly created operation record starts in.
    pub fn initial_status(&self) -> ProvisioningState {
        match self {
            OperationRequest::Delete => ProvisioningState::Deleting,
            _ => ProvisioningState::Accepted,
        }
    }
}

impl fmt::Display for OperationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        let terminal: Vec<_> = ProvisioningState::ALL
            .iter()
            .filter(|s| s.is_terminal())
            .copied()
            .collect();
        assert_eq!(
            terminal,
            vec![
                ProvisioningState::Succeeded,
                ProvisioningState::Failed,
                ProvisioningState::Canceled
            ]
        );
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(
            "deleting".parse::<ProvisioningState>().unwrap(),
            ProvisioningState::Deleting
        );
        assert!("gone".parse::<ProvisioningState>().is_err());
    }

    #[test]
    fn delete_operations_start_deleting() {
        assert_eq!(
            OperationRequest::Delete.initial_status(),
            ProvisioningState::Deleting
        );
        assert_eq!(
            OperationRequest::Update.initial_status(),
            ProvisioningState::Accepted
        );
    }
}
