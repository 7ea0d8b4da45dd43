use crate::cloud_error::{CloudErrorBody, codes};
use crate::internal_id::InternalId;
use crate::provisioning::{OperationRequest, ProvisioningState};
use crate::resource_id::ResourceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Tags = BTreeMap<String, String>;

/// Request-scoped identifiers threaded through every record written by one request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationData {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_request_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub correlation_request_id: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl CorrelationData {
    pub fn new(client_request_id: &str, correlation_request_id: &str) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            client_request_id: client_request_id.to_string(),
            correlation_request_id: correlation_request_id.to_string(),
            timestamp: Some(Utc::now()),
        }
    }
}

/// Audit metadata supplied by the resource manager on each write.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SystemData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_at: Option<DateTime<Utc>>,
}

/// The persisted part of a managed identity. User-assigned identities are
/// never stored; they are rebuilt from the control plane on every read.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocalIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
}

/// Local bookkeeping for one externally addressable resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecord {
    pub uid: String,
    pub external_id: ResourceId,
    pub internal_id: Option<InternalId>,
    pub provisioning_state: ProvisioningState,
    pub active_operation_id: Option<String>,
    pub tags: Option<Tags>,
    pub system_data: Option<SystemData>,
    pub identity: Option<LocalIdentity>,
}

impl ResourceRecord {
    pub fn new(external_id: ResourceId) -> Self {
        Self {
            uid: uuid::Uuid::new_v4().to_string(),
            external_id,
            internal_id: None,
            provisioning_state: ProvisioningState::Accepted,
            active_operation_id: None,
            tags: None,
            system_data: None,
            identity: None,
        }
    }
}

/// Sparse update of a [`ResourceRecord`]. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceRecordPatch {
    pub provisioning_state: Option<ProvisioningState>,
    pub active_operation_id: Option<Option<String>>,
    pub internal_id: Option<InternalId>,
    pub tags: Option<Option<Tags>>,
    pub system_data: Option<SystemData>,
    pub identity: Option<Option<LocalIdentity>>,
}

impl ResourceRecordPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provisioning_state(mut self, state: ProvisioningState) -> Self {
        self.provisioning_state = Some(state);
        self
    }

    pub fn active_operation_id(mut self, id: Option<String>) -> Self {
        self.active_operation_id = Some(id);
        self
    }

    pub fn internal_id(mut self, id: InternalId) -> Self {
        self.internal_id = Some(id);
        self
    }

    pub fn tags(mut self, tags: Option<Tags>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn system_data(mut self, system_data: SystemData) -> Self {
        self.system_data = Some(system_data);
        self
    }

    pub fn identity(mut self, identity: Option<LocalIdentity>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, record: &mut ResourceRecord) {
        if let Some(state) = self.provisioning_state {
            record.provisioning_state = state;
        }
        if let Some(id) = &self.active_operation_id {
            record.active_operation_id = id.clone();
        }
        if let Some(id) = &self.internal_id {
            record.internal_id = Some(id.clone());
        }
        if let Some(tags) = &self.tags {
            record.tags = tags.clone();
        }
        if let Some(system_data) = &self.system_data {
            record.system_data = Some(system_data.clone());
        }
        if let Some(identity) = &self.identity {
            record.identity = identity.clone();
        }
    }
}

/// Durable record of one asynchronous request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationRecord {
    /// Storage name of the operation; also what `ActiveOperationID` points at.
    pub id: String,
    /// Externally visible status path. `None` for operations that are not
    /// exposed for polling (e.g. cascaded child deletes).
    pub operation_id: Option<ResourceId>,
    pub request: OperationRequest,
    pub external_id: ResourceId,
    pub internal_id: Option<InternalId>,
    pub status: ProvisioningState,
    pub error: Option<CloudErrorBody>,
    pub start_time: DateTime<Utc>,
    pub last_transition_time: DateTime<Utc>,
    pub correlation: Option<CorrelationData>,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub notification_uri: String,
}

impl OperationRecord {
    pub fn new(
        request: OperationRequest,
        external_id: ResourceId,
        internal_id: Option<InternalId>,
        correlation: Option<CorrelationData>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation_id: None,
            request,
            external_id,
            internal_id,
            status: request.initial_status(),
            error: None,
            start_time: now,
            last_transition_time: now,
            correlation,
            tenant_id: String::new(),
            client_id: String::new(),
            notification_uri: String::new(),
        }
    }

    /// Makes the operation pollable by the caller that created it.
    pub fn expose(
        mut self,
        location: &str,
        tenant_id: &str,
        client_id: &str,
        notification_uri: &str,
    ) -> Self {
        self.operation_id = Some(ResourceId::operation_status(
            self.external_id.subscription_id(),
            location,
            &self.id,
        ));
        self.tenant_id = tenant_id.to_string();
        self.client_id = client_id.to_string();
        self.notification_uri = notification_uri.to_string();
        self
    }

    /// Returns true if anything changed.
    pub fn update_status(
        &mut self,
        status: ProvisioningState,
        error: Option<CloudErrorBody>,
    ) -> bool {
        if self.status == status && self.error == error {
            return false;
        }
        self.status = status;
        self.error = error;
        self.last_transition_time = Utc::now();
        true
    }

    pub fn cancel(&mut self) -> bool {
        self.update_status(
            ProvisioningState::Canceled,
            Some(CloudErrorBody::new(
                codes::CANCELED,
                "This operation was superseded by another",
            )),
        )
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.status.is_terminal().then_some(self.last_transition_time)
    }

    pub fn to_status(&self) -> OperationStatusView {
        OperationStatusView {
            id: self.operation_id.as_ref().map(|id| id.to_string()),
            name: self.id.clone(),
            status: self.status,
            start_time: self.start_time,
            end_time: self.end_time(),
            error: self.error.clone(),
        }
    }
}

/// Status projection returned to pollers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatusView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub status: ProvisioningState,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CloudErrorBody>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_id() -> ResourceId {
        ResourceId::cluster("sub", "rg", "dev")
    }

    #[test]
    fn end_time_only_once_terminal() {
        let mut op =
            OperationRecord::new(OperationRequest::Create, cluster_id(), None, None);
        assert_eq!(op.status, ProvisioningState::Accepted);
        assert!(op.end_time().is_none());
        assert!(op.update_status(ProvisioningState::Succeeded, None));
        assert_eq!(op.end_time(), Some(op.last_transition_time));
        assert!(!op.update_status(ProvisioningState::Succeeded, None));
    }

    #[test]
    fn cancel_sets_error_body() {
        let mut op =
            OperationRecord::new(OperationRequest::Update, cluster_id(), None, None);
        assert!(op.cancel());
        assert_eq!(op.status, ProvisioningState::Canceled);
        assert_eq!(op.error.as_ref().unwrap().code, codes::CANCELED);
    }

    #[test]
    fn expose_builds_status_path() {
        let op = OperationRecord::new(OperationRequest::Delete, cluster_id(), None, None)
            .expose("westus", "tenant", "client", "");
        let path = op.operation_id.clone().unwrap();
        assert_eq!(path.subscription_id(), "sub");
        assert_eq!(path.location(), Some("westus"));
        assert_eq!(path.name(), op.id);
        assert_eq!(op.status, ProvisioningState::Deleting);
    }

    #[test]
    fn patch_only_touches_set_fields() {
        let mut record = ResourceRecord::new(cluster_id());
        record.tags = Some(Tags::from([("a".into(), "1".into())]));
        ResourceRecordPatch::new()
            .provisioning_state(ProvisioningState::Deleting)
            .active_operation_id(Some("op".into()))
            .apply(&mut record);
        assert_eq!(record.provisioning_state, ProvisioningState::Deleting);
        assert_eq!(record.active_operation_id.as_deref(), Some("op"));
        assert_eq!(record.tags.as_ref().unwrap().len(), 1);
    }
}
