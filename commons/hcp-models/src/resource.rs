use crate::internal_id::InternalId;
use crate::provisioning::ProvisioningState;
use crate::records::{LocalIdentity, ResourceRecord, SystemData, Tags};
use crate::resource_id::ResourceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Envelope fields shared by every tracked resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackedResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_data: Option<SystemData>,
}

impl TrackedResource {
    pub fn for_id(id: &ResourceId, location: &str) -> Self {
        Self {
            id: Some(id.clone()),
            name: Some(id.name().to_string()),
            resource_type: Some(id.resource_type().to_string()),
            location: Some(location.to_string()),
            tags: None,
            system_data: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserAssignedIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedServiceIdentity {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub identity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub user_assigned_identities: BTreeMap<String, UserAssignedIdentity>,
}

impl ManagedServiceIdentity {
    pub fn to_local(&self) -> LocalIdentity {
        LocalIdentity {
            principal_id: self.principal_id.clone(),
            tenant_id: self.tenant_id.clone(),
            r#type: self.identity_type.clone(),
        }
    }
}

/// Fields owned by this service rather than the control plane. Never
/// serialized into API payloads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceProviderProperties {
    pub internal_id: Option<InternalId>,
    pub active_operation_id: Option<String>,
    pub storage_uid: Option<String>,
}

/// Access to the parts of a resource model the overlay engine touches.
pub trait ResourceModel: Clone + Send + Sync {
    fn resource(&self) -> &TrackedResource;
    fn resource_mut(&mut self) -> &mut TrackedResource;
    fn service(&self) -> &ServiceProviderProperties;
    fn service_mut(&mut self) -> &mut ServiceProviderProperties;
    fn provisioning_state(&self) -> Option<ProvisioningState>;
    fn set_provisioning_state(&mut self, state: Option<ProvisioningState>);

    fn identity(&self) -> Option<&ManagedServiceIdentity> {
        None
    }

    /// `None` for kinds that carry no managed identity.
    fn identity_mut(&mut self) -> Option<&mut Option<ManagedServiceIdentity>> {
        None
    }

    /// Local bookkeeping derived from this model, as written on create.
    fn to_record(&self, external_id: &ResourceId) -> ResourceRecord {
        let mut record = ResourceRecord::new(external_id.clone());
        record.internal_id = self.service().internal_id.clone();
        record.tags = self.resource().tags.clone();
        record.system_data = self.resource().system_data.clone();
        record.identity = self.identity().map(|i| i.to_local());
        record
    }
}

macro_rules! impl_resource_model {
    ($ty:ty $(, $identity:ident)?) => {
        impl $crate::resource::ResourceModel for $ty {
            fn resource(&self) -> &$crate::resource::TrackedResource {
                &self.resource
            }

            fn resource_mut(&mut self) -> &mut $crate::resource::TrackedResource {
                &mut self.resource
            }

            fn service(&self) -> &$crate::resource::ServiceProviderProperties {
                &self.service
            }

            fn service_mut(
                &mut self,
            ) -> &mut $crate::resource::ServiceProviderProperties {
                &mut self.service
            }

            fn provisioning_state(
                &self,
            ) -> Option<$crate::provisioning::ProvisioningState> {
                self.properties.provisioning_state
            }

            fn set_provisioning_state(
                &mut self,
                state: Option<$crate::provisioning::ProvisioningState>,
            ) {
                self.properties.provisioning_state = state;
            }

            $(
            fn identity(&self) -> Option<&$crate::resource::ManagedServiceIdentity> {
                self.$identity.as_ref()
            }

            fn identity_mut(
                &mut self,
            ) -> Option<&mut Option<$crate::resource::ManagedServiceIdentity>> {
                Some(&mut self.$identity)
            }
            )?
        }
    };
}

pub(crate) use impl_resource_model;
