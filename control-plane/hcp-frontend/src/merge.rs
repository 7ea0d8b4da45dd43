//! Overlay of locally owned bookkeeping onto models rebuilt from the
//! control plane, plus request-body application.

use crate::errors::{FrontendError, FrontendResult};
use hcp_models::{
    FieldError, ManagedServiceIdentity, ResourceId, ResourceModel, ResourceRecord, Tags,
    codes,
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// A field whose value comes from the local record rather than the
/// control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalField {
    Tags,
    SystemData,
    ProvisioningState,
    ActiveOperationId,
    InternalId,
    Identity,
}

pub const CLUSTER_LOCAL_FIELDS: &[LocalField] = &[
    LocalField::Tags,
    LocalField::SystemData,
    LocalField::ProvisioningState,
    LocalField::ActiveOperationId,
    LocalField::InternalId,
    LocalField::Identity,
];

pub const CHILD_LOCAL_FIELDS: &[LocalField] = &[
    LocalField::Tags,
    LocalField::SystemData,
    LocalField::ProvisioningState,
    LocalField::ActiveOperationId,
    LocalField::InternalId,
];

/// Copies the listed local fields from `record` onto `model`.
///
/// The resource path always comes from the record so responses keep the
/// caller's original casing. The user-assigned identity map is left as the
/// control plane reported it; only principal, tenant and type are local.
/// Applying the overlay more than once yields the same model.
pub fn overlay_record<M: ResourceModel>(model: &mut M, record: &ResourceRecord, fields: &[LocalField]) {
    let id = &record.external_id;
    let resource = model.resource_mut();
    resource.id = Some(id.clone());
    resource.name = Some(id.name().to_string());
    resource.resource_type = Some(id.resource_type().to_string());

    for field in fields {
        match field {
            LocalField::Tags => model.resource_mut().tags = record.tags.clone(),
            LocalField::SystemData => {
                model.resource_mut().system_data = record.system_data.clone()
            }
            LocalField::ProvisioningState => {
                model.set_provisioning_state(Some(record.provisioning_state))
            }
            LocalField::ActiveOperationId => {
                model.service_mut().active_operation_id = record.active_operation_id.clone()
            }
            LocalField::InternalId => {
                if record.internal_id.is_some() {
                    model.service_mut().internal_id = record.internal_id.clone();
                }
            }
            LocalField::Identity => {
                let (Some(slot), Some(local)) = (model.identity_mut(), &record.identity) else {
                    continue;
                };
                let identity = slot.get_or_insert_with(ManagedServiceIdentity::default);
                identity.principal_id = local.principal_id.clone();
                identity.tenant_id = local.tenant_id.clone();
                identity.identity_type = local.r#type.clone();
            }
        }
    }
    model.service_mut().storage_uid = Some(record.uid.clone());
}

/// RFC 7386 JSON merge patch: objects merge recursively, `null` removes a
/// member, anything else replaces the target.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Default::default());
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                merge_patch(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

/// Members the caller may not set; they are stripped from request bodies.
const READ_ONLY_MEMBERS: &[&str] = &["id", "name", "type", "systemData"];
const READ_ONLY_PROPERTIES: &[&str] = &["provisioningState"];

/// Applies a request body onto `base` and re-stamps the resource path.
pub fn apply_body<M>(base: &M, body: &Value, id: &ResourceId) -> FrontendResult<M>
where
    M: ResourceModel + Serialize + DeserializeOwned,
{
    if !body.is_object() {
        return Err(FrontendError::invalid_request(
            codes::INVALID_REQUEST_CONTENT,
            "Request body must be a JSON object",
            "",
        ));
    }
    check_body_name(body, id)?;

    let mut patch = body.clone();
    if let Value::Object(members) = &mut patch {
        for member in READ_ONLY_MEMBERS {
            members.remove(*member);
        }
        if let Some(Value::Object(properties)) = members.get_mut("properties") {
            for member in READ_ONLY_PROPERTIES {
                properties.remove(*member);
            }
        }
    }

    let mut merged = serde_json::to_value(base)
        .map_err(|e| FrontendError::Internal(format!("failed to encode model: {e}")))?;
    merge_patch(&mut merged, &patch);
    let mut model: M = serde_json::from_value(merged).map_err(|e| {
        FrontendError::invalid_request(codes::INVALID_REQUEST_CONTENT, e.to_string(), "")
    })?;

    // Serialization drops service-owned fields; carry them across.
    *model.service_mut() = base.service().clone();
    model.set_provisioning_state(base.provisioning_state());
    let resource = model.resource_mut();
    resource.id = Some(id.clone());
    resource.name = Some(id.name().to_string());
    resource.resource_type = Some(id.resource_type().to_string());
    resource.system_data = base.resource().system_data.clone();
    Ok(model)
}

fn check_body_name(body: &Value, id: &ResourceId) -> FrontendResult<()> {
    match body.get("name").and_then(Value::as_str) {
        Some(name) if !name.eq_ignore_ascii_case(id.name()) => Err(FrontendError::Validation(vec![
            FieldError::new(
                "name",
                format!(
                    "The resource name '{name}' in the request body does not match '{}'",
                    id.name()
                ),
            ),
        ])),
        _ => Ok(()),
    }
}

/// How a request body affects stored tags: `None` leaves them unchanged,
/// `Some(None)` clears them to null, `Some(Some(map))` replaces them. An
/// explicit empty object yields an empty map.
pub fn requested_tags(body: &Value) -> FrontendResult<Option<Option<Tags>>> {
    match body.get("tags") {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(tags) => serde_json::from_value(tags.clone())
            .map(|tags| Some(Some(tags)))
            .map_err(|e| {
                FrontendError::invalid_request(codes::INVALID_REQUEST_CONTENT, e.to_string(), "tags")
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hcp_models::{
        Cluster, InternalId, LocalIdentity, NodePool, ProvisioningState, SystemData,
        UserAssignedIdentity,
    };
    use serde_json::json;
    use std::collections::BTreeMap;

    fn record_for(id: &ResourceId) -> ResourceRecord {
        let mut record = ResourceRecord::new(id.clone());
        record.internal_id = Some(InternalId::cluster("abc"));
        record.provisioning_state = ProvisioningState::Updating;
        record.active_operation_id = Some("op-1".into());
        record.tags = Some(BTreeMap::from([("env".into(), "dev".into())]));
        record.system_data = Some(SystemData {
            created_by: Some("alice".into()),
            ..Default::default()
        });
        record.identity = Some(LocalIdentity {
            principal_id: Some("p".into()),
            tenant_id: Some("t".into()),
            r#type: Some("UserAssigned".into()),
        });
        record
    }

    #[test]
    fn overlay_is_idempotent() {
        let id = ResourceId::cluster("sub", "rg", "Dev");
        let record = record_for(&id);
        let mut external = Cluster::with_defaults(&ResourceId::cluster("sub", "rg", "dev"), "eastus");
        external.identity = Some(ManagedServiceIdentity {
            user_assigned_identities: BTreeMap::from([(
                "/mi/a".to_string(),
                UserAssignedIdentity::default(),
            )]),
            ..Default::default()
        });

        let mut once = external.clone();
        overlay_record(&mut once, &record, CLUSTER_LOCAL_FIELDS);
        let mut twice = once.clone();
        overlay_record(&mut twice, &record, CLUSTER_LOCAL_FIELDS);
        assert_eq!(once, twice);

        assert_eq!(once.resource.name.as_deref(), Some("Dev"));
        assert_eq!(once.properties.provisioning_state, Some(ProvisioningState::Updating));
        assert_eq!(once.service.active_operation_id.as_deref(), Some("op-1"));
        let identity = once.identity.unwrap();
        assert_eq!(identity.principal_id.as_deref(), Some("p"));
        assert_eq!(identity.user_assigned_identities.len(), 1);
    }

    #[test]
    fn merge_patch_follows_rfc7386() {
        let mut target = json!({"a": "b", "c": {"d": "e", "f": "g"}});
        merge_patch(&mut target, &json!({"a": "z", "c": {"f": null}, "n": [1]}));
        assert_eq!(target, json!({"a": "z", "c": {"d": "e"}, "n": [1]}));
    }

    #[test]
    fn body_keeps_unspecified_fields_of_base() {
        let id = ResourceId::cluster("sub", "rg", "dev").child("nodePools", "np1");
        let mut base = NodePool::with_defaults(&id, "eastus");
        base.properties.vm_size = Some("Standard_D4s_v3".into());
        base.properties.provisioning_state = Some(ProvisioningState::Succeeded);

        let body = json!({"properties": {"replicas": 3, "provisioningState": "Failed"}});
        let model = apply_body(&base, &body, &id).unwrap();
        assert_eq!(model.properties.replicas, Some(3));
        assert_eq!(model.properties.vm_size.as_deref(), Some("Standard_D4s_v3"));
        assert_eq!(model.properties.provisioning_state, Some(ProvisioningState::Succeeded));
    }

    #[test]
    fn mismatched_body_name_is_rejected() {
        let id = ResourceId::cluster("sub", "rg", "dev");
        let base = Cluster::with_defaults(&id, "eastus");
        let err = apply_body(&base, &json!({"name": "other"}), &id).unwrap_err();
        assert!(matches!(err, FrontendError::Validation(_)));
        assert!(apply_body(&base, &json!({"name": "DEV"}), &id).is_ok());
    }

    #[test]
    fn tags_rule_distinguishes_absent_empty_and_null() {
        assert_eq!(requested_tags(&json!({})).unwrap(), None);
        assert_eq!(requested_tags(&json!({"tags": {}})).unwrap(), Some(Some(BTreeMap::new())));
        assert_eq!(requested_tags(&json!({"tags": null})).unwrap(), Some(None));
        assert!(requested_tags(&json!({"tags": 5})).is_err());
    }
}
