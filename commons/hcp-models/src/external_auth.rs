use crate::cloud_error::FieldError;
use crate::provisioning::ProvisioningState;
use crate::resource::{ServiceProviderProperties, TrackedResource, impl_resource_model};
use crate::resource_id::ResourceId;
use crate::validation::{check_immutable, field_errors, validate_one_of, validate_resource_name};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const CLIENT_TYPES: &[&str] = &["Confidential", "Public"];
pub const PREFIX_POLICIES: &[&str] = &["", "None", "NoPrefix", "Prefix"];
pub const DEFAULT_PREFIX_POLICY: &str = "None";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
pub struct ExternalAuth {
    #[serde(flatten)]
    pub resource: TrackedResource,
    #[serde(default)]
    #[validate(nested)]
    pub properties: ExternalAuthProperties,
    #[serde(skip)]
    pub service: ServiceProviderProperties,
}

impl_resource_model!(ExternalAuth);

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAuthClient {
    #[validate(length(min = 1, max = 256, message = "Component name must be 1-256 characters"))]
    pub component_name: String,
    #[validate(length(min = 1, max = 63, message = "Component namespace must be 1-63 characters"))]
    pub component_namespace: String,
    #[validate(length(min = 1, message = "Client id cannot be empty"))]
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_scopes: Vec<String>,
    pub client_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RequiredClaim {
    #[validate(length(min = 1, message = "Claim cannot be empty"))]
    pub claim: String,
    #[validate(length(min = 1, message = "Required value cannot be empty"))]
    pub required_value: String,
}

/// OIDC provider settings, flattened from the nested API shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAuthProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url(message = "Issuer URL must be a valid URL"))]
    pub issuer_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[validate(length(max = 10, message = "At most 10 audiences are allowed"))]
    pub issuer_audiences: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_ca: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[validate(length(max = 20, message = "At most 20 clients are allowed"), nested)]
    pub clients: Vec<ExternalAuthClient>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 256, message = "Username claim must be at most 256 characters"))]
    pub username_claim: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_prefix_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 256, message = "Groups claim must be at most 256 characters"))]
    pub groups_claim: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[validate(nested)]
    pub validation_rules: Vec<RequiredClaim>,
}

impl ExternalAuth {
    pub fn with_defaults(id: &ResourceId) -> Self {
        let mut resource = TrackedResource::for_id(id, "");
        resource.location = None;
        Self {
            resource,
            properties: ExternalAuthProperties {
                username_prefix_policy: Some(DEFAULT_PREFIX_POLICY.to_string()),
                ..Default::default()
            },
            service: ServiceProviderProperties::default(),
        }
    }

    pub fn carry_forward_from(&mut self, old: &ExternalAuth) {
        self.properties.provisioning_state = old.properties.provisioning_state;
        self.resource.system_data = old.resource.system_data.clone();
        self.service = old.service.clone();
    }
}

pub fn validate_external_auth_create(auth: &ExternalAuth) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if let Err(e) = auth.validate() {
        errors.extend(field_errors("", &e));
    }
    if let Some(name) = &auth.resource.name {
        validate_resource_name(name, 3, 15, true, &mut errors);
    }
    let p = &auth.properties;
    match p.issuer_url.as_deref() {
        None | Some("") => errors.push(FieldError::new(
            "properties.issuerUrl",
            "Missing required field 'issuerUrl'",
        )),
        Some(url) if !url.starts_with("https://") => errors.push(FieldError::new(
            "properties.issuerUrl",
            format!("Issuer URL '{url}' must use https"),
        )),
        _ => {}
    }
    if p.issuer_audiences.is_empty() {
        errors.push(FieldError::new(
            "properties.issuerAudiences",
            "At least one audience is required",
        ));
    }
    if p.username_claim.as_deref().unwrap_or_default().is_empty() {
        errors.push(FieldError::new(
            "properties.usernameClaim",
            "Missing required field 'usernameClaim'",
        ));
    }
    validate_one_of(
        "properties.usernamePrefixPolicy",
        p.username_prefix_policy.as_deref(),
        PREFIX_POLICIES,
        &mut errors,
    );
    let has_prefix = !p.username_prefix.as_deref().unwrap_or_default().is_empty();
    let prefix_policy = p
        .username_prefix_policy
        .as_deref()
        .is_some_and(|v| v.eq_ignore_ascii_case("Prefix"));
    if has_prefix != prefix_policy {
        errors.push(FieldError::new(
            "properties.usernamePrefix",
            "Username prefix must be set if and only if the prefix policy is 'Prefix'",
        ));
    }
    for (i, client) in p.clients.iter().enumerate() {
        validate_one_of(
            &format!("properties.clients[{i}].clientType"),
            Some(client.client_type.as_str()),
            CLIENT_TYPES,
            &mut errors,
        );
    }
    errors
}

pub fn validate_external_auth_update(new: &ExternalAuth, old: &ExternalAuth) -> Vec<FieldError> {
    let mut errors = validate_external_auth_create(new);
    check_immutable(
        "properties.issuerUrl",
        &old.properties.issuer_url,
        &new.properties.issuer_url,
        &mut errors,
    );
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(name: &str) -> ExternalAuth {
        let id = ResourceId::cluster("s", "rg", "dev").child("externalAuths", name);
        let mut auth = ExternalAuth::with_defaults(&id);
        auth.properties.issuer_url = Some("https://login.example.com/tenant/v2.0".into());
        auth.properties.issuer_audiences = vec!["api://hcp".into()];
        auth.properties.username_claim = Some("email".into());
        auth
    }

    #[test]
    fn minimal_external_auth_is_valid() {
        assert!(validate_external_auth_create(&auth("entra")).is_empty());
        assert!(auth("entra").resource.location.is_none());
    }

    #[test]
    fn name_must_be_lowercase() {
        let errors = validate_external_auth_create(&auth("Entra"));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "name");
    }

    #[test]
    fn prefix_requires_prefix_policy() {
        let mut a = auth("entra");
        a.properties.username_prefix = Some("oidc:".into());
        let errors = validate_external_auth_create(&a);
        assert_eq!(errors[0].field, "properties.usernamePrefix");

        a.properties.username_prefix_policy = Some("Prefix".into());
        assert!(validate_external_auth_create(&a).is_empty());
    }

    #[test]
    fn issuer_url_is_immutable() {
        let old = auth("entra");
        let mut new = old.clone();
        new.properties.issuer_url = Some("https://other.example.com".into());
        let errors = validate_external_auth_update(&new, &old);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "properties.issuerUrl");
    }
}
