use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SubscriptionState {
    Registered,
    Unregistered,
    Warned,
    Suspended,
    Deleted,
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SubscriptionState::Registered => "Registered",
            SubscriptionState::Unregistered => "Unregistered",
            SubscriptionState::Warned => "Warned",
            SubscriptionState::Suspended => "Suspended",
            SubscriptionState::Deleted => "Deleted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub name: String,
    pub state: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_placement_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub registered_features: Vec<Feature>,
}

/// Subscription as registered by the resource manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub state: SubscriptionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<SubscriptionProperties>,
}

impl Subscription {
    pub fn registered() -> Self {
        Self {
            state: SubscriptionState::Registered,
            registration_date: Some(chrono::Utc::now().to_rfc3339()),
            properties: None,
        }
    }
}
