use crate::cs::{ControlPlaneClient, CsVersion, convert};
use crate::errors::{FrontendError, FrontendResult};
use futures_util::TryStreamExt;
use hcp_models::{OpenShiftVersion, ResourceId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Read-only view of the upstream OpenShift versions catalogue, addressed
/// per subscription and location.
pub struct OpenShiftVersionService {
    control_plane: Arc<dyn ControlPlaneClient>,
}

impl OpenShiftVersionService {
    pub fn new(control_plane: Arc<dyn ControlPlaneClient>) -> Self {
        Self { control_plane }
    }

    pub async fn list(
        &self,
        subscription_id: &str,
        location: &str,
    ) -> FrontendResult<Vec<OpenShiftVersion>> {
        let listed: Vec<CsVersion> = self.control_plane.list_versions().try_collect().await?;
        let versions: Vec<OpenShiftVersion> = listed
            .iter()
            .filter_map(|cs| {
                let Some(name) = convert::version_name(cs) else {
                    warn!("skipping catalogue version without an id");
                    return None;
                };
                let id = ResourceId::openshift_version(subscription_id, location, &name);
                Some(convert::openshift_version_from_cs(id, cs))
            })
            .collect();
        debug!(subscription_id, location, count = versions.len(), "listed versions");
        Ok(versions)
    }

    pub async fn get(&self, id: &ResourceId) -> FrontendResult<OpenShiftVersion> {
        match self.control_plane.get_version(id.name()).await {
            Ok(cs) => Ok(convert::openshift_version_from_cs(id.clone(), &cs)),
            Err(e) if e.is_not_found() => Err(FrontendError::resource_not_found(id)),
            Err(e) => Err(e.into()),
        }
    }
}
