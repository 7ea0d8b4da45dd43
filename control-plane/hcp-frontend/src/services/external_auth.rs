use super::ServiceDeps;
use super::context::RequestContext;
use super::engine::{KindAdapter, ResourceService};
use crate::cs::convert::{external_auth_from_cs, external_auth_to_cs};
use crate::cs::{ControlPlaneClient, ControlPlaneResult, ControlPlaneStream, CsExternalAuth};
use crate::errors::ControlPlaneError;
use crate::merge::{CHILD_LOCAL_FIELDS, LocalField};
use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use hcp_models::{
    ExternalAuth, FieldError, InternalId, ResourceId, ResourceKind,
    validate_external_auth_create, validate_external_auth_update,
};
use std::sync::Arc;

pub struct ExternalAuthAdapter {
    control_plane: Arc<dyn ControlPlaneClient>,
}

impl ExternalAuthAdapter {
    pub fn new(control_plane: Arc<dyn ControlPlaneClient>) -> Self {
        Self { control_plane }
    }
}

fn missing_parent() -> ControlPlaneError {
    ControlPlaneError::Configuration("external auth request without a parent cluster".to_string())
}

#[async_trait]
impl KindAdapter for ExternalAuthAdapter {
    type Model = ExternalAuth;
    type External = CsExternalAuth;

    fn kind(&self) -> ResourceKind {
        ResourceKind::ExternalAuth
    }

    fn local_fields(&self) -> &'static [LocalField] {
        CHILD_LOCAL_FIELDS
    }

    // External auths are not tracked resources and carry no location.
    fn defaults(&self, id: &ResourceId, _location: &str) -> ExternalAuth {
        ExternalAuth::with_defaults(id)
    }

    fn carry_forward(&self, model: &mut ExternalAuth, old: &ExternalAuth) {
        model.carry_forward_from(old);
    }

    fn validate_create(&self, model: &ExternalAuth) -> Vec<FieldError> {
        validate_external_auth_create(model)
    }

    fn validate_update(&self, model: &ExternalAuth, old: &ExternalAuth) -> Vec<FieldError> {
        validate_external_auth_update(model, old)
    }

    fn href(external: &CsExternalAuth) -> Option<&str> {
        external.href.as_deref()
    }

    fn from_external(
        &self,
        id: &ResourceId,
        _location: &str,
        external: &CsExternalAuth,
    ) -> ControlPlaneResult<ExternalAuth> {
        external_auth_from_cs(id, external)
    }

    async fn get_external(&self, id: &InternalId) -> ControlPlaneResult<CsExternalAuth> {
        self.control_plane.get_external_auth(id).await
    }

    async fn create_external(
        &self,
        _ctx: &RequestContext,
        _id: &ResourceId,
        parent: Option<&InternalId>,
        model: &ExternalAuth,
    ) -> ControlPlaneResult<CsExternalAuth> {
        let parent = parent.ok_or_else(missing_parent)?;
        let auth = external_auth_to_cs(model, false)?;
        self.control_plane.create_external_auth(parent, &auth).await
    }

    async fn update_external(
        &self,
        id: &InternalId,
        model: &ExternalAuth,
    ) -> ControlPlaneResult<CsExternalAuth> {
        let auth = external_auth_to_cs(model, true)?;
        self.control_plane.update_external_auth(id, &auth).await
    }

    async fn delete_external(&self, id: &InternalId) -> ControlPlaneResult<()> {
        self.control_plane.delete_external_auth(id).await
    }

    fn list_external(
        &self,
        parent: Option<&InternalId>,
        ids: Vec<InternalId>,
    ) -> ControlPlaneStream<'_, CsExternalAuth> {
        match parent {
            Some(parent) => self.control_plane.list_external_auths(parent, ids),
            None => stream::once(async { Err(missing_parent()) }).boxed(),
        }
    }
}

pub type ExternalAuthService = ResourceService<ExternalAuthAdapter>;

impl ResourceService<ExternalAuthAdapter> {
    pub fn for_external_auths(deps: ServiceDeps) -> Self {
        Self::new(ExternalAuthAdapter::new(deps.control_plane.clone()), deps)
    }
}
