pub mod cloud_error;
pub mod cluster;
pub mod external_auth;
pub mod internal_id;
pub mod node_pool;
pub mod provisioning;
pub mod records;
pub mod resource;
pub mod resource_id;
pub mod subscription;
pub mod validation;
pub mod version;

pub use cloud_error::*;
pub use cluster::*;
pub use external_auth::*;
pub use internal_id::*;
pub use node_pool::*;
pub use provisioning::*;
pub use records::*;
pub use resource::{
    ManagedServiceIdentity, ResourceModel, ServiceProviderProperties, TrackedResource,
    UserAssignedIdentity,
};
pub use resource_id::*;
pub use subscription::*;
pub use version::*;
