pub mod api;
pub mod api_version;
pub mod bootstrap;
pub mod config;
pub mod conflict;
pub mod cs;
pub mod errors;
pub mod merge;
pub mod metrics;
pub mod server;
pub mod services;
pub mod storage;

pub use config::*;
pub use errors::*;
pub use server::{ApiServer, AppState};
pub use storage::*;

pub use services::{
    ClusterService, ExternalAuthService, NodePoolService, OperationService, PreflightService,
    SubscriptionService,
};

pub use api::create_middleware_stack;
pub use bootstrap::{Collaborators, build_api_server_from_env, build_app_state};
