pub mod cluster;
pub mod external_auth;
pub mod node_pool;
pub mod operations;
pub mod preflight;
pub mod subscription;
pub mod version;

mod resource;

pub use cluster::*;
pub use external_auth::*;
pub use node_pool::*;
pub use operations::*;
pub use preflight::*;
pub use subscription::*;
pub use version::*;
