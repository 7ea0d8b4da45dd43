pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod views;

pub use extractors::{Arm, Lifecycle};
pub use middleware::*;
pub use views::ResourceList;
