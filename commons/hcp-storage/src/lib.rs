pub mod error;
pub mod lock;
pub mod traits;
pub mod transaction;

#[cfg(feature = "memory")]
pub mod memory;

pub use error::*;
pub use lock::*;
pub use traits::*;
pub use transaction::*;
