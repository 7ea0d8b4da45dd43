pub mod factory;

pub use factory::create_storage_factory;
