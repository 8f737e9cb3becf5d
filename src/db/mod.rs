pub mod loader;
pub mod store;
