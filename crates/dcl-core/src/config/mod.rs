//! Host type catalogs: YAML descriptors, loading, and the bundled set

pub mod bundled;
pub mod loader;
pub mod types;
