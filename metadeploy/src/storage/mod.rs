//! Persistent storage

pub mod fs;
pub mod layout;
pub mod memory;
pub mod settings;
pub mod store;

pub use store::KeyValueStore;
