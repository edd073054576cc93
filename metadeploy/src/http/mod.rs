//! HTTP adapters

pub mod client;
pub mod metadata;
