//! Data models

pub mod deployment;
pub mod history;
pub mod result;
