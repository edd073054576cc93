//! metadeploy library
//!
//! Orchestrates Salesforce metadata deployments: retrieve from a source org, optionally
//! retarget the package at a changeset, deploy to a destination org, poll to completion,
//! and keep a size-bounded history with the deployed packages.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod history;
pub mod http;
pub mod logs;
pub mod models;
pub mod remote;
pub mod storage;
pub mod utils;
pub mod workers;
