//! Library crate for basic-auth-scan-rs exposing reusable modules.
pub mod config;
pub mod creds;
pub mod error;
pub mod probe;
pub mod queue;
pub mod report;
pub mod scanner;
pub mod targets;
pub mod transport;
pub mod trial;
pub mod types;
