//! Library crate for port-sweep-rs exposing reusable modules.
pub mod errors;
pub mod ports;
pub mod probe;
pub mod scanner;
pub mod services;
pub mod targets;
pub mod types;
