//! Orchestration service client

pub mod connection;
pub mod instances;
pub mod types;

pub use connection::Connection;
pub use instances::{ConnectionConfig, ConnectionOptions};
