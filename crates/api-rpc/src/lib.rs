//! JSON-RPC API Layer
//!
//! Caller-facing JSON-RPC 2.0 server for the Nexus orchestrator.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};
