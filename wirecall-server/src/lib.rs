//! # wirecall-server
//!
//! TCP server for wirecall.
//!
//! This crate provides:
//! - TCP connection handling with async I/O
//! - Frame decoding and method dispatch
//! - Handler registration with an optional compiled schema
//! - Session tracking
//! - YAML/environment configuration

pub mod config;
pub mod dispatch;
pub mod error;
pub mod server;
pub mod session;

pub use config::{Config, ConfigError, NetworkConfig, ProtocolConfig, SchemaConfig};
pub use dispatch::{Dispatcher, HandlerResult};
pub use error::ServerError;
pub use server::{Server, ServerConfig};
pub use session::Session;
