//! # wirecall-client
//!
//! Client library for wirecall.
//!
//! This crate provides:
//! - Async TCP client with connection management
//! - One-in-flight request/response exchange with trace correlation
//! - Structured faults parsed from error responses

pub mod client;
pub mod connection;
pub mod error;

pub use client::Client;
pub use connection::{Connection, ConnectionConfig};
pub use error::ClientError;
