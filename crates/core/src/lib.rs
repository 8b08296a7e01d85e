//! Core types and shared functionality for shellcache.
//!
//! This crate provides:
//! - Versioned cache stores with a SQLite backend
//! - The request/response model the stores and the proxy exchange
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheStorage, Store};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use http::{Headers, Request, RequestMode, Response, ResponseType};
