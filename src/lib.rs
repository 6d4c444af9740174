//! Breeze - minimal event-driven static file server
//!
//! Core library: connection handling, HTTP parsing, the response pipeline,
//! the handler continuation engine and the static file handler.

pub mod config;
pub mod http;
pub mod server;
pub mod static_files;
