//! HTTP protocol implementation.
//!
//! A small HTTP/1.x server core: one request per connection, no keep-alive,
//! no pipelining, no chunked bodies.
//!
//! # Architecture
//!
//! - **`connection`**: Connection lifecycle: accept, read the request head, run the handler, close
//! - **`parser`**: Parses request heads from byte buffers
//! - **`request`**: HTTP request representation and case-insensitive headers
//! - **`response`**: Status codes and the response head under construction
//! - **`writer`**: The response pipeline: queued header/status/file writes and their completions
//! - **`handler`**: The handler trait and the continuation engine driving it
//! - **`mime`**: MIME type detection based on file extensions
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Active    │ ← read until CRLFCRLF, parse, run handler
//!        └──────┬──────┘
//!               │ handler Done / parse error / peer gone / write failure
//!               ▼
//!        ┌──────────────────┐
//!        │    Closing       │ ← pending write cancelled, cleanup phase runs
//!        └──────┬───────────┘
//!               │ stream shut down
//!               ▼
//!        ┌──────────────────┐
//!        │    Closed        │
//!        └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use breeze::http::connection::{Connection, ConnectionSettings};
//! use tokio::net::TcpListener;
//!
//! let listener = TcpListener::bind("127.0.0.1:8000").await?;
//! loop {
//!     if let Some(mut conn) = Connection::accept(&listener, ConnectionSettings::default()).await? {
//!         let handler = handler.clone();
//!         tokio::spawn(async move { conn.run(&*handler).await });
//!     }
//! }
//! ```

pub mod connection;
pub mod handler;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
