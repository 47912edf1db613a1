//! A small static-content HTTP/1.x server.
//!
//! One listener thread accepts connections into a [`queue::BoundedQueue`]; a fixed
//! [`pool::WorkerPool`] drains it, and each connection is answered by a [`handler::Handler`]
//! with a single response before it is closed.

pub mod config;
pub mod handler;
pub mod listener;
pub mod listing;
pub mod logger;
pub mod mime;
pub mod pool;
pub mod queue;
pub mod request;
pub mod resource;
pub mod response;
