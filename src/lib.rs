//! Concurrent caching HTTP/1.0 forward proxy.
//!
//! A fixed-size worker pool dispatches accepted connections through a
//! request pipeline that consults a bounded, strict-LRU object cache
//! before transacting with the origin server. See [`server::ProxyServer`]
//! for the entry point.

pub mod cache;
pub mod config;
pub mod error;
pub mod line_reader;
pub mod pipeline;
pub mod queue;
pub mod semaphore;
pub mod server;
pub mod upstream;
pub mod uri;

pub use cache::Cache;
pub use config::Config;
pub use error::ProxyError;
pub use server::ProxyServer;
