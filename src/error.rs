//! Startup-fatal error type.
//!
//! Per-request failures (bad request line, upstream connect failure, a
//! write that hits a reset client) are *not* represented here — they are
//! local `io::Result` short-circuits inside the pipeline that close the
//! affected sockets and move on. `ProxyError` only covers the handful of
//! failures spec.md treats as fatal to the whole process: a bad port
//! argument, a bind/listen failure, or a thread that fails to spawn.

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("usage: {program} <port>")]
    Usage { program: String },

    #[error("port {port} out of range [1024, 65535]")]
    PortOutOfRange { port: i64 },

    #[error("failed to bind listening socket on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn worker thread {index}: {source}")]
    ThreadSpawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },
}

impl ProxyError {
    /// spec.md §6: "Invalid port or wrong argc prints usage to stderr and
    /// exits with code 0" — every startup error here exits 0, not the
    /// customary non-zero, matching the original `quit_with_error`
    /// (`exit(0)` unconditionally, even on bind/listen/thread failure).
    pub fn exit_code(&self) -> i32 {
        0
    }
}
