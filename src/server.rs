//! Dispatch subsystem: acceptor thread, worker pool, and the top-level
//! server object that owns them (spec.md §4.6, §4.7, §9 "Global mutable
//! state" — the cache and queue are fields here, not statics).

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use socket2::{Domain, Socket, Type};
use tracing::{error, info, warn};

use crate::cache::Cache;
use crate::error::ProxyError;
use crate::pipeline::{self, Scratch};
use crate::queue::WorkQueue;

pub const WORKER_POOL_SIZE: usize = 50;
pub const LISTEN_BACKLOG: i32 = 1024;

/// Owns the cache and the work queue so neither is process-global (spec.md
/// §9). Cloned cheaply via `Arc` into the acceptor and every worker.
pub struct ProxyServer {
    cache: Arc<Cache>,
    queue: Arc<WorkQueue<(TcpStream, SocketAddr)>>,
    socket_timeout: Duration,
}

impl ProxyServer {
    pub fn new(socket_timeout: Duration) -> Self {
        ProxyServer {
            cache: Arc::new(Cache::new()),
            queue: Arc::new(WorkQueue::new(WORKER_POOL_SIZE)),
            socket_timeout,
        }
    }

    /// Binds the listening socket, starts the worker pool, then runs the
    /// acceptor loop on the calling thread. Returns only on a fatal bind
    /// or thread-spawn failure (spec.md §7: both are startup-fatal);
    /// per-connection and per-accept errors are logged and do not stop
    /// the server.
    pub fn run(&self, port: u16) -> Result<(), ProxyError> {
        mask_sigpipe();

        let listener = bind_listener(port).map_err(|source| ProxyError::Bind {
            addr: format!("0.0.0.0:{port}"),
            source,
        })?;
        info!(port, "listening");

        for id in 0..WORKER_POOL_SIZE {
            self.spawn_worker(id)
                .map_err(|source| ProxyError::ThreadSpawn { index: id, source })?;
            // A freshly spawned worker counts as idle capacity immediately;
            // it posts its own `idle` the moment it reaches its wait loop,
            // so nothing to do here but let it run.
        }

        self.accept_loop(&listener);
        Ok(())
    }

    fn spawn_worker(&self, id: usize) -> std::io::Result<thread::JoinHandle<()>> {
        let cache = self.cache.clone();
        let queue = self.queue.clone();
        let socket_timeout = self.socket_timeout;
        let handle = thread::Builder::new()
            .name(format!("proxy-worker-{id}"))
            .spawn(move || {
                let mut scratch = Scratch::new();
                loop {
                    queue.idle.post();
                    let (stream, peer) = queue.pop();
                    pipeline::process_request(&stream, peer, &cache, &mut scratch, socket_timeout);
                }
            })?;
        info!(worker = id, "worker started");
        Ok(handle)
    }

    fn accept_loop(&self, listener: &TcpListener) {
        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    self.queue.push((stream, peer));
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                }
            }
        }
    }
}

fn bind_listener(port: u16) -> std::io::Result<TcpListener> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let socket = Socket::new(Domain::IPV4, Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(socket.into())
}

/// spec.md §6's original-C ancestry ignores `SIGPIPE` process-wide so a
/// client that resets its connection mid-write surfaces as an `EPIPE`
/// `io::Error` rather than killing the worker thread.
fn mask_sigpipe() {
    #[cfg(unix)]
    unsafe {
        if libc::signal(libc::SIGPIPE, libc::SIG_IGN) == libc::SIG_ERR {
            error!("failed to ignore SIGPIPE");
        }
    }
}
