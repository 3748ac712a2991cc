//! Upstream connector (spec.md §4.5), ported from `open_client_socket` in
//! `original_source/proxy/proxy.c`.

use std::io;
use std::net::TcpStream;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

/// Serializes DNS resolution. `std::net::ToSocketAddrs` on most platforms
/// shells out to `getaddrinfo`, whose reentrancy is not guaranteed on every
/// target; spec.md §4.5 and §9 ("Thread-unsafe name resolution") keep this
/// lock unconditionally rather than gamble on a given platform's resolver.
static DNS_LOCK: Mutex<()> = Mutex::new(());

/// Opens a TCP connection to `host:port`, resolving the hostname under
/// `dns_lock`. Every failure here (socket creation, DNS, connect) is
/// logged and returned as an `io::Error` rather than terminating the
/// worker — spec.md §4.5 and the error table in §7 both treat this as a
/// per-request failure, not a fatal one.
pub fn connect(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let addr = {
        let _guard = DNS_LOCK.lock();
        resolve_first(host, port)?
    };

    match TcpStream::connect_timeout(&addr, timeout) {
        Ok(stream) => {
            debug!(host, port, "connected to upstream");
            Ok(stream)
        }
        Err(e) => {
            warn!(host, port, error = %e, "failed connecting to host");
            Err(e)
        }
    }
}

fn resolve_first(host: &str, port: u16) -> io::Result<std::net::SocketAddr> {
    use std::net::ToSocketAddrs;
    (host, port)
        .to_socket_addrs()
        .inspect_err(|e| warn!(host, "failed resolving host: {e}"))?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no addresses for host"))
}
