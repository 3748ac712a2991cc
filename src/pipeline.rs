//! Per-request pipeline (spec.md §4.3), ported from `process_req` in
//! `original_source/proxy/proxy.c`. Runs entirely on one worker thread
//! against that worker's own scratch buffer; nothing here is shared.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::{Cache, MAX_OBJECT_SIZE};
use crate::line_reader::LineReader;
use crate::uri::{self, UriKind};
use crate::upstream;

pub const LINE_BUF_LEN: usize = 8192;
pub const READ_BUF_LEN: usize = 8192;
/// spec.md §3 "Worker state": 2 × MAX_OBJECT_SIZE, reused for header
/// accumulation and then for response capture within the same request.
pub const SCRATCH_BUF_LEN: usize = 2 * MAX_OBJECT_SIZE;

const DEFAULT_USER_AGENT: &str =
    "User-Agent: Mozilla/5.0 (X11; Linux x86_64; rv:10.0.3) Gecko/20120305 Firefox/10.0.3\r\n";
const DEFAULT_ACCEPT: &str =
    "Accept: text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8\r\n";
const DEFAULT_ACCEPT_ENCODING: &str = "Accept-Encoding: gzip, deflate\r\n";
const DEFAULT_CONNECTION: &str = "Connection: close\r\nProxy-Connection: close\r\n";

/// Per-worker scratch buffer: accumulates forwarded/default request headers,
/// then is cleared and reused to capture the origin's response. Exclusively
/// owned by one worker thread — no locking, per spec.md §5.
pub struct Scratch {
    buf: Vec<u8>,
}

impl Scratch {
    pub fn new() -> Self {
        Scratch {
            buf: Vec::with_capacity(SCRATCH_BUF_LEN),
        }
    }
}

impl Default for Scratch {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs one request to completion on `stream`, consulting/populating
/// `cache` as appropriate. Every exit path — cache hit, cache miss, any
/// parse or I/O failure — simply returns; the caller drops `stream`
/// (closing both client and, if one was opened, upstream sockets).
pub fn process_request(
    stream: &TcpStream,
    peer: SocketAddr,
    cache: &Cache,
    scratch: &mut Scratch,
    socket_timeout: Duration,
) {
    let _ = stream.set_read_timeout(Some(socket_timeout));
    let _ = stream.set_write_timeout(Some(socket_timeout));

    debug!(%peer, "connected");

    let mut reader = LineReader::new(stream);
    let mut line = [0u8; LINE_BUF_LEN];

    let n = match reader.read_line(&mut line) {
        Ok(n) => n,
        Err(e) => {
            warn!(%peer, error = %e, "failed reading request line");
            return;
        }
    };
    if n == 0 {
        return;
    }
    let request_line = String::from_utf8_lossy(&line[..n]);
    let mut parts = request_line.split_whitespace();
    let (method, raw_uri, _protocol) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(u), Some(p), None) => (m, u, p),
        _ => return, // not exactly three tokens: silently dropped
    };
    if !method.eq_ignore_ascii_case("GET") {
        return; // any other method is silently dropped
    }

    let (mut host, port, path) = match uri::parse(raw_uri) {
        UriKind::Absolute { host, port, path } => (Some(host), port, path),
        UriKind::Relative { path } => (None, uri::DEFAULT_PORT, path),
        UriKind::Invalid => return,
    };

    scratch.buf.clear();
    let mut no_accept = true;
    let mut no_accept_encoding = true;
    let mut no_user_agent = true;

    loop {
        let n = match reader.read_line(&mut line) {
            Ok(n) => n,
            Err(e) => {
                warn!(%peer, error = %e, "failed reading from client before end of headers");
                return;
            }
        };
        if n == 0 {
            // EOF before the terminating blank line.
            return;
        }
        let raw = &line[..n];
        if raw == b"\r\n" || raw == b"\n" {
            break;
        }
        let text = String::from_utf8_lossy(raw);

        if starts_with_ci(&text, "Host:") {
            if host.is_none() {
                // spec.md §4.3 step 3 / §9: the whole Host value becomes
                // the upstream host verbatim; port stays whatever
                // uri::parse derived from the request line (default 80),
                // never re-split out of a `host:port` Host header.
                let value = text[5..].trim_start().trim_end_matches(['\r', '\n']);
                host = Some(value.to_string());
            }
            continue;
        }
        if starts_with_ci(&text, "Connection:")
            || starts_with_ci(&text, "Proxy-Connection:")
            || starts_with_ci(&text, "Keep-Alive:")
        {
            continue;
        }
        if starts_with_ci(&text, "Accept:") {
            no_accept = false;
        } else if starts_with_ci(&text, "Accept-Encoding:") {
            no_accept_encoding = false;
        } else if starts_with_ci(&text, "User-Agent:") {
            no_user_agent = false;
        }
        scratch.buf.extend_from_slice(raw);
    }

    let host = match host {
        Some(h) if !h.is_empty() => h,
        _ => return, // relative URI with no Host header: nothing to connect to
    };

    let cache_key = uri::canonical_key(&host, port, &path);

    // --- cache read path (spec.md §4.3 step 5) ---
    if let Some((handle, body)) = cache.lookup(&cache_key) {
        info!(%peer, uri = %cache_key, "cache hit");
        if let Err(e) = stream.write_all(&body) {
            warn!(%peer, error = %e, "failed writing cached body to client");
            return;
        }
        cache.promote(handle);
        return;
    }

    // --- cache miss path (spec.md §4.3 step 6) ---
    info!(%peer, uri = %cache_key, "cache miss");

    let request_line = format!("GET {path} HTTP/1.0\r\nHost: {host}\r\n");

    if no_accept {
        scratch.buf.extend_from_slice(DEFAULT_ACCEPT.as_bytes());
    }
    if no_accept_encoding {
        scratch
            .buf
            .extend_from_slice(DEFAULT_ACCEPT_ENCODING.as_bytes());
    }
    if no_user_agent {
        scratch
            .buf
            .extend_from_slice(DEFAULT_USER_AGENT.as_bytes());
    }
    scratch.buf.extend_from_slice(DEFAULT_CONNECTION.as_bytes());
    scratch.buf.extend_from_slice(b"\r\n");

    let mut upstream_conn = match upstream::connect(&host, port, socket_timeout) {
        Ok(s) => s,
        Err(_) => return, // logged inside upstream::connect
    };

    if let Err(e) = upstream_conn
        .write_all(request_line.as_bytes())
        .and_then(|_| upstream_conn.write_all(&scratch.buf))
    {
        warn!(%peer, error = %e, "failed writing to remote host");
        return;
    }

    // Response capture: reuse the same scratch buffer, now empty of header
    // bytes the upstream write already consumed.
    scratch.buf.clear();
    let mut too_large = false;
    // Bytes already pulled off the wire past the cap while probing for
    // oversize (spec.md §8: exactly MAX_OBJECT_SIZE is still cacheable,
    // so a byte beyond it can only be confirmed by reading one more time
    // after filling to the cap) — relayed first if the response turns
    // out to be oversized.
    let mut overflow = 0usize;
    let mut read_buf = [0u8; READ_BUF_LEN];
    loop {
        let remaining = MAX_OBJECT_SIZE - scratch.buf.len();
        if remaining == 0 {
            match upstream_conn.read(&mut read_buf) {
                Ok(0) => break, // exactly MAX_OBJECT_SIZE bytes: cacheable
                Ok(n) => {
                    too_large = true;
                    overflow = n;
                    break;
                }
                Err(e) => {
                    warn!(%peer, error = %e, "failed reading from remote host");
                    return;
                }
            }
        }
        let want = remaining.min(READ_BUF_LEN);
        match upstream_conn.read(&mut read_buf[..want]) {
            Ok(0) => break,
            Ok(n) => scratch.buf.extend_from_slice(&read_buf[..n]),
            Err(e) => {
                warn!(%peer, error = %e, "failed reading from remote host");
                return;
            }
        }
    }

    if let Err(e) = stream.write_all(&scratch.buf) {
        warn!(%peer, error = %e, "failed writing to client");
        return;
    }

    if too_large {
        debug!(%peer, uri = %cache_key, "response exceeds cache object cap, relaying without caching");
        if overflow > 0 {
            if let Err(e) = stream.write_all(&read_buf[..overflow]) {
                warn!(%peer, error = %e, "failed writing to client");
                return;
            }
        }
        loop {
            match upstream_conn.read(&mut read_buf) {
                Ok(0) => break,
                Ok(n) => {
                    if let Err(e) = stream.write_all(&read_buf[..n]) {
                        warn!(%peer, error = %e, "failed writing to client");
                        return;
                    }
                }
                Err(e) => {
                    warn!(%peer, error = %e, "failed reading from remote host");
                    return;
                }
            }
        }
        return;
    }

    cache.insert(cache_key.clone(), &scratch.buf);
    info!(%peer, uri = %cache_key, bytes = scratch.buf.len(), "cached");
}

fn starts_with_ci(line: &str, prefix: &str) -> bool {
    line.len() >= prefix.len() && line[..prefix.len()].eq_ignore_ascii_case(prefix)
}
