//! Request-line URI parser (spec.md §4.2), ported from `parse_uri` in
//! `original_source/proxy/proxy.c`.

pub const DEFAULT_PORT: u16 = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriKind {
    /// `http://host[:port]/path` — host and port came from the URI itself.
    Absolute {
        host: String,
        port: u16,
        path: String,
    },
    /// `/path` — host must still be resolved from a `Host:` header.
    Relative { path: String },
    /// No path separator found anywhere in the URI; the request is rejected.
    Invalid,
}

/// Host names end at the first of these bytes, matching `strpbrk(hostbegin,
/// " :/\r\n\0")` in the original.
fn is_host_terminator(b: u8) -> bool {
    matches!(b, b' ' | b':' | b'/' | b'\r' | b'\n' | 0)
}

pub fn parse(uri: &str) -> UriKind {
    let bytes = uri.as_bytes();

    let rest = if let Some(stripped) = strip_http_prefix(uri) {
        stripped
    } else {
        // Origin-form: the whole thing should be a path.
        return if bytes.first() == Some(&b'/') {
            UriKind::Relative {
                path: uri.to_string(),
            }
        } else {
            UriKind::Invalid
        };
    };

    let rest_bytes = rest.as_bytes();
    let host_end = rest_bytes
        .iter()
        .position(|&b| is_host_terminator(b))
        .unwrap_or(rest_bytes.len());
    let host = &rest[..host_end];

    let mut after_host = &rest[host_end..];
    let mut port = DEFAULT_PORT;
    if after_host.as_bytes().first() == Some(&b':') {
        after_host = &after_host[1..];
        let digits_end = after_host
            .as_bytes()
            .iter()
            .position(|b| !b.is_ascii_digit())
            .unwrap_or(after_host.len());
        if digits_end > 0 {
            if let Ok(p) = after_host[..digits_end].parse::<u16>() {
                port = p;
            }
        }
        after_host = &after_host[digits_end..];
    }

    match after_host.find('/') {
        Some(slash) => UriKind::Absolute {
            host: host.to_string(),
            port,
            path: after_host[slash..].to_string(),
        },
        None => UriKind::Invalid,
    }
}

fn strip_http_prefix(uri: &str) -> Option<&str> {
    if uri.len() >= 7 && uri[..7].eq_ignore_ascii_case("http://") {
        Some(&uri[7..])
    } else {
        None
    }
}

/// Canonical cache key, spec.md §4.3 step 4 / GLOSSARY.
pub fn canonical_key(host: &str, port: u16, path: &str) -> String {
    format!("http://{host}:{port}{path}")
}
