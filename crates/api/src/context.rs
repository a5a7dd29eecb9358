use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{Extensions, HeaderMap, HeaderName};

/// Stand-in when no address can be determined at all.
pub const UNKNOWN_CLIENT: &str = "unknown";

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Address used to key rate-limit buckets for a request.
///
/// Resolution order: the trusted proxy header (when configured), the first
/// `X-Forwarded-For` entry, then the transport peer address.
pub fn client_identifier(
    headers: &HeaderMap,
    extensions: &Extensions,
    trusted_proxy_header: Option<&HeaderName>,
) -> String {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(ip) = trusted_proxy_header.and_then(|h| header_value(h.as_str())) {
        return ip.to_string();
    }

    if let Some(first) = header_value(X_FORWARDED_FOR)
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
