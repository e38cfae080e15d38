//! Client IP extraction.

use std::net::SocketAddr;

use axum::{
    extract::ConnectInfo,
    http::{Extensions, HeaderMap},
};

use crate::cli::IpExtractor;

/// Extract the client IP address.
///
/// With an `ip_extractor` configured, the address comes from the proxy header and a missing
/// or malformed header is an error (no fallback to the socket address). Without one, the
/// peer address from `ConnectInfo` is used.
pub fn extract_client_ip(
    headers: &HeaderMap,
    extensions: &Extensions,
    ip_extractor: Option<&IpExtractor>,
) -> Result<String, &'static str> {
    match ip_extractor {
        Some(extractor) => {
            let header_value = headers
                .get(extractor.header_name())
                .ok_or("IP header not present")?
                .to_str()
                .map_err(|_| "IP header contains invalid characters")?;
            extractor.extract(header_value)
        }
        None => extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .ok_or("No client IP available"),
    }
}
