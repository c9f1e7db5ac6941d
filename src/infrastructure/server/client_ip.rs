use axum::http::HeaderMap;
use std::net::SocketAddr;

use crate::domain::models::ClientAddress;
use crate::infrastructure::proxy::headers::{X_FORWARDED_FOR, X_REAL_IP};

/// Resolve the address a request is attributed to
///
/// The socket peer is used unless `trust_forwarded` is set, in which case
/// the first parseable `X-Forwarded-For` entry wins, then `X-Real-IP`.
pub fn resolve_client(peer: SocketAddr, headers: &HeaderMap, trust_forwarded: bool) -> ClientAddress {
    if trust_forwarded {
        if let Some(address) = forwarded_for(headers).or_else(|| real_ip(headers)) {
            return address;
        }
    }
    ClientAddress::from(peer)
}

fn forwarded_for(headers: &HeaderMap) -> Option<ClientAddress> {
    headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(|entry| ClientAddress::parse_endpoint(entry))
}

fn real_ip(headers: &HeaderMap) -> Option<ClientAddress> {
    headers
        .get(&X_REAL_IP)
        .and_then(|value| value.to_str().ok())
        .and_then(ClientAddress::parse_endpoint)
}
