//! Client address resolution for guard requests.

use std::net::IpAddr;

use axum::http::HeaderMap;
use ipnet::IpNet;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Resolves the address a login attempt originates from.
///
/// `X-Forwarded-For` is only honoured when the socket peer is a trusted
/// proxy. The chain is read right to left; the first hop that is not
/// itself a trusted proxy wins.
pub fn resolve_client_ip(peer: IpAddr, headers: &HeaderMap, trusted_proxies: &[IpNet]) -> IpAddr {
    if !is_trusted(peer, trusted_proxies) {
        return peer;
    }

    let hops: Vec<IpAddr> = headers
        .get_all(FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter_map(|value| value.parse::<IpAddr>().ok())
        .collect();

    hops.iter()
        .rev()
        .find(|hop| !is_trusted(**hop, trusted_proxies))
        .or_else(|| hops.first())
        .copied()
        .unwrap_or(peer)
}

fn is_trusted(address: IpAddr, trusted_proxies: &[IpNet]) -> bool {
    let address = address.to_canonical();
    trusted_proxies
        .iter()
        .any(|network| network.contains(&address))
}
