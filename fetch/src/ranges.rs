//! Private/local/metadata address policy.

use std::net::IpAddr;

/// CIDR ranges treated as unsafe fetch targets.
const BLOCKED_CIDRS: &[&str] = &[
    // IPv4
    "0.0.0.0/8",
    "10.0.0.0/8",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "172.16.0.0/12",
    "192.168.0.0/16",
    // IPv6
    "::/128",
    "::1/128",
    "fc00::/7",
    "fe80::/10",
];

/// Cloud metadata endpoints blocked regardless of range membership.
const METADATA_IPS: &[&str] = &["169.254.169.254", "169.254.170.2", "100.100.100.200"];

/// True when the address is private, local, link-local, metadata, or an
/// IPv4-mapped IPv6 form of any of those.
#[must_use]
pub fn is_blocked_ip(ip: IpAddr) -> bool {
    let candidates: [Option<IpAddr>; 2] = match ip {
        IpAddr::V6(v6) => [Some(ip), v6.to_ipv4_mapped().map(IpAddr::V4)],
        IpAddr::V4(_) => [Some(ip), None],
    };

    for candidate in candidates.into_iter().flatten() {
        if METADATA_IPS.iter().any(|m| m.parse::<IpAddr>().ok() == Some(candidate)) {
            return true;
        }
        for cidr in BLOCKED_CIDRS {
            let Some((network, prefix)) = parse_cidr(cidr) else {
                continue;
            };
            if cidr_contains(network, prefix, candidate) {
                return true;
            }
        }
    }
    false
}

fn parse_cidr(text: &str) -> Option<(IpAddr, u8)> {
    let (addr, prefix) = text.split_once('/')?;
    Some((addr.parse().ok()?, prefix.parse().ok()?))
}

fn cidr_contains(network: IpAddr, prefix: u8, ip: IpAddr) -> bool {
    match (network, ip) {
        (IpAddr::V4(net), IpAddr::V4(ip)) => prefix_match(&net.octets(), &ip.octets(), prefix),
        (IpAddr::V6(net), IpAddr::V6(ip)) => prefix_match(&net.octets(), &ip.octets(), prefix),
        _ => false,
    }
}

fn prefix_match(net: &[u8], ip: &[u8], prefix: u8) -> bool {
    let full = (prefix / 8) as usize;
    let rem = prefix % 8;
    if net[..full] != ip[..full] {
        return false;
    }
    if rem == 0 {
        return true;
    }
    let mask = 0xFFu8 << (8 - rem);
    net[full] & mask == ip[full] & mask
}
