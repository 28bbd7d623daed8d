//! Target name resolution

use std::net::{IpAddr, Ipv4Addr};

use log::debug;

use crate::error::{Error, Result};
use crate::types::Target;

/// Resolve a target to an IPv4 address
///
/// Accepts the literal `localhost`, dotted-decimal addresses and host
/// names. Names that only resolve to IPv6 cannot be probed and are
/// reported as unresolvable.
pub fn resolve(target: &str) -> Result<Target> {
    if target == "localhost" {
        return Ok(Target::new(target, Ipv4Addr::LOCALHOST));
    }

    if let Ok(addr) = target.parse::<Ipv4Addr>() {
        return Ok(Target::new(target, addr));
    }

    let addrs = dns_lookup::lookup_host(target).map_err(|e| {
        debug!("lookup of {} failed: {}", target, e);
        Error::Resolve(target.to_string())
    })?;

    addrs
        .into_iter()
        .find_map(|addr| match addr {
            IpAddr::V4(v4) => Some(Target::new(target, v4)),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| Error::Resolve(target.to_string()))
}

/// Reverse lookup, `None` when the address has no name
pub fn hostname(addr: Ipv4Addr) -> Option<String> {
    match dns_lookup::lookup_addr(&IpAddr::V4(addr)) {
        Ok(name) => Some(name),
        Err(e) => {
            debug!("reverse lookup of {} failed: {}", addr, e);
            None
        }
    }
}
