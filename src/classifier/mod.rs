use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use thiserror::Error;
use tracing::debug;

/// Literal loopback addresses a trap must never ban.
const LOOPBACK_LITERALS: [&str; 2] = ["127.0.0.1", "::1"];

/// Address family tag written to the capture log and handed to the firewall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Ipv4,
    Ipv6,
}

impl Family {
    pub fn as_str(self) -> &'static str {
        match self {
            Family::Ipv4 => "ipv4",
            Family::Ipv6 => "ipv6",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("{0} is not an IPv4-mapped IPv6 address")]
    InvalidAddressKind(String),
}

/// Exact textual match against the loopback literals, no subnet matching.
pub fn is_loopback(address: &str) -> bool {
    LOOPBACK_LITERALS.contains(&address)
}

/// True for `::ffff:a.b.c.d`: 80 zero bits followed by 16 one bits.
pub fn is_ipv4_mapped_ipv6(address: &str) -> bool {
    address.parse::<Ipv6Addr>().is_ok_and(|ip| mapped_ipv4(&ip).is_some())
}

/// Returns the trailing 32 bits of a mapped address in dotted-decimal form.
pub fn extract_ipv4(address: &str) -> Result<String, ClassifyError> {
    address
        .parse::<Ipv6Addr>()
        .ok()
        .as_ref()
        .and_then(mapped_ipv4)
        .map(|ip| ip.to_string())
        .ok_or_else(|| ClassifyError::InvalidAddressKind(address.to_string()))
}

/// Unwraps mapped addresses and tags the family of a raw peer address.
///
/// Anything without a colon is tagged `ipv4`, including input that is not a valid
/// address at all.
pub fn classify(raw_address: &str) -> (Family, String) {
    if is_ipv4_mapped_ipv6(raw_address) {
        match extract_ipv4(raw_address) {
            Ok(ipv4) => return (Family::Ipv4, ipv4),
            Err(e) => debug!("{}", e),
        }
    }

    let family = if raw_address.contains(':') {
        Family::Ipv6
    } else {
        Family::Ipv4
    };
    (family, raw_address.to_string())
}

fn mapped_ipv4(ip: &Ipv6Addr) -> Option<Ipv4Addr> {
    match ip.octets() {
        [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff, a, b, c, d] => Some(Ipv4Addr::new(a, b, c, d)),
        _ => None,
    }
}

#[cfg(test)]
mod tests;
