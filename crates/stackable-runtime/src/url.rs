// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Service URL resolution from a captured bound address.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// URL scheme of a hosted service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Plain HTTP.
    Http,
    /// HTTP over TLS.
    Https,
}

impl Scheme {
    /// Scheme for a server with or without TLS.
    pub fn for_tls(tls: bool) -> Self {
        if tls { Self::Https } else { Self::Http }
    }

    /// Scheme name without the `://` separator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build `scheme://host:port` for a bound address.
///
/// An unspecified bind address (`0.0.0.0` or `::`) is not dialable, so it is
/// replaced with the loopback address of the same family. IPv6 hosts are
/// bracketed. The port is always written, even when it is the scheme default.
pub fn resolve_service_url(addr: SocketAddr, scheme: Scheme) -> String {
    let ip = match addr.ip() {
        IpAddr::V4(v4) if v4.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(v6) if v6.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    match ip {
        IpAddr::V4(v4) => format!("{}://{}:{}", scheme, v4, addr.port()),
        IpAddr::V6(v6) => format!("{}://[{}]:{}", scheme, v6, addr.port()),
    }
}
