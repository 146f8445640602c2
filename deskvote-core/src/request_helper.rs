use std::{convert::Infallible, net::{IpAddr, SocketAddr}};

use deskvote_dependencies::axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, Extensions, HeaderMap},
};

use crate::state::DeskState;

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";

/// Address a request is attributed to. Votes and rate limits are keyed on it.
///
/// Empty when nothing is known about the caller, all such callers share one budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

#[async_trait]
impl FromRequestParts<DeskState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &DeskState,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientIp::resolve(
            &parts.headers,
            &parts.extensions,
            state.config().trust_forwarded_for,
        ))
    }
}

impl ClientIp {
    pub fn resolve(headers: &HeaderMap, extensions: &Extensions, trust_forwarded: bool) -> Self {
        let peer = extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        ClientIp(client_ip(headers, peer, trust_forwarded))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// First `X-Forwarded-For` entry, then `X-Real-IP`, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let forwarded = headers
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
        let real_ip = headers
            .get(REAL_IP)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = real_ip {
            return ip.to_string();
        }
    }
    peer.map(|x| x.to_string()).unwrap_or_default()
}
