//! Server endpoint addressing.
//!
//! One origin (`http://host:port` or `https://host:port`) addresses both the
//! REST API and the per-room WebSocket. The WebSocket scheme mirrors the
//! origin: `http` maps to `ws`, `https` to `wss`.

use chatsync_proto::RoomId;
use url::Url;

use crate::TransportError;

/// Server origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    origin: Url,
}

impl Endpoint {
    /// Parse a server origin.
    ///
    /// # Errors
    ///
    /// - `TransportError::InvalidEndpoint` if `origin` is not an absolute
    ///   `http`, `https`, `ws` or `wss` URL with a host
    pub fn parse(origin: &str) -> Result<Self, TransportError> {
        let mut url =
            Url::parse(origin).map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;

        if url.host_str().is_none() {
            return Err(TransportError::InvalidEndpoint(format!("{origin}: missing host")));
        }

        let scheme = match url.scheme() {
            "http" | "ws" => "http",
            "https" | "wss" => "https",
            other => {
                return Err(TransportError::InvalidEndpoint(format!("unsupported scheme {other}")));
            },
        };
        url.set_scheme(scheme)
            .map_err(|()| TransportError::InvalidEndpoint(format!("cannot use scheme {scheme}")))?;

        url.set_path("/");
        url.set_query(None);
        url.set_fragment(None);

        Ok(Self { origin: url })
    }

    /// REST URL for `path` (relative, without a leading slash).
    ///
    /// # Errors
    ///
    /// Returns `url::ParseError` if `path` is not a valid relative URL.
    pub fn rest_url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.origin.join(path)
    }

    /// WebSocket URL for a room, authenticated by `token`.
    pub fn transport_url(&self, room_id: RoomId, token: &str) -> Url {
        let mut url = self.origin.clone();
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        // http(s) -> ws(s) is always a valid special-scheme swap
        let _ = url.set_scheme(scheme);

        url.set_path(&format!("/chats/{room_id}/ws"));
        url.query_pairs_mut().clear().append_pair("token", token);
        url
    }

    /// Server origin.
    pub fn origin(&self) -> &Url {
        &self.origin
    }
}
