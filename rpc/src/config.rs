//! Connection parameters for one RPC endpoint.

use std::time::Duration;

use base64::Engine;
use tokio_tungstenite::tungstenite::http::HeaderValue;

use crate::error::RpcError;

/// Default time allowed for the TCP + TLS + websocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time a request may wait for its response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Parameters for opening a websocket JSON-RPC session.
///
/// The transport never reconnects on its own; when the session drops,
/// [`crate::RpcClient::closed`] resolves and the owner decides what to do.
#[derive(Clone, Debug)]
pub struct ConnConfig {
    /// `host:port` of the RPC server.
    pub host: String,
    /// HTTP path of the websocket endpoint, normally `ws`.
    pub endpoint: String,
    pub user: String,
    pub pass: String,
    /// PEM-encoded certificate(s) pinned for the server. Required unless
    /// `disable_tls` is set. The server must present one of them exactly.
    pub certificates: Option<Vec<u8>>,
    pub disable_tls: bool,
    pub connect_timeout: Duration,
    /// `None` waits for responses for as long as the session stays open.
    pub request_timeout: Option<Duration>,
}

impl ConnConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            endpoint: "ws".to_string(),
            user: user.into(),
            pass: pass.into(),
            certificates: None,
            disable_tls: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }

    pub fn with_certificates(mut self, pem: Vec<u8>) -> Self {
        self.certificates = Some(pem);
        self
    }

    pub fn without_tls(mut self) -> Self {
        self.disable_tls = true;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Full websocket URL, e.g. `wss://127.0.0.1:9109/ws`.
    pub fn url(&self) -> Result<String, RpcError> {
        if self.host.is_empty() {
            return Err(RpcError::InvalidEndpoint("empty host".into()));
        }
        if self.host.contains("://") {
            return Err(RpcError::InvalidEndpoint(format!(
                "host {} must not include a scheme",
                self.host
            )));
        }
        let scheme = if self.disable_tls { "ws" } else { "wss" };
        Ok(format!(
            "{scheme}://{}/{}",
            self.host,
            self.endpoint.trim_start_matches('/')
        ))
    }

    /// `Authorization` header value for HTTP basic auth.
    pub fn basic_auth_header(&self) -> Result<HeaderValue, RpcError> {
        let credentials = format!("{}:{}", self.user, self.pass);
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        HeaderValue::from_str(&format!("Basic {encoded}"))
            .map_err(|e| RpcError::InvalidEndpoint(format!("invalid credentials: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_uses_wss_by_default() {
        let cfg = ConnConfig::new("127.0.0.1:9109", "u", "p");
        assert_eq!(cfg.url().unwrap(), "wss://127.0.0.1:9109/ws");
    }

    #[test]
    fn url_without_tls_uses_ws() {
        let cfg = ConnConfig::new("localhost:19557", "u", "p").without_tls();
        assert_eq!(cfg.url().unwrap(), "ws://localhost:19557/ws");
    }

    #[test]
    fn url_rejects_empty_host_and_schemes() {
        assert!(ConnConfig::new("", "u", "p").url().is_err());
        assert!(ConnConfig::new("wss://x:1", "u", "p").url().is_err());
    }

    #[test]
    fn basic_auth_is_base64_of_user_colon_pass() {
        let cfg = ConnConfig::new("h:1", "user", "pass");
        let header = cfg.basic_auth_header().unwrap();
        assert_eq!(header.to_str().unwrap(), "Basic dXNlcjpwYXNz");
    }
}
