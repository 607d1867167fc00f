//! Socket seam: `Connector` opens a `Link`, a text-frame duplex.
//!
//! The adapter only talks to these traits, so tests drive it with in-memory links and the
//! binary plugs in `WsConnector`.

use crate::TransportError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};
use url::Url;

pub const ENDPOINT_PATH: &str = "/shellv2/ws";

#[async_trait]
pub trait Link: Send {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;
    /// Next text frame. `None` once the peer has closed.
    async fn recv_text(&mut self) -> Option<Result<String, TransportError>>;
    async fn close(&mut self);
}

#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Box<dyn Link>, TransportError>;
}

/// `<server>/shellv2/ws?shell_id=<id>`. `http(s)` bases map to `ws(s)`; a bare `host:port`
/// is treated as `ws://`.
pub fn endpoint_url(server: &str, shell_id: &str) -> Result<Url, TransportError> {
    let invalid = |reason: String| TransportError::InvalidEndpoint {
        url: server.to_string(),
        reason,
    };
    let raw = if server.contains("://") {
        server.to_string()
    } else {
        format!("ws://{server}")
    };
    let mut url = Url::parse(&raw).map_err(|e| invalid(e.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(invalid(format!("unsupported scheme {other}"))),
    };
    url.set_scheme(scheme)
        .map_err(|()| invalid("cannot switch scheme".into()))?;
    let base = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{base}{ENDPOINT_PATH}"));
    url.query_pairs_mut().clear().append_pair("shell_id", shell_id);
    url.set_fragment(None);
    Ok(url)
}

#[derive(Debug, Clone)]
pub struct WsConnector {
    url: Url,
}

impl WsConnector {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn Link>, TransportError> {
        debug!(target: "transport", url = %self.url, "connect_attempt");
        let (stream, _response) = connect_async(self.url.as_str()).await?;
        Ok(Box::new(WsLink { stream }))
    }
}

pub struct WsLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Link for WsLink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv_text(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => trace!(target: "transport", "binary_frame_ignored"),
                },
                Ok(Message::Close(_)) => return None,
                // Ping/Pong are answered by tungstenite itself.
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}
