//! WebSocket transport
//!
//! The manager talks to an open transport through a `Link`: a pair of
//! channels carrying outbound frames one way and transport events the other.
//! `WsConnector` performs the tokio-tungstenite handshake and spawns a pump
//! task that bridges the socket and the link.

use std::future::Future;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, warn};
use url::Url;

use crate::error::ClientError;

/// Normal closure code
pub const NORMAL_CLOSURE: u16 = 1000;

/// Code reported when the transport vanished without a close frame
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// How long to wait for the peer to acknowledge our close frame
const CLOSE_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Manager → transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// One JSON text frame
    Text(String),
    /// Send a close frame and shut down
    Close { code: u16, reason: String },
}

/// How a transport ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
    /// True when the peer completed the closing handshake
    pub clean: bool,
}

impl CloseInfo {
    /// Transport lost without a closing handshake
    pub fn abnormal() -> Self {
        Self {
            code: ABNORMAL_CLOSURE,
            reason: String::new(),
            clean: false,
        }
    }
}

/// Transport → manager
#[derive(Debug)]
pub enum LinkEvent {
    /// Inbound text frame, unparsed
    Frame(String),
    /// Transport error; a `Closed` event follows
    Error(ClientError),
    /// Transport ended
    Closed(CloseInfo),
}

/// Manager side of an open transport
#[derive(Debug)]
pub struct Link {
    outbound: mpsc::UnboundedSender<Outbound>,
    inbound: mpsc::UnboundedReceiver<LinkEvent>,
}

/// Transport side of a `Link`
#[derive(Debug)]
pub struct LinkPeer {
    pub outbound: mpsc::UnboundedReceiver<Outbound>,
    pub inbound: mpsc::UnboundedSender<LinkEvent>,
}

impl Link {
    /// Create a connected link / peer pair
    pub fn channel() -> (Link, LinkPeer) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        (
            Link {
                outbound: out_tx,
                inbound: in_rx,
            },
            LinkPeer {
                outbound: out_rx,
                inbound: in_tx,
            },
        )
    }

    /// Queue a text frame
    ///
    /// Returns false if the transport side is gone.
    pub fn send_text(&self, text: String) -> bool {
        self.outbound.send(Outbound::Text(text)).is_ok()
    }

    /// Ask the transport to close with the given code and reason
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.outbound.send(Outbound::Close {
            code,
            reason: reason.to_string(),
        });
    }

    /// Next transport event; `None` once the transport side is dropped
    pub async fn recv(&mut self) -> Option<LinkEvent> {
        self.inbound.recv().await
    }
}

/// Opens transports for the connection manager
///
/// The returned future must not borrow `self`; it runs on its own task so a
/// pending handshake can be cancelled.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: Url) -> impl Future<Output = Result<Link, ClientError>> + Send + 'static;
}

/// Production connector over tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, url: Url) -> impl Future<Output = Result<Link, ClientError>> + Send + 'static {
        async move {
            let (ws_stream, response) = tokio_tungstenite::connect_async(url.as_str()).await?;
            debug!("Handshake complete (HTTP {})", response.status());

            let (link, peer) = Link::channel();
            tokio::spawn(pump(ws_stream, peer));
            Ok(link)
        }
    }
}

/// Bridge a websocket stream and a link until either side ends
///
/// Emits exactly one `Closed` event unless the manager dropped the link or
/// asked for the close itself.
pub async fn pump<S>(ws_stream: WebSocketStream<S>, peer: LinkPeer)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let LinkPeer {
        mut outbound,
        inbound,
    } = peer;

    let close = loop {
        tokio::select! {
            cmd = outbound.recv() => match cmd {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                        error!("WebSocket send failed: {}", e);
                        let _ = inbound.send(LinkEvent::Error(e.into()));
                        break CloseInfo::abnormal();
                    }
                }
                Some(Outbound::Close { code, reason }) => {
                    debug!("Sending close frame ({} {})", code, reason);
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    };
                    if ws_sender.send(Message::Close(Some(frame))).await.is_ok() {
                        let drain = async { while let Some(Ok(_)) = ws_receiver.next().await {} };
                        if tokio::time::timeout(CLOSE_ACK_TIMEOUT, drain).await.is_err() {
                            warn!("Peer did not acknowledge close frame");
                        }
                    }
                    return;
                }
                None => {
                    debug!("Link dropped, closing socket");
                    let _ = ws_sender.close().await;
                    return;
                }
            },
            msg = ws_receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let _ = inbound.send(LinkEvent::Frame(text));
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!("Peer sent close frame");
                    break match frame {
                        Some(frame) => CloseInfo {
                            code: u16::from(frame.code),
                            reason: frame.reason.to_string(),
                            clean: true,
                        },
                        None => CloseInfo {
                            code: NORMAL_CLOSURE,
                            reason: String::new(),
                            clean: true,
                        },
                    };
                }
                Some(Ok(Message::Ping(_))) => {
                    // Pong is handled automatically by tungstenite
                    debug!("Ping from gateway");
                }
                Some(Ok(Message::Pong(_))) => {
                    debug!("Pong from gateway");
                }
                Some(Ok(_)) => {
                    // Binary or raw frames - ignore
                    debug!("Ignoring non-text frame");
                }
                Some(Err(e)) => {
                    error!("WebSocket error: {}", e);
                    let _ = inbound.send(LinkEvent::Error(e.into()));
                    break CloseInfo::abnormal();
                }
                None => {
                    debug!("WebSocket stream ended without close frame");
                    break CloseInfo::abnormal();
                }
            }
        }
    };

    // Flushes the close reply tungstenite queues after a peer close frame
    let _ = ws_sender.close().await;
    let _ = inbound.send(LinkEvent::Closed(close));
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scriptable in-memory connector

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use super::*;

    /// Outcome of one connect call
    #[derive(Debug, Clone, Copy)]
    pub enum Behavior {
        Accept,
        Fail,
        Hang,
    }

    pub struct MockConnector {
        attempts: Arc<AtomicUsize>,
        script: Arc<Mutex<VecDeque<Behavior>>>,
        servers: mpsc::UnboundedSender<MockServer>,
    }

    /// Test side of the connector
    pub struct MockRemote {
        attempts: Arc<AtomicUsize>,
        script: Arc<Mutex<VecDeque<Behavior>>>,
        servers: mpsc::UnboundedReceiver<MockServer>,
    }

    /// One accepted transport
    pub struct MockServer {
        pub url: Url,
        peer: LinkPeer,
    }

    pub fn connector() -> (MockConnector, MockRemote) {
        let attempts = Arc::new(AtomicUsize::new(0));
        let script = Arc::new(Mutex::new(VecDeque::new()));
        let (tx, rx) = mpsc::unbounded_channel();
        (
            MockConnector {
                attempts: Arc::clone(&attempts),
                script: Arc::clone(&script),
                servers: tx,
            },
            MockRemote {
                attempts,
                script,
                servers: rx,
            },
        )
    }

    impl Connector for MockConnector {
        fn connect(&self, url: Url) -> impl Future<Output = Result<Link, ClientError>> + Send + 'static {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let behavior = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Behavior::Accept);
            let servers = self.servers.clone();

            async move {
                match behavior {
                    Behavior::Accept => {
                        let (link, peer) = Link::channel();
                        let _ = servers.send(MockServer { url, peer });
                        Ok(link)
                    }
                    Behavior::Fail => Err(ClientError::WebSocket(
                        tokio_tungstenite::tungstenite::Error::Io(std::io::Error::new(
                            std::io::ErrorKind::ConnectionRefused,
                            "connection refused",
                        )),
                    )),
                    Behavior::Hang => std::future::pending().await,
                }
            }
        }
    }

    impl MockRemote {
        /// Script the next connect outcomes (default is `Accept`)
        pub fn push(&self, behavior: Behavior) {
            self.script.lock().unwrap().push_back(behavior);
        }

        /// Number of connect calls made so far
        pub fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }

        pub async fn next_server(&mut self) -> MockServer {
            timeout(Duration::from_secs(2), self.servers.recv())
                .await
                .expect("no connection attempt")
                .expect("connector dropped")
        }

        /// Assert no transport is accepted within `wait`
        pub async fn expect_no_server(&mut self, wait: Duration) {
            assert!(
                timeout(wait, self.servers.recv()).await.is_err(),
                "unexpected connection attempt"
            );
        }
    }

    impl MockServer {
        pub fn send_text(&self, text: &str) {
            let _ = self.peer.inbound.send(LinkEvent::Frame(text.to_string()));
        }

        pub fn send_error(&self) {
            let _ = self.peer.inbound.send(LinkEvent::Error(ClientError::TransportClosed));
        }

        pub fn close_clean(&self) {
            let _ = self.peer.inbound.send(LinkEvent::Closed(CloseInfo {
                code: NORMAL_CLOSURE,
                reason: "bye".to_string(),
                clean: true,
            }));
        }

        pub fn close_unclean(&self) {
            let _ = self.peer.inbound.send(LinkEvent::Closed(CloseInfo::abnormal()));
        }

        pub async fn next_outbound(&mut self) -> Outbound {
            timeout(Duration::from_secs(2), self.peer.outbound.recv())
                .await
                .expect("no outbound frame")
                .expect("link dropped")
        }

        /// Next outbound text frame as JSON
        pub async fn next_json(&mut self) -> serde_json::Value {
            match self.next_outbound().await {
                Outbound::Text(text) => serde_json::from_str(&text).expect("outbound frame is JSON"),
                other => panic!("expected text frame, got {:?}", other),
            }
        }

        /// Outbound frame already queued, if any
        pub fn try_outbound(&mut self) -> Option<Outbound> {
            self.peer.outbound.try_recv().ok()
        }

        pub fn has_param(&self, key: &str) -> bool {
            self.url.query_pairs().any(|(k, _)| k == key)
        }

        pub fn param(&self, key: &str) -> Option<String> {
            self.url
                .query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    async fn recv_event(link: &mut Link) -> LinkEvent {
        timeout(Duration::from_secs(2), link.recv())
            .await
            .expect("link event timed out")
            .expect("link closed unexpectedly")
    }

    /// Local gateway that echoes one frame, then closes with the given code
    async fn spawn_gateway(close_code: Option<u16>) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                ws.send(Message::Text(text)).await.unwrap();
            }
            match close_code {
                Some(code) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: "done".into(),
                    };
                    let _ = ws.send(Message::Close(Some(frame))).await;
                    while let Some(Ok(_)) = ws.next().await {}
                }
                // Drop the socket without a closing handshake
                None => drop(ws),
            }
        });

        Url::parse(&format!("ws://{}/ws", addr)).unwrap()
    }

    #[test]
    fn test_link_channel_pair() {
        let (link, mut peer) = Link::channel();
        assert!(link.send_text("hello".to_string()));
        link.close(NORMAL_CLOSURE, "bye");

        assert_eq!(peer.outbound.try_recv().unwrap(), Outbound::Text("hello".to_string()));
        assert_eq!(
            peer.outbound.try_recv().unwrap(),
            Outbound::Close {
                code: 1000,
                reason: "bye".to_string()
            }
        );

        drop(peer);
        assert!(!link.send_text("late".to_string()));
    }

    #[tokio::test]
    async fn test_ws_connector_clean_close() {
        let url = spawn_gateway(Some(1000)).await;
        let mut link = WsConnector.connect(url).await.unwrap();

        assert!(link.send_text(r#"{"type":"typing"}"#.to_string()));
        match recv_event(&mut link).await {
            LinkEvent::Frame(text) => assert_eq!(text, r#"{"type":"typing"}"#),
            other => panic!("expected frame, got {:?}", other),
        }
        match recv_event(&mut link).await {
            LinkEvent::Closed(info) => {
                assert!(info.clean);
                assert_eq!(info.code, 1000);
                assert_eq!(info.reason, "done");
            }
            other => panic!("expected close, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ws_connector_unclean_close() {
        let url = spawn_gateway(None).await;
        let mut link = WsConnector.connect(url).await.unwrap();

        assert!(link.send_text("ping".to_string()));
        assert!(matches!(recv_event(&mut link).await, LinkEvent::Frame(_)));

        // An error event may precede the close depending on how the reset surfaces
        let closed = loop {
            match recv_event(&mut link).await {
                LinkEvent::Closed(info) => break info,
                LinkEvent::Error(_) => continue,
                other => panic!("unexpected event {:?}", other),
            }
        };
        assert!(!closed.clean);
        assert_eq!(closed.code, ABNORMAL_CLOSURE);
    }

    #[tokio::test]
    async fn test_ws_connector_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("ws://{}/ws", addr)).unwrap();
        let result = WsConnector.connect(url).await;
        assert!(result.is_err());
    }
}
