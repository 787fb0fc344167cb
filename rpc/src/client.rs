//! Persistent websocket JSON-RPC session.
//!
//! One reader task routes responses to their waiting callers and
//! notifications to the registered handler; one writer task owns the sink.
//! Requests are written as soon as they are issued, so callers can issue
//! many and collect the results later.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector};
use tracing::{debug, trace, warn};

use stakepool_types::SemVer;

use crate::config::ConnConfig;
use crate::error::RpcError;
use crate::messages::{Incoming, Request, VersionResult};
use crate::notifications::{Notification, NotificationHandler};
use crate::tls::tls_connector;

type Reply = Result<Value, RpcError>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

fn lock(pending: &PendingMap) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<Reply>>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// An open JSON-RPC session.
///
/// Dropping the client aborts its background tasks and closes the socket.
pub struct RpcClient {
    host: String,
    outgoing: mpsc::UnboundedSender<Message>,
    pending: PendingMap,
    next_id: AtomicU64,
    connected: watch::Receiver<bool>,
    request_timeout: Option<Duration>,
    tasks: Vec<JoinHandle<()>>,
}

impl RpcClient {
    /// Open a session and start routing notifications to `handler`.
    pub async fn connect(
        config: &ConnConfig,
        handler: Arc<dyn NotificationHandler>,
    ) -> Result<Self, RpcError> {
        let url = config.url()?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RpcError::InvalidEndpoint(e.to_string()))?;
        request
            .headers_mut()
            .insert(AUTHORIZATION, config.basic_auth_header()?);

        let connector = if config.disable_tls {
            Connector::Plain
        } else {
            tls_connector(config.certificates.as_deref().unwrap_or_default())?
        };

        debug!(host = %config.host, %url, "opening websocket session");
        let (stream, _response) = tokio::time::timeout(
            config.connect_timeout,
            connect_async_tls_with_config(request, None, false, Some(connector)),
        )
        .await
        .map_err(|_| RpcError::Connect(format!("timed out connecting to {}", config.host)))?
        .map_err(|e| RpcError::Connect(format!("{}: {e}", config.host)))?;

        let (mut sink, mut source) = stream.split();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
        let (connected_tx, connected) = watch::channel(true);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let writer = tokio::spawn(async move {
            while let Some(msg) = outgoing_rx.recv().await {
                if let Err(e) = sink.send(msg).await {
                    debug!("websocket write failed: {e}");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader_pending = Arc::clone(&pending);
        let host = config.host.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(text)) => route_incoming(&text, &reader_pending, &*handler),
                    Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                        Ok(text) => route_incoming(text, &reader_pending, &*handler),
                        Err(_) => warn!(host = %host, "dropping non-UTF-8 binary frame"),
                    },
                    Ok(Message::Close(frame)) => {
                        debug!(host = %host, ?frame, "server closed websocket");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(host = %host, "websocket read failed: {e}");
                        break;
                    }
                }
            }

            let _ = connected_tx.send(false);
            let orphaned: Vec<_> = lock(&reader_pending).drain().collect();
            for (_, tx) in orphaned {
                let _ = tx.send(Err(RpcError::Disconnected));
            }
        });

        Ok(Self {
            host: config.host.clone(),
            outgoing,
            pending,
            next_id: AtomicU64::new(1),
            connected,
            request_timeout: config.request_timeout,
            tasks: vec![writer, reader],
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Resolves once the session has been closed by either side.
    pub async fn closed(&self) {
        let mut rx = self.connected.clone();
        while *rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    /// Number of requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Write a request now and return a handle for its response.
    pub fn send_request(&self, method: &str, params: Vec<Value>) -> Result<PendingCall, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::to_string(&Request {
            jsonrpc: "1.0",
            method,
            params: &params,
            id,
        })
        .map_err(|e| RpcError::Serialize(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);

        // The reader marks the session closed before draining `pending`, so
        // an entry inserted after the drain is caught here.
        if !self.is_connected() {
            lock(&self.pending).remove(&id);
            return Err(RpcError::Disconnected);
        }

        trace!(host = %self.host, method, id, "sending request");
        if self.outgoing.send(Message::Text(body)).is_err() {
            lock(&self.pending).remove(&id);
            return Err(RpcError::Disconnected);
        }

        Ok(PendingCall {
            id,
            method: method.to_string(),
            rx,
            pending: Arc::clone(&self.pending),
            timeout: self.request_timeout,
        })
    }

    /// Send a request and wait for its result.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        self.send_request(method, params)?.receive().await
    }

    /// Send a request and decode its result into `T`.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, RpcError> {
        self.send_request(method, params)?.receive_as().await
    }

    /// Query `version` and extract the entry named `api_name`.
    pub async fn api_version(&self, api_name: &str) -> Result<SemVer, RpcError> {
        let versions: HashMap<String, VersionResult> = self.call_as("version", vec![]).await?;
        let v = versions
            .get(api_name)
            .ok_or_else(|| RpcError::MissingVersion(api_name.to_string()))?;
        Ok(SemVer::new(v.major, v.minor, v.patch))
    }

    /// Ask the server to close the session.
    pub fn disconnect(&self) {
        let _ = self.outgoing.send(Message::Close(None));
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        // The aborted reader never runs its cleanup, so fail waiters here.
        let orphaned: Vec<_> = lock(&self.pending).drain().collect();
        for (_, tx) in orphaned {
            let _ = tx.send(Err(RpcError::Disconnected));
        }
    }
}

/// A request that has been written but whose response has not been read.
///
/// Dropping it abandons the request: the response slot is released and a
/// late reply is discarded.
pub struct PendingCall {
    id: u64,
    method: String,
    rx: oneshot::Receiver<Reply>,
    pending: PendingMap,
    timeout: Option<Duration>,
}

impl PendingCall {
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Wait for the raw result, giving up after the session's request
    /// timeout.
    pub async fn receive(mut self) -> Result<Value, RpcError> {
        let received = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut self.rx).await {
                Ok(received) => received,
                Err(_) => {
                    return Err(RpcError::Timeout {
                        method: self.method.clone(),
                        after: limit,
                    })
                }
            },
            None => (&mut self.rx).await,
        };
        match received {
            Ok(reply) => reply,
            Err(_) => Err(RpcError::Disconnected),
        }
    }

    /// Wait for the result and decode it.
    pub async fn receive_as<T: DeserializeOwned>(self) -> Result<T, RpcError> {
        let method = self.method.clone();
        let value = self.receive().await?;
        serde_json::from_value(value).map_err(|e| RpcError::Decode {
            method,
            reason: e.to_string(),
        })
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        lock(&self.pending).remove(&self.id);
    }
}

fn route_incoming(text: &str, pending: &PendingMap, handler: &dyn NotificationHandler) {
    let incoming: Incoming = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("dropping unparseable message: {e}");
            return;
        }
    };

    if let Some(method) = incoming.method {
        handler.on_notification(Notification {
            method,
            params: incoming.params.unwrap_or_default(),
        });
        return;
    }

    let Some(id) = incoming.id.as_ref().and_then(Value::as_u64) else {
        warn!(id = ?incoming.id, "dropping response without a usable id");
        return;
    };

    let reply = match incoming.error {
        Some(err) => Err(RpcError::Server {
            code: err.code,
            message: err.message,
        }),
        None => Ok(incoming.result.unwrap_or(Value::Null)),
    };

    match lock(pending).remove(&id) {
        Some(tx) => {
            let _ = tx.send(reply);
        }
        None => trace!(id, "response for abandoned request"),
    }
}
