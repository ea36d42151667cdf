//! Bidirectional JSON-RPC session over one WebSocket.
//!
//! One connection carries two logical flows: outbound requests tracked in a
//! pending table (request id -> oneshot sender) and inbound requests routed
//! through a dispatch table (method name -> async handler). A single frame
//! classification step drives both.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, connect_async};
use uuid::Uuid;

use super::types::{
    self, ErrorObject, Frame, INTERNAL_ERROR, METHOD_NOT_FOUND, RpcError,
};

type PendingMap = HashMap<String, oneshot::Sender<Result<Value, RpcError>>>;
type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Dual-role JSON-RPC client/server bound to one socket.
///
/// Cheap to clone; all clones share the same connection.
#[derive(Clone)]
pub struct RpcSession {
    /// Channel feeding the writer task that owns the WebSocket sink.
    outbound_tx: mpsc::Sender<String>,
    /// Pending response senders (keyed by request id).
    pending: Arc<RwLock<PendingMap>>,
    /// Registered inbound method handlers.
    handlers: Arc<RwLock<HashMap<String, Handler>>>,
}

impl RpcSession {
    /// Connect to the hub and start the reader/writer tasks.
    ///
    /// The returned handle resolves when the connection is gone and every
    /// pending request has been failed with the close reason.
    pub async fn connect(url: &str) -> Result<(Self, JoinHandle<()>)> {
        let (ws, _) = connect_async(url)
            .await
            .with_context(|| format!("failed to connect to hub at {url}"))?;
        info!("connected to hub at {}", url);
        Ok(Self::from_stream(ws))
    }

    /// Wrap an already-established WebSocket stream.
    pub fn from_stream<S>(ws: WebSocketStream<S>) -> (Self, JoinHandle<()>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, stream) = ws.split();
        let (outbound_tx, outbound_rx) = mpsc::channel::<String>(64);

        let session = Self {
            outbound_tx,
            pending: Arc::new(RwLock::new(HashMap::new())),
            handlers: Arc::new(RwLock::new(HashMap::new())),
        };

        tokio::spawn(Self::writer_task(sink, outbound_rx));
        let reader = tokio::spawn(Self::reader_task(stream, session.clone()));

        (session, reader)
    }

    /// Send a request and wait for the matching response.
    ///
    /// There is no timeout: the future resolves on a matching response frame
    /// and fails either on a matching error frame or when the connection
    /// closes (which fails every pending request at once).
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = Uuid::new_v4().to_string();
        let (response_tx, response_rx) = oneshot::channel();
        {
            let mut pending = self.pending.write().await;
            pending.insert(id.clone(), response_tx);
        }

        let frame = types::request_frame(&id, method, &params);
        if self.outbound_tx.send(frame).await.is_err() {
            self.pending.write().await.remove(&id);
            return Err(RpcError::NotWritable);
        }

        match response_rx.await {
            Ok(result) => result,
            // Sender dropped without a verdict; treat as a close.
            Err(_) => Err(RpcError::Closed(String::new())),
        }
    }

    /// Send a notification: no id, no pending entry, no response expected.
    pub async fn notify(&self, method: &str, params: Value) -> Result<(), RpcError> {
        let frame = types::notification_frame(method, &params);
        self.outbound_tx
            .send(frame)
            .await
            .map_err(|_| RpcError::NotWritable)
    }

    /// Register an inbound method handler.
    pub async fn register_method<F, Fut>(&self, name: &str, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |params| Box::pin(handler(params)));
        self.handlers.write().await.insert(name.to_string(), handler);
    }

    async fn writer_task<S>(mut sink: SplitSink<WebSocketStream<S>, Message>, mut outbound_rx: mpsc::Receiver<String>)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        while let Some(frame) = outbound_rx.recv().await {
            let display: String = frame.chars().take(200).collect();
            debug!("sending frame: {}", display);
            if let Err(e) = sink.send(Message::Text(frame.into())).await {
                error!("failed to write frame: {:?}", e);
                break;
            }
        }
        debug!("writer task ended");
    }

    async fn reader_task<S>(mut stream: SplitStream<WebSocketStream<S>>, session: RpcSession)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut close_reason = String::new();

        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => session.handle_frame(text.as_str()).await,
                Ok(Message::Close(frame)) => {
                    close_reason = frame
                        .map(|f| f.reason.to_string())
                        .unwrap_or_default();
                    info!("hub closed the connection ({})", close_reason);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!("socket error: {:?}", e);
                    close_reason = e.to_string();
                    break;
                }
            }
        }

        // Bulk failure: every in-flight request learns the close reason.
        let mut pending = session.pending.write().await;
        for (_, tx) in pending.drain() {
            let _ = tx.send(Err(RpcError::Closed(close_reason.clone())));
        }
        debug!("reader task ended");
    }

    async fn handle_frame(&self, raw: &str) {
        let display: String = raw.chars().take(200).collect();
        debug!("received frame: {}", display);

        match Frame::parse(raw) {
            Ok(Frame::Request { id, method, params }) => {
                self.dispatch_request(id, method, params).await;
            }
            Ok(Frame::Response { id, result, error }) => {
                self.resolve_pending(&id, result, error).await;
            }
            Err(e) => {
                warn!("dropping malformed frame: {:?}, frame: {}", e, display);
            }
        }
    }

    /// Run the matching handler on its own task so slow provider calls do
    /// not block the reader loop.
    async fn dispatch_request(&self, id: Option<Value>, method: String, params: Value) {
        let handler = self.handlers.read().await.get(&method).cloned();

        let Some(handler) = handler else {
            warn!("no handler registered for method '{}'", method);
            if let Some(id) = id {
                let frame = types::error_frame(&id, METHOD_NOT_FOUND, "Method not found");
                let _ = self.outbound_tx.send(frame).await;
            }
            return;
        };

        let outbound_tx = self.outbound_tx.clone();
        tokio::spawn(async move {
            let result = handler(params).await;

            // Inbound notifications run for effect only.
            let Some(id) = id else {
                if let Err(e) = result {
                    warn!("notification handler '{}' failed: {:#}", method, e);
                }
                return;
            };

            let frame = match result {
                Ok(value) => types::response_frame(&id, &value),
                Err(e) => {
                    warn!("handler '{}' failed: {:#}", method, e);
                    types::error_frame(&id, INTERNAL_ERROR, &format!("{e:#}"))
                }
            };
            let _ = outbound_tx.send(frame).await;
        });
    }

    async fn resolve_pending(&self, id: &Value, result: Option<Value>, error: Option<ErrorObject>) {
        let key = match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        let sender = self.pending.write().await.remove(&key);
        let Some(sender) = sender else {
            warn!("received response for unknown request id: {}", key);
            return;
        };

        let outcome = match (result, error) {
            (_, Some(error)) => Err(RpcError::Remote {
                code: error.code,
                message: error.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        };
        let _ = sender.send(outcome);
    }
}
