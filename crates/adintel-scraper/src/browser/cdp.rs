//! Chrome DevTools Protocol session over a websocket.
//!
//! A target is created through the DevTools HTTP endpoint
//! (`PUT /json/new`), then driven over its `webSocketDebuggerUrl`. A reader
//! task routes command replies to their callers through `oneshot` channels
//! and, for every finished XHR/fetch response, fetches the body and pushes
//! it onto an `mpsc` channel. That channel is the passive response
//! listener: it never blocks navigation and its failures are only logged.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use adintel_core::AppConfig;
use async_trait::async_trait;
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::pool::SessionFactory;
use super::{BrowserSession, CapturedResponse};
use crate::error::ScraperError;

type WsRead = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type Reply = Result<Value, String>;

const READY_POLL: Duration = Duration::from_millis(250);

/// Resource types whose bodies the listener captures.
const CAPTURED_TYPES: &[&str] = &["XHR", "Fetch"];

#[derive(Debug, Deserialize)]
struct TargetInfo {
    id: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    ws_url: String,
}

/// Opens a fresh page target on a Chrome instance started with
/// `--remote-debugging-port`.
#[derive(Debug, Clone)]
pub struct CdpFactory {
    http: reqwest::Client,
    endpoint: String,
    command_timeout: Duration,
    load_timeout: Duration,
}

impl CdpFactory {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be built.
    pub fn new(endpoint: &str, timeout_secs: u64) -> Result<Self, ScraperError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            command_timeout: Duration::from_secs(timeout_secs),
            load_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// # Errors
    ///
    /// Same as [`CdpFactory::new`].
    pub fn from_config(config: &AppConfig) -> Result<Self, ScraperError> {
        Self::new(&config.browser_endpoint, config.request_timeout_secs)
    }

    /// Close a target whose session never came up.
    async fn close_target(&self, target_id: &str) {
        let url = format!("{}/json/close/{target_id}", self.endpoint);
        if let Err(e) = self.http.get(&url).send().await {
            tracing::warn!(target_id, error = %e, "failed to close devtools target");
        }
    }
}

#[async_trait]
impl SessionFactory for CdpFactory {
    type Session = CdpSession;

    async fn open(&self) -> Result<CdpSession, ScraperError> {
        let url = format!("{}/json/new?about:blank", self.endpoint);
        let response = self.http.put(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }
        let body = response.text().await?;
        let target: TargetInfo =
            serde_json::from_str(&body).map_err(|e| ScraperError::Deserialize {
                context: "DevTools /json/new".to_owned(),
                source: e,
            })?;

        tracing::debug!(target_id = %target.id, "devtools target created");
        let connected = CdpSession::connect(
            &target.ws_url,
            target.id.clone(),
            self.endpoint.clone(),
            self.http.clone(),
            self.command_timeout,
            self.load_timeout,
        )
        .await;
        if connected.is_err() {
            self.close_target(&target.id).await;
        }
        connected
    }
}

struct Connection {
    outgoing: mpsc::UnboundedSender<Message>,
    pending: Mutex<HashMap<u64, oneshot::Sender<Reply>>>,
    next_id: AtomicU64,
    command_timeout: Duration,
}

impl Connection {
    async fn call(&self, method: &str, params: Value) -> Result<Value, ScraperError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let frame = json!({ "id": id, "method": method, "params": params });
        if self.outgoing.send(Message::Text(frame.to_string().into())).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(ScraperError::Browser("devtools connection closed".to_owned()));
        }

        match tokio::time::timeout(self.command_timeout, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(message))) => Err(ScraperError::Browser(format!("{method}: {message}"))),
            Ok(Err(_)) => Err(ScraperError::Browser("devtools connection closed".to_owned())),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(ScraperError::Timeout {
                    what: method.to_owned(),
                    secs: self.command_timeout.as_secs(),
                })
            }
        }
    }
}

pub struct CdpSession {
    conn: Arc<Connection>,
    responses: mpsc::UnboundedReceiver<CapturedResponse>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    target_id: String,
    endpoint: String,
    http: reqwest::Client,
    load_timeout: Duration,
    closed: bool,
}

impl CdpSession {
    async fn connect(
        ws_url: &str,
        target_id: String,
        endpoint: String,
        http: reqwest::Client,
        command_timeout: Duration,
        load_timeout: Duration,
    ) -> Result<Self, ScraperError> {
        let (ws_stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| ScraperError::Browser(format!("websocket connection failed: {e}")))?;
        let (mut write, read) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let writer = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if let Err(e) = write.send(msg).await {
                    tracing::warn!(error = %e, "devtools write failed");
                    break;
                }
            }
        });

        let conn = Arc::new(Connection {
            outgoing: out_tx,
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            command_timeout,
        });
        let (captured_tx, captured_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_loop(read, Arc::clone(&conn), captured_tx));

        let session = Self {
            conn,
            responses: captured_rx,
            reader,
            writer,
            target_id,
            endpoint,
            http,
            load_timeout,
            closed: false,
        };
        session.conn.call("Page.enable", json!({})).await?;
        session.conn.call("Network.enable", json!({})).await?;
        Ok(session)
    }

    async fn wait_until_loaded(&self) -> Result<(), ScraperError> {
        let started = Instant::now();
        loop {
            let state = self
                .conn
                .call(
                    "Runtime.evaluate",
                    json!({ "expression": "document.readyState", "returnByValue": true }),
                )
                .await?;
            if state.pointer("/result/value").and_then(Value::as_str) == Some("complete") {
                return Ok(());
            }
            if started.elapsed() >= self.load_timeout {
                tracing::warn!(
                    timeout_secs = self.load_timeout.as_secs(),
                    "document did not finish loading, continuing"
                );
                return Ok(());
            }
            tokio::time::sleep(READY_POLL).await;
        }
    }
}

#[async_trait]
impl BrowserSession for CdpSession {
    async fn navigate(&mut self, url: &str) -> Result<(), ScraperError> {
        let reply = self.conn.call("Page.navigate", json!({ "url": url })).await?;
        if let Some(error) = reply
            .get("errorText")
            .and_then(Value::as_str)
            .filter(|e| !e.is_empty())
        {
            return Err(ScraperError::Browser(format!("navigation to {url} failed: {error}")));
        }
        self.wait_until_loaded().await
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value, ScraperError> {
        let reply = self
            .conn
            .call(
                "Runtime.evaluate",
                json!({ "expression": script, "returnByValue": true, "awaitPromise": true }),
            )
            .await?;
        if let Some(details) = reply.get("exceptionDetails") {
            let text = details
                .pointer("/exception/description")
                .or_else(|| details.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("script threw");
            return Err(ScraperError::Browser(format!("evaluate failed: {text}")));
        }
        Ok(reply
            .pointer("/result/value")
            .cloned()
            .unwrap_or(Value::Null))
    }

    fn drain_responses(&mut self) -> Vec<CapturedResponse> {
        let mut out = Vec::new();
        while let Ok(response) = self.responses.try_recv() {
            out.push(response);
        }
        out
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let url = format!("{}/json/close/{}", self.endpoint, self.target_id);
        let result = self.http.get(&url).send().await;
        self.reader.abort();
        self.writer.abort();
        result?;
        Ok(())
    }
}

impl Drop for CdpSession {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

async fn read_loop(
    mut read: WsRead,
    conn: Arc<Connection>,
    captured: mpsc::UnboundedSender<CapturedResponse>,
) {
    // requestId -> (url, mimeType) for responses whose body we want.
    let mut tracked: HashMap<String, (String, Option<String>)> = HashMap::new();

    while let Some(msg) = read.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "devtools read failed");
                break;
            }
        };
        let Ok(frame) = serde_json::from_str::<Value>(text.as_str()) else {
            tracing::debug!("unparseable devtools frame");
            continue;
        };

        if let Some(id) = frame.get("id").and_then(Value::as_u64) {
            let reply = match frame.get("error") {
                Some(err) => Err(err
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown devtools error")
                    .to_owned()),
                None => Ok(frame.get("result").cloned().unwrap_or(Value::Null)),
            };
            if let Some(tx) = conn.pending.lock().await.remove(&id) {
                let _ = tx.send(reply);
            }
            continue;
        }

        let params = frame.get("params").unwrap_or(&Value::Null);
        let request_id = params
            .get("requestId")
            .and_then(Value::as_str)
            .map(str::to_owned);
        match (frame.get("method").and_then(Value::as_str), request_id) {
            (Some("Network.responseReceived"), Some(request_id)) => {
                let kind = params.get("type").and_then(Value::as_str).unwrap_or_default();
                if CAPTURED_TYPES.contains(&kind) {
                    let url = params
                        .pointer("/response/url")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_owned();
                    let mime = params
                        .pointer("/response/mimeType")
                        .and_then(Value::as_str)
                        .map(str::to_owned);
                    tracked.insert(request_id, (url, mime));
                }
            }
            (Some("Network.loadingFinished"), Some(request_id)) => {
                if let Some((url, mime_type)) = tracked.remove(&request_id) {
                    tokio::spawn(fetch_body(
                        Arc::clone(&conn),
                        captured.clone(),
                        request_id,
                        url,
                        mime_type,
                    ));
                }
            }
            (Some("Network.loadingFailed"), Some(request_id)) => {
                tracked.remove(&request_id);
            }
            _ => {}
        }
    }

    // Dropping the senders wakes every waiting caller with "closed".
    conn.pending.lock().await.clear();
}

async fn fetch_body(
    conn: Arc<Connection>,
    captured: mpsc::UnboundedSender<CapturedResponse>,
    request_id: String,
    url: String,
    mime_type: Option<String>,
) {
    match conn
        .call("Network.getResponseBody", json!({ "requestId": request_id }))
        .await
    {
        Ok(reply) => {
            if reply
                .get("base64Encoded")
                .and_then(Value::as_bool)
                .unwrap_or(false)
            {
                return;
            }
            let body = reply
                .get("body")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            let _ = captured.send(CapturedResponse {
                url,
                mime_type,
                body,
            });
        }
        Err(e) => tracing::debug!(url = %url, error = %e, "response body unavailable"),
    }
}
