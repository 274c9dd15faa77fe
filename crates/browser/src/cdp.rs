//! Low-level Chrome DevTools Protocol (CDP) client over WebSocket.
//!
//! Talks to one page target through its debugging WebSocket endpoint.
//! Commands are correlated with responses by id; events are fanned out to subscribers.

use blockharvest_core::{Error, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, warn};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const EVENT_BUFFER: usize = 1024;

/// A CDP WebSocket client that can send commands and receive responses/events.
pub struct CdpClient {
    /// Sender to write messages to the WebSocket.
    ws_tx: mpsc::Sender<String>,
    /// Pending command responses, keyed by request ID.
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>,
    /// Auto-incrementing command ID.
    next_id: AtomicU64,
    /// Event listeners (domain.event -> channel).
    event_listeners: Arc<Mutex<HashMap<String, Vec<mpsc::Sender<Value>>>>>,
    _reader_handle: tokio::task::JoinHandle<()>,
    _writer_handle: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to a Chrome CDP WebSocket endpoint.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::connect_async;
        use tokio_tungstenite::tungstenite::Message;

        let (ws_stream, _) = connect_async(ws_url).await.map_err(|e| {
            Error::Browser(format!("failed to connect to CDP endpoint {}: {}", ws_url, e))
        })?;

        let (mut ws_sink, mut ws_stream_read) = ws_stream.split();

        let (ws_tx, mut ws_rx) = mpsc::channel::<String>(256);

        let pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let pending_clone = pending.clone();

        let event_listeners: Arc<Mutex<HashMap<String, Vec<mpsc::Sender<Value>>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let events_clone = event_listeners.clone();

        // Writer task: owns the sink, forwards messages from channel
        let writer_handle = tokio::spawn(async move {
            while let Some(msg) = ws_rx.recv().await {
                if let Err(e) = ws_sink.send(Message::Text(msg)).await {
                    error!("CDP WebSocket write error: {}", e);
                    break;
                }
            }
        });

        // Reader task: dispatches responses by id and events by method
        let reader_handle = tokio::spawn(async move {
            while let Some(msg_result) = ws_stream_read.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => {
                        let Ok(val) = serde_json::from_str::<Value>(&text) else {
                            continue;
                        };
                        if let Some(id) = val.get("id").and_then(|v| v.as_u64()) {
                            let mut pending = pending_clone.lock().await;
                            if let Some(tx) = pending.remove(&id) {
                                let _ = tx.send(val);
                            }
                        } else if let Some(method) = val.get("method").and_then(|v| v.as_str()) {
                            let mut listeners = events_clone.lock().await;
                            if let Some(senders) = listeners.get_mut(method) {
                                let params = val.get("params").cloned().unwrap_or(Value::Null);
                                senders.retain(|tx| !tx.is_closed());
                                for tx in senders.iter() {
                                    if tx.try_send(params.clone()).is_err() {
                                        warn!(event = method, "CDP event listener lagging, event dropped");
                                    }
                                }
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("CDP WebSocket closed by browser");
                        break;
                    }
                    Err(e) => {
                        warn!("CDP WebSocket read error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            // Fail every in-flight command instead of letting it run into its timeout.
            pending_clone.lock().await.clear();
        });

        Ok(Self {
            ws_tx,
            pending,
            next_id: AtomicU64::new(1),
            event_listeners,
            _reader_handle: reader_handle,
            _writer_handle: writer_handle,
        })
    }

    /// Send a CDP command and wait for the response.
    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value> {
        self.send_command_timeout(method, params, COMMAND_TIMEOUT).await
    }

    /// Send a CDP command, giving up after `timeout`.
    pub async fn send_command_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let msg = json!({
            "id": id,
            "method": method,
            "params": params,
        });

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id, tx);
        }

        self.ws_tx
            .send(msg.to_string())
            .await
            .map_err(|e| Error::Browser(format!("failed to send CDP command: {}", e)))?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => {
                if let Some(error) = response.get("error") {
                    Err(Error::Browser(format!("{} failed: {}", method, error)))
                } else {
                    Ok(response.get("result").cloned().unwrap_or(Value::Null))
                }
            }
            Ok(Err(_)) => Err(Error::Browser(format!(
                "CDP connection closed while waiting for {}",
                method
            ))),
            Err(_) => {
                let mut pending = self.pending.lock().await;
                pending.remove(&id);
                Err(Error::Timeout(format!(
                    "CDP command '{}' timed out after {}ms",
                    method,
                    timeout.as_millis()
                )))
            }
        }
    }

    /// Subscribe to a CDP event. Returns a receiver that will get event params.
    pub async fn subscribe_event(&self, method: &str) -> mpsc::Receiver<Value> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let mut listeners = self.event_listeners.lock().await;
        listeners.entry(method.to_string()).or_default().push(tx);
        rx
    }

    /// Enable a CDP domain (e.g., "Page", "Runtime", "Network", "DOM").
    pub async fn enable_domain(&self, domain: &str) -> Result<()> {
        self.send_command(&format!("{}.enable", domain), json!({}))
            .await?;
        Ok(())
    }

    /// Start a navigation. Fails when the browser reports a network error.
    pub async fn navigate(&self, url: &str) -> Result<Value> {
        let result = self
            .send_command("Page.navigate", json!({"url": url}))
            .await?;
        if let Some(err) = result.get("errorText").and_then(|v| v.as_str()) {
            return Err(Error::Browser(format!("navigation to {} failed: {}", url, err)));
        }
        Ok(result)
    }

    /// Evaluate JavaScript in the page and return the value.
    pub async fn evaluate_js(&self, expression: &str) -> Result<Value> {
        let result = self
            .send_command(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        check_exception(&result)?;
        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Evaluate JavaScript and keep the result as a remote object in `group`.
    /// Returns `None` when the expression yields null or undefined.
    pub async fn evaluate_handle(&self, expression: &str, group: &str) -> Result<Option<String>> {
        let result = self
            .send_command(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": false,
                    "objectGroup": group,
                }),
            )
            .await?;
        check_exception(&result)?;
        Ok(remote_object_id(&result["result"]))
    }

    /// Call a function with `this` bound to a remote object.
    ///
    /// With `group` set the result stays remote (its object id lives in that group);
    /// otherwise it is returned by value.
    pub async fn call_function_on(
        &self,
        object_id: &str,
        function_declaration: &str,
        args: &[Value],
        group: Option<&str>,
    ) -> Result<Value> {
        let arguments: Vec<Value> = args.iter().map(|a| json!({ "value": a })).collect();
        let mut params = json!({
            "objectId": object_id,
            "functionDeclaration": function_declaration,
            "arguments": arguments,
            "awaitPromise": true,
            "returnByValue": group.is_none(),
        });
        if let Some(g) = group {
            params["objectGroup"] = json!(g);
        }
        let result = self.send_command("Runtime.callFunctionOn", params).await?;
        check_exception(&result)?;
        Ok(result.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Indexed members of a remote array-like object, as object ids.
    pub async fn array_elements(&self, object_id: &str) -> Result<Vec<String>> {
        let result = self
            .send_command(
                "Runtime.getProperties",
                json!({"objectId": object_id, "ownProperties": true}),
            )
            .await?;
        Ok(indexed_object_ids(&result))
    }

    /// Release every remote object created in `group`.
    pub async fn release_object_group(&self, group: &str) -> Result<()> {
        self.send_command("Runtime.releaseObjectGroup", json!({"objectGroup": group}))
            .await?;
        Ok(())
    }

    /// Capture a PNG, optionally clipped to a page-coordinate rectangle.
    /// Returns base64 data.
    pub async fn screenshot(&self, clip: Option<Clip>, timeout: Duration) -> Result<String> {
        let mut params = json!({"format": "png", "captureBeyondViewport": true});
        if let Some(c) = clip {
            params["clip"] = json!({
                "x": c.x,
                "y": c.y,
                "width": c.width,
                "height": c.height,
                "scale": 1,
            });
        }
        let result = self
            .send_command_timeout("Page.captureScreenshot", params, timeout)
            .await?;
        result
            .get("data")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| Error::Browser("no screenshot data returned".into()))
    }

    /// Size of the whole rendered document in CSS pixels.
    pub async fn content_size(&self) -> Result<(f64, f64)> {
        let metrics = self.send_command("Page.getLayoutMetrics", json!({})).await?;
        let size = metrics
            .get("cssContentSize")
            .or_else(|| metrics.get("contentSize"))
            .ok_or_else(|| Error::Browser("layout metrics without content size".into()))?;
        Ok((
            size["width"].as_f64().unwrap_or(0.0),
            size["height"].as_f64().unwrap_or(0.0),
        ))
    }

    /// Insert text into the focused element (bypasses key events).
    pub async fn insert_text(&self, text: &str) -> Result<()> {
        self.send_command("Input.insertText", json!({"text": text}))
            .await?;
        Ok(())
    }

    /// Set viewport/device metrics.
    pub async fn set_viewport(&self, width: u32, height: u32, device_scale_factor: f64) -> Result<()> {
        self.send_command(
            "Emulation.setDeviceMetricsOverride",
            json!({
                "width": width,
                "height": height,
                "deviceScaleFactor": device_scale_factor,
                "mobile": false,
            }),
        )
        .await?;
        Ok(())
    }

    pub async fn set_user_agent(&self, user_agent: &str) -> Result<()> {
        self.send_command(
            "Network.setUserAgentOverride",
            json!({"userAgent": user_agent}),
        )
        .await?;
        Ok(())
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self._reader_handle.abort();
        self._writer_handle.abort();
    }
}

/// Screenshot region in page (document) coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clip {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Clip {
    /// Parse `{x, y, width, height}`; zero-area regions are rejected.
    pub fn from_value(v: &Value) -> Result<Self> {
        let field = |name: &str| {
            v.get(name)
                .and_then(|n| n.as_f64())
                .ok_or_else(|| Error::Browser(format!("clip rectangle missing '{}'", name)))
        };
        let clip = Self {
            x: field("x")?,
            y: field("y")?,
            width: field("width")?,
            height: field("height")?,
        };
        if clip.width < 1.0 || clip.height < 1.0 {
            return Err(Error::Browser(format!(
                "element has no visible area ({}x{})",
                clip.width, clip.height
            )));
        }
        Ok(clip)
    }
}

/// Surface a thrown JavaScript exception as an error.
fn check_exception(result: &Value) -> Result<()> {
    if let Some(details) = result.get("exceptionDetails") {
        let message = details
            .get("exception")
            .and_then(|e| e.get("description"))
            .and_then(|d| d.as_str())
            .or_else(|| details.get("text").and_then(|t| t.as_str()))
            .unwrap_or("unknown exception");
        return Err(Error::Browser(format!("script error: {}", message)));
    }
    Ok(())
}

/// Object id of a RemoteObject, or `None` for null/undefined.
pub fn remote_object_id(remote: &Value) -> Option<String> {
    if remote.get("subtype").and_then(|s| s.as_str()) == Some("null") {
        return None;
    }
    remote
        .get("objectId")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Object ids of `"0"`, `"1"`, ... properties from a `Runtime.getProperties` result, in index order.
fn indexed_object_ids(result: &Value) -> Vec<String> {
    let mut items: Vec<(usize, String)> = result
        .get("result")
        .and_then(|v| v.as_array())
        .map(|props| {
            props
                .iter()
                .filter_map(|p| {
                    let index = p.get("name")?.as_str()?.parse::<usize>().ok()?;
                    let id = remote_object_id(p.get("value")?)?;
                    Some((index, id))
                })
                .collect()
        })
        .unwrap_or_default();
    items.sort_by_key(|(i, _)| *i);
    items.into_iter().map(|(_, id)| id).collect()
}

/// Quote a Rust string as a JavaScript string literal.
pub fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}
