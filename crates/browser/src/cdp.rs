//! Minimal Chrome DevTools Protocol client over WebSocket.
//!
//! Commands are correlated with their responses by id. Events are not
//! consumed by the signup flow and are dropped by the reader task.

use autosignup_core::{Error, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, trace, warn};

/// Upper bound on any single CDP round trip.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Mouse sequence of a left click: `(type, button, clickCount)`.
const CLICK_SEQUENCE: [(&str, &str, u8); 3] = [
    ("mouseMoved", "none", 0),
    ("mousePressed", "left", 1),
    ("mouseReleased", "left", 1),
];

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

#[derive(Serialize)]
struct Request<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

/// What the reader task does with one text frame.
#[derive(Debug, PartialEq)]
enum Incoming {
    Response(u64, Value),
    Event(String),
    Unparsed,
}

fn route_incoming(text: &str) -> Incoming {
    let Ok(frame) = serde_json::from_str::<Value>(text) else {
        return Incoming::Unparsed;
    };
    if let Some(id) = frame.get("id").and_then(Value::as_u64) {
        return Incoming::Response(id, frame);
    }
    match frame.get("method").and_then(Value::as_str) {
        Some(method) => Incoming::Event(method.to_string()),
        None => Incoming::Unparsed,
    }
}

/// The `result` object of a response, or its `error` as [`Error::Browser`].
fn command_result(method: &str, response: Value) -> Result<Value> {
    if let Some(error) = response.get("error") {
        return Err(Error::Browser(format!("CDP {} failed: {}", method, error)));
    }
    Ok(response.get("result").cloned().unwrap_or(Value::Null))
}

fn key_event_params(event_type: &str, key: &str, code: &str, modifiers: i32) -> Value {
    let mut params = json!({ "type": event_type, "key": key, "code": code });
    if modifiers != 0 {
        params["modifiers"] = json!(modifiers);
    }
    if event_type == "keyDown" {
        // Printable keys need `text` or the page never sees a character.
        let text = match key {
            "Enter" => Some("\r"),
            k if k.chars().count() == 1 => Some(k),
            _ => None,
        };
        if let Some(text) = text {
            params["text"] = json!(text);
        }
    }
    params
}

pub struct CdpClient {
    outbox: mpsc::Sender<String>,
    pending: PendingMap,
    next_id: AtomicU64,
    tasks: [tokio::task::JoinHandle<()>; 2],
}

impl CdpClient {
    /// Connect to a page target's debugger WebSocket.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::connect_async;
        use tokio_tungstenite::tungstenite::Message;

        let (stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| Error::Browser(format!("failed to connect to CDP endpoint {}: {}", ws_url, e)))?;
        let (mut sink, mut frames) = stream.split();
        let (outbox, mut outgoing) = mpsc::channel::<String>(256);
        let pending: PendingMap = Arc::default();

        let writer = tokio::spawn(async move {
            while let Some(text) = outgoing.recv().await {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    error!(error = %e, "CDP WebSocket write failed");
                    break;
                }
            }
        });

        let waiting = pending.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = frames.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => {
                        debug!("CDP WebSocket closed by browser");
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(error = %e, "CDP WebSocket read failed");
                        break;
                    }
                };
                match route_incoming(&text) {
                    Incoming::Response(id, response) => {
                        if let Some(reply) = waiting.lock().await.remove(&id) {
                            let _ = reply.send(response);
                        }
                    }
                    Incoming::Event(method) => trace!(%method, "CDP event ignored"),
                    Incoming::Unparsed => {}
                }
            }
        });

        Ok(Self {
            outbox,
            pending,
            next_id: AtomicU64::new(1),
            tasks: [reader, writer],
        })
    }

    /// Send a command and wait for its result object.
    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = serde_json::to_string(&Request { id, method, params })?;

        let (reply, response) = oneshot::channel();
        self.pending.lock().await.insert(id, reply);

        if let Err(e) = self.outbox.send(request).await {
            self.pending.lock().await.remove(&id);
            return Err(Error::Browser(format!("failed to send CDP command {}: {}", method, e)));
        }

        match tokio::time::timeout(COMMAND_TIMEOUT, response).await {
            Ok(Ok(response)) => command_result(method, response),
            Ok(Err(_)) => Err(Error::Browser("CDP connection closed before the response".into())),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(Error::Browser(format!(
                    "CDP command '{}' timed out after {}s",
                    method,
                    COMMAND_TIMEOUT.as_secs()
                )))
            }
        }
    }

    pub async fn enable_domain(&self, domain: &str) -> Result<()> {
        self.send_command(&format!("{}.enable", domain), json!({})).await?;
        Ok(())
    }

    pub async fn navigate(&self, url: &str) -> Result<Value> {
        self.send_command("Page.navigate", json!({ "url": url })).await
    }

    /// Evaluate an expression in the page; awaits promises and returns by value.
    pub async fn evaluate_js(&self, expression: &str) -> Result<Value> {
        let params = json!({ "expression": expression, "returnByValue": true, "awaitPromise": true });
        self.send_command("Runtime.evaluate", params).await
    }

    pub async fn get_accessibility_tree(&self) -> Result<Value> {
        self.send_command("Accessibility.getFullAXTree", json!({})).await
    }

    /// Run `function_declaration` with `this` bound to a resolved remote object.
    pub async fn call_on_object(&self, object_id: &str, function_declaration: &str) -> Result<Value> {
        let params = json!({
            "objectId": object_id,
            "functionDeclaration": function_declaration,
            "returnByValue": true,
        });
        self.send_command("Runtime.callFunctionOn", params).await
    }

    /// Left click at viewport coordinates.
    pub async fn click_at(&self, x: f64, y: f64) -> Result<()> {
        for (kind, button, clicks) in CLICK_SEQUENCE {
            let params = json!({ "type": kind, "x": x, "y": y, "button": button, "clickCount": clicks });
            self.send_command("Input.dispatchMouseEvent", params).await?;
        }
        Ok(())
    }

    pub async fn dispatch_key_event(&self, event_type: &str, key: &str, code: &str, modifiers: i32) -> Result<()> {
        let params = key_event_params(event_type, key, code, modifiers);
        self.send_command("Input.dispatchKeyEvent", params).await?;
        Ok(())
    }

    /// Type `text` into the focused element without per-key events.
    pub async fn insert_text(&self, text: &str) -> Result<()> {
        self.send_command("Input.insertText", json!({ "text": text })).await?;
        Ok(())
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
