//! Scripted stand-ins for the browser and the mailbox.

use async_trait::async_trait;
use autosignup_core::{Error, Result};
use autosignup_mail::VerificationCodeSource;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::automation::Automation;
use crate::snapshot::ElementRef;

/// Script entry that makes `take_snapshot` fail.
pub const SNAPSHOT_ERROR: &str = "\u{0}snapshot-error";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Snapshot,
    Navigate(String),
    Click(String),
    Fill(String, String),
    PressKey(String),
    Evaluate(String),
    Close,
}

/// Serves snapshots in order, repeating the last one once the script runs out.
pub struct ScriptedAutomation {
    script: VecDeque<String>,
    last: String,
    calls: Arc<Mutex<Vec<Call>>>,
    fail_actions: bool,
}

impl ScriptedAutomation {
    pub fn new(snapshots: &[&str]) -> Self {
        Self {
            script: snapshots.iter().map(|s| s.to_string()).collect(),
            last: String::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_actions: false,
        }
    }

    /// Every click, fill, key press and script evaluation fails.
    pub fn failing_actions(mut self) -> Self {
        self.fail_actions = true;
        self
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<Call>>> {
        self.calls.clone()
    }

    fn record(&self, call: Call) -> Result<()> {
        let is_action = !matches!(call, Call::Snapshot | Call::Navigate(_) | Call::Close);
        self.calls.lock().unwrap().push(call);
        if self.fail_actions && is_action {
            return Err(Error::Browser("element detached".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Automation for ScriptedAutomation {
    async fn take_snapshot(&mut self, _verbose: bool) -> Result<String> {
        self.record(Call::Snapshot)?;
        if let Some(next) = self.script.pop_front() {
            if next == SNAPSHOT_ERROR {
                return Err(Error::Browser("target closed".into()));
            }
            self.last = next;
        }
        Ok(self.last.clone())
    }

    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.record(Call::Navigate(url.to_string()))
    }

    async fn click(&mut self, element: ElementRef<'_>) -> Result<()> {
        self.record(Call::Click(element.to_string()))
    }

    async fn fill(&mut self, element: ElementRef<'_>, value: &str) -> Result<()> {
        self.record(Call::Fill(element.to_string(), value.to_string()))
    }

    async fn press_key(&mut self, key: &str) -> Result<()> {
        self.record(Call::PressKey(key.to_string()))
    }

    async fn evaluate_script(&mut self, script: &str) -> Result<Value> {
        self.record(Call::Evaluate(script.to_string()))?;
        Ok(Value::Null)
    }

    async fn close(&mut self) {
        let _ = self.record(Call::Close);
    }
}

/// Mailbox with a fixed address and at most one code.
pub struct FakeCodes {
    address: Option<String>,
    code: Option<String>,
    created: Arc<AtomicU32>,
    waits: Arc<AtomicU32>,
}

impl FakeCodes {
    pub fn with_code(address: &str, code: &str) -> Self {
        Self {
            address: Some(address.to_string()),
            code: Some(code.to_string()),
            created: Arc::default(),
            waits: Arc::default(),
        }
    }

    pub fn without_code(address: &str) -> Self {
        Self {
            code: None,
            ..Self::with_code(address, "")
        }
    }

    /// `create_inbox` is refused.
    pub fn failing() -> Self {
        Self {
            address: None,
            ..Self::without_code("")
        }
    }

    pub fn created(&self) -> Arc<AtomicU32> {
        self.created.clone()
    }

    pub fn waits(&self) -> Arc<AtomicU32> {
        self.waits.clone()
    }
}

#[async_trait]
impl VerificationCodeSource for FakeCodes {
    async fn create_inbox(&self) -> Result<String> {
        let address = self
            .address
            .clone()
            .ok_or_else(|| Error::Mailbox("inbox creation returned 401 Unauthorized".into()))?;
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(address)
    }

    async fn wait_for_code(&self, address: &str, timeout: Duration) -> Result<Option<String>> {
        self.waits.fetch_add(1, Ordering::SeqCst);
        assert_eq!(Some(address), self.address.as_deref());
        match &self.code {
            Some(code) => Ok(Some(code.clone())),
            None => {
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
        }
    }
}
