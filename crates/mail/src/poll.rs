//! Bounded polling for one-time codes.

use autosignup_core::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

static CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{6})\b").expect("static code pattern"));

/// The parts of a mailbox message that can carry a code.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageSummary {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
}

/// First standalone 6-digit number in `text`.
pub fn extract_code(text: &str) -> Option<String> {
    CODE_RE.captures(text).map(|c| c[1].to_string())
}

/// Scan messages in listing order; subject before preview within a message.
pub fn find_code(messages: &[MessageSummary]) -> Option<String> {
    messages.iter().find_map(|msg| {
        msg.subject
            .as_deref()
            .and_then(extract_code)
            .or_else(|| msg.preview.as_deref().and_then(extract_code))
    })
}

/// Call `fetch` until it yields a code or `timeout` elapses.
///
/// A fetch is only started before the deadline, each fetch is cut off at the
/// deadline, and the sleep between fetches never overshoots it. Fetch errors
/// are logged and retried on the next round.
pub async fn poll_for_code<F, Fut>(timeout: Duration, interval: Duration, mut fetch: F) -> Option<String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<String>>>,
{
    let deadline = Instant::now() + timeout;
    let mut attempt = 0u32;

    loop {
        let now = Instant::now();
        if now >= deadline {
            debug!(attempt, "Code wait deadline reached");
            return None;
        }
        attempt += 1;

        match tokio::time::timeout(deadline - now, fetch()).await {
            Ok(Ok(Some(code))) => {
                debug!(attempt, "Verification code received");
                return Some(code);
            }
            Ok(Ok(None)) => debug!(attempt, "No code yet"),
            Ok(Err(e)) => warn!(attempt, error = %e, "Mailbox poll failed"),
            Err(_) => {
                debug!(attempt, "Mailbox poll cut off at deadline");
                return None;
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return None;
        }
        tokio::time::sleep(interval.min(remaining)).await;
    }
}
