use async_trait::async_trait;
use autosignup_core::config::MailboxConfig;
use autosignup_core::{Error, Result};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::poll::{find_code, poll_for_code, MessageSummary};
use crate::VerificationCodeSource;

/// Disposable inboxes from an AgentMail-compatible REST API.
pub struct AgentMailProvider {
    client: Client,
    api_key: String,
    api_base: String,
    display_name: String,
    max_inboxes: usize,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct InboxList {
    #[serde(default)]
    count: Option<usize>,
    #[serde(default)]
    inboxes: Vec<Inbox>,
}

#[derive(Debug, Deserialize)]
struct Inbox {
    inbox_id: String,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageSummary>,
}

impl AgentMailProvider {
    pub fn new(api_key: &str, config: &MailboxConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            display_name: config.display_name.clone(),
            max_inboxes: config.max_inboxes,
            poll_interval: config.poll_interval(),
        })
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("Authorization", format!("Bearer {}", self.api_key))
    }

    fn inbox_url(&self, inbox_id: &str) -> String {
        format!("{}/inboxes/{}", self.api_base, urlencoding::encode(inbox_id))
    }

    /// Delete the oldest inbox when the account is at its quota. Failures are
    /// logged; creation is attempted regardless.
    async fn rotate_inboxes(&self) {
        let url = format!("{}/inboxes", self.api_base);
        let list = match self.authed(self.client.get(&url)).send().await {
            Ok(resp) if resp.status().is_success() => resp.json::<InboxList>().await,
            Ok(resp) => {
                warn!(status = %resp.status(), "Listing inboxes failed");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Listing inboxes failed");
                return;
            }
        };
        let list = match list {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "Unreadable inbox listing");
                return;
            }
        };

        let count = list.count.unwrap_or(list.inboxes.len());
        if count < self.max_inboxes {
            return;
        }
        // The listing is newest first.
        let Some(oldest) = list.inboxes.last() else {
            return;
        };
        info!(inbox = %oldest.inbox_id, count, "Deleting oldest inbox");
        match self.authed(self.client.delete(self.inbox_url(&oldest.inbox_id))).send().await {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => warn!(status = %resp.status(), inbox = %oldest.inbox_id, "Inbox delete rejected"),
            Err(e) => warn!(error = %e, inbox = %oldest.inbox_id, "Inbox delete failed"),
        }
    }

    async fn fetch_code(&self, address: &str) -> Result<Option<String>> {
        let url = format!("{}/messages", self.inbox_url(address));
        let resp = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(|e| Error::Http(format!("message listing failed: {}", e)))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Mailbox(format!("message listing returned {}", status)));
        }
        let list: MessageList = resp
            .json()
            .await
            .map_err(|e| Error::Mailbox(format!("unreadable message listing: {}", e)))?;
        debug!(messages = list.messages.len(), "Polled inbox");
        Ok(find_code(&list.messages))
    }
}

#[async_trait]
impl VerificationCodeSource for AgentMailProvider {
    async fn create_inbox(&self) -> Result<String> {
        self.rotate_inboxes().await;

        let url = format!("{}/inboxes", self.api_base);
        let resp = self
            .authed(self.client.post(&url))
            .json(&json!({ "display_name": self.display_name }))
            .send()
            .await
            .map_err(|e| Error::Http(format!("inbox creation failed: {}", e)))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Mailbox(format!("inbox creation returned {}: {}", status, body)));
        }
        let inbox: Inbox = resp
            .json()
            .await
            .map_err(|e| Error::Mailbox(format!("unreadable inbox response: {}", e)))?;
        info!(address = %inbox.inbox_id, "Inbox created");
        Ok(inbox.inbox_id)
    }

    async fn wait_for_code(&self, address: &str, timeout: Duration) -> Result<Option<String>> {
        info!(address, timeout_ms = timeout.as_millis() as u64, "Waiting for verification code");
        Ok(poll_for_code(timeout, self.poll_interval, || self.fetch_code(address)).await)
    }
}
