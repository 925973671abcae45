pub mod agentmail;
pub mod poll;

use async_trait::async_trait;
use autosignup_core::Result;
use std::time::Duration;

/// A disposable mailbox that receives one-time verification codes.
#[async_trait]
pub trait VerificationCodeSource: Send + Sync {
    /// Provision a fresh inbox and return its address.
    async fn create_inbox(&self) -> Result<String>;

    /// Wait up to `timeout` for a 6-digit code to arrive at `address`.
    /// `Ok(None)` means the wait timed out.
    async fn wait_for_code(&self, address: &str, timeout: Duration) -> Result<Option<String>>;
}

pub use agentmail::AgentMailProvider;
pub use poll::{extract_code, poll_for_code};
