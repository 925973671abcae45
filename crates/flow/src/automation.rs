use async_trait::async_trait;
use autosignup_browser::BrowserSession;
use autosignup_core::Result;
use serde_json::Value;

use crate::snapshot::ElementRef;

/// Browser operations the signup flow depends on.
#[async_trait]
pub trait Automation: Send {
    async fn take_snapshot(&mut self, verbose: bool) -> Result<String>;
    async fn navigate(&mut self, url: &str) -> Result<()>;
    async fn click(&mut self, element: ElementRef<'_>) -> Result<()>;
    async fn fill(&mut self, element: ElementRef<'_>, value: &str) -> Result<()>;
    async fn press_key(&mut self, key: &str) -> Result<()>;
    async fn evaluate_script(&mut self, script: &str) -> Result<Value>;
    /// Release the browser. Must be safe to call more than once.
    async fn close(&mut self);
}

#[async_trait]
impl Automation for BrowserSession {
    async fn take_snapshot(&mut self, verbose: bool) -> Result<String> {
        self.snapshot(verbose).await
    }

    async fn navigate(&mut self, url: &str) -> Result<()> {
        BrowserSession::navigate(self, url).await
    }

    async fn click(&mut self, element: ElementRef<'_>) -> Result<()> {
        self.click_ref(element.as_str()).await
    }

    async fn fill(&mut self, element: ElementRef<'_>, value: &str) -> Result<()> {
        self.fill_ref(element.as_str(), value).await
    }

    async fn press_key(&mut self, key: &str) -> Result<()> {
        BrowserSession::press_key(self, key).await
    }

    async fn evaluate_script(&mut self, script: &str) -> Result<Value> {
        self.evaluate(script).await
    }

    async fn close(&mut self) {
        BrowserSession::close(self).await
    }
}
