//! Browser launch and the single owned session used by a run.

use super::cdp::CdpClient;
use super::snapshot::RefTarget;
use autosignup_core::config::BrowserConfig;
use autosignup_core::{Error, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tracing::{debug, info};

/// Supported browser engines. Both speak CDP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserEngine {
    Chrome,
    Edge,
}

impl BrowserEngine {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Edge => "edge",
        }
    }
}

/// Everything needed to start a browser for a run.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub executable: Option<String>,
    pub headed: bool,
    pub profile_dir: PathBuf,
    pub extra_args: Vec<String>,
    pub launch_timeout: Duration,
}

impl LaunchOptions {
    pub fn from_config(config: &BrowserConfig, profile_dir: PathBuf) -> Self {
        Self {
            executable: config.executable.clone().filter(|s| !s.trim().is_empty()),
            headed: config.headed,
            profile_dir,
            extra_args: config.extra_args.clone(),
            launch_timeout: Duration::from_secs(config.launch_timeout_secs),
        }
    }
}

/// A launched browser with its CDP connection to the first page target.
pub struct BrowserSession {
    pub debug_port: u16,
    chrome_process: Child,
    pub cdp: CdpClient,
    pub profile_dir: PathBuf,
    pub current_url: Option<String>,
    /// Refs from the most recent snapshot; replaced wholesale on each snapshot.
    pub refs: HashMap<String, RefTarget>,
    closed: bool,
}

impl BrowserSession {
    /// Launch a browser and connect to its page target.
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        let browser_path = match options.executable.as_deref() {
            Some(path) => path.to_string(),
            None => find_any_browser()
                .map(|(_, path)| path)
                .ok_or_else(|| Error::Browser("no Chrome, Chromium or Edge binary found".into()))?,
        };

        std::fs::create_dir_all(&options.profile_dir)?;

        let debug_port = find_free_port().await?;
        let args = build_browser_args(debug_port, &options.profile_dir, options.headed, &options.extra_args);

        info!(
            browser = %browser_path,
            port = debug_port,
            headed = options.headed,
            profile = %options.profile_dir.display(),
            "Launching browser"
        );

        let child = Command::new(&browser_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Browser(format!("failed to launch {}: {}", browser_path, e)))?;

        wait_for_cdp_ready(debug_port, options.launch_timeout).await?;
        let page_ws_url = get_page_ws_url(debug_port).await?;
        let cdp = CdpClient::connect(&page_ws_url).await?;

        for domain in ["Page", "Runtime", "DOM", "Network", "Accessibility"] {
            cdp.enable_domain(domain).await?;
        }

        info!(ws_url = %page_ws_url, "CDP connection established");

        Ok(Self {
            debug_port,
            chrome_process: child,
            cdp,
            profile_dir: options.profile_dir.clone(),
            current_url: None,
            refs: HashMap::new(),
            closed: false,
        })
    }

    /// Close the browser. Safe to call more than once.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.cdp.send_command("Browser.close", json!({})).await {
            debug!("CDP Browser.close failed (may already be closed): {}", e);
        }
        let _ = self.chrome_process.kill().await;
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        let _ = self.chrome_process.start_kill();
    }
}

fn build_browser_args(debug_port: u16, profile_dir: &Path, headed: bool, extra_args: &[String]) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={}", debug_port),
        format!("--user-data-dir={}", profile_dir.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-background-networking".to_string(),
        "--disable-sync".to_string(),
        "--disable-translate".to_string(),
        "--password-store=basic".to_string(),
    ];
    if !headed {
        args.push("--headless=new".to_string());
    }
    args.push("--window-size=1280,900".to_string());
    args.extend(extra_args.iter().filter(|a| !a.trim().is_empty()).cloned());
    args.push("about:blank".to_string());
    args
}

/// Find a browser binary for the given engine.
pub fn find_browser_binary(engine: BrowserEngine) -> Option<String> {
    let candidates: Vec<&str> = match engine {
        BrowserEngine::Chrome => {
            if cfg!(target_os = "macos") {
                vec![
                    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                    "/Applications/Chromium.app/Contents/MacOS/Chromium",
                ]
            } else if cfg!(target_os = "linux") {
                vec![
                    "google-chrome", "google-chrome-stable",
                    "chromium", "chromium-browser",
                    "/usr/bin/google-chrome", "/usr/bin/chromium",
                ]
            } else {
                vec![
                    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
                    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
                ]
            }
        }
        BrowserEngine::Edge => {
            if cfg!(target_os = "macos") {
                vec!["/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge"]
            } else if cfg!(target_os = "linux") {
                vec!["microsoft-edge", "microsoft-edge-stable", "/usr/bin/microsoft-edge"]
            } else {
                vec![
                    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
                    r"C:\Program Files\Microsoft\Edge\Application\msedge.exe",
                ]
            }
        }
    };

    for candidate in candidates {
        if Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
        let bare = !candidate.contains('/') && !candidate.contains('\\');
        if bare && which::which(candidate).is_ok() {
            return Some(candidate.to_string());
        }
    }
    None
}

/// First available engine, Chrome preferred.
pub fn find_any_browser() -> Option<(BrowserEngine, String)> {
    [BrowserEngine::Chrome, BrowserEngine::Edge]
        .into_iter()
        .find_map(|engine| find_browser_binary(engine).map(|path| (engine, path)))
}

async fn find_free_port() -> Result<u16> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// Poll `/json/version` until the debugging endpoint answers.
async fn wait_for_cdp_ready(port: u16, timeout: Duration) -> Result<String> {
    let start = Instant::now();
    let url = format!("http://127.0.0.1:{}/json/version", port);

    loop {
        if start.elapsed() > timeout {
            return Err(Error::Browser(format!(
                "CDP endpoint not ready after {}s on port {}",
                timeout.as_secs(),
                port
            )));
        }

        if let Ok(resp) = reqwest::get(&url).await {
            if let Ok(body) = resp.json::<Value>().await {
                if let Some(ws_url) = body.get("webSocketDebuggerUrl").and_then(|v| v.as_str()) {
                    return Ok(ws_url.to_string());
                }
            }
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

/// WebSocket URL of the first `page` target. Retries because the target may
/// appear a little after the browser endpoint.
async fn get_page_ws_url(port: u16) -> Result<String> {
    let url = format!("http://127.0.0.1:{}/json/list", port);

    for attempt in 0..10 {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        let Ok(resp) = reqwest::get(&url).await else {
            continue;
        };
        let Ok(targets) = resp.json::<Vec<Value>>().await else {
            continue;
        };
        if let Some(ws_url) = first_page_ws_url(&targets) {
            return Ok(ws_url);
        }
    }

    Err(Error::Browser("no page target found after retries".into()))
}

fn first_page_ws_url(targets: &[Value]) -> Option<String> {
    targets
        .iter()
        .filter(|t| t.get("type").and_then(|v| v.as_str()) == Some("page"))
        .find_map(|t| t.get("webSocketDebuggerUrl").and_then(|v| v.as_str()))
        .map(str::to_string)
}
