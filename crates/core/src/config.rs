use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::paths::Paths;

/// Environment variable holding the mailbox provider credential.
pub const MAILBOX_API_KEY_ENV: &str = "AGENTMAIL_API_KEY";
/// Set to `1`/`true` to force a headless browser regardless of config.
pub const HEADLESS_ENV: &str = "AUTOSIGNUP_HEADLESS";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_mailbox_api_base")]
    pub api_base: String,
    #[serde(default = "default_display_name")]
    pub display_name: String,
    /// Inbox quota of the provider account; the oldest inbox is deleted
    /// before creating a new one once this many exist.
    #[serde(default = "default_max_inboxes")]
    pub max_inboxes: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_mailbox_api_base() -> String {
    "https://api.agentmail.to/v0".to_string()
}

fn default_display_name() -> String {
    "Agent Factory".to_string()
}

fn default_max_inboxes() -> usize {
    3
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: default_mailbox_api_base(),
            display_name: default_display_name(),
            max_inboxes: default_max_inboxes(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl MailboxConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserConfig {
    /// Explicit browser binary. When unset, well-known install locations and
    /// `PATH` are searched.
    #[serde(default)]
    pub executable: Option<String>,
    #[serde(default = "default_headed")]
    pub headed: bool,
    #[serde(default)]
    pub profile_dir: Option<String>,
    #[serde(default = "default_extra_args")]
    pub extra_args: Vec<String>,
    #[serde(default = "default_launch_timeout_secs")]
    pub launch_timeout_secs: u64,
}

fn default_headed() -> bool {
    true
}

fn default_extra_args() -> Vec<String> {
    vec![
        "--no-sandbox".to_string(),
        "--disable-setuid-sandbox".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
    ]
}

fn default_launch_timeout_secs() -> u64 {
    15
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headed: default_headed(),
            profile_dir: None,
            extra_args: default_extra_args(),
            launch_timeout_secs: default_launch_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowConfig {
    #[serde(default = "default_home_url")]
    pub home_url: String,
    #[serde(default = "default_login_url")]
    pub login_url: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u32,
    #[serde(default = "default_cycle_delay_ms")]
    pub cycle_delay_ms: u64,
    #[serde(default = "default_landing_settle_ms")]
    pub landing_settle_ms: u64,
    #[serde(default = "default_otp_timeout_ms")]
    pub otp_timeout_ms: u64,
    #[serde(default = "default_field_pause_ms")]
    pub field_pause_ms: u64,
    #[serde(default = "default_submit_pause_ms")]
    pub submit_pause_ms: u64,
    #[serde(default = "default_verify_settle_ms")]
    pub verify_settle_ms: u64,
    #[serde(default = "default_probe_message")]
    pub probe_message: String,
    #[serde(default = "default_verify_marker")]
    pub verify_marker: String,
}

fn default_home_url() -> String {
    "https://chatgpt.com/".to_string()
}

fn default_login_url() -> String {
    "https://chatgpt.com/auth/login".to_string()
}

fn default_password() -> String {
    "AutomationTest123!".to_string()
}

fn default_max_cycles() -> u32 {
    50
}

fn default_cycle_delay_ms() -> u64 {
    5000
}

fn default_landing_settle_ms() -> u64 {
    5000
}

fn default_otp_timeout_ms() -> u64 {
    60_000
}

fn default_field_pause_ms() -> u64 {
    200
}

fn default_submit_pause_ms() -> u64 {
    1000
}

fn default_verify_settle_ms() -> u64 {
    15_000
}

fn default_verify_marker() -> String {
    "SUCCESS_AGENT_VERIFIED".to_string()
}

fn default_probe_message() -> String {
    format!("Please respond with exactly: {}", default_verify_marker())
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            home_url: default_home_url(),
            login_url: default_login_url(),
            password: default_password(),
            max_cycles: default_max_cycles(),
            cycle_delay_ms: default_cycle_delay_ms(),
            landing_settle_ms: default_landing_settle_ms(),
            otp_timeout_ms: default_otp_timeout_ms(),
            field_pause_ms: default_field_pause_ms(),
            submit_pause_ms: default_submit_pause_ms(),
            verify_settle_ms: default_verify_settle_ms(),
            probe_message: default_probe_message(),
            verify_marker: default_verify_marker(),
        }
    }
}

impl FlowConfig {
    pub fn cycle_delay(&self) -> Duration {
        Duration::from_millis(self.cycle_delay_ms)
    }

    pub fn landing_settle(&self) -> Duration {
        Duration::from_millis(self.landing_settle_ms)
    }

    pub fn otp_timeout(&self) -> Duration {
        Duration::from_millis(self.otp_timeout_ms)
    }

    pub fn field_pause(&self) -> Duration {
        Duration::from_millis(self.field_pause_ms)
    }

    pub fn submit_pause(&self) -> Duration {
        Duration::from_millis(self.submit_pause_ms)
    }

    pub fn verify_settle(&self) -> Duration {
        Duration::from_millis(self.verify_settle_ms)
    }
}

/// Personal details typed into the "about you" step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileConfig {
    #[serde(default = "default_full_name")]
    pub full_name: String,
    #[serde(default = "default_birth_month")]
    pub birth_month: u8,
    #[serde(default = "default_birth_day")]
    pub birth_day: u8,
    #[serde(default = "default_birth_year")]
    pub birth_year: u16,
}

fn default_full_name() -> String {
    "Agent User".to_string()
}

fn default_birth_month() -> u8 {
    1
}

fn default_birth_day() -> u8 {
    1
}

fn default_birth_year() -> u16 {
    1990
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            full_name: default_full_name(),
            birth_month: default_birth_month(),
            birth_day: default_birth_day(),
            birth_year: default_birth_year(),
        }
    }
}

impl ProfileConfig {
    /// Birthday in the `MM/DD/YYYY` form expected by a combined date field.
    pub fn birthday(&self) -> String {
        format!("{:02}/{:02}/{}", self.birth_month, self.birth_day, self.birth_year)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DebugConfig {
    /// Where per-cycle snapshots and stuck-state dumps are written.
    #[serde(default)]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub mailbox: MailboxConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub flow: FlowConfig,
    #[serde(default)]
    pub profile: ProfileConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Overlay process environment settings on top of the file config.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(MAILBOX_API_KEY_ENV) {
            let key = key.trim();
            if !key.is_empty() {
                self.mailbox.api_key = key.to_string();
            }
        }
        if let Some(flag) = lookup(HEADLESS_ENV) {
            if matches!(flag.trim(), "1" | "true" | "TRUE" | "True") {
                self.browser.headed = false;
            }
        }
    }

    /// The mailbox credential, or a configuration error naming where to set it.
    pub fn mailbox_api_key(&self) -> Result<&str> {
        let key = self.mailbox.api_key.trim();
        if key.is_empty() {
            return Err(Error::Config(format!(
                "missing mailbox API key: set {} or mailbox.apiKey in config.json",
                MAILBOX_API_KEY_ENV
            )));
        }
        Ok(key)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("flow.homeUrl", &self.flow.home_url),
            ("flow.loginUrl", &self.flow.login_url),
            ("mailbox.apiBase", &self.mailbox.api_base),
        ] {
            url::Url::parse(value)
                .map_err(|e| Error::Config(format!("{} is not a valid URL ({}): {}", field, value, e)))?;
        }
        if self.flow.max_cycles == 0 {
            return Err(Error::Config("flow.maxCycles must be at least 1".into()));
        }
        if self.mailbox.poll_interval_ms == 0 {
            return Err(Error::Config("mailbox.pollIntervalMs must be positive".into()));
        }
        if self.flow.password.is_empty() {
            return Err(Error::Config("flow.password must not be empty".into()));
        }
        Ok(())
    }

    pub fn debug_dir(&self, paths: &Paths) -> PathBuf {
        match self.debug.dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => paths.debug_dir(),
        }
    }

    pub fn profile_dir(&self, paths: &Paths) -> PathBuf {
        match self.browser.profile_dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => paths.profile_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.flow.max_cycles, 50);
        assert_eq!(cfg.mailbox.poll_interval_ms, 2000);
        assert_eq!(cfg.mailbox.max_inboxes, 3);
        assert_eq!(cfg.flow.verify_marker, "SUCCESS_AGENT_VERIFIED");
        assert!(cfg.flow.probe_message.ends_with("SUCCESS_AGENT_VERIFIED"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_camel_case_json() {
        let raw = r#"{
  "mailbox": { "apiKey": "am_test", "pollIntervalMs": 500 },
  "flow": { "maxCycles": 10, "cycleDelayMs": 0 }
}"#;
        let cfg: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.mailbox.api_key, "am_test");
        assert_eq!(cfg.mailbox.poll_interval_ms, 500);
        assert_eq!(cfg.mailbox.display_name, "Agent Factory");
        assert_eq!(cfg.flow.max_cycles, 10);
        assert_eq!(cfg.flow.cycle_delay(), Duration::ZERO);
        assert_eq!(cfg.flow.login_url, "https://chatgpt.com/auth/login");
        assert_eq!(cfg.profile.full_name, "Agent User");
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let cfg = Config::default();
        let err = cfg.mailbox_api_key().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains(MAILBOX_API_KEY_ENV));
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = Config::default();
        cfg.apply_env_from(|key| match key {
            MAILBOX_API_KEY_ENV => Some(" am_env ".to_string()),
            HEADLESS_ENV => Some("1".to_string()),
            _ => None,
        });
        assert_eq!(cfg.mailbox_api_key().unwrap(), "am_env");
        assert!(!cfg.browser.headed);
    }

    #[test]
    fn test_blank_env_key_keeps_file_key() {
        let mut cfg = Config::default();
        cfg.mailbox.api_key = "am_file".to_string();
        cfg.apply_env_from(|key| (key == MAILBOX_API_KEY_ENV).then(|| "  ".to_string()));
        assert_eq!(cfg.mailbox_api_key().unwrap(), "am_file");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = Config::default();
        cfg.flow.login_url = "not a url".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.flow.max_cycles = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_birthday_format() {
        let profile = ProfileConfig::default();
        assert_eq!(profile.birthday(), "01/01/1990");
    }

    #[test]
    fn test_dir_overrides() {
        let paths = Paths::with_base(PathBuf::from("/tmp/base"));
        let mut cfg = Config::default();
        assert_eq!(cfg.debug_dir(&paths), PathBuf::from("/tmp/base/debug"));
        cfg.debug.dir = Some("/var/dumps".to_string());
        assert_eq!(cfg.debug_dir(&paths), PathBuf::from("/var/dumps"));
        assert_eq!(cfg.profile_dir(&paths), PathBuf::from("/tmp/base/profile"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut cfg = Config::default();
        cfg.flow.max_cycles = 7;
        cfg.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.flow.max_cycles, 7);
    }
}
