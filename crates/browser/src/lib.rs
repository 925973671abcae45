//! CDP-based browser automation.
//!
//! - One browser process per run, owned by a [`BrowserSession`]
//! - Chrome DevTools Protocol over WebSocket
//! - Accessibility snapshot + ref system for element targeting

pub mod actions;
pub mod cdp;
pub mod session;
pub mod snapshot;

pub use actions::parse_key_spec;
pub use session::{find_any_browser, find_browser_binary, BrowserEngine, BrowserSession, LaunchOptions};
