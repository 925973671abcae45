//! Signup flow: classify the page, act on it, escalate when stuck.
//!
//! - [`classifier`]: snapshot → [`UiState`]
//! - [`selector`]: per-state action plans and their execution
//! - [`stagnation`]: escalation ladder for repeated states
//! - [`driver`]: the control loop owning the browser and the mailbox

pub mod artifacts;
pub mod automation;
pub mod classifier;
pub mod driver;
pub mod selector;
pub mod snapshot;
pub mod stagnation;
pub mod verify;

#[cfg(test)]
mod testing;

pub use artifacts::{DebugArtifacts, StuckDump};
pub use automation::Automation;
pub use classifier::{classify, classify_view, UiState};
pub use driver::{RunReport, SessionDriver};
pub use selector::{ActionSelector, Step};
pub use snapshot::{Element, ElementRef, SnapshotView};
pub use stagnation::{EscalationTier, StagnationMonitor};
