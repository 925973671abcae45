use crate::classifier::UiState;

/// Recovery level chosen from how long the flow has sat in one state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationTier {
    /// Handle the state normally.
    Normal,
    /// Second consecutive cycle: dismiss whatever may be in the way.
    SoftRecovery,
    /// Third consecutive cycle: reload the page.
    HardRecovery,
    /// Give up.
    Fatal,
}

/// Counts consecutive observations of the same state.
///
/// `Unknown` never accumulates: an unreadable page is not evidence of being
/// stuck on a particular step.
#[derive(Debug, Clone, Default)]
pub struct StagnationMonitor {
    last: Option<UiState>,
    count: u32,
}

impl StagnationMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, state: UiState) -> EscalationTier {
        if self.last == Some(state) && state != UiState::Unknown {
            self.count += 1;
        } else {
            self.last = Some(state);
            self.count = 1;
        }
        match self.count {
            0 | 1 => EscalationTier::Normal,
            2 => EscalationTier::SoftRecovery,
            3 => EscalationTier::HardRecovery,
            _ => EscalationTier::Fatal,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn last(&self) -> Option<UiState> {
        self.last
    }
}
