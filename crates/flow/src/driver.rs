//! The signup control loop.

use autosignup_core::config::FlowConfig;
use autosignup_core::{Config, Error, Result, SessionIdentity};
use autosignup_mail::VerificationCodeSource;
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::artifacts::{DebugArtifacts, StuckDump};
use crate::automation::Automation;
use crate::classifier::{classify_view, UiState};
use crate::selector::ActionSelector;
use crate::snapshot::SnapshotView;
use crate::stagnation::{EscalationTier, StagnationMonitor};
use crate::verify::{find_composer, reply_contains_marker};

/// Outcome of a run that reached the chat interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Mailbox used for the new account; `None` when a session already existed.
    pub address: Option<String>,
    pub existing_session: bool,
    pub cycles: u32,
    pub verified: bool,
}

pub struct SessionDriver<A, M> {
    automation: A,
    codes: M,
    flow: FlowConfig,
    selector: ActionSelector,
    artifacts: DebugArtifacts,
}

impl<A, M> SessionDriver<A, M>
where
    A: Automation,
    M: VerificationCodeSource,
{
    pub fn new(automation: A, codes: M, config: &Config, artifacts: DebugArtifacts) -> Self {
        Self {
            automation,
            codes,
            flow: config.flow.clone(),
            selector: ActionSelector::new(&config.flow, &config.profile),
            artifacts,
        }
    }

    /// Drive the site until the chat interface is reached. The automation is
    /// closed before this returns, whatever the outcome.
    pub async fn run(mut self) -> Result<RunReport> {
        let span = info_span!("run", run_id = %Uuid::new_v4());
        async move {
            let result = self.drive().await;
            self.automation.close().await;
            match &result {
                Ok(report) => info!(
                    cycles = report.cycles,
                    verified = report.verified,
                    existing_session = report.existing_session,
                    "Run finished"
                ),
                Err(e) => error!(error = %e, "Run failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn drive(&mut self) -> Result<RunReport> {
        let home = self.flow.home_url.clone();
        info!(url = %home, "Opening home page");
        self.navigate(&home).await;
        tokio::time::sleep(self.flow.landing_settle()).await;

        let snapshot = self.capture().await;
        let view = SnapshotView::parse(&snapshot);
        if classify_view(&view) == UiState::ChatInterface {
            info!("Existing session detected, skipping signup");
            let verified = self.verify(&view).await;
            return Ok(RunReport {
                address: None,
                existing_session: true,
                cycles: 0,
                verified,
            });
        }

        let address = self.codes.create_inbox().await?;
        let identity = SessionIdentity::new(address, self.flow.password.clone());
        info!(address = identity.address(), "Mailbox ready");

        let login = self.flow.login_url.clone();
        self.navigate(&login).await;

        let mut monitor = StagnationMonitor::new();
        for cycle in 1..=self.flow.max_cycles {
            let snapshot = self.capture().await;
            let view = SnapshotView::parse(&snapshot);
            let state = classify_view(&view);
            info!(cycle, state = %state, "Cycle");

            if state == UiState::ChatInterface {
                info!(cycle, "Chat interface reached");
                let verified = self.verify(&view).await;
                return Ok(RunReport {
                    address: Some(identity.address().to_string()),
                    existing_session: false,
                    cycles: cycle,
                    verified,
                });
            }

            match monitor.observe(state) {
                EscalationTier::Normal => {
                    let outcome = self
                        .selector
                        .select_and_execute(&mut self.automation, state, &view, &identity, &self.codes)
                        .await;
                    match outcome {
                        Ok(acted) => debug!(cycle, acted, "Handled"),
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => warn!(cycle, error = %e, "Action error"),
                    }
                }
                EscalationTier::SoftRecovery => {
                    warn!(cycle, state = %state, "No progress, pressing Escape");
                    if let Err(e) = self.automation.press_key("Escape").await {
                        warn!(error = %e, "Escape failed");
                    }
                }
                EscalationTier::HardRecovery => {
                    warn!(cycle, state = %state, "Still no progress, reloading page");
                    if let Err(e) = self.automation.evaluate_script("location.reload()").await {
                        warn!(error = %e, "Reload failed");
                    }
                }
                EscalationTier::Fatal => {
                    let count = monitor.count();
                    let dump = StuckDump::new(state, cycle, count, &snapshot);
                    match self.artifacts.write_stuck_dump(&dump) {
                        Ok(path) => error!(path = %path.display(), "Stuck state dump written"),
                        Err(e) => error!(error = %e, "Could not write stuck state dump"),
                    }
                    error!(state = %state, cycle, snapshot = %snapshot, "Stuck; last snapshot follows");
                    return Err(Error::Stuck {
                        state: state.to_string(),
                        count,
                        cycle,
                    });
                }
            }

            tokio::time::sleep(self.flow.cycle_delay()).await;
        }

        Err(Error::Timeout(format!(
            "chat interface not reached within {} cycles",
            self.flow.max_cycles
        )))
    }

    async fn navigate(&mut self, url: &str) {
        if let Err(e) = self.automation.navigate(url).await {
            warn!(url, error = %e, "Navigation failed");
        }
    }

    /// Snapshot the page and persist it. Failures yield an empty snapshot.
    async fn capture(&mut self) -> String {
        let snapshot = match self.automation.take_snapshot(true).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Snapshot failed");
                String::new()
            }
        };
        if let Err(e) = self.artifacts.write_snapshot(&snapshot) {
            debug!(error = %e, "Could not persist snapshot");
        }
        snapshot
    }

    /// Send the probe message and look for the marker in the reply.
    async fn verify(&mut self, view: &SnapshotView<'_>) -> bool {
        let Some(composer) = find_composer(view) else {
            warn!("Chat composer not found, skipping verification");
            return false;
        };

        info!("Sending verification probe");
        if let Err(e) = self.automation.click(composer).await {
            warn!(error = %e, "Composer click failed");
        }
        if let Err(e) = self.automation.fill(composer, &self.flow.probe_message).await {
            warn!(error = %e, "Probe fill failed");
            return false;
        }
        if let Err(e) = self.automation.press_key("Enter").await {
            warn!(error = %e, "Probe submit failed");
            return false;
        }

        tokio::time::sleep(self.flow.verify_settle()).await;
        let reply = match self.automation.take_snapshot(true).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Reply snapshot failed");
                return false;
            }
        };

        let verified = reply_contains_marker(
            &SnapshotView::parse(&reply),
            &self.flow.verify_marker,
            &self.flow.probe_message,
        );
        if verified {
            info!(marker = %self.flow.verify_marker, "Account verified");
        } else {
            warn!(marker = %self.flow.verify_marker, "Verification marker not seen");
        }
        verified
    }
}
