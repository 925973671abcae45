//! Per-state actions.
//!
//! [`ActionSelector::plan`] decides what to do for a classified snapshot without
//! touching the browser; [`ActionSelector::execute`] carries the steps out.
//! Elements are located by role and accessible name only.

use autosignup_core::config::{FlowConfig, ProfileConfig};
use autosignup_core::{Error, Result, SessionIdentity};
use autosignup_mail::VerificationCodeSource;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::automation::Automation;
use crate::classifier::UiState;
use crate::snapshot::{names_equal, ElementRef, SnapshotView};

const TEXT_FIELD: &[&str] = &["textbox", "textarea"];
const DATE_PART: &[&str] = &["spinbutton", "textbox"];

const ONBOARDING_BUTTONS: &[&str] = &["Next", "Continue", "Okay, let's go", "Yes", "Stay logged in", "Done"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<'s> {
    Click(ElementRef<'s>),
    /// Click, pause, type, pause.
    Fill(ElementRef<'s>, String),
    PressKey(&'static str),
    Pause(Duration),
}

impl fmt::Display for Step<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Click(el) => write!(f, "click {}", el),
            // Values may be credentials.
            Step::Fill(el, value) => write!(f, "fill {} ({} chars)", el, value.chars().count()),
            Step::PressKey(key) => write!(f, "press {}", key),
            Step::Pause(d) => write!(f, "pause {}ms", d.as_millis()),
        }
    }
}

pub struct ActionSelector {
    field_pause: Duration,
    submit_pause: Duration,
    otp_timeout: Duration,
    profile: ProfileConfig,
}

impl ActionSelector {
    pub fn new(flow: &FlowConfig, profile: &ProfileConfig) -> Self {
        Self {
            field_pause: flow.field_pause(),
            submit_pause: flow.submit_pause(),
            otp_timeout: flow.otp_timeout(),
            profile: profile.clone(),
        }
    }

    /// Steps for `state`. Missing elements drop their step; an empty plan
    /// means there is nothing to do. `AccessDenied` is the only error.
    pub fn plan<'s>(
        &self,
        state: UiState,
        view: &SnapshotView<'s>,
        identity: &SessionIdentity,
        code: Option<&str>,
    ) -> Result<Vec<Step<'s>>> {
        let mut steps = Vec::new();
        match state {
            UiState::Landing => {
                let cta = view.find_named(&["button"], &["Sign up for free"]).or_else(|| {
                    view.find_ref(|e| e.is_role("button") && e.name.to_lowercase().starts_with("sign up"))
                });
                steps.extend(cta.map(Step::Click));
            }
            UiState::LoginEmail => {
                let field = view.find_ref(|e| {
                    e.is_role("textbox") && names_equal(e.name, "Email address") && !e.is_readonly()
                });
                if let Some(field) = field {
                    steps.push(Step::Fill(field, identity.address().to_string()));
                    steps.push(submit(view, &["Continue"]));
                }
            }
            UiState::LoginPassword => {
                if let Some(field) = view.find_named(&["textbox"], &["Password"]) {
                    steps.push(Step::Fill(field, identity.password().to_string()));
                    steps.push(submit(view, &["Continue"]));
                }
            }
            UiState::OtpVerification => {
                let field = view.find_named(&["textbox"], &["Code"]);
                if let (Some(code), Some(field)) = (code, field) {
                    steps.push(Step::Fill(field, code.to_string()));
                    steps.push(Step::PressKey("Enter"));
                }
            }
            UiState::AboutYou => self.plan_about_you(view, &mut steps),
            UiState::Onboarding => {
                let next = view
                    .find_named(&["button"], &["Skip"])
                    .or_else(|| view.find_named(&["button"], ONBOARDING_BUTTONS));
                steps.extend(next.map(Step::Click));
            }
            UiState::Blocked => {
                let target = view
                    .find_ref(|e| e.is_role("checkbox"))
                    .or_else(|| view.find_named(&["button"], &["Verify you are human"]));
                steps.extend(target.map(Step::Click));
            }
            UiState::AccessDenied => {
                return Err(Error::AccessDenied("the site refused access to this browser".into()));
            }
            UiState::ChatInterface | UiState::Unknown => {}
        }
        Ok(steps)
    }

    fn plan_about_you<'s>(&self, view: &SnapshotView<'s>, steps: &mut Vec<Step<'s>>) {
        if let Some(name) = view.find_named(TEXT_FIELD, &["Full name"]) {
            steps.push(Step::Fill(name, self.profile.full_name.clone()));
        }

        if let Some(birthday) = view.find_named(&["textbox", "spinbutton"], &["Birthday"]) {
            steps.push(Step::Fill(birthday, self.profile.birthday()));
        } else {
            let parts = [
                ("month", self.profile.birth_month.to_string()),
                ("day", self.profile.birth_day.to_string()),
                ("year", self.profile.birth_year.to_string()),
            ];
            for (prefix, value) in parts {
                let field = view.find_ref(|e| e.is_any_role(DATE_PART) && e.name.to_lowercase().starts_with(prefix));
                if let Some(field) = field {
                    steps.push(Step::Fill(field, value));
                }
            }
        }

        // Nothing filled means the form is not ready; leave it untouched.
        if steps.iter().any(|s| matches!(s, Step::Fill(..))) {
            steps.push(Step::Pause(self.submit_pause));
            steps.push(submit(view, &["Continue", "Submit", "Done"]));
        }
    }

    /// Plan for `state` and carry it out. Waits on `codes` first when the page
    /// asks for a verification code. Returns whether any step took effect.
    pub async fn select_and_execute<A, M>(
        &self,
        automation: &mut A,
        state: UiState,
        view: &SnapshotView<'_>,
        identity: &SessionIdentity,
        codes: &M,
    ) -> Result<bool>
    where
        A: Automation + ?Sized,
        M: VerificationCodeSource + ?Sized,
    {
        let code = if state == UiState::OtpVerification {
            match codes.wait_for_code(identity.address(), self.otp_timeout).await {
                Ok(Some(code)) => Some(code),
                Ok(None) => {
                    info!(address = identity.address(), "No verification code before timeout");
                    return Ok(false);
                }
                Err(e) => {
                    warn!(error = %e, "Verification code wait failed");
                    return Ok(false);
                }
            }
        } else {
            None
        };

        let steps = self.plan(state, view, identity, code.as_deref())?;
        if steps.is_empty() {
            debug!(state = %state, "No matching element, nothing to do");
            return Ok(false);
        }
        Ok(self.execute(automation, &steps).await)
    }

    /// Run `steps` in order. A failing step is logged and skipped.
    pub async fn execute<A>(&self, automation: &mut A, steps: &[Step<'_>]) -> bool
    where
        A: Automation + ?Sized,
    {
        let mut acted = false;
        for step in steps {
            debug!(step = %step, "Executing");
            let result = match step {
                Step::Click(el) => automation.click(*el).await,
                Step::Fill(el, value) => {
                    if let Err(e) = automation.click(*el).await {
                        debug!(step = %step, error = %e, "Focus click failed");
                    }
                    tokio::time::sleep(self.field_pause).await;
                    let filled = automation.fill(*el, value).await;
                    tokio::time::sleep(self.field_pause).await;
                    filled
                }
                Step::PressKey(key) => automation.press_key(key).await,
                Step::Pause(d) => {
                    tokio::time::sleep(*d).await;
                    continue;
                }
            };
            match result {
                Ok(()) => acted = true,
                Err(e) => warn!(step = %step, error = %e, "Action failed"),
            }
        }
        acted
    }
}

/// Click the first present button among `names`, else press Enter.
fn submit<'s>(view: &SnapshotView<'s>, names: &[&str]) -> Step<'s> {
    view.find_named(&["button"], names)
        .map(Step::Click)
        .unwrap_or(Step::PressKey("Enter"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, FakeCodes, ScriptedAutomation};

    fn selector() -> ActionSelector {
        let flow = FlowConfig {
            field_pause_ms: 0,
            submit_pause_ms: 0,
            otp_timeout_ms: 50,
            ..FlowConfig::default()
        };
        ActionSelector::new(&flow, &ProfileConfig::default())
    }

    fn identity() -> SessionIdentity {
        SessionIdentity::new("bot@agentmail.to", "AutomationTest123!")
    }

    fn refs(steps: &[Step<'_>]) -> Vec<String> {
        steps.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_plan_landing_prefers_exact_cta() {
        let view = SnapshotView::parse("- button \"Log in\" [ref=e2]\n- button \"Sign up for free\" [ref=e3]");
        let steps = selector().plan(UiState::Landing, &view, &identity(), None).unwrap();
        assert_eq!(refs(&steps), vec!["click e3"]);

        let view = SnapshotView::parse("- button \"Sign up\" [ref=e9]");
        let steps = selector().plan(UiState::Landing, &view, &identity(), None).unwrap();
        assert_eq!(refs(&steps), vec!["click e9"]);
    }

    #[test]
    fn test_plan_email_then_continue() {
        let view = SnapshotView::parse("- textbox \"Email address\" [ref=e4]\n- button \"Continue\" [ref=e5]");
        let steps = selector().plan(UiState::LoginEmail, &view, &identity(), None).unwrap();
        assert_eq!(steps.len(), 2);
        assert!(matches!(&steps[0], Step::Fill(el, v) if el.as_str() == "e4" && v == "bot@agentmail.to"));
        assert!(matches!(&steps[1], Step::Click(el) if el.as_str() == "e5"));
    }

    #[test]
    fn test_plan_password_submits_with_enter_without_button() {
        let view = SnapshotView::parse("uid=3_1 textbox \"Password\" focusable focused");
        let steps = selector().plan(UiState::LoginPassword, &view, &identity(), None).unwrap();
        assert!(matches!(&steps[0], Step::Fill(el, v) if el.as_str() == "3_1" && v == "AutomationTest123!"));
        assert_eq!(steps[1], Step::PressKey("Enter"));
    }

    #[test]
    fn test_plan_otp_needs_code() {
        let view = SnapshotView::parse("- textbox \"Code\" [ref=e2]");
        let sel = selector();
        assert!(sel.plan(UiState::OtpVerification, &view, &identity(), None).unwrap().is_empty());
        let steps = sel
            .plan(UiState::OtpVerification, &view, &identity(), Some("123456"))
            .unwrap();
        assert!(matches!(&steps[0], Step::Fill(el, v) if el.as_str() == "e2" && v == "123456"));
        assert_eq!(steps[1], Step::PressKey("Enter"));
    }

    #[test]
    fn test_plan_about_you_combined_birthday() {
        let view = SnapshotView::parse(
            "- textbox \"Full name\" [ref=e1]\n- textbox \"Birthday\" [ref=e2]\n- button \"Continue\" [ref=e3]",
        );
        let steps = selector().plan(UiState::AboutYou, &view, &identity(), None).unwrap();
        assert!(matches!(&steps[0], Step::Fill(el, v) if el.as_str() == "e1" && v == "Agent User"));
        assert!(matches!(&steps[1], Step::Fill(el, v) if el.as_str() == "e2" && v == "01/01/1990"));
        assert!(matches!(steps[2], Step::Pause(_)));
        assert!(matches!(&steps[3], Step::Click(el) if el.as_str() == "e3"));
    }

    #[test]
    fn test_plan_about_you_split_birthday() {
        let view = SnapshotView::parse(
            "- textarea \"Full name\" [ref=e1]\n- group \"Birthday\"\n  - spinbutton \"month, Birthday\" [ref=e2]\n  - spinbutton \"day, Birthday\" [ref=e3]\n  - spinbutton \"Year, Birthday\" [ref=e4]\n- button \"Done\" [ref=e5]",
        );
        let steps = selector().plan(UiState::AboutYou, &view, &identity(), None).unwrap();
        let fills: Vec<(&str, &str)> = steps
            .iter()
            .filter_map(|s| match s {
                Step::Fill(el, v) => Some((el.as_str(), v.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(
            fills,
            vec![("e1", "Agent User"), ("e2", "1"), ("e3", "1"), ("e4", "1990")]
        );
        assert!(matches!(steps.last(), Some(Step::Click(el)) if el.as_str() == "e5"));
    }

    #[test]
    fn test_plan_about_you_without_fields_is_empty() {
        let view = SnapshotView::parse("- heading \"Let's confirm your age\"\n- button \"Continue\" [ref=e3]");
        let steps = selector().plan(UiState::AboutYou, &view, &identity(), None).unwrap();
        assert!(steps.is_empty(), "{:?}", refs(&steps));
    }

    #[test]
    fn test_plan_onboarding_skip_first() {
        let view = SnapshotView::parse("- button \"Next\" [ref=e1]\n- button \"Skip\" [ref=e2]");
        let steps = selector().plan(UiState::Onboarding, &view, &identity(), None).unwrap();
        assert_eq!(refs(&steps), vec!["click e2"]);

        let view = SnapshotView::parse("- button \"Okay, let\u{2019}s go\" [ref=e7]");
        let steps = selector().plan(UiState::Onboarding, &view, &identity(), None).unwrap();
        assert_eq!(refs(&steps), vec!["click e7"]);
    }

    #[test]
    fn test_plan_blocked_checkbox() {
        let view = SnapshotView::parse(
            "- button \"Verify you are human\" [ref=e1]\n- checkbox \"Verify you are human\" [ref=e2]",
        );
        let steps = selector().plan(UiState::Blocked, &view, &identity(), None).unwrap();
        assert_eq!(refs(&steps), vec!["click e2"]);
    }

    #[test]
    fn test_plan_access_denied_is_fatal() {
        let view = SnapshotView::parse("- heading \"Access denied\"");
        let err = selector()
            .plan(UiState::AccessDenied, &view, &identity(), None)
            .unwrap_err();
        assert!(matches!(err, Error::AccessDenied(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_plan_missing_element_is_empty() {
        let view = SnapshotView::parse("- StaticText \"Loading\"");
        for state in [UiState::Landing, UiState::LoginEmail, UiState::Onboarding, UiState::Unknown] {
            assert!(selector().plan(state, &view, &identity(), None).unwrap().is_empty());
        }
    }

    #[test]
    fn test_fill_step_display_hides_value() {
        let view = SnapshotView::parse("- textbox \"Password\" [ref=e1]");
        let steps = selector().plan(UiState::LoginPassword, &view, &identity(), None).unwrap();
        let shown = steps[0].to_string();
        assert!(!shown.contains("AutomationTest123!"));
        assert_eq!(shown, "fill e1 (18 chars)");
    }

    #[tokio::test]
    async fn test_execute_otp_waits_for_code() {
        let mut automation = ScriptedAutomation::new(&[]);
        let calls = automation.calls();
        let codes = FakeCodes::with_code("bot@agentmail.to", "987654");
        let view = SnapshotView::parse("- textbox \"Code\" [ref=e2]");

        let acted = selector()
            .select_and_execute(&mut automation, UiState::OtpVerification, &view, &identity(), &codes)
            .await
            .unwrap();
        assert!(acted);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                Call::Click("e2".into()),
                Call::Fill("e2".into(), "987654".into()),
                Call::PressKey("Enter".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_execute_otp_timeout_is_no_action() {
        let mut automation = ScriptedAutomation::new(&[]);
        let calls = automation.calls();
        let codes = FakeCodes::without_code("bot@agentmail.to");
        let view = SnapshotView::parse("- textbox \"Code\" [ref=e2]");

        let acted = selector()
            .select_and_execute(&mut automation, UiState::OtpVerification, &view, &identity(), &codes)
            .await
            .unwrap();
        assert!(!acted);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_execute_failures_are_no_ops() {
        let mut automation = ScriptedAutomation::new(&[]).failing_actions();
        let calls = automation.calls();
        let view = SnapshotView::parse("- textbox \"Email address\" [ref=e4]\n- button \"Continue\" [ref=e5]");
        let sel = selector();
        let steps = sel.plan(UiState::LoginEmail, &view, &identity(), None).unwrap();

        let acted = sel.execute(&mut automation, &steps).await;
        assert!(!acted);
        // Every step was still attempted.
        assert_eq!(calls.lock().unwrap().len(), 3);
    }
}
