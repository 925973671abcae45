//! Snapshot classification.
//!
//! Ordered predicates over a [`SnapshotView`]; the first match wins. The order
//! matters because pages overlap: the password step still shows the read-only
//! email, and onboarding dialogs float above a working chat composer.

use serde::Serialize;
use std::fmt;

use crate::snapshot::{text_contains, SnapshotView};

const TEXT_FIELD: &[&str] = &["textbox", "textarea"];
const INPUT_FIELD: &[&str] = &["textbox", "textarea", "searchbox", "combobox", "spinbutton"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UiState {
    Landing,
    LoginEmail,
    LoginPassword,
    OtpVerification,
    AboutYou,
    Onboarding,
    ChatInterface,
    Blocked,
    AccessDenied,
    Unknown,
}

impl UiState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UiState::Landing => "LANDING",
            UiState::LoginEmail => "LOGIN_EMAIL",
            UiState::LoginPassword => "LOGIN_PASSWORD",
            UiState::OtpVerification => "OTP_VERIFICATION",
            UiState::AboutYou => "ABOUT_YOU",
            UiState::Onboarding => "ONBOARDING",
            UiState::ChatInterface => "CHAT_INTERFACE",
            UiState::Blocked => "BLOCKED",
            UiState::AccessDenied => "ACCESS_DENIED",
            UiState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for UiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Predicate = fn(&SnapshotView<'_>) -> bool;

const RULES: &[(UiState, Predicate)] = &[
    (UiState::AboutYou, is_about_you),
    (UiState::OtpVerification, is_otp),
    (UiState::LoginPassword, is_password),
    (UiState::LoginEmail, is_email),
    (UiState::Landing, is_landing),
    (UiState::Onboarding, is_onboarding),
    (UiState::ChatInterface, is_chat),
    (UiState::Blocked, is_blocked),
    (UiState::AccessDenied, is_access_denied),
];

/// Classify raw snapshot text.
pub fn classify(snapshot: &str) -> UiState {
    classify_view(&SnapshotView::parse(snapshot))
}

/// Classify an already parsed snapshot.
pub fn classify_view(view: &SnapshotView<'_>) -> UiState {
    RULES
        .iter()
        .find(|(_, matches)| matches(view))
        .map(|(state, _)| *state)
        .unwrap_or(UiState::Unknown)
}

fn is_about_you(view: &SnapshotView<'_>) -> bool {
    view.contains_text("Let's confirm your age") || view.has(TEXT_FIELD, "Full name")
}

fn is_otp(view: &SnapshotView<'_>) -> bool {
    view.has(&["textbox"], "Code") || view.has(&["heading"], "Check your inbox")
}

fn is_password(view: &SnapshotView<'_>) -> bool {
    view.has(&["textbox"], "Password")
        || view.has(&["heading"], "Create a password")
        || view.has(&["heading"], "Enter your password")
}

fn is_email(view: &SnapshotView<'_>) -> bool {
    view.elements()
        .iter()
        .any(|e| e.is_role("textbox") && e.name == "Email address" && !e.is_readonly())
}

fn is_landing(view: &SnapshotView<'_>) -> bool {
    view.has(&["button"], "Sign up for free") || view.has(&["button"], "Log in")
}

fn is_onboarding(view: &SnapshotView<'_>) -> bool {
    view.contains_text("You're all set")
        || view.contains_text("Okay, let's go")
        || view.has(&["button"], "Skip")
        || view.has(&["button"], "Next")
        || (view.has(&["button"], "Continue") && !has_input_field(view))
}

fn has_input_field(view: &SnapshotView<'_>) -> bool {
    view.elements()
        .iter()
        .any(|e| e.is_any_role(INPUT_FIELD) || e.has_flag("editable"))
}

fn is_chat(view: &SnapshotView<'_>) -> bool {
    view.contains_text("Ask anything")
        || view.contains_text("What's on your mind today")
        || (view.has_role("paragraph") && has_composer_label(view))
}

pub(crate) fn is_composer_label(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("prompt") || lower.contains("message")
}

fn has_composer_label(view: &SnapshotView<'_>) -> bool {
    view.elements()
        .iter()
        .any(|e| e.is_any_role(&["textbox", "textarea", "paragraph"]) && is_composer_label(e.name))
}

fn is_blocked(view: &SnapshotView<'_>) -> bool {
    view.contains_text("Just a moment...") || view.contains_text("Verify you are human")
}

fn is_access_denied(view: &SnapshotView<'_>) -> bool {
    const MARKERS: &[&str] = &["Access denied", "Error 1020", "You have been blocked"];
    view.elements()
        .iter()
        .any(|e| MARKERS.iter().any(|m| text_contains(e.name, m)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot_is_unknown() {
        assert_eq!(classify(""), UiState::Unknown);
        assert_eq!(classify("\n\n"), UiState::Unknown);
    }

    #[test]
    fn test_landing() {
        let snap = "- RootWebArea \"ChatGPT\" [ref=e1]\n  - button \"Log in\" [ref=e2]\n  - button \"Sign up for free\" [ref=e3]";
        assert_eq!(classify(snap), UiState::Landing);
    }

    #[test]
    fn test_login_email_uid_rendering() {
        let snap = "uid=5_0 RootWebArea \"Log in or sign up - OpenAI\"\n  uid=5_12 textbox \"Email address\" focusable focused\n  uid=5_13 button \"Continue\"";
        assert_eq!(classify(snap), UiState::LoginEmail);
    }

    #[test]
    fn test_readonly_email_is_not_login_email() {
        let snap = "- textbox \"Email address\" [ref=e2] [readonly] value=\"x@agentmail.to\"\n- button \"Edit\" [ref=e3]";
        assert_ne!(classify(snap), UiState::LoginEmail);
    }

    #[test]
    fn test_password_beats_email() {
        let snap = "- heading \"Create a password\" [ref=e1] [level=1]\n- textbox \"Email address\" [ref=e2]\n- button \"Continue\" [ref=e3]";
        assert_eq!(classify(snap), UiState::LoginPassword);

        let snap = "uid=9_0 RootWebArea \"Create a password - OpenAI\"\n  uid=9_4 textbox \"Email address\" readonly\n  uid=9_5 textbox \"Password\" focusable focused";
        assert_eq!(classify(snap), UiState::LoginPassword);
    }

    #[test]
    fn test_otp() {
        assert_eq!(
            classify("- heading \"Check your inbox\" [ref=e1]\n- textbox \"Code\" [ref=e2]"),
            UiState::OtpVerification
        );
        assert_eq!(classify("- textbox \"Code\" [ref=e2] [focused]"), UiState::OtpVerification);
    }

    #[test]
    fn test_otp_beats_lower_markers() {
        let lower = [
            ("- textbox \"Email address\" [ref=e5]", UiState::LoginEmail),
            ("- textbox \"Password\" [ref=e5]", UiState::LoginPassword),
            ("- button \"Sign up for free\" [ref=e5]", UiState::Landing),
            ("- button \"Skip\" [ref=e5]", UiState::Onboarding),
            ("- StaticText \"Ask anything\"", UiState::ChatInterface),
        ];
        for otp in ["- textbox \"Code\" [ref=e1]", "- heading \"Check your inbox\" [ref=e1]"] {
            for (marker, _) in &lower {
                let snap = format!("{otp}\n{marker}");
                assert_eq!(classify(&snap), UiState::OtpVerification, "{snap}");
                let snap = format!("{marker}\n{otp}");
                assert_eq!(classify(&snap), UiState::OtpVerification, "{snap}");
            }
            let all: Vec<&str> = lower.iter().map(|(m, _)| *m).collect();
            let snap = format!("{}\n{otp}", all.join("\n"));
            assert_eq!(classify(&snap), UiState::OtpVerification, "{snap}");
        }
        for (marker, expected) in lower {
            assert_eq!(classify(marker), expected, "{marker}");
        }
    }

    #[test]
    fn test_about_you_precedes_everything() {
        let snap = "- heading \"Let\u{2019}s confirm your age\" [ref=e1]\n- textbox \"Full name\" [ref=e2]\n- textbox \"Code\" [ref=e3]\n- button \"Continue\" [ref=e4]";
        assert_eq!(classify(snap), UiState::AboutYou);
        assert_eq!(classify("- heading \"Let's confirm your age\""), UiState::AboutYou);
    }

    #[test]
    fn test_onboarding_over_chat() {
        let snap = "- paragraph [ref=e1]\n- StaticText \"Ask anything\"\n- dialog \"Tips\" [ref=e2]\n  - button \"Next\" [ref=e3]";
        assert_eq!(classify(snap), UiState::Onboarding);
        assert_eq!(classify("- heading \"You\u{2019}re all set\""), UiState::Onboarding);
        assert_eq!(classify("- button \"Okay, let\u{2019}s go\" [ref=e4]"), UiState::Onboarding);
    }

    #[test]
    fn test_continue_next_to_textbox_is_not_onboarding() {
        let snap = "- textbox \"Something else\" [ref=e1]\n- button \"Continue\" [ref=e2]";
        assert_eq!(classify(snap), UiState::Unknown);
        assert_eq!(classify("- button \"Continue\" [ref=e2]"), UiState::Onboarding);
    }

    #[test]
    fn test_continue_next_to_any_input_is_not_onboarding() {
        for field in [
            "- textarea \"Tell us more\" [ref=e1]",
            "- spinbutton \"Month\" [ref=e1]",
            "- searchbox \"Search\" [ref=e1]",
            "- combobox \"Country\" [ref=e1]",
            "- generic [ref=e1] [editable]",
            "uid=3_1 generic \"Notes\" editable",
        ] {
            let snap = format!("{field}\n- button \"Continue\" [ref=e2]");
            assert_eq!(classify(&snap), UiState::Unknown, "{field}");
        }
        let snap = "- checkbox \"Remember me\" [ref=e1]\n- button \"Continue\" [ref=e2]";
        assert_eq!(classify(snap), UiState::Onboarding);
    }

    #[test]
    fn test_chat_interface() {
        assert_eq!(classify("- StaticText \"Ask anything\""), UiState::ChatInterface);
        assert_eq!(
            classify("- heading \"What\u{2019}s on your mind today?\""),
            UiState::ChatInterface
        );
        assert_eq!(
            classify("- textbox \"Message ChatGPT\" [ref=e1]\n  - paragraph [ref=e2] [editable]"),
            UiState::ChatInterface
        );
    }

    #[test]
    fn test_blocked_and_access_denied() {
        assert_eq!(classify("- RootWebArea \"Just a moment...\""), UiState::Blocked);
        assert_eq!(
            classify("- checkbox \"Verify you are human\" [ref=e4]"),
            UiState::Blocked
        );
        assert_eq!(
            classify("- heading \"Sorry, you have been blocked\"\n- StaticText \"Error 1020\""),
            UiState::AccessDenied
        );
        assert_eq!(classify("- heading \"Access denied\""), UiState::AccessDenied);
    }

    #[test]
    fn test_deterministic() {
        let snap = "- button \"Skip\" [ref=e1]\n- textbox \"Email address\" [ref=e2]";
        let first = classify(snap);
        for _ in 0..10 {
            assert_eq!(classify(snap), first);
        }
        assert_eq!(first, UiState::LoginEmail);
    }

    #[test]
    fn test_display_is_screaming_snake() {
        assert_eq!(UiState::OtpVerification.to_string(), "OTP_VERIFICATION");
        assert_eq!(
            serde_json::to_string(&UiState::ChatInterface).unwrap(),
            "\"CHAT_INTERFACE\""
        );
    }
}
