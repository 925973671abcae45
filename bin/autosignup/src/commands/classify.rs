use autosignup_core::{Config, Paths, SessionIdentity};
use autosignup_flow::{classify_view, ActionSelector, SnapshotView, UiState};
use std::path::Path;

/// Classify a saved snapshot file and print the plan for it.
pub fn run(file: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {}", file.display(), e))?;
    let config = Config::load_or_default(&Paths::new())?;

    let view = SnapshotView::parse(&raw);
    let state = classify_view(&view);
    println!("State: {}", state);
    println!("Elements: {}", view.elements().len());

    let identity = SessionIdentity::new("<mailbox address>", config.flow.password.clone());
    let code = (state == UiState::OtpVerification).then_some("<code>");
    let selector = ActionSelector::new(&config.flow, &config.profile);
    match selector.plan(state, &view, &identity, code) {
        Ok(steps) if steps.is_empty() => println!("Plan: no action"),
        Ok(steps) => {
            println!("Plan:");
            for (i, step) in steps.iter().enumerate() {
                println!("  {}. {}", i + 1, step);
            }
        }
        Err(e) => println!("Plan: abort ({})", e),
    }
    Ok(())
}
