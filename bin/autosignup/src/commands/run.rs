use autosignup_browser::{BrowserSession, LaunchOptions};
use autosignup_core::{Config, Paths};
use autosignup_flow::{DebugArtifacts, SessionDriver};
use autosignup_mail::AgentMailProvider;
use tracing::info;

/// Run the signup flow end to end.
pub async fn run(headless: bool, max_cycles: Option<u32>) -> anyhow::Result<()> {
    let paths = Paths::new();
    let mut config = Config::load_or_default(&paths)?;
    config.apply_env();
    if headless {
        config.browser.headed = false;
    }
    if let Some(max_cycles) = max_cycles {
        config.flow.max_cycles = max_cycles;
    }
    config.validate()?;

    // Credential check happens before anything is launched.
    let api_key = config.mailbox_api_key()?.to_string();
    let codes = AgentMailProvider::new(&api_key, &config.mailbox)?;

    let options = LaunchOptions::from_config(&config.browser, config.profile_dir(&paths));
    let session = BrowserSession::launch(&options).await?;
    let artifacts = DebugArtifacts::new(config.debug_dir(&paths));
    info!(debug_dir = %artifacts.dir().display(), "Debug snapshots enabled");

    let report = SessionDriver::new(session, codes, &config, artifacts).run().await?;

    println!();
    if report.existing_session {
        println!("✓ Existing session reused");
    } else if let Some(address) = &report.address {
        println!("✓ Account created for {} in {} cycles", address, report.cycles);
    }
    if report.verified {
        println!("✓ Chat answered the verification probe");
    } else {
        println!("⚠️  Chat reached, but the verification reply was not seen");
    }
    Ok(())
}
