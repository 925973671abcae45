use autosignup_browser::find_any_browser;
use autosignup_core::{Config, Paths};

/// Run environment diagnostics.
pub async fn run() -> anyhow::Result<()> {
    let paths = Paths::new();

    println!();
    println!("🩺 autosignup doctor");
    println!("================================");
    println!();

    let mut ok_count = 0u32;
    let mut warn_count = 0u32;
    let mut err_count = 0u32;

    // --- 1. Config ---
    println!("📋 Configuration");
    if paths.config_file().exists() {
        print_ok("Config file exists", &paths.config_file().display().to_string());
        ok_count += 1;
    } else {
        print_warn("Config file not found", "Defaults in use; run `autosignup onboard` to write one");
        warn_count += 1;
    }

    let mut config = match Config::load_or_default(&paths) {
        Ok(config) => config,
        Err(e) => {
            print_err("Config file unreadable", &e.to_string());
            err_count += 1;
            Config::default()
        }
    };
    config.apply_env();

    match config.validate() {
        Ok(()) => {
            print_ok("Config valid", "");
            ok_count += 1;
        }
        Err(e) => {
            print_err("Config invalid", &e.to_string());
            err_count += 1;
        }
    }

    match config.mailbox_api_key() {
        Ok(_) => {
            print_ok("Mailbox API key configured", &config.mailbox.api_base);
            ok_count += 1;
        }
        Err(e) => {
            print_err("Mailbox API key missing", &e.to_string());
            err_count += 1;
        }
    }
    println!("  Max cycles: {}", config.flow.max_cycles);
    println!();

    // --- 2. Browser ---
    println!("🌐 Browser");
    match config.browser.executable.as_deref().filter(|p| !p.trim().is_empty()) {
        Some(path) if std::path::Path::new(path).exists() => {
            print_ok("Configured browser", path);
            ok_count += 1;
        }
        Some(path) => {
            print_err("Configured browser not found", path);
            err_count += 1;
        }
        None => match find_any_browser() {
            Some((engine, path)) => {
                print_ok(&format!("Found {}", engine.name()), &path);
                ok_count += 1;
            }
            None => {
                print_err("No Chrome, Chromium or Edge found", "Install one or set browser.executable");
                err_count += 1;
            }
        },
    }
    println!("  Mode: {}", if config.browser.headed { "headed" } else { "headless" });
    println!();

    // --- 3. Directories ---
    println!("📁 Directories");
    let profile_dir = config.profile_dir(&paths);
    if profile_dir.exists() {
        print_ok("Browser profile", &profile_dir.display().to_string());
        ok_count += 1;
    } else {
        print_warn("Browser profile not created yet", "Will be created on first run");
        warn_count += 1;
    }

    let debug_dir = config.debug_dir(&paths);
    let probe = debug_dir.join(".doctor_test");
    match std::fs::create_dir_all(&debug_dir).and_then(|_| std::fs::write(&probe, "test")) {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            print_ok("Debug directory writable", &debug_dir.display().to_string());
            ok_count += 1;
        }
        Err(e) => {
            print_err("Debug directory not writable", &e.to_string());
            err_count += 1;
        }
    }
    println!();

    // --- Summary ---
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "  ✅ {} passed  ⚠️  {} warnings  ❌ {} errors",
        ok_count, warn_count, err_count
    );
    println!();
    if err_count > 0 {
        println!("  {} error(s) must be fixed before `autosignup run`.", err_count);
    } else {
        println!("  🎉 Ready to run.");
    }
    println!();

    Ok(())
}

fn print_ok(label: &str, detail: &str) {
    if detail.is_empty() {
        println!("  ✅ {}", label);
    } else {
        println!("  ✅ {} — {}", label, detail);
    }
}

fn print_warn(label: &str, hint: &str) {
    println!("  ⚠️  {} — {}", label, hint);
}

fn print_err(label: &str, hint: &str) {
    println!("  ❌ {} — {}", label, hint);
}
