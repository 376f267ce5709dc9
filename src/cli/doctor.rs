//! Environment readiness check.

use crate::browser::chromium::find_browser;
use crate::config::Config;
use anyhow::Result;

/// Check browser availability, the download root, and credential env vars.
pub async fn run() -> Result<()> {
    println!("Pitsync Doctor");
    println!("==============");
    println!();

    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    println!("OS:   {os}");
    println!("Arch: {arch}");
    println!();

    let browser = find_browser();
    match &browser {
        Some(path) => println!("[OK] Browser found: {}", path.display()),
        None => println!(
            "[!!] Chrome/Chromium NOT found. Install it or set PITSYNC_CHROMIUM_PATH."
        ),
    }

    let config = Config::from_env();
    let root = &config.download_root;
    let root_ok = match std::fs::create_dir_all(root) {
        Ok(()) => {
            println!("[OK] Download root writable: {}", root.display());
            true
        }
        Err(e) => {
            println!("[!!] Download root not writable: {} ({e})", root.display());
            false
        }
    };

    let email_set = std::env::var("PITSYNC_EMAIL").is_ok();
    let password_set = std::env::var("PITSYNC_PASSWORD").is_ok();
    if email_set && password_set {
        println!("[OK] Credentials set (PITSYNC_EMAIL, PITSYNC_PASSWORD)");
    } else {
        println!(
            "[??] Credentials incomplete: PITSYNC_EMAIL {}, PITSYNC_PASSWORD {} \
             (only needed without --discord)",
            if email_set { "set" } else { "missing" },
            if password_set { "set" } else { "missing" },
        );
    }

    println!();
    if browser.is_some() && root_ok {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }

    Ok(())
}
