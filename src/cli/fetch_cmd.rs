//! `pitsync fetch` — run the full authenticate/scrape/download pipeline.

use crate::auth::Credentials;
use crate::browser::chromium::ChromiumBrowser;
use crate::config::Config;
use crate::events::{LogLevel, RunEvent};
use crate::layout::scan_team_folders;
use crate::runner::{LoginMethod, RunOptions, RunResult, Runner, RunStatus};
use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;

/// Run the fetch command. Credentials come from `--email` /
/// `PITSYNC_EMAIL` and `PITSYNC_PASSWORD` (the secret is never accepted on
/// the command line); `--discord` switches to the interactive login flow.
pub async fn run(
    discord: bool,
    email: Option<String>,
    root: Option<PathBuf>,
    team: Option<String>,
    visible: bool,
) -> Result<()> {
    let mut config = Config::from_env();
    if let Some(root) = root {
        config.download_root = root;
    }
    if visible || discord {
        // The interactive flow needs a window the user can log in through.
        config.headless = false;
    }

    let login = if discord {
        LoginMethod::Discord
    } else {
        let identifier = email
            .or_else(|| std::env::var("PITSYNC_EMAIL").ok())
            .context("no login email: pass --email or set PITSYNC_EMAIL")?;
        let secret = std::env::var("PITSYNC_PASSWORD")
            .context("no login password: set PITSYNC_PASSWORD")?;
        LoginMethod::Credentials(Credentials { identifier, secret })
    };

    if team.is_none() {
        let detected = scan_team_folders(&config.download_root);
        if !detected.is_empty() {
            println!("Existing team folders detected (pass --team to use one):");
            for name in &detected {
                println!("  {name}");
            }
        }
    }

    println!("Download root: {}", config.download_root.display());

    let browser = ChromiumBrowser::launch(&config)
        .await
        .context("failed to start the browser")?;

    let runner = Runner::new(config);
    let mut events = runner.events().subscribe();
    let cancel = runner.cancel_flag();

    // First Ctrl-C requests a cooperative stop at the next listing boundary.
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nStopping after the current setup...");
            cancel.cancel();
        }
    });

    let options = RunOptions {
        login,
        team_label: team,
    };
    let run_task = tokio::spawn(async move { runner.run(Box::new(browser), options).await });

    // Render the event stream until the run reports it is finished.
    let mut bar = ProgressBar::hidden();
    loop {
        match events.recv().await {
            Ok(RunEvent::ListingsFound { active }) => {
                bar = ProgressBar::new(active as u64);
                bar.set_style(
                    ProgressStyle::with_template(
                        "  [{bar:30}] {pos}/{len} {wide_msg}",
                    )
                    .expect("static template")
                    .progress_chars("=> "),
                );
            }
            Ok(RunEvent::Progress {
                processed, current, ..
            }) => {
                bar.set_position(processed as u64);
                bar.set_message(current);
            }
            Ok(RunEvent::Log { level, message }) => {
                let prefix = match level {
                    LogLevel::Info => "  ",
                    LogLevel::Warning => "! ",
                    LogLevel::Error => "x ",
                };
                bar.println(format!("{prefix}{message}"));
            }
            Ok(RunEvent::RunFinished { .. }) => break,
            Ok(_) => {}
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }
    bar.finish_and_clear();

    let result: RunResult = run_task.await.context("run task panicked")?;
    summarize(&result)
}

fn summarize(result: &RunResult) -> Result<()> {
    match &result.status {
        RunStatus::Completed => {
            println!(
                "Done: {} of {} setups downloaded ({} failed).",
                result.succeeded, result.total, result.failed
            );
            Ok(())
        }
        RunStatus::Cancelled => {
            println!(
                "Cancelled after {} of {} setups ({} downloaded, {} failed).",
                result.processed, result.total, result.succeeded, result.failed
            );
            Ok(())
        }
        RunStatus::AuthFailed(failure) => bail!("authentication failed: {failure}"),
        RunStatus::Error(message) => bail!("run failed: {message}"),
    }
}
