// Copyright 2026 Pitsync Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run orchestration: authenticate, classify, download — with progress
//! events and cooperative cancellation.
//!
//! The runner owns the single mutable session for a run and sequences the
//! other components around it. Callers run it on a background task and
//! watch the event bus; cancellation is checked at listing boundaries only,
//! so an in-flight download always finishes and releases its resources.

use crate::auth::{AuthController, Credentials};
use crate::browser::{BrowserSession, Session};
use crate::config::Config;
use crate::download::Organizer;
use crate::error::ScrapeError;
use crate::events::{EventBus, LogLevel, RunEvent};
use crate::scrape::{extract_active_listings, SetupListing};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Cooperative cancellation signal shared between the caller and the run
/// loop. Checked only between listings.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// How the run should authenticate.
#[derive(Debug, Clone)]
pub enum LoginMethod {
    /// Drive the site's login form with the given credentials.
    Credentials(Credentials),
    /// Open the login page and let the human complete the Discord flow.
    Discord,
}

impl LoginMethod {
    fn name(&self) -> &'static str {
        match self {
            Self::Credentials(_) => "credentials",
            Self::Discord => "discord",
        }
    }
}

/// Per-run inputs beyond the static configuration.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub login: LoginMethod,
    /// Optional team label; resolved into a `Garage 61 - <team>` path
    /// segment once for the whole run.
    pub team_label: Option<String>,
}

/// Terminal status of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Cancelled,
    AuthFailed(crate::error::AuthFailure),
    Error(String),
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::AuthFailed(_) => write!(f, "auth_failed"),
            Self::Error(_) => write!(f, "error"),
        }
    }
}

/// Aggregate outcome of one run. Never mutated after the run ends.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub status: RunStatus,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
}

impl RunResult {
    fn terminal(status: RunStatus) -> Self {
        Self {
            status,
            processed: 0,
            succeeded: 0,
            failed: 0,
            total: 0,
        }
    }
}

/// Sequences one full run: authenticate → classify → download each listing.
pub struct Runner {
    config: Config,
    events: EventBus,
    cancel: CancelFlag,
}

impl Runner {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            events: EventBus::new(),
            cancel: CancelFlag::new(),
        }
    }

    /// The event bus callers subscribe to before starting the run.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// A handle the caller can use to request cancellation.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Execute a full run on the given browser. Always returns a
    /// [`RunResult`]; failures are folded into its status.
    pub async fn run(&self, browser: Box<dyn BrowserSession>, options: RunOptions) -> RunResult {
        if let Err(e) = std::fs::create_dir_all(&self.config.download_root) {
            let message = format!(
                "cannot create download root {}: {e}",
                self.config.download_root.display()
            );
            error!("{message}");
            self.events.log(LogLevel::Error, message.as_str());
            return self.finish(RunResult::terminal(RunStatus::Error(message)));
        }

        // Authentication. On failure the scraper and downloader are never
        // touched — there is no session to hand them.
        let method = options.login.name().to_string();
        self.events.emit(RunEvent::AuthStarted {
            method: method.clone(),
        });
        self.events.log(LogLevel::Info, "authenticating...");

        let mut controller = AuthController::new(&self.config);
        let auth_outcome = match &options.login {
            LoginMethod::Credentials(credentials) => {
                controller.login_with_credentials(browser, credentials).await
            }
            LoginMethod::Discord => controller.login_interactive(browser).await,
        };

        let mut session = match auth_outcome {
            Ok(session) => {
                self.events.emit(RunEvent::AuthCompleted {
                    method,
                    success: true,
                });
                self.events.log(LogLevel::Info, "authentication successful");
                session
            }
            Err(failure) => {
                self.events.emit(RunEvent::AuthCompleted {
                    method,
                    success: false,
                });
                self.events
                    .log(LogLevel::Error, format!("authentication failed: {failure}"));
                return self.finish(RunResult::terminal(RunStatus::AuthFailed(failure)));
            }
        };

        // Scrape and classify the setups page.
        self.events.emit(RunEvent::ScrapeStarted {
            url: self.config.setups_url.clone(),
        });
        self.events.log(LogLevel::Info, "scanning for active setups...");

        let listings = match self.snapshot_listings(&mut session).await {
            Ok(listings) => listings,
            Err(e) => {
                let message = format!("scrape failed: {e}");
                error!("{message}");
                self.events.log(LogLevel::Error, message.as_str());
                self.close_session(session).await;
                return self.finish(RunResult::terminal(RunStatus::Error(message)));
            }
        };

        let total = listings.len();
        info!("found {total} active setup listings");
        self.events.emit(RunEvent::ListingsFound { active: total });
        self.events
            .log(LogLevel::Info, format!("found {total} active setups"));

        // Download each listing, accumulating outcomes locally. Per-listing
        // failures are recorded and the loop continues.
        let organizer = Organizer::new(
            self.config.download_root.clone(),
            options.team_label.as_deref(),
            &self.config.timeouts,
        );

        let mut processed = 0usize;
        let mut succeeded = 0usize;
        let mut failed = 0usize;
        let mut status = RunStatus::Completed;

        for listing in &listings {
            if self.cancel.is_cancelled() {
                warn!("cancellation requested, stopping before next listing");
                self.events
                    .log(LogLevel::Warning, "cancellation requested, stopping");
                status = RunStatus::Cancelled;
                break;
            }

            match organizer.process(&session, listing).await {
                Ok(placement) => {
                    succeeded += 1;
                    let message = format!(
                        "{} -> {} ({:?})",
                        listing.package_name,
                        placement.path.display(),
                        placement.kind
                    );
                    info!("{message}");
                    self.events.log(LogLevel::Info, message);
                }
                Err(e) => {
                    failed += 1;
                    error!("{} failed: {e}", listing.package_name);
                    self.events.emit(RunEvent::ListingFailed {
                        name: listing.package_name.clone(),
                        reason: e.to_string(),
                    });
                    self.events.log(
                        LogLevel::Error,
                        format!("{} failed: {e}", listing.package_name),
                    );
                }
            }

            processed += 1;
            self.events.emit(RunEvent::Progress {
                processed,
                total,
                current: listing.package_name.clone(),
            });
        }

        self.close_session(session).await;
        self.finish(RunResult {
            status,
            processed,
            succeeded,
            failed,
            total,
        })
    }

    /// Navigate to the setups page, settle lazy rendering, snapshot, and
    /// classify.
    async fn snapshot_listings(
        &self,
        session: &mut Session,
    ) -> Result<Vec<SetupListing>, ScrapeError> {
        session
            .navigate(&self.config.setups_url, self.config.timeouts.navigation)
            .await
            .map_err(|e| ScrapeError::Browser(format!("{e:#}")))?;

        self.settle_page(session).await;

        let html = session
            .page_html()
            .await
            .map_err(|e| ScrapeError::Browser(format!("{e:#}")))?;

        extract_active_listings(&html, &self.config.setups_url, &self.config.scrape)
    }

    /// Scroll to the bottom until the document height stops growing, so
    /// lazily-rendered listings are present in the snapshot. Best-effort:
    /// scripting failures just end the settle early.
    async fn settle_page(&self, session: &Session) {
        let height = |v: serde_json::Value| v.as_u64().unwrap_or(0);

        let Ok(first) = session.execute_js("document.body.scrollHeight").await else {
            return;
        };
        let mut last_height = height(first);

        for pass in 0..self.config.settle_max_passes {
            if session
                .execute_js("window.scrollTo(0, document.body.scrollHeight)")
                .await
                .is_err()
            {
                return;
            }
            tokio::time::sleep(self.config.timeouts.settle_pause).await;

            let Ok(value) = session.execute_js("document.body.scrollHeight").await else {
                return;
            };
            let new_height = height(value);
            if new_height <= last_height {
                debug!("page settled after {} scroll passes", pass + 1);
                return;
            }
            last_height = new_height;
        }
        debug!("settle pass budget exhausted, proceeding with snapshot");
    }

    async fn close_session(&self, session: Session) {
        if let Err(e) = session.close().await {
            debug!("browser close at end of run: {e:#}");
        }
    }

    fn finish(&self, result: RunResult) -> RunResult {
        self.events.emit(RunEvent::RunFinished {
            status: result.status.to_string(),
            processed: result.processed,
            succeeded: result.succeeded,
            failed: result.failed,
        });
        info!(
            "run finished: {} ({}/{} succeeded, {} failed)",
            result.status, result.succeeded, result.total, result.failed
        );
        result
    }
}
