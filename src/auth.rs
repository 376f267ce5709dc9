//! Login state machine: `Unauthenticated → Authenticating → Authenticated`
//! or `→ Failed`.
//!
//! Two entry protocols share the machine: a credential login that drives
//! the site's form directly, and an interactive Discord login where the
//! human completes the third-party flow in the opened browser while we
//! poll the URL. Either way, a [`Session`] is constructed only on the
//! `Authenticated` transition — a failed login can never hand a scraping
//! session to anyone.

use crate::browser::{BrowserSession, Session};
use crate::config::{AuthRules, Config, Timeouts};
use crate::error::AuthFailure;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Login identifier and secret, supplied by the caller and never persisted.
#[derive(Clone)]
pub struct Credentials {
    pub identifier: String,
    pub secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Observable state of the login machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Failed(AuthFailure),
}

/// Drives a login flow through an injected browser.
pub struct AuthController {
    login_url: String,
    rules: AuthRules,
    timeouts: Timeouts,
    state: AuthState,
}

impl AuthController {
    pub fn new(config: &Config) -> Self {
        Self {
            login_url: config.login_url.clone(),
            rules: config.auth.clone(),
            timeouts: config.timeouts.clone(),
            state: AuthState::Unauthenticated,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    /// Credential login: submit the form, then wait (bounded) for either an
    /// authenticated page or an error indicator.
    pub async fn login_with_credentials(
        &mut self,
        mut browser: Box<dyn BrowserSession>,
        credentials: &Credentials,
    ) -> Result<Session, AuthFailure> {
        self.state = AuthState::Authenticating;
        info!("authenticating with credentials for {}", credentials.identifier);

        let outcome = self.credential_flow(browser.as_mut(), credentials).await;
        self.conclude(browser, outcome).await
    }

    /// Interactive third-party login: open the login entry point, then poll
    /// the browser URL until the human finishes the Discord flow. Never
    /// constructs a session if the deadline passes first.
    pub async fn login_interactive(
        &mut self,
        mut browser: Box<dyn BrowserSession>,
    ) -> Result<Session, AuthFailure> {
        self.state = AuthState::Authenticating;
        info!("waiting for interactive login (complete it in the browser window)");

        let outcome = self.interactive_flow(browser.as_mut()).await;
        self.conclude(browser, outcome).await
    }

    /// Apply the flow outcome: hand out a session on success, otherwise
    /// close the browser so no authenticated handle survives a failure.
    async fn conclude(
        &mut self,
        browser: Box<dyn BrowserSession>,
        outcome: Result<(), AuthFailure>,
    ) -> Result<Session, AuthFailure> {
        match outcome {
            Ok(()) => {
                self.state = AuthState::Authenticated;
                info!("authentication successful");
                Ok(Session::new(browser))
            }
            Err(failure) => {
                self.state = AuthState::Failed(failure.clone());
                warn!("authentication failed: {failure}");
                if let Err(e) = browser.close().await {
                    debug!("browser close after failed login: {e:#}");
                }
                Err(failure)
            }
        }
    }

    async fn credential_flow(
        &self,
        browser: &mut dyn BrowserSession,
        credentials: &Credentials,
    ) -> Result<(), AuthFailure> {
        browser
            .navigate(&self.login_url, self.timeouts.navigation)
            .await
            .map_err(browser_failure)?;

        // Announcement/cookie popups can cover the form; dismiss if present.
        let _ = browser
            .click_any(&self.rules.popup_close_selectors)
            .await;

        if !browser
            .fill_field(&self.rules.email_selectors, &credentials.identifier)
            .await
            .map_err(browser_failure)?
        {
            return Err(AuthFailure::Browser("email field not found".into()));
        }
        if !browser
            .fill_field(&self.rules.password_selectors, &credentials.secret)
            .await
            .map_err(browser_failure)?
        {
            return Err(AuthFailure::Browser("password field not found".into()));
        }
        if !browser
            .click_any(&self.rules.submit_selectors)
            .await
            .map_err(browser_failure)?
        {
            return Err(AuthFailure::Browser("login button not found".into()));
        }

        let deadline = Instant::now() + self.timeouts.credential_login;
        loop {
            tokio::time::sleep(self.timeouts.poll_interval).await;

            let html = browser
                .page_html()
                .await
                .map_err(browser_failure)?
                .to_lowercase();
            if self.rules.error_markers.iter().any(|m| html.contains(m)) {
                return Err(AuthFailure::InvalidCredentials);
            }

            let url = browser.current_url().await.map_err(browser_failure)?;
            if url.contains(&self.rules.post_login_path)
                || self.rules.success_markers.iter().any(|m| html.contains(m))
            {
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(AuthFailure::Timeout);
            }
            debug!("no login outcome yet, polling again");
        }
    }

    async fn interactive_flow(&self, browser: &mut dyn BrowserSession) -> Result<(), AuthFailure> {
        browser
            .navigate(&self.login_url, self.timeouts.navigation)
            .await
            .map_err(browser_failure)?;

        let deadline = Instant::now() + self.timeouts.interactive_login;
        loop {
            tokio::time::sleep(self.timeouts.poll_interval).await;

            let url = browser.current_url().await.map_err(browser_failure)?;
            if url.contains(&self.rules.post_login_path) {
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(AuthFailure::LoginTimeout);
            }
        }
    }
}

fn browser_failure(e: anyhow::Error) -> AuthFailure {
    AuthFailure::Browser(format!("{e:#}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = Credentials {
            identifier: "driver@example.com".into(),
            secret: "hunter2".into(),
        };
        let debug = format!("{creds:?}");
        assert!(debug.contains("driver@example.com"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_controller_starts_unauthenticated() {
        let controller = AuthController::new(&Config::default());
        assert_eq!(*controller.state(), AuthState::Unauthenticated);
    }
}
