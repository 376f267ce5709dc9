//! Browser capability abstraction.
//!
//! The core never talks to a concrete automation backend. Everything it
//! needs from a browser — navigation, form submission, URL polling, page
//! snapshots, and authenticated resource fetch — goes through the
//! [`BrowserSession`] trait, so the auth and scrape logic can be exercised
//! against scripted fakes and captured page snapshots.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// A live automated-browser handle.
///
/// One instance corresponds to one browser profile/tab. The trait is
/// deliberately small: anything expressible as these primitives stays
/// backend-agnostic.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate to a URL and wait for the load, bounded by `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// The page's current URL.
    async fn current_url(&self) -> Result<String>;

    /// Snapshot of the rendered page HTML.
    async fn page_html(&self) -> Result<String>;

    /// Execute JavaScript in the page and return its JSON result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;

    /// Fill the first element matching any of `selectors` with `value`.
    /// Returns `false` when no element matched.
    async fn fill_field(&self, selectors: &[String], value: &str) -> Result<bool>;

    /// Click the first element matching any of `selectors`.
    /// Returns `false` when no element matched.
    async fn click_any(&self, selectors: &[String]) -> Result<bool>;

    /// Fetch a resource with the browser's session cookies attached,
    /// bounded by `timeout`.
    async fn fetch_authenticated(&self, url: &str, timeout: Duration) -> Result<Vec<u8>>;

    /// Close the browser and release its resources.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// An authenticated browser session.
///
/// Constructed exclusively by the auth controller once a login flow reaches
/// `Authenticated` — no session value can exist for a failed login. The
/// orchestrator owns the single live session for a run and passes it by
/// reference to the components that need authenticated access.
pub struct Session {
    browser: Box<dyn BrowserSession>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(browser: Box<dyn BrowserSession>) -> Self {
        Self { browser }
    }

    pub async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        self.browser.navigate(url, timeout).await
    }

    pub async fn current_url(&self) -> Result<String> {
        self.browser.current_url().await
    }

    pub async fn page_html(&self) -> Result<String> {
        self.browser.page_html().await
    }

    pub async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        self.browser.execute_js(script).await
    }

    pub async fn fetch_authenticated(&self, url: &str, timeout: Duration) -> Result<Vec<u8>> {
        self.browser.fetch_authenticated(url, timeout).await
    }

    /// Close the underlying browser. Errors are reported but the session is
    /// gone either way.
    pub async fn close(self) -> Result<()> {
        self.browser.close().await
    }
}
