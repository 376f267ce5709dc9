//! Runtime configuration: site URLs, deadlines, and login-page selectors.
//!
//! Defaults target the production site; every URL and deadline can be
//! overridden through `PITSYNC_*` environment variables so a layout change
//! or a staging instance does not require a rebuild.

use crate::scrape::ScrapeRules;
use std::path::PathBuf;
use std::time::Duration;

/// Production site endpoints.
pub const BASE_URL: &str = "https://app.tracktitan.io";
pub const LOGIN_PATH: &str = "/login";
pub const SETUPS_PATH: &str = "/setups";

/// URL fragment that marks a completed interactive login.
pub const POST_LOGIN_PATH: &str = "/dashboard";

/// Per-step deadlines for the run. Every browser and network step is
/// bounded so a run can never hang on a single unresponsive step.
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Page navigation deadline.
    pub navigation: Duration,
    /// Overall deadline for the credential login to reach an
    /// authenticated page.
    pub credential_login: Duration,
    /// Overall deadline for the user-completed third-party login.
    pub interactive_login: Duration,
    /// Sampling interval for both login polls.
    pub poll_interval: Duration,
    /// Deadline for fetching one package archive.
    pub fetch: Duration,
    /// Pause between scroll passes while settling the setups page.
    pub settle_pause: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(30),
            credential_login: Duration::from_secs(20),
            interactive_login: Duration::from_secs(300),
            poll_interval: Duration::from_millis(500),
            fetch: Duration::from_secs(60),
            settle_pause: Duration::from_millis(1000),
        }
    }
}

/// Selectors and markers used to drive the login page. Grouped here because
/// they break when the site is redesigned, not when our logic changes.
#[derive(Debug, Clone)]
pub struct AuthRules {
    /// Best-effort dismissal of cookie/announcement popups covering the form.
    pub popup_close_selectors: Vec<String>,
    pub email_selectors: Vec<String>,
    pub password_selectors: Vec<String>,
    pub submit_selectors: Vec<String>,
    /// Lowercase substrings whose presence in the page marks a logged-in state.
    pub success_markers: Vec<String>,
    /// Lowercase substrings whose presence marks a rejected login.
    pub error_markers: Vec<String>,
    /// URL fragment that marks the post-login destination.
    pub post_login_path: String,
}

impl Default for AuthRules {
    fn default() -> Self {
        Self {
            popup_close_selectors: vec![
                "button[aria-label=\"Close\"]".into(),
                "button[aria-label=\"close\"]".into(),
            ],
            email_selectors: vec![
                "input[type=\"email\"]".into(),
                "input[name=\"email\"]".into(),
                "#email".into(),
            ],
            password_selectors: vec![
                "input[type=\"password\"]".into(),
                "input[name=\"password\"]".into(),
                "#password".into(),
            ],
            submit_selectors: vec![
                "button[type=\"submit\"]".into(),
                "input[type=\"submit\"]".into(),
                ".login-button".into(),
                "#login-button".into(),
            ],
            success_markers: vec![
                "dashboard".into(),
                "logout".into(),
                "profile".into(),
                "account".into(),
                "welcome".into(),
            ],
            error_markers: vec![
                "invalid email or password".into(),
                "incorrect password".into(),
                "login failed".into(),
            ],
            post_login_path: POST_LOGIN_PATH.into(),
        }
    }
}

/// Full configuration for a run.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub login_url: String,
    pub setups_url: String,
    pub download_root: PathBuf,
    pub headless: bool,
    pub timeouts: Timeouts,
    /// Maximum scroll passes while waiting for lazily-rendered listings.
    pub settle_max_passes: u32,
    pub auth: AuthRules,
    pub scrape: ScrapeRules,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            login_url: format!("{BASE_URL}{LOGIN_PATH}"),
            setups_url: format!("{BASE_URL}{SETUPS_PATH}"),
            download_root: default_download_root(),
            headless: true,
            timeouts: Timeouts::default(),
            settle_max_passes: 20,
            auth: AuthRules::default(),
            scrape: ScrapeRules::default(),
        }
    }
}

impl Config {
    /// Build a configuration from defaults plus `PITSYNC_*` env overrides.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(base) = std::env::var("PITSYNC_BASE_URL") {
            let base = base.trim_end_matches('/').to_string();
            cfg.login_url = format!("{base}{LOGIN_PATH}");
            cfg.setups_url = format!("{base}{SETUPS_PATH}");
            cfg.base_url = base;
        }
        if let Ok(url) = std::env::var("PITSYNC_LOGIN_URL") {
            cfg.login_url = url;
        }
        if let Ok(url) = std::env::var("PITSYNC_SETUPS_URL") {
            cfg.setups_url = url;
        }
        if let Ok(path) = std::env::var("PITSYNC_DOWNLOAD_PATH") {
            cfg.download_root = PathBuf::from(path);
        }
        if let Ok(v) = std::env::var("PITSYNC_HEADLESS") {
            cfg.headless = !matches!(v.as_str(), "0" | "false" | "no");
        }

        cfg
    }
}

/// Default download root: the platform download directory, falling back to
/// `~/Downloads`.
fn default_download_root() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Downloads")
    })
}
