//! Shared test fixtures: a scripted [`BrowserSession`] fake and archive
//! builders, so auth and orchestration flows run without a real browser.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use pitsync::browser::BrowserSession;
use pitsync::config::Config;
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Login page without any success/error markers.
pub const LOGIN_HTML: &str = "<html><body><form>Sign in</form></body></html>";
/// Post-login page containing a success marker.
pub const DASHBOARD_HTML: &str = "<html><body>Dashboard — logout</body></html>";
/// Rejected-login page containing an error marker.
pub const REJECTED_HTML: &str =
    "<html><body>Invalid email or password</body></html>";

/// Observable state shared between a [`MockBrowser`] and the test.
pub struct MockState {
    pub login_html: String,
    pub success_html: String,
    pub error_html: String,
    pub setups_html: String,
    /// Secret that makes the login form submit succeed; `None` means the
    /// page never reacts to the submit at all.
    pub accepted_secret: Option<String>,
    pub has_login_form: bool,
    /// Download URL → archive bytes served by `fetch_authenticated`.
    pub archives: HashMap<String, Vec<u8>>,
    /// URLs whose fetch fails outright.
    pub failing_urls: Vec<String>,
    /// Scripted `current_url` values, popped per call; when exhausted the
    /// last navigated/submitted URL is reported.
    pub url_script: Mutex<VecDeque<String>>,
    /// Called with the 1-based fetch count at the start of each fetch.
    pub fetch_hook: Mutex<Option<Box<dyn Fn(usize) + Send + Sync>>>,

    // Recorded interactions.
    pub navigations: Mutex<Vec<String>>,
    pub fetches: Mutex<Vec<String>>,
    pub filled_values: Mutex<Vec<String>>,
    pub closed: AtomicBool,

    pub current_html: Mutex<String>,
    pub current_url: Mutex<String>,
}

impl MockState {
    /// A standard site: working login form and an empty setups page.
    /// Customize fields before wrapping in an `Arc`.
    pub fn new(accepted_secret: Option<&str>) -> Self {
        Self {
            login_html: LOGIN_HTML.to_string(),
            success_html: DASHBOARD_HTML.to_string(),
            error_html: REJECTED_HTML.to_string(),
            setups_html: setups_page(&[]),
            accepted_secret: accepted_secret.map(str::to_string),
            has_login_form: true,
            archives: HashMap::new(),
            failing_urls: Vec::new(),
            url_script: Mutex::new(VecDeque::new()),
            fetch_hook: Mutex::new(None),
            navigations: Mutex::new(Vec::new()),
            fetches: Mutex::new(Vec::new()),
            filled_values: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            current_html: Mutex::new(String::new()),
            current_url: Mutex::new(String::new()),
        }
    }
}

/// Scripted in-memory stand-in for a launched browser.
pub struct MockBrowser {
    pub state: Arc<MockState>,
}

impl MockBrowser {
    pub fn new(state: Arc<MockState>) -> Box<Self> {
        Box::new(Self { state })
    }
}

#[async_trait]
impl BrowserSession for MockBrowser {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<()> {
        self.state.navigations.lock().unwrap().push(url.to_string());
        *self.state.current_url.lock().unwrap() = url.to_string();
        let html = if url.contains("/login") {
            self.state.login_html.clone()
        } else if url.contains("/setups") {
            self.state.setups_html.clone()
        } else {
            String::new()
        };
        *self.state.current_html.lock().unwrap() = html;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        if let Some(scripted) = self.state.url_script.lock().unwrap().pop_front() {
            *self.state.current_url.lock().unwrap() = scripted.clone();
            return Ok(scripted);
        }
        Ok(self.state.current_url.lock().unwrap().clone())
    }

    async fn page_html(&self) -> Result<String> {
        Ok(self.state.current_html.lock().unwrap().clone())
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        if script.contains("scrollTo") {
            Ok(serde_json::Value::Null)
        } else if script.contains("scrollHeight") {
            Ok(serde_json::json!(1000))
        } else {
            Ok(serde_json::Value::Null)
        }
    }

    async fn fill_field(&self, _selectors: &[String], value: &str) -> Result<bool> {
        if !self.state.has_login_form {
            return Ok(false);
        }
        self.state
            .filled_values
            .lock()
            .unwrap()
            .push(value.to_string());
        Ok(true)
    }

    async fn click_any(&self, _selectors: &[String]) -> Result<bool> {
        if !self.state.has_login_form {
            return Ok(false);
        }
        // The login submit: second filled field is the secret.
        let submitted_secret = self.state.filled_values.lock().unwrap().get(1).cloned();
        match (&self.state.accepted_secret, submitted_secret) {
            (Some(expected), Some(actual)) if *expected == actual => {
                *self.state.current_html.lock().unwrap() = self.state.success_html.clone();
            }
            (Some(_), _) => {
                *self.state.current_html.lock().unwrap() = self.state.error_html.clone();
            }
            // No reaction configured: the page just sits there.
            (None, _) => {}
        }
        Ok(true)
    }

    async fn fetch_authenticated(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>> {
        let count = {
            let mut fetches = self.state.fetches.lock().unwrap();
            fetches.push(url.to_string());
            fetches.len()
        };
        if let Some(hook) = self.state.fetch_hook.lock().unwrap().as_ref() {
            hook(count);
        }
        if self.state.failing_urls.iter().any(|u| u == url) {
            return Err(anyhow!("server returned 500 for {url}"));
        }
        self.state
            .archives
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("no archive served at {url}"))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.state.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

/// A setups page with one active section holding the given entries, then an
/// inactive section with one stale entry.
pub fn setups_page(active: &[(&str, &str, &str, &str)]) -> String {
    let mut html = String::from(
        r#"<html><body>
        <div class="text-2xl"><span class="text-green-500">This Week (Active)</span></div>
        <div class="cards">"#,
    );
    for (name, car, track, href) in active {
        html.push_str(&format!(
            r#"<a href="{href}">
                 <div class="setup-name">{name}</div>
                 <div class="setup-car">{car}</div>
                 <div class="setup-track">{track}</div>
               </a>"#,
        ));
    }
    html.push_str(
        r#"</div>
        <div class="text-2xl">Last Week (Inactive)</div>
        <div class="cards"><a href="/setups/stale-1"><div class="setup-name">stale</div></a></div>
        </body></html>"#,
    );
    html
}

/// Build an in-memory zip archive.
pub fn build_zip(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, data) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Config with millisecond-scale deadlines so failure paths stay fast.
pub fn test_config(download_root: std::path::PathBuf) -> Config {
    let mut config = Config::default();
    config.download_root = download_root;
    config.timeouts.poll_interval = Duration::from_millis(5);
    config.timeouts.credential_login = Duration::from_millis(100);
    config.timeouts.interactive_login = Duration::from_millis(100);
    config.timeouts.settle_pause = Duration::from_millis(5);
    config
}
