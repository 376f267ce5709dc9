//! Chromium-backed [`BrowserSession`] using chromiumoxide.

use super::BrowserSession;
use crate::config::Config;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;

/// Find the Chromium/Chrome binary path.
pub fn find_browser() -> Option<PathBuf> {
    // 1. PITSYNC_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("PITSYNC_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser", "chrome"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// A launched Chromium instance driving a single page.
pub struct ChromiumBrowser {
    browser: Browser,
    page: Page,
    http: reqwest::Client,
}

impl ChromiumBrowser {
    /// Launch Chromium (headless per config) and open a blank page.
    pub async fn launch(config: &Config) -> Result<Self> {
        let chrome_path = find_browser()
            .context("Chromium not found. Install Chrome/Chromium or set PITSYNC_CHROMIUM_PATH.")?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--window-size=1920,1080");
        if config.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }
        let browser_config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("failed to launch Chromium")?;

        // Drain CDP events for the lifetime of the browser.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to open page")?;

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                 AppleWebKit/537.36 (KHTML, like Gecko) \
                 Chrome/131.0.0.0 Safari/537.36",
            )
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            browser,
            page,
            http,
        })
    }

    /// Cookie header for the current browser session.
    async fn cookie_header(&self) -> Result<String> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .context("failed to read session cookies")?;
        Ok(cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; "))
    }
}

#[async_trait]
impl BrowserSession for ChromiumBrowser {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        let result = tokio::time::timeout(timeout, self.page.goto(url)).await;
        match result {
            Ok(Ok(_)) => {
                let _ = self.page.wait_for_navigation().await;
                Ok(())
            }
            Ok(Err(e)) => bail!("navigation to {url} failed: {e}"),
            Err(_) => bail!("navigation to {url} timed out after {}ms", timeout.as_millis()),
        }
    }

    async fn current_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to get URL")?
            .map(|u| u.to_string())
            .unwrap_or_default();
        Ok(url)
    }

    async fn page_html(&self) -> Result<String> {
        let result = self
            .page
            .evaluate("document.documentElement.outerHTML")
            .await
            .context("failed to snapshot page HTML")?;
        let html: String = result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert HTML result: {e:?}"))?;
        Ok(html)
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;
        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    async fn fill_field(&self, selectors: &[String], value: &str) -> Result<bool> {
        let script = format!(
            r#"(function() {{
                const sels = {sels};
                for (const s of sels) {{
                    const el = document.querySelector(s);
                    if (el) {{
                        el.focus();
                        el.value = {value};
                        el.dispatchEvent(new Event('input', {{bubbles: true}}));
                        el.dispatchEvent(new Event('change', {{bubbles: true}}));
                        return true;
                    }}
                }}
                return false;
            }})()"#,
            sels = serde_json::to_string(selectors)?,
            value = serde_json::to_string(value)?,
        );
        let found: bool = self
            .execute_js(&script)
            .await?
            .as_bool()
            .unwrap_or(false);
        Ok(found)
    }

    async fn click_any(&self, selectors: &[String]) -> Result<bool> {
        let script = format!(
            r#"(function() {{
                const sels = {sels};
                for (const s of sels) {{
                    const el = document.querySelector(s);
                    if (el) {{
                        el.click();
                        return true;
                    }}
                }}
                return false;
            }})()"#,
            sels = serde_json::to_string(selectors)?,
        );
        let found: bool = self
            .execute_js(&script)
            .await?
            .as_bool()
            .unwrap_or(false);
        Ok(found)
    }

    async fn fetch_authenticated(&self, url: &str, timeout: Duration) -> Result<Vec<u8>> {
        let header = self.cookie_header().await?;
        let cookie = (!header.is_empty()).then_some(header.as_str());
        fetch_with_cookies(&self.http, url, cookie, timeout).await
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        let _ = self.page.close().await;
        let _ = self.browser.close().await;
        Ok(())
    }
}

/// GET a resource, optionally attaching a Cookie header, bounded by
/// `timeout`. Non-success statuses are errors.
pub(crate) async fn fetch_with_cookies(
    client: &reqwest::Client,
    url: &str,
    cookie_header: Option<&str>,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let mut request = client.get(url).timeout(timeout);
    if let Some(header) = cookie_header {
        request = request.header(reqwest::header::COOKIE, header);
    }
    let response = request
        .send()
        .await
        .with_context(|| format!("request to {url} failed"))?
        .error_for_status()
        .with_context(|| format!("server rejected request to {url}"))?;
    let bytes = response
        .bytes()
        .await
        .with_context(|| format!("failed to read response body from {url}"))?;
    Ok(bytes.to_vec())
}
