//! Headless-browser page rendering. The calendar page builds its DOM with
//! client-side script, so a plain HTTP GET returns a shell; we drive a real
//! Chrome session and read the markup after rendering settles.

use crate::error::{Result, WatchError};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat,
};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36";
/// Upper bound on waiting for the body element to appear.
const BODY_WAIT_TIMEOUT: Duration = Duration::from_secs(20);
/// Extra delay after body presence so client-side rendering can finish.
const RENDER_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Renders a URL to its post-JavaScript HTML. The one seam external to the
/// pipeline; tests substitute a canned implementation.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn fetch(&self, url: &str, debug_label: &str) -> Result<String>;
}

struct Session {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

/// Chrome-backed renderer. Holds at most one live session, created lazily on
/// first fetch and reused afterwards; concurrent fetches queue on the
/// internal mutex so the single session never sees interleaved navigation.
pub struct ChromiumRenderer {
    screenshots_dir: PathBuf,
    session: tokio::sync::Mutex<Option<Session>>,
}

impl ChromiumRenderer {
    pub fn new(screenshots_dir: PathBuf) -> Self {
        if let Err(e) = std::fs::create_dir_all(&screenshots_dir) {
            warn!(dir = %screenshots_dir.display(), error = %e, "could not create screenshots directory");
        }
        Self {
            screenshots_dir,
            session: tokio::sync::Mutex::new(None),
        }
    }

    async fn start_session(&self) -> Result<Session> {
        let config = BrowserConfig::builder()
            .window_size(1920, 1200)
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            // The site may serve different markup to detected automation
            .arg("--disable-blink-features=AutomationControlled")
            .build()
            .map_err(WatchError::BrowserInit)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| WatchError::BrowserInit(e.to_string()))?;

        // Drive the CDP event stream for the lifetime of the session
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| WatchError::BrowserInit(e.to_string()))?;
        page.set_user_agent(SetUserAgentOverrideParams::new(USER_AGENT))
            .await
            .map_err(|e| WatchError::BrowserInit(e.to_string()))?;
        // Hide the webdriver flag before any page script runs
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
            "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})",
        ))
        .await
        .map_err(|e| WatchError::BrowserInit(e.to_string()))?;

        info!("browser session started");
        Ok(Session {
            browser,
            page,
            handler_task,
        })
    }

    async fn fetch_html(page: &Page, url: &str) -> Result<String> {
        page.goto(url)
            .await
            .map_err(|e| WatchError::Fetch(format!("navigation to {url} failed: {e}")))?;

        tokio::time::timeout(BODY_WAIT_TIMEOUT, async {
            loop {
                if page.find_element("body").await.is_ok() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
        })
        .await
        .map_err(|_| WatchError::Fetch(format!("timed out waiting for body element on {url}")))?;

        tokio::time::sleep(RENDER_SETTLE_DELAY).await;

        page.content()
            .await
            .map_err(|e| WatchError::Fetch(format!("reading page content failed: {e}")))
    }

    /// Best effort only; a failed screenshot is logged and swallowed.
    async fn save_debug_screenshot(&self, page: &Page, name_prefix: &str) {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = self
            .screenshots_dir
            .join(format!("debug_{name_prefix}_{timestamp}.png"));
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        match page.screenshot(params).await {
            Ok(bytes) => match tokio::fs::write(&path, &bytes).await {
                Ok(()) => info!(path = %path.display(), "saved debug screenshot"),
                Err(e) => error!(path = %path.display(), error = %e, "failed to write screenshot"),
            },
            Err(e) => error!(error = %e, "failed to capture screenshot"),
        }
    }

    /// Shuts down the browser session. Safe to call when none was started.
    pub async fn close(&self) {
        let mut guard = self.session.lock().await;
        if let Some(mut session) = guard.take() {
            if let Err(e) = session.browser.close().await {
                warn!(error = %e, "browser did not close cleanly");
            }
            let _ = session.browser.wait().await;
            session.handler_task.abort();
            info!("browser session closed");
        }
    }
}

#[async_trait]
impl PageRenderer for ChromiumRenderer {
    async fn fetch(&self, url: &str, debug_label: &str) -> Result<String> {
        let mut guard = self.session.lock().await;
        if guard.is_none() {
            // Init is retried on the next fetch if it fails here
            *guard = Some(self.start_session().await?);
        }
        let session = guard.as_ref().unwrap();

        let result = Self::fetch_html(&session.page, url).await;
        // Screenshot every attempt, success or failure, for offline diagnosis
        let label = match &result {
            Ok(_) => debug_label.to_string(),
            Err(_) => format!("{debug_label}_access_failed"),
        };
        self.save_debug_screenshot(&session.page, &label).await;
        result
    }
}
