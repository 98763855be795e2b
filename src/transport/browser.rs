//! Headless browser transport
//!
//! Pages are loaded in headless Chromium so script-generated markup is
//! captured. For an HTML document the rendered DOM is returned; for any
//! other resource the raw network body is read back over CDP.

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::cdp::browser_protocol::network::{
    EventResponseReceived, GetResponseBodyParams,
};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

use super::TransportResponse;
use crate::utils::constants::{CHROME_USER_AGENT, STATUS_NO_RESPONSE, STATUS_TIMEOUT};
use crate::utils::timeout::{is_timeout_error, with_timeout};

/// How long to wait for a straggling response event after navigation
const RESPONSE_EVENT_GRACE: Duration = Duration::from_millis(500);

/// Install locations probed when `CHROMIUM_PATH` is unset
#[cfg(target_os = "windows")]
const CHROMIUM_CANDIDATES: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files\Chromium\Application\chrome.exe",
];
#[cfg(target_os = "macos")]
const CHROMIUM_CANDIDATES: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/homebrew/bin/chromium",
];
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const CHROMIUM_CANDIDATES: &[&str] = &[
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/snap/bin/chromium",
];

/// Executable names searched for on `PATH`
const CHROMIUM_BINARIES: &[&str] = &["chromium", "chromium-browser", "google-chrome", "chrome"];

/// Command-line switches for a quiet, unattended headless session
const LAUNCH_SWITCHES: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-background-networking",
    "--disable-extensions",
    "--disable-notifications",
    "--no-default-browser-check",
    "--no-first-run",
    "--no-sandbox",
    "--mute-audio",
];

/// Locate an installed Chromium
///
/// `CHROMIUM_PATH` wins when it names an existing file, then the usual
/// install locations, then every directory on `PATH`.
pub fn locate_chromium() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("CHROMIUM_PATH").map(PathBuf::from) {
        if path.is_file() {
            return Some(path);
        }
        warn!("CHROMIUM_PATH does not name a file: {}", path.display());
    }

    let installed = CHROMIUM_CANDIDATES.iter().map(PathBuf::from).find(|p| p.is_file());
    if installed.is_some() {
        return installed;
    }

    let search_path = std::env::var_os("PATH")?;
    std::env::split_paths(&search_path)
        .flat_map(|dir| CHROMIUM_BINARIES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

/// Download Chromium into `<cache dir>/pagebundle/chromium`
pub async fn download_chromium() -> Result<PathBuf> {
    let root = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
    let install_dir = root.join("pagebundle").join("chromium");
    tokio::fs::create_dir_all(&install_dir)
        .await
        .with_context(|| format!("Cannot create {}", install_dir.display()))?;

    info!("No local Chromium found, downloading into {}", install_dir.display());
    let options = BrowserFetcherOptions::builder()
        .with_path(&install_dir)
        .build()
        .context("Invalid Chromium download options")?;
    let installed = BrowserFetcher::new(options)
        .fetch()
        .await
        .context("Chromium download failed")?;

    Ok(installed.executable_path)
}

/// Sessions launched by this process so far
static SESSION_SEQ: AtomicU64 = AtomicU64::new(0);

/// Profile directory unique to one session: `pagebundle-profile-<pid>-<seq>`
fn fresh_profile_dir() -> PathBuf {
    let seq = SESSION_SEQ.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("pagebundle-profile-{}-{seq}", std::process::id()))
}

/// CDP handler errors for events chromiumoxide has no model for
fn is_unmodelled_event(message: &str) -> bool {
    message.contains("data did not match any variant of untagged enum Message")
        || message.contains("Failed to deserialize WS response")
}

/// A running headless browser plus its CDP handler task
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    profile_dir: PathBuf,
}

impl BrowserSession {
    /// Find or download Chromium and launch it headless with a throwaway profile
    pub async fn launch() -> Result<Self> {
        let executable = match locate_chromium() {
            Some(path) => path,
            None => download_chromium().await?,
        };
        debug!("Using Chromium at {}", executable.display());

        let profile_dir = fresh_profile_dir();
        tokio::fs::create_dir_all(&profile_dir)
            .await
            .with_context(|| format!("Cannot create {}", profile_dir.display()))?;

        let mut config = BrowserConfigBuilder::default()
            .chrome_executable(executable)
            .headless_mode(HeadlessMode::default())
            .user_data_dir(profile_dir.clone())
            .window_size(1280, 800)
            .arg(format!("--user-agent={CHROME_USER_AGENT}"));
        for switch in LAUNCH_SWITCHES {
            config = config.arg(*switch);
        }
        let config = config
            .build()
            .map_err(|e| anyhow!("Invalid browser configuration: {e}"))?;

        let (browser, mut events) = Browser::launch(config)
            .await
            .context("Failed to launch headless browser")?;
        info!("Headless browser started");

        let handler = task::spawn(async move {
            while let Some(event) = events.next().await {
                match event {
                    Err(e) if is_unmodelled_event(&e.to_string()) => trace!("Ignored CDP event: {e}"),
                    Err(e) => error!("Browser handler error: {e:?}"),
                    Ok(()) => {}
                }
            }
            debug!("Browser handler finished");
        });

        Ok(Self {
            browser,
            handler,
            profile_dir,
        })
    }

    /// Load `url` in a fresh page and capture its body
    ///
    /// Timeouts fail with 408; launch, navigation and CDP errors with 0.
    pub async fn fetch(&self, url: &str, timeout_secs: u64) -> TransportResponse {
        match with_timeout(self.load(url), timeout_secs, "Browser page load").await {
            Ok(response) => response,
            Err(e) => {
                warn!("Browser fetch of {url} failed: {e:#}");
                if is_timeout_error(&e) {
                    TransportResponse::failure(STATUS_TIMEOUT)
                } else {
                    TransportResponse::failure(STATUS_NO_RESPONSE)
                }
            }
        }
    }

    async fn load(&self, url: &str) -> Result<TransportResponse> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("Failed to open browser page")?;

        let result = capture(&page, url).await;

        if let Err(e) = page.close().await {
            debug!("Failed to close browser page for {url}: {e}");
        }
        result
    }

    /// Close the browser, wait for the process and remove its profile
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser: {e}");
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Failed to wait for browser exit: {e}");
        }
        self.handler.abort();
        if let Err(e) = tokio::fs::remove_dir_all(&self.profile_dir).await {
            debug!("Cannot remove browser profile {}: {e}", self.profile_dir.display());
        }
    }
}

async fn capture(page: &Page, url: &str) -> Result<TransportResponse> {
    let mut events = page
        .event_listener::<EventResponseReceived>()
        .await
        .context("Failed to subscribe to network responses")?;

    page.goto(url).await.context("Failed to navigate")?;

    let final_url = page.url().await.ok().flatten().unwrap_or_else(|| url.to_string());

    let mut document = None;
    while let Ok(Some(event)) = tokio::time::timeout(RESPONSE_EVENT_GRACE, events.next()).await {
        if event.response.url == final_url || event.response.url == url {
            document = Some(event);
            break;
        }
    }
    let event = document.ok_or_else(|| anyhow!("No network response captured for {url}"))?;

    let status = u16::try_from(event.response.status).unwrap_or(STATUS_NO_RESPONSE);
    if !(200..300).contains(&status) {
        return Ok(TransportResponse::failure(status));
    }

    let bytes = if event.response.mime_type.starts_with("text/html") {
        page.content()
            .await
            .context("Failed to read rendered document")?
            .into_bytes()
    } else {
        let body = page
            .execute(GetResponseBodyParams::new(event.request_id.clone()))
            .await
            .context("Failed to read response body")?;
        if body.result.base64_encoded {
            STANDARD
                .decode(&body.result.body)
                .context("Response body is not valid base64")?
        } else {
            body.result.body.clone().into_bytes()
        }
    };

    Ok(TransportResponse::success(bytes, status))
}
