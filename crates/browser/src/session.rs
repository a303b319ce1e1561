//! Chrome-backed source sessions.

use std::{path::PathBuf, time::Duration};

use {
    async_trait::async_trait,
    chromiumoxide::{
        Browser, BrowserConfig as CdpBrowserConfig, Page,
        cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams,
    },
    futures::StreamExt,
    maxrelay_config::SourceConfig,
    maxrelay_forwarder::{SourceDriver, SourceError, SourceHandle},
    tokio::task::JoinHandle,
    tracing::{debug, info, warn},
    url::Url,
};

use crate::{detect::find_chrome, error::BrowserError};

/// Runs before any page script so the site sees a regular browser.
const HIDE_WEBDRIVER_JS: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

/// Any of these means the chat UI rendered.
const READY_PROBE_JS: &str = r#"
    document.querySelector(
        '[contenteditable="true"], textarea, [class*="message"], [class*="chat"]'
    ) !== null
"#;

/// Trimmed `innerText` of the last `window` class-bearing elements. Each read
/// is guarded on its own so one detached node cannot spoil the batch.
fn snapshot_script(window: usize) -> String {
    format!(
        r#"(() => {{
    const nodes = Array.from(document.querySelectorAll('[class]')).slice(-{window});
    const out = [];
    for (const el of nodes) {{
        try {{
            const text = (el.innerText || '').trim();
            if (text) out.push(text);
        }} catch (_) {{}}
    }}
    return out;
}})()"#
    )
}

/// Command-line switches passed to Chrome, in order.
pub fn chrome_args(config: &SourceConfig) -> Vec<String> {
    let mut args = vec![
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--no-first-run".to_string(),
    ];
    if let Some(ua) = &config.user_agent {
        args.push(format!("--user-agent={ua}"));
    }
    args.extend(config.chrome_args.iter().cloned());
    args
}

/// Launches a fresh Chrome per session. The profile directory persists
/// across sessions so a manual login survives recovery restarts.
pub struct ChromeSource {
    config: SourceConfig,
    profile_dir: Option<PathBuf>,
}

impl ChromeSource {
    pub fn new(config: SourceConfig, profile_dir: Option<PathBuf>) -> Self {
        Self {
            config,
            profile_dir,
        }
    }

    async fn launch(&self) -> Result<ChromeSession, BrowserError> {
        let target = parse_url(&self.config.target_url)?;
        let executable = find_chrome(self.config.chrome_path.as_deref())?;

        let mut builder = CdpBrowserConfig::builder()
            .chrome_executable(&executable)
            .request_timeout(Duration::from_millis(self.config.navigation_timeout_ms));
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(dir) = &self.profile_dir {
            builder = builder.user_data_dir(dir);
        }
        for arg in chrome_args(&self.config) {
            builder = builder.arg(arg);
        }
        let cdp_config = builder.build().map_err(BrowserError::LaunchFailed)?;

        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser event error");
                }
            }
            debug!("browser event handler exited");
        });

        let mut session = ChromeSession {
            browser,
            page: None,
            events,
            target,
            settle_delay: Duration::from_secs(self.config.settle_delay_secs),
            scan_window: self.config.scan_window,
        };

        // From here on a failure must not leak the browser process.
        match session.open_login(&self.config.login_url).await {
            Ok(()) => {
                info!(
                    executable = %executable.display(),
                    login_url = %self.config.login_url,
                    "source browser launched"
                );
                Ok(session)
            },
            Err(e) => {
                session.shutdown().await;
                Err(e)
            },
        }
    }
}

#[async_trait]
impl SourceDriver for ChromeSource {
    async fn acquire(&self) -> Result<Box<dyn SourceHandle>, SourceError> {
        let session = self.launch().await?;
        Ok(Box::new(session))
    }
}

pub struct ChromeSession {
    browser: Browser,
    page: Option<Page>,
    events: JoinHandle<()>,
    target: Url,
    settle_delay: Duration,
    scan_window: usize,
}

impl ChromeSession {
    async fn open_login(&mut self, login_url: &str) -> Result<(), BrowserError> {
        let login = parse_url(login_url)?;
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::LaunchFailed(format!("failed to open a tab: {e}")))?;
        page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(
            HIDE_WEBDRIVER_JS,
        ))
        .await?;
        page.goto(login.as_str())
            .await
            .map_err(|e| BrowserError::LaunchFailed(format!("failed to open {login}: {e}")))?;
        self.page = Some(page);
        Ok(())
    }

    fn page(&self) -> Result<&Page, BrowserError> {
        self.page
            .as_ref()
            .ok_or_else(|| BrowserError::Cdp("browser tab is gone".into()))
    }

    async fn goto_target(&self) -> Result<(), BrowserError> {
        let page = self.page()?;
        page.goto(self.target.as_str())
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;
        let _ = page.wait_for_navigation().await;
        tokio::time::sleep(self.settle_delay).await;

        let rendered = page
            .evaluate(READY_PROBE_JS)
            .await
            .ok()
            .and_then(|r| r.into_value::<bool>().ok())
            .unwrap_or(false);
        if rendered {
            info!(url = %self.target, "target chat opened");
        } else {
            warn!(url = %self.target, "target opened but no chat elements found yet");
        }
        Ok(())
    }

    async fn snapshot(&self) -> Result<Vec<String>, BrowserError> {
        let page = self.page()?;
        let texts = page
            .evaluate(snapshot_script(self.scan_window))
            .await
            .map_err(|e| BrowserError::JsEvalFailed(e.to_string()))?
            .into_value::<Vec<String>>()
            .map_err(|e| BrowserError::JsEvalFailed(e.to_string()))?;
        Ok(texts)
    }

    async fn reload(&self) -> Result<(), BrowserError> {
        let page = self.page()?;
        page.reload()
            .await
            .map_err(|e| BrowserError::ReloadFailed(e.to_string()))?;
        let _ = page.wait_for_navigation().await;
        tokio::time::sleep(self.settle_delay).await;
        Ok(())
    }

    /// Close the browser and reap the process. Errors are logged only.
    async fn shutdown(&mut self) {
        if let Err(e) = self.browser.close().await {
            debug!(error = %e, "browser close failed (already gone?)");
        }
        if let Err(e) = self.browser.wait().await {
            debug!(error = %e, "waiting for browser exit failed");
        }
        self.events.abort();
        info!("source browser closed");
    }
}

#[async_trait]
impl SourceHandle for ChromeSession {
    async fn navigate_to_target(&mut self) -> Result<(), SourceError> {
        Ok(self.goto_target().await?)
    }

    async fn snapshot_texts(&mut self) -> Vec<String> {
        match self.snapshot().await {
            Ok(texts) => texts,
            Err(e) => {
                warn!(error = %e, "message snapshot failed");
                Vec::new()
            },
        }
    }

    async fn refresh(&mut self) -> Result<(), SourceError> {
        Ok(self.reload().await?)
    }

    async fn release(self: Box<Self>) {
        let mut session = self;
        session.shutdown().await;
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        // chromiumoxide kills a still-running child when `Browser` drops.
        self.events.abort();
    }
}

fn parse_url(raw: &str) -> Result<Url, BrowserError> {
    Url::parse(raw).map_err(|e| BrowserError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}
