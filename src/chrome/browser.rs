use super::interceptor::CdpHost;
use crate::capture::CaptureSet;
use crate::config::Config;
use crate::store::TabId;
use crate::{EditorError, Result};
use chromiumoxide::cdp::browser_protocol::target::TargetId;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

const TAB_POLL_INTERVAL_MS: u64 = 2000;

#[derive(Debug, Deserialize)]
struct PageTarget {
    id: TargetId,
    url: String,
    #[serde(rename = "type")]
    target_type: String,
}

/// Owns the browser connection and the tab registry. Every adopted page gets
/// a fresh numeric tab id, its capture listeners, and its request
/// interception; when a tab disappears its session state and rules are torn
/// down through the lifecycle manager.
pub struct BrowserManager {
    config: Arc<Config>,
    host: Arc<CdpHost>,
    capture: Arc<CaptureSet>,
    browser: RwLock<Option<Arc<Browser>>>,
    tabs: RwLock<HashMap<String, TabId>>,
    next_tab: AtomicI64,
}

impl BrowserManager {
    pub fn new(config: Arc<Config>, host: Arc<CdpHost>, capture: Arc<CaptureSet>) -> Self {
        Self {
            config,
            host,
            capture,
            browser: RwLock::new(None),
            tabs: RwLock::new(HashMap::new()),
            next_tab: AtomicI64::new(1),
        }
    }

    /// Connects to a running browser on the configured debugging port, or
    /// launches one, then adopts its pages and keeps watching for tab
    /// churn.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let browser = match self.connect_to_existing(self.config.browser.port).await {
            Ok(browser) => browser,
            Err(_) => self.launch().await?,
        };
        *self.browser.write().await = Some(browser.clone());

        self.sync_tabs(&browser).await;

        let manager = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(TAB_POLL_INTERVAL_MS)).await;
                let Some(browser) = manager.browser.read().await.clone() else {
                    break;
                };
                manager.sync_tabs(&browser).await;
            }
        });

        Ok(())
    }

    pub async fn shutdown(&self) {
        self.browser.write().await.take();
        self.tabs.write().await.clear();
    }

    /// Reconciles the tab registry with the browser's current page list:
    /// new pages are adopted, vanished pages are treated as closed tabs.
    async fn sync_tabs(self: &Arc<Self>, browser: &Arc<Browser>) {
        let Ok(targets) = self.page_targets().await else {
            return;
        };

        let live_ids: Vec<String> = targets.iter().map(|t| t.id.inner().to_string()).collect();

        for target in targets {
            let target_id = target.id.inner().to_string();
            if self.tabs.read().await.contains_key(&target_id) {
                continue;
            }

            match browser.get_page(target.id.clone()).await {
                Ok(page) => {
                    let page = Arc::new(page);
                    let tab = self.next_tab.fetch_add(1, Ordering::SeqCst);

                    if let Err(e) = self.capture.attach(&page, tab).await {
                        tracing::warn!(tab, error = %e, "failed to attach capture listeners");
                        continue;
                    }
                    if let Err(e) = self.host.register_page(tab, page).await {
                        tracing::warn!(tab, error = %e, "failed to enable interception");
                        continue;
                    }

                    self.tabs.write().await.insert(target_id, tab);
                    tracing::info!(tab, url = %target.url, "adopted tab");
                }
                Err(e) => {
                    tracing::debug!(target = %target_id, error = %e, "failed to open target");
                }
            }
        }

        let closed: Vec<(String, TabId)> = self
            .tabs
            .read()
            .await
            .iter()
            .filter(|(target_id, _)| !live_ids.contains(target_id))
            .map(|(target_id, tab)| (target_id.clone(), *tab))
            .collect();

        for (target_id, tab) in closed {
            self.tabs.write().await.remove(&target_id);
            self.host.remove_page(tab).await;
            self.capture.lifecycle.on_tab_removed(tab).await;
        }
    }

    async fn page_targets(&self) -> Result<Vec<PageTarget>> {
        let url = format!("http://127.0.0.1:{}/json/list", self.config.browser.port);

        let response: Vec<PageTarget> = reqwest::Client::new()
            .get(&url)
            .send()
            .await
            .map_err(|_| EditorError::ConnectionLost)?
            .json()
            .await
            .map_err(|_| EditorError::ConnectionLost)?;

        Ok(response
            .into_iter()
            .filter(|t| t.target_type == "page")
            .collect())
    }

    async fn connect_to_existing(&self, port: u16) -> Result<Arc<Browser>> {
        let url = format!("http://127.0.0.1:{}/json/version", port);

        let response: serde_json::Value = reqwest::Client::new()
            .get(&url)
            .send()
            .await
            .map_err(|_| EditorError::ConnectionLost)?
            .json()
            .await
            .map_err(|_| EditorError::ConnectionLost)?;

        let ws_url = response
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or(EditorError::ConnectionLost)?;

        let (browser, mut handler) = Browser::connect(ws_url)
            .await
            .map_err(|_| EditorError::ConnectionLost)?;

        tokio::spawn(async move { while handler.next().await.is_some() {} });

        tracing::info!(port, "connected to running browser");
        Ok(Arc::new(browser))
    }

    async fn launch(&self) -> Result<Arc<Browser>> {
        let chrome_path = self
            .config
            .browser
            .chrome_path
            .clone()
            .map(Ok)
            .unwrap_or_else(find_chrome_executable)?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&chrome_path)
            .port(self.config.browser.port);

        if !self.config.browser.headless {
            builder = builder.with_head();
        }

        if let Some(ref dir) = self.config.browser.user_data_dir {
            builder = builder.user_data_dir(dir);
        }

        let config = builder
            .build()
            .map_err(|e| EditorError::LaunchFailed(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| EditorError::LaunchFailed(e.to_string()))?;

        tokio::spawn(async move { while handler.next().await.is_some() {} });

        tracing::info!(port = self.config.browser.port, "launched browser");
        Ok(Arc::new(browser))
    }
}

pub fn find_chrome_executable() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    let locations = [
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
    ];
    #[cfg(target_os = "macos")]
    let locations = [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    let locations: [&str; 0] = [];

    for location in &locations {
        let path = PathBuf::from(location);
        if path.exists() {
            return Ok(path);
        }
    }

    for binary in ["google-chrome", "chromium", "chromium-browser", "chrome"] {
        if let Ok(path) = which::which(binary) {
            return Ok(path);
        }
    }

    Err(EditorError::LaunchFailed(
        "Could not find Chrome/Chromium executable. Please specify with --chrome-path".into(),
    ))
}
