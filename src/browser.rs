use std::time::Duration;

use chromiumoxide::browser::{Browser as CrBrowser, BrowserConfig as CrBrowserConfig};
use chromiumoxide::handler::viewport::Viewport;
use futures::StreamExt;
use serde::Deserialize;

use crate::config::{BrowserBuilder, BrowserConfig};
use crate::error::{Error, Result};
use crate::page::Page;

/// Chrome flags that improve performance without affecting functionality.
const PERF_ARGS: &[&str] = &[
    "disable-gpu",
    "disable-extensions",
    "metrics-recording-only",
    "mute-audio",
    "no-default-browser-check",
    "disable-client-side-phishing-detection",
    "disable-popup-blocking",
    "disable-prompt-on-repost",
];

const BROWSERBASE_SESSIONS_URL: &str = "https://api.browserbase.com/v1/sessions";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrowserbaseSession {
    connect_url: String,
}

/// One browser session. Each HTTP request gets its own instance; nothing is
/// shared across requests.
pub struct Browser {
    browser: CrBrowser,
    default_timeout: Duration,
    _handler_task: tokio::task::JoinHandle<()>,
}

impl Browser {
    /// Create a new BrowserBuilder for configuring and launching a browser.
    pub fn builder() -> BrowserBuilder {
        BrowserBuilder::new()
    }

    /// Launch a local Chrome instance with the given configuration.
    pub async fn launch(config: BrowserConfig) -> Result<Self> {
        let mut builder = CrBrowserConfig::builder();

        if config.headless {
            builder = builder.new_headless_mode().no_sandbox();
        } else {
            builder = builder.with_head().no_sandbox();
        }

        for arg in PERF_ARGS {
            builder = builder.arg(*arg);
        }

        if let Some(ref path) = config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        builder = builder.viewport(Viewport {
            width: config.viewport_width,
            height: config.viewport_height,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: false,
            has_touch: false,
        });

        let cr_config = builder
            .build()
            .map_err(|e| Error::LaunchError(e.to_string()))?;

        let (browser, mut handler) = CrBrowser::launch(cr_config)
            .await
            .map_err(|e| Error::LaunchError(e.to_string()))?;

        tracing::debug!(
            headless = config.headless,
            width = config.viewport_width,
            height = config.viewport_height,
            "launched local browser"
        );

        let handler_task = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        Ok(Self {
            browser,
            default_timeout: config.default_timeout,
            _handler_task: handler_task,
        })
    }

    /// Connect to a remote Browserbase session: create a session through the
    /// REST API, then attach over the returned CDP websocket URL. The remote
    /// viewport is set through the session parameters.
    pub async fn connect_browserbase(
        project_id: &str,
        api_key: &str,
        viewport: (u32, u32),
        default_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::new();
        let response = client
            .post(BROWSERBASE_SESSIONS_URL)
            .header("X-BB-API-Key", api_key)
            .json(&serde_json::json!({
                "projectId": project_id,
                "browserSettings": {
                    "viewport": { "width": viewport.0, "height": viewport.1 },
                    "blockAds": true,
                },
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::LaunchError(format!(
                "Browserbase session create failed ({status}): {body}"
            )));
        }

        let session: BrowserbaseSession = response.json().await?;

        let (browser, mut handler) = CrBrowser::connect(&session.connect_url)
            .await
            .map_err(|e| Error::LaunchError(e.to_string()))?;

        tracing::debug!(project_id, "connected to Browserbase session");

        let handler_task = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        Ok(Self {
            browser,
            default_timeout,
            _handler_task: handler_task,
        })
    }

    /// Open a new page (tab) navigated to the given URL.
    pub async fn new_page(&self, url: &str) -> Result<Page> {
        let cr_page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?;
        Ok(Page::new(cr_page, self.default_timeout))
    }

    /// Shut the browser down and release its process.
    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await?;
        self._handler_task.abort();
        Ok(())
    }
}
