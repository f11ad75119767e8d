use std::path::PathBuf;
use std::time::Duration;

use crate::browser::Browser;
use crate::error::Result;

/// Where the browser session lives for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeEnv {
    #[default]
    Local,
    Browserbase,
}

impl RuntimeEnv {
    /// Parse the `STAGEHAND_ENV` value. Anything other than "BROWSERBASE"
    /// (case-insensitive) means a locally launched browser.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("BROWSERBASE") => Self::Browserbase,
            _ => Self::Local,
        }
    }
}

/// Service configuration read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: Option<String>,
    pub model: String,
    pub runtime_env: RuntimeEnv,
    pub browserbase_project_id: Option<String>,
    pub browserbase_api_key: Option<String>,
    pub port: u16,
    /// When set, a screenshot of the final page state is persisted under
    /// this directory and its location returned in the response.
    pub screenshot_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            model: "gpt-5".to_string(),
            runtime_env: RuntimeEnv::Local,
            browserbase_project_id: None,
            browserbase_api_key: None,
            port: 8080,
            screenshot_dir: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            openai_api_key: lookup("OPENAI_API_KEY").filter(|v| !v.is_empty()),
            model: lookup("OPENAI_MODEL").unwrap_or(defaults.model),
            runtime_env: RuntimeEnv::parse(lookup("STAGEHAND_ENV").as_deref()),
            browserbase_project_id: lookup("BROWSERBASE_PROJECT_ID"),
            browserbase_api_key: lookup("BROWSERBASE_API_KEY"),
            port: lookup("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            screenshot_dir: lookup("SCREENSHOT_DIR").map(PathBuf::from),
        }
    }
}

pub struct BrowserConfig {
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub chrome_path: Option<String>,
    /// Default timeout for operations like `wait_for_selector` (default: 30s).
    pub default_timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
            chrome_path: None,
            default_timeout: Duration::from_secs(30),
        }
    }
}

pub struct BrowserBuilder {
    config: BrowserConfig,
}

impl BrowserBuilder {
    pub fn new() -> Self {
        Self {
            config: BrowserConfig::default(),
        }
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.viewport_width = width;
        self.config.viewport_height = height;
        self
    }

    pub fn chrome_path(mut self, path: impl Into<String>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    /// Set the default timeout for operations like `wait_for_selector`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    pub fn build_config(self) -> BrowserConfig {
        self.config
    }

    pub async fn build(self) -> Result<Browser> {
        Browser::launch(self.build_config()).await
    }
}

impl Default for BrowserBuilder {
    fn default() -> Self {
        Self::new()
    }
}
