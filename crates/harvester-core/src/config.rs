//! Scrape configuration.
//!
//! A [`ScrapeConfig`] is built once, handed to the engine and never mutated
//! afterwards. Every field has a default matching the CLI defaults.
//!
//! ```rust
//! use std::time::Duration;
//! use harvester_core::config::ScrapeConfig;
//!
//! let config = ScrapeConfig::default()
//!     .with_total(500)
//!     .with_poll_interval(Duration::from_secs(3))
//!     .with_graft(false);
//! assert_eq!(config.total, 500);
//! ```

use std::time::Duration;

/// Environment variable that disables the browser sandbox when truthy.
pub const NO_SANDBOX_ENV: &str = "HARVESTER_NO_SANDBOX";

/// Immutable configuration for one scrape session.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Maximum number of records to emit. `0` means unlimited.
    pub total: usize,

    /// Run the browser without a visible window.
    pub headless: bool,

    /// Suppress progress events.
    pub silent: bool,

    /// Sleep between two poll cycles.
    pub poll_interval: Duration,

    /// Sleep applied once after a rate-limit signal.
    pub hibernation: Duration,

    /// Periodically relaunch the browser and replay the last request template.
    pub graft: bool,

    /// Number of jumps between two grafts.
    pub graft_every: u64,

    /// Visit each record's detail page and emit the richer payload instead.
    pub full_detail: bool,

    /// Proxy server handed to the browser (`host:port` or a full URL).
    pub proxy: Option<String>,

    /// Navigation attempts allowed before the engine has started once.
    pub navigation_attempts: u32,

    /// Wait between two navigation attempts.
    pub navigation_backoff: Duration,

    /// Maximum number of detail pages fetched concurrently.
    pub detail_concurrency: usize,

    /// Wait between two attempts at the same detail page.
    pub detail_backoff: Duration,

    /// Browser window size used for pointer stimulation.
    pub viewport: (u32, u32),
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            total: 0,
            headless: true,
            silent: false,
            poll_interval: Duration::from_secs(2),
            hibernation: Duration::from_secs(1200),
            graft: true,
            graft_every: 100,
            full_detail: false,
            proxy: None,
            navigation_attempts: 3,
            navigation_backoff: Duration::from_secs(60),
            detail_concurrency: 4,
            detail_backoff: Duration::from_secs(5),
            viewport: (800, 600),
        }
    }
}

impl ScrapeConfig {
    pub fn with_total(mut self, total: usize) -> Self {
        self.total = total;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_hibernation(mut self, hibernation: Duration) -> Self {
        self.hibernation = hibernation;
        self
    }

    pub fn with_graft(mut self, graft: bool) -> Self {
        self.graft = graft;
        self
    }

    /// Set the number of jumps between grafts. Zero is clamped to one.
    pub fn with_graft_every(mut self, jumps: u64) -> Self {
        self.graft_every = jumps.max(1);
        self
    }

    pub fn with_full_detail(mut self, full_detail: bool) -> Self {
        self.full_detail = full_detail;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_navigation_retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.navigation_attempts = attempts.max(1);
        self.navigation_backoff = backoff;
        self
    }

    pub fn with_detail_fetching(mut self, concurrency: usize, backoff: Duration) -> Self {
        self.detail_concurrency = concurrency.max(1);
        self.detail_backoff = backoff;
        self
    }

    /// Browser launch options derived from this config and the environment.
    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            headless: self.headless,
            proxy: self.proxy.clone(),
            no_sandbox: sandbox_disabled(),
            viewport: self.viewport,
        }
    }
}

/// Options a [`crate::traits::BrowserLauncher`] applies when starting a browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    pub headless: bool,
    pub proxy: Option<String>,
    pub no_sandbox: bool,
    pub viewport: (u32, u32),
}

/// Reads [`NO_SANDBOX_ENV`] from the process environment.
pub fn sandbox_disabled() -> bool {
    std::env::var(NO_SANDBOX_ENV)
        .map(|v| is_truthy(&v))
        .unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
