use std::fmt;

/// Coarse engine state shown in progress updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Starting,
    Running,
    Paused,
    Sleeping,
    Hibernating,
    Grafting,
    Finished,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Starting => "starting",
            EngineState::Running => "running",
            EngineState::Paused => "paused",
            EngineState::Sleeping => "sleeping",
            EngineState::Hibernating => "hibernating",
            EngineState::Grafting => "grafting",
            EngineState::Finished => "finished",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot rendered as the one-line status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress<'a> {
    pub resource: &'a str,
    pub total: usize,
    pub state: EngineState,
    pub sleep_remaining: u64,
    pub emitted: usize,
}

impl fmt::Display for Progress<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = if self.total == 0 {
            "unlimited".to_string()
        } else {
            self.total.to_string()
        };
        write!(
            f,
            "{} | total: {} | state: {} | sleep: {}s | emitted: {}",
            self.resource, total, self.state, self.sleep_remaining, self.emitted
        )
    }
}

/// Events emitted by the engine for monitoring/logging.
#[derive(Debug, Clone)]
pub enum ScrapeEvent<'a> {
    SessionStarted {
        url: &'a str,
    },
    NavigationFailed {
        attempt: u32,
        error: &'a str,
    },
    RequestFailed {
        url: &'a str,
        error: &'a str,
    },
    ResponseSkipped {
        url: &'a str,
        reason: &'a str,
    },
    Duplicate {
        id: &'a str,
    },
    RateLimited {
        url: &'a str,
    },
    Hibernating {
        seconds: u64,
    },
    Paused,
    GraftStarted {
        jumps: u64,
    },
    GraftCompleted,
    DetailFetchFailed {
        id: &'a str,
        error: &'a str,
    },
    Progress(Progress<'a>),
    Finished {
        emitted: usize,
    },
}

impl ScrapeEvent<'_> {
    /// Stable event name, handy for assertions and metrics keys.
    pub fn name(&self) -> &'static str {
        match self {
            ScrapeEvent::SessionStarted { .. } => "session_started",
            ScrapeEvent::NavigationFailed { .. } => "navigation_failed",
            ScrapeEvent::RequestFailed { .. } => "request_failed",
            ScrapeEvent::ResponseSkipped { .. } => "response_skipped",
            ScrapeEvent::Duplicate { .. } => "duplicate",
            ScrapeEvent::RateLimited { .. } => "rate_limited",
            ScrapeEvent::Hibernating { .. } => "hibernating",
            ScrapeEvent::Paused => "paused",
            ScrapeEvent::GraftStarted { .. } => "graft_started",
            ScrapeEvent::GraftCompleted => "graft_completed",
            ScrapeEvent::DetailFetchFailed { .. } => "detail_fetch_failed",
            ScrapeEvent::Progress(_) => "progress",
            ScrapeEvent::Finished { .. } => "finished",
        }
    }
}

/// Trait for receiving scrape events (decoupled logging and status output).
pub trait ScrapeReporter: Send + Sync {
    fn report(&self, event: ScrapeEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl ScrapeReporter for NullReporter {}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ScrapeReporter for TracingReporter {
    fn report(&self, event: ScrapeEvent<'_>) {
        match event {
            ScrapeEvent::SessionStarted { url } => {
                tracing::info!(%url, "Browser session started");
            }
            ScrapeEvent::NavigationFailed { attempt, error } => {
                tracing::error!(%attempt, %error, "Failed to visit resource");
            }
            ScrapeEvent::RequestFailed { url, error } => {
                tracing::warn!(%url, %error, "Request failed");
            }
            ScrapeEvent::ResponseSkipped { url, reason } => {
                tracing::warn!(%url, %reason, "Response skipped");
            }
            ScrapeEvent::Duplicate { id } => {
                tracing::debug!(%id, "Duplicate record skipped");
            }
            ScrapeEvent::RateLimited { url } => {
                tracing::warn!(%url, "Rate limited, hibernation scheduled");
            }
            ScrapeEvent::Hibernating { seconds } => {
                tracing::warn!(%seconds, "Hibernating");
            }
            ScrapeEvent::Paused => {
                tracing::debug!("Paused");
            }
            ScrapeEvent::GraftStarted { jumps } => {
                tracing::info!(%jumps, "Grafting browser session");
            }
            ScrapeEvent::GraftCompleted => {
                tracing::info!("Graft complete");
            }
            ScrapeEvent::DetailFetchFailed { id, error } => {
                tracing::warn!(%id, %error, "Detail fetch failed, retrying");
            }
            ScrapeEvent::Progress(progress) => {
                tracing::trace!(%progress, "Progress");
            }
            ScrapeEvent::Finished { emitted } => {
                tracing::info!(%emitted, "Scrape finished");
            }
        }
    }
}
