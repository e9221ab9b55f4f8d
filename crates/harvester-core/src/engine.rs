//! The record generator.
//!
//! [`ScrapeEngine`] owns the browser session and drives the poll loop: drain
//! the interception buffers, stimulate the page so the upstream service issues
//! its next data call, graft periodically, sleep, hibernate when rate limited.
//! Records are pulled one at a time with [`ScrapeEngine::next_record`] or
//! consumed as a stream via [`ScrapeEngine::into_stream`].
//!
//! # Navigation retry policy
//!
//! Before the first successful start, navigation is attempted
//! `navigation_attempts` times and exhaustion is fatal. After the engine has
//! started once (relaunches caused by grafting or a dead page), navigation is
//! retried without bound, trading a possible stall for mid-run resilience.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::Stream;
use tokio_util::sync::CancellationToken;

use crate::config::ScrapeConfig;
use crate::error::HarvestError;
use crate::hibernate::Hibernator;
use crate::models::Record;
use crate::paginator::Paginator;
use crate::pipeline::InterceptionPipeline;
use crate::status::{EngineState, NullReporter, Progress, ScrapeEvent, ScrapeReporter};
use crate::target::ResourceTarget;
use crate::traits::{BrowserLauncher, BrowserSession};
use crate::util::random_point;

/// Interval at which a paused engine re-checks the pause flag.
const PAUSE_POLL: Duration = Duration::from_millis(500);

/// Keys pressed on every jump.
const JUMP_KEYS: [&str; 3] = ["End", "ArrowUp", "End"];

/// Handle for steering a running engine from other tasks.
#[derive(Debug, Clone, Default)]
pub struct EngineControl {
    cancel: CancellationToken,
    paused: Arc<AtomicBool>,
    hibernator: Hibernator,
}

impl EngineControl {
    /// Toggles the pause flag, returning whether the engine is now paused.
    pub fn pause(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Toggles forced hibernation for the next poll cycle.
    pub fn toggle_hibernation(&self) -> bool {
        self.hibernator.toggle()
    }

    /// Requests a clean shutdown once buffered records have been emitted.
    pub fn force_stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Scrapes one [`ResourceTarget`] through a browser session.
pub struct ScrapeEngine<L, R = NullReporter>
where
    L: BrowserLauncher,
    R: ScrapeReporter,
{
    launcher: L,
    target: ResourceTarget,
    config: ScrapeConfig,
    reporter: R,
    label: String,
    pipeline: InterceptionPipeline,
    paginator: Paginator,
    control: EngineControl,
    session: Option<L::Session>,
    started: bool,
    stopped: bool,
    jumps: u64,
}

impl<L: BrowserLauncher> ScrapeEngine<L, NullReporter> {
    /// Create an engine that discards status events.
    pub fn new(launcher: L, target: ResourceTarget, config: ScrapeConfig) -> Self {
        let control = EngineControl::default();
        let paginator = Paginator::new(target.clone(), &config, control.hibernator.clone());
        Self {
            launcher,
            label: target.label(),
            target,
            config,
            reporter: NullReporter,
            pipeline: InterceptionPipeline::new(),
            paginator,
            control,
            session: None,
            started: false,
            stopped: false,
            jumps: 0,
        }
    }
}

impl<L, R> ScrapeEngine<L, R>
where
    L: BrowserLauncher,
    R: ScrapeReporter,
{
    /// Replace the status sink.
    pub fn with_reporter<R2: ScrapeReporter>(self, reporter: R2) -> ScrapeEngine<L, R2> {
        ScrapeEngine {
            launcher: self.launcher,
            target: self.target,
            config: self.config,
            reporter,
            label: self.label,
            pipeline: self.pipeline,
            paginator: self.paginator,
            control: self.control,
            session: self.session,
            started: self.started,
            stopped: self.stopped,
            jumps: self.jumps,
        }
    }

    pub fn control(&self) -> EngineControl {
        self.control.clone()
    }

    pub fn emitted(&self) -> usize {
        self.paginator.emitted()
    }

    pub fn jumps(&self) -> u64 {
        self.jumps
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_finished(&self) -> bool {
        self.paginator.is_finished()
    }

    /// Pulls the next record, starting the session on first use.
    ///
    /// Returns `Ok(None)` once upstream pagination is exhausted, the cap is
    /// reached or a stop was requested, and keeps returning it afterwards.
    pub async fn next_record(&mut self) -> Result<Option<Record>, HarvestError> {
        if self.stopped {
            return Ok(None);
        }
        if !self.started {
            if let Err(e) = self.start().await {
                self.stopped = true;
                return Err(e);
            }
        }

        loop {
            if let Some(record) = self.paginator.output().pop() {
                return Ok(Some(record));
            }
            if self.paginator.is_finished() || self.control.is_stopped() {
                self.shutdown().await;
                return Ok(None);
            }
            self.fetch_more().await?;
        }
    }

    /// Consumes the engine into a stream of records.
    ///
    /// A fatal error is yielded once and ends the stream.
    pub fn into_stream(self) -> impl Stream<Item = Result<Record, HarvestError>> {
        futures::stream::unfold(Some(self), |engine| async move {
            let mut engine = engine?;
            match engine.next_record().await {
                Ok(Some(record)) => Some((Ok(record), Some(engine))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    async fn start(&mut self) -> Result<(), HarvestError> {
        self.progress(EngineState::Starting, 0);
        self.open_session().await?;
        self.started = true;
        Ok(())
    }

    /// One poll cycle.
    async fn fetch_more(&mut self) -> Result<(), HarvestError> {
        self.drain().await;
        if self.paginator.is_finished() || self.control.is_stopped() {
            return Ok(());
        }

        self.wait_while_paused().await;
        if self.control.is_stopped() {
            return Ok(());
        }

        self.jump().await?;
        self.maybe_graft().await?;

        self.progress(EngineState::Running, 0);
        self.sleep(self.config.poll_interval, EngineState::Sleeping)
            .await;

        if self.control.hibernator.take() {
            self.reporter.report(ScrapeEvent::Hibernating {
                seconds: self.config.hibernation.as_secs(),
            });
            self.sleep(self.config.hibernation, EngineState::Hibernating)
                .await;
        }
        Ok(())
    }

    /// Hands both buffers to the paginator, requests first.
    async fn drain(&mut self) {
        let Some(session) = self.session.as_ref() else {
            self.pipeline.clear();
            return;
        };
        let requests = self.pipeline.drain_requests();
        self.paginator
            .process_requests(session, requests, &self.reporter)
            .await;
        let responses = self.pipeline.drain_responses();
        self.paginator
            .process_responses(session, responses, &self.reporter)
            .await;
    }

    /// Key presses plus a random pointer move; a dead page gets relaunched.
    async fn jump(&mut self) -> Result<(), HarvestError> {
        let result = match self.session.as_ref() {
            Some(session) => stimulate(session, self.config.viewport).await,
            None => Err(HarvestError::Browser("no live browser session".into())),
        };
        self.jumps += 1;

        if let Err(e) = result {
            tracing::warn!(error = %e, jumps = self.jumps, "Page stimulation failed, relaunching");
            self.restart_session().await?;
        }
        Ok(())
    }

    async fn maybe_graft(&mut self) -> Result<(), HarvestError> {
        if !self.config.graft || self.jumps % self.config.graft_every.max(1) != 0 {
            return Ok(());
        }
        if !self.paginator.begin_graft() {
            tracing::debug!(jumps = self.jumps, "No request template captured yet, graft skipped");
            return Ok(());
        }
        self.reporter
            .report(ScrapeEvent::GraftStarted { jumps: self.jumps });
        self.progress(EngineState::Grafting, 0);
        self.restart_session().await
    }

    async fn wait_while_paused(&self) {
        let mut announced = false;
        while self.control.is_paused() && !self.control.is_stopped() {
            if !announced {
                self.reporter.report(ScrapeEvent::Paused);
                announced = true;
            }
            self.progress(EngineState::Paused, 0);
            tokio::select! {
                () = tokio::time::sleep(PAUSE_POLL) => {}
                () = self.control.cancel.cancelled() => break,
            }
        }
    }

    /// Launches, intercepts and navigates, honouring the retry policy.
    async fn open_session(&mut self) -> Result<(), HarvestError> {
        let url = self.target.url()?;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.try_open(&url).await {
                Ok(session) => {
                    self.session = Some(session);
                    self.reporter
                        .report(ScrapeEvent::SessionStarted { url: &url });
                    return Ok(());
                }
                Err(e) => {
                    let error = e.to_string();
                    self.reporter.report(ScrapeEvent::NavigationFailed {
                        attempt,
                        error: &error,
                    });
                    if !self.started && attempt >= self.config.navigation_attempts {
                        return Err(HarvestError::NavigationExhausted {
                            url,
                            attempts: attempt,
                        });
                    }
                    if !self
                        .sleep(self.config.navigation_backoff, EngineState::Starting)
                        .await
                    {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn try_open(&self, url: &str) -> Result<L::Session, HarvestError> {
        let mut session = self
            .launcher
            .launch(&self.config.launch_options())
            .await?;

        let prepared = match session
            .intercept(&self.pipeline, &self.target.api.glob())
            .await
        {
            Ok(()) => session.navigate(url).await,
            Err(e) => Err(e),
        };

        match prepared {
            Ok(()) => Ok(session),
            Err(e) => {
                if let Err(close_err) = session.close().await {
                    tracing::debug!(error = %close_err, "Failed to close broken session");
                }
                // After close, so events delivered during teardown go too.
                self.pipeline.clear();
                Err(e)
            }
        }
    }

    async fn restart_session(&mut self) -> Result<(), HarvestError> {
        self.close_session().await;
        self.open_session().await
    }

    async fn close_session(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                tracing::warn!(error = %e, "Failed to close browser session");
            }
        }
        self.pipeline.clear();
    }

    async fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.close_session().await;
        self.progress(EngineState::Finished, 0);
        self.reporter.report(ScrapeEvent::Finished {
            emitted: self.paginator.emitted(),
        });
    }

    /// Sleeps in one-second slices, reporting the remaining time.
    ///
    /// Returns `false` if a stop was requested meanwhile.
    async fn sleep(&self, duration: Duration, state: EngineState) -> bool {
        let mut remaining = duration;
        loop {
            self.progress(state, ceil_secs(remaining));
            if remaining.is_zero() {
                return !self.control.is_stopped();
            }
            let step = remaining.min(Duration::from_secs(1));
            tokio::select! {
                () = tokio::time::sleep(step) => {}
                () = self.control.cancel.cancelled() => return false,
            }
            remaining -= step;
        }
    }

    fn progress(&self, state: EngineState, sleep_remaining: u64) {
        if self.config.silent {
            return;
        }
        self.reporter.report(ScrapeEvent::Progress(Progress {
            resource: &self.label,
            total: self.config.total,
            state,
            sleep_remaining,
            emitted: self.paginator.emitted(),
        }));
    }
}

async fn stimulate<S: BrowserSession>(session: &S, viewport: (u32, u32)) -> Result<(), HarvestError> {
    for key in JUMP_KEYS {
        session.press_key(key).await?;
    }
    let (x, y) = random_point(viewport.0, viewport.1);
    session.move_pointer(x, y).await
}

fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}
