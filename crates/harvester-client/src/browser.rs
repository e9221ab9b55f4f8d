use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::fetch::{
    self, ContinueRequestParams, EventRequestPaused, HeaderEntry, RequestPattern, RequestStage,
};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams, DispatchMouseEventType,
};
use chromiumoxide::cdp::browser_protocol::network::{
    self, EventLoadingFailed, EventResponseReceived, GetResponseBodyParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use harvester_core::config::LaunchOptions;
use harvester_core::error::HarvestError;
use harvester_core::models::{
    Headers, InterceptedRequest, InterceptedResponse, RequestDisposition,
};
use harvester_core::pipeline::InterceptionPipeline;
use harvester_core::traits::{BrowserLauncher, BrowserSession};
use serde_json::Value;
use tokio::task::JoinHandle;

/// Launches Chromium through the Chrome DevTools Protocol.
///
/// Each [`BrowserLauncher::launch`] call starts a fresh browser process
/// with one blank tab; the engine relaunches on every graft, so nothing
/// is shared between sessions.
///
/// # Example
///
/// ```rust,no_run
/// use harvester_client::ChromiumLauncher;
/// use harvester_core::{ScrapeConfig, ScrapeEngine, ResourceTarget};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let target = ResourceTarget::tag("rust");
/// let mut engine = ScrapeEngine::new(ChromiumLauncher::new(), target, ScrapeConfig::default());
/// while let Some(record) = engine.next_record().await? {
///     println!("{}", record.id);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    timeout: Duration,
}

impl ChromiumLauncher {
    /// A launcher whose CDP commands and detail-page loads time out after **30 s**.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// A launcher with a custom command timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Tries to locate the real Chrome/Chromium binary.
    ///
    /// The snap wrapper at `/snap/bin/chromium` strips unknown CLI flags,
    /// so the binary inside the snap is preferred, then well-known system
    /// paths. `None` lets `chromiumoxide` do its own lookup.
    fn find_chrome_binary() -> Option<PathBuf> {
        let candidates: &[&str] = &[
            "/snap/chromium/current/usr/lib/chromium-browser/chrome",
            "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
        ];

        if let Ok(p) = std::env::var("CHROME_BIN") {
            let path = PathBuf::from(&p);
            if path.exists() {
                return Some(path);
            }
        }

        candidates.iter().map(PathBuf::from).find(|p| p.exists())
    }

    fn browser_config(&self, options: &LaunchOptions) -> Result<BrowserConfig, HarvestError> {
        let (width, height) = options.viewport;
        let mut builder = BrowserConfig::builder()
            .disable_default_args()
            .window_size(width, height)
            .request_timeout(self.timeout);

        if let Some(bin) = Self::find_chrome_binary() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }
        if options.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }
        if options.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(proxy) = &options.proxy {
            builder = builder.arg(format!("--proxy-server={proxy}"));
        }

        builder
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--disable-translate")
            .arg("--no-first-run")
            .build()
            .map_err(|e| HarvestError::Browser(format!("Browser config error: {e}")))
    }
}

impl Default for ChromiumLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserLauncher for ChromiumLauncher {
    type Session = ChromiumSession;

    async fn launch(&self, options: &LaunchOptions) -> Result<ChromiumSession, HarvestError> {
        let config = self.browser_config(options)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| HarvestError::Browser(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(HarvestError::Browser(format!("Failed to open page: {e}")));
            }
        };

        Ok(ChromiumSession {
            browser,
            page,
            timeout: self.timeout,
            tasks: vec![handler_task],
        })
    }
}

/// A live Chromium process and the tab that drives interception.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    timeout: Duration,
    tasks: Vec<JoinHandle<()>>,
}

impl ChromiumSession {
    async fn listen_requests(
        &self,
        pipeline: InterceptionPipeline,
    ) -> Result<JoinHandle<()>, HarvestError> {
        let mut events = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(|e| HarvestError::Interception(e.to_string()))?;
        Ok(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                pipeline.on_request(InterceptedRequest {
                    id: event.request_id.inner().clone(),
                    url: event.request.url.clone(),
                    method: event.request.method.clone(),
                    headers: header_map(event.request.headers.inner()),
                });
            }
        }))
    }

    async fn listen_responses(
        &self,
        pipeline: InterceptionPipeline,
    ) -> Result<JoinHandle<()>, HarvestError> {
        let mut events = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| HarvestError::Interception(e.to_string()))?;
        Ok(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                pipeline.on_response(InterceptedResponse {
                    request_id: event.request_id.inner().clone(),
                    url: event.response.url.clone(),
                    status: u16::try_from(event.response.status).unwrap_or(0),
                });
            }
        }))
    }

    async fn listen_failures(
        &self,
        pipeline: InterceptionPipeline,
    ) -> Result<JoinHandle<()>, HarvestError> {
        let mut events = self
            .page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(|e| HarvestError::Interception(e.to_string()))?;
        Ok(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                pipeline.on_request_failed(event.request_id.inner(), &event.error_text);
            }
        }))
    }
}

impl BrowserSession for ChromiumSession {
    async fn intercept(
        &mut self,
        pipeline: &InterceptionPipeline,
        url_glob: &str,
    ) -> Result<(), HarvestError> {
        // Listeners first, so no event fired after enabling is missed.
        let requests = self.listen_requests(pipeline.clone()).await?;
        self.tasks.push(requests);
        let responses = self.listen_responses(pipeline.clone()).await?;
        self.tasks.push(responses);
        let failures = self.listen_failures(pipeline.clone()).await?;
        self.tasks.push(failures);

        self.page
            .execute(network::EnableParams::default())
            .await
            .map_err(|e| HarvestError::Interception(format!("Network.enable failed: {e}")))?;

        let pattern = RequestPattern::builder()
            .url_pattern(url_glob)
            .request_stage(RequestStage::Request)
            .build();
        self.page
            .execute(fetch::EnableParams::builder().pattern(pattern).build())
            .await
            .map_err(|e| HarvestError::Interception(format!("Fetch.enable failed: {e}")))?;

        tracing::debug!(url_glob, "Request interception enabled");
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<(), HarvestError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| HarvestError::Navigation(format!("Failed to navigate to {url}: {e}")))?;
        Ok(())
    }

    async fn resolve_request(
        &self,
        request: &InterceptedRequest,
        disposition: RequestDisposition,
    ) -> Result<(), HarvestError> {
        let mut params = ContinueRequestParams::new(fetch::RequestId::new(request.id.clone()));
        if let RequestDisposition::Rewrite(template) = disposition {
            params.url = Some(template.url);
            params.headers = Some(header_entries(&template.headers));
        }
        self.page
            .execute(params)
            .await
            .map_err(|e| HarvestError::Interception(format!("Failed to continue {}: {e}", request.url)))?;
        Ok(())
    }

    async fn response_body(&self, response: &InterceptedResponse) -> Result<String, HarvestError> {
        let params = GetResponseBodyParams::new(network::RequestId::new(response.request_id.clone()));
        let body = self
            .page
            .execute(params)
            .await
            .map_err(|e| HarvestError::Browser(format!("Failed to read body of {}: {e}", response.url)))?
            .result;
        if body.base64_encoded {
            return Err(HarvestError::Extraction(format!(
                "Binary response body from {}",
                response.url
            )));
        }
        Ok(body.body)
    }

    async fn press_key(&self, key: &str) -> Result<(), HarvestError> {
        let (code, virtual_key) = key_definition(key);
        for kind in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
            let mut builder = DispatchKeyEventParams::builder()
                .r#type(kind)
                .key(key.to_string())
                .code(code.to_string());
            if let Some(vk) = virtual_key {
                builder = builder
                    .windows_virtual_key_code(vk)
                    .native_virtual_key_code(vk);
            }
            let params = builder.build().map_err(HarvestError::Browser)?;
            self.page
                .execute(params)
                .await
                .map_err(|e| HarvestError::Browser(format!("Key {key} failed: {e}")))?;
        }
        Ok(())
    }

    async fn move_pointer(&self, x: f64, y: f64) -> Result<(), HarvestError> {
        let params = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseMoved)
            .x(x)
            .y(y)
            .build()
            .map_err(HarvestError::Browser)?;
        self.page
            .execute(params)
            .await
            .map_err(|e| HarvestError::Browser(format!("Pointer move failed: {e}")))?;
        Ok(())
    }

    async fn fetch_json(&self, url: &str) -> Result<Value, HarvestError> {
        // Opened blank and outside the timeout so the tab always exists to close.
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| HarvestError::Browser(format!("Failed to open detail tab: {e}")))?;

        let work = async {
            page.goto(url)
                .await
                .map_err(|e| HarvestError::Navigation(format!("Failed to navigate to {url}: {e}")))?;
            let text = page
                .evaluate("document.body.innerText")
                .await
                .map_err(|e| HarvestError::Browser(format!("Failed to read {url}: {e}")))?
                .into_value::<String>()?;
            Ok::<Value, HarvestError>(serde_json::from_str(&text)?)
        };

        let tab = page.clone();
        let close = async move {
            if let Err(e) = tab.close().await {
                tracing::debug!("Failed to close detail tab: {e}");
            }
        };

        run_then_cleanup(self.timeout, work, close).await
    }

    async fn close(mut self) -> Result<(), HarvestError> {
        // Listeners stop first; the handler task must outlive Browser.close.
        for listener in self.tasks.iter().skip(1) {
            listener.abort();
        }
        let _ = self.page.clone().close().await;
        let closed = self
            .browser
            .close()
            .await
            .map_err(|e| HarvestError::Browser(format!("Failed to close browser: {e}")));
        let _ = self.browser.wait().await;
        closed.map(|_| ())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Runs `work` under `timeout`, then `cleanup` whatever the outcome.
pub(crate) async fn run_then_cleanup<T, W, C>(
    timeout: Duration,
    work: W,
    cleanup: C,
) -> Result<T, HarvestError>
where
    W: Future<Output = Result<T, HarvestError>>,
    C: Future<Output = ()>,
{
    let result = tokio::time::timeout(timeout, work).await;
    cleanup.await;
    match result {
        Ok(inner) => inner,
        Err(_) => Err(HarvestError::Timeout(timeout.as_secs())),
    }
}

/// Flattens a CDP header object into a map; non-string values keep their
/// JSON rendering.
pub(crate) fn header_map(headers: &Value) -> Headers {
    headers
        .as_object()
        .map(|object| {
            object
                .iter()
                .map(|(name, value)| {
                    let value = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (name.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn header_entries(headers: &Headers) -> Vec<HeaderEntry> {
    headers
        .iter()
        .map(|(name, value)| HeaderEntry::new(name.clone(), value.clone()))
        .collect()
}

/// DOM `code` and virtual key code for the keys the engine presses.
pub(crate) fn key_definition(key: &str) -> (&str, Option<i64>) {
    match key {
        "End" => ("End", Some(35)),
        "Home" => ("Home", Some(36)),
        "PageUp" => ("PageUp", Some(33)),
        "PageDown" => ("PageDown", Some(34)),
        "ArrowUp" => ("ArrowUp", Some(38)),
        "ArrowDown" => ("ArrowDown", Some(40)),
        "Space" => ("Space", Some(32)),
        _ => (key, None),
    }
}
