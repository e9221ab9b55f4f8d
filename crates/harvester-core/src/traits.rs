use std::future::Future;

use crate::config::LaunchOptions;
use crate::error::HarvestError;
use crate::models::{InterceptedRequest, InterceptedResponse, RequestDisposition};
use crate::pipeline::InterceptionPipeline;

/// Starts automation-driven browsers.
pub trait BrowserLauncher: Send + Sync {
    type Session: BrowserSession;

    /// Launches a browser with one blank page.
    fn launch(
        &self,
        options: &LaunchOptions,
    ) -> impl Future<Output = Result<Self::Session, HarvestError>> + Send;
}

/// One live browser and the page that drives interception.
pub trait BrowserSession: Send + Sync {
    /// Enables interception of requests whose URL matches `url_glob` and
    /// starts feeding requests, responses and failures into `pipeline`.
    ///
    /// Every request pushed into the pipeline stays paused until
    /// [`resolve_request`](Self::resolve_request) is called for it.
    fn intercept(
        &mut self,
        pipeline: &InterceptionPipeline,
        url_glob: &str,
    ) -> impl Future<Output = Result<(), HarvestError>> + Send;

    /// Navigates the page to `url`.
    fn navigate(&mut self, url: &str) -> impl Future<Output = Result<(), HarvestError>> + Send;

    /// Releases a paused request.
    fn resolve_request(
        &self,
        request: &InterceptedRequest,
        disposition: RequestDisposition,
    ) -> impl Future<Output = Result<(), HarvestError>> + Send;

    /// Reads the body of a captured response.
    fn response_body(
        &self,
        response: &InterceptedResponse,
    ) -> impl Future<Output = Result<String, HarvestError>> + Send;

    /// Presses and releases one key (e.g. `"End"`, `"PageDown"`).
    fn press_key(&self, key: &str) -> impl Future<Output = Result<(), HarvestError>> + Send;

    /// Moves the pointer to viewport coordinates.
    fn move_pointer(&self, x: f64, y: f64)
    -> impl Future<Output = Result<(), HarvestError>> + Send;

    /// Opens `url` in a short-lived secondary page and parses its body as JSON.
    fn fetch_json(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<serde_json::Value, HarvestError>> + Send;

    /// Closes the page and the browser.
    fn close(self) -> impl Future<Output = Result<(), HarvestError>> + Send;
}
