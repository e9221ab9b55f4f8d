use crate::buffer::LockedBuffer;
use crate::models::{InterceptedRequest, InterceptedResponse};

/// Buffers filled by the browser's interception callbacks.
///
/// Callbacks run on the automation runtime's event tasks and only ever push;
/// the poll loop is the sole consumer and drains each buffer whole.
#[derive(Clone, Default)]
pub struct InterceptionPipeline {
    requests: LockedBuffer<InterceptedRequest>,
    responses: LockedBuffer<InterceptedResponse>,
}

impl InterceptionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outgoing request callback.
    pub fn on_request(&self, request: InterceptedRequest) {
        tracing::trace!(url = %request.url, "Request intercepted");
        self.requests.push(request);
    }

    /// Incoming response callback.
    pub fn on_response(&self, response: InterceptedResponse) {
        tracing::trace!(url = %response.url, status = response.status, "Response captured");
        self.responses.push(response);
    }

    /// Failed request callback. Failures are logged, never buffered.
    pub fn on_request_failed(&self, request_id: &str, error: &str) {
        tracing::warn!(%request_id, %error, "Request failed in browser");
    }

    pub fn drain_requests(&self) -> Vec<InterceptedRequest> {
        self.requests.drain()
    }

    pub fn drain_responses(&self) -> Vec<InterceptedResponse> {
        self.responses.drain()
    }

    /// Drops everything buffered, e.g. before the session is torn down.
    pub fn clear(&self) {
        self.requests.clear();
        self.responses.clear();
    }

    pub fn pending(&self) -> (usize, usize) {
        (self.requests.len(), self.responses.len())
    }
}
