//! Test utilities: mock browser and reporter implementations.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use crate::config::LaunchOptions;
use crate::error::HarvestError;
use crate::models::{InterceptedRequest, InterceptedResponse, RequestDisposition};
use crate::pipeline::InterceptionPipeline;
use crate::status::{ScrapeEvent, ScrapeReporter};
use crate::traits::{BrowserLauncher, BrowserSession};

pub const API_URL: &str = "https://www.instagram.com/graphql/query/?query_hash=abc";

// ---------------------------------------------------------------------------
// Payload builders
// ---------------------------------------------------------------------------

/// A hashtag payload with one envelope per id.
pub fn tag_page(ids: &[&str], has_next: bool) -> Value {
    let edges: Vec<Value> = ids
        .iter()
        .map(|id| json!({"node": {"id": id, "shortcode": format!("sc{id}")}}))
        .collect();
    let cursor = if has_next { json!("QVFDcursor") } else { Value::Null };
    json!({
        "data": {"hashtag": {"edge_hashtag_to_media": {
            "count": ids.len(),
            "page_info": {"has_next_page": has_next, "end_cursor": cursor},
            "edges": edges
        }}},
        "status": "ok"
    })
}

pub fn rate_limited_payload() -> Value {
    json!({"message": "Please wait a few minutes before you try again.", "status": "fail"})
}

/// Detail URL the tag preset builds for an envelope from [`tag_page`].
pub fn detail_url(id: &str) -> String {
    format!("https://www.instagram.com/p/sc{id}/?__a=1&__d=dis")
}

/// A matching data request for page `page`, carrying a page-specific header.
pub fn api_request(id: &str, page: u32) -> InterceptedRequest {
    InterceptedRequest {
        id: id.to_string(),
        url: format!("{API_URL}&page={page}"),
        method: "GET".to_string(),
        headers: [("x-page".to_string(), page.to_string())].into(),
    }
}

pub fn api_response(request_id: &str) -> InterceptedResponse {
    InterceptedResponse {
        request_id: request_id.to_string(),
        url: format!("{API_URL}&rid={request_id}"),
        status: 200,
    }
}

// ---------------------------------------------------------------------------
// MockLauncher / MockSession
// ---------------------------------------------------------------------------

/// Traffic delivered into the pipeline by one jump.
#[derive(Debug, Clone, Default)]
pub struct MockJump {
    pub requests: Vec<InterceptedRequest>,
    pub responses: Vec<InterceptedResponse>,
}

#[derive(Default)]
struct MockState {
    navigation_failures: u32,
    jumps: VecDeque<MockJump>,
    bodies: HashMap<String, String>,
    details: HashMap<String, VecDeque<Result<Value, HarvestError>>>,
    resolved: Vec<(InterceptedRequest, RequestDisposition)>,
    launches: u32,
    closes: u32,
    keys: Vec<String>,
    pointer_moves: Vec<(f64, f64)>,
    late_requests: Vec<InterceptedRequest>,
    next_id: u32,
}

/// Mock launcher whose sessions replay a scripted sequence of jumps.
///
/// Every session shares the launcher's state, so the script continues
/// across relaunches.
#[derive(Clone, Default)]
pub struct MockLauncher {
    state: Arc<Mutex<MockState>>,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` navigations fail.
    pub fn with_navigation_failures(self, n: u32) -> Self {
        self.fail_next_navigations(n);
        self
    }

    pub fn fail_next_navigations(&self, n: u32) {
        self.state.lock().unwrap().navigation_failures = n;
    }

    /// The next session close pushes `request` into the pipeline while
    /// the browser is shutting down.
    pub fn deliver_on_close(&self, request: InterceptedRequest) {
        self.state.lock().unwrap().late_requests.push(request);
    }

    /// Queues a jump delivering one matching request and its response.
    pub fn with_page(self, payload: Value) -> Self {
        let page = {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            state.next_id
        };
        let request_id = format!("req-{page}");
        let request = api_request(&request_id, page);
        self.with_jump(vec![request], vec![(api_response(&request_id), payload.to_string())])
    }

    /// Queues a jump delivering arbitrary traffic; bodies are keyed by the
    /// response's request id.
    pub fn with_jump(
        self,
        requests: Vec<InterceptedRequest>,
        responses: Vec<(InterceptedResponse, String)>,
    ) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let mut jump = MockJump {
                requests,
                responses: Vec::new(),
            };
            for (response, body) in responses {
                state.bodies.insert(response.request_id.clone(), body);
                jump.responses.push(response);
            }
            state.jumps.push_back(jump);
        }
        self
    }

    /// Queues a jump that delivers nothing.
    pub fn with_quiet_jump(self) -> Self {
        self.state.lock().unwrap().jumps.push_back(MockJump::default());
        self
    }

    pub fn with_body(self, request_id: &str, body: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .bodies
            .insert(request_id.to_string(), body.to_string());
        self
    }

    /// Scripts successive results for one detail URL.
    pub fn with_detail(self, url: &str, results: Vec<Result<Value, HarvestError>>) -> Self {
        self.state
            .lock()
            .unwrap()
            .details
            .insert(url.to_string(), results.into());
        self
    }

    /// A session sharing this launcher's state, without counting a launch.
    pub fn session(&self) -> MockSession {
        MockSession {
            state: self.state.clone(),
            pipeline: None,
        }
    }

    pub fn launches(&self) -> u32 {
        self.state.lock().unwrap().launches
    }

    pub fn closes(&self) -> u32 {
        self.state.lock().unwrap().closes
    }

    pub fn resolved(&self) -> Vec<(InterceptedRequest, RequestDisposition)> {
        self.state.lock().unwrap().resolved.clone()
    }

    pub fn keys_pressed(&self) -> Vec<String> {
        self.state.lock().unwrap().keys.clone()
    }

    pub fn pointer_moves(&self) -> Vec<(f64, f64)> {
        self.state.lock().unwrap().pointer_moves.clone()
    }
}

impl BrowserLauncher for MockLauncher {
    type Session = MockSession;

    async fn launch(&self, _options: &LaunchOptions) -> Result<MockSession, HarvestError> {
        self.state.lock().unwrap().launches += 1;
        Ok(self.session())
    }
}

pub struct MockSession {
    state: Arc<Mutex<MockState>>,
    pipeline: Option<InterceptionPipeline>,
}

impl BrowserSession for MockSession {
    async fn intercept(
        &mut self,
        pipeline: &InterceptionPipeline,
        _url_glob: &str,
    ) -> Result<(), HarvestError> {
        self.pipeline = Some(pipeline.clone());
        Ok(())
    }

    async fn navigate(&mut self, _url: &str) -> Result<(), HarvestError> {
        let mut state = self.state.lock().unwrap();
        if state.navigation_failures > 0 {
            state.navigation_failures -= 1;
            return Err(HarvestError::Navigation("net::ERR_CONNECTION_RESET".into()));
        }
        Ok(())
    }

    async fn resolve_request(
        &self,
        request: &InterceptedRequest,
        disposition: RequestDisposition,
    ) -> Result<(), HarvestError> {
        self.state
            .lock()
            .unwrap()
            .resolved
            .push((request.clone(), disposition));
        Ok(())
    }

    async fn response_body(&self, response: &InterceptedResponse) -> Result<String, HarvestError> {
        self.state
            .lock()
            .unwrap()
            .bodies
            .get(&response.request_id)
            .cloned()
            .ok_or_else(|| HarvestError::Browser("No resource with given identifier found".into()))
    }

    async fn press_key(&self, key: &str) -> Result<(), HarvestError> {
        self.state.lock().unwrap().keys.push(key.to_string());
        Ok(())
    }

    /// Completes a jump: delivers the next scripted traffic.
    async fn move_pointer(&self, x: f64, y: f64) -> Result<(), HarvestError> {
        let jump = {
            let mut state = self.state.lock().unwrap();
            state.pointer_moves.push((x, y));
            state.jumps.pop_front()
        };
        if let (Some(jump), Some(pipeline)) = (jump, &self.pipeline) {
            for request in jump.requests {
                pipeline.on_request(request);
            }
            for response in jump.responses {
                pipeline.on_response(response);
            }
        }
        Ok(())
    }

    async fn fetch_json(&self, url: &str) -> Result<Value, HarvestError> {
        let mut state = self.state.lock().unwrap();
        match state.details.get_mut(url).and_then(VecDeque::pop_front) {
            Some(result) => result,
            None => Ok(json!({})),
        }
    }

    async fn close(self) -> Result<(), HarvestError> {
        let late = {
            let mut state = self.state.lock().unwrap();
            state.closes += 1;
            std::mem::take(&mut state.late_requests)
        };
        if let Some(pipeline) = &self.pipeline {
            for request in late {
                pipeline.on_request(request);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter that records event names.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|n| **n == name)
            .count()
    }
}

impl ScrapeReporter for RecordingReporter {
    fn report(&self, event: ScrapeEvent<'_>) {
        self.events.lock().unwrap().push(event.name());
    }
}
