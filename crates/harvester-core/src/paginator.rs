//! Turns intercepted traffic into records.
//!
//! Once per poll cycle the engine hands the paginator everything the
//! interception callbacks buffered. Requests are released (rewritten while a
//! graft is in progress), responses are parsed, deduplicated and capped, and
//! the surviving records are queued on the output buffer in arrival order.
//!
//! # Graft states
//!
//! ```text
//! NORMAL --[begin_graft, template known]--> GRAFTING
//!    ^                                          |
//!    +------[matching response extracted]-------+
//! ```

use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;

use crate::buffer::LockedBuffer;
use crate::config::ScrapeConfig;
use crate::hibernate::Hibernator;
use crate::json_path::{self, PageInfo};
use crate::models::{InterceptedRequest, InterceptedResponse, Record, RequestDisposition, RequestTemplate};
use crate::post_ids::PostIdSet;
use crate::status::{ScrapeEvent, ScrapeReporter};
use crate::target::ResourceTarget;
use crate::traits::BrowserSession;

pub struct Paginator {
    target: ResourceTarget,
    total: usize,
    full_detail: bool,
    detail_concurrency: usize,
    detail_backoff: Duration,
    post_ids: PostIdSet,
    template: Option<RequestTemplate>,
    grafting: bool,
    finished: bool,
    emitted: usize,
    output: LockedBuffer<Record>,
    hibernator: Hibernator,
}

impl Paginator {
    pub fn new(target: ResourceTarget, config: &ScrapeConfig, hibernator: Hibernator) -> Self {
        Self {
            target,
            total: config.total,
            full_detail: config.full_detail,
            detail_concurrency: config.detail_concurrency.max(1),
            detail_backoff: config.detail_backoff,
            post_ids: PostIdSet::new(),
            template: None,
            grafting: false,
            finished: false,
            emitted: 0,
            output: LockedBuffer::new(),
            hibernator,
        }
    }

    pub fn output(&self) -> &LockedBuffer<Record> {
        &self.output
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_grafting(&self) -> bool {
        self.grafting
    }

    /// Number of records accepted for emission so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn template(&self) -> Option<&RequestTemplate> {
        self.template.as_ref()
    }

    /// Enters the grafting state. Refused until a template has been captured.
    pub fn begin_graft(&mut self) -> bool {
        if self.template.is_none() {
            return false;
        }
        self.grafting = true;
        true
    }

    fn cap_reached(&self) -> bool {
        self.total > 0 && self.emitted >= self.total
    }

    /// Decides how a paused request is released, capturing the template of
    /// matching requests outside a graft.
    pub fn dispose(&mut self, request: &InterceptedRequest) -> RequestDisposition {
        if !self.target.api.matches(&request.url) {
            return RequestDisposition::Continue;
        }
        if self.grafting {
            if let Some(template) = &self.template {
                return RequestDisposition::Rewrite(template.clone());
            }
        }
        self.template = Some(RequestTemplate::from(request));
        RequestDisposition::Continue
    }

    /// Releases every buffered request. Non-matching requests are continued
    /// unmodified so the page never stalls.
    pub async fn process_requests<S, R>(
        &mut self,
        session: &S,
        requests: Vec<InterceptedRequest>,
        reporter: &R,
    ) where
        S: BrowserSession,
        R: ScrapeReporter,
    {
        for request in requests {
            let disposition = self.dispose(&request);
            if let Err(e) = session.resolve_request(&request, disposition).await {
                let error = e.to_string();
                reporter.report(ScrapeEvent::RequestFailed {
                    url: &request.url,
                    error: &error,
                });
            }
        }
    }

    /// Extracts records from every buffered response matching the data API.
    pub async fn process_responses<S, R>(
        &mut self,
        session: &S,
        responses: Vec<InterceptedResponse>,
        reporter: &R,
    ) where
        S: BrowserSession,
        R: ScrapeReporter,
    {
        for response in responses {
            if !self.target.api.matches(&response.url) {
                continue;
            }

            let body = match session.response_body(&response).await {
                Ok(body) => body,
                Err(e) => {
                    let reason = e.to_string();
                    reporter.report(ScrapeEvent::ResponseSkipped {
                        url: &response.url,
                        reason: &reason,
                    });
                    continue;
                }
            };

            let payload: Value = match serde_json::from_str(&body) {
                Ok(payload) => payload,
                Err(e) => {
                    let reason = format!("invalid JSON: {e}");
                    reporter.report(ScrapeEvent::ResponseSkipped {
                        url: &response.url,
                        reason: &reason,
                    });
                    continue;
                }
            };

            let Some(accepted) = self.accept(&payload, &response.url, reporter) else {
                continue;
            };

            let records = if self.full_detail {
                self.enrich(session, accepted, reporter).await
            } else {
                accepted
            };
            for record in records {
                self.output.push(record);
            }

            if self.grafting {
                self.grafting = false;
                reporter.report(ScrapeEvent::GraftCompleted);
            }
        }
    }

    /// Applies rate-limit detection, pagination, dedup and the cap to one
    /// payload. Returns `None` when the payload yields no extraction at all.
    pub fn accept<R: ScrapeReporter>(
        &mut self,
        payload: &Value,
        url: &str,
        reporter: &R,
    ) -> Option<Vec<Record>> {
        if Hibernator::is_rate_limited(payload) {
            self.hibernator.arm();
            reporter.report(ScrapeEvent::RateLimited { url });
            return None;
        }

        let Some(edges) = json_path::lookup(payload, &self.target.edge_path).and_then(Value::as_array)
        else {
            reporter.report(ScrapeEvent::ResponseSkipped {
                url,
                reason: "edge path not found",
            });
            return None;
        };

        let has_more = PageInfo::at(payload, &self.target.page_info_path)
            .is_some_and(|page_info| page_info.has_more());
        if !has_more {
            self.finished = true;
        }

        let mut accepted = Vec::new();
        for edge in edges {
            let Some(id) = json_path::lookup_id(edge, &self.target.id_path) else {
                reporter.report(ScrapeEvent::ResponseSkipped {
                    url,
                    reason: "record without identifier",
                });
                continue;
            };
            if !self.post_ids.insert(&id) {
                reporter.report(ScrapeEvent::Duplicate { id: &id });
                continue;
            }
            if self.cap_reached() {
                self.finished = true;
                break;
            }
            self.emitted += 1;
            accepted.push(Record::new(id, edge.clone()));
            if self.cap_reached() {
                self.finished = true;
                break;
            }
        }
        Some(accepted)
    }

    /// Replaces each envelope with its detail payload, keeping order.
    async fn enrich<S, R>(&self, session: &S, records: Vec<Record>, reporter: &R) -> Vec<Record>
    where
        S: BrowserSession,
        R: ScrapeReporter,
    {
        let target = &self.target;
        let backoff = self.detail_backoff;
        futures::stream::iter(records)
            .map(|record| fetch_detail(session, target, backoff, reporter, record))
            .buffered(self.detail_concurrency)
            .collect()
            .await
    }
}

/// Fetches one record's detail page, retrying until it succeeds.
async fn fetch_detail<S, R>(
    session: &S,
    target: &ResourceTarget,
    backoff: Duration,
    reporter: &R,
    mut record: Record,
) -> Record
where
    S: BrowserSession,
    R: ScrapeReporter,
{
    let Some(url) = target.detail_url(&record.data) else {
        return record;
    };
    loop {
        match session.fetch_json(&url).await {
            Ok(payload) => {
                record.data = json_path::lookup(&payload, &target.detail_path)
                    .cloned()
                    .unwrap_or(payload);
                return record;
            }
            Err(e) => {
                let error = e.to_string();
                reporter.report(ScrapeEvent::DetailFetchFailed {
                    id: &record.id,
                    error: &error,
                });
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarvestError;
    use crate::status::NullReporter;
    use crate::testutil::*;
    use serde_json::json;

    fn paginator(config: &ScrapeConfig) -> Paginator {
        Paginator::new(ResourceTarget::tag("rust"), config, Hibernator::new())
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn duplicates_within_one_response_are_dropped() {
        let mut p = paginator(&ScrapeConfig::default());
        let payload = tag_page(&["p1", "p1", "p2"], false);
        let reporter = RecordingReporter::new();

        let records = p.accept(&payload, API_URL, &reporter).unwrap();
        assert_eq!(ids(&records), vec!["p1", "p2"]);
        assert_eq!(reporter.count("duplicate"), 1);
    }

    #[test]
    fn duplicates_across_responses_are_dropped() {
        let mut p = paginator(&ScrapeConfig::default());
        let first = p.accept(&tag_page(&["x", "y"], true), API_URL, &NullReporter).unwrap();
        let second = p.accept(&tag_page(&["y", "z"], false), API_URL, &NullReporter).unwrap();
        assert_eq!(ids(&first), vec!["x", "y"]);
        assert_eq!(ids(&second), vec!["z"]);
        assert_eq!(p.emitted(), 3);
    }

    #[test]
    fn cap_stops_mid_response_and_finishes() {
        let mut p = paginator(&ScrapeConfig::default().with_total(5));
        let first = p.accept(&tag_page(&["a1", "a2", "a3", "a4"], true), API_URL, &NullReporter).unwrap();
        assert_eq!(first.len(), 4);
        assert!(!p.is_finished());

        let second = p.accept(&tag_page(&["b1", "b2", "b3", "b4"], true), API_URL, &NullReporter).unwrap();
        assert_eq!(ids(&second), vec!["b1"]);
        assert_eq!(p.emitted(), 5);
        assert!(p.is_finished());
    }

    #[test]
    fn missing_next_page_finishes_after_own_records() {
        let mut p = paginator(&ScrapeConfig::default());
        let records = p.accept(&tag_page(&["a", "b"], false), API_URL, &NullReporter).unwrap();
        assert_eq!(records.len(), 2);
        assert!(p.is_finished());
    }

    #[test]
    fn missing_page_info_counts_as_last_page() {
        let mut p = paginator(&ScrapeConfig::default());
        let payload = json!({"data": {"hashtag": {"edge_hashtag_to_media": {
            "edges": [{"node": {"id": "1"}}]
        }}}});
        assert_eq!(p.accept(&payload, API_URL, &NullReporter).unwrap().len(), 1);
        assert!(p.is_finished());
    }

    #[test]
    fn unrelated_payload_is_skipped_without_finishing() {
        let mut p = paginator(&ScrapeConfig::default());
        let reporter = RecordingReporter::new();
        assert!(p.accept(&json!({"data": {"viewer": null}}), API_URL, &reporter).is_none());
        assert!(!p.is_finished());
        assert_eq!(reporter.count("response_skipped"), 1);
    }

    #[test]
    fn rate_limit_arms_hibernation() {
        let hibernator = Hibernator::new();
        let mut p = Paginator::new(
            ResourceTarget::tag("rust"),
            &ScrapeConfig::default(),
            hibernator.clone(),
        );
        assert!(p.accept(&rate_limited_payload(), API_URL, &NullReporter).is_none());
        assert!(hibernator.is_armed());
        assert!(!p.is_finished());
    }

    #[test]
    fn graft_requires_a_template() {
        let mut p = paginator(&ScrapeConfig::default());
        assert!(!p.begin_graft());

        p.dispose(&api_request("r1", 1));
        assert!(p.begin_graft());
        assert!(p.is_grafting());
    }

    #[test]
    fn grafting_rewrites_matching_requests_to_last_template() {
        let mut p = paginator(&ScrapeConfig::default());
        let captured = api_request("r1", 1);
        assert_eq!(p.dispose(&captured), RequestDisposition::Continue);
        assert_eq!(p.dispose(&api_request("r2", 2)), RequestDisposition::Continue);
        assert_eq!(p.template().unwrap().url, api_request("r2", 2).url);

        assert!(p.begin_graft());
        for page in [3, 4, 5] {
            let disposition = p.dispose(&api_request("rn", page));
            assert_eq!(
                disposition,
                RequestDisposition::Rewrite(RequestTemplate::from(&api_request("r2", 2)))
            );
        }

        let asset = InterceptedRequest {
            id: "asset".into(),
            url: "https://www.instagram.com/static/app.js".into(),
            method: "GET".into(),
            headers: Default::default(),
        };
        assert_eq!(p.dispose(&asset), RequestDisposition::Continue);
    }

    #[tokio::test]
    async fn every_request_is_resolved() {
        let launcher = MockLauncher::new();
        let session = launcher.session();
        let mut p = paginator(&ScrapeConfig::default());
        let asset = InterceptedRequest {
            id: "asset".into(),
            url: "https://www.instagram.com/static/app.js".into(),
            method: "GET".into(),
            headers: Default::default(),
        };

        p.process_requests(&session, vec![asset, api_request("r1", 1)], &NullReporter)
            .await;

        let resolved = launcher.resolved();
        assert_eq!(resolved.len(), 2);
        assert!(resolved.iter().all(|(_, d)| *d == RequestDisposition::Continue));
    }

    #[tokio::test]
    async fn unparseable_and_foreign_responses_are_skipped() {
        let launcher = MockLauncher::new()
            .with_body("n1", "<html>not json</html>")
            .with_body("n2", &tag_page(&["a"], true).to_string());
        let session = launcher.session();
        let mut p = paginator(&ScrapeConfig::default());
        let reporter = RecordingReporter::new();

        let responses = vec![
            api_response("n1"),
            InterceptedResponse {
                request_id: "n3".into(),
                url: "https://www.instagram.com/logging/falco".into(),
                status: 200,
            },
            api_response("n2"),
        ];
        p.process_responses(&session, responses, &reporter).await;

        assert_eq!(reporter.count("response_skipped"), 1);
        assert_eq!(p.output().drain().len(), 1);
    }

    #[tokio::test]
    async fn matching_response_ends_graft() {
        let launcher = MockLauncher::new().with_body("n1", &tag_page(&["a"], true).to_string());
        let session = launcher.session();
        let mut p = paginator(&ScrapeConfig::default());
        p.dispose(&api_request("r1", 1));
        p.begin_graft();

        p.process_responses(&session, vec![api_response("n1")], &NullReporter)
            .await;
        assert!(!p.is_grafting());
    }

    #[tokio::test]
    async fn full_detail_replaces_envelopes_in_order() {
        let launcher = MockLauncher::new()
            .with_body("n1", &tag_page(&["a", "b"], false).to_string())
            .with_detail(
                &detail_url("a"),
                vec![
                    Err(HarvestError::Navigation("net::ERR_TIMED_OUT".into())),
                    Ok(json!({"graphql": {"shortcode_media": {"id": "a", "caption": "full a"}}})),
                ],
            )
            .with_detail(
                &detail_url("b"),
                vec![Ok(json!({"graphql": {"shortcode_media": {"id": "b", "caption": "full b"}}}))],
            );
        let session = launcher.session();
        let config = ScrapeConfig::default()
            .with_full_detail(true)
            .with_detail_fetching(2, Duration::ZERO);
        let mut p = paginator(&config);
        let reporter = RecordingReporter::new();

        p.process_responses(&session, vec![api_response("n1")], &reporter).await;

        let records = p.output().drain();
        assert_eq!(ids(&records), vec!["a", "b"]);
        assert_eq!(records[0].data["caption"], "full a");
        assert_eq!(records[1].data["caption"], "full b");
        assert_eq!(reporter.count("detail_fetch_failed"), 1);
    }
}
