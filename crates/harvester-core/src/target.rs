//! What is being scraped.
//!
//! A [`ResourceTarget`] fixes the page URL and the JSON paths the paginator
//! uses. The three presets differ only in those values; the engine logic is
//! shared.

use url::Url;

use crate::error::HarvestError;
use crate::json_path;

/// Prefix every internal data call of the upstream service starts with.
pub const API_PREFIX: &str = "https://www.instagram.com/graphql/query/";

/// Data calls containing this marker carry no records (profile/story reels).
pub const IRRELEVANT_MARKER: &str = "include_reel";

const DETAIL_URL: &str = "https://www.instagram.com/p/{shortcode}/?__a=1&__d=dis";

/// Matches the upstream service's internal data calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPattern {
    pub prefix: String,
    pub excluded: Option<String>,
}

impl ApiPattern {
    pub fn matches(&self, url: &str) -> bool {
        url.starts_with(&self.prefix)
            && !self
                .excluded
                .as_deref()
                .is_some_and(|marker| url.contains(marker))
    }

    /// Glob handed to the browser so only candidate calls are paused.
    pub fn glob(&self) -> String {
        format!("{}*", self.prefix)
    }
}

impl Default for ApiPattern {
    fn default() -> Self {
        Self {
            prefix: API_PREFIX.to_string(),
            excluded: Some(IRRELEVANT_MARKER.to_string()),
        }
    }
}

/// The kind of resource, used for labelling only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Tag,
    Location,
    Account,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Tag => write!(f, "tag"),
            ResourceKind::Location => write!(f, "location"),
            ResourceKind::Account => write!(f, "account"),
        }
    }
}

/// Identifies one scrape target and how to read its payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTarget {
    pub kind: ResourceKind,
    /// Page URL template; `{id}` is replaced by the identifier.
    pub endpoint: String,
    pub identifier: String,
    pub api: ApiPattern,
    /// Locates `{has_next_page, end_cursor}` inside a payload.
    pub page_info_path: String,
    /// Locates the array of record envelopes inside a payload.
    pub edge_path: String,
    /// Locates the record id inside one envelope.
    pub id_path: String,
    /// Locates the short id used to build the detail URL.
    pub short_id_path: String,
    /// Detail page template; `{shortcode}` is replaced by the short id.
    pub detail_endpoint: String,
    /// Locates the record inside a detail payload.
    pub detail_path: String,
}

impl ResourceTarget {
    fn preset(kind: ResourceKind, endpoint: &str, identifier: &str, connection: &str) -> Self {
        Self {
            kind,
            endpoint: endpoint.to_string(),
            identifier: identifier.trim().trim_start_matches(['#', '@']).to_string(),
            api: ApiPattern::default(),
            page_info_path: format!("{connection}.page_info"),
            edge_path: format!("{connection}.edges"),
            id_path: "node.id".to_string(),
            short_id_path: "node.shortcode".to_string(),
            detail_endpoint: DETAIL_URL.to_string(),
            detail_path: "graphql.shortcode_media".to_string(),
        }
    }

    /// Posts under a hashtag.
    pub fn tag(name: &str) -> Self {
        Self::preset(
            ResourceKind::Tag,
            "https://www.instagram.com/explore/tags/{id}/",
            name,
            "data.hashtag.edge_hashtag_to_media",
        )
    }

    /// Posts at a location id.
    pub fn location(id: &str) -> Self {
        Self::preset(
            ResourceKind::Location,
            "https://www.instagram.com/explore/locations/{id}/",
            id,
            "data.location.edge_location_to_media",
        )
    }

    /// Posts on an account's timeline.
    pub fn account(username: &str) -> Self {
        Self::preset(
            ResourceKind::Account,
            "https://www.instagram.com/{id}/",
            username,
            "data.user.edge_owner_to_timeline_media",
        )
    }

    /// The page URL to navigate to.
    pub fn url(&self) -> Result<String, HarvestError> {
        if self.identifier.is_empty() {
            return Err(HarvestError::Generic(format!(
                "empty {} identifier",
                self.kind
            )));
        }
        let raw = self.endpoint.replace("{id}", &self.identifier);
        Url::parse(&raw)
            .map(String::from)
            .map_err(|e| HarvestError::Generic(format!("invalid resource URL {raw}: {e}")))
    }

    /// The detail page URL for one envelope, if it carries a short id.
    pub fn detail_url(&self, envelope: &serde_json::Value) -> Option<String> {
        let short_id = json_path::lookup_id(envelope, &self.short_id_path)?;
        Some(self.detail_endpoint.replace("{shortcode}", &short_id))
    }

    /// Human-readable label, e.g. `tag:rust`.
    pub fn label(&self) -> String {
        format!("{}:{}", self.kind, self.identifier)
    }
}
