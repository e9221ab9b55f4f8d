pub mod buffer;
pub mod config;
pub mod engine;
pub mod error;
pub mod hibernate;
pub mod json_path;
pub mod models;
pub mod paginator;
pub mod pipeline;
pub mod post_ids;
pub mod status;
pub mod target;
pub mod traits;
pub mod util;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::ScrapeConfig;
pub use engine::{EngineControl, ScrapeEngine};
pub use error::HarvestError;
pub use models::{InterceptedRequest, InterceptedResponse, Record, RequestDisposition};
pub use pipeline::InterceptionPipeline;
pub use status::{ScrapeEvent, ScrapeReporter, TracingReporter};
pub use target::ResourceTarget;
pub use traits::{BrowserLauncher, BrowserSession};
