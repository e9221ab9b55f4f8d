//! Rate-limit detection and the hibernation flag.
//!
//! The upstream service answers throttled data calls with a payload like
//! `{"status": "fail", "message": "Please wait a few minutes before you try again."}`.
//! Seeing one arms the flag; the engine sleeps the hibernation duration once on
//! its next cycle and disarms it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

const RATE_LIMIT_MESSAGE: &str = "wait a few minutes";

/// Shared hibernation flag plus the rate-limit detector.
#[derive(Debug, Clone, Default)]
pub struct Hibernator {
    armed: Arc<AtomicBool>,
}

impl Hibernator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `payload` signals a failure/rate-limit status.
    pub fn is_rate_limited(payload: &Value) -> bool {
        let failed = payload
            .get("status")
            .and_then(Value::as_str)
            .is_some_and(|status| status.eq_ignore_ascii_case("fail"));
        let throttled = payload
            .get("message")
            .and_then(Value::as_str)
            .is_some_and(|message| message.to_ascii_lowercase().contains(RATE_LIMIT_MESSAGE));
        failed || throttled
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Flips the flag, returning the new value.
    pub fn toggle(&self) -> bool {
        !self.armed.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Disarms the flag, returning whether it was armed.
    pub fn take(&self) -> bool {
        self.armed.swap(false, Ordering::SeqCst)
    }
}
