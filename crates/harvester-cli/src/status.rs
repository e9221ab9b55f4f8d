use std::io::Write;

use harvester_core::status::Progress;
use harvester_core::{ScrapeEvent, ScrapeReporter, TracingReporter};

/// Renders progress as a single line rewritten in place on stdout and
/// forwards every other event to [`TracingReporter`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StatusLine;

impl StatusLine {
    fn render(out: &mut impl Write, progress: &Progress<'_>) -> std::io::Result<()> {
        write!(out, "\r\x1b[K{progress}")?;
        out.flush()
    }
}

impl ScrapeReporter for StatusLine {
    fn report(&self, event: ScrapeEvent<'_>) {
        match event {
            ScrapeEvent::Progress(progress) => {
                let stdout = std::io::stdout();
                let mut out = stdout.lock();
                if let Err(e) = Self::render(&mut out, &progress) {
                    tracing::debug!("Status line write failed: {e}");
                }
            }
            other => TracingReporter.report(other),
        }
    }
}
