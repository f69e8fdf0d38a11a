//! Render throttling
//!
//! Tokens can arrive hundreds of times per second; re-rendering Markdown on
//! every one of them is wasted work. [`RenderThrottle`] collapses bursts into
//! at most one render per interval:
//!
//! - the first `request()` arms a deadline one interval ahead
//! - further requests before the deadline only mark the slot as still wanted
//!   (one pending slot, no queue, and the deadline is not pushed back)
//! - when the deadline fires the *current* state is rendered
//! - `flush()` renders immediately and disarms the timer; stream termination
//!   always goes through it so the final state is never lost
//!
//! Time comes from `tokio::time`, so tests can pause the clock.

use std::time::Duration;

use tokio::time::Instant;

use super::{RenderSink, ViewportPositionProbe};
use crate::protocol::SourceDoc;

/// Default interval between throttled renders
pub const DEFAULT_RENDER_INTERVAL: Duration = Duration::from_millis(40);

/// Coalesces render requests into at most one render per interval
#[derive(Debug)]
pub struct RenderThrottle {
    /// Minimum spacing between throttled renders
    interval: Duration,
    /// When the pending render fires (None = nothing pending)
    deadline: Option<Instant>,
    /// Whether the viewer was following the tail at the latest request
    follow_tail: bool,
    /// Renders performed
    renders: u32,
    /// Renders postponed because the sink was busy
    deferred: u32,
}

impl Default for RenderThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_RENDER_INTERVAL)
    }
}

impl RenderThrottle {
    /// Create a throttle with the given interval
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
            follow_tail: false,
            renders: 0,
            deferred: 0,
        }
    }

    /// Configured interval
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Ask for a render of the latest state.
    ///
    /// Samples the viewport so the eventual render knows whether to keep the
    /// view pinned to the end.
    pub fn request<P>(&mut self, probe: &P)
    where
        P: ViewportPositionProbe + ?Sized,
    {
        self.follow_tail = probe.is_near_end();
        if self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.interval);
        }
    }

    /// Whether a render is waiting for its deadline
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the pending render is due
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Resolve when the pending render is due; never resolves when nothing
    /// is pending
    pub async fn wait(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }

    /// Perform the pending render once its deadline has passed.
    ///
    /// If the sink is mid-update the render is rescheduled one interval
    /// later instead of being dropped. Returns whether a render happened.
    pub fn fire<S>(&mut self, sink: &mut S, text: &str, sources: &[SourceDoc]) -> bool
    where
        S: RenderSink + ?Sized,
    {
        let Some(deadline) = self.deadline else {
            return false;
        };
        let now = Instant::now();
        if now < deadline {
            return false;
        }

        if sink.is_updating() {
            self.deadline = Some(now + self.interval);
            self.deferred += 1;
            tracing::trace!(deferred = self.deferred, "Sink busy, render rescheduled");
            return false;
        }

        self.deadline = None;
        self.render(sink, text, sources);
        true
    }

    /// Cancel any pending timer and render right now
    pub fn flush<S>(&mut self, sink: &mut S, text: &str, sources: &[SourceDoc])
    where
        S: RenderSink + ?Sized,
    {
        self.deadline = None;
        self.render(sink, text, sources);
    }

    /// Renders performed so far
    #[must_use]
    pub fn renders(&self) -> u32 {
        self.renders
    }

    /// Renders postponed because the sink was busy
    #[must_use]
    pub fn deferred(&self) -> u32 {
        self.deferred
    }

    fn render<S>(&mut self, sink: &mut S, text: &str, sources: &[SourceDoc])
    where
        S: RenderSink + ?Sized,
    {
        sink.render_answer(text, sources);
        self.renders += 1;
        if self.follow_tail {
            sink.scroll_to_end();
        }
    }
}
