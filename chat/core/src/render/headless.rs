//! Headless render sink
//!
//! Keeps the latest frame in memory instead of drawing it. Used for scripted
//! one-shot runs where only the final answer matters, and by tests.

use super::{RenderSink, ViewportPositionProbe};
use crate::protocol::SourceDoc;

/// Render sink that records what it was asked to show
#[derive(Debug, Clone)]
pub struct HeadlessSink {
    text: String,
    sources: Vec<SourceDoc>,
    user_messages: Vec<String>,
    render_count: u32,
    answers_begun: u32,
    waiting: bool,
    waiting_cleared: u32,
    loading: bool,
    loading_changes: Vec<bool>,
    near_end: bool,
    scroll_count: u32,
    updating: bool,
}

impl Default for HeadlessSink {
    fn default() -> Self {
        Self {
            text: String::new(),
            sources: Vec::new(),
            user_messages: Vec::new(),
            render_count: 0,
            answers_begun: 0,
            waiting: false,
            waiting_cleared: 0,
            loading: false,
            loading_changes: Vec::new(),
            near_end: true,
            scroll_count: 0,
            updating: false,
        }
    }
}

impl HeadlessSink {
    /// Create an empty sink that reports itself as following the tail
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last rendered answer text
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Last rendered source list
    #[must_use]
    pub fn sources(&self) -> &[SourceDoc] {
        &self.sources
    }

    /// User messages shown so far
    #[must_use]
    pub fn user_messages(&self) -> &[String] {
        &self.user_messages
    }

    /// Number of `render_answer` calls
    #[must_use]
    pub fn render_count(&self) -> u32 {
        self.render_count
    }

    /// Number of `begin_answer` calls
    #[must_use]
    pub fn answers_begun(&self) -> u32 {
        self.answers_begun
    }

    /// Whether the waiting indicator is showing
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    /// Number of `clear_waiting` calls
    #[must_use]
    pub fn waiting_cleared(&self) -> u32 {
        self.waiting_cleared
    }

    /// Current loading flag
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Every loading flag the sink received, in order
    #[must_use]
    pub fn loading_changes(&self) -> &[bool] {
        &self.loading_changes
    }

    /// Number of `scroll_to_end` calls
    #[must_use]
    pub fn scroll_count(&self) -> u32 {
        self.scroll_count
    }

    /// Pretend the viewer scrolled away from (or back to) the end
    pub fn set_near_end(&mut self, near_end: bool) {
        self.near_end = near_end;
    }

    /// Pretend the surface is (or is no longer) mid-update
    pub fn set_updating(&mut self, updating: bool) {
        self.updating = updating;
    }
}

impl ViewportPositionProbe for HeadlessSink {
    fn is_near_end(&self) -> bool {
        self.near_end
    }

    fn scroll_to_end(&mut self) {
        self.scroll_count += 1;
    }
}

impl RenderSink for HeadlessSink {
    fn show_user_message(&mut self, text: &str) {
        self.user_messages.push(text.to_string());
    }

    fn begin_answer(&mut self) {
        self.answers_begun += 1;
        self.text.clear();
        self.sources.clear();
        self.waiting = true;
    }

    fn clear_waiting(&mut self) {
        self.waiting = false;
        self.waiting_cleared += 1;
    }

    fn render_answer(&mut self, text: &str, sources: &[SourceDoc]) {
        self.render_count += 1;
        self.text.clear();
        self.text.push_str(text);
        self.sources = sources.to_vec();
    }

    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
        self.loading_changes.push(loading);
    }

    fn is_updating(&self) -> bool {
        self.updating
    }
}
