//! Render Boundary
//!
//! The core never draws anything. It owns the raw answer text and decides
//! *when* a surface should redraw; the surface implements [`RenderSink`] and
//! decides *how*. Markdown rendering and sanitizing happen on the surface
//! side.

mod headless;
mod throttle;

use crate::protocol::SourceDoc;

pub use headless::HeadlessSink;
pub use throttle::{RenderThrottle, DEFAULT_RENDER_INTERVAL};

/// Scroll position capability of a surface
///
/// Lets the core keep the view pinned to the newest output without knowing
/// anything about the surface's layout.
pub trait ViewportPositionProbe {
    /// Whether the viewer is at (or close to) the end of the conversation
    fn is_near_end(&self) -> bool;

    /// Move the view to the end of the conversation
    fn scroll_to_end(&mut self);
}

/// A surface that displays the conversation
pub trait RenderSink: ViewportPositionProbe {
    /// Show a user message
    fn show_user_message(&mut self, text: &str);

    /// Open an empty answer area with a waiting indicator
    fn begin_answer(&mut self);

    /// Remove the waiting indicator. Called at most once per answer.
    fn clear_waiting(&mut self);

    /// Redraw the current answer. `text` only ever grows within one answer.
    fn render_answer(&mut self, text: &str, sources: &[SourceDoc]);

    /// Toggle input affordances (send vs. stop, input enabled)
    fn set_loading(&mut self, loading: bool);

    /// Whether the surface is in the middle of an update and cannot take
    /// another render right now
    fn is_updating(&self) -> bool {
        false
    }
}
