//! Terminal Render Sink
//!
//! A terminal can only append, so the sink prints the part of the answer it
//! has not printed yet. The core guarantees the answer text only grows within
//! one answer, terminal annotations included.
//!
//! - User messages: "You: " in green (only when echoing, e.g. replaying)
//! - Sources: a dark gray block of `url  score: x.xx` lines, printed once per
//!   batch
//! - Waiting indicator: a dim line that is cleared in place when the first
//!   token arrives

use std::io::{self, Write};

use crossterm::{
    cursor, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};

use ragchat_core::{RenderSink, SourceDoc, ViewportPositionProbe};

/// Text of the waiting indicator
pub const WAITING_TEXT: &str = "thinking...";

/// Render sink that writes to a terminal (or any writer)
pub struct TerminalSink<W: Write> {
    out: W,
    /// Emit colours and cursor control
    styled: bool,
    /// Print user messages (off in the REPL, where the user just typed them)
    echo_user: bool,
    /// Bytes of the current answer already written
    printed: usize,
    /// Source batch already written for the current answer
    shown_sources: Vec<SourceDoc>,
    /// Whether the waiting line is on screen
    waiting: bool,
}

impl TerminalSink<io::Stdout> {
    /// Sink on stdout, styled when stdout is a terminal
    #[must_use]
    pub fn stdout() -> Self {
        use std::io::IsTerminal;
        let styled = io::stdout().is_terminal();
        Self::new(io::stdout(), styled)
    }
}

impl<W: Write> TerminalSink<W> {
    /// Create a sink writing to `out`
    pub fn new(out: W, styled: bool) -> Self {
        Self {
            out,
            styled,
            echo_user: false,
            printed: 0,
            shown_sources: Vec::new(),
            waiting: false,
        }
    }

    /// Print user messages from now on (or stop printing them)
    pub fn set_echo_user(&mut self, echo: bool) {
        self.echo_user = echo;
    }

    /// Print a dim status line (used by the REPL for notices)
    pub fn notice(&mut self, text: &str) {
        let result = self
            .colored(Color::DarkGrey, text)
            .and_then(|()| queue!(self.out, Print("\n")))
            .and_then(|()| self.out.flush());
        log_write_error(result);
    }

    /// Borrow the underlying writer
    pub fn writer(&self) -> &W {
        &self.out
    }

    fn colored(&mut self, color: Color, text: &str) -> io::Result<()> {
        if self.styled {
            queue!(self.out, SetForegroundColor(color), Print(text), ResetColor)
        } else {
            queue!(self.out, Print(text))
        }
    }

    fn erase_waiting(&mut self) -> io::Result<()> {
        if !self.waiting {
            return Ok(());
        }
        self.waiting = false;
        if self.styled {
            queue!(
                self.out,
                cursor::MoveToColumn(0),
                Clear(ClearType::CurrentLine)
            )
        } else {
            queue!(self.out, Print("\n"))
        }
    }

    fn draw_waiting(&mut self) -> io::Result<()> {
        self.waiting = true;
        self.colored(Color::DarkGrey, WAITING_TEXT)
    }

    fn write_sources(&mut self, sources: &[SourceDoc]) -> io::Result<()> {
        self.colored(Color::DarkGrey, "Sources:\n")?;
        for doc in sources {
            self.colored(Color::Blue, &doc.url)?;
            self.colored(Color::DarkGrey, &format!("  {}\n", doc.badge()))?;
        }
        queue!(self.out, Print("\n"))
    }

    fn write_answer(&mut self, text: &str, sources: &[SourceDoc]) -> io::Result<()> {
        let new_sources = !sources.is_empty() && sources != self.shown_sources.as_slice();
        let delta = text.get(self.printed..).unwrap_or_default();
        if !new_sources && delta.is_empty() {
            return Ok(());
        }

        let was_waiting = self.waiting;
        self.erase_waiting()?;

        if new_sources {
            self.write_sources(sources)?;
            self.shown_sources = sources.to_vec();
        }
        if !delta.is_empty() {
            queue!(self.out, Print(delta))?;
            self.printed = text.len();
        }

        // Sources can land before the first token; keep the indicator up
        if was_waiting && self.printed == 0 {
            self.draw_waiting()?;
        }
        self.out.flush()
    }
}

impl<W: Write> ViewportPositionProbe for TerminalSink<W> {
    fn is_near_end(&self) -> bool {
        // Output is append-only; the cursor is always at the end
        true
    }

    fn scroll_to_end(&mut self) {
        log_write_error(self.out.flush());
    }
}

impl<W: Write> RenderSink for TerminalSink<W> {
    fn show_user_message(&mut self, text: &str) {
        if !self.echo_user {
            return;
        }
        let result = self
            .colored(Color::Green, "You: ")
            .and_then(|()| queue!(self.out, Print(text), Print("\n")))
            .and_then(|()| self.out.flush());
        log_write_error(result);
    }

    fn begin_answer(&mut self) {
        self.printed = 0;
        self.shown_sources.clear();
        let result = self.draw_waiting().and_then(|()| self.out.flush());
        log_write_error(result);
    }

    fn clear_waiting(&mut self) {
        let result = self.erase_waiting().and_then(|()| self.out.flush());
        log_write_error(result);
    }

    fn render_answer(&mut self, text: &str, sources: &[SourceDoc]) {
        if text.len() < self.printed {
            // A different answer without begin_answer; start a fresh line
            tracing::debug!(printed = self.printed, len = text.len(), "Answer shrank");
            self.printed = 0;
            log_write_error(queue!(self.out, Print("\n")));
        }
        let result = self.write_answer(text, sources);
        log_write_error(result);
    }

    fn set_loading(&mut self, loading: bool) {
        if loading {
            return;
        }
        let result = self
            .erase_waiting()
            .and_then(|()| queue!(self.out, Print("\n")))
            .and_then(|()| self.out.flush());
        log_write_error(result);
    }
}

pub(crate) fn log_write_error(result: io::Result<()>) {
    if let Err(e) = result {
        tracing::debug!(error = %e, "Terminal write failed");
    }
}
