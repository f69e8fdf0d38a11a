//! Interactive REPL
//!
//! Lines starting with `/` are commands, anything else is a query. While an
//! answer streams, Ctrl-C stops it; while idle, Ctrl-C exits.

use std::io::{self, Write};

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use ragchat_core::{ChatAppState, ChatError, SessionId, StreamPhase};

use crate::commands::{print_session_list, run_turn};
use crate::terminal::{log_write_error, TerminalSink};

const HELP: &str = "\
Commands:
  /new                  start a new chat
  /sessions             list saved chats
  /open <id>            open a saved chat
  /rename <id> <title>  rename a chat
  /delete <id>          delete a chat
  /help                 show this help
  /quit                 exit
Ctrl-C stops a streaming answer; at the prompt it exits.";

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    /// A query for the backend
    Query(String),
    /// `/new`
    New,
    /// `/sessions`
    Sessions,
    /// `/open <id>`
    Open(SessionId),
    /// `/rename <id> <title>`
    Rename(SessionId, String),
    /// `/delete <id>`
    Delete(SessionId),
    /// `/help`
    Help,
    /// `/quit`
    Quit,
    /// Blank line
    Empty,
    /// Unknown command or missing argument
    Invalid(String),
}

impl ReplInput {
    /// Parse one line of input
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Query(line.to_string());
        };

        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };

        match name {
            "new" => Self::New,
            "sessions" | "ls" => Self::Sessions,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            "open" => match first_word(rest) {
                Some((id, _)) => Self::Open(SessionId::from(id)),
                None => Self::Invalid("usage: /open <id>".to_string()),
            },
            "delete" | "rm" => match first_word(rest) {
                Some((id, _)) => Self::Delete(SessionId::from(id)),
                None => Self::Invalid("usage: /delete <id>".to_string()),
            },
            "rename" => match first_word(rest) {
                Some((id, title)) if !title.is_empty() => {
                    Self::Rename(SessionId::from(id), title.to_string())
                }
                _ => Self::Invalid("usage: /rename <id> <title>".to_string()),
            },
            other => Self::Invalid(format!("unknown command: /{other} (try /help)")),
        }
    }
}

fn first_word(text: &str) -> Option<(&str, &str)> {
    if text.is_empty() {
        return None;
    }
    Some(match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    })
}

/// How the REPL ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplExit {
    /// `/quit` or end of input
    Quit,
    /// Ctrl-C at the prompt; a stdin read may still be pending
    Interrupted,
}

/// Run the REPL until `/quit`, end of input, or Ctrl-C at the prompt
pub async fn run(app: &mut ChatAppState) -> anyhow::Result<ReplExit> {
    let mut sink = TerminalSink::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    sink.notice(&format!(
        "ragchat: {} (/help for commands)",
        app.config().endpoint
    ));

    loop {
        prompt(app);

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read input")?,
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("Ctrl-C at prompt");
                println!();
                return Ok(ReplExit::Interrupted);
            }
        };
        let Some(line) = line else {
            break;
        };

        match ReplInput::parse(&line) {
            ReplInput::Empty => {}
            ReplInput::Quit => break,
            ReplInput::Help => sink.notice(HELP),
            ReplInput::New => {
                app.start_new_chat();
                sink.notice("New chat");
            }
            ReplInput::Sessions => print_session_list(app),
            ReplInput::Open(id) => {
                sink.set_echo_user(true);
                let result = app.open_session(&id, &mut sink);
                sink.set_echo_user(false);
                report(&mut sink, result);
            }
            ReplInput::Rename(id, title) => {
                let result = app.rename_session(&id, &title);
                if result.is_ok() {
                    sink.notice("Renamed");
                }
                report(&mut sink, result);
            }
            ReplInput::Delete(id) => {
                let result = app.delete_session(&id);
                if result.is_ok() {
                    sink.notice("Deleted");
                }
                report(&mut sink, result);
            }
            ReplInput::Invalid(message) => sink.notice(&message),
            ReplInput::Query(query) => match run_turn(app, &query, &mut sink).await {
                Ok(turn) => {
                    if turn.phase() == StreamPhase::Failed {
                        sink.notice("The message was not saved; send it again to retry.");
                    }
                    if let Some(e) = turn.store_error {
                        sink.notice(&format!("Warning: could not save session: {e}"));
                    }
                }
                Err(e) => sink.notice(&e.to_string()),
            },
        }
    }

    Ok(ReplExit::Quit)
}

fn prompt(app: &ChatAppState) {
    let title = app
        .current_session()
        .map_or("new chat", |session| session.title.as_str());
    log_write_error(write_prompt(&mut std::io::stdout(), title));
}

fn write_prompt<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    write!(out, "[{title}] > ")?;
    out.flush()
}

fn report(sink: &mut TerminalSink<std::io::Stdout>, result: Result<(), ChatError>) {
    if let Err(e) = result {
        sink.notice(&e.to_string());
    }
}
