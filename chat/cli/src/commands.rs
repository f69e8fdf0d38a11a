//! One-shot subcommands and the turn runner shared with the REPL

use anyhow::{bail, Context};
use chrono::{DateTime, Local};

use ragchat_core::{
    ChatAppState, ChatError, HeadlessSink, RenderSink, SessionId, SessionSummary, StreamPhase,
    TurnReport,
};

use crate::terminal::TerminalSink;

/// Dispatch `query` and stream the answer into `sink`; Ctrl-C cancels the
/// stream instead of killing the process.
pub async fn run_turn<S>(
    app: &mut ChatAppState,
    query: &str,
    sink: &mut S,
) -> Result<TurnReport, ChatError>
where
    S: RenderSink + ?Sized,
{
    let controller = app.controller();
    let turn = app.dispatch(query, sink);
    tokio::pin!(turn);

    loop {
        tokio::select! {
            report = &mut turn => return report,
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
                    return turn.await;
                }
                if controller.cancel() {
                    tracing::debug!("Ctrl-C, stopping stream");
                }
            }
        }
    }
}

/// `ask <QUERY> [--session ID] [--raw]`
pub async fn ask(
    app: &mut ChatAppState,
    query: &str,
    session: Option<SessionId>,
    raw: bool,
) -> anyhow::Result<()> {
    if let Some(id) = session {
        // Select without replaying the log to the terminal
        app.open_session(&id, &mut HeadlessSink::new())?;
    }

    let report = if raw {
        let mut sink = HeadlessSink::new();
        let report = run_turn(app, query, &mut sink).await?;
        println!("{}", sink.text());
        report
    } else {
        let mut sink = TerminalSink::stdout();
        run_turn(app, query, &mut sink).await?
    };

    if let Some(e) = report.store_error {
        tracing::warn!(error = %e, "Answer was not saved");
    }
    match report.outcome.phase {
        StreamPhase::Failed => {
            let reason = report
                .outcome
                .error
                .map_or_else(|| "unknown error".to_string(), |e| e.to_string());
            bail!("{reason}")
        }
        _ => {
            eprintln!("session: {}", report.session_id);
            Ok(())
        }
    }
}

/// `sessions list`
pub fn print_session_list(app: &ChatAppState) {
    let sessions = app.list_sessions();
    if sessions.is_empty() {
        println!("No saved chats");
        return;
    }
    for summary in &sessions {
        println!("{}", format_summary(summary, app.current_session_id()));
    }
}

/// `sessions show <id>`
pub fn show_session(app: &mut ChatAppState, id: &SessionId) -> anyhow::Result<()> {
    let mut sink = TerminalSink::stdout();
    sink.set_echo_user(true);
    app.open_session(id, &mut sink)?;
    sink.set_loading(false);
    Ok(())
}

/// `sessions rename <id> <title>`
pub fn rename_session(app: &mut ChatAppState, id: &SessionId, title: &str) -> anyhow::Result<()> {
    app.rename_session(id, title)
        .with_context(|| format!("Failed to rename session {id}"))?;
    println!("Renamed {id}");
    Ok(())
}

/// `sessions delete <id>`
pub fn delete_session(app: &mut ChatAppState, id: &SessionId) -> anyhow::Result<()> {
    app.delete_session(id)
        .with_context(|| format!("Failed to delete session {id}"))?;
    println!("Deleted {id}");
    Ok(())
}

/// `health`
pub async fn health(app: &ChatAppState) -> anyhow::Result<()> {
    let transport = app.transport();
    if transport.health_check().await {
        println!("{} backend at {} is ready", transport.name(), app.config().endpoint);
        Ok(())
    } else {
        bail!(
            "{} backend at {} is not ready",
            transport.name(),
            app.config().endpoint
        )
    }
}

/// One listing line: id, local time, message count, title
fn format_summary(summary: &SessionSummary, current: Option<&SessionId>) -> String {
    let marker = if current == Some(&summary.id) { "*" } else { " " };
    let when = DateTime::from_timestamp_millis(summary.timestamp).map_or_else(
        || "-".to_string(),
        |t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
    );
    format!(
        "{marker} {:<14} {when}  {:>3} msgs  {}",
        summary.id.as_str(),
        summary.message_count,
        summary.title
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_summary() {
        let summary = SessionSummary {
            id: SessionId::from("1700000000000"),
            title: "What is RAG?".to_string(),
            timestamp: 1_700_000_000_000,
            message_count: 2,
        };

        let line = format_summary(&summary, Some(&SessionId::from("1700000000000")));
        assert!(line.starts_with("* 1700000000000"));
        assert!(line.contains("  2 msgs"));
        assert!(line.ends_with("What is RAG?"));

        let other = format_summary(&summary, None);
        assert!(other.starts_with("  1700000000000"));
    }
}
